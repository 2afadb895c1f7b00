// Server-side session storage: one JSON document per session token.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use survey_records::{SessionContext, SessionPhase};

use crate::intake::*;

const TOKEN_LEN: usize = 16;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
struct StoredSession {
    #[serde(rename = "producerId")]
    producer_id: Option<String>,
    #[serde(rename = "fieldIndex")]
    field_index: u32,
    phase: String,
}

/// Persisted session contexts, keyed by token. The token is the only
/// thing the form renderer has to carry between interactions.
pub struct SessionDir {
    dir: PathBuf,
}

impl SessionDir {
    pub fn new(dir: &str) -> SessionDir {
        SessionDir {
            dir: PathBuf::from(dir),
        }
    }

    fn session_path(&self, token: &str) -> PathBuf {
        self.dir.join(format!("{}.json", token))
    }

    /// Opens a fresh session under a newly drawn token.
    pub fn create<R: Rng>(&self, rng: &mut R) -> IntakeResult<(String, SessionContext)> {
        let token: String = rng
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LEN)
            .map(char::from)
            .collect();
        let ctx = SessionContext::new();
        self.save(&token, &ctx)?;
        debug!("SessionDir: created session {}", token);
        Ok((token, ctx))
    }

    pub fn load(&self, token: &str) -> IntakeResult<SessionContext> {
        if !valid_token(token) {
            return UnknownSessionSnafu { token }.fail();
        }
        let path = self.session_path(token);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return UnknownSessionSnafu { token }.fail()
            }
            Err(e) => {
                return Err(e).context(SessionIoSnafu {
                    path: path.display().to_string(),
                })
            }
        };
        let stored: StoredSession =
            serde_json::from_str(&contents).context(ParsingJsonSnafu {
                path: path.display().to_string(),
            })?;
        let phase = parse_phase(&stored.phase)?;
        Ok(SessionContext::from_parts(
            stored.producer_id,
            stored.field_index,
            phase,
        ))
    }

    pub fn save(&self, token: &str, ctx: &SessionContext) -> IntakeResult<()> {
        fs::create_dir_all(&self.dir).context(SessionIoSnafu {
            path: self.dir.display().to_string(),
        })?;
        let stored = StoredSession {
            producer_id: ctx.producer_id().map(str::to_string),
            field_index: ctx.field_index(),
            phase: phase_tag(ctx.phase()).to_string(),
        };
        let body = serde_json::to_string_pretty(&stored)
            .whatever_context("serializing the session context")?;
        let path = self.session_path(token);
        fs::write(&path, body).context(SessionIoSnafu {
            path: path.display().to_string(),
        })?;
        Ok(())
    }

    /// Discards the session entirely — the "clear form" action. There is
    /// no partial rewind.
    pub fn clear(&self, token: &str) -> IntakeResult<()> {
        if !valid_token(token) {
            return UnknownSessionSnafu { token }.fail();
        }
        let path = self.session_path(token);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("SessionDir: cleared session {}", token);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => UnknownSessionSnafu { token }.fail(),
            Err(e) => Err(e).context(SessionIoSnafu {
                path: path.display().to_string(),
            }),
        }
    }
}

// Tokens only ever contain alphanumerics; anything else never names a
// session and must not reach the filesystem.
fn valid_token(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_alphanumeric())
}

fn phase_tag(phase: SessionPhase) -> &'static str {
    match phase {
        SessionPhase::ProducerPending => "producer_pending",
        SessionPhase::FieldEntry => "field_entry",
        SessionPhase::Done => "done",
    }
}

fn parse_phase(tag: &str) -> IntakeResult<SessionPhase> {
    match tag {
        "producer_pending" => Ok(SessionPhase::ProducerPending),
        "field_entry" => Ok(SessionPhase::FieldEntry),
        "done" => Ok(SessionPhase::Done),
        x => whatever!("unknown session phase {:?}", x),
    }
}
