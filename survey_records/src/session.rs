use std::error::Error;
use std::fmt::Display;

use crate::schema::MISSING_PRODUCER_ID;

/// Where a submission session currently stands.
///
/// The producer step is irreversible: there is no transition back to
/// [SessionPhase::ProducerPending], only a full reset of the context.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum SessionPhase {
    /// The producer form has not been submitted yet.
    ProducerPending,
    /// The producer row is on file; field forms are being collected.
    FieldEntry,
    /// The respondent pressed finish. No further submissions.
    Done,
}

/// Explicit per-session state, passed to every handler and persisted by
/// the caller between interactions. Replaces the ambient globals of the
/// earlier design.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SessionContext {
    producer_id: Option<String>,
    field_index: u32,
    phase: SessionPhase,
}

impl Default for SessionContext {
    fn default() -> Self {
        SessionContext::new()
    }
}

impl SessionContext {
    pub fn new() -> SessionContext {
        SessionContext {
            producer_id: None,
            field_index: 1,
            phase: SessionPhase::ProducerPending,
        }
    }

    /// Rebuilds a context from persisted parts.
    pub fn from_parts(
        producer_id: Option<String>,
        field_index: u32,
        phase: SessionPhase,
    ) -> SessionContext {
        SessionContext {
            producer_id,
            field_index,
            phase,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn producer_id(&self) -> Option<&str> {
        self.producer_id.as_deref()
    }

    /// The producer id to stamp on a field record: the resolved id, or the
    /// sentinel when the producer step never ran in this session.
    pub fn producer_id_or_sentinel(&self) -> &str {
        self.producer_id.as_deref().unwrap_or(MISSING_PRODUCER_ID)
    }

    /// The number the next submitted field will carry.
    pub fn field_index(&self) -> u32 {
        self.field_index
    }

    /// Records the producer submission and moves on to field entry.
    pub fn record_producer(&mut self, producer_id: String) -> Result<(), SequenceError> {
        match self.phase {
            SessionPhase::ProducerPending => {
                self.producer_id = Some(producer_id);
                self.phase = SessionPhase::FieldEntry;
                Ok(())
            }
            SessionPhase::FieldEntry => Err(SequenceError::ProducerAlreadySubmitted),
            SessionPhase::Done => Err(SequenceError::SessionComplete),
        }
    }

    /// Claims the number for the field being submitted and advances the
    /// counter. Numbers are session-local, start at 1 and never repeat —
    /// the remote table is not consulted.
    ///
    /// Field submission is allowed before the producer step has run: the
    /// record is then attributed to the sentinel id, not rejected.
    pub fn take_field_number(&mut self) -> Result<u32, SequenceError> {
        if self.phase == SessionPhase::Done {
            return Err(SequenceError::SessionComplete);
        }
        let number = self.field_index;
        self.field_index += 1;
        Ok(number)
    }

    /// Marks the session finished.
    pub fn finish(&mut self) -> Result<(), SequenceError> {
        if self.phase == SessionPhase::Done {
            return Err(SequenceError::SessionComplete);
        }
        self.phase = SessionPhase::Done;
        Ok(())
    }
}

/// A submission arrived in a phase that does not accept it.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum SequenceError {
    ProducerAlreadySubmitted,
    SessionComplete,
}

impl Error for SequenceError {}

impl Display for SequenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SequenceError::ProducerAlreadySubmitted => {
                write!(f, "the producer form was already submitted in this session")
            }
            SequenceError::SessionComplete => {
                write!(f, "the session is finished and accepts no further submissions")
            }
        }
    }
}
