// Dropbox-backed implementation of the remote store, talking to the
// content API over plain blocking HTTP.

use std::io::Read;
use std::time::Duration;

use base64::Engine;
use log::{debug, info};
use serde_json::json;
use serde_json::Value as JSValue;

use crate::intake::store::{FetchedObject, RemoteStore, StoreError, WriteMode};

const TOKEN_ENDPOINT: &str = "https://api.dropboxapi.com/oauth2/token";
const DOWNLOAD_ENDPOINT: &str = "https://content.dropboxapi.com/2/files/download";
const UPLOAD_ENDPOINT: &str = "https://content.dropboxapi.com/2/files/upload";

#[derive(Debug, Clone)]
pub struct DropboxCredentials {
    pub app_key: String,
    pub app_secret: String,
    pub refresh_token: String,
}

pub struct DropboxStore {
    agent: ureq::Agent,
    access_token: String,
}

impl DropboxStore {
    /// Exchanges the long-lived refresh token for a short-lived access
    /// token and returns a connected client. The exchange is a blocking
    /// call made once per process; the token is not cached beyond that.
    pub fn connect(credentials: &DropboxCredentials) -> Result<DropboxStore, StoreError> {
        let agent = build_http_agent();
        let access_token = refresh_access_token(&agent, credentials)?;
        info!("DropboxStore: credential exchange complete");
        Ok(DropboxStore {
            agent,
            access_token,
        })
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

fn build_http_agent() -> ureq::Agent {
    let timeout = Duration::from_secs(30);
    ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(10))
        .timeout_read(timeout)
        .timeout_write(timeout)
        .user_agent(concat!("agsurvey/", env!("CARGO_PKG_VERSION")))
        .build()
}

fn refresh_access_token(
    agent: &ureq::Agent,
    credentials: &DropboxCredentials,
) -> Result<String, StoreError> {
    let basic = base64::engine::general_purpose::STANDARD.encode(format!(
        "{}:{}",
        credentials.app_key, credentials.app_secret
    ));
    let response = agent
        .post(TOKEN_ENDPOINT)
        .set("Authorization", &format!("Basic {}", basic))
        .send_form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", credentials.refresh_token.as_str()),
        ])
        .map_err(credentials_error)?;
    let body: JSValue =
        serde_json::from_reader(response.into_reader()).map_err(|_| StoreError::Credentials {
            reason: "token response is not JSON".to_string(),
        })?;
    body["access_token"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| StoreError::Credentials {
            reason: "token response carries no access_token".to_string(),
        })
}

fn credentials_error(err: ureq::Error) -> StoreError {
    match err {
        ureq::Error::Status(status, _) => StoreError::Credentials {
            reason: format!("token endpoint returned HTTP {}", status),
        },
        ureq::Error::Transport(transport) => transport_error(transport),
    }
}

fn transport_error(transport: ureq::Transport) -> StoreError {
    StoreError::Transport {
        detail: format!("{:?} {}", transport.kind(), transport),
    }
}

impl RemoteStore for DropboxStore {
    fn fetch(&self, path: &str) -> Result<Option<FetchedObject>, StoreError> {
        let arg = json!({ "path": path }).to_string();
        let call = self
            .agent
            .post(DOWNLOAD_ENDPOINT)
            .set("Authorization", &self.bearer())
            .set("Dropbox-API-Arg", &arg)
            .call();
        match call {
            Ok(response) => {
                // The file metadata rides along in a response header; the
                // body is the raw content.
                let revision = response
                    .header("Dropbox-API-Result")
                    .and_then(|h| serde_json::from_str::<JSValue>(h).ok())
                    .and_then(|v| v["rev"].as_str().map(str::to_string))
                    .ok_or_else(|| StoreError::BadResponse {
                        reason: "download result carries no rev".to_string(),
                    })?;
                let mut bytes = Vec::new();
                response
                    .into_reader()
                    .read_to_end(&mut bytes)
                    .map_err(|e| StoreError::Io {
                        source: e,
                        path: path.to_string(),
                    })?;
                debug!(
                    "DropboxStore: fetched {} ({} bytes, rev {})",
                    path,
                    bytes.len(),
                    revision
                );
                Ok(Some(FetchedObject { bytes, revision }))
            }
            Err(ureq::Error::Status(409, response)) => {
                let detail = response.into_string().unwrap_or_default();
                if detail.contains("not_found") {
                    debug!("DropboxStore: no object at {}", path);
                    Ok(None)
                } else {
                    Err(StoreError::Http {
                        status: 409,
                        detail,
                    })
                }
            }
            Err(ureq::Error::Status(status, response)) => Err(StoreError::Http {
                status,
                detail: response.into_string().unwrap_or_default(),
            }),
            Err(ureq::Error::Transport(transport)) => Err(transport_error(transport)),
        }
    }

    fn put(&self, path: &str, bytes: &[u8], mode: WriteMode) -> Result<(), StoreError> {
        let mode_arg = match &mode {
            WriteMode::Overwrite => json!("overwrite"),
            WriteMode::Update(rev) => json!({ ".tag": "update", "update": rev }),
        };
        let arg = json!({
            "path": path,
            "mode": mode_arg,
            "autorename": false,
            "mute": true,
        })
        .to_string();
        let call = self
            .agent
            .post(UPLOAD_ENDPOINT)
            .set("Authorization", &self.bearer())
            .set("Dropbox-API-Arg", &arg)
            .set("Content-Type", "application/octet-stream")
            .send_bytes(bytes);
        match call {
            Ok(_) => {
                debug!("DropboxStore: wrote {} ({} bytes)", path, bytes.len());
                Ok(())
            }
            Err(ureq::Error::Status(409, response)) => {
                let detail = response.into_string().unwrap_or_default();
                if detail.contains("conflict") {
                    Err(StoreError::Conflict {})
                } else {
                    Err(StoreError::Http {
                        status: 409,
                        detail,
                    })
                }
            }
            Err(ureq::Error::Status(status, response)) => Err(StoreError::Http {
                status,
                detail: response.into_string().unwrap_or_default(),
            }),
            Err(ureq::Error::Transport(transport)) => Err(transport_error(transport)),
        }
    }
}
