use std::fs;

use serde::{Deserialize, Serialize};

use crate::intake::*;

/// Which store implementation to talk to, and how.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// "dropbox" or "directory".
    pub provider: String,
    /// Root directory for the "directory" provider.
    #[serde(rename = "localRoot", default)]
    pub local_root: Option<String>,
    #[serde(rename = "appKey", default)]
    pub app_key: Option<String>,
    #[serde(rename = "appSecret", default)]
    pub app_secret: Option<String>,
    #[serde(rename = "refreshToken", default)]
    pub refresh_token: Option<String>,
}

/// The intake configuration: store provider plus the logical paths every
/// deployment uses. Paths are set once here and used throughout.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct IntakeConfig {
    pub store: StoreConfig,
    #[serde(rename = "producerTablePath", default = "default_producer_table_path")]
    pub producer_table_path: String,
    #[serde(rename = "fieldTablePath", default = "default_field_table_path")]
    pub field_table_path: String,
    #[serde(rename = "soilTestFolder", default = "default_soil_test_folder")]
    pub soil_test_folder: String,
    #[serde(rename = "sessionDir", default = "default_session_dir")]
    pub session_dir: String,
}

fn default_producer_table_path() -> String {
    "/survey/producers_info.csv".to_string()
}

fn default_field_table_path() -> String {
    "/survey/fields_info.csv".to_string()
}

fn default_soil_test_folder() -> String {
    "/survey/soiltest_uploads".to_string()
}

fn default_session_dir() -> String {
    "sessions".to_string()
}

pub fn read_intake_config(path: &str) -> IntakeResult<IntakeConfig> {
    let contents = fs::read_to_string(path).context(ReadingFileSnafu { path })?;
    let config: IntakeConfig =
        serde_json::from_str(&contents).context(ParsingJsonSnafu { path })?;
    debug!("read_intake_config: {:?}", config);
    Ok(config)
}
