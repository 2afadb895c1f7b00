use log::{debug, info, warn};

use snafu::{prelude::*, Snafu};
use survey_records::*;

use crate::args::{Action, Args};
use crate::intake::answers::{FieldAnswers, ProducerAnswers};
use crate::intake::config_reader::{IntakeConfig, StoreConfig};
use crate::intake::session_store::SessionDir;
use crate::intake::store::{DirStore, RemoteStore, StoreError, WriteMode};
use crate::intake::store_dropbox::{DropboxCredentials, DropboxStore};

pub mod answers;
pub mod config_reader;
pub mod io_table;
pub mod session_store;
pub mod store;
pub mod store_dropbox;
pub mod uploads;

#[derive(Debug, Snafu)]
pub enum IntakeError {
    #[snafu(display("Error reading file {path}"))]
    ReadingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON document {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Invalid date in {field}: {value:?} (expected YYYY-MM-DD)"))]
    InvalidDate { field: String, value: String },
    #[snafu(display("The submitted record does not fit the schema"))]
    Schema { source: SchemaError },
    #[snafu(display("Submission out of sequence"))]
    Sequence { source: SequenceError },
    #[snafu(display("Unknown session {token}"))]
    UnknownSession { token: String },
    #[snafu(display("Session storage failure on {path}"))]
    SessionIo {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error serializing the table"))]
    CsvSerialize { source: csv::Error },
    #[snafu(display("Error flushing the table buffer"))]
    BufferFlush { source: std::io::Error },
    #[snafu(display("Store failure at {path}"))]
    Store { source: StoreError, path: String },
    #[snafu(display("Could not connect to the store"))]
    StoreConnect { source: StoreError },
    #[snafu(display("Gave up writing {path} after {attempts} conflicting writes"))]
    WriteContention { path: String, attempts: u32 },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type IntakeResult<T> = Result<T, IntakeError>;

/// How many times a conflicting conditional write is retried before the
/// submission is surfaced to the respondent as a failure.
const MAX_WRITE_ATTEMPTS: u32 = 3;

pub fn run_action(args: &Args) -> IntakeResult<()> {
    let config = config_reader::read_intake_config(&args.config)?;
    info!("config: {:?}", config);
    let store = open_store(&config.store)?;

    match &args.action {
        Action::SubmitProducer { answers, session } => {
            let parsed = answers::read_producer_answers(answers)?;
            let outcome =
                submit_producer(&config, store.as_ref(), parsed, session.as_deref())?;
            println!("Submission successful: continue to the field section");
            println!("session: {}", outcome.token);
            println!("producer id: {}", outcome.producer_id);
            println!("{} producer row(s) on file", outcome.rows_on_file);
        }
        Action::SubmitField {
            answers,
            session,
            finish,
        } => {
            let parsed = answers::read_field_answers(answers)?;
            let outcome = submit_field(&config, store.as_ref(), parsed, session, *finish)?;
            if outcome.finished {
                println!("Submission successful: you may close the window");
            } else {
                println!(
                    "Field {} submitted: add another field or finish",
                    outcome.field_number
                );
            }
            println!("{} field row(s) on file", outcome.rows_on_file);
        }
        Action::UploadSoilTests { session, files } => {
            match upload_soil_tests(&config, store.as_ref(), session, files)? {
                UploadOutcome::Stored { count } => {
                    println!("Uploaded {} soil test file(s)", count)
                }
                UploadOutcome::MissingProducerId => {
                    println!("Producer id is missing. Cannot save uploaded files.")
                }
            }
        }
        Action::ClearSession { session } => {
            clear_session(&config, session)?;
            println!("Session {} cleared", session);
        }
    }
    Ok(())
}

fn open_store(config: &StoreConfig) -> IntakeResult<Box<dyn RemoteStore>> {
    match config.provider.as_str() {
        "directory" => {
            let root = match config.local_root.clone() {
                Some(root) => root,
                None => whatever!("the directory provider needs a localRoot"),
            };
            Ok(Box::new(DirStore::new(root)))
        }
        "dropbox" => {
            let credentials = dropbox_credentials(config)?;
            let store = DropboxStore::connect(&credentials).context(StoreConnectSnafu)?;
            Ok(Box::new(store))
        }
        x => whatever!("Store provider not implemented {:?}", x),
    }
}

fn dropbox_credentials(config: &StoreConfig) -> IntakeResult<DropboxCredentials> {
    match (
        config.app_key.clone(),
        config.app_secret.clone(),
        config.refresh_token.clone(),
    ) {
        (Some(app_key), Some(app_secret), Some(refresh_token)) => Ok(DropboxCredentials {
            app_key,
            app_secret,
            refresh_token,
        }),
        _ => whatever!("the dropbox provider needs appKey, appSecret and refreshToken"),
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ProducerOutcome {
    pub token: String,
    pub producer_id: String,
    pub rows_on_file: usize,
}

fn submit_producer(
    config: &IntakeConfig,
    store: &dyn RemoteStore,
    answers: ProducerAnswers,
    session: Option<&str>,
) -> IntakeResult<ProducerOutcome> {
    let sessions = SessionDir::new(&config.session_dir);
    let (token, mut ctx) = match session {
        Some(token) => (token.to_string(), sessions.load(token)?),
        None => sessions.create(&mut rand::thread_rng())?,
    };

    let expected = ProducerRecord::columns();
    let (base, _) = fetch_table_or_empty(store, &config.producer_table_path, &expected);
    let producer_id = resolve_producer_id(
        &base,
        &answers.first_name,
        &answers.last_name,
        &mut rand::thread_rng(),
    );
    ctx.record_producer(producer_id.clone()).context(SequenceSnafu)?;

    let record = answers.into_record(producer_id.clone()).to_record();
    let merged = append_with_retry(store, &config.producer_table_path, &expected, &record)?;
    sessions.save(&token, &ctx)?;
    info!(
        "submit_producer: session {} -> producer {}",
        token, producer_id
    );
    Ok(ProducerOutcome {
        token,
        producer_id,
        rows_on_file: merged.num_rows(),
    })
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct FieldOutcome {
    pub field_number: u32,
    pub rows_on_file: usize,
    pub finished: bool,
}

fn submit_field(
    config: &IntakeConfig,
    store: &dyn RemoteStore,
    answers: FieldAnswers,
    token: &str,
    finish: bool,
) -> IntakeResult<FieldOutcome> {
    let sessions = SessionDir::new(&config.session_dir);
    let mut ctx = sessions.load(token)?;
    let field_number = ctx.take_field_number().context(SequenceSnafu)?;
    if ctx.producer_id().is_none() {
        warn!(
            "submit_field: session {} has no producer submission; the row will be unattributed",
            token
        );
    }

    let field = answers.into_record(ctx.producer_id_or_sentinel(), field_number)?;
    field.validate().context(SchemaSnafu)?;
    let record = field.to_record();

    let expected = FieldRecord::columns();
    let merged = append_with_retry(store, &config.field_table_path, &expected, &record)?;
    if finish {
        ctx.finish().context(SequenceSnafu)?;
    }
    sessions.save(token, &ctx)?;
    info!(
        "submit_field: session {} wrote field {} (finish: {})",
        token, field_number, finish
    );
    Ok(FieldOutcome {
        field_number,
        rows_on_file: merged.num_rows(),
        finished: finish,
    })
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum UploadOutcome {
    Stored { count: usize },
    MissingProducerId,
}

fn upload_soil_tests(
    config: &IntakeConfig,
    store: &dyn RemoteStore,
    token: &str,
    files: &[String],
) -> IntakeResult<UploadOutcome> {
    let sessions = SessionDir::new(&config.session_dir);
    let ctx = sessions.load(token)?;
    let producer_id = match ctx.producer_id() {
        Some(id) => id.to_string(),
        None => {
            warn!(
                "upload_soil_tests: session {} has no producer id, refusing the upload",
                token
            );
            return Ok(UploadOutcome::MissingProducerId);
        }
    };
    let count = uploads::store_soil_tests(
        store,
        &config.soil_test_folder,
        &producer_id,
        ctx.field_index(),
        files,
    )?;
    Ok(UploadOutcome::Stored { count })
}

fn clear_session(config: &IntakeConfig, token: &str) -> IntakeResult<()> {
    SessionDir::new(&config.session_dir).clear(token)
}

/// Reads the current table at `path`, degrading to the empty table typed
/// with `expected_columns` when the object is missing or the read fails.
/// A respondent is never blocked by a storage read glitch; the cost (a
/// possible overwrite of rows that were unreachable at read time) is the
/// documented fail-open policy.
fn fetch_table_or_empty(
    store: &dyn RemoteStore,
    path: &str,
    expected_columns: &[String],
) -> (Table, Option<String>) {
    match store.fetch(path) {
        Ok(Some(object)) => {
            let table = io_table::decode_table(&object.bytes, expected_columns);
            (table, Some(object.revision))
        }
        Ok(None) => {
            debug!("fetch_table_or_empty: no object yet at {}", path);
            (Table::empty(expected_columns), None)
        }
        Err(e) => {
            warn!(
                "fetch_table_or_empty: read failure on {}: {} (continuing with an empty table)",
                path, e
            );
            (Table::empty(expected_columns), None)
        }
    }
}

/// Merges the record into the remote table and writes the result back.
///
/// When the read surfaced a revision token the write is conditional; a
/// conflicting writer triggers a re-read/re-merge, bounded by
/// [MAX_WRITE_ATTEMPTS]. Write failures other than a conflict abort the
/// submission and surface to the respondent.
fn append_with_retry(
    store: &dyn RemoteStore,
    path: &str,
    expected_columns: &[String],
    record: &Record,
) -> IntakeResult<Table> {
    for attempt in 1..=MAX_WRITE_ATTEMPTS {
        let (base, revision) = fetch_table_or_empty(store, path, expected_columns);
        let merged = append_record(&base, record);
        let bytes = io_table::encode_table(&merged)?;
        let mode = match revision {
            Some(rev) => WriteMode::Update(rev),
            None => WriteMode::Overwrite,
        };
        match store.put(path, &bytes, mode) {
            Ok(()) => return Ok(merged),
            Err(StoreError::Conflict {}) => {
                info!(
                    "append_with_retry: write conflict on {} (attempt {} of {})",
                    path, attempt, MAX_WRITE_ATTEMPTS
                );
            }
            Err(source) => {
                return Err(IntakeError::Store {
                    source,
                    path: path.to_string(),
                })
            }
        }
    }
    WriteContentionSnafu {
        path,
        attempts: MAX_WRITE_ATTEMPTS,
    }
    .fail()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn workspace(tag: &str) -> (IntakeConfig, DirStore, PathBuf) {
        let mut root = std::env::temp_dir();
        root.push(format!("agsurvey_{}_{}", tag, std::process::id()));
        let _ = std::fs::remove_dir_all(&root);
        std::fs::create_dir_all(&root).unwrap();
        let remote = root.join("remote");
        let config = IntakeConfig {
            store: StoreConfig {
                provider: "directory".to_string(),
                local_root: Some(remote.display().to_string()),
                app_key: None,
                app_secret: None,
                refresh_token: None,
            },
            producer_table_path: "/survey/producers_info.csv".to_string(),
            field_table_path: "/survey/fields_info.csv".to_string(),
            soil_test_folder: "/survey/soiltest_uploads".to_string(),
            session_dir: root.join("sessions").display().to_string(),
        };
        (config, DirStore::new(remote), root)
    }

    fn producer_answers(first: &str, last: &str) -> ProducerAnswers {
        ProducerAnswers {
            first_name: first.to_string(),
            last_name: last.to_string(),
            ..ProducerAnswers::default()
        }
    }

    #[test]
    fn producer_id_is_reused_for_same_name() {
        let (config, store, _root) = workspace("producer_reuse");
        let first = submit_producer(&config, &store, producer_answers("Jane", "Doe"), None)
            .unwrap();
        let second = submit_producer(&config, &store, producer_answers("jane", "DOE"), None)
            .unwrap();
        assert_eq!(first.producer_id, second.producer_id);
        assert_eq!(first.producer_id.len(), PRODUCER_ID_LEN);
        assert_eq!(second.rows_on_file, 2);

        let (table, _) =
            fetch_table_or_empty(&store, &config.producer_table_path, &ProducerRecord::columns());
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.cell(0, "producer_id"), table.cell(1, "producer_id"));
    }

    #[test]
    fn distinct_names_get_distinct_ids() {
        let (config, store, _root) = workspace("producer_distinct");
        let a = submit_producer(&config, &store, producer_answers("Jane", "Doe"), None).unwrap();
        let b = submit_producer(&config, &store, producer_answers("John", "Roe"), None).unwrap();
        assert_ne!(a.producer_id, b.producer_id);
    }

    #[test]
    fn field_session_numbers_rows_sequentially() {
        let (config, store, _root) = workspace("field_sequence");
        let producer =
            submit_producer(&config, &store, producer_answers("Jane", "Doe"), None).unwrap();

        let one = submit_field(
            &config,
            &store,
            FieldAnswers::default(),
            &producer.token,
            false,
        )
        .unwrap();
        let two = submit_field(
            &config,
            &store,
            FieldAnswers::default(),
            &producer.token,
            true,
        )
        .unwrap();
        assert_eq!(one.field_number, 1);
        assert_eq!(two.field_number, 2);
        assert!(two.finished);

        let (table, _) =
            fetch_table_or_empty(&store, &config.field_table_path, &FieldRecord::columns());
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.cell(0, "field_number"), Some("1"));
        assert_eq!(table.cell(1, "field_number"), Some("2"));
        assert_eq!(table.cell(0, "producer_id"), Some(producer.producer_id.as_str()));
        assert_eq!(table.cell(1, "producer_id"), Some(producer.producer_id.as_str()));
    }

    #[test]
    fn finished_session_rejects_more_fields() {
        let (config, store, _root) = workspace("field_done");
        let producer =
            submit_producer(&config, &store, producer_answers("Jane", "Doe"), None).unwrap();
        submit_field(&config, &store, FieldAnswers::default(), &producer.token, true).unwrap();
        let res = submit_field(
            &config,
            &store,
            FieldAnswers::default(),
            &producer.token,
            false,
        );
        assert!(matches!(res, Err(IntakeError::Sequence { .. })));
    }

    #[test]
    fn unattributed_field_carries_sentinel() {
        let (config, store, _root) = workspace("field_sentinel");
        let sessions = SessionDir::new(&config.session_dir);
        let (token, _) = sessions.create(&mut rand::thread_rng()).unwrap();

        submit_field(&config, &store, FieldAnswers::default(), &token, true).unwrap();
        let (table, _) =
            fetch_table_or_empty(&store, &config.field_table_path, &FieldRecord::columns());
        assert_eq!(table.cell(0, "producer_id"), Some(MISSING_PRODUCER_ID));
    }

    #[test]
    fn upload_refused_without_producer() {
        let (config, store, _root) = workspace("upload_refused");
        let sessions = SessionDir::new(&config.session_dir);
        let (token, _) = sessions.create(&mut rand::thread_rng()).unwrap();
        let outcome =
            upload_soil_tests(&config, &store, &token, &["report.pdf".to_string()]).unwrap();
        assert_eq!(outcome, UploadOutcome::MissingProducerId);
    }

    #[test]
    fn uploads_are_renamed_and_stored() {
        let (config, store, root) = workspace("upload_stored");
        let producer =
            submit_producer(&config, &store, producer_answers("Jane", "Doe"), None).unwrap();

        let local = root.join("soil_report.pdf");
        std::fs::write(&local, b"%PDF-1.4 report").unwrap();
        let outcome = upload_soil_tests(
            &config,
            &store,
            &producer.token,
            &[local.display().to_string()],
        )
        .unwrap();
        assert_eq!(outcome, UploadOutcome::Stored { count: 1 });

        let stored_path = format!(
            "{}/soiltest1_{}_field1.pdf",
            config.soil_test_folder, producer.producer_id
        );
        let fetched = store.fetch(&stored_path).unwrap();
        assert!(fetched.is_some());
    }

    #[test]
    fn sequential_appends_keep_all_rows() {
        let (config, store, _root) = workspace("append_rows");
        let expected = ProducerRecord::columns();
        let mut rec1 = Record::new();
        rec1.push("producer_id", "111111".to_string());
        let mut rec2 = Record::new();
        rec2.push("producer_id", "222222".to_string());

        append_with_retry(&store, &config.producer_table_path, &expected, &rec1).unwrap();
        let merged =
            append_with_retry(&store, &config.producer_table_path, &expected, &rec2).unwrap();
        assert_eq!(merged.num_rows(), 2);
        assert_eq!(merged.cell(0, "producer_id"), Some("111111"));
        assert_eq!(merged.cell(1, "producer_id"), Some("222222"));
    }

    #[test]
    fn clear_session_discards_state() {
        let (config, store, _root) = workspace("clear_session");
        let producer =
            submit_producer(&config, &store, producer_answers("Jane", "Doe"), None).unwrap();
        clear_session(&config, &producer.token).unwrap();
        let res = submit_field(
            &config,
            &store,
            FieldAnswers::default(),
            &producer.token,
            false,
        );
        assert!(matches!(res, Err(IntakeError::UnknownSession { .. })));
    }
}
