use clap::{Parser, Subcommand};

/// Collection backend for a multi-step agricultural survey.
/// Form output arrives as JSON answer documents; submissions are appended
/// to CSV-backed tables in the configured remote store.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The intake configuration file (JSON): store provider,
    /// table paths, session directory. See the documentation for the format.
    #[clap(short, long, value_parser)]
    pub config: String,

    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub action: Action,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Action {
    /// Submit the producer form. Resolves (or creates) the producer id,
    /// appends the producer row and opens the field section.
    SubmitProducer {
        /// (file path) JSON document with the producer form answers.
        #[clap(short, long, value_parser)]
        answers: String,
        /// Session token from a previous invocation. A fresh session is
        /// created when not provided.
        #[clap(short, long, value_parser)]
        session: Option<String>,
    },
    /// Submit one field form ("add another field"). Pass --finish for the
    /// terminal submission.
    SubmitField {
        /// (file path) JSON document with the field form answers.
        #[clap(short, long, value_parser)]
        answers: String,
        /// Session token.
        #[clap(short, long, value_parser)]
        session: String,
        /// Close the session after this field.
        #[clap(long, takes_value = false)]
        finish: bool,
    },
    /// Upload soil test documents for the field currently being entered.
    UploadSoilTests {
        /// Session token.
        #[clap(short, long, value_parser)]
        session: String,
        /// Files to upload.
        #[clap(value_parser, required = true)]
        files: Vec<String>,
    },
    /// Discard a session entirely (the "clear form" action).
    ClearSession {
        /// Session token.
        #[clap(short, long, value_parser)]
        session: String,
    },
}
