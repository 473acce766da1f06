use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the trainer to its caller.
///
/// Decode anomalies (invalid UTF-8 in the corpus) and merge exhaustion are
/// not represented here: both are absorbed silently per the trainer's
/// error-handling policy and never reach the caller as an `Err`.
#[derive(Debug, Error)]
pub enum TrainError {
    #[error("failed to read input file {}: {source}", path.display())]
    InputUnavailable {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("failed to compile pre-tokenization regex: {0}")]
    Regex(#[from] fancy_regex::Error),
}

pub type Result<T> = std::result::Result<T, TrainError>;
