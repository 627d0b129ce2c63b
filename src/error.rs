use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong building and running a pileup job.
#[derive(Debug, Error)]
pub enum PileupError {
    #[error("required tool `{0}` is missing or reports an unsupported version: {1}")]
    ToolMissing(String, String),

    #[error("{0}")]
    ArgRejected(String),

    #[error("failed to set up FIFO at {path}: {source}")]
    FifoSetup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("external process `{0}` exited with status {1}")]
    SubprocessFailed(String, i32),

    #[error("I/O failure: {0}")]
    IoFailure(String),

    #[error("failed to read alignment records: {0}")]
    BamReadFailure(String),
}

impl From<std::io::Error> for PileupError {
    fn from(e: std::io::Error) -> Self {
        PileupError::IoFailure(e.to_string())
    }
}
