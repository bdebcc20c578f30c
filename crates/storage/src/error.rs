use std::path::PathBuf;

use dompet_core::TransactionId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Store file {path} is corrupted: {source}")]
    Corrupted {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Duplicate transaction id: {0}")]
    DuplicateTransactionId(TransactionId),
    #[error("Unknown corruption policy: '{0}' (expected 'fail' or 'degrade')")]
    UnknownPolicy(String),
}
