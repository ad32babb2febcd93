use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("precondition failed for key: {key}")]
    PreconditionFailed { key: String },

    #[error("state document was modified concurrently: {key}")]
    Conflict { key: String },

    #[error("unsupported state document version {found} (this build reads up to {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("S3 GetObject error: {0}")]
    GetObject(String),

    #[error("S3 PutObject error: {0}")]
    PutObject(String),
}
