use thiserror::Error;

/// Reasons a report is refused. A stale report is not an error; see `IngestOutcome`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    #[error("missing node_id")]
    MissingIdentity,
    #[error("invalid value for {field}")]
    InvalidReport { field: &'static str },
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("fleet file io: {0}")]
    Io(#[from] std::io::Error),
    #[error("fleet file format: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported fleet file version {0}")]
    UnsupportedVersion(u32),
}
