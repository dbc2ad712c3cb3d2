use thiserror::Error;

/// Failure taxonomy for a sync run.
///
/// `MalformedIdentifier` is always recovered locally (the record is routed to
/// the conservative special/other bucket). `SourceUnavailable` aborts the run.
/// `SchemaMismatch` is self-healed by adding the missing column. Unmatched
/// price rows are aggregated in the run report rather than raised.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("malformed card identifier {0:?}: no two-letter language token")]
    MalformedIdentifier(String),

    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::SourceUnavailable(err.to_string())
    }
}
