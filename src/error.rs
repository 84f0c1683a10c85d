//! Crate-wide error taxonomy (spec §7).
//!
//! Every component boundary returns `Result<_, PipelineError>` (or a narrower error that
//! converts into it) so that no single poisoned operation needs a bespoke error type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// HTTP/network failure talking to the eCFR or Federal Register APIs. Retryable at the
    /// job level; the dispatcher marks the job FAILED and leaves requeueing to the operator.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Malformed XML. Job-level failure; never surfaces as a partial/empty success.
    #[error("XML parse error: {0}")]
    Parse(String),

    /// Missing expected JSON field or an uncoercible value (e.g. a non-numeric title).
    /// Callers log a warning and skip the offending element rather than failing the batch.
    #[error("data error: {0}")]
    Data(String),

    /// Database failure. The surrounding transaction is rolled back by the caller.
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    /// Missing env var or unreadable/corrupt on-disk map file. Fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO failure outside of the above (e.g. writing the transformation map to disk).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
