use thiserror::Error;

/// Failures reported by catalog and byte sources.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {url}")]
    Status { status: u16, url: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),

    #[error("Cancelled")]
    Cancelled,
}

impl SourceError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SourceError::Cancelled)
    }
}

pub type SourceResult<T> = std::result::Result<T, SourceError>;
