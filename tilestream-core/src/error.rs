use thiserror::Error;
use tilestream_contracts::SourceError;
use tilestream_model::{ImageSize, TileId};

/// Errors produced by the tile cache, the fetcher and the streamer.
///
/// Cloneable so a single pending catalog request can hand the same failure
/// to every tile waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TileError {
    #[error("Invalid image size: {0}")]
    InvalidSize(ImageSize),

    #[error("Tile {0} is already stored")]
    DuplicateWrite(TileId),

    #[error("Tile {0} already has a registered url")]
    DuplicateUrl(TileId),

    #[error("Tile cache has been disposed")]
    Disposed,

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("No descriptor for tile {0}")]
    MissingDescriptor(TileId),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Cancelled")]
    Cancelled,
}

impl TileError {
    /// Superseded work; expected and never worth more than a trace line.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TileError::Cancelled)
    }
}

impl From<SourceError> for TileError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Cancelled => TileError::Cancelled,
            other => TileError::Fetch(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, TileError>;
