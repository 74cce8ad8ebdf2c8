//! Trait surfaces for the boundaries the tile streaming engine consumes.
//!
//! The engine never talks to a network or a filesystem directly. A host
//! supplies one [`TileCatalogSource`] (metadata: which tiles exist at a level
//! and where they live) and one [`TileByteSource`] (transport: the encoded
//! bytes behind a descriptor URL). Timeouts, retries and authentication all
//! belong to the implementations of these traits.

pub mod error;
pub mod sources;

pub use error::{SourceError, SourceResult};
pub use sources::{TileByteSource, TileCatalogSource};

/// Frequently used imports for source implementations.
pub mod prelude {
    pub use super::error::{SourceError, SourceResult};
    pub use super::sources::{TileByteSource, TileCatalogSource};
    pub use tilestream_model::prelude::*;
    pub use tokio_util::sync::CancellationToken;
}
