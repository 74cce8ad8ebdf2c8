//! Core data model definitions shared across tilestream crates.
#![allow(missing_docs)]

pub mod ids;
pub mod prelude;
pub mod region;
pub mod size;
pub mod tile;

// Intentionally curated re-exports for downstream consumers.
pub use ids::{ImageId, TileId};
pub use region::{BasicBBox, RegionOfInterest};
pub use size::{ImageSize, PyramidLevel};
pub use tile::{TileCoords2D, TileCoords3D, TileDescriptor, TilePixelRect};
