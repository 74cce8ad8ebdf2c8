//! Snapshot of the types surface used by the streamer and its hosts.
//! Prefer importing from this module instead of individual tree nodes when
//! wiring a renderer against the core crate.

pub use super::ids::{ImageId, TileId};
pub use super::region::{BasicBBox, RegionOfInterest};
pub use super::size::{ImageSize, PyramidLevel};
pub use super::tile::{
    TileCoords2D, TileCoords3D, TileDescriptor, TilePixelRect,
};
