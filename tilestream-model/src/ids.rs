use std::fmt;

use crate::tile::{TileCoords3D, TileDescriptor};

/// Opaque identifier of a source image as understood by the metadata
/// boundary.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ImageId(String);

impl ImageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ImageId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ImageId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ImageId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

const Y_BITS: u64 = 28;
const X_BITS: u64 = 28;
const Z_BITS: u64 = 8;

const Y_SHIFT: u64 = 0;
const X_SHIFT: u64 = Y_BITS;
const Z_SHIFT: u64 = Y_BITS + X_BITS;

const Y_MASK: u64 = (1 << Y_BITS) - 1;
const X_MASK: u64 = (1 << X_BITS) - 1;
const Z_MASK: u64 = (1 << Z_BITS) - 1;

/// Largest tile index representable on either axis.
pub const TILE_ID_MAX_INDEX: u32 = X_MASK as u32;

/// Deterministic identity of a tile, shared by the tile cache, the in-flight
/// request table and the rendered-set bookkeeping.
///
/// Ordering follows `(z, x, y)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TileId(u64);

impl TileId {
    /// TileId:
    /// | z (8) | x (28) | y (28) |
    /// 63   56 55    28 27     0
    pub const fn new(z: u32, x: u32, y: u32) -> Self {
        debug_assert!(z as u64 <= Z_MASK, "tile level out of range");
        debug_assert!(x as u64 <= X_MASK, "tile x index out of range");
        debug_assert!(y as u64 <= Y_MASK, "tile y index out of range");
        TileId(
            (z as u64 & Z_MASK) << Z_SHIFT
                | (x as u64 & X_MASK) << X_SHIFT
                | (y as u64 & Y_MASK) << Y_SHIFT,
        )
    }

    pub const fn z(self) -> u32 {
        ((self.0 >> Z_SHIFT) & Z_MASK) as u32
    }

    pub const fn x(self) -> u32 {
        ((self.0 >> X_SHIFT) & X_MASK) as u32
    }

    pub const fn y(self) -> u32 {
        ((self.0 >> Y_SHIFT) & Y_MASK) as u32
    }

    pub const fn coords(self) -> TileCoords3D {
        TileCoords3D::new(self.x(), self.y(), self.z())
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl From<TileCoords3D> for TileId {
    fn from(value: TileCoords3D) -> Self {
        TileId::new(value.z, value.x, value.y)
    }
}

impl From<&TileDescriptor> for TileId {
    fn from(value: &TileDescriptor) -> Self {
        TileId::new(value.z, value.x, value.y)
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.z(), self.x(), self.y())
    }
}
