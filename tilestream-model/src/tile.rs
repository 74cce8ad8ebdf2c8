use std::fmt;

/// Grid index of a tile at an implied level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TileCoords2D {
    pub x: u32,
    pub y: u32,
}

impl TileCoords2D {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Qualify the index with the level it was computed at.
    pub const fn at_level(self, z: u32) -> TileCoords3D {
        TileCoords3D {
            x: self.x,
            y: self.y,
            z,
        }
    }
}

/// Fully-qualified tile: grid index plus the level it belongs to.
///
/// Required whenever tiles from different levels are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TileCoords3D {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl TileCoords3D {
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    pub const fn xy(self) -> TileCoords2D {
        TileCoords2D {
            x: self.x,
            y: self.y,
        }
    }
}

impl fmt::Display for TileCoords3D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Native-pixel footprint of a tile, clipped to the image bounds.
///
/// Tiles past the far edges of the image clip to zero width or height;
/// such rectangles are valid and simply cover no pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TilePixelRect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl TilePixelRect {
    pub const fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    pub const fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }

    /// Half-open containment test for a native pixel.
    pub const fn contains(&self, px: u32, py: u32) -> bool {
        px >= self.x
            && py >= self.y
            && (px - self.x) < self.w
            && (py - self.y) < self.h
    }
}

/// Fetchable wire identity of one tile.
///
/// This is the only structured data contract the streaming engine exchanges
/// with its metadata boundary: `{ "url": string, "x": int, "y": int, "z": int }`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TileDescriptor {
    pub url: String,
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl TileDescriptor {
    pub fn new(url: impl Into<String>, coords: TileCoords3D) -> Self {
        Self {
            url: url.into(),
            x: coords.x,
            y: coords.y,
            z: coords.z,
        }
    }

    pub const fn coords(&self) -> TileCoords3D {
        TileCoords3D {
            x: self.x,
            y: self.y,
            z: self.z,
        }
    }
}
