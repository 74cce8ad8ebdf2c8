use std::fmt;

/// Native pixel dimensions of one source image.
///
/// A size with a zero side is representable on purpose: callers receive
/// sizes from image metadata they do not control, and an invalid size
/// disables tiling instead of failing construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImageSize {
    pub w: u32,
    pub h: u32,
}

impl ImageSize {
    pub const fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }

    /// `true` when both sides are non-zero.
    pub const fn is_valid(self) -> bool {
        self.w > 0 && self.h > 0
    }

    /// Length of the longer side.
    pub const fn max_dimension(self) -> u32 {
        if self.w > self.h { self.w } else { self.h }
    }
}

impl From<(u32, u32)> for ImageSize {
    fn from(value: (u32, u32)) -> Self {
        Self::new(value.0, value.1)
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.w, self.h)
    }
}

/// Active and native level of an image pyramid.
///
/// `max` is the level at which one tile covers one tile-size block of the
/// image at 1:1 scale; `z` is the level currently being streamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PyramidLevel {
    pub z: u32,
    pub max: u32,
}

impl PyramidLevel {
    pub const fn new(z: u32, max: u32) -> Self {
        Self { z, max }
    }

    /// Same pyramid, different active level.
    pub const fn with_z(self, z: u32) -> Self {
        Self { z, max: self.max }
    }

    /// Signed distance from the native level (negative = coarser).
    pub const fn offset_from_native(self) -> i32 {
        self.z as i32 - self.max as i32
    }
}

impl fmt::Display for PyramidLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.z, self.max)
    }
}
