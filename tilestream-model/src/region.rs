/// Axis-aligned box in basic coordinates (`[0, 1] x [0, 1]` over the full
/// image, y pointing down).
///
/// `min_x > max_x` is meaningful: the box straddles the horizontal seam of a
/// wrapping (equirectangular) image.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BasicBBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BasicBBox {
    pub const FULL: BasicBBox = BasicBBox {
        min_x: 0.0,
        min_y: 0.0,
        max_x: 1.0,
        max_y: 1.0,
    };

    pub const fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub const fn top_left(&self) -> [f64; 2] {
        [self.min_x, self.min_y]
    }

    pub const fn bottom_right(&self) -> [f64; 2] {
        [self.max_x, self.max_y]
    }

    /// `true` when the box crosses the x = 1 / x = 0 seam.
    pub fn wraps_horizontally(&self) -> bool {
        self.min_x > self.max_x
    }
}

/// The currently visible portion of one image.
///
/// `pixel_width` and `pixel_height` are the basic-coordinate extent of one
/// viewport pixel, so `1 / pixel_width` is the width in screen pixels the
/// whole image would occupy at the current zoom.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegionOfInterest {
    pub bbox: BasicBBox,
    pub pixel_width: f64,
    pub pixel_height: f64,
}

impl RegionOfInterest {
    pub const fn new(bbox: BasicBBox, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            bbox,
            pixel_width,
            pixel_height,
        }
    }

    /// ROI over the whole image for a viewport of `width x height` pixels
    /// that shows it edge to edge.
    pub fn full_view(width: f64, height: f64) -> Self {
        Self::new(BasicBBox::FULL, 1.0 / width, 1.0 / height)
    }

    /// Pixel extents must be finite and strictly positive to resolve a
    /// level.
    pub fn has_valid_pixel_extent(&self) -> bool {
        self.pixel_width.is_finite()
            && self.pixel_height.is_finite()
            && self.pixel_width > 0.0
            && self.pixel_height > 0.0
    }

    /// Screen-pixel size the whole image would have at this zoom. Not
    /// rounded: a fractional pixel past a power of two still needs the finer
    /// level.
    pub fn virtual_size(&self) -> (f64, f64) {
        (1.0 / self.pixel_width, 1.0 / self.pixel_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn virtual_size_inverts_pixel_extent() {
        let roi = RegionOfInterest::full_view(2048.0, 1024.0);
        assert_eq!(roi.virtual_size(), (2048.0, 1024.0));
    }

    #[test]
    fn virtual_size_keeps_fractional_pixels() {
        let roi = RegionOfInterest::new(BasicBBox::FULL, 1.0 / 1024.4, 1.0 / 512.2);
        let (w, h) = roi.virtual_size();
        assert!((w - 1024.4).abs() < 1e-9, "{w}");
        assert!((h - 512.2).abs() < 1e-9, "{h}");
    }

    #[test]
    fn degenerate_pixel_extents_are_rejected() {
        let bbox = BasicBBox::FULL;
        assert!(!RegionOfInterest::new(bbox, 0.0, 0.1).has_valid_pixel_extent());
        assert!(!RegionOfInterest::new(bbox, f64::NAN, 0.1).has_valid_pixel_extent());
        assert!(!RegionOfInterest::new(bbox, 0.1, -1.0).has_valid_pixel_extent());
        assert!(RegionOfInterest::new(bbox, 0.1, 0.1).has_valid_pixel_extent());
    }

    #[test]
    fn seam_crossing_boxes_are_detected() {
        assert!(BasicBBox::new(0.9, 0.2, 0.1, 0.6).wraps_horizontally());
        assert!(!BasicBBox::FULL.wraps_horizontally());
    }
}
