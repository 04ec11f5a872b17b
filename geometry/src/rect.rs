use crate::GeometryError;

/// Values this close below zero are rounding noise, not a negative origin.
const ORIGIN_TOLERANCE: f64 = 1e-6;

/// Crop rectangle in buffer pixel space, before validation.
///
/// Coordinates may be fractional, negative or outside the frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropRect {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

/// Integer crop rectangle that fits inside its frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelRect {
    /// Left edge.
    pub left: u32,
    /// Top edge.
    pub top: u32,
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}

impl PixelRect {
    /// Create a rectangle.
    #[must_use]
    pub const fn new(left: u32, top: u32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Rectangle covering a whole `width` x `height` frame.
    #[must_use]
    pub const fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Exclusive right edge.
    #[must_use]
    pub const fn right(&self) -> u64 {
        self.left as u64 + self.width as u64
    }

    /// Exclusive bottom edge.
    #[must_use]
    pub const fn bottom(&self) -> u64 {
        self.top as u64 + self.height as u64
    }

    /// Whether the rectangle is non-empty and lies inside a `width` x `height` frame.
    #[must_use]
    pub const fn fits_within(&self, width: u32, height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && self.right() <= width as u64
            && self.bottom() <= height as u64
    }
}

impl CropRect {
    /// Convert to integer pixels inside a `bounds_width` x `bounds_height` frame.
    ///
    /// Coordinates are truncated toward zero, then the origin and the extent are
    /// snapped down to multiples of `align` (pass `2` for chroma-subsampled
    /// frames). Nothing is clamped.
    ///
    /// # Errors
    /// Returns [`GeometryError::InvalidCropGeometry`] if the rectangle has a
    /// negative origin, is empty after snapping, or extends past the frame.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn to_pixel_rect(
        &self,
        bounds_width: u32,
        bounds_height: u32,
        align: u32,
    ) -> Result<PixelRect, GeometryError> {
        let invalid = || GeometryError::InvalidCropGeometry {
            rect: *self,
            bounds_width,
            bounds_height,
        };

        let values = [self.x, self.y, self.width, self.height];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(invalid());
        }
        if self.x < -ORIGIN_TOLERANCE || self.y < -ORIGIN_TOLERANCE {
            return Err(invalid());
        }
        if self.x + self.width > f64::from(bounds_width) + ORIGIN_TOLERANCE
            || self.y + self.height > f64::from(bounds_height) + ORIGIN_TOLERANCE
        {
            return Err(invalid());
        }

        // `as` saturates, and the range checks above keep every value inside u32.
        let align = align.max(1);
        let snap = |value: f64| {
            let value = value.max(0.0) as u32;
            value - value % align
        };
        let rect = PixelRect::new(snap(self.x), snap(self.y), snap(self.width), snap(self.height));

        if rect.fits_within(bounds_width, bounds_height) {
            Ok(rect)
        } else {
            Err(invalid())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_and_snaps_to_alignment() {
        let rect = CropRect {
            x: 101.7,
            y: 33.2,
            width: 301.9,
            height: 99.99,
        };
        assert_eq!(
            rect.to_pixel_rect(640, 480, 2),
            Ok(PixelRect::new(100, 32, 300, 98))
        );
        assert_eq!(
            rect.to_pixel_rect(640, 480, 1),
            Ok(PixelRect::new(101, 33, 301, 99))
        );
    }

    #[test]
    fn rejects_negative_origin() {
        let rect = CropRect {
            x: 0.0,
            y: -80.0,
            width: 1000.0,
            height: 960.0,
        };
        assert!(matches!(
            rect.to_pixel_rect(1000, 800, 2),
            Err(GeometryError::InvalidCropGeometry { .. })
        ));
    }

    #[test]
    fn rejects_rect_past_the_frame() {
        let rect = CropRect {
            x: 600.0,
            y: 0.0,
            width: 100.0,
            height: 10.0,
        };
        assert!(rect.to_pixel_rect(640, 480, 2).is_err());
    }

    #[test]
    fn rejects_rect_that_snaps_to_nothing() {
        let rect = CropRect {
            x: 10.0,
            y: 10.0,
            width: 1.5,
            height: 40.0,
        };
        assert!(rect.to_pixel_rect(640, 480, 2).is_err());
        assert!(rect.to_pixel_rect(640, 480, 1).is_ok());
    }

    #[test]
    fn tolerates_rounding_noise_at_the_edges() {
        let rect = CropRect {
            x: -1e-9,
            y: 0.0,
            width: 640.000_000_1,
            height: 480.0,
        };
        assert_eq!(rect.to_pixel_rect(640, 480, 2), Ok(PixelRect::full(640, 480)));
    }

    #[test]
    fn fits_within_checks_edges() {
        assert!(PixelRect::new(0, 0, 4, 4).fits_within(4, 4));
        assert!(!PixelRect::new(1, 0, 4, 4).fits_within(4, 4));
        assert!(!PixelRect::new(0, 0, 0, 4).fits_within(4, 4));
        assert!(!PixelRect::new(u32::MAX, 0, 2, 2).fits_within(u32::MAX, 4));
    }
}
