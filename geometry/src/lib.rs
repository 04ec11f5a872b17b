//! Crop-window geometry for camera barcode scanners.
//!
//! Camera sensors deliver frames in their own axis convention while the user
//! sees a rotated, aspect-filled preview with a scan window drawn on top. This
//! crate maps the normalized scan window ([`CropRegion`]) onto pixel space of a
//! raw frame so that only what the user sees inside the window is analysed.
//!
//! # Usage
//!
//! ```
//! use scankit_geometry::{compute_crop_rect, CropRegion, Orientation};
//!
//! let region = CropRegion::centered(0.5, 0.5);
//! let rect = compute_crop_rect(1000, 1000, &region, Orientation::Portrait);
//! let pixels = rect.to_pixel_rect(1000, 1000, 2).unwrap();
//! assert_eq!((pixels.left, pixels.top, pixels.width, pixels.height), (250, 200, 500, 600));
//! ```

#![warn(missing_docs)]

mod rect;

pub use rect::{CropRect, PixelRect};

use serde::{Deserialize, Serialize};

/// The scan window is drawn 20% taller than the analysed region would otherwise
/// be, because aspect-fill previews lose vertical field of view relative to the
/// raw sensor buffer.
pub const VERTICAL_INFLATION: f64 = 1.2;

/// Errors produced while mapping a scan window onto a frame.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    /// The computed rectangle does not fit inside the frame.
    #[error("crop rectangle {rect:?} does not fit inside a {bounds_width}x{bounds_height} frame")]
    InvalidCropGeometry {
        /// The rectangle that was rejected.
        rect: CropRect,
        /// Frame width in pixels.
        bounds_width: u32,
        /// Frame height in pixels.
        bounds_height: u32,
    },
    /// The crop region itself is malformed.
    #[error("invalid crop region: {0}")]
    InvalidRegion(String),
}

/// Normalized description of the scan window.
///
/// Scales are fractions of the full viewport extent (`1.0` is the whole
/// viewport). Offsets move the window centre away from the viewport centre as
/// a fraction of half the viewport extent, so `offset_x = 1.0` puts the centre
/// on the right edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CropRegion {
    /// Window width relative to the viewport width.
    pub scale_width: f64,
    /// Window height relative to the viewport height.
    pub scale_height: f64,
    /// Horizontal centre offset in `[-1, 1]`.
    pub offset_x: f64,
    /// Vertical centre offset in `[-1, 1]`.
    pub offset_y: f64,
}

impl Default for CropRegion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl CropRegion {
    /// Full viewport, centred.
    pub const IDENTITY: Self = Self {
        scale_width: 1.0,
        scale_height: 1.0,
        offset_x: 0.0,
        offset_y: 0.0,
    };

    /// Create a region from its scales and offsets.
    #[must_use]
    pub const fn new(scale_width: f64, scale_height: f64, offset_x: f64, offset_y: f64) -> Self {
        Self {
            scale_width,
            scale_height,
            offset_x,
            offset_y,
        }
    }

    /// Create a centred region with the given scales.
    #[must_use]
    pub const fn centered(scale_width: f64, scale_height: f64) -> Self {
        Self::new(scale_width, scale_height, 0.0, 0.0)
    }

    /// Whether frames need cropping at all for this region.
    #[must_use]
    #[allow(clippy::float_cmp)] // identity is an exact value, not a tolerance
    pub fn should_crop(&self) -> bool {
        self.scale_width != 1.0
            || self.scale_height != 1.0
            || self.offset_x != 0.0
            || self.offset_y != 0.0
    }

    /// Check that scales are positive and offsets lie in `[-1, 1]`.
    ///
    /// # Errors
    /// Returns [`GeometryError::InvalidRegion`] describing the first bad field.
    pub fn validate(&self) -> Result<(), GeometryError> {
        for (name, value) in [
            ("scaleWidth", self.scale_width),
            ("scaleHeight", self.scale_height),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(GeometryError::InvalidRegion(format!(
                    "{name} must be a positive number, got {value}"
                )));
            }
        }
        for (name, value) in [("offsetX", self.offset_x), ("offsetY", self.offset_y)] {
            if !(-1.0..=1.0).contains(&value) {
                return Err(GeometryError::InvalidRegion(format!(
                    "{name} must be within [-1, 1], got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Orientation of the video buffer relative to the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Orientation {
    /// Buffer axes match screen axes.
    #[default]
    Portrait,
    /// Buffer is rotated by 180 degrees.
    PortraitUpsideDown,
    /// Buffer is rotated by 270 degrees.
    LandscapeLeft,
    /// Buffer is rotated by 90 degrees.
    LandscapeRight,
}

impl Orientation {
    /// Map a buffer rotation in degrees to an orientation.
    ///
    /// Values are normalized modulo 360 and rounded to the nearest quarter turn.
    #[must_use]
    pub const fn from_rotation_degrees(degrees: i32) -> Self {
        let quarter = (degrees.rem_euclid(360) + 45) / 90 % 4;
        match quarter {
            1 => Self::LandscapeRight,
            2 => Self::PortraitUpsideDown,
            3 => Self::LandscapeLeft,
            _ => Self::Portrait,
        }
    }

    /// Rotation of the buffer in degrees.
    #[must_use]
    pub const fn rotation_degrees(self) -> u32 {
        match self {
            Self::Portrait => 0,
            Self::LandscapeRight => 90,
            Self::PortraitUpsideDown => 180,
            Self::LandscapeLeft => 270,
        }
    }

    /// Whether buffer width runs along the screen's vertical axis.
    #[must_use]
    pub const fn is_landscape(self) -> bool {
        matches!(self, Self::LandscapeLeft | Self::LandscapeRight)
    }
}

/// Ratio of the preview widget to the screen on each screen axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewScale {
    /// Horizontal ratio.
    pub x: f64,
    /// Vertical ratio.
    pub y: f64,
}

impl Default for PreviewScale {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl PreviewScale {
    /// Preview fills the screen.
    pub const IDENTITY: Self = Self { x: 1.0, y: 1.0 };

    /// Create a preview scale.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Whether this scale changes nothing.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn is_identity(&self) -> bool {
        self.x == 1.0 && self.y == 1.0
    }
}

/// Normalized point of interest, `(0, 0)` top-left and `(1, 1)` bottom-right.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FocusPoint {
    /// Horizontal coordinate in `[0, 1]`.
    pub x: f64,
    /// Vertical coordinate in `[0, 1]`.
    pub y: f64,
}

/// Compute the crop rectangle for a full-screen preview.
///
/// See [`compute_crop_rect_scaled`].
#[must_use]
pub fn compute_crop_rect(
    viewport_width: u32,
    viewport_height: u32,
    region: &CropRegion,
    orientation: Orientation,
) -> CropRect {
    compute_crop_rect_scaled(
        viewport_width,
        viewport_height,
        region,
        orientation,
        PreviewScale::IDENTITY,
    )
}

/// Compute the crop rectangle in buffer pixel space.
///
/// Scales and offsets are first expressed on screen axes, multiplied by the
/// preview scale of the same axis, and the screen-vertical scale is inflated by
/// [`VERTICAL_INFLATION`]. Landscape buffers then swap axes, and the offset that
/// lands on the buffer's vertical axis after a quarter turn flips sign so that
/// the window still moves in the on-screen direction the user asked for.
///
/// The result is not clamped; see [`CropRect::to_pixel_rect`].
#[must_use]
pub fn compute_crop_rect_scaled(
    viewport_width: u32,
    viewport_height: u32,
    region: &CropRegion,
    orientation: Orientation,
    preview: PreviewScale,
) -> CropRect {
    let screen_scale_x = region.scale_width * preview.x;
    let screen_scale_y = region.scale_height * preview.y * VERTICAL_INFLATION;
    let screen_offset_x = region.offset_x * preview.x;
    let screen_offset_y = region.offset_y * preview.y;

    let (scale_x, scale_y, offset_x, offset_y) = match orientation {
        Orientation::Portrait => (screen_scale_x, screen_scale_y, screen_offset_x, screen_offset_y),
        Orientation::PortraitUpsideDown => (
            screen_scale_x,
            screen_scale_y,
            -screen_offset_x,
            -screen_offset_y,
        ),
        Orientation::LandscapeRight => (
            screen_scale_y,
            screen_scale_x,
            screen_offset_y,
            -screen_offset_x,
        ),
        Orientation::LandscapeLeft => (
            screen_scale_y,
            screen_scale_x,
            -screen_offset_y,
            screen_offset_x,
        ),
    };

    let viewport_width = f64::from(viewport_width);
    let viewport_height = f64::from(viewport_height);
    let width = viewport_width * scale_x;
    let height = viewport_height * scale_y;

    CropRect {
        x: viewport_width / 2.0 * (1.0 + offset_x) - width / 2.0,
        y: viewport_height / 2.0 * (1.0 + offset_y) - height / 2.0,
        width,
        height,
    }
}

/// Normalized point the scan window is centred on.
///
/// Used to steer autofocus and exposure to the same place the crop window
/// analyses.
#[must_use]
pub fn compute_focus_point(
    viewport_width: u32,
    viewport_height: u32,
    region: &CropRegion,
) -> FocusPoint {
    FocusPoint {
        x: axis_focus(f64::from(viewport_width), region.offset_x),
        y: axis_focus(f64::from(viewport_height), region.offset_y),
    }
}

fn axis_focus(extent: f64, offset: f64) -> f64 {
    if extent <= 0.0 {
        return 0.5;
    }
    let half = extent / 2.0;
    ((half + half * offset) / extent).clamp(0.0, 1.0)
}
