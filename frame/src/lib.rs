//! Camera frame buffers prepared for barcode recognition.
//!
//! A [`FrameBuffer`] owns the raw bytes of one camera frame in either a
//! semi-planar 4:2:0 layout (NV21/NV12, as Android camera callbacks deliver
//! them) or a packed 32-bit layout. Frames that only exist as a platform
//! handle (a `CVPixelBuffer`, an `android.media.Image`) travel as
//! [`NativeFrame`] inside the same [`Frame`] enum.
//!
//! Cropping never touches the source buffer; it returns new storage sized for
//! the target rectangle.

#![warn(missing_docs)]

mod crop;
mod luma;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

pub use scankit_geometry::PixelRect;

/// Errors that can occur with frame buffers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// Crop rectangle is empty or extends past the frame.
    #[error("crop rectangle {rect:?} is outside the {width}x{height} frame")]
    OutOfBoundsCrop {
        /// The rejected rectangle.
        rect: PixelRect,
        /// Frame width.
        width: u32,
        /// Frame height.
        height: u32,
    },
    /// Crop rectangle would split chroma samples of a subsampled frame.
    #[error("crop rectangle {0:?} is not aligned to the 2x2 chroma grid")]
    UnalignedCrop(PixelRect),
    /// Buffer length does not match dimensions and format.
    #[error("expected {expected} bytes for the frame, got {actual}")]
    InvalidBufferSize {
        /// Length implied by dimensions and format.
        expected: usize,
        /// Length of the supplied data.
        actual: usize,
    },
    /// Chroma-subsampled frames need even dimensions.
    #[error("{format:?} frames need even dimensions, got {width}x{height}")]
    OddDimensions {
        /// Frame format.
        format: PixelFormat,
        /// Frame width.
        width: u32,
        /// Frame height.
        height: u32,
    },
    /// Rotation is not a multiple of 90 degrees.
    #[error("unsupported rotation: {0} degrees")]
    InvalidRotation(u32),
}

/// Pixel layout of a [`FrameBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// YUV 4:2:0 semi-planar, chroma interleaved as V/U.
    Nv21,
    /// YUV 4:2:0 semi-planar, chroma interleaved as U/V.
    Nv12,
    /// RGBA 8-bit.
    Rgba,
    /// BGRA 8-bit.
    Bgra,
}

impl PixelFormat {
    /// Whether the format is a luma plane followed by a subsampled chroma plane.
    #[must_use]
    pub const fn is_semi_planar(self) -> bool {
        matches!(self, Self::Nv21 | Self::Nv12)
    }

    /// Bytes per pixel of packed formats, or per luma sample of semi-planar ones.
    #[must_use]
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Nv21 | Self::Nv12 => 1,
            Self::Rgba | Self::Bgra => 4,
        }
    }

    /// Grid that crop rectangles must be aligned to.
    #[must_use]
    pub const fn crop_alignment(self) -> u32 {
        if self.is_semi_planar() { 2 } else { 1 }
    }

    /// Number of bytes a `width` x `height` frame occupies, if it fits in memory.
    #[must_use]
    pub fn frame_len(self, width: u32, height: u32) -> Option<usize> {
        let pixels = usize::try_from(width)
            .ok()?
            .checked_mul(usize::try_from(height).ok()?)?;
        if self.is_semi_planar() {
            pixels.checked_mul(3).map(|n| n / 2)
        } else {
            pixels.checked_mul(self.bytes_per_pixel())
        }
    }
}

/// One camera frame held in memory.
#[derive(Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    data: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
    rotation_degrees: u32,
}

impl fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("rotation_degrees", &self.rotation_degrees)
            .field("len", &self.data.len())
            .finish_non_exhaustive()
    }
}

impl FrameBuffer {
    /// Wrap raw frame bytes.
    ///
    /// # Errors
    /// Returns [`FrameError::InvalidBufferSize`] if `data` does not match the
    /// dimensions, [`FrameError::OddDimensions`] for odd-sized semi-planar
    /// frames and [`FrameError::InvalidRotation`] for rotations other than
    /// 0, 90, 180 or 270 degrees.
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
        rotation_degrees: u32,
    ) -> Result<Self, FrameError> {
        if format.is_semi_planar() && (width % 2 != 0 || height % 2 != 0) {
            return Err(FrameError::OddDimensions {
                format,
                width,
                height,
            });
        }
        if !matches!(rotation_degrees, 0 | 90 | 180 | 270) {
            return Err(FrameError::InvalidRotation(rotation_degrees));
        }
        let expected = format
            .frame_len(width, height)
            .ok_or(FrameError::InvalidBufferSize {
                expected: usize::MAX,
                actual: data.len(),
            })?;
        if data.len() != expected {
            return Err(FrameError::InvalidBufferSize {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            format,
            rotation_degrees,
        })
    }

    /// Raw bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume the buffer and return its bytes.
    #[must_use]
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Pixel layout.
    #[must_use]
    pub const fn format(&self) -> PixelFormat {
        self.format
    }

    /// Clockwise rotation needed to display the frame upright.
    #[must_use]
    pub const fn rotation_degrees(&self) -> u32 {
        self.rotation_degrees
    }

    /// Copy `rect` out of this frame into a new buffer.
    ///
    /// # Errors
    /// Returns [`FrameError::OutOfBoundsCrop`] if `rect` is empty or not fully
    /// inside the frame, and [`FrameError::UnalignedCrop`] if a semi-planar
    /// frame would be cut between chroma samples.
    pub fn crop(&self, rect: &PixelRect) -> Result<Self, FrameError> {
        crop::crop(self, rect)
    }
}

/// Frame that only exists as an opaque platform handle.
#[derive(Clone)]
pub struct NativeFrame {
    handle: Arc<dyn Any + Send + Sync>,
    width: u32,
    height: u32,
    rotation_degrees: u32,
}

impl fmt::Debug for NativeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("rotation_degrees", &self.rotation_degrees)
            .finish_non_exhaustive()
    }
}

impl NativeFrame {
    /// Wrap a platform handle.
    #[must_use]
    pub fn new(
        handle: Arc<dyn Any + Send + Sync>,
        width: u32,
        height: u32,
        rotation_degrees: u32,
    ) -> Self {
        Self {
            handle,
            width,
            height,
            rotation_degrees,
        }
    }

    /// Borrow the handle as its concrete platform type.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.handle.downcast_ref()
    }
}

/// A camera frame, either in memory or behind a platform handle.
#[derive(Debug, Clone)]
pub enum Frame {
    /// Bytes owned by this process.
    Buffer(FrameBuffer),
    /// Platform handle that is handed to the recognizer as is.
    Native(NativeFrame),
}

impl From<FrameBuffer> for Frame {
    fn from(buffer: FrameBuffer) -> Self {
        Self::Buffer(buffer)
    }
}

impl From<NativeFrame> for Frame {
    fn from(native: NativeFrame) -> Self {
        Self::Native(native)
    }
}

impl Frame {
    /// Width and height in pixels.
    #[must_use]
    pub const fn size(&self) -> (u32, u32) {
        match self {
            Self::Buffer(buffer) => (buffer.width, buffer.height),
            Self::Native(native) => (native.width, native.height),
        }
    }

    /// Clockwise rotation needed to display the frame upright.
    #[must_use]
    pub const fn rotation_degrees(&self) -> u32 {
        match self {
            Self::Buffer(buffer) => buffer.rotation_degrees,
            Self::Native(native) => native.rotation_degrees,
        }
    }

    /// Grid that crop rectangles must be snapped to for this frame.
    #[must_use]
    pub const fn crop_alignment(&self) -> u32 {
        match self {
            Self::Buffer(buffer) => buffer.format.crop_alignment(),
            Self::Native(_) => 1,
        }
    }

    /// Restrict the frame to `rect`.
    ///
    /// Native frames are not byte-addressable and come back unchanged.
    ///
    /// # Errors
    /// See [`FrameBuffer::crop`].
    pub fn crop(self, rect: &PixelRect) -> Result<Self, FrameError> {
        match self {
            Self::Buffer(buffer) => buffer.crop(rect).map(Self::Buffer),
            Self::Native(native) => {
                log::debug!("native frame cannot be cropped, analysing it whole");
                Ok(Self::Native(native))
            }
        }
    }

    /// Borrow the in-memory buffer, if there is one.
    #[must_use]
    pub const fn as_buffer(&self) -> Option<&FrameBuffer> {
        match self {
            Self::Buffer(buffer) => Some(buffer),
            Self::Native(_) => None,
        }
    }
}
