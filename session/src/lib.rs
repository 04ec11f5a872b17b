//! Barcode scan sessions.
//!
//! A [`ScanSession`] sits between a camera frame callback and an ML barcode
//! recognizer. For every frame it asks its
//! [`RecognitionScheduler`](scankit_scheduler::RecognitionScheduler) whether the
//! recognizer is free, crops the frame down to the scan window, hands it to the
//! [`Recognizer`] on a host-provided executor and forwards detections to a
//! [`ResultSink`].
//!
//! Everything platform-specific stays outside: the host owns the camera, the
//! recognizer and the executor, and drives the session lifecycle explicitly.
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use futures::executor::ThreadPool;
//! use scankit_session::{ChannelSink, ScanSession, SessionConfig};
//!
//! let config = SessionConfig::from_json(r#"{"options": {"type": 0, "delay": 1500}}"#)?;
//! let (sink, detections) = ChannelSink::new();
//! let session = ScanSession::new(config, Arc::new(my_recognizer), Arc::new(sink), Arc::new(ThreadPool::new()?))?;
//!
//! // From the camera callback:
//! session.on_camera_frame(frame);
//!
//! // Elsewhere:
//! while let Ok(barcode) = detections.recv().await {
//!     println!("{}", barcode.raw_value);
//! }
//! ```

#![warn(missing_docs)]

mod config;
mod session;
mod sink;

pub use config::{RecognitionType, ScanOptions, ScannerParameters, SessionConfig};
pub use session::{FrameDecision, ScanSession};
pub use sink::{ChannelSink, ResultSink};

pub use scankit_frame::{Frame, FrameBuffer, FrameError, NativeFrame, PixelFormat};
pub use scankit_geometry::{
    CropRegion, FocusPoint, GeometryError, Orientation, PixelRect, PreviewScale,
};

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

/// Errors surfaced by a scan session.
///
/// None of them end the session; the affected frame is skipped.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// Scan window could not be mapped onto the frame.
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    /// Frame could not be cropped.
    #[error(transparent)]
    Frame(#[from] FrameError),
    /// Frame has no pixels.
    #[error("frame is empty")]
    EmptyFrame,
    /// The recognizer failed.
    #[error("recognizer failed: {0}")]
    Recognizer(#[from] RecognizerError),
    /// The executor refused the recognition task.
    #[error("failed to spawn recognition: {0}")]
    Spawn(#[from] futures::task::SpawnError),
    /// Host arguments could not be parsed.
    #[error("invalid arguments: {0}")]
    InvalidArguments(#[from] serde_json::Error),
}

/// Failure reported by a [`Recognizer`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecognizerError {
    /// The recognizer could not read the image.
    #[error("invalid image: {0}")]
    InvalidImage(String),
    /// Backend-specific failure.
    #[error("{0}")]
    Backend(String),
}

/// A detected barcode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Barcode {
    /// Decoded payload.
    pub raw_value: String,
    /// Symbology reported by the recognizer, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl Barcode {
    /// Barcode with an unknown symbology.
    #[must_use]
    pub fn new(raw_value: impl Into<String>) -> Self {
        Self {
            raw_value: raw_value.into(),
            format: None,
        }
    }

    /// Attach the symbology.
    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }
}

/// Outcome of one recognition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recognition {
    /// A barcode was found.
    Detected(Barcode),
    /// Nothing was found.
    Empty,
    /// The recognizer failed.
    Failed(RecognizerError),
}

/// Frame ready for the recognizer.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    /// The frame, already cropped to the scan window when it holds bytes.
    pub frame: Frame,
    /// Scan window in the original frame's pixels, `None` when the whole frame
    /// is to be analysed.
    ///
    /// A [`Frame::Buffer`] has already been cut to this rectangle. A
    /// [`Frame::Native`] arrives whole, and the recognizer must restrict itself
    /// to this region of interest.
    pub crop: Option<PixelRect>,
    /// Orientation the frame was captured in.
    pub orientation: Orientation,
}

/// An ML recognizer, treated as an opaque asynchronous capability.
pub trait Recognizer: Send + Sync {
    /// Look for a barcode in `image`.
    fn recognize(&self, image: PreparedImage) -> BoxFuture<'static, Recognition>;
}
