//! # Scankit
//!
//! The platform-independent core of a mobile barcode scanner.
//!
//! Scankit sits between a camera frame callback and an ML barcode recognizer.
//! It decides which frames are worth recognizing, crops them down to the scan
//! window the user sees on screen and forwards detections, while the camera,
//! the recognizer and the executor stay with the host platform.
//!
//! ## Features
//!
//! Scankit is modular. Each layer can be used on its own.
//!
//! - `geometry`: mapping a normalized scan window onto buffer pixels.
//! - `frame`: NV21/NV12 and packed RGBA frame buffers and cropping.
//! - `scheduler`: single-flight gating with cooldown and frame skipping.
//! - `session`: the scan session tying the layers to a recognizer (default).
//!
//! Use the `full` feature to enable everything.
//!
//! ## Example
//!
//! ```toml
//! [dependencies]
//! scankit = { version = "0.1", default-features = false, features = ["geometry"] }
//! ```
//!
//! ```rust
//! # #[cfg(feature = "geometry")]
//! # {
//! use scankit::geometry::{CropRegion, Orientation, compute_crop_rect};
//!
//! let rect = compute_crop_rect(1000, 1000, &CropRegion::centered(0.5, 0.5), Orientation::Portrait);
//! assert_eq!((rect.x, rect.width), (250.0, 500.0));
//! # }
//! ```

#[cfg(feature = "geometry")]
pub use scankit_geometry as geometry;

#[cfg(feature = "frame")]
pub use scankit_frame as frame;

#[cfg(feature = "scheduler")]
pub use scankit_scheduler as scheduler;

#[cfg(feature = "session")]
pub use scankit_session as session;
