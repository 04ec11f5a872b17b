use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::task::{Spawn, SpawnExt};
use log::{debug, info, warn};
use scankit_frame::Frame;
use scankit_geometry::{
    CropRegion, FocusPoint, Orientation, PreviewScale, compute_crop_rect_scaled,
    compute_focus_point,
};
use scankit_scheduler::{RecognitionScheduler, ThreadTimer, Timer};

use crate::{PreparedImage, Recognition, Recognizer, ResultSink, ScanError, ScanOptions, SessionConfig};

/// What happened to a frame handed to [`ScanSession::on_frame`].
#[derive(Debug)]
pub enum FrameDecision {
    /// The scheduler refused the frame; nothing was done.
    Dropped,
    /// The frame could not be prepared or dispatched and was skipped.
    Skipped(ScanError),
    /// The frame is with the recognizer.
    Submitted,
}

impl FrameDecision {
    /// Whether the frame reached the recognizer.
    #[must_use]
    pub const fn is_submitted(&self) -> bool {
        matches!(self, Self::Submitted)
    }
}

#[derive(Debug, Clone, Copy)]
struct ScanWindow {
    region: CropRegion,
    preview: PreviewScale,
}

/// Reacts to recognizer results; shared with the spawned recognition tasks.
#[derive(Clone)]
struct Completion {
    scheduler: RecognitionScheduler,
    sink: Arc<dyn ResultSink>,
}

impl Completion {
    fn handle(&self, result: Recognition) {
        let accepted = match &result {
            Recognition::Detected(_) => self.scheduler.on_success(),
            Recognition::Empty | Recognition::Failed(_) => self.scheduler.release(),
        };
        if !accepted {
            debug!("recognition finished after dispose, result ignored");
            return;
        }
        match result {
            Recognition::Detected(barcode) => {
                info!("barcode detected: {}", barcode.raw_value);
                self.sink.emit(barcode);
            }
            Recognition::Empty => {}
            Recognition::Failed(err) => {
                warn!("recognizer failed: {err}");
                self.sink.error(&ScanError::Recognizer(err));
            }
        }
    }
}

/// Owns the recognition state of one scanning session.
///
/// Cloning yields another handle to the same session, so the camera callback
/// and the UI layer can each hold one.
#[derive(Clone)]
pub struct ScanSession {
    completion: Completion,
    recognizer: Arc<dyn Recognizer>,
    spawner: Arc<dyn Spawn + Send + Sync>,
    window: Arc<Mutex<ScanWindow>>,
}

impl std::fmt::Debug for ScanSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanSession")
            .field("scheduler", &self.completion.scheduler)
            .field("window", &*self.window())
            .finish_non_exhaustive()
    }
}

impl ScanSession {
    /// Start a session whose cooldowns run on a [`ThreadTimer`].
    ///
    /// # Errors
    /// Returns [`ScanError::Geometry`] if the initial crop region is invalid.
    pub fn new(
        config: SessionConfig,
        recognizer: Arc<dyn Recognizer>,
        sink: Arc<dyn ResultSink>,
        spawner: Arc<dyn Spawn + Send + Sync>,
    ) -> Result<Self, ScanError> {
        Self::with_timer(config, recognizer, sink, spawner, Arc::new(ThreadTimer))
    }

    /// Start a session whose cooldowns run on `timer`.
    ///
    /// # Errors
    /// Returns [`ScanError::Geometry`] if the initial crop region is invalid.
    pub fn with_timer(
        config: SessionConfig,
        recognizer: Arc<dyn Recognizer>,
        sink: Arc<dyn ResultSink>,
        spawner: Arc<dyn Spawn + Send + Sync>,
        timer: Arc<dyn Timer>,
    ) -> Result<Self, ScanError> {
        let region = config.initial_region();
        region.validate()?;
        info!(
            "scan session started, cooldown {} ms",
            config.options.delay_ms
        );
        Ok(Self {
            completion: Completion {
                scheduler: RecognitionScheduler::new(config.scheduler_config(), timer),
                sink,
            },
            recognizer,
            spawner,
            window: Arc::new(Mutex::new(ScanWindow {
                region,
                preview: PreviewScale::IDENTITY,
            })),
        })
    }

    fn window(&self) -> MutexGuard<'_, ScanWindow> {
        self.window.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The scheduler gating this session.
    #[must_use]
    pub const fn scheduler(&self) -> &RecognitionScheduler {
        &self.completion.scheduler
    }

    /// Offer a camera frame.
    ///
    /// `viewport_width` and `viewport_height` describe the pixel space the scan
    /// window is mapped into, normally the frame's own size.
    pub fn on_frame(
        &self,
        frame: impl Into<Frame>,
        viewport_width: u32,
        viewport_height: u32,
        orientation: Orientation,
    ) -> FrameDecision {
        let scheduler = &self.completion.scheduler;
        if !scheduler.try_acquire() {
            return FrameDecision::Dropped;
        }

        let image = match self.prepare(frame.into(), viewport_width, viewport_height, orientation)
        {
            Ok(image) => image,
            Err(err) => {
                debug!("skipping frame: {err}");
                scheduler.release();
                return FrameDecision::Skipped(err);
            }
        };

        let recognition = self.recognizer.recognize(image);
        let completion = self.completion.clone();
        let task = async move {
            let result = recognition.await;
            completion.handle(result);
        };
        match self.spawner.spawn(task) {
            Ok(()) => FrameDecision::Submitted,
            Err(err) => {
                warn!("failed to dispatch frame: {err}");
                scheduler.release();
                FrameDecision::Skipped(err.into())
            }
        }
    }

    /// Offer a camera frame, using its own size as the viewport and its
    /// rotation as the orientation.
    pub fn on_camera_frame(&self, frame: impl Into<Frame>) -> FrameDecision {
        let frame = frame.into();
        let (width, height) = frame.size();
        let orientation =
            Orientation::from_rotation_degrees(i32::try_from(frame.rotation_degrees()).unwrap_or(0));
        self.on_frame(frame, width, height, orientation)
    }

    fn prepare(
        &self,
        frame: Frame,
        viewport_width: u32,
        viewport_height: u32,
        orientation: Orientation,
    ) -> Result<PreparedImage, ScanError> {
        let (width, height) = frame.size();
        if width == 0 || height == 0 {
            return Err(ScanError::EmptyFrame);
        }

        let window = *self.window();
        if !window.region.should_crop() && window.preview.is_identity() {
            return Ok(PreparedImage {
                frame,
                crop: None,
                orientation,
            });
        }

        let rect = compute_crop_rect_scaled(
            viewport_width,
            viewport_height,
            &window.region,
            orientation,
            window.preview,
        )
        .to_pixel_rect(width, height, frame.crop_alignment())?;
        let frame = frame.crop(&rect)?;

        Ok(PreparedImage {
            frame,
            crop: Some(rect),
            orientation,
        })
    }

    /// Feed a recognizer result back into the session.
    ///
    /// Recognition tasks spawned by [`on_frame`](Self::on_frame) call this
    /// themselves; hosts that run the recognizer outside the session can use it
    /// after an [`acquire`](RecognitionScheduler::try_acquire) of their own.
    pub fn handle_recognition(&self, result: Recognition) {
        self.completion.handle(result);
    }

    /// Replace the scan window. Frames already submitted keep the old one.
    ///
    /// # Errors
    /// Returns [`ScanError::Geometry`] if `region` is invalid; the current
    /// window is kept.
    pub fn update_crop_region(&self, region: CropRegion) -> Result<(), ScanError> {
        region.validate()?;
        self.window().region = region;
        Ok(())
    }

    /// Current scan window.
    #[must_use]
    pub fn crop_region(&self) -> CropRegion {
        self.window().region
    }

    /// Tell the session how the preview widget relates to the screen.
    pub fn set_preview_scale(&self, preview: PreviewScale) {
        self.window().preview = preview;
    }

    /// Normalized point the scan window is centred on, for steering autofocus.
    #[must_use]
    pub fn focus_point(&self, viewport_width: u32, viewport_height: u32) -> FocusPoint {
        compute_focus_point(viewport_width, viewport_height, &self.window().region)
    }

    /// Change the cooldown after detections; a running cooldown restarts.
    pub fn update_cooldown(&self, cooldown: Duration) {
        self.completion.scheduler.update_cooldown(cooldown);
    }

    /// Apply a scan start request: adopt its cooldown and resume scanning.
    pub fn start_scan(&self, options: &ScanOptions) {
        self.update_cooldown(options.cooldown());
        self.resume();
    }

    /// Stop submitting frames until [`resume`](Self::resume).
    pub fn pause(&self) {
        debug!("scan session paused");
        self.completion.scheduler.pause();
    }

    /// Resume submitting frames.
    pub fn resume(&self) {
        debug!("scan session resumed");
        self.completion.scheduler.resume();
    }

    /// End the session. Pending cooldowns are cancelled and results that are
    /// still on their way are ignored.
    pub fn dispose(&self) {
        info!("scan session disposed");
        self.completion.scheduler.dispose();
    }
}
