//! End-to-end behaviour of a scan session with a scripted recognizer.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use futures::task::{FutureObj, Spawn, SpawnError};
use scankit_scheduler::ManualTimer;
use scankit_session::{
    Barcode, ChannelSink, CropRegion, Frame, FrameBuffer, FrameDecision, NativeFrame,
    Orientation, PixelFormat, PixelRect, PreparedImage, Recognition, Recognizer,
    RecognizerError, ResultSink, ScanError, ScanOptions, ScanSession, SessionConfig,
};

const COOLDOWN: Duration = Duration::from_millis(1000);

/// Holds spawned tasks until the test runs them.
#[derive(Default)]
struct QueueSpawner {
    tasks: Mutex<Vec<FutureObj<'static, ()>>>,
}

impl Spawn for QueueSpawner {
    fn spawn_obj(&self, future: FutureObj<'static, ()>) -> Result<(), SpawnError> {
        self.tasks.lock().unwrap().push(future);
        Ok(())
    }
}

impl QueueSpawner {
    fn run_all(&self) {
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap());
        for task in tasks {
            futures::executor::block_on(task);
        }
    }

    fn queued(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }
}

struct ShutDownSpawner;

impl Spawn for ShutDownSpawner {
    fn spawn_obj(&self, _future: FutureObj<'static, ()>) -> Result<(), SpawnError> {
        Err(SpawnError::shutdown())
    }
}

/// Answers with queued results and records what it was shown.
#[derive(Default)]
struct ScriptedRecognizer {
    results: Mutex<VecDeque<Recognition>>,
    seen: Mutex<Vec<((u32, u32), Option<PixelRect>)>>,
}

impl ScriptedRecognizer {
    fn answering(results: impl IntoIterator<Item = Recognition>) -> Arc<Self> {
        Arc::new(Self {
            results: Mutex::new(results.into_iter().collect()),
            seen: Mutex::default(),
        })
    }

    fn seen(&self) -> Vec<((u32, u32), Option<PixelRect>)> {
        self.seen.lock().unwrap().clone()
    }
}

impl Recognizer for ScriptedRecognizer {
    fn recognize(&self, image: PreparedImage) -> BoxFuture<'static, Recognition> {
        self.seen
            .lock()
            .unwrap()
            .push((image.frame.size(), image.crop));
        let result = self
            .results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Recognition::Empty);
        futures::future::ready(result).boxed()
    }
}

#[derive(Default)]
struct RecordingSink {
    barcodes: Mutex<Vec<Barcode>>,
    errors: Mutex<Vec<String>>,
}

impl ResultSink for RecordingSink {
    fn emit(&self, barcode: Barcode) {
        self.barcodes.lock().unwrap().push(barcode);
    }

    fn error(&self, error: &ScanError) {
        self.errors.lock().unwrap().push(error.to_string());
    }
}

struct Harness {
    session: ScanSession,
    recognizer: Arc<ScriptedRecognizer>,
    sink: Arc<RecordingSink>,
    spawner: Arc<QueueSpawner>,
    timer: ManualTimer,
}

fn harness(config: SessionConfig, results: Vec<Recognition>) -> Harness {
    let recognizer = ScriptedRecognizer::answering(results);
    let sink = Arc::new(RecordingSink::default());
    let spawner = Arc::new(QueueSpawner::default());
    let timer = ManualTimer::new();
    let session = ScanSession::with_timer(
        config,
        recognizer.clone(),
        sink.clone(),
        spawner.clone(),
        Arc::new(timer.clone()),
    )
    .unwrap();
    Harness {
        session,
        recognizer,
        sink,
        spawner,
        timer,
    }
}

fn cooling_config() -> SessionConfig {
    SessionConfig {
        options: ScanOptions {
            delay_ms: 1000,
            ..ScanOptions::default()
        },
        ..SessionConfig::default()
    }
}

fn nv21(width: u32, height: u32, rotation: u32) -> FrameBuffer {
    let len = (width * height * 3 / 2) as usize;
    FrameBuffer::new(vec![0x80; len], width, height, PixelFormat::Nv21, rotation).unwrap()
}

fn offer(session: &ScanSession) -> FrameDecision {
    session.on_frame(nv21(100, 100, 0), 100, 100, Orientation::Portrait)
}

#[test]
fn detection_is_forwarded_and_starts_cooldown() {
    let h = harness(
        cooling_config(),
        vec![Recognition::Detected(Barcode::new("4607001234567").with_format("ean13"))],
    );
    h.session.update_crop_region(CropRegion::centered(0.5, 0.5)).unwrap();

    assert!(offer(&h.session).is_submitted());
    h.spawner.run_all();

    assert_eq!(
        h.recognizer.seen(),
        vec![((50, 60), Some(PixelRect::new(24, 20, 50, 60)))]
    );
    assert_eq!(
        h.sink.barcodes.lock().unwrap().as_slice(),
        [Barcode::new("4607001234567").with_format("ean13")]
    );
    assert!(h.session.scheduler().is_cooling_down());
    assert!(matches!(offer(&h.session), FrameDecision::Dropped));

    h.timer.advance(COOLDOWN);
    assert!(offer(&h.session).is_submitted());
}

#[test]
fn frames_are_dropped_while_one_is_in_flight() {
    let h = harness(cooling_config(), vec![]);
    assert!(offer(&h.session).is_submitted());
    for _ in 0..3 {
        assert!(matches!(offer(&h.session), FrameDecision::Dropped));
    }
    assert_eq!(h.spawner.queued(), 1);

    // An empty result frees the recognizer without a cooldown.
    h.spawner.run_all();
    assert!(!h.session.scheduler().is_cooling_down());
    assert!(offer(&h.session).is_submitted());
}

#[test]
fn identity_region_passes_frames_through() {
    let h = harness(SessionConfig::default(), vec![]);
    assert!(offer(&h.session).is_submitted());
    h.spawner.run_all();
    assert_eq!(h.recognizer.seen(), vec![((100, 100), None)]);
}

#[test]
fn crop_failure_skips_frame_and_releases() {
    let h = harness(cooling_config(), vec![]);
    h.session
        .update_crop_region(CropRegion::new(0.5, 0.5, 1.0, 0.0))
        .unwrap();

    let decision = offer(&h.session);
    assert!(matches!(
        decision,
        FrameDecision::Skipped(ScanError::Geometry(_))
    ));
    assert!(!h.session.scheduler().is_in_flight());
    assert_eq!(h.spawner.queued(), 0);

    h.session.update_crop_region(CropRegion::IDENTITY).unwrap();
    assert!(offer(&h.session).is_submitted());
}

#[test]
fn recognizer_failure_is_reported_and_releases() {
    let h = harness(
        cooling_config(),
        vec![Recognition::Failed(RecognizerError::InvalidImage(
            "truncated buffer".into(),
        ))],
    );
    assert!(offer(&h.session).is_submitted());
    h.spawner.run_all();

    assert_eq!(
        h.sink.errors.lock().unwrap().as_slice(),
        ["recognizer failed: invalid image: truncated buffer"]
    );
    assert!(h.sink.barcodes.lock().unwrap().is_empty());
    assert!(!h.session.scheduler().is_cooling_down());
    assert!(offer(&h.session).is_submitted());
}

#[test]
fn results_after_dispose_are_ignored() {
    let h = harness(
        cooling_config(),
        vec![Recognition::Detected(Barcode::new("late"))],
    );
    assert!(offer(&h.session).is_submitted());
    h.session.dispose();
    h.spawner.run_all();

    assert!(h.sink.barcodes.lock().unwrap().is_empty());
    assert_eq!(h.timer.pending(), 0);
    assert!(matches!(offer(&h.session), FrameDecision::Dropped));
}

#[test]
fn pause_still_lets_the_in_flight_result_land() {
    let h = harness(
        cooling_config(),
        vec![Recognition::Detected(Barcode::new("paused"))],
    );
    assert!(offer(&h.session).is_submitted());
    h.session.pause();
    h.spawner.run_all();

    assert_eq!(h.sink.barcodes.lock().unwrap().len(), 1);
    assert!(!h.session.scheduler().is_in_flight());

    h.timer.advance(COOLDOWN);
    assert!(matches!(offer(&h.session), FrameDecision::Dropped));
    h.session.start_scan(&ScanOptions::default());
    assert!(offer(&h.session).is_submitted());
}

#[test]
fn new_region_applies_to_later_frames_only() {
    let h = harness(SessionConfig::default(), vec![]);
    assert!(offer(&h.session).is_submitted());
    h.session
        .update_crop_region(CropRegion::centered(0.5, 0.5))
        .unwrap();
    h.spawner.run_all();
    assert!(offer(&h.session).is_submitted());

    assert_eq!(
        h.recognizer.seen(),
        vec![
            ((100, 100), None),
            ((50, 60), Some(PixelRect::new(24, 20, 50, 60)))
        ]
    );
}

#[test]
fn invalid_region_is_rejected_and_old_one_kept() {
    let h = harness(SessionConfig::default(), vec![]);
    let region = CropRegion::centered(0.4, 0.4);
    h.session.update_crop_region(region).unwrap();
    assert!(matches!(
        h.session.update_crop_region(CropRegion::centered(-1.0, 0.5)),
        Err(ScanError::Geometry(_))
    ));
    assert_eq!(h.session.crop_region(), region);
}

#[test]
fn camera_frames_use_their_rotation() {
    let h = harness(SessionConfig::default(), vec![]);
    h.session
        .update_crop_region(CropRegion::centered(0.5, 0.5))
        .unwrap();
    assert!(h.session.on_camera_frame(nv21(100, 50, 90)).is_submitted());
    h.spawner.run_all();
    assert_eq!(
        h.recognizer.seen(),
        vec![((60, 24), Some(PixelRect::new(20, 12, 60, 24)))]
    );
}

#[test]
fn native_frames_carry_the_window_as_region_of_interest() {
    let h = harness(SessionConfig::default(), vec![]);
    let native = || NativeFrame::new(Arc::new("CVPixelBuffer"), 640, 480, 0);

    assert!(h
        .session
        .on_frame(Frame::Native(native()), 640, 480, Orientation::Portrait)
        .is_submitted());
    h.spawner.run_all();

    h.session
        .update_crop_region(CropRegion::centered(0.5, 0.5))
        .unwrap();
    assert!(h
        .session
        .on_frame(Frame::Native(native()), 640, 480, Orientation::Portrait)
        .is_submitted());
    h.spawner.run_all();

    assert_eq!(
        h.recognizer.seen(),
        vec![
            ((640, 480), None),
            ((640, 480), Some(PixelRect::new(160, 96, 320, 288)))
        ]
    );
}

/// Records whether the scheduler had already taken the detection when the
/// sink saw it.
#[derive(Default)]
struct OrderingSink {
    scheduler: Mutex<Option<scankit_scheduler::RecognitionScheduler>>,
    cooling_at_emit: Mutex<Vec<bool>>,
}

impl ResultSink for OrderingSink {
    fn emit(&self, _barcode: Barcode) {
        let cooling = self
            .scheduler
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(scankit_scheduler::RecognitionScheduler::is_cooling_down);
        self.cooling_at_emit.lock().unwrap().push(cooling);
    }
}

#[test]
fn detection_is_committed_to_the_scheduler_before_emitting() {
    let sink = Arc::new(OrderingSink::default());
    let spawner = Arc::new(QueueSpawner::default());
    let session = ScanSession::with_timer(
        cooling_config(),
        ScriptedRecognizer::answering([Recognition::Detected(Barcode::new("a"))]),
        sink.clone(),
        spawner.clone(),
        Arc::new(ManualTimer::new()),
    )
    .unwrap();
    *sink.scheduler.lock().unwrap() = Some(session.scheduler().clone());

    assert!(offer(&session).is_submitted());
    spawner.run_all();
    assert_eq!(sink.cooling_at_emit.lock().unwrap().as_slice(), [true]);
}

#[test]
fn failures_after_dispose_are_not_reported() {
    let h = harness(
        cooling_config(),
        vec![Recognition::Failed(RecognizerError::Backend("gone".into()))],
    );
    assert!(offer(&h.session).is_submitted());
    h.session.dispose();
    h.spawner.run_all();
    assert!(h.sink.errors.lock().unwrap().is_empty());
}

#[test]
fn empty_frames_are_skipped() {
    let h = harness(SessionConfig::default(), vec![]);
    let empty = FrameBuffer::new(Vec::new(), 0, 0, PixelFormat::Nv21, 0).unwrap();
    assert!(matches!(
        h.session.on_frame(empty, 0, 0, Orientation::Portrait),
        FrameDecision::Skipped(ScanError::EmptyFrame)
    ));
    assert!(!h.session.scheduler().is_in_flight());
}

#[test]
fn spawn_failure_skips_frame_and_releases() {
    let timer = ManualTimer::new();
    let session = ScanSession::with_timer(
        cooling_config(),
        ScriptedRecognizer::answering([]),
        Arc::new(RecordingSink::default()),
        Arc::new(ShutDownSpawner),
        Arc::new(timer),
    )
    .unwrap();
    assert!(matches!(
        offer(&session),
        FrameDecision::Skipped(ScanError::Spawn(_))
    ));
    assert!(!session.scheduler().is_in_flight());
}

#[test]
fn initial_crop_rect_comes_from_config() {
    let config = SessionConfig::from_json(
        r#"{"options": {"type": 0, "delay": 0},
            "parameters": {"initialCropRect": {"scaleWidth": 0.5, "scaleHeight": 0.5}}}"#,
    )
    .unwrap();
    let h = harness(config, vec![]);
    assert_eq!(h.session.crop_region(), CropRegion::centered(0.5, 0.5));

    let focus = h.session.focus_point(100, 100);
    assert!((focus.x - 0.5).abs() < 1e-12 && (focus.y - 0.5).abs() < 1e-12);
}

#[test]
fn cooldown_update_restarts_running_cooldown() {
    let h = harness(
        cooling_config(),
        vec![Recognition::Detected(Barcode::new("x"))],
    );
    assert!(offer(&h.session).is_submitted());
    h.spawner.run_all();

    h.timer.advance(Duration::from_millis(800));
    h.session.update_cooldown(Duration::from_millis(500));
    h.timer.advance(Duration::from_millis(300));
    assert!(matches!(offer(&h.session), FrameDecision::Dropped));
    h.timer.advance(Duration::from_millis(200));
    assert!(offer(&h.session).is_submitted());
}

#[test]
fn channel_sink_delivers_detections() {
    let (sink, detections) = ChannelSink::new();
    let spawner = Arc::new(QueueSpawner::default());
    let session = ScanSession::with_timer(
        SessionConfig::default(),
        ScriptedRecognizer::answering([Recognition::Detected(Barcode::new("qr"))]),
        Arc::new(sink),
        spawner.clone(),
        Arc::new(ManualTimer::new()),
    )
    .unwrap();

    assert!(offer(&session).is_submitted());
    spawner.run_all();
    assert_eq!(detections.try_recv().unwrap(), Barcode::new("qr"));
}
