// Integration tests for the capture lifecycle, driven by a scripted
// backend instead of a real microphone.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use podium::error::{PodiumError, Result};
use podium::{AudioFrame, CaptureBackend, CaptureConfig, CaptureEngine, CapturePhase};

/// Backend that replays a fixed set of frames and records how it was driven.
struct ScriptedBackend {
    frames: Vec<AudioFrame>,
    fail_start: bool,
    capturing: bool,
    starts: Arc<AtomicU32>,
    released: Arc<AtomicBool>,
}

impl ScriptedBackend {
    fn new(frames: Vec<AudioFrame>) -> Self {
        Self {
            frames,
            fail_start: false,
            capturing: false,
            starts: Arc::new(AtomicU32::new(0)),
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    fn unavailable() -> Self {
        let mut backend = Self::new(Vec::new());
        backend.fail_start = true;
        backend
    }
}

#[async_trait::async_trait]
impl CaptureBackend for ScriptedBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.fail_start {
            return Err(PodiumError::DeviceUnavailable("microphone denied".to_string()).into());
        }

        let (tx, rx) = mpsc::channel(64);
        for frame in self.frames.clone() {
            tx.send(frame).await.expect("frame fits in channel");
        }
        // Dropping the sender ends the frame stream once drained.

        self.starts.fetch_add(1, Ordering::SeqCst);
        self.released.store(false, Ordering::SeqCst);
        self.capturing = true;
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        self.capturing = false;
        self.released.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// 100 ms of silence at 16 kHz mono per frame.
fn frames(count: u64) -> Vec<AudioFrame> {
    (0..count)
        .map(|i| AudioFrame {
            samples: vec![0i16; 1600],
            sample_rate: 16000,
            channels: 1,
            timestamp_ms: i * 100,
        })
        .collect()
}

fn engine_with(backend: ScriptedBackend) -> CaptureEngine {
    CaptureEngine::new(Box::new(backend), CaptureConfig::default(), None)
}

#[tokio::test]
async fn test_capture_cycle_produces_wav_artifact() {
    let mut engine = engine_with(ScriptedBackend::new(frames(2)));
    assert_eq!(engine.phase(), CapturePhase::Idle);

    engine.start().await.expect("start");
    assert_eq!(engine.phase(), CapturePhase::Recording);

    engine.stop().await.expect("stop");
    assert_eq!(engine.phase(), CapturePhase::Captured);

    let artifact = engine.finalize().expect("finalize");
    assert_eq!(engine.phase(), CapturePhase::Submitted);
    assert!(artifact.file_name.starts_with("recording-"));
    assert!(artifact.file_name.ends_with(".wav"));
    assert_eq!(artifact.mime_type, "audio/wav");
    assert!((artifact.duration_secs - 0.2).abs() < 1e-9);

    // The bytes are a parseable WAV holding every buffered sample.
    let reader = hound::WavReader::new(Cursor::new(artifact.bytes)).expect("valid WAV");
    assert_eq!(reader.spec().sample_rate, 16000);
    assert_eq!(reader.spec().channels, 1);
    assert_eq!(reader.len(), 3200);
}

#[tokio::test]
async fn test_start_while_recording_is_rejected() {
    let mut engine = engine_with(ScriptedBackend::new(frames(1)));

    engine.start().await.expect("first start");
    let err = engine.start().await.expect_err("second start must fail");
    assert!(err.to_string().contains("already recording"));
    assert_eq!(engine.phase(), CapturePhase::Recording, "state is untouched");

    engine.stop().await.expect("stop still works");
}

#[tokio::test]
async fn test_start_with_capture_pending_is_rejected() {
    let mut engine = engine_with(ScriptedBackend::new(frames(1)));

    engine.start().await.expect("start");
    engine.stop().await.expect("stop");

    engine.start().await.expect_err("start over a pending capture must fail");
    assert_eq!(engine.phase(), CapturePhase::Captured);
}

#[tokio::test]
async fn test_stop_without_recording_is_rejected() {
    let mut engine = engine_with(ScriptedBackend::new(frames(1)));

    engine.stop().await.expect_err("stop from Idle must fail");
    assert_eq!(engine.phase(), CapturePhase::Idle);
}

#[tokio::test]
async fn test_discard_resets_and_allows_a_new_start() {
    let mut engine = engine_with(ScriptedBackend::new(frames(3)));

    engine.start().await.expect("start");
    engine.stop().await.expect("stop");

    engine.discard().expect("discard");
    assert_eq!(engine.phase(), CapturePhase::Idle);
    assert_eq!(engine.elapsed_secs(), 0);
    assert_eq!(engine.elapsed_display(), "00:00");

    engine.start().await.expect("a fresh capture starts");
    assert_eq!(engine.phase(), CapturePhase::Recording);
}

#[tokio::test]
async fn test_discard_without_capture_is_rejected() {
    let mut engine = engine_with(ScriptedBackend::new(frames(1)));
    engine.discard().expect_err("nothing to discard in Idle");
}

#[tokio::test]
async fn test_every_start_is_paired_with_device_release() {
    let backend = ScriptedBackend::new(frames(1));
    let starts = Arc::clone(&backend.starts);
    let released = Arc::clone(&backend.released);
    let mut engine = engine_with(backend);

    engine.start().await.expect("start");
    assert_eq!(starts.load(Ordering::SeqCst), 1);
    assert!(!released.load(Ordering::SeqCst), "device held while recording");

    engine.stop().await.expect("stop");
    assert!(released.load(Ordering::SeqCst), "device released by stop");

    // A second cycle acquires and releases again.
    engine.discard().expect("discard");
    engine.start().await.expect("start again");
    assert_eq!(starts.load(Ordering::SeqCst), 2);
    engine.stop().await.expect("stop again");
    assert!(released.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_unavailable_device_leaves_engine_idle() {
    let mut engine = engine_with(ScriptedBackend::unavailable());

    let err = engine.start().await.expect_err("denied microphone");
    assert!(matches!(
        err.downcast_ref::<PodiumError>(),
        Some(PodiumError::DeviceUnavailable(_))
    ));
    assert_eq!(engine.phase(), CapturePhase::Idle);
}

#[tokio::test]
async fn test_finalize_starts_a_fresh_cycle() {
    let mut engine = engine_with(ScriptedBackend::new(frames(1)));

    engine.start().await.expect("start");
    engine.stop().await.expect("stop");
    engine.finalize().expect("finalize");
    assert_eq!(engine.phase(), CapturePhase::Submitted);
    assert_eq!(engine.elapsed_secs(), 0);

    engine.start().await.expect("next cycle starts from Submitted");
    assert_eq!(engine.phase(), CapturePhase::Recording);
}

#[tokio::test]
async fn test_finalize_rejects_overlong_capture_when_bounded() {
    // 20 frames = 2.0 s of audio against a 1 s limit.
    let engine_backend = ScriptedBackend::new(frames(20));
    let mut engine = CaptureEngine::new(Box::new(engine_backend), CaptureConfig::default(), Some(1));

    engine.start().await.expect("start");
    engine.stop().await.expect("stop");

    let err = engine.finalize().expect_err("overlong capture rejected");
    assert!(matches!(
        err.downcast_ref::<PodiumError>(),
        Some(PodiumError::Validation(_))
    ));
    assert_eq!(
        engine.phase(),
        CapturePhase::Captured,
        "capture is kept so it can be discarded"
    );
    engine.discard().expect("discard");
}
