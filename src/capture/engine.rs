use anyhow::{bail, Context};
use chrono::Utc;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::backend::{CaptureBackend, CaptureConfig};
use crate::api::UploadArtifact;
use crate::error::{PodiumError, Result};

/// Observable lifecycle of a capture cycle.
///
/// `Submitted` is terminal for the cycle that produced it; the next
/// `start()` begins a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePhase {
    Idle,
    Recording,
    Captured,
    Submitted,
}

/// Frames buffered during one recording, in the format the device delivered
struct CapturedAudio {
    samples: Vec<i16>,
    sample_rate: u32,
    channels: u16,
}

enum EngineState {
    Idle,
    Recording { collector: JoinHandle<CapturedAudio> },
    Captured { bytes: Vec<u8>, duration_secs: f64 },
    Submitted,
}

/// Drives one microphone capture at a time: acquire on `start`, buffer
/// frames while recording, finalize to a single in-memory WAV on `stop`,
/// then either `discard` or hand the artifact off via `finalize`.
pub struct CaptureEngine {
    backend: Box<dyn CaptureBackend>,
    config: CaptureConfig,
    max_capture_secs: Option<u64>,
    state: EngineState,
    elapsed_secs: Arc<AtomicU64>,
    recording: Arc<AtomicBool>,
    ticker: Option<JoinHandle<()>>,
}

impl CaptureEngine {
    pub fn new(
        backend: Box<dyn CaptureBackend>,
        config: CaptureConfig,
        max_capture_secs: Option<u64>,
    ) -> Self {
        Self {
            backend,
            config,
            max_capture_secs,
            state: EngineState::Idle,
            elapsed_secs: Arc::new(AtomicU64::new(0)),
            recording: Arc::new(AtomicBool::new(false)),
            ticker: None,
        }
    }

    /// Acquire the microphone and start buffering audio.
    ///
    /// Valid from `Idle` or `Submitted`. Acquisition failure surfaces
    /// `DeviceUnavailable` and leaves the engine where it was.
    pub async fn start(&mut self) -> Result<()> {
        match self.state {
            EngineState::Idle | EngineState::Submitted => {}
            EngineState::Recording { .. } => bail!("already recording"),
            EngineState::Captured { .. } => {
                bail!("a finished capture is pending; discard or submit it first")
            }
        }

        let mut frame_rx = self.backend.start().await?;

        self.elapsed_secs.store(0, Ordering::SeqCst);
        self.recording.store(true, Ordering::SeqCst);

        let elapsed = Arc::clone(&self.elapsed_secs);
        let recording = Arc::clone(&self.recording);
        let ticker = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            interval.tick().await; // the first tick completes immediately
            loop {
                interval.tick().await;
                if !recording.load(Ordering::SeqCst) {
                    break;
                }
                elapsed.fetch_add(1, Ordering::SeqCst);
            }
        });

        let collector = tokio::spawn(async move {
            let mut audio = CapturedAudio {
                samples: Vec::new(),
                sample_rate: 0,
                channels: 0,
            };
            while let Some(frame) = frame_rx.recv().await {
                if audio.sample_rate == 0 {
                    audio.sample_rate = frame.sample_rate;
                    audio.channels = frame.channels;
                }
                audio.samples.extend_from_slice(&frame.samples);
            }
            audio
        });

        self.ticker = Some(ticker);
        self.state = EngineState::Recording { collector };
        info!("recording started ({})", self.backend.name());
        Ok(())
    }

    /// Stop recording and finalize the buffered audio into a WAV artifact.
    ///
    /// Valid only from `Recording`. The device is released before encoding,
    /// on every path.
    pub async fn stop(&mut self) -> Result<()> {
        let collector = match std::mem::replace(&mut self.state, EngineState::Idle) {
            EngineState::Recording { collector } => collector,
            other => {
                self.state = other;
                bail!("not recording");
            }
        };

        self.recording.store(false, Ordering::SeqCst);
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }

        if let Err(e) = self.backend.stop().await {
            warn!("failed to release capture device: {e}");
        }

        let audio = match collector.await {
            Ok(audio) => audio,
            Err(e) => {
                warn!("capture collector failed: {e}");
                CapturedAudio {
                    samples: Vec::new(),
                    sample_rate: 0,
                    channels: 0,
                }
            }
        };

        let sample_rate = if audio.sample_rate == 0 {
            self.config.sample_rate
        } else {
            audio.sample_rate
        };
        let channels = if audio.channels == 0 {
            self.config.channels
        } else {
            audio.channels
        };
        let duration_secs =
            audio.samples.len() as f64 / (sample_rate as f64 * channels.max(1) as f64);

        let bytes = encode_wav(&audio.samples, sample_rate, channels)?;

        info!(
            "recording stopped: {:.1}s captured ({} samples)",
            duration_secs,
            audio.samples.len()
        );
        self.state = EngineState::Captured {
            bytes,
            duration_secs,
        };
        Ok(())
    }

    /// Throw the finished capture away and return to `Idle`.
    pub fn discard(&mut self) -> Result<()> {
        match self.state {
            EngineState::Captured { .. } => {
                self.state = EngineState::Idle;
                self.elapsed_secs.store(0, Ordering::SeqCst);
                info!("capture discarded");
                Ok(())
            }
            _ => bail!("no finished capture to discard"),
        }
    }

    /// Package the finished capture as a named, timestamped artifact.
    ///
    /// Ends the cycle: the engine moves to `Submitted` and the artifact is
    /// handed to the caller. When a maximum capture length is configured,
    /// an overlong capture is rejected and kept so it can be discarded.
    pub fn finalize(&mut self) -> Result<UploadArtifact> {
        let (bytes, duration_secs) =
            match std::mem::replace(&mut self.state, EngineState::Submitted) {
                EngineState::Captured {
                    bytes,
                    duration_secs,
                } => (bytes, duration_secs),
                other => {
                    self.state = other;
                    bail!("no finished capture to submit");
                }
            };

        if let Some(max) = self.max_capture_secs {
            if duration_secs > max as f64 {
                self.state = EngineState::Captured {
                    bytes,
                    duration_secs,
                };
                return Err(PodiumError::Validation(format!(
                    "capture is {duration_secs:.0}s long, the limit is {max}s"
                ))
                .into());
            }
        }

        self.elapsed_secs.store(0, Ordering::SeqCst);
        Ok(UploadArtifact {
            file_name: format!("recording-{}.wav", Utc::now().timestamp_millis()),
            mime_type: "audio/wav".to_string(),
            bytes,
            duration_secs,
        })
    }

    pub fn phase(&self) -> CapturePhase {
        match self.state {
            EngineState::Idle => CapturePhase::Idle,
            EngineState::Recording { .. } => CapturePhase::Recording,
            EngineState::Captured { .. } => CapturePhase::Captured,
            EngineState::Submitted => CapturePhase::Submitted,
        }
    }

    /// Seconds counted by the 1 Hz display timer for the current cycle
    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_secs.load(Ordering::SeqCst)
    }

    pub fn elapsed_display(&self) -> String {
        format_elapsed(self.elapsed_secs())
    }
}

/// Format elapsed seconds as `mm:ss`.
pub fn format_elapsed(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

fn encode_wav(samples: &[i16], sample_rate: u32, channels: u16) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).context("failed to start WAV encoder")?;
        for &sample in samples {
            writer.write_sample(sample).context("failed to encode sample")?;
        }
        writer.finalize().context("failed to finalize WAV data")?;
    }

    Ok(cursor.into_inner())
}
