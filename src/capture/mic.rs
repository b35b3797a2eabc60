// Microphone capture via cpal. The stream is owned by a dedicated thread
// because cpal streams are not Send; the thread holds it until told to stop,
// and dropping the stream releases the device.

use anyhow::bail;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;
use std::sync::mpsc as std_mpsc;
use std::thread;
use std::time::Instant;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use super::backend::{AudioFrame, CaptureBackend, CaptureConfig};
use crate::error::{PodiumError, Result};

pub struct MicBackend {
    config: CaptureConfig,
    capturing: bool,
    stop_tx: Option<std_mpsc::Sender<()>>,
    join_handle: Option<thread::JoinHandle<()>>,
}

impl MicBackend {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            capturing: false,
            stop_tx: None,
            join_handle: None,
        }
    }
}

#[async_trait::async_trait]
impl CaptureBackend for MicBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.capturing {
            bail!("already capturing");
        }

        let (frame_tx, frame_rx) = mpsc::channel(64);
        let (stop_tx, stop_rx) = std_mpsc::channel();
        let (ready_tx, ready_rx) = oneshot::channel();

        let requested = self.config.clone();
        let handle = thread::spawn(move || capture_thread(requested, frame_tx, stop_rx, ready_tx));

        match ready_rx.await {
            Ok(Ok(())) => {}
            Ok(Err(message)) => {
                let _ = handle.join();
                return Err(PodiumError::DeviceUnavailable(message).into());
            }
            Err(_) => {
                let _ = handle.join();
                return Err(PodiumError::DeviceUnavailable(
                    "capture thread exited before the stream opened".to_string(),
                )
                .into());
            }
        }

        self.stop_tx = Some(stop_tx);
        self.join_handle = Some(handle);
        self.capturing = true;

        info!("microphone capture started");
        Ok(frame_rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if !self.capturing {
            return Ok(());
        }

        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.join_handle.take() {
            if handle.join().is_err() {
                warn!("capture thread panicked");
            }
        }

        self.capturing = false;
        info!("microphone capture stopped");
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "microphone"
    }
}

impl Drop for MicBackend {
    // Release the device even if the owner never called stop().
    fn drop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.join();
        }
    }
}

fn capture_thread(
    requested: CaptureConfig,
    frames: mpsc::Sender<AudioFrame>,
    stop_rx: std_mpsc::Receiver<()>,
    ready_tx: oneshot::Sender<std::result::Result<(), String>>,
) {
    let host = cpal::default_host();
    let device = match host.default_input_device() {
        Some(device) => device,
        None => {
            let _ = ready_tx.send(Err("no input device found".to_string()));
            return;
        }
    };

    let supported = match device.default_input_config() {
        Ok(config) => config,
        Err(e) => {
            let _ = ready_tx.send(Err(format!("could not read device configuration: {e}")));
            return;
        }
    };

    let sample_rate = supported.sample_rate().0;
    let channels = supported.channels();
    if sample_rate != requested.sample_rate || channels != requested.channels {
        info!(
            "requested {}Hz/{}ch, device provides {}Hz/{}ch",
            requested.sample_rate, requested.channels, sample_rate, channels
        );
    }

    let stream_config = supported.config();
    let sample_format = supported.sample_format();
    let started = Instant::now();
    let err_fn = |e: cpal::StreamError| warn!("capture stream error: {e}");

    let stream_result = match sample_format {
        SampleFormat::F32 => device.build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let samples = data.iter().map(|&s| float_to_i16(s)).collect();
                push_frame(&frames, samples, sample_rate, channels, started);
            },
            err_fn,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            &stream_config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                push_frame(&frames, data.to_vec(), sample_rate, channels, started);
            },
            err_fn,
            None,
        ),
        SampleFormat::U16 => device.build_input_stream(
            &stream_config,
            move |data: &[u16], _: &cpal::InputCallbackInfo| {
                let samples = data.iter().map(|&s| (s as i32 - 32768) as i16).collect();
                push_frame(&frames, samples, sample_rate, channels, started);
            },
            err_fn,
            None,
        ),
        other => {
            let _ = ready_tx.send(Err(format!("unsupported sample format {other:?}")));
            return;
        }
    };

    let stream = match stream_result {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(format!("could not open capture stream: {e}")));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(format!("could not start capture stream: {e}")));
        return;
    }

    let _ = ready_tx.send(Ok(()));

    // Hold the stream until asked to stop. Dropping it releases the device
    // and closes the frame channel.
    let _ = stop_rx.recv();
    drop(stream);
}

fn push_frame(
    frames: &mpsc::Sender<AudioFrame>,
    samples: Vec<i16>,
    sample_rate: u32,
    channels: u16,
    started: Instant,
) {
    if samples.is_empty() {
        return;
    }

    let frame = AudioFrame {
        samples,
        sample_rate,
        channels,
        timestamp_ms: started.elapsed().as_millis() as u64,
    };

    // Audio callbacks must never block; drop the frame when the buffer is full.
    if let Err(TrySendError::Full(_)) = frames.try_send(frame) {
        warn!("frame buffer full, dropping audio");
    }
}

fn float_to_i16(sample: f32) -> i16 {
    let clamped = sample.clamp(-1.0, 1.0);
    (clamped * i16::MAX as f32) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_to_i16_clamps_out_of_range() {
        assert_eq!(float_to_i16(1.5), i16::MAX);
        assert_eq!(float_to_i16(-1.5), -i16::MAX);
        assert_eq!(float_to_i16(0.0), 0);
    }
}
