use tokio::sync::mpsc;

use crate::error::Result;

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Milliseconds since capture started
    pub timestamp_ms: u64,
}

/// Requested capture format. The device may provide something else; frames
/// report the format actually delivered.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
        }
    }
}

/// Microphone acquisition seam.
///
/// The engine drives whatever implements this; the binary plugs in the cpal
/// microphone backend, tests plug in a scripted one.
#[async_trait::async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Acquire the device exclusively and start producing frames.
    ///
    /// Fails with `DeviceUnavailable` when access is denied or no device
    /// exists.
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>>;

    /// Stop producing frames and release the device.
    async fn stop(&mut self) -> Result<()>;

    fn is_capturing(&self) -> bool;

    /// Backend name for logging
    fn name(&self) -> &str;
}
