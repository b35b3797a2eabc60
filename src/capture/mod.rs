pub mod backend;
pub mod engine;
pub mod mic;

pub use backend::{AudioFrame, CaptureBackend, CaptureConfig};
pub use engine::{format_elapsed, CaptureEngine, CapturePhase};
pub use mic::MicBackend;
