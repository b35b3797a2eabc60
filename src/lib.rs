pub mod api;
pub mod auth;
pub mod capture;
pub mod cli;
pub mod config;
pub mod error;
pub mod sessions;
pub mod submit;

pub use api::{
    AnalysisReport, ApiClient, Metrics, PacingSegment, Recording, Session, TokenResponse,
    UploadArtifact, UserProfile,
};
pub use auth::{AuthManager, AuthState, TokenStore};
pub use capture::{AudioFrame, CaptureBackend, CaptureConfig, CaptureEngine, CapturePhase};
pub use config::Config;
pub use error::{PodiumError, Result};
pub use sessions::SessionSync;
pub use submit::{SubmitState, Submitter};
