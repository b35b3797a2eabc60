pub mod client;
pub mod types;

pub use client::ApiClient;
pub use types::{
    AnalysisReport, Metrics, PacingSegment, Recording, Session, TokenResponse, UploadArtifact,
    UserProfile,
};
