//! Error types shared across the client.
//!
//! Validation and precondition failures are raised locally, before any
//! network traffic; auth, device, and request failures come back from the
//! collaborators they name.

use thiserror::Error;

/// Main error type for client operations
#[derive(Error, Debug)]
pub enum PodiumError {
    /// Bad credentials, or an expired/invalid token
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Microphone denied or absent
    #[error("Microphone unavailable: {0}")]
    DeviceUnavailable(String),

    /// Empty or malformed required input, caught before any request
    #[error("Validation error: {0}")]
    Validation(String),

    /// Operation attempted without its prerequisites (no file, no session)
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Network failure or non-success response on an otherwise-valid request
    #[error("Request failed: {0}")]
    Request(String),
}

/// Result alias used throughout the crate.
///
/// Uses `anyhow::Error` so call sites can attach context with `?` while the
/// typed [`PodiumError`] variants stay reachable via `downcast_ref`.
pub type Result<T> = anyhow::Result<T>;
