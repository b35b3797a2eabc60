use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::api::{AnalysisReport, UploadArtifact};
use crate::auth::AuthManager;
use crate::error::{PodiumError, Result};
use crate::sessions::SessionSync;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitState {
    Idle,
    Submitting,
}

/// Turns "the user has audio and an active session" into one submission.
///
/// Guards run before any in-flight state is entered, one submission runs at
/// a time, and the outcome (report or error message) stays readable until
/// the next attempt.
pub struct Submitter {
    auth: Arc<AuthManager>,
    sessions: SessionSync,
    in_flight: Arc<AtomicBool>,
    last_error: RwLock<Option<String>>,
    last_report: RwLock<Option<AnalysisReport>>,
}

impl Submitter {
    pub fn new(auth: Arc<AuthManager>, sessions: SessionSync) -> Self {
        Self {
            auth,
            sessions,
            in_flight: Arc::new(AtomicBool::new(false)),
            last_error: RwLock::new(None),
            last_report: RwLock::new(None),
        }
    }

    /// Submit an artifact (captured or user-selected) for analysis.
    ///
    /// Rejected up front, with no network traffic, when the client is not
    /// authenticated, there is no artifact, or no session is active.
    pub async fn submit(&self, artifact: Option<UploadArtifact>) -> Result<AnalysisReport> {
        if !self.auth.is_authenticated().await {
            return self.reject(PodiumError::Auth("not signed in".to_string())).await;
        }
        let artifact = match artifact {
            Some(artifact) => artifact,
            None => {
                return self
                    .reject(PodiumError::Precondition("no audio selected".to_string()))
                    .await
            }
        };
        if self.sessions.active_session().await.is_none() {
            return self
                .reject(PodiumError::Precondition("no session selected".to_string()))
                .await;
        }

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(
                PodiumError::Precondition("analysis already in progress".to_string()).into(),
            );
        }
        let _guard = InFlightGuard(Arc::clone(&self.in_flight));

        // A fresh attempt clears the previous outcome.
        *self.last_error.write().await = None;

        info!("submitting {} for analysis", artifact.file_name);
        match self.sessions.submit_analysis(&artifact).await {
            Ok(report) => {
                *self.last_report.write().await = Some(report.clone());
                Ok(report)
            }
            Err(e) => {
                *self.last_error.write().await = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub fn state(&self) -> SubmitState {
        if self.in_flight.load(Ordering::SeqCst) {
            SubmitState::Submitting
        } else {
            SubmitState::Idle
        }
    }

    /// Message of the most recent failed attempt, until a new attempt starts
    pub async fn last_error(&self) -> Option<String> {
        self.last_error.read().await.clone()
    }

    /// Report of the most recent successful attempt
    pub async fn last_report(&self) -> Option<AnalysisReport> {
        self.last_report.read().await.clone()
    }

    async fn reject(&self, error: PodiumError) -> Result<AnalysisReport> {
        *self.last_error.write().await = Some(error.to_string());
        Err(error.into())
    }
}

/// Releases the in-flight flag on every exit path.
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
