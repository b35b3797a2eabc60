use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::api::{AnalysisReport, ApiClient, Recording, Session, UploadArtifact};
use crate::error::{PodiumError, Result};

#[derive(Default)]
struct SyncState {
    sessions: Vec<Session>,
    active_id: Option<i64>,
    /// Recordings of the active session, newest first, replaced wholesale
    recordings: Vec<Recording>,
}

/// Fetches and caches the session list and the active session's recordings.
///
/// Cheap to clone; clones share state. The generation counter tags every
/// recordings fetch with the session switch it belongs to, so a response
/// that arrives after a further switch is discarded instead of being shown
/// under the wrong session.
#[derive(Clone)]
pub struct SessionSync {
    api: Arc<ApiClient>,
    state: Arc<RwLock<SyncState>>,
    generation: Arc<AtomicU64>,
}

impl SessionSync {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self {
            api,
            state: Arc::new(RwLock::new(SyncState::default())),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Fetch the user's sessions, in the order the service returns them.
    ///
    /// When nothing is active yet and the list is non-empty, the first
    /// entry becomes active and its recordings are fetched.
    pub async fn list_sessions(&self) -> Result<Vec<Session>> {
        let sessions = self.api.list_sessions().await?;

        let newly_active = {
            let mut state = self.state.write().await;
            state.sessions = sessions.clone();
            let first_id = state.sessions.first().map(|s| s.id);
            match (state.active_id, first_id) {
                (None, Some(id)) => {
                    state.active_id = Some(id);
                    Some(id)
                }
                _ => None,
            }
        };

        if let Some(id) = newly_active {
            self.generation.fetch_add(1, Ordering::SeqCst);
            info!("session {id} is now active");
            self.refresh_recordings(id).await?;
        }

        Ok(sessions)
    }

    /// Create a session and make it the active one.
    pub async fn create_session(&self, name: &str) -> Result<Session> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PodiumError::Validation("session name is required".to_string()).into());
        }

        let session = self.api.create_session(name).await?;
        {
            let mut state = self.state.write().await;
            state.sessions.insert(0, session.clone());
            state.active_id = Some(session.id);
            state.recordings.clear();
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
        info!("created session '{}' ({})", session.name, session.id);

        self.refresh_recordings(session.id).await?;
        Ok(session)
    }

    /// Switch the active session and fetch its recordings.
    pub async fn select_session(&self, session_id: i64) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if !state.sessions.iter().any(|s| s.id == session_id) {
                return Err(PodiumError::Validation(format!("unknown session {session_id}")).into());
            }
            state.active_id = Some(session_id);
            state.recordings.clear();
        }
        self.generation.fetch_add(1, Ordering::SeqCst);

        self.refresh_recordings(session_id).await
    }

    /// Fetch the recordings of one session and replace the cached list.
    ///
    /// The response is applied only if no session switch happened while the
    /// request was in flight and `session_id` is still the active session;
    /// a late response for an abandoned session is dropped.
    pub async fn refresh_recordings(&self, session_id: i64) -> Result<()> {
        let generation = self.generation.load(Ordering::SeqCst);
        let recordings = self.api.list_recordings(session_id).await?;

        let mut state = self.state.write().await;
        let still_current = self.generation.load(Ordering::SeqCst) == generation
            && state.active_id == Some(session_id);
        if still_current {
            info!(
                "loaded {} recordings for session {session_id}",
                recordings.len()
            );
            state.recordings = recordings;
        } else {
            debug!("discarding stale recordings response for session {session_id}");
        }
        Ok(())
    }

    /// Submit an artifact for analysis against the active session.
    ///
    /// Fails locally, with no network call, when no session is active. On
    /// success the session's recordings are re-fetched once so the history
    /// matches the server's view; the new recording is never synthesized
    /// locally (the server owns `id` and `created_at`).
    pub async fn submit_analysis(&self, artifact: &UploadArtifact) -> Result<AnalysisReport> {
        let session_id = match self.state.read().await.active_id {
            Some(id) => id,
            None => {
                return Err(PodiumError::Precondition("no session selected".to_string()).into())
            }
        };

        let report = self.api.analyze(session_id, artifact).await?;
        self.refresh_recordings(session_id).await?;
        Ok(report)
    }

    pub async fn sessions(&self) -> Vec<Session> {
        self.state.read().await.sessions.clone()
    }

    pub async fn active_session(&self) -> Option<Session> {
        let state = self.state.read().await;
        let active_id = state.active_id?;
        state.sessions.iter().find(|s| s.id == active_id).cloned()
    }

    pub async fn recordings(&self) -> Vec<Recording> {
        self.state.read().await.recordings.clone()
    }
}

/// Display number for a recording in a newest-first list: the oldest
/// visible recording is number 1.
pub fn recording_number(index: usize, total: usize) -> usize {
    total.saturating_sub(index)
}
