use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

use super::types::{AnalysisReport, Recording, Session, TokenResponse, UploadArtifact, UserProfile};
use crate::error::{PodiumError, Result};

/// HTTP client for the analysis/identity service.
///
/// Owns the access token for the whole process. The token sits behind a
/// single `RwLock` so replacement is atomic: a request either sees the old
/// token or the new one, never a partial update.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: RwLock::new(None),
        })
    }

    pub async fn set_token(&self, token: String) {
        *self.token.write().await = Some(token);
    }

    pub async fn clear_token(&self) {
        *self.token.write().await = None;
    }

    pub async fn token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    /// POST /api/auth/login
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenResponse> {
        let response = self
            .http
            .post(self.url("/api/auth/login"))
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| PodiumError::Request(format!("login request failed: {e}")))?;

        if !response.status().is_success() {
            let detail = error_detail(response, "Login failed").await;
            return Err(PodiumError::Auth(detail).into());
        }

        self.parse(response).await
    }

    /// POST /api/auth/register
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<TokenResponse> {
        let response = self
            .http
            .post(self.url("/api/auth/register"))
            .json(&serde_json::json!({ "name": name, "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| PodiumError::Request(format!("register request failed: {e}")))?;

        if !response.status().is_success() {
            let detail = error_detail(response, "Registration failed").await;
            return Err(PodiumError::Auth(detail).into());
        }

        self.parse(response).await
    }

    /// GET /api/auth/me
    pub async fn me(&self) -> Result<UserProfile> {
        let token = self.bearer().await?;
        let response = self
            .http
            .get(self.url("/api/auth/me"))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| PodiumError::Request(format!("identity request failed: {e}")))?;

        if !response.status().is_success() {
            let detail = error_detail(response, "Session is no longer valid").await;
            return Err(PodiumError::Auth(detail).into());
        }

        self.parse(response).await
    }

    /// GET /api/sessions
    pub async fn list_sessions(&self) -> Result<Vec<Session>> {
        let token = self.bearer().await?;
        let response = self
            .http
            .get(self.url("/api/sessions"))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| PodiumError::Request(format!("session listing failed: {e}")))?;

        if !response.status().is_success() {
            let detail = error_detail(response, "Could not load sessions").await;
            return Err(PodiumError::Request(detail).into());
        }

        self.parse(response).await
    }

    /// POST /api/sessions
    pub async fn create_session(&self, name: &str) -> Result<Session> {
        let token = self.bearer().await?;
        let response = self
            .http
            .post(self.url("/api/sessions"))
            .bearer_auth(&token)
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await
            .map_err(|e| PodiumError::Request(format!("session creation failed: {e}")))?;

        if !response.status().is_success() {
            let detail = error_detail(response, "Could not create session").await;
            return Err(PodiumError::Request(detail).into());
        }

        self.parse(response).await
    }

    /// GET /api/sessions/{id}/recordings
    pub async fn list_recordings(&self, session_id: i64) -> Result<Vec<Recording>> {
        let token = self.bearer().await?;
        let response = self
            .http
            .get(self.url(&format!("/api/sessions/{session_id}/recordings")))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| PodiumError::Request(format!("recordings listing failed: {e}")))?;

        if !response.status().is_success() {
            let detail = error_detail(response, "Could not load recordings").await;
            return Err(PodiumError::Request(detail).into());
        }

        self.parse(response).await
    }

    /// POST /api/sessions/{id}/analyze with the artifact as a multipart file
    pub async fn analyze(&self, session_id: i64, artifact: &UploadArtifact) -> Result<AnalysisReport> {
        let token = self.bearer().await?;

        let part = Part::bytes(artifact.bytes.clone())
            .file_name(artifact.file_name.clone())
            .mime_str(&artifact.mime_type)
            .map_err(|e| PodiumError::Request(format!("invalid upload part: {e}")))?;
        let form = Form::new().part("file", part);

        debug!(
            "submitting {} ({} bytes) to session {}",
            artifact.file_name,
            artifact.bytes.len(),
            session_id
        );

        let response = self
            .http
            .post(self.url(&format!("/api/sessions/{session_id}/analyze")))
            .bearer_auth(&token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| PodiumError::Request(format!("analysis request failed: {e}")))?;

        if !response.status().is_success() {
            let detail = error_detail(response, "Analysis failed").await;
            return Err(PodiumError::Request(detail).into());
        }

        self.parse(response).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn bearer(&self) -> Result<String> {
        match self.token.read().await.clone() {
            Some(token) => Ok(token),
            None => Err(PodiumError::Auth("not authenticated".to_string()).into()),
        }
    }

    async fn parse<T: serde::de::DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| PodiumError::Request(format!("malformed response: {e}")).into())
    }
}

/// Extract the human-readable `detail` from a non-success body, falling back
/// to a generic message when the body has none.
async fn error_detail(response: reqwest::Response, fallback: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        detail: Option<String>,
    }

    match response.json::<ErrorBody>().await {
        Ok(ErrorBody { detail: Some(detail) }) if !detail.is_empty() => detail,
        _ => fallback.to_string(),
    }
}
