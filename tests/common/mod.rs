// Shared fixtures for the integration tests: a client wired to a mock
// analysis service and JSON bodies shaped like the real one.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use podium::{ApiClient, AuthManager, SessionSync, TokenStore, UploadArtifact};

pub struct TestClient {
    pub api: Arc<ApiClient>,
    pub auth: Arc<AuthManager>,
    pub sessions: SessionSync,
    pub token_path: PathBuf,
    // Keeps the token directory alive for the duration of the test.
    _token_dir: TempDir,
}

pub fn test_client(base_url: &str) -> TestClient {
    let token_dir = TempDir::new().expect("tempdir");
    let token_path = token_dir.path().join("token");

    let api = Arc::new(ApiClient::new(base_url, 5).expect("api client"));
    let auth = Arc::new(AuthManager::new(
        Arc::clone(&api),
        TokenStore::new(token_path.clone()),
    ));
    let sessions = SessionSync::new(Arc::clone(&api));

    TestClient {
        api,
        auth,
        sessions,
        token_path,
        _token_dir: token_dir,
    }
}

pub fn user_json() -> serde_json::Value {
    serde_json::json!({
        "id": 1,
        "name": "Ada Lovelace",
        "email": "ada@example.com"
    })
}

pub fn token_response_json(token: &str) -> serde_json::Value {
    serde_json::json!({
        "access_token": token,
        "token_type": "bearer",
        "user": user_json()
    })
}

pub fn session_json(id: i64, name: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": name,
        "created_at": "2026-08-01T09:00:00Z"
    })
}

pub fn metrics_json() -> serde_json::Value {
    serde_json::json!({
        "clarity_score": 8.5,
        "total_fillers": 7,
        "words_per_minute": 145.3,
        "pace_feedback": "Good pace!",
        "long_pauses": [12.0, 45.0],
        "pacing_segments": [{"time": 0.0, "wpm": 130.0}, {"time": 10.0, "wpm": 145.0}],
        "filler_words": {"um": 3, "uh": 2},
        "transcript": "Hello everyone, thank you for joining.",
        "duration": 58.0
    })
}

/// The analyze endpoint's merged body: metrics plus ai_feedback.
pub fn report_json() -> serde_json::Value {
    let mut body = metrics_json();
    body["ai_feedback"] = serde_json::json!("Great job! Strong clarity and confidence.");
    body
}

pub fn recording_json(id: i64) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "created_at": "2026-08-01T10:30:00Z",
        "metrics": metrics_json(),
        "ai_feedback": "Keep practicing your transitions."
    })
}

pub fn wav_artifact() -> UploadArtifact {
    UploadArtifact {
        file_name: "take.wav".to_string(),
        mime_type: "audio/wav".to_string(),
        bytes: vec![0u8; 64],
        duration_secs: 1.0,
    }
}

/// Mount a login mock and sign the client in.
pub async fn sign_in(server: &MockServer, client: &TestClient) {
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response_json("tok-test")))
        .mount(server)
        .await;

    client
        .auth
        .login("ada@example.com", "correct-horse")
        .await
        .expect("login");
}
