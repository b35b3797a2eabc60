use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{PodiumError, Result};

/// The identity bound to an access token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub name: String,
    pub email: String,
}

/// Response from the login/register endpoints.
///
/// Carries the identity alongside the token so the client can enter the
/// authenticated state without a follow-up identity request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub user: UserProfile,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// A named container grouping a user's practice recordings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// One submitted-and-analyzed audio attempt within a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recording {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub metrics: Metrics,
    #[serde(default)]
    pub ai_feedback: String,
}

/// Analysis result payload for one recording.
///
/// Produced by the remote analysis service; stored and forwarded as a value,
/// never interpreted here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metrics {
    pub clarity_score: f64,
    pub total_fillers: u32,
    pub words_per_minute: f64,
    pub pace_feedback: String,
    /// Timestamps (seconds) of pauses longer than the service's threshold
    #[serde(default)]
    pub long_pauses: Vec<f64>,
    #[serde(default)]
    pub pacing_segments: Vec<PacingSegment>,
    #[serde(default)]
    pub filler_words: HashMap<String, u32>,
    pub transcript: String,
    /// Total speech duration in seconds
    pub duration: f64,
}

/// One point of the words-per-minute-over-time series
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingSegment {
    pub time: f64,
    pub wpm: f64,
}

/// Full response of the analyze endpoint: metrics plus coaching feedback,
/// merged into a single object on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    #[serde(flatten)]
    pub metrics: Metrics,
    #[serde(default)]
    pub ai_feedback: String,
}

/// File types the analysis service accepts
const ALLOWED_EXTENSIONS: &[&str] = &["mp3", "mp4", "mpeg", "mpga", "m4a", "wav", "webm"];

/// A named, file-like audio artifact ready for submission.
///
/// Both submission paths produce one of these: a finished capture via
/// `CaptureEngine::finalize`, or a user-selected file via [`UploadArtifact::from_file`].
#[derive(Debug, Clone)]
pub struct UploadArtifact {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub duration_secs: f64,
}

impl UploadArtifact {
    /// Build an artifact from a file on disk.
    ///
    /// Rejects extensions the analysis service would refuse, before any
    /// bytes are read or sent.
    pub fn from_file(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(PodiumError::Validation(format!(
                "unsupported file type '.{}', allowed: {}",
                extension,
                ALLOWED_EXTENSIONS.join(", ")
            ))
            .into());
        }

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();

        let bytes = std::fs::read(path)?;

        Ok(Self {
            file_name,
            mime_type: mime_for_extension(&extension),
            bytes,
            duration_secs: 0.0,
        })
    }
}

fn mime_for_extension(extension: &str) -> String {
    match extension {
        "mp3" | "mpga" => "audio/mpeg",
        "mp4" => "video/mp4",
        "mpeg" => "video/mpeg",
        "m4a" => "audio/mp4",
        "wav" => "audio/wav",
        "webm" => "audio/webm",
        _ => "application/octet-stream",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_report_deserializes_merged_payload() {
        // Shape returned by the analysis service: metrics keys and
        // ai_feedback flattened into one object.
        let body = serde_json::json!({
            "clarity_score": 8.5,
            "total_fillers": 7,
            "words_per_minute": 145.3,
            "pace_feedback": "Good pace!",
            "long_pauses": [12.0, 45.0],
            "pacing_segments": [{"time": 0, "wpm": 130.0}, {"time": 10, "wpm": 145.0}],
            "filler_words": {"um": 3, "uh": 2, "like": 2},
            "transcript": "Hello everyone, thank you for joining.",
            "duration": 58.0,
            "ai_feedback": "Great job! Strong clarity and confidence."
        });

        let report: AnalysisReport = serde_json::from_value(body).expect("deserialize");
        assert_eq!(report.metrics.clarity_score, 8.5);
        assert_eq!(report.metrics.total_fillers, 7);
        assert_eq!(report.metrics.filler_words.get("um"), Some(&3));
        assert_eq!(report.metrics.pacing_segments.len(), 2);
        assert_eq!(report.metrics.long_pauses, vec![12.0, 45.0]);
        assert!(report.ai_feedback.starts_with("Great job"));
    }

    #[test]
    fn test_recording_listing_deserializes() {
        let body = serde_json::json!([{
            "id": 42,
            "created_at": "2026-08-01T10:30:00Z",
            "metrics": {
                "clarity_score": 6.0,
                "total_fillers": 12,
                "words_per_minute": 171.2,
                "pace_feedback": "Too fast - slow down to 120-160 WPM",
                "transcript": "So basically this is the plan.",
                "duration": 31.5
            },
            "ai_feedback": "Slow down at transitions."
        }]);

        let recordings: Vec<Recording> = serde_json::from_value(body).expect("deserialize");
        assert_eq!(recordings.len(), 1);
        assert_eq!(recordings[0].id, 42);
        assert!(recordings[0].metrics.long_pauses.is_empty());
        assert_eq!(recordings[0].ai_feedback, "Slow down at transitions.");
    }

    #[test]
    fn test_token_response_defaults_token_type() {
        let body = serde_json::json!({
            "access_token": "tok-123",
            "user": {"id": 1, "name": "Ada", "email": "ada@example.com"}
        });

        let resp: TokenResponse = serde_json::from_value(body).expect("deserialize");
        assert_eq!(resp.token_type, "bearer");
        assert_eq!(resp.user.email, "ada@example.com");
    }

    #[test]
    fn test_from_file_rejects_unsupported_extension() {
        let err = UploadArtifact::from_file(Path::new("/tmp/notes.txt")).unwrap_err();
        match err.downcast_ref::<PodiumError>() {
            Some(PodiumError::Validation(msg)) => assert!(msg.contains(".txt")),
            other => panic!("expected Validation, got {:?}", other),
        }
    }

    #[test]
    fn test_from_file_reads_wav() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("take-1.wav");
        std::fs::write(&path, b"RIFF....WAVE").expect("write fixture");

        let artifact = UploadArtifact::from_file(&path).expect("artifact");
        assert_eq!(artifact.file_name, "take-1.wav");
        assert_eq!(artifact.mime_type, "audio/wav");
        assert_eq!(artifact.bytes, b"RIFF....WAVE");
    }
}
