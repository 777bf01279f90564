use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::GenerationDefaults;

/// Payload sent to the provider for a single prompt
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GenerationRequest {
    pub input: GenerationInput,
    pub logs: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GenerationInput {
    pub prompt: String,
    pub negative_prompt: String,
    pub num_frames: u32,
    pub style: String,
    pub duration: u32,
}

impl GenerationRequest {
    pub fn new(prompt: &str, defaults: &GenerationDefaults) -> Self {
        Self {
            input: GenerationInput {
                prompt: prompt.to_string(),
                negative_prompt: defaults.negative_prompt.clone(),
                num_frames: defaults.num_frames,
                style: defaults.style.clone(),
                duration: defaults.duration,
            },
            logs: true,
        }
    }
}

/// A single event produced while generating one prompt.
///
/// Serialized exactly as the streaming endpoint forwards it to callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GenerationOutcome {
    Progress {
        logs: Vec<String>,
    },
    Completed {
        video_url: String,
        request_id: Option<String>,
    },
    #[serde(rename = "error")]
    Failed {
        error: String,
    },
}

impl GenerationOutcome {
    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress { .. })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Success,
    Error,
}

/// Outcome of one prompt in a batch, in the same position as its prompt
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct BatchResultEntry {
    pub prompt: String,
    pub status: BatchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchResultEntry {
    /// Maps a terminal outcome onto the entry for `prompt`. A progress event
    /// here means the client stopped early, which is recorded as an error.
    pub fn from_outcome(prompt: String, outcome: GenerationOutcome) -> Self {
        match outcome {
            GenerationOutcome::Completed {
                video_url,
                request_id,
            } => Self {
                prompt,
                status: BatchStatus::Success,
                video_url: Some(video_url),
                request_id,
                error: None,
            },
            GenerationOutcome::Failed { error } => Self::error(prompt, error),
            GenerationOutcome::Progress { .. } => {
                Self::error(prompt, "Generation ended without a result".to_string())
            }
        }
    }

    fn error(prompt: String, error: String) -> Self {
        Self {
            prompt,
            status: BatchStatus::Error,
            video_url: None,
            request_id: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GenerateRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GenerateResponse {
    pub status: String,
    pub video_url: String,
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BatchResponse {
    pub results: Vec<BatchResultEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_outcome_wire_format() {
        let progress = GenerationOutcome::Progress {
            logs: vec!["step 1".to_string()],
        };
        assert_eq!(
            serde_json::to_value(&progress).unwrap(),
            json!({"status": "progress", "logs": ["step 1"]})
        );

        let completed = GenerationOutcome::Completed {
            video_url: "https://x/1.mp4".to_string(),
            request_id: Some("req-1".to_string()),
        };
        assert_eq!(
            serde_json::to_value(&completed).unwrap(),
            json!({"status": "completed", "video_url": "https://x/1.mp4", "request_id": "req-1"})
        );

        let failed = GenerationOutcome::failed("provider timeout");
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({"status": "error", "error": "provider timeout"})
        );
    }

    #[test]
    fn test_terminal_events() {
        assert!(!GenerationOutcome::Progress { logs: vec![] }.is_terminal());
        assert!(GenerationOutcome::failed("x").is_terminal());
        assert!(GenerationOutcome::Completed {
            video_url: "u".to_string(),
            request_id: None
        }
        .is_terminal());
    }

    #[test]
    fn test_batch_entry_populates_one_side() {
        let ok = BatchResultEntry::from_outcome(
            "sunset over ocean".to_string(),
            GenerationOutcome::Completed {
                video_url: "https://x/1.mp4".to_string(),
                request_id: None,
            },
        );
        assert_eq!(ok.status, BatchStatus::Success);
        assert!(ok.error.is_none());
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"prompt": "sunset over ocean", "status": "success", "video_url": "https://x/1.mp4"})
        );

        let err = BatchResultEntry::from_outcome(
            "city at night".to_string(),
            GenerationOutcome::failed("provider timeout"),
        );
        assert_eq!(err.status, BatchStatus::Error);
        assert!(err.video_url.is_none());
        assert_eq!(err.error.as_deref(), Some("provider timeout"));
    }

    #[test]
    fn test_request_carries_defaults() {
        let request = GenerationRequest::new("a cat", &GenerationDefaults::default());
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["input"]["prompt"], "a cat");
        assert_eq!(value["input"]["negative_prompt"], "blurry, low quality");
        assert_eq!(value["input"]["num_frames"], 24);
        assert_eq!(value["input"]["duration"], 5);
        assert_eq!(value["logs"], true);
    }
}
