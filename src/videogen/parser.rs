use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use super::types::GenerationOutcome;

pub const INVALID_RESPONSE_MESSAGE: &str = "Invalid response format from API";
pub const MISSING_URL_MESSAGE: &str = "Completed response missing video URL";
pub const UNKNOWN_FAILURE_MESSAGE: &str = "Unknown error occurred";

/// Where the provider puts the finished video URL. The queue-and-wait HTTP
/// endpoint and the realtime websocket wrap the result differently, so each
/// transport is configured with its own shape.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResponseShape {
    /// `{"video": {"url": ...}}`, the raw model output
    VideoUrl,
    /// `{"data": {"url": ...}}`
    DataUrl,
    /// `{"result": {"url": ...}}`
    ResultUrl,
    /// `{"url": ...}`
    TopLevelUrl,
}

impl ResponseShape {
    pub fn parser(self) -> Arc<dyn ResponseParser> {
        match self {
            Self::VideoUrl => Arc::new(NestedUrlParser { container: "video" }),
            Self::DataUrl => Arc::new(NestedUrlParser { container: "data" }),
            Self::ResultUrl => Arc::new(NestedUrlParser {
                container: "result",
            }),
            Self::TopLevelUrl => Arc::new(TopLevelUrlParser),
        }
    }
}

/// Decodes raw provider payloads into outcomes.
///
/// Implementors only decide where the video URL lives; status handling is
/// shared.
pub trait ResponseParser: Send + Sync {
    fn locate_url<'a>(&self, payload: &'a Value) -> Option<&'a str>;

    /// Decodes one streamed status message. `None` means the message carries
    /// nothing to relay (queue position updates, unknown statuses) and the
    /// caller should keep reading.
    fn parse(&self, raw: &str) -> Option<GenerationOutcome> {
        let Ok(payload) = serde_json::from_str::<Value>(raw) else {
            return Some(GenerationOutcome::failed(INVALID_RESPONSE_MESSAGE));
        };
        self.parse_value(&payload)
    }

    fn parse_value(&self, payload: &Value) -> Option<GenerationOutcome> {
        let status = payload.get("status")?.as_str()?;

        match status {
            "IN_PROGRESS" => Some(GenerationOutcome::Progress {
                logs: extract_logs(payload),
            }),
            "COMPLETED" => Some(self.completed(payload)),
            "FAILED" => Some(GenerationOutcome::failed(
                extract_error(payload).unwrap_or_else(|| UNKNOWN_FAILURE_MESSAGE.to_string()),
            )),
            other => {
                tracing::trace!("Ignoring provider status {}", other);
                None
            }
        }
    }

    /// Decodes the single response of a synchronous call. A payload without a
    /// status discriminator is the finished result itself.
    fn parse_result(&self, raw: &str) -> GenerationOutcome {
        let Ok(payload) = serde_json::from_str::<Value>(raw) else {
            return GenerationOutcome::failed(INVALID_RESPONSE_MESSAGE);
        };

        if payload.get("status").is_none() {
            return self.completed(&payload);
        }

        match self.parse_value(&payload) {
            Some(outcome) if outcome.is_terminal() => outcome,
            _ => GenerationOutcome::failed("Provider returned no final result"),
        }
    }

    fn completed(&self, payload: &Value) -> GenerationOutcome {
        match self.locate_url(payload) {
            Some(url) => GenerationOutcome::Completed {
                video_url: url.to_string(),
                request_id: extract_request_id(payload),
            },
            None => GenerationOutcome::failed(MISSING_URL_MESSAGE),
        }
    }
}

struct NestedUrlParser {
    container: &'static str,
}

impl ResponseParser for NestedUrlParser {
    fn locate_url<'a>(&self, payload: &'a Value) -> Option<&'a str> {
        payload.get(self.container)?.get("url")?.as_str()
    }
}

struct TopLevelUrlParser;

impl ResponseParser for TopLevelUrlParser {
    fn locate_url<'a>(&self, payload: &'a Value) -> Option<&'a str> {
        payload.get("url")?.as_str()
    }
}

fn extract_request_id(payload: &Value) -> Option<String> {
    payload
        .get("requestId")
        .or_else(|| payload.get("request_id"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Log lines come either as plain strings or as `{"message": ...}` objects
fn extract_logs(payload: &Value) -> Vec<String> {
    let Some(logs) = payload.get("logs").and_then(Value::as_array) else {
        return Vec::new();
    };

    logs.iter()
        .filter_map(|entry| match entry {
            Value::String(line) => Some(line.clone()),
            Value::Object(obj) => obj
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        })
        .collect()
}

/// Provider error text from `error`, `detail` or `message`
pub fn extract_error(payload: &Value) -> Option<String> {
    ["error", "detail", "message"]
        .iter()
        .filter_map(|key| payload.get(*key))
        .find_map(|value| match value {
            Value::Null => None,
            Value::String(text) if text.is_empty() => None,
            Value::String(text) => Some(text.clone()),
            other => Some(other.to_string()),
        })
}
