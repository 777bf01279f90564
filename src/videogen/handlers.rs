use std::collections::VecDeque;
use std::sync::Arc;

use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::JsonRejection,
        ws::{Message, WebSocket, WebSocketUpgrade},
        Multipart, State,
    },
    response::Response,
    Json,
};
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tracing::{debug, info, instrument, warn};

use crate::app_state::AppState;
use crate::consts::UPLOAD_FIELD_NAME;
use crate::error::{ApiError, AppError, ErrorBody, INTERNAL_ERROR_MESSAGE};

use super::batch::run_batch;
use super::prompt_source::{normalize, UploadKind};
use super::records::GenerationRecord;
use super::types::{
    BatchResponse, GenerateRequest, GenerateResponse, GenerationOutcome,
};

/// Trimmed prompt, or `MissingPrompt` when absent or blank
pub fn require_prompt(prompt: Option<String>) -> Result<String, ApiError> {
    match prompt.as_deref().map(str::trim) {
        Some(prompt) if !prompt.is_empty() => Ok(prompt.to_string()),
        _ => Err(ApiError::MissingPrompt),
    }
}

/// Generate a single video and wait for the result
#[utoipa::path(
    post,
    path = "/generate",
    request_body = GenerateRequest,
    responses(
        (status = 200, description = "Video generated", body = GenerateResponse),
        (status = 400, description = "Missing prompt or malformed body", body = ErrorBody),
        (status = 502, description = "Provider failed to generate the video", body = ErrorBody),
    ),
    tag = "VideoGen"
)]
#[instrument(skip(state, payload))]
pub async fn generate_video(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>, AppError> {
    let Json(request) = payload.map_err(|e| {
        warn!("Rejected generate request body: {}", e);
        ApiError::InvalidRequest
    })?;
    let prompt = require_prompt(request.prompt)?;

    let outcome = state.generation_client.generate(&prompt).await;
    state.records.record(&prompt, &outcome).await;

    match outcome {
        GenerationOutcome::Completed {
            video_url,
            request_id,
        } => {
            info!("Generation completed: {}", video_url);
            Ok(Json(GenerateResponse {
                status: "completed".to_string(),
                video_url,
                request_id,
            }))
        }
        GenerationOutcome::Failed { error } => Err(AppError::Provider(error)),
        GenerationOutcome::Progress { .. } => Err(AppError::Provider(
            "Generation ended without a result".to_string(),
        )),
    }
}

/// Generate one video per row of an uploaded CSV file
#[utoipa::path(
    post,
    path = "/batch",
    request_body(
        content = String,
        content_type = "multipart/form-data",
        description = "CSV file in the `file` field, one prompt per row (first column)"
    ),
    responses(
        (status = 200, description = "One result per prompt, in upload order", body = BatchResponse),
        (status = 400, description = "Missing, unnamed, empty or non-CSV upload", body = ErrorBody),
        (status = 413, description = "Upload too large", body = ErrorBody),
    ),
    tag = "VideoGen"
)]
#[instrument(skip(state, multipart))]
pub async fn batch_generate(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<BatchResponse>, AppError> {
    let mut multipart = multipart.map_err(|e| {
        warn!("Batch request is not a multipart upload: {}", e);
        ApiError::MissingFile
    })?;

    let (filename, bytes) = read_upload(&mut multipart)
        .await?
        .ok_or(ApiError::MissingFile)?;
    let filename = filename
        .filter(|name| !name.trim().is_empty())
        .ok_or(ApiError::EmptyFilename)?;

    let kind = UploadKind::from_filename(&filename)?;
    let prompts = normalize(&bytes, kind)?;

    info!("Batch upload {} contains {} prompts", filename, prompts.len());

    let results = run_batch(
        state.generation_client.as_ref(),
        &state.records,
        prompts,
        state.config.batch_pacing(),
    )
    .await;

    Ok(Json(BatchResponse { results }))
}

/// Finished generations, newest first
#[utoipa::path(
    get,
    path = "/generations",
    responses(
        (status = 200, description = "Recorded generations", body = [GenerationRecord]),
    ),
    tag = "VideoGen"
)]
pub async fn list_generations(State(state): State<Arc<AppState>>) -> Json<Vec<GenerationRecord>> {
    Json(state.records.list().await)
}

/// Returns the uploaded file's name and contents, skipping any other fields
async fn read_upload(
    multipart: &mut Multipart,
) -> Result<Option<(Option<String>, Vec<u8>)>, AppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD_NAME) {
            continue;
        }
        let filename = field.file_name().map(str::to_string);
        let bytes = field.bytes().await?;
        return Ok(Some((filename, bytes.to_vec())));
    }
    Ok(None)
}

pub const QUEUE_FULL_MESSAGE: &str = "Too many prompts waiting; wait for the current generation";

/// Streaming generation over a websocket.
///
/// Each text message is a `{"prompt": ...}` request; every outcome of that
/// generation is forwarded as it arrives. Prompts sent while a generation is
/// running wait their turn, up to `max_queued_prompts`; beyond that they are
/// answered with an error event. The socket stays open for further prompts
/// until the caller closes it.
pub async fn generate_ws(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

type CallerSink = SplitSink<WebSocket, Message>;
type CallerStream = SplitStream<WebSocket>;

enum Relay {
    Finished,
    CallerGone,
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    // Requests that arrived while a generation was still streaming
    let mut queued: VecDeque<String> = VecDeque::new();

    info!("Streaming client connected");

    loop {
        let text = match queued.pop_front() {
            Some(text) => text,
            None => match receiver.next().await {
                Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    warn!("Streaming client socket error: {}", e);
                    break;
                }
            },
        };

        let prompt = match parse_prompt(&text) {
            Ok(prompt) => prompt,
            Err(e) => {
                if send_outcome(&mut sender, &GenerationOutcome::failed(e.to_string()))
                    .await
                    .is_err()
                {
                    break;
                }
                continue;
            }
        };

        match relay_generation(&state, &prompt, &mut sender, &mut receiver, &mut queued).await {
            Relay::Finished => {}
            Relay::CallerGone => break,
        }
    }

    info!("Streaming client disconnected");
}

fn parse_prompt(text: &str) -> Result<String, ApiError> {
    let request: GenerateRequest = serde_json::from_str(text).map_err(|e| {
        warn!("Failed to parse websocket message: {}", e);
        ApiError::InvalidRequest
    })?;
    require_prompt(request.prompt)
}

/// Forwards one generation to the caller. Also watches the caller side so a
/// disconnect drops the provider stream, which closes its connection.
async fn relay_generation(
    state: &AppState,
    prompt: &str,
    sender: &mut CallerSink,
    receiver: &mut CallerStream,
    queued: &mut VecDeque<String>,
) -> Relay {
    let mut outcomes = state.generation_client.stream(prompt);

    loop {
        tokio::select! {
            outcome = outcomes.next() => {
                let Some(outcome) = outcome else {
                    return Relay::Finished;
                };

                let terminal = outcome.is_terminal();
                if terminal {
                    state.records.record(prompt, &outcome).await;
                }
                if send_outcome(sender, &outcome).await.is_err() {
                    return Relay::CallerGone;
                }
                if terminal {
                    return Relay::Finished;
                }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if queued.len() < state.config.max_queued_prompts {
                        queued.push_back(text.as_str().to_owned());
                    } else {
                        warn!("Streaming queue full, rejecting prompt");
                        let rejected = GenerationOutcome::failed(QUEUE_FULL_MESSAGE);
                        if send_outcome(sender, &rejected).await.is_err() {
                            return Relay::CallerGone;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => {
                    info!("Caller left mid-generation, closing provider stream");
                    return Relay::CallerGone;
                }
                Some(Ok(_)) => {}
            },
        }
    }
}

async fn send_outcome(sender: &mut CallerSink, outcome: &GenerationOutcome) -> Result<(), axum::Error> {
    let payload = serde_json::to_string(outcome).unwrap_or_else(|e| {
        warn!("Failed to serialize outcome: {}", e);
        serde_json::json!({"status": "error", "error": INTERNAL_ERROR_MESSAGE}).to_string()
    });
    debug!("Forwarding outcome: {}", payload);
    sender.send(Message::Text(payload.into())).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_prompt() {
        assert_eq!(require_prompt(None), Err(ApiError::MissingPrompt));
        assert_eq!(
            require_prompt(Some(String::new())),
            Err(ApiError::MissingPrompt)
        );
        assert_eq!(
            require_prompt(Some("   ".to_string())),
            Err(ApiError::MissingPrompt)
        );
        assert_eq!(
            require_prompt(Some(" a cat ".to_string())),
            Ok("a cat".to_string())
        );
    }

    #[test]
    fn test_parse_prompt() {
        assert_eq!(
            parse_prompt(r#"{"prompt":"sunset over ocean"}"#),
            Ok("sunset over ocean".to_string())
        );
        assert_eq!(parse_prompt(r#"{"prompt":""}"#), Err(ApiError::MissingPrompt));
        assert_eq!(parse_prompt(r#"{}"#), Err(ApiError::MissingPrompt));
        assert_eq!(parse_prompt("not json"), Err(ApiError::InvalidRequest));
    }
}
