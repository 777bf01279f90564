//! Provider client for fal.ai text-to-video.
//!
//! Two transports are supported:
//! - HTTP: one POST, one final JSON payload
//! - WebSocket: the request is sent once and the provider pushes status
//!   messages until the job completes or fails
//!
//! Every failure, whether transport, protocol or provider side, is turned into
//! [`GenerationOutcome::Failed`]; nothing here returns an error to the caller.

use std::sync::Arc;

use async_trait::async_trait;
use futures::{stream, stream::BoxStream, SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        client::IntoClientRequest,
        http::{header::AUTHORIZATION, HeaderValue},
        Message,
    },
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, error, info, warn};

use crate::config::ProviderConfig;

use super::parser::{extract_error, ResponseParser, INVALID_RESPONSE_MESSAGE};
use super::types::{GenerationOutcome, GenerationRequest};

pub const CONNECTION_CLOSED_MESSAGE: &str = "WebSocket connection closed";
pub const TIMEOUT_MESSAGE: &str = "Provider request timed out";

pub type OutcomeStream = BoxStream<'static, GenerationOutcome>;

type ProviderSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Submits one prompt to the video provider.
///
/// Implementations hold no per-call state, so one instance can serve any
/// number of concurrent requests.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Waits for the terminal outcome of a single generation.
    async fn generate(&self, prompt: &str) -> GenerationOutcome;

    /// Lazily opens a provider session. The stream yields zero or more
    /// progress events followed by exactly one terminal event, then ends.
    /// Dropping it closes the provider connection.
    fn stream(&self, prompt: &str) -> OutcomeStream;
}

/// Drains a streaming generation down to its terminal event
pub async fn settle(mut outcomes: OutcomeStream) -> GenerationOutcome {
    while let Some(outcome) = outcomes.next().await {
        if outcome.is_terminal() {
            return outcome;
        }
    }
    GenerationOutcome::failed(CONNECTION_CLOSED_MESSAGE)
}

/// Which transport `generate` uses
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncTransport {
    #[default]
    Http,
    Websocket,
}

#[derive(Clone)]
pub struct FalClient {
    http: reqwest::Client,
    config: ProviderConfig,
    http_parser: Arc<dyn ResponseParser>,
    ws_parser: Arc<dyn ResponseParser>,
}

impl FalClient {
    pub fn new(config: ProviderConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        let http_parser = config.http_response_shape.parser();
        let ws_parser = config.ws_response_shape.parser();

        Ok(Self {
            http,
            config,
            http_parser,
            ws_parser,
        })
    }

    fn authorization(&self) -> Option<String> {
        self.config
            .api_key
            .as_ref()
            .map(|key| format!("Key {}", key))
    }

    async fn generate_http(&self, prompt: &str) -> GenerationOutcome {
        let request = GenerationRequest::new(prompt, &self.config.defaults);

        let mut builder = self
            .http
            .post(&self.config.http_url)
            .header("Content-Type", "application/json")
            .json(&request.input);
        if let Some(auth) = self.authorization() {
            builder = builder.header("Authorization", auth);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                error!("Provider request timed out: {}", e);
                return GenerationOutcome::failed(TIMEOUT_MESSAGE);
            }
            Err(e) => {
                error!("Failed to reach provider: {}", e);
                return GenerationOutcome::failed(format!("Failed to reach provider: {}", e));
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                error!("Failed to read provider response: {}", e);
                return GenerationOutcome::failed(format!(
                    "Failed to read provider response: {}",
                    e
                ));
            }
        };

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|payload| extract_error(&payload))
                .unwrap_or_else(|| status.to_string());
            error!("Provider API error: {} - {}", status, message);
            return GenerationOutcome::failed(format!("Provider error ({}): {}", status, message));
        }

        let outcome = self.http_parser.parse_result(&body);
        if let GenerationOutcome::Failed { error } = &outcome {
            warn!("Provider returned unusable result: {}", error);
        }
        outcome
    }
}

#[async_trait]
impl GenerationClient for FalClient {
    async fn generate(&self, prompt: &str) -> GenerationOutcome {
        info!("Generating video for prompt: {}", preview(prompt));

        match self.config.sync_transport {
            SyncTransport::Http => self.generate_http(prompt).await,
            SyncTransport::Websocket => settle(self.stream(prompt)).await,
        }
    }

    fn stream(&self, prompt: &str) -> OutcomeStream {
        info!("Opening generation stream for prompt: {}", preview(prompt));

        let state = SessionState::Pending {
            url: self.config.ws_url.clone(),
            authorization: self.authorization(),
            request: GenerationRequest::new(prompt, &self.config.defaults),
        };
        let parser = self.ws_parser.clone();
        let limit = self.config.request_timeout();

        stream::unfold(state, move |state| {
            let parser = parser.clone();
            async move {
                let mut socket = match state {
                    SessionState::Finished => return None,
                    SessionState::Open(socket) => socket,
                    SessionState::Pending {
                        url,
                        authorization,
                        request,
                    } => {
                        let opening = open_session(&url, authorization.as_deref(), &request);
                        match timeout(limit, opening).await {
                            Ok(Ok(socket)) => Box::new(socket),
                            Ok(Err(outcome)) => return Some((outcome, SessionState::Finished)),
                            Err(_) => {
                                error!("Provider websocket handshake timed out after {:?}", limit);
                                let outcome = GenerationOutcome::failed(TIMEOUT_MESSAGE);
                                return Some((outcome, SessionState::Finished));
                            }
                        }
                    }
                };

                // Bounds the silence between two provider messages
                let reading = next_outcome(&mut socket, parser.as_ref());
                let outcome = match timeout(limit, reading).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        error!("Provider sent nothing for {:?}", limit);
                        GenerationOutcome::failed(TIMEOUT_MESSAGE)
                    }
                };
                if outcome.is_terminal() {
                    let _ = (*socket).close(None).await;
                    Some((outcome, SessionState::Finished))
                } else {
                    Some((outcome, SessionState::Open(socket)))
                }
            }
        })
        .boxed()
    }
}

enum SessionState {
    Pending {
        url: String,
        authorization: Option<String>,
        request: GenerationRequest,
    },
    Open(Box<ProviderSocket>),
    Finished,
}

async fn open_session(
    url: &str,
    authorization: Option<&str>,
    request: &GenerationRequest,
) -> Result<ProviderSocket, GenerationOutcome> {
    let mut ws_request = url.into_client_request().map_err(|e| {
        error!("Invalid provider websocket url: {}", e);
        GenerationOutcome::failed(format!("Error generating video: {}", e))
    })?;

    if let Some(auth) = authorization {
        let value = HeaderValue::from_str(auth).map_err(|e| {
            error!("Provider credential is not a valid header value: {}", e);
            GenerationOutcome::failed("Error generating video: invalid provider credential")
        })?;
        ws_request.headers_mut().insert(AUTHORIZATION, value);
    }

    let (mut socket, _) = connect_async(ws_request).await.map_err(|e| {
        error!("WebSocket connection to provider failed: {}", e);
        GenerationOutcome::failed(format!("Failed to connect to provider: {}", e))
    })?;

    let payload = serde_json::to_string(request).map_err(|e| {
        error!("Failed to serialize generation request: {}", e);
        GenerationOutcome::failed(format!("Error generating video: {}", e))
    })?;

    socket
        .send(Message::Text(payload.into()))
        .await
        .map_err(|e| {
            error!("Failed to send generation request: {}", e);
            GenerationOutcome::failed(CONNECTION_CLOSED_MESSAGE)
        })?;

    debug!("Generation request sent to provider");
    Ok(socket)
}

/// Reads until the provider says something worth relaying
async fn next_outcome(socket: &mut ProviderSocket, parser: &dyn ResponseParser) -> GenerationOutcome {
    loop {
        let message = match socket.next().await {
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                error!("WebSocket connection closed unexpectedly: {}", e);
                return GenerationOutcome::failed(CONNECTION_CLOSED_MESSAGE);
            }
            None => {
                error!("Provider closed the stream before a result");
                return GenerationOutcome::failed(CONNECTION_CLOSED_MESSAGE);
            }
        };

        let parsed = match message {
            Message::Text(text) => {
                debug!("Received provider message: {}", text.as_str());
                parser.parse(text.as_str())
            }
            Message::Binary(bytes) => match std::str::from_utf8(&bytes) {
                Ok(text) => parser.parse(text),
                Err(_) => Some(GenerationOutcome::failed(INVALID_RESPONSE_MESSAGE)),
            },
            Message::Close(frame) => {
                warn!("Provider closed the websocket: {:?}", frame);
                Some(GenerationOutcome::failed(CONNECTION_CLOSED_MESSAGE))
            }
            _ => None,
        };

        if let Some(outcome) = parsed {
            return outcome;
        }
    }
}

fn preview(prompt: &str) -> String {
    prompt.chars().take(60).collect()
}
