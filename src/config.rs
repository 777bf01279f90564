use std::time::Duration;

use anyhow::Context;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::consts::{
    DEFAULT_BATCH_PACING, DEFAULT_DURATION_SECS, DEFAULT_MAX_QUEUED_PROMPTS, DEFAULT_MAX_RECORDS,
    DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_NEGATIVE_PROMPT, DEFAULT_NUM_FRAMES, DEFAULT_PORT, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_STYLE,
    FAL_API_KEY_ENV, FAL_WAN_HTTP_URL, FAL_WAN_WS_URL,
};
use crate::videogen::client::SyncTransport;
use crate::videogen::parser::ResponseShape;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub port: u16,
    pub max_upload_bytes: usize,
    pub batch_pacing_ms: u64,
    /// Prompts a streaming caller may send ahead of the running generation
    pub max_queued_prompts: usize,
    /// Generation records kept in memory; the oldest are evicted first
    pub max_records: usize,
    pub provider: ProviderConfig,
}

#[derive(Clone, Deserialize)]
pub struct ProviderConfig {
    /// Absent key is tolerated; the provider rejects the call and the
    /// rejection surfaces as a failed outcome.
    pub api_key: Option<String>,
    pub http_url: String,
    pub ws_url: String,
    /// Result shape of the queue-and-wait HTTP endpoint
    pub http_response_shape: ResponseShape,
    /// Result shape of the realtime websocket messages
    pub ws_response_shape: ResponseShape,
    /// Transport used when a caller waits for a single final result
    pub sync_transport: SyncTransport,
    pub request_timeout_secs: u64,
    pub defaults: GenerationDefaults,
}

// Manual Debug so the credential never reaches the logs
impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("http_url", &self.http_url)
            .field("ws_url", &self.ws_url)
            .field("http_response_shape", &self.http_response_shape)
            .field("ws_response_shape", &self.ws_response_shape)
            .field("sync_transport", &self.sync_transport)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("defaults", &self.defaults)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationDefaults {
    pub negative_prompt: String,
    pub num_frames: u32,
    pub style: String,
    pub duration: u32,
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            negative_prompt: DEFAULT_NEGATIVE_PROMPT.to_string(),
            num_frames: DEFAULT_NUM_FRAMES,
            style: DEFAULT_STYLE.to_string(),
            duration: DEFAULT_DURATION_SECS,
        }
    }
}

impl AppConfig {
    /// Layers built-in defaults, an optional `config.toml` and `APP_*`
    /// environment variables (`APP_PORT`, `APP_PROVIDER__WS_URL`, ...).
    pub fn load() -> anyhow::Result<Self> {
        let defaults = GenerationDefaults::default();

        let mut conf: AppConfig = Config::builder()
            .set_default("port", DEFAULT_PORT)?
            .set_default("max_upload_bytes", DEFAULT_MAX_UPLOAD_BYTES as u64)?
            .set_default("batch_pacing_ms", DEFAULT_BATCH_PACING.as_millis() as u64)?
            .set_default("max_queued_prompts", DEFAULT_MAX_QUEUED_PROMPTS as u64)?
            .set_default("max_records", DEFAULT_MAX_RECORDS as u64)?
            .set_default("provider.http_url", FAL_WAN_HTTP_URL)?
            .set_default("provider.ws_url", FAL_WAN_WS_URL)?
            .set_default("provider.http_response_shape", "video_url")?
            .set_default("provider.ws_response_shape", "data_url")?
            .set_default("provider.sync_transport", "http")?
            .set_default("provider.request_timeout_secs", DEFAULT_REQUEST_TIMEOUT_SECS)?
            .set_default("provider.defaults.negative_prompt", defaults.negative_prompt)?
            .set_default("provider.defaults.num_frames", defaults.num_frames)?
            .set_default("provider.defaults.style", defaults.style)?
            .set_default("provider.defaults.duration", defaults.duration)?
            .add_source(File::with_name("config").required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        if conf.provider.api_key.is_none() {
            conf.provider.api_key = std::env::var(FAL_API_KEY_ENV).ok();
        }

        if conf.provider.api_key.is_none() {
            log::warn!("{FAL_API_KEY_ENV} is not set; provider calls will be rejected");
        }

        Ok(conf)
    }

    pub fn batch_pacing(&self) -> Duration {
        Duration::from_millis(self.batch_pacing_ms)
    }
}

impl ProviderConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
impl AppConfig {
    pub fn for_tests() -> Self {
        Self {
            port: DEFAULT_PORT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            batch_pacing_ms: 0,
            max_queued_prompts: DEFAULT_MAX_QUEUED_PROMPTS,
            max_records: DEFAULT_MAX_RECORDS,
            provider: ProviderConfig {
                api_key: Some("test-key".to_string()),
                http_url: "http://127.0.0.1:9/unused".to_string(),
                ws_url: "ws://127.0.0.1:9/unused".to_string(),
                http_response_shape: ResponseShape::VideoUrl,
                ws_response_shape: ResponseShape::DataUrl,
                sync_transport: SyncTransport::Http,
                request_timeout_secs: 5,
                defaults: GenerationDefaults::default(),
            },
        }
    }
}
