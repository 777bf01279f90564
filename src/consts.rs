use std::time::Duration;

/// fal.ai synchronous (queue-and-wait) endpoint for Wan 2.1 1.3B text-to-video
pub const FAL_WAN_HTTP_URL: &str = "https://fal.run/fal-ai/wan/v2.1/1.3b/text-to-video";

/// fal.ai realtime endpoint, streams queue/progress updates over a websocket
pub const FAL_WAN_WS_URL: &str = "wss://fal.ai/models/fal-ai/wan/v2.1/1.3b/text-to-video/api";

pub const FAL_API_KEY_ENV: &str = "FAL_API_KEY";

// Fixed generation defaults sent with every prompt
pub const DEFAULT_NEGATIVE_PROMPT: &str = "blurry, low quality";
pub const DEFAULT_NUM_FRAMES: u32 = 24;
pub const DEFAULT_STYLE: &str = "Realistic cinematic video. High quality, 8K resolution.";
pub const DEFAULT_DURATION_SECS: u32 = 5;

/// Delay between sequential batch items to stay under provider rate limits
pub const DEFAULT_BATCH_PACING: Duration = Duration::from_millis(1000);

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 600;

pub const DEFAULT_PORT: u16 = 5000;

/// Uploaded prompt lists are capped at 1MB
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 1024 * 1024;

pub const DEFAULT_MAX_QUEUED_PROMPTS: usize = 16;

pub const DEFAULT_MAX_RECORDS: usize = 1000;

pub const UPLOAD_FIELD_NAME: &str = "file";
