use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

pub mod dashscope;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),
    #[error("authentication rejected: {0}")]
    Auth(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("api error {code}: {message}")]
    Api { code: String, message: String },
}

impl ApiError {
    /// Network hiccups and rate limiting are worth another attempt; the
    /// remaining classes fail the item immediately.
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Network(_) | ApiError::RateLimited(_))
    }
}

#[derive(Debug, Clone)]
pub struct CaptionRequest {
    pub video_path: PathBuf,
    pub system_prompt: String,
    pub user_prompt: String,
    pub frame_sampling_fps: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

#[derive(Debug, Clone)]
pub struct CaptionResponse {
    pub text: String,
    pub usage: TokenUsage,
}

/// Boundary to the remote captioning service. The generator only cares about
/// success/failure classification and the returned payload text.
#[async_trait]
pub trait CaptionBackend: Send + Sync {
    async fn caption_video(&self, request: &CaptionRequest) -> Result<CaptionResponse, ApiError>;
}
