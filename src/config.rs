use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;

pub const API_KEY_ENV: &str = "DASHSCOPE_API_KEY";
pub const BASE_URL_ENV: &str = "DASHSCOPE_BASE_URL";

/// The mainland endpoint rejects international keys with InvalidApiKey.
pub const DEFAULT_BASE_URL: &str = "https://dashscope-intl.aliyuncs.com/api/v1";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub common: CommonSettings,
    #[serde(default)]
    pub vid_caption: CaptionSettings,
    #[serde(default)]
    pub safety: SafetySettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommonSettings {
    #[serde(default = "default_input_dir")]
    pub input_root_dir: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionSettings {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    #[serde(default = "default_shuffle")]
    pub shuffle: bool,
    #[serde(default = "default_sampling_fps")]
    pub frame_sampling_fps: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetySettings {
    #[serde(default = "default_request_delay")]
    pub request_delay_seconds: f64,
    #[serde(default = "default_max_rpm")]
    pub max_rpm: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub rate_limits: HashMap<String, ModelRateLimit>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelRateLimit {
    pub rpm: Option<u32>,
    pub tpm: Option<u64>,
}

fn default_input_dir() -> String {
    "./input".to_string()
}

fn default_output_dir() -> String {
    "./output".to_string()
}

fn default_model() -> String {
    "qwen-vl-plus".to_string()
}

fn default_max_items() -> usize {
    100
}

fn default_shuffle() -> bool {
    true
}

fn default_sampling_fps() -> f64 {
    1.0
}

fn default_request_delay() -> f64 {
    0.5
}

fn default_max_rpm() -> u32 {
    60
}

fn default_max_retries() -> u32 {
    2
}

impl Default for CommonSettings {
    fn default() -> Self {
        Self {
            input_root_dir: default_input_dir(),
            output_dir: default_output_dir(),
        }
    }
}

impl Default for CaptionSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_items: default_max_items(),
            shuffle: default_shuffle(),
            frame_sampling_fps: default_sampling_fps(),
        }
    }
}

impl Default for SafetySettings {
    fn default() -> Self {
        Self {
            request_delay_seconds: default_request_delay(),
            max_rpm: default_max_rpm(),
            max_retries: default_max_retries(),
            rate_limits: HashMap::new(),
        }
    }
}

impl SafetySettings {
    /// Effective requests-per-minute budget for a model, honoring the
    /// per-model override when present.
    pub fn rpm_for(&self, model: &str) -> u32 {
        self.rate_limits
            .get(model)
            .and_then(|l| l.rpm)
            .unwrap_or(self.max_rpm)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompts {
    pub video: PromptPair,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptPair {
    pub system: String,
    pub user: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub base_url: String,
    pub settings: Settings,
    pub prompts: Prompts,
    pub schema: serde_json::Value,
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

impl Config {
    /// Loads settings, prompts and the response schema from a configs
    /// directory, and the API credential from the environment.
    pub async fn load<P: AsRef<Path>>(configs_dir: P) -> Result<Self> {
        let dir = configs_dir.as_ref();
        let settings: Settings = read_json(&dir.join("settings.json")).await?;
        let prompts: Prompts = read_json(&dir.join("prompts.json")).await?;
        let schema: serde_json::Value =
            read_json(&dir.join("schemas").join("video_response.schema.json")).await?;

        let api_key = std::env::var(API_KEY_ENV).unwrap_or_default();
        if api_key.is_empty() {
            anyhow::bail!("{} not set", API_KEY_ENV);
        }
        let base_url =
            std::env::var(BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        Ok(Config {
            api_key,
            base_url,
            settings,
            prompts,
            schema,
        })
    }

    pub fn input_dir(&self) -> PathBuf {
        PathBuf::from(&self.settings.common.input_root_dir)
    }

    /// Captions land under a per-model subdirectory of the output root.
    pub fn captions_dir(&self) -> PathBuf {
        PathBuf::from(&self.settings.common.output_dir).join(&self.settings.vid_caption.model)
    }
}
