use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;

pub const DEFAULT_CONFIG_PATH: &str = "video-ideas.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_video_model")]
    pub video_model: String,
    #[serde(default = "default_tts_model")]
    pub tts_model: String,
    #[serde(default = "default_style_suffix")]
    pub style_suffix: String,
    #[serde(default = "default_number_of_videos")]
    pub number_of_videos: u32,
    #[serde(default = "default_resolution")]
    pub resolution: String,
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Zero disables the bound.
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,
    #[serde(default = "default_storage_path")]
    pub storage_path: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_api_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_video_model() -> String {
    "veo-3.1-fast-generate-preview".to_string()
}

fn default_tts_model() -> String {
    "gemini-2.5-flash-preview-tts".to_string()
}

fn default_style_suffix() -> String {
    ", friendly corporate style, high quality".to_string()
}

fn default_number_of_videos() -> u32 {
    1
}

fn default_resolution() -> String {
    "1080p".to_string()
}

fn default_aspect_ratio() -> String {
    "16:9".to_string()
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_max_polls() -> u32 {
    90
}

fn default_storage_path() -> String {
    "storage/local_storage.json".to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            video_model: default_video_model(),
            tts_model: default_tts_model(),
            style_suffix: default_style_suffix(),
            number_of_videos: default_number_of_videos(),
            resolution: default_resolution(),
            aspect_ratio: default_aspect_ratio(),
            poll_interval_secs: default_poll_interval_secs(),
            max_polls: default_max_polls(),
            storage_path: default_storage_path(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Config {
    /// Reads the JSON config at `path`. A missing file means defaults.
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if fs::metadata(path).await.is_err() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            anyhow::bail!("config: poll_interval_secs must be at least 1");
        }
        if self.number_of_videos == 0 {
            anyhow::bail!("config: number_of_videos must be at least 1");
        }
        if self.api_base.trim().is_empty() {
            anyhow::bail!("config: api_base missing");
        }
        Ok(())
    }

    pub fn settings(&self) -> GenerationSettings {
        GenerationSettings {
            style_suffix: self.style_suffix.clone(),
            number_of_videos: self.number_of_videos,
            resolution: self.resolution.clone(),
            aspect_ratio: self.aspect_ratio.clone(),
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            max_polls: (self.max_polls > 0).then_some(self.max_polls),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// The fixed knobs one generation attempt runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationSettings {
    pub style_suffix: String,
    pub number_of_videos: u32,
    pub resolution: String,
    pub aspect_ratio: String,
    pub poll_interval: Duration,
    pub max_polls: Option<u32>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Config::default().settings()
    }
}
