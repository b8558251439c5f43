use super::{FetchedMedia, GenerationApi};
use crate::config::Config;
use crate::job::{JobHandle, VideoJobRequest};
use crate::logw;
use anyhow::{Context, Result};
use reqwest::{Client, Response, Url};
use serde_json::{Value, json};
use std::time::Duration;

const BODY_SNIPPET_CHARS: usize = 800;

pub struct GeminiClient {
    client: Client,
    api_base: String,
    video_model: String,
    tts_model: String,
}

impl GeminiClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(cfg.request_timeout())
            .connect_timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self::with_client(client, cfg))
    }

    pub fn with_client(client: Client, cfg: &Config) -> Self {
        Self {
            client,
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            video_model: cfg.video_model.clone(),
            tts_model: cfg.tts_model.clone(),
        }
    }

    async fn post_json(&self, url: &str, key: &str, body: &Value, what: &str) -> Result<Value> {
        let resp = self
            .client
            .post(url)
            .header("x-goog-api-key", key)
            .json(body)
            .send()
            .await
            .with_context(|| format!("{} request failed", what))?;
        read_json(resp, what).await
    }
}

async fn read_json(resp: Response, what: &str) -> Result<Value> {
    let status = resp.status();
    let raw = resp.text().await.unwrap_or_default();

    if !status.is_success() {
        logw(format!("{} HTTP {}", what, status.as_u16()));
        if !raw.is_empty() {
            logw(format!("{} raw body: {}", what, snippet(&raw)));
        }
        anyhow::bail!("{} failed with HTTP {}", what, status.as_u16());
    }

    serde_json::from_str(&raw).with_context(|| format!("{} response was not JSON", what))
}

fn snippet(raw: &str) -> String {
    raw.chars().take(BODY_SNIPPET_CHARS).collect()
}

pub(crate) fn video_job_body(request: &VideoJobRequest) -> Value {
    json!({
        "instances": [{ "prompt": request.prompt }],
        "parameters": {
            "sampleCount": request.number_of_videos,
            "resolution": request.resolution,
            "aspectRatio": request.aspect_ratio,
        },
    })
}

pub(crate) fn speech_body(text: &str) -> Value {
    json!({
        "contents": [{ "parts": [{ "text": text }] }],
        "generationConfig": { "responseModalities": ["AUDIO"] },
    })
}

/// Reads an operation document. A finished operation that reports an error is a failure.
pub(crate) fn parse_operation(root: &Value) -> Result<JobHandle> {
    let name = root
        .get("name")
        .and_then(Value::as_str)
        .context("operation has no name")?
        .to_string();
    let done = root.get("done").and_then(Value::as_bool).unwrap_or(false);

    if let Some(err) = root.get("error") {
        let msg = err
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        anyhow::bail!("operation {} reported an error: {}", name, msg);
    }

    if !done {
        return Ok(JobHandle::pending(name));
    }
    Ok(JobHandle::finished(name, extract_locator(root)))
}

pub(crate) fn extract_locator(root: &Value) -> Option<String> {
    let response = root.get("response")?;
    let first = response
        .pointer("/generateVideoResponse/generatedSamples/0")
        .or_else(|| response.pointer("/generatedVideos/0"))?;
    first
        .pointer("/video/uri")
        .and_then(Value::as_str)
        .filter(|uri| !uri.is_empty())
        .map(str::to_string)
}

pub(crate) fn extract_audio(root: &Value) -> Option<String> {
    root.pointer("/candidates/0/content/parts/0/inlineData/data")
        .and_then(Value::as_str)
        .filter(|data| !data.is_empty())
        .map(str::to_string)
}

/// Appends the credential as the `key` query parameter.
pub(crate) fn media_url(locator: &str, key: &str) -> Result<Url> {
    let mut url = Url::parse(locator).with_context(|| format!("bad media locator: {}", locator))?;
    url.query_pairs_mut().append_pair("key", key);
    Ok(url)
}

#[async_trait::async_trait]
impl GenerationApi for GeminiClient {
    async fn submit_video_job(&self, key: &str, request: &VideoJobRequest) -> Result<JobHandle> {
        let url = format!(
            "{}/models/{}:predictLongRunning",
            self.api_base, self.video_model
        );
        let root = self
            .post_json(&url, key, &video_job_body(request), "Video submit")
            .await?;
        parse_operation(&root)
    }

    async fn poll_job(&self, key: &str, job: &JobHandle) -> Result<JobHandle> {
        let url = format!("{}/{}", self.api_base, job.name);
        let resp = self
            .client
            .get(&url)
            .header("x-goog-api-key", key)
            .send()
            .await
            .context("Operation poll request failed")?;
        let root = read_json(resp, "Operation poll").await?;
        parse_operation(&root)
    }

    async fn synthesize_speech(&self, key: &str, text: &str) -> Result<Option<String>> {
        let url = format!("{}/models/{}:generateContent", self.api_base, self.tts_model);
        let root = self
            .post_json(&url, key, &speech_body(text), "Speech synthesis")
            .await?;
        let audio = extract_audio(&root);
        if audio.is_none() {
            logw("Speech response carried no audio; continuing without voiceover.");
        }
        Ok(audio)
    }

    async fn fetch_media(&self, key: &str, locator: &str) -> Result<FetchedMedia> {
        let url = media_url(locator, key)?;
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .context("Media download request failed")?;
        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            return Ok(FetchedMedia {
                status,
                bytes: Vec::new(),
            });
        }
        let bytes = resp.bytes().await.context("Media download read failed")?;
        Ok(FetchedMedia {
            status,
            bytes: bytes.to_vec(),
        })
    }
}
