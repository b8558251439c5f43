use crate::job::{JobHandle, VideoJobRequest};
use anyhow::Result;

pub mod gemini;

pub use gemini::GeminiClient;

/// Raw result of downloading a media locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedMedia {
    pub status: u16,
    pub bytes: Vec<u8>,
}

impl FetchedMedia {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Remote generative-media service. Every call is authorised with `key`.
#[async_trait::async_trait]
pub trait GenerationApi: Send + Sync {
    /// Starts a video job and returns its handle without waiting for it.
    async fn submit_video_job(&self, key: &str, request: &VideoJobRequest) -> Result<JobHandle>;

    /// Re-reads the job's state.
    async fn poll_job(&self, key: &str, job: &JobHandle) -> Result<JobHandle>;

    /// Best effort text-to-speech. `Ok(None)` when the response carries no audio.
    async fn synthesize_speech(&self, key: &str, text: &str) -> Result<Option<String>>;

    async fn fetch_media(&self, key: &str, locator: &str) -> Result<FetchedMedia>;
}
