use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// What the user typed: a video idea and an optional voiceover script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub voiceover: String,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, voiceover: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            voiceover: voiceover.into(),
        }
    }

    pub fn is_submittable(&self) -> bool {
        !self.prompt.trim().is_empty()
    }

    pub fn wants_voiceover(&self) -> bool {
        !self.voiceover.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoJobRequest {
    pub prompt: String,
    pub number_of_videos: u32,
    pub resolution: String,
    pub aspect_ratio: String,
}

/// Provider-side long-running operation as last observed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobHandle {
    pub name: String,
    pub done: bool,
    pub locator: Option<String>,
}

impl JobHandle {
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            done: false,
            locator: None,
        }
    }

    pub fn finished(name: impl Into<String>, locator: Option<String>) -> Self {
        Self {
            name: name.into(),
            done: true,
            locator,
        }
    }
}

/// Gallery entry. Never changed once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedVideo {
    pub id: String,
    pub url: PathBuf,
    pub audio_blob: String,
    pub prompt: String,
    pub timestamp: DateTime<Utc>,
}

impl GeneratedVideo {
    pub fn has_audio(&self) -> bool {
        !self.audio_blob.is_empty()
    }
}
