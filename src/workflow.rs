use crate::api::GenerationApi;
use crate::config::GenerationSettings;
use crate::job::{GeneratedVideo, GenerationRequest, JobHandle, VideoJobRequest};
use crate::session::MediaSession;
use crate::{logi, logok, logw};
use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;

pub const SNAG_MESSAGE: &str = "I hit a bit of a snag. Do you have a paid key selected?";
pub const TIMED_OUT_MESSAGE: &str = "The video is taking too long. Please try again in a bit.";

const CANCEL_CHECK_SLICE: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Submit,
    Speech,
    Poll,
    Download,
    Fetch,
    Store,
    TimedOut,
    Cancelled,
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("video submission failed: {0:#}")]
    Submit(anyhow::Error),
    #[error("speech synthesis failed: {0:#}")]
    Speech(anyhow::Error),
    #[error("job poll failed: {0:#}")]
    Poll(anyhow::Error),
    #[error("media download failed: {0:#}")]
    Download(anyhow::Error),
    #[error("media download returned HTTP {status}")]
    Fetch { status: u16 },
    #[error("could not keep downloaded media: {0:#}")]
    Store(anyhow::Error),
    #[error("job still running after {polls} polls")]
    TimedOut { polls: u32 },
    #[error("attempt cancelled")]
    Cancelled,
}

impl GenerationError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Submit(_) => FailureKind::Submit,
            Self::Speech(_) => FailureKind::Speech,
            Self::Poll(_) => FailureKind::Poll,
            Self::Download(_) => FailureKind::Download,
            Self::Fetch { .. } => FailureKind::Fetch,
            Self::Store(_) => FailureKind::Store,
            Self::TimedOut { .. } => FailureKind::TimedOut,
            Self::Cancelled => FailureKind::Cancelled,
        }
    }

    /// The only text the user ever sees for a failed attempt.
    pub fn user_message(&self) -> Option<&'static str> {
        match self {
            Self::Cancelled => None,
            Self::TimedOut { .. } => Some(TIMED_OUT_MESSAGE),
            _ => Some(SNAG_MESSAGE),
        }
    }
}

/// Where one generation attempt currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    CheckingKey,
    AwaitingKey,
    Submitting,
    Polling { polls: u32 },
    Fetching,
    Done,
    Failed(FailureKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Submit,
    KeyMissing,
    KeyPresent,
    KeySaved,
    KeyDismissed,
    JobStarted,
    Polled,
    JobFinished,
    Completed,
    Fail(FailureKind),
}

impl Phase {
    /// Next phase for `event`, or `None` when the event makes no sense here.
    pub fn on(self, event: Event) -> Option<Phase> {
        use Event as E;
        use Phase as P;

        let next = match (self, event) {
            (P::Done, E::Fail(_)) => return None,
            (_, E::Fail(kind)) => P::Failed(kind),
            (P::Idle | P::Done | P::Failed(_), E::Submit) => P::CheckingKey,
            (P::CheckingKey, E::KeyMissing) => P::AwaitingKey,
            (P::CheckingKey, E::KeyPresent) => P::Submitting,
            (P::AwaitingKey, E::KeySaved) => P::CheckingKey,
            (P::AwaitingKey, E::KeyDismissed) => P::Idle,
            (P::Submitting, E::JobStarted) => P::Polling { polls: 0 },
            (P::Polling { polls }, E::Polled) => P::Polling { polls: polls + 1 },
            (P::Polling { .. }, E::JobFinished) => P::Fetching,
            (P::Polling { .. } | P::Fetching, E::Completed) => P::Done,
            _ => return None,
        };
        Some(next)
    }

    /// True while an attempt holds the "in progress" gate.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Phase::CheckingKey | Phase::Submitting | Phase::Polling { .. } | Phase::Fetching
        )
    }

    pub fn status_text(&self) -> &'static str {
        match self {
            Phase::CheckingKey => "Getting started...",
            Phase::Submitting | Phase::Polling { .. } => "Making your video...",
            Phase::Fetching => "Saving your video...",
            _ => "",
        }
    }
}

/// Shared stop switch honoured at every suspend point of an attempt.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Everything an attempt needs once the key check has passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptPlan {
    pub key: String,
    pub request: GenerationRequest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Created(GeneratedVideo),
    /// The job finished but pointed at nothing to download.
    NoArtifact,
}

pub type PhaseObserver<'a> = Box<dyn FnMut(Phase) + Send + 'a>;

/// Drives one attempt from submission to a downloaded video.
pub struct Attempt<'a> {
    api: &'a dyn GenerationApi,
    settings: &'a GenerationSettings,
    session: &'a MediaSession,
    cancel: CancelFlag,
    phase: Phase,
    trace: Vec<Phase>,
    observer: Option<PhaseObserver<'a>>,
}

impl<'a> Attempt<'a> {
    pub fn new(
        api: &'a dyn GenerationApi,
        settings: &'a GenerationSettings,
        session: &'a MediaSession,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            api,
            settings,
            session,
            cancel,
            phase: Phase::Submitting,
            trace: vec![Phase::Submitting],
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: PhaseObserver<'a>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Every phase visited, in order.
    pub fn trace(&self) -> &[Phase] {
        &self.trace
    }

    pub fn into_trace(self) -> Vec<Phase> {
        self.trace
    }

    fn advance(&mut self, event: Event) {
        match self.phase.on(event) {
            Some(next) => {
                self.phase = next;
                self.trace.push(next);
                if let Some(observer) = self.observer.as_mut() {
                    observer(next);
                }
            }
            None => logw(format!("Ignoring {:?} while {:?}", event, self.phase)),
        }
    }

    fn checkpoint(&self) -> Result<(), GenerationError> {
        if self.cancel.is_cancelled() {
            return Err(GenerationError::Cancelled);
        }
        Ok(())
    }

    async fn wait(&self, total: Duration) -> Result<(), GenerationError> {
        let mut left = total;
        while !left.is_zero() {
            self.checkpoint()?;
            let step = left.min(CANCEL_CHECK_SLICE);
            tokio::time::sleep(step).await;
            left -= step;
        }
        self.checkpoint()
    }

    pub async fn run(&mut self, plan: &AttemptPlan) -> Result<Outcome, GenerationError> {
        let result = self.drive(plan).await;
        if let Err(err) = &result {
            self.advance(Event::Fail(err.kind()));
        }
        result
    }

    async fn drive(&mut self, plan: &AttemptPlan) -> Result<Outcome, GenerationError> {
        let key = plan.key.as_str();
        let request = &plan.request;
        let settings = self.settings;

        self.checkpoint()?;
        let job_request = VideoJobRequest {
            prompt: format!("{}{}", request.prompt, settings.style_suffix),
            number_of_videos: settings.number_of_videos,
            resolution: settings.resolution.clone(),
            aspect_ratio: settings.aspect_ratio.clone(),
        };
        logi(format!(
            "Submitting video job ({} {}, {} output)",
            job_request.resolution, job_request.aspect_ratio, job_request.number_of_videos
        ));
        let mut job = self
            .api
            .submit_video_job(key, &job_request)
            .await
            .map_err(GenerationError::Submit)?;
        logok(format!("Video job accepted: {}", job.name));

        let mut audio_blob = String::new();
        if request.wants_voiceover() {
            self.checkpoint()?;
            logi(format!(
                "Synthesizing voiceover ({} chars)",
                request.voiceover.chars().count()
            ));
            audio_blob = self
                .api
                .synthesize_speech(key, &request.voiceover)
                .await
                .map_err(GenerationError::Speech)?
                .unwrap_or_default();
        }

        self.advance(Event::JobStarted);
        job = self.poll_until_done(key, job).await?;

        let Some(locator) = job.locator.clone() else {
            logw(format!("Job {} finished without a video to download", job.name));
            self.advance(Event::Completed);
            return Ok(Outcome::NoArtifact);
        };

        self.advance(Event::JobFinished);
        self.checkpoint()?;
        let media = self
            .api
            .fetch_media(key, &locator)
            .await
            .map_err(GenerationError::Download)?;
        if !media.is_success() {
            return Err(GenerationError::Fetch {
                status: media.status,
            });
        }

        let id = new_video_id();
        let url = self
            .session
            .store(&id, &media.bytes)
            .await
            .map_err(GenerationError::Store)?;
        logok(format!("Saved video {} ({} bytes)", url.display(), media.bytes.len()));

        self.advance(Event::Completed);
        Ok(Outcome::Created(GeneratedVideo {
            id,
            url,
            audio_blob,
            prompt: request.prompt.clone(),
            timestamp: Utc::now(),
        }))
    }

    async fn poll_until_done(&mut self, key: &str, mut job: JobHandle) -> Result<JobHandle, GenerationError> {
        let mut polls = 0u32;
        while !job.done {
            if let Some(max) = self.settings.max_polls {
                if polls >= max {
                    return Err(GenerationError::TimedOut { polls });
                }
            }
            self.wait(self.settings.poll_interval).await?;
            job = self
                .api
                .poll_job(key, &job)
                .await
                .map_err(GenerationError::Poll)?;
            polls += 1;
            self.advance(Event::Polled);
        }
        logok(format!("Job {} done after {} polls", job.name, polls));
        Ok(job)
    }
}

fn new_video_id() -> String {
    format!(
        "{}-{:06x}",
        Utc::now().timestamp_millis(),
        rand::random::<u32>() & 0x00ff_ffff
    )
}
