use anyhow::Result;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use video_ideas::api::{FetchedMedia, GenerationApi};
use video_ideas::config::GenerationSettings;
use video_ideas::credential::{CredentialStore, MemoryCredential};
use video_ideas::job::{GenerationRequest, JobHandle, VideoJobRequest};
use video_ideas::session::MediaSession;
use video_ideas::studio::{NO_ARTIFACT_NOTICE, Studio, Submission};
use video_ideas::workflow::{
    Attempt, AttemptPlan, CancelFlag, FailureKind, GenerationError, Phase, SNAG_MESSAGE,
    TIMED_OUT_MESSAGE,
};

const LOCATOR: &str = "https://files.example/v1beta/files/abc:download?alt=media";

/// Scripted stand-in for the remote service.
struct FakeApi {
    pending_polls: usize,
    locator: Option<String>,
    audio: Option<String>,
    fetch_status: u16,
    fail_submit: bool,
    cancel_on_poll: Option<CancelFlag>,
    submits: AtomicUsize,
    polls: AtomicUsize,
    speeches: AtomicUsize,
    fetches: AtomicUsize,
    submitted: Mutex<Vec<VideoJobRequest>>,
    fetched: Mutex<Vec<(String, String)>>,
}

impl FakeApi {
    fn new(pending_polls: usize) -> Self {
        Self {
            pending_polls,
            locator: Some(LOCATOR.to_string()),
            audio: None,
            fetch_status: 200,
            fail_submit: false,
            cancel_on_poll: None,
            submits: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
            speeches: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
            submitted: Mutex::new(Vec::new()),
            fetched: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
            + self.polls.load(Ordering::SeqCst)
            + self.speeches.load(Ordering::SeqCst)
            + self.fetches.load(Ordering::SeqCst)
    }

    fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl GenerationApi for FakeApi {
    async fn submit_video_job(&self, _key: &str, request: &VideoJobRequest) -> Result<JobHandle> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        if self.fail_submit {
            anyhow::bail!("HTTP 403: billing required");
        }
        self.submitted.lock().unwrap().push(request.clone());
        Ok(JobHandle::pending("operations/fake"))
    }

    async fn poll_job(&self, _key: &str, job: &JobHandle) -> Result<JobHandle> {
        let n = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(cancel) = &self.cancel_on_poll {
            cancel.cancel();
        }
        if n <= self.pending_polls {
            return Ok(JobHandle::pending(job.name.clone()));
        }
        Ok(JobHandle::finished(job.name.clone(), self.locator.clone()))
    }

    async fn synthesize_speech(&self, _key: &str, _text: &str) -> Result<Option<String>> {
        self.speeches.fetch_add(1, Ordering::SeqCst);
        Ok(self.audio.clone())
    }

    async fn fetch_media(&self, key: &str, locator: &str) -> Result<FetchedMedia> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.fetched
            .lock()
            .unwrap()
            .push((locator.to_string(), key.to_string()));
        Ok(FetchedMedia {
            status: self.fetch_status,
            bytes: if self.fetch_status == 200 {
                b"fake mp4 bytes".to_vec()
            } else {
                Vec::new()
            },
        })
    }
}

/// Memory store that counts reads, to prove the key is never consulted.
#[derive(Default)]
struct CountingStore {
    inner: MemoryCredential,
    reads: Arc<AtomicUsize>,
}

impl CredentialStore for CountingStore {
    fn get(&self) -> String {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get()
    }

    fn set(&mut self, value: &str) {
        self.inner.set(value);
    }

    fn clear(&mut self) {
        self.inner.clear();
    }
}

fn fast_settings() -> GenerationSettings {
    GenerationSettings {
        poll_interval: Duration::ZERO,
        ..GenerationSettings::default()
    }
}

fn studio_with<S: CredentialStore>(store: S) -> Studio<S> {
    Studio::new(store, fast_settings(), MediaSession::new().unwrap())
}

fn keyed_studio() -> Studio<MemoryCredential> {
    studio_with(MemoryCredential::with_key("AIzaTestKey"))
}

#[tokio::test]
async fn blank_prompt_touches_nothing() {
    let reads = Arc::new(AtomicUsize::new(0));
    let store = CountingStore {
        inner: MemoryCredential::with_key("AIzaTestKey"),
        reads: Arc::clone(&reads),
    };
    let mut studio = studio_with(store);
    let api = FakeApi::new(0);

    for prompt in ["", "   ", "\n\t "] {
        studio.prompt = prompt.to_string();
        assert_eq!(studio.generate(&api).await, Submission::Ignored);
    }

    assert_eq!(reads.load(Ordering::SeqCst), 0);
    assert_eq!(api.calls(), 0);
    assert_eq!(studio.phase(), Phase::Idle);
}

#[tokio::test]
async fn missing_key_waits_then_resumes_after_save() {
    let mut studio = studio_with(MemoryCredential::new());
    let api = FakeApi::new(1);
    studio.prompt = "Team meeting".to_string();

    assert_eq!(studio.generate(&api).await, Submission::NeedsKey);
    assert_eq!(studio.phase(), Phase::AwaitingKey);
    assert!(studio.show_key_prompt());
    assert_eq!(api.calls(), 0);

    studio.editor_mut().set_value("  AIzaFreshKey ");
    let resumed = studio.save_key_and_resume(&api).await;
    assert!(matches!(resumed, Submission::Ready(_)));
    assert_eq!(studio.credentials().get(), "AIzaFreshKey");
    assert_eq!(studio.phase(), Phase::Done);
    assert_eq!(studio.videos().len(), 1);
    assert_eq!(
        api.fetched.lock().unwrap()[0],
        (LOCATOR.to_string(), "AIzaFreshKey".to_string())
    );
}

#[tokio::test]
async fn entry_appears_after_n_plus_one_polls_and_is_prepended() {
    let mut studio = keyed_studio();

    studio.prompt = "First idea".to_string();
    studio.generate(&FakeApi::new(0)).await;
    assert_eq!(studio.videos().len(), 1);

    let api = FakeApi::new(4);
    studio.prompt = "Second idea".to_string();
    studio.generate(&api).await;

    assert_eq!(api.polls(), 5);
    assert_eq!(studio.videos().len(), 2);
    assert_eq!(studio.videos()[0].prompt, "Second idea");
    assert_eq!(studio.videos()[1].prompt, "First idea");
    assert_ne!(studio.videos()[0].id, studio.videos()[1].id);
}

#[tokio::test]
async fn failed_fetch_leaves_gallery_untouched() {
    let mut studio = keyed_studio();
    let mut api = FakeApi::new(1);
    api.fetch_status = 403;
    studio.prompt = "Team meeting".to_string();

    studio.generate(&api).await;

    assert_eq!(studio.phase(), Phase::Failed(FailureKind::Fetch));
    assert!(!studio.is_generating());
    assert_eq!(studio.status(), "");
    assert_eq!(studio.system_error(), Some(SNAG_MESSAGE));
    assert!(studio.videos().is_empty());
    assert_eq!(studio.prompt, "Team meeting");
}

#[tokio::test]
async fn job_without_locator_completes_quietly() {
    let mut studio = keyed_studio();
    let mut api = FakeApi::new(1);
    api.locator = None;
    studio.prompt = "Team meeting".to_string();

    studio.generate(&api).await;

    assert_eq!(studio.phase(), Phase::Done);
    assert_eq!(studio.system_error(), None);
    assert_eq!(studio.notice(), Some(NO_ARTIFACT_NOTICE));
    assert!(studio.videos().is_empty());
    assert_eq!(api.fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cozy_office_without_voiceover() {
    let mut studio = keyed_studio();
    let api = FakeApi::new(1);
    studio.prompt = "A cozy office at sunrise".to_string();
    studio.voiceover = String::new();

    studio.generate(&api).await;

    assert_eq!(api.polls(), 2);
    assert_eq!(api.speeches.load(Ordering::SeqCst), 0);
    assert_eq!(studio.videos().len(), 1);

    let video = &studio.videos()[0];
    assert_eq!(video.prompt, "A cozy office at sunrise");
    assert_eq!(video.audio_blob, "");
    assert!(video.url.exists());
    assert_eq!(std::fs::read(&video.url).unwrap(), b"fake mp4 bytes");

    let submitted = api.submitted.lock().unwrap();
    assert_eq!(
        submitted[0].prompt,
        "A cozy office at sunrise, friendly corporate style, high quality"
    );
    assert_eq!(submitted[0].number_of_videos, 1);
    assert_eq!(submitted[0].resolution, "1080p");
    assert_eq!(submitted[0].aspect_ratio, "16:9");

    assert_eq!(studio.prompt, "");
    assert_eq!(studio.voiceover, "");
    assert!(!studio.is_generating());
    assert_eq!(studio.status(), "");
}

#[tokio::test]
async fn team_meeting_carries_voiceover_audio() {
    let mut studio = keyed_studio();
    let mut api = FakeApi::new(0);
    api.audio = Some("AB12==".to_string());
    studio.prompt = "Team meeting".to_string();
    studio.voiceover = "Welcome everyone".to_string();

    studio.generate(&api).await;

    assert_eq!(api.speeches.load(Ordering::SeqCst), 1);
    assert_eq!(studio.videos().len(), 1);
    assert_eq!(studio.videos()[0].audio_blob, "AB12==");
    assert!(studio.videos()[0].has_audio());
}

#[tokio::test]
async fn missing_audio_is_not_fatal() {
    let mut studio = keyed_studio();
    let api = FakeApi::new(0);
    studio.prompt = "Team meeting".to_string();
    studio.voiceover = "Welcome everyone".to_string();

    studio.generate(&api).await;

    assert_eq!(studio.phase(), Phase::Done);
    assert_eq!(studio.videos()[0].audio_blob, "");
}

#[tokio::test]
async fn submit_error_is_laundered() {
    let mut studio = keyed_studio();
    let mut api = FakeApi::new(0);
    api.fail_submit = true;
    studio.prompt = "Team meeting".to_string();

    studio.generate(&api).await;

    assert_eq!(studio.phase(), Phase::Failed(FailureKind::Submit));
    assert_eq!(studio.system_error(), Some(SNAG_MESSAGE));
    assert_eq!(api.polls(), 0);
}

#[tokio::test]
async fn endless_job_times_out() {
    let mut studio = studio_with(MemoryCredential::with_key("AIzaTestKey"));
    let api = FakeApi::new(usize::MAX);
    studio.prompt = "Team meeting".to_string();

    let settings = GenerationSettings {
        max_polls: Some(3),
        ..fast_settings()
    };
    let session = MediaSession::new().unwrap();
    let mut attempt = Attempt::new(&api, &settings, &session, CancelFlag::new());
    let plan = AttemptPlan {
        key: "AIzaTestKey".to_string(),
        request: GenerationRequest::new("Team meeting", ""),
    };

    let result = attempt.run(&plan).await;
    assert!(matches!(result, Err(GenerationError::TimedOut { polls: 3 })));
    assert_eq!(attempt.phase(), Phase::Failed(FailureKind::TimedOut));
    assert_eq!(api.polls(), 3);

    studio.submit();
    studio.finish(result);
    assert_eq!(studio.system_error(), Some(TIMED_OUT_MESSAGE));
}

#[tokio::test]
async fn cancelled_attempt_makes_no_calls() {
    let api = FakeApi::new(0);
    let settings = fast_settings();
    let session = MediaSession::new().unwrap();
    let cancel = CancelFlag::new();
    cancel.cancel();

    let mut attempt = Attempt::new(&api, &settings, &session, cancel);
    let plan = AttemptPlan {
        key: "AIzaTestKey".to_string(),
        request: GenerationRequest::new("Team meeting", ""),
    };

    let result = attempt.run(&plan).await;
    assert!(matches!(result, Err(GenerationError::Cancelled)));
    assert_eq!(api.calls(), 0);
}

fn plan() -> AttemptPlan {
    AttemptPlan {
        key: "AIzaTestKey".to_string(),
        request: GenerationRequest::new("Team meeting", ""),
    }
}

#[tokio::test]
async fn cancel_interrupts_the_poll_wait() {
    let api = FakeApi::new(usize::MAX);
    let settings = GenerationSettings {
        poll_interval: Duration::from_secs(10),
        max_polls: None,
        ..GenerationSettings::default()
    };
    let session = MediaSession::new().unwrap();
    let cancel = CancelFlag::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let mut attempt = Attempt::new(&api, &settings, &session, cancel);
    let result = attempt.run(&plan()).await;

    assert!(matches!(result, Err(GenerationError::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(attempt.phase(), Phase::Failed(FailureKind::Cancelled));
    assert_eq!(api.polls(), 0);
    assert_eq!(api.submits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cancel_between_polls_stops_the_loop() {
    let cancel = CancelFlag::new();
    let mut api = FakeApi::new(usize::MAX);
    api.cancel_on_poll = Some(cancel.clone());
    let settings = GenerationSettings {
        max_polls: None,
        ..fast_settings()
    };
    let session = MediaSession::new().unwrap();

    let mut attempt = Attempt::new(&api, &settings, &session, cancel);
    let result = attempt.run(&plan()).await;

    assert!(matches!(result, Err(GenerationError::Cancelled)));
    assert_eq!(api.polls(), 1);
    assert_eq!(api.fetches.load(Ordering::SeqCst), 0);
    assert_eq!(
        attempt.trace().last(),
        Some(&Phase::Failed(FailureKind::Cancelled))
    );
}

#[tokio::test]
async fn cancelled_studio_attempt_shows_no_error() {
    let mut studio = keyed_studio();
    let mut api = FakeApi::new(usize::MAX);
    api.cancel_on_poll = Some(studio.cancel_flag());
    studio.prompt = "Team meeting".to_string();

    studio.generate(&api).await;

    assert_eq!(studio.phase(), Phase::Failed(FailureKind::Cancelled));
    assert_eq!(studio.system_error(), None);
    assert!(studio.videos().is_empty());
    assert_eq!(studio.prompt, "Team meeting");
}

#[tokio::test]
async fn trace_follows_the_state_machine() {
    let mut studio = keyed_studio();
    studio.prompt = "Team meeting".to_string();

    studio.generate(&FakeApi::new(1)).await;

    assert_eq!(
        studio.last_trace(),
        &[
            Phase::Submitting,
            Phase::Polling { polls: 0 },
            Phase::Polling { polls: 1 },
            Phase::Polling { polls: 2 },
            Phase::Fetching,
            Phase::Done,
        ]
    );
}
