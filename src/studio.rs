use crate::api::GenerationApi;
use crate::config::GenerationSettings;
use crate::credential::CredentialStore;
use crate::editor::CredentialEditor;
use crate::job::{GeneratedVideo, GenerationRequest};
use crate::session::MediaSession;
use crate::workflow::{Attempt, AttemptPlan, CancelFlag, Event, GenerationError, Outcome, Phase};
use crate::{loge, logi, logok, logw};
use std::sync::Arc;

pub const NO_ARTIFACT_NOTICE: &str = "The video finished but nothing came back to show.";

/// Result of asking the studio to start (or resume) an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Blank prompt, or an attempt is already running.
    Ignored,
    /// No key stored; the key editor is now open.
    NeedsKey,
    Ready(AttemptPlan),
}

/// The state a front end renders: inputs, progress, errors and the gallery.
pub struct Studio<S: CredentialStore> {
    pub prompt: String,
    pub voiceover: String,
    credentials: S,
    editor: CredentialEditor,
    settings: GenerationSettings,
    session: Arc<MediaSession>,
    phase: Phase,
    status: String,
    system_error: Option<String>,
    notice: Option<String>,
    show_key_prompt: bool,
    pending: Option<GenerationRequest>,
    videos: Vec<GeneratedVideo>,
    cancel: CancelFlag,
    last_trace: Vec<Phase>,
}

impl<S: CredentialStore> Studio<S> {
    pub fn new(credentials: S, settings: GenerationSettings, session: MediaSession) -> Self {
        Self {
            prompt: String::new(),
            voiceover: String::new(),
            credentials,
            editor: CredentialEditor::new(),
            settings,
            session: Arc::new(session),
            phase: Phase::Idle,
            status: String::new(),
            system_error: None,
            notice: None,
            show_key_prompt: false,
            pending: None,
            videos: Vec::new(),
            cancel: CancelFlag::new(),
            last_trace: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_generating(&self) -> bool {
        self.phase.is_busy()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn system_error(&self) -> Option<&str> {
        self.system_error.as_deref()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn show_key_prompt(&self) -> bool {
        self.show_key_prompt
    }

    /// Newest first.
    pub fn videos(&self) -> &[GeneratedVideo] {
        &self.videos
    }

    pub fn credentials(&self) -> &S {
        &self.credentials
    }

    pub fn editor(&self) -> &CredentialEditor {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut CredentialEditor {
        &mut self.editor
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    pub fn session(&self) -> Arc<MediaSession> {
        Arc::clone(&self.session)
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Phases walked by the most recent attempt that reached submission.
    pub fn last_trace(&self) -> &[Phase] {
        &self.last_trace
    }

    pub fn can_submit(&self) -> bool {
        !self.is_generating() && !self.prompt.trim().is_empty()
    }

    fn advance(&mut self, event: Event) {
        match self.phase.on(event) {
            Some(next) => {
                self.phase = next;
                self.status = next.status_text().to_string();
            }
            None => logw(format!("Ignoring {:?} while {:?}", event, self.phase)),
        }
    }

    /// Mirrors a phase reported by an attempt running elsewhere.
    pub fn observe(&mut self, phase: Phase) {
        if self.phase.is_busy() && phase.is_busy() {
            self.phase = phase;
            self.status = phase.status_text().to_string();
        }
    }

    /// "Submit prompt". Blank prompts, re-entry while busy and submits while the
    /// key editor is waiting do nothing; the waiting attempt resumes through `save_key`.
    pub fn submit(&mut self) -> Submission {
        if self.is_generating() || self.phase == Phase::AwaitingKey {
            return Submission::Ignored;
        }
        let request = GenerationRequest::new(self.prompt.clone(), self.voiceover.clone());
        if !request.is_submittable() {
            return Submission::Ignored;
        }
        self.advance(Event::Submit);
        self.check_key(request)
    }

    fn check_key(&mut self, request: GenerationRequest) -> Submission {
        let key = self.credentials.get();
        if key.is_empty() {
            logi("No API key stored; asking for one.");
            self.advance(Event::KeyMissing);
            self.pending = Some(request);
            self.show_key_prompt = true;
            self.editor.open(&self.credentials);
            return Submission::NeedsKey;
        }

        self.advance(Event::KeyPresent);
        self.system_error = None;
        self.notice = None;
        self.cancel.reset();
        logi(format!("Starting attempt with key ({} chars)", key.len()));
        Submission::Ready(AttemptPlan { key, request })
    }

    pub fn open_key_editor(&mut self) {
        self.editor.open(&self.credentials);
    }

    /// "Save credential". Resumes a suspended attempt when one is waiting on the key.
    pub fn save_key(&mut self) -> Submission {
        let mut saved = false;
        self.editor.save(&mut self.credentials, || saved = true);
        if !saved {
            return Submission::Ignored;
        }
        logok("API key saved.");
        self.show_key_prompt = false;

        if self.phase != Phase::AwaitingKey {
            return Submission::Ignored;
        }
        let Some(request) = self.pending.take() else {
            self.advance(Event::KeyDismissed);
            return Submission::Ignored;
        };
        self.advance(Event::KeySaved);
        self.check_key(request)
    }

    /// "Clear credential".
    pub fn clear_key(&mut self) {
        self.editor.clear(&mut self.credentials);
        logi("API key cleared.");
    }

    /// "Cancel credential entry".
    pub fn cancel_key_entry(&mut self) {
        self.editor.cancel();
        self.show_key_prompt = false;
        if self.phase == Phase::AwaitingKey {
            self.pending = None;
            self.advance(Event::KeyDismissed);
        }
    }

    /// Stops the running attempt at its next suspend point.
    pub fn cancel(&self) {
        if self.is_generating() {
            self.cancel.cancel();
        }
    }

    /// Applies the result of an attempt and clears the in-progress state.
    pub fn finish(&mut self, result: Result<Outcome, GenerationError>) {
        match result {
            Ok(Outcome::Created(video)) => {
                logok(format!("Added video {} to the gallery", video.id));
                self.videos.insert(0, video);
                self.prompt.clear();
                self.voiceover.clear();
                self.phase = Phase::Done;
            }
            Ok(Outcome::NoArtifact) => {
                self.notice = Some(NO_ARTIFACT_NOTICE.to_string());
                self.phase = Phase::Done;
            }
            Err(err) => {
                loge(format!("Attempt failed ({:?}): {}", err.kind(), err));
                self.system_error = err.user_message().map(str::to_string);
                self.phase = Phase::Failed(err.kind());
            }
        }
        self.status.clear();
    }

    pub fn set_last_trace(&mut self, trace: Vec<Phase>) {
        self.last_trace = trace;
    }

    /// Runs a prepared attempt to completion against `api`.
    pub async fn run(&mut self, api: &dyn GenerationApi, plan: AttemptPlan) {
        let settings = self.settings.clone();
        let session = Arc::clone(&self.session);
        let mut attempt = Attempt::new(api, &settings, &session, self.cancel.clone());
        let result = attempt.run(&plan).await;
        self.last_trace = attempt.into_trace();
        self.finish(result);
    }

    /// Submit, and if the key is there, carry the attempt through.
    pub async fn generate(&mut self, api: &dyn GenerationApi) -> Submission {
        let submission = self.submit();
        self.drive(api, submission).await
    }

    /// Save the key, and if an attempt was waiting on it, carry it through.
    pub async fn save_key_and_resume(&mut self, api: &dyn GenerationApi) -> Submission {
        let submission = self.save_key();
        self.drive(api, submission).await
    }

    async fn drive(&mut self, api: &dyn GenerationApi, submission: Submission) -> Submission {
        if let Submission::Ready(plan) = &submission {
            self.run(api, plan.clone()).await;
        }
        submission
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::MemoryCredential;
    use crate::workflow::{FailureKind, SNAG_MESSAGE};

    fn studio(key: Option<&str>) -> Studio<MemoryCredential> {
        let store = key.map(MemoryCredential::with_key).unwrap_or_default();
        Studio::new(
            store,
            GenerationSettings::default(),
            MediaSession::new().unwrap(),
        )
    }

    #[test]
    fn blank_prompt_never_leaves_idle() {
        let mut s = studio(Some("k"));
        s.prompt = "   ".into();
        assert_eq!(s.submit(), Submission::Ignored);
        assert_eq!(s.phase(), Phase::Idle);
        assert!(!s.can_submit());
    }

    #[test]
    fn missing_key_opens_editor() {
        let mut s = studio(None);
        s.prompt = "Team meeting".into();

        assert_eq!(s.submit(), Submission::NeedsKey);
        assert_eq!(s.phase(), Phase::AwaitingKey);
        assert!(s.show_key_prompt());
        assert!(s.editor().is_open());
        assert!(!s.is_generating());
    }

    #[test]
    fn saving_key_resumes_pending_request() {
        let mut s = studio(None);
        s.prompt = "Team meeting".into();
        s.voiceover = "Welcome everyone".into();
        s.submit();

        s.editor_mut().set_value(" AIzaKey ");
        match s.save_key() {
            Submission::Ready(plan) => {
                assert_eq!(plan.key, "AIzaKey");
                assert_eq!(plan.request.prompt, "Team meeting");
                assert_eq!(plan.request.voiceover, "Welcome everyone");
            }
            other => panic!("expected Ready, got {:?}", other),
        }
        assert_eq!(s.phase(), Phase::Submitting);
        assert!(s.is_generating());
        assert!(!s.show_key_prompt());
    }

    #[test]
    fn busy_studio_ignores_resubmission() {
        let mut s = studio(Some("k"));
        s.prompt = "Team meeting".into();
        assert!(matches!(s.submit(), Submission::Ready(_)));
        assert_eq!(s.submit(), Submission::Ignored);
    }

    #[test]
    fn submit_while_awaiting_key_is_ignored() {
        let mut s = studio(None);
        s.prompt = "Team meeting".into();
        assert_eq!(s.submit(), Submission::NeedsKey);

        s.credentials.set("AIzaFromElsewhere");
        assert_eq!(s.submit(), Submission::Ignored);
        assert_eq!(s.phase(), Phase::AwaitingKey);

        s.editor_mut().set_value("AIzaFromElsewhere");
        assert!(matches!(s.save_key(), Submission::Ready(_)));
        assert!(s.is_generating());
    }

    #[test]
    fn cancelling_key_entry_returns_to_idle() {
        let mut s = studio(None);
        s.prompt = "Team meeting".into();
        s.submit();

        s.cancel_key_entry();
        assert_eq!(s.phase(), Phase::Idle);
        assert!(!s.show_key_prompt());
        assert!(!s.editor().is_open());
    }

    #[test]
    fn failure_sets_generic_message_and_clears_status() {
        let mut s = studio(Some("k"));
        s.prompt = "Team meeting".into();
        s.submit();
        assert!(!s.status().is_empty());

        s.finish(Err(GenerationError::Fetch { status: 500 }));
        assert_eq!(s.phase(), Phase::Failed(FailureKind::Fetch));
        assert_eq!(s.system_error(), Some(SNAG_MESSAGE));
        assert_eq!(s.status(), "");
        assert!(!s.is_generating());
        assert_eq!(s.prompt, "Team meeting");
    }

    #[test]
    fn no_artifact_is_a_quiet_completion() {
        let mut s = studio(Some("k"));
        s.prompt = "Team meeting".into();
        s.submit();

        s.finish(Ok(Outcome::NoArtifact));
        assert_eq!(s.phase(), Phase::Done);
        assert_eq!(s.system_error(), None);
        assert_eq!(s.notice(), Some(NO_ARTIFACT_NOTICE));
        assert!(s.videos().is_empty());
        assert_eq!(s.prompt, "Team meeting");
    }
}
