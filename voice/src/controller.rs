use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::events::VoiceEvent;
use crate::session::{CallSession, SessionEffect, SessionStatus};

/// How long the ended screen shows before navigating to the profile.
const REDIRECT_DELAY: Duration = Duration::from_secs(1);

const ROLE_PERSONA: &str = "Nutrition and Fitness Coach";
const DAY_FORMAT_INSTRUCTION: &str = "Please refer to workout days by their name (e.g., Monday, \
     Tuesday) starting from today, rather than saying Day 1 or Day 2.";

#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("a call can only start from an idle or ended session")]
    NotStartable,
    #[error("no active call to stop")]
    NotActive,
    #[error("user context is not loaded yet")]
    NoUser,
    #[error("voice platform error: {0}")]
    Platform(String),
}

/// The signed-in account the session speaks for.
#[derive(Debug, Clone)]
pub struct UserContext {
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl UserContext {
    /// Trimmed `first last` concat; "Guest" when the account has no name.
    pub fn full_name(&self) -> String {
        let name = format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or(""),
            self.last_name.as_deref().unwrap_or("")
        )
        .trim()
        .to_string();
        if name.is_empty() { "Guest".to_string() } else { name }
    }
}

/// Context variables handed to the platform when a session opens. Keys are
/// the assistant workflow's variable names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionVariables {
    pub full_name: String,
    pub user_id: String,
    /// Full weekday name, so the assistant can anchor "starting from today"
    pub current_day: String,
    pub role_persona: String,
    pub day_format_instruction: String,
}

impl SessionVariables {
    pub fn for_user(user: &UserContext) -> Self {
        Self {
            full_name: user.full_name(),
            user_id: user.id.clone(),
            current_day: Local::now().format("%A").to_string(),
            role_persona: ROLE_PERSONA.to_string(),
            day_format_instruction: DAY_FORMAT_INSTRUCTION.to_string(),
        }
    }
}

/// The voice platform SDK surface the controller drives.
#[async_trait]
pub trait VoiceClient: Send + Sync {
    async fn start(
        &self,
        workflow_id: &str,
        variables: SessionVariables,
    ) -> Result<(), VoiceError>;

    async fn stop(&self) -> Result<(), VoiceError>;
}

/// Where the client navigates after a call wraps up.
pub trait Navigator: Send + Sync {
    fn redirect_to_profile(&self);
}

/// Predicate deciding which platform error reports are noise. The platform
/// re-reports every clean hangup as an error; those stay at debug level.
pub type ErrorFilter = fn(&str) -> bool;

/// Default filter: the disconnect notice a normal hangup produces.
pub fn is_benign_platform_error(message: &str) -> bool {
    message.contains("Meeting has ended")
}

/// Drives one call session: guards the lifecycle transitions, feeds
/// platform events through the [`CallSession`] reducer, and runs the
/// reducer's effects (currently just the deferred post-call redirect).
pub struct CallController {
    session: CallSession,
    client: Arc<dyn VoiceClient>,
    navigator: Arc<dyn Navigator>,
    workflow_id: String,
    error_filter: ErrorFilter,
    redirect: Option<JoinHandle<()>>,
}

impl CallController {
    pub fn new(
        client: Arc<dyn VoiceClient>,
        navigator: Arc<dyn Navigator>,
        workflow_id: impl Into<String>,
    ) -> Self {
        Self {
            session: CallSession::new(),
            client,
            navigator,
            workflow_id: workflow_id.into(),
            error_filter: is_benign_platform_error,
            redirect: None,
        }
    }

    /// Replace the benign-error predicate. Scoped to this controller, so a
    /// suppression policy never leaks process-wide.
    pub fn with_error_filter(mut self, filter: ErrorFilter) -> Self {
        self.error_filter = filter;
        self
    }

    pub fn session(&self) -> &CallSession {
        &self.session
    }

    /// Open a session. Valid only from `Idle` or `Ended` with a loaded
    /// user; wipes the previous transcript and cancels a pending redirect.
    /// If the platform refuses to open, the session falls back to `Idle`
    /// so the user can retry.
    pub async fn start(&mut self, user: Option<&UserContext>) -> Result<(), VoiceError> {
        if !matches!(
            self.session.status,
            SessionStatus::Idle | SessionStatus::Ended
        ) {
            return Err(VoiceError::NotStartable);
        }
        let user = user.ok_or(VoiceError::NoUser)?;

        self.cancel_redirect();
        self.session.begin_connecting();

        let variables = SessionVariables::for_user(user);
        if let Err(err) = self.client.start(&self.workflow_id, variables).await {
            tracing::error!(error = %err, "failed to start call");
            self.session.status = SessionStatus::Idle;
            return Err(err);
        }
        Ok(())
    }

    /// Ask the platform to end the call. The session stays `Active` until
    /// the platform confirms with a call-end event; stopping is a request,
    /// not a transition.
    pub async fn stop(&self) -> Result<(), VoiceError> {
        if !self.session.can_stop() {
            return Err(VoiceError::NotActive);
        }
        self.client.stop().await
    }

    /// Feed one platform event through the reducer and run its effect.
    pub fn handle_event(&mut self, event: VoiceEvent) {
        if let VoiceEvent::Error(message) = &event {
            if (self.error_filter)(message) {
                tracing::debug!(error = %message, "suppressed benign platform error");
            } else {
                tracing::error!(error = %message, "voice platform error");
            }
        }

        if let Some(SessionEffect::RedirectSoon) = self.session.apply(event) {
            self.schedule_redirect();
        }
    }

    /// Drain the platform's event stream until it closes, then detach.
    /// Gives embedders a single await point for the whole session.
    pub async fn run(&mut self, mut events: mpsc::Receiver<VoiceEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event);
        }
        self.teardown();
    }

    /// Detach everything this controller scheduled. Safe to call
    /// repeatedly and on early-exit paths; `Drop` calls it too, so a
    /// pending redirect can never outlive the controller.
    pub fn teardown(&mut self) {
        self.cancel_redirect();
    }

    fn schedule_redirect(&mut self) {
        self.cancel_redirect();
        let navigator = Arc::clone(&self.navigator);
        self.redirect = Some(tokio::spawn(async move {
            tokio::time::sleep(REDIRECT_DELAY).await;
            navigator.redirect_to_profile();
        }));
    }

    fn cancel_redirect(&mut self) {
        if let Some(handle) = self.redirect.take() {
            handle.abort();
        }
    }
}

impl Drop for CallController {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::events::{Role, TranscriptKind, TranscriptUpdate};

    #[derive(Default)]
    struct MockVoice {
        started: Mutex<Vec<(String, SessionVariables)>>,
        stopped: AtomicUsize,
        fail_start: bool,
    }

    #[async_trait]
    impl VoiceClient for MockVoice {
        async fn start(
            &self,
            workflow_id: &str,
            variables: SessionVariables,
        ) -> Result<(), VoiceError> {
            if self.fail_start {
                return Err(VoiceError::Platform("connection refused".to_string()));
            }
            self.started
                .lock()
                .unwrap()
                .push((workflow_id.to_string(), variables));
            Ok(())
        }

        async fn stop(&self) -> Result<(), VoiceError> {
            self.stopped.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockNavigator {
        redirects: AtomicUsize,
    }

    impl Navigator for MockNavigator {
        fn redirect_to_profile(&self) {
            self.redirects.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn user() -> UserContext {
        UserContext {
            id: "user_1".to_string(),
            first_name: Some("Ada".to_string()),
            last_name: None,
        }
    }

    fn controller(
        voice: Arc<MockVoice>,
        navigator: Arc<MockNavigator>,
    ) -> CallController {
        CallController::new(voice, navigator, "wf_123")
    }

    #[tokio::test]
    async fn start_opens_a_session_with_identity_and_context_variables() {
        let voice = Arc::new(MockVoice::default());
        let navigator = Arc::new(MockNavigator::default());
        let mut ctl = controller(voice.clone(), navigator);

        ctl.start(Some(&user())).await.expect("starts");
        assert_eq!(ctl.session().status, SessionStatus::Connecting);

        let started = voice.started.lock().unwrap();
        assert_eq!(started.len(), 1);
        let (workflow_id, variables) = &started[0];
        assert_eq!(workflow_id, "wf_123");
        assert_eq!(variables.full_name, "Ada");
        assert_eq!(variables.user_id, "user_1");
        assert_eq!(variables.role_persona, "Nutrition and Fitness Coach");
        assert!(!variables.current_day.is_empty());
    }

    #[tokio::test]
    async fn start_requires_a_loaded_user() {
        let voice = Arc::new(MockVoice::default());
        let mut ctl = controller(voice.clone(), Arc::new(MockNavigator::default()));

        assert!(matches!(ctl.start(None).await, Err(VoiceError::NoUser)));
        assert_eq!(ctl.session().status, SessionStatus::Idle);
        assert!(voice.started.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn start_is_rejected_while_connecting_or_active() {
        let voice = Arc::new(MockVoice::default());
        let mut ctl = controller(voice.clone(), Arc::new(MockNavigator::default()));

        ctl.start(Some(&user())).await.expect("starts");
        assert!(matches!(
            ctl.start(Some(&user())).await,
            Err(VoiceError::NotStartable)
        ));

        ctl.handle_event(VoiceEvent::CallStart);
        assert!(matches!(
            ctl.start(Some(&user())).await,
            Err(VoiceError::NotStartable)
        ));
        assert_eq!(voice.started.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_open_falls_back_to_idle_not_ended() {
        let voice = Arc::new(MockVoice {
            fail_start: true,
            ..MockVoice::default()
        });
        let mut ctl = controller(voice, Arc::new(MockNavigator::default()));

        assert!(ctl.start(Some(&user())).await.is_err());
        assert_eq!(ctl.session().status, SessionStatus::Idle);
        assert!(ctl.session().can_start());
    }

    #[tokio::test]
    async fn start_clears_the_previous_transcript() {
        let voice = Arc::new(MockVoice::default());
        let mut ctl = controller(voice, Arc::new(MockNavigator::default()));

        ctl.start(Some(&user())).await.expect("starts");
        ctl.handle_event(VoiceEvent::CallStart);
        ctl.handle_event(VoiceEvent::Transcript(TranscriptUpdate {
            role: Role::User,
            transcript: "old call".to_string(),
            kind: TranscriptKind::Final,
        }));
        ctl.handle_event(VoiceEvent::CallEnd);

        ctl.start(Some(&user())).await.expect("restarts from ended");
        assert!(ctl.session().transcript.is_empty());
    }

    #[tokio::test]
    async fn stop_requests_an_end_without_changing_state() {
        let voice = Arc::new(MockVoice::default());
        let mut ctl = controller(voice.clone(), Arc::new(MockNavigator::default()));

        ctl.start(Some(&user())).await.expect("starts");
        ctl.handle_event(VoiceEvent::CallStart);

        ctl.stop().await.expect("stops");
        assert_eq!(voice.stopped.load(Ordering::SeqCst), 1);
        // Still active until the platform confirms.
        assert_eq!(ctl.session().status, SessionStatus::Active);

        ctl.handle_event(VoiceEvent::CallEnd);
        assert_eq!(ctl.session().status, SessionStatus::Ended);
    }

    #[tokio::test]
    async fn stop_outside_an_active_call_is_rejected() {
        let voice = Arc::new(MockVoice::default());
        let ctl = controller(voice.clone(), Arc::new(MockNavigator::default()));

        assert!(matches!(ctl.stop().await, Err(VoiceError::NotActive)));
        assert_eq!(voice.stopped.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn call_end_schedules_the_deferred_redirect() {
        let navigator = Arc::new(MockNavigator::default());
        let mut ctl = controller(Arc::new(MockVoice::default()), navigator.clone());

        ctl.start(Some(&user())).await.expect("starts");
        ctl.handle_event(VoiceEvent::CallStart);
        ctl.handle_event(VoiceEvent::CallEnd);
        assert_eq!(navigator.redirects.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(navigator.redirects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_cancels_a_pending_redirect() {
        let navigator = Arc::new(MockNavigator::default());
        let mut ctl = controller(Arc::new(MockVoice::default()), navigator.clone());

        ctl.handle_event(VoiceEvent::CallEnd);
        ctl.teardown();
        ctl.teardown(); // idempotent

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(navigator.redirects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_cancels_the_pending_redirect() {
        let navigator = Arc::new(MockNavigator::default());
        let mut ctl = controller(Arc::new(MockVoice::default()), navigator.clone());

        ctl.handle_event(VoiceEvent::CallEnd);
        tokio::time::sleep(Duration::from_millis(500)).await;

        ctl.start(Some(&user())).await.expect("restarts");
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(navigator.redirects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_controller_cancels_the_redirect() {
        let navigator = Arc::new(MockNavigator::default());
        let mut ctl = controller(Arc::new(MockVoice::default()), navigator.clone());

        ctl.handle_event(VoiceEvent::CallEnd);
        drop(ctl);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(navigator.redirects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn run_drains_the_event_stream_and_detaches() {
        let voice = Arc::new(MockVoice::default());
        let mut ctl = controller(voice, Arc::new(MockNavigator::default()));
        ctl.start(Some(&user())).await.expect("starts");

        let (tx, rx) = mpsc::channel(8);
        for event in [
            VoiceEvent::CallStart,
            VoiceEvent::SpeechStart,
            VoiceEvent::Transcript(TranscriptUpdate {
                role: Role::Assistant,
                transcript: "Welcome back".to_string(),
                kind: TranscriptKind::Final,
            }),
            VoiceEvent::SpeechEnd,
            VoiceEvent::CallEnd,
        ] {
            tx.send(event).await.expect("queued");
        }
        drop(tx);

        ctl.run(rx).await;
        assert_eq!(ctl.session().status, SessionStatus::Ended);
        assert_eq!(ctl.session().transcript.len(), 1);
        assert!(!ctl.session().is_speaking);
    }

    #[test]
    fn full_name_falls_back_to_guest() {
        let anonymous = UserContext {
            id: "user_2".to_string(),
            first_name: None,
            last_name: None,
        };
        assert_eq!(anonymous.full_name(), "Guest");
        assert_eq!(user().full_name(), "Ada");
    }

    #[test]
    fn benign_platform_errors_are_recognized() {
        assert!(is_benign_platform_error("Meeting has ended unexpectedly"));
        assert!(!is_benign_platform_error("ICE connection failed"));
    }

    #[test]
    fn session_variables_serialize_with_workflow_key_names() {
        let variables = SessionVariables::for_user(&user());
        let value = serde_json::to_value(&variables).expect("serializes");
        for key in [
            "full_name",
            "user_id",
            "current_day",
            "role_persona",
            "day_format_instruction",
        ] {
            assert!(value.get(key).is_some(), "missing key {key}");
        }
    }
}
