use crate::events::{TranscriptMessage, VoiceEvent};
use crate::transcript::apply_transcript;

/// Call lifecycle. `Ended` is terminal for the reducer; only a fresh
/// `start()` on the controller leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Connecting,
    Active,
    Ended,
}

/// Side effects the reducer asks its host to run. Keeping them out of the
/// reducer keeps every transition synchronously testable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEffect {
    /// Entering `Ended` schedules a short deferred navigation away.
    RedirectSoon,
}

/// Transient per-session UI state. Lives for one call attempt; a new
/// `start()` resets it.
#[derive(Debug, Clone, PartialEq)]
pub struct CallSession {
    pub status: SessionStatus,
    pub is_speaking: bool,
    pub volume: f32,
    pub transcript: Vec<TranscriptMessage>,
}

impl Default for CallSession {
    fn default() -> Self {
        Self {
            status: SessionStatus::Idle,
            is_speaking: false,
            volume: 0.0,
            transcript: Vec::new(),
        }
    }
}

impl CallSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// The start affordance mirrors the UI gate: blocked while a call is
    /// connecting or running, and right after one ended (the redirect is
    /// about to fire).
    pub fn can_start(&self) -> bool {
        self.status == SessionStatus::Idle
    }

    pub fn can_stop(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Reset performed by a fresh `start()`: wipe the previous call's
    /// transcript and enter `Connecting`.
    pub(crate) fn begin_connecting(&mut self) {
        self.status = SessionStatus::Connecting;
        self.is_speaking = false;
        self.volume = 0.0;
        self.transcript.clear();
    }

    /// Fold one platform event into the session.
    ///
    /// `CallEnd` always ends the session regardless of prior state. A
    /// platform error leaves the session retryable (back to `Idle`), never
    /// `Ended`; logging it is the host's concern, not the reducer's.
    pub fn apply(&mut self, event: VoiceEvent) -> Option<SessionEffect> {
        match event {
            VoiceEvent::CallStart => {
                self.status = SessionStatus::Active;
                None
            }
            VoiceEvent::CallEnd => {
                self.is_speaking = false;
                self.status = SessionStatus::Ended;
                Some(SessionEffect::RedirectSoon)
            }
            VoiceEvent::SpeechStart => {
                self.is_speaking = true;
                None
            }
            VoiceEvent::SpeechEnd => {
                self.is_speaking = false;
                None
            }
            VoiceEvent::VolumeLevel(volume) => {
                self.volume = volume;
                None
            }
            VoiceEvent::Transcript(update) => {
                apply_transcript(&mut self.transcript, update);
                None
            }
            VoiceEvent::Error(_) => {
                if matches!(self.status, SessionStatus::Connecting | SessionStatus::Active) {
                    self.status = SessionStatus::Idle;
                }
                None
            }
        }
    }
}
