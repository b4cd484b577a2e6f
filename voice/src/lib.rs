//! Call-session core for the NutriFit voice client.
//!
//! Everything here is platform-independent: the voice platform's SDK is
//! reached through the [`VoiceClient`] trait and every state transition is
//! a pure reduction over [`VoiceEvent`], so the whole session lifecycle
//! can be exercised without a live connection.

pub mod controller;
pub mod events;
pub mod session;
pub mod transcript;

pub use controller::{
    CallController, Navigator, SessionVariables, UserContext, VoiceClient, VoiceError,
};
pub use events::{Role, TranscriptKind, TranscriptMessage, TranscriptUpdate, VoiceEvent};
pub use session::{CallSession, SessionEffect, SessionStatus};
