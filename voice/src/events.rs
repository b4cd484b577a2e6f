use serde::{Deserialize, Serialize};

/// Speaker attribution for transcript entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Assistant,
    User,
}

/// A partial transcript is a provisional, possibly-revised hypothesis; a
/// final one is the committed utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptKind {
    Partial,
    Final,
}

/// One speech-to-text event off the platform's message stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptUpdate {
    pub role: Role,
    pub transcript: String,
    #[serde(rename = "transcriptType")]
    pub kind: TranscriptKind,
}

/// A line in the conversation log. `is_partial` entries are still being
/// revised and may be replaced in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub role: Role,
    pub content: String,
    pub is_partial: bool,
}

/// The closed set of platform events the session reacts to. Arrival order
/// is the only ordering guarantee the platform gives.
#[derive(Debug, Clone, PartialEq)]
pub enum VoiceEvent {
    CallStart,
    CallEnd,
    SpeechStart,
    SpeechEnd,
    VolumeLevel(f32),
    Transcript(TranscriptUpdate),
    Error(String),
}
