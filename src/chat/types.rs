//! Core types for the chat layer

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::sound::AudioError;

pub const STATUS_NETWORK: &str = "Failed to connect to server. Please try again.";
pub const STATUS_MICROPHONE: &str = "Failed to access microphone. Please check permissions.";
pub const STATUS_NO_SPEECH: &str = "No speech detected. Please try again.";
pub const STATUS_SPEECH: &str = "Speech recognition error. Please try again.";
pub const STATUS_AUDIO: &str = "Error playing audio.";
pub const STATUS_UNSUPPORTED: &str = "Speech recognition not supported on this platform.";

/// Answer shown when the backend returns none
pub const NO_ANSWER: &str = "No answer available.";

/// Placeholder for an empty conversation
pub const EMPTY_CONVERSATION: &str = "Start a conversation by typing or speaking";

/// Error kinds surfaced to the user
///
/// Every variant is caught where it occurs and turned into a single status
/// message; none reaches the frame loop as a failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    /// Backend unreachable or non-2xx
    #[error("backend request failed: {0}")]
    NetworkFailure(String),
    #[error("microphone access denied")]
    MicrophoneAccessDenied,
    #[error("speech recognition failed ({detail})")]
    SpeechRecognitionFailure { no_speech: bool, detail: String },
    #[error("audio playback failed: {0}")]
    AudioPlaybackFailure(String),
    #[error("speech recognition unavailable")]
    UnsupportedEnvironment,
}

impl ChatError {
    /// The text shown in the status line
    pub fn status_message(&self) -> &'static str {
        match self {
            ChatError::NetworkFailure(_) => STATUS_NETWORK,
            ChatError::MicrophoneAccessDenied => STATUS_MICROPHONE,
            ChatError::SpeechRecognitionFailure { no_speech: true, .. } => STATUS_NO_SPEECH,
            ChatError::SpeechRecognitionFailure { .. } => STATUS_SPEECH,
            ChatError::AudioPlaybackFailure(_) => STATUS_AUDIO,
            ChatError::UnsupportedEnvironment => STATUS_UNSUPPORTED,
        }
    }
}

impl From<AudioError> for ChatError {
    fn from(err: AudioError) -> Self {
        match err {
            AudioError::PermissionDenied => ChatError::MicrophoneAccessDenied,
            other => ChatError::AudioPlaybackFailure(other.to_string()),
        }
    }
}

/// Result type for chat operations
pub type ChatResult<T> = Result<T, ChatError>;

/// Who said it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Label shown next to the message
    pub fn label(self) -> &'static str {
        match self {
            Role::User => "You",
            Role::Assistant => "Avatar",
        }
    }
}

/// One transcript entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub message: String,
}

impl ChatMessage {
    pub fn user(message: &str) -> Self {
        Self {
            role: Role::User,
            message: message.to_string(),
        }
    }

    pub fn assistant(message: &str) -> Self {
        Self {
            role: Role::Assistant,
            message: message.to_string(),
        }
    }
}

impl fmt::Display for ChatMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.role.label(), self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_messages() {
        assert_eq!(
            ChatError::NetworkFailure("timeout".into()).status_message(),
            "Failed to connect to server. Please try again."
        );
        assert_eq!(
            ChatError::MicrophoneAccessDenied.status_message(),
            "Failed to access microphone. Please check permissions."
        );
        let no_speech = ChatError::SpeechRecognitionFailure {
            no_speech: true,
            detail: "no-speech".into(),
        };
        assert_eq!(no_speech.status_message(), "No speech detected. Please try again.");
        let other = ChatError::SpeechRecognitionFailure {
            no_speech: false,
            detail: "network".into(),
        };
        assert_eq!(
            other.status_message(),
            "Speech recognition error. Please try again."
        );
        assert_eq!(
            ChatError::AudioPlaybackFailure("x".into()).status_message(),
            "Error playing audio."
        );
        assert_eq!(
            ChatError::UnsupportedEnvironment.status_message(),
            STATUS_UNSUPPORTED
        );
    }

    #[test]
    fn test_error_display_keeps_detail() {
        let err = ChatError::SpeechRecognitionFailure {
            no_speech: false,
            detail: "aborted".into(),
        };
        assert_eq!(err.to_string(), "speech recognition failed (aborted)");
        assert_eq!(
            ChatError::NetworkFailure("HTTP 502".into()).to_string(),
            "backend request failed: HTTP 502"
        );
    }

    #[test]
    fn test_from_audio_error() {
        assert_eq!(
            ChatError::from(AudioError::PermissionDenied),
            ChatError::MicrophoneAccessDenied
        );
        assert!(matches!(
            ChatError::from(AudioError::Decode("bad".into())),
            ChatError::AudioPlaybackFailure(_)
        ));
    }

    #[test]
    fn test_message_display() {
        assert_eq!(ChatMessage::user("hi").to_string(), "You: hi");
        assert_eq!(ChatMessage::assistant("hello").to_string(), "Avatar: hello");
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&ChatMessage::assistant("ok")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","message":"ok"}"#);
    }
}
