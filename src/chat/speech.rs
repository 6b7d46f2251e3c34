//! Speech-to-text capability
//!
//! Recognition is optional. When the platform has none, use
//! [`UnsupportedSpeech`]; the session reports it once instead of branching
//! on the environment everywhere.

use std::collections::VecDeque;

use super::types::{ChatError, ChatResult};

/// Default recognition language
pub const DEFAULT_LANGUAGE: &str = "id-ID";

/// Recognition session parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionSettings {
    /// BCP 47 language tag
    pub language: String,
    /// Keep listening after the first final result
    pub continuous: bool,
    /// Deliver partial transcripts
    pub interim_results: bool,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            continuous: false,
            interim_results: false,
        }
    }
}

/// Recognition failure cause
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechErrorCode {
    NoSpeech,
    Other(String),
}

impl From<SpeechErrorCode> for ChatError {
    fn from(code: SpeechErrorCode) -> Self {
        match code {
            SpeechErrorCode::NoSpeech => ChatError::SpeechRecognitionFailure {
                no_speech: true,
                detail: "no-speech".to_string(),
            },
            SpeechErrorCode::Other(detail) => ChatError::SpeechRecognitionFailure {
                no_speech: false,
                detail,
            },
        }
    }
}

/// Outcome of a recognition session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    /// Final transcript
    Transcript(String),
    Error(SpeechErrorCode),
}

/// Speech recognizer
pub trait SpeechInput {
    fn is_supported(&self) -> bool;

    fn start(&mut self, settings: &RecognitionSettings) -> ChatResult<()>;

    fn stop(&mut self);

    fn is_active(&self) -> bool;

    /// Next result of the running session
    fn poll_event(&mut self) -> Option<SpeechEvent>;
}

/// Platform without speech recognition
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedSpeech;

impl SpeechInput for UnsupportedSpeech {
    fn is_supported(&self) -> bool {
        false
    }

    fn start(&mut self, _settings: &RecognitionSettings) -> ChatResult<()> {
        Err(ChatError::UnsupportedEnvironment)
    }

    fn stop(&mut self) {}

    fn is_active(&self) -> bool {
        false
    }

    fn poll_event(&mut self) -> Option<SpeechEvent> {
        None
    }
}

/// Recognizer replaying queued results, one per session
#[derive(Debug, Default, Clone)]
pub struct ScriptedSpeech {
    script: VecDeque<SpeechEvent>,
    active: bool,
    sessions: usize,
    last_settings: Option<RecognitionSettings>,
}

impl ScriptedSpeech {
    pub fn new<I: IntoIterator<Item = SpeechEvent>>(events: I) -> Self {
        Self {
            script: events.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn push(&mut self, event: SpeechEvent) {
        self.script.push_back(event);
    }

    /// Sessions started so far
    pub fn sessions(&self) -> usize {
        self.sessions
    }

    pub fn last_settings(&self) -> Option<&RecognitionSettings> {
        self.last_settings.as_ref()
    }
}

impl SpeechInput for ScriptedSpeech {
    fn is_supported(&self) -> bool {
        true
    }

    fn start(&mut self, settings: &RecognitionSettings) -> ChatResult<()> {
        self.active = true;
        self.sessions += 1;
        self.last_settings = Some(settings.clone());
        Ok(())
    }

    fn stop(&mut self) {
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn poll_event(&mut self) -> Option<SpeechEvent> {
        if !self.active {
            return None;
        }
        let event = self.script.pop_front()?;
        // Non-continuous: the session ends with its result
        self.active = false;
        Some(event)
    }
}
