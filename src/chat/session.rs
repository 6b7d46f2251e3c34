//! Chat session state machine
//!
//! Holds the listening / loading / chat-open flags, the transcript and the
//! single status line. Every failure is converted into a status message
//! here; nothing is retried without a new user action.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::backend::{QueryBackend, QueryRequest};
use super::conversation::Conversation;
use super::dispatch::{QueryDispatcher, RequestId};
use super::speech::{RecognitionSettings, SpeechEvent, SpeechInput};
use super::types::ChatError;
use crate::sound::{AudioError, Microphone, Recording};

/// Something the avatar has to act on
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A query went out; the current answer audio should stop
    QueryStarted(RequestId),
    /// Answer text arrived and was appended to the conversation
    Answered { id: RequestId, text: String },
    /// Answer audio to play
    AudioReady(String),
    /// A failure was turned into the status message
    Failed(ChatError),
}

/// User-facing chat state
pub struct ChatSession {
    conversation: Conversation,
    listening: bool,
    chat_open: bool,
    answer_text: String,
    status: Option<ChatError>,
    settings: RecognitionSettings,
    dispatcher: QueryDispatcher,
    speech: Box<dyn SpeechInput>,
    microphone: Box<dyn Microphone>,
    recording: Option<Box<dyn Recording>>,
    events: Vec<SessionEvent>,
}

impl ChatSession {
    pub fn new(
        backend: Arc<dyn QueryBackend>,
        speech: Box<dyn SpeechInput>,
        microphone: Box<dyn Microphone>,
        settings: RecognitionSettings,
    ) -> Self {
        let mut session = Self {
            conversation: Conversation::new(),
            listening: false,
            chat_open: false,
            answer_text: String::new(),
            status: None,
            settings,
            dispatcher: QueryDispatcher::new(backend),
            speech,
            microphone,
            recording: None,
            events: Vec::new(),
        };
        if !session.speech.is_supported() {
            session.report(ChatError::UnsupportedEnvironment);
        }
        session
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// True while any query is in flight
    pub fn is_loading(&self) -> bool {
        self.dispatcher.in_flight() > 0
    }

    pub fn is_chat_open(&self) -> bool {
        self.chat_open
    }

    /// Last answer received
    pub fn answer_text(&self) -> &str {
        &self.answer_text
    }

    pub fn status(&self) -> Option<&ChatError> {
        self.status.as_ref()
    }

    pub fn status_message(&self) -> Option<&'static str> {
        self.status.as_ref().map(ChatError::status_message)
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn settings(&self) -> &RecognitionSettings {
        &self.settings
    }

    /// Flip the chat panel; returns the new state
    pub fn toggle_chat(&mut self) -> bool {
        self.chat_open = !self.chat_open;
        self.chat_open
    }

    /// Send a typed message
    ///
    /// Blank input and input while a query is loading are ignored.
    pub fn send_text(&mut self, text: &str) -> Option<RequestId> {
        if text.trim().is_empty() || self.is_loading() {
            return None;
        }
        self.conversation.push_user(text);
        self.submit(QueryRequest::text(text))
    }

    /// Start or stop voice input
    pub fn toggle_listening(&mut self) {
        if self.listening {
            self.stop_listening();
        } else {
            self.start_listening();
        }
    }

    fn start_listening(&mut self) {
        self.status = None;
        let recording = match self.microphone.acquire() {
            Ok(recording) => recording,
            Err(err) => {
                self.listening = false;
                warn!(error = %err, "microphone unavailable");
                self.report(ChatError::MicrophoneAccessDenied);
                return;
            }
        };
        self.recording = Some(recording);

        if self.speech.is_supported() {
            if let Err(err) = self.speech.start(&self.settings) {
                self.discard_recording();
                self.listening = false;
                self.report(err);
                return;
            }
        }
        self.listening = true;
        debug!(language = %self.settings.language, "listening");
    }

    fn stop_listening(&mut self) {
        self.speech.stop();
        self.listening = false;
        if let Some(recording) = self.recording.take() {
            let audio = recording.stop();
            debug!(duration_ms = audio.duration().as_millis() as u64, "recording finished");
            self.submit(QueryRequest::audio(audio));
        }
    }

    /// Drain speech results and backend replies
    pub fn poll(&mut self) -> Vec<SessionEvent> {
        while let Some(event) = self.speech.poll_event() {
            match event {
                SpeechEvent::Transcript(transcript) => {
                    self.listening = false;
                    // The transcript supersedes the parallel recording
                    self.discard_recording();
                    info!(transcript = %transcript, "speech recognized");
                    self.conversation.push_user(&transcript);
                    self.submit(QueryRequest::text(&transcript));
                }
                SpeechEvent::Error(code) => {
                    self.listening = false;
                    self.speech.stop();
                    self.discard_recording();
                    self.report(code.into());
                }
            }
        }

        while let Some(reply) = self.dispatcher.try_recv() {
            match reply.result {
                Ok(response) => {
                    let answer = response.answer_text().to_string();
                    info!(id = ?reply.id, has_audio = response.audio_file().is_some(), "answer received");
                    self.conversation.push_assistant(&answer);
                    self.answer_text = answer.clone();
                    self.events.push(SessionEvent::Answered {
                        id: reply.id,
                        text: answer,
                    });
                    if let Some(file) = response.audio_file() {
                        let url = self.dispatcher.audio_url(file);
                        self.events.push(SessionEvent::AudioReady(url));
                    }
                }
                Err(err) => self.report(err),
            }
        }

        std::mem::take(&mut self.events)
    }

    /// Route an audio playback failure into the status line
    pub fn report_playback_error(&mut self, err: &AudioError) {
        self.report(ChatError::AudioPlaybackFailure(err.to_string()));
    }

    /// Stop recognition, release the microphone and stop the worker
    pub fn teardown(&mut self) {
        self.speech.stop();
        self.discard_recording();
        self.listening = false;
        self.dispatcher.shutdown();
    }

    fn submit(&mut self, request: QueryRequest) -> Option<RequestId> {
        self.status = None;
        match self.dispatcher.submit(request) {
            Ok(id) => {
                self.events.push(SessionEvent::QueryStarted(id));
                Some(id)
            }
            Err(err) => {
                self.report(err);
                None
            }
        }
    }

    fn discard_recording(&mut self) {
        if let Some(recording) = self.recording.take() {
            let _ = recording.stop();
        }
    }

    fn report(&mut self, err: ChatError) {
        warn!(error = %err, status = err.status_message(), "chat error");
        self.status = Some(err.clone());
        self.events.push(SessionEvent::Failed(err));
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("listening", &self.listening)
            .field("loading", &self.is_loading())
            .field("chat_open", &self.chat_open)
            .field("messages", &self.conversation.len())
            .field("status", &self.status)
            .finish()
    }
}
