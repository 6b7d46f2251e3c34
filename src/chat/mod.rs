//! Conversation with the question answering backend
//!
//! Text and voice queries go to a [`QueryBackend`] on a worker thread so the
//! frame loop never blocks. [`ChatSession`] owns the user-facing flags and
//! turns every failure into a single status line.

pub mod backend;
pub mod conversation;
pub mod dispatch;
pub mod session;
pub mod speech;
pub mod types;

pub use backend::{join_url, HttpBackend, QueryBackend, QueryRequest, QueryResponse};
pub use conversation::Conversation;
pub use dispatch::{QueryDispatcher, QueryReply, RequestId};
pub use session::{ChatSession, SessionEvent};
pub use speech::{
    RecognitionSettings, ScriptedSpeech, SpeechErrorCode, SpeechEvent, SpeechInput,
    UnsupportedSpeech, DEFAULT_LANGUAGE,
};
pub use types::{ChatError, ChatMessage, ChatResult, Role};
