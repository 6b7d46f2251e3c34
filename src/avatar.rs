//! Talking avatar
//!
//! Glues the face runtime to the chat session: answer audio goes into the
//! playback clock, a new query silences the current answer, and playback
//! errors end up in the chat status line.

use std::time::Duration;

use glam::Vec3;
use tracing::{debug, info};

use crate::chat::{ChatSession, Conversation, RequestId, SessionEvent};
use crate::face::{AnimationClip, AvatarRuntime, FaceResult, FrameReport, PlaybackTransition};

/// Face runtime plus chat session
#[derive(Debug)]
pub struct Avatar {
    runtime: AvatarRuntime,
    chat: ChatSession,
}

impl Avatar {
    pub fn new(runtime: AvatarRuntime, chat: ChatSession) -> Self {
        Self { runtime, chat }
    }

    pub fn mount(&mut self, clips: &[AnimationClip]) -> FaceResult<()> {
        self.runtime.mount(clips)
    }

    /// Stop everything: timers, mixer, audio, recognition and the query worker
    pub fn unmount(&mut self) {
        self.runtime.unmount();
        self.chat.teardown();
        info!("avatar torn down");
    }

    /// Run one render tick
    pub fn frame(&mut self, delta: Duration, camera: Vec3) -> FrameReport {
        self.pump();
        let report = self.runtime.frame(delta, camera);
        for transition in &report.transitions {
            if let PlaybackTransition::Errored(err) = transition {
                self.chat.report_playback_error(err);
            }
        }
        report
    }

    pub fn send_text(&mut self, text: &str) -> Option<RequestId> {
        let id = self.chat.send_text(text);
        self.pump();
        id
    }

    pub fn toggle_listening(&mut self) {
        self.chat.toggle_listening();
        self.pump();
    }

    pub fn toggle_chat(&mut self) -> bool {
        self.chat.toggle_chat()
    }

    pub fn is_listening(&self) -> bool {
        self.chat.is_listening()
    }

    pub fn is_loading(&self) -> bool {
        self.chat.is_loading()
    }

    pub fn is_playing(&self) -> bool {
        self.runtime.playback().is_playing()
    }

    pub fn is_chat_open(&self) -> bool {
        self.chat.is_chat_open()
    }

    pub fn conversation(&self) -> &Conversation {
        self.chat.conversation()
    }

    pub fn answer_text(&self) -> &str {
        self.chat.answer_text()
    }

    pub fn status_message(&self) -> Option<&'static str> {
        self.chat.status_message()
    }

    pub fn runtime(&self) -> &AvatarRuntime {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut AvatarRuntime {
        &mut self.runtime
    }

    pub fn chat(&self) -> &ChatSession {
        &self.chat
    }

    /// Apply pending chat events to the runtime
    fn pump(&mut self) {
        for event in self.chat.poll() {
            match event {
                SessionEvent::QueryStarted(id) => {
                    debug!(?id, "query started, silencing current answer");
                    self.runtime.clear_audio();
                }
                SessionEvent::AudioReady(url) => match self.runtime.load_audio(&url) {
                    Ok(Some(PlaybackTransition::Errored(err))) => {
                        self.chat.report_playback_error(&err)
                    }
                    Ok(_) => {}
                    Err(err) => debug!(url, error = %err, "answer audio dropped"),
                },
                SessionEvent::Answered { .. } | SessionEvent::Failed(_) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{
        ChatError, ChatResult, QueryBackend, QueryRequest, QueryResponse, RecognitionSettings,
        Role, ScriptedSpeech,
    };
    use crate::face::{AvatarRig, PlaybackState};
    use crate::sound::{DeniedMicrophone, SimulatedAudioSource};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Arc;
    use std::time::Instant;

    const FRAME: Duration = Duration::from_micros(16_667);
    const CAMERA: Vec3 = Vec3::new(0.0, 1.6, 3.0);

    struct Answering {
        audio_file: Option<&'static str>,
        fail: bool,
    }

    impl QueryBackend for Answering {
        fn query(&self, _request: &QueryRequest) -> ChatResult<QueryResponse> {
            if self.fail {
                return Err(ChatError::NetworkFailure("HTTP 502".into()));
            }
            Ok(QueryResponse {
                answer: Some("Halo juga!".into()),
                audio_file: self.audio_file.map(str::to_string),
            })
        }

        fn audio_url(&self, audio_file: &str) -> String {
            format!("http://backend/api/audio/{audio_file}")
        }
    }

    fn avatar(backend: Answering, audio: SimulatedAudioSource) -> Avatar {
        let runtime = AvatarRuntime::new(
            AvatarRig::ready_player_me(),
            Box::new(audio),
            StdRng::seed_from_u64(5),
        );
        let chat = ChatSession::new(
            Arc::new(backend),
            Box::new(ScriptedSpeech::default()),
            Box::new(DeniedMicrophone),
            RecognitionSettings::default(),
        );
        let mut avatar = Avatar::new(runtime, chat);
        avatar.mount(&[]).unwrap();
        avatar
    }

    fn run_until_idle(avatar: &mut Avatar) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while avatar.is_loading() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(2));
            avatar.frame(FRAME, CAMERA);
        }
    }

    #[test]
    fn test_answer_audio_plays() {
        let mut avatar = avatar(
            Answering {
                audio_file: Some("answer.mp3"),
                fail: false,
            },
            SimulatedAudioSource::new(Duration::from_secs(2)),
        );
        avatar.send_text("halo").unwrap();
        run_until_idle(&mut avatar);
        avatar.frame(FRAME, CAMERA);

        assert!(avatar.is_playing());
        assert_eq!(avatar.answer_text(), "Halo juga!");
        assert_eq!(
            avatar.runtime().playback().url(),
            Some("http://backend/api/audio/answer.mp3")
        );
        assert_eq!(avatar.runtime().lipsync().len(), 200);
    }

    #[test]
    fn test_answer_without_audio() {
        let mut avatar = avatar(
            Answering {
                audio_file: None,
                fail: false,
            },
            SimulatedAudioSource::default(),
        );
        avatar.send_text("halo");
        run_until_idle(&mut avatar);
        assert!(!avatar.is_playing());
        assert_eq!(avatar.runtime().playback().state(), PlaybackState::Uninitialized);
        assert_eq!(avatar.conversation().count_by(Role::Assistant), 1);
    }

    #[test]
    fn test_audio_open_failure_sets_status() {
        let mut source = SimulatedAudioSource::default();
        source.fail_open_matching = Some("answer".into());
        let mut avatar = avatar(
            Answering {
                audio_file: Some("answer.mp3"),
                fail: false,
            },
            source,
        );
        avatar.send_text("halo");
        run_until_idle(&mut avatar);
        assert!(!avatar.is_playing());
        assert_eq!(avatar.status_message(), Some("Error playing audio."));
    }

    #[test]
    fn test_new_query_silences_answer() {
        let source = SimulatedAudioSource::new(Duration::from_secs(10));
        let stats = source.stats();
        let mut avatar = avatar(
            Answering {
                audio_file: Some("answer.mp3"),
                fail: false,
            },
            source,
        );
        avatar.send_text("one");
        run_until_idle(&mut avatar);
        avatar.frame(FRAME, CAMERA);
        assert!(avatar.is_playing());

        avatar.send_text("two");
        assert!(!avatar.is_playing());
        assert!(stats.active() <= 1);
        run_until_idle(&mut avatar);
        assert!(stats.active() <= 1);
        assert_eq!(avatar.conversation().count_by(Role::User), 2);
    }

    #[test]
    fn test_failed_query() {
        let mut avatar = avatar(
            Answering {
                audio_file: None,
                fail: true,
            },
            SimulatedAudioSource::default(),
        );
        avatar.send_text("halo");
        run_until_idle(&mut avatar);
        assert!(!avatar.is_loading());
        assert_eq!(avatar.answer_text(), "");
        assert_eq!(
            avatar.status_message(),
            Some("Failed to connect to server. Please try again.")
        );
    }

    #[test]
    fn test_unmount_stops_audio() {
        let source = SimulatedAudioSource::new(Duration::from_secs(10));
        let stats = source.stats();
        let mut avatar = avatar(
            Answering {
                audio_file: Some("answer.mp3"),
                fail: false,
            },
            source,
        );
        avatar.send_text("halo");
        run_until_idle(&mut avatar);
        assert_eq!(stats.active(), 1);

        avatar.unmount();
        assert_eq!(stats.active(), 0);
        assert!(!avatar.runtime().is_mounted());
    }
}
