//! Playback clock
//!
//! Owns the lifecycle of the one audio element driving lip-sync. A new
//! source always tears the previous element down first (listeners removed,
//! paused, rewound) so at most one element is ever alive.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::sound::{AudioElement, AudioError, AudioEvent, AudioSource};

/// Playback lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Uninitialized,
    /// Source assigned, waiting for the play event
    Loading,
    Playing,
    Paused,
    Ended,
    Errored,
}

/// State change the owner has to react to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackTransition {
    Started,
    /// Viseme targets must go back to baseline
    Ended,
    /// Surface to the user; never retried
    Errored(AudioError),
}

/// Audio lifecycle owner
pub struct PlaybackClock {
    source: Box<dyn AudioSource>,
    element: Option<Box<dyn AudioElement>>,
    url: Option<String>,
    state: PlaybackState,
    /// Set once the current source has been auto-played
    autoplayed: bool,
    last_error: Option<AudioError>,
}

impl PlaybackClock {
    pub fn new(source: Box<dyn AudioSource>) -> Self {
        Self {
            source,
            element: None,
            url: None,
            state: PlaybackState::Uninitialized,
            autoplayed: false,
            last_error: None,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Whether `url` is loaded with a live element
    pub fn has_source(&self, url: &str) -> bool {
        self.element.is_some() && self.url.as_deref() == Some(url)
    }

    pub fn last_error(&self) -> Option<&AudioError> {
        self.last_error.as_ref()
    }

    /// Playback position in seconds, 0 without an element
    pub fn current_time(&self) -> f32 {
        self.element.as_ref().map_or(0.0, |e| e.current_time())
    }

    pub fn duration(&self) -> Option<Duration> {
        self.element.as_ref().and_then(|e| e.duration())
    }

    /// Assign a new audio source and auto-play it once
    ///
    /// Re-assigning the URL that is already loaded is a no-op. Open and play
    /// failures come back as an `Errored` transition.
    pub fn set_source(&mut self, url: &str) -> Option<PlaybackTransition> {
        if self.has_source(url) {
            debug!(url, "audio source unchanged");
            return None;
        }

        self.teardown();
        self.url = Some(url.to_string());
        self.last_error = None;

        match self.source.open(url) {
            Ok(element) => {
                info!(url, "audio source loaded");
                self.element = Some(element);
                self.state = PlaybackState::Loading;
            }
            Err(err) => return Some(self.fail(err)),
        }

        self.autoplay()
    }

    /// Resume after a pause, or replay after the end
    pub fn play(&mut self) -> Option<PlaybackTransition> {
        let element = self.element.as_mut()?;
        if self.state == PlaybackState::Ended {
            element.rewind();
        }
        match element.play() {
            Ok(()) => None,
            Err(err) => Some(self.fail(err)),
        }
    }

    pub fn pause(&mut self) {
        if let Some(element) = self.element.as_mut() {
            element.pause();
            if self.state == PlaybackState::Playing {
                self.state = PlaybackState::Paused;
            }
        }
    }

    /// Advance the element and collect its transitions
    pub fn tick(&mut self, delta: Duration) -> Vec<PlaybackTransition> {
        let mut transitions = Vec::new();
        let Some(element) = self.element.as_mut() else {
            return transitions;
        };
        element.advance(delta);

        let mut events = Vec::new();
        while let Some(event) = element.poll_event() {
            events.push(event);
        }

        for event in events {
            match event {
                AudioEvent::Play => {
                    self.state = PlaybackState::Playing;
                    transitions.push(PlaybackTransition::Started);
                }
                AudioEvent::Ended => {
                    self.state = PlaybackState::Ended;
                    self.autoplayed = false;
                    debug!(url = ?self.url, "audio ended");
                    transitions.push(PlaybackTransition::Ended);
                }
                AudioEvent::Error(err) => {
                    transitions.push(self.fail(err));
                }
            }
        }
        transitions
    }

    /// Release the current element: detach listeners, pause, rewind
    pub fn teardown(&mut self) {
        if let Some(mut element) = self.element.take() {
            element.detach();
            element.pause();
            element.rewind();
            debug!(url = ?self.url, "audio element released");
        }
        self.url = None;
        self.state = PlaybackState::Uninitialized;
        self.autoplayed = false;
    }

    fn autoplay(&mut self) -> Option<PlaybackTransition> {
        if self.autoplayed {
            return None;
        }
        self.autoplayed = true;
        let element = self.element.as_mut()?;
        match element.play() {
            Ok(()) => None,
            Err(err) => Some(self.fail(err)),
        }
    }

    fn fail(&mut self, err: AudioError) -> PlaybackTransition {
        warn!(url = ?self.url, error = %err, "audio playback failed");
        if let Some(element) = self.element.as_mut() {
            element.pause();
        }
        self.state = PlaybackState::Errored;
        self.autoplayed = false;
        self.last_error = Some(err.clone());
        PlaybackTransition::Errored(err)
    }
}

impl std::fmt::Debug for PlaybackClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackClock")
            .field("url", &self.url)
            .field("state", &self.state)
            .field("autoplayed", &self.autoplayed)
            .finish()
    }
}
