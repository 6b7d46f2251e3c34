//! Deterministic audio elements
//!
//! Time advances only when the playback clock ticks, which makes the
//! headless driver and the tests reproducible. Failures can be injected at
//! open, at play, or at a given position.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::types::{AudioElement, AudioError, AudioEvent, AudioResult, AudioSource};

/// Counters shared by a source and the elements it opens
#[derive(Debug, Default)]
pub struct AudioStats {
    opened: AtomicUsize,
    active: AtomicUsize,
    play_requests: AtomicUsize,
}

impl AudioStats {
    /// Elements opened so far
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Elements opened and not yet detached
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Calls to `play` across all elements
    pub fn play_requests(&self) -> usize {
        self.play_requests.load(Ordering::SeqCst)
    }
}

/// Simulated element of fixed length
#[derive(Debug)]
pub struct SimulatedAudio {
    duration: Duration,
    position: Duration,
    playing: bool,
    attached: bool,
    events: VecDeque<AudioEvent>,
    reject_play: bool,
    fail_at: Option<Duration>,
    stats: Arc<AudioStats>,
}

impl SimulatedAudio {
    pub fn new(duration: Duration) -> Self {
        Self::with_stats(duration, Arc::new(AudioStats::default()))
    }

    fn with_stats(duration: Duration, stats: Arc<AudioStats>) -> Self {
        stats.opened.fetch_add(1, Ordering::SeqCst);
        stats.active.fetch_add(1, Ordering::SeqCst);
        Self {
            duration,
            position: Duration::ZERO,
            playing: false,
            attached: true,
            events: VecDeque::new(),
            reject_play: false,
            fail_at: None,
            stats,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn position(&self) -> Duration {
        self.position
    }
}

impl AudioElement for SimulatedAudio {
    fn play(&mut self) -> AudioResult<()> {
        self.stats.play_requests.fetch_add(1, Ordering::SeqCst);
        if self.reject_play {
            return Err(AudioError::PlaybackRejected(
                "simulated play rejection".to_string(),
            ));
        }
        if !self.playing {
            self.playing = true;
            self.events.push_back(AudioEvent::Play);
        }
        Ok(())
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn rewind(&mut self) {
        self.position = Duration::ZERO;
    }

    fn current_time(&self) -> f32 {
        self.position.as_secs_f32()
    }

    fn duration(&self) -> Option<Duration> {
        Some(self.duration)
    }

    fn advance(&mut self, delta: Duration) {
        if !self.playing {
            return;
        }
        self.position = (self.position + delta).min(self.duration);

        if let Some(at) = self.fail_at {
            if self.position >= at {
                self.playing = false;
                self.events.push_back(AudioEvent::Error(AudioError::Stream(
                    "simulated stream failure".to_string(),
                )));
                return;
            }
        }
        if self.position >= self.duration {
            self.playing = false;
            self.events.push_back(AudioEvent::Ended);
        }
    }

    fn poll_event(&mut self) -> Option<AudioEvent> {
        if !self.attached {
            return None;
        }
        self.events.pop_front()
    }

    fn detach(&mut self) {
        if self.attached {
            self.attached = false;
            self.events.clear();
            self.stats.active.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for SimulatedAudio {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Source producing [`SimulatedAudio`] elements
#[derive(Debug, Clone)]
pub struct SimulatedAudioSource {
    /// Length of every opened element
    pub duration: Duration,
    /// Fail `open` for URLs containing this text
    pub fail_open_matching: Option<String>,
    /// Reject every `play` call
    pub reject_play: bool,
    /// Raise a stream error at this position
    pub fail_at: Option<Duration>,
    stats: Arc<AudioStats>,
}

impl SimulatedAudioSource {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            fail_open_matching: None,
            reject_play: false,
            fail_at: None,
            stats: Arc::new(AudioStats::default()),
        }
    }

    /// Shared counters for every element this source opens
    pub fn stats(&self) -> Arc<AudioStats> {
        Arc::clone(&self.stats)
    }
}

impl Default for SimulatedAudioSource {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl AudioSource for SimulatedAudioSource {
    fn open(&mut self, url: &str) -> AudioResult<Box<dyn AudioElement>> {
        if let Some(pattern) = &self.fail_open_matching {
            if url.contains(pattern.as_str()) {
                return Err(AudioError::OpenFailed {
                    url: url.to_string(),
                    reason: "simulated open failure".to_string(),
                });
            }
        }
        let mut element = SimulatedAudio::with_stats(self.duration, Arc::clone(&self.stats));
        element.reject_play = self.reject_play;
        element.fail_at = self.fail_at;
        Ok(Box::new(element))
    }
}
