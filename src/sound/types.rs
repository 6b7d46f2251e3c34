//! Audio element abstractions
//!
//! An [`AudioSource`] opens one [`AudioElement`] per URL. Elements report
//! play/end/error asynchronously through [`AudioElement::poll_event`], which
//! the playback clock drains once per frame.

use std::time::Duration;

/// Error type for audio playback and capture
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AudioError {
    #[error("failed to open audio source {url}: {reason}")]
    OpenFailed { url: String, reason: String },
    #[error("failed to decode audio: {0}")]
    Decode(String),
    #[error("playback rejected: {0}")]
    PlaybackRejected(String),
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("microphone permission denied")]
    PermissionDenied,
    #[error("audio stream error: {0}")]
    Stream(String),
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;

/// Asynchronous notification from an audio element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioEvent {
    /// Playback actually started
    Play,
    /// Reached the end of the stream
    Ended,
    /// Playback failed after starting
    Error(AudioError),
}

/// A single playable audio resource
pub trait AudioElement {
    /// Request playback; the `Play` event follows once audio is flowing
    fn play(&mut self) -> AudioResult<()>;

    fn pause(&mut self);

    /// Rewind to position zero
    fn rewind(&mut self);

    /// Playback position in seconds
    fn current_time(&self) -> f32;

    /// Total length, when known
    fn duration(&self) -> Option<Duration> {
        None
    }

    /// Advance simulated time; device-backed elements ignore this
    fn advance(&mut self, _delta: Duration) {}

    /// Next pending event, if any
    fn poll_event(&mut self) -> Option<AudioEvent>;

    /// Stop delivering events; called before the element is dropped
    fn detach(&mut self);
}

/// Factory for audio elements
pub trait AudioSource {
    fn open(&mut self, url: &str) -> AudioResult<Box<dyn AudioElement>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_error_display() {
        let err = AudioError::OpenFailed {
            url: "http://x/a.mp3".into(),
            reason: "404".into(),
        };
        assert_eq!(
            err.to_string(),
            "failed to open audio source http://x/a.mp3: 404"
        );
        assert_eq!(
            AudioError::PermissionDenied.to_string(),
            "microphone permission denied"
        );
    }
}
