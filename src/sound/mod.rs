//! Audio playback and capture
//!
//! Playback is modelled as an [`AudioSource`] handing out one
//! [`AudioElement`] per URL. The simulated elements are always available;
//! device-backed playback (rodio) and capture (cpal) need the
//! `native-audio` feature.

pub mod capture;
#[cfg(feature = "native-audio")]
pub mod rodio_player;
pub mod simulated;
pub mod types;

pub use capture::{
    BufferedMicrophone, DeniedMicrophone, Microphone, OpenRecordings, RecordedAudio, Recording,
};
#[cfg(feature = "native-audio")]
pub use capture::CpalMicrophone;
#[cfg(feature = "native-audio")]
pub use rodio_player::{RodioAudio, RodioAudioSource};
pub use simulated::{AudioStats, SimulatedAudio, SimulatedAudioSource};
pub use types::{AudioElement, AudioError, AudioEvent, AudioResult, AudioSource};
