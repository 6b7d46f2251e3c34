//! Microphone capture
//!
//! Acquiring a [`Microphone`] may be refused. A refusal leaves nothing
//! open; a granted [`Recording`] holds the device until it is stopped or
//! dropped.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::types::{AudioError, AudioResult};

/// Captured PCM audio
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedAudio {
    pub sample_rate: u32,
    pub channels: u16,
    /// Interleaved signed 16-bit samples
    pub samples: Vec<i16>,
}

impl RecordedAudio {
    pub fn new(sample_rate: u32, channels: u16, samples: Vec<i16>) -> Self {
        Self {
            sample_rate,
            channels,
            samples,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 || self.channels == 0 {
            return Duration::ZERO;
        }
        let frames = self.samples.len() as f64 / f64::from(self.channels);
        Duration::from_secs_f64(frames / f64::from(self.sample_rate))
    }
}

/// An open capture session
pub trait Recording {
    /// Stop capturing, release the device and return what was captured
    fn stop(self: Box<Self>) -> RecordedAudio;
}

/// Capture device
pub trait Microphone {
    /// Ask for the device; refusal maps to `AudioError::PermissionDenied`
    fn acquire(&mut self) -> AudioResult<Box<dyn Recording>>;
}

/// Count of recordings currently holding a device
#[derive(Debug, Clone, Default)]
pub struct OpenRecordings(Arc<AtomicUsize>);

impl OpenRecordings {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn open(&self) -> OpenGuard {
        self.0.fetch_add(1, Ordering::SeqCst);
        OpenGuard(Arc::clone(&self.0))
    }
}

#[derive(Debug)]
struct OpenGuard(Arc<AtomicUsize>);

impl Drop for OpenGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Microphone that always refuses access
#[derive(Debug, Default, Clone, Copy)]
pub struct DeniedMicrophone;

impl Microphone for DeniedMicrophone {
    fn acquire(&mut self) -> AudioResult<Box<dyn Recording>> {
        Err(AudioError::PermissionDenied)
    }
}

/// Microphone that "records" a fixed clip
#[derive(Debug, Clone)]
pub struct BufferedMicrophone {
    clip: RecordedAudio,
    open: OpenRecordings,
}

impl BufferedMicrophone {
    pub fn new(clip: RecordedAudio) -> Self {
        Self {
            clip,
            open: OpenRecordings::default(),
        }
    }

    /// Handle for checking how many recordings are still open
    pub fn open_recordings(&self) -> OpenRecordings {
        self.open.clone()
    }
}

impl Microphone for BufferedMicrophone {
    fn acquire(&mut self) -> AudioResult<Box<dyn Recording>> {
        Ok(Box::new(BufferedRecording {
            clip: self.clip.clone(),
            _guard: self.open.open(),
        }))
    }
}

#[derive(Debug)]
struct BufferedRecording {
    clip: RecordedAudio,
    _guard: OpenGuard,
}

impl Recording for BufferedRecording {
    fn stop(self: Box<Self>) -> RecordedAudio {
        self.clip.clone()
    }
}

#[cfg(feature = "native-audio")]
pub use native::CpalMicrophone;

#[cfg(feature = "native-audio")]
mod native {
    use std::sync::Arc;

    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use cpal::SampleFormat;
    use parking_lot::Mutex;
    use tracing::{debug, warn};

    use super::{AudioError, AudioResult, Microphone, RecordedAudio, Recording};

    /// Default input device of the default host
    #[derive(Debug, Default, Clone, Copy)]
    pub struct CpalMicrophone;

    struct CpalRecording {
        stream: cpal::Stream,
        buffer: Arc<Mutex<Vec<i16>>>,
        sample_rate: u32,
        channels: u16,
    }

    impl Microphone for CpalMicrophone {
        fn acquire(&mut self) -> AudioResult<Box<dyn Recording>> {
            let host = cpal::default_host();
            let device = host
                .default_input_device()
                .ok_or(AudioError::PermissionDenied)?;
            let config = device
                .default_input_config()
                .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?;

            let sample_rate = config.sample_rate().0;
            let channels = config.channels();
            let buffer = Arc::new(Mutex::new(Vec::new()));
            let err_fn = |e: cpal::StreamError| warn!(error = %e, "capture stream error");

            let stream = match config.sample_format() {
                SampleFormat::I16 => {
                    let sink = Arc::clone(&buffer);
                    device.build_input_stream(
                        &config.into(),
                        move |data: &[i16], _: &cpal::InputCallbackInfo| {
                            sink.lock().extend_from_slice(data);
                        },
                        err_fn,
                        None,
                    )
                }
                SampleFormat::F32 => {
                    let sink = Arc::clone(&buffer);
                    device.build_input_stream(
                        &config.into(),
                        move |data: &[f32], _: &cpal::InputCallbackInfo| {
                            sink.lock().extend(
                                data.iter()
                                    .map(|s| (s.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16),
                            );
                        },
                        err_fn,
                        None,
                    )
                }
                other => {
                    return Err(AudioError::DeviceUnavailable(format!(
                        "unsupported sample format {other:?}"
                    )))
                }
            }
            .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?;

            stream
                .play()
                .map_err(|e| AudioError::Stream(e.to_string()))?;
            debug!(sample_rate, channels, "microphone opened");

            Ok(Box::new(CpalRecording {
                stream,
                buffer,
                sample_rate,
                channels,
            }))
        }
    }

    impl Recording for CpalRecording {
        fn stop(self: Box<Self>) -> RecordedAudio {
            if let Err(e) = self.stream.pause() {
                warn!(error = %e, "failed to pause capture stream");
            }
            let samples = std::mem::take(&mut *self.buffer.lock());
            debug!(samples = samples.len(), "microphone closed");
            RecordedAudio::new(self.sample_rate, self.channels, samples)
        }
    }
}
