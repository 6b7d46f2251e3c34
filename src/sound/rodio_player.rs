//! Device playback through rodio
//!
//! Every element runs on its own thread because rodio's `OutputStream` is
//! not `Send`. The thread downloads and decodes the source, then waits for
//! commands; position and events flow back without blocking the caller.

use std::io::Cursor;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, Receiver};
use rodio::{Decoder, OutputStream, Sink};
use tracing::{debug, warn};

use super::types::{AudioElement, AudioError, AudioEvent, AudioResult, AudioSource};

const POLL_INTERVAL: Duration = Duration::from_millis(15);

/// Commands sent to a player thread
enum PlayerCommand {
    Play,
    Pause,
    Rewind,
    Shutdown,
}

/// Element backed by a dedicated playback thread
pub struct RodioAudio {
    commands: Sender<PlayerCommand>,
    events: Option<Receiver<AudioEvent>>,
    /// f32 seconds stored as bits
    position: Arc<AtomicU32>,
}

impl RodioAudio {
    fn spawn(url: String, timeout: Duration) -> AudioResult<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = channel::unbounded();
        let position = Arc::new(AtomicU32::new(0f32.to_bits()));
        let thread_position = Arc::clone(&position);

        thread::Builder::new()
            .name("talkhead-audio".to_string())
            .spawn(move || player_thread_main(url, timeout, cmd_rx, event_tx, thread_position))
            .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?;

        Ok(Self {
            commands: cmd_tx,
            events: Some(event_rx),
            position,
        })
    }

    fn send(&self, command: PlayerCommand) {
        // A closed channel means the thread already exited
        let _ = self.commands.send(command);
    }
}

impl AudioElement for RodioAudio {
    fn play(&mut self) -> AudioResult<()> {
        self.commands
            .send(PlayerCommand::Play)
            .map_err(|_| AudioError::PlaybackRejected("player thread exited".to_string()))
    }

    fn pause(&mut self) {
        self.send(PlayerCommand::Pause);
    }

    fn rewind(&mut self) {
        self.send(PlayerCommand::Rewind);
        self.position.store(0f32.to_bits(), Ordering::Relaxed);
    }

    fn current_time(&self) -> f32 {
        f32::from_bits(self.position.load(Ordering::Relaxed))
    }

    fn poll_event(&mut self) -> Option<AudioEvent> {
        self.events.as_ref()?.try_recv().ok()
    }

    fn detach(&mut self) {
        self.events = None;
    }
}

impl Drop for RodioAudio {
    fn drop(&mut self) {
        // Not joined: the thread may still be blocked on the download
        self.send(PlayerCommand::Shutdown);
    }
}

/// Opens URLs (http(s) or local paths) on the default output device
#[derive(Debug, Clone)]
pub struct RodioAudioSource {
    pub fetch_timeout: Duration,
}

impl Default for RodioAudioSource {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

impl AudioSource for RodioAudioSource {
    fn open(&mut self, url: &str) -> AudioResult<Box<dyn AudioElement>> {
        Ok(Box::new(RodioAudio::spawn(url.to_string(), self.fetch_timeout)?))
    }
}

fn fetch(url: &str, timeout: Duration) -> AudioResult<Vec<u8>> {
    let open_failed = |reason: String| AudioError::OpenFailed {
        url: url.to_string(),
        reason,
    };

    if url.starts_with("http://") || url.starts_with("https://") {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| open_failed(e.to_string()))?;
        let response = client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| open_failed(e.to_string()))?;
        let bytes = response.bytes().map_err(|e| open_failed(e.to_string()))?;
        Ok(bytes.to_vec())
    } else {
        std::fs::read(url).map_err(|e| open_failed(e.to_string()))
    }
}

/// Sink plus the bytes it was decoded from
///
/// Keeping the bytes lets a finished element be rewound and played again.
struct Player {
    sink: Sink,
    data: Vec<u8>,
    playing: bool,
}

impl Player {
    fn new(sink: Sink, data: Vec<u8>) -> AudioResult<Self> {
        let player = Self {
            sink,
            data,
            playing: false,
        };
        player.sink.pause();
        player.sink.append(player.decode()?);
        Ok(player)
    }

    fn decode(&self) -> AudioResult<Decoder<Cursor<Vec<u8>>>> {
        Decoder::new(Cursor::new(self.data.clone())).map_err(|e| AudioError::Decode(e.to_string()))
    }

    fn play(&mut self) -> Option<AudioEvent> {
        if self.playing || self.sink.empty() {
            return None;
        }
        self.sink.play();
        self.playing = true;
        Some(AudioEvent::Play)
    }

    fn pause(&mut self) {
        self.sink.pause();
        self.playing = false;
    }

    fn rewind(&mut self) -> AudioResult<()> {
        if self.sink.empty() {
            // Finished sources are gone from the queue
            self.sink.pause();
            self.playing = false;
            self.sink.append(self.decode()?);
        } else if let Err(e) = self.sink.try_seek(Duration::ZERO) {
            debug!(error = %e, "rewind not supported by source");
        }
        Ok(())
    }

    fn position(&self) -> f32 {
        self.sink.get_pos().as_secs_f32()
    }

    /// `Ended` once the playing queue drains
    fn tick(&mut self) -> Option<AudioEvent> {
        if self.playing && self.sink.empty() {
            self.playing = false;
            return Some(AudioEvent::Ended);
        }
        None
    }
}

fn player_thread_main(
    url: String,
    timeout: Duration,
    commands: mpsc::Receiver<PlayerCommand>,
    events: channel::Sender<AudioEvent>,
    position: Arc<AtomicU32>,
) {
    let fail = |err: AudioError| {
        warn!(url = %url, error = %err, "audio thread failed");
        let _ = events.send(AudioEvent::Error(err));
    };

    let data = match fetch(&url, timeout) {
        Ok(data) => data,
        Err(e) => return fail(e),
    };
    let (_stream, handle) = match OutputStream::try_default() {
        Ok(s) => s,
        Err(e) => return fail(AudioError::DeviceUnavailable(e.to_string())),
    };
    let sink = match Sink::try_new(&handle) {
        Ok(s) => s,
        Err(e) => return fail(AudioError::DeviceUnavailable(e.to_string())),
    };
    let mut player = match Player::new(sink, data) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };
    debug!(url = %url, "audio thread ready");

    loop {
        match commands.recv_timeout(POLL_INTERVAL) {
            Ok(PlayerCommand::Play) => {
                if let Some(event) = player.play() {
                    let _ = events.send(event);
                }
            }
            Ok(PlayerCommand::Pause) => player.pause(),
            Ok(PlayerCommand::Rewind) => {
                if let Err(e) = player.rewind() {
                    return fail(e);
                }
            }
            Ok(PlayerCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }

        position.store(player.position().to_bits(), Ordering::Relaxed);
        if let Some(event) = player.tick() {
            let _ = events.send(event);
        }
    }

    player.sink.stop();
    debug!(url = %url, "audio thread exited");
}
