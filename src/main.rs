use std::sync::Arc;
use std::thread;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use glam::Vec3;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};

use talkhead::chat::{ChatSession, HttpBackend, RecognitionSettings, UnsupportedSpeech};
use talkhead::face::{AnimationClip, AvatarRig, AvatarRuntime};
use talkhead::sound::{AudioSource, Microphone};
use talkhead::{config, logging, Avatar, Cli, Options};

/// Where the viewer sits, in rig space
const CAMERA: Vec3 = Vec3::new(0.0, 1.6, 3.0);

/// Length of the generated idle clip, seconds
const IDLE_CLIP_SECONDS: f32 = 4.0;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let options = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => Options::default(),
    };
    let options = cli.merge_into_options(options)?;

    logging::init(options.log_level, options.log_file.as_deref())?;
    info!(
        backend = %options.backend_url,
        fps = options.frame_rate,
        seconds = options.run_seconds,
        seed = ?options.rng_seed,
        "talkhead starting"
    );

    let mut avatar = build_avatar(&options)?;
    let idle = AnimationClip::idle_breathing(IDLE_CLIP_SECONDS)?;
    avatar.mount(&[idle])?;
    if options.chat_open {
        avatar.toggle_chat();
    }
    if let Some(status) = avatar.status_message() {
        info!(status, "chat status");
    }

    if let Some(ref query) = cli.query {
        if avatar.send_text(query).is_none() {
            warn!("query ignored");
        }
    }

    run(&mut avatar, &options);
    avatar.unmount();

    for line in avatar.conversation().render_lines() {
        println!("{}", line);
    }
    Ok(())
}

fn build_avatar(options: &Options) -> Result<Avatar> {
    let rng = match options.rng_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let runtime = AvatarRuntime::new(AvatarRig::ready_player_me(), audio_source(options), rng);

    let backend = HttpBackend::new(&options.backend_url, options.request_timeout())
        .context("failed to create backend client")?;
    let settings = RecognitionSettings {
        language: options.speech_language.clone(),
        ..RecognitionSettings::default()
    };
    let chat = ChatSession::new(
        Arc::new(backend),
        Box::new(UnsupportedSpeech),
        microphone(),
        settings,
    );

    Ok(Avatar::new(runtime, chat))
}

#[cfg(feature = "native-audio")]
fn audio_source(options: &Options) -> Box<dyn AudioSource> {
    Box::new(talkhead::sound::RodioAudioSource {
        fetch_timeout: options.request_timeout(),
    })
}

#[cfg(not(feature = "native-audio"))]
fn audio_source(_options: &Options) -> Box<dyn AudioSource> {
    Box::new(talkhead::sound::SimulatedAudioSource::default())
}

#[cfg(feature = "native-audio")]
fn microphone() -> Box<dyn Microphone> {
    Box::new(talkhead::sound::CpalMicrophone)
}

#[cfg(not(feature = "native-audio"))]
fn microphone() -> Box<dyn Microphone> {
    Box::new(talkhead::sound::DeniedMicrophone)
}

/// Fixed-rate frame loop, logging a summary once per second
fn run(avatar: &mut Avatar, options: &Options) {
    let frame = options.frame_duration();
    let frames_per_second = u64::from(options.frame_rate);
    let start = Instant::now();

    for n in 0..options.frame_budget() {
        let report = avatar.frame(frame, CAMERA);
        for transition in &report.transitions {
            info!(?transition, "playback");
        }

        if n % frames_per_second == 0 {
            let runtime = avatar.runtime();
            info!(
                second = n / frames_per_second,
                expression = runtime.expression().state().profile.as_str(),
                blinking = runtime.blink().is_active(),
                playing = avatar.is_playing(),
                loading = avatar.is_loading(),
                position = runtime.playback().current_time(),
                viseme = ?report.viseme.map(|e| e.viseme),
                "frame summary"
            );
        }

        let due = frame.mul_f64((n + 1) as f64);
        let elapsed = start.elapsed();
        if due > elapsed {
            thread::sleep(due - elapsed);
        }
    }
}
