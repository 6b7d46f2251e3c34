//! Avatar runtime
//!
//! Owns every face component plus the rig they write to. Being the single
//! owner is what guarantees one expression state, one blink state and one
//! writer of the influence buffer.
//!
//! # Frame order
//!
//! 1. Fire due timers (expression drift, blink)
//! 2. Advance playback and handle its transitions
//! 3. Advance the skeletal mixer
//! 4. Blink/expression blend pass
//! 5. Viseme pass, while audio plays and a track is loaded
//! 6. Head tracking

use std::time::Duration;

use glam::Vec3;
use rand::rngs::StdRng;
use tracing::{debug, info};

use super::blender::MorphTargetBlender;
use super::blink::BlinkController;
use super::expression::{ExpressionDrift, ExpressionLibrary};
use super::head::HeadTracker;
use super::lipsync::{LipSyncTrack, VisemeEvent};
use super::mixer::{AnimationClip, AnimationMixer};
use super::playback::{PlaybackClock, PlaybackTransition};
use super::rig::AvatarRig;
use super::types::{FaceError, FaceResult, FaceTimer};
use crate::sound::AudioSource;
use crate::time::{FrameClock, TimerQueue};

/// What happened during one frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    pub transitions: Vec<PlaybackTransition>,
    /// Event applied by the viseme pass, if it ran and matched
    pub viseme: Option<VisemeEvent>,
    /// Whether the viseme pass ran this frame
    pub viseme_pass: bool,
    pub timers_fired: usize,
}

/// Face animation runtime
#[derive(Debug)]
pub struct AvatarRuntime {
    mounted: bool,
    clock: FrameClock,
    timers: TimerQueue<FaceTimer>,
    rng: StdRng,
    library: ExpressionLibrary,
    expression: ExpressionDrift,
    blink: BlinkController,
    lipsync: LipSyncTrack,
    playback: PlaybackClock,
    mixer: AnimationMixer,
    blender: MorphTargetBlender,
    head: HeadTracker,
    rig: AvatarRig,
}

impl AvatarRuntime {
    pub fn new(rig: AvatarRig, audio: Box<dyn AudioSource>, rng: StdRng) -> Self {
        let head = HeadTracker::new(&rig.layout().head_bone);
        Self {
            mounted: false,
            clock: FrameClock::new(),
            timers: TimerQueue::new(),
            rng,
            library: ExpressionLibrary::builtin(),
            expression: ExpressionDrift::new(),
            blink: BlinkController::new(),
            lipsync: LipSyncTrack::new(),
            playback: PlaybackClock::new(audio),
            mixer: AnimationMixer::new(),
            blender: MorphTargetBlender::new(),
            head,
            rig,
        }
    }

    /// Replace the expression library; takes effect on the next drift tick
    pub fn with_library(mut self, library: ExpressionLibrary) -> Self {
        self.library = library;
        self
    }

    /// Start timers and bind the idle clip
    pub fn mount(&mut self, clips: &[AnimationClip]) -> FaceResult<()> {
        if self.mounted {
            return Err(FaceError::AlreadyMounted);
        }
        self.mounted = true;
        self.clock.reset();

        let now = self.clock.elapsed();
        self.expression
            .start(&self.library, &mut self.timers, now, &mut self.rng);
        self.blink.start(&mut self.timers, now, &mut self.rng);
        self.mixer = AnimationMixer::with_idle(clips);

        info!(clips = clips.len(), "avatar mounted");
        Ok(())
    }

    /// Cancel timers, stop the mixer and release audio
    pub fn unmount(&mut self) {
        if !self.mounted {
            return;
        }
        self.expression.cancel(&mut self.timers);
        self.blink.cancel(&mut self.timers);
        self.timers.clear();
        self.mixer.stop_all();
        self.playback.teardown();
        self.lipsync.clear();
        self.mounted = false;
        info!("avatar unmounted");
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Load a new audio source with a freshly generated lip-sync track
    pub fn load_audio(&mut self, url: &str) -> FaceResult<Option<PlaybackTransition>> {
        if !self.mounted {
            return Err(FaceError::NotMounted);
        }
        if self.playback.has_source(url) {
            return Ok(None);
        }
        self.lipsync.load(url, &mut self.rng);
        Ok(self.playback.set_source(url))
    }

    /// Release the current audio and put visemes back to rest
    pub fn clear_audio(&mut self) {
        self.playback.teardown();
        self.blender.reset_visemes(&mut self.rig);
    }

    /// Run one render tick
    pub fn frame(&mut self, delta: Duration, camera: Vec3) -> FrameReport {
        let mut report = FrameReport::default();
        if !self.mounted {
            return report;
        }

        let now = self.clock.advance(delta);
        while let Some(task) = self.timers.pop_due(now) {
            report.timers_fired += 1;
            match task.payload {
                FaceTimer::ExpressionDrift => self.expression.tick(
                    &self.library,
                    &mut self.timers,
                    task.deadline,
                    &mut self.rng,
                ),
                timer @ (FaceTimer::BlinkStart | FaceTimer::BlinkEnd) => {
                    self.blink
                        .on_timer(timer, &mut self.timers, task.deadline, &mut self.rng)
                }
            }
        }

        report.transitions = self.playback.tick(delta);
        if report.transitions.contains(&PlaybackTransition::Ended) {
            self.blender.reset_visemes(&mut self.rig);
        }

        self.mixer.update(delta, self.rig.skeleton_mut());

        self.blender.blend_pass(
            &mut self.rig,
            &self.library,
            self.expression.state(),
            self.blink.is_active(),
            self.clock.normalized_delta(),
        );

        let position = self.playback.current_time();
        if self.playback.is_playing() && !self.lipsync.is_empty() && position > 0.0 {
            let event = self.lipsync.lookup(position).copied();
            self.blender.viseme_pass(&mut self.rig, event.as_ref());
            report.viseme_pass = true;
            report.viseme = event;
        }

        self.head.track(self.rig.skeleton_mut(), camera);

        if !report.transitions.is_empty() {
            debug!(transitions = ?report.transitions, position, "playback transitions");
        }
        report
    }

    pub fn rig(&self) -> &AvatarRig {
        &self.rig
    }

    pub fn expression(&self) -> &ExpressionDrift {
        &self.expression
    }

    pub fn blink(&self) -> &BlinkController {
        &self.blink
    }

    pub fn lipsync(&self) -> &LipSyncTrack {
        &self.lipsync
    }

    /// Install externally aligned visemes for the current audio
    pub fn lipsync_mut(&mut self) -> &mut LipSyncTrack {
        &mut self.lipsync
    }

    pub fn playback(&self) -> &PlaybackClock {
        &self.playback
    }

    pub fn playback_mut(&mut self) -> &mut PlaybackClock {
        &mut self.playback
    }

    pub fn mixer(&self) -> &AnimationMixer {
        &self.mixer
    }

    pub fn library(&self) -> &ExpressionLibrary {
        &self.library
    }

    /// Elapsed time since mount
    pub fn now(&self) -> Duration {
        self.clock.elapsed()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }
}

impl Drop for AvatarRuntime {
    fn drop(&mut self) {
        self.unmount();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face::playback::PlaybackState;
    use crate::face::types::VISEME_BASELINE;
    use crate::sound::SimulatedAudioSource;
    use rand::SeedableRng;

    const FRAME: Duration = Duration::from_micros(16_667);
    const CAMERA: Vec3 = Vec3::new(0.0, 1.6, 3.0);

    fn runtime(audio_len: Duration) -> AvatarRuntime {
        AvatarRuntime::new(
            AvatarRig::ready_player_me(),
            Box::new(SimulatedAudioSource::new(audio_len)),
            StdRng::seed_from_u64(99),
        )
    }

    #[test]
    fn test_mount_twice_fails() {
        let mut rt = runtime(Duration::from_secs(1));
        rt.mount(&[]).unwrap();
        assert_eq!(rt.mount(&[]), Err(FaceError::AlreadyMounted));
    }

    #[test]
    fn test_mount_starts_both_timers() {
        let mut rt = runtime(Duration::from_secs(1));
        rt.mount(&[]).unwrap();
        assert_eq!(rt.pending_timers(), 2);
        assert_eq!(rt.expression().changes(), 1);
        assert!(!rt.mixer().is_active());
    }

    #[test]
    fn test_frames_before_mount_do_nothing() {
        let mut rt = runtime(Duration::from_secs(1));
        let report = rt.frame(FRAME, CAMERA);
        assert_eq!(report, FrameReport::default());
        assert_eq!(rt.now(), Duration::ZERO);
        assert_eq!(rt.load_audio("a"), Err(FaceError::NotMounted));
    }

    #[test]
    fn test_unmount_invalidates_everything() {
        let mut rt = runtime(Duration::from_secs(5));
        rt.mount(&[AnimationClip::idle_breathing(2.0).unwrap()]).unwrap();
        rt.load_audio("a.mp3").unwrap();
        rt.frame(FRAME, CAMERA);

        rt.unmount();
        assert_eq!(rt.pending_timers(), 0);
        assert!(!rt.mixer().is_active());
        assert_eq!(rt.playback().state(), PlaybackState::Uninitialized);

        // No mutation after teardown
        let before = rt.rig().mesh("EyeLeft").unwrap().influences().to_vec();
        for _ in 0..600 {
            rt.frame(FRAME, CAMERA);
        }
        assert_eq!(rt.rig().mesh("EyeLeft").unwrap().influences(), &before[..]);
        assert_eq!(rt.expression().changes(), 1);
    }

    #[test]
    fn test_viseme_pass_runs_only_while_playing() {
        let mut rt = runtime(Duration::from_secs(1));
        rt.mount(&[]).unwrap();

        let report = rt.frame(FRAME, CAMERA);
        assert!(!report.viseme_pass);

        rt.load_audio("a.mp3").unwrap();
        assert_eq!(rt.lipsync().len(), 200);
        let report = rt.frame(FRAME, CAMERA);
        assert_eq!(report.transitions, vec![PlaybackTransition::Started]);
        assert!(report.viseme_pass);
        assert!(report.viseme.is_some());

        let mut ended = false;
        for _ in 0..120 {
            let report = rt.frame(FRAME, CAMERA);
            if report.transitions.contains(&PlaybackTransition::Ended) {
                ended = true;
                assert!(!report.viseme_pass);
                break;
            }
        }
        assert!(ended);

        let head = rt.rig().mesh("Wolf3D_Head").unwrap();
        for target in MorphTargetBlender::new().viseme_targets() {
            assert_eq!(head.influence(target), Some(VISEME_BASELINE));
        }
    }

    #[test]
    fn test_same_url_does_not_regenerate_track() {
        let mut rt = runtime(Duration::from_secs(3));
        rt.mount(&[]).unwrap();
        rt.load_audio("a.mp3").unwrap();
        let generation = rt.lipsync().generation();
        assert_eq!(rt.load_audio("a.mp3"), Ok(None));
        assert_eq!(rt.lipsync().generation(), generation);
    }

    #[test]
    fn test_clear_audio_resets_visemes() {
        let mut rt = runtime(Duration::from_secs(3));
        rt.mount(&[]).unwrap();
        rt.load_audio("a.mp3").unwrap();
        rt.frame(FRAME, CAMERA);
        rt.frame(FRAME, CAMERA);

        rt.clear_audio();
        assert!(!rt.playback().is_playing());
        let teeth = rt.rig().mesh("Wolf3D_Teeth").unwrap();
        assert_eq!(teeth.influence("viseme_PP"), Some(VISEME_BASELINE));
        assert_eq!(teeth.influence("viseme_aa"), Some(VISEME_BASELINE));
    }

    #[test]
    fn test_head_follows_camera() {
        let mut rt = runtime(Duration::from_secs(1));
        rt.mount(&[]).unwrap();
        rt.frame(FRAME, Vec3::new(5.0, 1.65, 0.0));
        let forward = rt.rig().skeleton().bone("Head").unwrap().rotation * Vec3::Z;
        assert!(forward.distance(Vec3::X) < 1e-4);
    }
}
