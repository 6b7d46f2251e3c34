//! Skeletal clip playback
//!
//! Advances idle clips on the skeleton, independent of the morph targets.
//! A mixer built from an empty clip list stays inactive and the skeleton
//! keeps its rest pose.

use std::time::Duration;

use glam::{Quat, Vec3};
use tracing::debug;

use super::rig::Skeleton;
use super::types::{FaceError, FaceResult};

/// Playback mode of a clip action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayMode {
    /// Play once and hold the last pose
    Once,
    /// Wrap around at the end
    #[default]
    Loop,
    /// Play forward then backward
    PingPong,
}

/// Action state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActionState {
    #[default]
    Stopped,
    Playing,
    Paused,
    Finished,
}

/// Rotation key
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe {
    /// Seconds from clip start
    pub time: f32,
    pub rotation: Quat,
}

/// Rotation keys for one bone, sorted by time
#[derive(Debug, Clone)]
pub struct BoneTrack {
    pub bone: String,
    keyframes: Vec<Keyframe>,
}

impl BoneTrack {
    pub fn new(bone: &str, mut keyframes: Vec<Keyframe>) -> FaceResult<Self> {
        if keyframes.is_empty() {
            return Err(FaceError::EmptyTrack(bone.to_string()));
        }
        keyframes.sort_by(|a, b| a.time.total_cmp(&b.time));
        Ok(Self {
            bone: bone.to_string(),
            keyframes,
        })
    }

    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    /// Rotation at `time`, slerped between the surrounding keys
    pub fn sample(&self, time: f32) -> Quat {
        let keys = &self.keyframes;
        let next = keys.partition_point(|k| k.time <= time);
        if next == 0 {
            return keys[0].rotation;
        }
        if next == keys.len() {
            return keys[keys.len() - 1].rotation;
        }

        let a = keys[next - 1];
        let b = keys[next];
        let span = b.time - a.time;
        if span <= f32::EPSILON {
            return b.rotation;
        }
        a.rotation.slerp(b.rotation, (time - a.time) / span)
    }
}

/// Named skeletal animation
#[derive(Debug, Clone)]
pub struct AnimationClip {
    pub name: String,
    /// Seconds
    pub duration: f32,
    tracks: Vec<BoneTrack>,
}

impl AnimationClip {
    pub fn new(name: &str, duration: f32, tracks: Vec<BoneTrack>) -> FaceResult<Self> {
        if tracks.is_empty() || duration.is_nan() || duration <= 0.0 {
            return Err(FaceError::EmptyClip(name.to_string()));
        }
        Ok(Self {
            name: name.to_string(),
            duration,
            tracks,
        })
    }

    /// Gentle breathing sway for the upper spine and neck
    pub fn idle_breathing(duration: f32) -> FaceResult<Self> {
        let half = duration / 2.0;
        let sway = |bone: &str, axis: Vec3, angle: f32| {
            BoneTrack::new(
                bone,
                vec![
                    Keyframe {
                        time: 0.0,
                        rotation: Quat::IDENTITY,
                    },
                    Keyframe {
                        time: half,
                        rotation: Quat::from_axis_angle(axis, angle),
                    },
                    Keyframe {
                        time: duration,
                        rotation: Quat::IDENTITY,
                    },
                ],
            )
        };

        Self::new(
            "Idle",
            duration,
            vec![
                sway("Spine1", Vec3::X, 0.02)?,
                sway("Spine2", Vec3::X, 0.015)?,
                sway("Neck", Vec3::Z, 0.01)?,
            ],
        )
    }

    pub fn tracks(&self) -> &[BoneTrack] {
        &self.tracks
    }
}

/// A clip being played by the mixer
#[derive(Debug, Clone)]
pub struct ClipAction {
    pub clip: AnimationClip,
    pub mode: PlayMode,
    pub state: ActionState,
    /// Seconds into the clip
    pub time: f32,
    /// Blend weight against the current pose, 0..1
    pub weight: f32,
    direction: f32,
}

impl ClipAction {
    pub fn new(clip: AnimationClip, mode: PlayMode) -> Self {
        Self {
            clip,
            mode,
            state: ActionState::Stopped,
            time: 0.0,
            weight: 1.0,
            direction: 1.0,
        }
    }

    pub fn play(&mut self) {
        self.state = ActionState::Playing;
        self.time = 0.0;
        self.direction = 1.0;
    }

    pub fn stop(&mut self) {
        self.state = ActionState::Stopped;
        self.time = 0.0;
    }

    pub fn pause(&mut self) {
        if self.state == ActionState::Playing {
            self.state = ActionState::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.state == ActionState::Paused {
            self.state = ActionState::Playing;
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state == ActionState::Playing
    }

    /// Advance local time by `seconds`
    fn advance(&mut self, seconds: f32) {
        if self.state != ActionState::Playing {
            return;
        }
        let duration = self.clip.duration;

        match self.mode {
            PlayMode::Once => {
                self.time += seconds;
                if self.time >= duration {
                    self.time = duration;
                    self.state = ActionState::Finished;
                }
            }
            PlayMode::Loop => {
                self.time = (self.time + seconds).rem_euclid(duration);
            }
            PlayMode::PingPong => {
                // Fold onto a 2*duration cycle
                let mut t = self.time + seconds * self.direction;
                let cycle = duration * 2.0;
                t = t.rem_euclid(cycle);
                if t > duration {
                    self.time = cycle - t;
                    self.direction = -self.direction;
                } else {
                    self.time = t;
                }
            }
        }
    }

    fn apply(&self, skeleton: &mut Skeleton) {
        for track in self.clip.tracks() {
            // Missing bones are skipped
            if let Some(bone) = skeleton.bone_mut(&track.bone) {
                let pose = track.sample(self.time);
                bone.rotation = if self.weight >= 1.0 {
                    pose
                } else {
                    bone.rotation.slerp(pose, self.weight.max(0.0))
                };
            }
        }
    }
}

/// Clip mixer bound to a skeleton
#[derive(Debug, Clone)]
pub struct AnimationMixer {
    actions: Vec<ClipAction>,
    /// Multiplier applied to every advance
    pub time_scale: f32,
}

impl AnimationMixer {
    pub fn new() -> Self {
        Self {
            actions: Vec::new(),
            time_scale: 1.0,
        }
    }

    /// Mixer playing the first available clip on loop
    pub fn with_idle(clips: &[AnimationClip]) -> Self {
        let mut mixer = Self::new();
        match clips.first() {
            Some(clip) => {
                debug!(clip = %clip.name, "idle clip bound");
                mixer.play(clip.clone(), PlayMode::Loop);
            }
            None => debug!("no idle clip, skeleton stays at rest"),
        }
        mixer
    }

    /// Start playing a clip; returns the action index
    pub fn play(&mut self, clip: AnimationClip, mode: PlayMode) -> usize {
        let mut action = ClipAction::new(clip, mode);
        action.play();
        self.actions.push(action);
        self.actions.len() - 1
    }

    pub fn action(&self, index: usize) -> Option<&ClipAction> {
        self.actions.get(index)
    }

    pub fn action_mut(&mut self, index: usize) -> Option<&mut ClipAction> {
        self.actions.get_mut(index)
    }

    /// Advance every playing action and pose the skeleton
    pub fn update(&mut self, delta: Duration, skeleton: &mut Skeleton) {
        let seconds = delta.as_secs_f32() * self.time_scale;
        for action in &mut self.actions {
            action.advance(seconds);
            if action.state != ActionState::Stopped {
                action.apply(skeleton);
            }
        }
    }

    pub fn stop_all(&mut self) {
        for action in &mut self.actions {
            action.stop();
        }
    }

    /// True while any action is playing
    pub fn is_active(&self) -> bool {
        self.actions.iter().any(|a| a.is_playing())
    }

    pub fn action_count(&self) -> usize {
        self.actions.len()
    }
}

impl Default for AnimationMixer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face::rig::Bone;

    fn nod_clip() -> AnimationClip {
        let track = BoneTrack::new(
            "Neck",
            vec![
                Keyframe {
                    time: 0.0,
                    rotation: Quat::IDENTITY,
                },
                Keyframe {
                    time: 1.0,
                    rotation: Quat::from_rotation_x(0.5),
                },
            ],
        )
        .unwrap();
        AnimationClip::new("Nod", 1.0, vec![track]).unwrap()
    }

    fn skeleton() -> Skeleton {
        Skeleton::new(vec![Bone::new("Neck", Vec3::Y)])
    }

    fn neck_angle(skeleton: &Skeleton) -> f32 {
        skeleton.bone("Neck").unwrap().rotation.to_axis_angle().1
    }

    #[test]
    fn test_clip_validation() {
        assert!(matches!(
            AnimationClip::new("Empty", 1.0, vec![]),
            Err(FaceError::EmptyClip(_))
        ));
        assert!(matches!(
            BoneTrack::new("Neck", vec![]),
            Err(FaceError::EmptyTrack(_))
        ));
        let track = nod_clip().tracks()[0].clone();
        assert!(AnimationClip::new("Zero", 0.0, vec![track]).is_err());
    }

    #[test]
    fn test_sample_interpolates() {
        let clip = nod_clip();
        let track = &clip.tracks()[0];
        assert_eq!(track.sample(-1.0), Quat::IDENTITY);
        let mid = track.sample(0.5).to_axis_angle().1;
        assert!((mid - 0.25).abs() < 1e-3);
        let end = track.sample(2.0).to_axis_angle().1;
        assert!((end - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_with_idle_plays_first_clip_looping() {
        let mut mixer = AnimationMixer::with_idle(&[nod_clip()]);
        let mut skeleton = skeleton();
        assert!(mixer.is_active());
        assert_eq!(mixer.action(0).unwrap().mode, PlayMode::Loop);

        mixer.update(Duration::from_millis(500), &mut skeleton);
        assert!((neck_angle(&skeleton) - 0.25).abs() < 1e-3);

        // 1.25 s wraps to 0.25 s
        mixer.update(Duration::from_millis(750), &mut skeleton);
        assert!((mixer.action(0).unwrap().time - 0.25).abs() < 1e-4);
        assert!(mixer.is_active());
    }

    #[test]
    fn test_without_clips_is_inactive() {
        let mut mixer = AnimationMixer::with_idle(&[]);
        let mut skeleton = skeleton();
        mixer.update(Duration::from_secs(1), &mut skeleton);
        assert!(!mixer.is_active());
        assert_eq!(skeleton.bone("Neck").unwrap().rotation, Quat::IDENTITY);
    }

    #[test]
    fn test_once_finishes_and_holds() {
        let mut mixer = AnimationMixer::new();
        let index = mixer.play(nod_clip(), PlayMode::Once);
        let mut skeleton = skeleton();

        mixer.update(Duration::from_secs(3), &mut skeleton);
        assert_eq!(mixer.action(index).unwrap().state, ActionState::Finished);
        assert!((neck_angle(&skeleton) - 0.5).abs() < 1e-3);
        assert!(!mixer.is_active());
    }

    #[test]
    fn test_ping_pong_reverses() {
        let mut mixer = AnimationMixer::new();
        mixer.play(nod_clip(), PlayMode::PingPong);
        let mut skeleton = skeleton();

        mixer.update(Duration::from_millis(1250), &mut skeleton);
        assert!((mixer.action(0).unwrap().time - 0.75).abs() < 1e-4);
    }

    #[test]
    fn test_stop_all() {
        let mut mixer = AnimationMixer::with_idle(&[nod_clip()]);
        let mut skeleton = skeleton();
        mixer.stop_all();
        mixer.update(Duration::from_millis(500), &mut skeleton);
        assert!(!mixer.is_active());
        assert_eq!(skeleton.bone("Neck").unwrap().rotation, Quat::IDENTITY);
    }

    #[test]
    fn test_time_scale() {
        let mut mixer = AnimationMixer::with_idle(&[nod_clip()]);
        mixer.time_scale = 0.5;
        let mut skeleton = skeleton();
        mixer.update(Duration::from_millis(500), &mut skeleton);
        assert!((mixer.action(0).unwrap().time - 0.25).abs() < 1e-4);
    }

    #[test]
    fn test_idle_breathing_clip() {
        let clip = AnimationClip::idle_breathing(4.0).unwrap();
        assert_eq!(clip.tracks().len(), 3);
        assert_eq!(clip.duration, 4.0);
    }
}
