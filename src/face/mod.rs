//! Facial animation core
//!
//! Drives a rigged avatar's morph targets and skeleton from four sources:
//! randomized expression drift, autonomous blinking, a lip-sync track timed
//! against audio playback, and a looping idle clip. A head tracker keeps the
//! face turned toward the viewer.
//!
//! # Architecture
//!
//! - [`AvatarRuntime`] owns every component and runs them in a fixed order
//!   once per frame
//! - [`MorphTargetBlender`] is the only writer of morph influences
//! - [`PlaybackClock`] owns the single live audio element
//! - Expression and blink timers live in a [`TimerQueue`](crate::time::TimerQueue)
//!   owned by the runtime and are cancelled on unmount
//!
//! Missing meshes, targets, bones or clips degrade to no-ops.

pub mod blender;
pub mod blink;
pub mod expression;
pub mod head;
pub mod lipsync;
pub mod mixer;
pub mod playback;
pub mod rig;
pub mod state;
pub mod types;

pub use blender::{blend, capped_viseme_weight, MorphTargetBlender};
pub use blink::{BlinkController, BlinkPhase};
pub use expression::{ExpressionDrift, ExpressionLibrary, ExpressionProfile, ExpressionState};
pub use head::{look_at_rotation, HeadTracker};
pub use lipsync::{
    parse_mouth_cues, synthetic_events, viseme_targets, LipSyncTrack, VisemeEvent, VisemeId,
};
pub use mixer::{
    ActionState, AnimationClip, AnimationMixer, BoneTrack, ClipAction, Keyframe, PlayMode,
};
pub use playback::{PlaybackClock, PlaybackState, PlaybackTransition};
pub use rig::{AvatarRig, Bone, MorphMesh, Skeleton, ARKIT_TARGETS, OCULUS_VISEMES};
pub use state::{AvatarRuntime, FrameReport};
pub use types::{FaceError, FaceResult, FaceTimer, RigLayout};
