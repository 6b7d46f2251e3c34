//! Core types and constants for the face animation system

use std::ops::Range;
use std::time::Duration;

/// Influence every viseme target rests at between phonemes
pub const VISEME_BASELINE: f32 = 0.1;

/// Ceiling for influences written by the viseme pass
pub const VISEME_WEIGHT_CAP: f32 = 0.5;

/// Smoothing factor for the blink targets
pub const BLINK_SMOOTHING: f32 = 0.5;

/// Smoothing factor for expression targets
pub const EXPRESSION_SMOOTHING: f32 = 0.1;

/// Morph targets driven by the blink controller
pub const BLINK_TARGETS: [&str; 2] = ["eyeBlinkLeft", "eyeBlinkRight"];

/// How long the eyes stay closed
pub const BLINK_DURATION: Duration = Duration::from_millis(200);

/// Delay before the next blink, in milliseconds
pub const BLINK_INTERVAL_MS: Range<u64> = 5000..8000;

/// Delay before the next expression change, in milliseconds
pub const EXPRESSION_INTERVAL_MS: Range<u64> = 2000..5000;

/// Lower bound of the sampled expression intensity (upper bound is 1.0)
pub const MIN_EXPRESSION_INTENSITY: f32 = 0.7;

/// Number of events in a synthetic lip-sync track
pub const SYNTHETIC_EVENT_COUNT: usize = 200;

/// Start of event `i` is `i * SYNTHETIC_START_STEP` seconds
pub const SYNTHETIC_START_STEP: f32 = 0.15;

/// End of event `i` is `(i + 1) * SYNTHETIC_END_STEP` seconds
pub const SYNTHETIC_END_STEP: f32 = 0.25;

/// Weight range of synthetic events
pub const SYNTHETIC_WEIGHT: Range<f32> = 0.4..0.6;

/// Names of the rig nodes the face system reads and writes
///
/// Defaults match the Ready Player Me avatar layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RigLayout {
    /// Meshes whose viseme targets are reset and driven by the lip-sync pass
    pub viseme_meshes: Vec<String>,
    /// Mesh whose morph dictionary defines the expression target set
    pub expression_mesh: String,
    /// Bone turned toward the camera
    pub head_bone: String,
}

impl Default for RigLayout {
    fn default() -> Self {
        Self {
            viseme_meshes: vec!["Wolf3D_Head".to_string(), "Wolf3D_Teeth".to_string()],
            expression_mesh: "EyeLeft".to_string(),
            head_bone: "Head".to_string(),
        }
    }
}

/// Payload of the face system's scheduled tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceTimer {
    /// Pick a new expression and intensity
    ExpressionDrift,
    /// Close the eyes
    BlinkStart,
    /// Open the eyes and schedule the next blink
    BlinkEnd,
}

/// Error type for face animation setup
///
/// Nothing in the per-frame path returns these; missing targets, bones and
/// clips degrade silently.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FaceError {
    #[error("avatar is not mounted")]
    NotMounted,
    #[error("avatar is already mounted")]
    AlreadyMounted,
    #[error("unknown expression profile: {0}")]
    UnknownExpression(String),
    #[error("expression library needs at least one drift candidate")]
    NoDriftCandidates,
    #[error("animation clip '{0}' has no tracks or zero duration")]
    EmptyClip(String),
    #[error("bone track for '{0}' has no keyframes")]
    EmptyTrack(String),
    #[error("invalid viseme code: {0}")]
    InvalidViseme(String),
    #[error("malformed mouth cue data: {0}")]
    InvalidCues(String),
}

/// Result type for face operations
pub type FaceResult<T> = Result<T, FaceError>;
