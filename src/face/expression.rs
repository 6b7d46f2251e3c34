//! Expression profiles and the randomized expression drift
//!
//! An [`ExpressionProfile`] is a static table of morph-target values. The
//! [`ExpressionDrift`] owns the process's single [`ExpressionState`] and
//! re-picks profile and intensity every few seconds through the timer queue.

use std::collections::BTreeMap;
use std::time::Duration;

use rand::Rng;
use tracing::debug;

use super::types::{
    FaceError, FaceResult, FaceTimer, EXPRESSION_INTERVAL_MS, MIN_EXPRESSION_INTENSITY,
};
use crate::time::{TimerId, TimerQueue};

/// Named table of morph-target values in 0..1
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionProfile {
    name: String,
    targets: BTreeMap<String, f32>,
}

impl ExpressionProfile {
    pub fn new<'a, I>(name: &str, targets: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, f32)>,
    {
        Self {
            name: name.to_string(),
            targets: targets
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.clamp(0.0, 1.0)))
                .collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Target value for a morph target, 0 when the profile does not name it
    pub fn target(&self, morph: &str) -> f32 {
        self.targets.get(morph).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.targets.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Immutable set of profiles plus the names the drift picks between
#[derive(Debug, Clone)]
pub struct ExpressionLibrary {
    profiles: BTreeMap<String, ExpressionProfile>,
    drift: Vec<String>,
}

impl ExpressionLibrary {
    /// Library with the two stock smiles, both eligible for drift
    pub fn builtin() -> Self {
        let big_smile = ExpressionProfile::new(
            "bigSmile",
            [
                ("browInnerUp", 0.17),
                ("eyeSquintLeft", 0.4),
                ("eyeSquintRight", 0.44),
                ("noseSneerLeft", 0.17),
                ("noseSneerRight", 0.14),
                ("cheekSquintLeft", 0.5),
                ("cheekSquintRight", 0.5),
                ("mouthDimpleLeft", 0.3),
                ("mouthDimpleRight", 0.3),
                ("mouthSmileLeft", 0.8),
                ("mouthSmileRight", 0.8),
                ("mouthPressLeft", 0.61),
                ("mouthPressRight", 0.41),
            ],
        );
        let small_smile = ExpressionProfile::new(
            "smallSmile",
            [
                ("eyeSquintLeft", 0.15),
                ("eyeSquintRight", 0.15),
                ("cheekSquintLeft", 0.2),
                ("cheekSquintRight", 0.2),
                ("mouthSmileLeft", 0.4),
                ("mouthSmileRight", 0.4),
            ],
        );

        let mut library = Self {
            profiles: BTreeMap::new(),
            drift: vec!["bigSmile".to_string(), "smallSmile".to_string()],
        };
        library.insert(big_smile);
        library.insert(small_smile);
        library
    }

    /// Add or replace a profile
    pub fn insert(&mut self, profile: ExpressionProfile) {
        self.profiles.insert(profile.name.clone(), profile);
    }

    pub fn get(&self, name: &str) -> Option<&ExpressionProfile> {
        self.profiles.get(name)
    }

    /// Restrict the drift to the given profiles
    pub fn set_drift_candidates(&mut self, names: &[&str]) -> FaceResult<()> {
        if names.is_empty() {
            return Err(FaceError::NoDriftCandidates);
        }
        if let Some(missing) = names.iter().find(|n| !self.profiles.contains_key(**n)) {
            return Err(FaceError::UnknownExpression(missing.to_string()));
        }
        self.drift = names.iter().map(|n| n.to_string()).collect();
        Ok(())
    }

    pub fn drift_candidates(&self) -> &[String] {
        &self.drift
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(|k| k.as_str())
    }
}

impl Default for ExpressionLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Current expression and its intensity
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionState {
    pub profile: String,
    /// Scale applied to every profile value, in [0, 1]
    pub intensity: f32,
}

impl Default for ExpressionState {
    fn default() -> Self {
        Self {
            profile: "smallSmile".to_string(),
            intensity: 1.0,
        }
    }
}

/// Self-rescheduling expression changer
#[derive(Debug, Default)]
pub struct ExpressionDrift {
    state: ExpressionState,
    pending: Option<TimerId>,
    changes: u64,
}

impl ExpressionDrift {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ExpressionState {
        &self.state
    }

    /// Handle of the scheduled next change
    pub fn pending(&self) -> Option<TimerId> {
        self.pending
    }

    /// Number of changes applied since creation
    pub fn changes(&self) -> u64 {
        self.changes
    }

    /// Apply the first change immediately and start the cycle
    pub fn start<R: Rng + ?Sized>(
        &mut self,
        library: &ExpressionLibrary,
        queue: &mut TimerQueue<FaceTimer>,
        now: Duration,
        rng: &mut R,
    ) {
        self.cancel(queue);
        self.tick(library, queue, now, rng);
    }

    /// Pick a new profile and intensity, then schedule the next change
    pub fn tick<R: Rng + ?Sized>(
        &mut self,
        library: &ExpressionLibrary,
        queue: &mut TimerQueue<FaceTimer>,
        now: Duration,
        rng: &mut R,
    ) {
        let candidates = library.drift_candidates();
        if !candidates.is_empty() {
            let pick = rng.gen_range(0..candidates.len());
            self.state.profile = candidates[pick].clone();
        }
        self.state.intensity = rng.gen_range(MIN_EXPRESSION_INTENSITY..=1.0);
        self.changes += 1;

        let delay = Duration::from_millis(rng.gen_range(EXPRESSION_INTERVAL_MS));
        self.pending = Some(queue.schedule_after(now, delay, FaceTimer::ExpressionDrift));

        debug!(
            profile = %self.state.profile,
            intensity = self.state.intensity,
            next_ms = delay.as_millis() as u64,
            "expression changed"
        );
    }

    /// Invalidate the pending change
    pub fn cancel(&mut self, queue: &mut TimerQueue<FaceTimer>) {
        if let Some(id) = self.pending.take() {
            queue.cancel(id);
        }
    }
}
