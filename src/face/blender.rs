//! Morph target blender
//!
//! The only code that writes morph influences. Each frame runs the
//! blink/expression blend pass first, then (while audio plays) the viseme
//! pass, which may overwrite targets the blend pass just moved.

use tracing::trace;

use super::expression::{ExpressionLibrary, ExpressionState};
use super::lipsync::{viseme_targets, VisemeEvent};
use super::rig::{AvatarRig, MorphMesh};
use super::types::{
    BLINK_SMOOTHING, BLINK_TARGETS, EXPRESSION_SMOOTHING, VISEME_BASELINE, VISEME_WEIGHT_CAP,
};

/// Frame-rate compensated exponential step from `current` toward `target`
///
/// The effective rate `factor * normalized_delta` is capped at 1 so a long
/// frame lands on the target instead of overshooting it.
pub fn blend(current: f32, target: f32, factor: f32, normalized_delta: f32) -> f32 {
    let rate = (factor * normalized_delta).clamp(0.0, 1.0);
    (current + (target - current) * rate).clamp(0.0, 1.0)
}

/// Clamp a raw viseme weight to what the viseme pass may write
pub fn capped_viseme_weight(weight: f32) -> f32 {
    if weight.is_nan() {
        return 0.0;
    }
    weight.clamp(0.0, VISEME_WEIGHT_CAP)
}

/// Single writer of morph influences
#[derive(Debug, Clone)]
pub struct MorphTargetBlender {
    viseme_targets: Vec<&'static str>,
    blink_smoothing: f32,
    expression_smoothing: f32,
}

impl MorphTargetBlender {
    pub fn new() -> Self {
        Self {
            viseme_targets: viseme_targets(),
            blink_smoothing: BLINK_SMOOTHING,
            expression_smoothing: EXPRESSION_SMOOTHING,
        }
    }

    /// Morph targets the viseme pass owns
    pub fn viseme_targets(&self) -> &[&'static str] {
        &self.viseme_targets
    }

    /// Ease blink and expression targets toward their goals
    pub fn blend_pass(
        &self,
        rig: &mut AvatarRig,
        library: &ExpressionLibrary,
        expression: &ExpressionState,
        blink_active: bool,
        normalized_delta: f32,
    ) {
        let blink_goal = if blink_active { 1.0 } else { 0.0 };
        for target in BLINK_TARGETS {
            ease_all(
                rig.meshes_mut(),
                target,
                blink_goal,
                self.blink_smoothing,
                normalized_delta,
            );
        }

        // Target set comes from the expression-bearing mesh; absent mesh means no expression
        let Some(names) = rig
            .mesh(&rig.layout().expression_mesh)
            .map(|m| m.target_names().map(str::to_string).collect::<Vec<_>>())
        else {
            return;
        };

        let profile = library.get(&expression.profile);
        let intensity = expression.intensity.clamp(0.0, 1.0);
        for name in names.iter().filter(|n| !BLINK_TARGETS.contains(&n.as_str())) {
            let goal = profile.map_or(0.0, |p| p.target(name)) * intensity;
            ease_all(
                rig.meshes_mut(),
                name,
                goal,
                self.expression_smoothing,
                normalized_delta,
            );
        }
    }

    /// Reset viseme targets to baseline, then set the active event's target
    ///
    /// Returns the influence written for the event's target, if any.
    pub fn viseme_pass(&self, rig: &mut AvatarRig, event: Option<&VisemeEvent>) -> Option<f32> {
        self.reset_visemes(rig);

        let event = event?;
        let target = event.viseme.morph_target();
        let value = capped_viseme_weight(event.weight);
        let (meshes, _, layout) = rig.split_mut();
        for mesh in meshes
            .iter_mut()
            .filter(|m| layout.viseme_meshes.iter().any(|n| n == m.name()))
        {
            mesh.set_influence(target, value);
        }
        trace!(viseme = %event.viseme, target, value, "viseme applied");
        Some(value)
    }

    /// Put every viseme target on the viseme meshes back to baseline
    pub fn reset_visemes(&self, rig: &mut AvatarRig) {
        let (meshes, _, layout) = rig.split_mut();
        for mesh in meshes
            .iter_mut()
            .filter(|m| layout.viseme_meshes.iter().any(|n| n == m.name()))
        {
            for target in &self.viseme_targets {
                mesh.set_influence(target, VISEME_BASELINE);
            }
        }
    }
}

impl Default for MorphTargetBlender {
    fn default() -> Self {
        Self::new()
    }
}

fn ease_all(meshes: &mut [MorphMesh], target: &str, goal: f32, factor: f32, nd: f32) {
    for mesh in meshes.iter_mut() {
        if let Some(current) = mesh.influence(target) {
            mesh.set_influence(target, blend(current, goal, factor, nd));
        }
    }
}
