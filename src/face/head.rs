//! Head tracking
//!
//! Turns the head bone toward the camera while keeping it level: the look
//! target is the camera position with its height replaced by the head's own.

use glam::{Mat3, Quat, Vec3};

use super::rig::Skeleton;

/// Stateless head-to-camera orientation
#[derive(Debug, Clone)]
pub struct HeadTracker {
    bone: String,
}

impl HeadTracker {
    pub fn new(bone: &str) -> Self {
        Self {
            bone: bone.to_string(),
        }
    }

    pub fn bone_name(&self) -> &str {
        &self.bone
    }

    /// Orient the head bone toward `camera`
    ///
    /// Returns the applied rotation, or `None` when the bone is missing or
    /// the camera sits directly above or below the head.
    pub fn track(&self, skeleton: &mut Skeleton, camera: Vec3) -> Option<Quat> {
        let bone = skeleton.bone_mut(&self.bone)?;
        let target = Vec3::new(camera.x, bone.position.y, camera.z);
        let rotation = look_at_rotation(bone.position, target)?;
        bone.rotation = rotation;
        Some(rotation)
    }
}

impl Default for HeadTracker {
    fn default() -> Self {
        Self::new("Head")
    }
}

/// Rotation that points +Z from `eye` toward `target` with +Y up
pub fn look_at_rotation(eye: Vec3, target: Vec3) -> Option<Quat> {
    let forward = (target - eye).try_normalize()?;
    let right = Vec3::Y.cross(forward).try_normalize()?;
    let up = forward.cross(right);
    Some(Quat::from_mat3(&Mat3::from_cols(right, up, forward)))
}
