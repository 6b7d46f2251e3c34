//! Mesh and skeleton state shared with the renderer
//!
//! The face system never owns GPU resources. It mutates plain influence
//! arrays and bone transforms that a renderer uploads each frame.

use std::collections::HashMap;

use glam::{Quat, Vec3};

use super::types::RigLayout;

/// ARKit blend shape names carried by the stock face meshes
pub const ARKIT_TARGETS: [&str; 52] = [
    "browDownLeft",
    "browDownRight",
    "browInnerUp",
    "browOuterUpLeft",
    "browOuterUpRight",
    "cheekPuff",
    "cheekSquintLeft",
    "cheekSquintRight",
    "eyeBlinkLeft",
    "eyeBlinkRight",
    "eyeLookDownLeft",
    "eyeLookDownRight",
    "eyeLookInLeft",
    "eyeLookInRight",
    "eyeLookOutLeft",
    "eyeLookOutRight",
    "eyeLookUpLeft",
    "eyeLookUpRight",
    "eyeSquintLeft",
    "eyeSquintRight",
    "eyeWideLeft",
    "eyeWideRight",
    "jawForward",
    "jawLeft",
    "jawOpen",
    "jawRight",
    "mouthClose",
    "mouthDimpleLeft",
    "mouthDimpleRight",
    "mouthFrownLeft",
    "mouthFrownRight",
    "mouthFunnel",
    "mouthLeft",
    "mouthLowerDownLeft",
    "mouthLowerDownRight",
    "mouthPressLeft",
    "mouthPressRight",
    "mouthPucker",
    "mouthRight",
    "mouthRollLower",
    "mouthRollUpper",
    "mouthShrugLower",
    "mouthShrugUpper",
    "mouthSmileLeft",
    "mouthSmileRight",
    "mouthStretchLeft",
    "mouthStretchRight",
    "mouthUpperUpLeft",
    "mouthUpperUpRight",
    "noseSneerLeft",
    "noseSneerRight",
    "tongueOut",
];

/// Oculus viseme shape names
pub const OCULUS_VISEMES: [&str; 15] = [
    "viseme_sil",
    "viseme_PP",
    "viseme_FF",
    "viseme_TH",
    "viseme_DD",
    "viseme_kk",
    "viseme_CH",
    "viseme_SS",
    "viseme_nn",
    "viseme_RR",
    "viseme_aa",
    "viseme_E",
    "viseme_I",
    "viseme_O",
    "viseme_U",
];

/// A skinned mesh node with morph targets
#[derive(Debug, Clone)]
pub struct MorphMesh {
    name: String,
    /// Target name to influence index
    dictionary: HashMap<String, usize>,
    /// Index order of `dictionary`, kept for stable iteration
    names: Vec<String>,
    influences: Vec<f32>,
}

impl MorphMesh {
    /// Mesh with every listed target at influence 0
    pub fn new<S: AsRef<str>>(name: &str, targets: &[S]) -> Self {
        let mut mesh = Self {
            name: name.to_string(),
            dictionary: HashMap::with_capacity(targets.len()),
            names: Vec::with_capacity(targets.len()),
            influences: Vec::with_capacity(targets.len()),
        };
        for target in targets {
            mesh.add_target(target.as_ref());
        }
        mesh
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a target; duplicates are ignored
    pub fn add_target(&mut self, target: &str) -> usize {
        if let Some(&index) = self.dictionary.get(target) {
            return index;
        }
        let index = self.influences.len();
        self.dictionary.insert(target.to_string(), index);
        self.names.push(target.to_string());
        self.influences.push(0.0);
        index
    }

    pub fn index_of(&self, target: &str) -> Option<usize> {
        self.dictionary.get(target).copied()
    }

    pub fn has_target(&self, target: &str) -> bool {
        self.dictionary.contains_key(target)
    }

    pub fn influence(&self, target: &str) -> Option<f32> {
        self.index_of(target).map(|i| self.influences[i])
    }

    /// Write an influence; returns false when the mesh lacks the target
    pub fn set_influence(&mut self, target: &str, value: f32) -> bool {
        match self.index_of(target) {
            Some(i) => {
                self.influences[i] = value;
                true
            }
            None => false,
        }
    }

    /// Target names in index order
    pub fn target_names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|n| n.as_str())
    }

    /// Raw influence array in index order
    pub fn influences(&self) -> &[f32] {
        &self.influences
    }

    pub fn target_count(&self) -> usize {
        self.influences.len()
    }
}

/// A skeleton joint in avatar space
#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    pub name: String,
    pub position: Vec3,
    pub rotation: Quat,
}

impl Bone {
    pub fn new(name: &str, position: Vec3) -> Self {
        Self {
            name: name.to_string(),
            position,
            rotation: Quat::IDENTITY,
        }
    }
}

/// Flat list of bones
#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    bones: Vec<Bone>,
}

impl Skeleton {
    pub fn new(bones: Vec<Bone>) -> Self {
        Self { bones }
    }

    pub fn bone(&self, name: &str) -> Option<&Bone> {
        self.bones.iter().find(|b| b.name == name)
    }

    pub fn bone_mut(&mut self, name: &str) -> Option<&mut Bone> {
        self.bones.iter_mut().find(|b| b.name == name)
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }
}

/// Everything the face system writes each frame
#[derive(Debug, Clone)]
pub struct AvatarRig {
    meshes: Vec<MorphMesh>,
    skeleton: Skeleton,
    layout: RigLayout,
}

impl AvatarRig {
    pub fn new(meshes: Vec<MorphMesh>, skeleton: Skeleton, layout: RigLayout) -> Self {
        Self {
            meshes,
            skeleton,
            layout,
        }
    }

    /// Ready Player Me style half-body rig
    pub fn ready_player_me() -> Self {
        let face: Vec<&str> = ARKIT_TARGETS
            .iter()
            .chain(OCULUS_VISEMES.iter())
            .copied()
            .collect();
        let meshes = vec![
            MorphMesh::new("EyeLeft", &ARKIT_TARGETS),
            MorphMesh::new("EyeRight", &ARKIT_TARGETS),
            MorphMesh::new("Wolf3D_Head", &face),
            MorphMesh::new("Wolf3D_Teeth", &face),
            MorphMesh::new("Wolf3D_Body", &[] as &[&str]),
        ];
        let skeleton = Skeleton::new(vec![
            Bone::new("Hips", Vec3::new(0.0, 1.0, 0.0)),
            Bone::new("Spine", Vec3::new(0.0, 1.1, 0.0)),
            Bone::new("Spine1", Vec3::new(0.0, 1.25, 0.0)),
            Bone::new("Spine2", Vec3::new(0.0, 1.4, 0.0)),
            Bone::new("Neck", Vec3::new(0.0, 1.55, 0.0)),
            Bone::new("Head", Vec3::new(0.0, 1.65, 0.0)),
            Bone::new("LeftShoulder", Vec3::new(0.08, 1.45, 0.0)),
            Bone::new("RightShoulder", Vec3::new(-0.08, 1.45, 0.0)),
        ]);
        Self::new(meshes, skeleton, RigLayout::default())
    }

    pub fn layout(&self) -> &RigLayout {
        &self.layout
    }

    pub fn mesh(&self, name: &str) -> Option<&MorphMesh> {
        self.meshes.iter().find(|m| m.name == name)
    }

    pub fn mesh_mut(&mut self, name: &str) -> Option<&mut MorphMesh> {
        self.meshes.iter_mut().find(|m| m.name == name)
    }

    pub fn meshes(&self) -> &[MorphMesh] {
        &self.meshes
    }

    pub fn meshes_mut(&mut self) -> &mut [MorphMesh] {
        &mut self.meshes
    }

    pub fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    pub fn skeleton_mut(&mut self) -> &mut Skeleton {
        &mut self.skeleton
    }

    /// Meshes, layout and skeleton borrowed separately
    pub fn split_mut(&mut self) -> (&mut [MorphMesh], &mut Skeleton, &RigLayout) {
        (&mut self.meshes, &mut self.skeleton, &self.layout)
    }
}
