//! A mesh groups one or more [`Model`]s with the animations and the skeleton
//! they share.

use crate::resource::model::Model;
use nalgebra::Matrix4;
use std::rc::Rc;

/// A bone of a skeleton. The bone list is ordered parents-before-children,
/// so a single forward pass can resolve world transforms.
#[derive(Clone, Debug)]
pub struct Bone {
    pub name: String,
    /// Index of the parent bone; `None` only for the root.
    pub parent: Option<usize>,
    /// Transform from mesh space to bone-local space in the bind pose.
    pub inverse_bind_matrix: Matrix4<f32>,
    /// Bone-local transform in the bind pose.
    pub local_bind_matrix: Matrix4<f32>,
}

/// An ordered bone list shared by the models of a mesh.
#[derive(Clone, Debug, Default)]
pub struct Skeleton {
    bones: Vec<Bone>,
}

impl Skeleton {
    /// Creates a skeleton from an ordered bone list. Panics in debug builds
    /// when a bone references a parent that comes after it.
    pub fn new(bones: Vec<Bone>) -> Self {
        debug_assert!(bones
            .iter()
            .enumerate()
            .all(|(i, bone)| bone.parent.map_or(true, |p| p < i)));
        Self { bones }
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    /// Resolves a per-bone palette from bone-local pose matrices: for each
    /// bone, `world(bone) * inverse_bind(bone)` with world transforms chained
    /// through the parents.
    pub fn evaluate_palette(&self, local_pose: &[Matrix4<f32>]) -> Vec<Matrix4<f32>> {
        let mut world = Vec::with_capacity(self.bones.len());
        for (i, bone) in self.bones.iter().enumerate() {
            let local = local_pose
                .get(i)
                .copied()
                .unwrap_or(bone.local_bind_matrix);
            let matrix = match bone.parent {
                Some(parent) => world[parent] * local,
                None => local,
            };
            world.push(matrix);
        }
        self.bones
            .iter()
            .enumerate()
            .map(|(i, bone)| world[i] * bone.inverse_bind_matrix)
            .collect()
    }
}

/// A keyframed bone animation. Playback (blending, montages) lives outside
/// the rendering core; the renderer only consumes the resolved palette.
#[derive(Clone, Debug)]
pub struct Animation {
    pub name: String,
    pub duration: f32,
    /// Per-bone, per-keyframe local pose matrices.
    pub tracks: Vec<Vec<Matrix4<f32>>>,
}

/// See module docs.
pub struct Mesh {
    pub models: Vec<Rc<Model>>,
    pub animations: Vec<Animation>,
    pub skeleton: Skeleton,
}

impl Mesh {
    pub fn new(models: Vec<Rc<Model>>) -> Self {
        Self {
            models,
            animations: Vec::new(),
            skeleton: Skeleton::default(),
        }
    }

    pub fn with_skeleton(mut self, skeleton: Skeleton) -> Self {
        self.skeleton = skeleton;
        self
    }
}

#[cfg(test)]
mod test {
    use super::{Bone, Skeleton};
    use nalgebra::{Matrix4, Vector3};

    fn bone(name: &str, parent: Option<usize>) -> Bone {
        Bone {
            name: name.to_owned(),
            parent,
            inverse_bind_matrix: Matrix4::identity(),
            local_bind_matrix: Matrix4::identity(),
        }
    }

    #[test]
    fn skeleton_palette_identity_pose() {
        let skeleton = Skeleton::new(vec![bone("root", None), bone("child", Some(0))]);
        let palette =
            skeleton.evaluate_palette(&[Matrix4::identity(), Matrix4::identity()]);
        assert_eq!(palette.len(), 2);
        assert_eq!(palette[0], Matrix4::identity());
        assert_eq!(palette[1], Matrix4::identity());
    }

    #[test]
    fn skeleton_palette_chains_parents() {
        let skeleton = Skeleton::new(vec![bone("root", None), bone("child", Some(0))]);
        let offset = Matrix4::new_translation(&Vector3::new(1.0, 0.0, 0.0));
        let palette = skeleton.evaluate_palette(&[offset, Matrix4::identity()]);
        // The child inherits the root offset.
        assert_eq!(palette[1], offset);
    }

    #[test]
    fn skeleton_rotated_root_moves_only_its_vertices() {
        let skeleton = Skeleton::new(vec![bone("a", None), bone("b", None)]);
        let rotation = Matrix4::from_euler_angles(0.0, std::f32::consts::FRAC_PI_2, 0.0);
        let palette = skeleton.evaluate_palette(&[rotation, Matrix4::identity()]);
        assert_ne!(palette[0], Matrix4::identity());
        assert_eq!(palette[1], Matrix4::identity());
    }
}
