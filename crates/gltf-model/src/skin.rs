use std::collections::BTreeMap;

use glam::Mat4;
use gltf::json;
use log::warn;

use crate::{
    accessor::AccessorReader,
    diagnostics::Diagnostics,
    error::ErrorKind,
    node::{SceneNode, Transform},
};

#[derive(Debug, Clone, PartialEq)]
pub struct Skin {
    pub name: Option<String>,
    /// Node index of each joint. The position in this list is the bone index;
    /// a joint naming an unknown node keeps its slot as `None`.
    pub joints: Vec<Option<usize>>,
    /// Parallel to `joints`. May be shorter, or empty when the source has no
    /// inverse bind matrices.
    pub inverse_bind_matrices: Vec<Mat4>,
    pub skeleton: Option<usize>,
}

pub fn load_skins<D: Diagnostics>(
    root: &json::Root,
    reader: &AccessorReader,
    node_count: usize,
    diagnostics: &mut D,
) -> Vec<Skin> {
    root.skins
        .iter()
        .enumerate()
        .map(|(index, skin)| {
            let joints = skin
                .joints
                .iter()
                .map(|joint| {
                    let joint = joint.value();
                    if joint < node_count {
                        Some(joint)
                    } else {
                        warn!("Skin #{} has unknown joint node #{}", index, joint);
                        None
                    }
                })
                .collect();

            let inverse_bind_matrices = match skin.inverse_bind_matrices {
                Some(accessor) => match reader.read_mat4(accessor.value()) {
                    Ok(matrices) => matrices,
                    Err(error) => {
                        let message = format!(
                            "Failed to read inverse bind matrices of skin #{}: {}",
                            index, error
                        );
                        warn!("{}", message);
                        diagnostics.resource_failed(ErrorKind::CorruptedBuffer, &message);
                        Vec::new()
                    }
                },
                None => Vec::new(),
            };

            let skeleton = skin
                .skeleton
                .map(|skeleton| skeleton.value())
                .filter(|skeleton| *skeleton < node_count);

            Skin {
                name: skin.name.clone(),
                joints,
                inverse_bind_matrices,
                skeleton,
            }
        })
        .collect()
}

/// Bones of the active skin and their GPU-ready matrices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoneSet {
    joints: Vec<Option<usize>>,
    names: Vec<String>,
    base_pose: Vec<Transform>,
    inverse_bind_matrices: Vec<Option<Mat4>>,
    matrices: Vec<Mat4>,
    // Node index to bone index
    node_bones: BTreeMap<usize, usize>,
}

impl BoneSet {
    /// Mark the skin's joints as bones and compute their bind-pose matrices.
    ///
    /// Global matrices of `nodes` must be up to date. A joint without a node
    /// becomes an unnamed bone with an identity matrix.
    pub fn build(skin: &Skin, nodes: &mut [SceneNode]) -> Self {
        let mut bones = BoneSet::default();
        for (bone, joint) in skin.joints.iter().copied().enumerate() {
            let inverse_bind = skin.inverse_bind_matrices.get(bone).copied();
            let joint_node = joint.and_then(|joint| nodes.get_mut(joint).map(|node| (joint, node)));
            let Some((joint, node)) = joint_node else {
                bones.joints.push(None);
                bones.names.push(String::new());
                bones.base_pose.push(Transform::IDENTITY);
                bones.inverse_bind_matrices.push(inverse_bind);
                bones.matrices.push(Mat4::IDENTITY);
                continue;
            };
            node.is_bone = true;
            if node.bone_index.is_none() {
                node.bone_index = Some(bone);
            }
            bones.node_bones.entry(joint).or_insert(bone);

            bones.joints.push(Some(joint));
            bones.names.push(node.name.clone().unwrap_or_default());
            bones.base_pose.push(node.transform);
            bones.inverse_bind_matrices.push(inverse_bind);
            bones.matrices.push(match inverse_bind {
                Some(inverse_bind) => node.global_matrix * inverse_bind,
                None => node.global_matrix,
            });
        }
        bones
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    pub fn joints(&self) -> &[Option<usize>] {
        &self.joints
    }

    pub fn name(&self, bone: usize) -> Option<&str> {
        self.names.get(bone).map(String::as_str)
    }

    /// Case-insensitive lookup of a bone by its node name.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.names
            .iter()
            .position(|bone| bone.eq_ignore_ascii_case(name))
    }

    pub fn bone_of_node(&self, node: usize) -> Option<usize> {
        self.node_bones.get(&node).copied()
    }

    pub fn base_pose(&self) -> &[Transform] {
        &self.base_pose
    }

    pub fn matrices(&self) -> &[Mat4] {
        &self.matrices
    }

    pub fn matrix(&self, bone: usize) -> Option<Mat4> {
        self.matrices.get(bone).copied()
    }

    /// Recompute bone matrices with the local transforms of the bones
    /// replaced by `pose`. Non-bone nodes keep their static local matrices.
    pub fn apply_pose(&mut self, nodes: &[SceneNode], pose: &[Transform]) -> &[Mat4] {
        let local = |node: usize| -> Mat4 {
            match self.node_bones.get(&node).and_then(|bone| pose.get(*bone)) {
                Some(transform) => transform.matrix(),
                None => nodes[node].local_matrix,
            }
        };

        let mut globals: Vec<Option<Mat4>> = vec![None; nodes.len()];
        let mut chain = Vec::new();
        let mut matrices = Vec::with_capacity(self.joints.len());
        for (bone, joint) in self.joints.iter().copied().enumerate() {
            let Some(joint) = joint else {
                matrices.push(Mat4::IDENTITY);
                continue;
            };
            chain.clear();
            let mut current = Some(joint);
            let mut global = Mat4::IDENTITY;
            while let Some(node) = current {
                if let Some(cached) = globals[node] {
                    global = cached;
                    break;
                }
                chain.push(node);
                current = nodes[node].parent;
            }
            for node in chain.iter().rev().copied() {
                global *= local(node);
                globals[node] = Some(global);
            }

            matrices.push(match self.inverse_bind_matrices[bone] {
                Some(inverse_bind) => global * inverse_bind,
                None => global,
            });
        }
        self.matrices = matrices;
        &self.matrices
    }
}

#[cfg(test)]
mod test {
    use glam::{Mat4, Quat, Vec3};

    use gltf::json;

    use super::{load_skins, BoneSet, Skin};
    use crate::{
        accessor::AccessorReader,
        diagnostics::NoopDiagnostics,
        node::{compute_transforms, find_roots, SceneNode, Transform},
    };

    fn chain() -> Vec<SceneNode> {
        let mut nodes = vec![
            SceneNode {
                name: Some("Hips".to_string()),
                children: vec![1],
                transform: Transform {
                    translation: Vec3::new(0.0, 1.0, 0.0),
                    ..Transform::IDENTITY
                },
                ..Default::default()
            },
            SceneNode {
                name: Some("Spine".to_string()),
                parent: Some(0),
                transform: Transform {
                    translation: Vec3::new(0.0, 0.5, 0.0),
                    rotation: Quat::from_rotation_z(0.3),
                    ..Transform::IDENTITY
                },
                ..Default::default()
            },
        ];
        let roots = find_roots(&nodes);
        compute_transforms(&mut nodes, &roots);
        nodes
    }

    #[test]
    fn identity_inverse_bind_yields_global() {
        let mut nodes = chain();
        let skin = Skin {
            name: None,
            joints: vec![Some(0), Some(1)],
            inverse_bind_matrices: vec![Mat4::IDENTITY, Mat4::IDENTITY],
            skeleton: None,
        };
        let bones = BoneSet::build(&skin, &mut nodes);
        assert_eq!(bones.len(), 2);
        assert_eq!(bones.matrix(1), Some(nodes[1].global_matrix));
        assert!(nodes[1].is_bone);
        assert_eq!(nodes[1].bone_index, Some(1));
    }

    #[test]
    fn missing_inverse_bind_uses_global() {
        let mut nodes = chain();
        let inverse = nodes[0].global_matrix.inverse();
        let skin = Skin {
            name: None,
            joints: vec![Some(0), Some(1)],
            inverse_bind_matrices: vec![inverse],
            skeleton: None,
        };
        let bones = BoneSet::build(&skin, &mut nodes);
        assert!(bones.matrix(0).unwrap().abs_diff_eq(Mat4::IDENTITY, 1e-6));
        assert_eq!(bones.matrix(1), Some(nodes[1].global_matrix));
    }

    #[test]
    fn find_is_case_insensitive() {
        let mut nodes = chain();
        let skin = Skin {
            name: None,
            joints: vec![Some(1), Some(0)],
            inverse_bind_matrices: Vec::new(),
            skeleton: None,
        };
        let bones = BoneSet::build(&skin, &mut nodes);
        assert_eq!(bones.find("hips"), Some(1));
        assert_eq!(bones.name(0), Some("Spine"));
        assert_eq!(bones.bone_of_node(0), Some(1));
        assert_eq!(bones.find("head"), None);
    }

    #[test]
    fn rest_pose_matches_bind_matrices() {
        let mut nodes = chain();
        let skin = Skin {
            name: None,
            joints: vec![Some(0), Some(1)],
            inverse_bind_matrices: vec![Mat4::IDENTITY, Mat4::IDENTITY],
            skeleton: None,
        };
        let mut bones = BoneSet::build(&skin, &mut nodes);
        let bind = bones.matrices().to_vec();
        let pose = bones.base_pose().to_vec();
        assert_eq!(bones.apply_pose(&nodes, &pose), bind.as_slice());
    }

    #[test]
    fn posed_parent_moves_child() {
        let mut nodes = chain();
        let skin = Skin {
            name: None,
            joints: vec![Some(0), Some(1)],
            inverse_bind_matrices: Vec::new(),
            skeleton: None,
        };
        let mut bones = BoneSet::build(&skin, &mut nodes);
        let mut pose = bones.base_pose().to_vec();
        pose[0].translation = Vec3::new(0.0, 2.0, 0.0);
        let matrices = bones.apply_pose(&nodes, &pose);
        let spine = matrices[1].transform_point3(Vec3::ZERO);
        assert!(spine.abs_diff_eq(Vec3::new(0.0, 2.5, 0.0), 1e-6));
    }

    #[test]
    fn unknown_joint_keeps_its_bone_slot() {
        let mut nodes = chain();
        let skin = Skin {
            name: None,
            joints: vec![Some(0), None, Some(1)],
            inverse_bind_matrices: vec![
                Mat4::from_translation(Vec3::X),
                Mat4::from_translation(Vec3::X * 2.0),
                Mat4::from_translation(Vec3::X * 3.0),
            ],
            skeleton: None,
        };
        let mut bones = BoneSet::build(&skin, &mut nodes);
        assert_eq!(bones.len(), 3);
        assert_eq!(bones.joints(), &[Some(0), None, Some(1)]);
        assert_eq!(bones.bone_of_node(1), Some(2));
        assert_eq!(nodes[1].bone_index, Some(2));
        assert_eq!(bones.find("spine"), Some(2));
        assert_eq!(
            bones.matrix(2),
            Some(nodes[1].global_matrix * Mat4::from_translation(Vec3::X * 3.0))
        );
        assert_eq!(bones.matrix(1), Some(Mat4::IDENTITY));

        let pose = bones.base_pose().to_vec();
        let matrices = bones.apply_pose(&nodes, &pose).to_vec();
        assert_eq!(matrices[1], Mat4::IDENTITY);
        assert!(matrices[2].abs_diff_eq(
            nodes[1].global_matrix * Mat4::from_translation(Vec3::X * 3.0),
            1e-6
        ));
    }

    #[test]
    fn unknown_joint_does_not_shift_later_bones() {
        let root: json::Root = serde_json::from_value(serde_json::json!({
            "asset": { "version": "2.0" },
            "nodes": [{}, {}],
            "skins": [{ "joints": [0, 99, 1], "inverseBindMatrices": 0 }],
            "accessors": [
                { "bufferView": 0, "componentType": 5126, "count": 3, "type": "MAT4" }
            ],
            "bufferViews": [{ "buffer": 0, "byteLength": 192 }],
            "buffers": [{ "byteLength": 192 }],
        }))
        .unwrap();
        let buffer: Vec<u8> = [1.0, 2.0, 3.0]
            .into_iter()
            .flat_map(|x| Mat4::from_translation(Vec3::new(x, 0.0, 0.0)).to_cols_array())
            .flat_map(f32::to_le_bytes)
            .collect();
        let buffers = vec![buffer];
        let reader = AccessorReader::new(&root, &buffers);

        let skins = load_skins(&root, &reader, 2, &mut NoopDiagnostics);
        assert_eq!(skins[0].joints, vec![Some(0), None, Some(1)]);
        assert_eq!(skins[0].inverse_bind_matrices.len(), 3);
        assert_eq!(skins[0].inverse_bind_matrices[2].w_axis.x, 3.0);
    }
}
