use glam::{Mat4, Quat, Vec3};
use gltf::json;
use log::warn;

use crate::error::LoadError;

/// Translation, rotation and scale of a node relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    /// Split a matrix into translation, rotation and scale.
    pub fn from_matrix(matrix: Mat4) -> Self {
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        Self {
            translation,
            rotation,
            scale,
        }
    }

    /// `T * R * S`. Zero scale components count as one.
    pub fn matrix(&self) -> Mat4 {
        let scale = Vec3::select(self.scale.cmpeq(Vec3::ZERO), Vec3::ONE, self.scale);
        Mat4::from_scale_rotation_translation(scale, self.rotation, self.translation)
    }
}

impl From<Transform> for Mat4 {
    fn from(value: Transform) -> Self {
        value.matrix()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub name: Option<String>,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub transform: Transform,
    pub local_matrix: Mat4,
    pub global_matrix: Mat4,
    /// Index of the source mesh. Each of its primitives is a separate
    /// [`GltfMesh`](crate::mesh::GltfMesh).
    pub mesh: Option<usize>,
    pub skin: Option<usize>,
    pub is_bone: bool,
    pub bone_index: Option<usize>,
}

impl Default for SceneNode {
    fn default() -> Self {
        Self {
            name: None,
            parent: None,
            children: Vec::new(),
            transform: Transform::IDENTITY,
            local_matrix: Mat4::IDENTITY,
            global_matrix: Mat4::IDENTITY,
            mesh: None,
            skin: None,
            is_bone: false,
            bone_index: None,
        }
    }
}

fn node_transform(node: &json::Node) -> Transform {
    if let Some(matrix) = node.matrix {
        return Transform::from_matrix(Mat4::from_cols_array(&matrix));
    }
    Transform {
        translation: node.translation.map(Vec3::from_array).unwrap_or(Vec3::ZERO),
        rotation: node
            .rotation
            .map(|rotation| Quat::from_array(rotation.0))
            .unwrap_or(Quat::IDENTITY),
        scale: node.scale.map(Vec3::from_array).unwrap_or(Vec3::ONE),
    }
}

/// Build the node table in two passes: node data first, then parent and child
/// links.
///
/// References to meshes, skins or children that do not exist are dropped with
/// a warning. Every other child link is kept; a node listed by more than one
/// parent records the first one and is rejected by [`check_hierarchy`].
pub fn build_nodes(root: &json::Root) -> Vec<SceneNode> {
    let mut nodes: Vec<SceneNode> = root
        .nodes
        .iter()
        .enumerate()
        .map(|(index, node)| {
            let mesh = node.mesh.map(|mesh| mesh.value());
            let mesh = mesh.filter(|mesh| {
                let valid = *mesh < root.meshes.len();
                if !valid {
                    warn!("Node #{} refers to unknown mesh #{}", index, mesh);
                }
                valid
            });
            let skin = node.skin.map(|skin| skin.value());
            let skin = skin.filter(|skin| {
                let valid = *skin < root.skins.len();
                if !valid {
                    warn!("Node #{} refers to unknown skin #{}", index, skin);
                }
                valid
            });
            let transform = node_transform(node);
            SceneNode {
                name: node.name.clone(),
                transform,
                local_matrix: transform.matrix(),
                mesh,
                skin,
                ..Default::default()
            }
        })
        .collect();

    let node_count = nodes.len();
    for (index, node) in root.nodes.iter().enumerate() {
        for child in node.children.iter().flatten() {
            let child = child.value();
            if child >= node_count {
                warn!("Node #{} has unknown child #{}", index, child);
                continue;
            }
            if nodes[child].parent.is_none() {
                nodes[child].parent = Some(index);
            }
            nodes[index].children.push(child);
        }
    }

    nodes
}

/// Nodes without a parent, in index order.
pub fn find_roots(nodes: &[SceneNode]) -> Vec<usize> {
    nodes
        .iter()
        .enumerate()
        .filter(|(_, node)| node.parent.is_none())
        .map(|(index, _)| index)
        .collect()
}

/// Reject child links that do not form a forest: a node with more than one
/// parent, or any cycle.
///
/// Every node is used as a start point, so cycles unreachable from a root are
/// found as well.
pub fn check_hierarchy(nodes: &[SceneNode]) -> Result<(), LoadError> {
    let mut parents: Vec<Option<usize>> = vec![None; nodes.len()];
    for (index, node) in nodes.iter().enumerate() {
        for child in node.children.iter().copied() {
            let Some(parent) = parents.get_mut(child) else {
                continue;
            };
            if let Some(first) = *parent {
                return Err(LoadError::validation(format!(
                    "Node #{} is a child of both #{} and #{}",
                    child, first, index
                )));
            }
            *parent = Some(index);
        }
    }

    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mark {
        Unvisited,
        InPath,
        Done,
    }

    let mut marks = vec![Mark::Unvisited; nodes.len()];
    let mut stack: Vec<(usize, usize)> = Vec::new();
    for start in 0..nodes.len() {
        if marks[start] != Mark::Unvisited {
            continue;
        }
        marks[start] = Mark::InPath;
        stack.push((start, 0));
        while let Some((node, next_child)) = stack.last_mut() {
            let Some(child) = nodes[*node].children.get(*next_child).copied() else {
                marks[*node] = Mark::Done;
                stack.pop();
                continue;
            };
            *next_child += 1;
            let Some(mark) = marks.get(child).copied() else {
                continue;
            };
            match mark {
                Mark::InPath => {
                    return Err(LoadError::validation(format!(
                        "Node hierarchy has a cycle through node #{}",
                        child
                    )));
                }
                Mark::Done => {}
                Mark::Unvisited => {
                    marks[child] = Mark::InPath;
                    stack.push((child, 0));
                }
            }
        }
    }
    Ok(())
}

/// Recompute local matrices from each node's transform, then global matrices
/// parent before child, starting from `roots`.
///
/// The hierarchy must have passed [`check_hierarchy`].
pub fn compute_transforms(nodes: &mut [SceneNode], roots: &[usize]) {
    for node in nodes.iter_mut() {
        node.local_matrix = node.transform.matrix();
    }

    let mut stack: Vec<(usize, Mat4)> = roots
        .iter()
        .rev()
        .map(|root| (*root, Mat4::IDENTITY))
        .collect();
    while let Some((index, parent_global)) = stack.pop() {
        let Some(node) = nodes.get_mut(index) else {
            continue;
        };
        node.global_matrix = parent_global * node.local_matrix;
        let global = node.global_matrix;
        stack.extend(node.children.iter().rev().map(|child| (*child, global)));
    }
}

#[cfg(test)]
mod test {
    use glam::{Mat4, Quat, Vec3};
    use gltf::json;

    use super::{build_nodes, check_hierarchy, compute_transforms, find_roots, Transform};
    use crate::error::ErrorKind;

    fn root(nodes: serde_json::Value) -> json::Root {
        serde_json::from_value(serde_json::json!({
            "asset": { "version": "2.0" },
            "meshes": [{ "primitives": [] }],
            "nodes": nodes,
        }))
        .unwrap()
    }

    #[test]
    fn zero_scale_counts_as_one() {
        let transform = Transform {
            translation: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::IDENTITY,
            scale: Vec3::new(0.0, 2.0, 0.0),
        };
        let expected = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0))
            * Mat4::from_scale(Vec3::new(1.0, 2.0, 1.0));
        assert_eq!(transform.matrix(), expected);
    }

    #[test]
    fn matrix_is_fully_decomposed() {
        let rotation = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        let matrix = Mat4::from_scale_rotation_translation(
            Vec3::new(2.0, 2.0, 2.0),
            rotation,
            Vec3::new(4.0, 5.0, 6.0),
        );
        let root = root(serde_json::json!([{ "matrix": matrix.to_cols_array() }]));
        let nodes = build_nodes(&root);
        let transform = nodes[0].transform;
        assert!(transform.translation.abs_diff_eq(Vec3::new(4.0, 5.0, 6.0), 1e-5));
        assert!(transform.scale.abs_diff_eq(Vec3::splat(2.0), 1e-5));
        assert!(transform.rotation.dot(rotation).abs() > 1.0 - 1e-5);
    }

    #[test]
    fn links_and_roots() {
        let root = root(serde_json::json!([
            { "name": "hips", "children": [1, 2, 9] },
            { "name": "spine", "mesh": 0 },
            { "name": "leg", "mesh": 3, "skin": 0 },
            { "name": "prop" }
        ]));
        let nodes = build_nodes(&root);
        assert_eq!(nodes[0].children, vec![1, 2]);
        assert_eq!(nodes[1].parent, Some(0));
        assert_eq!(nodes[1].mesh, Some(0));
        assert_eq!(nodes[2].mesh, None);
        assert_eq!(nodes[2].skin, None);
        assert_eq!(find_roots(&nodes), vec![0, 3]);
    }

    #[test]
    fn cycle_is_rejected() {
        let root = root(serde_json::json!([
            { "children": [1] },
            { "children": [2] },
            { "children": [0] }
        ]));
        let nodes = build_nodes(&root);
        assert!(find_roots(&nodes).is_empty());
        let error = check_hierarchy(&nodes).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::ValidationFailure);
    }

    #[test]
    fn self_child_is_rejected() {
        let root = root(serde_json::json!([{ "children": [0] }]));
        let nodes = build_nodes(&root);
        assert!(check_hierarchy(&nodes).is_err());
    }

    #[test]
    fn shared_child_is_rejected() {
        let root = root(serde_json::json!([
            { "children": [2] },
            { "children": [2] },
            {}
        ]));
        let nodes = build_nodes(&root);
        assert_eq!(nodes[2].parent, Some(0));
        assert_eq!(nodes[1].children, vec![2]);
        let error = check_hierarchy(&nodes).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::ValidationFailure);
    }

    #[test]
    fn back_edge_below_root_is_kept() {
        let root = root(serde_json::json!([
            { "children": [1] },
            { "children": [2] },
            { "children": [1] }
        ]));
        let nodes = build_nodes(&root);
        assert_eq!(nodes[2].children, vec![1]);
        assert_eq!(find_roots(&nodes), vec![0]);
        let error = check_hierarchy(&nodes).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::ValidationFailure);
    }

    #[test]
    fn global_matrices_compose_and_are_idempotent() {
        let root = root(serde_json::json!([
            { "translation": [1.0, 0.0, 0.0], "children": [1] },
            { "translation": [0.0, 2.0, 0.0], "scale": [2.0, 2.0, 2.0], "children": [2] },
            { "translation": [0.0, 0.0, 3.0] }
        ]));
        let mut nodes = build_nodes(&root);
        let roots = find_roots(&nodes);
        check_hierarchy(&nodes).unwrap();

        compute_transforms(&mut nodes, &roots);
        let first: Vec<Mat4> = nodes.iter().map(|node| node.global_matrix).collect();
        assert_eq!(
            first[2].transform_point3(Vec3::ZERO),
            Vec3::new(1.0, 2.0, 6.0)
        );

        compute_transforms(&mut nodes, &roots);
        let second: Vec<Mat4> = nodes.iter().map(|node| node.global_matrix).collect();
        assert_eq!(first, second);
    }
}
