use crate::{
    animation::Animation, material::PbrMaterialProperties, mesh::GltfMesh, node::SceneNode,
    skin::Skin,
};

/// Everything decoded from one document.
#[derive(Debug, Clone, Default)]
pub struct GltfScene {
    pub nodes: Vec<SceneNode>,
    /// Nodes without a parent, in index order.
    pub roots: Vec<usize>,
    /// One entry per primitive.
    pub meshes: Vec<GltfMesh>,
    pub materials: Vec<PbrMaterialProperties>,
    pub skins: Vec<Skin>,
    pub animations: Vec<Animation>,
}

impl GltfScene {
    pub fn find_node(&self, name: &str) -> Option<usize> {
        self.nodes
            .iter()
            .position(|node| node.name.as_deref() == Some(name))
    }

    /// Meshes decoded from the primitives of the node's mesh.
    pub fn node_meshes(&self, node: usize) -> impl Iterator<Item = &GltfMesh> {
        let source = self.nodes.get(node).and_then(|node| node.mesh);
        self.meshes
            .iter()
            .filter(move |mesh| Some(mesh.source_mesh) == source)
    }

    pub fn find_animation(&self, name: &str) -> Option<usize> {
        self.animations
            .iter()
            .position(|animation| animation.name.as_deref() == Some(name))
    }

    pub fn vertex_count(&self) -> usize {
        self.meshes.iter().map(GltfMesh::vertex_count).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(GltfMesh::triangle_count).sum()
    }

    /// Bytes held by vertex and index arrays.
    pub fn memory_usage(&self) -> usize {
        self.meshes.iter().map(GltfMesh::memory_usage).sum()
    }
}

#[cfg(test)]
mod test {
    use super::GltfScene;
    use crate::{
        mesh::{GltfMesh, Vertex},
        node::SceneNode,
    };

    fn mesh(source_mesh: usize, vertices: usize) -> GltfMesh {
        GltfMesh {
            name: None,
            source_mesh,
            vertices: vec![Vertex::default(); vertices],
            indices: (0..vertices as u32).collect(),
            material: Default::default(),
            material_index: None,
        }
    }

    #[test]
    fn queries() {
        let scene = GltfScene {
            nodes: vec![
                SceneNode {
                    name: Some("body".to_string()),
                    mesh: Some(1),
                    ..Default::default()
                },
                SceneNode::default(),
            ],
            roots: vec![0, 1],
            meshes: vec![mesh(0, 3), mesh(1, 6), mesh(1, 3)],
            ..Default::default()
        };
        assert_eq!(scene.find_node("body"), Some(0));
        assert_eq!(scene.find_node("head"), None);
        assert_eq!(scene.node_meshes(0).count(), 2);
        assert_eq!(scene.node_meshes(1).count(), 0);
        assert_eq!(scene.vertex_count(), 12);
        assert_eq!(scene.triangle_count(), 4);
        assert_eq!(
            scene.memory_usage(),
            12 * std::mem::size_of::<Vertex>() + 12 * std::mem::size_of::<u32>()
        );
    }
}
