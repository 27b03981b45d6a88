use crate::material::PbrMaterialProperties;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub tangent: [f32; 4],
    pub color: [f32; 4],
    pub joints: [u8; 4],
    pub weights: [f32; 4],
}

impl Default for Vertex {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            normal: [0.0; 3],
            uv: [0.0; 2],
            tangent: [0.0; 4],
            color: [1.0; 4],
            joints: [0; 4],
            weights: [0.0; 4],
        }
    }
}

/// One primitive of a source mesh, flattened into a triangle list.
#[derive(Debug, Clone, PartialEq)]
pub struct GltfMesh {
    pub name: Option<String>,
    /// Index of the mesh this primitive came from.
    pub source_mesh: usize,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub material: PbrMaterialProperties,
    pub material_index: Option<usize>,
}

impl GltfMesh {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn memory_usage(&self) -> usize {
        self.vertices.len() * std::mem::size_of::<Vertex>()
            + self.indices.len() * std::mem::size_of::<u32>()
    }
}
