use std::array;

use glam::Mat4;

/// glTF loading with the `gltf` crate.
pub mod gltf;

pub(crate) mod texture;

pub use texture::ImageTextureResolver;

#[inline]
pub(crate) fn pad_color_vec3_to_vec4(color: [f32; 3]) -> [f32; 4] {
    [color[0], color[1], color[2], 1.0]
}

#[inline]
fn chunk_array<T: Copy, const N: usize>(data: &[T]) -> Vec<[T; N]> {
    data.chunks_exact(N)
        .map(|item| array::from_fn(|index| item[index]))
        .collect()
}

#[inline]
pub(crate) fn chunk_vec2<T: Copy>(data: &[T]) -> Vec<[T; 2]> {
    chunk_array(data)
}

#[inline]
pub(crate) fn chunk_vec3<T: Copy>(data: &[T]) -> Vec<[T; 3]> {
    chunk_array(data)
}

#[inline]
pub(crate) fn chunk_vec4<T: Copy>(data: &[T]) -> Vec<[T; 4]> {
    chunk_array(data)
}

#[inline]
pub(crate) fn chunk_mat4(data: &[f32]) -> Vec<Mat4> {
    data.chunks_exact(16).map(Mat4::from_cols_slice).collect()
}

/// Options for a single model load.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Run the consistency pass after the scene is built. Any failure there
    /// fails the whole load.
    pub validate_on_load: bool,
    /// Index of the skin whose joints become the model's bones.
    pub active_skin: usize,
    /// Upper bound on the vertex count summed over all meshes.
    pub max_vertex_count: usize,
    /// Upper bound on the triangle count summed over all meshes.
    pub max_triangle_count: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            validate_on_load: true,
            active_skin: 0,
            max_vertex_count: 1_000_000,
            max_triangle_count: 2_000_000,
        }
    }
}
