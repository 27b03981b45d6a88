use glam::{Mat4, Quat};
use gltf::json::{
    self,
    accessor::{ComponentType, GenericComponentType, Type},
    validation::Checked,
};

use crate::{
    error::LoadError,
    loader::{chunk_mat4, chunk_vec2, chunk_vec3, chunk_vec4, pad_color_vec3_to_vec4},
};

#[inline]
pub fn component_size(component_type: ComponentType) -> usize {
    match component_type {
        ComponentType::I8 | ComponentType::U8 => 1,
        ComponentType::I16 | ComponentType::U16 => 2,
        ComponentType::U32 | ComponentType::F32 => 4,
    }
}

#[inline]
pub fn component_count(dimensions: Type) -> usize {
    match dimensions {
        Type::Scalar => 1,
        Type::Vec2 => 2,
        Type::Vec3 => 3,
        Type::Vec4 => 4,
        Type::Mat2 => 4,
        Type::Mat3 => 9,
        Type::Mat4 => 16,
    }
}

/// Densely packed bytes of one accessor.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAccessor {
    pub data: Vec<u8>,
    pub count: usize,
    /// Size of one element in `data`.
    pub stride: usize,
    pub component_type: ComponentType,
    pub dimensions: Type,
}

impl RawAccessor {
    fn check_type(
        &self,
        index: usize,
        component_types: &[ComponentType],
        dimensions: &[Type],
    ) -> Result<(), LoadError> {
        if !component_types.contains(&self.component_type) {
            return Err(LoadError::validation(format!(
                "Accessor #{} has component type {:?}, expected one of {:?}",
                index, self.component_type, component_types
            )));
        }
        if !dimensions.contains(&self.dimensions) {
            return Err(LoadError::validation(format!(
                "Accessor #{} has type {:?}, expected one of {:?}",
                index, self.dimensions, dimensions
            )));
        }
        Ok(())
    }

    fn decode<T, const N: usize>(&self, convert: fn([u8; N]) -> T) -> Vec<T> {
        self.data
            .chunks_exact(N)
            .map(|chunk| convert(std::array::from_fn(|index| chunk[index])))
            .collect()
    }

    fn to_f32(&self) -> Vec<f32> {
        self.decode(f32::from_le_bytes)
    }

    /// Components as floats, mapping normalized integers into `[0, 1]` or
    /// `[-1, 1]`.
    fn to_normalized_f32(&self) -> Vec<f32> {
        match self.component_type {
            ComponentType::F32 => self.to_f32(),
            ComponentType::U8 => self
                .decode(u8::from_le_bytes)
                .into_iter()
                .map(|item| item as f32 / u8::MAX as f32)
                .collect(),
            ComponentType::U16 => self
                .decode(u16::from_le_bytes)
                .into_iter()
                .map(|item| item as f32 / u16::MAX as f32)
                .collect(),
            ComponentType::I8 => self
                .decode(i8::from_le_bytes)
                .into_iter()
                .map(|item| (item as f32 / i8::MAX as f32).max(-1.0))
                .collect(),
            ComponentType::I16 => self
                .decode(i16::from_le_bytes)
                .into_iter()
                .map(|item| (item as f32 / i16::MAX as f32).max(-1.0))
                .collect(),
            ComponentType::U32 => self
                .decode(u32::from_le_bytes)
                .into_iter()
                .map(|item| item as f32 / u32::MAX as f32)
                .collect(),
        }
    }

    fn to_u32(&self) -> Vec<u32> {
        match self.component_type {
            ComponentType::U8 | ComponentType::I8 => {
                self.data.iter().map(|item| *item as u32).collect()
            }
            ComponentType::U16 | ComponentType::I16 => self
                .decode(u16::from_le_bytes)
                .into_iter()
                .map(u32::from)
                .collect(),
            ComponentType::U32 | ComponentType::F32 => self.decode(u32::from_le_bytes),
        }
    }
}

struct Region<'a> {
    source: &'a [u8],
    count: usize,
    stride: usize,
    view_stride: usize,
    component_type: ComponentType,
    dimensions: Type,
}

/// Reads accessors of a document against its resolved buffers.
///
/// Every read is bounds checked against both the buffer view and the owning
/// buffer, so a malformed document yields an error instead of a panic.
#[derive(Debug, Clone, Copy)]
pub struct AccessorReader<'a> {
    root: &'a json::Root,
    buffers: &'a [Vec<u8>],
}

impl<'a> AccessorReader<'a> {
    pub fn new(root: &'a json::Root, buffers: &'a [Vec<u8>]) -> Self {
        Self { root, buffers }
    }

    pub fn len(&self) -> usize {
        self.root.accessors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root.accessors.is_empty()
    }

    /// Resolve the bytes an accessor covers, checking every bound.
    fn locate(&self, index: usize) -> Result<Region<'a>, LoadError> {
        let accessor = self.root.accessors.get(index).ok_or_else(|| {
            LoadError::corrupted_buffer(format!(
                "Accessor #{} out of range ({} accessors)",
                index,
                self.root.accessors.len()
            ))
        })?;

        let component_type = match accessor.component_type {
            Checked::Valid(GenericComponentType(component_type)) => component_type,
            Checked::Invalid => {
                return Err(LoadError::corrupted_buffer(format!(
                    "Accessor #{} has an unknown component type",
                    index
                )))
            }
        };
        let dimensions = match accessor.type_ {
            Checked::Valid(dimensions) => dimensions,
            Checked::Invalid => {
                return Err(LoadError::corrupted_buffer(format!(
                    "Accessor #{} has an unknown type",
                    index
                )))
            }
        };

        let view_index = accessor.buffer_view.ok_or_else(|| {
            LoadError::corrupted_buffer(format!("Accessor #{} has no buffer view", index))
        })?;
        let view = self
            .root
            .buffer_views
            .get(view_index.value())
            .ok_or_else(|| {
                LoadError::corrupted_buffer(format!(
                    "Accessor #{} refers to unknown buffer view #{}",
                    index,
                    view_index.value()
                ))
            })?;
        let buffer = self.buffers.get(view.buffer.value()).ok_or_else(|| {
            LoadError::corrupted_buffer(format!(
                "Buffer view #{} refers to unknown buffer #{}",
                view_index.value(),
                view.buffer.value()
            ))
        })?;

        let too_large = || LoadError::corrupted_buffer(format!("Accessor #{} is too large", index));
        let count = usize::try_from(accessor.count.0).map_err(|_| too_large())?;
        let accessor_offset = accessor
            .byte_offset
            .map(|offset| usize::try_from(offset.0))
            .transpose()
            .map_err(|_| too_large())?
            .unwrap_or(0);
        let view_offset = view
            .byte_offset
            .map(|offset| usize::try_from(offset.0))
            .transpose()
            .map_err(|_| too_large())?
            .unwrap_or(0);
        let view_length = usize::try_from(view.byte_length.0).map_err(|_| too_large())?;

        let stride = component_size(component_type) * component_count(dimensions);
        let view_stride = view.byte_stride.map(|stride| stride.0).unwrap_or(stride);
        if view_stride < stride {
            return Err(LoadError::corrupted_buffer(format!(
                "Buffer view #{} has stride {} below the element size {} of accessor #{}",
                view_index.value(),
                view_stride,
                stride,
                index
            )));
        }

        let region = match count {
            0 => 0,
            count => (count - 1)
                .checked_mul(view_stride)
                .and_then(|length| length.checked_add(stride))
                .ok_or_else(too_large)?,
        };
        let region_end = accessor_offset.checked_add(region).ok_or_else(too_large)?;
        if region_end > view_length {
            return Err(LoadError::corrupted_buffer(format!(
                "Accessor #{} reads {} bytes past the end of buffer view #{}",
                index,
                region_end - view_length,
                view_index.value()
            ))
            .with_offset(accessor_offset));
        }
        let start = view_offset.checked_add(accessor_offset).ok_or_else(too_large)?;
        let end = start.checked_add(region).ok_or_else(too_large)?;
        let source = buffer.get(start..end).ok_or_else(|| {
            LoadError::corrupted_buffer(format!(
                "Accessor #{} reads bytes {}..{} of buffer #{} with {} bytes",
                index,
                start,
                end,
                view.buffer.value(),
                buffer.len()
            ))
            .with_offset(start)
        })?;

        Ok(Region {
            source,
            count,
            stride,
            view_stride,
            component_type,
            dimensions,
        })
    }

    /// Check that the accessor exists and lies inside its view and buffer.
    pub fn check(&self, index: usize) -> Result<(), LoadError> {
        self.locate(index).map(|_| ())
    }

    /// Copy the accessor's elements into a packed array, de-interleaving when
    /// the view has a larger stride than the element size.
    pub fn read(&self, index: usize) -> Result<RawAccessor, LoadError> {
        let Region {
            source,
            count,
            stride,
            view_stride,
            component_type,
            dimensions,
        } = self.locate(index)?;

        let data = if view_stride == stride {
            source.to_vec()
        } else {
            let mut data = Vec::with_capacity(count * stride);
            for element in 0..count {
                let offset = element * view_stride;
                data.extend_from_slice(&source[offset..offset + stride]);
            }
            data
        };

        Ok(RawAccessor {
            data,
            count,
            stride,
            component_type,
            dimensions,
        })
    }

    fn read_checked(
        &self,
        index: usize,
        component_types: &[ComponentType],
        dimensions: &[Type],
    ) -> Result<RawAccessor, LoadError> {
        let raw = self.read(index)?;
        raw.check_type(index, component_types, dimensions)?;
        Ok(raw)
    }

    fn read_floats(&self, index: usize, dimensions: Type) -> Result<Vec<f32>, LoadError> {
        let raw = self.read_checked(index, &[ComponentType::F32], &[dimensions])?;
        Ok(raw.to_f32())
    }

    fn read_normalized(&self, index: usize, dimensions: &[Type]) -> Result<RawAccessor, LoadError> {
        self.read_checked(
            index,
            &[
                ComponentType::F32,
                ComponentType::U8,
                ComponentType::U16,
                ComponentType::I8,
                ComponentType::I16,
            ],
            dimensions,
        )
    }

    pub fn read_f32(&self, index: usize) -> Result<Vec<f32>, LoadError> {
        self.read_floats(index, Type::Scalar)
    }

    pub fn read_vec2(&self, index: usize) -> Result<Vec<[f32; 2]>, LoadError> {
        Ok(chunk_vec2(&self.read_floats(index, Type::Vec2)?))
    }

    pub fn read_vec3(&self, index: usize) -> Result<Vec<[f32; 3]>, LoadError> {
        Ok(chunk_vec3(&self.read_floats(index, Type::Vec3)?))
    }

    pub fn read_vec4(&self, index: usize) -> Result<Vec<[f32; 4]>, LoadError> {
        Ok(chunk_vec4(&self.read_floats(index, Type::Vec4)?))
    }

    /// Quaternions in `x, y, z, w` order. Normalized integer rotations are
    /// accepted as well.
    pub fn read_quat(&self, index: usize) -> Result<Vec<Quat>, LoadError> {
        let raw = self.read_normalized(index, &[Type::Vec4])?;
        Ok(chunk_vec4(&raw.to_normalized_f32())
            .into_iter()
            .map(Quat::from_array)
            .collect())
    }

    pub fn read_mat4(&self, index: usize) -> Result<Vec<Mat4>, LoadError> {
        Ok(chunk_mat4(&self.read_floats(index, Type::Mat4)?))
    }

    /// Texture coordinates, float or normalized unsigned integers.
    pub fn read_tex_coords(&self, index: usize) -> Result<Vec<[f32; 2]>, LoadError> {
        let raw = self.read_checked(
            index,
            &[ComponentType::F32, ComponentType::U8, ComponentType::U16],
            &[Type::Vec2],
        )?;
        Ok(chunk_vec2(&raw.to_normalized_f32()))
    }

    /// Vertex colors as RGBA clamped to `[0, 1]`. RGB colors get an opaque
    /// alpha.
    pub fn read_colors(&self, index: usize) -> Result<Vec<[f32; 4]>, LoadError> {
        let raw = self.read_checked(
            index,
            &[ComponentType::F32, ComponentType::U8, ComponentType::U16],
            &[Type::Vec3, Type::Vec4],
        )?;
        let data: Vec<f32> = raw
            .to_normalized_f32()
            .into_iter()
            .map(|item| item.clamp(0.0, 1.0))
            .collect();
        Ok(match raw.dimensions {
            Type::Vec3 => chunk_vec3(&data)
                .into_iter()
                .map(pad_color_vec3_to_vec4)
                .collect(),
            _ => chunk_vec4(&data),
        })
    }

    /// Skinning weights, float or normalized unsigned integers.
    pub fn read_weights(&self, index: usize) -> Result<Vec<[f32; 4]>, LoadError> {
        let raw = self.read_checked(
            index,
            &[ComponentType::F32, ComponentType::U8, ComponentType::U16],
            &[Type::Vec4],
        )?;
        Ok(chunk_vec4(&raw.to_normalized_f32()))
    }

    /// Indices widened to `u32`.
    pub fn read_indices(&self, index: usize) -> Result<Vec<u32>, LoadError> {
        let raw = self.read_checked(
            index,
            &[ComponentType::U8, ComponentType::U16, ComponentType::U32],
            &[Type::Scalar],
        )?;
        Ok(raw.to_u32())
    }

    /// Joint indices packed four to a `u32`, joint 0 in the lowest byte.
    ///
    /// Fails when a joint index does not fit in a byte.
    pub fn read_joints(&self, index: usize) -> Result<Vec<u32>, LoadError> {
        let raw = self.read_checked(
            index,
            &[ComponentType::U8, ComponentType::U16],
            &[Type::Vec4],
        )?;
        let joints = raw.to_u32();
        if let Some(joint) = joints.iter().find(|joint| **joint > u8::MAX as u32) {
            return Err(LoadError::validation(format!(
                "Accessor #{} has joint index {} above 255",
                index, joint
            )));
        }
        Ok(chunk_vec4(&joints)
            .into_iter()
            .map(|joint| u32::from_le_bytes(joint.map(|item| item as u8)))
            .collect())
    }
}
