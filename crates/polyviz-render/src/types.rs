//! Element and uniform types understood by the render engines.

use std::fmt::Debug;

use glam::{Mat4, Vec2, Vec3, Vec4};

/// Type tag for attribute elements and uniforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderDataType {
    Float,
    Int,
    UInt,
    Vector2Float,
    Vector3Float,
    Vector4Float,
    Matrix44Float,
}

impl RenderDataType {
    /// Tightly packed host size in bytes.
    pub fn host_size(self) -> usize {
        match self {
            Self::Float | Self::Int | Self::UInt => 4,
            Self::Vector2Float => 8,
            Self::Vector3Float => 12,
            Self::Vector4Float => 16,
            Self::Matrix44Float => 64,
        }
    }

    /// Alignment inside a WGSL uniform struct.
    pub fn uniform_align(self) -> usize {
        match self {
            Self::Float | Self::Int | Self::UInt => 4,
            Self::Vector2Float => 8,
            Self::Vector3Float | Self::Vector4Float | Self::Matrix44Float => 16,
        }
    }

    /// Stride of one element inside a WGSL storage array.
    ///
    /// Three-component vectors are stored as `vec4` so that the array stride is 16.
    pub fn storage_stride(self) -> usize {
        match self {
            Self::Vector3Float => 16,
            other => other.host_size(),
        }
    }

    /// WGSL type of a uniform struct member.
    pub fn wgsl_uniform_type(self) -> &'static str {
        match self {
            Self::Float => "f32",
            Self::Int => "i32",
            Self::UInt => "u32",
            Self::Vector2Float => "vec2<f32>",
            Self::Vector3Float => "vec3<f32>",
            Self::Vector4Float => "vec4<f32>",
            Self::Matrix44Float => "mat4x4<f32>",
        }
    }

    /// WGSL element type of a storage array.
    pub fn wgsl_storage_type(self) -> &'static str {
        match self {
            Self::Vector3Float => "vec4<f32>",
            other => other.wgsl_uniform_type(),
        }
    }
}

/// A value that can live in a managed attribute buffer.
pub trait BufferElement: bytemuck::Pod + PartialEq + Debug + Send + Sync + 'static {
    const DATA_TYPE: RenderDataType;
}

impl BufferElement for f32 {
    const DATA_TYPE: RenderDataType = RenderDataType::Float;
}

impl BufferElement for i32 {
    const DATA_TYPE: RenderDataType = RenderDataType::Int;
}

impl BufferElement for u32 {
    const DATA_TYPE: RenderDataType = RenderDataType::UInt;
}

impl BufferElement for Vec2 {
    const DATA_TYPE: RenderDataType = RenderDataType::Vector2Float;
}

impl BufferElement for Vec3 {
    const DATA_TYPE: RenderDataType = RenderDataType::Vector3Float;
}

impl BufferElement for Vec4 {
    const DATA_TYPE: RenderDataType = RenderDataType::Vector4Float;
}

/// A value bound to a program uniform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    UInt(u32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
}

impl UniformValue {
    pub fn data_type(&self) -> RenderDataType {
        match self {
            Self::Float(_) => RenderDataType::Float,
            Self::Int(_) => RenderDataType::Int,
            Self::UInt(_) => RenderDataType::UInt,
            Self::Vec2(_) => RenderDataType::Vector2Float,
            Self::Vec3(_) => RenderDataType::Vector3Float,
            Self::Vec4(_) => RenderDataType::Vector4Float,
            Self::Mat4(_) => RenderDataType::Matrix44Float,
        }
    }

    /// Raw little-endian bytes, `data_type().host_size()` long.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Float(v) => bytemuck::bytes_of(v).to_vec(),
            Self::Int(v) => bytemuck::bytes_of(v).to_vec(),
            Self::UInt(v) => bytemuck::bytes_of(v).to_vec(),
            Self::Vec2(v) => bytemuck::bytes_of(v).to_vec(),
            Self::Vec3(v) => bytemuck::bytes_of(v).to_vec(),
            Self::Vec4(v) => bytemuck::bytes_of(v).to_vec(),
            Self::Mat4(v) => bytemuck::bytes_of(v).to_vec(),
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vec3(&self) -> Option<Vec3> {
        match self {
            Self::Vec3(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_mat4(&self) -> Option<Mat4> {
        match self {
            Self::Mat4(v) => Some(*v),
            _ => None,
        }
    }
}

macro_rules! impl_uniform_from {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for UniformValue {
            fn from(v: $ty) -> Self {
                Self::$variant(v)
            }
        }
    };
}

impl_uniform_from!(f32, Float);
impl_uniform_from!(i32, Int);
impl_uniform_from!(u32, UInt);
impl_uniform_from!(Vec2, Vec2);
impl_uniform_from!(Vec3, Vec3);
impl_uniform_from!(Vec4, Vec4);
impl_uniform_from!(Mat4, Mat4);

/// Host-side RGBA texel data for a 2D texture.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    /// Row-major texels, `width * height` long.
    pub texels: Vec<Vec4>,
}

impl TextureData {
    pub fn new(width: u32, height: u32, texels: Vec<Vec4>) -> Self {
        debug_assert_eq!(texels.len(), (width * height) as usize);
        Self {
            width,
            height,
            texels,
        }
    }

    /// Texel at integer coordinates.
    pub fn texel(&self, x: u32, y: u32) -> Vec4 {
        self.texels[(y * self.width + x) as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_storage_is_padded() {
        assert_eq!(RenderDataType::Vector3Float.host_size(), 12);
        assert_eq!(RenderDataType::Vector3Float.storage_stride(), 16);
        assert_eq!(RenderDataType::Vector3Float.wgsl_storage_type(), "vec4<f32>");
        assert_eq!(RenderDataType::Float.storage_stride(), 4);
    }

    #[test]
    fn test_uniform_value_bytes() {
        let v = UniformValue::from(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(v.data_type(), RenderDataType::Vector3Float);
        assert_eq!(v.to_bytes().len(), 12);
        assert_eq!(UniformValue::from(Mat4::IDENTITY).to_bytes().len(), 64);
        assert_eq!(UniformValue::from(2.5_f32).as_float(), Some(2.5));
    }
}
