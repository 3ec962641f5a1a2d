// Copyright 2025 The DG Engine Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Shader handles and the runtime-typed uniform value.

use crate::math::{Color, Mat4, Vec2, Vec3, Vec4};
use std::fmt;

/// An opaque handle to a single compiled shader stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderId(pub usize);

/// An opaque handle to a linked shader program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub usize);

/// The location of a uniform inside a linked program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub u32);

/// A programmable pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// The per-vertex stage.
    Vertex,
    /// The per-fragment stage.
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// A uniform value of any supported shape.
///
/// Matrices are stored column-major.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Mat2([f32; 4]),
    Mat3([f32; 9]),
    Mat4([f32; 16]),
    Double(f64),
    DVec2([f64; 2]),
    DVec3([f64; 3]),
    DVec4([f64; 4]),
    DMat2([f64; 4]),
    DMat3([f64; 9]),
    DMat4([f64; 16]),
    Int(i32),
    IVec2([i32; 2]),
    IVec3([i32; 3]),
    IVec4([i32; 4]),
    UInt(u32),
    UVec2([u32; 2]),
    UVec3([u32; 3]),
    UVec4([u32; 4]),
    Bool(bool),
    BVec2([bool; 2]),
    BVec3([bool; 3]),
    BVec4([bool; 4]),
}

impl UniformValue {
    /// Returns the GLSL type name this value matches.
    pub const fn glsl_type(&self) -> &'static str {
        use UniformValue as U;
        match self {
            U::Float(_) => "float",
            U::Vec2(_) => "vec2",
            U::Vec3(_) => "vec3",
            U::Vec4(_) => "vec4",
            U::Mat2(_) => "mat2",
            U::Mat3(_) => "mat3",
            U::Mat4(_) => "mat4",
            U::Double(_) => "double",
            U::DVec2(_) => "dvec2",
            U::DVec3(_) => "dvec3",
            U::DVec4(_) => "dvec4",
            U::DMat2(_) => "dmat2",
            U::DMat3(_) => "dmat3",
            U::DMat4(_) => "dmat4",
            U::Int(_) => "int",
            U::IVec2(_) => "ivec2",
            U::IVec3(_) => "ivec3",
            U::IVec4(_) => "ivec4",
            U::UInt(_) => "uint",
            U::UVec2(_) => "uvec2",
            U::UVec3(_) => "uvec3",
            U::UVec4(_) => "uvec4",
            U::Bool(_) => "bool",
            U::BVec2(_) => "bvec2",
            U::BVec3(_) => "bvec3",
            U::BVec4(_) => "bvec4",
        }
    }
}

macro_rules! uniform_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for UniformValue {
                #[inline]
                fn from(v: $ty) -> Self {
                    UniformValue::$variant(v)
                }
            }
        )*
    };
}

uniform_from! {
    f32 => Float,
    [f32; 2] => Vec2,
    [f32; 3] => Vec3,
    [f32; 4] => Vec4,
    f64 => Double,
    [f64; 2] => DVec2,
    [f64; 3] => DVec3,
    [f64; 4] => DVec4,
    i32 => Int,
    [i32; 2] => IVec2,
    [i32; 3] => IVec3,
    [i32; 4] => IVec4,
    u32 => UInt,
    [u32; 2] => UVec2,
    [u32; 3] => UVec3,
    [u32; 4] => UVec4,
    bool => Bool,
    [bool; 2] => BVec2,
    [bool; 3] => BVec3,
    [bool; 4] => BVec4,
}

impl From<Vec2> for UniformValue {
    fn from(v: Vec2) -> Self {
        UniformValue::Vec2([v.x, v.y])
    }
}

impl From<Vec3> for UniformValue {
    fn from(v: Vec3) -> Self {
        UniformValue::Vec3([v.x, v.y, v.z])
    }
}

impl From<Vec4> for UniformValue {
    fn from(v: Vec4) -> Self {
        UniformValue::Vec4(v.to_array())
    }
}

impl From<Color> for UniformValue {
    fn from(c: Color) -> Self {
        UniformValue::Vec4(c.into())
    }
}

impl From<Mat4> for UniformValue {
    fn from(m: Mat4) -> Self {
        UniformValue::Mat4(m.to_cols_array())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions_pick_the_right_shape() {
        assert_eq!(UniformValue::from(3i32), UniformValue::Int(3));
        assert_eq!(UniformValue::from(Mat4::IDENTITY).glsl_type(), "mat4");
        assert_eq!(UniformValue::from(Color::RED), UniformValue::Vec4([1.0, 0.0, 0.0, 1.0]));
        assert_eq!(UniformValue::from([true, false]).glsl_type(), "bvec2");
        assert_eq!(UniformValue::from(2.0f64).glsl_type(), "double");
    }

    #[test]
    fn stage_display() {
        assert_eq!(ShaderStage::Vertex.to_string(), "vertex");
        assert_eq!(ShaderStage::Fragment.to_string(), "fragment");
    }
}
