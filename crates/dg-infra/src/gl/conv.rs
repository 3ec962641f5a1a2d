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

//! Mapping from `dg-core` descriptors to OpenGL enums.

use dg_core::renderer::*;
use std::borrow::Cow;

/// Prepended to sources that do not declare a GLSL version.
pub const DEFAULT_GLSL_VERSION: &str = "#version 330 core";

/// The three enums `glTexImage2D` needs for one texel format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TexelFormat {
    pub internal: u32,
    pub format: u32,
    pub ty: u32,
}

pub fn texel_format(format: TextureFormat) -> TexelFormat {
    let (internal, external, ty) = match format {
        TextureFormat::R8 => (glow::R8, glow::RED, glow::UNSIGNED_BYTE),
        TextureFormat::Rg8 => (glow::RG8, glow::RG, glow::UNSIGNED_BYTE),
        TextureFormat::Rgb8 => (glow::RGB8, glow::RGB, glow::UNSIGNED_BYTE),
        TextureFormat::Rgba8 => (glow::RGBA8, glow::RGBA, glow::UNSIGNED_BYTE),
        TextureFormat::R32Sint => (glow::R32I, glow::RED_INTEGER, glow::INT),
        TextureFormat::Depth24Stencil8 => (
            glow::DEPTH24_STENCIL8,
            glow::DEPTH_STENCIL,
            glow::UNSIGNED_INT_24_8,
        ),
    };
    TexelFormat {
        internal,
        format: external,
        ty,
    }
}

pub fn address_mode(mode: AddressMode) -> i32 {
    (match mode {
        AddressMode::Repeat => glow::REPEAT,
        AddressMode::MirroredRepeat => glow::MIRRORED_REPEAT,
        AddressMode::ClampToEdge => glow::CLAMP_TO_EDGE,
    }) as i32
}

pub fn filter_mode(mode: FilterMode) -> i32 {
    (match mode {
        FilterMode::Nearest => glow::NEAREST,
        FilterMode::Linear => glow::LINEAR,
    }) as i32
}

/// The texture target a descriptor's storage lives under.
pub fn texture_target(descriptor: &TextureDescriptor) -> u32 {
    if descriptor.sample_count > 1 {
        glow::TEXTURE_2D_MULTISAMPLE
    } else {
        glow::TEXTURE_2D
    }
}

pub fn shader_stage(stage: ShaderStage) -> u32 {
    match stage {
        ShaderStage::Vertex => glow::VERTEX_SHADER,
        ShaderStage::Fragment => glow::FRAGMENT_SHADER,
    }
}

/// Adds a `#version` line when the source has none.
pub fn versioned_source(source: &str) -> Cow<'_, str> {
    if source.trim_start().starts_with("#version") {
        Cow::Borrowed(source)
    } else {
        Cow::Owned(format!("{DEFAULT_GLSL_VERSION}\n{source}"))
    }
}

pub fn index_type(format: IndexFormat) -> u32 {
    match format {
        IndexFormat::U8 => glow::UNSIGNED_BYTE,
        IndexFormat::U16 => glow::UNSIGNED_SHORT,
        IndexFormat::U32 => glow::UNSIGNED_INT,
    }
}

pub fn topology(topology: PrimitiveTopology) -> u32 {
    match topology {
        PrimitiveTopology::Triangles => glow::TRIANGLES,
        PrimitiveTopology::Lines => glow::LINES,
        PrimitiveTopology::Points => glow::POINTS,
    }
}

/// Which `glVertexAttrib*Pointer` entry point feeds an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Float,
    Integer,
    Double,
}

/// How one attribute is spread over shader input locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributePointer {
    pub kind: PointerKind,
    pub data_type: u32,
    /// Components per location.
    pub components: i32,
    /// Consecutive locations, one per matrix column.
    pub columns: u32,
    /// Byte distance between two columns.
    pub column_size: usize,
}

pub fn attribute_pointer(attribute: &VertexAttribute) -> AttributePointer {
    let (scalar, count) = attribute.kind.components();
    let columns = attribute.kind.location_count();
    let components = count as u32 / columns;
    let (kind, data_type) = match scalar {
        ScalarKind::Float => (PointerKind::Float, glow::FLOAT),
        ScalarKind::Double => (PointerKind::Double, glow::DOUBLE),
        ScalarKind::Int => (PointerKind::Integer, glow::INT),
        ScalarKind::UInt => (PointerKind::Integer, glow::UNSIGNED_INT),
        ScalarKind::Bool => (PointerKind::Integer, glow::UNSIGNED_BYTE),
    };
    // Normalized integers are fetched as floats.
    let kind = if attribute.normalized && kind == PointerKind::Integer {
        PointerKind::Float
    } else {
        kind
    };
    AttributePointer {
        kind,
        data_type,
        components: components as i32,
        columns,
        column_size: components as usize * scalar.size(),
    }
}

/// The `glClearBuffer*` call that fills a texture of this format.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearOp {
    Int(i32),
    Float([f32; 4]),
    DepthStencil(f32),
}

pub fn clear_op(format: TextureFormat, value: ClearValue) -> Result<ClearOp, ResourceError> {
    match (format, value) {
        (TextureFormat::R32Sint, ClearValue::Int(v)) => Ok(ClearOp::Int(v)),
        (TextureFormat::R32Sint, ClearValue::Float(_)) => Err(ResourceError::InvalidOperation(
            "integer texture cleared with a float value".to_string(),
        )),
        (TextureFormat::Depth24Stencil8, ClearValue::Float(c)) => {
            Ok(ClearOp::DepthStencil(c[0].clamp(0.0, 1.0)))
        }
        (_, ClearValue::Float(c)) => Ok(ClearOp::Float(c)),
        (_, ClearValue::Int(_)) => Err(ResourceError::InvalidOperation(format!(
            "{format:?} texture cleared with an integer value"
        ))),
    }
}

pub fn framebuffer_status(code: u32) -> FramebufferStatus {
    let reason = match code {
        glow::FRAMEBUFFER_COMPLETE => return FramebufferStatus::Complete,
        glow::FRAMEBUFFER_UNDEFINED => "undefined",
        glow::FRAMEBUFFER_INCOMPLETE_ATTACHMENT => "incomplete attachment",
        glow::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT => "no attachments",
        glow::FRAMEBUFFER_INCOMPLETE_DRAW_BUFFER => "draw buffer has no color attachment",
        glow::FRAMEBUFFER_INCOMPLETE_READ_BUFFER => "read buffer has no color attachment",
        glow::FRAMEBUFFER_UNSUPPORTED => "unsupported attachment formats",
        glow::FRAMEBUFFER_INCOMPLETE_MULTISAMPLE => "attachment sample counts differ",
        other => return FramebufferStatus::Incomplete(format!("status 0x{other:04X}")),
    };
    FramebufferStatus::Incomplete(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_and_depth_formats_use_matching_transfer_types() {
        assert_eq!(
            texel_format(TextureFormat::R32Sint),
            TexelFormat {
                internal: glow::R32I,
                format: glow::RED_INTEGER,
                ty: glow::INT,
            }
        );
        let depth = texel_format(TextureFormat::Depth24Stencil8);
        assert_eq!(depth.format, glow::DEPTH_STENCIL);
        assert_eq!(depth.ty, glow::UNSIGNED_INT_24_8);
        assert_eq!(texel_format(TextureFormat::Rgb8).format, glow::RGB);
    }

    #[test]
    fn matrix_attributes_are_split_into_columns() {
        let transform = VertexAttribute::new("in_Transform", VertexAttributeType::Float4x4);
        let pointer = attribute_pointer(&transform);
        assert_eq!(pointer.kind, PointerKind::Float);
        assert_eq!(pointer.columns, 4);
        assert_eq!(pointer.components, 4);
        assert_eq!(pointer.column_size, 16);

        let normal = VertexAttribute::new("in_Normal", VertexAttributeType::Double3x3);
        let pointer = attribute_pointer(&normal);
        assert_eq!(pointer.kind, PointerKind::Double);
        assert_eq!((pointer.columns, pointer.components), (3, 3));
        assert_eq!(pointer.column_size, 24);
    }

    #[test]
    fn integer_attributes_stay_integer_unless_normalized() {
        let id = VertexAttribute::new("in_EntityId", VertexAttributeType::Int);
        assert_eq!(attribute_pointer(&id).kind, PointerKind::Integer);
        assert_eq!(attribute_pointer(&id).data_type, glow::INT);

        let flags = VertexAttribute::new("in_Flags", VertexAttributeType::Bool4).normalized();
        let pointer = attribute_pointer(&flags);
        assert_eq!(pointer.kind, PointerKind::Float);
        assert_eq!(pointer.data_type, glow::UNSIGNED_BYTE);
        assert_eq!(pointer.components, 4);
    }

    #[test]
    fn version_header_is_added_once() {
        let bare = "void main() {}";
        assert_eq!(
            versioned_source(bare),
            format!("{DEFAULT_GLSL_VERSION}\nvoid main() {{}}")
        );
        let declared = "\n#version 450 core\nvoid main() {}";
        assert!(matches!(versioned_source(declared), Cow::Borrowed(_)));
    }

    #[test]
    fn clear_values_must_match_the_format() {
        assert_eq!(
            clear_op(TextureFormat::R32Sint, ClearValue::Int(-1)).unwrap(),
            ClearOp::Int(-1)
        );
        assert_eq!(
            clear_op(TextureFormat::Depth24Stencil8, ClearValue::Float([2.0; 4])).unwrap(),
            ClearOp::DepthStencil(1.0)
        );
        assert!(clear_op(TextureFormat::Rgba8, ClearValue::Int(3)).is_err());
        assert!(clear_op(TextureFormat::R32Sint, ClearValue::Float([0.0; 4])).is_err());
    }

    #[test]
    fn framebuffer_status_codes() {
        assert_eq!(
            framebuffer_status(glow::FRAMEBUFFER_COMPLETE),
            FramebufferStatus::Complete
        );
        assert_eq!(
            framebuffer_status(glow::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT),
            FramebufferStatus::Incomplete("no attachments".to_string())
        );
        assert!(matches!(
            framebuffer_status(0x1234),
            FramebufferStatus::Incomplete(reason) if reason == "status 0x1234"
        ));
        assert_eq!(index_type(IndexFormat::U16), glow::UNSIGNED_SHORT);
        assert_eq!(topology(PrimitiveTopology::Lines), glow::LINES);
    }
}
