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

//! Vertex attribute layouts.

use std::borrow::Cow;

/// The data type of a single vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum VertexAttributeType {
    Float,
    Float2,
    Float3,
    Float4,
    Float3x3,
    Float4x4,
    Double,
    Double2,
    Double3,
    Double4,
    Double3x3,
    Double4x4,
    Int,
    Int2,
    Int3,
    Int4,
    UInt,
    UInt2,
    UInt3,
    UInt4,
    Bool,
    Bool2,
    Bool3,
    Bool4,
}

/// The scalar type an attribute is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    /// 32-bit float.
    Float,
    /// 64-bit float.
    Double,
    /// 32-bit signed integer.
    Int,
    /// 32-bit unsigned integer.
    UInt,
    /// 8-bit boolean.
    Bool,
}

impl ScalarKind {
    /// Size of one scalar in bytes.
    pub const fn size(self) -> usize {
        match self {
            ScalarKind::Float | ScalarKind::Int | ScalarKind::UInt => 4,
            ScalarKind::Double => 8,
            ScalarKind::Bool => 1,
        }
    }
}

impl VertexAttributeType {
    /// Returns the scalar type and the number of scalars in this attribute.
    pub const fn components(self) -> (ScalarKind, usize) {
        use ScalarKind as S;
        use VertexAttributeType as T;
        match self {
            T::Float => (S::Float, 1),
            T::Float2 => (S::Float, 2),
            T::Float3 => (S::Float, 3),
            T::Float4 => (S::Float, 4),
            T::Float3x3 => (S::Float, 9),
            T::Float4x4 => (S::Float, 16),
            T::Double => (S::Double, 1),
            T::Double2 => (S::Double, 2),
            T::Double3 => (S::Double, 3),
            T::Double4 => (S::Double, 4),
            T::Double3x3 => (S::Double, 9),
            T::Double4x4 => (S::Double, 16),
            T::Int => (S::Int, 1),
            T::Int2 => (S::Int, 2),
            T::Int3 => (S::Int, 3),
            T::Int4 => (S::Int, 4),
            T::UInt => (S::UInt, 1),
            T::UInt2 => (S::UInt, 2),
            T::UInt3 => (S::UInt, 3),
            T::UInt4 => (S::UInt, 4),
            T::Bool => (S::Bool, 1),
            T::Bool2 => (S::Bool, 2),
            T::Bool3 => (S::Bool, 3),
            T::Bool4 => (S::Bool, 4),
        }
    }

    /// Returns the number of scalar elements in this attribute.
    pub const fn element_count(self) -> usize {
        self.components().1
    }

    /// Returns the size of this attribute in bytes.
    pub const fn size(self) -> usize {
        let (kind, count) = self.components();
        kind.size() * count
    }

    /// The number of shader input locations the attribute occupies. Matrices
    /// take one location per column.
    pub const fn location_count(self) -> u32 {
        use VertexAttributeType as T;
        match self {
            T::Float3x3 | T::Double3x3 => 3,
            T::Float4x4 | T::Double4x4 => 4,
            _ => 1,
        }
    }
}

/// One named attribute inside a [`VertexLayout`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    /// The attribute's name in the vertex shader.
    pub name: Cow<'static, str>,
    /// The attribute's data type.
    pub kind: VertexAttributeType,
    /// Whether integer data is normalized into `[0, 1]`/`[-1, 1]` when fetched.
    pub normalized: bool,
    /// Byte offset inside one vertex, filled in by [`VertexLayout::new`].
    pub offset: usize,
}

impl VertexAttribute {
    /// Creates a non-normalized attribute.
    pub fn new(name: impl Into<Cow<'static, str>>, kind: VertexAttributeType) -> Self {
        Self {
            name: name.into(),
            kind,
            normalized: false,
            offset: 0,
        }
    }

    /// Marks the attribute as normalized.
    pub fn normalized(mut self) -> Self {
        self.normalized = true;
        self
    }

    /// Returns the size of this attribute in bytes.
    pub fn size(&self) -> usize {
        self.kind.size()
    }

    /// Returns the number of scalar elements in this attribute.
    pub fn element_count(&self) -> usize {
        self.kind.element_count()
    }
}

/// The interleaved layout of one vertex.
///
/// Offsets and stride are computed once, in declaration order, when the
/// layout is built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VertexLayout {
    attributes: Vec<VertexAttribute>,
    stride: usize,
}

impl VertexLayout {
    /// Builds a layout from its attributes, assigning each one its offset.
    pub fn new(attributes: impl IntoIterator<Item = VertexAttribute>) -> Self {
        let mut attributes: Vec<_> = attributes.into_iter().collect();
        let mut offset = 0;
        for attribute in &mut attributes {
            attribute.offset = offset;
            offset += attribute.size();
        }
        Self {
            attributes,
            stride: offset,
        }
    }

    /// The attributes, in declaration order.
    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    /// The size of one vertex in bytes.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Returns `true` if the layout declares no attribute.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// The number of consecutive shader input locations the layout binds.
    pub fn location_count(&self) -> u32 {
        self.attributes.iter().map(|a| a.kind.location_count()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_sizes() {
        assert_eq!(VertexAttributeType::Float3.size(), 12);
        assert_eq!(VertexAttributeType::Double4x4.size(), 128);
        assert_eq!(VertexAttributeType::Bool3.size(), 3);
        assert_eq!(VertexAttributeType::Float3x3.element_count(), 9);
        assert_eq!(VertexAttributeType::UInt2.element_count(), 2);
    }

    #[test]
    fn layout_offsets_follow_declaration_order() {
        let layout = VertexLayout::new([
            VertexAttribute::new("in_Position", VertexAttributeType::Float3),
            VertexAttribute::new("in_Flags", VertexAttributeType::UInt).normalized(),
            VertexAttribute::new("in_Color", VertexAttributeType::Float4),
        ]);
        let offsets: Vec<_> = layout.attributes().iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 12, 16]);
        assert_eq!(layout.stride(), 32);
        assert!(layout.attributes()[1].normalized);
    }

    #[test]
    fn matrices_take_one_location_per_column() {
        let layout = VertexLayout::new([
            VertexAttribute::new("in_Position", VertexAttributeType::Float3),
            VertexAttribute::new("in_Transform", VertexAttributeType::Float4x4),
            VertexAttribute::new("in_Normal", VertexAttributeType::Double3x3),
        ]);
        assert_eq!(VertexAttributeType::Float4x4.location_count(), 4);
        assert_eq!(VertexAttributeType::Int2.location_count(), 1);
        assert_eq!(layout.location_count(), 8);
    }

    #[test]
    fn empty_layout() {
        let layout = VertexLayout::new(Vec::new());
        assert!(layout.is_empty());
        assert_eq!(layout.stride(), 0);
    }
}
