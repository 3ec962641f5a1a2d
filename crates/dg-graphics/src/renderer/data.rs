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


//! Vertex format and batch state of the 2D quad renderer.

use crate::buffer::{IndexBuffer, VertexArray, VertexBuffer};
use crate::framebuffer::FrameBuffer;
use crate::shader::Shader;
use crate::texture::{Texture, TextureSpecification};
use bytemuck::{Pod, Zeroable};
use dg_core::math::{Mat4, Vec2, Vec4};
use dg_core::renderer::{
    GraphicsDevice, RenderError, VertexAttribute, VertexAttributeType, VertexLayout,
    TEXTURE_SLOT_COUNT,
};
use std::sync::Arc;

/// Model-space corners of the unit quad, counter-clockwise from bottom left.
pub const QUAD_VERTEX_POSITIONS: [Vec4; 4] = [
    Vec4::new(-0.5, -0.5, 0.0, 1.0),
    Vec4::new(0.5, -0.5, 0.0, 1.0),
    Vec4::new(0.5, 0.5, 0.0, 1.0),
    Vec4::new(-0.5, 0.5, 0.0, 1.0),
];

/// Texture coordinates matching [`QUAD_VERTEX_POSITIONS`].
pub const QUAD_TEXTURE_COORDINATES: [Vec2; 4] = [
    Vec2::new(0.0, 0.0),
    Vec2::new(1.0, 0.0),
    Vec2::new(1.0, 1.0),
    Vec2::new(0.0, 1.0),
];

/// Index pattern of one quad, offset by 4 for each following quad.
pub const QUAD_INDEX_PATTERN: [u32; 6] = [0, 1, 2, 2, 3, 0];

/// One vertex of a batched quad, exactly as the quad shader reads it.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct QuadVertex2D {
    /// World position.
    pub position: [f32; 3],
    /// Texture coordinates.
    pub tex_coords: [f32; 2],
    /// Texture slot, as a float.
    pub tex_index: f32,
    /// Linear RGBA tint.
    pub color: [f32; 4],
    /// Entity ID for picking, as a float. `-1` for none.
    pub entity_id: f32,
}

impl QuadVertex2D {
    /// The attribute layout matching this struct.
    pub fn layout() -> VertexLayout {
        VertexLayout::new([
            VertexAttribute::new("in_Position", VertexAttributeType::Float3),
            VertexAttribute::new("in_TexCoords", VertexAttributeType::Float2),
            VertexAttribute::new("in_TexIndex", VertexAttributeType::Float),
            VertexAttribute::new("in_Color", VertexAttributeType::Float4),
            VertexAttribute::new("in_EntityId", VertexAttributeType::Float),
        ])
    }
}

/// Generates `count` indices following [`QUAD_INDEX_PATTERN`].
///
/// `count` is rounded up to a whole number of quads.
pub fn quad_indices(count: usize) -> Vec<u32> {
    let quads = count.div_ceil(QUAD_INDEX_PATTERN.len());
    (0..quads as u32)
        .flat_map(|quad| QUAD_INDEX_PATTERN.iter().map(move |i| quad * 4 + i))
        .collect()
}

/// The mutable state of the 2D renderer.
///
/// Counters prefixed `quad_` describe the batch being accumulated, `batch_`
/// counters the same batch for statistics, and `total_` counters the whole
/// scene.
#[derive(Debug)]
pub struct RenderData2D {
    pub(super) vertices_per_batch: usize,
    pub(super) indices_per_batch: usize,

    pub(super) scene_active: bool,
    pub(super) camera_product: Mat4,
    pub(super) framebuffer: Option<Arc<FrameBuffer>>,
    pub(super) framebuffer_generation: u64,
    pub(super) quad_shader: Option<Arc<Shader>>,
    pub(super) quad_shader_generation: u64,

    pub(super) blank_texture: Arc<Texture>,
    pub(super) textures: Vec<Option<Arc<Texture>>>,

    pub(super) quad_vertex_array: VertexArray,
    pub(super) quad_vertex_buffer: Arc<VertexBuffer>,
    pub(super) quad_vertices: Vec<QuadVertex2D>,

    pub(super) quad_vertex_count: usize,
    pub(super) quad_index_count: usize,
    pub(super) batch_vertex_count: usize,
    pub(super) batch_index_count: usize,
    pub(super) total_vertex_count: usize,
    pub(super) total_index_count: usize,
    pub(super) batch_texture_count: usize,
    pub(super) batch_count: usize,
}

impl RenderData2D {
    pub(super) fn new(
        device: &Arc<dyn GraphicsDevice>,
        quads_per_batch: usize,
    ) -> Result<Self, RenderError> {
        if quads_per_batch == 0 {
            return Err(RenderError::invalid("a batch must hold at least one quad"));
        }
        let vertices_per_batch = quads_per_batch * 4;
        let indices_per_batch = quads_per_batch * 6;

        let blank_texture =
            Texture::with_specification(device.clone(), TextureSpecification::default())?;
        blank_texture.upload_data(&0xFFFF_FFFFu32.to_ne_bytes())?;
        let blank_texture = Arc::new(blank_texture);
        let mut textures = vec![None; TEXTURE_SLOT_COUNT];
        textures[0] = Some(blank_texture.clone());

        // A few spare indices and vertices keep a full batch clear of the
        // buffers' upload limit.
        let index_buffer = IndexBuffer::new(device.clone(), false)?;
        index_buffer.allocate(&quad_indices(indices_per_batch + 30))?;

        let quad_vertices = vec![QuadVertex2D::default(); vertices_per_batch + 20];
        let quad_vertex_buffer = Arc::new(VertexBuffer::with_layout(
            device.clone(),
            true,
            QuadVertex2D::layout(),
        )?);
        quad_vertex_buffer.reserve::<QuadVertex2D>(quad_vertices.len())?;

        let mut quad_vertex_array = VertexArray::new(device.clone())?;
        quad_vertex_array.add_vertex_buffer(quad_vertex_buffer.clone())?;
        quad_vertex_array.set_index_buffer(Arc::new(index_buffer))?;

        Ok(Self {
            vertices_per_batch,
            indices_per_batch,
            scene_active: false,
            camera_product: Mat4::IDENTITY,
            framebuffer: None,
            framebuffer_generation: 0,
            quad_shader: None,
            quad_shader_generation: 0,
            blank_texture,
            textures,
            quad_vertex_array,
            quad_vertex_buffer,
            quad_vertices,
            quad_vertex_count: 0,
            quad_index_count: 0,
            batch_vertex_count: 0,
            batch_index_count: 0,
            total_vertex_count: 0,
            total_index_count: 0,
            batch_texture_count: 1,
            batch_count: 0,
        })
    }

    /// Resets the batch counters and empties every texture slot but slot 0.
    pub(super) fn reset_batch(&mut self) {
        self.quad_vertex_count = 0;
        self.quad_index_count = 0;
        self.batch_vertex_count = 0;
        self.batch_index_count = 0;
        self.batch_texture_count = 1;
        for slot in self.textures.iter_mut().skip(1) {
            *slot = None;
        }
    }

    pub(super) fn reset_scene(&mut self) {
        self.reset_batch();
        self.total_vertex_count = 0;
        self.total_index_count = 0;
        self.batch_count = 0;
    }

    pub(super) fn push_vertex(&mut self, vertex: QuadVertex2D) {
        self.quad_vertices[self.quad_vertex_count] = vertex;
        self.quad_vertex_count += 1;
        self.batch_vertex_count += 1;
        self.total_vertex_count += 1;
    }

    pub(super) fn batch_is_full(&self) -> bool {
        self.quad_vertex_count >= self.vertices_per_batch
            || self.quad_index_count >= self.indices_per_batch
            || self.batch_texture_count >= TEXTURE_SLOT_COUNT
    }

    /// Maximum vertices in one draw call.
    pub fn vertices_per_batch(&self) -> usize {
        self.vertices_per_batch
    }

    /// Maximum indices in one draw call.
    pub fn indices_per_batch(&self) -> usize {
        self.indices_per_batch
    }

    /// Returns `true` between `begin_scene_2d` and `end_scene_2d`.
    pub fn is_scene_active(&self) -> bool {
        self.scene_active
    }

    /// The camera transform of the current or last scene.
    pub fn camera_product(&self) -> Mat4 {
        self.camera_product
    }

    /// The render target, if one has been set.
    pub fn framebuffer(&self) -> Option<&Arc<FrameBuffer>> {
        self.framebuffer.as_ref()
    }

    /// The quad shader, if one has been set.
    pub fn quad_shader(&self) -> Option<&Arc<Shader>> {
        self.quad_shader.as_ref()
    }

    /// The 1x1 white texture permanently held in slot 0.
    pub fn blank_texture(&self) -> &Arc<Texture> {
        &self.blank_texture
    }

    /// The textures slotted for the current batch, slot 0 first.
    pub fn slotted_textures(&self) -> impl Iterator<Item = &Arc<Texture>> {
        self.textures[..self.batch_texture_count].iter().flatten()
    }

    /// The vertices staged for the current batch.
    pub fn staged_vertices(&self) -> &[QuadVertex2D] {
        &self.quad_vertices[..self.quad_vertex_count]
    }

    /// Indices staged for the current batch.
    pub fn quad_index_count(&self) -> usize {
        self.quad_index_count
    }

    /// Occupied texture slots in the current batch, including slot 0.
    pub fn batch_texture_count(&self) -> usize {
        self.batch_texture_count
    }

    /// Vertices submitted during the current batch.
    pub fn batch_vertex_count(&self) -> usize {
        self.batch_vertex_count
    }

    /// Indices submitted during the current batch.
    pub fn batch_index_count(&self) -> usize {
        self.batch_index_count
    }

    /// Vertices submitted during the scene.
    pub fn total_vertex_count(&self) -> usize {
        self.total_vertex_count
    }

    /// Indices submitted during the scene.
    pub fn total_index_count(&self) -> usize {
        self.total_index_count
    }

    /// Batches flushed during the scene.
    pub fn batch_count(&self) -> usize {
        self.batch_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_matches_layout() {
        assert_eq!(std::mem::size_of::<QuadVertex2D>(), 44);
        let layout = QuadVertex2D::layout();
        assert_eq!(layout.stride(), 44);
        let offsets: Vec<usize> = layout.attributes().iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 12, 20, 24, 40]);
    }

    #[test]
    fn index_pattern() {
        let indices = quad_indices(12);
        assert_eq!(indices, vec![0, 1, 2, 2, 3, 0, 4, 5, 6, 6, 7, 4]);
        assert_eq!(quad_indices(7).len(), 12);
    }
}
