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

//! Counters and draw records exposed by the headless device.

use dg_core::renderer::{
    FramebufferId, IndexFormat, PrimitiveTopology, ProgramId, TextureId, VertexArrayId,
};

/// Aggregate counters since the device was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStats {
    /// Number of `draw_indexed` calls.
    pub draw_calls: usize,
    /// Total indices submitted across all draws.
    pub indices_drawn: usize,
    /// Number of `bind_texture` calls that bound a texture.
    pub texture_binds: usize,
    /// Number of buffer writes, including initialized allocations.
    pub buffer_writes: usize,
    /// Bytes written to buffers and textures.
    pub bytes_uploaded: usize,
    /// Live buffers.
    pub live_buffers: usize,
    /// Live vertex arrays.
    pub live_vertex_arrays: usize,
    /// Live compiled stages.
    pub live_shaders: usize,
    /// Live linked programs.
    pub live_programs: usize,
    /// Live textures.
    pub live_textures: usize,
    /// Live framebuffers.
    pub live_framebuffers: usize,
}

/// A snapshot of the pipeline state captured at each draw call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawRecord {
    /// The topology the draw was issued with.
    pub topology: PrimitiveTopology,
    /// Number of indices drawn.
    pub index_count: u32,
    /// The index element type.
    pub index_format: IndexFormat,
    /// The vertex array drawn.
    pub vertex_array: VertexArrayId,
    /// The program in use.
    pub program: ProgramId,
    /// The draw target, `None` for the default target.
    pub framebuffer: Option<FramebufferId>,
    /// What each texture unit held.
    pub texture_slots: Vec<Option<TextureId>>,
    /// Texture binds issued since the previous draw.
    pub texture_binds: usize,
}

impl DrawRecord {
    /// The number of texture units holding a texture.
    pub fn occupied_slots(&self) -> usize {
        self.texture_slots.iter().filter(|s| s.is_some()).count()
    }
}
