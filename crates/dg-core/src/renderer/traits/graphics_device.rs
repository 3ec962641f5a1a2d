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

use crate::math::Color;
use crate::renderer::api::*;
use crate::renderer::error::{ResourceError, ShaderError};
use std::fmt::Debug;

/// The contract every graphics backend fulfils.
///
/// A device owns all GPU objects and hands out opaque handles to them. It is
/// also the holder of global pipeline state (bound program, bound textures,
/// bound framebuffer, viewport, clear color), so draw calls are issued against
/// whatever the caller bound last. Methods take `&self`; backends use
/// interior mutability.
pub trait GraphicsDevice: Send + Sync + Debug + 'static {
    // --- Buffers ---

    /// Creates a buffer handle with no storage.
    fn create_buffer(&self) -> Result<BufferId, ResourceError>;

    /// Gives a buffer its storage, optionally initialized.
    /// ## Arguments
    /// * `id` - The buffer to size.
    /// * `size` - The size of the storage in bytes.
    /// * `data` - Initial contents; must be exactly `size` bytes when present.
    /// * `usage` - Whether the storage will be rewritten.
    /// ## Errors
    /// * `ResourceError::InvalidHandle` - If `id` is not a live buffer.
    /// * `ResourceError::InvalidOperation` - If `data` does not match `size`.
    fn allocate_buffer(
        &self,
        id: BufferId,
        size: usize,
        data: Option<&[u8]>,
        usage: BufferUsage,
    ) -> Result<(), ResourceError>;

    /// Overwrites part of a buffer's storage.
    /// ## Errors
    /// * `ResourceError::OutOfBounds` - If the write would end past the storage.
    fn write_buffer(&self, id: BufferId, offset: usize, data: &[u8]) -> Result<(), ResourceError>;

    /// Releases a buffer.
    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError>;

    // --- Vertex arrays ---

    /// Creates an empty vertex array.
    fn create_vertex_array(&self) -> Result<VertexArrayId, ResourceError>;

    /// Attaches a vertex buffer, binding its attributes to consecutive
    /// locations starting at `first_location`.
    fn set_vertex_buffer(
        &self,
        vao: VertexArrayId,
        buffer: BufferId,
        first_location: u32,
        layout: &VertexLayout,
    ) -> Result<(), ResourceError>;

    /// Attaches the index buffer used by indexed draws.
    fn set_index_buffer(
        &self,
        vao: VertexArrayId,
        buffer: BufferId,
        format: IndexFormat,
    ) -> Result<(), ResourceError>;

    /// Makes a vertex array current; `None` unbinds.
    fn bind_vertex_array(&self, vao: Option<VertexArrayId>) -> Result<(), ResourceError>;

    /// Releases a vertex array. Buffers it references are left alone.
    fn destroy_vertex_array(&self, vao: VertexArrayId) -> Result<(), ResourceError>;

    // --- Shaders ---

    /// Compiles one shader stage.
    /// ## Returns
    /// The stage handle and the compiler's warning log (empty when clean).
    /// ## Errors
    /// * `ShaderError::Compilation` - With the compiler's error log.
    fn compile_shader(
        &self,
        stage: ShaderStage,
        source: &str,
    ) -> Result<(ShaderId, String), ShaderError>;

    /// Links a vertex and a fragment stage into a program.
    /// ## Returns
    /// The program handle and the linker's warning log (empty when clean).
    /// ## Errors
    /// * `ShaderError::Link` - With the linker's error log.
    fn link_program(
        &self,
        vertex: ShaderId,
        fragment: ShaderId,
    ) -> Result<(ProgramId, String), ShaderError>;

    /// Releases a compiled stage.
    fn destroy_shader(&self, id: ShaderId) -> Result<(), ResourceError>;

    /// Releases a linked program.
    fn destroy_program(&self, id: ProgramId) -> Result<(), ResourceError>;

    /// Makes a program current; `None` unbinds.
    fn use_program(&self, program: Option<ProgramId>) -> Result<(), ResourceError>;

    /// Looks up a uniform by name. Unknown names yield `Ok(None)`.
    fn uniform_location(
        &self,
        program: ProgramId,
        name: &str,
    ) -> Result<Option<UniformLocation>, ResourceError>;

    /// Sets a uniform on a program.
    /// ## Errors
    /// * `ResourceError::InvalidOperation` - If the value's shape does not
    ///   match the declared uniform type.
    fn set_uniform(
        &self,
        program: ProgramId,
        location: UniformLocation,
        value: &UniformValue,
    ) -> Result<(), ResourceError>;

    // --- Textures ---

    /// Creates a texture handle with no storage.
    fn create_texture(&self) -> Result<TextureId, ResourceError>;

    /// (Re)defines a texture's storage and sampling state, optionally
    /// uploading its full contents.
    fn define_texture(
        &self,
        id: TextureId,
        descriptor: &TextureDescriptor,
        data: Option<&[u8]>,
    ) -> Result<(), ResourceError>;

    /// Replaces a defined texture's full contents.
    fn write_texture(&self, id: TextureId, data: &[u8]) -> Result<(), ResourceError>;

    /// Binds a texture to a texture unit; `None` unbinds the unit.
    /// ## Errors
    /// * `ResourceError::OutOfBounds` - If `slot >= TEXTURE_SLOT_COUNT`.
    fn bind_texture(&self, slot: u32, id: Option<TextureId>) -> Result<(), ResourceError>;

    /// Fills every texel of a texture with one value.
    fn clear_texture(&self, id: TextureId, value: ClearValue) -> Result<(), ResourceError>;

    /// Releases a texture.
    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError>;

    // --- Framebuffers ---

    /// Creates a framebuffer with no attachments.
    fn create_framebuffer(&self) -> Result<FramebufferId, ResourceError>;

    /// Attaches a defined texture at an attachment point.
    fn attach_texture(
        &self,
        fb: FramebufferId,
        point: AttachmentPoint,
        texture: TextureId,
    ) -> Result<(), ResourceError>;

    /// Selects the color attachments fragment outputs are written to. An
    /// empty list disables color output.
    fn set_draw_buffers(&self, fb: FramebufferId, attachments: &[u32])
        -> Result<(), ResourceError>;

    /// Reports whether a framebuffer is complete.
    fn framebuffer_status(&self, fb: FramebufferId) -> Result<FramebufferStatus, ResourceError>;

    /// Binds a framebuffer to the given target; `None` restores the default
    /// target.
    fn bind_framebuffer(
        &self,
        target: FrameBufferTarget,
        fb: Option<FramebufferId>,
    ) -> Result<(), ResourceError>;

    /// Reads one texel of a color attachment as a raw integer.
    /// ## Errors
    /// * `ResourceError::OutOfBounds` - If the coordinates are outside the attachment.
    fn read_pixel(
        &self,
        fb: FramebufferId,
        attachment: u32,
        x: u32,
        y: u32,
    ) -> Result<i32, ResourceError>;

    /// Releases a framebuffer. Attached textures are left alone.
    fn destroy_framebuffer(&self, fb: FramebufferId) -> Result<(), ResourceError>;

    // --- Global state and draws ---

    /// Sets the viewport of the current draw target.
    fn set_viewport(&self, viewport: Viewport) -> Result<(), ResourceError>;

    /// Sets the color used by [`GraphicsDevice::clear`].
    fn set_clear_color(&self, color: Color) -> Result<(), ResourceError>;

    /// Clears the color and depth of the current draw target.
    fn clear(&self) -> Result<(), ResourceError>;

    /// Draws `index_count` indices from the bound vertex array with the bound
    /// program, textures and draw target.
    /// ## Errors
    /// * `ResourceError::InvalidOperation` - If no vertex array or program is bound.
    fn draw_indexed(
        &self,
        topology: PrimitiveTopology,
        index_count: u32,
        format: IndexFormat,
    ) -> Result<(), ResourceError>;

    /// Describes the adapter behind this device.
    fn adapter_info(&self) -> RendererAdapterInfo;
}
