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

//! An OpenGL 3.3 core [`GraphicsDevice`] built on [`glow`].
//!
//! The device does not create a window or a context. The application hands
//! it a current `glow::Context` (from winit + glutin, SDL, eframe, ...) and
//! the device maps every opaque handle to the matching GL object.
//!
//! # Safety
//!
//! OpenGL contexts are bound to one thread at a time. Every GL call made by
//! [`GlowDevice`] happens under its internal lock, but the context itself
//! must be current on whichever thread calls into the device. This is the
//! contract [`GlowDevice::new`] asks callers to uphold.

mod conv;

use dg_core::math::Color;
use dg_core::renderer::*;
use glow::HasContext;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Texture unit used while defining or uploading textures, so the units the
/// renderer binds for drawing are never disturbed.
const SCRATCH_TEXTURE_UNIT: u32 = TEXTURE_SLOT_COUNT as u32;

#[derive(Debug)]
struct BufferEntry {
    raw: glow::Buffer,
    size: Option<usize>,
}

#[derive(Debug)]
struct VertexArrayEntry {
    raw: glow::VertexArray,
    index_buffer: Option<BufferId>,
}

#[derive(Debug)]
struct ProgramEntry {
    raw: glow::Program,
    /// Resolved uniforms; a [`UniformLocation`] indexes into this list.
    uniforms: Vec<(String, glow::UniformLocation)>,
}

#[derive(Debug)]
struct TextureEntry {
    raw: glow::Texture,
    descriptor: Option<TextureDescriptor>,
}

#[derive(Debug)]
struct FramebufferEntry {
    raw: glow::Framebuffer,
    colors: BTreeMap<u32, TextureId>,
    depth: Option<TextureId>,
    draw_buffers: Vec<u32>,
}

struct GlState {
    gl: glow::Context,
    buffers: HashMap<BufferId, BufferEntry>,
    vertex_arrays: HashMap<VertexArrayId, VertexArrayEntry>,
    shaders: HashMap<ShaderId, glow::Shader>,
    programs: HashMap<ProgramId, ProgramEntry>,
    textures: HashMap<TextureId, TextureEntry>,
    framebuffers: HashMap<FramebufferId, FramebufferEntry>,
    scratch_framebuffer: Option<glow::Framebuffer>,

    bound_vertex_array: Option<VertexArrayId>,
    bound_program: Option<ProgramId>,
    read_framebuffer: Option<FramebufferId>,
    draw_framebuffer: Option<FramebufferId>,
    clear_color: Color,
}

impl GlState {
    fn raw_vertex_array(&self) -> Option<glow::VertexArray> {
        self.bound_vertex_array
            .and_then(|id| self.vertex_arrays.get(&id))
            .map(|v| v.raw)
    }

    fn raw_program(&self) -> Option<glow::Program> {
        self.bound_program
            .and_then(|id| self.programs.get(&id))
            .map(|p| p.raw)
    }

    fn raw_framebuffer(&self, id: Option<FramebufferId>) -> Option<glow::Framebuffer> {
        id.and_then(|id| self.framebuffers.get(&id)).map(|f| f.raw)
    }

    fn texture(&self, id: TextureId) -> Result<&TextureEntry, ResourceError> {
        self.textures.get(&id).ok_or(ResourceError::InvalidHandle)
    }

    fn defined_texture(
        &self,
        id: TextureId,
    ) -> Result<(glow::Texture, TextureDescriptor), ResourceError> {
        let entry = self.texture(id)?;
        let descriptor = entry.descriptor.ok_or_else(|| {
            ResourceError::InvalidOperation("texture has no storage".to_string())
        })?;
        Ok((entry.raw, descriptor))
    }

    /// Discards errors raised by earlier, unchecked calls.
    fn clear_errors(&self) {
        for _ in 0..8 {
            if unsafe { self.gl.get_error() } == glow::NO_ERROR {
                break;
            }
        }
    }

    fn check(&self, what: &str) -> Result<(), ResourceError> {
        match unsafe { self.gl.get_error() } {
            glow::NO_ERROR => Ok(()),
            glow::INVALID_OPERATION => Err(ResourceError::InvalidOperation(format!(
                "{what} was rejected by the driver"
            ))),
            code => {
                log::error!("GlowDevice: {what} raised GL error 0x{code:04X}");
                Err(ResourceError::Backend(format!(
                    "{what} raised GL error 0x{code:04X}"
                )))
            }
        }
    }

    /// Runs `f` with `fb` bound as the draw framebuffer, then restores the
    /// caller's binding.
    fn with_draw_framebuffer<R>(
        &self,
        fb: glow::Framebuffer,
        f: impl FnOnce(&glow::Context) -> R,
    ) -> R {
        unsafe { self.gl.bind_framebuffer(glow::DRAW_FRAMEBUFFER, Some(fb)) };
        let result = f(&self.gl);
        let previous = self.raw_framebuffer(self.draw_framebuffer);
        unsafe { self.gl.bind_framebuffer(glow::DRAW_FRAMEBUFFER, previous) };
        result
    }
}

/// A graphics device backed by an OpenGL context.
pub struct GlowDevice {
    state: Mutex<GlState>,
    next_id: AtomicUsize,
    info: RendererAdapterInfo,
}

// SAFETY: the context is only touched under `state`'s lock, and `new` makes
// the caller responsible for keeping it current on the calling thread.
unsafe impl Send for GlowDevice {}
unsafe impl Sync for GlowDevice {}

impl fmt::Debug for GlowDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlowDevice")
            .field("adapter", &self.info.name)
            .finish_non_exhaustive()
    }
}

impl GlowDevice {
    /// Wraps a context.
    ///
    /// # Safety
    ///
    /// `gl` must be current on the calling thread, and must be current on
    /// every thread that later calls into the device.
    pub unsafe fn new(gl: glow::Context) -> Self {
        let texture_units = gl.get_parameter_i32(glow::MAX_TEXTURE_IMAGE_UNITS).max(0) as usize;
        let color_attachments = gl.get_parameter_i32(glow::MAX_COLOR_ATTACHMENTS).max(0) as usize;
        let info = RendererAdapterInfo {
            name: format!(
                "{} ({})",
                gl.get_parameter_string(glow::RENDERER),
                gl.get_parameter_string(glow::VERSION)
            ),
            backend: "opengl".to_string(),
            max_texture_slots: texture_units.min(TEXTURE_SLOT_COUNT),
            max_color_attachments: color_attachments.min(FRAMEBUFFER_COLOR_ATTACHMENT_COUNT),
        };
        log::info!(
            "GlowDevice: Using '{}' with {} texture slots",
            info.name,
            info.max_texture_slots
        );

        // Rows of RGB8 and R8 data are tightly packed.
        gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
        gl.pixel_store_i32(glow::PACK_ALIGNMENT, 1);

        Self {
            state: Mutex::new(GlState {
                gl,
                buffers: HashMap::new(),
                vertex_arrays: HashMap::new(),
                shaders: HashMap::new(),
                programs: HashMap::new(),
                textures: HashMap::new(),
                framebuffers: HashMap::new(),
                scratch_framebuffer: None,
                bound_vertex_array: None,
                bound_program: None,
                read_framebuffer: None,
                draw_framebuffer: None,
                clear_color: Color::BLACK,
            }),
            next_id: AtomicUsize::new(1),
            info,
        }
    }

    /// Loads the GL entry points through `loader` and wraps the result.
    ///
    /// # Safety
    ///
    /// Same contract as [`GlowDevice::new`]; `loader` must return entry
    /// points of the current context.
    pub unsafe fn from_loader_function<F>(loader: F) -> Self
    where
        F: FnMut(&str) -> *const std::ffi::c_void,
    {
        Self::new(glow::Context::from_loader_function(loader))
    }

    fn state(&self) -> MutexGuard<'_, GlState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn generate_id(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

fn gl_size(value: usize) -> Result<i32, ResourceError> {
    i32::try_from(value).map_err(|_| ResourceError::OutOfBounds)
}

fn upload_uniform(
    gl: &glow::Context,
    location: &glow::UniformLocation,
    value: &UniformValue,
) -> Result<(), ResourceError> {
    let loc = Some(location);
    unsafe {
        match *value {
            UniformValue::Float(x) => gl.uniform_1_f32(loc, x),
            UniformValue::Vec2([x, y]) => gl.uniform_2_f32(loc, x, y),
            UniformValue::Vec3([x, y, z]) => gl.uniform_3_f32(loc, x, y, z),
            UniformValue::Vec4([x, y, z, w]) => gl.uniform_4_f32(loc, x, y, z, w),
            UniformValue::Mat2(m) => gl.uniform_matrix_2_f32_slice(loc, false, &m),
            UniformValue::Mat3(m) => gl.uniform_matrix_3_f32_slice(loc, false, &m),
            UniformValue::Mat4(m) => gl.uniform_matrix_4_f32_slice(loc, false, &m),
            UniformValue::Int(x) => gl.uniform_1_i32(loc, x),
            UniformValue::IVec2([x, y]) => gl.uniform_2_i32(loc, x, y),
            UniformValue::IVec3([x, y, z]) => gl.uniform_3_i32(loc, x, y, z),
            UniformValue::IVec4([x, y, z, w]) => gl.uniform_4_i32(loc, x, y, z, w),
            UniformValue::UInt(x) => gl.uniform_1_u32(loc, x),
            UniformValue::UVec2([x, y]) => gl.uniform_2_u32(loc, x, y),
            UniformValue::UVec3([x, y, z]) => gl.uniform_3_u32(loc, x, y, z),
            UniformValue::UVec4([x, y, z, w]) => gl.uniform_4_u32(loc, x, y, z, w),
            UniformValue::Bool(x) => gl.uniform_1_i32(loc, x as i32),
            UniformValue::BVec2([x, y]) => gl.uniform_2_i32(loc, x as i32, y as i32),
            UniformValue::BVec3([x, y, z]) => {
                gl.uniform_3_i32(loc, x as i32, y as i32, z as i32)
            }
            UniformValue::BVec4([x, y, z, w]) => {
                gl.uniform_4_i32(loc, x as i32, y as i32, z as i32, w as i32)
            }
            UniformValue::Double(_)
            | UniformValue::DVec2(_)
            | UniformValue::DVec3(_)
            | UniformValue::DVec4(_)
            | UniformValue::DMat2(_)
            | UniformValue::DMat3(_)
            | UniformValue::DMat4(_) => {
                return Err(ResourceError::InvalidOperation(format!(
                    "{} uniforms need OpenGL 4.0",
                    value.glsl_type()
                )));
            }
        }
    }
    Ok(())
}

impl GraphicsDevice for GlowDevice {
    fn create_buffer(&self) -> Result<BufferId, ResourceError> {
        let mut state = self.state();
        let raw = unsafe { state.gl.create_buffer() }.map_err(ResourceError::Backend)?;
        let id = BufferId(self.generate_id());
        state.buffers.insert(id, BufferEntry { raw, size: None });
        log::debug!("GlowDevice: Created buffer with ID: {id:?}");
        Ok(id)
    }

    fn allocate_buffer(
        &self,
        id: BufferId,
        size: usize,
        data: Option<&[u8]>,
        usage: BufferUsage,
    ) -> Result<(), ResourceError> {
        let mut state = self.state();
        let raw = state
            .buffers
            .get(&id)
            .ok_or(ResourceError::InvalidHandle)?
            .raw;
        if let Some(bytes) = data {
            if bytes.len() != size {
                return Err(ResourceError::InvalidOperation(format!(
                    "initial data is {} bytes, buffer is {size}",
                    bytes.len()
                )));
            }
        }
        let usage = match usage {
            BufferUsage::Static => glow::STATIC_DRAW,
            BufferUsage::Dynamic => glow::DYNAMIC_DRAW,
        };
        let gl_len = gl_size(size)?;

        state.clear_errors();
        // ARRAY_BUFFER is not part of vertex array state, so uploads through
        // it never disturb the bound vertex array's index buffer.
        unsafe {
            state.gl.bind_buffer(glow::ARRAY_BUFFER, Some(raw));
            match data {
                Some(bytes) => state.gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, bytes, usage),
                None => state.gl.buffer_data_size(glow::ARRAY_BUFFER, gl_len, usage),
            }
            state.gl.bind_buffer(glow::ARRAY_BUFFER, None);
        }
        state.check("buffer allocation")?;

        if let Some(entry) = state.buffers.get_mut(&id) {
            entry.size = Some(size);
        }
        Ok(())
    }

    fn write_buffer(&self, id: BufferId, offset: usize, data: &[u8]) -> Result<(), ResourceError> {
        let state = self.state();
        let entry = state.buffers.get(&id).ok_or(ResourceError::InvalidHandle)?;
        let size = entry.size.ok_or_else(|| {
            ResourceError::InvalidOperation("buffer has no storage".to_string())
        })?;
        if offset + data.len() > size {
            return Err(ResourceError::OutOfBounds);
        }
        let offset = gl_size(offset)?;

        unsafe {
            state.gl.bind_buffer(glow::ARRAY_BUFFER, Some(entry.raw));
            state
                .gl
                .buffer_sub_data_u8_slice(glow::ARRAY_BUFFER, offset, data);
            state.gl.bind_buffer(glow::ARRAY_BUFFER, None);
        }
        log::trace!(
            "GlowDevice: Wrote {} bytes to buffer ID: {:?} at offset {}",
            data.len(),
            id,
            offset
        );
        Ok(())
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        let mut state = self.state();
        let entry = state
            .buffers
            .remove(&id)
            .ok_or(ResourceError::InvalidHandle)?;
        unsafe { state.gl.delete_buffer(entry.raw) };
        log::debug!("GlowDevice: Destroyed buffer with ID: {id:?}");
        Ok(())
    }

    fn create_vertex_array(&self) -> Result<VertexArrayId, ResourceError> {
        let mut state = self.state();
        let raw = unsafe { state.gl.create_vertex_array() }.map_err(ResourceError::Backend)?;
        let id = VertexArrayId(self.generate_id());
        state.vertex_arrays.insert(
            id,
            VertexArrayEntry {
                raw,
                index_buffer: None,
            },
        );
        Ok(id)
    }

    fn set_vertex_buffer(
        &self,
        vao: VertexArrayId,
        buffer: BufferId,
        first_location: u32,
        layout: &VertexLayout,
    ) -> Result<(), ResourceError> {
        let state = self.state();
        let buffer_raw = state
            .buffers
            .get(&buffer)
            .ok_or(ResourceError::InvalidHandle)?
            .raw;
        if layout.is_empty() {
            return Err(ResourceError::InvalidOperation(
                "vertex buffer layout has no attributes".to_string(),
            ));
        }
        let vao_raw = state
            .vertex_arrays
            .get(&vao)
            .ok_or(ResourceError::InvalidHandle)?
            .raw;
        let stride = gl_size(layout.stride())?;

        state.clear_errors();
        let gl = &state.gl;
        unsafe {
            gl.bind_vertex_array(Some(vao_raw));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(buffer_raw));
            let mut location = first_location;
            for attribute in layout.attributes() {
                let pointer = conv::attribute_pointer(attribute);
                for column in 0..pointer.columns {
                    // Offsets stay below the stride, which fits in an i32.
                    let offset = (attribute.offset + column as usize * pointer.column_size) as i32;
                    gl.enable_vertex_attrib_array(location);
                    match pointer.kind {
                        conv::PointerKind::Float => gl.vertex_attrib_pointer_f32(
                            location,
                            pointer.components,
                            pointer.data_type,
                            attribute.normalized,
                            stride,
                            offset,
                        ),
                        conv::PointerKind::Integer => gl.vertex_attrib_pointer_i32(
                            location,
                            pointer.components,
                            pointer.data_type,
                            stride,
                            offset,
                        ),
                        conv::PointerKind::Double => gl.vertex_attrib_pointer_f64(
                            location,
                            pointer.components,
                            pointer.data_type,
                            stride,
                            offset,
                        ),
                    }
                    location += 1;
                }
            }
            gl.bind_buffer(glow::ARRAY_BUFFER, None);
            gl.bind_vertex_array(state.raw_vertex_array());
        }
        state.check("vertex buffer setup")
    }

    fn set_index_buffer(
        &self,
        vao: VertexArrayId,
        buffer: BufferId,
        _format: IndexFormat,
    ) -> Result<(), ResourceError> {
        let mut state = self.state();
        let buffer_raw = state
            .buffers
            .get(&buffer)
            .ok_or(ResourceError::InvalidHandle)?
            .raw;
        let vao_raw = state
            .vertex_arrays
            .get(&vao)
            .ok_or(ResourceError::InvalidHandle)?
            .raw;

        // The element binding is recorded in the vertex array itself.
        unsafe {
            state.gl.bind_vertex_array(Some(vao_raw));
            state
                .gl
                .bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(buffer_raw));
            state.gl.bind_vertex_array(state.raw_vertex_array());
        }
        if let Some(entry) = state.vertex_arrays.get_mut(&vao) {
            entry.index_buffer = Some(buffer);
        }
        Ok(())
    }

    fn bind_vertex_array(&self, vao: Option<VertexArrayId>) -> Result<(), ResourceError> {
        let mut state = self.state();
        let raw = match vao {
            Some(id) => Some(
                state
                    .vertex_arrays
                    .get(&id)
                    .ok_or(ResourceError::InvalidHandle)?
                    .raw,
            ),
            None => None,
        };
        unsafe { state.gl.bind_vertex_array(raw) };
        state.bound_vertex_array = vao;
        Ok(())
    }

    fn destroy_vertex_array(&self, vao: VertexArrayId) -> Result<(), ResourceError> {
        let mut state = self.state();
        let entry = state
            .vertex_arrays
            .remove(&vao)
            .ok_or(ResourceError::InvalidHandle)?;
        if state.bound_vertex_array == Some(vao) {
            state.bound_vertex_array = None;
            unsafe { state.gl.bind_vertex_array(None) };
        }
        unsafe { state.gl.delete_vertex_array(entry.raw) };
        Ok(())
    }

    fn compile_shader(
        &self,
        stage: ShaderStage,
        source: &str,
    ) -> Result<(ShaderId, String), ShaderError> {
        if source.trim().is_empty() {
            return Err(ShaderError::EmptySource { stage });
        }
        let source = conv::versioned_source(source);

        let mut state = self.state();
        let gl = &state.gl;
        let raw = unsafe { gl.create_shader(conv::shader_stage(stage)) }
            .map_err(|log| ShaderError::Compilation { stage, log })?;
        let (compiled, log) = unsafe {
            gl.shader_source(raw, &source);
            gl.compile_shader(raw);
            (gl.get_shader_compile_status(raw), gl.get_shader_info_log(raw))
        };
        if !compiled {
            unsafe { gl.delete_shader(raw) };
            return Err(ShaderError::Compilation { stage, log });
        }

        let id = ShaderId(self.generate_id());
        state.shaders.insert(id, raw);
        Ok((id, log))
    }

    fn link_program(
        &self,
        vertex: ShaderId,
        fragment: ShaderId,
    ) -> Result<(ProgramId, String), ShaderError> {
        let mut state = self.state();
        let (Some(&vs), Some(&fs)) = (state.shaders.get(&vertex), state.shaders.get(&fragment))
        else {
            return Err(ShaderError::Link {
                log: "ERROR: attached shader stage does not exist".to_string(),
            });
        };

        let gl = &state.gl;
        let raw = unsafe { gl.create_program() }.map_err(|log| ShaderError::Link { log })?;
        let (linked, log) = unsafe {
            gl.attach_shader(raw, vs);
            gl.attach_shader(raw, fs);
            gl.link_program(raw);
            let status = (gl.get_program_link_status(raw), gl.get_program_info_log(raw));
            gl.detach_shader(raw, vs);
            gl.detach_shader(raw, fs);
            status
        };
        if !linked {
            unsafe { gl.delete_program(raw) };
            return Err(ShaderError::Link { log });
        }

        let id = ProgramId(self.generate_id());
        state.programs.insert(
            id,
            ProgramEntry {
                raw,
                uniforms: Vec::new(),
            },
        );
        log::debug!("GlowDevice: Linked program {id:?}");
        Ok((id, log))
    }

    fn destroy_shader(&self, id: ShaderId) -> Result<(), ResourceError> {
        let mut state = self.state();
        let raw = state
            .shaders
            .remove(&id)
            .ok_or(ResourceError::InvalidHandle)?;
        unsafe { state.gl.delete_shader(raw) };
        Ok(())
    }

    fn destroy_program(&self, id: ProgramId) -> Result<(), ResourceError> {
        let mut state = self.state();
        let entry = state
            .programs
            .remove(&id)
            .ok_or(ResourceError::InvalidHandle)?;
        if state.bound_program == Some(id) {
            state.bound_program = None;
            unsafe { state.gl.use_program(None) };
        }
        unsafe { state.gl.delete_program(entry.raw) };
        Ok(())
    }

    fn use_program(&self, program: Option<ProgramId>) -> Result<(), ResourceError> {
        let mut state = self.state();
        let raw = match program {
            Some(id) => Some(
                state
                    .programs
                    .get(&id)
                    .ok_or(ResourceError::InvalidHandle)?
                    .raw,
            ),
            None => None,
        };
        unsafe { state.gl.use_program(raw) };
        state.bound_program = program;
        Ok(())
    }

    fn uniform_location(
        &self,
        program: ProgramId,
        name: &str,
    ) -> Result<Option<UniformLocation>, ResourceError> {
        let mut guard = self.state();
        let state = &mut *guard;
        let entry = state
            .programs
            .get_mut(&program)
            .ok_or(ResourceError::InvalidHandle)?;
        if let Some(index) = entry.uniforms.iter().position(|(n, _)| n == name) {
            return Ok(Some(UniformLocation(index as u32)));
        }

        let Some(raw) = (unsafe { state.gl.get_uniform_location(entry.raw, name) }) else {
            return Ok(None);
        };
        entry.uniforms.push((name.to_string(), raw));
        Ok(Some(UniformLocation(entry.uniforms.len() as u32 - 1)))
    }

    fn set_uniform(
        &self,
        program: ProgramId,
        location: UniformLocation,
        value: &UniformValue,
    ) -> Result<(), ResourceError> {
        let state = self.state();
        let entry = state
            .programs
            .get(&program)
            .ok_or(ResourceError::InvalidHandle)?;
        let (name, raw_location) = entry
            .uniforms
            .get(location.0 as usize)
            .ok_or(ResourceError::OutOfBounds)?;

        state.clear_errors();
        unsafe { state.gl.use_program(Some(entry.raw)) };
        let uploaded = upload_uniform(&state.gl, raw_location, value);
        unsafe { state.gl.use_program(state.raw_program()) };
        uploaded?;
        state
            .check("uniform upload")
            .map_err(|_| {
                ResourceError::InvalidOperation(format!(
                    "uniform '{name}' does not accept a {}",
                    value.glsl_type()
                ))
            })
    }

    fn create_texture(&self) -> Result<TextureId, ResourceError> {
        let mut state = self.state();
        let raw = unsafe { state.gl.create_texture() }.map_err(ResourceError::Backend)?;
        let id = TextureId(self.generate_id());
        state.textures.insert(
            id,
            TextureEntry {
                raw,
                descriptor: None,
            },
        );
        log::debug!("GlowDevice: Created texture with ID: {id:?}");
        Ok(id)
    }

    fn define_texture(
        &self,
        id: TextureId,
        descriptor: &TextureDescriptor,
        data: Option<&[u8]>,
    ) -> Result<(), ResourceError> {
        if descriptor.width == 0 || descriptor.height == 0 {
            return Err(ResourceError::InvalidOperation(format!(
                "texture size {}x{} is empty",
                descriptor.width, descriptor.height
            )));
        }
        if let Some(bytes) = data {
            if bytes.len() != descriptor.byte_size() {
                return Err(ResourceError::InvalidOperation(format!(
                    "texture data is {} bytes, expected {}",
                    bytes.len(),
                    descriptor.byte_size()
                )));
            }
        }
        let target = conv::texture_target(descriptor);
        if target == glow::TEXTURE_2D_MULTISAMPLE && data.is_some() {
            return Err(ResourceError::InvalidOperation(
                "multisampled textures cannot be uploaded to".to_string(),
            ));
        }
        let width = gl_size(descriptor.width as usize)?;
        let height = gl_size(descriptor.height as usize)?;
        let texel = conv::texel_format(descriptor.format);

        let mut guard = self.state();
        let state = &mut *guard;
        state.clear_errors();
        let entry = state
            .textures
            .get_mut(&id)
            .ok_or(ResourceError::InvalidHandle)?;

        // A GL texture keeps the target it was first bound to.
        let previous_target = entry.descriptor.as_ref().map(conv::texture_target);
        if previous_target.is_some_and(|t| t != target) {
            let fresh = unsafe { state.gl.create_texture() }.map_err(ResourceError::Backend)?;
            unsafe { state.gl.delete_texture(entry.raw) };
            entry.raw = fresh;
        }

        let gl = &state.gl;
        unsafe {
            gl.active_texture(glow::TEXTURE0 + SCRATCH_TEXTURE_UNIT);
            gl.bind_texture(target, Some(entry.raw));
            if target == glow::TEXTURE_2D_MULTISAMPLE {
                gl.tex_image_2d_multisample(
                    target,
                    descriptor.sample_count as i32,
                    texel.internal as i32,
                    width,
                    height,
                    true,
                );
            } else {
                let wrap = conv::address_mode(descriptor.address_mode);
                gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_S, wrap);
                gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_T, wrap);
                gl.tex_parameter_i32(
                    target,
                    glow::TEXTURE_MIN_FILTER,
                    conv::filter_mode(descriptor.min_filter),
                );
                gl.tex_parameter_i32(
                    target,
                    glow::TEXTURE_MAG_FILTER,
                    conv::filter_mode(descriptor.mag_filter),
                );
                gl.tex_image_2d(
                    target,
                    0,
                    texel.internal as i32,
                    width,
                    height,
                    0,
                    texel.format,
                    texel.ty,
                    glow::PixelUnpackData::Slice(data),
                );
            }
            gl.bind_texture(target, None);
        }
        entry.descriptor = Some(*descriptor);
        state.check("texture definition")
    }

    fn write_texture(&self, id: TextureId, data: &[u8]) -> Result<(), ResourceError> {
        let state = self.state();
        let (raw, descriptor) = state.defined_texture(id)?;
        if descriptor.sample_count > 1 {
            return Err(ResourceError::InvalidOperation(
                "multisampled textures cannot be uploaded to".to_string(),
            ));
        }
        if data.len() != descriptor.byte_size() {
            return Err(ResourceError::OutOfBounds);
        }
        let texel = conv::texel_format(descriptor.format);

        unsafe {
            state.gl.active_texture(glow::TEXTURE0 + SCRATCH_TEXTURE_UNIT);
            state.gl.bind_texture(glow::TEXTURE_2D, Some(raw));
            state.gl.tex_sub_image_2d(
                glow::TEXTURE_2D,
                0,
                0,
                0,
                descriptor.width as i32,
                descriptor.height as i32,
                texel.format,
                texel.ty,
                glow::PixelUnpackData::Slice(Some(data)),
            );
            state.gl.bind_texture(glow::TEXTURE_2D, None);
        }
        Ok(())
    }

    fn bind_texture(&self, slot: u32, id: Option<TextureId>) -> Result<(), ResourceError> {
        if slot as usize >= TEXTURE_SLOT_COUNT {
            return Err(ResourceError::OutOfBounds);
        }
        let state = self.state();
        let (target, raw) = match id {
            Some(texture) => {
                let entry = state.texture(texture)?;
                let target = entry
                    .descriptor
                    .as_ref()
                    .map_or(glow::TEXTURE_2D, conv::texture_target);
                (target, Some(entry.raw))
            }
            None => (glow::TEXTURE_2D, None),
        };
        unsafe {
            state.gl.active_texture(glow::TEXTURE0 + slot);
            state.gl.bind_texture(target, raw);
        }
        Ok(())
    }

    fn clear_texture(&self, id: TextureId, value: ClearValue) -> Result<(), ResourceError> {
        let mut state = self.state();
        let (raw, descriptor) = state.defined_texture(id)?;
        let op = conv::clear_op(descriptor.format, value)?;
        let scratch = match state.scratch_framebuffer {
            Some(fb) => fb,
            None => {
                let fb =
                    unsafe { state.gl.create_framebuffer() }.map_err(ResourceError::Backend)?;
                state.scratch_framebuffer = Some(fb);
                fb
            }
        };
        let attachment = if descriptor.format.is_depth() {
            glow::DEPTH_STENCIL_ATTACHMENT
        } else {
            glow::COLOR_ATTACHMENT0
        };
        let target = conv::texture_target(&descriptor);

        state.clear_errors();
        state.with_draw_framebuffer(scratch, |gl| unsafe {
            gl.framebuffer_texture_2d(glow::DRAW_FRAMEBUFFER, attachment, target, Some(raw), 0);
            match op {
                conv::ClearOp::Int(v) => {
                    gl.draw_buffers(&[glow::COLOR_ATTACHMENT0]);
                    gl.clear_buffer_i32_slice(glow::COLOR, 0, &[v, 0, 0, 0]);
                }
                conv::ClearOp::Float(color) => {
                    gl.draw_buffers(&[glow::COLOR_ATTACHMENT0]);
                    gl.clear_buffer_f32_slice(glow::COLOR, 0, &color);
                }
                conv::ClearOp::DepthStencil(depth) => {
                    gl.clear_buffer_depth_stencil(glow::DEPTH_STENCIL, 0, depth, 0);
                }
            }
            gl.framebuffer_texture_2d(glow::DRAW_FRAMEBUFFER, attachment, target, None, 0);
        });
        state.check("texture clear")
    }

    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError> {
        let mut state = self.state();
        let entry = state
            .textures
            .remove(&id)
            .ok_or(ResourceError::InvalidHandle)?;
        unsafe { state.gl.delete_texture(entry.raw) };
        log::debug!("GlowDevice: Destroyed texture with ID: {id:?}");
        Ok(())
    }

    fn create_framebuffer(&self) -> Result<FramebufferId, ResourceError> {
        let mut state = self.state();
        let raw = unsafe { state.gl.create_framebuffer() }.map_err(ResourceError::Backend)?;
        let id = FramebufferId(self.generate_id());
        state.framebuffers.insert(
            id,
            FramebufferEntry {
                raw,
                colors: BTreeMap::new(),
                depth: None,
                draw_buffers: vec![0],
            },
        );
        Ok(id)
    }

    fn attach_texture(
        &self,
        fb: FramebufferId,
        point: AttachmentPoint,
        texture: TextureId,
    ) -> Result<(), ResourceError> {
        let mut guard = self.state();
        let state = &mut *guard;
        let texture_entry = state.texture(texture)?;
        let (texture_raw, target) = (
            texture_entry.raw,
            texture_entry
                .descriptor
                .as_ref()
                .map_or(glow::TEXTURE_2D, conv::texture_target),
        );
        let entry = state
            .framebuffers
            .get_mut(&fb)
            .ok_or(ResourceError::InvalidHandle)?;
        let attachment = match point {
            AttachmentPoint::Color(index)
                if index as usize >= FRAMEBUFFER_COLOR_ATTACHMENT_COUNT =>
            {
                return Err(ResourceError::OutOfBounds);
            }
            AttachmentPoint::Color(index) => {
                entry.colors.insert(index, texture);
                glow::COLOR_ATTACHMENT0 + index
            }
            AttachmentPoint::DepthStencil => {
                entry.depth = Some(texture);
                glow::DEPTH_STENCIL_ATTACHMENT
            }
        };

        let fb_raw = entry.raw;
        state.with_draw_framebuffer(fb_raw, |gl| unsafe {
            gl.framebuffer_texture_2d(
                glow::DRAW_FRAMEBUFFER,
                attachment,
                target,
                Some(texture_raw),
                0,
            );
        });
        Ok(())
    }

    fn set_draw_buffers(
        &self,
        fb: FramebufferId,
        attachments: &[u32],
    ) -> Result<(), ResourceError> {
        if attachments
            .iter()
            .any(|&i| i as usize >= FRAMEBUFFER_COLOR_ATTACHMENT_COUNT)
        {
            return Err(ResourceError::OutOfBounds);
        }
        let mut state = self.state();
        let raw = state
            .framebuffers
            .get(&fb)
            .ok_or(ResourceError::InvalidHandle)?
            .raw;
        let buffers: Vec<u32> = if attachments.is_empty() {
            vec![glow::NONE]
        } else {
            attachments
                .iter()
                .map(|i| glow::COLOR_ATTACHMENT0 + i)
                .collect()
        };
        state.with_draw_framebuffer(raw, |gl| unsafe { gl.draw_buffers(&buffers) });
        if let Some(entry) = state.framebuffers.get_mut(&fb) {
            entry.draw_buffers = attachments.to_vec();
        }
        Ok(())
    }

    fn framebuffer_status(&self, fb: FramebufferId) -> Result<FramebufferStatus, ResourceError> {
        let state = self.state();
        let raw = state
            .framebuffers
            .get(&fb)
            .ok_or(ResourceError::InvalidHandle)?
            .raw;
        let code = state.with_draw_framebuffer(raw, |gl| unsafe {
            gl.check_framebuffer_status(glow::DRAW_FRAMEBUFFER)
        });
        Ok(conv::framebuffer_status(code))
    }

    fn bind_framebuffer(
        &self,
        target: FrameBufferTarget,
        fb: Option<FramebufferId>,
    ) -> Result<(), ResourceError> {
        let mut state = self.state();
        let raw = match fb {
            Some(id) => Some(
                state
                    .framebuffers
                    .get(&id)
                    .ok_or(ResourceError::InvalidHandle)?
                    .raw,
            ),
            None => None,
        };
        let gl_target = match target {
            FrameBufferTarget::Reading => glow::READ_FRAMEBUFFER,
            FrameBufferTarget::Drawing => glow::DRAW_FRAMEBUFFER,
            FrameBufferTarget::Both => glow::FRAMEBUFFER,
        };
        unsafe { state.gl.bind_framebuffer(gl_target, raw) };
        if target.reads() {
            state.read_framebuffer = fb;
        }
        if target.draws() {
            state.draw_framebuffer = fb;
        }
        Ok(())
    }

    fn read_pixel(
        &self,
        fb: FramebufferId,
        attachment: u32,
        x: u32,
        y: u32,
    ) -> Result<i32, ResourceError> {
        let state = self.state();
        let entry = state
            .framebuffers
            .get(&fb)
            .ok_or(ResourceError::InvalidHandle)?;
        let texture = *entry.colors.get(&attachment).ok_or_else(|| {
            ResourceError::InvalidOperation(format!("no color attachment {attachment}"))
        })?;
        let (_, desc) = state.defined_texture(texture)?;
        if x >= desc.width || y >= desc.height {
            return Err(ResourceError::OutOfBounds);
        }
        if desc.sample_count > 1 {
            return Err(ResourceError::InvalidOperation(
                "multisampled attachments cannot be read back".to_string(),
            ));
        }

        let texel = conv::texel_format(desc.format);
        let bpp = desc.format.bytes_per_pixel();
        let mut raw = [0u8; 4];
        unsafe {
            state.gl.bind_framebuffer(glow::READ_FRAMEBUFFER, Some(entry.raw));
            state.gl.read_buffer(glow::COLOR_ATTACHMENT0 + attachment);
            state.gl.read_pixels(
                x as i32,
                y as i32,
                1,
                1,
                texel.format,
                texel.ty,
                glow::PixelPackData::Slice(Some(&mut raw[..bpp])),
            );
            state.gl.bind_framebuffer(
                glow::READ_FRAMEBUFFER,
                state.raw_framebuffer(state.read_framebuffer),
            );
        }
        Ok(i32::from_le_bytes(raw))
    }

    fn destroy_framebuffer(&self, fb: FramebufferId) -> Result<(), ResourceError> {
        let mut state = self.state();
        let entry = state
            .framebuffers
            .remove(&fb)
            .ok_or(ResourceError::InvalidHandle)?;
        if state.read_framebuffer == Some(fb) {
            state.read_framebuffer = None;
            unsafe { state.gl.bind_framebuffer(glow::READ_FRAMEBUFFER, None) };
        }
        if state.draw_framebuffer == Some(fb) {
            state.draw_framebuffer = None;
            unsafe { state.gl.bind_framebuffer(glow::DRAW_FRAMEBUFFER, None) };
        }
        unsafe { state.gl.delete_framebuffer(entry.raw) };
        Ok(())
    }

    fn set_viewport(&self, viewport: Viewport) -> Result<(), ResourceError> {
        let width = gl_size(viewport.width as usize)?;
        let height = gl_size(viewport.height as usize)?;
        let state = self.state();
        unsafe { state.gl.viewport(viewport.x, viewport.y, width, height) };
        Ok(())
    }

    fn set_clear_color(&self, color: Color) -> Result<(), ResourceError> {
        let mut state = self.state();
        let [r, g, b, a]: [f32; 4] = color.into();
        unsafe { state.gl.clear_color(r, g, b, a) };
        state.clear_color = color;
        Ok(())
    }

    fn clear(&self) -> Result<(), ResourceError> {
        let state = self.state();
        let Some(fb) = state.draw_framebuffer else {
            unsafe {
                state
                    .gl
                    .clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT)
            };
            return Ok(());
        };
        let entry = state
            .framebuffers
            .get(&fb)
            .ok_or(ResourceError::InvalidHandle)?;

        // Integer attachments are left alone; they are cleared explicitly.
        let color: [f32; 4] = state.clear_color.into();
        for (draw_index, attachment) in entry.draw_buffers.iter().enumerate() {
            let format = entry
                .colors
                .get(attachment)
                .and_then(|id| state.textures.get(id))
                .and_then(|t| t.descriptor)
                .map(|d| d.format);
            match format {
                None | Some(TextureFormat::R32Sint) => continue,
                Some(_) => unsafe {
                    state
                        .gl
                        .clear_buffer_f32_slice(glow::COLOR, draw_index as u32, &color)
                },
            }
        }
        if entry.depth.is_some() {
            unsafe {
                state
                    .gl
                    .clear_buffer_depth_stencil(glow::DEPTH_STENCIL, 0, 1.0, 0)
            };
        }
        Ok(())
    }

    fn draw_indexed(
        &self,
        topology: PrimitiveTopology,
        index_count: u32,
        format: IndexFormat,
    ) -> Result<(), ResourceError> {
        let state = self.state();
        let vao = state.bound_vertex_array.ok_or_else(|| {
            ResourceError::InvalidOperation("no vertex array bound".to_string())
        })?;
        if state.bound_program.is_none() {
            return Err(ResourceError::InvalidOperation(
                "no program in use".to_string(),
            ));
        }
        let index_buffer = state
            .vertex_arrays
            .get(&vao)
            .and_then(|v| v.index_buffer)
            .ok_or_else(|| {
                ResourceError::InvalidOperation("vertex array has no index buffer".to_string())
            })?;
        let index_bytes = state
            .buffers
            .get(&index_buffer)
            .and_then(|b| b.size)
            .ok_or(ResourceError::InvalidHandle)?;
        if index_count as usize * format.size() > index_bytes {
            return Err(ResourceError::OutOfBounds);
        }
        let count = gl_size(index_count as usize)?;

        state.clear_errors();
        unsafe {
            state.gl.draw_elements(
                conv::topology(topology),
                count,
                conv::index_type(format),
                0,
            );
        }
        state.check("indexed draw")
    }

    fn adapter_info(&self) -> RendererAdapterInfo {
        self.info.clone()
    }
}
