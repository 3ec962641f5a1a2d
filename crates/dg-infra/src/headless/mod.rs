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

//! An in-memory [`GraphicsDevice`] that validates every call.
//!
//! Buffers and textures hold their real bytes, programs are "compiled" by a
//! declaration scanner, and every draw is recorded so callers can inspect
//! exactly what a frame submitted.

mod glsl;
mod stats;

pub use self::stats::{DeviceStats, DrawRecord};

use self::glsl::{CompiledStage, UniformDecl};
use dg_core::math::Color;
use dg_core::renderer::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct BufferEntry {
    data: Vec<u8>,
    usage: Option<BufferUsage>,
}

#[derive(Debug, Default)]
struct VertexArrayEntry {
    vertex_buffers: Vec<(BufferId, u32, VertexLayout)>,
    index_buffer: Option<(BufferId, IndexFormat)>,
}

/// One addressable uniform. Arrays are flattened to one slot per element.
#[derive(Debug)]
struct UniformSlot {
    name: String,
    ty: String,
    value: Option<UniformValue>,
}

#[derive(Debug)]
struct ProgramEntry {
    uniforms: Vec<UniformSlot>,
}

impl ProgramEntry {
    fn from_decls(decls: &[UniformDecl]) -> Self {
        let mut uniforms = Vec::new();
        for decl in decls {
            match decl.array_len {
                None => uniforms.push(UniformSlot {
                    name: decl.name.clone(),
                    ty: decl.ty.clone(),
                    value: None,
                }),
                Some(len) => uniforms.extend((0..len).map(|i| UniformSlot {
                    name: format!("{}[{i}]", decl.name),
                    ty: decl.ty.clone(),
                    value: None,
                })),
            }
        }
        Self { uniforms }
    }

    fn find(&self, name: &str) -> Option<usize> {
        let element0 = format!("{name}[0]");
        self.uniforms
            .iter()
            .position(|u| u.name == name || u.name == element0)
    }
}

#[derive(Debug, Default)]
struct TextureEntry {
    descriptor: Option<TextureDescriptor>,
    data: Vec<u8>,
}

#[derive(Debug, Default)]
struct FramebufferEntry {
    colors: BTreeMap<u32, TextureId>,
    depth: Option<TextureId>,
    draw_buffers: Option<Vec<u32>>,
}

#[derive(Debug, Default)]
struct DeviceState {
    buffers: HashMap<BufferId, BufferEntry>,
    vertex_arrays: HashMap<VertexArrayId, VertexArrayEntry>,
    shaders: HashMap<ShaderId, CompiledStage>,
    programs: HashMap<ProgramId, ProgramEntry>,
    textures: HashMap<TextureId, TextureEntry>,
    framebuffers: HashMap<FramebufferId, FramebufferEntry>,

    bound_vertex_array: Option<VertexArrayId>,
    bound_program: Option<ProgramId>,
    texture_units: [Option<TextureId>; TEXTURE_SLOT_COUNT],
    read_framebuffer: Option<FramebufferId>,
    draw_framebuffer: Option<FramebufferId>,
    viewport: Viewport,
    clear_color: Color,

    stats: DeviceStats,
    binds_since_draw: usize,
    draw_log: Vec<DrawRecord>,
}

/// A graphics device that keeps every resource in host memory.
#[derive(Debug)]
pub struct HeadlessDevice {
    state: Mutex<DeviceState>,
    next_id: AtomicUsize,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDevice {
    /// Creates a device with no resources and a black clear color.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DeviceState {
                clear_color: Color::BLACK,
                ..DeviceState::default()
            }),
            next_id: AtomicUsize::new(1),
        }
    }

    fn state(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn generate_id(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Returns the counters accumulated so far, with current live counts.
    pub fn stats(&self) -> DeviceStats {
        let state = self.state();
        DeviceStats {
            live_buffers: state.buffers.len(),
            live_vertex_arrays: state.vertex_arrays.len(),
            live_shaders: state.shaders.len(),
            live_programs: state.programs.len(),
            live_textures: state.textures.len(),
            live_framebuffers: state.framebuffers.len(),
            ..state.stats
        }
    }

    /// Returns every draw recorded so far, in submission order.
    pub fn draw_log(&self) -> Vec<DrawRecord> {
        self.state().draw_log.clone()
    }

    /// Forgets recorded draws. Counters are kept.
    pub fn clear_draw_log(&self) {
        self.state().draw_log.clear();
    }

    /// Returns the last value set for a uniform, by name.
    pub fn uniform_value(&self, program: ProgramId, name: &str) -> Option<UniformValue> {
        let state = self.state();
        let entry = state.programs.get(&program)?;
        let index = entry.find(name)?;
        entry.uniforms[index].value.clone()
    }

    /// Returns a copy of a buffer's storage.
    pub fn buffer_contents(&self, id: BufferId) -> Option<Vec<u8>> {
        self.state().buffers.get(&id).map(|b| b.data.clone())
    }

    /// Returns a copy of a texture's texels.
    pub fn texture_contents(&self, id: TextureId) -> Option<Vec<u8>> {
        self.state().textures.get(&id).map(|t| t.data.clone())
    }

    /// Returns a texture's current descriptor, if it has been defined.
    pub fn texture_descriptor(&self, id: TextureId) -> Option<TextureDescriptor> {
        self.state().textures.get(&id).and_then(|t| t.descriptor)
    }

    /// The program currently in use.
    pub fn bound_program(&self) -> Option<ProgramId> {
        self.state().bound_program
    }

    /// The framebuffer bound for drawing.
    pub fn draw_framebuffer(&self) -> Option<FramebufferId> {
        self.state().draw_framebuffer
    }

    /// The framebuffer bound for reading.
    pub fn read_framebuffer(&self) -> Option<FramebufferId> {
        self.state().read_framebuffer
    }

    /// The current viewport.
    pub fn viewport(&self) -> Viewport {
        self.state().viewport
    }

    /// The current clear color.
    pub fn clear_color(&self) -> Color {
        self.state().clear_color
    }
}

fn uniform_accepts(declared: &str, value: &UniformValue) -> bool {
    declared == value.glsl_type()
        || (declared.starts_with("sampler") && matches!(value, UniformValue::Int(_)))
}

fn fill_texels(entry: &mut TextureEntry, texel: &[u8]) {
    for chunk in entry.data.chunks_exact_mut(texel.len()) {
        chunk.copy_from_slice(texel);
    }
}

fn quantize(color: [f32; 4], channels: usize) -> Vec<u8> {
    color[..channels]
        .iter()
        .map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
        .collect()
}

fn texel_for(format: TextureFormat, value: ClearValue) -> Result<Vec<u8>, ResourceError> {
    match (format, value) {
        (TextureFormat::R32Sint, ClearValue::Int(v)) => Ok(v.to_le_bytes().to_vec()),
        (TextureFormat::R32Sint, ClearValue::Float(_)) => Err(ResourceError::InvalidOperation(
            "integer texture cleared with a float value".to_string(),
        )),
        (TextureFormat::Depth24Stencil8, ClearValue::Float(c)) => {
            let depth = (c[0].clamp(0.0, 1.0) * 16_777_215.0) as u32;
            Ok((depth << 8).to_le_bytes().to_vec())
        }
        (_, ClearValue::Float(c)) => Ok(quantize(c, format.bytes_per_pixel())),
        (_, ClearValue::Int(_)) => Err(ResourceError::InvalidOperation(format!(
            "{format:?} texture cleared with an integer value"
        ))),
    }
}

fn check_status(state: &DeviceState, entry: &FramebufferEntry) -> FramebufferStatus {
    if entry.colors.is_empty() && entry.depth.is_none() {
        return FramebufferStatus::Incomplete("no attachments".to_string());
    }

    let mut size = None;
    let attached = entry
        .colors
        .iter()
        .map(|(i, id)| (AttachmentPoint::Color(*i), *id))
        .chain(entry.depth.map(|id| (AttachmentPoint::DepthStencil, id)));
    for (point, id) in attached {
        let Some(desc) = state.textures.get(&id).and_then(|t| t.descriptor) else {
            return FramebufferStatus::Incomplete(format!("{point:?} has no storage"));
        };
        let is_depth_point = point == AttachmentPoint::DepthStencil;
        if desc.format.is_depth() != is_depth_point {
            return FramebufferStatus::Incomplete(format!(
                "{point:?} has incompatible format {:?}",
                desc.format
            ));
        }
        match size {
            None => size = Some((desc.width, desc.height, desc.sample_count)),
            Some(s) if s != (desc.width, desc.height, desc.sample_count) => {
                return FramebufferStatus::Incomplete(format!(
                    "{point:?} size or sample count differs from other attachments"
                ));
            }
            Some(_) => {}
        }
    }

    if let Some(draw_buffers) = &entry.draw_buffers {
        if let Some(missing) = draw_buffers.iter().find(|i| !entry.colors.contains_key(*i)) {
            return FramebufferStatus::Incomplete(format!(
                "draw buffer {missing} has no color attachment"
            ));
        }
    }
    FramebufferStatus::Complete
}

impl GraphicsDevice for HeadlessDevice {
    fn create_buffer(&self) -> Result<BufferId, ResourceError> {
        let id = BufferId(self.generate_id());
        self.state().buffers.insert(id, BufferEntry::default());
        log::debug!("HeadlessDevice: Created buffer with ID: {id:?}");
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
        let entry = state
            .buffers
            .get_mut(&id)
            .ok_or(ResourceError::InvalidHandle)?;

        entry.data = match data {
            Some(bytes) if bytes.len() != size => {
                return Err(ResourceError::InvalidOperation(format!(
                    "initial data is {} bytes, buffer is {size}",
                    bytes.len()
                )));
            }
            Some(bytes) => bytes.to_vec(),
            None => vec![0; size],
        };
        entry.usage = Some(usage);

        if data.is_some() {
            state.stats.buffer_writes += 1;
            state.stats.bytes_uploaded += size;
        }
        Ok(())
    }

    fn write_buffer(&self, id: BufferId, offset: usize, data: &[u8]) -> Result<(), ResourceError> {
        let mut state = self.state();
        let entry = state
            .buffers
            .get_mut(&id)
            .ok_or(ResourceError::InvalidHandle)?;
        if entry.usage.is_none() {
            return Err(ResourceError::InvalidOperation(
                "buffer has no storage".to_string(),
            ));
        }
        let end = offset + data.len();
        if end > entry.data.len() {
            return Err(ResourceError::OutOfBounds);
        }
        entry.data[offset..end].copy_from_slice(data);

        state.stats.buffer_writes += 1;
        state.stats.bytes_uploaded += data.len();
        log::trace!(
            "HeadlessDevice: Wrote {} bytes to buffer ID: {:?} at offset {}",
            data.len(),
            id,
            offset
        );
        Ok(())
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        match self.state().buffers.remove(&id) {
            Some(_) => {
                log::debug!("HeadlessDevice: Destroyed buffer with ID: {id:?}");
                Ok(())
            }
            None => Err(ResourceError::InvalidHandle),
        }
    }

    fn create_vertex_array(&self) -> Result<VertexArrayId, ResourceError> {
        let id = VertexArrayId(self.generate_id());
        self.state()
            .vertex_arrays
            .insert(id, VertexArrayEntry::default());
        Ok(id)
    }

    fn set_vertex_buffer(
        &self,
        vao: VertexArrayId,
        buffer: BufferId,
        first_location: u32,
        layout: &VertexLayout,
    ) -> Result<(), ResourceError> {
        let mut state = self.state();
        if !state.buffers.contains_key(&buffer) {
            return Err(ResourceError::InvalidHandle);
        }
        if layout.is_empty() {
            return Err(ResourceError::InvalidOperation(
                "vertex buffer layout has no attributes".to_string(),
            ));
        }
        let entry = state
            .vertex_arrays
            .get_mut(&vao)
            .ok_or(ResourceError::InvalidHandle)?;
        entry
            .vertex_buffers
            .push((buffer, first_location, layout.clone()));
        Ok(())
    }

    fn set_index_buffer(
        &self,
        vao: VertexArrayId,
        buffer: BufferId,
        format: IndexFormat,
    ) -> Result<(), ResourceError> {
        let mut state = self.state();
        if !state.buffers.contains_key(&buffer) {
            return Err(ResourceError::InvalidHandle);
        }
        let entry = state
            .vertex_arrays
            .get_mut(&vao)
            .ok_or(ResourceError::InvalidHandle)?;
        entry.index_buffer = Some((buffer, format));
        Ok(())
    }

    fn bind_vertex_array(&self, vao: Option<VertexArrayId>) -> Result<(), ResourceError> {
        let mut state = self.state();
        if let Some(id) = vao {
            if !state.vertex_arrays.contains_key(&id) {
                return Err(ResourceError::InvalidHandle);
            }
        }
        state.bound_vertex_array = vao;
        Ok(())
    }

    fn destroy_vertex_array(&self, vao: VertexArrayId) -> Result<(), ResourceError> {
        let mut state = self.state();
        state
            .vertex_arrays
            .remove(&vao)
            .ok_or(ResourceError::InvalidHandle)?;
        if state.bound_vertex_array == Some(vao) {
            state.bound_vertex_array = None;
        }
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
        let compiled =
            glsl::compile(stage, source).map_err(|log| ShaderError::Compilation { stage, log })?;
        let warnings = compiled.warnings.clone();
        let id = ShaderId(self.generate_id());
        self.state().shaders.insert(id, compiled);
        Ok((id, warnings))
    }

    fn link_program(
        &self,
        vertex: ShaderId,
        fragment: ShaderId,
    ) -> Result<(ProgramId, String), ShaderError> {
        let mut state = self.state();
        let (Some(vs), Some(fs)) = (state.shaders.get(&vertex), state.shaders.get(&fragment))
        else {
            return Err(ShaderError::Link {
                log: "ERROR: attached shader stage does not exist".to_string(),
            });
        };
        let uniforms = glsl::link(vs, fs).map_err(|log| ShaderError::Link { log })?;
        let id = ProgramId(self.generate_id());
        state.programs.insert(id, ProgramEntry::from_decls(&uniforms));
        log::debug!(
            "HeadlessDevice: Linked program {id:?} with {} uniforms",
            uniforms.len()
        );
        Ok((id, String::new()))
    }

    fn destroy_shader(&self, id: ShaderId) -> Result<(), ResourceError> {
        self.state()
            .shaders
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::InvalidHandle)
    }

    fn destroy_program(&self, id: ProgramId) -> Result<(), ResourceError> {
        let mut state = self.state();
        state
            .programs
            .remove(&id)
            .ok_or(ResourceError::InvalidHandle)?;
        if state.bound_program == Some(id) {
            state.bound_program = None;
        }
        Ok(())
    }

    fn use_program(&self, program: Option<ProgramId>) -> Result<(), ResourceError> {
        let mut state = self.state();
        if let Some(id) = program {
            if !state.programs.contains_key(&id) {
                return Err(ResourceError::InvalidHandle);
            }
        }
        state.bound_program = program;
        Ok(())
    }

    fn uniform_location(
        &self,
        program: ProgramId,
        name: &str,
    ) -> Result<Option<UniformLocation>, ResourceError> {
        let state = self.state();
        let entry = state
            .programs
            .get(&program)
            .ok_or(ResourceError::InvalidHandle)?;
        Ok(entry.find(name).map(|i| UniformLocation(i as u32)))
    }

    fn set_uniform(
        &self,
        program: ProgramId,
        location: UniformLocation,
        value: &UniformValue,
    ) -> Result<(), ResourceError> {
        let mut state = self.state();
        let entry = state
            .programs
            .get_mut(&program)
            .ok_or(ResourceError::InvalidHandle)?;
        let slot = entry
            .uniforms
            .get_mut(location.0 as usize)
            .ok_or(ResourceError::OutOfBounds)?;
        if !uniform_accepts(&slot.ty, value) {
            return Err(ResourceError::InvalidOperation(format!(
                "uniform '{}' is declared '{}' but was given a {}",
                slot.name,
                slot.ty,
                value.glsl_type()
            )));
        }
        slot.value = Some(value.clone());
        Ok(())
    }

    fn create_texture(&self) -> Result<TextureId, ResourceError> {
        let id = TextureId(self.generate_id());
        self.state().textures.insert(id, TextureEntry::default());
        log::debug!("HeadlessDevice: Created texture with ID: {id:?}");
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
        let size = descriptor.byte_size();
        if let Some(bytes) = data {
            if bytes.len() != size {
                return Err(ResourceError::InvalidOperation(format!(
                    "texture data is {} bytes, expected {size}",
                    bytes.len()
                )));
            }
        }

        let mut state = self.state();
        let entry = state
            .textures
            .get_mut(&id)
            .ok_or(ResourceError::InvalidHandle)?;
        entry.descriptor = Some(*descriptor);
        entry.data = data.map_or_else(|| vec![0; size], <[u8]>::to_vec);
        if data.is_some() {
            state.stats.bytes_uploaded += size;
        }
        Ok(())
    }

    fn write_texture(&self, id: TextureId, data: &[u8]) -> Result<(), ResourceError> {
        let mut state = self.state();
        let entry = state
            .textures
            .get_mut(&id)
            .ok_or(ResourceError::InvalidHandle)?;
        let descriptor = entry.descriptor.ok_or_else(|| {
            ResourceError::InvalidOperation("texture has no storage".to_string())
        })?;
        if data.len() != descriptor.byte_size() {
            return Err(ResourceError::OutOfBounds);
        }
        entry.data.copy_from_slice(data);
        state.stats.bytes_uploaded += data.len();
        Ok(())
    }

    fn bind_texture(&self, slot: u32, id: Option<TextureId>) -> Result<(), ResourceError> {
        let slot = slot as usize;
        if slot >= TEXTURE_SLOT_COUNT {
            return Err(ResourceError::OutOfBounds);
        }
        let mut state = self.state();
        if let Some(texture) = id {
            if !state.textures.contains_key(&texture) {
                return Err(ResourceError::InvalidHandle);
            }
            state.stats.texture_binds += 1;
            state.binds_since_draw += 1;
        }
        state.texture_units[slot] = id;
        Ok(())
    }

    fn clear_texture(&self, id: TextureId, value: ClearValue) -> Result<(), ResourceError> {
        let mut state = self.state();
        let entry = state
            .textures
            .get_mut(&id)
            .ok_or(ResourceError::InvalidHandle)?;
        let descriptor = entry.descriptor.ok_or_else(|| {
            ResourceError::InvalidOperation("texture has no storage".to_string())
        })?;
        let texel = texel_for(descriptor.format, value)?;
        fill_texels(entry, &texel);
        Ok(())
    }

    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError> {
        let mut state = self.state();
        state
            .textures
            .remove(&id)
            .ok_or(ResourceError::InvalidHandle)?;
        for unit in state.texture_units.iter_mut() {
            if *unit == Some(id) {
                *unit = None;
            }
        }
        log::debug!("HeadlessDevice: Destroyed texture with ID: {id:?}");
        Ok(())
    }

    fn create_framebuffer(&self) -> Result<FramebufferId, ResourceError> {
        let id = FramebufferId(self.generate_id());
        self.state()
            .framebuffers
            .insert(id, FramebufferEntry::default());
        Ok(id)
    }

    fn attach_texture(
        &self,
        fb: FramebufferId,
        point: AttachmentPoint,
        texture: TextureId,
    ) -> Result<(), ResourceError> {
        let mut state = self.state();
        if !state.textures.contains_key(&texture) {
            return Err(ResourceError::InvalidHandle);
        }
        let entry = state
            .framebuffers
            .get_mut(&fb)
            .ok_or(ResourceError::InvalidHandle)?;
        match point {
            AttachmentPoint::Color(index)
                if index as usize >= FRAMEBUFFER_COLOR_ATTACHMENT_COUNT =>
            {
                return Err(ResourceError::OutOfBounds);
            }
            AttachmentPoint::Color(index) => {
                entry.colors.insert(index, texture);
            }
            AttachmentPoint::DepthStencil => entry.depth = Some(texture),
        }
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
        let entry = state
            .framebuffers
            .get_mut(&fb)
            .ok_or(ResourceError::InvalidHandle)?;
        entry.draw_buffers = Some(attachments.to_vec());
        Ok(())
    }

    fn framebuffer_status(&self, fb: FramebufferId) -> Result<FramebufferStatus, ResourceError> {
        let state = self.state();
        let entry = state
            .framebuffers
            .get(&fb)
            .ok_or(ResourceError::InvalidHandle)?;
        Ok(check_status(&state, entry))
    }

    fn bind_framebuffer(
        &self,
        target: FrameBufferTarget,
        fb: Option<FramebufferId>,
    ) -> Result<(), ResourceError> {
        let mut state = self.state();
        if let Some(id) = fb {
            if !state.framebuffers.contains_key(&id) {
                return Err(ResourceError::InvalidHandle);
            }
        }
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
        let texture_id = entry.colors.get(&attachment).ok_or_else(|| {
            ResourceError::InvalidOperation(format!("no color attachment {attachment}"))
        })?;
        let texture = state
            .textures
            .get(texture_id)
            .ok_or(ResourceError::InvalidHandle)?;
        let desc = texture.descriptor.ok_or(ResourceError::InvalidHandle)?;
        if x >= desc.width || y >= desc.height {
            return Err(ResourceError::OutOfBounds);
        }

        let bpp = desc.format.bytes_per_pixel();
        let start = (y as usize * desc.width as usize + x as usize) * bpp;
        let texel = &texture.data[start..start + bpp];
        let mut raw = [0u8; 4];
        raw[..bpp].copy_from_slice(texel);
        Ok(i32::from_le_bytes(raw))
    }

    fn destroy_framebuffer(&self, fb: FramebufferId) -> Result<(), ResourceError> {
        let mut state = self.state();
        state
            .framebuffers
            .remove(&fb)
            .ok_or(ResourceError::InvalidHandle)?;
        if state.read_framebuffer == Some(fb) {
            state.read_framebuffer = None;
        }
        if state.draw_framebuffer == Some(fb) {
            state.draw_framebuffer = None;
        }
        Ok(())
    }

    fn set_viewport(&self, viewport: Viewport) -> Result<(), ResourceError> {
        self.state().viewport = viewport;
        Ok(())
    }

    fn set_clear_color(&self, color: Color) -> Result<(), ResourceError> {
        self.state().clear_color = color;
        Ok(())
    }

    fn clear(&self) -> Result<(), ResourceError> {
        let mut state = self.state();
        let Some(fb) = state.draw_framebuffer else {
            return Ok(());
        };
        let entry = state
            .framebuffers
            .get(&fb)
            .ok_or(ResourceError::InvalidHandle)?;

        // Integer attachments are left alone; they are cleared explicitly.
        let mut targets: Vec<(TextureId, ClearValue)> = entry
            .colors
            .iter()
            .filter(|(i, _)| {
                entry
                    .draw_buffers
                    .as_ref()
                    .map_or(true, |list| list.contains(*i))
            })
            .map(|(_, id)| (*id, ClearValue::Float(state.clear_color.into())))
            .collect();
        if let Some(depth) = entry.depth {
            targets.push((depth, ClearValue::Float([1.0; 4])));
        }

        for (id, value) in targets {
            if let Some(texture) = state.textures.get_mut(&id) {
                let Some(desc) = texture.descriptor else {
                    continue;
                };
                if desc.format == TextureFormat::R32Sint {
                    continue;
                }
                let texel = texel_for(desc.format, value)?;
                fill_texels(texture, &texel);
            }
        }
        Ok(())
    }

    fn draw_indexed(
        &self,
        topology: PrimitiveTopology,
        index_count: u32,
        format: IndexFormat,
    ) -> Result<(), ResourceError> {
        let mut state = self.state();
        let vao = state.bound_vertex_array.ok_or_else(|| {
            ResourceError::InvalidOperation("no vertex array bound".to_string())
        })?;
        let program = state
            .bound_program
            .ok_or_else(|| ResourceError::InvalidOperation("no program in use".to_string()))?;
        let (index_buffer, _) = state
            .vertex_arrays
            .get(&vao)
            .and_then(|v| v.index_buffer)
            .ok_or_else(|| {
                ResourceError::InvalidOperation("vertex array has no index buffer".to_string())
            })?;
        let index_bytes = state
            .buffers
            .get(&index_buffer)
            .map(|b| b.data.len())
            .ok_or(ResourceError::InvalidHandle)?;
        if index_count as usize * format.size() > index_bytes {
            return Err(ResourceError::OutOfBounds);
        }

        let record = DrawRecord {
            topology,
            index_count,
            index_format: format,
            vertex_array: vao,
            program,
            framebuffer: state.draw_framebuffer,
            texture_slots: state.texture_units.to_vec(),
            texture_binds: state.binds_since_draw,
        };
        state.draw_log.push(record);
        state.binds_since_draw = 0;
        state.stats.draw_calls += 1;
        state.stats.indices_drawn += index_count as usize;
        Ok(())
    }

    fn adapter_info(&self) -> RendererAdapterInfo {
        RendererAdapterInfo {
            name: "DG Headless Adapter".to_string(),
            backend: "headless".to_string(),
            max_texture_slots: TEXTURE_SLOT_COUNT,
            max_color_attachments: FRAMEBUFFER_COLOR_ATTACHMENT_COUNT,
        }
    }
}
