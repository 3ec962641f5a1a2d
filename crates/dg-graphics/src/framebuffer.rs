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


//! Off-screen render targets.

use dg_core::math::Color;
use dg_core::renderer::{
    AddressMode, AttachmentPoint, ClearValue, FilterMode, FrameBufferTarget,
    FrameBufferTextureFormat, FramebufferId, FramebufferStatus, GraphicsDevice, RenderError,
    TextureDescriptor, TextureId, Viewport, FRAMEBUFFER_COLOR_ATTACHMENT_COUNT,
};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Describes the size and attachments of a [`FrameBuffer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBufferSpecification {
    /// Width of every attachment, in pixels.
    pub width: u32,
    /// Height of every attachment, in pixels.
    pub height: u32,
    /// Samples per pixel. Values above 1 create multisampled attachments.
    pub sample_count: u32,
    /// Attachment formats in color-index order. At most one depth format is used.
    pub attachments: Vec<FrameBufferTextureFormat>,
}

impl Default for FrameBufferSpecification {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            sample_count: 1,
            attachments: Vec::new(),
        }
    }
}

impl FrameBufferSpecification {
    /// Returns `true` if attachments are multisampled.
    pub fn is_multisampled(&self) -> bool {
        self.sample_count > 1
    }
}

/// The device objects making up one build of a framebuffer.
///
/// Everything is released on drop, so a build that fails part way leaks
/// nothing.
#[derive(Debug)]
struct Attachments {
    device: Arc<dyn GraphicsDevice>,
    framebuffer: FramebufferId,
    colors: Vec<TextureId>,
    depth: Option<TextureId>,
}

impl Attachments {
    fn new(device: Arc<dyn GraphicsDevice>) -> Result<Self, RenderError> {
        let framebuffer = device.create_framebuffer()?;
        Ok(Self {
            device,
            framebuffer,
            colors: Vec::new(),
            depth: None,
        })
    }

    fn attach(
        &mut self,
        spec: &FrameBufferSpecification,
        format: FrameBufferTextureFormat,
        point: AttachmentPoint,
    ) -> Result<TextureId, RenderError> {
        let texture_format = format.texture_format().ok_or_else(|| {
            RenderError::BuildFailure(format!("attachment {point:?} has no storage format"))
        })?;
        let texture = self.device.create_texture()?;
        match point {
            AttachmentPoint::Color(_) => self.colors.push(texture),
            AttachmentPoint::DepthStencil => self.depth = Some(texture),
        }
        let descriptor = TextureDescriptor {
            width: spec.width,
            height: spec.height,
            format: texture_format,
            address_mode: AddressMode::ClampToEdge,
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            sample_count: spec.sample_count.max(1),
        };
        self.device.define_texture(texture, &descriptor, None)?;
        self.device.attach_texture(self.framebuffer, point, texture)?;
        Ok(texture)
    }
}

impl Drop for Attachments {
    fn drop(&mut self) {
        if let Err(e) = self.device.destroy_framebuffer(self.framebuffer) {
            log::warn!("Failed to release framebuffer {:?}: {e}", self.framebuffer);
        }
        for id in self.colors.drain(..).chain(self.depth.take()) {
            if let Err(e) = self.device.destroy_texture(id) {
                log::warn!("Failed to release framebuffer attachment {id:?}: {e}");
            }
        }
    }
}

/// A render target aggregating up to four color attachments and one
/// depth/stencil attachment.
///
/// Changing the size rebuilds every attachment from scratch. Rebuilds take
/// `&self`, so a framebuffer shared with the renderer can still be resized;
/// every successful build bumps [`FrameBuffer::generation`].
#[derive(Debug)]
pub struct FrameBuffer {
    device: Arc<dyn GraphicsDevice>,
    color_formats: Vec<FrameBufferTextureFormat>,
    depth_format: FrameBufferTextureFormat,
    state: RwLock<FrameBufferState>,
}

#[derive(Debug)]
struct FrameBufferState {
    spec: FrameBufferSpecification,
    attachments: Attachments,
    generation: u64,
}

impl FrameBuffer {
    /// Creates and builds a framebuffer.
    ///
    /// # Errors
    ///
    /// * [`RenderError::ResourceLimitExceeded`] - More than four color attachments.
    /// * [`RenderError::BuildFailure`] - The device reports the framebuffer incomplete.
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        spec: FrameBufferSpecification,
    ) -> Result<Self, RenderError> {
        let mut color_formats = Vec::new();
        let mut depth_format = FrameBufferTextureFormat::None;
        for &format in &spec.attachments {
            if format.is_depth() {
                if depth_format != FrameBufferTextureFormat::None {
                    log::warn!("Framebuffer has more than one depth attachment, using the last.");
                }
                depth_format = format;
            } else if format.is_color() {
                color_formats.push(format);
            }
        }
        if color_formats.len() > FRAMEBUFFER_COLOR_ATTACHMENT_COUNT {
            log::error!(
                "Too many color attachments ({}) on this framebuffer!",
                color_formats.len()
            );
            return Err(RenderError::ResourceLimitExceeded {
                what: "framebuffer color attachment",
                requested: color_formats.len(),
                limit: FRAMEBUFFER_COLOR_ATTACHMENT_COUNT,
            });
        }

        let attachments = Self::build_attachments(&device, &spec, &color_formats, depth_format)?;
        Ok(Self {
            device,
            color_formats,
            depth_format,
            state: RwLock::new(FrameBufferState {
                spec,
                attachments,
                generation: 1,
            }),
        })
    }

    fn read_state(&self) -> RwLockReadGuard<'_, FrameBufferState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, FrameBufferState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn build_attachments(
        device: &Arc<dyn GraphicsDevice>,
        spec: &FrameBufferSpecification,
        color_formats: &[FrameBufferTextureFormat],
        depth_format: FrameBufferTextureFormat,
    ) -> Result<Attachments, RenderError> {
        let mut attachments = Attachments::new(device.clone())?;
        for (index, &format) in color_formats.iter().enumerate() {
            attachments.attach(spec, format, AttachmentPoint::Color(index as u32))?;
        }
        if depth_format != FrameBufferTextureFormat::None {
            attachments.attach(spec, depth_format, AttachmentPoint::DepthStencil)?;
        }

        let draw_buffers: Vec<u32> = (0..color_formats.len() as u32).collect();
        device.set_draw_buffers(attachments.framebuffer, &draw_buffers)?;

        match device.framebuffer_status(attachments.framebuffer)? {
            FramebufferStatus::Complete => Ok(attachments),
            FramebufferStatus::Incomplete(reason) => {
                log::error!("Unable to build a complete framebuffer: {reason}");
                Err(RenderError::BuildFailure(format!(
                    "incomplete framebuffer: {reason}"
                )))
            }
        }
    }

    /// Builds a new attachment set for `spec` and swaps it in.
    ///
    /// The previous attachments are released only once the new set is
    /// complete; on failure the framebuffer keeps its previous state.
    fn rebuild(
        &self,
        state: &mut FrameBufferState,
        spec: FrameBufferSpecification,
    ) -> Result<(), RenderError> {
        let attachments =
            Self::build_attachments(&self.device, &spec, &self.color_formats, self.depth_format)?;
        state.attachments = attachments;
        state.spec = spec;
        state.generation += 1;
        log::debug!(
            "Built framebuffer {:?} ({}x{}, {} color attachments)",
            state.attachments.framebuffer,
            state.spec.width,
            state.spec.height,
            state.attachments.colors.len()
        );
        Ok(())
    }

    /// Recreates every attachment from the current specification.
    ///
    /// A framebuffer rebuilt while bound is no longer bound afterwards.
    pub fn build(&self) -> Result<(), RenderError> {
        let mut state = self.write_state();
        let spec = state.spec.clone();
        self.rebuild(&mut state, spec)
    }

    /// The device handle of the framebuffer itself.
    pub fn id(&self) -> FramebufferId {
        self.read_state().attachments.framebuffer
    }

    /// Counts successful builds, starting at 1 for the initial build.
    pub fn generation(&self) -> u64 {
        self.read_state().generation
    }

    /// The specification of the current build.
    pub fn specification(&self) -> FrameBufferSpecification {
        self.read_state().spec.clone()
    }

    /// The number of color attachments.
    pub fn color_attachment_count(&self) -> usize {
        self.color_formats.len()
    }

    /// Binds the framebuffer.
    ///
    /// Binding for drawing also resizes the viewport to the framebuffer and
    /// clears it.
    pub fn bind(&self, target: FrameBufferTarget) -> Result<(), RenderError> {
        let state = self.read_state();
        self.device
            .bind_framebuffer(target, Some(state.attachments.framebuffer))?;
        if target.draws() {
            self.device.set_viewport(Viewport {
                x: 0,
                y: 0,
                width: state.spec.width,
                height: state.spec.height,
            })?;
            self.device.clear()?;
        }
        Ok(())
    }

    /// Restores the default framebuffer on `target`.
    pub fn unbind(&self, target: FrameBufferTarget) -> Result<(), RenderError> {
        self.device.bind_framebuffer(target, None)?;
        Ok(())
    }

    fn check_color_index(&self, index: usize) -> Result<(), RenderError> {
        if index >= self.color_formats.len() {
            log::error!("Framebuffer color attachment index {index} is out of range!");
            return Err(RenderError::ResourceLimitExceeded {
                what: "framebuffer color attachment",
                requested: index,
                limit: self.color_formats.len(),
            });
        }
        Ok(())
    }

    /// Fills a color attachment with one value.
    ///
    /// Integer attachments store `value` as is; normalized attachments read
    /// it as `0xRRGGBBAA`.
    pub fn clear_color_attachment(&self, index: usize, value: i32) -> Result<(), RenderError> {
        self.check_color_index(index)?;
        let clear = match self.color_formats[index] {
            FrameBufferTextureFormat::ColorR32 => ClearValue::Int(value),
            _ => ClearValue::Float(Color::from_rgba_u32(value as u32).into()),
        };
        let state = self.read_state();
        self.device
            .clear_texture(state.attachments.colors[index], clear)?;
        Ok(())
    }

    /// Reads one pixel of a color attachment as a raw integer.
    ///
    /// Returns `-1` when the coordinates fall outside the framebuffer.
    pub fn read_pixel(&self, index: usize, x: i32, y: i32) -> Result<i32, RenderError> {
        self.check_color_index(index)?;
        let state = self.read_state();
        let (width, height) = (state.spec.width, state.spec.height);
        if x < 0 || y < 0 || x as u32 >= width || y as u32 >= height {
            return Ok(-1);
        }
        Ok(self.device.read_pixel(
            state.attachments.framebuffer,
            index as u32,
            x as u32,
            y as u32,
        )?)
    }

    /// [`FrameBuffer::read_pixel`] with fractional coordinates, truncated.
    pub fn read_pixel_f(&self, index: usize, x: f32, y: f32) -> Result<i32, RenderError> {
        self.read_pixel(index, x as i32, y as i32)
    }

    /// The texture backing a color attachment.
    pub fn color_handle(&self, index: usize) -> Result<TextureId, RenderError> {
        self.check_color_index(index)?;
        Ok(self.read_state().attachments.colors[index])
    }

    /// The texture backing the depth/stencil attachment, if any.
    pub fn depth_handle(&self) -> Option<TextureId> {
        self.read_state().attachments.depth
    }

    /// The size in pixels.
    pub fn size(&self) -> (u32, u32) {
        let state = self.read_state();
        (state.spec.width, state.spec.height)
    }

    /// Resizes the framebuffer, rebuilding all attachments.
    ///
    /// Returns `false` without touching anything if either dimension is zero
    /// or the size is unchanged. On error the previous size and attachments
    /// are kept.
    pub fn set_size(&self, width: u32, height: u32) -> Result<bool, RenderError> {
        if width == 0 || height == 0 {
            log::warn!("Ignoring framebuffer resize to {width}x{height}.");
            return Ok(false);
        }
        let mut state = self.write_state();
        if (width, height) == (state.spec.width, state.spec.height) {
            return Ok(false);
        }

        let spec = FrameBufferSpecification {
            width,
            height,
            ..state.spec.clone()
        };
        self.rebuild(&mut state, spec)?;
        Ok(true)
    }
}
