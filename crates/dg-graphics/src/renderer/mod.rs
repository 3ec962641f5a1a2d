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


//! The batched 2D quad renderer.
//!
//! A frame is driven in a fixed order:
//!
//! 1. [`Renderer::use_frame_buffer_2d`] and [`Renderer::use_quad_shader_2d`]
//!    when the target or shader changes,
//! 2. [`Renderer::begin_scene_2d`] with the camera transform,
//! 3. any number of [`Renderer::submit_quad_2d`],
//! 4. [`Renderer::end_scene_2d`].
//!
//! Quads are staged on the CPU and drawn in as few draw calls as possible.
//! A batch is flushed early when its vertex, index or texture slot capacity
//! is reached, or when the target or shader changes mid-scene.

mod data;

pub use data::{
    quad_indices, QuadVertex2D, RenderData2D, QUAD_INDEX_PATTERN, QUAD_TEXTURE_COORDINATES,
    QUAD_VERTEX_POSITIONS,
};

use crate::framebuffer::FrameBuffer;
use crate::render_interface::RenderInterface;
use crate::shader::Shader;
use crate::texture::Texture;
use dg_core::math::{degrees_to_radians, Color, Mat4, Vec2, Vec3};
use dg_core::renderer::{FrameBufferTarget, GraphicsDevice, RenderError, TEXTURE_SLOT_COUNT};
use std::sync::Arc;

/// Name of the camera matrix uniform in the quad shader.
pub const CAMERA_PRODUCT_UNIFORM: &str = "uni_CameraProduct";

/// Name of the sampler array uniform in the quad shader.
pub const TEXTURE_SLOTS_UNIFORM: &str = "uni_TexSlots";

/// Configuration of a [`Renderer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RendererSpecification {
    /// Quads drawn per draw call at most.
    pub quads_per_batch: usize,
}

impl Default for RendererSpecification {
    fn default() -> Self {
        Self {
            quads_per_batch: 25_000,
        }
    }
}

/// Appearance of one submitted quad.
#[derive(Debug, Clone)]
pub struct RenderDrawSpecification2D {
    /// Tint, multiplied with the texture.
    pub color: Color,
    /// Texture to sample. `None` or an invalid texture draws plain white.
    pub texture: Option<Arc<Texture>>,
    /// ID written to integer picking attachments. `-1` for none.
    pub entity_id: i32,
}

impl Default for RenderDrawSpecification2D {
    fn default() -> Self {
        Self {
            color: Color::WHITE,
            texture: None,
            entity_id: -1,
        }
    }
}

/// Batches textured, tinted quads into indexed draw calls.
#[derive(Debug)]
pub struct Renderer {
    interface: RenderInterface,
    data: RenderData2D,
}

impl Renderer {
    /// Creates the renderer and its static GPU resources.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidOperation`] if `spec.quads_per_batch`
    /// is zero, or any device error raised while allocating buffers.
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        spec: RendererSpecification,
    ) -> Result<Self, RenderError> {
        let data = RenderData2D::new(&device, spec.quads_per_batch)?;
        let interface = RenderInterface::new(device);
        log::info!(
            "Renderer initialized: {} quads per batch, {TEXTURE_SLOT_COUNT} texture slots",
            spec.quads_per_batch
        );
        Ok(Self { interface, data })
    }

    /// The device the renderer draws with.
    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        self.interface.device()
    }

    /// The draw interface, for global state such as the clear color.
    pub fn render_interface(&self) -> &RenderInterface {
        &self.interface
    }

    /// Mutable access to the draw interface, for changing the topology.
    pub fn render_interface_mut(&mut self) -> &mut RenderInterface {
        &mut self.interface
    }

    /// Read-only view of the batch state.
    pub fn render_data_2d(&self) -> &RenderData2D {
        &self.data
    }

    /// Vertices submitted in the current or last scene.
    pub fn vertex_count_2d(&self) -> usize {
        self.data.total_vertex_count
    }

    /// Indices submitted in the current or last scene.
    pub fn index_count_2d(&self) -> usize {
        self.data.total_index_count
    }

    /// Batches flushed in the current or last scene.
    pub fn batch_count_2d(&self) -> usize {
        self.data.batch_count
    }

    /// Sets the render target and binds it, flushing first if a scene is
    /// underway.
    pub fn use_frame_buffer_2d(&mut self, framebuffer: Arc<FrameBuffer>) -> Result<(), RenderError> {
        if self.data.scene_active {
            self.flush_scene_2d(true)?;
        }
        framebuffer.bind(FrameBufferTarget::Both)?;
        self.data.framebuffer_generation = framebuffer.generation();
        self.data.framebuffer = Some(framebuffer);
        Ok(())
    }

    /// Sets the quad shader, flushing first if a scene is underway.
    ///
    /// The shader receives its texture slot indices, and the current camera
    /// transform when a scene is underway.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::PreconditionViolation`] if the shader is invalid.
    pub fn use_quad_shader_2d(&mut self, shader: Arc<Shader>) -> Result<(), RenderError> {
        if !shader.is_valid() {
            log::error!("Invalid shader provided for rendering 2D quads!");
            return Err(RenderError::precondition(
                "invalid shader provided for rendering 2D quads",
            ));
        }
        if self.data.scene_active {
            self.flush_scene_2d(true)?;
        }

        self.apply_quad_shader(&shader)?;
        self.data.quad_shader = Some(shader);
        Ok(())
    }

    /// Sends the slot indices, and the camera when a scene is underway.
    fn apply_quad_shader(&mut self, shader: &Shader) -> Result<(), RenderError> {
        for slot in 0..TEXTURE_SLOT_COUNT {
            shader.set_uniform(&format!("{TEXTURE_SLOTS_UNIFORM}[{slot}]"), slot as i32)?;
        }
        if self.data.scene_active {
            shader.set_uniform(CAMERA_PRODUCT_UNIFORM, self.data.camera_product)?;
        }
        self.data.quad_shader_generation = shader.generation();
        Ok(())
    }

    /// Re-applies the target and shader if either was rebuilt since the
    /// renderer last set it up.
    fn refresh_bindings(&mut self) -> Result<(), RenderError> {
        if let Some(framebuffer) = &self.data.framebuffer {
            let generation = framebuffer.generation();
            if generation != self.data.framebuffer_generation {
                log::debug!("Render target was rebuilt, binding it again.");
                framebuffer.bind(FrameBufferTarget::Both)?;
                self.data.framebuffer_generation = generation;
            }
        }
        if let Some(shader) = self.data.quad_shader.clone() {
            if shader.generation() != self.data.quad_shader_generation {
                log::debug!("Quad shader was rebuilt, sending its uniforms again.");
                self.apply_quad_shader(&shader)?;
            }
        }
        Ok(())
    }

    /// Starts a scene seen through `camera_product` (projection times view).
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::PreconditionViolation`] if a scene is already
    /// underway, or no framebuffer or shader has been set.
    pub fn begin_scene_2d(&mut self, camera_product: Mat4) -> Result<(), RenderError> {
        if self.data.scene_active {
            log::error!("Attempt to begin 2D scene when one is already started!");
            return Err(RenderError::precondition(
                "'begin_scene_2d' while a scene is already started",
            ));
        }
        if self.data.framebuffer.is_none() {
            log::error!("Attempt to begin 2D scene with no render target frame buffer!");
            return Err(RenderError::precondition(
                "'begin_scene_2d' with no render target frame buffer",
            ));
        }
        let Some(shader) = self.data.quad_shader.clone() else {
            log::error!("Attempt to begin 2D scene without a quad shader!");
            return Err(RenderError::precondition(
                "'begin_scene_2d' without a quad shader",
            ));
        };

        self.refresh_bindings()?;
        shader.set_uniform(CAMERA_PRODUCT_UNIFORM, camera_product)?;
        self.data.camera_product = camera_product;
        self.data.reset_scene();
        self.data.scene_active = true;
        Ok(())
    }

    /// Starts a scene from separate projection and view transforms.
    ///
    /// The camera product is `projection * inverse(view)`.
    pub fn begin_scene_2d_with(&mut self, projection: Mat4, view: Mat4) -> Result<(), RenderError> {
        let inverse_view = view
            .inverse()
            .ok_or_else(|| RenderError::invalid("view transform is not invertible"))?;
        self.begin_scene_2d(projection * inverse_view)
    }

    /// Draws everything staged in the current batch.
    ///
    /// With `flushing_early` the batch counters are reset so that
    /// submission can continue. Without it the staged vertices are kept,
    /// which is only meant for the final flush of a scene.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::PreconditionViolation`] if no scene is underway.
    pub fn flush_scene_2d(&mut self, flushing_early: bool) -> Result<(), RenderError> {
        if !self.data.scene_active {
            log::error!("Attempt to flush a 2D scene batch when no scene has started!");
            return Err(RenderError::precondition(
                "'flush_scene_2d' when no scene has started",
            ));
        }
        self.refresh_bindings()?;

        for (slot, texture) in self.data.textures[..self.data.batch_texture_count]
            .iter()
            .enumerate()
        {
            if let Some(texture) = texture {
                texture.bind(slot as u32)?;
            }
        }

        if self.data.quad_vertex_count > 0 {
            self.data
                .quad_vertex_buffer
                .upload(self.data.staged_vertices())?;
            if let Some(shader) = &self.data.quad_shader {
                shader.bind()?;
            }
            self.interface
                .draw_indexed(&self.data.quad_vertex_array, self.data.quad_index_count)?;
        }
        log::trace!(
            "Flushed 2D batch {}: {} vertices, {} indices, {} textures",
            self.data.batch_count,
            self.data.quad_vertex_count,
            self.data.quad_index_count,
            self.data.batch_texture_count
        );

        if flushing_early {
            self.data.reset_batch();
        }
        self.data.batch_count += 1;
        Ok(())
    }

    /// Flushes the last batch and ends the scene.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::PreconditionViolation`] if no scene is underway.
    pub fn end_scene_2d(&mut self) -> Result<(), RenderError> {
        if !self.data.scene_active {
            log::error!("Attempt to end a 2D scene without first starting one!");
            return Err(RenderError::precondition(
                "'end_scene_2d' without first starting a scene",
            ));
        }
        self.flush_scene_2d(false)?;
        self.data.scene_active = false;
        Ok(())
    }

    /// Stages a unit quad transformed by `transform`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::PreconditionViolation`] if no scene is underway.
    pub fn submit_quad_2d(
        &mut self,
        transform: Mat4,
        spec: &RenderDrawSpecification2D,
    ) -> Result<(), RenderError> {
        if !self.data.scene_active {
            log::error!("Attempt to submit a 2D quad with no scene started!");
            return Err(RenderError::precondition(
                "'submit_quad_2d' with no scene started",
            ));
        }

        let tex_index = self.slot_texture_2d(spec.texture.as_ref())? as f32;
        let color: [f32; 4] = spec.color.into();
        let entity_id = spec.entity_id as f32;
        for (corner, uv) in QUAD_VERTEX_POSITIONS
            .iter()
            .zip(QUAD_TEXTURE_COORDINATES.iter())
        {
            let position = (transform * *corner).truncate();
            self.data.push_vertex(QuadVertex2D {
                position: [position.x, position.y, position.z],
                tex_coords: [uv.x, uv.y],
                tex_index,
                color,
                entity_id,
            });
        }
        self.data.quad_index_count += 6;
        self.data.batch_index_count += 6;
        self.data.total_index_count += 6;

        if self.data.batch_is_full() {
            self.flush_scene_2d(true)?;
        }
        Ok(())
    }

    /// Stages a quad of `size` centered on `position`, rotated
    /// counter-clockwise by `rotation` degrees.
    pub fn submit_quad_2d_at(
        &mut self,
        position: Vec3,
        size: Vec2,
        rotation: f32,
        spec: &RenderDrawSpecification2D,
    ) -> Result<(), RenderError> {
        let transform = Mat4::from_translation(position)
            * Mat4::from_rotation_z(degrees_to_radians(rotation))
            * Mat4::from_scale(Vec3::new(size.x, size.y, 1.0));
        self.submit_quad_2d(transform, spec)
    }

    /// Finds or assigns the slot `texture` is sampled from in this batch.
    fn slot_texture_2d(&mut self, texture: Option<&Arc<Texture>>) -> Result<usize, RenderError> {
        let Some(texture) = texture.filter(|t| t.is_valid()) else {
            return Ok(0);
        };

        let resident = self.data.textures[..self.data.batch_texture_count]
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|t| Arc::ptr_eq(t, texture)));
        if let Some(slot) = resident {
            return Ok(slot);
        }

        if self.data.batch_texture_count == TEXTURE_SLOT_COUNT {
            self.flush_scene_2d(true)?;
        }
        let slot = self.data.batch_texture_count;
        self.data.textures[slot] = Some(texture.clone());
        self.data.batch_texture_count += 1;
        Ok(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framebuffer::FrameBufferSpecification;
    use crate::texture::TextureSpecification;
    use dg_core::renderer::{FrameBufferTextureFormat, UniformValue};
    use dg_infra::HeadlessDevice;

    const QUAD_VS: &str = "\
uniform mat4 uni_CameraProduct;
void main() {}
";
    const QUAD_FS: &str = "\
uniform sampler2D uni_TexSlots[16];
void main() {}
";

    fn renderer(device: &Arc<HeadlessDevice>, quads_per_batch: usize) -> Renderer {
        let mut renderer =
            Renderer::new(device.clone(), RendererSpecification { quads_per_batch }).unwrap();
        let framebuffer = FrameBuffer::new(
            device.clone(),
            FrameBufferSpecification {
                width: 64,
                height: 64,
                attachments: vec![FrameBufferTextureFormat::ColorRgba8],
                ..Default::default()
            },
        )
        .unwrap();
        let shader = Shader::from_sources(device.clone(), QUAD_VS, QUAD_FS).unwrap();
        renderer.use_frame_buffer_2d(Arc::new(framebuffer)).unwrap();
        renderer.use_quad_shader_2d(Arc::new(shader)).unwrap();
        renderer
    }

    fn texture(device: &Arc<HeadlessDevice>) -> Arc<Texture> {
        Arc::new(Texture::with_specification(device.clone(), TextureSpecification::default()).unwrap())
    }

    #[test]
    fn blank_texture_is_white_and_in_slot_zero() {
        let device = Arc::new(HeadlessDevice::new());
        let renderer = renderer(&device, 10);
        let data = renderer.render_data_2d();
        let blank = data.blank_texture();
        assert!(blank.is_valid());
        assert_eq!(device.texture_contents(blank.id()).unwrap(), vec![0xFF; 4]);
        assert!(Arc::ptr_eq(data.slotted_textures().next().unwrap(), blank));
    }

    #[test]
    fn shader_receives_slots_and_camera() {
        let device = Arc::new(HeadlessDevice::new());
        let mut renderer = renderer(&device, 10);
        let program = renderer.render_data_2d().quad_shader().unwrap().program().unwrap();
        assert_eq!(
            device.uniform_value(program, "uni_TexSlots[7]"),
            Some(UniformValue::Int(7))
        );

        let camera = Mat4::from_scale(Vec3::new(2.0, 2.0, 1.0));
        renderer.begin_scene_2d(camera).unwrap();
        assert_eq!(
            device.uniform_value(program, CAMERA_PRODUCT_UNIFORM),
            Some(camera.into())
        );

        let replacement = Arc::new(Shader::from_sources(device.clone(), QUAD_VS, QUAD_FS).unwrap());
        let new_program = replacement.program().unwrap();
        renderer.use_quad_shader_2d(replacement).unwrap();
        assert_eq!(
            device.uniform_value(new_program, CAMERA_PRODUCT_UNIFORM),
            Some(camera.into())
        );
        renderer.end_scene_2d().unwrap();
    }

    #[test]
    fn scene_requires_target_and_shader() {
        let device = Arc::new(HeadlessDevice::new());
        let mut renderer = Renderer::new(device, RendererSpecification::default()).unwrap();
        assert!(matches!(
            renderer.begin_scene_2d(Mat4::IDENTITY),
            Err(RenderError::PreconditionViolation(_))
        ));
        assert!(matches!(
            renderer.end_scene_2d(),
            Err(RenderError::PreconditionViolation(_))
        ));
        assert!(matches!(
            renderer.flush_scene_2d(true),
            Err(RenderError::PreconditionViolation(_))
        ));
    }

    #[test]
    fn invalid_shader_is_rejected() {
        let device = Arc::new(HeadlessDevice::new());
        let mut renderer = renderer(&device, 10);
        let shader = Arc::new(Shader::new(device.clone()));
        assert!(matches!(
            renderer.use_quad_shader_2d(shader),
            Err(RenderError::PreconditionViolation(_))
        ));
    }

    #[test]
    fn vertices_are_transformed_corners() {
        let device = Arc::new(HeadlessDevice::new());
        let mut renderer = renderer(&device, 10);
        renderer.begin_scene_2d(Mat4::IDENTITY).unwrap();
        let spec = RenderDrawSpecification2D {
            color: Color::RED,
            entity_id: 9,
            ..Default::default()
        };
        renderer
            .submit_quad_2d_at(Vec3::new(10.0, 20.0, 0.0), Vec2::new(4.0, 2.0), 0.0, &spec)
            .unwrap();

        let staged = renderer.render_data_2d().staged_vertices();
        assert_eq!(staged.len(), 4);
        assert_eq!(staged[0].position, [8.0, 19.0, 0.0]);
        assert_eq!(staged[2].position, [12.0, 21.0, 0.0]);
        assert_eq!(staged[1].tex_coords, [1.0, 0.0]);
        assert_eq!(staged[3].color, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(staged[3].entity_id, 9.0);
        assert_eq!(staged[3].tex_index, 0.0);
    }

    #[test]
    fn rotation_is_in_degrees() {
        let device = Arc::new(HeadlessDevice::new());
        let mut renderer = renderer(&device, 10);
        renderer.begin_scene_2d(Mat4::IDENTITY).unwrap();
        renderer
            .submit_quad_2d_at(Vec3::ZERO, Vec2::new(2.0, 2.0), 90.0, &Default::default())
            .unwrap();
        let corner = renderer.render_data_2d().staged_vertices()[0].position;
        assert!((corner[0] - 1.0).abs() < 1e-5);
        assert!((corner[1] + 1.0).abs() < 1e-5);
    }

    #[test]
    fn early_flush_uploads_and_draws_the_batch() {
        let device = Arc::new(HeadlessDevice::new());
        let mut renderer = renderer(&device, 2);
        renderer.begin_scene_2d(Mat4::IDENTITY).unwrap();
        for _ in 0..5 {
            renderer
                .submit_quad_2d(Mat4::IDENTITY, &Default::default())
                .unwrap();
        }
        renderer.end_scene_2d().unwrap();

        assert_eq!(renderer.batch_count_2d(), 3);
        assert_eq!(renderer.vertex_count_2d(), 20);
        assert_eq!(renderer.index_count_2d(), 30);
        let counts: Vec<u32> = device.draw_log().iter().map(|d| d.index_count).collect();
        assert_eq!(counts, vec![12, 12, 6]);
        assert!(!renderer.render_data_2d().is_scene_active());
    }

    #[test]
    fn resident_textures_share_a_slot() {
        let device = Arc::new(HeadlessDevice::new());
        let mut renderer = renderer(&device, 100);
        let a = texture(&device);
        let b = texture(&device);
        renderer.begin_scene_2d(Mat4::IDENTITY).unwrap();
        for t in [&a, &b, &a, &b] {
            let spec = RenderDrawSpecification2D {
                texture: Some(t.clone()),
                ..Default::default()
            };
            renderer.submit_quad_2d(Mat4::IDENTITY, &spec).unwrap();
        }
        let indices: Vec<f32> = renderer
            .render_data_2d()
            .staged_vertices()
            .chunks(4)
            .map(|quad| quad[0].tex_index)
            .collect();
        assert_eq!(indices, vec![1.0, 2.0, 1.0, 2.0]);
        assert_eq!(renderer.render_data_2d().batch_texture_count(), 3);
    }
}
