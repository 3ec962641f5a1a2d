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


//! The layers driven by the sandbox frame loop.

use crate::scene::{QuadDescription, SceneDescription, TextureDescription};
use anyhow::{Context, Result};
use dg_core::layer::{Event, Layer};
use dg_graphics::prelude::*;
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

/// Colour attachment holding entity IDs for picking.
const PICKING_ATTACHMENT: usize = 1;

const QUAD_SHADER: &str = "\
#shader vertex
layout(location = 0) in vec3 in_Position;
layout(location = 1) in vec2 in_TexCoords;
layout(location = 2) in float in_TexIndex;
layout(location = 3) in vec4 in_Color;
layout(location = 4) in float in_EntityId;

uniform mat4 uni_CameraProduct;

out vec2 io_TexCoords;
out float io_TexIndex;
out vec4 io_Color;
flat out int io_EntityId;

void main() {
    io_TexCoords = in_TexCoords;
    io_TexIndex = in_TexIndex;
    io_Color = in_Color;
    io_EntityId = int(in_EntityId);
    gl_Position = uni_CameraProduct * vec4(in_Position, 1.0);
}

#shader fragment
layout(location = 0) out vec4 out_Color;
layout(location = 1) out int out_EntityId;

in vec2 io_TexCoords;
in float io_TexIndex;
in vec4 io_Color;
flat in int io_EntityId;

uniform sampler2D uni_TexSlots[16];

void main() {
    out_Color = texture(uni_TexSlots[int(io_TexIndex)], io_TexCoords) * io_Color;
    out_EntityId = io_EntityId;
}
";

/// What the layers observed, shared with the frame loop.
#[derive(Debug, Default)]
pub struct FrameReport {
    pub frames: usize,
    pub batches: usize,
    pub vertices: usize,
    pub indices: usize,
    pub hovered_entity: i32,
    pub error: Option<anyhow::Error>,
}

impl FrameReport {
    /// Records the first failure of the frame. Layers driven after it skip
    /// their work and the frame loop stops.
    pub fn fail(&mut self, layer: &str, error: impl Into<anyhow::Error>) {
        let error = error.into().context(format!("layer '{layer}' failed"));
        log::error!("{error:#}");
        self.error.get_or_insert(error);
    }

    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

pub type SharedReport = Rc<RefCell<FrameReport>>;

fn create_texture(
    device: &Arc<dyn GraphicsDevice>,
    registry: &mut TextureRegistry,
    description: &TextureDescription,
) -> Result<Arc<Texture>> {
    if let Some(file) = &description.file {
        let name = file.to_string_lossy();
        return registry
            .load(device, &name)
            .with_context(|| format!("failed to load texture '{name}'"));
    }

    let spec = TextureSpecification {
        width: description.width,
        height: description.height,
        color_channels: 4,
        wrap: description.wrap,
        magnify: description.filter,
        minify: description.filter,
    };
    let texture = Texture::with_specification(device.clone(), spec)?;
    let texel = description.color.to_rgba_u32().to_be_bytes();
    texture.upload_data(&texel.repeat(spec.width as usize * spec.height as usize))?;
    Ok(Arc::new(texture))
}

/// Draws the scene's quads every frame.
pub struct SceneLayer {
    renderer: Renderer,
    target: Arc<FrameBuffer>,
    shader: Arc<Shader>,
    textures: Vec<Arc<Texture>>,
    quads: Vec<QuadDescription>,
    projection: Mat4,
    elapsed: f32,
    report: SharedReport,
}

impl SceneLayer {
    /// Creates every resource the scene needs. Image files are resolved
    /// against `asset_root`.
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        scene: &SceneDescription,
        asset_root: &Path,
        report: SharedReport,
    ) -> Result<Self> {
        let renderer = Renderer::new(
            device.clone(),
            RendererSpecification {
                quads_per_batch: scene.quads_per_batch,
            },
        )
        .context("failed to create the renderer")?;
        renderer
            .render_interface()
            .set_clear_color(scene.clear_color)?;

        let target = FrameBuffer::new(
            device.clone(),
            FrameBufferSpecification {
                width: scene.width,
                height: scene.height,
                attachments: vec![
                    FrameBufferTextureFormat::ColorRgba8,
                    FrameBufferTextureFormat::ColorR32,
                    FrameBufferTextureFormat::Depth24Stencil8,
                ],
                ..Default::default()
            },
        )
        .context("failed to create the render target")?;

        let (vertex, fragment) = dg_graphics::shader::parse_combined_source(QUAD_SHADER)?;
        let shader = Shader::from_sources(device.clone(), &vertex, &fragment)
            .context("failed to build the quad shader")?;

        let mut registry = TextureRegistry::with_root(asset_root);
        let textures = scene
            .textures
            .iter()
            .map(|t| create_texture(&device, &mut registry, t))
            .collect::<Result<Vec<_>>>()?;

        let mut layer = Self {
            renderer,
            target: Arc::new(target),
            shader: Arc::new(shader),
            textures,
            quads: scene.quads.clone(),
            projection: projection(scene.width, scene.height),
            elapsed: 0.0,
            report,
        };
        layer
            .renderer
            .use_frame_buffer_2d(layer.target.clone())
            .context("failed to bind the render target")?;
        layer
            .renderer
            .use_quad_shader_2d(layer.shader.clone())
            .context("failed to bind the quad shader")?;
        Ok(layer)
    }

    /// The render target the scene is drawn into.
    pub fn target(&self) -> &Arc<FrameBuffer> {
        &self.target
    }

    fn draw(&mut self) -> Result<()> {
        self.target
            .clear_color_attachment(PICKING_ATTACHMENT, -1)
            .context("failed to clear the picking attachment")?;
        self.renderer.begin_scene_2d(self.projection)?;
        for quad in &self.quads {
            let spec = RenderDrawSpecification2D {
                color: quad.color,
                texture: quad.texture.and_then(|i| self.textures.get(i).cloned()),
                entity_id: quad.entity_id,
            };
            let rotation = quad.rotation + quad.spin * self.elapsed;
            self.renderer
                .submit_quad_2d_at(quad.position, quad.size, rotation, &spec)
                .with_context(|| format!("failed to submit entity {}", quad.entity_id))?;
        }
        self.renderer.end_scene_2d()?;
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if self.target.set_size(width, height)? {
            self.projection = projection(width, height);
            log::info!("Render target resized to {width}x{height}");
        }
        Ok(())
    }
}

fn projection(width: u32, height: u32) -> Mat4 {
    Mat4::orthographic(0.0, width as f32, 0.0, height as f32, -1.0, 1.0)
}

impl Layer for SceneLayer {
    fn name(&self) -> &str {
        "scene"
    }

    fn on_attach(&mut self) {
        log::info!(
            "Scene layer attached: {} quads, {} textures",
            self.quads.len(),
            self.textures.len()
        );
    }

    fn on_detach(&mut self) {
        log::debug!("Scene layer detached after {:.2}s", self.elapsed);
    }

    fn fixed_update(&mut self, timestep: f32) {
        self.elapsed += timestep;
    }

    fn update(&mut self) {
        if self.report.borrow().failed() {
            return;
        }
        if let Err(e) = self.draw() {
            self.report.borrow_mut().fail(self.name(), e);
            return;
        }
        let mut report = self.report.borrow_mut();
        report.frames += 1;
        report.batches += self.renderer.batch_count_2d();
        report.vertices += self.renderer.vertex_count_2d();
        report.indices += self.renderer.index_count_2d();
    }

    fn process_event(&mut self, event: &Event) -> bool {
        let Event::WindowResized { width, height } = *event else {
            return false;
        };
        if let Err(e) = self.resize(width, height) {
            self.report.borrow_mut().fail(self.name(), e);
        }
        true
    }
}

/// Reads the entity under a cursor position back from the picking
/// attachment after the scene has drawn.
pub struct PickingOverlay {
    target: Arc<FrameBuffer>,
    cursor: Vec2,
    report: SharedReport,
}

impl PickingOverlay {
    pub fn new(target: Arc<FrameBuffer>, cursor: Vec2, report: SharedReport) -> Self {
        Self {
            target,
            cursor,
            report,
        }
    }
}

impl Layer for PickingOverlay {
    fn name(&self) -> &str {
        "picking"
    }

    fn is_overlay(&self) -> bool {
        true
    }

    fn update(&mut self) {
        let mut report = self.report.borrow_mut();
        if report.failed() {
            return;
        }
        match self
            .target
            .read_pixel_f(PICKING_ATTACHMENT, self.cursor.x, self.cursor.y)
        {
            Ok(entity) => report.hovered_entity = entity,
            Err(e) => report.fail(self.name(), e),
        }
    }

    fn process_event(&mut self, event: &Event) -> bool {
        match *event {
            Event::MouseMoved { x, y } => {
                self.cursor = Vec2::new(x, y);
                true
            }
            _ => false,
        }
    }
}
