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


//! Shared setup for the integration tests.

#![allow(dead_code)]

use dg_graphics::prelude::*;
use dg_infra::HeadlessDevice;
use std::sync::Arc;

pub const QUAD_SHADER: &str = "\
#shader vertex
layout(location = 0) in vec3 in_Position;
layout(location = 1) in vec2 in_TexCoords;
layout(location = 2) in float in_TexIndex;
layout(location = 3) in vec4 in_Color;
layout(location = 4) in float in_EntityId;

uniform mat4 uni_CameraProduct;

void main() {}

#shader fragment
uniform sampler2D uni_TexSlots[16];

void main() {}
";

pub fn device() -> Arc<HeadlessDevice> {
    Arc::new(HeadlessDevice::new())
}

pub fn quad_shader(device: &Arc<HeadlessDevice>) -> anyhow::Result<Arc<Shader>> {
    let (vs, fs) = dg_graphics::shader::parse_combined_source(QUAD_SHADER)?;
    Ok(Arc::new(Shader::from_sources(device.clone(), &vs, &fs)?))
}

pub fn target_spec() -> FrameBufferSpecification {
    FrameBufferSpecification {
        width: 320,
        height: 240,
        attachments: vec![
            FrameBufferTextureFormat::ColorRgba8,
            FrameBufferTextureFormat::ColorR32,
            FrameBufferTextureFormat::Depth24Stencil8,
        ],
        ..Default::default()
    }
}

pub fn target(device: &Arc<HeadlessDevice>) -> anyhow::Result<Arc<FrameBuffer>> {
    Ok(Arc::new(FrameBuffer::new(device.clone(), target_spec())?))
}

/// A renderer with a render target and quad shader already set.
pub fn renderer(device: &Arc<HeadlessDevice>, spec: RendererSpecification) -> anyhow::Result<Renderer> {
    let mut renderer = Renderer::new(device.clone(), spec)?;
    renderer.use_frame_buffer_2d(target(device)?)?;
    renderer.use_quad_shader_2d(quad_shader(device)?)?;
    Ok(renderer)
}

pub fn textures(device: &Arc<HeadlessDevice>, count: usize) -> anyhow::Result<Vec<Arc<Texture>>> {
    (0..count)
        .map(|_| {
            let texture = Texture::with_specification(device.clone(), TextureSpecification::default())?;
            Ok(Arc::new(texture))
        })
        .collect()
}

pub fn textured(texture: &Arc<Texture>) -> RenderDrawSpecification2D {
    RenderDrawSpecification2D {
        texture: Some(texture.clone()),
        ..Default::default()
    }
}
