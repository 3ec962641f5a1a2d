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


mod common;

use anyhow::Result;
use common::{device, QUAD_SHADER};
use dg_graphics::prelude::*;
use image::{Rgba, RgbaImage};
use std::sync::Arc;
use tempfile::tempdir;

#[test]
fn test_buffers_are_write_once() -> Result<()> {
    let device = device();

    let static_buffer = VertexBuffer::new(device.clone(), false)?;
    static_buffer.allocate(&[1.0f32, 2.0, 3.0])?;
    assert!(matches!(
        static_buffer.allocate(&[1.0f32]),
        Err(RenderError::InvalidOperation(_))
    ));
    assert!(static_buffer.upload(&[1.0f32]).is_err());

    let dynamic_buffer = VertexBuffer::new(device.clone(), true)?;
    assert!(matches!(
        dynamic_buffer.upload(&[1.0f32]),
        Err(RenderError::InvalidOperation(_))
    ));
    dynamic_buffer.reserve::<f32>(4)?;
    assert!(dynamic_buffer.reserve::<f32>(4).is_err());
    dynamic_buffer.upload(&[1.0f32, 2.0, 3.0])?;
    assert!(matches!(
        dynamic_buffer.upload(&[0.0f32; 5]),
        Err(RenderError::ResourceLimitExceeded { .. })
    ));
    Ok(())
}

#[test]
fn test_framebuffer_resize_rebuilds_only_on_change() -> Result<()> {
    let device = device();
    let framebuffer = FrameBuffer::new(device.clone(), common::target_spec())?;
    let handles = |fb: &FrameBuffer| -> Result<Vec<_>> {
        let mut ids = vec![fb.color_handle(0)?, fb.color_handle(1)?];
        ids.extend(fb.depth_handle());
        Ok(ids)
    };
    let before = handles(&framebuffer)?;

    assert!(!framebuffer.set_size(320, 240)?);
    assert_eq!(handles(&framebuffer)?, before);

    assert!(framebuffer.set_size(640, 480)?);
    let after = handles(&framebuffer)?;
    assert_eq!(after.len(), before.len());
    assert!(after.iter().all(|id| !before.contains(id)));
    assert_eq!(device.stats().live_textures, 3);
    Ok(())
}

#[test]
fn test_picking_attachment_reads_back_entity_ids() -> Result<()> {
    let device = device();
    let framebuffer = common::target(&device)?;
    framebuffer.clear_color_attachment(1, -1)?;
    assert_eq!(framebuffer.read_pixel(1, 10, 10)?, -1);
    framebuffer.clear_color_attachment(1, 1234)?;
    assert_eq!(framebuffer.read_pixel(1, 319, 239)?, 1234);
    assert_eq!(framebuffer.read_pixel(1, 320, 0)?, -1);
    Ok(())
}

#[test]
fn test_shader_and_texture_files_through_registries() -> Result<()> {
    let dir = tempdir()?;
    std::fs::write(dir.path().join("quad.glsl"), QUAD_SHADER)?;
    let image = RgbaImage::from_fn(1, 2, |_, y| {
        if y == 0 {
            Rgba([255, 0, 0, 255])
        } else {
            Rgba([0, 0, 255, 255])
        }
    });
    image.save(dir.path().join("stripe.png"))?;

    let device = device();
    let dyn_device: Arc<dyn GraphicsDevice> = device.clone();
    let mut shaders = ShaderRegistry::with_root(dir.path());
    let mut textures = TextureRegistry::with_root(dir.path());

    let shader = shaders.load(&dyn_device, "quad.glsl")?;
    assert!(shader.is_valid());
    assert!(shader.has_uniform("uni_CameraProduct"));
    assert!(Arc::ptr_eq(&shader, &shaders.load(&dyn_device, "quad.glsl")?));

    let texture = textures.load(&dyn_device, "stripe.png")?;
    assert_eq!(texture.specification().width, 1);
    assert_eq!(texture.specification().height, 2);
    assert_eq!(texture.specification().color_channels, 4);
    // Rows are flipped: the bottom row of the image comes first.
    assert_eq!(
        device.texture_contents(texture.id()).unwrap_or_default(),
        vec![0, 0, 255, 255, 255, 0, 0, 255]
    );

    assert!(matches!(
        textures.load(&dyn_device, "missing.png"),
        Err(RenderError::ResourceNotFound(_))
    ));
    assert_eq!(textures.len(), 1);
    Ok(())
}

#[test]
fn test_shader_file_with_stray_text_is_rejected() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("broken.glsl");
    std::fs::write(&path, format!("precision mediump float;\n{QUAD_SHADER}"))?;

    let device = device();
    assert!(matches!(
        Shader::from_file(device.clone(), &path),
        Err(ShaderError::Directive { line: 1, .. })
    ));
    assert_eq!(device.stats().live_programs, 0);
    Ok(())
}
