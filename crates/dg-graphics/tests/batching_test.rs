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
use common::{device, renderer, textured, textures};
use dg_graphics::prelude::*;
use std::sync::Arc;

#[test]
fn test_batch_capacity_splits_draws() -> Result<()> {
    let device = device();
    let mut renderer = renderer(&device, RendererSpecification::default())?;
    let vertices_per_batch = renderer.render_data_2d().vertices_per_batch();
    let indices_per_batch = renderer.render_data_2d().indices_per_batch();
    let quads = vertices_per_batch / 4 + 1;

    renderer.begin_scene_2d(Mat4::IDENTITY)?;
    for _ in 0..quads {
        renderer.submit_quad_2d(Mat4::IDENTITY, &Default::default())?;
    }
    renderer.end_scene_2d()?;

    assert!(renderer.batch_count_2d() >= 2);
    assert_eq!(renderer.vertex_count_2d(), quads * 4);
    for draw in device.draw_log() {
        let indices = draw.index_count as usize;
        assert!(indices <= indices_per_batch);
        assert!(indices / 6 * 4 <= vertices_per_batch);
    }
    Ok(())
}

#[test]
fn test_resident_textures_bound_once_per_batch() -> Result<()> {
    let device = device();
    let mut renderer = renderer(&device, RendererSpecification::default())?;
    let textures = textures(&device, 3)?;

    renderer.begin_scene_2d(Mat4::IDENTITY)?;
    for i in 0..20 {
        renderer.submit_quad_2d(Mat4::IDENTITY, &textured(&textures[i % 3]))?;
        assert!(renderer.render_data_2d().batch_texture_count() <= 4);
    }
    renderer.end_scene_2d()?;

    let log = device.draw_log();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].texture_binds, 4);
    assert_eq!(log[0].occupied_slots(), 4);
    Ok(())
}

#[test]
fn test_full_texture_table_flushes_early() -> Result<()> {
    let device = device();
    let mut renderer = renderer(&device, RendererSpecification::default())?;
    let textures = textures(&device, 17)?;

    renderer.begin_scene_2d(Mat4::IDENTITY)?;
    for texture in &textures[..14] {
        renderer.submit_quad_2d(Mat4::IDENTITY, &textured(texture))?;
    }
    assert_eq!(renderer.batch_count_2d(), 0);

    // Slot 0 holds the fallback, so the 15th texture fills the table.
    renderer.submit_quad_2d(Mat4::IDENTITY, &textured(&textures[14]))?;
    assert_eq!(renderer.batch_count_2d(), 1);
    assert_eq!(renderer.render_data_2d().batch_texture_count(), 1);

    renderer.submit_quad_2d(Mat4::IDENTITY, &textured(&textures[15]))?;
    renderer.submit_quad_2d(Mat4::IDENTITY, &textured(&textures[16]))?;
    let data = renderer.render_data_2d();
    assert_eq!(data.batch_texture_count(), 3);
    assert_eq!(data.staged_vertices()[0].tex_index, 1.0);
    assert_eq!(data.staged_vertices()[4].tex_index, 2.0);
    renderer.end_scene_2d()?;

    let log = device.draw_log();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].occupied_slots(), TEXTURE_SLOT_COUNT);
    assert_eq!(log[0].texture_binds, TEXTURE_SLOT_COUNT);
    assert_eq!(log[0].index_count, 15 * 6);
    assert_eq!(log[1].texture_binds, 3);
    assert_eq!(log[1].index_count, 2 * 6);
    Ok(())
}

#[test]
fn test_missing_or_invalid_textures_use_white_fallback() -> Result<()> {
    let device = device();
    let mut renderer = renderer(&device, RendererSpecification::default())?;
    let blank = renderer.render_data_2d().blank_texture().clone();
    let invalid = Arc::new(Texture::new(device.clone())?);
    let real = textures(&device, 20)?;

    renderer.begin_scene_2d(Mat4::IDENTITY)?;
    renderer.submit_quad_2d(Mat4::IDENTITY, &Default::default())?;
    renderer.submit_quad_2d(Mat4::IDENTITY, &textured(&invalid))?;
    for vertex in renderer.render_data_2d().staged_vertices() {
        assert_eq!(vertex.tex_index, 0.0);
    }
    for texture in &real {
        renderer.submit_quad_2d(Mat4::IDENTITY, &textured(texture))?;
        let first = renderer.render_data_2d().slotted_textures().next();
        assert!(first.is_some_and(|t| Arc::ptr_eq(t, &blank)));
    }
    renderer.end_scene_2d()?;

    for draw in device.draw_log() {
        assert_eq!(draw.texture_slots[0], Some(blank.id()));
    }
    Ok(())
}

#[test]
fn test_scene_protocol_violations() -> Result<()> {
    let device = device();
    let mut renderer = renderer(&device, RendererSpecification::default())?;

    let early = renderer.submit_quad_2d(Mat4::IDENTITY, &Default::default());
    assert!(matches!(early, Err(RenderError::PreconditionViolation(_))));

    renderer.begin_scene_2d(Mat4::IDENTITY)?;
    let twice = renderer.begin_scene_2d(Mat4::IDENTITY);
    assert!(matches!(twice, Err(RenderError::PreconditionViolation(_))));
    renderer.end_scene_2d()?;

    let ended = renderer.end_scene_2d();
    assert!(matches!(ended, Err(RenderError::PreconditionViolation(_))));
    Ok(())
}

#[test]
fn test_target_swap_mid_scene_flushes() -> Result<()> {
    let device = device();
    let mut renderer = renderer(&device, RendererSpecification::default())?;
    let first = renderer.render_data_2d().framebuffer().map(|f| f.id());
    let second = common::target(&device)?;
    let second_id = second.id();

    renderer.begin_scene_2d(Mat4::IDENTITY)?;
    renderer.submit_quad_2d(Mat4::IDENTITY, &Default::default())?;
    renderer.use_frame_buffer_2d(second)?;
    renderer.submit_quad_2d(Mat4::IDENTITY, &Default::default())?;
    renderer.submit_quad_2d(Mat4::IDENTITY, &Default::default())?;
    renderer.end_scene_2d()?;

    let log = device.draw_log();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].framebuffer, first);
    assert_eq!(log[0].index_count, 6);
    assert_eq!(log[1].framebuffer, Some(second_id));
    assert_eq!(log[1].index_count, 12);
    assert_eq!(renderer.batch_count_2d(), 2);
    Ok(())
}

#[test]
fn test_shader_swap_mid_scene_flushes() -> Result<()> {
    let device = device();
    let mut renderer = renderer(&device, RendererSpecification::default())?;
    let first = renderer
        .render_data_2d()
        .quad_shader()
        .and_then(|s| s.program())
        .expect("renderer has a shader");
    let other = common::quad_shader(&device)?;
    let other_program = other.program().expect("shader is built");
    let camera = Mat4::from_scale(Vec3::new(2.0, 2.0, 1.0));

    renderer.begin_scene_2d(camera)?;
    renderer.submit_quad_2d(Mat4::IDENTITY, &Default::default())?;
    renderer.use_quad_shader_2d(other)?;
    renderer.submit_quad_2d(Mat4::IDENTITY, &Default::default())?;
    renderer.end_scene_2d()?;

    let log = device.draw_log();
    assert_eq!(log.len(), 2);
    assert_ne!(first, other_program);
    assert_eq!(log[0].program, first);
    assert_eq!(log[1].program, other_program);
    let counts: Vec<u32> = log.iter().map(|d| d.index_count).collect();
    assert_eq!(counts, vec![6, 6]);
    assert_eq!(
        device.uniform_value(other_program, "uni_CameraProduct"),
        Some(UniformValue::from(camera))
    );
    Ok(())
}

#[test]
fn test_resized_target_is_rebound_between_scenes() -> Result<()> {
    let device = device();
    let target = common::target(&device)?;
    let mut renderer = Renderer::new(device.clone(), RendererSpecification::default())?;
    renderer.use_frame_buffer_2d(target.clone())?;
    renderer.use_quad_shader_2d(common::quad_shader(&device)?)?;

    renderer.begin_scene_2d(Mat4::IDENTITY)?;
    renderer.submit_quad_2d(Mat4::IDENTITY, &Default::default())?;
    renderer.end_scene_2d()?;
    let before = target.id();

    assert!(target.set_size(640, 480)?);
    assert_ne!(target.id(), before);

    renderer.begin_scene_2d(Mat4::IDENTITY)?;
    renderer.submit_quad_2d(Mat4::IDENTITY, &Default::default())?;
    renderer.end_scene_2d()?;

    let log = device.draw_log();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].framebuffer, Some(before));
    assert_eq!(log[1].framebuffer, Some(target.id()));
    assert_eq!(device.viewport().width, 640);
    assert_eq!(device.viewport().height, 480);
    Ok(())
}

#[test]
fn test_rebuilt_shader_receives_uniforms_again() -> Result<()> {
    let device = device();
    let shader = common::quad_shader(&device)?;
    let mut renderer = Renderer::new(device.clone(), RendererSpecification::default())?;
    renderer.use_frame_buffer_2d(common::target(&device)?)?;
    renderer.use_quad_shader_2d(shader.clone())?;
    let before = shader.program();

    shader.build()?;
    let program = shader.program().expect("shader is built");
    assert_ne!(Some(program), before);

    renderer.begin_scene_2d(Mat4::IDENTITY)?;
    renderer.submit_quad_2d(Mat4::IDENTITY, &Default::default())?;
    renderer.end_scene_2d()?;

    let log = device.draw_log();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].program, program);
    assert_eq!(
        device.uniform_value(program, "uni_TexSlots[3]"),
        Some(UniformValue::Int(3))
    );
    assert_eq!(
        device.uniform_value(program, "uni_CameraProduct"),
        Some(UniformValue::from(Mat4::IDENTITY))
    );
    Ok(())
}

#[test]
fn test_scene_of_cycling_textures_is_one_batch() -> Result<()> {
    let device = device();
    let mut renderer = renderer(&device, RendererSpecification::default())?;
    let textures = textures(&device, 4)?;

    let projection = Mat4::orthographic(0.0, 320.0, 0.0, 240.0, -1.0, 1.0);
    renderer.begin_scene_2d_with(projection, Mat4::IDENTITY)?;
    for i in 0..2000 {
        let position = Vec3::new((i % 40) as f32 * 8.0, (i / 40) as f32 * 8.0, 0.0);
        renderer.submit_quad_2d_at(position, Vec2::new(8.0, 8.0), 0.0, &textured(&textures[i % 4]))?;
    }
    renderer.end_scene_2d()?;

    assert_eq!(renderer.batch_count_2d(), 1);
    assert_eq!(renderer.vertex_count_2d(), 8000);
    assert_eq!(renderer.index_count_2d(), 12000);
    assert_eq!(device.stats().draw_calls, 1);
    Ok(())
}

#[test]
fn test_scene_over_quad_capacity_is_two_batches() -> Result<()> {
    let device = device();
    let mut renderer = renderer(&device, RendererSpecification::default())?;
    let texture = textures(&device, 1)?.remove(0);

    renderer.begin_scene_2d(Mat4::IDENTITY)?;
    for _ in 0..30_000 {
        renderer.submit_quad_2d(Mat4::IDENTITY, &textured(&texture))?;
    }
    renderer.end_scene_2d()?;

    assert_eq!(renderer.batch_count_2d(), 2);
    assert_eq!(renderer.vertex_count_2d(), 120_000);
    let counts: Vec<u32> = device.draw_log().iter().map(|d| d.index_count).collect();
    assert_eq!(counts, vec![150_000, 30_000]);
    Ok(())
}
