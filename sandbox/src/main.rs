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


// DG Engine Sandbox
// Draws a generated or RON-described quad scene on the headless device and
// reports what the renderer did.

mod layers;
mod scene;

use anyhow::{Context, Result};
use clap::Parser;
use dg_core::layer::{Event, LayerStack};
use dg_core::math::Vec2;
use dg_core::renderer::GraphicsDevice;
use dg_infra::HeadlessDevice;
use layers::{FrameReport, PickingOverlay, SceneLayer};
use scene::SceneDescription;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

const FIXED_TIMESTEP: f32 = 1.0 / 60.0;

/// Headless 2D renderer sandbox.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Number of quads in a generated scene.
    #[arg(long, default_value_t = 2000)]
    quads: usize,

    /// Number of solid textures the generated quads cycle through.
    #[arg(long, default_value_t = 4)]
    textures: usize,

    /// Width of the generated scene's render target.
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Height of the generated scene's render target.
    #[arg(long, default_value_t = 720)]
    height: u32,

    /// RON scene file. Replaces the generated scene.
    #[arg(long)]
    scene: Option<PathBuf>,

    /// Number of frames to run.
    #[arg(long, default_value_t = 3)]
    frames: usize,

    /// Resize the render target to this width after the first frame.
    #[arg(long, requires = "resize_height")]
    resize_width: Option<u32>,

    /// Resize the render target to this height after the first frame.
    #[arg(long, requires = "resize_width")]
    resize_height: Option<u32>,
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let (scene, asset_root) = match &args.scene {
        Some(path) => (
            SceneDescription::load(path)?,
            path.parent().map(Path::to_path_buf).unwrap_or_default(),
        ),
        None => (
            SceneDescription::generate(args.quads, args.textures, args.width, args.height),
            PathBuf::new(),
        ),
    };

    let device = Arc::new(HeadlessDevice::new());
    let dyn_device: Arc<dyn GraphicsDevice> = device.clone();
    let info = dyn_device.adapter_info();
    log::info!("Using '{}' ({} backend)", info.name, info.backend);

    let report = Rc::new(RefCell::new(FrameReport::default()));
    let scene_layer = SceneLayer::new(dyn_device, &scene, &asset_root, report.clone())
        .context("failed to set up the scene")?;
    let cursor = Vec2::new(scene.width as f32 / 2.0, scene.height as f32 / 2.0);
    let overlay = PickingOverlay::new(scene_layer.target().clone(), cursor, report.clone());

    let mut stack = LayerStack::new();
    stack.attach(Box::new(overlay));
    stack.attach(Box::new(scene_layer));

    let resize = args
        .resize_width
        .zip(args.resize_height)
        .map(|(width, height)| Event::WindowResized { width, height });

    for frame in 0..args.frames {
        if let (1, Some(event)) = (frame, &resize) {
            stack.process_event(event);
        }
        stack.fixed_update(FIXED_TIMESTEP);
        stack.update();
        if let Some(error) = report.borrow_mut().error.take() {
            return Err(error.context(format!("frame {frame} failed")));
        }
    }
    drop(stack);

    let report = report.borrow();
    let stats = device.stats();
    println!("frames:           {}", report.frames);
    println!("batches:          {}", report.batches);
    println!("vertices:         {}", report.vertices);
    println!("indices:          {}", report.indices);
    println!("draw calls:       {}", stats.draw_calls);
    println!("texture binds:    {}", stats.texture_binds);
    println!("bytes uploaded:   {}", stats.bytes_uploaded);
    println!("entity at cursor: {}", report.hovered_entity);
    Ok(())
}
