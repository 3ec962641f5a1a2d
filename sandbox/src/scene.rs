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


//! Scene descriptions, generated or read from RON files.

use anyhow::{Context, Result};
use dg_core::math::{Color, Vec2, Vec3};
use dg_core::renderer::{AddressMode, FilterMode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A texture used by the scene.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureDescription {
    /// Image file, relative to the scene file. Takes precedence over `color`.
    pub file: Option<PathBuf>,
    /// Size of a solid texture.
    pub width: u32,
    pub height: u32,
    /// Fill of a solid texture.
    pub color: Color,
    pub wrap: AddressMode,
    pub filter: FilterMode,
}

impl Default for TextureDescription {
    fn default() -> Self {
        Self {
            file: None,
            width: 4,
            height: 4,
            color: Color::WHITE,
            wrap: AddressMode::Repeat,
            filter: FilterMode::Nearest,
        }
    }
}

/// One quad of the scene.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuadDescription {
    pub position: Vec3,
    pub size: Vec2,
    /// Initial rotation in degrees.
    pub rotation: f32,
    /// Rotation speed in degrees per second.
    pub spin: f32,
    pub color: Color,
    /// Index into [`SceneDescription::textures`].
    pub texture: Option<usize>,
    pub entity_id: i32,
}

impl Default for QuadDescription {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            size: Vec2::ONE,
            rotation: 0.0,
            spin: 0.0,
            color: Color::WHITE,
            texture: None,
            entity_id: -1,
        }
    }
}

/// Everything the sandbox draws.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneDescription {
    pub width: u32,
    pub height: u32,
    pub clear_color: Color,
    pub quads_per_batch: usize,
    pub textures: Vec<TextureDescription>,
    pub quads: Vec<QuadDescription>,
}

impl Default for SceneDescription {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            clear_color: Color::BLACK,
            quads_per_batch: 25_000,
            textures: Vec::new(),
            quads: Vec::new(),
        }
    }
}

const PALETTE: [Color; 5] = [
    Color::RED,
    Color::GREEN,
    Color::BLUE,
    Color::WHITE,
    Color::rgb(1.0, 0.8, 0.2),
];

impl SceneDescription {
    /// Reads a scene from a RON file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scene file '{}'", path.display()))?;
        let scene: Self = ron::from_str(&text)
            .with_context(|| format!("failed to parse scene file '{}'", path.display()))?;
        scene.validate()?;
        Ok(scene)
    }

    /// Lays `quads` quads out on a grid covering a `width` by `height`
    /// target, cycling through `textures` solid textures.
    pub fn generate(quads: usize, textures: usize, width: u32, height: u32) -> Self {
        let textures: Vec<TextureDescription> = (0..textures)
            .map(|i| TextureDescription {
                color: PALETTE[i % PALETTE.len()],
                ..Default::default()
            })
            .collect();

        let columns = (quads as f32).sqrt().ceil().max(1.0) as usize;
        let cell = Vec2::new(
            width as f32 / columns as f32,
            height as f32 / columns as f32,
        );
        let quads = (0..quads)
            .map(|i| {
                let (column, row) = (i % columns, i / columns);
                QuadDescription {
                    position: Vec3::new(
                        (column as f32 + 0.5) * cell.x,
                        (row as f32 + 0.5) * cell.y,
                        0.0,
                    ),
                    size: Vec2::new(cell.x * 0.8, cell.y * 0.8),
                    spin: (i % 7) as f32 * 15.0,
                    texture: (!textures.is_empty()).then(|| i % textures.len()),
                    entity_id: i as i32,
                    ..Default::default()
                }
            })
            .collect();

        Self {
            width,
            height,
            textures,
            quads,
            ..Default::default()
        }
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.width > 0 && self.height > 0,
            "scene size {}x{} is empty",
            self.width,
            self.height
        );
        if let Some((i, quad)) = self
            .quads
            .iter()
            .enumerate()
            .find(|(_, q)| q.texture.is_some_and(|t| t >= self.textures.len()))
        {
            anyhow::bail!(
                "quad {i} uses texture {:?} but the scene has {} textures",
                quad.texture,
                self.textures.len()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_scene_cycles_textures() {
        let scene = SceneDescription::generate(10, 3, 100, 100);
        assert_eq!(scene.quads.len(), 10);
        assert_eq!(scene.textures.len(), 3);
        assert_eq!(scene.quads[4].texture, Some(1));
        assert!(scene.validate().is_ok());

        let untextured = SceneDescription::generate(4, 0, 100, 100);
        assert!(untextured.quads.iter().all(|q| q.texture.is_none()));
    }

    #[test]
    fn test_parses_partial_ron() {
        let text = r#"(
            width: 64,
            height: 32,
            textures: [(color: (r: 1.0, g: 0.0, b: 0.0, a: 1.0))],
            quads: [
                (position: (x: 8.0, y: 8.0, z: 0.0), texture: Some(0), entity_id: 3),
                (spin: 90.0),
            ],
        )"#;
        let scene: SceneDescription = ron::from_str(text).unwrap();
        assert_eq!(scene.width, 64);
        assert_eq!(scene.quads_per_batch, 25_000);
        assert_eq!(scene.quads[0].entity_id, 3);
        assert_eq!(scene.quads[1].size, Vec2::ONE);
        assert!(scene.validate().is_ok());
    }

    #[test]
    fn test_rejects_dangling_texture_index() {
        let scene = SceneDescription {
            quads: vec![QuadDescription {
                texture: Some(2),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(scene.validate().is_err());
    }
}
