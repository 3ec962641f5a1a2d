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

//! Global pipeline state shared by every draw call.

/// The primitive topology used to interpret the index stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    /// Every three indices form a triangle.
    #[default]
    Triangles,
    /// Every two indices form a line segment.
    Lines,
    /// Every index is a point.
    Points,
}

/// A rectangular region of the current render target, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Viewport {
    /// Left edge.
    pub x: i32,
    /// Bottom edge.
    pub y: i32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Describes the backend behind a [`GraphicsDevice`](crate::renderer::GraphicsDevice).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendererAdapterInfo {
    /// Human readable adapter name.
    pub name: String,
    /// The backend family, e.g. `"headless"`.
    pub backend: String,
    /// The number of texture units available to a single draw.
    pub max_texture_slots: usize,
    /// The number of color attachments a framebuffer may carry.
    pub max_color_attachments: usize,
}
