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

//! # DG Graphics
//!
//! The graphics resource layer (buffers, vertex arrays, shaders, textures,
//! framebuffers) and the batched 2D quad [`Renderer`] built on top of it.
//!
//! Every resource holds the [`GraphicsDevice`](dg_core::renderer::GraphicsDevice)
//! it was created on and releases its handle when dropped.

#![warn(missing_docs)]

pub mod buffer;
pub mod framebuffer;
pub mod registry;
pub mod render_interface;
pub mod renderer;
pub mod shader;
pub mod texture;

pub use buffer::{IndexBuffer, IndexData, VertexArray, VertexBuffer};
pub use framebuffer::{FrameBuffer, FrameBufferSpecification};
pub use registry::{Asset, AssetRegistry, ShaderRegistry, TextureRegistry};
pub use render_interface::RenderInterface;
pub use renderer::{
    QuadVertex2D, RenderData2D, RenderDrawSpecification2D, Renderer, RendererSpecification,
};
pub use shader::Shader;
pub use texture::{Texture, TextureSpecification};

/// Re-exports of the `dg-core` types that appear in this crate's API.
/// Everything needed to drive the renderer, in one import.
pub mod prelude {
    pub use dg_core::math::{Color, Mat4, Vec2, Vec3, Vec4};
    pub use dg_core::renderer::{
        AddressMode, FilterMode, FrameBufferTarget, FrameBufferTextureFormat, GraphicsDevice,
        IndexFormat, PrimitiveTopology, RenderError, ShaderError, UniformValue, VertexAttribute,
        VertexAttributeType, VertexLayout, FRAMEBUFFER_COLOR_ATTACHMENT_COUNT,
        TEXTURE_SLOT_COUNT,
    };

    pub use crate::*;
}
