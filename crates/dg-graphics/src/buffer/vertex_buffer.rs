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

use super::GpuBuffer;
use bytemuck::Pod;
use dg_core::renderer::{BufferId, GraphicsDevice, RenderError, VertexLayout};
use std::sync::Arc;

/// A buffer of interleaved vertices described by a [`VertexLayout`].
///
/// The buffer is sized exactly once: [`VertexBuffer::reserve`] for dynamic
/// buffers, [`VertexBuffer::allocate`] for static ones. Only dynamic buffers
/// accept [`VertexBuffer::upload`], and an upload must be strictly smaller
/// than the reserved size.
#[derive(Debug)]
pub struct VertexBuffer {
    buffer: GpuBuffer,
    layout: VertexLayout,
}

impl VertexBuffer {
    /// Creates an empty vertex buffer with an empty layout.
    pub fn new(device: Arc<dyn GraphicsDevice>, dynamic: bool) -> Result<Self, RenderError> {
        Ok(Self {
            buffer: GpuBuffer::new(device, dynamic, "vertex buffer")?,
            layout: VertexLayout::default(),
        })
    }

    /// Creates an empty vertex buffer with the given layout.
    pub fn with_layout(
        device: Arc<dyn GraphicsDevice>,
        dynamic: bool,
        layout: VertexLayout,
    ) -> Result<Self, RenderError> {
        let mut buffer = Self::new(device, dynamic)?;
        buffer.layout = layout;
        Ok(buffer)
    }

    /// The device handle.
    pub fn id(&self) -> BufferId {
        self.buffer.id()
    }

    /// Whether this buffer is reserved and uploaded to, rather than allocated once.
    pub fn is_dynamic(&self) -> bool {
        self.buffer.is_dynamic()
    }

    /// The allocated size in bytes, `0` until allocated.
    pub fn size(&self) -> usize {
        self.buffer.size()
    }

    /// The per-vertex layout.
    pub fn layout(&self) -> &VertexLayout {
        &self.layout
    }

    /// Replaces the per-vertex layout. Takes effect for vertex arrays this
    /// buffer is added to afterwards.
    pub fn set_layout(&mut self, layout: VertexLayout) {
        self.layout = layout;
    }

    /// Reserves `size` bytes of dynamic storage.
    pub fn reserve_raw(&self, size: usize) -> Result<(), RenderError> {
        self.buffer.reserve(size)
    }

    /// Reserves storage for `count` values of `T`.
    pub fn reserve<T: Pod>(&self, count: usize) -> Result<(), RenderError> {
        self.reserve_raw(count * std::mem::size_of::<T>())
    }

    /// Allocates static storage holding exactly `data`.
    pub fn allocate_raw(&self, data: &[u8]) -> Result<(), RenderError> {
        self.buffer.allocate(data)
    }

    /// Allocates static storage holding exactly `vertices`.
    pub fn allocate<T: Pod>(&self, vertices: &[T]) -> Result<(), RenderError> {
        self.allocate_raw(bytemuck::cast_slice(vertices))
    }

    /// Overwrites the start of dynamic storage with `data`.
    pub fn upload_raw(&self, data: &[u8]) -> Result<(), RenderError> {
        self.buffer.upload(data)
    }

    /// Overwrites the start of dynamic storage with `vertices`.
    pub fn upload<T: Pod>(&self, vertices: &[T]) -> Result<(), RenderError> {
        self.upload_raw(bytemuck::cast_slice(vertices))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dg_infra::HeadlessDevice;

    fn device() -> Arc<HeadlessDevice> {
        Arc::new(HeadlessDevice::new())
    }

    #[test]
    fn dynamic_buffer_reserve_then_upload() {
        let device = device();
        let vbo = VertexBuffer::new(device.clone(), true).unwrap();
        assert_eq!(vbo.size(), 0);
        vbo.reserve::<[f32; 2]>(4).unwrap();
        assert_eq!(vbo.size(), 32);

        vbo.upload(&[[1.0f32, 2.0], [3.0, 4.0]]).unwrap();
        let contents = device.buffer_contents(vbo.id()).unwrap();
        assert_eq!(&contents[..4], &1.0f32.to_ne_bytes());
        assert!(vbo.allocate_raw(&[1, 2, 3]).is_err());
        assert!(vbo.reserve_raw(64).is_err());
    }

    #[test]
    fn upload_must_be_strictly_smaller_than_storage() {
        let vbo = VertexBuffer::new(device(), true).unwrap();
        vbo.reserve_raw(16).unwrap();
        assert!(vbo.upload_raw(&[0; 15]).is_ok());
        assert!(matches!(
            vbo.upload_raw(&[0; 16]),
            Err(RenderError::ResourceLimitExceeded { .. })
        ));
    }

    #[test]
    fn static_buffer_rejects_empty_data_and_uploads() {
        let vbo = VertexBuffer::new(device(), false).unwrap();
        assert!(vbo.allocate::<f32>(&[]).is_err());
        vbo.allocate(&[0.5f32; 6]).unwrap();
        assert_eq!(vbo.size(), 24);
        assert!(vbo.upload(&[0.5f32]).is_err());
    }

    #[test]
    fn drop_releases_the_handle() {
        let device = device();
        {
            let _vbo = VertexBuffer::new(device.clone(), false).unwrap();
            assert_eq!(device.stats().live_buffers, 1);
        }
        assert_eq!(device.stats().live_buffers, 0);
    }
}
