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

use super::{IndexBuffer, VertexBuffer};
use dg_core::renderer::{GraphicsDevice, RenderError, VertexArrayId};
use std::sync::Arc;

/// A drawable unit: a set of vertex buffers bound by layout plus at most one
/// index buffer.
///
/// Attribute locations are handed out in the order buffers are added, each
/// buffer's attributes in declaration order. The array shares its buffers
/// and only releases its own handle when dropped.
#[derive(Debug)]
pub struct VertexArray {
    device: Arc<dyn GraphicsDevice>,
    id: VertexArrayId,
    vertex_buffers: Vec<Arc<VertexBuffer>>,
    index_buffer: Option<Arc<IndexBuffer>>,
    next_location: u32,
}

impl VertexArray {
    /// Creates an empty vertex array.
    pub fn new(device: Arc<dyn GraphicsDevice>) -> Result<Self, RenderError> {
        let id = device.create_vertex_array()?;
        Ok(Self {
            device,
            id,
            vertex_buffers: Vec::new(),
            index_buffer: None,
            next_location: 0,
        })
    }

    /// The device handle.
    pub fn id(&self) -> VertexArrayId {
        self.id
    }

    /// Makes this vertex array current on its device.
    pub fn bind(&self) -> Result<(), RenderError> {
        self.device.bind_vertex_array(Some(self.id))?;
        Ok(())
    }

    /// Clears the current vertex array.
    pub fn unbind(&self) -> Result<(), RenderError> {
        self.device.bind_vertex_array(None)?;
        Ok(())
    }

    /// Binds a vertex buffer's attributes to the next free locations.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::PreconditionViolation`] if the buffer's layout is empty.
    pub fn add_vertex_buffer(&mut self, buffer: Arc<VertexBuffer>) -> Result<(), RenderError> {
        let layout = buffer.layout();
        if layout.is_empty() {
            return Err(RenderError::precondition(
                "'add_vertex_buffer' with a vertex buffer that has no layout",
            ));
        }

        self.device
            .set_vertex_buffer(self.id, buffer.id(), self.next_location, layout)?;
        self.next_location += layout.location_count();
        self.vertex_buffers.push(buffer);
        Ok(())
    }

    /// Sets the index buffer used for indexed draws, replacing any previous one.
    pub fn set_index_buffer(&mut self, buffer: Arc<IndexBuffer>) -> Result<(), RenderError> {
        self.device
            .set_index_buffer(self.id, buffer.id(), buffer.index_format())?;
        self.index_buffer = Some(buffer);
        Ok(())
    }

    /// The vertex buffers, in the order they were added.
    pub fn vertex_buffers(&self) -> &[Arc<VertexBuffer>] {
        &self.vertex_buffers
    }

    /// The index buffer, if one was set.
    pub fn index_buffer(&self) -> Option<&Arc<IndexBuffer>> {
        self.index_buffer.as_ref()
    }
}

impl Drop for VertexArray {
    fn drop(&mut self) {
        if let Err(e) = self.device.destroy_vertex_array(self.id) {
            log::warn!("Failed to release vertex array {:?}: {e}", self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dg_core::renderer::{VertexAttribute, VertexAttributeType, VertexLayout};
    use dg_infra::HeadlessDevice;

    #[test]
    fn rejects_buffers_without_layout() {
        let device = Arc::new(HeadlessDevice::new());
        let mut vao = VertexArray::new(device.clone()).unwrap();
        let vbo = Arc::new(VertexBuffer::new(device, false).unwrap());
        assert!(matches!(
            vao.add_vertex_buffer(vbo),
            Err(RenderError::PreconditionViolation(_))
        ));
        assert!(vao.vertex_buffers().is_empty());
    }

    #[test]
    fn buffers_are_shared_not_owned() {
        let device = Arc::new(HeadlessDevice::new());
        let layout = VertexLayout::new([
            VertexAttribute::new("in_Position", VertexAttributeType::Float2),
            VertexAttribute::new("in_Color", VertexAttributeType::Float4),
        ]);
        let vbo = Arc::new(VertexBuffer::with_layout(device.clone(), true, layout).unwrap());
        let ibo = Arc::new(IndexBuffer::new(device.clone(), false).unwrap());

        {
            let mut vao = VertexArray::new(device.clone()).unwrap();
            vao.add_vertex_buffer(vbo.clone()).unwrap();
            vao.add_vertex_buffer(vbo.clone()).unwrap();
            vao.set_index_buffer(ibo.clone()).unwrap();
            assert_eq!(vao.next_location, 4);
            assert_eq!(Arc::strong_count(&vbo), 3);
            assert_eq!(device.stats().live_vertex_arrays, 1);
        }

        assert_eq!(Arc::strong_count(&vbo), 1);
        assert_eq!(device.stats().live_vertex_arrays, 0);
        assert_eq!(device.stats().live_buffers, 2);
    }
}
