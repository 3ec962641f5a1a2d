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


//! Draw calls and global render state.

use crate::buffer::VertexArray;
use dg_core::math::Color;
use dg_core::renderer::{
    GraphicsDevice, PrimitiveTopology, RenderError, RendererAdapterInfo, Viewport,
};
use std::sync::Arc;

/// Issues indexed draws and changes global device state.
///
/// Holds no resources of its own; the primitive topology used by
/// [`RenderInterface::draw_indexed`] is its only state.
#[derive(Debug, Clone)]
pub struct RenderInterface {
    device: Arc<dyn GraphicsDevice>,
    topology: PrimitiveTopology,
}

impl RenderInterface {
    /// Wraps a device, drawing triangles by default.
    pub fn new(device: Arc<dyn GraphicsDevice>) -> Self {
        let info = device.adapter_info();
        log::info!("Render interface on '{}' ({})", info.name, info.backend);
        Self {
            device,
            topology: PrimitiveTopology::default(),
        }
    }

    /// The device draws are issued on.
    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    /// Describes the adapter behind the device.
    pub fn adapter_info(&self) -> RendererAdapterInfo {
        self.device.adapter_info()
    }

    /// Sets the viewport to cover `width` by `height` pixels from the origin.
    pub fn set_viewport(&self, width: u32, height: u32) -> Result<(), RenderError> {
        self.device.set_viewport(Viewport {
            x: 0,
            y: 0,
            width,
            height,
        })?;
        Ok(())
    }

    /// Sets the color used by [`RenderInterface::clear`].
    pub fn set_clear_color(&self, color: Color) -> Result<(), RenderError> {
        self.device.set_clear_color(color)?;
        Ok(())
    }

    /// Clears color and depth of the current draw target.
    pub fn clear(&self) -> Result<(), RenderError> {
        self.device.clear()?;
        Ok(())
    }

    /// The topology used for draws.
    pub fn topology(&self) -> PrimitiveTopology {
        self.topology
    }

    /// Changes the topology used for draws.
    pub fn set_topology(&mut self, topology: PrimitiveTopology) {
        self.topology = topology;
    }

    /// Binds `vao` and draws `index_count` of its indices.
    ///
    /// The count is clamped to the number of indices in the vertex array's
    /// index buffer.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::PreconditionViolation`] if `vao` has no index
    /// buffer.
    pub fn draw_indexed(&self, vao: &VertexArray, index_count: usize) -> Result<(), RenderError> {
        let Some(ibo) = vao.index_buffer() else {
            log::error!("Attempted 'draw_indexed' on a vertex array with no index buffer.");
            return Err(RenderError::precondition(
                "'draw_indexed' on a vertex array with no index buffer",
            ));
        };
        let count = index_count.min(ibo.index_count());
        vao.bind()?;
        self.device
            .draw_indexed(self.topology, count as u32, ibo.index_format())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{IndexBuffer, VertexBuffer};
    use crate::shader::Shader;
    use dg_core::renderer::{IndexFormat, VertexAttribute, VertexAttributeType, VertexLayout};
    use dg_infra::HeadlessDevice;

    const VS: &str = "void main() {}\n";
    const FS: &str = "void main() {}\n";

    fn quad_vertex_array(device: &Arc<HeadlessDevice>, with_indices: bool) -> VertexArray {
        let layout = VertexLayout::new([VertexAttribute::new(
            "in_Position",
            VertexAttributeType::Float2,
        )]);
        let vbo = VertexBuffer::with_layout(device.clone(), false, layout).unwrap();
        vbo.allocate(&[[0.0f32, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]])
            .unwrap();
        let mut vao = VertexArray::new(device.clone()).unwrap();
        vao.add_vertex_buffer(Arc::new(vbo)).unwrap();
        if with_indices {
            let ibo = IndexBuffer::new(device.clone(), false).unwrap();
            ibo.allocate(&[0u16, 1, 2, 2, 3, 0][..]).unwrap();
            vao.set_index_buffer(Arc::new(ibo)).unwrap();
        }
        vao
    }

    #[test]
    fn draw_clamps_to_index_count() {
        let device = Arc::new(HeadlessDevice::new());
        let shader = Shader::from_sources(device.clone(), VS, FS).unwrap();
        shader.bind().unwrap();
        let vao = quad_vertex_array(&device, true);

        let mut interface = RenderInterface::new(device.clone());
        interface.draw_indexed(&vao, 1000).unwrap();
        interface.set_topology(PrimitiveTopology::Lines);
        interface.draw_indexed(&vao, 4).unwrap();

        let log = device.draw_log();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].index_count, 6);
        assert_eq!(log[0].index_format, IndexFormat::U16);
        assert_eq!(log[0].topology, PrimitiveTopology::Triangles);
        assert_eq!(log[1].index_count, 4);
        assert_eq!(log[1].topology, PrimitiveTopology::Lines);
    }

    #[test]
    fn draw_without_index_buffer_is_rejected() {
        let device = Arc::new(HeadlessDevice::new());
        let vao = quad_vertex_array(&device, false);
        let interface = RenderInterface::new(device.clone());
        assert!(matches!(
            interface.draw_indexed(&vao, 6),
            Err(RenderError::PreconditionViolation(_))
        ));
        assert!(device.draw_log().is_empty());
    }

    #[test]
    fn global_state() {
        let device = Arc::new(HeadlessDevice::new());
        let interface = RenderInterface::new(device.clone());
        interface.set_viewport(640, 480).unwrap();
        interface.set_clear_color(Color::RED).unwrap();
        interface.clear().unwrap();
        assert_eq!(device.viewport().width, 640);
        assert_eq!(device.clear_color(), Color::RED);
    }
}
