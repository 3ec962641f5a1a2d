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

//! GPU buffers and the vertex arrays that bind them together.

mod index_buffer;
mod vertex_array;
mod vertex_buffer;

pub use self::index_buffer::{IndexBuffer, IndexData};
pub use self::vertex_array::VertexArray;
pub use self::vertex_buffer::VertexBuffer;

use dg_core::renderer::{BufferId, BufferUsage, GraphicsDevice, RenderError};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// A device buffer whose storage is sized exactly once.
///
/// Dynamic buffers are sized with [`GpuBuffer::reserve`] and then written in
/// part with [`GpuBuffer::upload`]. Static buffers are sized and filled in one
/// go with [`GpuBuffer::allocate`] and never written again.
pub(crate) struct GpuBuffer {
    device: Arc<dyn GraphicsDevice>,
    id: BufferId,
    dynamic: bool,
    size: OnceLock<usize>,
    kind: &'static str,
}

impl GpuBuffer {
    pub(crate) fn new(
        device: Arc<dyn GraphicsDevice>,
        dynamic: bool,
        kind: &'static str,
    ) -> Result<Self, RenderError> {
        let id = device.create_buffer()?;
        Ok(Self {
            device,
            id,
            dynamic,
            size: OnceLock::new(),
            kind,
        })
    }

    pub(crate) fn id(&self) -> BufferId {
        self.id
    }

    pub(crate) fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    /// The allocated size in bytes, `0` until the first reserve/allocate.
    pub(crate) fn size(&self) -> usize {
        self.size.get().copied().unwrap_or(0)
    }

    pub(crate) fn is_allocated(&self) -> bool {
        self.size.get().is_some()
    }

    fn ensure_unallocated(&self, op: &str) -> Result<(), RenderError> {
        if self.is_allocated() {
            return Err(RenderError::invalid(format!(
                "'{op}' on already-allocated {}",
                self.kind
            )));
        }
        Ok(())
    }

    pub(crate) fn reserve(&self, size: usize) -> Result<(), RenderError> {
        if !self.dynamic {
            return Err(RenderError::invalid(format!(
                "'reserve' on static {}",
                self.kind
            )));
        }
        self.ensure_unallocated("reserve")?;
        if size == 0 {
            return Err(RenderError::invalid(format!(
                "'reserve' of zero bytes on {}",
                self.kind
            )));
        }

        self.device
            .allocate_buffer(self.id, size, None, BufferUsage::Dynamic)?;
        self.mark_allocated(size)
    }

    pub(crate) fn allocate(&self, data: &[u8]) -> Result<(), RenderError> {
        if self.dynamic {
            return Err(RenderError::invalid(format!(
                "'allocate' on dynamic {}",
                self.kind
            )));
        }
        self.ensure_unallocated("allocate")?;
        if data.is_empty() {
            return Err(RenderError::invalid(format!(
                "'allocate' of empty data on {}",
                self.kind
            )));
        }

        self.device
            .allocate_buffer(self.id, data.len(), Some(data), BufferUsage::Static)?;
        self.mark_allocated(data.len())
    }

    pub(crate) fn upload(&self, data: &[u8]) -> Result<(), RenderError> {
        if !self.dynamic {
            return Err(RenderError::invalid(format!(
                "'upload' on static {}",
                self.kind
            )));
        }
        let Some(&size) = self.size.get() else {
            return Err(RenderError::invalid(format!(
                "'upload' on non-allocated {}",
                self.kind
            )));
        };
        if data.len() >= size {
            log::error!(
                "Attempted upload of {} bytes to {} with only {} byte(s)!",
                data.len(),
                self.kind,
                size
            );
            return Err(RenderError::ResourceLimitExceeded {
                what: self.kind,
                requested: data.len(),
                limit: size,
            });
        }

        self.device.write_buffer(self.id, 0, data)?;
        Ok(())
    }

    fn mark_allocated(&self, size: usize) -> Result<(), RenderError> {
        self.size.set(size).map_err(|_| {
            RenderError::invalid(format!("{} was allocated concurrently", self.kind))
        })
    }
}

impl fmt::Debug for GpuBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuBuffer")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("dynamic", &self.dynamic)
            .field("size", &self.size())
            .finish()
    }
}

impl Drop for GpuBuffer {
    fn drop(&mut self) {
        if let Err(e) = self.device.destroy_buffer(self.id) {
            log::warn!("Failed to release {} {:?}: {e}", self.kind, self.id);
        }
    }
}
