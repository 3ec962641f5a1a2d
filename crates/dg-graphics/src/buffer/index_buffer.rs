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
use dg_core::renderer::{BufferId, GraphicsDevice, IndexFormat, RenderError};
use std::sync::{Arc, OnceLock};

/// A borrowed run of indices of one of the supported widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexData<'a> {
    /// 8-bit indices.
    U8(&'a [u8]),
    /// 16-bit indices.
    U16(&'a [u16]),
    /// 32-bit indices.
    U32(&'a [u32]),
}

impl IndexData<'_> {
    /// The element format of these indices.
    pub fn format(&self) -> IndexFormat {
        match self {
            IndexData::U8(_) => IndexFormat::U8,
            IndexData::U16(_) => IndexFormat::U16,
            IndexData::U32(_) => IndexFormat::U32,
        }
    }

    /// The number of indices.
    pub fn len(&self) -> usize {
        match self {
            IndexData::U8(v) => v.len(),
            IndexData::U16(v) => v.len(),
            IndexData::U32(v) => v.len(),
        }
    }

    /// Returns `true` if there are no indices.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The indices as raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            IndexData::U8(v) => v,
            IndexData::U16(v) => bytemuck::cast_slice(v),
            IndexData::U32(v) => bytemuck::cast_slice(v),
        }
    }
}

impl<'a> From<&'a [u8]> for IndexData<'a> {
    fn from(v: &'a [u8]) -> Self {
        IndexData::U8(v)
    }
}

impl<'a> From<&'a [u16]> for IndexData<'a> {
    fn from(v: &'a [u16]) -> Self {
        IndexData::U16(v)
    }
}

impl<'a> From<&'a [u32]> for IndexData<'a> {
    fn from(v: &'a [u32]) -> Self {
        IndexData::U32(v)
    }
}

impl<'a> From<&'a Vec<u32>> for IndexData<'a> {
    fn from(v: &'a Vec<u32>) -> Self {
        IndexData::U32(v)
    }
}

/// What the buffer was sized for.
#[derive(Debug, Clone, Copy)]
struct IndexAllocation {
    format: IndexFormat,
    count: usize,
}

/// A buffer of vertex indices.
///
/// Follows the same write-once rules as [`VertexBuffer`](super::VertexBuffer)
/// and additionally records the index format and count chosen when it was
/// sized. Every write must be a whole number of indices in that format.
#[derive(Debug)]
pub struct IndexBuffer {
    buffer: GpuBuffer,
    allocation: OnceLock<IndexAllocation>,
}

impl IndexBuffer {
    /// Creates an empty index buffer.
    pub fn new(device: Arc<dyn GraphicsDevice>, dynamic: bool) -> Result<Self, RenderError> {
        Ok(Self {
            buffer: GpuBuffer::new(device, dynamic, "index buffer")?,
            allocation: OnceLock::new(),
        })
    }

    /// The device handle.
    pub fn id(&self) -> BufferId {
        self.buffer.id()
    }

    /// Whether this buffer is reserved and uploaded to.
    pub fn is_dynamic(&self) -> bool {
        self.buffer.is_dynamic()
    }

    /// The allocated size in bytes, `0` until allocated.
    pub fn size(&self) -> usize {
        self.buffer.size()
    }

    /// The number of indices the buffer was sized for, `0` until allocated.
    pub fn index_count(&self) -> usize {
        self.allocation.get().map_or(0, |a| a.count)
    }

    /// The index element format. Unallocated buffers report the default, 32-bit.
    pub fn index_format(&self) -> IndexFormat {
        self.allocation.get().map_or_else(IndexFormat::default, |a| a.format)
    }

    /// Reserves dynamic storage for `count` indices of `format`.
    pub fn reserve(&self, format: IndexFormat, count: usize) -> Result<(), RenderError> {
        self.reserve_raw(format, count * format.size())
    }

    /// Reserves `size` bytes of dynamic storage for indices of `format`.
    pub fn reserve_raw(&self, format: IndexFormat, size: usize) -> Result<(), RenderError> {
        check_multiple(size, format)?;
        self.buffer.reserve(size)?;
        self.record(format, size / format.size());
        Ok(())
    }

    /// Allocates static storage holding exactly `indices`.
    pub fn allocate<'a>(&self, indices: impl Into<IndexData<'a>>) -> Result<(), RenderError> {
        let indices = indices.into();
        self.buffer.allocate(indices.as_bytes())?;
        self.record(indices.format(), indices.len());
        Ok(())
    }

    /// Allocates static storage from raw bytes holding indices of `format`.
    pub fn allocate_raw(&self, format: IndexFormat, data: &[u8]) -> Result<(), RenderError> {
        check_multiple(data.len(), format)?;
        self.buffer.allocate(data)?;
        self.record(format, data.len() / format.size());
        Ok(())
    }

    /// Overwrites the start of dynamic storage with `indices`.
    pub fn upload<'a>(&self, indices: impl Into<IndexData<'a>>) -> Result<(), RenderError> {
        let indices = indices.into();
        self.upload_raw(indices.format(), indices.as_bytes())
    }

    /// Overwrites the start of dynamic storage with raw index bytes.
    pub fn upload_raw(&self, format: IndexFormat, data: &[u8]) -> Result<(), RenderError> {
        if let Some(allocation) = self.allocation.get() {
            if allocation.format != format {
                return Err(RenderError::invalid(format!(
                    "'upload' of {format:?} indices to a {:?} index buffer",
                    allocation.format
                )));
            }
        }
        check_multiple(data.len(), format)?;
        self.buffer.upload(data)
    }

    fn record(&self, format: IndexFormat, count: usize) {
        // The inner buffer already refused a second allocation.
        let _ = self.allocation.set(IndexAllocation { format, count });
    }
}

fn check_multiple(size: usize, format: IndexFormat) -> Result<(), RenderError> {
    if size % format.size() != 0 {
        log::error!(
            "Index data of {size} bytes is not a multiple of {} bytes!",
            format.size()
        );
        return Err(RenderError::invalid(format!(
            "index data of {size} bytes is not a whole number of {format:?} indices"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dg_infra::HeadlessDevice;

    #[test]
    fn static_allocation_records_format_and_count() {
        let device = Arc::new(HeadlessDevice::new());
        let ibo = IndexBuffer::new(device.clone(), false).unwrap();
        assert_eq!(ibo.index_count(), 0);
        assert_eq!(ibo.index_format(), IndexFormat::U32);

        let indices: &[u16] = &[0, 1, 2, 2, 3, 0];
        ibo.allocate(indices).unwrap();
        assert_eq!(ibo.index_count(), 6);
        assert_eq!(ibo.index_format(), IndexFormat::U16);
        assert_eq!(ibo.size(), 12);
        assert!(ibo.allocate(indices).is_err());
        let contents = device.buffer_contents(ibo.id()).unwrap();
        assert_eq!(&contents[2..4], &1u16.to_ne_bytes()[..]);
    }

    #[test]
    fn raw_sizes_must_be_whole_indices() {
        let ibo = IndexBuffer::new(Arc::new(HeadlessDevice::new()), true).unwrap();
        assert!(ibo.reserve_raw(IndexFormat::U32, 10).is_err());
        ibo.reserve(IndexFormat::U32, 8).unwrap();
        assert_eq!(ibo.index_count(), 8);
        assert!(ibo.upload_raw(IndexFormat::U32, &[0; 6]).is_err());
        let small: &[u8] = &[1, 2];
        assert!(ibo.upload(small).is_err());
        let ok: &[u32] = &[0, 1, 2];
        ibo.upload(ok).unwrap();
    }
}
