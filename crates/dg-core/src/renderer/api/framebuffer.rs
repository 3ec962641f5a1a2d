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

//! Framebuffer handles and attachment descriptors.

use super::texture::TextureFormat;

/// The maximum number of color attachments on one framebuffer.
pub const FRAMEBUFFER_COLOR_ATTACHMENT_COUNT: usize = 4;

/// An opaque handle to a framebuffer object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FramebufferId(pub usize);

/// Where a texture is attached on a framebuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentPoint {
    /// The n-th color attachment.
    Color(u32),
    /// The combined depth/stencil attachment.
    DepthStencil,
}

/// Which framebuffer binding point an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrameBufferTarget {
    /// Read operations only.
    Reading,
    /// Draw operations only.
    Drawing,
    /// Both read and draw.
    #[default]
    Both,
}

impl FrameBufferTarget {
    /// Returns `true` if the target includes the draw binding.
    pub const fn draws(self) -> bool {
        matches!(self, FrameBufferTarget::Drawing | FrameBufferTarget::Both)
    }

    /// Returns `true` if the target includes the read binding.
    pub const fn reads(self) -> bool {
        matches!(self, FrameBufferTarget::Reading | FrameBufferTarget::Both)
    }
}

/// Completeness status reported by the device for a framebuffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramebufferStatus {
    /// The framebuffer can be rendered to.
    Complete,
    /// The framebuffer is unusable, with the reason.
    Incomplete(String),
}

/// The storage format of one framebuffer attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FrameBufferTextureFormat {
    /// No storage; skipped when the framebuffer is built.
    #[default]
    None,
    /// One signed 32-bit integer per pixel, for entity picking.
    ColorR32,
    /// Normalized 8-bit RGBA.
    ColorRgba8,
    /// 24-bit depth with 8-bit stencil.
    Depth24Stencil8,
}

impl FrameBufferTextureFormat {
    /// Returns `true` for color formats.
    pub const fn is_color(self) -> bool {
        matches!(
            self,
            FrameBufferTextureFormat::ColorR32 | FrameBufferTextureFormat::ColorRgba8
        )
    }

    /// Returns `true` for depth/stencil formats.
    pub const fn is_depth(self) -> bool {
        matches!(self, FrameBufferTextureFormat::Depth24Stencil8)
    }

    /// The texture format backing this attachment, if any.
    pub const fn texture_format(self) -> Option<TextureFormat> {
        match self {
            FrameBufferTextureFormat::None => None,
            FrameBufferTextureFormat::ColorR32 => Some(TextureFormat::R32Sint),
            FrameBufferTextureFormat::ColorRgba8 => Some(TextureFormat::Rgba8),
            FrameBufferTextureFormat::Depth24Stencil8 => Some(TextureFormat::Depth24Stencil8),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_format_classification() {
        assert!(FrameBufferTextureFormat::ColorR32.is_color());
        assert!(!FrameBufferTextureFormat::ColorR32.is_depth());
        assert!(FrameBufferTextureFormat::Depth24Stencil8.is_depth());
        assert!(!FrameBufferTextureFormat::None.is_color());
        assert!(!FrameBufferTextureFormat::None.is_depth());
        assert_eq!(FrameBufferTextureFormat::None.texture_format(), None);
    }

    #[test]
    fn targets() {
        assert!(FrameBufferTarget::Both.draws() && FrameBufferTarget::Both.reads());
        assert!(!FrameBufferTarget::Reading.draws());
        assert!(!FrameBufferTarget::Drawing.reads());
    }
}
