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

//! Texture handles and descriptors.

/// The number of texture units a single draw call can sample from.
pub const TEXTURE_SLOT_COUNT: usize = 16;

/// An opaque handle to a GPU texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub usize);

/// The pixel storage format of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// One 8-bit channel.
    R8,
    /// Two 8-bit channels.
    Rg8,
    /// Three 8-bit channels.
    Rgb8,
    /// Four 8-bit channels.
    Rgba8,
    /// One signed 32-bit integer channel, used for picking attachments.
    R32Sint,
    /// Packed 24-bit depth and 8-bit stencil.
    Depth24Stencil8,
}

impl TextureFormat {
    /// Returns the normalized 8-bit format for a channel count in `1..=4`.
    pub const fn from_channels(channels: u32) -> Option<Self> {
        match channels {
            1 => Some(TextureFormat::R8),
            2 => Some(TextureFormat::Rg8),
            3 => Some(TextureFormat::Rgb8),
            4 => Some(TextureFormat::Rgba8),
            _ => None,
        }
    }

    /// The size of one texel in bytes.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            TextureFormat::R8 => 1,
            TextureFormat::Rg8 => 2,
            TextureFormat::Rgb8 => 3,
            TextureFormat::Rgba8 | TextureFormat::R32Sint | TextureFormat::Depth24Stencil8 => 4,
        }
    }

    /// Returns `true` for depth/stencil formats.
    pub const fn is_depth(self) -> bool {
        matches!(self, TextureFormat::Depth24Stencil8)
    }
}

/// How texture coordinates outside `[0, 1]` are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AddressMode {
    /// Tile the texture.
    #[default]
    Repeat,
    /// Tile the texture, mirroring every other repetition.
    MirroredRepeat,
    /// Clamp to the edge texel.
    ClampToEdge,
}

/// How texels are filtered when a texture is scaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FilterMode {
    /// Pick the nearest texel.
    #[default]
    Nearest,
    /// Blend the nearest texels.
    Linear,
}

/// Everything needed to (re)define a texture's storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureDescriptor {
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Texel format.
    pub format: TextureFormat,
    /// Wrap mode on both axes.
    pub address_mode: AddressMode,
    /// Filter used when magnifying.
    pub mag_filter: FilterMode,
    /// Filter used when minifying.
    pub min_filter: FilterMode,
    /// Sample count; anything above 1 is a multisampled texture.
    pub sample_count: u32,
}

impl TextureDescriptor {
    /// The number of bytes a full upload for this descriptor must contain.
    pub const fn byte_size(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }
}

/// A value used to clear a texture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    /// Fill every texel with this integer, for integer formats.
    Int(i32),
    /// Fill every texel with this normalized color.
    Float([f32; 4]),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_map_to_formats() {
        assert_eq!(TextureFormat::from_channels(1), Some(TextureFormat::R8));
        assert_eq!(TextureFormat::from_channels(3), Some(TextureFormat::Rgb8));
        assert_eq!(TextureFormat::from_channels(0), None);
        assert_eq!(TextureFormat::from_channels(5), None);
    }

    #[test]
    fn descriptor_byte_size() {
        let desc = TextureDescriptor {
            width: 4,
            height: 2,
            format: TextureFormat::Rgb8,
            address_mode: AddressMode::Repeat,
            mag_filter: FilterMode::Nearest,
            min_filter: FilterMode::Nearest,
            sample_count: 1,
        };
        assert_eq!(desc.byte_size(), 24);
    }
}
