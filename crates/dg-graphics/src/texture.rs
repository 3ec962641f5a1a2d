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

//! Slot-bindable 2D textures.

use dg_core::math::Vec2;
use dg_core::renderer::{
    AddressMode, FilterMode, GraphicsDevice, RenderError, TextureDescriptor, TextureFormat,
    TextureId, TEXTURE_SLOT_COUNT,
};
use std::path::Path;
use std::sync::Arc;

/// Describes a texture's storage and sampling state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureSpecification {
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Channels per texel, `1..=4`.
    pub color_channels: u32,
    /// Wrap mode on both axes.
    pub wrap: AddressMode,
    /// Filter used when the texture is magnified.
    pub magnify: FilterMode,
    /// Filter used when the texture is minified.
    pub minify: FilterMode,
}

impl Default for TextureSpecification {
    fn default() -> Self {
        Self {
            width: 1,
            height: 1,
            color_channels: 4,
            wrap: AddressMode::Repeat,
            magnify: FilterMode::Nearest,
            minify: FilterMode::Nearest,
        }
    }
}

impl TextureSpecification {
    /// The number of bytes a full upload must contain.
    pub fn byte_size(&self) -> usize {
        self.width as usize * self.height as usize * self.color_channels as usize
    }

    fn descriptor(&self) -> Result<TextureDescriptor, RenderError> {
        let format = TextureFormat::from_channels(self.color_channels).ok_or_else(|| {
            RenderError::ResourceNotFound(format!(
                "no texture format for {} color channels",
                self.color_channels
            ))
        })?;
        Ok(TextureDescriptor {
            width: self.width,
            height: self.height,
            format,
            address_mode: self.wrap,
            mag_filter: self.magnify,
            min_filter: self.minify,
            sample_count: 1,
        })
    }
}

/// A 2D image resource.
///
/// The device handle exists from construction; the texture becomes valid
/// once it is given storage by [`Texture::create_from_specification`] or
/// [`Texture::load_from_file`].
#[derive(Debug)]
pub struct Texture {
    device: Arc<dyn GraphicsDevice>,
    id: TextureId,
    spec: TextureSpecification,
    valid: bool,
}

fn check_slot(slot: u32) -> Result<(), RenderError> {
    if slot as usize >= TEXTURE_SLOT_COUNT {
        log::error!("Attempted to bind a texture to invalid texture slot {slot}!");
        return Err(RenderError::ResourceLimitExceeded {
            what: "texture slot",
            requested: slot as usize,
            limit: TEXTURE_SLOT_COUNT,
        });
    }
    Ok(())
}

impl Texture {
    /// Creates an invalid texture with the default specification.
    pub fn new(device: Arc<dyn GraphicsDevice>) -> Result<Self, RenderError> {
        let id = device.create_texture()?;
        Ok(Self {
            device,
            id,
            spec: TextureSpecification::default(),
            valid: false,
        })
    }

    /// Creates a blank texture from a specification.
    pub fn with_specification(
        device: Arc<dyn GraphicsDevice>,
        spec: TextureSpecification,
    ) -> Result<Self, RenderError> {
        let mut texture = Self::new(device)?;
        texture.create_from_specification(spec)?;
        Ok(texture)
    }

    /// Creates a texture from an image file.
    pub fn from_file(
        device: Arc<dyn GraphicsDevice>,
        path: impl AsRef<Path>,
    ) -> Result<Self, RenderError> {
        let mut texture = Self::new(device)?;
        texture.load_from_file(path)?;
        Ok(texture)
    }

    /// The device handle.
    pub fn id(&self) -> TextureId {
        self.id
    }

    /// The current specification.
    pub fn specification(&self) -> &TextureSpecification {
        &self.spec
    }

    /// Returns `true` once the texture has storage.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Gives the texture blank storage described by `spec`.
    pub fn create_from_specification(
        &mut self,
        spec: TextureSpecification,
    ) -> Result<(), RenderError> {
        let descriptor = spec.descriptor().inspect_err(|_| {
            log::error!(
                "Blank texture has invalid color channel count {}.",
                spec.color_channels
            );
        })?;
        self.device.define_texture(self.id, &descriptor, None)?;
        self.spec = spec;
        self.valid = true;
        Ok(())
    }

    /// Decodes an image file into this texture.
    ///
    /// Rows are flipped so that row 0 is the bottom of the image. Wrap and
    /// filter modes are kept from the current specification.
    pub fn load_from_file(&mut self, path: impl AsRef<Path>) -> Result<(), RenderError> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            log::error!("No image filename specified to load into the texture.");
            return Err(RenderError::ResourceNotFound(
                "empty image path".to_string(),
            ));
        }
        if !path.exists() {
            log::error!("Image filename '{}' not found.", path.display());
            return Err(RenderError::ResourceNotFound(path.display().to_string()));
        }

        let bytes = std::fs::read(path).map_err(|e| {
            RenderError::ResourceNotFound(format!("{}: {e}", path.display()))
        })?;
        let image = image::load_from_memory(&bytes)
            .map_err(|e| {
                log::error!("Could not load image file '{}' - {e}", path.display());
                RenderError::invalid(format!("could not decode '{}': {e}", path.display()))
            })?
            .flipv();

        let channels = u32::from(image.color().channel_count());
        let (width, height) = (image.width(), image.height());
        let pixels = match channels {
            1 => image.into_luma8().into_raw(),
            2 => image.into_luma_alpha8().into_raw(),
            3 => image.into_rgb8().into_raw(),
            4 => image.into_rgba8().into_raw(),
            _ => {
                log::error!(
                    "Image file '{}' has invalid color channel count {channels}.",
                    path.display()
                );
                return Err(RenderError::ResourceNotFound(format!(
                    "no texture format for {channels} color channels"
                )));
            }
        };

        let spec = TextureSpecification {
            width,
            height,
            color_channels: channels,
            ..self.spec
        };
        self.device
            .define_texture(self.id, &spec.descriptor()?, Some(&pixels))?;
        self.spec = spec;
        self.valid = true;
        log::debug!(
            "Loaded texture '{}' ({width}x{height}, {channels} channels)",
            path.display()
        );
        Ok(())
    }

    /// Replaces the texture's full contents.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidOperation`] if `data` is empty or is not
    /// exactly `width * height * channels` bytes.
    pub fn upload_data(&self, data: &[u8]) -> Result<(), RenderError> {
        if data.is_empty() {
            return Err(RenderError::invalid("'upload_data' with empty image data"));
        }
        if data.len() != self.spec.byte_size() {
            return Err(RenderError::invalid(format!(
                "'upload_data' of {} bytes to a texture of {} bytes",
                data.len(),
                self.spec.byte_size()
            )));
        }
        self.device.write_texture(self.id, data)?;
        Ok(())
    }

    /// Binds this texture to a texture slot.
    pub fn bind(&self, slot: u32) -> Result<(), RenderError> {
        check_slot(slot)?;
        self.device.bind_texture(slot, Some(self.id))?;
        Ok(())
    }

    /// Clears a texture slot.
    pub fn unbind(&self, slot: u32) -> Result<(), RenderError> {
        check_slot(slot)?;
        self.device.bind_texture(slot, None)?;
        Ok(())
    }

    /// Converts a position in texels to normalized texture coordinates.
    pub fn texture_coordinate(&self, position: Vec2) -> Vec2 {
        if self.spec.width == 0 || self.spec.height == 0 {
            return Vec2::ZERO;
        }
        Vec2::new(
            position.x / self.spec.width as f32,
            position.y / self.spec.height as f32,
        )
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        if let Err(e) = self.device.destroy_texture(self.id) {
            log::warn!("Failed to release texture {:?}: {e}", self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dg_infra::HeadlessDevice;

    #[test]
    fn specification_controls_format_and_upload_size() {
        let device = Arc::new(HeadlessDevice::new());
        let spec = TextureSpecification {
            width: 2,
            height: 2,
            color_channels: 3,
            ..Default::default()
        };
        let texture = Texture::with_specification(device.clone(), spec).unwrap();
        assert!(texture.is_valid());
        assert_eq!(
            device.texture_descriptor(texture.id()).unwrap().format,
            TextureFormat::Rgb8
        );

        assert!(texture.upload_data(&[0; 11]).is_err());
        assert!(texture.upload_data(&[]).is_err());
        texture.upload_data(&[7; 12]).unwrap();
        assert_eq!(device.texture_contents(texture.id()).unwrap(), vec![7; 12]);
    }

    #[test]
    fn invalid_channel_count_leaves_texture_invalid() {
        let device = Arc::new(HeadlessDevice::new());
        let mut texture = Texture::new(device).unwrap();
        let spec = TextureSpecification {
            color_channels: 5,
            ..Default::default()
        };
        assert!(texture.create_from_specification(spec).is_err());
        assert!(!texture.is_valid());
    }

    #[test]
    fn slot_range_is_checked() {
        let device = Arc::new(HeadlessDevice::new());
        let texture = Texture::with_specification(device, TextureSpecification::default()).unwrap();
        texture.bind(15).unwrap();
        texture.unbind(15).unwrap();
        assert!(matches!(
            texture.bind(16),
            Err(RenderError::ResourceLimitExceeded { limit: 16, .. })
        ));
    }

    #[test]
    fn texel_to_uv() {
        let device = Arc::new(HeadlessDevice::new());
        let spec = TextureSpecification {
            width: 64,
            height: 32,
            ..Default::default()
        };
        let texture = Texture::with_specification(device, spec).unwrap();
        assert_eq!(
            texture.texture_coordinate(Vec2::new(16.0, 16.0)),
            Vec2::new(0.25, 0.5)
        );
    }

    #[test]
    fn missing_file_is_not_found() {
        let device = Arc::new(HeadlessDevice::new());
        let mut texture = Texture::new(device).unwrap();
        assert!(matches!(
            texture.load_from_file("does/not/exist.png"),
            Err(RenderError::ResourceNotFound(_))
        ));
        assert!(matches!(
            texture.load_from_file(""),
            Err(RenderError::ResourceNotFound(_))
        ));
        assert!(!texture.is_valid());
    }
}
