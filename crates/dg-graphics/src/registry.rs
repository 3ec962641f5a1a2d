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


//! Name-keyed caches of shared graphics assets.
//!
//! An [`AssetRegistry`] is an ordinary owned value. Whoever needs a cache of
//! textures or shaders creates one and passes it where it is needed.

use crate::shader::Shader;
use crate::texture::Texture;
use dg_core::renderer::{GraphicsDevice, RenderError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A resource that can be loaded into an [`AssetRegistry`].
pub trait Asset {
    /// Returns `true` if the resource loaded successfully and can be used.
    fn is_valid(&self) -> bool;
}

impl Asset for Texture {
    fn is_valid(&self) -> bool {
        Texture::is_valid(self)
    }
}

impl Asset for Shader {
    fn is_valid(&self) -> bool {
        Shader::is_valid(self)
    }
}

/// A cache of textures keyed by file name.
pub type TextureRegistry = AssetRegistry<Texture>;

/// A cache of shaders keyed by file name.
pub type ShaderRegistry = AssetRegistry<Shader>;

/// Maps names to shared, valid assets.
#[derive(Debug)]
pub struct AssetRegistry<T> {
    root: PathBuf,
    assets: HashMap<String, Arc<T>>,
}

impl<T: Asset> Default for AssetRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn check_name(op: &str, name: &str) -> Result<(), RenderError> {
    if name.trim().is_empty() {
        return Err(RenderError::invalid(format!("'{op}' with a blank asset name")));
    }
    Ok(())
}

fn not_found(name: &str) -> RenderError {
    log::error!("Asset '{name}' not found!");
    RenderError::ResourceNotFound(name.to_string())
}

impl<T: Asset> AssetRegistry<T> {
    /// Creates an empty registry resolving file names against the working
    /// directory.
    #[must_use]
    pub fn new() -> Self {
        Self::with_root(PathBuf::new())
    }

    /// Creates an empty registry resolving file names against `root`.
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            assets: HashMap::new(),
        }
    }

    /// The directory file names are resolved against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the asset called `name`, calling `loader` with its resolved
    /// path if it is not cached yet.
    ///
    /// # Errors
    ///
    /// * [`RenderError::InvalidOperation`] - `name` is blank.
    /// * [`RenderError::ResourceNotFound`] - The loader produced an invalid asset.
    /// * Any error returned by `loader`. Nothing is cached in that case.
    pub fn get_or_load<F>(&mut self, name: &str, loader: F) -> Result<Arc<T>, RenderError>
    where
        F: FnOnce(&Path) -> Result<T, RenderError>,
    {
        check_name("get_or_load", name)?;
        if let Some(asset) = self.assets.get(name) {
            return Ok(asset.clone());
        }

        let asset = loader(&self.root.join(name))?;
        if !asset.is_valid() {
            log::error!("Could not load asset '{name}'!");
            return Err(RenderError::ResourceNotFound(name.to_string()));
        }
        let asset = Arc::new(asset);
        self.assets.insert(name.to_string(), asset.clone());
        log::debug!("Registered asset '{name}'");
        Ok(asset)
    }

    /// Returns `true` if an asset is cached under `name`.
    pub fn contains(&self, name: &str) -> Result<bool, RenderError> {
        check_name("contains", name)?;
        Ok(self.assets.contains_key(name))
    }

    /// Returns the asset cached under `name`.
    pub fn get(&self, name: &str) -> Result<Arc<T>, RenderError> {
        check_name("get", name)?;
        self.assets.get(name).cloned().ok_or_else(|| not_found(name))
    }

    /// Caches `asset` under `name`, returning the asset it replaced.
    pub fn insert(&mut self, name: &str, asset: Arc<T>) -> Result<Option<Arc<T>>, RenderError> {
        check_name("insert", name)?;
        if !asset.is_valid() {
            return Err(RenderError::ResourceNotFound(name.to_string()));
        }
        Ok(self.assets.insert(name.to_string(), asset))
    }

    /// Removes and returns the asset cached under `name`.
    ///
    /// The asset stays alive for as long as other owners hold it.
    pub fn remove(&mut self, name: &str) -> Result<Arc<T>, RenderError> {
        check_name("remove", name)?;
        self.assets.remove(name).ok_or_else(|| not_found(name))
    }

    /// Drops every cached asset.
    pub fn clear(&mut self) {
        self.assets.clear();
    }

    /// The number of cached assets.
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl TextureRegistry {
    /// Returns the texture for image file `name`, loading it on first use.
    pub fn load(
        &mut self,
        device: &Arc<dyn GraphicsDevice>,
        name: &str,
    ) -> Result<Arc<Texture>, RenderError> {
        self.get_or_load(name, |path| Texture::from_file(device.clone(), path))
    }
}

impl ShaderRegistry {
    /// Returns the shader for combined source file `name`, building it on
    /// first use.
    pub fn load(
        &mut self,
        device: &Arc<dyn GraphicsDevice>,
        name: &str,
    ) -> Result<Arc<Shader>, RenderError> {
        self.get_or_load(name, |path| Ok(Shader::from_file(device.clone(), path)?))
    }
}
