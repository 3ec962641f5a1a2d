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

//! Shader programs built from a vertex and a fragment stage.

use dg_core::renderer::{
    GraphicsDevice, ProgramId, RenderError, ShaderError, ShaderId, ShaderStage, UniformValue,
};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A linked vertex + fragment program and the sources it was built from.
///
/// A shader starts out invalid and becomes valid after its first successful
/// build. Rebuilding is atomic: the previous program and sources stay in
/// place until the new program links, so a failed rebuild never leaves the
/// shader worse off than before.
///
/// Rebuilds take `&self`, so a shader shared with the renderer can still be
/// reloaded. Every successful build bumps [`Shader::generation`].
#[derive(Debug)]
pub struct Shader {
    device: Arc<dyn GraphicsDevice>,
    state: RwLock<ShaderState>,
}

#[derive(Debug, Default)]
struct ShaderState {
    program: Option<ProgramId>,
    vertex_source: String,
    fragment_source: String,
    generation: u64,
}

impl ShaderState {
    fn replace_program(&mut self, device: &dyn GraphicsDevice, program: ProgramId) {
        if let Some(old) = self.program.replace(program) {
            if let Err(e) = device.destroy_program(old) {
                log::warn!("Failed to release shader program {old:?}: {e}");
            }
        }
        self.generation += 1;
        log::debug!("Shader program {program:?} built");
    }
}

/// Releases a compiled stage when it goes out of scope.
struct StageGuard<'a> {
    device: &'a dyn GraphicsDevice,
    id: ShaderId,
}

impl Drop for StageGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.device.destroy_shader(self.id) {
            log::warn!("Failed to release shader stage {:?}: {e}", self.id);
        }
    }
}

fn compile_stage<'a>(
    device: &'a dyn GraphicsDevice,
    stage: ShaderStage,
    source: &str,
) -> Result<StageGuard<'a>, ShaderError> {
    if source.trim().is_empty() {
        log::error!("No {stage} shader code provided.");
        return Err(ShaderError::EmptySource { stage });
    }
    match device.compile_shader(stage, source) {
        Ok((id, warnings)) => {
            if !warnings.is_empty() {
                log::warn!("GLSL {stage} shader compiled with warning: {warnings}");
            }
            Ok(StageGuard { device, id })
        }
        Err(e) => {
            log::error!("Error compiling GLSL {stage} shader: {e}");
            Err(e)
        }
    }
}

fn build_program(
    device: &dyn GraphicsDevice,
    vertex_source: &str,
    fragment_source: &str,
) -> Result<ProgramId, ShaderError> {
    let vertex = compile_stage(device, ShaderStage::Vertex, vertex_source)?;
    let fragment = compile_stage(device, ShaderStage::Fragment, fragment_source)?;
    match device.link_program(vertex.id, fragment.id) {
        Ok((program, warnings)) => {
            if !warnings.is_empty() {
                log::warn!("GLSL shader program linked with warning: {warnings}");
            }
            Ok(program)
        }
        Err(e) => {
            log::error!("Error linking GLSL shader program: {e}");
            Err(e)
        }
    }
}

/// Splits a combined shader file into its vertex and fragment sources.
///
/// Stages are introduced by `#shader vertex` and `#shader fragment` lines. A
/// stage may appear more than once; its blocks are concatenated.
pub fn parse_combined_source(text: &str) -> Result<(String, String), ShaderError> {
    let mut vertex = String::new();
    let mut fragment = String::new();
    let mut current: Option<ShaderStage> = None;

    for (index, line) in text.lines().enumerate() {
        if let Some(rest) = line.trim_start().strip_prefix("#shader") {
            current = match rest.trim() {
                "vertex" => Some(ShaderStage::Vertex),
                "fragment" => Some(ShaderStage::Fragment),
                _ => {
                    log::error!("Invalid #shader directive.");
                    return Err(ShaderError::Directive {
                        line: index + 1,
                        text: line.to_string(),
                    });
                }
            };
            continue;
        }

        let target = match current {
            Some(ShaderStage::Vertex) => &mut vertex,
            Some(ShaderStage::Fragment) => &mut fragment,
            None if line.trim().is_empty() => continue,
            None => {
                log::error!("No #shader directive set.");
                return Err(ShaderError::Directive {
                    line: index + 1,
                    text: line.to_string(),
                });
            }
        };
        target.push_str(line);
        target.push('\n');
    }
    Ok((vertex, fragment))
}

impl Shader {
    /// Creates an invalid shader with no sources.
    pub fn new(device: Arc<dyn GraphicsDevice>) -> Self {
        Self {
            device,
            state: RwLock::new(ShaderState::default()),
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, ShaderState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, ShaderState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates and builds a shader from inline sources.
    pub fn from_sources(
        device: Arc<dyn GraphicsDevice>,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<Self, ShaderError> {
        let shader = Self::new(device);
        shader.load_from_sources(vertex_source, fragment_source)?;
        Ok(shader)
    }

    /// Creates and builds a shader from a combined `#shader` file.
    pub fn from_file(
        device: Arc<dyn GraphicsDevice>,
        path: impl AsRef<Path>,
    ) -> Result<Self, ShaderError> {
        let shader = Self::new(device);
        shader.load_from_file(path)?;
        Ok(shader)
    }

    /// Builds a new program from the given sources and swaps it in.
    ///
    /// On failure the shader keeps its previous program and sources.
    pub fn load_from_sources(
        &self,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<(), ShaderError> {
        let mut state = self.write_state();
        let program = build_program(self.device.as_ref(), vertex_source, fragment_source)?;
        state.vertex_source = vertex_source.to_string();
        state.fragment_source = fragment_source.to_string();
        state.replace_program(self.device.as_ref(), program);
        Ok(())
    }

    /// Reads a combined `#shader` file and builds it.
    pub fn load_from_file(&self, path: impl AsRef<Path>) -> Result<(), ShaderError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            log::error!("Could not read shader file '{}': {e}", path.display());
            ShaderError::Load {
                path: path.display().to_string(),
                reason: e.to_string(),
            }
        })?;
        let (vertex, fragment) = parse_combined_source(&text)?;
        self.load_from_sources(&vertex, &fragment)
    }

    /// Rebuilds the program from the current sources.
    pub fn build(&self) -> Result<(), ShaderError> {
        let mut state = self.write_state();
        let program = build_program(
            self.device.as_ref(),
            &state.vertex_source,
            &state.fragment_source,
        )?;
        state.replace_program(self.device.as_ref(), program);
        Ok(())
    }

    /// Returns `true` once a program has been built.
    pub fn is_valid(&self) -> bool {
        self.read_state().program.is_some()
    }

    /// The linked program, if any.
    pub fn program(&self) -> Option<ProgramId> {
        self.read_state().program
    }

    /// Counts successful builds. Uniforms set before the latest build are
    /// gone from the new program.
    pub fn generation(&self) -> u64 {
        self.read_state().generation
    }

    /// The vertex stage source of the current program.
    pub fn vertex_source(&self) -> String {
        self.read_state().vertex_source.clone()
    }

    /// The fragment stage source of the current program.
    pub fn fragment_source(&self) -> String {
        self.read_state().fragment_source.clone()
    }

    fn valid_program(&self, op: &str) -> Result<ProgramId, RenderError> {
        self.program().ok_or_else(|| {
            log::error!("Attempt to {op} an invalid shader!");
            RenderError::precondition(format!("'{op}' on an invalid shader"))
        })
    }

    /// Makes this program current.
    pub fn bind(&self) -> Result<(), RenderError> {
        let program = self.valid_program("bind")?;
        self.device.use_program(Some(program))?;
        Ok(())
    }

    /// Clears the current program.
    pub fn unbind(&self) -> Result<(), RenderError> {
        self.device.use_program(None)?;
        Ok(())
    }

    /// Returns `true` if the program exposes a uniform with this name.
    pub fn has_uniform(&self, name: &str) -> bool {
        match self.program() {
            Some(program) if !name.is_empty() => {
                matches!(self.device.uniform_location(program, name), Ok(Some(_)))
            }
            _ => false,
        }
    }

    /// Sets a uniform by name.
    ///
    /// Names the program does not expose are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::PreconditionViolation`] if the shader is invalid,
    /// or a device error if the value does not match the uniform's type.
    pub fn set_uniform(&self, name: &str, value: impl Into<UniformValue>) -> Result<(), RenderError> {
        let program = self.valid_program("set uniform on")?;
        if name.is_empty() {
            return Ok(());
        }
        if let Some(location) = self.device.uniform_location(program, name)? {
            self.device.set_uniform(program, location, &value.into())?;
        }
        Ok(())
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(program) = state.program.take() {
            if let Err(e) = self.device.destroy_program(program) {
                log::warn!("Failed to release shader program {program:?}: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dg_infra::HeadlessDevice;

    const VS: &str = "uniform mat4 u_Mvp;\nvoid main() {}\n";
    const FS: &str = "uniform vec4 u_Tint;\nvoid main() {}\n";

    #[test]
    fn parses_combined_file() {
        let text = "\n#shader vertex\nvoid main() {}\n#shader fragment\nout vec4 c;\nvoid main() {}\n";
        let (vs, fs) = parse_combined_source(text).unwrap();
        assert_eq!(vs, "void main() {}\n");
        assert_eq!(fs, "out vec4 c;\nvoid main() {}\n");
    }

    #[test]
    fn rejects_bad_directives() {
        assert!(matches!(
            parse_combined_source("#shader geometry\n"),
            Err(ShaderError::Directive { line: 1, .. })
        ));
        assert!(matches!(
            parse_combined_source("void main() {}\n#shader vertex\n"),
            Err(ShaderError::Directive { line: 1, .. })
        ));
    }

    #[test]
    fn failed_rebuild_keeps_previous_program() {
        let device = Arc::new(HeadlessDevice::new());
        let shader = Shader::from_sources(device.clone(), VS, FS).unwrap();
        let program = shader.program();
        assert!(shader.is_valid());

        let err = shader.load_from_sources(VS, "#error nope\nvoid main() {}").unwrap_err();
        assert!(matches!(err, ShaderError::Compilation { stage: ShaderStage::Fragment, .. }));
        assert_eq!(shader.program(), program);
        assert_eq!(shader.fragment_source(), FS);
        assert_eq!(shader.generation(), 1);

        assert!(matches!(
            shader.load_from_sources("", FS),
            Err(ShaderError::EmptySource { stage: ShaderStage::Vertex })
        ));
        assert_eq!(shader.program(), program);

        // No stage objects leak from failed builds.
        assert_eq!(device.stats().live_shaders, 0);
        assert_eq!(device.stats().live_programs, 1);
    }

    #[test]
    fn successful_rebuild_releases_old_program() {
        let device = Arc::new(HeadlessDevice::new());
        let shader = Shader::from_sources(device.clone(), VS, FS).unwrap();
        let first = shader.program();
        assert_eq!(shader.generation(), 1);
        shader.build().unwrap();
        assert_ne!(shader.program(), first);
        assert_eq!(shader.generation(), 2);
        assert_eq!(device.stats().live_programs, 1);
        drop(shader);
        assert_eq!(device.stats().live_programs, 0);
    }

    #[test]
    fn uniforms_on_invalid_shader_are_rejected() {
        let device = Arc::new(HeadlessDevice::new());
        let shader = Shader::new(device.clone());
        assert!(matches!(
            shader.set_uniform("u_Tint", [1.0f32, 1.0, 1.0, 1.0]),
            Err(RenderError::PreconditionViolation(_))
        ));
        assert!(shader.bind().is_err());
    }

    #[test]
    fn missing_uniforms_are_ignored() {
        let device = Arc::new(HeadlessDevice::new());
        let shader = Shader::from_sources(device.clone(), VS, FS).unwrap();
        shader.set_uniform("u_DoesNotExist", 1.0f32).unwrap();
        shader.set_uniform("u_Tint", [0.5f32, 0.5, 0.5, 1.0]).unwrap();
        assert!(shader.has_uniform("u_Mvp"));
        assert!(!shader.has_uniform("u_DoesNotExist"));
        assert_eq!(
            device.uniform_value(shader.program().unwrap(), "u_Tint"),
            Some(UniformValue::Vec4([0.5, 0.5, 0.5, 1.0]))
        );
        assert!(shader.set_uniform("u_Tint", 1i32).is_err());
    }

    #[test]
    fn shared_shader_reloads_in_place() {
        let device = Arc::new(HeadlessDevice::new());
        let shader = Arc::new(Shader::from_sources(device.clone(), VS, FS).unwrap());
        let held = shader.clone();
        let first = held.program();

        shader
            .load_from_sources(VS, "uniform vec4 u_Other;\nvoid main() {}\n")
            .unwrap();
        assert_ne!(held.program(), first);
        assert!(held.has_uniform("u_Other"));
        assert!(!held.has_uniform("u_Tint"));
        assert_eq!(device.stats().live_programs, 1);
    }
}
