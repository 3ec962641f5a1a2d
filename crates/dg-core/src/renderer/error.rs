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

//! Defines the hierarchy of error types for the rendering subsystem.

use super::api::ShaderStage;
use thiserror::Error;

/// An error raised while loading, compiling or linking a shader program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShaderError {
    /// A stage was handed an empty source string.
    #[error("{stage} shader source is empty")]
    EmptySource {
        /// The stage whose source was empty.
        stage: ShaderStage,
    },
    /// A single stage failed to compile.
    #[error("failed to compile {stage} shader:\n{log}")]
    Compilation {
        /// The stage that failed.
        stage: ShaderStage,
        /// The compiler's info log.
        log: String,
    },
    /// Both stages compiled but the program failed to link.
    #[error("failed to link shader program:\n{log}")]
    Link {
        /// The linker's info log.
        log: String,
    },
    /// The shader file could not be read.
    #[error("failed to load shader source from '{path}': {reason}")]
    Load {
        /// The path of the file that failed to load.
        path: String,
        /// The underlying I/O error.
        reason: String,
    },
    /// A combined shader file contained a line outside any stage block or an
    /// unknown `#shader` directive.
    #[error("invalid shader directive at line {line}: '{text}'")]
    Directive {
        /// One-based line number.
        line: usize,
        /// The offending line.
        text: String,
    },
}

/// An error reported by a [`GraphicsDevice`](super::traits::GraphicsDevice)
/// while operating on one of its handles.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    /// The handle does not name a live resource of the expected kind.
    #[error("invalid or destroyed resource handle")]
    InvalidHandle,
    /// An access fell outside the bounds of the resource.
    #[error("access out of resource bounds")]
    OutOfBounds,
    /// The operation is not valid for the resource in its current state.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    /// A shader stage or program failed to build.
    #[error(transparent)]
    Shader(#[from] ShaderError),
    /// A backend-specific failure.
    #[error("backend error: {0}")]
    Backend(String),
}

/// The top-level error type of the rendering subsystem.
///
/// Precondition violations and limit overruns are protocol errors: the frame
/// driver is expected to treat them as fatal and stop using the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// An operation was called outside its required state.
    #[error("precondition violated: {0}")]
    PreconditionViolation(String),
    /// The operation is not valid for the object in its current state.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    /// A request exceeded a fixed capacity.
    #[error("{what}: requested {requested}, limit is {limit}")]
    ResourceLimitExceeded {
        /// What ran out.
        what: &'static str,
        /// The requested amount.
        requested: usize,
        /// The capacity.
        limit: usize,
    },
    /// A shader or framebuffer failed to build.
    #[error("build failed: {0}")]
    BuildFailure(String),
    /// A named resource or file could not be found.
    #[error("resource not found: {0}")]
    ResourceNotFound(String),
    /// An error bubbled up from the graphics device.
    #[error(transparent)]
    Resource(#[from] ResourceError),
}

impl From<ShaderError> for RenderError {
    fn from(err: ShaderError) -> Self {
        RenderError::BuildFailure(err.to_string())
    }
}

impl RenderError {
    /// Shorthand for [`RenderError::PreconditionViolation`].
    pub fn precondition(msg: impl Into<String>) -> Self {
        RenderError::PreconditionViolation(msg.into())
    }

    /// Shorthand for [`RenderError::InvalidOperation`].
    pub fn invalid(msg: impl Into<String>) -> Self {
        RenderError::InvalidOperation(msg.into())
    }
}
