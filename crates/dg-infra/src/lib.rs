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

//! # DG Infra
//!
//! Concrete implementations of the `dg-core` graphics contracts.
//!
//! The `headless` backend keeps every resource in host memory and validates
//! each call the way a strict driver would, which makes it suitable for
//! tests, benchmarks and servers with no GPU.
//!
//! The `gl` backend drives a real OpenGL 3.3 context through `glow`. The
//! application owns the window and the context and hands the latter over.

#![warn(missing_docs)]

#[cfg(feature = "headless")]
pub mod headless;

#[cfg(feature = "headless")]
pub use headless::{DeviceStats, DrawRecord, HeadlessDevice};

#[cfg(feature = "gl")]
pub mod gl;

#[cfg(feature = "gl")]
pub use gl::GlowDevice;
