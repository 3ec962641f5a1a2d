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

//! # DG Core
//!
//! Foundational crate containing the graphics device contract, resource
//! descriptors, error types, math primitives and the frame-driver layer
//! interfaces shared by every other DG crate.

#![warn(missing_docs)]

pub mod layer;
pub mod math;
pub mod renderer;

pub use layer::{Event, Layer, LayerStack};
