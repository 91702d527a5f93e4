// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

mod engine;
mod repository;
mod scope;

pub use engine::{Resolution, ResolutionEngine};
pub use repository::{FormRepository, TypeRepository};
pub use scope::{HandlerRegistry, MethodHandler, ResolutionScope, TypeHandler};
