// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! SMT Form
//!
//! Turns the control-flow graph of a method into constraint-language assertions, one
//! group per distinct path. The pipeline has three stages:
//!
//! 1. `ir`: each method graph is translated into a [`Form`] of blocks holding declaration
//!    and assertion instructions, with synthesized blocks for implicit runtime faults.
//! 2. `resolution`: every type and method a form mentions is encoded or translated
//!    exactly once and merged into shared repositories.
//! 3. `coverage`: forms are walked path by path, callees are inlined under per-call
//!    symbol suffixes, and paths already subsumed by an emitted path are pruned.

pub mod coverage;
pub mod error;
pub mod ir;
pub mod options;
pub mod resolution;

pub use coverage::{full_path_covered_assertions, AnalysisContext, ExitKind, InvocationSite, PathAssertionGroup};
pub use error::{CoverageError, ResolutionError, TranslationError};
pub use ir::{Block, BlockId, BlockIndex, Condition, Effect, FaultKind, Form, Instruction, InstructionKind};
pub use options::SmtFormOptions;
pub use resolution::{MethodHandler, Resolution, ResolutionEngine, TypeHandler};
