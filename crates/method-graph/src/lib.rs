// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Method Graph
//!
//! The front-end boundary of the SMT form translator. A decompiler hands over each method
//! as a typed control-flow graph; this crate defines that graph, the type and method
//! references it mentions, and the `GraphSource` trait through which the translator asks
//! for definitions on demand.

mod graph;
mod method;
mod source;
mod types;

pub use graph::{
    BinaryOp, BranchTest, Comparison, GraphBlock, GraphInstruction, Literal, MalformedGraph, MethodGraph,
    MethodGraphBuilder, Opcode, Slot, Variable,
};
pub use method::MethodRef;
pub use source::{GraphSource, ProgramSource};
pub use types::{sanitize_name, FieldDef, FieldRef, TypeDef, TypeParseError, TypeRef};
