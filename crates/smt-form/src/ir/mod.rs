// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Instruction/block IR of translated methods

mod block;
mod form;
mod instruction;
mod translator;

pub use block::{Block, BlockId, BlockIndex, Condition, Edge, ExceptionGroup};
pub use form::{Form, FormParameter};
pub use instruction::{
    Effect, FaultKind, Instruction, InstructionBody, InstructionId, InstructionKind, PendingInstruction,
};
pub use translator::{mentioned_types, variable_symbol, SentenceLookup, Translator};
