// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

use crate::ir::block::{Block, BlockId, Condition, Edge};
use crate::ir::instruction::Instruction;
use indexmap::IndexMap;
use itertools::Itertools;
use method_graph::{MethodRef, TypeRef};
use std::collections::BTreeSet;

/// Declared parameter of a form, in slot order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormParameter {
    pub symbol: String,
    pub sort: String,
}

/// The translated IR of one method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Form {
    method: MethodRef,
    blocks: IndexMap<BlockId, Block>,
    parameters: Vec<FormParameter>,
    /// Symbols that are renamed per invocation site
    local_symbols: BTreeSet<String>,
    stand_in: bool,
}

impl Form {
    pub(crate) fn new(
        method: MethodRef,
        blocks: IndexMap<BlockId, Block>,
        parameters: Vec<FormParameter>,
        local_symbols: BTreeSet<String>,
    ) -> Self {
        Self {
            method,
            blocks,
            parameters,
            local_symbols,
            stand_in: false,
        }
    }

    /// Form without any behavior, used for methods that are deliberately not translated
    pub fn empty(method: MethodRef) -> Self {
        let mut entry = Block::new(BlockId::ENTRY);
        entry.successors.push(Edge {
            condition: Condition::Always,
            target: BlockId::REGULAR_EXIT,
        });
        let mut exit = Block::new(BlockId::REGULAR_EXIT);
        exit.predecessors.push(BlockId::ENTRY);
        let blocks = IndexMap::from([(BlockId::ENTRY, entry), (BlockId::REGULAR_EXIT, exit)]);
        Self {
            method,
            blocks,
            parameters: vec![],
            local_symbols: BTreeSet::new(),
            stand_in: true,
        }
    }

    pub fn method(&self) -> &MethodRef {
        &self.method
    }

    pub fn is_stand_in(&self) -> bool {
        self.stand_in
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    pub fn block(&self, id: &BlockId) -> Option<&Block> {
        self.blocks.get(id)
    }

    pub fn parameters(&self) -> &[FormParameter] {
        &self.parameters
    }

    pub fn local_symbols(&self) -> &BTreeSet<String> {
        &self.local_symbols
    }

    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.blocks.values().flat_map(|b| b.instructions())
    }

    /// Every type the form's instructions mention, in first-mention order
    pub fn referenced_types(&self) -> Vec<TypeRef> {
        self.instructions()
            .flat_map(|i| i.referenced_types().iter().cloned())
            .unique()
            .collect()
    }

    /// Every method the form's assertions call, in first-mention order
    pub fn referenced_methods(&self) -> Vec<MethodRef> {
        self.instructions()
            .filter(|i| !i.kind().is_declaration())
            .flat_map(|i| i.referenced_methods().iter().cloned())
            .unique()
            .collect()
    }
}
