// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

use crate::ir::instruction::{FaultKind, Instruction, InstructionKind};
use std::fmt::{self, Display, Formatter};

/// Position of a block in its method. `Entry`, `RegularExit` and `ExceptionalExit` are
/// reserved and never correspond to a graph block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BlockIndex {
    Entry,
    Node(usize),
    RegularExit,
    ExceptionalExit,
}

/// A graph block is split into fault segments at every instruction that may fault;
/// segment 0 is where the graph block starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId {
    pub index: BlockIndex,
    pub segment: u16,
}

impl BlockId {
    pub const ENTRY: BlockId = BlockId::new(BlockIndex::Entry, 0);
    pub const REGULAR_EXIT: BlockId = BlockId::new(BlockIndex::RegularExit, 0);
    pub const EXCEPTIONAL_EXIT: BlockId = BlockId::new(BlockIndex::ExceptionalExit, 0);

    pub const fn new(index: BlockIndex, segment: u16) -> Self {
        Self { index, segment }
    }

    pub fn node(index: usize) -> Self {
        Self::new(BlockIndex::Node(index), 0)
    }
}

impl Display for BlockId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.index {
            BlockIndex::Entry => write!(f, "entry"),
            BlockIndex::Node(n) => write!(f, "b{}.{}", n, self.segment),
            BlockIndex::RegularExit => write!(f, "exit"),
            BlockIndex::ExceptionalExit => write!(f, "exceptional-exit"),
        }
    }
}

/// One exception group of a faulting instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExceptionGroup {
    /// 0 is the all-normal group
    pub ordinal: u8,
    pub fault: Option<FaultKind>,
    pub offset: u32,
}

/// Condition under which a successor edge is followed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Condition {
    Always,
    Taken,
    NotTaken,
    Exception(ExceptionGroup),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub condition: Condition,
    pub target: BlockId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    id: BlockId,
    pub(crate) predecessors: Vec<BlockId>,
    pub(crate) declarations: Vec<Instruction>,
    pub(crate) assertions: Vec<Instruction>,
    pub(crate) branch_preconditions: Vec<Instruction>,
    pub(crate) exception_guards: Vec<Instruction>,
    pub(crate) successors: Vec<Edge>,
}

impl Block {
    pub fn new(id: BlockId) -> Self {
        Self {
            id,
            predecessors: vec![],
            declarations: vec![],
            assertions: vec![],
            branch_preconditions: vec![],
            exception_guards: vec![],
            successors: vec![],
        }
    }

    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn predecessors(&self) -> &[BlockId] {
        &self.predecessors
    }

    pub fn declarations(&self) -> &[Instruction] {
        &self.declarations
    }

    pub fn assertions(&self) -> &[Instruction] {
        &self.assertions
    }

    pub fn branch_preconditions(&self) -> &[Instruction] {
        &self.branch_preconditions
    }

    pub fn exception_guards(&self) -> &[Instruction] {
        &self.exception_guards
    }

    pub fn successors(&self) -> &[Edge] {
        &self.successors
    }

    /// Instructions asserted when leaving the block along `condition`
    pub fn guards(&self, condition: &Condition) -> Vec<&Instruction> {
        match condition {
            Condition::Always => vec![],
            Condition::Taken => self
                .branch_preconditions
                .iter()
                .filter(|i| i.kind() == InstructionKind::Branch)
                .collect(),
            Condition::NotTaken => self
                .branch_preconditions
                .iter()
                .filter(|i| i.kind() == InstructionKind::Assertion)
                .collect(),
            Condition::Exception(group) => self
                .exception_guards
                .iter()
                .filter(|i| i.exception_group() == group.ordinal)
                .collect(),
        }
    }

    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.declarations
            .iter()
            .chain(&self.assertions)
            .chain(&self.branch_preconditions)
            .chain(&self.exception_guards)
    }
}
