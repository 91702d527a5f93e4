// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Typed per-method control-flow graph

use crate::method::MethodRef;
use crate::types::{FieldRef, TypeRef};
use petgraph::algo::dominators::simple_fast;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::DfsPostOrder;
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use thiserror::Error;

/// Storage slot a variable lives in
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Slot {
    Parameter(u16),
    Local(u16),
    StaticField(FieldRef),
    /// Evaluation stack temporary, numbered uniquely per method by the front-end
    Stack(u32),
}

impl Display for Slot {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Parameter(i) => write!(f, "p{}", i),
            Slot::Local(i) => write!(f, "l{}", i),
            Slot::StaticField(field) => write!(f, "{}", field),
            Slot::Stack(i) => write!(f, "s{}", i),
        }
    }
}

/// A typed operand or target binding
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Variable {
    pub slot: Slot,
    pub ty: TypeRef,
}

impl Variable {
    pub fn parameter(index: u16, ty: TypeRef) -> Self {
        Self {
            slot: Slot::Parameter(index),
            ty,
        }
    }

    pub fn local(index: u16, ty: TypeRef) -> Self {
        Self {
            slot: Slot::Local(index),
            ty,
        }
    }

    pub fn stack(index: u32, ty: TypeRef) -> Self {
        Self {
            slot: Slot::Stack(index),
            ty,
        }
    }

    pub fn static_field(field: FieldRef, ty: TypeRef) -> Self {
        Self {
            slot: Slot::StaticField(field),
            ty,
        }
    }
}

/// Constant operand of a load-constant instruction
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Bool(bool),
    Int(i32),
    Float(f64),
    Str(String),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Condition tested by a conditional branch on its single operand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchTest {
    IfTrue,
    IfFalse,
    IfNull,
    IfNotNull,
}

/// Operation performed by a graph instruction
#[derive(Debug, Clone, PartialEq)]
pub enum Opcode {
    /// target := operand 0 (loads and stores of parameters, locals, static fields)
    Assign,
    Constant(Literal),
    Binary(BinaryOp),
    Compare(Comparison),
    Not,
    /// Conditional branch; the block's first successor is the taken edge, the second the
    /// fall-through edge
    Branch(BranchTest),
    Jump,
    /// Call with arguments as operands, receiver first for instance methods
    Call {
        method: MethodRef,
        virtual_dispatch: bool,
    },
    /// Allocation followed by the constructor call; operands are the constructor arguments
    NewObject {
        constructor: MethodRef,
    },
    /// New array with operand 0 as length
    NewArray {
        element: TypeRef,
    },
    ArrayLength,
    /// target := operand0[operand1]
    LoadElement,
    /// target := operand0 with [operand1] replaced by operand2
    StoreElement,
    /// target := operand0.field
    LoadField(FieldRef),
    /// target := operand0 with field replaced by operand1
    StoreField(FieldRef),
    Return,
    Throw,
    Convert(TypeRef),
    IsInstance(TypeRef),
    /// Front-end shape without an encoding rule
    Unsupported(String),
}

impl Opcode {
    pub fn name(&self) -> String {
        match self {
            Opcode::Assign => "assign".to_string(),
            Opcode::Constant(_) => "constant".to_string(),
            Opcode::Binary(op) => format!("binary {:?}", op).to_lowercase(),
            Opcode::Compare(c) => format!("compare {:?}", c).to_lowercase(),
            Opcode::Not => "not".to_string(),
            Opcode::Branch(test) => format!("branch {:?}", test).to_lowercase(),
            Opcode::Jump => "jump".to_string(),
            Opcode::Call { .. } => "call".to_string(),
            Opcode::NewObject { .. } => "newobj".to_string(),
            Opcode::NewArray { .. } => "newarr".to_string(),
            Opcode::ArrayLength => "ldlen".to_string(),
            Opcode::LoadElement => "ldelem".to_string(),
            Opcode::StoreElement => "stelem".to_string(),
            Opcode::LoadField(_) => "ldfld".to_string(),
            Opcode::StoreField(_) => "stfld".to_string(),
            Opcode::Return => "ret".to_string(),
            Opcode::Throw => "throw".to_string(),
            Opcode::Convert(_) => "conv".to_string(),
            Opcode::IsInstance(_) => "isinst".to_string(),
            Opcode::Unsupported(name) => name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphInstruction {
    /// Stable source offset, unique within the method
    pub offset: u32,
    pub opcode: Opcode,
    pub target: Option<Variable>,
    pub operands: Vec<Variable>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphBlock {
    pub index: usize,
    pub instructions: Vec<GraphInstruction>,
    pub successors: Vec<usize>,
}

impl GraphBlock {
    pub fn terminator(&self) -> Option<&GraphInstruction> {
        self.instructions.last()
    }
}

/// Control-flow graph of one method. Block 0 is the entry.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodGraph {
    pub method: MethodRef,
    pub blocks: Vec<GraphBlock>,
}

/// A graph whose block numbering or edges do not fit together
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed graph of {method}: {reason}")]
pub struct MalformedGraph {
    pub method: MethodRef,
    pub reason: String,
}

impl MethodGraph {
    /// Every block's index matches its position and every successor names a block
    pub fn validate(&self) -> Result<(), MalformedGraph> {
        let malformed = |reason: String| MalformedGraph {
            method: self.method.clone(),
            reason,
        };
        if self.blocks.is_empty() {
            return Err(malformed("no entry block".to_string()));
        }
        for (position, block) in self.blocks.iter().enumerate() {
            if block.index != position {
                return Err(malformed(format!("block at position {} is numbered {}", position, block.index)));
            }
            if let Some(&succ) = block.successors.iter().find(|&&s| s >= self.blocks.len()) {
                return Err(malformed(format!("block {} jumps to missing block {}", position, succ)));
            }
        }
        Ok(())
    }

    pub fn block(&self, index: usize) -> Option<&GraphBlock> {
        self.blocks.get(index)
    }

    pub fn predecessors(&self, index: usize) -> Vec<usize> {
        self.blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| b.successors.contains(&index))
            .map(|(position, _)| position)
            .collect()
    }

    fn as_petgraph(&self) -> (DiGraph<usize, ()>, Vec<NodeIndex>) {
        let mut graph = DiGraph::new();
        let nodes: Vec<NodeIndex> = self.blocks.iter().map(|b| graph.add_node(b.index)).collect();
        for (from, block) in nodes.iter().zip(&self.blocks) {
            for to in block.successors.iter().filter_map(|&succ| nodes.get(succ)) {
                graph.add_edge(*from, *to, ());
            }
        }
        (graph, nodes)
    }

    /// Blocks reachable from the entry in reverse post-order
    pub fn reverse_post_order(&self) -> Vec<usize> {
        if self.blocks.is_empty() {
            return vec![];
        }
        let (graph, nodes) = self.as_petgraph();
        let mut dfs = DfsPostOrder::new(&graph, nodes[0]);
        let mut order = Vec::new();
        while let Some(node) = dfs.next(&graph) {
            order.push(node.index());
        }
        order.reverse();
        order
    }

    /// Strict dominators of every reachable block, nearest first
    pub fn dominators(&self) -> BTreeMap<usize, Vec<usize>> {
        let mut result = BTreeMap::new();
        if self.blocks.is_empty() {
            return result;
        }
        let (graph, nodes) = self.as_petgraph();
        let doms = simple_fast(&graph, nodes[0]);
        for block in self.reverse_post_order() {
            let Some(&start) = nodes.get(block) else {
                continue;
            };
            let mut chain = Vec::new();
            let mut current = start;
            while let Some(idom) = doms.immediate_dominator(current) {
                chain.push(idom.index());
                current = idom;
            }
            result.insert(block, chain);
        }
        result
    }
}

/// Incremental construction of a `MethodGraph`. Offsets are assigned in push order.
pub struct MethodGraphBuilder {
    method: MethodRef,
    blocks: Vec<GraphBlock>,
    next_offset: u32,
}

impl MethodGraphBuilder {
    pub fn new(method: MethodRef) -> Self {
        Self {
            method,
            blocks: vec![],
            next_offset: 0,
        }
    }

    /// Append a new empty block and return its index
    pub fn block(&mut self) -> usize {
        let index = self.blocks.len();
        self.blocks.push(GraphBlock {
            index,
            instructions: vec![],
            successors: vec![],
        });
        index
    }

    /// Append an instruction to `block` and return its offset
    pub fn push(
        &mut self,
        block: usize,
        opcode: Opcode,
        target: Option<Variable>,
        operands: Vec<Variable>,
    ) -> u32 {
        let offset = self.next_offset;
        self.next_offset += 1;
        self.blocks[block].instructions.push(GraphInstruction {
            offset,
            opcode,
            target,
            operands,
        });
        offset
    }

    pub fn edge(&mut self, from: usize, to: usize) -> &mut Self {
        self.blocks[from].successors.push(to);
        self
    }

    pub fn build(self) -> MethodGraph {
        MethodGraph {
            method: self.method,
            blocks: self.blocks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> MethodGraph {
        let method = MethodRef::new_static(TypeRef::named("Demo", "D"), "M", vec![TypeRef::Bool], TypeRef::Void);
        let mut b = MethodGraphBuilder::new(method);
        let entry = b.block();
        let left = b.block();
        let right = b.block();
        let join = b.block();
        let p0 = Variable::parameter(0, TypeRef::Bool);
        b.push(entry, Opcode::Branch(BranchTest::IfTrue), None, vec![p0]);
        b.push(left, Opcode::Jump, None, vec![]);
        b.push(right, Opcode::Jump, None, vec![]);
        b.push(join, Opcode::Return, None, vec![]);
        b.edge(entry, left).edge(entry, right);
        b.edge(left, join);
        b.edge(right, join);
        b.build()
    }

    #[test]
    fn join_is_dominated_by_entry_only() {
        let graph = diamond();
        let doms = graph.dominators();
        assert_eq!(doms[&0], Vec::<usize>::new());
        assert_eq!(doms[&1], vec![0]);
        assert_eq!(doms[&3], vec![0]);
        assert_eq!(graph.predecessors(3), vec![1, 2]);
    }

    #[test]
    fn misnumbered_blocks_are_rejected() {
        let mut graph = diamond();
        assert!(graph.validate().is_ok());
        graph.blocks[3].index = 7;
        let err = graph.validate().unwrap_err();
        assert!(err.reason.contains("numbered 7"));
        // positions still drive the walk
        assert_eq!(graph.reverse_post_order().len(), 4);
        assert_eq!(graph.dominators()[&3], vec![0]);

        let mut graph = diamond();
        graph.blocks[1].successors.push(9);
        assert!(graph.validate().unwrap_err().reason.contains("missing block 9"));
    }

    #[test]
    fn reverse_post_order_starts_at_entry_and_ends_at_join() {
        let order = diamond().reverse_post_order();
        assert_eq!(order.len(), 4);
        assert_eq!(order[0], 0);
        assert_eq!(order[3], 3);
    }
}
