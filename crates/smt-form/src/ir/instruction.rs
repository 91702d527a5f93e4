// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

use crate::ir::block::BlockId;
use method_graph::{MethodRef, Slot, TypeRef};
use std::fmt::{self, Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InstructionKind {
    ParameterDeclaration,
    LocalDeclaration,
    FieldDeclaration,
    StackDeclaration,
    Assertion,
    /// The taken side of a conditional branch
    Branch,
}

impl InstructionKind {
    pub fn is_declaration(self) -> bool {
        !matches!(self, InstructionKind::Assertion | InstructionKind::Branch)
    }

    pub fn declaring(slot: &Slot) -> Self {
        match slot {
            Slot::Parameter(_) => InstructionKind::ParameterDeclaration,
            Slot::Local(_) => InstructionKind::LocalDeclaration,
            Slot::StaticField(_) => InstructionKind::FieldDeclaration,
            Slot::Stack(_) => InstructionKind::StackDeclaration,
        }
    }
}

/// Implicit runtime faults, in the order they are checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FaultKind {
    NullReference,
    IndexBelowRange,
    IndexAboveRange,
    MissingOverride,
}

impl Display for FaultKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            FaultKind::NullReference => "null-reference",
            FaultKind::IndexBelowRange => "index-below-range",
            FaultKind::IndexAboveRange => "index-above-range",
            FaultKind::MissingOverride => "missing-override",
        };
        write!(f, "{}", name)
    }
}

/// Identity of a linked instruction
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstructionId {
    pub block: BlockId,
    /// Offset of the originating graph instruction
    pub offset: u32,
    /// Declared slot for declarations
    pub scope: Option<Slot>,
    pub kind: InstructionKind,
}

/// Side effect of an assertion that the path engine acts on.
/// Symbols are the form's own, not yet renamed for an invocation site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    None,
    /// `target` takes the value of `source`
    Assign { source: String, target: String },
    Call {
        callee: MethodRef,
        arguments: Vec<String>,
        target: Option<String>,
    },
    /// Fresh array or other reference without a constructor
    Allocate { ty: TypeRef, target: String },
    /// Fresh object initialized by `constructor`; the receiver is the first argument
    Construct {
        ty: TypeRef,
        target: String,
        constructor: MethodRef,
        arguments: Vec<String>,
    },
    Return(Option<String>),
    Throw(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstructionBody {
    Declaration { symbol: String, sort: String },
    Assertion { expressions: Vec<String>, effect: Effect },
}

/// An instruction that is not part of any block yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingInstruction {
    offset: u32,
    scope: Option<Slot>,
    kind: InstructionKind,
    body: InstructionBody,
    exception_group: u8,
    types: Vec<TypeRef>,
    methods: Vec<MethodRef>,
}

impl PendingInstruction {
    pub fn declaration(offset: u32, slot: Slot, ty: TypeRef, symbol: String, sort: String) -> Self {
        Self {
            offset,
            kind: InstructionKind::declaring(&slot),
            scope: Some(slot),
            body: InstructionBody::Declaration { symbol, sort },
            exception_group: 0,
            types: vec![ty],
            methods: vec![],
        }
    }

    pub fn assertion(offset: u32, expressions: Vec<String>) -> Self {
        Self {
            offset,
            scope: None,
            kind: InstructionKind::Assertion,
            body: InstructionBody::Assertion {
                expressions,
                effect: Effect::None,
            },
            exception_group: 0,
            types: vec![],
            methods: vec![],
        }
    }

    pub fn branch(offset: u32, condition: String) -> Self {
        Self {
            kind: InstructionKind::Branch,
            ..Self::assertion(offset, vec![condition])
        }
    }

    pub fn with_effect(mut self, new_effect: Effect) -> Self {
        if let InstructionBody::Assertion { effect, .. } = &mut self.body {
            if let Effect::Call { callee, .. } | Effect::Construct { constructor: callee, .. } = &new_effect {
                self.methods.push(callee.clone());
            }
            *effect = new_effect;
        }
        self
    }

    pub fn in_group(mut self, exception_group: u8) -> Self {
        self.exception_group = exception_group;
        self
    }

    pub fn mentioning(mut self, ty: TypeRef) -> Self {
        if !self.types.contains(&ty) {
            self.types.push(ty);
        }
        self
    }

    pub fn kind(&self) -> InstructionKind {
        self.kind
    }

    pub fn scope(&self) -> Option<&Slot> {
        self.scope.as_ref()
    }

    /// Place the instruction into `block`. This is the only way to obtain an [`Instruction`].
    pub fn link(self, block: BlockId) -> Instruction {
        Instruction {
            id: InstructionId {
                block,
                offset: self.offset,
                scope: self.scope,
                kind: self.kind,
            },
            body: self.body,
            exception_group: self.exception_group,
            types: self.types,
            methods: self.methods,
        }
    }
}

/// An instruction linked into a block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    id: InstructionId,
    body: InstructionBody,
    exception_group: u8,
    types: Vec<TypeRef>,
    methods: Vec<MethodRef>,
}

impl Instruction {
    pub fn id(&self) -> &InstructionId {
        &self.id
    }

    pub fn kind(&self) -> InstructionKind {
        self.id.kind
    }

    pub fn body(&self) -> &InstructionBody {
        &self.body
    }

    pub fn exception_group(&self) -> u8 {
        self.exception_group
    }

    pub fn referenced_types(&self) -> &[TypeRef] {
        &self.types
    }

    pub fn referenced_methods(&self) -> &[MethodRef] {
        &self.methods
    }

    pub fn effect(&self) -> &Effect {
        match &self.body {
            InstructionBody::Assertion { effect, .. } => effect,
            InstructionBody::Declaration { .. } => &Effect::None,
        }
    }

    /// Declared symbol, for declarations
    pub fn symbol(&self) -> Option<&str> {
        match &self.body {
            InstructionBody::Declaration { symbol, .. } => Some(symbol),
            InstructionBody::Assertion { .. } => None,
        }
    }

    /// Emitted text, one line per declaration or asserted expression
    pub fn lines(&self) -> Vec<String> {
        match &self.body {
            InstructionBody::Declaration { symbol, sort } => {
                vec![format!("(declare-const {} {})", symbol, sort)]
            }
            InstructionBody::Assertion { expressions, .. } => {
                expressions.iter().map(|e| format!("(assert {})", e)).collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::block::BlockIndex;

    #[test]
    fn linking_stamps_the_block_into_the_id() {
        let pending = PendingInstruction::declaration(
            3,
            Slot::Stack(0),
            TypeRef::Int32,
            "M!s0".to_string(),
            "Int".to_string(),
        );
        assert_eq!(pending.kind(), InstructionKind::StackDeclaration);
        let block = BlockId::new(BlockIndex::Node(2), 1);
        let linked = pending.link(block);
        assert_eq!(linked.id().block, block);
        assert_eq!(linked.id().scope, Some(Slot::Stack(0)));
        assert_eq!(linked.lines(), vec!["(declare-const M!s0 Int)".to_string()]);
        assert_eq!(linked.referenced_types(), &[TypeRef::Int32]);
    }

    #[test]
    fn calls_record_their_callee() {
        let callee = MethodRef::new_static(TypeRef::named("Demo", "F"), "G", vec![], TypeRef::Void);
        let linked = PendingInstruction::assertion(0, vec![])
            .with_effect(Effect::Call {
                callee: callee.clone(),
                arguments: vec![],
                target: None,
            })
            .link(BlockId::new(BlockIndex::Node(0), 0));
        assert_eq!(linked.referenced_methods(), &[callee]);
        assert!(linked.lines().is_empty());
    }
}
