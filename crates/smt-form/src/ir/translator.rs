// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Translation of a method graph into a [`Form`].
//!
//! Graph blocks are visited in reverse post-order so every dominator is translated before
//! the blocks it dominates. Within a block, each instruction first declares the slots it
//! touches that are not yet visible, then contributes its assertions. Instructions that
//! may fault end the current fault segment: the segment's exception guards select between
//! the all-normal group, which continues in the next segment, and one group per fault,
//! which leaves for the exceptional exit.

use crate::error::TranslationError;
use crate::ir::block::{Block, BlockId, BlockIndex, Condition, Edge, ExceptionGroup};
use crate::ir::form::{Form, FormParameter};
use crate::ir::instruction::{Effect, FaultKind, InstructionKind, PendingInstruction};
use indexmap::IndexMap;
use itertools::Itertools;
use log::debug;
use method_graph::{
    sanitize_name, BranchTest, GraphBlock, GraphInstruction, MethodGraph, MethodRef, Opcode, Slot, TypeRef,
    Variable,
};
use smt_sentence::{type_symbol, Operation, SentenceShape, TypeSentence, UnsupportedOperation};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Source of sentences for the types a graph mentions
pub trait SentenceLookup {
    fn sentence(&self, ty: &TypeRef) -> Result<Arc<TypeSentence>, TranslationError>;
}

/// Symbol of `variable` inside `method` before any invocation-site renaming
pub fn variable_symbol(method: &MethodRef, variable: &Variable) -> String {
    match &variable.slot {
        Slot::StaticField(field) => sanitize_name(&field.to_string()),
        slot => format!("{}!{}", method.symbol(), slot),
    }
}

/// Every type the translation of `graph` will need a sentence for
pub fn mentioned_types(graph: &MethodGraph) -> Vec<TypeRef> {
    let mut types = graph.method.parameter_slots();
    for instruction in graph.blocks.iter().flat_map(|b| &b.instructions) {
        types.extend(instruction.operands.iter().map(|v| v.ty.clone()));
        types.extend(instruction.target.iter().map(|v| v.ty.clone()));
        match &instruction.opcode {
            Opcode::Convert(ty) | Opcode::IsInstance(ty) => types.push(ty.clone()),
            Opcode::NewObject { constructor } => types.push(constructor.declaring.clone()),
            Opcode::NewArray { element } => {
                types.push(element.clone());
                types.push(TypeRef::array_of(element.clone()));
            }
            Opcode::Call {
                method,
                virtual_dispatch: true,
            } if method.is_abstract => types.push(method.declaring.clone()),
            _ => {}
        }
    }
    types.push(TypeRef::Int32);
    types.into_iter().unique().collect()
}

struct FaultCheck {
    kind: FaultKind,
    check: String,
    negated: String,
}

enum Lowered {
    Plain(Vec<PendingInstruction>),
    Faulting {
        groups: Vec<(ExceptionGroup, PendingInstruction)>,
        semantics: Vec<PendingInstruction>,
    },
    Branch {
        taken: PendingInstruction,
        not_taken: PendingInstruction,
    },
}

type DeclarationKey = (InstructionKind, Slot);

pub struct Translator<'a> {
    graph: &'a MethodGraph,
    sentences: &'a dyn SentenceLookup,
    blocks: IndexMap<BlockId, Block>,
    declared: BTreeMap<BlockIndex, BTreeSet<DeclarationKey>>,
    local_symbols: BTreeSet<String>,
}

impl<'a> Translator<'a> {
    pub fn new(graph: &'a MethodGraph, sentences: &'a dyn SentenceLookup) -> Self {
        Self {
            graph,
            sentences,
            blocks: IndexMap::new(),
            declared: BTreeMap::new(),
            local_symbols: BTreeSet::new(),
        }
    }

    fn method(&self) -> &'a MethodRef {
        &self.graph.method
    }

    pub fn translate(mut self) -> Result<Form, TranslationError> {
        debug!("translating {}", self.method());
        self.graph
            .validate()
            .map_err(|err| TranslationError::InvalidArgument(err.to_string()))?;
        let parameters = self.translate_entry()?;

        let dominators = self.graph.dominators();
        for index in self.graph.reverse_post_order() {
            let block = self
                .graph
                .block(index)
                .ok_or_else(|| TranslationError::InvalidArgument(format!("missing graph block {}", index)))?;
            let dominating = dominators.get(&index).cloned().unwrap_or_default();
            self.translate_block(block, &dominating)?;
        }

        self.blocks
            .insert(BlockId::REGULAR_EXIT, Block::new(BlockId::REGULAR_EXIT));
        self.blocks
            .insert(BlockId::EXCEPTIONAL_EXIT, Block::new(BlockId::EXCEPTIONAL_EXIT));
        let edges: Vec<(BlockId, BlockId)> = self
            .blocks
            .values()
            .flat_map(|b| b.successors.iter().map(move |e| (b.id(), e.target)))
            .collect();
        for (from, to) in edges {
            let block = self.blocks.get_mut(&to).ok_or_else(|| {
                TranslationError::InvalidArgument(format!("edge from {} into untranslated block {}", from, to))
            })?;
            if !block.predecessors.contains(&from) {
                block.predecessors.push(from);
            }
        }

        Ok(Form::new(
            self.method().clone(),
            self.blocks,
            parameters,
            self.local_symbols,
        ))
    }

    fn translate_entry(&mut self) -> Result<Vec<FormParameter>, TranslationError> {
        let mut entry = Block::new(BlockId::ENTRY);
        let mut parameters = vec![];
        let mut keys = BTreeSet::new();
        for (i, ty) in self.method().parameter_slots().into_iter().enumerate() {
            let index = u16::try_from(i)
                .map_err(|_| TranslationError::InvalidArgument(format!("too many parameters in {}", self.method())))?;
            let variable = Variable::parameter(index, ty);
            let pending = self.declaration(0, &variable)?;
            parameters.push(FormParameter {
                symbol: self.symbol(&variable),
                sort: self.sentences.sentence(&variable.ty)?.sort().name.clone(),
            });
            keys.insert((pending.kind(), variable.slot.clone()));
            entry.declarations.push(pending.link(BlockId::ENTRY));
        }
        let first = if self.graph.blocks.is_empty() {
            BlockId::REGULAR_EXIT
        } else {
            BlockId::node(0)
        };
        entry.successors.push(Edge {
            condition: Condition::Always,
            target: first,
        });
        self.declared.insert(BlockIndex::Entry, keys);
        self.blocks.insert(BlockId::ENTRY, entry);
        Ok(parameters)
    }

    fn translate_block(&mut self, block: &GraphBlock, dominators: &[usize]) -> Result<(), TranslationError> {
        let mut visible: BTreeSet<DeclarationKey> = self
            .declared
            .get(&BlockIndex::Entry)
            .cloned()
            .unwrap_or_default();
        for dominator in dominators {
            if let Some(keys) = self.declared.get(&BlockIndex::Node(*dominator)) {
                visible.extend(keys.iter().cloned());
            }
        }

        let mut own = BTreeSet::new();
        let mut segment = 0u16;
        let mut current = Block::new(BlockId::new(BlockIndex::Node(block.index), segment));
        let count = block.instructions.len();
        for (position, instruction) in block.instructions.iter().enumerate() {
            for variable in instruction.operands.iter().chain(&instruction.target) {
                let key = (InstructionKind::declaring(&variable.slot), variable.slot.clone());
                if visible.contains(&key) || own.contains(&key) {
                    continue;
                }
                let pending = self.declaration(instruction.offset, variable)?;
                current.declarations.push(pending.link(current.id()));
                own.insert(key);
            }

            match self.lower(instruction)? {
                Lowered::Plain(pending) => {
                    let id = current.id();
                    current.assertions.extend(pending.into_iter().map(|p| p.link(id)));
                }
                Lowered::Faulting { groups, semantics } => {
                    segment += 1;
                    let next = BlockId::new(BlockIndex::Node(block.index), segment);
                    let id = current.id();
                    for (group, guard) in groups {
                        current.exception_guards.push(guard.in_group(group.ordinal).link(id));
                        let target = if group.fault.is_none() {
                            next
                        } else {
                            BlockId::EXCEPTIONAL_EXIT
                        };
                        current.successors.push(Edge {
                            condition: Condition::Exception(group),
                            target,
                        });
                    }
                    self.blocks.insert(id, current);
                    current = Block::new(next);
                    current.assertions.extend(semantics.into_iter().map(|p| p.link(next)));
                }
                Lowered::Branch { taken, not_taken } => {
                    if position + 1 != count {
                        return Err(TranslationError::InvalidArgument(format!(
                            "branch at offset {} of {} does not end its block",
                            instruction.offset,
                            self.method()
                        )));
                    }
                    let id = current.id();
                    current.branch_preconditions.push(taken.link(id));
                    current.branch_preconditions.push(not_taken.link(id));
                }
            }
        }

        self.terminate(&mut current, block)?;
        self.declared.insert(BlockIndex::Node(block.index), own);
        self.blocks.insert(current.id(), current);
        Ok(())
    }

    fn terminate(&self, current: &mut Block, block: &GraphBlock) -> Result<(), TranslationError> {
        let edge = |condition, target| Edge { condition, target };
        match block.terminator().map(|i| &i.opcode) {
            Some(Opcode::Branch(_)) => {
                let [taken, fallthrough] = block.successors[..] else {
                    return Err(TranslationError::InvalidArgument(format!(
                        "conditional block {} of {} needs exactly two successors",
                        block.index,
                        self.method()
                    )));
                };
                current.successors.push(edge(Condition::Taken, BlockId::node(taken)));
                current
                    .successors
                    .push(edge(Condition::NotTaken, BlockId::node(fallthrough)));
            }
            Some(Opcode::Return) => current
                .successors
                .push(edge(Condition::Always, BlockId::REGULAR_EXIT)),
            Some(Opcode::Throw) => current
                .successors
                .push(edge(Condition::Always, BlockId::EXCEPTIONAL_EXIT)),
            _ => match block.successors[..] {
                [] => current
                    .successors
                    .push(edge(Condition::Always, BlockId::REGULAR_EXIT)),
                [next] => current.successors.push(edge(Condition::Always, BlockId::node(next))),
                _ => {
                    return Err(TranslationError::InvalidArgument(format!(
                        "block {} of {} has several successors but no branch",
                        block.index,
                        self.method()
                    )))
                }
            },
        }
        Ok(())
    }

    fn declaration(&mut self, offset: u32, variable: &Variable) -> Result<PendingInstruction, TranslationError> {
        let sentence = self.sentences.sentence(&variable.ty)?;
        let symbol = variable_symbol(self.method(), variable);
        if !matches!(variable.slot, Slot::StaticField(_)) {
            self.local_symbols.insert(symbol.clone());
        }
        Ok(PendingInstruction::declaration(
            offset,
            variable.slot.clone(),
            variable.ty.clone(),
            symbol,
            sentence.sort().name.clone(),
        ))
    }

    fn symbol(&self, variable: &Variable) -> String {
        variable_symbol(self.method(), variable)
    }

    fn operand<'i>(&self, instruction: &'i GraphInstruction, index: usize) -> Result<&'i Variable, TranslationError> {
        instruction.operands.get(index).ok_or_else(|| {
            TranslationError::InvalidArgument(format!(
                "'{}' at offset {} of {} lacks operand {}",
                instruction.opcode.name(),
                instruction.offset,
                self.method(),
                index
            ))
        })
    }

    fn target<'i>(&self, instruction: &'i GraphInstruction) -> Result<&'i Variable, TranslationError> {
        instruction.target.as_ref().ok_or_else(|| {
            TranslationError::InvalidArgument(format!(
                "'{}' at offset {} of {} lacks a target",
                instruction.opcode.name(),
                instruction.offset,
                self.method()
            ))
        })
    }

    /// `value` as an expression of type `to`
    fn coerce(&self, value: &Variable, to: &TypeRef) -> Result<String, TranslationError> {
        let symbol = self.symbol(value);
        if &value.ty == to {
            return Ok(symbol);
        }
        Ok(self.sentences.sentence(&value.ty)?.apply(&Operation::Convert { value: &symbol, to })?)
    }

    /// `target` equals `expression`
    fn equate(&self, target: &Variable, expression: &str) -> Result<String, TranslationError> {
        let symbol = self.symbol(target);
        Ok(self
            .sentences
            .sentence(&target.ty)?
            .apply(&Operation::Equal(&symbol, expression))?)
    }

    fn defining(&self, instruction: &GraphInstruction, expression: String) -> Result<PendingInstruction, TranslationError> {
        let target = self.target(instruction)?;
        Ok(PendingInstruction::assertion(instruction.offset, vec![self.equate(target, &expression)?]))
    }

    fn lower(&self, instruction: &GraphInstruction) -> Result<Lowered, TranslationError> {
        let offset = instruction.offset;
        let plain = |pending: PendingInstruction| Ok(Lowered::Plain(vec![pending]));
        match &instruction.opcode {
            Opcode::Assign => {
                let target = self.target(instruction)?;
                let source = self.operand(instruction, 0)?;
                let value = self.coerce(source, &target.ty)?;
                plain(
                    PendingInstruction::assertion(offset, vec![self.equate(target, &value)?]).with_effect(Effect::Assign {
                        source: self.symbol(source),
                        target: self.symbol(target),
                    }),
                )
            }
            Opcode::Constant(literal) => {
                let target = self.target(instruction)?;
                let symbol = self.symbol(target);
                let expression = self.sentences.sentence(&target.ty)?.apply(&Operation::HoldsLiteral {
                    value: &symbol,
                    literal,
                })?;
                plain(PendingInstruction::assertion(offset, vec![expression]))
            }
            Opcode::Binary(op) => {
                let (a, b) = (self.operand(instruction, 0)?, self.operand(instruction, 1)?);
                let expression = self.sentences.sentence(&a.ty)?.apply(&Operation::Arithmetic(
                    *op,
                    &self.symbol(a),
                    &self.coerce(b, &a.ty)?,
                ))?;
                plain(self.defining(instruction, expression)?)
            }
            Opcode::Compare(comparison) => {
                let (a, b) = (self.operand(instruction, 0)?, self.operand(instruction, 1)?);
                let expression = self.sentences.sentence(&a.ty)?.apply(&Operation::Compare(
                    *comparison,
                    &self.symbol(a),
                    &self.coerce(b, &a.ty)?,
                ))?;
                plain(self.defining(instruction, expression)?)
            }
            Opcode::Not => {
                let a = self.operand(instruction, 0)?;
                let expression = self.sentences.sentence(&a.ty)?.apply(&Operation::Not(&self.symbol(a)))?;
                plain(self.defining(instruction, expression)?)
            }
            Opcode::Branch(test) => {
                let a = self.operand(instruction, 0)?;
                let sentence = self.sentences.sentence(&a.ty)?;
                let symbol = self.symbol(a);
                let (taken, not_taken) = match test {
                    BranchTest::IfTrue => (Operation::IsTrue(&symbol), Operation::IsFalse(&symbol)),
                    BranchTest::IfFalse => (Operation::IsFalse(&symbol), Operation::IsTrue(&symbol)),
                    BranchTest::IfNull => (Operation::IsNull(&symbol), Operation::IsNotNull(&symbol)),
                    BranchTest::IfNotNull => (Operation::IsNotNull(&symbol), Operation::IsNull(&symbol)),
                };
                Ok(Lowered::Branch {
                    taken: PendingInstruction::branch(offset, sentence.apply(&taken)?),
                    not_taken: PendingInstruction::assertion(offset, vec![sentence.apply(&not_taken)?]),
                })
            }
            Opcode::Jump => Ok(Lowered::Plain(vec![])),
            Opcode::Call {
                method,
                virtual_dispatch,
            } => self.lower_call(instruction, method, *virtual_dispatch),
            Opcode::NewObject { constructor } => {
                let target = self.target(instruction)?;
                let symbol = self.symbol(target);
                let allocated = self
                    .sentences
                    .sentence(&target.ty)?
                    .apply(&Operation::Allocated(&symbol))?;
                if instruction.operands.len() != constructor.parameters.len() {
                    return Err(self.arity_mismatch(instruction, constructor));
                }
                let mut arguments = vec![symbol.clone()];
                for (operand, ty) in instruction.operands.iter().zip(&constructor.parameters) {
                    arguments.push(self.coerce(operand, ty)?);
                }
                plain(
                    PendingInstruction::assertion(offset, vec![allocated])
                        .with_effect(Effect::Construct {
                            ty: target.ty.clone(),
                            target: symbol,
                            constructor: constructor.clone(),
                            arguments,
                        })
                        .mentioning(constructor.declaring.clone()),
                )
            }
            Opcode::NewArray { element } => {
                let target = self.target(instruction)?;
                let length = self.operand(instruction, 0)?;
                let sentence = self.sentences.sentence(&target.ty)?;
                let symbol = self.symbol(target);
                let expressions = vec![
                    sentence.apply(&Operation::IsNotNull(&symbol))?,
                    self.sentences.sentence(&TypeRef::Int32)?.apply(&Operation::Equal(
                        &sentence.apply(&Operation::Length(&symbol))?,
                        &self.coerce(length, &TypeRef::Int32)?,
                    ))?,
                    sentence.apply(&Operation::HasExactType {
                        value: &symbol,
                        tag: &sentence.tag(),
                    })?,
                ];
                plain(
                    PendingInstruction::assertion(offset, expressions)
                        .with_effect(Effect::Allocate {
                            ty: target.ty.clone(),
                            target: symbol,
                        })
                        .mentioning(element.clone())
                        .mentioning(target.ty.clone()),
                )
            }
            Opcode::ArrayLength => {
                let array = self.operand(instruction, 0)?;
                let sentence = self.sentences.sentence(&array.ty)?;
                let symbol = self.symbol(array);
                let length = sentence.apply(&Operation::Length(&symbol))?;
                let semantics = self.defining(instruction, length)?;
                let checks = vec![self.null_check(&sentence, &symbol)?];
                let normal = vec![sentence.apply(&Operation::IsNotNull(&symbol))?];
                Ok(Self::faulting(offset, normal, checks, vec![semantics]))
            }
            Opcode::LoadElement => {
                let (array, index) = (self.operand(instruction, 0)?, self.operand(instruction, 1)?);
                let sentence = self.sentences.sentence(&array.ty)?;
                let (a, i) = (self.symbol(array), self.coerce(index, &TypeRef::Int32)?);
                let element = sentence.apply(&Operation::ElementAt { array: &a, index: &i })?;
                let semantics = self.defining(instruction, element)?;
                let (normal, checks) = self.element_guards(&sentence, &a, &i)?;
                Ok(Self::faulting(offset, normal, checks, vec![semantics]))
            }
            Opcode::StoreElement => {
                let (array, index, value) = (
                    self.operand(instruction, 0)?,
                    self.operand(instruction, 1)?,
                    self.operand(instruction, 2)?,
                );
                let sentence = self.sentences.sentence(&array.ty)?;
                let element_type = array.ty.element().cloned().unwrap_or(value.ty.clone());
                let (a, i) = (self.symbol(array), self.coerce(index, &TypeRef::Int32)?);
                let v = self.coerce(value, &element_type)?;
                let stored = sentence.apply(&Operation::StoreElement {
                    array: &a,
                    index: &i,
                    value: &v,
                })?;
                let semantics = self.defining(instruction, stored)?;
                let (normal, checks) = self.element_guards(&sentence, &a, &i)?;
                Ok(Self::faulting(offset, normal, checks, vec![semantics]))
            }
            // Field access carries no fault guards yet; a null receiver is not modeled.
            Opcode::LoadField(field) => {
                let object = self.operand(instruction, 0)?;
                let expression = self.sentences.sentence(&object.ty)?.apply(&Operation::LoadField {
                    object: &self.symbol(object),
                    field: &field.name,
                })?;
                plain(self.defining(instruction, expression)?)
            }
            Opcode::StoreField(field) => {
                let (object, value) = (self.operand(instruction, 0)?, self.operand(instruction, 1)?);
                let sentence = self.sentences.sentence(&object.ty)?;
                let field_type = sentence
                    .field(&field.name)
                    .map(|f| f.ty.clone())
                    .ok_or_else(|| UnsupportedOperation::new(format!("store-field {}", field.name), sentence.name()))?;
                let expression = sentence.apply(&Operation::StoreField {
                    object: &self.symbol(object),
                    field: &field.name,
                    value: &self.coerce(value, &field_type)?,
                })?;
                plain(self.defining(instruction, expression)?)
            }
            Opcode::Return => {
                let value = if self.method().returns_value() {
                    Some(self.coerce(self.operand(instruction, 0)?, &self.method().return_type)?)
                } else {
                    None
                };
                plain(PendingInstruction::assertion(offset, vec![]).with_effect(Effect::Return(value)))
            }
            Opcode::Throw => {
                let thrown = self.symbol(self.operand(instruction, 0)?);
                plain(PendingInstruction::assertion(offset, vec![]).with_effect(Effect::Throw(thrown)))
            }
            Opcode::Convert(to) => {
                let value = self.operand(instruction, 0)?;
                let converted = self.coerce(value, to)?;
                Ok(Lowered::Plain(vec![self.defining(instruction, converted)?.mentioning(to.clone())]))
            }
            Opcode::IsInstance(ty) => {
                let value = self.operand(instruction, 0)?;
                let tag = format!("{}_tag", type_symbol(ty));
                let test = self.sentences.sentence(&value.ty)?.apply(&Operation::InstanceOf {
                    value: &self.symbol(value),
                    tag: &tag,
                })?;
                Ok(Lowered::Plain(vec![self.defining(instruction, test)?.mentioning(ty.clone())]))
            }
            Opcode::Unsupported(name) => Err(TranslationError::UnsupportedInstruction {
                method: self.method().clone(),
                offset,
                opcode: name.clone(),
            }),
        }
    }

    fn arity_mismatch(&self, instruction: &GraphInstruction, callee: &MethodRef) -> TranslationError {
        TranslationError::InvalidArgument(format!(
            "call of {} at offset {} of {} passes {} arguments",
            callee,
            instruction.offset,
            self.method(),
            instruction.operands.len()
        ))
    }

    fn lower_call(
        &self,
        instruction: &GraphInstruction,
        callee: &MethodRef,
        virtual_dispatch: bool,
    ) -> Result<Lowered, TranslationError> {
        let slots = callee.parameter_slots();
        if slots.len() != instruction.operands.len() {
            return Err(self.arity_mismatch(instruction, callee));
        }
        let arguments = instruction
            .operands
            .iter()
            .zip(&slots)
            .map(|(operand, ty)| self.coerce(operand, ty))
            .collect::<Result<Vec<_>, _>>()?;
        let target = match (&instruction.target, callee.returns_value()) {
            (Some(target), true) => Some(self.symbol(target)),
            _ => None,
        };
        let call = PendingInstruction::assertion(instruction.offset, vec![]).with_effect(Effect::Call {
            callee: callee.clone(),
            arguments,
            target,
        });
        if !virtual_dispatch || callee.is_static {
            return Ok(Lowered::Plain(vec![call]));
        }

        let receiver = self.operand(instruction, 0)?;
        let sentence = self.sentences.sentence(&receiver.ty)?;
        let symbol = self.symbol(receiver);
        let mut checks = vec![];
        let mut normal = vec![];
        if Self::nullable(&sentence) {
            checks.push(self.null_check(&sentence, &symbol)?);
            normal.push(sentence.apply(&Operation::IsNotNull(&symbol))?);
        }
        let mut call = call;
        if callee.is_abstract {
            let tag = format!("{}_tag", type_symbol(&callee.declaring));
            let exact = sentence.apply(&Operation::HasExactType {
                value: &symbol,
                tag: &tag,
            })?;
            normal.push(format!("(not {})", exact));
            checks.push(FaultCheck {
                kind: FaultKind::MissingOverride,
                negated: format!("(not {})", exact),
                check: exact,
            });
            call = call.mentioning(callee.declaring.clone());
        }
        Ok(Self::faulting(instruction.offset, normal, checks, vec![call]))
    }

    fn nullable(sentence: &TypeSentence) -> bool {
        sentence.is_reference()
            && !matches!(
                sentence.shape(),
                SentenceShape::Composite {
                    is_value_type: true,
                    ..
                }
            )
    }

    fn null_check(&self, sentence: &TypeSentence, symbol: &str) -> Result<FaultCheck, TranslationError> {
        Ok(FaultCheck {
            kind: FaultKind::NullReference,
            check: sentence.apply(&Operation::IsNull(symbol))?,
            negated: sentence.apply(&Operation::IsNotNull(symbol))?,
        })
    }

    /// Guards of an element access: null first, then the lower and upper bound
    fn element_guards(
        &self,
        sentence: &TypeSentence,
        array: &str,
        index: &str,
    ) -> Result<(Vec<String>, Vec<FaultCheck>), TranslationError> {
        let below = sentence.apply(&Operation::BelowLowerBound { array, index })?;
        let above = sentence.apply(&Operation::AboveUpperBound { array, index })?;
        let normal = vec![
            sentence.apply(&Operation::IsNotNull(array))?,
            sentence.apply(&Operation::InRange { array, index })?,
        ];
        let checks = vec![
            self.null_check(sentence, array)?,
            FaultCheck {
                kind: FaultKind::IndexBelowRange,
                negated: format!("(not {})", below),
                check: below,
            },
            FaultCheck {
                kind: FaultKind::IndexAboveRange,
                negated: format!("(not {})", above),
                check: above,
            },
        ];
        Ok((normal, checks))
    }

    /// Group 0 asserts `normal`; group k asserts the negation of checks 1..k-1 and check k.
    fn faulting(
        offset: u32,
        normal: Vec<String>,
        checks: Vec<FaultCheck>,
        semantics: Vec<PendingInstruction>,
    ) -> Lowered {
        if checks.is_empty() {
            return Lowered::Plain(semantics);
        }
        let mut groups = vec![(
            ExceptionGroup {
                ordinal: 0,
                fault: None,
                offset,
            },
            PendingInstruction::assertion(offset, normal),
        )];
        let mut ordinal = 0u8;
        for (k, check) in checks.iter().enumerate() {
            ordinal += 1;
            let mut expressions: Vec<String> = checks[..k].iter().map(|c| c.negated.clone()).collect();
            expressions.push(check.check.clone());
            groups.push((
                ExceptionGroup {
                    ordinal,
                    fault: Some(check.kind),
                    offset,
                },
                PendingInstruction::assertion(offset, expressions),
            ));
        }
        Lowered::Faulting { groups, semantics }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::block::Condition;
    use method_graph::{FieldRef, GraphSource, Literal, MethodGraphBuilder, ProgramSource, TypeDef};
    use smt_sentence::SentenceFactory;

    struct FactoryLookup(ProgramSource);

    impl SentenceLookup for FactoryLookup {
        fn sentence(&self, ty: &TypeRef) -> Result<Arc<TypeSentence>, TranslationError> {
            let source: &dyn GraphSource = &self.0;
            Ok(Arc::new(SentenceFactory::default().encode(ty, source)?))
        }
    }

    fn demo() -> TypeRef {
        TypeRef::named("Demo", "C")
    }

    fn lines(block: &Block) -> Vec<String> {
        block.instructions().flat_map(|i| i.lines()).collect()
    }

    #[test]
    fn identity_method_declares_then_asserts() {
        let method = MethodRef::new_static(demo(), "Id", vec![TypeRef::Int32], TypeRef::Int32);
        let mut b = MethodGraphBuilder::new(method);
        let entry = b.block();
        let p0 = Variable::parameter(0, TypeRef::Int32);
        let s0 = Variable::stack(0, TypeRef::Int32);
        b.push(entry, Opcode::Assign, Some(s0.clone()), vec![p0]);
        b.push(entry, Opcode::Return, None, vec![s0]);
        let graph = b.build();
        let lookup = FactoryLookup(ProgramSource::new());
        let form = Translator::new(&graph, &lookup).translate().unwrap();

        assert_eq!(
            lines(form.block(&BlockId::ENTRY).unwrap()),
            vec!["(declare-const Demo.C.Id_Int32!p0 Int)"]
        );
        assert_eq!(
            lines(form.block(&BlockId::node(0)).unwrap()),
            vec![
                "(declare-const Demo.C.Id_Int32!s0 Int)",
                "(assert (= Demo.C.Id_Int32!s0 Demo.C.Id_Int32!p0))"
            ]
        );
        let exit = form.block(&BlockId::REGULAR_EXIT).unwrap();
        assert_eq!(exit.predecessors(), &[BlockId::node(0)]);
        assert_eq!(form.parameters().len(), 1);
        assert!(form.local_symbols().contains("Demo.C.Id_Int32!s0"));
    }

    #[test]
    fn element_load_expands_into_four_exclusive_groups() {
        let ints = TypeRef::array_of(TypeRef::Int32);
        let method = MethodRef::new_static(demo(), "At", vec![ints.clone(), TypeRef::Int32], TypeRef::Int32);
        let mut b = MethodGraphBuilder::new(method);
        let entry = b.block();
        let s0 = Variable::stack(0, TypeRef::Int32);
        b.push(
            entry,
            Opcode::LoadElement,
            Some(s0.clone()),
            vec![Variable::parameter(0, ints), Variable::parameter(1, TypeRef::Int32)],
        );
        b.push(entry, Opcode::Return, None, vec![s0]);
        let graph = b.build();
        let lookup = FactoryLookup(ProgramSource::new());
        let form = Translator::new(&graph, &lookup).translate().unwrap();

        let guard_block = form.block(&BlockId::node(0)).unwrap();
        let groups: Vec<u8> = guard_block.exception_guards().iter().map(|g| g.exception_group()).collect();
        assert_eq!(groups, vec![0, 1, 2, 3]);
        let a = "Demo.C.At_Int32_Array_Int32!p0";
        let i = "Demo.C.At_Int32_Array_Int32!p1";
        let values = format!("((as SeqArray_value (Seq Int)) {})", a);
        let null = "(as SeqArray_null (SeqArray Int))";
        let expected = [
            vec![
                format!("(assert (not (= {} {})))", a, null),
                format!("(assert (and (<= 0 {0}) (< {0} (seq.len {1}))))", i, values),
            ],
            vec![format!("(assert (= {} {}))", a, null)],
            vec![
                format!("(assert (not (= {} {})))", a, null),
                format!("(assert (< {} 0))", i),
            ],
            vec![
                format!("(assert (not (= {} {})))", a, null),
                format!("(assert (not (< {} 0)))", i),
                format!("(assert (>= {} (seq.len {})))", i, values),
            ],
        ];
        for (guard, expected) in guard_block.exception_guards().iter().zip(expected) {
            assert_eq!(guard.lines(), expected);
        }

        let targets: Vec<BlockId> = guard_block.successors().iter().map(|e| e.target).collect();
        assert_eq!(
            targets,
            vec![
                BlockId::new(BlockIndex::Node(0), 1),
                BlockId::EXCEPTIONAL_EXIT,
                BlockId::EXCEPTIONAL_EXIT,
                BlockId::EXCEPTIONAL_EXIT
            ]
        );
        let semantics = form.block(&BlockId::new(BlockIndex::Node(0), 1)).unwrap();
        assert_eq!(
            semantics.assertions()[0].lines(),
            vec![format!("(assert (= Demo.C.At_Int32_Array_Int32!s0 (seq.nth {} {})))", values, i)]
        );
    }

    #[test]
    fn joins_do_not_redeclare_dominating_slots() {
        let method = MethodRef::new_static(demo(), "Pick", vec![TypeRef::Bool], TypeRef::Int32);
        let mut b = MethodGraphBuilder::new(method);
        let (entry, left, right, join) = (b.block(), b.block(), b.block(), b.block());
        let l0 = Variable::local(0, TypeRef::Int32);
        b.push(entry, Opcode::Constant(Literal::Int(1)), Some(l0.clone()), vec![]);
        b.push(
            entry,
            Opcode::Branch(BranchTest::IfTrue),
            None,
            vec![Variable::parameter(0, TypeRef::Bool)],
        );
        b.push(left, Opcode::Jump, None, vec![]);
        b.push(right, Opcode::Jump, None, vec![]);
        b.push(join, Opcode::Return, None, vec![l0]);
        b.edge(entry, left).edge(entry, right).edge(left, join).edge(right, join);
        let graph = b.build();
        let lookup = FactoryLookup(ProgramSource::new());
        let form = Translator::new(&graph, &lookup).translate().unwrap();

        assert!(form.block(&BlockId::node(3)).unwrap().declarations().is_empty());
        let entry_block = form.block(&BlockId::node(0)).unwrap();
        let conditions: Vec<Condition> = entry_block.successors().iter().map(|e| e.condition).collect();
        assert_eq!(conditions, vec![Condition::Taken, Condition::NotTaken]);
        assert_eq!(
            entry_block.guards(&Condition::Taken)[0].lines(),
            vec!["(assert Demo.C.Pick_Bool!p0)"]
        );
        assert_eq!(
            entry_block.guards(&Condition::NotTaken)[0].lines(),
            vec!["(assert (not Demo.C.Pick_Bool!p0))"]
        );
        assert_eq!(form.block(&BlockId::node(3)).unwrap().predecessors().len(), 2);
    }

    #[test]
    fn abstract_virtual_call_guards_missing_override() {
        let shape = TypeRef::named("Geo", "Shape");
        let area = MethodRef::new_instance(shape.clone(), "Area", vec![], TypeRef::Int32).with_abstract();
        let method = MethodRef::new_static(demo(), "Measure", vec![shape.clone()], TypeRef::Int32);
        let mut b = MethodGraphBuilder::new(method);
        let entry = b.block();
        let s0 = Variable::stack(0, TypeRef::Int32);
        b.push(
            entry,
            Opcode::Call {
                method: area.clone(),
                virtual_dispatch: true,
            },
            Some(s0.clone()),
            vec![Variable::parameter(0, shape.clone())],
        );
        b.push(entry, Opcode::Return, None, vec![s0]);
        let graph = b.build();
        let mut source = ProgramSource::new();
        source.add_type(method_graph::TypeDef::new(shape));
        let lookup = FactoryLookup(source);
        let form = Translator::new(&graph, &lookup).translate().unwrap();

        let guards = form.block(&BlockId::node(0)).unwrap().exception_guards();
        assert_eq!(guards.len(), 3);
        assert_eq!(
            guards[2].lines(),
            vec![
                "(assert (not (= Demo.C.Measure_Geo.Shape!p0 Geo.Shape_null)))",
                "(assert (= (Geo.Shape_type Demo.C.Measure_Geo.Shape!p0) Geo.Shape_tag))",
            ]
        );
        assert_eq!(form.referenced_methods(), vec![area]);
    }

    #[test]
    fn unsupported_opcodes_fail_translation() {
        let method = MethodRef::new_static(demo(), "Odd", vec![], TypeRef::Void);
        let mut b = MethodGraphBuilder::new(method.clone());
        let entry = b.block();
        b.push(entry, Opcode::Unsupported("localloc".to_string()), None, vec![]);
        let graph = b.build();
        let lookup = FactoryLookup(ProgramSource::new());
        let err = Translator::new(&graph, &lookup).translate().unwrap_err();
        assert_eq!(
            err,
            TranslationError::UnsupportedInstruction {
                method,
                offset: 0,
                opcode: "localloc".to_string()
            }
        );
    }

    #[test]
    fn stored_field_values_take_the_field_type() {
        let holder = TypeRef::named("Demo", "Holder");
        let mut source = ProgramSource::new();
        source.add_type(TypeDef::new(holder.clone()).with_field("o", TypeRef::Object));
        let method = MethodRef::new_static(demo(), "Put", vec![holder.clone(), TypeRef::String], TypeRef::Void);
        let mut b = MethodGraphBuilder::new(method.clone());
        let entry = b.block();
        b.push(
            entry,
            Opcode::StoreField(FieldRef::new(holder.clone(), "o")),
            Some(Variable::stack(0, holder.clone())),
            vec![Variable::parameter(0, holder), Variable::parameter(1, TypeRef::String)],
        );
        b.push(entry, Opcode::Return, None, vec![]);
        let graph = b.build();
        let lookup = FactoryLookup(source);
        let form = Translator::new(&graph, &lookup).translate().unwrap();

        let value = format!("{}!p1", method.symbol());
        let store = lines(form.block(&BlockId::node(0)).unwrap())
            .into_iter()
            .find(|line| line.contains("Demo.Holder_ctor"))
            .unwrap();
        assert!(store.contains(&format!("(Object_ctor (Str_ptr {0}) (Str_type {0}))", value)));
    }

    #[test]
    fn misnumbered_graphs_are_rejected_before_translation() {
        let method = MethodRef::new_static(demo(), "Odd", vec![], TypeRef::Void);
        let mut b = MethodGraphBuilder::new(method);
        let entry = b.block();
        b.push(entry, Opcode::Return, None, vec![]);
        let mut graph = b.build();
        graph.blocks[0].index = 1;
        let lookup = FactoryLookup(ProgramSource::new());
        let err = Translator::new(&graph, &lookup).translate().unwrap_err();
        assert!(matches!(err, TranslationError::InvalidArgument(ref reason) if reason.contains("numbered 1")));
    }
}
