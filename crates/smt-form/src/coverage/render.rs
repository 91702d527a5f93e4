// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

use crate::coverage::assignment::{AssignmentKey, AssignmentTracker};
use crate::coverage::context::{AnalysisContext, InvocationSite};
use crate::coverage::paths::{ExitKind, PathSkeleton};
use crate::coverage::rename::Renamer;
use crate::error::CoverageError;
use crate::ir::{Effect, Form, Instruction, InstructionBody};
use crate::resolution::ResolutionEngine;
use log::{debug, trace};
use method_graph::{MethodRef, TypeRef};
use smt_sentence::Operation;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Lines of one path under construction
#[derive(Debug, Clone, Default)]
pub(crate) struct PathState {
    pub lines: Vec<String>,
    declared: BTreeSet<String>,
    /// Set once the path has left its method, possibly through a callee
    pub exit: Option<ExitKind>,
    pub return_value: Option<String>,
    pub flows: AssignmentTracker,
}

impl PathState {
    fn push(&mut self, line: String) {
        if line.starts_with("(declare-") && !self.declared.insert(line.clone()) {
            return;
        }
        self.lines.push(line);
    }

    fn assert(&mut self, expression: &str) {
        self.push(format!("(assert {})", expression));
    }

    fn append(&mut self, other: &PathState) {
        for line in &other.lines {
            self.push(line.clone());
        }
        self.flows.merge(&other.flows);
    }
}

/// Inlined paths of one callee invocation
struct CalleePaths {
    form: Arc<Form>,
    site: InvocationSite,
    paths: Vec<PathState>,
}

/// One top-level analysis run. Holds the call stack of the invocation being rendered.
pub(crate) struct Run<'e, 's> {
    engine: &'e ResolutionEngine<'s>,
    context: &'e AnalysisContext,
    stack: Vec<InvocationSite>,
}

impl<'e, 's> Run<'e, 's> {
    pub fn new(engine: &'e ResolutionEngine<'s>, context: &'e AnalysisContext, root: InvocationSite) -> Self {
        Self {
            engine,
            context,
            stack: vec![root],
        }
    }

    fn limit(&self) -> usize {
        self.engine.options().max_paths
    }

    /// Every path of `form` invoked at `site`, callees inlined
    pub fn render_form(&mut self, form: &Arc<Form>, site: &InvocationSite) -> Result<Vec<PathState>, CoverageError> {
        let skeletons = self.context.skeletons(form, self.limit())?;
        let mut rendered = vec![];
        for skeleton in skeletons.iter() {
            rendered.extend(self.render_path(form, site, skeleton)?);
            self.check_limit(form.method(), rendered.len())?;
        }
        trace!("{} yields {} paths", site, rendered.len());
        Ok(rendered)
    }

    fn render_path(
        &mut self,
        form: &Form,
        site: &InvocationSite,
        skeleton: &PathSkeleton,
    ) -> Result<Vec<PathState>, CoverageError> {
        let renamer = Renamer::new(form.local_symbols(), site);
        let mut states = vec![PathState::default()];
        for step in &skeleton.steps {
            let block = form
                .block(&step.block)
                .ok_or_else(|| CoverageError::InvalidArgument(format!("{} has no block {}", form.method(), step.block)))?;
            for instruction in block.declarations().iter().chain(block.assertions()) {
                states = self.apply(form, site, &renamer, instruction, states)?;
            }
            let edge = block.successors().get(step.edge).ok_or_else(|| {
                CoverageError::InvalidArgument(format!("{} has no successor {}", step.block, step.edge))
            })?;
            for guard in block.guards(&edge.condition) {
                states = self.apply(form, site, &renamer, guard, states)?;
            }
        }
        for state in &mut states {
            state.exit.get_or_insert(skeleton.exit);
        }
        Ok(states)
    }

    fn apply(
        &mut self,
        form: &Form,
        site: &InvocationSite,
        renamer: &Renamer,
        instruction: &Instruction,
        states: Vec<PathState>,
    ) -> Result<Vec<PathState>, CoverageError> {
        let lines: Vec<String> = match instruction.body() {
            InstructionBody::Declaration { symbol, sort } => {
                vec![format!("(declare-const {} {})", renamer.symbol(symbol), sort)]
            }
            InstructionBody::Assertion { expressions, .. } => expressions
                .iter()
                .map(|e| format!("(assert {})", renamer.expression(e)))
                .collect(),
        };
        let offset = instruction.id().offset;

        let mut extra: Option<String> = None;
        let mut callee: Option<(&MethodRef, Vec<String>, Option<String>)> = None;
        match instruction.effect() {
            Effect::Allocate { ty, target } => {
                extra = Some(self.pointer_assertion(site, offset, ty, &renamer.symbol(target))?);
            }
            Effect::Construct {
                ty,
                target,
                constructor,
                arguments,
            } => {
                extra = Some(self.pointer_assertion(site, offset, ty, &renamer.symbol(target))?);
                let arguments = arguments.iter().map(|a| renamer.expression(a)).collect();
                callee = Some((constructor, arguments, None));
            }
            Effect::Call {
                callee: method,
                arguments,
                target,
            } => {
                let arguments = arguments.iter().map(|a| renamer.expression(a)).collect();
                callee = Some((method, arguments, target.as_ref().map(|t| renamer.symbol(t))));
            }
            _ => {}
        }
        let inlined = match &callee {
            Some((method, ..)) => self.callee_paths(site, offset, method)?,
            None => None,
        };

        let mut out = Vec::with_capacity(states.len());
        for mut state in states {
            if state.exit.is_some() {
                out.push(state);
                continue;
            }
            for line in &lines {
                state.push(line.clone());
            }
            if let Some(assertion) = &extra {
                state.assert(assertion);
            }
            match instruction.effect() {
                Effect::Assign { source, target } => {
                    let key = self.flow_key(site, offset, renamer.expression(source), renamer.symbol(target));
                    state.flows.record(self.context.relation(key));
                }
                Effect::Return(value) => {
                    state.return_value = value.as_ref().map(|v| renamer.expression(v));
                }
                _ => {}
            }
            match (&callee, &inlined) {
                (Some((_, arguments, target)), Some(inlined)) => {
                    for path in &inlined.paths {
                        out.push(self.splice(&state, site, offset, inlined, path, arguments, target.as_deref()));
                    }
                }
                _ => out.push(state),
            }
            self.check_limit(form.method(), out.len())?;
        }
        Ok(out)
    }

    fn pointer_assertion(
        &self,
        site: &InvocationSite,
        offset: u32,
        ty: &TypeRef,
        target: &str,
    ) -> Result<String, CoverageError> {
        let sentence = self
            .engine
            .types()
            .get(ty)
            .ok_or_else(|| CoverageError::InvalidArgument(format!("type {} has not been resolved", ty)))?;
        let pointer = self.context.pointer(site, offset, ty);
        Ok(sentence.apply(&Operation::HasPointer { value: target, pointer })?)
    }

    /// Paths of `callee` at its call site, or `None` when the call stays unconstrained
    fn callee_paths(
        &mut self,
        site: &InvocationSite,
        offset: u32,
        callee: &MethodRef,
    ) -> Result<Option<CalleePaths>, CoverageError> {
        let form = self
            .engine
            .form(callee)
            .ok_or_else(|| CoverageError::UnresolvedMethod(callee.clone()))?;
        if form.is_stand_in() {
            debug!("{} is not inlined", callee);
            return Ok(None);
        }
        let active = self.stack.iter().filter(|s| &s.method == callee).count();
        if active >= self.engine.options().max_recursion_depth {
            debug!("recursion bound reached for {} in {}", callee, site);
            return Ok(None);
        }
        let callee_site = self.context.call_site(site, offset, callee);
        self.stack.push(callee_site.clone());
        let paths = self.render_form(&form, &callee_site);
        self.stack.pop();
        Ok(Some(CalleePaths {
            form,
            site: callee_site,
            paths: paths?,
        }))
    }

    #[allow(clippy::too_many_arguments)]
    fn splice(
        &self,
        state: &PathState,
        site: &InvocationSite,
        offset: u32,
        inlined: &CalleePaths,
        path: &PathState,
        arguments: &[String],
        target: Option<&str>,
    ) -> PathState {
        let renamer = Renamer::new(inlined.form.local_symbols(), &inlined.site);
        let mut combined = state.clone();
        for parameter in inlined.form.parameters() {
            combined.push(format!("(declare-const {} {})", renamer.symbol(&parameter.symbol), parameter.sort));
        }
        for (parameter, argument) in inlined.form.parameters().iter().zip(arguments) {
            let parameter = renamer.symbol(&parameter.symbol);
            combined.assert(&format!("(= {} {})", parameter, argument));
            let key = self.flow_key(site, offset, argument.clone(), parameter);
            combined.flows.record(self.context.relation(key));
        }
        combined.append(path);
        match path.exit {
            Some(ExitKind::Return) | None => {
                if let (Some(target), Some(value)) = (target, &path.return_value) {
                    combined.assert(&format!("(= {} {})", target, value));
                    let key = self.flow_key(site, offset, value.clone(), target.to_string());
                    combined.flows.record(self.context.relation(key));
                }
            }
            Some(exit) => combined.exit = Some(exit),
        }
        combined
    }

    fn flow_key(&self, site: &InvocationSite, offset: u32, source: String, target: String) -> AssignmentKey {
        AssignmentKey {
            site: site.clone(),
            stack: self.stack.clone(),
            offset,
            source,
            target,
        }
    }

    fn check_limit(&self, method: &MethodRef, count: usize) -> Result<(), CoverageError> {
        if count > self.limit() {
            return Err(CoverageError::PathLimitExceeded {
                method: method.clone(),
                limit: self.limit(),
            });
        }
        Ok(())
    }
}
