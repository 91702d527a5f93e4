// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Path coverage over resolved forms
//!
//! A run starts at one resolved method and produces one [`PathAssertionGroup`] per
//! distinct path through it. Calls to resolved callees are inlined at their call site,
//! with every local symbol of the callee suffixed by the site's sequence number and call
//! order, so two calls of the same method never share a constant.

mod assignment;
mod context;
mod paths;
mod render;
mod rename;

pub use assignment::{AssignmentKey, AssignmentRelation, AssignmentTracker};
pub use context::{AnalysisContext, InvocationSite};
pub use paths::{enumerate_paths, ExitKind, PathSkeleton, PathStep};
pub use rename::Renamer;

use crate::error::CoverageError;
use crate::resolution::ResolutionEngine;
use log::{debug, info};
use method_graph::MethodRef;
use render::{PathState, Run};
use std::cmp::Reverse;

/// Declarations and assertions that hold along one path of a method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathAssertionGroup {
    pub method: MethodRef,
    pub site: InvocationSite,
    /// Declarations and assertions in emission order
    pub lines: Vec<String>,
    pub assertions: Vec<String>,
    pub exit: ExitKind,
    pub return_value: Option<String>,
    /// Earliest symbol the returned value flows from
    pub return_origin: Option<String>,
}

impl PathAssertionGroup {
    fn from_state(method: &MethodRef, site: &InvocationSite, state: PathState) -> Self {
        let assertions = state
            .lines
            .iter()
            .filter(|line| line.starts_with("(assert"))
            .cloned()
            .collect();
        let return_origin = state.return_value.as_ref().map(|value| state.flows.origin(value));
        Self {
            method: method.clone(),
            site: site.clone(),
            assertions,
            exit: state.exit.unwrap_or(ExitKind::Return),
            return_value: state.return_value,
            return_origin,
            lines: state.lines,
        }
    }

    pub fn declarations(&self) -> impl Iterator<Item = &String> {
        self.lines.iter().filter(|line| line.starts_with("(declare-"))
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// Assertion groups covering every path of `method`, which must already be resolved
/// in `engine`. Each call opens a new run with its own sequence number in `context`.
pub fn full_path_covered_assertions(
    engine: &ResolutionEngine,
    method: &MethodRef,
    context: &AnalysisContext,
) -> Result<Vec<PathAssertionGroup>, CoverageError> {
    let form = engine
        .form(method)
        .ok_or_else(|| CoverageError::UnresolvedMethod(method.clone()))?;
    let root = context.root_site(method);
    info!("covering paths of {}", root);

    let mut run = Run::new(engine, context, root.clone());
    let rendered = run.render_form(&form, &root);
    context.release(&root);

    let groups = rendered?
        .into_iter()
        .map(|state| PathAssertionGroup::from_state(method, &root, state))
        .collect::<Vec<_>>();
    let total = groups.len();
    let kept = prune(groups);
    info!("{} of {} paths kept for {}", kept.len(), total, root);
    Ok(kept)
}

/// Drops every group whose assertions are a prefix of, or extended by, a kept group of
/// the same exit kind. Longer groups are considered first; survivors keep their order.
fn prune(groups: Vec<PathAssertionGroup>) -> Vec<PathAssertionGroup> {
    let mut order: Vec<usize> = (0..groups.len()).collect();
    order.sort_by_key(|&i| Reverse(groups[i].assertions.len()));

    let mut accepted: Vec<usize> = vec![];
    for i in order {
        let candidate = &groups[i];
        let redundant = accepted.iter().map(|&j| &groups[j]).any(|kept| {
            kept.exit == candidate.exit
                && (kept.assertions.starts_with(&candidate.assertions)
                    || candidate.assertions.starts_with(&kept.assertions))
        });
        if redundant {
            debug!("pruned path {} of {}", i, candidate.site);
        } else {
            accepted.push(i);
        }
    }
    accepted.sort_unstable();

    let mut keep = vec![false; groups.len()];
    for i in accepted {
        keep[i] = true;
    }
    groups
        .into_iter()
        .zip(keep)
        .filter_map(|(group, keep)| keep.then_some(group))
        .collect()
}
