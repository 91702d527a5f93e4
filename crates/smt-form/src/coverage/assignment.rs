// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

use crate::coverage::context::InvocationSite;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Identity of one value flow: at `offset` of `site`, reached through `stack`, the value
/// of `source` flows into `target`. Symbols are already renamed for their sites.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssignmentKey {
    pub site: InvocationSite,
    pub stack: Vec<InvocationSite>,
    pub offset: u32,
    pub source: String,
    pub target: String,
}

impl AssignmentKey {
    /// Root invocation of the run the flow belongs to
    pub fn root(&self) -> Option<&InvocationSite> {
        self.stack.first()
    }
}

/// A recorded value flow. Never changes once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentRelation {
    key: AssignmentKey,
}

impl AssignmentRelation {
    pub fn new(key: AssignmentKey) -> Self {
        Self { key }
    }

    pub fn key(&self) -> &AssignmentKey {
        &self.key
    }

    pub fn source(&self) -> &str {
        &self.key.source
    }

    pub fn target(&self) -> &str {
        &self.key.target
    }
}

/// Latest flow into each symbol along one path
#[derive(Debug, Clone, Default)]
pub struct AssignmentTracker {
    latest: BTreeMap<String, Arc<AssignmentRelation>>,
}

impl AssignmentTracker {
    pub fn record(&mut self, relation: Arc<AssignmentRelation>) {
        self.latest.insert(relation.target().to_string(), relation);
    }

    pub fn merge(&mut self, other: &AssignmentTracker) {
        for (target, relation) in &other.latest {
            self.latest.insert(target.clone(), relation.clone());
        }
    }

    /// Flows leading into `symbol`, latest first
    pub fn ancestry(&self, symbol: &str) -> Vec<Arc<AssignmentRelation>> {
        let mut chain: Vec<Arc<AssignmentRelation>> = vec![];
        let mut current = symbol;
        while let Some(relation) = self.latest.get(current) {
            // single assignment per path keeps this acyclic; stop on malformed input
            if chain.iter().any(|r| Arc::ptr_eq(r, relation)) {
                break;
            }
            chain.push(relation.clone());
            current = relation.source();
        }
        chain
    }

    /// Earliest symbol whose value reaches `symbol`
    pub fn origin(&self, symbol: &str) -> String {
        self.ancestry(symbol)
            .last()
            .map(|r| r.source().to_string())
            .unwrap_or_else(|| symbol.to_string())
    }
}
