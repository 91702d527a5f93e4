// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

use crate::coverage::assignment::{AssignmentKey, AssignmentRelation};
use crate::coverage::paths::{enumerate_paths, PathSkeleton};
use crate::error::CoverageError;
use crate::ir::Form;
use dashmap::DashMap;
use method_graph::{MethodRef, TypeRef};
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// One invocation of a method inside an analysis run
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InvocationSite {
    pub method: MethodRef,
    pub sequence: u64,
    pub call_order: u64,
}

impl InvocationSite {
    pub fn new(method: MethodRef, sequence: u64, call_order: u64) -> Self {
        Self {
            method,
            sequence,
            call_order,
        }
    }

    /// Appended to every renamed symbol of this invocation
    pub fn suffix(&self) -> String {
        format!("{}_{}", self.sequence, self.call_order)
    }
}

impl Display for InvocationSite {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.method.symbol(), self.suffix())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SiteKey {
    parent: InvocationSite,
    offset: u32,
    callee: MethodRef,
}

/// Bookkeeping shared by analysis runs. Every table is a concurrent map, so runs on
/// different threads may share one context.
#[derive(Debug, Default)]
pub struct AnalysisContext {
    sequences: DashMap<MethodRef, u64>,
    call_orders: DashMap<(MethodRef, u64), u64>,
    pointers: DashMap<TypeRef, u64>,
    sites: DashMap<SiteKey, InvocationSite>,
    allocations: DashMap<(InvocationSite, u32), u64>,
    relations: DashMap<AssignmentKey, Arc<AssignmentRelation>>,
    skeletons: DashMap<(MethodRef, usize), (Arc<Form>, Arc<Vec<PathSkeleton>>)>,
}

impl AnalysisContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Site of a new top-level run of `method`
    pub fn root_site(&self, method: &MethodRef) -> InvocationSite {
        let sequence = {
            let mut next = self.sequences.entry(method.clone()).or_insert(0);
            let sequence = *next;
            *next += 1;
            sequence
        };
        InvocationSite::new(method.clone(), sequence, 0)
    }

    /// Site of the call of `callee` at `offset` inside `parent`. The same call reached
    /// along different paths gets the same site.
    pub fn call_site(&self, parent: &InvocationSite, offset: u32, callee: &MethodRef) -> InvocationSite {
        let key = SiteKey {
            parent: parent.clone(),
            offset,
            callee: callee.clone(),
        };
        self.sites
            .entry(key)
            .or_insert_with(|| {
                let mut order = self.call_orders.entry((callee.clone(), parent.sequence)).or_insert(0);
                *order += 1;
                InvocationSite::new(callee.clone(), parent.sequence, *order)
            })
            .clone()
    }

    /// Pointer of the object allocated at `offset` inside `site`
    pub fn pointer(&self, site: &InvocationSite, offset: u32, ty: &TypeRef) -> u64 {
        *self
            .allocations
            .entry((site.clone(), offset))
            .or_insert_with(|| {
                let mut next = self.pointers.entry(ty.clone()).or_insert(0);
                *next += 1;
                *next
            })
    }

    pub fn relation(&self, key: AssignmentKey) -> Arc<AssignmentRelation> {
        self.relations
            .entry(key.clone())
            .or_insert_with(|| Arc::new(AssignmentRelation::new(key)))
            .clone()
    }

    /// Forget the flows of the run rooted at `root`
    pub fn release(&self, root: &InvocationSite) {
        self.relations.retain(|key, _| key.root() != Some(root));
    }

    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    /// Path skeletons of `form` under `limit`. Enumerated once per method and limit, and
    /// again whenever a run brings a different form for the same method.
    pub fn skeletons(&self, form: &Arc<Form>, limit: usize) -> Result<Arc<Vec<PathSkeleton>>, CoverageError> {
        let key = (form.method().clone(), limit);
        if let Some(entry) = self.skeletons.get(&key) {
            let (cached, skeletons) = entry.value();
            if Arc::ptr_eq(cached, form) || **cached == **form {
                return Ok(skeletons.clone());
            }
        }
        let skeletons = Arc::new(enumerate_paths(form, limit)?);
        self.skeletons.insert(key, (form.clone(), skeletons.clone()));
        Ok(skeletons)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(name: &str) -> MethodRef {
        MethodRef::new_static(TypeRef::named("Demo", "C"), name, vec![], TypeRef::Void)
    }

    #[test]
    fn call_orders_count_per_callee_and_sequence() {
        let context = AnalysisContext::new();
        let root = context.root_site(&method("Main"));
        assert_eq!(root.suffix(), "0_0");
        let first = context.call_site(&root, 1, &method("F"));
        let second = context.call_site(&root, 2, &method("F"));
        let again = context.call_site(&root, 1, &method("F"));
        assert_eq!((first.call_order, second.call_order), (1, 2));
        assert_eq!(first, again);
        assert_eq!(context.root_site(&method("Main")).sequence, 1);
    }

    #[test]
    fn allocations_keep_their_pointer() {
        let context = AnalysisContext::new();
        let root = context.root_site(&method("Main"));
        let node = TypeRef::named("Demo", "Node");
        assert_eq!(context.pointer(&root, 4, &node), 1);
        assert_eq!(context.pointer(&root, 9, &node), 2);
        assert_eq!(context.pointer(&root, 4, &node), 1);
        assert_eq!(context.pointer(&root, 4, &TypeRef::String), 1);
    }
}
