// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Resolution scopes and the handlers they carry

use crate::ir::Form;
use dashmap::DashMap;
use log::debug;
use method_graph::{MethodRef, TypeRef};
use smt_sentence::{SentenceFactory, TypeSentence};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Overrides how an unknown type is encoded
pub trait TypeHandler: Send + Sync {
    /// A sentence for `ty`, or `None` to leave it to the next handler
    fn resolve_type(&self, ty: &TypeRef, factory: &SentenceFactory) -> anyhow::Result<Option<TypeSentence>>;
}

/// Overrides how an unknown method is translated
pub trait MethodHandler: Send + Sync {
    /// A form for `method`, or `None` to leave it to the next handler
    fn resolve_method(&self, method: &MethodRef) -> anyhow::Result<Option<Form>>;
}

/// Book of live handler subscriptions across all open scopes
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    next_scope: AtomicU64,
    live: DashMap<u64, usize>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a top-level scope subscribing the given handlers
    pub fn open(
        &self,
        type_handlers: Vec<Arc<dyn TypeHandler>>,
        method_handlers: Vec<Arc<dyn MethodHandler>>,
    ) -> ResolutionScope<'_> {
        self.subscribe(0, type_handlers, method_handlers)
    }

    fn subscribe(
        &self,
        depth: usize,
        type_handlers: Vec<Arc<dyn TypeHandler>>,
        method_handlers: Vec<Arc<dyn MethodHandler>>,
    ) -> ResolutionScope<'_> {
        let id = self.next_scope.fetch_add(1, Ordering::Relaxed);
        self.live.insert(id, type_handlers.len() + method_handlers.len());
        ResolutionScope {
            registry: self,
            id,
            depth,
            type_handlers,
            method_handlers,
        }
    }

    /// Number of handler subscriptions held by scopes that are still open
    pub fn active_subscriptions(&self) -> usize {
        self.live.iter().map(|entry| *entry.value()).sum()
    }

    pub fn active_scopes(&self) -> usize {
        self.live.len()
    }
}

/// A unit of resolution work. Handlers are subscribed when the scope is opened and
/// unsubscribed when it is dropped, whichever way the work ends.
pub struct ResolutionScope<'r> {
    registry: &'r HandlerRegistry,
    id: u64,
    depth: usize,
    type_handlers: Vec<Arc<dyn TypeHandler>>,
    method_handlers: Vec<Arc<dyn MethodHandler>>,
}

impl<'r> ResolutionScope<'r> {
    /// Nested scope holding `type_handlers` and `method_handlers` ahead of everything
    /// this scope holds
    pub fn child(
        &self,
        type_handlers: Vec<Arc<dyn TypeHandler>>,
        method_handlers: Vec<Arc<dyn MethodHandler>>,
    ) -> ResolutionScope<'r> {
        let type_handlers = type_handlers
            .into_iter()
            .chain(self.type_handlers.iter().cloned())
            .collect();
        let method_handlers = method_handlers
            .into_iter()
            .chain(self.method_handlers.iter().cloned())
            .collect();
        self.registry.subscribe(self.depth + 1, type_handlers, method_handlers)
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Type handlers, innermost scope first
    pub fn type_handlers(&self) -> &[Arc<dyn TypeHandler>] {
        &self.type_handlers
    }

    /// Method handlers, innermost scope first
    pub fn method_handlers(&self) -> &[Arc<dyn MethodHandler>] {
        &self.method_handlers
    }
}

impl Drop for ResolutionScope<'_> {
    fn drop(&mut self) {
        self.registry.live.remove(&self.id);
        debug!("closed resolution scope {} at depth {}", self.id, self.depth);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nothing;

    impl TypeHandler for Nothing {
        fn resolve_type(&self, _ty: &TypeRef, _factory: &SentenceFactory) -> anyhow::Result<Option<TypeSentence>> {
            Ok(None)
        }
    }

    #[test]
    fn dropping_scopes_releases_their_subscriptions() {
        let registry = HandlerRegistry::new();
        {
            let outer = registry.open(vec![Arc::new(Nothing)], vec![]);
            assert_eq!(registry.active_subscriptions(), 1);
            {
                let inner = outer.child(vec![Arc::new(Nothing)], vec![]);
                assert_eq!(inner.type_handlers().len(), 2);
                assert_eq!(inner.depth(), 1);
                assert_eq!(registry.active_subscriptions(), 3);
            }
            assert_eq!(registry.active_subscriptions(), 1);
        }
        assert_eq!(registry.active_subscriptions(), 0);
        assert_eq!(registry.active_scopes(), 0);
    }
}
