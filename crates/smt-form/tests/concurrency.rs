// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

mod common;

use common::*;
use method_graph::{ProgramSource, TypeRef};
use smt_form::resolution::TypeRepository;
use smt_form::{full_path_covered_assertions, AnalysisContext, ResolutionEngine, SmtFormOptions};
use smt_sentence::SentenceFactory;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

const THREADS: usize = 8;

#[test]
fn parallel_runs_get_distinct_sequences() {
    let source = demo_source();
    let engine = ResolutionEngine::new(&source, SmtFormOptions::default());
    let context = AnalysisContext::new();

    let groups: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                scope.spawn(|| {
                    engine.resolve_method(&twice(), vec![], vec![]).unwrap();
                    full_path_covered_assertions(&engine, &twice(), &context).unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let sequences: BTreeSet<u64> = groups.iter().map(|g| g[0].site.sequence).collect();
    assert_eq!(sequences, (0..THREADS as u64).collect());
    for group in &groups {
        let suffix = format!("!{}_2", group[0].site.sequence);
        assert!(group[0].text().contains(&format!("{}!p0{}", identity().symbol(), suffix)));
    }
    assert_eq!(engine.forms().len(), 2);
    assert_eq!(context.relation_count(), 0);
}

#[test]
fn parallel_calls_and_allocations_stay_unique() {
    let context = AnalysisContext::new();
    let root = context.root_site(&twice());
    let node = node();

    let results: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS as u32)
            .map(|offset| {
                let (context, root, node) = (&context, &root, &node);
                scope.spawn(move || {
                    let site = context.call_site(root, offset, &identity());
                    let again = context.call_site(root, offset, &identity());
                    assert_eq!(site, again);
                    (site.call_order, context.pointer(root, offset, node))
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let orders: BTreeSet<u64> = results.iter().map(|(order, _)| *order).collect();
    let pointers: BTreeSet<u64> = results.iter().map(|(_, pointer)| *pointer).collect();
    assert_eq!(orders, (1..=THREADS as u64).collect());
    assert_eq!(pointers, (1..=THREADS as u64).collect());
}

#[test]
fn parallel_inserts_keep_one_sentence() {
    let repository = TypeRepository::new();
    let source = ProgramSource::new();
    let factory = SentenceFactory::default();

    let stored: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| scope.spawn(|| repository.insert(factory.encode(&TypeRef::String, &source).unwrap())))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(stored.iter().all(|s| Arc::ptr_eq(s, &stored[0])));
    assert_eq!(repository.len(), 1);
}
