// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Shared append-only repositories of sentences and forms

use crate::error::TranslationError;
use crate::ir::{Form, SentenceLookup};
use dashmap::DashMap;
use method_graph::{MethodRef, TypeRef};
use petgraph::algo::{condensation, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use smt_sentence::{prelude, SentenceError, TypeSentence};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Sentences keyed by type identity. Insertion is idempotent: the first sentence stored
/// for a type is the one every later lookup returns.
#[derive(Debug, Default)]
pub struct TypeRepository {
    sentences: DashMap<TypeRef, Arc<TypeSentence>>,
}

impl TypeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, ty: &TypeRef) -> Option<Arc<TypeSentence>> {
        self.sentences.get(ty).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, ty: &TypeRef) -> bool {
        self.sentences.contains_key(ty)
    }

    pub fn insert(&self, sentence: impl Into<Arc<TypeSentence>>) -> Arc<TypeSentence> {
        let sentence = sentence.into();
        self.sentences
            .entry(sentence.ty().clone())
            .or_insert(sentence)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    /// The prelude followed by every stored sentence in dependency order. Mutually
    /// recursive datatypes are declared together in one `declare-datatypes`.
    pub fn declarations(&self) -> Vec<String> {
        let mut sentences: Vec<Arc<TypeSentence>> = self.sentences.iter().map(|e| e.value().clone()).collect();
        sentences.sort_by(|a, b| a.ty().cmp(b.ty()));
        let index: BTreeMap<&TypeRef, usize> = sentences.iter().enumerate().map(|(i, s)| (s.ty(), i)).collect();

        let mut graph = DiGraph::<usize, ()>::new();
        let nodes: Vec<NodeIndex> = (0..sentences.len()).map(|i| graph.add_node(i)).collect();
        for (i, sentence) in sentences.iter().enumerate() {
            let references = sentence.encoding_references().into_iter().chain(sentence.base().cloned());
            for reference in references {
                if let Some(&j) = index.get(&reference) {
                    if j != i {
                        graph.add_edge(nodes[j], nodes[i], ());
                    }
                }
            }
        }

        let condensed = condensation(graph, true);
        let order = toposort(&condensed, None).unwrap_or_else(|_| condensed.node_indices().collect());

        let mut lines = prelude().to_vec();
        for node in order {
            let mut group: Vec<&Arc<TypeSentence>> = condensed[node].iter().map(|&i| &sentences[i]).collect();
            group.sort_by(|a, b| a.ty().cmp(b.ty()));
            if let [single] = group[..] {
                lines.extend(single.declarations());
                continue;
            }
            let bodies: Vec<String> = group.iter().filter_map(|s| s.datatype_body()).collect();
            lines.push(format!("(declare-datatypes () ({}))", bodies.join(" ")));
            let tags: Vec<Vec<String>> = group.iter().map(|s| s.tag_declarations()).collect();
            lines.extend(tags.iter().filter_map(|t| t.first().cloned()));
            lines.extend(tags.iter().flat_map(|t| t.iter().skip(1).cloned()));
        }
        lines
    }
}

impl SentenceLookup for TypeRepository {
    fn sentence(&self, ty: &TypeRef) -> Result<Arc<TypeSentence>, TranslationError> {
        self.get(ty)
            .ok_or_else(|| TranslationError::Sentence(SentenceError::UnknownType(ty.clone())))
    }
}

/// Forms keyed by method identity, with the same idempotent insertion as [`TypeRepository`]
#[derive(Debug, Default)]
pub struct FormRepository {
    forms: DashMap<MethodRef, Arc<Form>>,
}

impl FormRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, method: &MethodRef) -> Option<Arc<Form>> {
        self.forms.get(method).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, method: &MethodRef) -> bool {
        self.forms.contains_key(method)
    }

    pub fn insert(&self, method: MethodRef, form: Form) -> Arc<Form> {
        self.forms.entry(method).or_insert_with(|| Arc::new(form)).clone()
    }

    pub fn len(&self) -> usize {
        self.forms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }
}
