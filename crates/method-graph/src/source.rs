// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

use crate::graph::MethodGraph;
use crate::method::MethodRef;
use crate::types::{TypeDef, TypeRef};
use log::debug;
use std::collections::BTreeMap;

/// Synchronous, in-memory access to the front-end's view of a program
pub trait GraphSource: Send + Sync {
    /// Definition of a user-defined type, if the front-end knows it
    fn type_def(&self, ty: &TypeRef) -> Option<&TypeDef>;

    /// Control-flow graph of a method with a body
    fn method_graph(&self, method: &MethodRef) -> Option<&MethodGraph>;
}

/// A program held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct ProgramSource {
    types: BTreeMap<TypeRef, TypeDef>,
    methods: BTreeMap<MethodRef, MethodGraph>,
}

impl ProgramSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_type(&mut self, def: TypeDef) -> &mut Self {
        debug!("registering type {}", def.ty);
        self.types.insert(def.ty.clone(), def);
        self
    }

    pub fn add_method(&mut self, graph: MethodGraph) -> &mut Self {
        debug!("registering method {}", graph.method);
        self.methods.insert(graph.method.clone(), graph);
        self
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeDef> {
        self.types.values()
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodRef> {
        self.methods.keys()
    }
}

impl GraphSource for ProgramSource {
    fn type_def(&self, ty: &TypeRef) -> Option<&TypeDef> {
        self.types.get(ty)
    }

    fn method_graph(&self, method: &MethodRef) -> Option<&MethodGraph> {
        self.methods.get(method)
    }
}
