// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

mod common;

use anyhow::anyhow;
use common::*;
use method_graph::{GraphSource, MethodGraphBuilder, MethodRef, Opcode, ProgramSource, TypeDef, TypeRef, Variable};
use smt_form::{
    Form, MethodHandler, Resolution, ResolutionEngine, ResolutionError, SmtFormOptions, TranslationError, TypeHandler,
};
use smt_sentence::{SentenceFactory, TypeSentence};
use std::sync::Arc;

/// Encodes types the engine's own program does not define
struct ExternalTypes(ProgramSource);

impl TypeHandler for ExternalTypes {
    fn resolve_type(&self, ty: &TypeRef, factory: &SentenceFactory) -> anyhow::Result<Option<TypeSentence>> {
        if self.0.type_def(ty).is_none() {
            return Ok(None);
        }
        Ok(Some(factory.encode(ty, &self.0)?))
    }
}

struct Failing;

impl MethodHandler for Failing {
    fn resolve_method(&self, method: &MethodRef) -> anyhow::Result<Option<Form>> {
        Err(anyhow!("no body available for {}", method.name))
    }
}

/// Replaces every method under `Native.` with an empty form
struct Natives;

impl MethodHandler for Natives {
    fn resolve_method(&self, method: &MethodRef) -> anyhow::Result<Option<Form>> {
        if method.declaring.full_name().starts_with("Native.") {
            return Ok(Some(Form::empty(method.clone())));
        }
        Ok(None)
    }
}

#[test]
fn self_referencing_array_field_resolves_once() {
    let source = demo_source();
    let engine = ResolutionEngine::new(&source, SmtFormOptions::default());
    let sentence = engine.resolve_type(&node()).unwrap().into_inner();
    let array = TypeRef::array_of(node());
    assert_eq!(sentence.dependencies().iter().filter(|d| **d == array).count(), 1);
    assert!(engine.types().contains(&array));

    let declarations = engine.declarations();
    let datatypes = declarations
        .iter()
        .filter(|line| line.starts_with("(declare-datatypes") && line.contains("Demo.Node_ctor"))
        .count();
    assert_eq!(datatypes, 1);
}

#[test]
fn repeated_resolution_is_cached() {
    let source = demo_source();
    let engine = ResolutionEngine::new(&source, SmtFormOptions::default());
    let first = engine.resolve_method_form(&twice(), vec![], vec![]).unwrap();
    let forms = engine.forms().len();
    let types = engine.types().len();
    let second = engine.resolve_method_form(&twice(), vec![], vec![]).unwrap();
    assert!(second.is_cached());
    assert!(Arc::ptr_eq(first.get(), second.get()));
    assert_eq!(engine.forms().len(), forms);
    assert_eq!(engine.types().len(), types);
    assert!(engine.form(&identity()).is_some());
}

#[test]
fn handlers_supply_unknown_types() {
    let external = TypeRef::named("Vendor", "Handle");
    let mut vendor = ProgramSource::new();
    vendor.add_type(TypeDef::new(external.clone()).with_field("id", TypeRef::Int32));

    let wrap = MethodRef::new_static(demo(), "Wrap", vec![external.clone()], external.clone());
    let mut b = MethodGraphBuilder::new(wrap.clone());
    let entry = b.block();
    b.push(entry, Opcode::Return, None, vec![Variable::parameter(0, external.clone())]);
    let mut source = demo_source();
    source.add_method(b.build());

    let engine = ResolutionEngine::new(&source, SmtFormOptions::default());
    let err = engine.resolve_method(&wrap, vec![], vec![]).unwrap_err();
    assert!(matches!(err, ResolutionError::UnresolvedType(ty) if ty == external));
    assert!(engine.forms().is_empty());

    engine
        .resolve_method(&wrap, vec![Arc::new(ExternalTypes(vendor))], vec![])
        .unwrap();
    assert!(engine.types().contains(&external));
    assert!(engine.form(&wrap).is_some());
    assert_eq!(engine.handlers().active_subscriptions(), 0);
}

#[test]
fn failed_requests_keep_no_handled_sentences() {
    let external = TypeRef::named("Vendor", "Handle");
    let mut vendor = ProgramSource::new();
    vendor.add_type(TypeDef::new(external.clone()).with_field("id", TypeRef::Int32));

    let missing = MethodRef::new_static(demo(), "Missing", vec![external.clone()], TypeRef::Int32);
    let forward = MethodRef::new_static(demo(), "Forward", vec![external.clone()], TypeRef::Int32);
    let mut b = MethodGraphBuilder::new(forward.clone());
    let entry = b.block();
    let s0 = Variable::stack(0, TypeRef::Int32);
    b.push(
        entry,
        Opcode::Call {
            method: missing.clone(),
            virtual_dispatch: false,
        },
        Some(s0.clone()),
        vec![Variable::parameter(0, external.clone())],
    );
    b.push(entry, Opcode::Return, None, vec![s0]);
    let mut source = demo_source();
    source.add_method(b.build());

    let engine = ResolutionEngine::new(&source, SmtFormOptions::default());
    let types = engine.types().len();
    let err = engine
        .resolve_method(&forward, vec![Arc::new(ExternalTypes(vendor))], vec![])
        .unwrap_err();
    assert!(matches!(err, ResolutionError::UnresolvedMethod(m) if m == missing));
    assert!(!engine.types().contains(&external));
    assert_eq!(engine.types().len(), types);
    assert!(engine.forms().is_empty());

    // without the handler the type stays unknown
    let err = engine.resolve_method(&forward, vec![], vec![]).unwrap_err();
    assert!(matches!(err, ResolutionError::UnresolvedType(ty) if ty == external));
}

#[test]
fn handlers_supply_forms_before_default_rules() {
    let native = MethodRef::new_static(TypeRef::named("Native", "Io"), "Read", vec![], TypeRef::Int32);
    let source = ProgramSource::new();
    let engine = ResolutionEngine::new(&source, SmtFormOptions::default());
    let resolution = engine
        .resolve_method_form(&native, vec![], vec![Arc::new(Natives)])
        .unwrap();
    assert!(matches!(resolution, Resolution::Handled(_)));
    assert!(resolution.get().is_stand_in());
}

#[test]
fn failing_handlers_leave_nothing_behind() {
    let source = demo_source();
    let engine = ResolutionEngine::new(&source, SmtFormOptions::default());
    let err = engine
        .resolve_method(&twice(), vec![], vec![Arc::new(Failing)])
        .unwrap_err();
    match err {
        ResolutionError::Handler { reference, source } => {
            assert!(reference.contains("Twice"));
            assert!(source.to_string().contains("Twice"));
        }
        other => panic!("unexpected error {}", other),
    }
    assert!(engine.forms().is_empty());
    assert_eq!(engine.handlers().active_subscriptions(), 0);
    assert_eq!(engine.handlers().active_scopes(), 0);

    engine.resolve_method(&twice(), vec![], vec![]).unwrap();
    assert_eq!(engine.forms().len(), 2);
}

#[test]
fn unsupported_instructions_fail_resolution() {
    let method = MethodRef::new_static(demo(), "Lock", vec![TypeRef::Object], TypeRef::Void);
    let mut b = MethodGraphBuilder::new(method.clone());
    let entry = b.block();
    b.push(
        entry,
        Opcode::Unsupported("monitor-enter".to_string()),
        None,
        vec![Variable::parameter(0, TypeRef::Object)],
    );
    b.push(entry, Opcode::Return, None, vec![]);
    let mut source = ProgramSource::new();
    source.add_method(b.build());

    let engine = ResolutionEngine::new(&source, SmtFormOptions::default());
    let err = engine.resolve_method(&method, vec![], vec![]).unwrap_err();
    assert!(matches!(
        err,
        ResolutionError::Translation(TranslationError::UnsupportedInstruction { offset: 0, ref opcode, .. })
            if opcode == "monitor-enter"
    ));
    assert!(engine.forms().is_empty());
}
