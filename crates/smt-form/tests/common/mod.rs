// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

#![allow(dead_code)]

use method_graph::{
    BranchTest, Literal, MethodGraphBuilder, MethodRef, Opcode, ProgramSource, TypeDef, TypeRef, Variable,
};

pub fn demo() -> TypeRef {
    TypeRef::named("Demo", "C")
}

pub fn node() -> TypeRef {
    TypeRef::named("Demo", "Node")
}

pub fn identity() -> MethodRef {
    MethodRef::new_static(demo(), "Id", vec![TypeRef::Int32], TypeRef::Int32)
}

pub fn twice() -> MethodRef {
    MethodRef::new_static(demo(), "Twice", vec![TypeRef::Int32], TypeRef::Int32)
}

pub fn not_null() -> MethodRef {
    MethodRef::new_static(demo(), "NotNull", vec![TypeRef::Object], TypeRef::Bool)
}

pub fn element_at() -> MethodRef {
    MethodRef::new_static(
        demo(),
        "At",
        vec![TypeRef::array_of(TypeRef::Int32), TypeRef::Int32],
        TypeRef::Int32,
    )
}

pub fn spin() -> MethodRef {
    MethodRef::new_static(demo(), "Spin", vec![TypeRef::Bool], TypeRef::Void)
}

fn call(method: &MethodRef) -> Opcode {
    Opcode::Call {
        method: method.clone(),
        virtual_dispatch: false,
    }
}

/// `Id(x) = x`, `Twice(x) = Id(Id(x))`, `NotNull(o) = o != null`, `At(a, i) = a[i]` and
/// `Spin(b)`, which loops while `b` holds
pub fn demo_source() -> ProgramSource {
    let int = TypeRef::Int32;
    let mut source = ProgramSource::new();
    source.add_type(TypeDef::new(demo()));
    source.add_type(TypeDef::new(node()).with_field("children", TypeRef::array_of(node())));

    let mut b = MethodGraphBuilder::new(identity());
    let entry = b.block();
    let s0 = Variable::stack(0, int.clone());
    b.push(entry, Opcode::Assign, Some(s0.clone()), vec![Variable::parameter(0, int.clone())]);
    b.push(entry, Opcode::Return, None, vec![s0]);
    source.add_method(b.build());

    let mut b = MethodGraphBuilder::new(twice());
    let entry = b.block();
    let s0 = Variable::stack(0, int.clone());
    let s1 = Variable::stack(1, int.clone());
    b.push(entry, call(&identity()), Some(s0.clone()), vec![Variable::parameter(0, int.clone())]);
    b.push(entry, call(&identity()), Some(s1.clone()), vec![s0]);
    b.push(entry, Opcode::Return, None, vec![s1]);
    source.add_method(b.build());

    let mut b = MethodGraphBuilder::new(not_null());
    let test = b.block();
    let yes = b.block();
    let no = b.block();
    b.push(
        test,
        Opcode::Branch(BranchTest::IfNotNull),
        None,
        vec![Variable::parameter(0, TypeRef::Object)],
    );
    b.edge(test, yes).edge(test, no);
    let s0 = Variable::stack(0, TypeRef::Bool);
    b.push(yes, Opcode::Constant(Literal::Bool(true)), Some(s0.clone()), vec![]);
    b.push(yes, Opcode::Return, None, vec![s0]);
    let s1 = Variable::stack(1, TypeRef::Bool);
    b.push(no, Opcode::Constant(Literal::Bool(false)), Some(s1.clone()), vec![]);
    b.push(no, Opcode::Return, None, vec![s1]);
    source.add_method(b.build());

    let mut b = MethodGraphBuilder::new(element_at());
    let entry = b.block();
    let s0 = Variable::stack(0, int.clone());
    b.push(
        entry,
        Opcode::LoadElement,
        Some(s0.clone()),
        vec![
            Variable::parameter(0, TypeRef::array_of(int.clone())),
            Variable::parameter(1, int),
        ],
    );
    b.push(entry, Opcode::Return, None, vec![s0]);
    source.add_method(b.build());

    let mut b = MethodGraphBuilder::new(spin());
    let head = b.block();
    let done = b.block();
    b.push(head, Opcode::Branch(BranchTest::IfTrue), None, vec![Variable::parameter(0, TypeRef::Bool)]);
    b.edge(head, head).edge(head, done);
    b.push(done, Opcode::Return, None, vec![]);
    source.add_method(b.build());

    source
}

/// `Loop(x)` calls `Helper(x)` and then itself; `Helper` returns its argument
pub fn recursive_source() -> (ProgramSource, MethodRef, MethodRef) {
    let calc = TypeRef::named("Demo", "Calc");
    let looping = MethodRef::new_static(calc.clone(), "Loop", vec![TypeRef::Int32], TypeRef::Int32);
    let helper = MethodRef::new_static(calc.clone(), "Helper", vec![TypeRef::Int32], TypeRef::Int32);
    let p0 = Variable::parameter(0, TypeRef::Int32);
    let s0 = Variable::stack(0, TypeRef::Int32);
    let s1 = Variable::stack(1, TypeRef::Int32);

    let mut source = ProgramSource::new();
    source.add_type(TypeDef::new(calc));

    let mut b = MethodGraphBuilder::new(looping.clone());
    let entry = b.block();
    b.push(entry, call(&helper), Some(s0.clone()), vec![p0.clone()]);
    b.push(entry, call(&looping), Some(s1.clone()), vec![s0]);
    b.push(entry, Opcode::Return, None, vec![s1]);
    source.add_method(b.build());

    let mut b = MethodGraphBuilder::new(helper.clone());
    let entry = b.block();
    b.push(entry, Opcode::Return, None, vec![p0]);
    source.add_method(b.build());

    (source, looping, helper)
}
