// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! The operation vocabulary of sentences.
//!
//! Every semantic operation the translator can request is a variant of [`Operation`].
//! [`TypeSentence::apply`] matches on the (shape, operation) pair; a pair that has no
//! encoding yields [`UnsupportedOperation`].

use crate::error::UnsupportedOperation;
use crate::prelude::SEQ_ARRAY;
use crate::sentence::{SentenceShape, TypeSentence};
use method_graph::{BinaryOp, Comparison, Literal, TypeRef};

/// A semantic operation over constraint-language expressions
#[derive(Debug, Clone, Copy)]
pub enum Operation<'a> {
    Equal(&'a str, &'a str),
    NotEqual(&'a str, &'a str),
    IsNull(&'a str),
    IsNotNull(&'a str),
    /// Truth test as performed by a branch-if-true
    IsTrue(&'a str),
    IsFalse(&'a str),
    Not(&'a str),
    Compare(Comparison, &'a str, &'a str),
    Arithmetic(BinaryOp, &'a str, &'a str),
    Length(&'a str),
    ElementAt { array: &'a str, index: &'a str },
    StoreElement { array: &'a str, index: &'a str, value: &'a str },
    BelowLowerBound { array: &'a str, index: &'a str },
    AboveUpperBound { array: &'a str, index: &'a str },
    InRange { array: &'a str, index: &'a str },
    LoadField { object: &'a str, field: &'a str },
    /// New aggregate equal to `object` except for `field`
    StoreField { object: &'a str, field: &'a str, value: &'a str },
    TypeOf(&'a str),
    InstanceOf { value: &'a str, tag: &'a str },
    /// Dynamic type is exactly `tag`
    HasExactType { value: &'a str, tag: &'a str },
    Convert { value: &'a str, to: &'a TypeRef },
    HoldsLiteral { value: &'a str, literal: &'a Literal },
    /// Freshly allocated: not null and tagged with this sentence's own type
    Allocated(&'a str),
    HasPointer { value: &'a str, pointer: u64 },
}

impl Operation<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Equal(..) => "equal",
            Operation::NotEqual(..) => "not-equal",
            Operation::IsNull(_) => "is-null",
            Operation::IsNotNull(_) => "is-not-null",
            Operation::IsTrue(_) => "is-true",
            Operation::IsFalse(_) => "is-false",
            Operation::Not(_) => "not",
            Operation::Compare(..) => "compare",
            Operation::Arithmetic(..) => "arithmetic",
            Operation::Length(_) => "length",
            Operation::ElementAt { .. } => "element-at",
            Operation::StoreElement { .. } => "store-element",
            Operation::BelowLowerBound { .. } => "below-lower-bound",
            Operation::AboveUpperBound { .. } => "above-upper-bound",
            Operation::InRange { .. } => "in-range",
            Operation::LoadField { .. } => "load-field",
            Operation::StoreField { .. } => "store-field",
            Operation::TypeOf(_) => "type-of",
            Operation::InstanceOf { .. } => "instance-of",
            Operation::HasExactType { .. } => "has-exact-type",
            Operation::Convert { .. } => "convert",
            Operation::HoldsLiteral { .. } => "holds-literal",
            Operation::Allocated(_) => "allocated",
            Operation::HasPointer { .. } => "has-pointer",
        }
    }
}

fn not(expr: String) -> String {
    format!("(not {})", expr)
}

fn equal(a: &str, b: &str) -> String {
    format!("(= {} {})", a, b)
}

fn int_literal(value: i64) -> String {
    if value < 0 {
        format!("(- {})", value.unsigned_abs())
    } else {
        value.to_string()
    }
}

fn real_literal(value: f64) -> String {
    let magnitude = value.abs();
    let text = if magnitude.fract() == 0.0 {
        format!("{:.1}", magnitude)
    } else {
        format!("{}", magnitude)
    };
    if value.is_sign_negative() && magnitude != 0.0 {
        format!("(- {})", text)
    } else {
        text
    }
}

fn string_literal(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn comparison(op: Comparison, a: &str, b: &str) -> String {
    match op {
        Comparison::Eq => equal(a, b),
        Comparison::Ne => not(equal(a, b)),
        Comparison::Lt => format!("(< {} {})", a, b),
        Comparison::Le => format!("(<= {} {})", a, b),
        Comparison::Gt => format!("(> {} {})", a, b),
        Comparison::Ge => format!("(>= {} {})", a, b),
    }
}

fn arithmetic(op: BinaryOp, a: &str, b: &str) -> String {
    let symbol = match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
    };
    format!("({} {} {})", symbol, a, b)
}

impl TypeSentence {
    /// Encode `op` over values of this sentence
    pub fn apply(&self, op: &Operation) -> Result<String, UnsupportedOperation> {
        match &self.shape {
            SentenceShape::Bool => self.apply_bool(op),
            SentenceShape::Int => self.apply_numeric(op, true),
            SentenceShape::Real => self.apply_numeric(op, false),
            SentenceShape::Str => match op {
                Operation::Length(s) => Ok(format!("(str.len ({}_value {}))", self.name, s)),
                Operation::HoldsLiteral {
                    value,
                    literal: Literal::Str(text),
                } => Ok(format!(
                    "(and (not (= {0} {1}_null)) (= ({1}_value {0}) {2}))",
                    value,
                    self.name,
                    string_literal(text)
                )),
                _ => self.apply_reference(op),
            },
            SentenceShape::Object | SentenceShape::ExceptionBase => self.apply_reference(op),
            SentenceShape::Array { element_sort, .. } => self.apply_array(op, element_sort),
            SentenceShape::Composite { .. } => self.apply_composite(op),
        }
    }

    fn unsupported(&self, op: &Operation) -> UnsupportedOperation {
        UnsupportedOperation::new(op.name(), self.name.clone())
    }

    fn apply_bool(&self, op: &Operation) -> Result<String, UnsupportedOperation> {
        match *op {
            Operation::Equal(a, b) => Ok(equal(a, b)),
            Operation::NotEqual(a, b) => Ok(not(equal(a, b))),
            Operation::IsTrue(a) => Ok(a.to_string()),
            Operation::IsFalse(a) | Operation::Not(a) => Ok(not(a.to_string())),
            Operation::Compare(c @ (Comparison::Eq | Comparison::Ne), a, b) => Ok(comparison(c, a, b)),
            Operation::HoldsLiteral {
                value,
                literal: Literal::Bool(b),
            } => Ok(equal(value, if *b { "true" } else { "false" })),
            Operation::Convert { value, to } => match to {
                TypeRef::Bool => Ok(value.to_string()),
                TypeRef::Int32 => Ok(format!("(ite {} 1 0)", value)),
                TypeRef::Float64 => Ok(format!("(ite {} 1.0 0.0)", value)),
                _ => Err(self.unsupported(op)),
            },
            _ => Err(self.unsupported(op)),
        }
    }

    fn apply_numeric(&self, op: &Operation, integral: bool) -> Result<String, UnsupportedOperation> {
        let zero = if integral { "0" } else { "0.0" };
        match *op {
            Operation::Equal(a, b) => Ok(equal(a, b)),
            Operation::NotEqual(a, b) => Ok(not(equal(a, b))),
            Operation::Compare(c, a, b) => Ok(comparison(c, a, b)),
            Operation::Arithmetic(o, a, b) => Ok(arithmetic(o, a, b)),
            Operation::IsTrue(a) => Ok(not(equal(a, zero))),
            Operation::IsFalse(a) => Ok(equal(a, zero)),
            Operation::HoldsLiteral { value, literal } => match (literal, integral) {
                (Literal::Int(i), true) => Ok(equal(value, &int_literal(*i as i64))),
                (Literal::Int(i), false) => Ok(equal(value, &real_literal(*i as f64))),
                // NaN and the infinities have no Real literal
                (Literal::Float(f), false) if f.is_finite() => Ok(equal(value, &real_literal(*f))),
                _ => Err(self.unsupported(op)),
            },
            Operation::Convert { value, to } => match (to, integral) {
                (TypeRef::Bool, _) => Ok(format!("(ite (= {} {}) false true)", value, zero)),
                (TypeRef::Int32, true) | (TypeRef::Float64, false) => Ok(value.to_string()),
                (TypeRef::Float64, true) => Ok(format!("(to_real {})", value)),
                (TypeRef::Int32, false) => Ok(format!("(to_int {})", value)),
                _ => Err(self.unsupported(op)),
            },
            _ => Err(self.unsupported(op)),
        }
    }

    /// Operations shared by every reference-shaped sentence
    fn apply_reference(&self, op: &Operation) -> Result<String, UnsupportedOperation> {
        let null = match self.null_value() {
            Some(null) => null,
            None => return Err(self.unsupported(op)),
        };
        let value_type = matches!(
            self.shape,
            SentenceShape::Composite {
                is_value_type: true,
                ..
            }
        );
        let ptr = self.pointer_accessor();
        let ty = self.type_accessor();
        match *op {
            Operation::Equal(a, b) | Operation::Compare(Comparison::Eq, a, b) => Ok(equal(a, b)),
            Operation::NotEqual(a, b) | Operation::Compare(Comparison::Ne, a, b) => Ok(not(equal(a, b))),
            Operation::IsNull(a) | Operation::IsFalse(a) if !value_type => Ok(equal(a, &null)),
            Operation::IsNotNull(a) | Operation::IsTrue(a) if !value_type => Ok(not(equal(a, &null))),
            Operation::HoldsLiteral {
                value,
                literal: Literal::Null,
            } if !value_type => Ok(equal(value, &null)),
            Operation::TypeOf(a) => Ok(format!("({} {})", ty, a)),
            Operation::InstanceOf { value, tag } => Ok(format!(
                "(and (not (= {0} {1})) (subtype ({2} {0}) {3}))",
                value, null, ty, tag
            )),
            Operation::HasExactType { value, tag } => Ok(equal(&format!("({} {})", ty, value), tag)),
            Operation::Allocated(a) => Ok(format!(
                "(and (not (= {0} {1})) (= ({2} {0}) {3}))",
                a,
                null,
                ty,
                self.tag()
            )),
            Operation::HasPointer { value, pointer } => Ok(equal(&format!("({} {})", ptr, value), &pointer.to_string())),
            Operation::Convert {
                value,
                to: TypeRef::Object,
            } => Ok(format!(
                "(ite (= {0} {1}) Object_null (Object_ctor ({2} {0}) ({3} {0})))",
                value, null, ptr, ty
            )),
            Operation::Convert { value, to } if to == &self.ty => Ok(value.to_string()),
            _ => Err(self.unsupported(op)),
        }
    }

    fn apply_array(&self, op: &Operation, element_sort: &str) -> Result<String, UnsupportedOperation> {
        let contents = |array: &str| format!("((as {}_value (Seq {})) {})", SEQ_ARRAY, element_sort, array);
        match *op {
            Operation::Length(a) => Ok(format!("(seq.len {})", contents(a))),
            Operation::ElementAt { array, index } => Ok(format!("(seq.nth {} {})", contents(array), index)),
            Operation::StoreElement { array, index, value } => Ok(format!(
                "({0}_ctor ({0}_ptr {1}) ({0}_type {1}) (seq.update {2} {3} (seq.unit {4})))",
                SEQ_ARRAY,
                array,
                contents(array),
                index,
                value
            )),
            Operation::BelowLowerBound { index, .. } => Ok(format!("(< {} 0)", index)),
            Operation::AboveUpperBound { array, index } => {
                Ok(format!("(>= {} (seq.len {}))", index, contents(array)))
            }
            Operation::InRange { array, index } => Ok(format!(
                "(and (<= 0 {0}) (< {0} (seq.len {1})))",
                index,
                contents(array)
            )),
            _ => self.apply_reference(op),
        }
    }

    fn apply_composite(&self, op: &Operation) -> Result<String, UnsupportedOperation> {
        let SentenceShape::Composite { fields, .. } = &self.shape else {
            return Err(self.unsupported(op));
        };
        match *op {
            Operation::LoadField { object, field } => fields
                .iter()
                .find(|f| f.field == field)
                .map(|f| format!("({} {})", f.accessor.name, object))
                .ok_or_else(|| UnsupportedOperation::new(format!("load-field {}", field), self.name.clone())),
            Operation::StoreField { object, field, value } => {
                if !fields.iter().any(|f| f.field == field) {
                    return Err(UnsupportedOperation::new(
                        format!("store-field {}", field),
                        self.name.clone(),
                    ));
                }
                let mut parts = vec![
                    format!("({} {})", self.pointer_accessor(), object),
                    format!("({} {})", self.type_accessor(), object),
                ];
                for f in fields {
                    if f.field == field {
                        parts.push(value.to_string());
                    } else {
                        parts.push(format!("({} {})", f.accessor.name, object));
                    }
                }
                Ok(format!("({}_ctor {})", self.name, parts.join(" ")))
            }
            _ => self.apply_reference(op),
        }
    }
}
