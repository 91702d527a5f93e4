// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Constant-name indirection table.
//!
//! Maps the names of declared constants to the values a solver model assigned them, read
//! back through the sentences that encoded their types, and reflects those values into an
//! external object model.

use crate::error::ConstantError;
use crate::prelude::SEQ_ARRAY;
use crate::sentence::{SentenceShape, TypeSentence};
use crate::sexpr::SExpr;
use log::debug;
use method_graph::TypeRef;
use std::collections::BTreeMap;

/// A model value read back through its sentence
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
    Bool(bool),
    Int(i64),
    Real(f64),
    /// Raw string payload of a `Str` record
    Text(String),
    Null(TypeRef),
    Record {
        ty: TypeRef,
        /// Dynamic type read from the tag, or `ty` when the tag is unknown
        runtime_type: TypeRef,
        pointer: i64,
        fields: Vec<(String, ConstantValue)>,
    },
    Array {
        ty: TypeRef,
        pointer: i64,
        elements: Vec<ConstantValue>,
    },
}

/// External runtime-object model that concrete values are materialized into
pub trait ObjectModel {
    type Object;
    type Sequence;

    fn materialize(&mut self, ty: &TypeRef, fields: Vec<Reflected<Self>>) -> Self::Object;
    fn empty_sequence(&mut self, element: &TypeRef) -> Self::Sequence;
    fn unit_sequence(&mut self, element: &TypeRef, value: Reflected<Self>) -> Self::Sequence;
    fn append(&mut self, left: Self::Sequence, right: Self::Sequence) -> Self::Sequence;
}

/// A value in the external representation
pub enum Reflected<M: ObjectModel + ?Sized> {
    Bool(bool),
    Int(i64),
    Real(f64),
    Text(String),
    Null,
    Object(M::Object),
    Sequence(M::Sequence),
}

#[derive(Debug, Clone, Default)]
pub struct ConstantTable {
    sentences: BTreeMap<TypeRef, TypeSentence>,
    tags: BTreeMap<String, TypeRef>,
    declared: BTreeMap<String, TypeRef>,
    values: BTreeMap<String, ConstantValue>,
}

impl ConstantTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, sentence: TypeSentence) {
        self.tags.insert(sentence.tag(), sentence.ty().clone());
        self.sentences.insert(sentence.ty().clone(), sentence);
    }

    pub fn declare(&mut self, name: &str, ty: TypeRef) {
        self.declared.insert(name.to_string(), ty);
    }

    pub fn value(&self, name: &str) -> Option<&ConstantValue> {
        self.values.get(name)
    }

    /// Read the model text assigned to a declared constant
    pub fn bind(&mut self, name: &str, text: &str) -> Result<&ConstantValue, ConstantError> {
        let ty = self
            .declared
            .get(name)
            .cloned()
            .ok_or_else(|| ConstantError::UndeclaredConstant(name.to_string()))?;
        let expr = SExpr::parse(text)?;
        let value = self.read_value(&ty, &expr)?;
        debug!("bound constant {} of type {}", name, ty);
        self.values.insert(name.to_string(), value);
        Ok(&self.values[name])
    }

    fn mismatch(ty: &TypeRef, expr: &SExpr) -> ConstantError {
        ConstantError::ShapeMismatch {
            ty: ty.clone(),
            text: expr.to_string(),
        }
    }

    fn read_int(ty: &TypeRef, expr: &SExpr) -> Result<i64, ConstantError> {
        match expr {
            SExpr::Atom(a) => a.parse().map_err(|_| Self::mismatch(ty, expr)),
            SExpr::List(items) if items.len() == 2 && items[0].atom() == Some("-") => {
                let negated = match &items[1] {
                    // i64::MIN only has a positive magnitude in i128
                    SExpr::Atom(a) => a.parse::<i128>().ok().and_then(|v| i64::try_from(-v).ok()),
                    inner => Self::read_int(ty, inner)?.checked_neg(),
                };
                negated.ok_or_else(|| Self::mismatch(ty, expr))
            }
            _ => Err(Self::mismatch(ty, expr)),
        }
    }

    fn read_real(ty: &TypeRef, expr: &SExpr) -> Result<f64, ConstantError> {
        match expr {
            SExpr::Atom(a) => a.parse().map_err(|_| Self::mismatch(ty, expr)),
            SExpr::List(items) if items.len() == 2 && items[0].atom() == Some("-") => {
                Ok(-Self::read_real(ty, &items[1])?)
            }
            SExpr::List(items) if items.len() == 3 && items[0].atom() == Some("/") => {
                Ok(Self::read_real(ty, &items[1])? / Self::read_real(ty, &items[2])?)
            }
            _ => Err(Self::mismatch(ty, expr)),
        }
    }

    fn read_value(&self, ty: &TypeRef, expr: &SExpr) -> Result<ConstantValue, ConstantError> {
        match ty {
            TypeRef::Bool => match expr.atom() {
                Some("true") => Ok(ConstantValue::Bool(true)),
                Some("false") => Ok(ConstantValue::Bool(false)),
                _ => Err(Self::mismatch(ty, expr)),
            },
            TypeRef::Int32 => Ok(ConstantValue::Int(Self::read_int(ty, expr)?)),
            TypeRef::Float64 => Ok(ConstantValue::Real(Self::read_real(ty, expr)?)),
            TypeRef::Array(element) => self.read_array(ty, element, expr),
            TypeRef::Void => Err(Self::mismatch(ty, expr)),
            _ => self.read_record(ty, expr),
        }
    }

    fn read_array(&self, ty: &TypeRef, element: &TypeRef, expr: &SExpr) -> Result<ConstantValue, ConstantError> {
        let items = expr.list().ok_or_else(|| Self::mismatch(ty, expr))?;
        let null_name = format!("{}_null", SEQ_ARRAY);
        if expr.head() == Some("as") && items.get(1).and_then(|i| i.atom()) == Some(null_name.as_str()) {
            return Ok(ConstantValue::Null(ty.clone()));
        }
        if expr.head() != Some(format!("{}_ctor", SEQ_ARRAY).as_str()) || items.len() != 4 {
            return Err(Self::mismatch(ty, expr));
        }
        Ok(ConstantValue::Array {
            ty: ty.clone(),
            pointer: Self::read_int(ty, &items[1])?,
            elements: self.read_sequence(element, &items[3])?,
        })
    }

    fn read_sequence(&self, element: &TypeRef, expr: &SExpr) -> Result<Vec<ConstantValue>, ConstantError> {
        let items = expr.list().ok_or_else(|| Self::mismatch(element, expr))?;
        match expr.head() {
            Some("as") if items.get(1).and_then(|i| i.atom()) == Some("seq.empty") => Ok(vec![]),
            Some("seq.unit") if items.len() == 2 => Ok(vec![self.read_value(element, &items[1])?]),
            Some("seq.++") => {
                let mut elements = Vec::new();
                for part in &items[1..] {
                    elements.extend(self.read_sequence(element, part)?);
                }
                Ok(elements)
            }
            _ => Err(Self::mismatch(element, expr)),
        }
    }

    fn read_record(&self, ty: &TypeRef, expr: &SExpr) -> Result<ConstantValue, ConstantError> {
        let sentence = self
            .sentences
            .get(ty)
            .ok_or_else(|| ConstantError::UnregisteredType(ty.clone()))?;
        if expr.atom().is_some() && expr.atom() == sentence.null_value().as_deref() {
            return Ok(ConstantValue::Null(ty.clone()));
        }
        let ctor = sentence.constructor().ok_or_else(|| Self::mismatch(ty, expr))?;
        let items = expr.list().ok_or_else(|| Self::mismatch(ty, expr))?;
        if expr.head() != Some(ctor.name.as_str()) || items.len() != ctor.accessors.len() + 1 {
            return Err(Self::mismatch(ty, expr));
        }
        let pointer = Self::read_int(ty, &items[1])?;
        let runtime_type = items[2]
            .atom()
            .and_then(|tag| self.tags.get(tag))
            .cloned()
            .unwrap_or_else(|| ty.clone());
        let rest = &items[3..];
        let fields = match sentence.shape() {
            SentenceShape::Str => match &rest[0] {
                SExpr::Str(text) => vec![("value".to_string(), ConstantValue::Text(text.clone()))],
                other => return Err(Self::mismatch(ty, other)),
            },
            SentenceShape::Composite { fields, .. } => fields
                .iter()
                .zip(rest)
                .map(|(f, e)| Ok((f.field.clone(), self.read_value(&f.ty, e)?)))
                .collect::<Result<Vec<_>, ConstantError>>()?,
            _ => vec![],
        };
        Ok(ConstantValue::Record {
            ty: ty.clone(),
            runtime_type,
            pointer,
            fields,
        })
    }

    /// Rebuild a bound constant inside an external object model
    pub fn reflect<M: ObjectModel>(&self, name: &str, model: &mut M) -> Result<Reflected<M>, ConstantError> {
        let value = self
            .values
            .get(name)
            .ok_or_else(|| ConstantError::UnboundConstant(name.to_string()))?;
        Ok(Self::reflect_value(value, model))
    }

    fn reflect_value<M: ObjectModel>(value: &ConstantValue, model: &mut M) -> Reflected<M> {
        match value {
            ConstantValue::Bool(b) => Reflected::Bool(*b),
            ConstantValue::Int(i) => Reflected::Int(*i),
            ConstantValue::Real(r) => Reflected::Real(*r),
            ConstantValue::Text(t) => Reflected::Text(t.clone()),
            ConstantValue::Null(_) => Reflected::Null,
            ConstantValue::Record {
                ty,
                runtime_type,
                fields,
                ..
            } => {
                if ty == &TypeRef::String {
                    if let Some((_, ConstantValue::Text(text))) = fields.first() {
                        return Reflected::Text(text.clone());
                    }
                }
                let fields = fields
                    .iter()
                    .map(|(_, v)| Self::reflect_value(v, model))
                    .collect();
                Reflected::Object(model.materialize(runtime_type, fields))
            }
            ConstantValue::Array { ty, elements, .. } => {
                let element = ty.element().cloned().unwrap_or(TypeRef::Object);
                let mut sequence = model.empty_sequence(&element);
                for e in elements {
                    let reflected = Self::reflect_value(e, model);
                    let unit = model.unit_sequence(&element, reflected);
                    sequence = model.append(sequence, unit);
                }
                Reflected::Sequence(sequence)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::SentenceFactory;
    use method_graph::{ProgramSource, TypeDef};

    /// Renders reflected values as text so tests can compare them
    struct TextModel;

    fn show(value: Reflected<TextModel>) -> String {
        match value {
            Reflected::Bool(b) => b.to_string(),
            Reflected::Int(i) => i.to_string(),
            Reflected::Real(r) => r.to_string(),
            Reflected::Text(t) => format!("{:?}", t),
            Reflected::Null => "null".to_string(),
            Reflected::Object(o) | Reflected::Sequence(o) => o,
        }
    }

    impl ObjectModel for TextModel {
        type Object = String;
        type Sequence = String;

        fn materialize(&mut self, ty: &TypeRef, fields: Vec<Reflected<Self>>) -> String {
            let fields: Vec<String> = fields.into_iter().map(show).collect();
            format!("{}{{{}}}", ty, fields.join(", "))
        }

        fn empty_sequence(&mut self, _element: &TypeRef) -> String {
            "[]".to_string()
        }

        fn unit_sequence(&mut self, _element: &TypeRef, value: Reflected<Self>) -> String {
            format!("[{}]", show(value))
        }

        fn append(&mut self, left: String, right: String) -> String {
            format!("{}++{}", left, right)
        }
    }

    fn table() -> (ConstantTable, TypeRef) {
        let point = TypeRef::named("Geo", "Point");
        let mut source = ProgramSource::new();
        source.add_type(
            TypeDef::new(point.clone())
                .with_field("x", TypeRef::Int32)
                .with_field("tags", TypeRef::array_of(TypeRef::Int32)),
        );
        let factory = SentenceFactory::default();
        let mut table = ConstantTable::new();
        table.register(factory.encode(&point, &source).unwrap());
        table.register(factory.encode(&TypeRef::String, &source).unwrap());
        (table, point)
    }

    #[test]
    fn binds_and_reflects_records() {
        let (mut table, point) = table();
        table.declare("p", point);
        table
            .bind(
                "p",
                "(Geo.Point_ctor 3 Geo.Point_tag (- 4) (SeqArray_ctor 5 Int_Array_tag (seq.++ (seq.unit 1) (seq.unit 2))))",
            )
            .unwrap();
        let reflected = table.reflect("p", &mut TextModel).unwrap();
        assert_eq!(show(reflected), "Geo.Point{-4, []++[1]++[2]}");
    }

    #[test]
    fn reads_null_and_strings() {
        let (mut table, point) = table();
        table.declare("q", point.clone());
        table.declare("s", TypeRef::String);
        assert_eq!(table.bind("q", "Geo.Point_null").unwrap(), &ConstantValue::Null(point));
        table.bind("s", "(Str_ctor 9 Str_tag \"hi\")").unwrap();
        assert_eq!(show(table.reflect("s", &mut TextModel).unwrap()), "\"hi\"");
    }

    #[test]
    fn rejects_undeclared_and_malformed_values() {
        let (mut table, point) = table();
        assert_eq!(
            table.bind("nope", "1").unwrap_err(),
            ConstantError::UndeclaredConstant("nope".to_string())
        );
        table.declare("p", point);
        assert!(matches!(
            table.bind("p", "(Other_ctor 1 t)").unwrap_err(),
            ConstantError::ShapeMismatch { .. }
        ));
        assert!(matches!(
            table.reflect("p", &mut TextModel),
            Err(ConstantError::UnboundConstant(_))
        ));
    }

    #[test]
    fn integers_at_the_edge_of_the_range() {
        let mut table = ConstantTable::new();
        table.declare("n", TypeRef::Int32);
        assert_eq!(
            table.bind("n", "(- 9223372036854775808)").unwrap(),
            &ConstantValue::Int(i64::MIN)
        );
        for text in ["(- -9223372036854775808)", "(- (- -9223372036854775808))", "(- 9223372036854775809)"] {
            assert!(matches!(
                table.bind("n", text).unwrap_err(),
                ConstantError::ShapeMismatch { .. }
            ));
        }
    }
}
