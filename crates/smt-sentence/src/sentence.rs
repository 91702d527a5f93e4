// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Type sentences: one datatype encoding per source type

use crate::prelude::{SEQ_ARRAY, TYPE_SORT};
use crate::symbols::{type_symbol, AccessorSymbol, ConstructorSymbol, SortSymbol};
use itertools::Itertools;
use method_graph::TypeRef;

/// A field of a composite sentence with its accessor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldAccessor {
    pub field: String,
    pub ty: TypeRef,
    pub accessor: AccessorSymbol,
}

/// The closed set of value shapes a sentence can encode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentenceShape {
    Bool,
    Int,
    Real,
    /// Reference to an immutable string value
    Str,
    /// Field-less reference
    Object,
    /// Alias over the shared sequence-array datatype
    Array { element: TypeRef, element_sort: String },
    /// User-defined type with one accessor per instance field
    Composite { fields: Vec<FieldAccessor>, is_value_type: bool },
    /// The designated exception base: identity only, no field expansion
    ExceptionBase,
}

/// Constraint-language encoding of one source type. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSentence {
    pub(crate) ty: TypeRef,
    pub(crate) generics: Vec<String>,
    pub(crate) name: String,
    pub(crate) null_constructor: Option<ConstructorSymbol>,
    pub(crate) constructor: Option<ConstructorSymbol>,
    pub(crate) sort: SortSymbol,
    pub(crate) base: Option<TypeRef>,
    pub(crate) dependencies: Vec<TypeRef>,
    pub(crate) shape: SentenceShape,
}

impl TypeSentence {
    pub(crate) fn builtin(ty: TypeRef, shape: SentenceShape) -> Self {
        Self {
            name: type_symbol(&ty),
            sort: SortSymbol::of(&ty),
            generics: vec![],
            null_constructor: None,
            constructor: None,
            base: None,
            dependencies: vec![],
            ty,
            shape,
        }
    }

    /// Sentence of a reference-shaped datatype with the given extra accessors
    pub(crate) fn reference(
        ty: TypeRef,
        shape: SentenceShape,
        extra: Vec<AccessorSymbol>,
        base: Option<TypeRef>,
        dependencies: Vec<TypeRef>,
    ) -> Self {
        let name = type_symbol(&ty);
        let mut dependencies: Vec<TypeRef> = dependencies.into_iter().filter(|d| d != &ty).unique().collect();
        if let Some(base) = &base {
            if !dependencies.contains(base) {
                dependencies.push(base.clone());
            }
        }
        Self {
            null_constructor: Some(ConstructorSymbol::nullary(format!("{}_null", name))),
            constructor: Some(ConstructorSymbol::with_identity(&name, extra)),
            sort: SortSymbol::of(&ty),
            generics: vec![],
            name,
            base,
            dependencies,
            ty,
            shape,
        }
    }

    pub fn ty(&self) -> &TypeRef {
        &self.ty
    }

    pub fn generics(&self) -> &[String] {
        &self.generics
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sort(&self) -> &SortSymbol {
        &self.sort
    }

    pub fn shape(&self) -> &SentenceShape {
        &self.shape
    }

    pub fn base(&self) -> Option<&TypeRef> {
        self.base.as_ref()
    }

    /// Types whose sentences this one depends on. Never contains the type itself.
    pub fn dependencies(&self) -> &[TypeRef] {
        &self.dependencies
    }

    /// Accessor of the named field for composite sentences
    pub fn field(&self, name: &str) -> Option<&FieldAccessor> {
        match &self.shape {
            SentenceShape::Composite { fields, .. } => fields.iter().find(|f| f.field == name),
            _ => None,
        }
    }

    pub fn null_constructor(&self) -> Option<&ConstructorSymbol> {
        self.null_constructor.as_ref()
    }

    pub fn constructor(&self) -> Option<&ConstructorSymbol> {
        self.constructor.as_ref()
    }

    pub fn is_reference(&self) -> bool {
        !matches!(
            self.shape,
            SentenceShape::Bool | SentenceShape::Int | SentenceShape::Real
        )
    }

    /// Types referenced from the declaration text itself (field sorts and array elements)
    pub fn encoding_references(&self) -> Vec<TypeRef> {
        match &self.shape {
            SentenceShape::Array { element, .. } => vec![element.clone()],
            SentenceShape::Composite { fields, .. } => fields
                .iter()
                .map(|f| innermost_element(&f.ty).clone())
                .filter(|t| t != &self.ty)
                .unique()
                .collect(),
            _ => vec![],
        }
    }

    /// Symbol of this type's runtime tag constant
    pub fn tag(&self) -> String {
        format!("{}_tag", self.name)
    }

    /// `(<name> <null-ctor> <ctor>)` for datatype-backed sentences
    pub fn datatype_body(&self) -> Option<String> {
        match (&self.null_constructor, &self.constructor, &self.shape) {
            (_, _, SentenceShape::Array { .. }) => None,
            (Some(null), Some(ctor), _) => Some(format!("({} {} {})", self.name, null, ctor)),
            _ => None,
        }
    }

    /// Declarations introducing the datatype itself
    pub fn datatype_declaration(&self) -> Option<String> {
        match &self.shape {
            SentenceShape::Array { element_sort, .. } => Some(format!(
                "(define-sort {} () ({} {}))",
                self.name, SEQ_ARRAY, element_sort
            )),
            _ => self.datatype_body().map(|body| {
                format!(
                    "(declare-datatypes ({}) ({}))",
                    self.generics.join(" "),
                    body
                )
            }),
        }
    }

    /// Tag constant and subtype facts
    pub fn tag_declarations(&self) -> Vec<String> {
        if !self.is_reference() {
            return vec![];
        }
        let mut lines = vec![format!("(declare-const {} {})", self.tag(), TYPE_SORT)];
        if let Some(base) = &self.base {
            lines.push(format!(
                "(assert (subtype {} {}_tag))",
                self.tag(),
                type_symbol(base)
            ));
        }
        lines
    }

    /// Every line this sentence contributes to a problem, in order
    pub fn declarations(&self) -> Vec<String> {
        self.datatype_declaration()
            .into_iter()
            .chain(self.tag_declarations())
            .collect()
    }

    /// Expression of the null value of this sentence
    pub fn null_value(&self) -> Option<String> {
        match &self.shape {
            SentenceShape::Array { element_sort, .. } => Some(format!(
                "(as {0}_null ({0} {1}))",
                SEQ_ARRAY, element_sort
            )),
            _ => self.null_constructor.as_ref().map(|c| c.name.clone()),
        }
    }

    pub(crate) fn pointer_accessor(&self) -> String {
        match &self.shape {
            SentenceShape::Array { .. } => format!("{}_ptr", SEQ_ARRAY),
            _ => format!("{}_ptr", self.name),
        }
    }

    pub(crate) fn type_accessor(&self) -> String {
        match &self.shape {
            SentenceShape::Array { .. } => format!("{}_type", SEQ_ARRAY),
            _ => format!("{}_type", self.name),
        }
    }
}

fn innermost_element(ty: &TypeRef) -> &TypeRef {
    match ty {
        TypeRef::Array(element) => innermost_element(element),
        other => other,
    }
}
