// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Name generation for sorts, constructors and accessors

use method_graph::{sanitize_name, TypeRef};
use std::fmt::{self, Display, Formatter};

use crate::prelude::SEQ_ARRAY;

/// Symbol naming the sentence of `ty`; arrays are named after their element.
pub fn type_symbol(ty: &TypeRef) -> String {
    match ty {
        TypeRef::Bool => "Bool".to_string(),
        TypeRef::Int32 => "Int".to_string(),
        TypeRef::Float64 => "Real".to_string(),
        TypeRef::String => "Str".to_string(),
        TypeRef::Object => "Object".to_string(),
        TypeRef::Void => "Void".to_string(),
        TypeRef::Array(element) => format!("{}_Array", type_symbol(element)),
        TypeRef::Named { .. } => sanitize_name(&ty.to_string()),
    }
}

/// Sort expression of `ty` with array aliases expanded
pub fn expanded_sort(ty: &TypeRef) -> String {
    match ty {
        TypeRef::Array(element) => format!("({} {})", SEQ_ARRAY, expanded_sort(element)),
        _ => type_symbol(ty),
    }
}

/// A sort as used in declarations (`name`) and inside other datatypes (`expanded`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSymbol {
    pub name: String,
    pub expanded: String,
}

impl SortSymbol {
    pub fn of(ty: &TypeRef) -> Self {
        Self {
            name: type_symbol(ty),
            expanded: expanded_sort(ty),
        }
    }
}

impl Display for SortSymbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessorSymbol {
    pub name: String,
    pub sort: String,
}

impl AccessorSymbol {
    pub fn new(owner: &str, suffix: &str, sort: impl Into<String>) -> Self {
        Self {
            name: format!("{}_{}", owner, sanitize_name(suffix)),
            sort: sort.into(),
        }
    }
}

impl Display for AccessorSymbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "({} {})", self.name, self.sort)
    }
}

/// A constructor and its accessors; the null constructor has none
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructorSymbol {
    pub name: String,
    pub accessors: Vec<AccessorSymbol>,
}

impl ConstructorSymbol {
    pub fn nullary(name: String) -> Self {
        Self {
            name,
            accessors: vec![],
        }
    }

    /// Constructor with the fixed leading pointer and type accessors
    pub fn with_identity(owner: &str, rest: Vec<AccessorSymbol>) -> Self {
        let mut accessors = vec![
            AccessorSymbol::new(owner, "ptr", "Int"),
            AccessorSymbol::new(owner, "type", crate::prelude::TYPE_SORT),
        ];
        accessors.extend(rest);
        Self {
            name: format!("{}_ctor", owner),
            accessors,
        }
    }
}

impl Display for ConstructorSymbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.accessors.is_empty() {
            return write!(f, "{}", self.name);
        }
        write!(f, "({}", self.name)?;
        for accessor in &self.accessors {
            write!(f, " {}", accessor)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrays_expand_to_seq_array() {
        let ty = TypeRef::array_of(TypeRef::array_of(TypeRef::Int32));
        assert_eq!(type_symbol(&ty), "Int_Array_Array");
        assert_eq!(expanded_sort(&ty), "(SeqArray (SeqArray Int))");
    }

    #[test]
    fn identity_constructor_leads_with_pointer_and_type() {
        let ctor = ConstructorSymbol::with_identity("Demo.Node", vec![AccessorSymbol::new("Demo.Node", "next", "Demo.Node")]);
        assert_eq!(
            ctor.to_string(),
            "(Demo.Node_ctor (Demo.Node_ptr Int) (Demo.Node_type Type) (Demo.Node_next Demo.Node))"
        );
    }
}
