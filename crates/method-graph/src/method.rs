// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

use crate::types::{sanitize_name, TypeRef};
use std::fmt::{self, Display, Formatter};

/// Reference to a method. Equality is method identity (declaring type, name and signature).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MethodRef {
    pub declaring: TypeRef,
    pub name: String,
    pub parameters: Vec<TypeRef>,
    pub return_type: TypeRef,
    pub is_static: bool,
    pub is_virtual: bool,
    pub is_abstract: bool,
}

impl MethodRef {
    /// A static method
    pub fn new_static(declaring: TypeRef, name: &str, parameters: Vec<TypeRef>, return_type: TypeRef) -> Self {
        Self {
            declaring,
            name: name.to_string(),
            parameters,
            return_type,
            is_static: true,
            is_virtual: false,
            is_abstract: false,
        }
    }

    /// An instance method; the receiver is not part of `parameters`
    pub fn new_instance(declaring: TypeRef, name: &str, parameters: Vec<TypeRef>, return_type: TypeRef) -> Self {
        Self {
            is_static: false,
            ..Self::new_static(declaring, name, parameters, return_type)
        }
    }

    pub fn with_virtual(mut self) -> Self {
        self.is_virtual = true;
        self
    }

    pub fn with_abstract(mut self) -> Self {
        self.is_virtual = true;
        self.is_abstract = true;
        self
    }

    /// Types of all parameter slots, receiver first for instance methods
    pub fn parameter_slots(&self) -> Vec<TypeRef> {
        let mut slots = Vec::with_capacity(self.parameters.len() + 1);
        if !self.is_static {
            slots.push(self.declaring.clone());
        }
        slots.extend(self.parameters.iter().cloned());
        slots
    }

    pub fn returns_value(&self) -> bool {
        !self.return_type.is_void()
    }

    /// Constraint-language symbol of this method. Overloads are told apart by their
    /// parameter types.
    pub fn symbol(&self) -> String {
        let mut symbol = format!("{}.{}", self.declaring, self.name);
        for param in &self.parameters {
            symbol.push('_');
            symbol.push_str(&param.to_string());
        }
        sanitize_name(&symbol)
    }
}

impl Display for MethodRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self.parameters.iter().map(|p| p.to_string()).collect();
        write!(
            f,
            "{}::{}({}) -> {}",
            self.declaring,
            self.name,
            params.join(", "),
            self.return_type
        )
    }
}
