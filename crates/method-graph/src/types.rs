// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Type references and type definitions as delivered by the front-end

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

/// Reference to a source type. Equality is type identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TypeRef {
    Bool,
    Int32,
    Float64,
    String,
    Object,
    Void,
    /// Single-dimension array
    Array(Box<TypeRef>),
    /// User-defined value or reference type
    Named {
        namespace: String,
        name: String,
        generics: Vec<TypeRef>,
    },
}

impl TypeRef {
    pub fn named(namespace: &str, name: &str) -> Self {
        TypeRef::Named {
            namespace: namespace.to_string(),
            name: name.to_string(),
            generics: vec![],
        }
    }

    pub fn array_of(element: TypeRef) -> Self {
        TypeRef::Array(Box::new(element))
    }

    pub fn element(&self) -> Option<&TypeRef> {
        match self {
            TypeRef::Array(element) => Some(element),
            _ => None,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, TypeRef::Void)
    }

    /// Full dotted name, e.g. `System.Collections.List<Int32>`
    pub fn full_name(&self) -> String {
        self.to_string()
    }
}

impl Display for TypeRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Bool => write!(f, "Bool"),
            TypeRef::Int32 => write!(f, "Int32"),
            TypeRef::Float64 => write!(f, "Float64"),
            TypeRef::String => write!(f, "String"),
            TypeRef::Object => write!(f, "Object"),
            TypeRef::Void => write!(f, "Void"),
            TypeRef::Array(element) => write!(f, "{}[]", element),
            TypeRef::Named {
                namespace,
                name,
                generics,
            } => {
                if namespace.is_empty() {
                    write!(f, "{}", name)?;
                } else {
                    write!(f, "{}.{}", namespace, name)?;
                }
                if !generics.is_empty() {
                    let args: Vec<String> = generics.iter().map(|g| g.to_string()).collect();
                    write!(f, "<{}>", args.join(","))?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot parse type reference '{0}'")]
pub struct TypeParseError(pub String);

impl FromStr for TypeRef {
    type Err = TypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TypeParseError(s.to_string()));
        }
        if let Some(element) = s.strip_suffix("[]") {
            return Ok(TypeRef::array_of(element.parse()?));
        }
        match s {
            "Bool" => return Ok(TypeRef::Bool),
            "Int32" => return Ok(TypeRef::Int32),
            "Float64" => return Ok(TypeRef::Float64),
            "String" => return Ok(TypeRef::String),
            "Object" => return Ok(TypeRef::Object),
            "Void" => return Ok(TypeRef::Void),
            _ => {}
        }

        let (path, generics) = match s.find('<') {
            Some(open) => {
                let inner = s[open + 1..]
                    .strip_suffix('>')
                    .ok_or_else(|| TypeParseError(s.to_string()))?;
                let generics = split_generic_arguments(inner)
                    .into_iter()
                    .map(|arg| arg.parse())
                    .collect::<Result<Vec<TypeRef>, _>>()?;
                (&s[..open], generics)
            }
            None => (s, vec![]),
        };
        if path.is_empty() || path.contains(|c: char| c == '>' || c.is_whitespace()) {
            return Err(TypeParseError(s.to_string()));
        }
        let (namespace, name) = match path.rfind('.') {
            Some(dot) => (&path[..dot], &path[dot + 1..]),
            None => ("", path),
        };
        if name.is_empty() {
            return Err(TypeParseError(s.to_string()));
        }
        Ok(TypeRef::Named {
            namespace: namespace.to_string(),
            name: name.to_string(),
            generics,
        })
    }
}

/// Split `A,B<C,D>,E` at top-level commas only
fn split_generic_arguments(inner: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in inner.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&inner[start..]);
    parts
}

impl TryFrom<String> for TypeRef {
    type Error = TypeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TypeRef> for String {
    fn from(value: TypeRef) -> Self {
        value.to_string()
    }
}

/// Sanitize a source name for use as a constraint-language symbol
pub fn sanitize_name(name: &str) -> String {
    name.replace("[]", "_Array")
        .replace('<', "_Of_")
        .replace(',', "_")
        .replace('>', "")
        .replace("::", ".")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '.')
        .collect()
}

/// Reference to a field of a user-defined type
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldRef {
    pub owner: TypeRef,
    pub name: String,
}

impl FieldRef {
    pub fn new(owner: TypeRef, name: &str) -> Self {
        Self {
            owner,
            name: name.to_string(),
        }
    }
}

impl Display for FieldRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.owner, self.name)
    }
}

/// A field declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub ty: TypeRef,
    pub is_static: bool,
}

/// A user-defined type as described by the front-end
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDef {
    pub ty: TypeRef,
    pub base: Option<TypeRef>,
    pub fields: Vec<FieldDef>,
    pub is_value_type: bool,
}

impl TypeDef {
    pub fn new(ty: TypeRef) -> Self {
        Self {
            ty,
            base: None,
            fields: vec![],
            is_value_type: false,
        }
    }

    pub fn with_base(mut self, base: TypeRef) -> Self {
        self.base = Some(base);
        self
    }

    pub fn with_field(mut self, name: &str, ty: TypeRef) -> Self {
        self.fields.push(FieldDef {
            name: name.to_string(),
            ty,
            is_static: false,
        });
        self
    }

    pub fn with_static_field(mut self, name: &str, ty: TypeRef) -> Self {
        self.fields.push(FieldDef {
            name: name.to_string(),
            ty,
            is_static: true,
        });
        self
    }

    pub fn value_type(mut self) -> Self {
        self.is_value_type = true;
        self
    }

    /// Instance fields in declaration order
    pub fn instance_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| !f.is_static)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }
}
