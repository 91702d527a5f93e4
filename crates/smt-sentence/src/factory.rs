// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Construction of sentences from type references

use crate::error::SentenceError;
use crate::sentence::{FieldAccessor, SentenceShape, TypeSentence};
use crate::symbols::{expanded_sort, type_symbol, AccessorSymbol};
use log::debug;
use method_graph::{GraphSource, TypeRef};

/// Builds one sentence per type. Construction never recurses into dependencies; field
/// accessor sorts are derived from names alone, so mutually referencing types are safe to
/// encode in any order.
#[derive(Debug, Clone, Default)]
pub struct SentenceFactory {
    exception_base: Option<TypeRef>,
}

impl SentenceFactory {
    pub fn new(exception_base: Option<TypeRef>) -> Self {
        Self { exception_base }
    }

    pub fn exception_base(&self) -> Option<&TypeRef> {
        self.exception_base.as_ref()
    }

    pub fn encode(&self, ty: &TypeRef, source: &dyn GraphSource) -> Result<TypeSentence, SentenceError> {
        match ty {
            TypeRef::Bool => Ok(TypeSentence::builtin(ty.clone(), SentenceShape::Bool)),
            TypeRef::Int32 => Ok(TypeSentence::builtin(ty.clone(), SentenceShape::Int)),
            TypeRef::Float64 => Ok(TypeSentence::builtin(ty.clone(), SentenceShape::Real)),
            TypeRef::Void => Err(SentenceError::NotEncodable(ty.clone())),
            TypeRef::String => {
                let name = type_symbol(ty);
                Ok(TypeSentence::reference(
                    ty.clone(),
                    SentenceShape::Str,
                    vec![AccessorSymbol::new(&name, "value", "String")],
                    Some(TypeRef::Object),
                    vec![],
                ))
            }
            TypeRef::Object => Ok(TypeSentence::reference(
                ty.clone(),
                SentenceShape::Object,
                vec![],
                None,
                vec![],
            )),
            TypeRef::Array(element) => {
                if element.is_void() {
                    return Err(SentenceError::NotEncodable(ty.clone()));
                }
                let mut sentence = TypeSentence::reference(
                    ty.clone(),
                    SentenceShape::Array {
                        element: element.as_ref().clone(),
                        element_sort: expanded_sort(element),
                    },
                    vec![],
                    Some(TypeRef::Object),
                    vec![element.as_ref().clone()],
                );
                sentence.null_constructor = None;
                sentence.constructor = None;
                Ok(sentence)
            }
            TypeRef::Named { .. } => self.encode_named(ty, source),
        }
    }

    fn encode_named(&self, ty: &TypeRef, source: &dyn GraphSource) -> Result<TypeSentence, SentenceError> {
        let def = source
            .type_def(ty)
            .ok_or_else(|| SentenceError::UnknownType(ty.clone()))?;

        if self.exception_base.as_ref() == Some(ty) {
            debug!("encoding {} as exception base", ty);
            return Ok(TypeSentence::reference(
                ty.clone(),
                SentenceShape::ExceptionBase,
                vec![],
                Some(def.base.clone().unwrap_or(TypeRef::Object)),
                vec![],
            ));
        }

        let name = type_symbol(ty);
        let mut fields = Vec::new();
        for field in def.instance_fields() {
            if field.ty.is_void() {
                return Err(SentenceError::NotEncodable(field.ty.clone()));
            }
            fields.push(FieldAccessor {
                field: field.name.clone(),
                ty: field.ty.clone(),
                accessor: AccessorSymbol::new(&name, &field.name, expanded_sort(&field.ty)),
            });
        }
        let accessors = fields.iter().map(|f| f.accessor.clone()).collect();
        let dependencies = fields.iter().map(|f| f.ty.clone()).collect();
        let base = match (&def.base, def.is_value_type) {
            (Some(base), _) => Some(base.clone()),
            (None, false) => Some(TypeRef::Object),
            (None, true) => None,
        };
        Ok(TypeSentence::reference(
            ty.clone(),
            SentenceShape::Composite {
                fields,
                is_value_type: def.is_value_type,
            },
            accessors,
            base,
            dependencies,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use method_graph::{ProgramSource, TypeDef};

    fn tree_source() -> (ProgramSource, TypeRef) {
        let node = TypeRef::named("Demo", "Node");
        let mut source = ProgramSource::new();
        source.add_type(
            TypeDef::new(node.clone())
                .with_field("value", TypeRef::Int32)
                .with_field("children", TypeRef::array_of(node.clone()))
                .with_field("parent", node.clone()),
        );
        (source, node)
    }

    #[test]
    fn self_referencing_type_lists_its_array_once() {
        let (source, node) = tree_source();
        let sentence = SentenceFactory::default().encode(&node, &source).unwrap();
        let array = TypeRef::array_of(node.clone());
        assert_eq!(sentence.dependencies().iter().filter(|d| **d == array).count(), 1);
        assert!(!sentence.dependencies().contains(&node));
        assert_eq!(
            sentence.datatype_declaration().unwrap(),
            "(declare-datatypes () ((Demo.Node Demo.Node_null (Demo.Node_ctor (Demo.Node_ptr Int) (Demo.Node_type Type) \
             (Demo.Node_value Int) (Demo.Node_children (SeqArray Demo.Node)) (Demo.Node_parent Demo.Node)))))"
        );
        assert!(sentence.encoding_references().iter().all(|t| t != &node));
    }

    #[test]
    fn array_sentence_is_a_sort_alias() {
        let (source, node) = tree_source();
        let sentence = SentenceFactory::default()
            .encode(&TypeRef::array_of(node.clone()), &source)
            .unwrap();
        assert_eq!(
            sentence.declarations(),
            vec![
                "(define-sort Demo.Node_Array () (SeqArray Demo.Node))".to_string(),
                "(declare-const Demo.Node_Array_tag Type)".to_string(),
                "(assert (subtype Demo.Node_Array_tag Object_tag))".to_string(),
            ]
        );
        assert_eq!(sentence.dependencies(), &[node, TypeRef::Object]);
    }

    #[test]
    fn exception_base_has_identity_only() {
        let exception = TypeRef::named("System", "Exception");
        let mut source = ProgramSource::new();
        source.add_type(TypeDef::new(exception.clone()).with_field("message", TypeRef::String));
        let sentence = SentenceFactory::new(Some(exception.clone())).encode(&exception, &source).unwrap();
        assert_eq!(sentence.shape(), &SentenceShape::ExceptionBase);
        assert_eq!(sentence.constructor().unwrap().accessors.len(), 2);
        assert_eq!(sentence.dependencies(), &[TypeRef::Object]);
    }

    #[test]
    fn unknown_named_type_is_reported() {
        let missing = TypeRef::named("Demo", "Missing");
        let err = SentenceFactory::default().encode(&missing, &ProgramSource::new()).unwrap_err();
        assert_eq!(err, SentenceError::UnknownType(missing));
    }
}
