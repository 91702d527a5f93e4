// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

use method_graph::TypeRef;
use thiserror::Error;

/// A semantic operation was applied to a sentence whose shape does not support it.
/// This always indicates a translation bug, never bad user input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("operation '{operation}' is not implemented for sentence '{sentence}'")]
pub struct UnsupportedOperation {
    pub operation: String,
    pub sentence: String,
}

impl UnsupportedOperation {
    pub fn new(operation: impl Into<String>, sentence: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            sentence: sentence.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SentenceError {
    #[error("no definition available for type {0}")]
    UnknownType(TypeRef),
    #[error("type {0} has no constraint-language encoding")]
    NotEncodable(TypeRef),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstantError {
    #[error("malformed model text: {0}")]
    Syntax(String),
    #[error("constant '{0}' was never declared")]
    UndeclaredConstant(String),
    #[error("constant '{0}' has no bound value")]
    UnboundConstant(String),
    #[error("no sentence registered for type {0}")]
    UnregisteredType(TypeRef),
    #[error("value '{text}' does not fit type {ty}")]
    ShapeMismatch { ty: TypeRef, text: String },
}
