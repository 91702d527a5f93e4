// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

use method_graph::{MethodRef, TypeRef};
use smt_sentence::{SentenceError, UnsupportedOperation};
use thiserror::Error;

/// Failure while turning one method graph into a form
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslationError {
    #[error("instruction '{opcode}' at offset {offset} of {method} has no encoding")]
    UnsupportedInstruction {
        method: MethodRef,
        offset: u32,
        opcode: String,
    },
    #[error(transparent)]
    UnsupportedOperation(#[from] UnsupportedOperation),
    #[error(transparent)]
    Sentence(#[from] SentenceError),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("no encoding found for type {0}")]
    UnresolvedType(TypeRef),
    #[error("no form found for method {0}")]
    UnresolvedMethod(MethodRef),
    #[error(transparent)]
    Translation(#[from] TranslationError),
    #[error("handler failed to resolve {reference}")]
    Handler {
        reference: String,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoverageError {
    #[error("method {0} has not been resolved")]
    UnresolvedMethod(MethodRef),
    #[error("more than {limit} paths through {method}")]
    PathLimitExceeded { method: MethodRef, limit: usize },
    #[error(transparent)]
    UnsupportedOperation(#[from] UnsupportedOperation),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
