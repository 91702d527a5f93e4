// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! SMT Sentences
//!
//! A sentence is the constraint-language encoding of one source type: an algebraic
//! datatype declaration together with the vocabulary of operations that are meaningful
//! for values of that type. This crate only emits text; it never solves anything.

mod constants;
mod error;
mod factory;
mod operations;
mod prelude;
mod sentence;
mod sexpr;
mod symbols;

pub use constants::{ConstantTable, ConstantValue, ObjectModel, Reflected};
pub use error::{ConstantError, SentenceError, UnsupportedOperation};
pub use factory::SentenceFactory;
pub use operations::Operation;
pub use prelude::{prelude, SEQ_ARRAY, TYPE_SORT};
pub use sentence::{FieldAccessor, SentenceShape, TypeSentence};
pub use sexpr::SExpr;
pub use symbols::{expanded_sort, type_symbol, AccessorSymbol, ConstructorSymbol, SortSymbol};
