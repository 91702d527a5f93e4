// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

use once_cell::sync::Lazy;

/// Uninterpreted sort of runtime type tags
pub const TYPE_SORT: &str = "Type";

/// Parametric datatype backing every array sentence
pub const SEQ_ARRAY: &str = "SeqArray";

static PRELUDE: Lazy<Vec<String>> = Lazy::new(|| {
    vec![
        format!("(declare-sort {} 0)", TYPE_SORT),
        format!("(declare-fun subtype ({0} {0}) Bool)", TYPE_SORT),
        format!("(assert (forall ((t {})) (subtype t t)))", TYPE_SORT),
        format!(
            "(assert (forall ((a {0}) (b {0}) (c {0})) (=> (and (subtype a b) (subtype b c)) (subtype a c))))",
            TYPE_SORT
        ),
        format!(
            "(declare-datatypes (E) (({0} {0}_null ({0}_ctor ({0}_ptr Int) ({0}_type {1}) ({0}_value (Seq E))))))",
            SEQ_ARRAY, TYPE_SORT
        ),
    ]
});

/// Declarations every emitted problem starts with
pub fn prelude() -> &'static [String] {
    &PRELUDE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_array_keeps_identity_accessors() {
        insta::assert_snapshot!(prelude()[4], @"(declare-datatypes (E) ((SeqArray SeqArray_null (SeqArray_ctor (SeqArray_ptr Int) (SeqArray_type Type) (SeqArray_value (Seq E))))))");
    }
}
