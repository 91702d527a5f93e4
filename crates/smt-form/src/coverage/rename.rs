// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

use crate::coverage::context::InvocationSite;
use std::collections::BTreeSet;

/// Rewrites a form's local symbols for one invocation site
pub struct Renamer<'a> {
    symbols: &'a BTreeSet<String>,
    suffix: String,
}

impl<'a> Renamer<'a> {
    pub fn new(symbols: &'a BTreeSet<String>, site: &InvocationSite) -> Self {
        Self {
            symbols,
            suffix: site.suffix(),
        }
    }

    pub fn symbol(&self, symbol: &str) -> String {
        if self.symbols.contains(symbol) {
            format!("{}!{}", symbol, self.suffix)
        } else {
            symbol.to_string()
        }
    }

    /// Renames every local symbol token of an s-expression. String literals are copied
    /// untouched.
    pub fn expression(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len() + 16);
        let mut token = String::new();
        let mut chars = text.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '"' => {
                    self.flush(&mut token, &mut out);
                    out.push(c);
                    while let Some(inner) = chars.next() {
                        out.push(inner);
                        if inner == '"' {
                            // "" is an escaped quote
                            if chars.peek() == Some(&'"') {
                                out.extend(chars.next());
                            } else {
                                break;
                            }
                        }
                    }
                }
                '(' | ')' => {
                    self.flush(&mut token, &mut out);
                    out.push(c);
                }
                c if c.is_whitespace() => {
                    self.flush(&mut token, &mut out);
                    out.push(c);
                }
                c => token.push(c),
            }
        }
        self.flush(&mut token, &mut out);
        out
    }

    fn flush(&self, token: &mut String, out: &mut String) {
        if !token.is_empty() {
            out.push_str(&self.symbol(token));
            token.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use method_graph::{MethodRef, TypeRef};

    #[test]
    fn renames_whole_tokens_only() {
        let symbols: BTreeSet<String> = ["M!p0", "M!s0"].iter().map(|s| s.to_string()).collect();
        let method = MethodRef::new_static(TypeRef::named("Demo", "C"), "M", vec![], TypeRef::Void);
        let renamer = Renamer::new(&symbols, &InvocationSite::new(method, 3, 1));
        assert_eq!(
            renamer.expression("(= M!s0 (+ M!p0 M!p01 \"M!p0 \"\" M!s0\"))"),
            "(= M!s0!3_1 (+ M!p0!3_1 M!p01 \"M!p0 \"\" M!s0\"))"
        );
        assert_eq!(renamer.symbol("Demo.C.count"), "Demo.C.count");
    }
}
