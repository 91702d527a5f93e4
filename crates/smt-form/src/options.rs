// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

use anyhow::Context;
use method_graph::{MethodRef, TypeRef};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Options of the translator, usually read from a toml file.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SmtFormOptions {
    /// Type that is encoded with identity only and whose methods may be skipped.
    pub exception_base: Option<TypeRef>,
    /// Prefixes of method symbols or declaring type names that resolve to an empty form.
    pub ignorable_methods: Vec<String>,
    /// Whether methods declared on `exception_base` resolve to an empty form.
    pub ignore_exception_base_methods: bool,
    /// How many activations of one method may be on the inlining stack at once.
    pub max_recursion_depth: usize,
    /// Upper bound on enumerated paths per method.
    pub max_paths: usize,
}

impl Default for SmtFormOptions {
    fn default() -> Self {
        Self {
            exception_base: None,
            ignorable_methods: vec![],
            ignore_exception_base_methods: true,
            max_recursion_depth: 2,
            max_paths: 4096,
        }
    }
}

impl SmtFormOptions {
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        let options: Self = toml::from_str(text).context("invalid smt-form options")?;
        if options.max_paths == 0 {
            anyhow::bail!("max_paths must be positive");
        }
        Ok(options)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read options from {}", path.display()))?;
        Self::from_toml_str(&text)
    }

    /// Whether `method` resolves to an empty stand-in form
    pub fn is_ignorable(&self, method: &MethodRef) -> bool {
        if self.ignore_exception_base_methods && self.exception_base.as_ref() == Some(&method.declaring) {
            return true;
        }
        let symbol = method.symbol();
        let declaring = method.declaring.to_string();
        self.ignorable_methods
            .iter()
            .any(|prefix| symbol.starts_with(prefix.as_str()) || declaring.starts_with(prefix.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_toml_with_defaults() {
        let options = SmtFormOptions::from_toml_str(
            r#"
            exception_base = "System.Exception"
            ignorable_methods = ["System.Console"]
            "#,
        )
        .unwrap();
        assert_eq!(options.exception_base, Some(TypeRef::named("System", "Exception")));
        assert_eq!(options.max_recursion_depth, 2);
        assert!(options.ignore_exception_base_methods);

        let print = MethodRef::new_static(
            TypeRef::named("System", "Console"),
            "WriteLine",
            vec![TypeRef::String],
            TypeRef::Void,
        );
        assert!(options.is_ignorable(&print));
        let ctor = MethodRef::new_instance(TypeRef::named("System", "Exception"), ".ctor", vec![], TypeRef::Void);
        assert!(options.is_ignorable(&ctor));
    }

    #[test]
    fn rejects_unknown_fields_and_empty_path_budget() {
        assert!(SmtFormOptions::from_toml_str("max_depth = 3").is_err());
        assert!(SmtFormOptions::from_toml_str("max_paths = 0").is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_recursion_depth = 1").unwrap();
        let options = SmtFormOptions::from_file(file.path()).unwrap();
        assert_eq!(options.max_recursion_depth, 1);
        assert!(SmtFormOptions::from_file("/nonexistent/options.toml").is_err());
    }
}
