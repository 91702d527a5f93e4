// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Closing the reference graph of translated methods.
//!
//! Resolving a method translates it, which mentions types and callees; resolving those
//! may mention further types and callees. The engine drains one work-list of pending type
//! and method references with a seen set, so mutual recursion between types and methods
//! terminates without deep call stacks. Finished sentences and forms are merged into the
//! shared repositories only once the whole request has succeeded.

use crate::error::{ResolutionError, TranslationError};
use crate::ir::{mentioned_types, Form, SentenceLookup, Translator};
use crate::options::SmtFormOptions;
use crate::resolution::repository::{FormRepository, TypeRepository};
use crate::resolution::scope::{HandlerRegistry, MethodHandler, ResolutionScope, TypeHandler};
use indexmap::IndexMap;
use log::{debug, info};
use method_graph::{GraphSource, MethodRef, TypeRef};
use smt_sentence::{SentenceError, SentenceFactory, TypeSentence};
use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

/// How a resolution request was satisfied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<T> {
    /// Already present in the repository
    Cached(T),
    /// Built by the engine's default rules
    Constructed(T),
    /// Supplied by a handler
    Handled(T),
}

impl<T> Resolution<T> {
    pub fn get(&self) -> &T {
        match self {
            Resolution::Cached(t) | Resolution::Constructed(t) | Resolution::Handled(t) => t,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Resolution::Cached(t) | Resolution::Constructed(t) | Resolution::Handled(t) => t,
        }
    }

    pub fn is_cached(&self) -> bool {
        matches!(self, Resolution::Cached(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum PendingRef {
    Type(TypeRef),
    Method(MethodRef),
}

pub struct ResolutionEngine<'s> {
    source: &'s dyn GraphSource,
    options: SmtFormOptions,
    factory: SentenceFactory,
    types: TypeRepository,
    forms: FormRepository,
    handlers: HandlerRegistry,
}

impl<'s> ResolutionEngine<'s> {
    pub fn new(source: &'s dyn GraphSource, options: SmtFormOptions) -> Self {
        Self {
            source,
            factory: SentenceFactory::new(options.exception_base.clone()),
            options,
            types: TypeRepository::new(),
            forms: FormRepository::new(),
            handlers: HandlerRegistry::new(),
        }
    }

    pub fn options(&self) -> &SmtFormOptions {
        &self.options
    }

    pub fn types(&self) -> &TypeRepository {
        &self.types
    }

    pub fn forms(&self) -> &FormRepository {
        &self.forms
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    pub fn form(&self, method: &MethodRef) -> Option<Arc<Form>> {
        self.forms.get(method)
    }

    /// Prelude and datatype declarations of every resolved type
    pub fn declarations(&self) -> Vec<String> {
        self.types.declarations()
    }

    /// Referenced types of `form` without a sentence yet
    pub fn unknown_types(&self, form: &Form) -> Vec<TypeRef> {
        form.referenced_types()
            .into_iter()
            .filter(|ty| !self.types.contains(ty))
            .collect()
    }

    /// Callees of `form` without a form yet
    pub fn unknown_methods(&self, form: &Form) -> Vec<MethodRef> {
        form.referenced_methods()
            .into_iter()
            .filter(|m| !self.forms.contains(m))
            .collect()
    }

    pub fn resolve_type(&self, ty: &TypeRef) -> Result<Resolution<Arc<TypeSentence>>, ResolutionError> {
        if let Some(sentence) = self.types.get(ty) {
            return Ok(Resolution::Cached(sentence));
        }
        let scope = self.handlers.open(vec![], vec![]);
        let mut staging = Staging::new(&self.types);
        let handled = self.resolve_type_in(ty, &scope, &mut staging)?;
        staging.commit(&self.forms);
        let sentence = self
            .types
            .get(ty)
            .ok_or_else(|| ResolutionError::UnresolvedType(ty.clone()))?;
        Ok(if handled {
            Resolution::Handled(sentence)
        } else {
            Resolution::Constructed(sentence)
        })
    }

    /// Translate `method` and everything it transitively needs
    pub fn resolve_method(
        &self,
        method: &MethodRef,
        type_handlers: Vec<Arc<dyn TypeHandler>>,
        method_handlers: Vec<Arc<dyn MethodHandler>>,
    ) -> Result<(), ResolutionError> {
        self.resolve_method_form(method, type_handlers, method_handlers)
            .map(|_| ())
    }

    pub fn resolve_method_form(
        &self,
        method: &MethodRef,
        type_handlers: Vec<Arc<dyn TypeHandler>>,
        method_handlers: Vec<Arc<dyn MethodHandler>>,
    ) -> Result<Resolution<Arc<Form>>, ResolutionError> {
        if let Some(form) = self.forms.get(method) {
            return Ok(Resolution::Cached(form));
        }
        info!("resolving {}", method);
        let scope = self.handlers.open(type_handlers, method_handlers);

        let mut staging = Staging::new(&self.types);
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([PendingRef::Method(method.clone())]);
        while let Some(next) = queue.pop_front() {
            if !seen.insert(next.clone()) {
                continue;
            }
            match next {
                PendingRef::Type(ty) => {
                    self.resolve_type_in(&ty, &scope, &mut staging)?;
                }
                PendingRef::Method(callee) => {
                    if self.forms.contains(&callee) {
                        continue;
                    }
                    let child = scope.child(vec![], vec![]);
                    let (form, handled) = self.construct_form(&callee, &child, &mut staging)?;
                    let types = form.referenced_types().into_iter().filter(|ty| !staging.contains(ty));
                    queue.extend(types.map(PendingRef::Type).collect::<Vec<_>>());
                    queue.extend(self.unknown_methods(&form).into_iter().map(PendingRef::Method));
                    staging.forms.insert(callee, (form, handled));
                }
            }
        }

        let merged = staging.commit(&self.forms);
        debug!("resolved {} with {} forms in the repository", method, self.forms.len());
        match merged.get(method) {
            Some((form, true)) => Ok(Resolution::Handled(form.clone())),
            Some((form, false)) => Ok(Resolution::Constructed(form.clone())),
            // another request merged the same method first
            None => self
                .forms
                .get(method)
                .map(Resolution::Cached)
                .ok_or_else(|| ResolutionError::UnresolvedMethod(method.clone())),
        }
    }

    fn construct_form(
        &self,
        method: &MethodRef,
        scope: &ResolutionScope,
        staging: &mut Staging<'_>,
    ) -> Result<(Form, bool), ResolutionError> {
        for handler in scope.method_handlers() {
            match handler.resolve_method(method) {
                Ok(Some(form)) => {
                    debug!("form of {} supplied by handler", method);
                    return Ok((form, true));
                }
                Ok(None) => {}
                Err(source) => {
                    return Err(ResolutionError::Handler {
                        reference: method.to_string(),
                        source,
                    })
                }
            }
        }
        if method.is_abstract || self.options.is_ignorable(method) {
            debug!("empty stand-in form for {}", method);
            return Ok((Form::empty(method.clone()), false));
        }
        let graph = self
            .source
            .method_graph(method)
            .ok_or_else(|| ResolutionError::UnresolvedMethod(method.clone()))?;
        for ty in mentioned_types(graph) {
            self.resolve_type_in(&ty, scope, staging)?;
        }
        let form = Translator::new(graph, &*staging).translate()?;
        Ok((form, false))
    }

    /// Stage `ty` and its dependency closure. True when a handler supplied `ty` itself.
    fn resolve_type_in(
        &self,
        ty: &TypeRef,
        scope: &ResolutionScope,
        staging: &mut Staging<'_>,
    ) -> Result<bool, ResolutionError> {
        let mut handled_root = false;
        let mut added = 0;
        let mut queue = VecDeque::from([ty.clone()]);
        while let Some(next) = queue.pop_front() {
            if staging.contains(&next) {
                continue;
            }
            let (sentence, handled) = self.construct_sentence(&next, scope)?;
            if &next == ty {
                handled_root = handled;
            }
            queue.extend(sentence.dependencies().iter().cloned());
            staging.sentences.insert(next, Arc::new(sentence));
            added += 1;
        }
        if added > 0 {
            debug!("encoded {} with {} new sentences", ty, added);
        }
        Ok(handled_root)
    }

    fn construct_sentence(&self, ty: &TypeRef, scope: &ResolutionScope) -> Result<(TypeSentence, bool), ResolutionError> {
        for handler in scope.type_handlers() {
            match handler.resolve_type(ty, &self.factory) {
                Ok(Some(sentence)) => {
                    debug!("sentence of {} supplied by handler", ty);
                    return Ok((sentence, true));
                }
                Ok(None) => {}
                Err(source) => {
                    return Err(ResolutionError::Handler {
                        reference: ty.to_string(),
                        source,
                    })
                }
            }
        }
        match self.factory.encode(ty, self.source) {
            Ok(sentence) => Ok((sentence, false)),
            Err(SentenceError::UnknownType(missing)) => Err(ResolutionError::UnresolvedType(missing)),
            Err(err) => Err(ResolutionError::Translation(TranslationError::Sentence(err))),
        }
    }
}

/// Sentences and forms built by one request. Lookups see the staged sentences before the
/// repository; nothing reaches the repositories unless the request commits.
struct Staging<'r> {
    types: &'r TypeRepository,
    sentences: IndexMap<TypeRef, Arc<TypeSentence>>,
    forms: IndexMap<MethodRef, (Form, bool)>,
}

impl<'r> Staging<'r> {
    fn new(types: &'r TypeRepository) -> Self {
        Self {
            types,
            sentences: IndexMap::new(),
            forms: IndexMap::new(),
        }
    }

    fn contains(&self, ty: &TypeRef) -> bool {
        self.sentences.contains_key(ty) || self.types.contains(ty)
    }

    /// Merge everything staged. Returns the stored form of each staged method and
    /// whether a handler supplied it.
    fn commit(self, forms: &FormRepository) -> IndexMap<MethodRef, (Arc<Form>, bool)> {
        for (_, sentence) in self.sentences {
            self.types.insert(sentence);
        }
        self.forms
            .into_iter()
            .map(|(method, (form, handled))| {
                let stored = forms.insert(method.clone(), form);
                (method, (stored, handled))
            })
            .collect()
    }
}

impl SentenceLookup for Staging<'_> {
    fn sentence(&self, ty: &TypeRef) -> Result<Arc<TypeSentence>, TranslationError> {
        match self.sentences.get(ty) {
            Some(sentence) => Ok(sentence.clone()),
            None => self.types.sentence(ty),
        }
    }
}
