//! Binding scope
//!
//! One `BindingState` exists per bind operation. It owns the implicit `$it`
//! variable and a stack of lambda range variables; lookups walk the stack from
//! the innermost lambda outwards, so an inner parameter shadows an outer one.

use crate::nodes::RangeVariable;
use odata_uri_ast::IMPLICIT_RANGE_VARIABLE;
use odata_uri_diagnostics::{ODataError, Result, Span, ODU0153};
use odata_uri_edm::{EdmModel, EdmTypeRef};
use odata_uri_parser::ParserSettings;

/// Resolves a parameter alias name (without `@`) to its value text
pub type AliasResolver = dyn Fn(&str) -> Option<String> + Send + Sync;

/// Resolves a batch content id (without `$`) to the resource path it refers to
pub type BatchReferenceResolver = dyn Fn(&str) -> Option<String> + Send + Sync;

/// State threaded through one bind operation
pub struct BindingState<'a> {
    model: &'a dyn EdmModel,
    settings: ParserSettings,
    implicit: RangeVariable,
    range_variables: Vec<RangeVariable>,
    alias_resolver: Option<&'a AliasResolver>,
    /// Aliases currently being bound, guarding against `@a=@b&@b=@a`
    aliases_in_progress: Vec<String>,
}

impl<'a> BindingState<'a> {
    /// Create a state binding against elements of `element_type`
    pub fn new(model: &'a dyn EdmModel, element_type: EdmTypeRef, entity_set: Option<String>) -> Self {
        Self {
            model,
            settings: ParserSettings::default(),
            implicit: RangeVariable::implicit(element_type, entity_set),
            range_variables: Vec::new(),
            alias_resolver: None,
            aliases_in_progress: Vec::new(),
        }
    }

    pub fn with_settings(mut self, settings: ParserSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_alias_resolver(mut self, resolver: Option<&'a AliasResolver>) -> Self {
        self.alias_resolver = resolver;
        self
    }

    pub fn model(&self) -> &'a dyn EdmModel {
        self.model
    }

    pub fn settings(&self) -> &ParserSettings {
        &self.settings
    }

    /// The implicit `$it` variable
    pub fn implicit_range_variable(&self) -> &RangeVariable {
        &self.implicit
    }

    /// Innermost range variable named `name`, `$it` included
    pub fn find_range_variable(&self, name: &str) -> Option<&RangeVariable> {
        if let Some(found) = self.range_variables.iter().rev().find(|v| v.name == name) {
            return Some(found);
        }
        (name == IMPLICIT_RANGE_VARIABLE).then_some(&self.implicit)
    }

    /// Number of lambda variables in scope
    pub fn depth(&self) -> usize {
        self.range_variables.len()
    }

    /// Run `f` with `variable` in scope. The variable is popped whether `f`
    /// succeeds or not.
    pub fn with_range_variable<T>(
        &mut self,
        variable: RangeVariable,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        self.range_variables.push(variable);
        let result = f(self);
        self.range_variables.pop();
        result
    }

    /// Look up the text of a parameter alias
    pub fn resolve_alias(&self, name: &str) -> Option<String> {
        self.alias_resolver.and_then(|resolve| resolve(name))
    }

    /// Run `f` while `name` is marked as being bound.
    ///
    /// Re-entering an alias already in progress is a cycle.
    pub fn with_alias<T>(
        &mut self,
        name: &str,
        span: Span,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        if self.aliases_in_progress.iter().any(|a| a == name) {
            let mut chain = self.aliases_in_progress.clone();
            chain.push(name.to_string());
            log::debug!("parameter alias cycle through @{name}");
            let chain: Vec<String> = chain.into_iter().map(|a| format!("@{a}")).collect();
            return Err(ODataError::semantic_at(
                ODU0153,
                format!("parameter alias @{name} refers to itself through {}", chain.join(" -> ")),
                span,
            ));
        }
        self.aliases_in_progress.push(name.to_string());
        let result = f(self);
        self.aliases_in_progress.pop();
        result
    }
}
