//! Built-in functions
//!
//! A fixed signature table for the canonical string, date/time, math and geo
//! functions. `isof` and `cast` take a type name argument and are bound by the
//! binder directly.

use crate::promotion::promotion_cost;
use indexmap::IndexMap;
use odata_uri_diagnostics::{ODataError, Result, Span, ODU0158};
use odata_uri_edm::{EdmPrimitiveKind, EdmTypeRef};
use std::fmt;
use std::sync::LazyLock;

use EdmPrimitiveKind as K;

/// Functions whose last argument names a type
pub const TYPE_FUNCTIONS: [&str; 2] = ["isof", "cast"];

/// One overload of a built-in function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSignature {
    pub name: &'static str,
    pub parameters: Vec<EdmPrimitiveKind>,
    pub return_type: EdmPrimitiveKind,
}

impl FunctionSignature {
    fn new(name: &'static str, parameters: &[EdmPrimitiveKind], return_type: EdmPrimitiveKind) -> Self {
        Self {
            name,
            parameters: parameters.to_vec(),
            return_type,
        }
    }

    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    /// Total promotion cost of calling this overload, `None` if not callable
    fn cost(&self, arguments: &[ArgumentType<'_>]) -> Option<u32> {
        if self.parameters.len() != arguments.len() {
            return None;
        }
        self.parameters
            .iter()
            .zip(arguments)
            .try_fold(0u32, |total, (parameter, argument)| {
                let cost = match argument.type_ref {
                    EdmTypeRef::Untyped => 0,
                    EdmTypeRef::Primitive(kind) => promotion_cost(*kind, *parameter, argument.constant)?,
                    _ => return None,
                };
                Some(total + cost)
            })
    }
}

impl fmt::Display for FunctionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parameters: Vec<&str> = self.parameters.iter().map(|p| p.name()).collect();
        write!(f, "{}({}) -> {}", self.name, parameters.join(", "), self.return_type)
    }
}

/// Type of an actual argument as seen by overload resolution
#[derive(Debug, Clone, Copy)]
pub struct ArgumentType<'a> {
    pub type_ref: &'a EdmTypeRef,
    pub constant: bool,
}

static BUILT_IN_FUNCTIONS: LazyLock<IndexMap<&'static str, Vec<FunctionSignature>>> =
    LazyLock::new(|| {
        let mut table: IndexMap<&'static str, Vec<FunctionSignature>> = IndexMap::new();
        let mut register = |name: &'static str, parameters: &[K], return_type: K| {
            table
                .entry(name)
                .or_default()
                .push(FunctionSignature::new(name, parameters, return_type));
        };

        // String
        for name in ["substringof", "contains", "startswith", "endswith"] {
            register(name, &[K::String, K::String], K::Boolean);
        }
        register("length", &[K::String], K::Int32);
        register("indexof", &[K::String, K::String], K::Int32);
        register("replace", &[K::String, K::String, K::String], K::String);
        register("substring", &[K::String, K::Int32], K::String);
        register("substring", &[K::String, K::Int32, K::Int32], K::String);
        for name in ["tolower", "toupper", "trim"] {
            register(name, &[K::String], K::String);
        }
        register("concat", &[K::String, K::String], K::String);

        // Date and time
        for name in ["year", "month", "day"] {
            register(name, &[K::DateTime], K::Int32);
            register(name, &[K::DateTimeOffset], K::Int32);
        }
        for name in ["hour", "minute", "second"] {
            register(name, &[K::DateTime], K::Int32);
            register(name, &[K::DateTimeOffset], K::Int32);
            register(name, &[K::Time], K::Int32);
        }

        // Math
        for name in ["round", "floor", "ceiling"] {
            register(name, &[K::Double], K::Double);
            register(name, &[K::Decimal], K::Decimal);
        }

        // Geo
        for kind in [K::Geography, K::Geometry] {
            register("geo.distance", &[kind, kind], K::Double);
            register("geo.length", &[kind], K::Double);
            register("geo.intersects", &[kind, kind], K::Boolean);
        }

        table
    });

/// Whether `name` is a built-in function, type functions included
pub fn is_built_in(name: &str) -> bool {
    TYPE_FUNCTIONS.contains(&name) || BUILT_IN_FUNCTIONS.contains_key(name)
}

/// All overloads of a built-in function
pub fn signatures(name: &str) -> Option<&'static [FunctionSignature]> {
    BUILT_IN_FUNCTIONS.get(name).map(Vec::as_slice)
}

/// Pick the overload of `name` with the lowest promotion cost
pub fn resolve_overload(
    name: &str,
    arguments: &[ArgumentType<'_>],
    span: Span,
) -> Result<&'static FunctionSignature> {
    let overloads = signatures(name).ok_or_else(|| {
        ODataError::semantic_at(
            ODU0158,
            format!("unknown function '{name}'"),
            span,
        )
    })?;

    let mut candidates: Vec<(&'static FunctionSignature, u32)> = overloads
        .iter()
        .filter_map(|signature| signature.cost(arguments).map(|cost| (signature, cost)))
        .collect();
    candidates.sort_by_key(|(_, cost)| *cost);

    match candidates.as_slice() {
        [] => Err(ODataError::NoApplicableFunction {
            name: name.to_string(),
            arguments: arguments.iter().map(|a| a.type_ref.full_name()).collect(),
            candidates: overloads.iter().map(ToString::to_string).collect(),
            span,
        }),
        [(first, best), (second, next), ..] if best == next => Err(ODataError::AmbiguousBinding {
            name: name.to_string(),
            candidates: vec![first.to_string(), second.to_string()],
            span,
        }),
        [(signature, cost), ..] => {
            log::trace!("resolved {name} to {signature} at cost {cost}");
            Ok(signature)
        }
    }
}
