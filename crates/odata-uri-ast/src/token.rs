//! Syntactic query tokens produced by the expression parser
//!
//! Tokens are untyped: identifiers are kept as written and only the binder
//! decides whether `Name` is a property, a range variable or a bound function.

use crate::{BinaryOperatorKind, BoxToken, LiteralValue, OptBoxToken, Spanned, UnaryOperatorKind};
use serde::{Deserialize, Serialize};

/// Name of the implicit range variable
pub const IMPLICIT_RANGE_VARIABLE: &str = "$it";

/// A node of the syntactic tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryToken {
    /// `left op right`
    BinaryOperator {
        operator: BinaryOperatorKind,
        left: BoxToken,
        right: BoxToken,
    },

    /// `-operand` / `not operand`
    UnaryOperator {
        operator: UnaryOperatorKind,
        operand: BoxToken,
    },

    /// `name(args)`, or `source/NS.Function(args)` for a bound function
    FunctionCall {
        name: String,
        arguments: Vec<Spanned<QueryToken>>,
        source: OptBoxToken,
    },

    /// A literal value with the text it was parsed from
    Literal(LiteralToken),

    /// `identifier` or `source/identifier`
    PropertyAccess {
        identifier: String,
        source: OptBoxToken,
    },

    /// A reference to `$it` or an in-scope lambda variable
    RangeVariable(String),

    /// `source/any(v: body)`, `source/all(v: body)` or `source/any()`
    Lambda {
        kind: LambdaKind,
        source: BoxToken,
        parameter: Option<String>,
        body: OptBoxToken,
    },

    /// `NS.Type` or `source/NS.Type`
    TypeCast {
        type_name: String,
        source: OptBoxToken,
    },

    /// `source/$count`
    Count { source: BoxToken },

    /// `@name`
    ParameterAlias(String),

    /// `name=value` inside a bound function call
    NamedArgument { name: String, value: BoxToken },
}

impl QueryToken {
    /// Create a binary operator token
    pub fn binary(
        operator: BinaryOperatorKind,
        left: Spanned<QueryToken>,
        right: Spanned<QueryToken>,
    ) -> Self {
        Self::BinaryOperator {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Create a unary operator token
    pub fn unary(operator: UnaryOperatorKind, operand: Spanned<QueryToken>) -> Self {
        Self::UnaryOperator {
            operator,
            operand: Box::new(operand),
        }
    }

    /// Create a property access token
    pub fn property(identifier: impl Into<String>, source: Option<Spanned<QueryToken>>) -> Self {
        Self::PropertyAccess {
            identifier: identifier.into(),
            source: source.map(Box::new),
        }
    }

    /// Create a literal token
    pub fn literal(value: LiteralValue, original_text: impl Into<String>) -> Self {
        Self::Literal(LiteralToken {
            value,
            original_text: original_text.into(),
        })
    }

    /// Short name of the token kind, used in diagnostics
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::BinaryOperator { .. } => "binary operator",
            Self::UnaryOperator { .. } => "unary operator",
            Self::FunctionCall { .. } => "function call",
            Self::Literal(_) => "literal",
            Self::PropertyAccess { .. } => "property access",
            Self::RangeVariable(_) => "range variable",
            Self::Lambda { .. } => "lambda",
            Self::TypeCast { .. } => "type cast",
            Self::Count { .. } => "$count",
            Self::ParameterAlias(_) => "parameter alias",
            Self::NamedArgument { .. } => "named argument",
        }
    }

    /// Number of tokens in this subtree, including itself
    pub fn node_count(&self) -> usize {
        let source_count = |s: &OptBoxToken| s.as_ref().map_or(0, |t| t.node_count());
        1 + match self {
            Self::BinaryOperator { left, right, .. } => left.node_count() + right.node_count(),
            Self::UnaryOperator { operand, .. } => operand.node_count(),
            Self::FunctionCall {
                arguments, source, ..
            } => arguments.iter().map(|a| a.node_count()).sum::<usize>() + source_count(source),
            Self::PropertyAccess { source, .. } | Self::TypeCast { source, .. } => {
                source_count(source)
            }
            Self::Lambda { source, body, .. } => source.node_count() + source_count(body),
            Self::Count { source } => source.node_count(),
            Self::NamedArgument { value, .. } => value.node_count(),
            Self::Literal(_) | Self::RangeVariable(_) | Self::ParameterAlias(_) => 0,
        }
    }
}

/// A literal token: the typed value plus the text it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiteralToken {
    pub value: LiteralValue,
    pub original_text: String,
}

/// Lambda operator kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LambdaKind {
    Any,
    All,
}

impl LambdaKind {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "any" => Some(Self::Any),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    pub const fn keyword(&self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::All => "all",
        }
    }
}
