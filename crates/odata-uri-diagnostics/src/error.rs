//! OData URI error types

use crate::{
    ErrorCode, Span, ODU0100, ODU0101, ODU0102, ODU0103, ODU0150, ODU0151, ODU0152, ODU0153,
    ODU0300, ODU0301,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// The configurable parser limit that was exceeded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LimitKind {
    /// Nesting depth of a `$filter` expression
    Filter,
    /// Nesting depth of an `$orderby` expression
    OrderBy,
    /// Number of syntactic nodes in one expression
    ExpressionCount,
    /// Number of segments in a resource path
    Path,
    /// Nesting depth of `$expand`
    SelectExpand,
}

impl LimitKind {
    /// Name of the setting that controls this limit
    pub const fn setting_name(&self) -> &'static str {
        match self {
            Self::Filter => "FilterLimit",
            Self::OrderBy => "OrderByLimit",
            Self::ExpressionCount => "MaxExpressionCount",
            Self::Path => "PathLimit",
            Self::SelectExpand => "SelectExpandLimit",
        }
    }

    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Filter | Self::OrderBy => ODU0100,
            Self::ExpressionCount => ODU0101,
            Self::Path => ODU0102,
            Self::SelectExpand => ODU0103,
        }
    }
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.setting_name())
    }
}

/// Main OData URI error type
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ODataError {
    /// Malformed token stream or option grammar
    #[error("{code}: {message}")]
    Syntax {
        code: ErrorCode,
        message: String,
        span: Span,
    },

    /// A configured parser limit was exceeded
    #[error("{}: the {limit} of {max} was exceeded", .limit.code())]
    LimitExceeded { limit: LimitKind, max: usize, span: Span },

    /// An identifier in an expression could not be resolved in scope
    #[error("{}: could not find a property named '{name}' on type '{parent_type}'", ODU0150)]
    UnresolvedIdentifier {
        name: String,
        parent_type: String,
        span: Span,
    },

    /// A path segment could not be resolved against the model
    #[error("{}: unresolved path segment '{segment}': {message}", ODU0300)]
    UnresolvedPathSegment {
        segment: String,
        message: String,
        span: Span,
    },

    /// A binary or unary operator was applied to operands it is not defined for
    #[error("{}: operator '{operator}' is not defined for operand types '{left}' and '{right}'", ODU0151)]
    IncompatibleOperands {
        operator: String,
        left: String,
        right: String,
        span: Span,
    },

    /// No signature of a function accepts the supplied arguments
    #[error("{}: no overload of '{name}' accepts ({}); candidates: {}", ODU0152, .arguments.join(", "), .candidates.join("; "))]
    NoApplicableFunction {
        name: String,
        arguments: Vec<String>,
        candidates: Vec<String>,
        span: Span,
    },

    /// Several resolutions are equally valid
    #[error("{}: '{name}' is ambiguous between {}", ODU0153, .candidates.join(", "))]
    AmbiguousBinding {
        name: String,
        candidates: Vec<String>,
        span: Span,
    },

    /// A type cast whose target does not derive from the source type
    #[error("{}: type '{target_type}' does not derive from '{source_type}'", ODU0301)]
    Cast {
        source_type: String,
        target_type: String,
        span: Span,
    },

    /// Any other validation failure raised while binding
    #[error("{code}: {message}")]
    Semantic {
        code: ErrorCode,
        message: String,
        span: Option<Span>,
    },

    /// EDM model could not be loaded or is inconsistent
    #[error("{code}: {message}")]
    Model { code: ErrorCode, message: String },
}

impl ODataError {
    /// Create a syntax error
    pub fn syntax(code: ErrorCode, message: impl Into<String>, span: Span) -> Self {
        Self::Syntax {
            code,
            message: message.into(),
            span,
        }
    }

    /// Create a limit error
    pub fn limit(limit: LimitKind, max: usize, span: Span) -> Self {
        Self::LimitExceeded { limit, max, span }
    }

    /// Create a semantic error without a location
    pub fn semantic(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Semantic {
            code,
            message: message.into(),
            span: None,
        }
    }

    /// Create a semantic error at a location
    pub fn semantic_at(code: ErrorCode, message: impl Into<String>, span: Span) -> Self {
        Self::Semantic {
            code,
            message: message.into(),
            span: Some(span),
        }
    }

    /// Create a model error
    pub fn model(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Model {
            code,
            message: message.into(),
        }
    }

    /// Get the error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Syntax { code, .. } => *code,
            Self::LimitExceeded { limit, .. } => limit.code(),
            Self::UnresolvedIdentifier { .. } => ODU0150,
            Self::UnresolvedPathSegment { .. } => ODU0300,
            Self::IncompatibleOperands { .. } => ODU0151,
            Self::NoApplicableFunction { .. } => ODU0152,
            Self::AmbiguousBinding { .. } => ODU0153,
            Self::Cast { .. } => ODU0301,
            Self::Semantic { code, .. } => *code,
            Self::Model { code, .. } => *code,
        }
    }

    /// Get the span if available
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::Syntax { span, .. }
            | Self::LimitExceeded { span, .. }
            | Self::UnresolvedIdentifier { span, .. }
            | Self::UnresolvedPathSegment { span, .. }
            | Self::IncompatibleOperands { span, .. }
            | Self::NoApplicableFunction { span, .. }
            | Self::AmbiguousBinding { span, .. }
            | Self::Cast { span, .. } => Some(*span),
            Self::Semantic { span, .. } => *span,
            Self::Model { .. } => None,
        }
    }

    /// Character offset of the error in the text it was raised for
    pub fn position(&self) -> Option<usize> {
        self.span().map(|s| s.start)
    }

    /// Move every span right by `base` bytes.
    ///
    /// Errors raised while parsing a nested text (an expand option, a key
    /// predicate) are shifted into the coordinates of the enclosing text.
    pub fn shifted(self, base: usize) -> Self {
        self.map_span(|span| span.shift(base))
    }

    /// Rewrite every span with `f`
    pub fn map_span(mut self, f: impl Fn(Span) -> Span) -> Self {
        match &mut self {
            Self::Syntax { span, .. }
            | Self::LimitExceeded { span, .. }
            | Self::UnresolvedIdentifier { span, .. }
            | Self::UnresolvedPathSegment { span, .. }
            | Self::IncompatibleOperands { span, .. }
            | Self::NoApplicableFunction { span, .. }
            | Self::AmbiguousBinding { span, .. }
            | Self::Cast { span, .. } => *span = f(*span),
            Self::Semantic { span, .. } => *span = span.map(&f),
            Self::Model { .. } => {}
        }
        self
    }

    /// Convert to a diagnostic
    pub fn to_diagnostic(&self) -> Diagnostic {
        let mut diag = Diagnostic::error(self.code(), self.to_string());
        if let Some(span) = self.span() {
            diag = diag.with_span(span);
        }
        if let Some(help) = self.code().info().help {
            diag = diag.with_help(help);
        }
        match self {
            Self::NoApplicableFunction { candidates, .. }
            | Self::AmbiguousBinding { candidates, .. } => {
                for candidate in candidates {
                    diag = diag.with_related(RelatedInfo::new(format!("candidate: {candidate}")));
                }
            }
            Self::LimitExceeded { limit, .. } => {
                diag = diag.with_help(format!("raise {limit} in the parser settings"));
            }
            _ => {}
        }
        diag
    }
}

/// A diagnostic message with location and context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: ErrorCode,
    pub message: String,
    pub span: Option<Span>,
    pub help: Option<String>,
    pub related: Vec<RelatedInfo>,
}

impl Diagnostic {
    /// Create a new error diagnostic
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
            span: None,
            help: None,
            related: Vec::new(),
        }
    }

    /// Create a new warning diagnostic
    pub fn warning(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(code, message)
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn with_related(mut self, info: RelatedInfo) -> Self {
        self.related.push(info);
        self
    }

    /// Render the diagnostic with a caret line under the offending text
    pub fn render(&self, source: &str) -> String {
        let mut out = format!("{}[{}]: {}\n", self.severity_label(), self.code, self.message);
        if let Some(span) = self.span {
            let column = span.char_offset(source);
            let width = source
                .get(span.as_range())
                .map(|s| s.chars().count())
                .unwrap_or(0)
                .max(1);
            out.push_str(&format!("  | {source}\n"));
            out.push_str(&format!("  | {}{}\n", " ".repeat(column), "^".repeat(width)));
        }
        if let Some(help) = &self.help {
            out.push_str(&format!("  = help: {help}\n"));
        }
        for related in &self.related {
            out.push_str(&format!("  = note: {}\n", related.message));
        }
        out
    }

    #[cfg(feature = "colored")]
    fn severity_label(&self) -> String {
        use colored::Colorize;
        match self.severity {
            Severity::Error => "error".red().bold().to_string(),
            Severity::Warning => "warning".yellow().bold().to_string(),
        }
    }

    #[cfg(not(feature = "colored"))]
    fn severity_label(&self) -> String {
        self.severity.to_string()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} - {}", self.severity, self.code, self.message)?;
        if let Some(span) = &self.span {
            write!(f, " at {}", span.start)?;
        }
        Ok(())
    }
}

/// Related diagnostic information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedInfo {
    pub span: Option<Span>,
    pub message: String,
}

impl RelatedInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            span: None,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ODU0006, ODU0154};

    #[test]
    fn test_limit_error_names_setting() {
        let err = ODataError::limit(LimitKind::Filter, 10, Span::point(42));
        assert_eq!(err.code(), ODU0100);
        assert!(err.to_string().contains("FilterLimit"));
        assert_eq!(err.position(), Some(42));
    }

    #[test]
    fn test_shifted_moves_nested_span() {
        let err = ODataError::syntax(ODU0006, "Unterminated string literal", Span::new(3, 4));
        assert_eq!(err.shifted(10).span(), Some(Span::new(13, 14)));
    }

    #[test]
    fn test_candidates_become_related_notes() {
        let err = ODataError::NoApplicableFunction {
            name: "length".into(),
            arguments: vec!["Edm.Int32".into()],
            candidates: vec!["length(Edm.String) -> Edm.Int32".into()],
            span: Span::new(0, 6),
        };
        let diag = err.to_diagnostic();
        assert_eq!(diag.related.len(), 1);
        assert!(err.to_string().contains("length(Edm.String)"));
    }

    #[test]
    fn test_render_places_caret_under_span() {
        let source = "Name eq 'abc";
        let diag = ODataError::syntax(ODU0006, "Unterminated string literal", Span::new(8, 9))
            .to_diagnostic();
        let rendered = diag.render(source);
        assert!(rendered.contains("  | Name eq 'abc\n"));
        assert!(rendered.contains(&format!("  | {}^\n", " ".repeat(8))));
    }

    #[test]
    fn test_semantic_without_span() {
        let err = ODataError::semantic(ODU0154, "The $filter expression must be boolean");
        assert_eq!(err.span(), None);
        assert_eq!(err.shifted(5).span(), None);
    }
}
