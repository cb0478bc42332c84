//! Syntactic tokens for `$orderby`, `$select` and `$expand`

use crate::{QueryToken, Spanned};
use odata_uri_diagnostics::Span;
use serde::{Deserialize, Serialize};

/// Sort direction of an `$orderby` item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OrderByDirection {
    #[default]
    Ascending,
    Descending,
}

impl OrderByDirection {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "asc" => Some(Self::Ascending),
            "desc" => Some(Self::Descending),
            _ => None,
        }
    }

    pub const fn keyword(&self) -> &'static str {
        match self {
            Self::Ascending => "asc",
            Self::Descending => "desc",
        }
    }
}

/// One `expr [asc|desc]` item of `$orderby`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderByToken {
    pub expression: Spanned<QueryToken>,
    pub direction: OrderByDirection,
}

/// One comma-separated `$select` term: `Name`, `Address/City`, `*`, `NS.*`, `NS.Action`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectTermToken {
    pub segments: Vec<Spanned<String>>,
    pub span: Span,
}

impl SelectTermToken {
    /// `*`
    pub fn is_wildcard(&self) -> bool {
        matches!(self.segments.as_slice(), [only] if only.inner == "*")
    }

    /// `NS.*`, returning the namespace
    pub fn namespace_wildcard(&self) -> Option<&str> {
        match self.segments.as_slice() {
            [only] => only.inner.strip_suffix(".*"),
            _ => None,
        }
    }

    /// Segments joined with `/`
    pub fn path_text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.inner.as_str())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Parsed `$select`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SelectToken {
    pub terms: Vec<SelectTermToken>,
}

/// `$levels` value of a nested expand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExpandLevels {
    Max,
    Count(u32),
}

/// Nested options of an expand term: `Orders($filter=...;$top=5)`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExpandOptionsToken {
    pub filter: Option<Spanned<QueryToken>>,
    pub order_by: Option<Vec<OrderByToken>>,
    pub select: Option<SelectToken>,
    pub expand: Option<ExpandToken>,
    pub top: Option<u64>,
    pub skip: Option<u64>,
    pub count: Option<bool>,
    pub levels: Option<ExpandLevels>,
}

impl ExpandOptionsToken {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// One comma-separated `$expand` term
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpandTermToken {
    /// Navigation path; more than one segment is a legacy nested expansion
    pub segments: Vec<Spanned<String>>,
    pub options: ExpandOptionsToken,
    pub span: Span,
}

impl ExpandTermToken {
    pub fn path_text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.inner.as_str())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Parsed `$expand`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExpandToken {
    pub terms: Vec<ExpandTermToken>,
}
