//! Parser limits and URL conventions

use serde::{Deserialize, Serialize};

/// How entity keys are written in resource paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum UrlConventions {
    /// `Customers(1)`
    #[default]
    Parentheses,
    /// `Customers/1`
    KeyAsSegment,
}

/// Limits and conventions applied while parsing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserSettings {
    /// Maximum nesting depth of a `$filter` expression
    pub filter_limit: usize,
    /// Maximum nesting depth of an `$orderby` expression
    pub order_by_limit: usize,
    /// Maximum number of resource path segments
    pub path_limit: usize,
    /// Maximum nesting depth of `$expand`
    pub select_expand_limit: usize,
    /// Maximum number of syntactic nodes in one expression
    pub max_expression_count: usize,
    pub url_conventions: UrlConventions,
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self {
            filter_limit: 800,
            order_by_limit: 800,
            path_limit: 100,
            select_expand_limit: 800,
            max_expression_count: 100_000,
            url_conventions: UrlConventions::Parentheses,
        }
    }
}

impl ParserSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter_limit(mut self, limit: usize) -> Self {
        self.filter_limit = limit;
        self
    }

    pub fn with_order_by_limit(mut self, limit: usize) -> Self {
        self.order_by_limit = limit;
        self
    }

    pub fn with_path_limit(mut self, limit: usize) -> Self {
        self.path_limit = limit;
        self
    }

    pub fn with_select_expand_limit(mut self, limit: usize) -> Self {
        self.select_expand_limit = limit;
        self
    }

    pub fn with_max_expression_count(mut self, count: usize) -> Self {
        self.max_expression_count = count;
        self
    }

    pub fn with_url_conventions(mut self, conventions: UrlConventions) -> Self {
        self.url_conventions = conventions;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_from_json() {
        let settings: ParserSettings =
            serde_json::from_str(r#"{"filter_limit": 10, "url_conventions": "KeyAsSegment"}"#)
                .unwrap();
        assert_eq!(settings.filter_limit, 10);
        assert_eq!(settings.order_by_limit, 800);
        assert_eq!(settings.url_conventions, UrlConventions::KeyAsSegment);
    }
}
