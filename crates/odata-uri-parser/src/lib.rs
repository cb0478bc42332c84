//! OData URI syntactic parsing
//!
//! Everything in this crate works on text alone, with no model:
//! - `lexer`: tokens with byte spans and typed literals
//! - `expression`: `$filter` and `$orderby` into [`QueryToken`] trees
//! - `path`: resource path segments with their key/parameter text
//! - `select_expand`: `$select` and `$expand` terms with nested options
//! - `query_options`: query string splitting, `$top`/`$skip`/`$count` values
//!
//! The semantic crate resolves these syntactic trees against an EDM model.
//!
//! [`QueryToken`]: odata_uri_ast::QueryToken

pub mod expression;
pub mod lexer;
pub mod path;
pub mod query_options;
pub mod select_expand;
pub mod settings;

pub use expression::{
    parse_filter, parse_filter_at, parse_order_by, parse_order_by_at, ExpressionParser,
};
pub use lexer::{tokenize, tokenize_at, Token, TokenKind, TokenStream};
pub use path::{
    parse_segment_arguments, parse_segment_literal, split_path, RawSegment, SegmentArgument,
};
pub use query_options::{parse_count, parse_query_string, QueryOptions};
pub use select_expand::{parse_expand, parse_expand_at, parse_select, parse_select_at};
pub use settings::{ParserSettings, UrlConventions};

pub use odata_uri_diagnostics::{ODataError, Result};
