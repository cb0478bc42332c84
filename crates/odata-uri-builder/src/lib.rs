//! OData URI builder
//!
//! The inverse of parsing and binding: writes canonical URI text for bound
//! expressions, `$orderby`, `$select`/`$expand`, resource paths and whole
//! request URIs, plus syntactic tokens for tooling. Text produced here parses
//! and binds back to an equal tree.

pub mod expression;
pub mod literal;
pub mod path;
pub mod select_expand;
pub mod uri;

pub use expression::{write_node, write_order_by, write_order_by_tokens, write_token};
pub use literal::format_literal;
pub use path::{write_path, write_segment_value};
pub use select_expand::{write_expand, write_select};
pub use uri::{write_uri, UriParts};
