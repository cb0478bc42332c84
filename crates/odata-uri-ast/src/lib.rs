//! OData URI syntactic tree definitions
//!
//! This crate defines the untyped token tree built by the parser for `$filter`,
//! `$orderby`, `$select` and `$expand`, together with the operator precedence
//! table and literal values shared by the parser, binder and builder.

mod literal;
mod operator;
mod query;
mod token;

pub use literal::*;
pub use operator::*;
pub use query::*;
pub use token::*;

/// A node with source span information
pub type Spanned<T> = odata_uri_diagnostics::Spanned<T>;

/// Type alias for boxed tokens
pub type BoxToken = Box<Spanned<QueryToken>>;

/// Type alias for optional boxed tokens
pub type OptBoxToken = Option<Box<Spanned<QueryToken>>>;
