//! OData URI query language for Rust
//!
//! This crate provides parsing, model binding and building of OData request
//! URIs:
//! - Lexing and parsing `$filter`, `$orderby`, `$select`, `$expand` and paths
//! - Binding against an EDM model loaded from CSDL JSON or XML
//! - Numeric promotion and built-in function overload resolution
//! - Writing canonical URI text back from bound trees
//!
//! # Example
//!
//! ```ignore
//! use odata_uri::{CsdlModel, ODataUriParser};
//!
//! let model = CsdlModel::from_file("model.csdl.json")?;
//! let parser = ODataUriParser::new(&model, "https://example.org/odata/")?;
//! let uri = parser.parse_uri("https://example.org/odata/Customers?$filter=Age gt 30&$top=5")?;
//! println!("{}", uri.to_uri_string());
//! ```

// Re-export all public APIs from internal crates
pub use odata_uri_ast as ast;
pub use odata_uri_builder as builder;
pub use odata_uri_diagnostics as diagnostics;
pub use odata_uri_edm as edm;
pub use odata_uri_parser as parser;
pub use odata_uri_semantic as semantic;

mod uri;
mod uri_parser;

pub use uri::ODataUri;
pub use uri_parser::ODataUriParser;

// Convenience re-exports
pub use odata_uri_diagnostics::{ODataError, Result};
pub use odata_uri_edm::{CsdlModel, EdmModel};
pub use odata_uri_parser::{parse_count, ParserSettings, UrlConventions};
pub use odata_uri_semantic::{
    EntityIdSegment, FilterClause, ODataPath, OrderByClause, PathSegment, SelectExpandClause,
};
