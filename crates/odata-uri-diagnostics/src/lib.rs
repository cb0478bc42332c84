//! OData URI diagnostics and error handling
//!
//! This crate provides the error handling infrastructure shared by the lexer,
//! parsers, binder and builder: structured error codes, character spans and
//! diagnostic rendering.

mod error;
mod error_code;
mod span;

pub use error::*;
pub use error_code::*;
pub use span::*;

/// Result type for OData URI operations
pub type Result<T> = std::result::Result<T, ODataError>;
