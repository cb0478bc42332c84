//! Entity Data Model abstraction
//!
//! This crate provides:
//! - EDM type references and primitive kinds
//! - Schema and container element definitions
//! - The read-only `EdmModel` interface consumed by the binder
//! - `CsdlModel`, an in-memory implementation loadable from JSON or CSDL XML

mod csdl;
mod elements;
mod model;
mod raw;
mod types;
mod xml;

pub use csdl::*;
pub use elements::*;
pub use model::*;
pub use types::*;
