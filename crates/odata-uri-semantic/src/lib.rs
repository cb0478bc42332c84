//! OData URI semantic binding
//!
//! Resolves the syntactic trees produced by `odata-uri-parser` against an EDM
//! model:
//! - `binder`: `$filter`/`$orderby` expressions into typed [`SingleValueNode`] trees
//! - `path`: resource paths into [`ODataPath`]
//! - `select_expand`: `$select`/`$expand` into [`SelectExpandClause`]
//! - `promotion` and `functions`: numeric promotion and built-in overloads

pub mod binder;
pub mod clauses;
pub mod functions;
pub mod nodes;
pub mod path;
pub mod promotion;
pub mod scope;
pub mod select_expand;

pub use binder::MetadataBinder;
pub use clauses::{FilterClause, OrderByClause, OrderByItem};
pub use functions::{is_built_in, resolve_overload, signatures, ArgumentType, FunctionSignature};
pub use nodes::{
    CollectionNode, ConstantNode, FunctionArgument, FunctionCallNode, LambdaNode, QueryNode,
    RangeVariable, SingleEntityNode, SingleValueNode,
};
pub use path::{
    EntityIdSegment, KeyValue, ODataPath, OperationParameter, PathBinder, PathSegment,
    SegmentValue,
};
pub use promotion::{binary_typing, can_promote, numeric_join, promotion_cost, BinaryTyping};
pub use scope::{AliasResolver, BatchReferenceResolver, BindingState};
pub use select_expand::{
    ExpandedNavigationSelectItem, ODataSelectPath, SelectExpandBinder, SelectExpandClause,
    SelectItem, SelectSegment,
};

pub use odata_uri_diagnostics::{ODataError, Result};
