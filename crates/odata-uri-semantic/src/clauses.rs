//! Bound `$filter` and `$orderby` clauses

use crate::nodes::{RangeVariable, SingleValueNode};
use odata_uri_ast::OrderByDirection;
use serde::{Deserialize, Serialize};

/// A bound `$filter`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterClause {
    /// Boolean (or `null`) predicate over `$it`
    pub expression: SingleValueNode,
    pub range_variable: RangeVariable,
}

/// One bound `$orderby` item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderByItem {
    pub expression: SingleValueNode,
    pub direction: OrderByDirection,
}

/// A bound `$orderby`, items in priority order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderByClause {
    pub items: Vec<OrderByItem>,
    pub range_variable: RangeVariable,
}

impl OrderByClause {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
