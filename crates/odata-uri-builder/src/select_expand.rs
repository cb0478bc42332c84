//! `$select` and `$expand` writers

use crate::expression::{write_node, write_order_by};
use odata_uri_ast::ExpandLevels;
use odata_uri_semantic::{ExpandedNavigationSelectItem, SelectExpandClause, SelectItem};

/// `$select` text of one level, `None` when everything is selected
pub fn write_select(clause: &SelectExpandClause) -> Option<String> {
    if clause.all_selected() {
        return None;
    }
    let terms: Vec<String> = clause
        .items()
        .iter()
        .filter_map(|item| match item {
            SelectItem::Path(path) => Some(path.text()),
            SelectItem::Wildcard => Some("*".to_string()),
            SelectItem::NamespaceWildcard(namespace) => Some(format!("{namespace}.*")),
            SelectItem::Expanded(_) => None,
        })
        .collect();
    (!terms.is_empty()).then(|| terms.join(","))
}

/// `$expand` text of one level, `None` when nothing is expanded
pub fn write_expand(clause: &SelectExpandClause) -> Option<String> {
    let terms: Vec<String> = clause.expanded_items().map(write_expanded).collect();
    (!terms.is_empty()).then(|| terms.join(","))
}

fn write_expanded(item: &ExpandedNavigationSelectItem) -> String {
    let mut options = Vec::new();
    if let Some(filter) = &item.filter {
        options.push(format!("$filter={}", write_node(&filter.expression)));
    }
    if let Some(order_by) = &item.order_by {
        options.push(format!("$orderby={}", write_order_by(order_by)));
    }
    if let Some(select) = write_select(&item.select_expand) {
        options.push(format!("$select={select}"));
    }
    if let Some(expand) = write_expand(&item.select_expand) {
        options.push(format!("$expand={expand}"));
    }
    if let Some(top) = item.top {
        options.push(format!("$top={top}"));
    }
    if let Some(skip) = item.skip {
        options.push(format!("$skip={skip}"));
    }
    if let Some(count) = item.count {
        options.push(format!("$count={count}"));
    }
    match item.levels {
        Some(ExpandLevels::Max) => options.push("$levels=max".to_string()),
        Some(ExpandLevels::Count(levels)) => options.push(format!("$levels={levels}")),
        None => {}
    }

    let path = item.path_text();
    if options.is_empty() {
        path
    } else {
        format!("{path}({})", options.join(";"))
    }
}
