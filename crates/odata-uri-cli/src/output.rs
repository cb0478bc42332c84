//! Output formatting utilities

use anyhow::{Context, Result};
use colored::Colorize;
use odata_uri::builder::{write_expand, write_node, write_order_by, write_path, write_select};
use odata_uri::{FilterClause, ODataUri, UrlConventions};
use serde::Serialize;

/// Format an error for display
pub fn format_error(error: &anyhow::Error) -> String {
    format!("{} {:#}", "Error:".red().bold(), error)
}

fn print_json(value: &impl Serialize) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize result")?;
    println!("{json}");
    Ok(())
}

fn print_field(label: &str, value: impl std::fmt::Display) {
    println!("{:>10} {value}", label.cyan().bold());
}

/// Print a parsed request URI, its segments and the rebuilt canonical form
pub fn print_uri(uri: &ODataUri, json: bool) -> Result<()> {
    if json {
        return print_json(uri);
    }
    let segments: Vec<&str> = uri.path().segments().iter().map(|s| s.kind_name()).collect();
    print_field("path", write_path(uri.path(), UrlConventions::Parentheses));
    print_field("segments", segments.join(" / "));
    print_field("target", uri.path().target_type());
    if let Some(filter) = uri.filter() {
        print_field("$filter", write_node(&filter.expression));
    }
    if let Some(order_by) = uri.order_by() {
        print_field("$orderby", write_order_by(order_by));
    }
    if let Some(clause) = uri.select_expand() {
        if let Some(select) = write_select(clause) {
            print_field("$select", select);
        }
        if let Some(expand) = write_expand(clause) {
            print_field("$expand", expand);
        }
    }
    if let Some(top) = uri.top() {
        print_field("$top", top);
    }
    if let Some(skip) = uri.skip() {
        print_field("$skip", skip);
    }
    if let Some(count) = uri.count() {
        print_field("$count", count);
    }
    for (name, value) in uri.parameter_aliases() {
        print_field(&format!("@{name}"), value);
    }
    println!();
    println!("{}", uri.to_uri_string().green());
    Ok(())
}

/// Print a bound filter and its canonical text
pub fn print_filter(filter: &FilterClause, json: bool) -> Result<()> {
    if json {
        return print_json(filter);
    }
    print_field("kind", filter.expression.kind_name());
    print_field("type", filter.expression.type_ref());
    println!();
    println!("{}", write_node(&filter.expression).green());
    Ok(())
}
