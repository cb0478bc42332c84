//! Resource path writer

use crate::literal::{format_literal, quote};
use crate::uri::encode_path_segment;
use odata_uri_ast::LiteralValue;
use odata_uri_edm::OperationKind;
use odata_uri_parser::UrlConventions;
use odata_uri_semantic::{KeyValue, ODataPath, OperationParameter, PathSegment, SegmentValue};

/// Write a bound path relative to the service root, without a leading `/`.
///
/// Single-property keys become their own segment under
/// [`UrlConventions::KeyAsSegment`]; composite keys always use parentheses.
pub fn write_path(path: &ODataPath, conventions: UrlConventions) -> String {
    let mut segments: Vec<String> = Vec::with_capacity(path.len());
    for segment in path {
        match segment {
            PathSegment::Key { keys, .. } => match (conventions, keys.as_slice()) {
                (UrlConventions::KeyAsSegment, [only]) => {
                    segments.push(encode_path_segment(&key_segment_text(&only.value)));
                }
                _ => {
                    let key = encode_path_segment(&parenthesized_key(keys));
                    match segments.last_mut() {
                        Some(previous) => previous.push_str(&key),
                        None => segments.push(key),
                    }
                }
            },
            other => segments.push(encode_path_segment(&segment_text(other))),
        }
    }
    segments.join("/")
}

/// Literal or `@alias` text of a key or parameter value
pub fn write_segment_value(value: &SegmentValue) -> String {
    match value {
        SegmentValue::Literal(literal) => format_literal(literal),
        SegmentValue::Alias(name) => format!("@{name}"),
    }
}

fn segment_text(segment: &PathSegment) -> String {
    match segment {
        PathSegment::Metadata => "$metadata".to_string(),
        PathSegment::Batch => "$batch".to_string(),
        PathSegment::BatchReference { content_id, .. } => format!("${content_id}"),
        PathSegment::EntitySet { name, .. }
        | PathSegment::Singleton { name, .. }
        | PathSegment::NavigationProperty { name, .. }
        | PathSegment::Property { name, .. }
        | PathSegment::OpenProperty { name } => name.clone(),
        PathSegment::TypeCast { type_name, .. } => type_name.clone(),
        PathSegment::Operation {
            name, kind, parameters, ..
        }
        | PathSegment::OperationImport {
            name, kind, parameters, ..
        } => operation_text(name, *kind, parameters),
        PathSegment::Ref { .. } => "$ref".to_string(),
        PathSegment::Value { .. } => "$value".to_string(),
        PathSegment::Count => "$count".to_string(),
        PathSegment::Unresolved { identifier, .. } => identifier.clone(),
        PathSegment::Key { keys, .. } => parenthesized_key(keys),
    }
}

fn operation_text(name: &str, kind: OperationKind, parameters: &[OperationParameter]) -> String {
    // actions are invoked without parentheses
    if kind == OperationKind::Action {
        return name.to_string();
    }
    let parameters: Vec<String> = parameters
        .iter()
        .map(|p| format!("{}={}", p.name, write_segment_value(&p.value)))
        .collect();
    format!("{name}({})", parameters.join(","))
}

fn parenthesized_key(keys: &[KeyValue]) -> String {
    let values: Vec<String> = match keys {
        [only] => vec![write_segment_value(&only.value)],
        _ => keys
            .iter()
            .map(|k| format!("{}={}", k.name, write_segment_value(&k.value)))
            .collect(),
    };
    format!("({})", values.join(","))
}

/// Strings that cannot be mistaken for another literal are written bare
fn key_segment_text(value: &SegmentValue) -> String {
    match value {
        SegmentValue::Literal(LiteralValue::String(text)) if is_bare_key(text) => text.clone(),
        SegmentValue::Literal(LiteralValue::String(text)) => quote(text),
        other => write_segment_value(other),
    }
}

fn is_bare_key(text: &str) -> bool {
    let mut chars = text.chars();
    let starts_alphabetic = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    let keyword = matches!(text, "null" | "true" | "false")
        || ["INF", "NaN"].iter().any(|special| {
            text.strip_prefix(special)
                .is_some_and(|suffix| matches!(suffix, "" | "D" | "d" | "F" | "f"))
        });
    starts_alphabetic && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') && !keyword
}
