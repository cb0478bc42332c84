//! Full request URI writer

use crate::expression::{write_node, write_order_by};
use crate::path::write_path;
use crate::select_expand::{write_expand, write_select};
use odata_uri_parser::UrlConventions;
use odata_uri_semantic::{FilterClause, ODataPath, OrderByClause, SelectExpandClause};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

/// Characters escaped in query option values. OData punctuation such as
/// `$ ( ) ' , ; / : @ =` stays readable.
const QUERY_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'{')
    .add(b'}');

const PATH_SEGMENT: &AsciiSet = &QUERY_VALUE.add(b'/').add(b'?');

const QUERY_NAME: &AsciiSet = &QUERY_VALUE.add(b'=');

pub(crate) fn encode_path_segment(text: &str) -> String {
    utf8_percent_encode(text, PATH_SEGMENT).to_string()
}

/// The pieces of a request URI, borrowed from whoever holds them
#[derive(Debug, Default, Clone)]
pub struct UriParts<'a> {
    pub path: Option<&'a ODataPath>,
    pub filter: Option<&'a FilterClause>,
    pub order_by: Option<&'a OrderByClause>,
    pub select_expand: Option<&'a SelectExpandClause>,
    pub top: Option<u64>,
    pub skip: Option<u64>,
    pub count: Option<bool>,
    /// Alias name without `@`, and its raw value text
    pub parameter_aliases: Vec<(&'a str, &'a str)>,
    pub custom_options: Vec<(&'a str, &'a str)>,
}

/// Write `service_root` followed by the path and query options.
///
/// System options come in a fixed order, then aliases, then custom options
/// in the order given. Every option is written as `name=value`, so an empty
/// value keeps its `=` and a bare `name` read from a request comes back as
/// `name=`; both parse to the same empty value.
pub fn write_uri(service_root: &str, parts: &UriParts<'_>, conventions: UrlConventions) -> String {
    let mut uri = service_root.trim_end_matches('/').to_string();
    if let Some(path) = parts.path.filter(|path| !path.is_empty()) {
        uri.push('/');
        uri.push_str(&write_path(path, conventions));
    }

    let mut options: Vec<(String, String)> = Vec::new();
    if let Some(filter) = parts.filter {
        options.push(("$filter".into(), write_node(&filter.expression)));
    }
    if let Some(order_by) = parts.order_by {
        options.push(("$orderby".into(), write_order_by(order_by)));
    }
    if let Some(clause) = parts.select_expand {
        if let Some(select) = write_select(clause) {
            options.push(("$select".into(), select));
        }
        if let Some(expand) = write_expand(clause) {
            options.push(("$expand".into(), expand));
        }
    }
    if let Some(top) = parts.top {
        options.push(("$top".into(), top.to_string()));
    }
    if let Some(skip) = parts.skip {
        options.push(("$skip".into(), skip.to_string()));
    }
    if let Some(count) = parts.count {
        options.push(("$count".into(), count.to_string()));
    }
    for (name, value) in &parts.parameter_aliases {
        options.push((format!("@{name}"), (*value).to_string()));
    }
    for (name, value) in &parts.custom_options {
        options.push(((*name).to_string(), (*value).to_string()));
    }

    if !options.is_empty() {
        let query: Vec<String> = options
            .iter()
            .map(|(name, value)| {
                format!(
                    "{}={}",
                    utf8_percent_encode(name, QUERY_NAME),
                    utf8_percent_encode(value, QUERY_VALUE)
                )
            })
            .collect();
        uri.push('?');
        uri.push_str(&query.join("&"));
    }
    log::trace!("wrote uri {uri}");
    uri
}
