//! Query string splitting and scalar option values

use indexmap::IndexMap;
use odata_uri_diagnostics::{ODataError, Result, Span, ODU0016, ODU0017, ODU0018, ODU0019, ODU0022};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};

/// System query options understood by the parser
const SYSTEM_OPTIONS: &[&str] = &[
    "$filter", "$orderby", "$select", "$expand", "$top", "$skip", "$count",
];

/// System options that are carried through untouched as custom options
const PASSTHROUGH_OPTIONS: &[&str] = &["$format", "$skiptoken"];

/// A query string split into system, custom and alias options
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueryOptions {
    system: IndexMap<String, String>,
    custom: IndexMap<String, String>,
    aliases: IndexMap<String, String>,
}

impl QueryOptions {
    /// Value of a system option such as `$filter`
    pub fn system(&self, name: &str) -> Option<&str> {
        self.system.get(name).map(String::as_str)
    }

    pub fn filter(&self) -> Option<&str> {
        self.system("$filter")
    }

    pub fn order_by(&self) -> Option<&str> {
        self.system("$orderby")
    }

    pub fn select(&self) -> Option<&str> {
        self.system("$select")
    }

    pub fn expand(&self) -> Option<&str> {
        self.system("$expand")
    }

    /// Options without a `$` or `@` prefix, plus pass-through system options
    pub fn custom(&self) -> &IndexMap<String, String> {
        &self.custom
    }

    /// `@name=value` options keyed by name without the `@`
    pub fn aliases(&self) -> &IndexMap<String, String> {
        &self.aliases
    }

    /// Parse `$top`
    pub fn top(&self) -> Result<Option<u64>> {
        self.non_negative("$top")
    }

    /// Parse `$skip`
    pub fn skip(&self) -> Result<Option<u64>> {
        self.non_negative("$skip")
    }

    /// Parse `$count`
    pub fn count(&self) -> Result<Option<bool>> {
        self.system("$count").map(parse_count).transpose()
    }

    fn non_negative(&self, name: &str) -> Result<Option<u64>> {
        self.system(name)
            .map(|value| parse_non_negative(value, name, Span::new(0, value.len())))
            .transpose()
    }
}

/// Split and decode a query string (without the leading `?`)
pub fn parse_query_string(query: &str) -> Result<QueryOptions> {
    let mut options = QueryOptions::default();
    let mut offset = 0;
    for pair in query.split('&') {
        let span = Span::new(offset, offset + pair.len());
        offset += pair.len() + 1;
        if pair.is_empty() {
            continue;
        }
        let (raw_name, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
        let name = decode_component(raw_name, span)?;
        let value = decode_component(raw_value, span)?;
        let duplicate = || {
            ODataError::syntax(ODU0017, format!("query option '{name}' is specified more than once"), span)
        };

        if let Some(alias) = name.strip_prefix('@') {
            if options.aliases.insert(alias.to_string(), value).is_some() {
                return Err(duplicate());
            }
        } else if SYSTEM_OPTIONS.contains(&name.as_str()) {
            if options.system.contains_key(&name) {
                return Err(duplicate());
            }
            options.system.insert(name, value);
        } else if PASSTHROUGH_OPTIONS.contains(&name.as_str()) || !name.starts_with('$') {
            if SYSTEM_OPTIONS.contains(&format!("${name}").as_str()) {
                log::warn!("custom query option '{name}' looks like system option '${name}'");
            }
            if options.custom.insert(name.clone(), value).is_some() {
                return Err(duplicate());
            }
        } else {
            return Err(ODataError::syntax(
                ODU0016,
                format!("'{name}' is not a supported system query option"),
                span,
            ));
        }
    }
    log::trace!(
        "query string: {} system, {} custom, {} alias options",
        options.system.len(),
        options.custom.len(),
        options.aliases.len()
    );
    Ok(options)
}

fn decode_component(raw: &str, span: Span) -> Result<String> {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| ODataError::syntax(ODU0022, format!("invalid percent encoding in '{raw}'"), span))
}

/// Parse a `$count` value: exactly `true` or `false`
pub fn parse_count(text: &str) -> Result<bool> {
    parse_count_at(text, Span::new(0, text.len()))
}

pub(crate) fn parse_count_at(text: &str, span: Span) -> Result<bool> {
    match text {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(ODataError::syntax(
            ODU0018,
            format!("'{other}' is not a valid $count value"),
            span,
        )),
    }
}

/// Parse a `$top`/`$skip` value
pub(crate) fn parse_non_negative(text: &str, name: &str, span: Span) -> Result<u64> {
    if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(value) = text.parse::<u64>() {
            return Ok(value);
        }
    }
    Err(ODataError::syntax(
        ODU0019,
        format!("{name} must be a non-negative integer, found '{text}'"),
        span,
    ))
}
