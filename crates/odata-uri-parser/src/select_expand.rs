//! Syntactic parsing of `$select` and `$expand`
//!
//! Terms are split at top-level commas; expand terms may carry nested options
//! in parentheses, `Orders($filter=Amount gt 5;$top=3;$expand=Items)`. Nested
//! `$filter`/`$orderby` texts go through the expression parser with their
//! offsets kept, so errors point into the original option text.

use crate::expression::{parse_filter_at, parse_order_by_at};
use crate::query_options::{parse_count_at, parse_non_negative};
use crate::settings::ParserSettings;
use odata_uri_ast::{
    ExpandLevels, ExpandOptionsToken, ExpandTermToken, ExpandToken, SelectTermToken, SelectToken,
    Spanned,
};
use odata_uri_diagnostics::{
    ErrorCode, LimitKind, ODataError, Result, Span, ODU0006, ODU0011, ODU0017, ODU0020, ODU0400,
    ODU0401, ODU0402,
};

/// Parse a `$select` value
pub fn parse_select(text: &str, settings: &ParserSettings) -> Result<SelectToken> {
    parse_select_at(text, 0, settings)
}

/// Parse a `$select` value that starts at byte `base` of an enclosing text
pub fn parse_select_at(text: &str, base: usize, _settings: &ParserSettings) -> Result<SelectToken> {
    let mut terms = Vec::new();
    for (offset, part) in split_top_level(text, ',', base)? {
        let span = Span::new(base + offset, base + offset + part.len());
        if part.contains('(') {
            return Err(ODataError::syntax(
                ODU0402,
                format!("nested options are not allowed in $select term '{part}'"),
                span,
            ));
        }
        let segments = path_segments(part, base + offset, ODU0400)?;
        terms.push(SelectTermToken { segments, span });
    }
    Ok(SelectToken { terms })
}

/// Parse an `$expand` value
pub fn parse_expand(text: &str, settings: &ParserSettings) -> Result<ExpandToken> {
    parse_expand_at(text, 0, settings)
}

/// Parse an `$expand` value that starts at byte `base` of an enclosing text
pub fn parse_expand_at(text: &str, base: usize, settings: &ParserSettings) -> Result<ExpandToken> {
    ExpandParser { settings }.expand(text, base, 1)
}

struct ExpandParser<'s> {
    settings: &'s ParserSettings,
}

impl ExpandParser<'_> {
    fn expand(&self, text: &str, base: usize, depth: usize) -> Result<ExpandToken> {
        let mut terms = Vec::new();
        for (offset, part) in split_top_level(text, ',', base)? {
            terms.push(self.term(part, base + offset, depth)?);
        }
        Ok(ExpandToken { terms })
    }

    fn term(&self, text: &str, base: usize, depth: usize) -> Result<ExpandTermToken> {
        let span = Span::new(base, base + text.len());
        let (path, options) = match text.find('(') {
            Some(open) => {
                let Some(inner) = text[open + 1..].strip_suffix(')') else {
                    return Err(ODataError::syntax(
                        ODU0011,
                        format!("missing ')' in $expand term '{text}'"),
                        span,
                    ));
                };
                (&text[..open], Some((inner, base + open + 1)))
            }
            None => (text, None),
        };

        let segments = path_segments(path, base, ODU0401)?;
        // Orders/Items is an expansion nested inside Orders
        let nesting = depth + segments.len() - 1;
        if nesting > self.settings.select_expand_limit {
            return Err(ODataError::limit(
                LimitKind::SelectExpand,
                self.settings.select_expand_limit,
                span,
            ));
        }

        let options = match options {
            Some((inner, inner_base)) => self.options(inner, inner_base, nesting)?,
            None => ExpandOptionsToken::default(),
        };
        Ok(ExpandTermToken {
            segments,
            options,
            span,
        })
    }

    fn options(&self, text: &str, base: usize, depth: usize) -> Result<ExpandOptionsToken> {
        let mut options = ExpandOptionsToken::default();
        for (offset, part) in split_top_level(text, ';', base)? {
            let part_base = base + offset;
            let part_span = Span::new(part_base, part_base + part.len());
            let Some((name, value)) = part.split_once('=') else {
                return Err(ODataError::syntax(
                    ODU0020,
                    format!("expected name=value in expand options, found '{part}'"),
                    part_span,
                ));
            };
            let value_base = part_base + name.len() + 1;
            let value_span = Span::new(value_base, value_base + value.len());
            let duplicate = || {
                ODataError::syntax(ODU0017, format!("duplicate expand option '{name}'"), part_span)
            };

            match name {
                "$filter" => {
                    let filter = parse_filter_at(value, value_base, self.settings)?;
                    set_once(&mut options.filter, filter, duplicate)?;
                }
                "$orderby" => {
                    let order_by = parse_order_by_at(value, value_base, self.settings)?;
                    set_once(&mut options.order_by, order_by, duplicate)?;
                }
                "$select" => {
                    let select = parse_select_at(value, value_base, self.settings)?;
                    set_once(&mut options.select, select, duplicate)?;
                }
                "$expand" => {
                    let expand = self.expand(value, value_base, depth + 1)?;
                    set_once(&mut options.expand, expand, duplicate)?;
                }
                "$top" => {
                    let top = parse_non_negative(value, name, value_span)?;
                    set_once(&mut options.top, top, duplicate)?;
                }
                "$skip" => {
                    let skip = parse_non_negative(value, name, value_span)?;
                    set_once(&mut options.skip, skip, duplicate)?;
                }
                "$count" => {
                    let count = parse_count_at(value, value_span)?;
                    set_once(&mut options.count, count, duplicate)?;
                }
                "$levels" => {
                    let levels = parse_levels(value, value_span)?;
                    set_once(&mut options.levels, levels, duplicate)?;
                }
                other => {
                    return Err(ODataError::syntax(
                        ODU0020,
                        format!("'{other}' is not a valid expand option"),
                        Span::new(part_base, part_base + other.len()),
                    ));
                }
            }
        }
        Ok(options)
    }
}

fn set_once<T>(slot: &mut Option<T>, value: T, duplicate: impl FnOnce() -> ODataError) -> Result<()> {
    if slot.is_some() {
        return Err(duplicate());
    }
    *slot = Some(value);
    Ok(())
}

fn parse_levels(value: &str, span: Span) -> Result<ExpandLevels> {
    if value == "max" {
        return Ok(ExpandLevels::Max);
    }
    value
        .parse::<u32>()
        .ok()
        .filter(|levels| *levels > 0)
        .map(ExpandLevels::Count)
        .ok_or_else(|| {
            ODataError::syntax(
                ODU0020,
                format!("$levels must be a positive integer or 'max', found '{value}'"),
                span,
            )
        })
}

/// `/`-separated segments of a select or expand path
fn path_segments(
    text: &str,
    base: usize,
    code: ErrorCode,
) -> Result<Vec<Spanned<String>>> {
    let mut segments = Vec::new();
    let mut offset = 0;
    for segment in text.split('/') {
        let span = Span::new(base + offset, base + offset + segment.len());
        offset += segment.len() + 1;
        if !is_path_segment(segment) {
            return Err(ODataError::syntax(
                code,
                format!("invalid path segment '{segment}' in '{text}'"),
                span,
            ));
        }
        segments.push(Spanned::new(segment.to_string(), span));
    }
    Ok(segments)
}

fn is_path_segment(segment: &str) -> bool {
    if segment == "*" {
        return true;
    }
    let name = segment.strip_suffix(".*").unwrap_or(segment);
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '.')
        && !name.ends_with('.')
        && !name.contains("..")
}

/// Split at `separator` outside quotes and parentheses, returning each trimmed
/// part with its byte offset in `text`
pub(crate) fn split_top_level(text: &str, separator: char, base: usize) -> Result<Vec<(usize, &str)>> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut in_quote = false;
    let mut quote_start = 0;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        match c {
            '\'' => {
                in_quote = !in_quote;
                if in_quote {
                    quote_start = i;
                }
            }
            '(' if !in_quote => depth += 1,
            ')' if !in_quote => {
                if depth == 0 {
                    return Err(ODataError::syntax(
                        ODU0020,
                        "unbalanced ')'",
                        Span::new(base + i, base + i + 1),
                    ));
                }
                depth -= 1;
            }
            c if c == separator && !in_quote && depth == 0 => {
                push_trimmed(text, start, i, &mut parts);
                start = i + 1;
            }
            _ => {}
        }
    }
    if in_quote {
        return Err(ODataError::syntax(
            ODU0006,
            format!("unterminated string literal starting at position {}", base + quote_start),
            Span::new(base + quote_start, base + quote_start + 1),
        ));
    }
    if depth > 0 {
        return Err(ODataError::syntax(
            ODU0011,
            "missing closing parenthesis",
            Span::point(base + text.len()),
        ));
    }
    push_trimmed(text, start, text.len(), &mut parts);
    Ok(parts)
}

fn push_trimmed<'t>(text: &'t str, from: usize, to: usize, parts: &mut Vec<(usize, &'t str)>) {
    let raw = &text[from..to];
    let trimmed = raw.trim_start();
    let lead = raw.len() - trimmed.len();
    let trimmed = trimmed.trim_end();
    if !trimmed.is_empty() {
        parts.push((from + lead, trimmed));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use odata_uri_ast::{OrderByDirection, QueryToken};
    use odata_uri_diagnostics::{ODU0018, ODU0019, ODU0103};
    use pretty_assertions::assert_eq;

    fn settings() -> ParserSettings {
        ParserSettings::default()
    }

    #[test]
    fn test_select_terms() {
        let select = parse_select("Name, Address/City,*,Sales.*", &settings()).unwrap();
        let paths: Vec<String> = select.terms.iter().map(|t| t.path_text()).collect();
        assert_eq!(paths, vec!["Name", "Address/City", "*", "Sales.*"]);
        assert!(select.terms[2].is_wildcard());
        assert_eq!(select.terms[3].namespace_wildcard(), Some("Sales"));
        assert_eq!(select.terms[1].segments[1].span, Span::new(14, 18));
    }

    #[test]
    fn test_select_errors() {
        assert_eq!(parse_select("Name,Orders(x)", &settings()).unwrap_err().code(), ODU0402);
        assert_eq!(parse_select("Address//City", &settings()).unwrap_err().code(), ODU0400);
        assert_eq!(parse_select("Na-me", &settings()).unwrap_err().code(), ODU0400);
    }

    #[test]
    fn test_expand_with_nested_options() {
        let expand = parse_expand(
            "Orders($filter=Amount gt 5;$orderby=Amount desc;$top=3;$skip=1;$count=true;$select=Amount;$expand=Items($levels=2)),Manager",
            &settings(),
        )
        .unwrap();
        assert_eq!(expand.terms.len(), 2);
        let orders = &expand.terms[0];
        assert_eq!(orders.path_text(), "Orders");
        let options = &orders.options;
        assert!(matches!(
            options.filter.as_ref().map(|f| &f.inner),
            Some(QueryToken::BinaryOperator { .. })
        ));
        // the nested filter keeps its position in the $expand text
        assert_eq!(options.filter.as_ref().map(|f| f.span), Some(Span::new(15, 26)));
        assert_eq!(
            options.order_by.as_ref().map(|o| o[0].direction),
            Some(OrderByDirection::Descending)
        );
        assert_eq!((options.top, options.skip, options.count), (Some(3), Some(1), Some(true)));
        assert_eq!(options.select.as_ref().map(|s| s.terms.len()), Some(1));
        let items = &options.expand.as_ref().map(|e| e.terms[0].clone());
        assert_eq!(
            items.as_ref().and_then(|i| i.options.levels),
            Some(ExpandLevels::Count(2))
        );
        assert!(expand.terms[1].options.is_empty());
    }

    #[test]
    fn test_legacy_multi_segment_expand() {
        let expand = parse_expand("Orders/Items", &settings()).unwrap();
        assert_eq!(expand.terms[0].segments.len(), 2);
    }

    #[test]
    fn test_expand_option_errors() {
        let cases = [
            ("Orders($top=-1)", ODU0019),
            ("Orders($count=True)", ODU0018),
            ("Orders($levels=0)", ODU0020),
            ("Orders($search=x)", ODU0020),
            ("Orders($top=1;$top=2)", ODU0017),
            ("Orders($top=1", ODU0011),
            ("Orders)", ODU0020),
        ];
        for (text, code) in cases {
            assert_eq!(parse_expand(text, &settings()).unwrap_err().code(), code, "{text}");
        }
    }

    #[test]
    fn test_nested_filter_error_position() {
        let err = parse_expand("Orders($filter=Amount gt)", &settings()).unwrap_err();
        assert_eq!(err.span(), Some(Span::new(24, 24)));
    }

    #[test]
    fn test_expand_depth_limit() {
        let limited = settings().with_select_expand_limit(2);
        assert!(parse_expand("A($expand=B)", &limited).is_ok());
        let err = parse_expand("A($expand=B($expand=C))", &limited).unwrap_err();
        assert_eq!(err.code(), ODU0103);
        assert_eq!(parse_expand("A/B/C", &limited).unwrap_err().code(), ODU0103);
    }

    #[test]
    fn test_split_top_level_ignores_quoted_separators() {
        let parts = split_top_level("a, f('x,y') ,b", ',', 0).unwrap();
        assert_eq!(parts, vec![(0, "a"), (3, "f('x,y')"), (13, "b")]);
    }
}
