//! Resource path splitting
//!
//! The syntactic half of path parsing: cut the path into `/`-separated raw
//! segments (ignoring slashes inside quotes and parentheses), percent-decode
//! each one and separate its identifier from a parenthesized argument list.
//! Resolving segments against the model happens in the semantic crate.

use crate::lexer::{tokenize_at, TokenKind, TokenStream};
use crate::settings::ParserSettings;
use odata_uri_ast::{QueryToken, Spanned};
use odata_uri_diagnostics::{
    LimitKind, ODataError, Result, Span, ODU0006, ODU0021, ODU0022, ODU0024,
};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};

/// One `/`-delimited piece of a resource path, not yet resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSegment {
    /// Decoded identifier before any `(`
    pub identifier: String,
    /// Decoded text between the outer parentheses, if present
    pub arguments: Option<String>,
    /// Segment text as it appears in the path, still percent-encoded
    pub encoded: String,
    /// Location of the whole segment in the path text
    pub span: Span,
    /// Byte offset of the argument text in the path text
    pub arguments_offset: usize,
}

impl RawSegment {
    /// Location of the identifier part
    pub fn identifier_span(&self) -> Span {
        self.path_span(Span::new(0, self.identifier.len()))
    }

    /// Map a span over the decoded segment text onto the encoded path
    fn path_span(&self, decoded: Span) -> Span {
        let at = |offset| self.span.start + encoded_offset(&self.encoded, offset);
        Span::new(at(decoded.start), at(decoded.end))
    }

    /// Parse the identifier as a single literal, for keys written as segments
    pub fn parse_identifier_literal(&self) -> Result<Spanned<QueryToken>> {
        parse_segment_literal(&self.identifier, 0)
            .map(|value| Spanned::new(value.inner, self.path_span(value.span)))
            .map_err(|error| error.map_span(|span| self.path_span(span)))
    }

    /// Whether the segment is `$metadata`, `$count`, `$1` and similar
    pub fn is_system(&self) -> bool {
        self.identifier.starts_with('$')
    }

    /// Parse the parenthesized argument list, if any
    pub fn parse_arguments(&self) -> Result<Vec<SegmentArgument>> {
        let Some(text) = &self.arguments else {
            return Ok(Vec::new());
        };
        // the argument text starts right after `(` in the decoded segment
        let arguments = parse_segment_arguments(text, self.identifier.len() + 1)
            .map_err(|error| error.map_span(|span| self.path_span(span)))?;
        Ok(arguments
            .into_iter()
            .map(|argument| SegmentArgument {
                name: argument
                    .name
                    .map(|name| Spanned::new(name.inner, self.path_span(name.span))),
                value: Spanned::new(argument.value.inner, self.path_span(argument.value.span)),
            })
            .collect())
    }
}

/// Byte offset in `encoded` at which its first `decoded` decoded bytes end
fn encoded_offset(encoded: &str, decoded: usize) -> usize {
    let bytes = encoded.as_bytes();
    let mut index = 0;
    for _ in 0..decoded {
        if index >= bytes.len() {
            break;
        }
        let escape = bytes[index] == b'%'
            && bytes.get(index + 1).is_some_and(u8::is_ascii_hexdigit)
            && bytes.get(index + 2).is_some_and(u8::is_ascii_hexdigit);
        index += if escape { 3 } else { 1 };
    }
    index.min(bytes.len())
}

/// A key value or operation parameter: `1`, `Id=1`, `p=@alias`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentArgument {
    pub name: Option<Spanned<String>>,
    pub value: Spanned<QueryToken>,
}

/// Split a resource path into raw segments
///
/// A leading `/` and a single trailing `/` are ignored; an empty segment in the
/// middle is an error. More than `path_limit` segments fail with a limit error.
pub fn split_path(path: &str, settings: &ParserSettings) -> Result<Vec<RawSegment>> {
    let mut segments = Vec::new();
    let trimmed_start = usize::from(path.starts_with('/'));
    let body = &path[trimmed_start..];
    let body = body.strip_suffix('/').unwrap_or(body);
    if body.is_empty() {
        return Ok(segments);
    }

    let mut start = 0;
    let mut depth = 0usize;
    let mut in_quote = false;
    let mut quote_start = 0;
    for (i, c) in body.char_indices() {
        match c {
            '\'' => {
                in_quote = !in_quote;
                if in_quote {
                    quote_start = i;
                }
            }
            '(' if !in_quote => depth += 1,
            ')' if !in_quote => depth = depth.saturating_sub(1),
            '/' if !in_quote && depth == 0 => {
                segments.push(raw_segment(&body[start..i], trimmed_start + start)?);
                start = i + 1;
            }
            _ => {}
        }
    }
    if in_quote {
        let at = trimmed_start + quote_start;
        return Err(ODataError::syntax(
            ODU0006,
            "unterminated string literal in path",
            Span::new(at, at + 1),
        ));
    }
    segments.push(raw_segment(&body[start..], trimmed_start + start)?);

    if segments.len() > settings.path_limit {
        let span = segments[settings.path_limit].span;
        return Err(ODataError::limit(LimitKind::Path, settings.path_limit, span));
    }
    log::trace!("split path '{path}' into {} segments", segments.len());
    Ok(segments)
}

fn raw_segment(encoded: &str, offset: usize) -> Result<RawSegment> {
    let span = Span::new(offset, offset + encoded.len());
    if encoded.is_empty() {
        return Err(ODataError::syntax(ODU0024, "empty path segment", span));
    }
    let decoded = percent_decode_str(encoded)
        .decode_utf8()
        .map_err(|_| ODataError::syntax(ODU0022, format!("invalid percent encoding in '{encoded}'"), span))?
        .into_owned();

    let Some(open) = find_unquoted(&decoded, '(') else {
        return Ok(RawSegment {
            identifier: decoded,
            arguments: None,
            encoded: encoded.to_string(),
            span,
            arguments_offset: span.end,
        });
    };
    if !decoded.ends_with(')') {
        return Err(ODataError::syntax(
            ODU0021,
            format!("segment '{decoded}' has unbalanced parentheses"),
            span,
        ));
    }
    Ok(RawSegment {
        identifier: decoded[..open].to_string(),
        arguments: Some(decoded[open + 1..decoded.len() - 1].to_string()),
        encoded: encoded.to_string(),
        span,
        arguments_offset: offset + encoded_offset(encoded, open + 1),
    })
}

fn find_unquoted(text: &str, target: char) -> Option<usize> {
    let mut in_quote = false;
    text.char_indices().find_map(|(i, c)| {
        if c == '\'' {
            in_quote = !in_quote;
        }
        (!in_quote && c == target).then_some(i)
    })
}

/// Parse `1`, `'a'`, `K1=1,K2='a'` or `p=@alias` argument text
pub fn parse_segment_arguments(text: &str, base: usize) -> Result<Vec<SegmentArgument>> {
    let mut tokens = TokenStream::new(tokenize_at(text, base)?);
    let mut arguments = Vec::new();
    if tokens.is_end() {
        return Ok(arguments);
    }
    loop {
        let named = matches!(tokens.peek().kind, TokenKind::Identifier(_))
            && tokens.peek_ahead(1).kind == TokenKind::Equal;
        let name = if named {
            let (name, span) = tokens.expect_identifier()?;
            tokens.next();
            Some(Spanned::new(name, span))
        } else {
            None
        };
        let value = segment_value(&mut tokens, text, base)?;
        arguments.push(SegmentArgument { name, value });

        let token = tokens.next();
        match token.kind {
            TokenKind::Comma => continue,
            TokenKind::End => return Ok(arguments),
            other => {
                return Err(ODataError::syntax(
                    ODU0021,
                    format!("expected ',' or end of arguments, found {}", other.describe()),
                    token.span,
                ));
            }
        }
    }
}

/// Parse a whole segment as one literal, used for keys written as segments
pub fn parse_segment_literal(text: &str, base: usize) -> Result<Spanned<QueryToken>> {
    let mut tokens = TokenStream::new(tokenize_at(text, base)?);
    let value = segment_value(&mut tokens, text, base)?;
    let rest = tokens.peek();
    if !rest.is_end() {
        return Err(ODataError::syntax(
            ODU0021,
            format!("unexpected {} after key value", rest.kind.describe()),
            rest.span,
        ));
    }
    Ok(value)
}

fn segment_value(tokens: &mut TokenStream, text: &str, base: usize) -> Result<Spanned<QueryToken>> {
    let token = tokens.next();
    match token.kind {
        TokenKind::Literal(value) => {
            let original = text
                .get(token.span.start - base..token.span.end - base)
                .unwrap_or_default();
            Ok(Spanned::new(QueryToken::literal(value, original), token.span))
        }
        TokenKind::ParameterAlias(name) => {
            Ok(Spanned::new(QueryToken::ParameterAlias(name), token.span))
        }
        other => Err(ODataError::syntax(
            ODU0021,
            format!("expected a key or parameter value, found {}", other.describe()),
            token.span,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use odata_uri_ast::LiteralValue;
    use odata_uri_diagnostics::ODU0102;
    use pretty_assertions::assert_eq;

    fn split(path: &str) -> Vec<RawSegment> {
        split_path(path, &ParserSettings::default()).unwrap()
    }

    #[test]
    fn test_split_with_keys_and_quotes() {
        let segments = split("Customers('A/B')/Orders(5)/ShipAddress");
        let names: Vec<&str> = segments.iter().map(|s| s.identifier.as_str()).collect();
        assert_eq!(names, vec!["Customers", "Orders", "ShipAddress"]);
        assert_eq!(segments[0].arguments.as_deref(), Some("'A/B'"));
        assert_eq!(segments[1].span, Span::new(17, 26));
        assert_eq!(segments[1].arguments_offset, 24);
        assert_eq!(segments[2].arguments, None);
    }

    #[test]
    fn test_leading_and_trailing_slash() {
        let segments = split("/Customers/");
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].span, Span::new(1, 10));
        assert!(split("").is_empty());
    }

    #[test]
    fn test_percent_decoding() {
        let segments = split("Customers('O%27%27Neil')/Sales.Vip%20Customer");
        assert_eq!(segments[0].arguments.as_deref(), Some("'O''Neil'"));
        assert_eq!(segments[1].identifier, "Sales.Vip Customer");
    }

    #[test]
    fn test_spans_point_into_encoded_path() {
        let segments = split("Products('a%20b',7)/Sales.Vip%20Customer");
        let arguments = segments[0].parse_arguments().unwrap();
        assert_eq!(arguments[0].value.span, Span::new(9, 16));
        assert_eq!(arguments[1].value.span, Span::new(17, 18));
        assert_eq!(segments[0].arguments_offset, 9);
        assert_eq!(segments[1].identifier_span(), Span::new(20, 40));

        let segments = split("Products('a%20b',x)");
        let err = segments[0].parse_arguments().unwrap_err();
        assert_eq!(err.code(), ODU0021);
        assert_eq!(err.span(), Some(Span::new(17, 18)));
    }

    #[test]
    fn test_split_errors() {
        let settings = ParserSettings::default();
        assert_eq!(
            split_path("Customers//Orders", &settings).unwrap_err().code(),
            ODU0024
        );
        assert_eq!(
            split_path("Customers('abc)", &settings).unwrap_err().code(),
            ODU0006
        );
        assert_eq!(
            split_path("Customers(1", &settings).unwrap_err().code(),
            ODU0021
        );
        assert_eq!(
            split_path("Customers%FF", &settings).unwrap_err().code(),
            ODU0022
        );
    }

    #[test]
    fn test_path_limit() {
        let settings = ParserSettings::default().with_path_limit(2);
        let err = split_path("A/B/C", &settings).unwrap_err();
        assert_eq!(err.code(), ODU0102);
        assert_eq!(err.span(), Some(Span::new(4, 5)));
    }

    #[test]
    fn test_composite_key_arguments() {
        let segments = split("OrderLines(OrderId=1,Product='x')");
        let arguments = segments[0].parse_arguments().unwrap();
        assert_eq!(arguments.len(), 2);
        assert_eq!(arguments[0].name.as_ref().map(|n| n.inner.as_str()), Some("OrderId"));
        assert_eq!(arguments[1].value.span, Span::new(29, 32));
        let QueryToken::Literal(literal) = &arguments[1].value.inner else {
            panic!("expected literal");
        };
        assert_eq!(literal.value, LiteralValue::String("x".into()));
    }

    #[test]
    fn test_argument_errors() {
        assert_eq!(parse_segment_arguments("1 2", 0).unwrap_err().code(), ODU0021);
        assert_eq!(parse_segment_arguments("Id=Name", 0).unwrap_err().code(), ODU0021);
        assert!(parse_segment_arguments("", 0).unwrap().is_empty());
        assert!(matches!(
            parse_segment_arguments("p=@x", 0).unwrap()[0].value.inner,
            QueryToken::ParameterAlias(_)
        ));
    }

    #[test]
    fn test_segment_literal() {
        let value = parse_segment_literal("42", 10).unwrap();
        assert_eq!(value.span, Span::new(10, 12));
        assert!(parse_segment_literal("42 43", 0).is_err());
    }
}
