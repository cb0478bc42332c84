//! Lexer for OData expressions
//!
//! A single forward pass over the input. Token payloads are recognised with
//! winnow combinators; the driving loop tracks offsets so every token and every
//! error carries a span into the original text.

use chrono::{DateTime, NaiveDateTime};
use odata_uri_ast::{BinaryOperatorKind, LiteralValue, TimeSpan, UnaryOperatorKind};
use odata_uri_diagnostics::{
    ErrorCode, ODataError, Result, Span, ODU0001, ODU0002, ODU0003, ODU0004, ODU0005, ODU0006,
    ODU0007, ODU0008, ODU0009, ODU0010, ODU0011, ODU0013,
};
use rust_decimal::Decimal;
use std::str::FromStr;
use winnow::ascii::{digit1, multispace0};
use winnow::combinator::{opt, preceded, repeat};
use winnow::ModalResult;
use winnow::error::ContextError;
use winnow::prelude::*;
use winnow::token::{one_of, take_till, take_while};

/// Kind of a lexical token
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Plain, dotted (`NS.Type`) or `$`-prefixed identifier; `NS.*` included
    Identifier(String),
    Literal(LiteralValue),
    /// `@name`
    ParameterAlias(String),
    OpenParen,
    CloseParen,
    Comma,
    Slash,
    Colon,
    Star,
    Equal,
    Semicolon,
    /// `-` not directly followed by a number
    Minus,
    End,
}

impl TokenKind {
    /// Short description used in error messages
    pub fn describe(&self) -> String {
        match self {
            Self::Identifier(name) => format!("'{name}'"),
            Self::Literal(_) => "literal".to_string(),
            Self::ParameterAlias(name) => format!("'@{name}'"),
            Self::OpenParen => "'('".to_string(),
            Self::CloseParen => "')'".to_string(),
            Self::Comma => "','".to_string(),
            Self::Slash => "'/'".to_string(),
            Self::Colon => "':'".to_string(),
            Self::Star => "'*'".to_string(),
            Self::Equal => "'='".to_string(),
            Self::Semicolon => "';'".to_string(),
            Self::Minus => "'-'".to_string(),
            Self::End => "end of input".to_string(),
        }
    }
}

/// A lexical token with its location
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn is_end(&self) -> bool {
        self.kind == TokenKind::End
    }

    pub fn identifier(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Identifier(name) => Some(name),
            _ => None,
        }
    }

    /// Whether the token is the given identifier or keyword
    pub fn is_identifier(&self, expected: &str) -> bool {
        self.identifier() == Some(expected)
    }

    /// Binary operator keyword carried by this token
    pub fn binary_operator(&self) -> Option<BinaryOperatorKind> {
        self.identifier().and_then(BinaryOperatorKind::from_keyword)
    }

    /// Unary operator carried by this token
    pub fn unary_operator(&self) -> Option<UnaryOperatorKind> {
        match &self.kind {
            TokenKind::Minus => Some(UnaryOperatorKind::Negate),
            TokenKind::Identifier(name) if name == "not" => Some(UnaryOperatorKind::Not),
            _ => None,
        }
    }
}

/// Tokenize an expression
pub fn tokenize(text: &str) -> Result<Vec<Token>> {
    tokenize_at(text, 0)
}

/// Tokenize a sub-text that starts at byte `base` of an enclosing text
pub fn tokenize_at(text: &str, base: usize) -> Result<Vec<Token>> {
    let mut lexer = Lexer::new(text, base);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let end = token.is_end();
        tokens.push(token);
        if end {
            break;
        }
    }
    log::trace!("tokenized {} tokens from '{text}'", tokens.len());
    Ok(tokens)
}

struct Lexer<'a> {
    source: &'a str,
    input: &'a str,
    base: usize,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str, base: usize) -> Self {
        Self {
            source,
            input: source,
            base,
        }
    }

    fn offset(&self) -> usize {
        self.source.len() - self.input.len()
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(self.base + start, self.base + self.offset())
    }

    fn error(&self, code: ErrorCode, message: String, start: usize) -> ODataError {
        ODataError::syntax(code, message, self.span_from(start))
    }

    fn next_token(&mut self) -> Result<Token> {
        let _ = multispace0::<_, ContextError>.parse_next(&mut self.input);
        let start = self.offset();

        let Some(c) = self.input.chars().next() else {
            return Ok(Token::new(TokenKind::End, self.span_from(start)));
        };

        let punctuation = match c {
            '(' => Some(TokenKind::OpenParen),
            ')' => Some(TokenKind::CloseParen),
            ',' => Some(TokenKind::Comma),
            '/' => Some(TokenKind::Slash),
            ':' => Some(TokenKind::Colon),
            '*' => Some(TokenKind::Star),
            '=' => Some(TokenKind::Equal),
            ';' => Some(TokenKind::Semicolon),
            _ => None,
        };
        if let Some(kind) = punctuation {
            self.input = &self.input[1..];
            return Ok(Token::new(kind, self.span_from(start)));
        }

        match c {
            '\'' => {
                let text = self.quoted(start)?;
                Ok(Token::new(
                    TokenKind::Literal(LiteralValue::String(text)),
                    self.span_from(start),
                ))
            }
            '@' => {
                self.input = &self.input[1..];
                let name = identifier_segment
                    .parse_next(&mut self.input)
                    .map_err(|_| self.error(ODU0013, "expected a parameter alias name after '@'".into(), start))?;
                Ok(Token::new(
                    TokenKind::ParameterAlias(name.to_string()),
                    self.span_from(start),
                ))
            }
            '-' => {
                let rest = &self.input[1..];
                if rest.starts_with(|ch: char| ch.is_ascii_digit()) {
                    self.number(start)
                } else if is_negative_infinity(rest) {
                    self.input = rest;
                    self.special_float(start, true)
                } else {
                    self.input = rest;
                    Ok(Token::new(TokenKind::Minus, self.span_from(start)))
                }
            }
            c if c.is_ascii_digit() => self.number(start),
            c if is_identifier_start(c) => self.identifier_or_literal(start),
            other => {
                self.input = &self.input[other.len_utf8()..];
                Err(self.error(ODU0003, format!("invalid character '{other}'"), start))
            }
        }
    }

    /// Read a single-quoted payload, unescaping `''`
    fn quoted(&mut self, start: usize) -> Result<String> {
        self.input = &self.input[1..];
        let mut text = String::new();
        loop {
            let chunk: &str = take_till::<_, _, ContextError>(0.., '\'')
                .parse_next(&mut self.input)
                .unwrap_or_default();
            text.push_str(chunk);
            if self.input.is_empty() {
                let quote = Span::point(self.base + start);
                return Err(ODataError::syntax(
                    ODU0006,
                    format!("unterminated string literal starting at position {}", quote.start),
                    Span::new(quote.start, quote.start + 1),
                ));
            }
            if self.input.starts_with("''") {
                text.push('\'');
                self.input = &self.input[2..];
            } else {
                self.input = &self.input[1..];
                return Ok(text);
            }
        }
    }

    fn number(&mut self, start: usize) -> Result<Token> {
        let text = number_text
            .parse_next(&mut self.input)
            .map_err(|_| self.error(ODU0007, "invalid number".into(), start))?;
        let suffix = opt(one_of::<_, _, ContextError>([
            'L', 'l', 'M', 'm', 'D', 'd', 'F', 'f',
        ]))
        .parse_next(&mut self.input)
        .unwrap_or(None);

        if self.input.starts_with(is_identifier_part) {
            let _ = take_while::<_, _, ContextError>(0.., is_identifier_part)
                .parse_next(&mut self.input);
            return Err(self.error(
                ODU0007,
                format!("invalid number '{}'", &self.source[start..self.offset()]),
                start,
            ));
        }

        let value = classify_number(text, suffix)
            .ok_or_else(|| self.error(ODU0007, format!("invalid number '{text}'"), start))?;
        Ok(Token::new(TokenKind::Literal(value), self.span_from(start)))
    }

    /// `INF`, `-INF`, `NaN` with an optional `D`/`F` suffix; input is at `INF`/`NaN`
    fn special_float(&mut self, start: usize, negative: bool) -> Result<Token> {
        let word = identifier_segment
            .parse_next(&mut self.input)
            .map_err(|_| self.error(ODU0007, "invalid number".into(), start))?;
        let value = special_float_value(word, negative)
            .ok_or_else(|| self.error(ODU0007, format!("invalid number '{word}'"), start))?;
        Ok(Token::new(TokenKind::Literal(value), self.span_from(start)))
    }

    fn identifier_or_literal(&mut self, start: usize) -> Result<Token> {
        let checkpoint = self.input;
        let first = identifier_segment
            .parse_next(&mut self.input)
            .map_err(|_| self.error(ODU0013, "expected identifier".into(), start))?;

        if self.input.starts_with('\'') {
            return self.typed_literal(first, start);
        }
        if special_float_value(first, false).is_some() {
            self.input = checkpoint;
            return self.special_float(start, false);
        }

        let _ = dotted_tail.parse_next(&mut self.input);
        let text = &self.source[start..self.offset()];

        let kind = match text {
            "null" => TokenKind::Literal(LiteralValue::Null),
            "true" => TokenKind::Literal(LiteralValue::Boolean(true)),
            "false" => TokenKind::Literal(LiteralValue::Boolean(false)),
            _ => TokenKind::Identifier(text.to_string()),
        };
        Ok(Token::new(kind, self.span_from(start)))
    }

    fn typed_literal(&mut self, prefix: &str, start: usize) -> Result<Token> {
        let payload = self.quoted(start)?;
        let span = self.span_from(start);
        let invalid = |code, what: &str| {
            ODataError::syntax(code, format!("invalid {what} literal '{payload}'"), span)
        };

        let value = match prefix.to_ascii_lowercase().as_str() {
            "datetime" => LiteralValue::DateTime(
                parse_datetime(&payload).ok_or_else(|| invalid(ODU0008, "datetime"))?,
            ),
            "datetimeoffset" => LiteralValue::DateTimeOffset(
                DateTime::parse_from_rfc3339(&payload).map_err(|_| invalid(ODU0008, "datetimeoffset"))?,
            ),
            "time" => LiteralValue::Time(
                TimeSpan::parse_iso8601(&payload).ok_or_else(|| invalid(ODU0008, "time"))?,
            ),
            "guid" => {
                if !is_guid(&payload) {
                    return Err(invalid(ODU0009, "guid"));
                }
                LiteralValue::Guid(payload.to_ascii_lowercase())
            }
            "binary" | "x" => {
                LiteralValue::Binary(hex::decode(&payload).map_err(|_| invalid(ODU0010, "binary"))?)
            }
            "geography" | "geometry" if payload.trim().is_empty() => {
                return Err(invalid(ODU0004, prefix));
            }
            "geography" => LiteralValue::Geography(payload),
            "geometry" => LiteralValue::Geometry(payload),
            _ => {
                return Err(ODataError::syntax(
                    ODU0005,
                    format!("unrecognized literal prefix '{prefix}'"),
                    span,
                ));
            }
        };
        Ok(Token::new(TokenKind::Literal(value), span))
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_identifier_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn identifier_segment<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    (one_of(is_identifier_start), take_while(0.., is_identifier_part))
        .take()
        .parse_next(input)
}

/// `.Segment` repetitions and an optional trailing `.*`
fn dotted_tail<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    (
        repeat::<_, _, (), _, _>(0.., preceded('.', identifier_segment)),
        opt(".*"),
    )
        .take()
        .parse_next(input)
}

fn number_text<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    (
        opt('-'),
        digit1,
        opt(('.', digit1)),
        opt((one_of(['e', 'E']), opt(one_of(['+', '-'])), digit1)),
    )
        .take()
        .parse_next(input)
}

/// Assign the EDM kind of a numeric literal from its shape and suffix
fn classify_number(text: &str, suffix: Option<char>) -> Option<LiteralValue> {
    let integral = !text.contains(['.', 'e', 'E']);
    match suffix.map(|c| c.to_ascii_uppercase()) {
        None if integral => {
            if let Ok(v) = text.parse::<i32>() {
                Some(LiteralValue::Int32(v))
            } else if let Ok(v) = text.parse::<i64>() {
                Some(LiteralValue::Int64(v))
            } else {
                Decimal::from_str(text).ok().map(LiteralValue::Decimal)
            }
        }
        None | Some('D') => text.parse::<f64>().ok().map(LiteralValue::Double),
        Some('L') if integral => text.parse::<i64>().ok().map(LiteralValue::Int64),
        Some('M') => Decimal::from_str(text)
            .or_else(|_| Decimal::from_scientific(text))
            .ok()
            .map(LiteralValue::Decimal),
        Some('F') => text.parse::<f32>().ok().map(LiteralValue::Single),
        _ => None,
    }
}

/// `INF`, `INFD` or `INFF` as a whole word, not a prefix of a longer identifier
fn is_negative_infinity(rest: &str) -> bool {
    let mut peek = rest;
    identifier_segment
        .parse_next(&mut peek)
        .ok()
        .is_some_and(|word| special_float_value(word, true).is_some())
}

fn special_float_value(word: &str, negative: bool) -> Option<LiteralValue> {
    let (base, suffix) = match word.len() {
        3 => (word, None),
        4 => (word.get(..3)?, word.chars().last()),
        _ => return None,
    };
    let value = match (base, negative) {
        ("INF", false) => f64::INFINITY,
        ("INF", true) => f64::NEG_INFINITY,
        ("NaN", false) => f64::NAN,
        _ => return None,
    };
    match suffix {
        None | Some('D' | 'd') => Some(LiteralValue::Double(value)),
        Some('F' | 'f') => Some(LiteralValue::Single(value as f32)),
        _ => None,
    }
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .into_iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
}

/// `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`
fn is_guid(text: &str) -> bool {
    let groups: Vec<&str> = text.split('-').collect();
    groups.len() == 5
        && groups
            .iter()
            .zip([8, 4, 4, 4, 12])
            .all(|(group, len)| group.len() == len && group.bytes().all(|b| b.is_ascii_hexdigit()))
}

/// A cursor over lexed tokens; the final token is always `End`
#[derive(Debug, Clone)]
pub struct TokenStream {
    tokens: Vec<Token>,
    position: usize,
}

impl TokenStream {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            position: 0,
        }
    }

    /// Peek at the current token without consuming
    pub fn peek(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.position.min(last)]
    }

    /// Peek at a token n positions ahead
    pub fn peek_ahead(&self, n: usize) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[(self.position + n).min(last)]
    }

    /// Consume and return the current token; `End` is sticky
    pub fn next(&mut self) -> Token {
        let token = self.peek().clone();
        if !token.is_end() {
            self.position += 1;
        }
        token
    }

    pub fn is_end(&self) -> bool {
        self.peek().is_end()
    }

    /// Consume a token if it matches the predicate
    pub fn consume_if(&mut self, predicate: impl FnOnce(&TokenKind) -> bool) -> Option<Token> {
        if predicate(&self.peek().kind) {
            Some(self.next())
        } else {
            None
        }
    }

    /// Consume the expected token kind or fail with a syntax error
    pub fn expect(&mut self, expected: TokenKind) -> Result<Token> {
        let token = self.peek();
        if token.kind == expected {
            return Ok(self.next());
        }
        let code = if token.is_end() {
            ODU0002
        } else if expected == TokenKind::CloseParen {
            ODU0011
        } else {
            ODU0001
        };
        Err(ODataError::syntax(
            code,
            format!("expected {}, found {}", expected.describe(), token.kind.describe()),
            token.span,
        ))
    }

    /// Consume an identifier or fail
    pub fn expect_identifier(&mut self) -> Result<(String, Span)> {
        let token = self.peek();
        match &token.kind {
            TokenKind::Identifier(name) => {
                let result = (name.clone(), token.span);
                self.next();
                Ok(result)
            }
            other => Err(ODataError::syntax(
                ODU0013,
                format!("expected identifier, found {}", other.describe()),
                token.span,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn kinds(text: &str) -> Vec<TokenKind> {
        tokenize(text).unwrap().into_iter().map(|t| t.kind).collect()
    }

    fn single_literal(text: &str) -> LiteralValue {
        match kinds(text).as_slice() {
            [TokenKind::Literal(value), TokenKind::End] => value.clone(),
            other => panic!("expected single literal, got {other:?}"),
        }
    }

    #[rstest]
    #[case("42", LiteralValue::Int32(42))]
    #[case("-42", LiteralValue::Int32(-42))]
    #[case("3000000000", LiteralValue::Int64(3_000_000_000))]
    #[case("42L", LiteralValue::Int64(42))]
    #[case("1.5", LiteralValue::Double(1.5))]
    #[case("1e3", LiteralValue::Double(1000.0))]
    #[case("2.5D", LiteralValue::Double(2.5))]
    #[case("2.5f", LiteralValue::Single(2.5))]
    #[case("2.50M", LiteralValue::Decimal(Decimal::from_str("2.50").unwrap()))]
    #[case("-INF", LiteralValue::Double(f64::NEG_INFINITY))]
    #[case("INFf", LiteralValue::Single(f32::INFINITY))]
    #[case("true", LiteralValue::Boolean(true))]
    #[case("null", LiteralValue::Null)]
    #[case("'O''Neil'", LiteralValue::String("O'Neil".into()))]
    #[case("X'0AFF'", LiteralValue::Binary(vec![0x0a, 0xff]))]
    #[case("binary'00'", LiteralValue::Binary(vec![0]))]
    #[case(
        "guid'0E984725-C51C-4BF4-9960-E1C80E27ABA0'",
        LiteralValue::Guid("0e984725-c51c-4bf4-9960-e1c80e27aba0".into())
    )]
    #[case("time'PT13H20M'", LiteralValue::Time(TimeSpan::from_seconds(48_000)))]
    #[case("geography'SRID=4326;POINT(1 2)'", LiteralValue::Geography("SRID=4326;POINT(1 2)".into()))]
    fn test_literal_classification(#[case] text: &str, #[case] expected: LiteralValue) {
        assert_eq!(single_literal(text), expected);
    }

    #[test]
    fn test_minus_before_identifier_starting_with_inf() {
        assert_eq!(
            kinds("-INFO eq 1"),
            vec![
                TokenKind::Minus,
                TokenKind::Identifier("INFO".into()),
                TokenKind::Identifier("eq".into()),
                TokenKind::Literal(LiteralValue::Int32(1)),
                TokenKind::End,
            ]
        );
        assert_eq!(single_literal("-INFD"), LiteralValue::Double(f64::NEG_INFINITY));
    }

    #[test]
    fn test_nan_literal() {
        let LiteralValue::Double(v) = single_literal("NaN") else {
            panic!("expected double");
        };
        assert!(v.is_nan());
    }

    #[test]
    fn test_datetime_literals() {
        let LiteralValue::DateTime(dt) = single_literal("datetime'2024-03-01T10:15:30.25'") else {
            panic!("expected datetime");
        };
        assert_eq!(dt.to_string(), "2024-03-01 10:15:30.250");
        assert!(matches!(
            single_literal("datetimeoffset'2024-03-01T10:15:30+02:00'"),
            LiteralValue::DateTimeOffset(_)
        ));
    }

    #[test]
    fn test_identifiers_and_operators() {
        assert_eq!(
            kinds("Sales.Customer/Orders/$count ge 2"),
            vec![
                TokenKind::Identifier("Sales.Customer".into()),
                TokenKind::Slash,
                TokenKind::Identifier("Orders".into()),
                TokenKind::Slash,
                TokenKind::Identifier("$count".into()),
                TokenKind::Identifier("ge".into()),
                TokenKind::Literal(LiteralValue::Int32(2)),
                TokenKind::End,
            ]
        );
        assert_eq!(
            kinds("Sales.*"),
            vec![TokenKind::Identifier("Sales.*".into()), TokenKind::End]
        );
    }

    #[test]
    fn test_minus_separated_from_identifier() {
        assert_eq!(
            kinds("- Price"),
            vec![
                TokenKind::Minus,
                TokenKind::Identifier("Price".into()),
                TokenKind::End
            ]
        );
        assert_eq!(kinds("@p1")[0], TokenKind::ParameterAlias("p1".into()));
    }

    #[test]
    fn test_unterminated_string_points_at_quote() {
        let err = tokenize("Name eq 'abc").unwrap_err();
        assert_eq!(err.code(), ODU0006);
        assert_eq!(err.span(), Some(Span::new(8, 9)));
    }

    #[rstest]
    #[case("foo'bar'", ODU0005)]
    #[case("guid'123'", ODU0009)]
    #[case("X'0G'", ODU0010)]
    #[case("datetime'2024-13-01T00:00'", ODU0008)]
    #[case("12abc", ODU0007)]
    #[case("Price # 2", ODU0003)]
    fn test_lexer_errors(#[case] text: &str, #[case] code: ErrorCode) {
        assert_eq!(tokenize(text).unwrap_err().code(), code);
    }

    #[test]
    fn test_spans_shifted_by_base() {
        let tokens = tokenize_at("Amount gt 5", 15).unwrap();
        assert_eq!(tokens[0].span, Span::new(15, 21));
        assert_eq!(tokens[2].span, Span::new(25, 26));
    }

    #[test]
    fn test_token_stream_end_is_sticky() {
        let mut stream = TokenStream::new(tokenize("A").unwrap());
        assert!(stream.next().is_identifier("A"));
        assert!(stream.next().is_end());
        assert!(stream.next().is_end());
    }
}
