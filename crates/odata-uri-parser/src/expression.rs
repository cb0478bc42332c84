//! Expression parser for `$filter` and `$orderby`
//!
//! Precedence climbing over a [`TokenStream`]. Binary operator precedence comes
//! from [`BinaryOperatorKind::precedence`], the same table the URI builder uses
//! to decide parenthesization, so parse and build agree on tree shape.
//!
//! Recursion is bounded: every parenthesized group, unary operand, call
//! argument list and lambda body enters one level of depth, and every node
//! created is counted. Exceeding either limit fails with
//! [`ODataError::LimitExceeded`] instead of growing the stack.

use crate::lexer::{tokenize_at, Token, TokenKind, TokenStream};
use crate::settings::ParserSettings;
use odata_uri_ast::{
    LambdaKind, OrderByDirection, OrderByToken, QueryToken, Spanned, IMPLICIT_RANGE_VARIABLE,
};
use odata_uri_diagnostics::{
    LimitKind, ODataError, Result, Span, ODU0001, ODU0002, ODU0012, ODU0013, ODU0014, ODU0015,
};

/// Parse a `$filter` expression
pub fn parse_filter(text: &str, settings: &ParserSettings) -> Result<Spanned<QueryToken>> {
    parse_filter_at(text, 0, settings)
}

/// Parse a `$filter` expression that starts at byte `base` of an enclosing text
pub fn parse_filter_at(
    text: &str,
    base: usize,
    settings: &ParserSettings,
) -> Result<Spanned<QueryToken>> {
    let mut parser = ExpressionParser::new(
        text,
        base,
        LimitKind::Filter,
        settings.filter_limit,
        settings.max_expression_count,
    )?;
    let expression = parser.parse_expression()?;
    parser.expect_end()?;
    Ok(expression)
}

/// Parse an `$orderby` list
pub fn parse_order_by(text: &str, settings: &ParserSettings) -> Result<Vec<OrderByToken>> {
    parse_order_by_at(text, 0, settings)
}

/// Parse an `$orderby` list that starts at byte `base` of an enclosing text
pub fn parse_order_by_at(
    text: &str,
    base: usize,
    settings: &ParserSettings,
) -> Result<Vec<OrderByToken>> {
    let mut parser = ExpressionParser::new(
        text,
        base,
        LimitKind::OrderBy,
        settings.order_by_limit,
        settings.max_expression_count,
    )?;
    parser.parse_order_by_items()
}

/// Recursive expression parser with depth and node accounting
pub struct ExpressionParser<'a> {
    source: &'a str,
    base: usize,
    tokens: TokenStream,
    limit: LimitKind,
    max_depth: usize,
    max_nodes: usize,
    depth: usize,
    nodes: usize,
    /// Lambda variables in scope, innermost last
    range_variables: Vec<String>,
}

impl<'a> ExpressionParser<'a> {
    /// Tokenize `source` and prepare to parse it
    pub fn new(
        source: &'a str,
        base: usize,
        limit: LimitKind,
        max_depth: usize,
        max_nodes: usize,
    ) -> Result<Self> {
        let tokens = TokenStream::new(tokenize_at(source, base)?);
        Ok(Self {
            source,
            base,
            tokens,
            limit,
            max_depth,
            max_nodes,
            depth: 0,
            nodes: 0,
            range_variables: Vec::new(),
        })
    }

    /// Number of nodes created so far
    pub fn node_count(&self) -> usize {
        self.nodes
    }

    /// Parse one complete expression
    pub fn parse_expression(&mut self) -> Result<Spanned<QueryToken>> {
        self.parse_binary(1)
    }

    /// Fail unless every token has been consumed
    pub fn expect_end(&mut self) -> Result<()> {
        let token = self.tokens.peek();
        if token.is_end() {
            return Ok(());
        }
        Err(ODataError::syntax(
            ODU0001,
            format!(
                "unexpected {} after the end of the expression",
                token.kind.describe()
            ),
            token.span,
        ))
    }

    /// `expr [asc|desc] (, expr [asc|desc])*`
    pub fn parse_order_by_items(&mut self) -> Result<Vec<OrderByToken>> {
        let mut items = Vec::new();
        loop {
            let expression = self.parse_expression()?;
            let direction = match self.tokens.peek().identifier() {
                Some(word) => match OrderByDirection::from_keyword(word) {
                    Some(direction) => {
                        self.tokens.next();
                        direction
                    }
                    None => {
                        let token = self.tokens.peek();
                        return Err(ODataError::syntax(
                            ODU0015,
                            format!("invalid sort direction '{word}', expected 'asc' or 'desc'"),
                            token.span,
                        ));
                    }
                },
                None => OrderByDirection::Ascending,
            };
            items.push(OrderByToken {
                expression,
                direction,
            });

            if self
                .tokens
                .consume_if(|kind| *kind == TokenKind::Comma)
                .is_none()
            {
                self.expect_end()?;
                return Ok(items);
            }
        }
    }

    fn parse_binary(&mut self, min_precedence: u8) -> Result<Spanned<QueryToken>> {
        let mut left = self.parse_unary()?;
        while let Some(operator) = self.tokens.peek().binary_operator() {
            let precedence = operator.precedence();
            if precedence < min_precedence {
                break;
            }
            self.tokens.next();
            // Right operand binds one level tighter: equal precedence nests left
            let right = self.parse_binary(precedence + 1)?;
            let span = left.span.merge(right.span);
            left = self.node(QueryToken::binary(operator, left, right), span)?;
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Spanned<QueryToken>> {
        let token = self.tokens.peek().clone();
        let Some(operator) = token.unary_operator() else {
            let primary = self.parse_primary()?;
            return self.parse_postfix(primary);
        };
        self.tokens.next();
        self.enter(token.span)?;
        let operand = self.parse_unary();
        self.leave();
        let operand = operand?;
        let span = token.span.merge(operand.span);
        self.node(QueryToken::unary(operator, operand), span)
    }

    fn parse_primary(&mut self) -> Result<Spanned<QueryToken>> {
        let token = self.tokens.next();
        match token.kind {
            TokenKind::OpenParen => {
                self.enter(token.span)?;
                let inner = self.parse_binary(1);
                self.leave();
                let inner = inner?;
                let close = self.tokens.expect(TokenKind::CloseParen)?;
                Ok(Spanned::new(inner.inner, token.span.merge(close.span)))
            }
            TokenKind::Literal(value) => {
                let text = self.text(token.span).to_string();
                self.node(QueryToken::literal(value, text), token.span)
            }
            TokenKind::ParameterAlias(name) => {
                self.node(QueryToken::ParameterAlias(name), token.span)
            }
            TokenKind::Identifier(name) => self.parse_identifier(name, token.span, None),
            TokenKind::End => Err(ODataError::syntax(
                ODU0002,
                "expected an expression, found end of input",
                token.span,
            )),
            other => Err(ODataError::syntax(
                ODU0012,
                format!("expected an expression, found {}", other.describe()),
                token.span,
            )),
        }
    }

    /// `primary (/ segment)*`
    fn parse_postfix(&mut self, mut expression: Spanned<QueryToken>) -> Result<Spanned<QueryToken>> {
        while self
            .tokens
            .consume_if(|kind| *kind == TokenKind::Slash)
            .is_some()
        {
            let token = self.tokens.next();
            let TokenKind::Identifier(name) = token.kind else {
                return Err(ODataError::syntax(
                    ODU0013,
                    format!("expected a member name after '/', found {}", token.kind.describe()),
                    token.span,
                ));
            };
            expression = self.parse_member(name, token.span, expression)?;
        }
        Ok(expression)
    }

    fn parse_member(
        &mut self,
        name: String,
        span: Span,
        source: Spanned<QueryToken>,
    ) -> Result<Spanned<QueryToken>> {
        if self.tokens.peek().kind == TokenKind::OpenParen {
            if let Some(kind) = LambdaKind::from_keyword(&name) {
                return self.parse_lambda(kind, span, source);
            }
        }
        if name == "$count" {
            let span = source.span.merge(span);
            return self.node(
                QueryToken::Count {
                    source: Box::new(source),
                },
                span,
            );
        }
        self.parse_identifier(name, span, Some(source))
    }

    /// An identifier in primary or member position
    fn parse_identifier(
        &mut self,
        name: String,
        span: Span,
        source: Option<Spanned<QueryToken>>,
    ) -> Result<Spanned<QueryToken>> {
        let full_span = source.as_ref().map_or(span, |s| s.span.merge(span));

        if self.tokens.peek().kind == TokenKind::OpenParen {
            let (arguments, close) = self.parse_arguments(span)?;
            return self.node(
                QueryToken::FunctionCall {
                    name,
                    arguments,
                    source: source.map(Box::new),
                },
                full_span.merge(close),
            );
        }

        if source.is_none() && self.is_range_variable(&name) {
            return self.node(QueryToken::RangeVariable(name), span);
        }

        let token = if name.contains('.') {
            QueryToken::TypeCast {
                type_name: name,
                source: source.map(Box::new),
            }
        } else {
            QueryToken::property(name, source)
        };
        self.node(token, full_span)
    }

    /// `( [arg (, arg)*] )`, where an argument may be `name=value`
    fn parse_arguments(&mut self, call_span: Span) -> Result<(Vec<Spanned<QueryToken>>, Span)> {
        let open = self.tokens.expect(TokenKind::OpenParen)?;
        if let Some(close) = self.tokens.consume_if(|kind| *kind == TokenKind::CloseParen) {
            return Ok((Vec::new(), close.span));
        }

        self.enter(call_span.merge(open.span))?;
        let arguments = self.parse_argument_list();
        self.leave();
        let arguments = arguments?;
        let close = self.tokens.expect(TokenKind::CloseParen)?;
        Ok((arguments, close.span))
    }

    fn parse_argument_list(&mut self) -> Result<Vec<Spanned<QueryToken>>> {
        let mut arguments = Vec::new();
        loop {
            let named = matches!(self.tokens.peek().kind, TokenKind::Identifier(_))
                && self.tokens.peek_ahead(1).kind == TokenKind::Equal;
            let argument = if named {
                let (name, name_span) = self.tokens.expect_identifier()?;
                self.tokens.next();
                let value = self.parse_expression()?;
                let span = name_span.merge(value.span);
                self.node(
                    QueryToken::NamedArgument {
                        name,
                        value: Box::new(value),
                    },
                    span,
                )?
            } else {
                self.parse_expression()?
            };
            arguments.push(argument);

            if self
                .tokens
                .consume_if(|kind| *kind == TokenKind::Comma)
                .is_none()
            {
                return Ok(arguments);
            }
        }
    }

    /// `source/any(v: body)`, `source/all(v: body)` or `source/any()`
    fn parse_lambda(
        &mut self,
        kind: LambdaKind,
        keyword_span: Span,
        source: Spanned<QueryToken>,
    ) -> Result<Spanned<QueryToken>> {
        let open = self.tokens.expect(TokenKind::OpenParen)?;
        if let Some(close) = self.tokens.consume_if(|kind| *kind == TokenKind::CloseParen) {
            if kind == LambdaKind::All {
                return Err(ODataError::syntax(
                    ODU0014,
                    "'all' requires a range variable and a predicate",
                    keyword_span.merge(close.span),
                ));
            }
            let span = source.span.merge(close.span);
            return self.node(
                QueryToken::Lambda {
                    kind,
                    source: Box::new(source),
                    parameter: None,
                    body: None,
                },
                span,
            );
        }

        let variable = self.lambda_variable()?;
        if self.tokens.consume_if(|kind| *kind == TokenKind::Colon).is_none() {
            let token = self.tokens.peek();
            return Err(ODataError::syntax(
                ODU0014,
                format!(
                    "expected ':' after lambda variable '{variable}', found {}",
                    token.kind.describe()
                ),
                token.span,
            ));
        }

        self.enter(keyword_span.merge(open.span))?;
        self.range_variables.push(variable.clone());
        let body = self.parse_expression();
        self.range_variables.pop();
        self.leave();
        let body = body?;

        let close = self.tokens.expect(TokenKind::CloseParen)?;
        let span = source.span.merge(close.span);
        self.node(
            QueryToken::Lambda {
                kind,
                source: Box::new(source),
                parameter: Some(variable),
                body: Some(Box::new(body)),
            },
            span,
        )
    }

    fn lambda_variable(&mut self) -> Result<String> {
        let token: Token = self.tokens.next();
        match token.kind {
            TokenKind::Identifier(name)
                if !name.contains('.') && !name.starts_with('$') =>
            {
                Ok(name)
            }
            other => Err(ODataError::syntax(
                ODU0014,
                format!("expected a lambda variable name, found {}", other.describe()),
                token.span,
            )),
        }
    }

    fn is_range_variable(&self, name: &str) -> bool {
        name == IMPLICIT_RANGE_VARIABLE || self.range_variables.iter().any(|v| v == name)
    }

    fn enter(&mut self, span: Span) -> Result<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            self.depth -= 1;
            return Err(ODataError::limit(self.limit, self.max_depth, span));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn node(&mut self, token: QueryToken, span: Span) -> Result<Spanned<QueryToken>> {
        self.nodes += 1;
        if self.nodes > self.max_nodes {
            return Err(ODataError::limit(
                LimitKind::ExpressionCount,
                self.max_nodes,
                span,
            ));
        }
        Ok(Spanned::new(token, span))
    }

    /// Source text under a span produced by this parser's tokens
    fn text(&self, span: Span) -> &'a str {
        let start = span.start.saturating_sub(self.base);
        let end = span.end.saturating_sub(self.base);
        self.source.get(start..end).unwrap_or_default()
    }
}
