//! Expression writers for bound nodes and syntactic tokens
//!
//! Both writers share the parser's precedence table: a binary child gets
//! parentheses when [`BinaryOperatorKind::requires_grouping`] says so, and a
//! unary operand gets them whenever it is a binary expression. Implicit
//! conversions are written as their source and `$it/` prefixes are omitted.

use crate::literal::format_literal;
use odata_uri_ast::{BinaryOperatorKind, OperandSide, OrderByDirection, OrderByToken, QueryToken, UnaryOperatorKind};
use odata_uri_semantic::{
    CollectionNode, FunctionCallNode, LambdaNode, OrderByClause, QueryNode, SingleEntityNode, SingleValueNode,
};

/// Write a bound single-value expression as `$filter` text
pub fn write_node(node: &SingleValueNode) -> String {
    let mut writer = NodeWriter::default();
    writer.single(node);
    writer.out
}

/// Write a bound `$orderby`
pub fn write_order_by(clause: &OrderByClause) -> String {
    clause
        .items
        .iter()
        .map(|item| with_direction(write_node(&item.expression), item.direction))
        .collect::<Vec<_>>()
        .join(",")
}

/// Write a syntactic expression, keeping literals as they were spelled
pub fn write_token(token: &QueryToken) -> String {
    let mut writer = TokenWriter::default();
    writer.token(token);
    writer.out
}

/// Write parsed `$orderby` items
pub fn write_order_by_tokens(items: &[OrderByToken]) -> String {
    items
        .iter()
        .map(|item| with_direction(write_token(&item.expression.inner), item.direction))
        .collect::<Vec<_>>()
        .join(",")
}

fn with_direction(mut text: String, direction: OrderByDirection) -> String {
    if direction == OrderByDirection::Descending {
        text.push(' ');
        text.push_str(direction.keyword());
    }
    text
}

/// Prefix of a negation; a space keeps `- 5` from lexing as the literal `-5`
fn negation_prefix(operand: &str) -> &'static str {
    if operand.starts_with(|c: char| c.is_ascii_digit()) || operand.starts_with("INF") {
        "- "
    } else {
        "-"
    }
}

fn unary_prefix(operator: UnaryOperatorKind, operand: &str, grouped: bool) -> &'static str {
    match operator {
        UnaryOperatorKind::Not => "not ",
        UnaryOperatorKind::Negate if grouped => "-",
        UnaryOperatorKind::Negate => negation_prefix(operand),
    }
}

#[derive(Default)]
struct NodeWriter {
    out: String,
}

impl NodeWriter {
    fn single(&mut self, node: &SingleValueNode) {
        match node {
            SingleValueNode::Constant(constant) => self.out.push_str(&format_literal(&constant.value)),
            SingleValueNode::Convert { source, .. } => self.single(source),
            SingleValueNode::BinaryOperator {
                operator, left, right, ..
            } => {
                self.operand(*operator, left, OperandSide::Left);
                self.out.push(' ');
                self.out.push_str(operator.keyword());
                self.out.push(' ');
                self.operand(*operator, right, OperandSide::Right);
            }
            SingleValueNode::UnaryOperator { operator, operand, .. } => {
                let grouped = binary_kind(operand).is_some();
                let text = write_node(operand);
                self.out.push_str(unary_prefix(*operator, &text, grouped));
                self.grouped(&text, grouped);
            }
            SingleValueNode::PropertyAccess { source, property, .. } => self.member(source, property),
            SingleValueNode::OpenPropertyAccess { source, name } => self.member(source, name),
            SingleValueNode::FunctionCall(call) => self.call(call),
            SingleValueNode::RangeVariableReference(variable) => self.out.push_str(&variable.name),
            SingleValueNode::Any(lambda) => self.lambda("any", lambda),
            SingleValueNode::All(lambda) => self.lambda("all", lambda),
            SingleValueNode::Count { source } => {
                self.collection(source);
                self.out.push_str("/$count");
            }
            SingleValueNode::ParameterAlias { name, .. } => {
                self.out.push('@');
                self.out.push_str(name);
            }
            SingleValueNode::Entity(entity) => self.entity(entity),
        }
    }

    fn entity(&mut self, node: &SingleEntityNode) {
        match node {
            SingleEntityNode::RangeVariableReference(variable) => self.out.push_str(&variable.name),
            SingleEntityNode::Navigation { source, navigation, .. } => self.member(source, navigation),
            SingleEntityNode::Cast { source, type_name } => self.member(source, type_name),
            SingleEntityNode::FunctionCall(call) => self.call(call),
        }
    }

    fn collection(&mut self, node: &CollectionNode) {
        match node {
            CollectionNode::PropertyAccess { source, property, .. } => self.member(source, property),
            CollectionNode::Navigation { source, navigation, .. } => self.member(source, navigation),
            CollectionNode::Cast { source, type_name } => {
                self.collection(source);
                self.out.push('/');
                self.out.push_str(type_name);
            }
            CollectionNode::FunctionCall(call) => self.call(call),
        }
    }

    fn query(&mut self, node: &QueryNode) {
        match node {
            QueryNode::Single(node) => self.single(node),
            QueryNode::Collection(node) => self.collection(node),
        }
    }

    fn operand(&mut self, parent: BinaryOperatorKind, child: &SingleValueNode, side: OperandSide) {
        let grouped = binary_kind(child).is_some_and(|kind| parent.requires_grouping(&kind, side));
        let text = write_node(child);
        self.grouped(&text, grouped);
    }

    fn grouped(&mut self, text: &str, grouped: bool) {
        if grouped {
            self.out.push('(');
            self.out.push_str(text);
            self.out.push(')');
        } else {
            self.out.push_str(text);
        }
    }

    /// `source/name`, or just `name` when the source is `$it`
    fn member(&mut self, source: &SingleValueNode, name: &str) {
        if !is_implicit(source) {
            self.single(source);
            self.out.push('/');
        }
        self.out.push_str(name);
    }

    fn call(&mut self, call: &FunctionCallNode) {
        match call.source.as_deref() {
            Some(QueryNode::Single(source)) if is_implicit(source) => {}
            Some(source) => {
                self.query(source);
                self.out.push('/');
            }
            None => {}
        }
        self.out.push_str(&call.name);
        self.out.push('(');
        for (index, argument) in call.arguments.iter().enumerate() {
            if index > 0 {
                self.out.push(',');
            }
            if let Some(name) = &argument.name {
                self.out.push_str(name);
                self.out.push('=');
            }
            self.query(&argument.value);
        }
        self.out.push(')');
    }

    fn lambda(&mut self, keyword: &str, lambda: &LambdaNode) {
        self.collection(&lambda.source);
        self.out.push('/');
        self.out.push_str(keyword);
        self.out.push('(');
        if let (Some(variable), Some(body)) = (&lambda.variable, &lambda.body) {
            self.out.push_str(&variable.name);
            self.out.push(':');
            self.single(body);
        }
        self.out.push(')');
    }
}

/// Operator of a binary expression, seen through conversions
fn binary_kind(node: &SingleValueNode) -> Option<BinaryOperatorKind> {
    match node {
        SingleValueNode::BinaryOperator { operator, .. } => Some(*operator),
        SingleValueNode::Convert { source, .. } => binary_kind(source),
        _ => None,
    }
}

fn is_implicit(node: &SingleValueNode) -> bool {
    match node {
        SingleValueNode::RangeVariableReference(variable)
        | SingleValueNode::Entity(SingleEntityNode::RangeVariableReference(variable)) => variable.is_implicit(),
        SingleValueNode::Convert { source, .. } => is_implicit(source),
        _ => false,
    }
}

#[derive(Default)]
struct TokenWriter {
    out: String,
}

impl TokenWriter {
    fn token(&mut self, token: &QueryToken) {
        match token {
            QueryToken::BinaryOperator { operator, left, right } => {
                self.operand(*operator, &left.inner, OperandSide::Left);
                self.out.push(' ');
                self.out.push_str(operator.keyword());
                self.out.push(' ');
                self.operand(*operator, &right.inner, OperandSide::Right);
            }
            QueryToken::UnaryOperator { operator, operand } => {
                let grouped = matches!(operand.inner, QueryToken::BinaryOperator { .. });
                let text = write_token(&operand.inner);
                self.out.push_str(unary_prefix(*operator, &text, grouped));
                if grouped {
                    self.out.push('(');
                    self.out.push_str(&text);
                    self.out.push(')');
                } else {
                    self.out.push_str(&text);
                }
            }
            QueryToken::FunctionCall { name, arguments, source } => {
                self.source(source.as_deref().map(|s| &s.inner));
                self.out.push_str(name);
                self.out.push('(');
                for (index, argument) in arguments.iter().enumerate() {
                    if index > 0 {
                        self.out.push(',');
                    }
                    self.token(&argument.inner);
                }
                self.out.push(')');
            }
            QueryToken::Literal(literal) if !literal.original_text.is_empty() => {
                self.out.push_str(&literal.original_text);
            }
            QueryToken::Literal(literal) => self.out.push_str(&format_literal(&literal.value)),
            QueryToken::PropertyAccess { identifier, source } => {
                self.source(source.as_deref().map(|s| &s.inner));
                self.out.push_str(identifier);
            }
            QueryToken::RangeVariable(name) => self.out.push_str(name),
            QueryToken::Lambda {
                kind,
                source,
                parameter,
                body,
            } => {
                self.token(&source.inner);
                self.out.push('/');
                self.out.push_str(kind.keyword());
                self.out.push('(');
                if let (Some(parameter), Some(body)) = (parameter, body) {
                    self.out.push_str(parameter);
                    self.out.push(':');
                    self.token(&body.inner);
                }
                self.out.push(')');
            }
            QueryToken::TypeCast { type_name, source } => {
                self.source(source.as_deref().map(|s| &s.inner));
                self.out.push_str(type_name);
            }
            QueryToken::Count { source } => {
                self.token(&source.inner);
                self.out.push_str("/$count");
            }
            QueryToken::ParameterAlias(name) => {
                self.out.push('@');
                self.out.push_str(name);
            }
            QueryToken::NamedArgument { name, value } => {
                self.out.push_str(name);
                self.out.push('=');
                self.token(&value.inner);
            }
        }
    }

    fn source(&mut self, source: Option<&QueryToken>) {
        if let Some(source) = source {
            self.token(source);
            self.out.push('/');
        }
    }

    fn operand(&mut self, parent: BinaryOperatorKind, child: &QueryToken, side: OperandSide) {
        let grouped = match child {
            QueryToken::BinaryOperator { operator, .. } => parent.requires_grouping(operator, side),
            _ => false,
        };
        if grouped {
            self.out.push('(');
        }
        self.token(child);
        if grouped {
            self.out.push(')');
        }
    }
}
