//! OData operators with precedence information
//!
//! The precedence table here is shared by the expression parser and the URI
//! builder, so a tree written by the builder parses back into the same shape.

use serde::{Deserialize, Serialize};

/// Binary operators in OData `$filter` / `$orderby` expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOperatorKind {
    // Precedence 1 (lowest)
    Or,

    // Precedence 2
    And,

    // Precedence 3
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Has,

    // Precedence 4
    Add,
    Subtract,

    // Precedence 5
    Multiply,
    Divide,
    Modulo,
}

/// Which operand of a binary operator a child expression sits in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandSide {
    Left,
    Right,
}

impl BinaryOperatorKind {
    /// Every binary operator, lowest precedence first
    pub const ALL: [Self; 14] = [
        Self::Or,
        Self::And,
        Self::Equal,
        Self::NotEqual,
        Self::GreaterThan,
        Self::GreaterThanOrEqual,
        Self::LessThan,
        Self::LessThanOrEqual,
        Self::Has,
        Self::Add,
        Self::Subtract,
        Self::Multiply,
        Self::Divide,
        Self::Modulo,
    ];

    /// Get the precedence level (1-5, higher binds tighter)
    pub const fn precedence(&self) -> u8 {
        match self {
            Self::Or => 1,
            Self::And => 2,
            Self::Equal
            | Self::NotEqual
            | Self::GreaterThan
            | Self::GreaterThanOrEqual
            | Self::LessThan
            | Self::LessThanOrEqual
            | Self::Has => 3,
            Self::Add | Self::Subtract => 4,
            Self::Multiply | Self::Divide | Self::Modulo => 5,
        }
    }

    /// Look up an operator by its keyword (case-sensitive)
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.keyword() == keyword)
    }

    /// Get the operator keyword
    pub const fn keyword(&self) -> &'static str {
        match self {
            Self::Or => "or",
            Self::And => "and",
            Self::Equal => "eq",
            Self::NotEqual => "ne",
            Self::GreaterThan => "gt",
            Self::GreaterThanOrEqual => "ge",
            Self::LessThan => "lt",
            Self::LessThanOrEqual => "le",
            Self::Has => "has",
            Self::Add => "add",
            Self::Subtract => "sub",
            Self::Multiply => "mul",
            Self::Divide => "div",
            Self::Modulo => "mod",
        }
    }

    pub const fn is_logical(&self) -> bool {
        matches!(self, Self::And | Self::Or)
    }

    pub const fn is_equality(&self) -> bool {
        matches!(self, Self::Equal | Self::NotEqual)
    }

    /// Ordering comparison (`gt`, `ge`, `lt`, `le`)
    pub const fn is_relational(&self) -> bool {
        matches!(
            self,
            Self::GreaterThan | Self::GreaterThanOrEqual | Self::LessThan | Self::LessThanOrEqual
        )
    }

    /// Any operator producing a boolean from non-boolean operands
    pub const fn is_comparison(&self) -> bool {
        self.is_equality() || self.is_relational() || matches!(self, Self::Has)
    }

    pub const fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            Self::Add | Self::Subtract | Self::Multiply | Self::Divide | Self::Modulo
        )
    }

    /// Whether a child expression needs parentheses inside this operator.
    ///
    /// Lower precedence children always need them, higher precedence children
    /// never do. For equal precedence the left operand never needs them since
    /// chains nest left-to-right; every right operand pair is marked so an
    /// authored `a sub (b sub c)` or `a or (b or c)` keeps its shape.
    pub const fn requires_grouping(&self, child: &Self, side: OperandSide) -> bool {
        let parent = self.precedence();
        let child = child.precedence();
        if child < parent {
            return true;
        }
        if child > parent {
            return false;
        }
        matches!(side, OperandSide::Right)
    }
}

impl std::fmt::Display for BinaryOperatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Unary operators (precedence 6, above every binary operator)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOperatorKind {
    /// Arithmetic negation (`-`)
    Negate,
    /// Logical not
    Not,
}

impl UnaryOperatorKind {
    pub const fn precedence(&self) -> u8 {
        6
    }

    /// Get the operator symbol as written in a URI
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::Negate => "-",
            Self::Not => "not",
        }
    }
}

impl std::fmt::Display for UnaryOperatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_precedence_order() {
        assert!(BinaryOperatorKind::Multiply.precedence() > BinaryOperatorKind::Add.precedence());
        assert!(BinaryOperatorKind::Add.precedence() > BinaryOperatorKind::Equal.precedence());
        assert!(BinaryOperatorKind::Equal.precedence() > BinaryOperatorKind::And.precedence());
        assert!(BinaryOperatorKind::And.precedence() > BinaryOperatorKind::Or.precedence());
        assert!(UnaryOperatorKind::Not.precedence() > BinaryOperatorKind::Modulo.precedence());
    }

    #[rstest]
    #[case("eq", Some(BinaryOperatorKind::Equal))]
    #[case("mod", Some(BinaryOperatorKind::Modulo))]
    #[case("has", Some(BinaryOperatorKind::Has))]
    #[case("EQ", None)]
    #[case("not", None)]
    fn test_from_keyword(#[case] keyword: &str, #[case] expected: Option<BinaryOperatorKind>) {
        assert_eq!(BinaryOperatorKind::from_keyword(keyword), expected);
    }

    #[rstest]
    #[case(BinaryOperatorKind::And, BinaryOperatorKind::Or, OperandSide::Left, true)]
    #[case(BinaryOperatorKind::Or, BinaryOperatorKind::And, OperandSide::Right, false)]
    #[case(BinaryOperatorKind::Subtract, BinaryOperatorKind::Add, OperandSide::Left, false)]
    #[case(BinaryOperatorKind::Subtract, BinaryOperatorKind::Add, OperandSide::Right, true)]
    #[case(BinaryOperatorKind::Or, BinaryOperatorKind::Or, OperandSide::Right, true)]
    fn test_requires_grouping(
        #[case] parent: BinaryOperatorKind,
        #[case] child: BinaryOperatorKind,
        #[case] side: OperandSide,
        #[case] expected: bool,
    ) {
        assert_eq!(parent.requires_grouping(&child, side), expected);
    }
}
