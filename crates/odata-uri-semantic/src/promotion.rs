//! Implicit type promotion
//!
//! Numeric widening follows a fixed lattice:
//! - `Byte -> Int16`, `SByte -> Int16`
//! - `Int16 -> Int32 -> Int64 -> Single -> Double`
//! - every integral type and `Single` -> `Decimal`
//! - `Double -> Decimal` only for constants
//!
//! Operator typing picks the narrowest type both operands promote to.

use odata_uri_ast::BinaryOperatorKind;
use odata_uri_edm::{EdmPrimitiveKind, EdmTypeRef};

use EdmPrimitiveKind as K;

/// Position of a kind on the widening chain, `Decimal` excluded
const fn widening_rank(kind: EdmPrimitiveKind) -> Option<u32> {
    match kind {
        K::Byte | K::SByte => Some(0),
        K::Int16 => Some(1),
        K::Int32 => Some(2),
        K::Int64 => Some(3),
        K::Single => Some(4),
        K::Double => Some(5),
        _ => None,
    }
}

/// Numeric kinds ordered from narrowest to widest, for joins
const JOIN_ORDER: [EdmPrimitiveKind; 7] = [K::Byte, K::Int16, K::Int32, K::Int64, K::Single, K::Double, K::Decimal];

/// Number of widening steps from `from` to `to`, `None` if not promotable.
///
/// `constant` allows the `Double -> Decimal` step reserved for literals.
pub fn promotion_cost(from: EdmPrimitiveKind, to: EdmPrimitiveKind, constant: bool) -> Option<u32> {
    if from == to {
        return Some(0);
    }
    // SByte and Byte are siblings, neither widens to the other
    if matches!((from, to), (K::Byte, K::SByte) | (K::SByte, K::Byte)) {
        return None;
    }
    let from_rank = widening_rank(from)?;
    match to {
        K::Decimal if from == K::Double => constant.then_some(2),
        // one step past Double, so Double overloads win over Decimal ones
        K::Decimal => Some(6 - from_rank),
        _ => {
            let to_rank = widening_rank(to)?;
            (to_rank > from_rank).then(|| to_rank - from_rank)
        }
    }
}

/// Whether a value of kind `from` converts implicitly to `to`
pub fn can_promote(from: EdmPrimitiveKind, to: EdmPrimitiveKind, constant: bool) -> bool {
    promotion_cost(from, to, constant).is_some()
}

/// Narrowest numeric kind both operands promote to
pub fn numeric_join(
    left: EdmPrimitiveKind,
    right: EdmPrimitiveKind,
    left_constant: bool,
    right_constant: bool,
) -> Option<EdmPrimitiveKind> {
    if !left.is_numeric() || !right.is_numeric() {
        return None;
    }
    JOIN_ORDER.into_iter().find(|target| {
        can_promote(left, *target, left_constant) && can_promote(right, *target, right_constant)
    })
}

/// Typing of a binary operator application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryTyping {
    /// Type both operands are converted to
    pub operand_type: EdmTypeRef,
    pub result_type: EdmTypeRef,
}

/// An operand as seen by operator typing
#[derive(Debug, Clone, Copy)]
pub struct Operand<'a> {
    pub type_ref: &'a EdmTypeRef,
    /// Whether the operand is a literal, which unlocks `Double -> Decimal`
    pub constant: bool,
}

/// Type a binary operator over two operands, `None` if undefined for them
pub fn binary_typing(
    operator: BinaryOperatorKind,
    left: Operand<'_>,
    right: Operand<'_>,
) -> Option<BinaryTyping> {
    if operator == BinaryOperatorKind::Has {
        return None;
    }

    // null takes the type of the other side
    let (left_type, right_type) = match (left.type_ref, right.type_ref) {
        (EdmTypeRef::Untyped, EdmTypeRef::Untyped) => {
            let result = if operator.is_arithmetic() {
                EdmTypeRef::Untyped
            } else {
                EdmTypeRef::boolean()
            };
            return Some(BinaryTyping {
                operand_type: EdmTypeRef::Untyped,
                result_type: result,
            });
        }
        (EdmTypeRef::Untyped, other) | (other, EdmTypeRef::Untyped) => (other, other),
        (l, r) => (l, r),
    };

    if operator.is_logical() {
        let boolean = EdmTypeRef::boolean();
        return (*left_type == boolean && *right_type == boolean).then(|| BinaryTyping {
            operand_type: boolean.clone(),
            result_type: boolean,
        });
    }

    if operator.is_equality() && !left_type.is_collection() && !right_type.is_collection() {
        if let (EdmTypeRef::Entity(_), EdmTypeRef::Entity(_)) | (EdmTypeRef::Complex(_), EdmTypeRef::Complex(_)) =
            (left_type, right_type)
        {
            // only comparisons against null are meaningful for structured values
            let against_null = left.type_ref.is_untyped() || right.type_ref.is_untyped();
            return against_null.then(|| BinaryTyping {
                operand_type: left_type.clone(),
                result_type: EdmTypeRef::boolean(),
            });
        }
    }

    let (Some(l), Some(r)) = (left_type.as_primitive(), right_type.as_primitive()) else {
        return None;
    };
    let operand = if l.is_numeric() && r.is_numeric() {
        numeric_join(l, r, left.constant, right.constant)?
    } else if l == r {
        l
    } else {
        return None;
    };

    if operator.is_arithmetic() {
        return operand.is_numeric().then(|| BinaryTyping {
            operand_type: operand.into(),
            result_type: operand.into(),
        });
    }

    let comparable = if operator.is_equality() {
        !operand.is_spatial()
    } else {
        is_ordered(operand)
    };
    comparable.then(|| BinaryTyping {
        operand_type: operand.into(),
        result_type: EdmTypeRef::boolean(),
    })
}

/// Kinds supporting `lt`, `le`, `gt`, `ge`
fn is_ordered(kind: EdmPrimitiveKind) -> bool {
    kind.is_numeric() || matches!(kind, K::String | K::DateTime | K::DateTimeOffset | K::Time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn typing(
        operator: BinaryOperatorKind,
        left: impl Into<EdmTypeRef>,
        right: impl Into<EdmTypeRef>,
    ) -> Option<BinaryTyping> {
        let (left, right) = (left.into(), right.into());
        binary_typing(
            operator,
            Operand {
                type_ref: &left,
                constant: false,
            },
            Operand {
                type_ref: &right,
                constant: true,
            },
        )
    }

    #[rstest]
    #[case(K::Byte, K::Int16, true)]
    #[case(K::SByte, K::Int16, true)]
    #[case(K::Byte, K::SByte, false)]
    #[case(K::Int16, K::Double, true)]
    #[case(K::Int64, K::Single, true)]
    #[case(K::Int64, K::Int32, false)]
    #[case(K::Single, K::Decimal, true)]
    #[case(K::Double, K::Single, false)]
    #[case(K::String, K::Int32, false)]
    fn test_can_promote(#[case] from: EdmPrimitiveKind, #[case] to: EdmPrimitiveKind, #[case] expected: bool) {
        assert_eq!(can_promote(from, to, false), expected);
    }

    #[test]
    fn test_double_to_decimal_only_for_constants() {
        assert!(!can_promote(K::Double, K::Decimal, false));
        assert!(can_promote(K::Double, K::Decimal, true));
    }

    #[test]
    fn test_double_preferred_over_decimal() {
        let to_double = promotion_cost(K::Int32, K::Double, false);
        let to_decimal = promotion_cost(K::Int32, K::Decimal, false);
        assert!(to_double < to_decimal);
    }

    #[rstest]
    #[case(K::Int16, K::Int32, Some(K::Int32))]
    #[case(K::Byte, K::SByte, Some(K::Int16))]
    #[case(K::Int64, K::Decimal, Some(K::Decimal))]
    #[case(K::Single, K::Double, Some(K::Double))]
    #[case(K::Boolean, K::Int32, None)]
    fn test_numeric_join(
        #[case] left: EdmPrimitiveKind,
        #[case] right: EdmPrimitiveKind,
        #[case] expected: Option<EdmPrimitiveKind>,
    ) {
        assert_eq!(numeric_join(left, right, false, false), expected);
    }

    #[test]
    fn test_comparison_promotes_to_common_type() {
        let typed = typing(BinaryOperatorKind::Equal, K::Int16, K::Int32).unwrap();
        assert_eq!(typed.operand_type, EdmTypeRef::primitive(K::Int32));
        assert_eq!(typed.result_type, EdmTypeRef::boolean());
        assert!(typing(BinaryOperatorKind::Equal, K::String, K::Int32).is_none());
    }

    #[test]
    fn test_decimal_property_against_double_literal() {
        let typed = typing(BinaryOperatorKind::GreaterThan, K::Decimal, K::Double).unwrap();
        assert_eq!(typed.operand_type, EdmTypeRef::primitive(K::Decimal));
    }

    #[test]
    fn test_ordering_and_logic_rules() {
        assert!(typing(BinaryOperatorKind::LessThan, K::Guid, K::Guid).is_none());
        assert!(typing(BinaryOperatorKind::Equal, K::Guid, K::Guid).is_some());
        assert!(typing(BinaryOperatorKind::LessThan, K::Boolean, K::Boolean).is_none());
        assert!(typing(BinaryOperatorKind::And, K::Boolean, K::Boolean).is_some());
        assert!(typing(BinaryOperatorKind::And, K::Int32, K::Boolean).is_none());
        assert!(typing(BinaryOperatorKind::Add, K::String, K::String).is_none());
        assert!(typing(BinaryOperatorKind::Has, K::Int32, K::Int32).is_none());
    }

    #[test]
    fn test_null_takes_other_type() {
        let typed = typing(BinaryOperatorKind::Equal, K::String, EdmTypeRef::Untyped).unwrap();
        assert_eq!(typed.operand_type, EdmTypeRef::primitive(K::String));
        let entity = EdmTypeRef::entity("Sales.Customer");
        let typed = typing(BinaryOperatorKind::Equal, entity.clone(), EdmTypeRef::Untyped).unwrap();
        assert_eq!(typed.operand_type, entity);
    }
}
