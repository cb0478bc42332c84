//! Semantic Tree Nodes
//!
//! Bound counterparts of the syntactic tokens. Every node carries its EDM type
//! (`EdmTypeRef::Untyped` for `null` and dynamic properties) and nodes that
//! produce entities remember the entity set they came from, when known.

use odata_uri_ast::{BinaryOperatorKind, IMPLICIT_RANGE_VARIABLE, LiteralValue, UnaryOperatorKind};
use odata_uri_edm::{EdmPrimitiveKind, EdmTypeRef};
use serde::{Deserialize, Serialize};

/// Root of a bound expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryNode {
    Single(SingleValueNode),
    Collection(CollectionNode),
}

impl QueryNode {
    /// Get the type of the node
    pub fn type_ref(&self) -> EdmTypeRef {
        match self {
            Self::Single(node) => node.type_ref(),
            Self::Collection(node) => node.type_ref(),
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Self::Collection(_))
    }

    /// Short description used in diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Single(node) => node.kind_name(),
            Self::Collection(node) => node.kind_name(),
        }
    }
}

impl From<SingleValueNode> for QueryNode {
    fn from(node: SingleValueNode) -> Self {
        Self::Single(node)
    }
}

impl From<CollectionNode> for QueryNode {
    fn from(node: CollectionNode) -> Self {
        Self::Collection(node)
    }
}

impl From<SingleEntityNode> for QueryNode {
    fn from(node: SingleEntityNode) -> Self {
        Self::Single(SingleValueNode::Entity(node))
    }
}

/// A variable ranging over the elements of a collection: `$it` or a lambda parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeVariable {
    pub name: String,
    pub type_ref: EdmTypeRef,
    /// Entity set of the elements, for entity-typed variables
    pub entity_set: Option<String>,
}

impl RangeVariable {
    pub fn new(name: impl Into<String>, type_ref: EdmTypeRef, entity_set: Option<String>) -> Self {
        Self {
            name: name.into(),
            type_ref,
            entity_set,
        }
    }

    /// The implicit `$it` variable
    pub fn implicit(type_ref: EdmTypeRef, entity_set: Option<String>) -> Self {
        Self::new(IMPLICIT_RANGE_VARIABLE, type_ref, entity_set)
    }

    pub fn is_implicit(&self) -> bool {
        self.name == IMPLICIT_RANGE_VARIABLE
    }

    /// Reference node for this variable, entity-valued when the type is an entity
    pub fn reference(&self) -> SingleValueNode {
        if self.type_ref.is_entity() {
            SingleValueNode::Entity(SingleEntityNode::RangeVariableReference(self.clone()))
        } else {
            SingleValueNode::RangeVariableReference(self.clone())
        }
    }
}

/// A typed literal. The original text is not kept, so trees built from
/// differently spelled but equal literals compare equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantNode {
    pub value: LiteralValue,
    pub type_ref: EdmTypeRef,
}

impl ConstantNode {
    pub fn new(value: LiteralValue) -> Self {
        let type_ref = value
            .type_name()
            .and_then(EdmPrimitiveKind::from_name)
            .map_or(EdmTypeRef::Untyped, EdmTypeRef::Primitive);
        Self { value, type_ref }
    }
}

/// An argument of a built-in or model function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionArgument {
    /// Parameter name for `NS.Func(p=1)` calls
    pub name: Option<String>,
    pub value: QueryNode,
}

impl FunctionArgument {
    pub fn positional(value: impl Into<QueryNode>) -> Self {
        Self {
            name: None,
            value: value.into(),
        }
    }

    pub fn named(name: impl Into<String>, value: impl Into<QueryNode>) -> Self {
        Self {
            name: Some(name.into()),
            value: value.into(),
        }
    }
}

/// A call to a built-in function or a bound model function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallNode {
    pub name: String,
    /// Binding value of a bound function
    pub source: Option<Box<QueryNode>>,
    pub arguments: Vec<FunctionArgument>,
    pub type_ref: EdmTypeRef,
}

/// `source/any(v: body)` or `source/all(v: body)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LambdaNode {
    pub source: Box<CollectionNode>,
    /// `None` for the parameterless `any()`
    pub variable: Option<RangeVariable>,
    pub body: Option<Box<SingleValueNode>>,
}

/// A node producing one value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SingleValueNode {
    Constant(ConstantNode),

    /// Implicit conversion inserted by type promotion
    Convert {
        source: Box<SingleValueNode>,
        type_ref: EdmTypeRef,
    },

    BinaryOperator {
        operator: BinaryOperatorKind,
        left: Box<SingleValueNode>,
        right: Box<SingleValueNode>,
        type_ref: EdmTypeRef,
    },

    UnaryOperator {
        operator: UnaryOperatorKind,
        operand: Box<SingleValueNode>,
        type_ref: EdmTypeRef,
    },

    /// A primitive or complex single-valued property
    PropertyAccess {
        source: Box<SingleValueNode>,
        property: String,
        type_ref: EdmTypeRef,
    },

    /// A dynamic property of an open type
    OpenPropertyAccess {
        source: Box<SingleValueNode>,
        name: String,
    },

    FunctionCall(FunctionCallNode),

    /// A non-entity range variable, e.g. the parameter of a lambda over strings
    RangeVariableReference(RangeVariable),

    Any(LambdaNode),

    All(LambdaNode),

    /// `source/$count`
    Count { source: Box<CollectionNode> },

    ParameterAlias { name: String, type_ref: EdmTypeRef },

    Entity(SingleEntityNode),
}

impl SingleValueNode {
    /// Get the type of the node
    pub fn type_ref(&self) -> EdmTypeRef {
        match self {
            Self::Constant(constant) => constant.type_ref.clone(),
            Self::Convert { type_ref, .. }
            | Self::BinaryOperator { type_ref, .. }
            | Self::UnaryOperator { type_ref, .. }
            | Self::PropertyAccess { type_ref, .. }
            | Self::ParameterAlias { type_ref, .. } => type_ref.clone(),
            Self::OpenPropertyAccess { .. } => EdmTypeRef::Untyped,
            Self::FunctionCall(call) => call.type_ref.clone(),
            Self::RangeVariableReference(variable) => variable.type_ref.clone(),
            Self::Any(_) | Self::All(_) => EdmTypeRef::boolean(),
            Self::Count { .. } => EdmTypeRef::primitive(EdmPrimitiveKind::Int64),
            Self::Entity(entity) => entity.type_ref(),
        }
    }

    /// Literal or a conversion of one
    pub fn is_constant(&self) -> bool {
        match self {
            Self::Constant(_) => true,
            Self::Convert { source, .. } => source.is_constant(),
            _ => false,
        }
    }

    /// Entity set of an entity-valued node
    pub fn entity_set(&self) -> Option<&str> {
        match self {
            Self::Entity(entity) => entity.entity_set(),
            _ => None,
        }
    }

    /// Wrap in a conversion unless the node already has the target type.
    ///
    /// Untyped nodes (`null`, dynamic properties) are left as they are.
    pub fn convert_to(self, target: &EdmTypeRef) -> Self {
        let current = self.type_ref();
        if current == *target || current.is_untyped() || target.is_untyped() {
            return self;
        }
        Self::Convert {
            source: Box::new(self),
            type_ref: target.clone(),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Constant(_) => "constant",
            Self::Convert { .. } => "conversion",
            Self::BinaryOperator { .. } => "binary operator",
            Self::UnaryOperator { .. } => "unary operator",
            Self::PropertyAccess { .. } => "property access",
            Self::OpenPropertyAccess { .. } => "open property access",
            Self::FunctionCall(_) => "function call",
            Self::RangeVariableReference(_) => "range variable",
            Self::Any(_) => "any",
            Self::All(_) => "all",
            Self::Count { .. } => "$count",
            Self::ParameterAlias { .. } => "parameter alias",
            Self::Entity(entity) => entity.kind_name(),
        }
    }
}

/// A node producing one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SingleEntityNode {
    RangeVariableReference(RangeVariable),

    /// Single-valued navigation property
    Navigation {
        source: Box<SingleValueNode>,
        navigation: String,
        type_ref: EdmTypeRef,
        entity_set: Option<String>,
    },

    /// `source/NS.Derived`
    Cast {
        source: Box<SingleValueNode>,
        type_name: String,
    },

    /// Bound function or `cast(..., 'NS.Type')` returning an entity
    FunctionCall(FunctionCallNode),
}

impl SingleEntityNode {
    pub fn type_ref(&self) -> EdmTypeRef {
        match self {
            Self::RangeVariableReference(variable) => variable.type_ref.clone(),
            Self::Navigation { type_ref, .. } => type_ref.clone(),
            Self::Cast { type_name, .. } => EdmTypeRef::entity(type_name),
            Self::FunctionCall(call) => call.type_ref.clone(),
        }
    }

    pub fn entity_set(&self) -> Option<&str> {
        match self {
            Self::RangeVariableReference(variable) => variable.entity_set.as_deref(),
            Self::Navigation { entity_set, .. } => entity_set.as_deref(),
            Self::Cast { source, .. } => source.entity_set(),
            Self::FunctionCall(_) => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::RangeVariableReference(_) => "range variable",
            Self::Navigation { .. } => "navigation",
            Self::Cast { .. } => "type cast",
            Self::FunctionCall(_) => "function call",
        }
    }
}

/// A node producing a collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CollectionNode {
    /// Collection of primitive or complex values
    PropertyAccess {
        source: Box<SingleValueNode>,
        property: String,
        type_ref: EdmTypeRef,
    },

    /// Collection-valued navigation property
    Navigation {
        source: Box<SingleValueNode>,
        navigation: String,
        type_ref: EdmTypeRef,
        entity_set: Option<String>,
    },

    /// `source/NS.Derived` over an entity collection
    Cast {
        source: Box<CollectionNode>,
        type_name: String,
    },

    /// Bound function returning a collection
    FunctionCall(FunctionCallNode),
}

impl CollectionNode {
    /// Get the collection type
    pub fn type_ref(&self) -> EdmTypeRef {
        match self {
            Self::PropertyAccess { type_ref, .. } | Self::Navigation { type_ref, .. } => {
                type_ref.clone()
            }
            Self::Cast { type_name, .. } => EdmTypeRef::collection(EdmTypeRef::entity(type_name)),
            Self::FunctionCall(call) => call.type_ref.clone(),
        }
    }

    /// Type of one element
    pub fn element_type(&self) -> EdmTypeRef {
        self.type_ref().element_type().clone()
    }

    /// Entity set of the elements, for entity collections
    pub fn entity_set(&self) -> Option<&str> {
        match self {
            Self::Navigation { entity_set, .. } => entity_set.as_deref(),
            Self::Cast { source, .. } => source.entity_set(),
            Self::PropertyAccess { .. } | Self::FunctionCall(_) => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::PropertyAccess { .. } => "collection property access",
            Self::Navigation { .. } => "collection navigation",
            Self::Cast { .. } => "collection type cast",
            Self::FunctionCall(_) => "collection function call",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn customer() -> RangeVariable {
        RangeVariable::implicit(EdmTypeRef::entity("Sales.Customer"), Some("Customers".into()))
    }

    #[test]
    fn test_constant_types() {
        assert_eq!(
            ConstantNode::new(LiteralValue::Int64(5)).type_ref,
            EdmTypeRef::primitive(EdmPrimitiveKind::Int64)
        );
        assert_eq!(ConstantNode::new(LiteralValue::Null).type_ref, EdmTypeRef::Untyped);
    }

    #[test]
    fn test_entity_range_variable_reference() {
        let reference = customer().reference();
        assert!(matches!(reference, SingleValueNode::Entity(_)));
        assert_eq!(reference.entity_set(), Some("Customers"));

        let tag = RangeVariable::new("t", EdmTypeRef::primitive(EdmPrimitiveKind::String), None);
        assert!(matches!(tag.reference(), SingleValueNode::RangeVariableReference(_)));
    }

    #[test]
    fn test_convert_is_skipped_for_same_type_and_null() {
        let five = SingleValueNode::Constant(ConstantNode::new(LiteralValue::Int32(5)));
        let int32 = EdmTypeRef::primitive(EdmPrimitiveKind::Int32);
        assert_eq!(five.clone().convert_to(&int32), five);

        let widened = five.convert_to(&EdmTypeRef::primitive(EdmPrimitiveKind::Int64));
        assert!(matches!(widened, SingleValueNode::Convert { .. }));
        assert!(widened.is_constant());

        let null = SingleValueNode::Constant(ConstantNode::new(LiteralValue::Null));
        assert_eq!(null.clone().convert_to(&int32), null);
    }

    #[test]
    fn test_collection_element_and_set() {
        let orders = CollectionNode::Navigation {
            source: Box::new(customer().reference()),
            navigation: "Orders".into(),
            type_ref: EdmTypeRef::collection(EdmTypeRef::entity("Sales.Order")),
            entity_set: Some("Orders".into()),
        };
        let cast = CollectionNode::Cast {
            source: Box::new(orders.clone()),
            type_name: "Sales.RushOrder".into(),
        };
        assert_eq!(orders.element_type(), EdmTypeRef::entity("Sales.Order"));
        assert_eq!(cast.type_ref().full_name(), "Collection(Sales.RushOrder)");
        assert_eq!(cast.entity_set(), Some("Orders"));

        let count = SingleValueNode::Count {
            source: Box::new(orders),
        };
        assert_eq!(count.type_ref(), EdmTypeRef::primitive(EdmPrimitiveKind::Int64));
    }
}
