//! EDM type references

use serde::{Deserialize, Serialize};
use std::fmt;

/// EDM primitive types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EdmPrimitiveKind {
    Binary,
    Boolean,
    Byte,
    DateTime,
    DateTimeOffset,
    Decimal,
    Double,
    Guid,
    Int16,
    Int32,
    Int64,
    SByte,
    Single,
    String,
    Time,
    Geography,
    Geometry,
}

impl EdmPrimitiveKind {
    pub const ALL: [Self; 17] = [
        Self::Binary,
        Self::Boolean,
        Self::Byte,
        Self::DateTime,
        Self::DateTimeOffset,
        Self::Decimal,
        Self::Double,
        Self::Guid,
        Self::Int16,
        Self::Int32,
        Self::Int64,
        Self::SByte,
        Self::Single,
        Self::String,
        Self::Time,
        Self::Geography,
        Self::Geometry,
    ];

    /// Qualified type name (`Edm.Int32`)
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Binary => "Edm.Binary",
            Self::Boolean => "Edm.Boolean",
            Self::Byte => "Edm.Byte",
            Self::DateTime => "Edm.DateTime",
            Self::DateTimeOffset => "Edm.DateTimeOffset",
            Self::Decimal => "Edm.Decimal",
            Self::Double => "Edm.Double",
            Self::Guid => "Edm.Guid",
            Self::Int16 => "Edm.Int16",
            Self::Int32 => "Edm.Int32",
            Self::Int64 => "Edm.Int64",
            Self::SByte => "Edm.SByte",
            Self::Single => "Edm.Single",
            Self::String => "Edm.String",
            Self::Time => "Edm.Time",
            Self::Geography => "Edm.Geography",
            Self::Geometry => "Edm.Geometry",
        }
    }

    /// Look up a primitive kind by qualified name.
    ///
    /// The concrete spatial types (`Edm.GeographyPoint`, ...) map to their
    /// abstract base.
    pub fn from_name(name: &str) -> Option<Self> {
        if let Some(found) = Self::ALL.into_iter().find(|k| k.name() == name) {
            return Some(found);
        }
        let local = name.strip_prefix("Edm.")?;
        if local.starts_with("Geography") {
            Some(Self::Geography)
        } else if local.starts_with("Geometry") {
            Some(Self::Geometry)
        } else {
            None
        }
    }

    pub const fn is_integral(&self) -> bool {
        matches!(
            self,
            Self::Byte | Self::SByte | Self::Int16 | Self::Int32 | Self::Int64
        )
    }

    pub const fn is_numeric(&self) -> bool {
        self.is_integral() || matches!(self, Self::Single | Self::Double | Self::Decimal)
    }

    pub const fn is_temporal(&self) -> bool {
        matches!(self, Self::DateTime | Self::DateTimeOffset | Self::Time)
    }

    pub const fn is_spatial(&self) -> bool {
        matches!(self, Self::Geography | Self::Geometry)
    }
}

impl fmt::Display for EdmPrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A reference to an EDM type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdmTypeRef {
    Primitive(EdmPrimitiveKind),
    /// Entity type, by qualified name
    Entity(String),
    /// Complex type, by qualified name
    Complex(String),
    Collection(Box<EdmTypeRef>),
    /// `null` literals and dynamic properties of open types
    Untyped,
}

impl EdmTypeRef {
    pub fn primitive(kind: EdmPrimitiveKind) -> Self {
        Self::Primitive(kind)
    }

    pub fn entity(name: impl Into<String>) -> Self {
        Self::Entity(name.into())
    }

    pub fn complex(name: impl Into<String>) -> Self {
        Self::Complex(name.into())
    }

    pub fn collection(element: EdmTypeRef) -> Self {
        Self::Collection(Box::new(element))
    }

    pub const fn boolean() -> Self {
        Self::Primitive(EdmPrimitiveKind::Boolean)
    }

    pub const fn is_collection(&self) -> bool {
        matches!(self, Self::Collection(_))
    }

    pub const fn is_untyped(&self) -> bool {
        matches!(self, Self::Untyped)
    }

    pub const fn is_entity(&self) -> bool {
        matches!(self, Self::Entity(_))
    }

    /// Entity or complex
    pub const fn is_structured(&self) -> bool {
        matches!(self, Self::Entity(_) | Self::Complex(_))
    }

    pub const fn as_primitive(&self) -> Option<EdmPrimitiveKind> {
        match self {
            Self::Primitive(kind) => Some(*kind),
            _ => None,
        }
    }

    /// Qualified name of an entity or complex type
    pub fn structured_name(&self) -> Option<&str> {
        match self {
            Self::Entity(name) | Self::Complex(name) => Some(name),
            _ => None,
        }
    }

    /// Element type of a collection, the type itself otherwise
    pub fn element_type(&self) -> &EdmTypeRef {
        match self {
            Self::Collection(element) => element,
            other => other,
        }
    }

    /// Full type name, `Collection(...)` included
    pub fn full_name(&self) -> String {
        match self {
            Self::Primitive(kind) => kind.name().to_string(),
            Self::Entity(name) | Self::Complex(name) => name.clone(),
            Self::Collection(element) => format!("Collection({})", element.full_name()),
            Self::Untyped => "Edm.Untyped".to_string(),
        }
    }
}

impl fmt::Display for EdmTypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

impl From<EdmPrimitiveKind> for EdmTypeRef {
    fn from(kind: EdmPrimitiveKind) -> Self {
        Self::Primitive(kind)
    }
}

/// Split `Collection(X)` into `X`
pub fn collection_element_name(name: &str) -> Option<&str> {
    name.strip_prefix("Collection(")?.strip_suffix(')')
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Edm.Int32", Some(EdmPrimitiveKind::Int32))]
    #[case("Edm.GeographyPoint", Some(EdmPrimitiveKind::Geography))]
    #[case("Edm.Geometry", Some(EdmPrimitiveKind::Geometry))]
    #[case("Int32", None)]
    #[case("Edm.Unknown", None)]
    fn test_primitive_from_name(#[case] name: &str, #[case] expected: Option<EdmPrimitiveKind>) {
        assert_eq!(EdmPrimitiveKind::from_name(name), expected);
    }

    #[test]
    fn test_collection_names() {
        let orders = EdmTypeRef::collection(EdmTypeRef::entity("Sales.Order"));
        assert_eq!(orders.full_name(), "Collection(Sales.Order)");
        assert_eq!(orders.element_type(), &EdmTypeRef::entity("Sales.Order"));
        assert_eq!(collection_element_name("Collection(Edm.String)"), Some("Edm.String"));
        assert_eq!(collection_element_name("Edm.String"), None);
    }
}
