//! EDM schema and container elements

use crate::EdmTypeRef;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A structural property of an entity or complex type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub type_ref: EdmTypeRef,
    pub nullable: bool,
}

impl Property {
    pub fn new(name: impl Into<String>, type_ref: impl Into<EdmTypeRef>) -> Self {
        Self {
            name: name.into(),
            type_ref: type_ref.into(),
            nullable: true,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}

/// Cardinality of a navigation property end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Multiplicity {
    ZeroOrOne,
    One,
    Many,
}

/// A navigation property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationProperty {
    pub name: String,
    /// Qualified name of the target entity type
    pub target_type: String,
    pub multiplicity: Multiplicity,
    pub partner: Option<String>,
}

impl NavigationProperty {
    pub fn new(
        name: impl Into<String>,
        target_type: impl Into<String>,
        multiplicity: Multiplicity,
    ) -> Self {
        Self {
            name: name.into(),
            target_type: target_type.into(),
            multiplicity,
            partner: None,
        }
    }

    pub fn is_collection(&self) -> bool {
        self.multiplicity == Multiplicity::Many
    }

    /// `NS.Order` or `Collection(NS.Order)`
    pub fn type_ref(&self) -> EdmTypeRef {
        let entity = EdmTypeRef::entity(&self.target_type);
        if self.is_collection() {
            EdmTypeRef::collection(entity)
        } else {
            entity
        }
    }
}

/// An entity type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityType {
    /// Qualified name
    pub name: String,
    pub base_type: Option<String>,
    /// Key property names; empty when inherited from the base type
    pub key: Vec<String>,
    pub properties: IndexMap<String, Property>,
    pub navigation_properties: IndexMap<String, NavigationProperty>,
    pub is_open: bool,
    pub is_abstract: bool,
}

impl EntityType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_type: None,
            key: Vec::new(),
            properties: IndexMap::new(),
            navigation_properties: IndexMap::new(),
            is_open: false,
            is_abstract: false,
        }
    }

    pub fn with_base(mut self, base_type: impl Into<String>) -> Self {
        self.base_type = Some(base_type.into());
        self
    }

    pub fn with_key(mut self, name: impl Into<String>) -> Self {
        self.key.push(name.into());
        self
    }

    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.insert(property.name.clone(), property);
        self
    }

    pub fn with_navigation(mut self, navigation: NavigationProperty) -> Self {
        self.navigation_properties
            .insert(navigation.name.clone(), navigation);
        self
    }

    pub fn open(mut self) -> Self {
        self.is_open = true;
        self
    }

    /// Namespace part of the qualified name
    pub fn namespace(&self) -> &str {
        self.name.rsplit_once('.').map_or("", |(ns, _)| ns)
    }
}

/// A complex type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexType {
    /// Qualified name
    pub name: String,
    pub base_type: Option<String>,
    pub properties: IndexMap<String, Property>,
    pub is_open: bool,
}

impl ComplexType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_type: None,
            properties: IndexMap::new(),
            is_open: false,
        }
    }

    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.insert(property.name.clone(), property);
        self
    }
}

/// Borrowed view over either kind of structured type
#[derive(Debug, Clone, Copy)]
pub enum StructuredType<'a> {
    Entity(&'a EntityType),
    Complex(&'a ComplexType),
}

impl<'a> StructuredType<'a> {
    pub fn name(&self) -> &'a str {
        match self {
            Self::Entity(t) => &t.name,
            Self::Complex(t) => &t.name,
        }
    }

    pub fn base_type(&self) -> Option<&'a str> {
        match self {
            Self::Entity(t) => t.base_type.as_deref(),
            Self::Complex(t) => t.base_type.as_deref(),
        }
    }

    pub fn property(&self, name: &str) -> Option<&'a Property> {
        match self {
            Self::Entity(t) => t.properties.get(name),
            Self::Complex(t) => t.properties.get(name),
        }
    }

    pub fn navigation(&self, name: &str) -> Option<&'a NavigationProperty> {
        match self {
            Self::Entity(t) => t.navigation_properties.get(name),
            Self::Complex(_) => None,
        }
    }

    pub fn is_open(&self) -> bool {
        match self {
            Self::Entity(t) => t.is_open,
            Self::Complex(t) => t.is_open,
        }
    }

    pub fn type_ref(&self) -> EdmTypeRef {
        match self {
            Self::Entity(t) => EdmTypeRef::entity(&t.name),
            Self::Complex(t) => EdmTypeRef::complex(&t.name),
        }
    }
}

/// An entity set in the entity container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySet {
    pub name: String,
    /// Qualified name of the element entity type
    pub entity_type: String,
    /// Navigation property path to target entity set name
    pub navigation_bindings: IndexMap<String, String>,
}

impl EntitySet {
    pub fn new(name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity_type: entity_type.into(),
            navigation_bindings: IndexMap::new(),
        }
    }

    pub fn with_binding(mut self, path: impl Into<String>, target: impl Into<String>) -> Self {
        self.navigation_bindings.insert(path.into(), target.into());
        self
    }
}

/// A singleton in the entity container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Singleton {
    pub name: String,
    pub entity_type: String,
    pub navigation_bindings: IndexMap<String, String>,
}

impl Singleton {
    pub fn new(name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity_type: entity_type.into(),
            navigation_bindings: IndexMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Function,
    Action,
}

/// An operation parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub type_ref: EdmTypeRef,
}

/// A function or action declared in a schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Qualified name
    pub name: String,
    pub kind: OperationKind,
    /// The first parameter is the binding parameter
    pub is_bound: bool,
    pub parameters: Vec<Parameter>,
    pub return_type: Option<EdmTypeRef>,
}

impl Operation {
    pub fn function(name: impl Into<String>, return_type: EdmTypeRef) -> Self {
        Self {
            name: name.into(),
            kind: OperationKind::Function,
            is_bound: false,
            parameters: Vec::new(),
            return_type: Some(return_type),
        }
    }

    pub fn action(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: OperationKind::Action,
            is_bound: false,
            parameters: Vec::new(),
            return_type: None,
        }
    }

    /// Make the operation bound to `binding_type`
    pub fn bound_to(mut self, binding_type: EdmTypeRef) -> Self {
        self.is_bound = true;
        self.parameters.insert(
            0,
            Parameter {
                name: "bindingParameter".to_string(),
                type_ref: binding_type,
            },
        );
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, type_ref: impl Into<EdmTypeRef>) -> Self {
        self.parameters.push(Parameter {
            name: name.into(),
            type_ref: type_ref.into(),
        });
        self
    }

    pub fn binding_type(&self) -> Option<&EdmTypeRef> {
        if self.is_bound {
            self.parameters.first().map(|p| &p.type_ref)
        } else {
            None
        }
    }

    /// Parameters supplied in the call, i.e. without the binding parameter
    pub fn call_parameters(&self) -> &[Parameter] {
        if self.is_bound && !self.parameters.is_empty() {
            &self.parameters[1..]
        } else {
            &self.parameters
        }
    }

    /// Unqualified name
    pub fn local_name(&self) -> &str {
        self.name.rsplit_once('.').map_or(&self.name, |(_, local)| local)
    }

    pub fn namespace(&self) -> &str {
        self.name.rsplit_once('.').map_or("", |(ns, _)| ns)
    }
}

/// A function or action import in the entity container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationImport {
    pub name: String,
    /// Qualified name of the imported operation
    pub operation: String,
    pub kind: OperationKind,
    /// Entity set the results belong to
    pub entity_set: Option<String>,
}
