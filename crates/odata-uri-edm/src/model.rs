//! The model interface consumed by the binder
//!
//! The model is a read-only oracle. Implementations provide the primitive
//! lookups; inheritance walking and operation matching come as default methods.

use crate::{
    ComplexType, EdmPrimitiveKind, EdmTypeRef, EntitySet, EntityType, NavigationProperty,
    Operation, OperationImport, Property, Singleton, StructuredType, collection_element_name,
};
use serde_json::Value;

/// Upper bound on inheritance depth, guarding against cyclic base types
const MAX_HIERARCHY_DEPTH: usize = 64;

/// Read-only Entity Data Model
pub trait EdmModel: Send + Sync {
    fn find_entity_type(&self, name: &str) -> Option<&EntityType>;

    fn find_complex_type(&self, name: &str) -> Option<&ComplexType>;

    fn find_entity_set(&self, name: &str) -> Option<&EntitySet>;

    fn find_singleton(&self, name: &str) -> Option<&Singleton>;

    /// All overloads of an operation by qualified name
    fn find_operations(&self, name: &str) -> &[Operation];

    fn find_operation_import(&self, name: &str) -> Option<&OperationImport>;

    /// Annotation value attached to a model element, by qualified target and term
    fn annotation(&self, _target: &str, _term: &str) -> Option<Value> {
        None
    }

    fn find_structured_type(&self, name: &str) -> Option<StructuredType<'_>> {
        self.find_entity_type(name)
            .map(StructuredType::Entity)
            .or_else(|| self.find_complex_type(name).map(StructuredType::Complex))
    }

    /// Resolve a qualified type name, `Collection(...)` and `Edm.*` included
    fn find_type(&self, name: &str) -> Option<EdmTypeRef> {
        if let Some(element) = collection_element_name(name) {
            return self.find_type(element).map(EdmTypeRef::collection);
        }
        if let Some(kind) = EdmPrimitiveKind::from_name(name) {
            return Some(EdmTypeRef::Primitive(kind));
        }
        self.find_structured_type(name).map(|t| t.type_ref())
    }

    /// The type itself followed by its base types, most derived first
    fn type_hierarchy(&self, name: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current = self.find_structured_type(name);
        while let Some(ty) = current {
            if chain.len() >= MAX_HIERARCHY_DEPTH || chain.iter().any(|n| n == ty.name()) {
                break;
            }
            chain.push(ty.name().to_string());
            current = ty.base_type().and_then(|base| self.find_structured_type(base));
        }
        chain
    }

    /// Whether `child` equals `parent` or inherits from it
    fn is_derived_from(&self, child: &str, parent: &str) -> bool {
        child == parent || self.type_hierarchy(child).iter().any(|name| name == parent)
    }

    /// Structural property, searching base types
    fn find_property(&self, type_name: &str, property: &str) -> Option<&Property> {
        self.type_hierarchy(type_name)
            .iter()
            .filter_map(|name| self.find_structured_type(name))
            .find_map(|ty| ty.property(property))
    }

    /// Navigation property, searching base types
    fn find_navigation_property(
        &self,
        type_name: &str,
        navigation: &str,
    ) -> Option<&NavigationProperty> {
        self.type_hierarchy(type_name)
            .iter()
            .filter_map(|name| self.find_structured_type(name))
            .find_map(|ty| ty.navigation(navigation))
    }

    /// Whether the type or any base type is open
    fn is_open_type(&self, type_name: &str) -> bool {
        self.type_hierarchy(type_name)
            .iter()
            .filter_map(|name| self.find_structured_type(name))
            .any(|ty| ty.is_open())
    }

    /// Key properties in declaration order; keys are declared on the root type
    fn key_properties(&self, entity_type: &str) -> Vec<&Property> {
        let Some(declaring) = self
            .type_hierarchy(entity_type)
            .iter()
            .filter_map(|name| self.find_entity_type(name))
            .find(|ty| !ty.key.is_empty())
        else {
            return Vec::new();
        };
        declaring
            .key
            .iter()
            .filter_map(|key| self.find_property(&declaring.name, key))
            .collect()
    }

    /// Bound operations named `name` applicable to a binding value of type `binding`
    fn find_bound_operations(&self, name: &str, binding: &EdmTypeRef) -> Vec<&Operation> {
        self.find_operations(name)
            .iter()
            .filter(|op| {
                op.binding_type()
                    .is_some_and(|declared| self.is_assignable(binding, declared))
            })
            .collect()
    }

    /// Whether a value of type `actual` may be passed where `declared` is expected
    fn is_assignable(&self, actual: &EdmTypeRef, declared: &EdmTypeRef) -> bool {
        match (actual, declared) {
            (EdmTypeRef::Collection(a), EdmTypeRef::Collection(d)) => self.is_assignable(a, d),
            (EdmTypeRef::Entity(a), EdmTypeRef::Entity(d))
            | (EdmTypeRef::Complex(a), EdmTypeRef::Complex(d)) => self.is_derived_from(a, d),
            (a, d) => a == d,
        }
    }

    /// Entity set reached from `source_set` over a navigation path
    fn navigation_target(&self, source_set: &str, navigation_path: &str) -> Option<&EntitySet> {
        let set = self.find_entity_set(source_set)?;
        let target = set.navigation_bindings.get(navigation_path)?;
        self.find_entity_set(target)
    }

    /// Entity set reached from a singleton over a navigation path
    fn singleton_navigation_target(
        &self,
        singleton: &str,
        navigation_path: &str,
    ) -> Option<&EntitySet> {
        let single = self.find_singleton(singleton)?;
        let target = single.navigation_bindings.get(navigation_path)?;
        self.find_entity_set(target)
    }
}
