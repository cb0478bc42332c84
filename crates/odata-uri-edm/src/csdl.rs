//! In-memory EDM model
//!
//! `CsdlModel` is immutable once built. Derived metadata (resolved type
//! hierarchies, vocabulary annotations) lives in side-tables owned by the
//! model and guarded by a `RwLock`, so element definitions are never touched.

use crate::{
    ComplexType, EdmModel, EdmTypeRef, EntitySet, EntityType, Operation, OperationImport,
    Singleton,
};
use indexmap::IndexMap;
use odata_uri_diagnostics::{ODataError, ODU0450, ODU0451, ODU0452, Result};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Read-only model built from CSDL (JSON or XML) or programmatically
#[derive(Debug, Default)]
pub struct CsdlModel {
    namespace: String,
    entity_types: IndexMap<String, EntityType>,
    complex_types: IndexMap<String, ComplexType>,
    entity_sets: IndexMap<String, EntitySet>,
    singletons: IndexMap<String, Singleton>,
    operations: IndexMap<String, Vec<Operation>>,
    operation_imports: IndexMap<String, OperationImport>,
    annotations: RwLock<HashMap<String, HashMap<String, Value>>>,
    hierarchy_cache: RwLock<HashMap<String, Arc<[String]>>>,
}

impl CsdlModel {
    pub fn builder(namespace: impl Into<String>) -> CsdlModelBuilder {
        CsdlModelBuilder::new(namespace)
    }

    /// Load a model from its JSON representation
    pub fn from_json(json: &str) -> Result<Self> {
        crate::raw::parse_json(json)?.into_model()
    }

    /// Load a model from CSDL XML (optionally wrapped in `edmx:Edmx`)
    pub fn from_xml(xml: &str) -> Result<Self> {
        crate::xml::parse_xml(xml)?.into_model()
    }

    /// Auto-detect and load a model from file based on extension (.xml or .json)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ODataError::model(ODU0450, format!("cannot read {}: {e}", path.display()))
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("xml" | "edmx" | "csdl") => Self::from_xml(&content),
            Some("json") => Self::from_json(&content),
            Some(ext) => Err(ODataError::model(
                ODU0450,
                format!("Unsupported file extension: .{ext}. Expected .xml or .json"),
            )),
            None => Err(ODataError::model(
                ODU0450,
                "No file extension found. Expected .xml or .json",
            )),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn entity_types(&self) -> impl Iterator<Item = &EntityType> {
        self.entity_types.values()
    }

    pub fn entity_sets(&self) -> impl Iterator<Item = &EntitySet> {
        self.entity_sets.values()
    }

    /// Attach an annotation to a model element.
    ///
    /// Targets are qualified element names (`NS.Customer`, `NS.Customer/Name`,
    /// `Customers`).
    pub fn set_annotation(&self, target: impl Into<String>, term: impl Into<String>, value: Value) {
        self.annotations
            .write()
            .entry(target.into())
            .or_default()
            .insert(term.into(), value);
    }

    /// All annotations attached to a target
    pub fn annotations_for(&self, target: &str) -> HashMap<String, Value> {
        self.annotations.read().get(target).cloned().unwrap_or_default()
    }
}

impl EdmModel for CsdlModel {
    fn find_entity_type(&self, name: &str) -> Option<&EntityType> {
        self.entity_types.get(name)
    }

    fn find_complex_type(&self, name: &str) -> Option<&ComplexType> {
        self.complex_types.get(name)
    }

    fn find_entity_set(&self, name: &str) -> Option<&EntitySet> {
        self.entity_sets.get(name)
    }

    fn find_singleton(&self, name: &str) -> Option<&Singleton> {
        self.singletons.get(name)
    }

    fn find_operations(&self, name: &str) -> &[Operation] {
        self.operations.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    fn find_operation_import(&self, name: &str) -> Option<&OperationImport> {
        self.operation_imports.get(name)
    }

    fn annotation(&self, target: &str, term: &str) -> Option<Value> {
        self.annotations.read().get(target)?.get(term).cloned()
    }

    fn type_hierarchy(&self, name: &str) -> Vec<String> {
        if let Some(cached) = self.hierarchy_cache.read().get(name) {
            return cached.to_vec();
        }
        let mut chain = Vec::new();
        let mut current = self.find_structured_type(name);
        while let Some(ty) = current {
            if chain.iter().any(|n| n == ty.name()) {
                break;
            }
            chain.push(ty.name().to_string());
            current = ty.base_type().and_then(|base| self.find_structured_type(base));
        }
        self.hierarchy_cache
            .write()
            .insert(name.to_string(), Arc::from(chain.as_slice()));
        chain
    }
}

/// Builder for [`CsdlModel`]; `build()` validates cross references
#[derive(Debug)]
pub struct CsdlModelBuilder {
    model: CsdlModel,
    annotations: Vec<(String, String, Value)>,
}

impl CsdlModelBuilder {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            model: CsdlModel {
                namespace: namespace.into(),
                ..CsdlModel::default()
            },
            annotations: Vec::new(),
        }
    }

    pub fn entity_type(mut self, entity_type: EntityType) -> Self {
        self.model
            .entity_types
            .insert(entity_type.name.clone(), entity_type);
        self
    }

    pub fn complex_type(mut self, complex_type: ComplexType) -> Self {
        self.model
            .complex_types
            .insert(complex_type.name.clone(), complex_type);
        self
    }

    pub fn entity_set(mut self, entity_set: EntitySet) -> Self {
        self.model
            .entity_sets
            .insert(entity_set.name.clone(), entity_set);
        self
    }

    pub fn singleton(mut self, singleton: Singleton) -> Self {
        self.model
            .singletons
            .insert(singleton.name.clone(), singleton);
        self
    }

    pub fn operation(mut self, operation: Operation) -> Self {
        self.model
            .operations
            .entry(operation.name.clone())
            .or_default()
            .push(operation);
        self
    }

    pub fn operation_import(mut self, import: OperationImport) -> Self {
        self.model
            .operation_imports
            .insert(import.name.clone(), import);
        self
    }

    pub fn annotation(
        mut self,
        target: impl Into<String>,
        term: impl Into<String>,
        value: Value,
    ) -> Self {
        self.annotations.push((target.into(), term.into(), value));
        self
    }

    /// Validate references between elements and produce the model
    pub fn build(self) -> Result<CsdlModel> {
        let model = self.model;
        model.validate()?;
        for (target, term, value) in self.annotations {
            model.set_annotation(target, term, value);
        }
        log::debug!(
            "built EDM model '{}': {} entity types, {} complex types, {} entity sets",
            model.namespace,
            model.entity_types.len(),
            model.complex_types.len(),
            model.entity_sets.len()
        );
        Ok(model)
    }
}

impl CsdlModel {
    fn validate(&self) -> Result<()> {
        for ty in self.entity_types.values() {
            if let Some(base) = &ty.base_type {
                if self.find_entity_type(base).is_none() {
                    return Err(unknown_type(base, &ty.name));
                }
            }
            for property in ty.properties.values() {
                self.check_type_ref(&property.type_ref, &ty.name)?;
            }
            for nav in ty.navigation_properties.values() {
                if self.find_entity_type(&nav.target_type).is_none() {
                    return Err(unknown_type(&nav.target_type, &ty.name));
                }
            }
            for key in &ty.key {
                if self.find_property(&ty.name, key).is_none() {
                    return Err(ODataError::model(
                        ODU0452,
                        format!("key property '{key}' is not declared on '{}'", ty.name),
                    ));
                }
            }
        }
        for ty in self.complex_types.values() {
            if let Some(base) = &ty.base_type {
                if self.find_complex_type(base).is_none() {
                    return Err(unknown_type(base, &ty.name));
                }
            }
            for property in ty.properties.values() {
                self.check_type_ref(&property.type_ref, &ty.name)?;
            }
        }
        for set in self.entity_sets.values() {
            if self.find_entity_type(&set.entity_type).is_none() {
                return Err(unknown_type(&set.entity_type, &set.name));
            }
            if self.key_properties(&set.entity_type).is_empty() {
                return Err(ODataError::model(
                    ODU0452,
                    format!("entity type '{}' of set '{}' has no key", set.entity_type, set.name),
                ));
            }
            for target in set.navigation_bindings.values() {
                if self.find_entity_set(target).is_none() {
                    return Err(ODataError::model(
                        ODU0452,
                        format!("navigation binding of '{}' targets unknown set '{target}'", set.name),
                    ));
                }
            }
        }
        for single in self.singletons.values() {
            if self.find_entity_type(&single.entity_type).is_none() {
                return Err(unknown_type(&single.entity_type, &single.name));
            }
        }
        for op in self.operations.values().flatten() {
            for parameter in &op.parameters {
                self.check_type_ref(&parameter.type_ref, &op.name)?;
            }
            if let Some(ret) = &op.return_type {
                self.check_type_ref(ret, &op.name)?;
            }
        }
        for import in self.operation_imports.values() {
            if self.find_operations(&import.operation).is_empty() {
                return Err(ODataError::model(
                    ODU0452,
                    format!("import '{}' refers to unknown operation '{}'", import.name, import.operation),
                ));
            }
        }
        Ok(())
    }

    fn check_type_ref(&self, type_ref: &EdmTypeRef, owner: &str) -> Result<()> {
        match type_ref.element_type() {
            EdmTypeRef::Entity(name) if self.find_entity_type(name).is_none() => {
                Err(unknown_type(name, owner))
            }
            EdmTypeRef::Complex(name) if self.find_complex_type(name).is_none() => {
                Err(unknown_type(name, owner))
            }
            _ => Ok(()),
        }
    }
}

fn unknown_type(name: &str, owner: &str) -> ODataError {
    ODataError::model(ODU0451, format!("unknown type '{name}' referenced by '{owner}'"))
}
