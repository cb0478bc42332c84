//! Unresolved schema representation shared by the JSON and XML loaders
//!
//! Loaders produce a `RawSchema` with type references still spelled as
//! strings; `into_model` resolves them once every type name is known.

use crate::{
    ComplexType, CsdlModel, EdmPrimitiveKind, EdmTypeRef, EntitySet, EntityType, Multiplicity,
    NavigationProperty, Operation, OperationImport, OperationKind, Parameter, Property, Singleton,
    collection_element_name,
};
use odata_uri_diagnostics::{ODataError, ODU0450, ODU0451, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawSchema {
    pub namespace: String,
    #[serde(default)]
    pub entity_types: Vec<RawEntityType>,
    #[serde(default)]
    pub complex_types: Vec<RawComplexType>,
    #[serde(default)]
    pub functions: Vec<RawOperation>,
    #[serde(default)]
    pub actions: Vec<RawOperation>,
    #[serde(default)]
    pub entity_container: RawContainer,
    #[serde(default)]
    pub annotations: Vec<RawAnnotation>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawEntityType {
    pub name: String,
    pub base_type: Option<String>,
    #[serde(default)]
    pub key: Vec<String>,
    #[serde(default)]
    pub open_type: bool,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    #[serde(default)]
    pub properties: Vec<RawProperty>,
    #[serde(default)]
    pub navigation_properties: Vec<RawNavigationProperty>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawComplexType {
    pub name: String,
    pub base_type: Option<String>,
    #[serde(default)]
    pub open_type: bool,
    #[serde(default)]
    pub properties: Vec<RawProperty>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawProperty {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub nullable: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawNavigationProperty {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub nullable: Option<bool>,
    pub partner: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawOperation {
    pub name: String,
    #[serde(default)]
    pub is_bound: bool,
    #[serde(default)]
    pub parameters: Vec<RawProperty>,
    pub return_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawContainer {
    #[serde(default)]
    pub entity_sets: Vec<RawEntitySet>,
    #[serde(default)]
    pub singletons: Vec<RawSingleton>,
    #[serde(default)]
    pub function_imports: Vec<RawFunctionImport>,
    #[serde(default)]
    pub action_imports: Vec<RawActionImport>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawEntitySet {
    pub name: String,
    pub entity_type: String,
    #[serde(default)]
    pub navigation_bindings: Vec<RawBinding>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawSingleton {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub navigation_bindings: Vec<RawBinding>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawBinding {
    pub path: String,
    pub target: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawFunctionImport {
    pub name: String,
    pub function: String,
    pub entity_set: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawActionImport {
    pub name: String,
    pub action: String,
    pub entity_set: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawAnnotation {
    pub target: String,
    pub term: String,
    pub value: Value,
}

/// Parse the JSON model format
pub(crate) fn parse_json(json: &str) -> Result<RawSchema> {
    serde_json::from_str(json)
        .map_err(|e| ODataError::model(ODU0450, format!("JSON parse error: {e}")))
}

struct TypeNames {
    namespace: String,
    entities: HashSet<String>,
    complexes: HashSet<String>,
}

impl TypeNames {
    fn qualify(&self, name: &str) -> String {
        if name.contains('.') {
            name.to_string()
        } else {
            format!("{}.{name}", self.namespace)
        }
    }

    fn resolve(&self, name: &str) -> Result<EdmTypeRef> {
        if let Some(element) = collection_element_name(name) {
            return Ok(EdmTypeRef::collection(self.resolve(element)?));
        }
        if let Some(kind) = EdmPrimitiveKind::from_name(name) {
            return Ok(EdmTypeRef::Primitive(kind));
        }
        let qualified = self.qualify(name);
        if self.entities.contains(&qualified) {
            Ok(EdmTypeRef::Entity(qualified))
        } else if self.complexes.contains(&qualified) {
            Ok(EdmTypeRef::Complex(qualified))
        } else {
            Err(ODataError::model(ODU0451, format!("unknown type '{name}'")))
        }
    }

    fn property(&self, raw: RawProperty) -> Result<Property> {
        Ok(Property {
            type_ref: self.resolve(&raw.type_name)?,
            nullable: raw.nullable.unwrap_or(true),
            name: raw.name,
        })
    }

    fn operation(&self, raw: RawOperation, kind: OperationKind) -> Result<Operation> {
        let parameters = raw
            .parameters
            .into_iter()
            .map(|p| {
                Ok(Parameter {
                    type_ref: self.resolve(&p.type_name)?,
                    name: p.name,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let return_type = raw.return_type.as_deref().map(|t| self.resolve(t)).transpose()?;
        Ok(Operation {
            name: self.qualify(&raw.name),
            kind,
            is_bound: raw.is_bound,
            parameters,
            return_type,
        })
    }
}

impl RawSchema {
    /// Resolve type references and build the model
    pub(crate) fn into_model(self) -> Result<CsdlModel> {
        let names = TypeNames {
            entities: self
                .entity_types
                .iter()
                .map(|t| qualify_in(&self.namespace, &t.name))
                .collect(),
            complexes: self
                .complex_types
                .iter()
                .map(|t| qualify_in(&self.namespace, &t.name))
                .collect(),
            namespace: self.namespace.clone(),
        };

        let mut builder = CsdlModel::builder(&self.namespace);

        for raw in self.entity_types {
            let mut ty = EntityType::new(names.qualify(&raw.name));
            ty.base_type = raw.base_type.as_deref().map(|b| names.qualify(b));
            ty.key = raw.key;
            ty.is_open = raw.open_type;
            ty.is_abstract = raw.is_abstract;
            for property in raw.properties {
                ty = ty.with_property(names.property(property)?);
            }
            for nav in raw.navigation_properties {
                let (target, multiplicity) = match collection_element_name(&nav.type_name) {
                    Some(element) => (element, Multiplicity::Many),
                    None if nav.nullable == Some(false) => (nav.type_name.as_str(), Multiplicity::One),
                    None => (nav.type_name.as_str(), Multiplicity::ZeroOrOne),
                };
                let mut navigation =
                    NavigationProperty::new(&nav.name, names.qualify(target), multiplicity);
                navigation.partner = nav.partner;
                ty = ty.with_navigation(navigation);
            }
            builder = builder.entity_type(ty);
        }

        for raw in self.complex_types {
            let mut ty = ComplexType::new(names.qualify(&raw.name));
            ty.base_type = raw.base_type.as_deref().map(|b| names.qualify(b));
            ty.is_open = raw.open_type;
            for property in raw.properties {
                ty = ty.with_property(names.property(property)?);
            }
            builder = builder.complex_type(ty);
        }

        for raw in self.functions {
            builder = builder.operation(names.operation(raw, OperationKind::Function)?);
        }
        for raw in self.actions {
            builder = builder.operation(names.operation(raw, OperationKind::Action)?);
        }

        let container = self.entity_container;
        for raw in container.entity_sets {
            let mut set = EntitySet::new(raw.name, names.qualify(&raw.entity_type));
            for binding in raw.navigation_bindings {
                set = set.with_binding(binding.path, binding.target);
            }
            builder = builder.entity_set(set);
        }
        for raw in container.singletons {
            let mut single = Singleton::new(raw.name, names.qualify(&raw.type_name));
            for binding in raw.navigation_bindings {
                single.navigation_bindings.insert(binding.path, binding.target);
            }
            builder = builder.singleton(single);
        }
        for raw in container.function_imports {
            builder = builder.operation_import(OperationImport {
                name: raw.name,
                operation: names.qualify(&raw.function),
                kind: OperationKind::Function,
                entity_set: raw.entity_set,
            });
        }
        for raw in container.action_imports {
            builder = builder.operation_import(OperationImport {
                name: raw.name,
                operation: names.qualify(&raw.action),
                kind: OperationKind::Action,
                entity_set: raw.entity_set,
            });
        }

        for annotation in self.annotations {
            builder = builder.annotation(annotation.target, annotation.term, annotation.value);
        }

        builder.build()
    }
}

fn qualify_in(namespace: &str, name: &str) -> String {
    if name.contains('.') {
        name.to_string()
    } else {
        format!("{namespace}.{name}")
    }
}
