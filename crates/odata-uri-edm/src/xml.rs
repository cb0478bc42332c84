//! CSDL XML loader
//!
//! Reads the subset of CSDL needed for URI binding: schemas with entity and
//! complex types, functions and actions, the entity container and inline or
//! targeted annotations. Namespace prefixes (`edmx:`) are ignored.

use crate::raw::{
    RawActionImport, RawAnnotation, RawBinding, RawComplexType, RawEntitySet, RawEntityType,
    RawFunctionImport, RawNavigationProperty, RawOperation, RawProperty, RawSchema, RawSingleton,
};
use odata_uri_diagnostics::{ODataError, ODU0450, Result};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde_json::Value;
use std::collections::HashMap;

/// Parse CSDL XML into a raw schema
pub(crate) fn parse_xml(xml: &str) -> Result<RawSchema> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut state = XmlState::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => state.open(&e)?,
            Ok(Event::Empty(e)) => {
                state.open(&e)?;
                state.close(&local_name(&e));
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                state.close(&name);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ODataError::model(
                    ODU0450,
                    format!("XML parse error at {}: {e}", reader.buffer_position()),
                ));
            }
            _ => {}
        }
        buf.clear();
    }

    if state.schema.namespace.is_empty() {
        return Err(ODataError::model(ODU0450, "no Schema element with a Namespace"));
    }
    Ok(state.schema)
}

#[derive(Default)]
struct XmlState {
    schema: RawSchema,
    current_namespace: String,
    entity: Option<RawEntityType>,
    complex: Option<RawComplexType>,
    function: Option<RawOperation>,
    action: Option<RawOperation>,
    entity_set: Option<RawEntitySet>,
    singleton: Option<RawSingleton>,
    in_key: bool,
    /// Annotation targets of the enclosing elements, innermost last
    targets: Vec<Option<String>>,
}

impl XmlState {
    fn open(&mut self, e: &BytesStart<'_>) -> Result<()> {
        let tag = local_name(e);
        let attrs = attributes(e)?;
        let attr = |key: &str| attrs.get(key).cloned();
        let name = attr("Name").unwrap_or_default();

        let target = match tag.as_str() {
            "Schema" => {
                self.current_namespace = attr("Namespace").unwrap_or_default();
                if self.schema.namespace.is_empty() {
                    self.schema.namespace = self.current_namespace.clone();
                }
                None
            }
            "EntityType" => {
                let qualified = self.qualify(&name);
                self.entity = Some(RawEntityType {
                    name: qualified.clone(),
                    base_type: attr("BaseType"),
                    open_type: attr("OpenType").as_deref() == Some("true"),
                    is_abstract: attr("Abstract").as_deref() == Some("true"),
                    ..RawEntityType::default()
                });
                Some(qualified)
            }
            "ComplexType" => {
                let qualified = self.qualify(&name);
                self.complex = Some(RawComplexType {
                    name: qualified.clone(),
                    base_type: attr("BaseType"),
                    open_type: attr("OpenType").as_deref() == Some("true"),
                    ..RawComplexType::default()
                });
                Some(qualified)
            }
            "Key" => {
                self.in_key = true;
                None
            }
            "PropertyRef" => {
                if let (true, Some(entity)) = (self.in_key, self.entity.as_mut()) {
                    entity.key.push(name);
                }
                None
            }
            "Property" => {
                let property = RawProperty {
                    name: name.clone(),
                    type_name: attr("Type").unwrap_or_default(),
                    nullable: attr("Nullable").map(|v| v != "false"),
                };
                let owner = if let Some(entity) = self.entity.as_mut() {
                    entity.properties.push(property);
                    Some(entity.name.clone())
                } else if let Some(complex) = self.complex.as_mut() {
                    complex.properties.push(property);
                    Some(complex.name.clone())
                } else {
                    None
                };
                owner.map(|owner| format!("{owner}/{name}"))
            }
            "NavigationProperty" => {
                let entity = self.entity.as_mut();
                entity.map(|entity| {
                    entity.navigation_properties.push(RawNavigationProperty {
                        name: name.clone(),
                        type_name: attr("Type").unwrap_or_default(),
                        nullable: attr("Nullable").map(|v| v != "false"),
                        partner: attr("Partner"),
                    });
                    format!("{}/{name}", entity.name)
                })
            }
            "Function" | "Action" => {
                let operation = RawOperation {
                    name: self.qualify(&name),
                    is_bound: attr("IsBound").as_deref() == Some("true"),
                    ..RawOperation::default()
                };
                let qualified = operation.name.clone();
                if tag == "Function" {
                    self.function = Some(operation);
                } else {
                    self.action = Some(operation);
                }
                Some(qualified)
            }
            "Parameter" => {
                if let Some(op) = self.function.as_mut().or(self.action.as_mut()) {
                    op.parameters.push(RawProperty {
                        name,
                        type_name: attr("Type").unwrap_or_default(),
                        nullable: attr("Nullable").map(|v| v != "false"),
                    });
                }
                None
            }
            "ReturnType" => {
                if let Some(op) = self.function.as_mut().or(self.action.as_mut()) {
                    op.return_type = attr("Type");
                }
                None
            }
            "EntitySet" => {
                self.entity_set = Some(RawEntitySet {
                    name: name.clone(),
                    entity_type: attr("EntityType").unwrap_or_default(),
                    navigation_bindings: Vec::new(),
                });
                Some(name)
            }
            "Singleton" => {
                self.singleton = Some(RawSingleton {
                    name: name.clone(),
                    type_name: attr("Type").unwrap_or_default(),
                    navigation_bindings: Vec::new(),
                });
                Some(name)
            }
            "NavigationPropertyBinding" => {
                let binding = RawBinding {
                    path: attr("Path").unwrap_or_default(),
                    target: attr("Target").unwrap_or_default(),
                };
                if let Some(set) = self.entity_set.as_mut() {
                    set.navigation_bindings.push(binding);
                } else if let Some(single) = self.singleton.as_mut() {
                    single.navigation_bindings.push(binding);
                }
                None
            }
            "FunctionImport" => {
                self.schema
                    .entity_container
                    .function_imports
                    .push(RawFunctionImport {
                        name: name.clone(),
                        function: attr("Function").unwrap_or_default(),
                        entity_set: attr("EntitySet"),
                    });
                Some(name)
            }
            "ActionImport" => {
                self.schema
                    .entity_container
                    .action_imports
                    .push(RawActionImport {
                        name: name.clone(),
                        action: attr("Action").unwrap_or_default(),
                        entity_set: attr("EntitySet"),
                    });
                Some(name)
            }
            "Annotations" => attr("Target"),
            "Annotation" => {
                let target = self.targets.iter().rev().find_map(Clone::clone);
                match (target, attr("Term")) {
                    (Some(target), Some(term)) => {
                        self.schema.annotations.push(RawAnnotation {
                            target,
                            term,
                            value: annotation_value(&attrs),
                        });
                    }
                    _ => log::warn!("ignoring CSDL annotation without target or term"),
                }
                None
            }
            _ => None,
        };

        self.targets.push(target);
        Ok(())
    }

    fn close(&mut self, tag: &str) {
        self.targets.pop();
        match tag {
            "EntityType" => {
                if let Some(entity) = self.entity.take() {
                    self.schema.entity_types.push(entity);
                }
            }
            "ComplexType" => {
                if let Some(complex) = self.complex.take() {
                    self.schema.complex_types.push(complex);
                }
            }
            "Key" => self.in_key = false,
            "Function" => {
                if let Some(op) = self.function.take() {
                    self.schema.functions.push(op);
                }
            }
            "Action" => {
                if let Some(op) = self.action.take() {
                    self.schema.actions.push(op);
                }
            }
            "EntitySet" => {
                if let Some(set) = self.entity_set.take() {
                    self.schema.entity_container.entity_sets.push(set);
                }
            }
            "Singleton" => {
                if let Some(single) = self.singleton.take() {
                    self.schema.entity_container.singletons.push(single);
                }
            }
            _ => {}
        }
    }

    fn qualify(&self, name: &str) -> String {
        if self.current_namespace.is_empty() {
            name.to_string()
        } else {
            format!("{}.{name}", self.current_namespace)
        }
    }
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).to_string()
}

fn attributes(e: &BytesStart<'_>) -> Result<HashMap<String, String>> {
    let mut map = HashMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| {
            ODataError::model(ODU0450, format!("XML attribute error: {err}"))
        })?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).to_string();
        let value = String::from_utf8_lossy(&attr.value).to_string();
        map.insert(key, value);
    }
    Ok(map)
}

/// Constant annotation expression given as an attribute
fn annotation_value(attrs: &HashMap<String, String>) -> Value {
    if let Some(b) = attrs.get("Bool") {
        return Value::Bool(b == "true");
    }
    if let Some(i) = attrs.get("Int").and_then(|i| i.parse::<i64>().ok()) {
        return Value::from(i);
    }
    if let Some(f) = attrs.get("Float").and_then(|f| f.parse::<f64>().ok()) {
        return Value::from(f);
    }
    ["String", "Decimal", "EnumMember", "Path"]
        .into_iter()
        .find_map(|key| attrs.get(key))
        .map_or(Value::Null, |s| Value::String(s.clone()))
}
