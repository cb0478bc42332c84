//! Resource path binding
//!
//! A left-to-right fold over the raw segments from the parser. Each segment is
//! resolved against the type, cardinality and entity set produced by the one
//! before it. Binding never fails as a whole: the first segment that cannot
//! be resolved becomes an [`PathSegment::Unresolved`] placeholder carrying its
//! error, and so does every segment after it. [`ODataPath::ensure_resolved`]
//! turns the first placeholder back into an error.

use crate::promotion::can_promote;
use crate::scope::BatchReferenceResolver;
use odata_uri_ast::{LiteralValue, QueryToken, Spanned};
use odata_uri_diagnostics::{
    ErrorCode, ODataError, Result, Span, ODU0153, ODU0302, ODU0303, ODU0304, ODU0305, ODU0306, ODU0307,
};
use odata_uri_edm::{EdmModel, EdmPrimitiveKind, EdmTypeRef, Operation, OperationKind, Property};
use odata_uri_parser::{split_path, ParserSettings, RawSegment, SegmentArgument, UrlConventions};
use serde::{Serialize, Serializer};

/// A key or parameter value taken from the path
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SegmentValue {
    Literal(LiteralValue),
    /// `@name`, resolved by the caller
    Alias(String),
}

/// One key property value of a key segment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyValue {
    pub name: String,
    pub value: SegmentValue,
    /// Declared type of the key property
    pub type_ref: EdmTypeRef,
}

/// A named operation parameter given in a path segment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationParameter {
    pub name: String,
    pub value: SegmentValue,
}

/// A resolved (or placeholder) resource path segment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PathSegment {
    Metadata,
    Batch,
    /// `$1`, a reference to an earlier request of a batch
    BatchReference {
        content_id: String,
        type_ref: EdmTypeRef,
        entity_set: Option<String>,
    },
    EntitySet {
        name: String,
        type_ref: EdmTypeRef,
    },
    Singleton {
        name: String,
        type_ref: EdmTypeRef,
    },
    Key {
        keys: Vec<KeyValue>,
        type_ref: EdmTypeRef,
        entity_set: Option<String>,
    },
    NavigationProperty {
        name: String,
        type_ref: EdmTypeRef,
        entity_set: Option<String>,
    },
    Property {
        name: String,
        type_ref: EdmTypeRef,
    },
    OpenProperty {
        name: String,
    },
    TypeCast {
        type_name: String,
        type_ref: EdmTypeRef,
        entity_set: Option<String>,
    },
    /// Bound function or action
    Operation {
        name: String,
        kind: OperationKind,
        parameters: Vec<OperationParameter>,
        type_ref: EdmTypeRef,
    },
    /// Function or action import
    OperationImport {
        name: String,
        operation: String,
        kind: OperationKind,
        parameters: Vec<OperationParameter>,
        type_ref: EdmTypeRef,
        entity_set: Option<String>,
    },
    Ref {
        type_ref: EdmTypeRef,
    },
    Value {
        type_ref: EdmTypeRef,
    },
    Count,
    /// Placeholder for a segment that could not be resolved
    Unresolved {
        identifier: String,
        #[serde(serialize_with = "serialize_error")]
        error: ODataError,
    },
}

fn serialize_error<S: Serializer>(error: &ODataError, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&error.to_string())
}

impl PathSegment {
    /// Type produced by the segment; `Untyped` for `$metadata`, `$batch`,
    /// dynamic properties and placeholders
    pub fn target_type(&self) -> EdmTypeRef {
        match self {
            Self::Metadata | Self::Batch | Self::OpenProperty { .. } | Self::Unresolved { .. } => {
                EdmTypeRef::Untyped
            }
            Self::BatchReference { type_ref, .. }
            | Self::EntitySet { type_ref, .. }
            | Self::Singleton { type_ref, .. }
            | Self::Key { type_ref, .. }
            | Self::NavigationProperty { type_ref, .. }
            | Self::Property { type_ref, .. }
            | Self::TypeCast { type_ref, .. }
            | Self::Operation { type_ref, .. }
            | Self::OperationImport { type_ref, .. }
            | Self::Ref { type_ref }
            | Self::Value { type_ref } => type_ref.clone(),
            Self::Count => EdmTypeRef::primitive(EdmPrimitiveKind::Int64),
        }
    }

    pub fn is_collection(&self) -> bool {
        self.target_type().is_collection()
    }

    /// Entity set of the entities the segment produces, when known
    pub fn entity_set(&self) -> Option<&str> {
        match self {
            Self::EntitySet { name, .. } => Some(name),
            Self::BatchReference { entity_set, .. }
            | Self::Key { entity_set, .. }
            | Self::NavigationProperty { entity_set, .. }
            | Self::TypeCast { entity_set, .. }
            | Self::OperationImport { entity_set, .. } => entity_set.as_deref(),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Unresolved { .. })
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Metadata => "$metadata",
            Self::Batch => "$batch",
            Self::BatchReference { .. } => "batch reference",
            Self::EntitySet { .. } => "entity set",
            Self::Singleton { .. } => "singleton",
            Self::Key { .. } => "key",
            Self::NavigationProperty { .. } => "navigation property",
            Self::Property { .. } => "property",
            Self::OpenProperty { .. } => "open property",
            Self::TypeCast { .. } => "type cast",
            Self::Operation { .. } => "operation",
            Self::OperationImport { .. } => "operation import",
            Self::Ref { .. } => "$ref",
            Self::Value { .. } => "$value",
            Self::Count => "$count",
            Self::Unresolved { .. } => "unresolved",
        }
    }
}

/// A bound resource path
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ODataPath {
    segments: Vec<PathSegment>,
}

impl ODataPath {
    pub fn new(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn last(&self) -> Option<&PathSegment> {
        self.segments.last()
    }

    /// Type produced by the whole path
    pub fn target_type(&self) -> EdmTypeRef {
        self.last().map_or(EdmTypeRef::Untyped, PathSegment::target_type)
    }

    /// Entity set of the last segment that knows one
    pub fn entity_set(&self) -> Option<&str> {
        self.segments.iter().rev().find_map(PathSegment::entity_set)
    }

    pub fn is_resolved(&self) -> bool {
        self.segments.iter().all(PathSegment::is_resolved)
    }

    /// Error of the first placeholder segment
    pub fn first_error(&self) -> Option<&ODataError> {
        self.segments.iter().find_map(|segment| match segment {
            PathSegment::Unresolved { error, .. } => Some(error),
            _ => None,
        })
    }

    /// The path itself when fully resolved, else the first placeholder's error
    pub fn ensure_resolved(self) -> Result<Self> {
        match self.first_error() {
            Some(error) => Err(error.clone()),
            None => Ok(self),
        }
    }

    /// Interpret the path as an entity id: exactly an entity set and one key
    pub fn into_entity_id(self) -> Result<EntityIdSegment> {
        let path = self.ensure_resolved()?;
        match path.segments.as_slice() {
            [PathSegment::EntitySet { name, .. }, PathSegment::Key { keys, type_ref, .. }] => Ok(EntityIdSegment {
                entity_set: name.clone(),
                type_ref: type_ref.clone(),
                keys: keys.clone(),
            }),
            segments => Err(ODataError::semantic(
                ODU0307,
                format!(
                    "an entity id must be an entity set followed by a key, found {}",
                    segments.iter().map(PathSegment::kind_name).collect::<Vec<_>>().join("/")
                ),
            )),
        }
    }
}

impl<'p> IntoIterator for &'p ODataPath {
    type Item = &'p PathSegment;
    type IntoIter = std::slice::Iter<'p, PathSegment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}

/// An entity addressed by `EntitySet(key)`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityIdSegment {
    pub entity_set: String,
    pub type_ref: EdmTypeRef,
    pub keys: Vec<KeyValue>,
}

/// What the segments bound so far produced
#[derive(Debug, Clone)]
struct Cursor {
    type_ref: EdmTypeRef,
    entity_set: Option<String>,
    singleton: Option<String>,
    /// Identifier of the segment that produced the cursor
    after: String,
    /// No segment may follow
    terminal: bool,
}

impl Cursor {
    fn new(type_ref: EdmTypeRef, after: &str) -> Self {
        Self {
            type_ref,
            entity_set: None,
            singleton: None,
            after: after.to_string(),
            terminal: false,
        }
    }

    fn in_set(mut self, entity_set: Option<String>) -> Self {
        self.entity_set = entity_set;
        self
    }

    fn terminal(mut self) -> Self {
        self.terminal = true;
        self
    }
}

type Step = (Vec<PathSegment>, Cursor);

/// Resolves raw path segments against the model
pub struct PathBinder<'a> {
    model: &'a dyn EdmModel,
    settings: &'a ParserSettings,
    batch_resolver: Option<&'a BatchReferenceResolver>,
}

impl<'a> PathBinder<'a> {
    pub fn new(model: &'a dyn EdmModel, settings: &'a ParserSettings) -> Self {
        Self {
            model,
            settings,
            batch_resolver: None,
        }
    }

    pub fn with_batch_resolver(mut self, resolver: Option<&'a BatchReferenceResolver>) -> Self {
        self.batch_resolver = resolver;
        self
    }

    /// Split and bind a path. Only syntax errors fail; resolution errors
    /// become placeholder segments.
    pub fn parse(&self, path: &str) -> Result<ODataPath> {
        let raw = split_path(path, self.settings)?;
        Ok(self.bind(&raw))
    }

    /// Bind raw segments left to right
    pub fn bind(&self, raw_segments: &[RawSegment]) -> ODataPath {
        let mut segments = Vec::with_capacity(raw_segments.len());
        let mut cursor: Option<Cursor> = None;
        let mut failed: Option<&str> = None;

        for raw in raw_segments {
            if let Some(failed) = failed {
                segments.push(PathSegment::Unresolved {
                    identifier: raw.identifier.clone(),
                    error: unresolved(raw, format!("follows unresolved segment '{failed}'")),
                });
                continue;
            }
            match self.bind_segment(raw, cursor.as_ref()) {
                Ok((produced, next)) => {
                    segments.extend(produced);
                    cursor = Some(next);
                }
                Err(error) => {
                    log::debug!("path segment '{}' unresolved: {error}", raw.identifier);
                    failed = Some(&raw.identifier);
                    segments.push(PathSegment::Unresolved {
                        identifier: raw.identifier.clone(),
                        error,
                    });
                }
            }
        }
        ODataPath::new(segments)
    }

    fn bind_segment(&self, raw: &RawSegment, cursor: Option<&Cursor>) -> Result<Step> {
        let Some(cursor) = cursor else {
            return self.bind_first(raw);
        };
        if cursor.terminal {
            return Err(not_allowed(raw, format!("no segment may follow '{}'", cursor.after)));
        }
        if raw.is_system() {
            return self.bind_system(raw, cursor);
        }

        match &cursor.type_ref {
            EdmTypeRef::Collection(element) if element.is_entity() => {
                self.bind_after_entity_collection(raw, cursor)
            }
            EdmTypeRef::Entity(_) | EdmTypeRef::Complex(_) => self.bind_after_single(raw, cursor),
            EdmTypeRef::Untyped => {
                if raw.arguments.is_some() {
                    return Err(not_allowed(raw, "a dynamic property cannot take arguments"));
                }
                let name = raw.identifier.clone();
                Ok((
                    vec![PathSegment::OpenProperty { name }],
                    Cursor::new(EdmTypeRef::Untyped, &raw.identifier),
                ))
            }
            other => Err(not_allowed(
                raw,
                format!("'{}' of type '{other}' has no members", cursor.after),
            )),
        }
    }

    fn bind_first(&self, raw: &RawSegment) -> Result<Step> {
        let identifier = raw.identifier.as_str();
        match identifier {
            "$metadata" | "$batch" => {
                if raw.arguments.is_some() {
                    return Err(not_allowed(raw, format!("'{identifier}' cannot take arguments")));
                }
                let segment = if identifier == "$metadata" {
                    PathSegment::Metadata
                } else {
                    PathSegment::Batch
                };
                return Ok((vec![segment], Cursor::new(EdmTypeRef::Untyped, identifier).terminal()));
            }
            "$count" | "$ref" | "$value" => {
                return Err(not_allowed(raw, format!("'{identifier}' cannot be the first segment")));
            }
            _ => {}
        }
        if let Some(content_id) = identifier.strip_prefix('$') {
            return self.bind_batch_reference(raw, content_id);
        }

        let model = self.model;
        if let Some(set) = model.find_entity_set(identifier) {
            let type_ref = EdmTypeRef::collection(EdmTypeRef::entity(&set.entity_type));
            let cursor = Cursor::new(type_ref.clone(), identifier).in_set(Some(set.name.clone()));
            let segment = PathSegment::EntitySet {
                name: set.name.clone(),
                type_ref,
            };
            return self.with_key(raw, segment, cursor);
        }
        if let Some(singleton) = model.find_singleton(identifier) {
            if raw.arguments.is_some() {
                return Err(not_allowed(raw, format!("singleton '{identifier}' cannot take a key")));
            }
            let type_ref = EdmTypeRef::entity(&singleton.entity_type);
            let mut cursor = Cursor::new(type_ref.clone(), identifier);
            cursor.singleton = Some(singleton.name.clone());
            return Ok((
                vec![PathSegment::Singleton {
                    name: singleton.name.clone(),
                    type_ref,
                }],
                cursor,
            ));
        }
        if let Some(import) = model.find_operation_import(identifier) {
            let candidates: Vec<&Operation> = model
                .find_operations(&import.operation)
                .iter()
                .filter(|op| !op.is_bound && op.kind == import.kind)
                .collect();
            let (operation, parameters) = self.select_operation(raw, &candidates)?;
            let type_ref = operation.return_type.clone().unwrap_or(EdmTypeRef::Untyped);
            let mut cursor = Cursor::new(type_ref.clone(), identifier).in_set(import.entity_set.clone());
            cursor.terminal = operation.return_type.is_none();
            return Ok((
                vec![PathSegment::OperationImport {
                    name: import.name.clone(),
                    operation: operation.name.clone(),
                    kind: operation.kind,
                    parameters,
                    type_ref,
                    entity_set: import.entity_set.clone(),
                }],
                cursor,
            ));
        }
        Err(unresolved(
            raw,
            "not an entity set, singleton or operation import",
        ))
    }

    fn bind_batch_reference(&self, raw: &RawSegment, content_id: &str) -> Result<Step> {
        let referenced = self
            .batch_resolver
            .and_then(|resolve| resolve(content_id))
            .ok_or_else(|| {
                ODataError::semantic_at(
                    ODU0305,
                    format!("batch content id '${content_id}' does not refer to an earlier request"),
                    raw.identifier_span(),
                )
            })?;
        // a referenced path never contains further references
        let target = PathBinder::new(self.model, self.settings)
            .parse(&referenced)
            .and_then(ODataPath::ensure_resolved)
            .map_err(|e| {
                ODataError::semantic_at(
                    ODU0305,
                    format!("batch reference '${content_id}' points at an invalid path: {e}"),
                    raw.identifier_span(),
                )
            })?;
        let type_ref = target.target_type();
        let entity_set = target.entity_set().map(str::to_string);
        let cursor = Cursor::new(type_ref.clone(), &raw.identifier).in_set(entity_set.clone());
        let segment = PathSegment::BatchReference {
            content_id: content_id.to_string(),
            type_ref,
            entity_set,
        };
        if raw.arguments.is_some() {
            return self.with_key(raw, segment, cursor);
        }
        Ok((vec![segment], cursor))
    }

    fn bind_system(&self, raw: &RawSegment, cursor: &Cursor) -> Result<Step> {
        if raw.arguments.is_some() {
            return Err(not_allowed(raw, format!("'{}' cannot take arguments", raw.identifier)));
        }
        let type_ref = &cursor.type_ref;
        match raw.identifier.as_str() {
            "$count" if type_ref.is_collection() => Ok((
                vec![PathSegment::Count],
                Cursor::new(EdmTypeRef::primitive(EdmPrimitiveKind::Int64), "$count").terminal(),
            )),
            "$ref" if type_ref.element_type().is_entity() => Ok((
                vec![PathSegment::Ref {
                    type_ref: type_ref.clone(),
                }],
                Cursor::new(type_ref.clone(), "$ref").terminal(),
            )),
            "$value" if type_ref.as_primitive().is_some() || type_ref.is_untyped() => Ok((
                vec![PathSegment::Value {
                    type_ref: type_ref.clone(),
                }],
                Cursor::new(type_ref.clone(), "$value").terminal(),
            )),
            "$count" | "$ref" | "$value" | "$metadata" | "$batch" => Err(not_allowed(
                raw,
                format!("'{}' cannot follow '{}' of type '{type_ref}'", raw.identifier, cursor.after),
            )),
            _ => Err(unresolved(raw, "unknown system segment")),
        }
    }

    fn bind_after_entity_collection(&self, raw: &RawSegment, cursor: &Cursor) -> Result<Step> {
        if raw.identifier.contains('.') {
            if let Some(step) = self.try_type_cast(raw, cursor)? {
                return Ok(step);
            }
            if let Some(step) = self.try_bound_operation(raw, cursor)? {
                return Ok(step);
            }
        }
        if self.settings.url_conventions == UrlConventions::KeyAsSegment && raw.arguments.is_none() {
            let element = cursor.type_ref.element_type().clone();
            let argument = self.key_as_segment(raw, &element)?;
            let (key, next) = self.key(vec![argument], cursor, raw.identifier_span())?;
            return Ok((vec![key], next));
        }
        Err(unresolved(
            raw,
            format!(
                "'{}' is a collection; address a single entity with a key before '{}'",
                cursor.after, raw.identifier
            ),
        ))
    }

    fn bind_after_single(&self, raw: &RawSegment, cursor: &Cursor) -> Result<Step> {
        let Some(type_name) = cursor.type_ref.structured_name() else {
            return Err(unresolved(raw, "no structured type in scope"));
        };
        if raw.identifier.contains('.') {
            if let Some(step) = self.try_type_cast(raw, cursor)? {
                return Ok(step);
            }
            if let Some(step) = self.try_bound_operation(raw, cursor)? {
                return Ok(step);
            }
            return Err(unresolved(
                raw,
                format!("not a type or an operation bound to '{type_name}'"),
            ));
        }

        let model = self.model;
        let identifier = raw.identifier.as_str();
        let property = model.find_property(type_name, identifier);
        let navigation = model.find_navigation_property(type_name, identifier);
        match (property, navigation) {
            (Some(_), Some(_)) => Err(ODataError::AmbiguousBinding {
                name: identifier.to_string(),
                candidates: vec![
                    format!("structural property {type_name}/{identifier}"),
                    format!("navigation property {type_name}/{identifier}"),
                ],
                span: raw.identifier_span(),
            }),
            (Some(property), None) => {
                if raw.arguments.is_some() {
                    return Err(not_allowed(raw, format!("property '{identifier}' cannot take a key")));
                }
                Ok((
                    vec![PathSegment::Property {
                        name: property.name.clone(),
                        type_ref: property.type_ref.clone(),
                    }],
                    Cursor::new(property.type_ref.clone(), identifier),
                ))
            }
            (None, Some(navigation)) => {
                let target = match (&cursor.entity_set, &cursor.singleton) {
                    (Some(set), _) => model.navigation_target(set, identifier),
                    (None, Some(singleton)) => model.singleton_navigation_target(singleton, identifier),
                    (None, None) => None,
                };
                let entity_set = target.map(|set| set.name.clone());
                let type_ref = navigation.type_ref();
                let next = Cursor::new(type_ref.clone(), identifier).in_set(entity_set.clone());
                let segment = PathSegment::NavigationProperty {
                    name: navigation.name.clone(),
                    type_ref,
                    entity_set,
                };
                self.with_key(raw, segment, next)
            }
            (None, None) if model.is_open_type(type_name) => {
                if raw.arguments.is_some() {
                    return Err(not_allowed(raw, "a dynamic property cannot take arguments"));
                }
                Ok((
                    vec![PathSegment::OpenProperty {
                        name: identifier.to_string(),
                    }],
                    Cursor::new(EdmTypeRef::Untyped, identifier),
                ))
            }
            (None, None) => Err(unresolved(raw, format!("no property named '{identifier}' on '{type_name}'"))),
        }
    }

    /// Append a key segment when the raw segment carries `(...)`
    fn with_key(&self, raw: &RawSegment, segment: PathSegment, cursor: Cursor) -> Result<Step> {
        if raw.arguments.is_none() {
            return Ok((vec![segment], cursor));
        }
        if !(cursor.type_ref.is_collection() && cursor.type_ref.element_type().is_entity()) {
            return Err(not_allowed(
                raw,
                format!("'{}' is not an entity collection and cannot take a key", raw.identifier),
            ));
        }
        let arguments = raw.parse_arguments()?;
        let (key, next) = self.key(arguments, &cursor, raw.span)?;
        Ok((vec![segment, key], next))
    }

    /// Key segment selecting one entity of the collection in `cursor`
    fn key(&self, arguments: Vec<SegmentArgument>, cursor: &Cursor, span: Span) -> Result<(PathSegment, Cursor)> {
        let element = cursor.type_ref.element_type().clone();
        let entity_type = element.structured_name().unwrap_or_default();
        let key_properties = self.model.key_properties(entity_type);
        if key_properties.len() != arguments.len() {
            return Err(ODataError::semantic_at(
                ODU0302,
                format!(
                    "'{entity_type}' has {} key properties but {} key values were given",
                    key_properties.len(),
                    arguments.len()
                ),
                span,
            ));
        }

        let mut keys: Vec<KeyValue> = Vec::with_capacity(arguments.len());
        for argument in arguments {
            let property = match &argument.name {
                None if key_properties.len() == 1 => key_properties[0],
                None => {
                    return Err(ODataError::semantic_at(
                        ODU0302,
                        format!("composite key of '{entity_type}' must name every key property"),
                        argument.value.span,
                    ));
                }
                Some(name) => key_properties
                    .iter()
                    .copied()
                    .find(|p| p.name == name.inner)
                    .ok_or_else(|| {
                        ODataError::semantic_at(
                            ODU0302,
                            format!("'{}' is not a key property of '{entity_type}'", name.inner),
                            name.span,
                        )
                    })?,
            };
            if keys.iter().any(|k| k.name == property.name) {
                return Err(ODataError::semantic_at(
                    ODU0302,
                    format!("key property '{}' is given more than once", property.name),
                    argument.value.span,
                ));
            }
            keys.push(KeyValue {
                name: property.name.clone(),
                value: key_value(&argument.value, property)?,
                type_ref: property.type_ref.clone(),
            });
        }

        let next = Cursor {
            type_ref: element.clone(),
            entity_set: cursor.entity_set.clone(),
            singleton: None,
            after: cursor.after.clone(),
            terminal: false,
        };
        Ok((
            PathSegment::Key {
                keys,
                type_ref: element,
                entity_set: cursor.entity_set.clone(),
            },
            next,
        ))
    }

    /// Read a whole segment as a key value, for `Customers/ALFKI`
    fn key_as_segment(&self, raw: &RawSegment, element: &EdmTypeRef) -> Result<SegmentArgument> {
        match raw.parse_identifier_literal() {
            Ok(value) => Ok(SegmentArgument { name: None, value }),
            Err(error) => {
                let key_properties = self.model.key_properties(element.structured_name().unwrap_or_default());
                let string_key = matches!(
                    key_properties.as_slice(),
                    [only] if only.type_ref == EdmTypeRef::primitive(EdmPrimitiveKind::String)
                );
                if !string_key {
                    return Err(error);
                }
                let text = raw.identifier.clone();
                Ok(SegmentArgument {
                    name: None,
                    value: Spanned::new(
                        QueryToken::literal(LiteralValue::String(text.clone()), text),
                        raw.span,
                    ),
                })
            }
        }
    }

    fn try_type_cast(&self, raw: &RawSegment, cursor: &Cursor) -> Result<Option<Step>> {
        let Some(target) = self.model.find_type(&raw.identifier) else {
            return Ok(None);
        };
        let source = cursor.type_ref.element_type();
        let derives = match (source.structured_name(), target.structured_name()) {
            (Some(source), Some(target_name)) => {
                // entities cast to entity types, complex values to complex types
                self.model.find_entity_type(source).is_some() == target.is_entity()
                    && self.model.is_derived_from(target_name, source)
            }
            _ => false,
        };
        if !derives {
            return Err(ODataError::Cast {
                source_type: source.full_name(),
                target_type: raw.identifier.clone(),
                span: raw.identifier_span(),
            });
        }

        let type_ref = if cursor.type_ref.is_collection() {
            EdmTypeRef::collection(target)
        } else {
            target
        };
        let mut next = Cursor::new(type_ref.clone(), &raw.identifier).in_set(cursor.entity_set.clone());
        next.singleton = cursor.singleton.clone();
        let segment = PathSegment::TypeCast {
            type_name: raw.identifier.clone(),
            type_ref,
            entity_set: cursor.entity_set.clone(),
        };
        self.with_key(raw, segment, next).map(Some)
    }

    fn try_bound_operation(&self, raw: &RawSegment, cursor: &Cursor) -> Result<Option<Step>> {
        let candidates = self.model.find_bound_operations(&raw.identifier, &cursor.type_ref);
        if candidates.is_empty() {
            return Ok(None);
        }
        let (operation, parameters) = self.select_operation(raw, &candidates)?;
        let type_ref = operation.return_type.clone().unwrap_or(EdmTypeRef::Untyped);
        let mut next = Cursor::new(type_ref.clone(), &raw.identifier);
        next.terminal = operation.return_type.is_none();
        Ok(Some((
            vec![PathSegment::Operation {
                name: operation.name.clone(),
                kind: operation.kind,
                parameters,
                type_ref,
            }],
            next,
        )))
    }

    /// Pick the overload whose parameter names match the supplied ones
    fn select_operation<'o>(
        &self,
        raw: &RawSegment,
        candidates: &[&'o Operation],
    ) -> Result<(&'o Operation, Vec<OperationParameter>)> {
        let arguments = raw.parse_arguments()?;
        let mut names = Vec::with_capacity(arguments.len());
        for argument in &arguments {
            let Some(name) = &argument.name else {
                return Err(ODataError::semantic_at(
                    ODU0306,
                    format!("parameters of '{}' must be named", raw.identifier),
                    argument.value.span,
                ));
            };
            if names.contains(&name.inner) {
                return Err(ODataError::semantic_at(
                    ODU0306,
                    format!("parameter '{}' of '{}' is supplied more than once", name.inner, raw.identifier),
                    name.span,
                ));
            }
            names.push(name.inner.clone());
        }

        let matching: Vec<&'o Operation> = candidates
            .iter()
            .copied()
            .filter(|op| match op.kind {
                // actions are invoked without parentheses, parameters travel in the body
                OperationKind::Action => raw.arguments.is_none(),
                OperationKind::Function => {
                    let parameters = op.call_parameters();
                    parameters.len() == names.len()
                        && names.iter().all(|n| parameters.iter().any(|p| p.name == *n))
                }
            })
            .collect();
        let operation = match matching.as_slice() {
            [only] => *only,
            [] => {
                return Err(ODataError::semantic_at(
                    ODU0306,
                    format!(
                        "no overload of '{}' takes parameters ({})",
                        raw.identifier,
                        names.join(", ")
                    ),
                    raw.span,
                ));
            }
            several => {
                return Err(ODataError::semantic_at(
                    ODU0153,
                    format!("'{}' matches {} overloads", raw.identifier, several.len()),
                    raw.identifier_span(),
                ));
            }
        };

        let parameters = arguments
            .into_iter()
            .zip(names.iter())
            .map(|(argument, name)| {
                let declared = operation
                    .call_parameters()
                    .iter()
                    .find(|p| p.name == *name)
                    .map(|p| &p.type_ref);
                let value = segment_value(&argument.value, declared, ODU0306)?;
                Ok(OperationParameter {
                    name: name.clone(),
                    value,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok((operation, parameters))
    }
}

fn key_value(value: &Spanned<QueryToken>, property: &Property) -> Result<SegmentValue> {
    segment_value(value, Some(&property.type_ref), ODU0303).map_err(|error| match error {
        ODataError::Semantic { span, .. } => ODataError::Semantic {
            code: ODU0303,
            message: format!(
                "key '{}' expects a value of type '{}'",
                property.name, property.type_ref
            ),
            span,
        },
        other => other,
    })
}

/// Check a literal against a declared type; aliases are accepted as they are
fn segment_value(
    value: &Spanned<QueryToken>,
    declared: Option<&EdmTypeRef>,
    code: ErrorCode,
) -> Result<SegmentValue> {
    let mismatch = |found: &str| {
        ODataError::semantic_at(
            code,
            format!(
                "expected a value of type '{}', found {found}",
                declared.map_or_else(|| "?".to_string(), EdmTypeRef::full_name)
            ),
            value.span,
        )
    };
    match &value.inner {
        QueryToken::ParameterAlias(name) => Ok(SegmentValue::Alias(name.clone())),
        QueryToken::Literal(literal) => match declared {
            Some(declared) if !literal_fits(&literal.value, declared) => {
                Err(mismatch(&format!("'{}'", literal.original_text)))
            }
            _ => Ok(SegmentValue::Literal(literal.value.clone())),
        },
        other => Err(mismatch(other.kind_name())),
    }
}

/// Whether a literal may stand for a value of `declared`, narrowing integral
/// literals when the value fits
fn literal_fits(value: &LiteralValue, declared: &EdmTypeRef) -> bool {
    let Some(target) = declared.as_primitive() else {
        return false;
    };
    let integral = match value {
        LiteralValue::Int32(v) => Some(i64::from(*v)),
        LiteralValue::Int64(v) => Some(*v),
        _ => None,
    };
    if let Some(v) = integral {
        let fits = match target {
            EdmPrimitiveKind::Byte => u8::try_from(v).is_ok(),
            EdmPrimitiveKind::SByte => i8::try_from(v).is_ok(),
            EdmPrimitiveKind::Int16 => i16::try_from(v).is_ok(),
            EdmPrimitiveKind::Int32 => i32::try_from(v).is_ok(),
            _ => false,
        };
        if fits {
            return true;
        }
    }
    value
        .type_name()
        .and_then(EdmPrimitiveKind::from_name)
        .is_some_and(|kind| can_promote(kind, target, true))
}

fn unresolved(raw: &RawSegment, message: impl Into<String>) -> ODataError {
    ODataError::UnresolvedPathSegment {
        segment: raw.identifier.clone(),
        message: message.into(),
        span: raw.identifier_span(),
    }
}

fn not_allowed(raw: &RawSegment, message: impl Into<String>) -> ODataError {
    ODataError::semantic_at(ODU0304, message, raw.identifier_span())
}
