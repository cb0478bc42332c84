//! `$select` and `$expand` binding
//!
//! Terms are resolved against the element type one level at a time. Each level
//! collects its items in a [`SelectExpandBuilder`], which applies the wildcard
//! policy as items arrive and is frozen once into the public
//! [`SelectExpandClause`].
//!
//! The policy depends on arrival order: a wildcard prunes the structural and
//! navigation selections already present at its level, while a structural or
//! navigation selection arriving after a wildcard is dropped. Operation
//! selections and expansions are never pruned. A level without `$select`
//! selects everything, and nothing narrower can be added to it afterwards.

use crate::binder::MetadataBinder;
use crate::clauses::{FilterClause, OrderByClause};
use crate::scope::{AliasResolver, BindingState};
use indexmap::IndexMap;
use odata_uri_ast::{ExpandLevels, ExpandOptionsToken, ExpandToken, SelectTermToken, SelectToken, Spanned};
use odata_uri_diagnostics::{ODataError, Result, ODU0301, ODU0400, ODU0401};
use odata_uri_edm::{EdmModel, EdmTypeRef};
use odata_uri_parser::ParserSettings;
use serde::{Deserialize, Serialize};

/// One segment of a select or expand path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SelectSegment {
    Property { name: String, type_ref: EdmTypeRef },
    Navigation { name: String, type_ref: EdmTypeRef },
    OpenProperty { name: String },
    TypeCast { type_name: String },
    Operation { name: String },
}

impl SelectSegment {
    pub fn name(&self) -> &str {
        match self {
            Self::Property { name, .. }
            | Self::Navigation { name, .. }
            | Self::OpenProperty { name }
            | Self::Operation { name } => name,
            Self::TypeCast { type_name } => type_name,
        }
    }
}

/// A resolved `$select` path such as `Address/City`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ODataSelectPath {
    pub segments: Vec<SelectSegment>,
}

impl ODataSelectPath {
    /// Path text with `/` separators
    pub fn text(&self) -> String {
        self.segments.iter().map(SelectSegment::name).collect::<Vec<_>>().join("/")
    }

    pub fn is_operation(&self) -> bool {
        matches!(self.segments.last(), Some(SelectSegment::Operation { .. }))
    }

    /// Type of the selected value; `Untyped` for operations and dynamic properties
    pub fn type_ref(&self) -> EdmTypeRef {
        match self.segments.last() {
            Some(SelectSegment::Property { type_ref, .. } | SelectSegment::Navigation { type_ref, .. }) => {
                type_ref.clone()
            }
            _ => EdmTypeRef::Untyped,
        }
    }
}

/// An expanded navigation property with its nested options bound
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpandedNavigationSelectItem {
    /// Type casts followed by the navigation property
    pub path: Vec<SelectSegment>,
    /// Target of the navigation, a collection for collection-valued navigations
    pub type_ref: EdmTypeRef,
    /// Entity set the expanded entities belong to, when bound
    pub entity_set: Option<String>,
    pub filter: Option<FilterClause>,
    pub order_by: Option<OrderByClause>,
    pub select_expand: SelectExpandClause,
    pub top: Option<u64>,
    pub skip: Option<u64>,
    pub count: Option<bool>,
    pub levels: Option<ExpandLevels>,
}

impl ExpandedNavigationSelectItem {
    pub fn path_text(&self) -> String {
        self.path.iter().map(SelectSegment::name).collect::<Vec<_>>().join("/")
    }

    /// No options of its own, only nested expansions under an all-selected level
    fn only_nests_expansions(&self) -> bool {
        self.filter.is_none()
            && self.order_by.is_none()
            && self.top.is_none()
            && self.skip.is_none()
            && self.count.is_none()
            && self.levels.is_none()
            && self.select_expand.all_selected
            && self.select_expand.expanded_items().next().is_some()
    }

    /// Name of the expanded navigation property
    pub fn navigation(&self) -> &str {
        self.path.last().map_or("", SelectSegment::name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SelectItem {
    Path(ODataSelectPath),
    /// `*`
    Wildcard,
    /// `NS.*`, every operation of a namespace
    NamespaceWildcard(String),
    Expanded(ExpandedNavigationSelectItem),
}

impl SelectItem {
    /// Whether a wildcard at the same level prunes this item
    fn is_structural(&self) -> bool {
        matches!(self, Self::Path(path) if !path.is_operation())
    }
}

/// Bound `$select`/`$expand` of one level
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SelectExpandClause {
    all_selected: bool,
    items: Vec<SelectItem>,
}

impl SelectExpandClause {
    /// Everything selected, nothing expanded
    pub fn all() -> Self {
        Self {
            all_selected: true,
            items: Vec::new(),
        }
    }

    pub fn all_selected(&self) -> bool {
        self.all_selected
    }

    pub fn items(&self) -> &[SelectItem] {
        &self.items
    }

    pub fn expanded_items(&self) -> impl Iterator<Item = &ExpandedNavigationSelectItem> {
        self.items.iter().filter_map(|item| match item {
            SelectItem::Expanded(expanded) => Some(expanded),
            _ => None,
        })
    }

    fn into_expansions(self) -> impl Iterator<Item = ExpandedNavigationSelectItem> {
        self.items.into_iter().filter_map(|item| match item {
            SelectItem::Expanded(expanded) => Some(expanded),
            _ => None,
        })
    }

    pub fn selected_paths(&self) -> impl Iterator<Item = &ODataSelectPath> {
        self.items.iter().filter_map(|item| match item {
            SelectItem::Path(path) => Some(path),
            _ => None,
        })
    }

    pub fn has_wildcard(&self) -> bool {
        self.items.iter().any(|item| matches!(item, SelectItem::Wildcard))
    }
}

/// Mutable build state of one selection level
#[derive(Debug, Default)]
pub(crate) struct SelectExpandBuilder {
    all_selected: bool,
    selections: IndexMap<String, SelectItem>,
    expansions: IndexMap<String, ExpandedNavigationSelectItem>,
}

const WILDCARD_KEY: &str = "*";

impl SelectExpandBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Mark the level as selecting everything. Irreversible.
    pub(crate) fn select_all(&mut self) {
        self.all_selected = true;
        self.selections.clear();
    }

    pub(crate) fn add_selection(&mut self, key: String, item: SelectItem) {
        if self.all_selected {
            log::trace!("'{key}' ignored: level is all-selected");
            return;
        }
        match item {
            SelectItem::Wildcard => {
                self.selections.retain(|_, existing| !existing.is_structural());
                self.selections.insert(WILDCARD_KEY.to_string(), SelectItem::Wildcard);
            }
            item if item.is_structural() && self.selections.contains_key(WILDCARD_KEY) => {
                log::trace!("'{key}' ignored: level already has a wildcard");
            }
            item => {
                self.selections.entry(key).or_insert(item);
            }
        }
    }

    pub(crate) fn add_expansion(&mut self, key: String, mut item: ExpandedNavigationSelectItem) -> Result<()> {
        let Some(existing) = self.expansions.get_mut(&key) else {
            self.expansions.insert(key, item);
            return Ok(());
        };
        if !existing.only_nests_expansions() {
            return Err(ODataError::semantic(
                ODU0401,
                format!("navigation property '{key}' is expanded more than once"),
            ));
        }
        // `Orders/Items,Orders`: the earlier path only implied Orders
        let implied = std::mem::take(&mut existing.select_expand);
        let mut nested = NestedLevel::open(std::mem::take(&mut item.select_expand));
        for expanded in implied.into_expansions() {
            nested.builder.add_expansion(expanded.path_text(), expanded)?;
        }
        item.select_expand = nested.close();
        *existing = item;
        Ok(())
    }

    /// Expansion already present under `key`, for merging legacy paths
    fn expansion_mut(&mut self, key: &str) -> Option<&mut ExpandedNavigationSelectItem> {
        self.expansions.get_mut(key)
    }

    pub(crate) fn freeze(self) -> SelectExpandClause {
        let items = self
            .selections
            .into_values()
            .chain(self.expansions.into_values().map(SelectItem::Expanded))
            .collect();
        SelectExpandClause {
            all_selected: self.all_selected,
            items,
        }
    }
}

/// Binds `$select`/`$expand` tokens against an element type
pub struct SelectExpandBinder<'a> {
    model: &'a dyn EdmModel,
    settings: &'a ParserSettings,
    alias_resolver: Option<&'a AliasResolver>,
}

impl<'a> SelectExpandBinder<'a> {
    pub fn new(model: &'a dyn EdmModel, settings: &'a ParserSettings) -> Self {
        Self {
            model,
            settings,
            alias_resolver: None,
        }
    }

    pub fn with_alias_resolver(mut self, resolver: Option<&'a AliasResolver>) -> Self {
        self.alias_resolver = resolver;
        self
    }

    /// Bind one level. `element_type` is the qualified name of an entity or
    /// complex type.
    pub fn bind(
        &self,
        select: Option<&SelectToken>,
        expand: Option<&ExpandToken>,
        element_type: &str,
        entity_set: Option<&str>,
    ) -> Result<SelectExpandClause> {
        if self.model.find_structured_type(element_type).is_none() {
            return Err(ODataError::semantic(
                ODU0400,
                format!("'{element_type}' is not an entity or complex type"),
            ));
        }

        let mut builder = SelectExpandBuilder::new();
        match select {
            Some(select) => {
                for term in &select.terms {
                    let (key, item) = self.bind_select_term(term, element_type)?;
                    builder.add_selection(key, item);
                }
            }
            None => builder.select_all(),
        }
        if let Some(expand) = expand {
            for term in &expand.terms {
                self.bind_expand_term(&mut builder, &term.segments, &term.options, element_type, entity_set)?;
            }
        }
        Ok(builder.freeze())
    }

    fn bind_select_term(&self, term: &SelectTermToken, element_type: &str) -> Result<(String, SelectItem)> {
        if term.is_wildcard() {
            return Ok((WILDCARD_KEY.to_string(), SelectItem::Wildcard));
        }
        if let Some(namespace) = term.namespace_wildcard() {
            return Ok((term.path_text(), SelectItem::NamespaceWildcard(namespace.to_string())));
        }

        let model = self.model;
        let mut current = element_type.to_string();
        let mut segments = Vec::with_capacity(term.segments.len());
        for (index, segment) in term.segments.iter().enumerate() {
            let last = index + 1 == term.segments.len();
            let name = segment.inner.as_str();
            let not_last = |what: &str| {
                ODataError::semantic_at(
                    ODU0400,
                    format!("{what} '{name}' must be the last segment of a select path"),
                    segment.span,
                )
            };

            if name.contains('.') {
                if let Some(target) = self.type_cast(segment, &current)? {
                    segments.push(SelectSegment::TypeCast {
                        type_name: name.to_string(),
                    });
                    current = target;
                    continue;
                }
                let binding = self.binding_type(&current);
                if !model.find_bound_operations(name, &binding).is_empty() {
                    if !last {
                        return Err(not_last("operation"));
                    }
                    segments.push(SelectSegment::Operation { name: name.to_string() });
                    continue;
                }
                return Err(ODataError::semantic_at(
                    ODU0400,
                    format!("'{name}' is neither a type nor an operation bound to '{current}'"),
                    segment.span,
                ));
            }

            if let Some(property) = model.find_property(&current, name) {
                segments.push(SelectSegment::Property {
                    name: property.name.clone(),
                    type_ref: property.type_ref.clone(),
                });
                if !last {
                    let EdmTypeRef::Complex(complex) = property.type_ref.element_type() else {
                        return Err(not_last("primitive property"));
                    };
                    current = complex.clone();
                }
                continue;
            }
            if let Some(navigation) = model.find_navigation_property(&current, name) {
                if !last {
                    return Err(not_last("navigation property"));
                }
                segments.push(SelectSegment::Navigation {
                    name: navigation.name.clone(),
                    type_ref: navigation.type_ref(),
                });
                continue;
            }
            if model.is_open_type(&current) {
                if !last {
                    return Err(not_last("dynamic property"));
                }
                segments.push(SelectSegment::OpenProperty { name: name.to_string() });
                continue;
            }
            return Err(ODataError::UnresolvedIdentifier {
                name: name.to_string(),
                parent_type: current,
                span: segment.span,
            });
        }

        let path = ODataSelectPath { segments };
        Ok((path.text(), SelectItem::Path(path)))
    }

    fn bind_expand_term(
        &self,
        builder: &mut SelectExpandBuilder,
        segments: &[Spanned<String>],
        options: &ExpandOptionsToken,
        element_type: &str,
        entity_set: Option<&str>,
    ) -> Result<()> {
        let model = self.model;
        let mut current = element_type.to_string();
        let mut path = Vec::new();
        let mut binding_path = Vec::new();
        let mut navigation = None;
        let mut rest: &[Spanned<String>] = &[];

        for (index, segment) in segments.iter().enumerate() {
            let name = segment.inner.as_str();
            if name.contains('.') {
                let Some(target) = self.type_cast(segment, &current)? else {
                    return Err(ODataError::semantic_at(
                        ODU0401,
                        format!("'{name}' is not a type deriving from '{current}'"),
                        segment.span,
                    ));
                };
                path.push(SelectSegment::TypeCast {
                    type_name: name.to_string(),
                });
                binding_path.push(name);
                current = target;
                continue;
            }
            let Some(found) = model.find_navigation_property(&current, name) else {
                let message = if model.find_property(&current, name).is_some() {
                    format!("'{name}' is a structural property and cannot be expanded")
                } else {
                    format!("'{current}' has no navigation property named '{name}'")
                };
                return Err(ODataError::semantic_at(ODU0401, message, segment.span));
            };
            path.push(SelectSegment::Navigation {
                name: found.name.clone(),
                type_ref: found.type_ref(),
            });
            binding_path.push(name);
            navigation = Some(found);
            rest = &segments[index + 1..];
            break;
        }

        let Some(navigation) = navigation else {
            let span = segments.last().map(|s| s.span).unwrap_or_default();
            return Err(ODataError::semantic_at(
                ODU0401,
                "an expand path must end in a navigation property",
                span,
            ));
        };

        let binding_path = binding_path.join("/");
        let target_set = entity_set
            .and_then(|set| {
                model
                    .navigation_target(set, &binding_path)
                    .or_else(|| model.navigation_target(set, &navigation.name))
            })
            .map(|set| set.name.clone());
        let target_type = navigation.target_type.clone();
        let key = path.iter().map(SelectSegment::name).collect::<Vec<_>>().join("/");

        // `Orders/Items` expands Orders and, inside it, Items
        if !rest.is_empty() {
            if let Some(existing) = builder.expansion_mut(&key) {
                let mut nested = NestedLevel::open(std::mem::take(&mut existing.select_expand));
                self.bind_expand_term(&mut nested.builder, rest, options, &target_type, target_set.as_deref())?;
                existing.select_expand = nested.close();
                return Ok(());
            }
            let mut nested = SelectExpandBuilder::new();
            nested.select_all();
            self.bind_expand_term(&mut nested, rest, options, &target_type, target_set.as_deref())?;
            let item = ExpandedNavigationSelectItem {
                path,
                type_ref: navigation.type_ref(),
                entity_set: target_set,
                filter: None,
                order_by: None,
                select_expand: nested.freeze(),
                top: None,
                skip: None,
                count: None,
                levels: None,
            };
            return builder.add_expansion(key, item);
        }

        let element = EdmTypeRef::entity(&target_type);
        let filter = options
            .filter
            .as_ref()
            .map(|filter| self.nested_binder(&element, target_set.as_deref(), |binder| binder.bind_filter(filter)))
            .transpose()?;
        let order_by = options
            .order_by
            .as_ref()
            .map(|order_by| {
                self.nested_binder(&element, target_set.as_deref(), |binder| binder.bind_order_by(order_by))
            })
            .transpose()?;
        let select_expand = self.bind(
            options.select.as_ref(),
            options.expand.as_ref(),
            &target_type,
            target_set.as_deref(),
        )?;

        log::debug!("expanded {key} into {target_type}");
        let item = ExpandedNavigationSelectItem {
            path,
            type_ref: navigation.type_ref(),
            entity_set: target_set,
            filter,
            order_by,
            select_expand,
            top: options.top,
            skip: options.skip,
            count: options.count,
            levels: options.levels,
        };
        builder.add_expansion(key, item)
    }

    /// Run `f` with a binder whose `$it` ranges over the expanded entities
    fn nested_binder<T>(
        &self,
        element: &EdmTypeRef,
        entity_set: Option<&str>,
        f: impl FnOnce(&mut MetadataBinder<'_, 'a>) -> Result<T>,
    ) -> Result<T> {
        let mut state = BindingState::new(self.model, element.clone(), entity_set.map(str::to_string))
            .with_settings(self.settings.clone())
            .with_alias_resolver(self.alias_resolver);
        let mut binder = MetadataBinder::new(&mut state);
        f(&mut binder)
    }

    /// Target type name when `segment` names a type deriving from `current`
    fn type_cast(&self, segment: &Spanned<String>, current: &str) -> Result<Option<String>> {
        let Some(target) = self.model.find_structured_type(&segment.inner) else {
            return Ok(None);
        };
        if !self.model.is_derived_from(target.name(), current) {
            return Err(ODataError::semantic_at(
                ODU0301,
                format!("type '{}' does not derive from '{current}'", segment.inner),
                segment.span,
            ));
        }
        Ok(Some(target.name().to_string()))
    }

    fn binding_type(&self, type_name: &str) -> EdmTypeRef {
        if self.model.find_entity_type(type_name).is_some() {
            EdmTypeRef::entity(type_name)
        } else {
            EdmTypeRef::complex(type_name)
        }
    }
}

/// A frozen level reopened to receive a further legacy expand path
struct NestedLevel {
    builder: SelectExpandBuilder,
}

impl NestedLevel {
    fn open(clause: SelectExpandClause) -> Self {
        let mut builder = SelectExpandBuilder::new();
        builder.all_selected = clause.all_selected;
        for item in clause.items {
            match item {
                SelectItem::Expanded(expanded) => {
                    builder.expansions.insert(expanded.path_text(), expanded);
                }
                SelectItem::Path(ref path) => {
                    builder.selections.insert(path.text(), item);
                }
                SelectItem::Wildcard => {
                    builder.selections.insert(WILDCARD_KEY.to_string(), item);
                }
                SelectItem::NamespaceWildcard(ref namespace) => {
                    builder.selections.insert(format!("{namespace}.*"), item);
                }
            }
        }
        Self { builder }
    }

    fn close(self) -> SelectExpandClause {
        self.builder.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn path(name: &str) -> SelectItem {
        SelectItem::Path(ODataSelectPath {
            segments: vec![SelectSegment::Property {
                name: name.to_string(),
                type_ref: EdmTypeRef::primitive(odata_uri_edm::EdmPrimitiveKind::String),
            }],
        })
    }

    fn operation(name: &str) -> SelectItem {
        SelectItem::Path(ODataSelectPath {
            segments: vec![SelectSegment::Operation { name: name.to_string() }],
        })
    }

    #[test]
    fn test_wildcard_prunes_earlier_paths() {
        let mut builder = SelectExpandBuilder::new();
        builder.add_selection("Name".into(), path("Name"));
        builder.add_selection("*".into(), SelectItem::Wildcard);
        assert_eq!(builder.freeze().items(), &[SelectItem::Wildcard]);
    }

    #[test]
    fn test_path_after_wildcard_is_dropped() {
        let mut builder = SelectExpandBuilder::new();
        builder.add_selection("*".into(), SelectItem::Wildcard);
        builder.add_selection("Name".into(), path("Name"));
        assert_eq!(builder.freeze().items(), &[SelectItem::Wildcard]);
    }

    #[test]
    fn test_operations_survive_wildcard() {
        let mut builder = SelectExpandBuilder::new();
        builder.add_selection("Sales.Discount".into(), operation("Sales.Discount"));
        builder.add_selection("*".into(), SelectItem::Wildcard);
        builder.add_selection("Sales.Rate".into(), operation("Sales.Rate"));
        let clause = builder.freeze();
        assert_eq!(
            clause.items(),
            &[operation("Sales.Discount"), SelectItem::Wildcard, operation("Sales.Rate")]
        );
    }

    #[test]
    fn test_all_selected_is_terminal() {
        let mut builder = SelectExpandBuilder::new();
        builder.select_all();
        builder.add_selection("Name".into(), path("Name"));
        let clause = builder.freeze();
        assert!(clause.all_selected());
        assert!(clause.items().is_empty());
        assert_eq!(clause, SelectExpandClause::all());
    }

    #[test]
    fn test_duplicate_selection_kept_once() {
        let mut builder = SelectExpandBuilder::new();
        builder.add_selection("Name".into(), path("Name"));
        builder.add_selection("Name".into(), path("Name"));
        assert_eq!(builder.freeze().items().len(), 1);
    }
}
