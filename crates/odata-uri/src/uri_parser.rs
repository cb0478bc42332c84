//! Request URI parsing against a model
//!
//! [`ODataUriParser`] ties the crates together: it splits a request URI into
//! its resource path and query options, parses each piece and binds it against
//! the model. Every operation is independent and takes `&self`, so one parser
//! can serve any number of requests.

use crate::uri::ODataUri;
use odata_uri_diagnostics::{ODataError, Result, Span, ODU0023, ODU0024, ODU0159};
use odata_uri_edm::{EdmModel, EdmTypeRef};
use odata_uri_parser::{parse_expand, parse_filter, parse_order_by, parse_query_string, parse_select, ParserSettings};
use odata_uri_semantic::{
    AliasResolver, BatchReferenceResolver, BindingState, EntityIdSegment, FilterClause, MetadataBinder, ODataPath,
    OrderByClause, PathBinder, PathSegment, SelectExpandBinder, SelectExpandClause,
};
use std::sync::Arc;
use url::Url;

/// Parses request URIs and query option text relative to one service root
pub struct ODataUriParser<'m> {
    model: &'m dyn EdmModel,
    service_root: Url,
    settings: ParserSettings,
    alias_resolver: Option<Arc<AliasResolver>>,
    batch_resolver: Option<Arc<BatchReferenceResolver>>,
}

impl<'m> ODataUriParser<'m> {
    /// Create a parser for requests under `service_root`.
    ///
    /// The root must be an absolute URI; its query and fragment are dropped.
    pub fn new(model: &'m dyn EdmModel, service_root: &str) -> Result<Self> {
        let mut root = Url::parse(service_root).map_err(|e| invalid_uri(service_root, &e))?;
        if !root.path().ends_with('/') {
            let path = format!("{}/", root.path());
            root.set_path(&path);
        }
        root.set_query(None);
        root.set_fragment(None);
        Ok(Self {
            model,
            service_root: root,
            settings: ParserSettings::default(),
            alias_resolver: None,
            batch_resolver: None,
        })
    }

    pub fn with_settings(mut self, settings: ParserSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Resolve `@name` parameter aliases to their raw value text.
    ///
    /// [`parse_uri`](Self::parse_uri) consults the URI's own `@name=value`
    /// options first and falls back to this resolver.
    pub fn with_parameter_alias_resolver(
        mut self,
        resolver: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        let resolver: Arc<AliasResolver> = Arc::new(resolver);
        self.alias_resolver = Some(resolver);
        self
    }

    /// Resolve `$N` batch content ids to the resource path they created
    pub fn with_batch_reference_resolver(
        mut self,
        resolver: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        let resolver: Arc<BatchReferenceResolver> = Arc::new(resolver);
        self.batch_resolver = Some(resolver);
        self
    }

    pub fn model(&self) -> &'m dyn EdmModel {
        self.model
    }

    /// The service root, always ending in `/`
    pub fn service_root(&self) -> &Url {
        &self.service_root
    }

    pub fn settings(&self) -> &ParserSettings {
        &self.settings
    }

    /// Parse and bind `$filter` text over elements of `element_type`
    pub fn parse_filter(&self, text: &str, element_type: &str, entity_set: Option<&str>) -> Result<FilterClause> {
        let element_type = self.resolve_type(element_type)?;
        self.bind_filter(text, element_type, entity_set, self.alias_resolver.as_deref())
    }

    /// Parse and bind `$orderby` text over elements of `element_type`
    pub fn parse_order_by(&self, text: &str, element_type: &str, entity_set: Option<&str>) -> Result<OrderByClause> {
        let element_type = self.resolve_type(element_type)?;
        self.bind_order_by(text, element_type, entity_set, self.alias_resolver.as_deref())
    }

    /// Parse and bind `$select` and `$expand` together; either may be absent
    pub fn parse_select_and_expand(
        &self,
        select: Option<&str>,
        expand: Option<&str>,
        element_type: &str,
        entity_set: Option<&str>,
    ) -> Result<SelectExpandClause> {
        self.bind_select_expand(select, expand, element_type, entity_set, self.alias_resolver.as_deref())
    }

    /// Parse the resource path of `uri`, failing on the first segment that
    /// does not resolve
    pub fn parse_path(&self, uri: &str) -> Result<ODataPath> {
        let url = self.request_url(uri)?;
        self.bind_path(self.relative_path(uri, &url)?)?.ensure_resolved()
    }

    /// Parse the resource path of `uri`, keeping unresolved segments as
    /// placeholders. Only syntax errors fail.
    pub fn parse_path_lenient(&self, uri: &str) -> Result<ODataPath> {
        let url = self.request_url(uri)?;
        let path = self.bind_path(self.relative_path(uri, &url)?)?;
        if let Some(error) = path.first_error() {
            log::warn!("'{uri}' has unresolved path segments: {error}");
        }
        Ok(path)
    }

    /// Parse a whole request URI: the resource path and every query option
    pub fn parse_uri(&self, uri: &str) -> Result<ODataUri> {
        let url = self.request_url(uri)?;
        let path = self.bind_path(self.relative_path(uri, &url)?)?.ensure_resolved()?;
        let options = parse_query_string(url.query().unwrap_or_default())?;

        let aliases = options.aliases().clone();
        let fallback = self.alias_resolver.clone();
        let resolve_alias = move |name: &str| {
            aliases
                .get(name)
                .cloned()
                .or_else(|| fallback.as_ref().and_then(|resolve| resolve(name)))
        };
        let resolver: &AliasResolver = &resolve_alias;

        let target = query_target(&path);
        let entity_set = path.entity_set();
        let filter = options
            .filter()
            .map(|text| self.bind_filter(text, target.clone(), entity_set, Some(resolver)))
            .transpose()?;
        let order_by = options
            .order_by()
            .map(|text| self.bind_order_by(text, target.clone(), entity_set, Some(resolver)))
            .transpose()?;
        let select_expand = if options.select().is_some() || options.expand().is_some() {
            let element_type = target.structured_name().map_or_else(|| target.full_name(), str::to_string);
            Some(self.bind_select_expand(
                options.select(),
                options.expand(),
                &element_type,
                entity_set,
                Some(resolver),
            )?)
        } else {
            None
        };

        log::debug!("parsed request uri {url}");
        Ok(ODataUri::new(self.service_root.clone(), path, self.settings.url_conventions)
            .with_filter(filter)
            .with_order_by(order_by)
            .with_select_expand(select_expand)
            .with_paging(options.top()?, options.skip()?)
            .with_count(options.count()?)
            .with_query_options(options.custom().clone(), options.aliases().clone()))
    }

    /// Parse an entity id: exactly an entity set followed by one key
    pub fn parse_entity_id(&self, uri: &str) -> Result<EntityIdSegment> {
        self.parse_path(uri)?.into_entity_id()
    }

    fn resolve_type(&self, name: &str) -> Result<EdmTypeRef> {
        self.model
            .find_type(name)
            .ok_or_else(|| ODataError::semantic(ODU0159, format!("unknown type '{name}'")))
    }

    fn binding_state<'s>(
        &'s self,
        element_type: EdmTypeRef,
        entity_set: Option<&str>,
        aliases: Option<&'s AliasResolver>,
    ) -> BindingState<'s> {
        BindingState::new(self.model, element_type, entity_set.map(str::to_string))
            .with_settings(self.settings.clone())
            .with_alias_resolver(aliases)
    }

    fn bind_filter(
        &self,
        text: &str,
        element_type: EdmTypeRef,
        entity_set: Option<&str>,
        aliases: Option<&AliasResolver>,
    ) -> Result<FilterClause> {
        let token = parse_filter(text, &self.settings)?;
        let mut state = self.binding_state(element_type, entity_set, aliases);
        MetadataBinder::new(&mut state).bind_filter(&token)
    }

    fn bind_order_by(
        &self,
        text: &str,
        element_type: EdmTypeRef,
        entity_set: Option<&str>,
        aliases: Option<&AliasResolver>,
    ) -> Result<OrderByClause> {
        let items = parse_order_by(text, &self.settings)?;
        let mut state = self.binding_state(element_type, entity_set, aliases);
        MetadataBinder::new(&mut state).bind_order_by(&items)
    }

    fn bind_select_expand(
        &self,
        select: Option<&str>,
        expand: Option<&str>,
        element_type: &str,
        entity_set: Option<&str>,
        aliases: Option<&AliasResolver>,
    ) -> Result<SelectExpandClause> {
        let select = select.map(|text| parse_select(text, &self.settings)).transpose()?;
        let expand = expand.map(|text| parse_expand(text, &self.settings)).transpose()?;
        SelectExpandBinder::new(self.model, &self.settings)
            .with_alias_resolver(aliases)
            .bind(select.as_ref(), expand.as_ref(), element_type, entity_set)
    }

    fn bind_path(&self, path: &str) -> Result<ODataPath> {
        PathBinder::new(self.model, &self.settings)
            .with_batch_resolver(self.batch_resolver.as_deref())
            .parse(path)
    }

    /// Absolute request URL; relative references resolve against the root
    fn request_url(&self, uri: &str) -> Result<Url> {
        match Url::parse(uri) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => self
                .service_root
                .join(uri.trim_start_matches('/'))
                .map_err(|e| invalid_uri(uri, &e)),
            Err(e) => Err(invalid_uri(uri, &e)),
        }
    }

    /// The still percent-encoded path of `url` below the service root
    fn relative_path<'u>(&self, uri: &str, url: &'u Url) -> Result<&'u str> {
        let root = &self.service_root;
        let same_origin = url.scheme() == root.scheme()
            && url.host_str().map(str::to_ascii_lowercase) == root.host_str().map(str::to_ascii_lowercase)
            && url.port_or_known_default() == root.port_or_known_default();

        let root_path = root.path();
        let path = url.path();
        // url paths are ASCII after percent-encoding, so byte slicing is safe
        let relative = if path.eq_ignore_ascii_case(root_path.trim_end_matches('/')) {
            Some("")
        } else if path.len() >= root_path.len() && path[..root_path.len()].eq_ignore_ascii_case(root_path) {
            Some(&path[root_path.len()..])
        } else {
            None
        };

        match relative {
            Some(relative) if same_origin => Ok(relative),
            _ => Err(ODataError::syntax(
                ODU0023,
                format!("'{uri}' is not under the service root '{root}'"),
                Span::new(0, uri.len()),
            )),
        }
    }
}

/// Element type that query options of `path` bind against.
///
/// A trailing `$count` counts the collection before it, so options bind to
/// that collection's elements.
fn query_target(path: &ODataPath) -> EdmTypeRef {
    path.segments()
        .iter()
        .rev()
        .find(|segment| !matches!(segment, PathSegment::Count))
        .map_or(EdmTypeRef::Untyped, |segment| segment.target_type().element_type().clone())
}

fn invalid_uri(uri: &str, error: &url::ParseError) -> ODataError {
    ODataError::syntax(ODU0024, format!("invalid URI '{uri}': {error}"), Span::new(0, uri.len()))
}
