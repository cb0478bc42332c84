//! The parsed and bound request URI

use indexmap::IndexMap;
use odata_uri_builder::{write_uri, UriParts};
use odata_uri_parser::UrlConventions;
use odata_uri_semantic::{FilterClause, ODataPath, OrderByClause, SelectExpandClause};
use serde::{Serialize, Serializer};
use url::Url;

/// A request URI with every part bound against the model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ODataUri {
    #[serde(serialize_with = "serialize_url")]
    service_root: Url,
    path: ODataPath,
    filter: Option<FilterClause>,
    order_by: Option<OrderByClause>,
    select_expand: Option<SelectExpandClause>,
    top: Option<u64>,
    skip: Option<u64>,
    count: Option<bool>,
    custom_query_options: IndexMap<String, String>,
    parameter_aliases: IndexMap<String, String>,
    #[serde(skip)]
    url_conventions: UrlConventions,
}

fn serialize_url<S: Serializer>(url: &Url, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(url.as_str())
}

impl ODataUri {
    pub(crate) fn new(service_root: Url, path: ODataPath, url_conventions: UrlConventions) -> Self {
        Self {
            service_root,
            path,
            filter: None,
            order_by: None,
            select_expand: None,
            top: None,
            skip: None,
            count: None,
            custom_query_options: IndexMap::new(),
            parameter_aliases: IndexMap::new(),
            url_conventions,
        }
    }

    pub(crate) fn with_filter(mut self, filter: Option<FilterClause>) -> Self {
        self.filter = filter;
        self
    }

    pub(crate) fn with_order_by(mut self, order_by: Option<OrderByClause>) -> Self {
        self.order_by = order_by;
        self
    }

    pub(crate) fn with_select_expand(mut self, select_expand: Option<SelectExpandClause>) -> Self {
        self.select_expand = select_expand;
        self
    }

    pub(crate) fn with_paging(mut self, top: Option<u64>, skip: Option<u64>) -> Self {
        self.top = top;
        self.skip = skip;
        self
    }

    pub(crate) fn with_count(mut self, count: Option<bool>) -> Self {
        self.count = count;
        self
    }

    pub(crate) fn with_query_options(
        mut self,
        custom: IndexMap<String, String>,
        aliases: IndexMap<String, String>,
    ) -> Self {
        self.custom_query_options = custom;
        self.parameter_aliases = aliases;
        self
    }

    pub fn service_root(&self) -> &Url {
        &self.service_root
    }

    pub fn path(&self) -> &ODataPath {
        &self.path
    }

    pub fn filter(&self) -> Option<&FilterClause> {
        self.filter.as_ref()
    }

    pub fn order_by(&self) -> Option<&OrderByClause> {
        self.order_by.as_ref()
    }

    pub fn select_expand(&self) -> Option<&SelectExpandClause> {
        self.select_expand.as_ref()
    }

    pub fn top(&self) -> Option<u64> {
        self.top
    }

    pub fn skip(&self) -> Option<u64> {
        self.skip
    }

    pub fn count(&self) -> Option<bool> {
        self.count
    }

    /// Options without a `$` or `@` prefix, in request order
    pub fn custom_query_options(&self) -> &IndexMap<String, String> {
        &self.custom_query_options
    }

    /// `@name=value` options keyed by name without the `@`
    pub fn parameter_aliases(&self) -> &IndexMap<String, String> {
        &self.parameter_aliases
    }

    /// Write the canonical request URI back out
    pub fn to_uri_string(&self) -> String {
        let parts = UriParts {
            path: Some(&self.path),
            filter: self.filter.as_ref(),
            order_by: self.order_by.as_ref(),
            select_expand: self.select_expand.as_ref(),
            top: self.top,
            skip: self.skip,
            count: self.count,
            parameter_aliases: pairs(&self.parameter_aliases),
            custom_options: pairs(&self.custom_query_options),
        };
        write_uri(self.service_root.as_str(), &parts, self.url_conventions)
    }
}

fn pairs(options: &IndexMap<String, String>) -> Vec<(&str, &str)> {
    options.iter().map(|(name, value)| (name.as_str(), value.as_str())).collect()
}
