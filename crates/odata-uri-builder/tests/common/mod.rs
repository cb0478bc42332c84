//! Catalog model and parse-bind helpers shared by builder tests

#![allow(dead_code)]

use odata_uri_diagnostics::Result;
use odata_uri_edm::{
    ComplexType, CsdlModel, EdmPrimitiveKind as K, EdmTypeRef, EntitySet, EntityType, Multiplicity,
    NavigationProperty, Operation, OperationImport, OperationKind, Property,
};
use odata_uri_parser::{parse_expand, parse_filter, parse_order_by, parse_select, ParserSettings};
use odata_uri_semantic::{
    BindingState, FilterClause, MetadataBinder, ODataPath, OrderByClause, PathBinder, SelectExpandBinder,
    SelectExpandClause,
};

pub fn catalog_model() -> CsdlModel {
    CsdlModel::builder("Catalog")
        .complex_type(
            ComplexType::new("Catalog.Dimensions")
                .with_property(Property::new("Width", K::Double))
                .with_property(Property::new("Height", K::Double)),
        )
        .entity_type(
            EntityType::new("Catalog.Product")
                .with_key("Id")
                .with_property(Property::new("Id", K::Int32).not_null())
                .with_property(Property::new("Name", K::String))
                .with_property(Property::new("Price", K::Decimal))
                .with_property(Property::new("Weight", K::Double))
                .with_property(Property::new("Stock", K::Int16))
                .with_property(Property::new("Released", K::DateTimeOffset))
                .with_property(Property::new(
                    "Tags",
                    EdmTypeRef::collection(EdmTypeRef::primitive(K::String)),
                ))
                .with_property(Property::new("Size", EdmTypeRef::complex("Catalog.Dimensions")))
                .with_navigation(NavigationProperty::new(
                    "Category",
                    "Catalog.Category",
                    Multiplicity::ZeroOrOne,
                ))
                .with_navigation(NavigationProperty::new("Reviews", "Catalog.Review", Multiplicity::Many)),
        )
        .entity_type(
            EntityType::new("Catalog.Book")
                .with_base("Catalog.Product")
                .with_property(Property::new("Isbn", K::String)),
        )
        .entity_type(
            EntityType::new("Catalog.Category")
                .with_key("Code")
                .with_property(Property::new("Code", K::String).not_null())
                .with_property(Property::new("Title", K::String))
                .with_navigation(NavigationProperty::new("Products", "Catalog.Product", Multiplicity::Many)),
        )
        .entity_type(
            EntityType::new("Catalog.Review")
                .with_key("ProductId")
                .with_key("Seq")
                .with_property(Property::new("ProductId", K::Int32).not_null())
                .with_property(Property::new("Seq", K::Int32).not_null())
                .with_property(Property::new("Stars", K::Int32))
                .with_property(Property::new("Text", K::String)),
        )
        .entity_set(
            EntitySet::new("Products", "Catalog.Product")
                .with_binding("Category", "Categories")
                .with_binding("Reviews", "Reviews"),
        )
        .entity_set(EntitySet::new("Categories", "Catalog.Category").with_binding("Products", "Products"))
        .entity_set(EntitySet::new("Reviews", "Catalog.Review"))
        .operation(
            Operation::function(
                "Catalog.Related",
                EdmTypeRef::collection(EdmTypeRef::entity("Catalog.Product")),
            )
            .bound_to(EdmTypeRef::entity("Catalog.Product"))
            .with_parameter("depth", K::Int32),
        )
        .operation(Operation::action("Catalog.Restock").bound_to(EdmTypeRef::entity("Catalog.Product")))
        .operation(
            Operation::function(
                "Catalog.Bestsellers",
                EdmTypeRef::collection(EdmTypeRef::entity("Catalog.Product")),
            )
            .with_parameter("limit", K::Int32),
        )
        .operation_import(OperationImport {
            name: "Bestsellers".into(),
            operation: "Catalog.Bestsellers".into(),
            kind: OperationKind::Function,
            entity_set: Some("Products".into()),
        })
        .build()
        .expect("fixture model is valid")
}

fn products(model: &CsdlModel) -> BindingState<'_> {
    BindingState::new(model, EdmTypeRef::entity("Catalog.Product"), Some("Products".into()))
}

/// Parse and bind `$filter` over `Products`
pub fn bind_filter(text: &str) -> Result<FilterClause> {
    let model = catalog_model();
    let token = parse_filter(text, &ParserSettings::default())?;
    let mut state = products(&model);
    MetadataBinder::new(&mut state).bind_filter(&token)
}

/// Parse and bind `$orderby` over `Products`
pub fn bind_order_by(text: &str) -> Result<OrderByClause> {
    let model = catalog_model();
    let items = parse_order_by(text, &ParserSettings::default())?;
    let mut state = products(&model);
    MetadataBinder::new(&mut state).bind_order_by(&items)
}

/// Parse and bind `$select`/`$expand` over `Products`
pub fn bind_select_expand(select: Option<&str>, expand: Option<&str>) -> Result<SelectExpandClause> {
    let model = catalog_model();
    let settings = ParserSettings::default();
    let select = select.map(|text| parse_select(text, &settings)).transpose()?;
    let expand = expand.map(|text| parse_expand(text, &settings)).transpose()?;
    SelectExpandBinder::new(&model, &settings).bind(
        select.as_ref(),
        expand.as_ref(),
        "Catalog.Product",
        Some("Products"),
    )
}

/// Parse and strictly bind a resource path
pub fn bind_path(path: &str, settings: &ParserSettings) -> Result<ODataPath> {
    let model = catalog_model();
    PathBinder::new(&model, settings).parse(path)?.ensure_resolved()
}
