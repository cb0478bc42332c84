//! Tests for `$select`/`$expand` binding

mod common;

use common::sales_model;
use odata_uri_ast::ExpandLevels;
use odata_uri_diagnostics::{ErrorCode, Result, ODU0150, ODU0301, ODU0400, ODU0401};
use odata_uri_edm::{EdmPrimitiveKind as K, EdmTypeRef};
use odata_uri_parser::{parse_expand, parse_select, ParserSettings};
use odata_uri_semantic::{
    ExpandedNavigationSelectItem, SelectExpandBinder, SelectExpandClause, SelectItem, SelectSegment,
};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn bind_on(
    select: Option<&str>,
    expand: Option<&str>,
    element_type: &str,
    entity_set: Option<&str>,
) -> Result<SelectExpandClause> {
    let model = sales_model();
    let settings = ParserSettings::default();
    let select = select.map(|text| parse_select(text, &settings)).transpose()?;
    let expand = expand.map(|text| parse_expand(text, &settings)).transpose()?;
    SelectExpandBinder::new(&model, &settings).bind(
        select.as_ref(),
        expand.as_ref(),
        element_type,
        entity_set,
    )
}

fn bind(select: Option<&str>, expand: Option<&str>) -> Result<SelectExpandClause> {
    bind_on(select, expand, "Sales.Customer", Some("Customers"))
}

fn select(text: &str) -> SelectExpandClause {
    bind(Some(text), None).unwrap_or_else(|e| panic!("Failed to bind $select={text}: {e}"))
}

fn expand(text: &str) -> SelectExpandClause {
    bind(None, Some(text)).unwrap_or_else(|e| panic!("Failed to bind $expand={text}: {e}"))
}

fn only_expansion(clause: &SelectExpandClause) -> &ExpandedNavigationSelectItem {
    let expanded: Vec<_> = clause.expanded_items().collect();
    assert_eq!(expanded.len(), 1, "expected exactly one expansion");
    expanded[0]
}

fn path_texts(clause: &SelectExpandClause) -> Vec<String> {
    clause.selected_paths().map(|p| p.text()).collect()
}

// === $select ===

#[test]
fn test_no_select_means_everything() {
    let clause = expand("Orders");
    assert!(clause.all_selected());
    assert_eq!(path_texts(&clause), Vec::<String>::new());
}

#[rstest]
#[case("Name,*")]
#[case("*,Name")]
#[case("Name,*,Age")]
fn test_wildcard_dominates_structural_items(#[case] text: &str) {
    let clause = select(text);
    assert!(!clause.all_selected());
    assert!(clause.has_wildcard());
    assert_eq!(clause.items(), &[SelectItem::Wildcard]);
}

#[test]
fn test_wildcard_keeps_operations() {
    let clause = select("Name,Sales.TotalSpent,*");
    assert!(clause.has_wildcard());
    assert_eq!(path_texts(&clause), vec!["Sales.TotalSpent"]);
    assert!(clause.selected_paths().all(|p| p.is_operation()));
}

#[test]
fn test_duplicate_selection_appears_once() {
    let clause = select("Name,Age,Name");
    assert_eq!(path_texts(&clause), vec!["Name", "Age"]);
}

#[test]
fn test_complex_select_path() {
    let clause = select("Address/City");
    let path = clause.selected_paths().next().unwrap();
    assert_eq!(path.text(), "Address/City");
    assert_eq!(path.segments.len(), 2);
    assert_eq!(path.type_ref(), EdmTypeRef::primitive(K::String));
}

#[test]
fn test_select_through_type_cast() {
    let clause = select("Sales.VipCustomer/Level");
    let path = clause.selected_paths().next().unwrap();
    assert!(matches!(path.segments[0], SelectSegment::TypeCast { .. }));
    assert_eq!(path.type_ref(), EdmTypeRef::primitive(K::Int32));
}

#[test]
fn test_namespace_wildcard_and_navigation() {
    let clause = select("Sales.*,Orders");
    assert_eq!(clause.items()[0], SelectItem::NamespaceWildcard("Sales".into()));
    let navigation = clause.selected_paths().next().unwrap();
    assert!(matches!(navigation.segments[0], SelectSegment::Navigation { .. }));
    assert_eq!(
        navigation.type_ref(),
        EdmTypeRef::collection(EdmTypeRef::entity("Sales.Order"))
    );
}

#[test]
fn test_select_dynamic_property_on_open_type() {
    let clause = bind_on(Some("Color"), None, "Sales.Product", Some("Products")).unwrap();
    let path = clause.selected_paths().next().unwrap();
    assert_eq!(path.segments, vec![SelectSegment::OpenProperty { name: "Color".into() }]);
    assert!(path.type_ref().is_untyped());
}

#[rstest]
#[case("Name/Length", ODU0400)]
#[case("Orders/Amount", ODU0400)]
#[case("Sales.TotalSpent/Name", ODU0400)]
#[case("Sales.Nope", ODU0400)]
#[case("Nope", ODU0150)]
#[case("Address/Nope", ODU0150)]
#[case("Sales.Order/Id", ODU0301)]
fn test_select_errors(#[case] text: &str, #[case] code: ErrorCode) {
    assert_eq!(bind(Some(text), None).unwrap_err().code(), code);
}

#[test]
fn test_unknown_element_type() {
    let err = bind_on(None, None, "Sales.Nope", None).unwrap_err();
    assert_eq!(err.code(), ODU0400);
}

// === $expand ===

#[test]
fn test_expand_binds_target_set() {
    let clause = expand("Orders");
    let orders = only_expansion(&clause);
    assert_eq!(orders.navigation(), "Orders");
    assert_eq!(orders.entity_set.as_deref(), Some("Orders"));
    assert_eq!(orders.type_ref, EdmTypeRef::collection(EdmTypeRef::entity("Sales.Order")));
    assert!(orders.select_expand.all_selected());
}

#[test]
fn test_nested_options_bind_against_target() {
    let clause = expand(
        "Orders($filter=Amount gt 5;$orderby=Placed desc;$select=Amount;$top=2;$skip=1;$count=true;$expand=Items)",
    );
    let orders = only_expansion(&clause);

    let filter = orders.filter.as_ref().unwrap();
    assert_eq!(filter.range_variable.type_ref, EdmTypeRef::entity("Sales.Order"));
    assert_eq!(filter.range_variable.entity_set.as_deref(), Some("Orders"));
    assert_eq!(filter.expression.type_ref(), EdmTypeRef::primitive(K::Boolean));
    assert_eq!(orders.order_by.as_ref().map(|o| o.len()), Some(1));
    assert_eq!((orders.top, orders.skip, orders.count), (Some(2), Some(1), Some(true)));

    assert!(!orders.select_expand.all_selected());
    assert_eq!(path_texts(&orders.select_expand), vec!["Amount"]);
    let items = only_expansion(&orders.select_expand);
    assert_eq!(items.entity_set.as_deref(), Some("OrderLines"));
}

#[test]
fn test_nested_filter_scopes_to_target_type() {
    let err = bind(None, Some("Orders($filter=Name eq 'x')")).unwrap_err();
    assert_eq!(err.code(), ODU0150);
}

#[test]
fn test_levels_are_carried() {
    let clause = expand("BestFriend($levels=max)");
    assert_eq!(only_expansion(&clause).levels, Some(ExpandLevels::Max));
}

#[test]
fn test_legacy_path_nests_expansions() {
    let clause = expand("Orders/Items,Orders/Customer");
    let orders = only_expansion(&clause);
    assert!(orders.filter.is_none());

    let nested: Vec<&str> = orders
        .select_expand
        .expanded_items()
        .map(ExpandedNavigationSelectItem::navigation)
        .collect();
    assert_eq!(nested, vec!["Items", "Customer"]);
    let customer = orders.select_expand.expanded_items().nth(1).unwrap();
    assert_eq!(customer.entity_set.as_deref(), Some("Customers"));
}

#[rstest]
#[case("Orders/Items,Orders")]
#[case("Orders,Orders/Items")]
fn test_legacy_path_and_plain_term_merge_in_any_order(#[case] text: &str) {
    let clause = expand(text);
    let orders = only_expansion(&clause);
    let nested: Vec<&str> = orders
        .select_expand
        .expanded_items()
        .map(ExpandedNavigationSelectItem::navigation)
        .collect();
    assert_eq!(nested, vec!["Items"]);
}

#[test]
fn test_plain_term_options_apply_after_legacy_path() {
    let clause = expand("Orders/Items,Orders($top=2;$select=Id)");
    let orders = only_expansion(&clause);
    assert_eq!(orders.top, Some(2));
    assert!(!orders.select_expand.all_selected());
    assert_eq!(orders.select_expand.expanded_items().count(), 1);
}

#[test]
fn test_expand_through_type_cast() {
    let clause = expand("Sales.VipCustomer/Orders");
    let orders = only_expansion(&clause);
    assert_eq!(orders.path_text(), "Sales.VipCustomer/Orders");
    assert_eq!(orders.entity_set.as_deref(), Some("Orders"));
}

#[test]
fn test_select_and_expand_together() {
    let clause = bind(Some("Name"), Some("Orders")).unwrap();
    assert_eq!(clause.items().len(), 2);
    assert!(matches!(clause.items()[0], SelectItem::Path(_)));
    assert!(matches!(clause.items()[1], SelectItem::Expanded(_)));
}

#[rstest]
#[case("Name")]
#[case("Nope")]
#[case("Orders,Orders")]
#[case("Sales.VipCustomer")]
#[case("Address")]
fn test_expand_errors(#[case] text: &str) {
    assert_eq!(bind(None, Some(text)).unwrap_err().code(), ODU0401);
}
