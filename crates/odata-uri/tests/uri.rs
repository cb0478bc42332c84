//! Whole request URIs through the facade
//!
//! - Path and query option aggregation
//! - Service root matching, relative references
//! - Parameter aliases from the query and from a resolver
//! - Entity ids, `$count`, option errors

mod common;

use common::{shop_parser, SERVICE_ROOT, SHOP};
use insta::assert_snapshot;
use odata_uri::diagnostics::{
    ErrorCode, ODU0016, ODU0017, ODU0018, ODU0019, ODU0023, ODU0150, ODU0159, ODU0300, ODU0307,
};
use odata_uri::edm::{EdmPrimitiveKind as K, EdmTypeRef};
use odata_uri::semantic::SingleValueNode;
use odata_uri::{parse_count, ODataUriParser, ParserSettings, PathSegment, UrlConventions};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn kinds(segments: &[PathSegment]) -> Vec<&'static str> {
    segments.iter().map(PathSegment::kind_name).collect()
}

// === Aggregation ===

#[test]
fn test_parse_uri_collects_every_option() {
    let uri = shop_parser()
        .parse_uri(
            "http://localhost/shop/Customers?$filter=Age gt 30&$orderby=Name desc&$select=Name,Age\
             &$expand=Orders($top=2)&$top=10&$skip=5&$count=true&debug=1",
        )
        .unwrap();

    assert_eq!(kinds(uri.path().segments()), vec!["entity set"]);
    assert!(uri.filter().is_some());
    assert_eq!(uri.order_by().map(|o| o.len()), Some(1));
    let select_expand = uri.select_expand().unwrap();
    assert_eq!(select_expand.expanded_items().count(), 1);
    assert_eq!((uri.top(), uri.skip(), uri.count()), (Some(10), Some(5), Some(true)));
    assert_eq!(uri.custom_query_options().get("debug").map(String::as_str), Some("1"));
    assert!(uri.parameter_aliases().is_empty());

    let json = serde_json::to_value(&uri).unwrap();
    assert_eq!(json["service_root"], "http://localhost/shop/");
    assert_eq!(json["top"], 10);
    assert_eq!(json["custom_query_options"]["debug"], "1");

    assert_snapshot!(
        uri.to_uri_string(),
        @"http://localhost/shop/Customers?$filter=Age%20gt%2030&$orderby=Name%20desc&$select=Name,Age&$expand=Orders($top=2)&$top=10&$skip=5&$count=true&debug=1"
    );
}

#[test]
fn test_options_bind_against_path_target() {
    let parser = shop_parser();
    let uri = parser
        .parse_uri("Customers(1)/Orders?$filter=Quantity lt 3&$expand=Lines($select=Price)")
        .unwrap();
    assert_eq!(uri.path().entity_set(), Some("Orders"));
    assert_eq!(
        uri.filter().unwrap().range_variable.type_ref,
        EdmTypeRef::entity("Shop.Order")
    );

    // $count counts the collection before it
    let uri = parser.parse_uri("Customers/$count?$filter=Age gt 1").unwrap();
    assert_eq!(
        uri.filter().unwrap().range_variable.type_ref,
        EdmTypeRef::entity("Shop.Customer")
    );

    let err = parser.parse_uri("Customers?$filter=Total gt 1").unwrap_err();
    assert_eq!(err.code(), ODU0150);
}

#[test]
fn test_format_and_skiptoken_are_custom_options() {
    let uri = shop_parser()
        .parse_uri("Orders?$format=json&$skiptoken=abc")
        .unwrap();
    let custom: Vec<(&str, &str)> = uri
        .custom_query_options()
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    assert_eq!(custom, vec![("$format", "json"), ("$skiptoken", "abc")]);
}

#[test]
fn test_empty_custom_option_keeps_its_equals_sign() {
    let uri = shop_parser().parse_uri("Orders?mode=&debug").unwrap();
    assert_eq!(uri.custom_query_options().get("mode").map(String::as_str), Some(""));
    assert_snapshot!(uri.to_uri_string(), @"http://localhost/shop/Orders?mode=&debug=");
}

// === Service root ===

#[rstest]
#[case("http://localhost/shop", 0)]
#[case("http://localhost/shop/", 0)]
#[case("http://LOCALHOST/Shop/Customers", 1)]
#[case("http://localhost:80/shop/Customers(1)", 2)]
#[case("Customers(1)/Orders", 3)]
#[case("/Customers", 1)]
fn test_requests_under_the_root(#[case] uri: &str, #[case] segments: usize) {
    let path = shop_parser()
        .parse_path(uri)
        .unwrap_or_else(|e| panic!("{uri}: {e}"));
    assert_eq!(path.len(), segments);
}

#[rstest]
#[case("http://elsewhere/shop/Customers")]
#[case("https://localhost/shop/Customers")]
#[case("http://localhost:8080/shop/Customers")]
#[case("http://localhost/shopping/Customers")]
#[case("http://localhost/Customers")]
fn test_requests_outside_the_root(#[case] uri: &str) {
    let err = shop_parser().parse_uri(uri).unwrap_err();
    assert_eq!(err.code(), ODU0023);
}

#[test]
fn test_invalid_service_root() {
    assert!(ODataUriParser::new(&*SHOP, "not a uri").is_err());
}

#[test]
fn test_service_root_gains_trailing_slash() {
    let parser = ODataUriParser::new(&*SHOP, "http://localhost/shop?x=1").unwrap();
    assert_eq!(parser.service_root().as_str(), SERVICE_ROOT);
}

// === Paths ===

#[test]
fn test_strict_and_lenient_paths() {
    let parser = shop_parser();
    let lenient = parser.parse_path_lenient("Customers(1)/Nope/Name").unwrap();
    assert_eq!(kinds(lenient.segments()), vec!["entity set", "key", "unresolved", "unresolved"]);
    assert_eq!(lenient.first_error().map(|e| e.code()), Some(ODU0300));

    let err = parser.parse_path("Customers(1)/Nope/Name").unwrap_err();
    assert_eq!(err.code(), ODU0300);
}

#[test]
fn test_key_as_segment_round_trip() {
    let parser = shop_parser()
        .with_settings(ParserSettings::default().with_url_conventions(UrlConventions::KeyAsSegment));
    let uri = parser.parse_uri("Customers/5/Orders?$top=1").unwrap();
    assert_eq!(kinds(uri.path().segments()), vec!["entity set", "key", "navigation property"]);
    assert_snapshot!(uri.to_uri_string(), @"http://localhost/shop/Customers/5/Orders?$top=1");
}

#[test]
fn test_operations_in_paths() {
    let parser = shop_parser();
    let path = parser.parse_path("Customers(1)/Shop.TopOrders(count=3)/$count").unwrap();
    assert_eq!(kinds(path.segments()), vec!["entity set", "key", "operation", "$count"]);

    let path = parser.parse_path("NearestCustomers(city='Oslo')").unwrap();
    assert_eq!(path.entity_set(), Some("Customers"));

    let path = parser.parse_path("Orders(7)/Shop.Cancel").unwrap();
    assert_eq!(kinds(path.segments()), vec!["entity set", "key", "operation"]);
}

#[test]
fn test_batch_reference_resolver() {
    let parser = shop_parser().with_batch_reference_resolver(|id| (id == "1").then(|| "Customers(5)".to_string()));
    let path = parser.parse_path("$1/Orders").unwrap();
    assert_eq!(kinds(path.segments()), vec!["batch reference", "navigation property"]);
}

// === Entity ids ===

#[test]
fn test_entity_id() {
    let parser = shop_parser();
    let id = parser.parse_entity_id("http://localhost/shop/Customers(5)").unwrap();
    assert_eq!(id.entity_set, "Customers");
    assert_eq!(id.type_ref, EdmTypeRef::entity("Shop.Customer"));
    assert_eq!(id.keys.len(), 1);
    assert_eq!(id.keys[0].name, "Id");

    let err = parser.parse_entity_id("Customers(5)/Orders").unwrap_err();
    assert_eq!(err.code(), ODU0307);
}

// === Aliases ===

fn alias_type(uri: &odata_uri::ODataUri) -> EdmTypeRef {
    match &uri.filter().unwrap().expression {
        SingleValueNode::BinaryOperator { right, .. } => match right.as_ref() {
            SingleValueNode::ParameterAlias { type_ref, .. } => type_ref.clone(),
            other => panic!("expected an alias, found {}", other.kind_name()),
        },
        other => panic!("expected a comparison, found {}", other.kind_name()),
    }
}

#[test]
fn test_aliases_from_the_query() {
    let uri = shop_parser()
        .parse_uri("Customers?$filter=Name eq @n&@n='Bob'")
        .unwrap();
    assert_eq!(alias_type(&uri), EdmTypeRef::primitive(K::String));
    assert_eq!(uri.parameter_aliases().get("n").map(String::as_str), Some("'Bob'"));
    assert_snapshot!(
        uri.to_uri_string(),
        @"http://localhost/shop/Customers?$filter=Name%20eq%20@n&@n='Bob'"
    );
}

#[test]
fn test_alias_resolver_is_a_fallback() {
    let parser = shop_parser().with_parameter_alias_resolver(|name| match name {
        "age" => Some("40".to_string()),
        "n" => Some("1".to_string()),
        _ => None,
    });
    let uri = parser.parse_uri("Customers?$filter=Age eq @age").unwrap();
    assert_eq!(alias_type(&uri), EdmTypeRef::primitive(K::Int32));

    // the query's own value wins over the resolver
    let uri = parser.parse_uri("Customers?$filter=Name eq @n&@n='x'").unwrap();
    assert_eq!(alias_type(&uri), EdmTypeRef::primitive(K::String));

    let uri = parser.parse_uri("Customers?$filter=Name eq @missing").unwrap();
    assert_eq!(alias_type(&uri), EdmTypeRef::Untyped);
}

// === Standalone options ===

#[test]
fn test_standalone_clauses() {
    let parser = shop_parser();
    let filter = parser
        .parse_filter("Address/City eq 'Oslo'", "Shop.Customer", Some("Customers"))
        .unwrap();
    assert_eq!(filter.expression.type_ref(), EdmTypeRef::boolean());

    let order_by = parser.parse_order_by("Total desc, Id", "Shop.Order", None).unwrap();
    assert_eq!(order_by.len(), 2);

    let clause = parser
        .parse_select_and_expand(Some("Name"), Some("Orders"), "Shop.Customer", Some("Customers"))
        .unwrap();
    assert!(!clause.all_selected());

    let err = parser.parse_filter("true", "Shop.Missing", None).unwrap_err();
    assert_eq!(err.code(), ODU0159);
}

#[rstest]
#[case("Customers?$top=1&$top=2", ODU0017)]
#[case("Customers?$search=bob", ODU0016)]
#[case("Customers?$top=-1", ODU0019)]
#[case("Customers?$skip=x", ODU0019)]
#[case("Customers?$count=True", ODU0018)]
fn test_query_option_errors(#[case] uri: &str, #[case] code: ErrorCode) {
    let err = shop_parser().parse_uri(uri).unwrap_err();
    assert_eq!(err.code(), code, "{uri}: {err}");
}

#[rstest]
#[case("true", Some(true))]
#[case("false", Some(false))]
#[case("TRUE", None)]
#[case("", None)]
fn test_parse_count(#[case] text: &str, #[case] expected: Option<bool>) {
    assert_eq!(parse_count(text).ok(), expected);
}
