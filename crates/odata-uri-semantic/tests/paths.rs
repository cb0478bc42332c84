//! Tests for resource path binding
//!
//! Covers:
//! - Segment resolution order and produced types
//! - Keys: single, composite, key-as-segment, type checks
//! - Operations, imports, batch references and entity ids
//! - Lenient placeholders and strict error positions

mod common;

use common::sales_model;
use odata_uri_ast::LiteralValue;
use odata_uri_diagnostics::{
    ErrorCode, ODataError, Span, ODU0300, ODU0301, ODU0302, ODU0303, ODU0304, ODU0305, ODU0306, ODU0307,
};
use odata_uri_edm::{EdmPrimitiveKind as K, EdmTypeRef};
use odata_uri_parser::{ParserSettings, UrlConventions};
use odata_uri_semantic::{BatchReferenceResolver, ODataPath, PathBinder, PathSegment, SegmentValue};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn bind_with(path: &str, settings: &ParserSettings) -> ODataPath {
    let model = sales_model();
    PathBinder::new(&model, settings)
        .parse(path)
        .unwrap_or_else(|e| panic!("Failed to split '{path}': {e}"))
}

fn bind(path: &str) -> ODataPath {
    bind_with(path, &ParserSettings::default())
}

fn strict(path: &str) -> Result<ODataPath, ODataError> {
    bind(path).ensure_resolved()
}

fn kinds(path: &ODataPath) -> Vec<&'static str> {
    path.segments().iter().map(PathSegment::kind_name).collect()
}

fn entities(name: &str) -> EdmTypeRef {
    EdmTypeRef::collection(EdmTypeRef::entity(name))
}

// === Resolution ===

#[rstest]
#[case("Customers", vec!["entity set"])]
#[case("/Customers(1)", vec!["entity set", "key"])]
#[case("Customers(1)/Orders(2)/Items", vec!["entity set", "key", "navigation property", "key", "navigation property"])]
#[case("Customers(1)/Name/$value", vec!["entity set", "key", "property", "$value"])]
#[case("Customers(1)/Address/City", vec!["entity set", "key", "property", "property"])]
#[case("Customers/$count", vec!["entity set", "$count"])]
#[case("Customers(1)/Orders/$ref", vec!["entity set", "key", "navigation property", "$ref"])]
#[case("Customers(1)/BestFriend/$ref", vec!["entity set", "key", "navigation property", "$ref"])]
#[case("$metadata", vec!["$metadata"])]
#[case("$batch", vec!["$batch"])]
#[case("Me/Orders(3)", vec!["singleton", "navigation property", "key"])]
#[case("Customers/Sales.VipCustomer(5)/Level", vec!["entity set", "type cast", "key", "property"])]
#[case("Products('x')/Color/$value", vec!["entity set", "key", "open property", "$value"])]
fn test_segment_kinds(#[case] path: &str, #[case] expected: Vec<&str>) {
    let bound = strict(path).unwrap_or_else(|e| panic!("{path}: {e}"));
    assert_eq!(kinds(&bound), expected);
}

#[test]
fn test_navigation_follows_entity_set_bindings() {
    let path = strict("Customers(1)/Orders(2)/Items").unwrap();
    assert_eq!(path.target_type(), entities("Sales.OrderLine"));
    assert_eq!(path.entity_set(), Some("OrderLines"));
    assert!(path.last().unwrap().is_collection());
}

#[test]
fn test_singleton_navigation_uses_singleton_bindings() {
    let path = strict("Me/Orders(3)").unwrap();
    assert_eq!(path.entity_set(), Some("Orders"));
    assert_eq!(path.target_type(), EdmTypeRef::entity("Sales.Order"));
}

#[test]
fn test_count_is_int64() {
    let path = strict("Customers(1)/Orders/$count").unwrap();
    assert_eq!(path.target_type(), EdmTypeRef::primitive(K::Int64));
}

// === Keys ===

#[test]
fn test_composite_key_narrows_int16() {
    let path = strict("OrderLines(OrderId=1,LineNo=2)").unwrap();
    let PathSegment::Key { keys, .. } = &path.segments()[1] else {
        panic!("expected key");
    };
    let names: Vec<&str> = keys.iter().map(|k| k.name.as_str()).collect();
    assert_eq!(names, vec!["OrderId", "LineNo"]);
    assert_eq!(keys[1].type_ref, EdmTypeRef::primitive(K::Int16));
    assert_eq!(keys[1].value, SegmentValue::Literal(LiteralValue::Int32(2)));
}

#[rstest]
#[case("OrderLines(1)", ODU0302)]
#[case("OrderLines(OrderId=1)", ODU0302)]
#[case("OrderLines(OrderId=1,Qty=2)", ODU0302)]
#[case("OrderLines(OrderId=1,OrderId=2)", ODU0302)]
#[case("OrderLines(OrderId=1,LineNo=70000)", ODU0303)]
#[case("Customers('a')", ODU0303)]
#[case("Customers(null)", ODU0303)]
fn test_key_errors(#[case] path: &str, #[case] code: ErrorCode) {
    assert_eq!(strict(path).unwrap_err().code(), code);
}

#[test]
fn test_key_alias_is_kept() {
    let path = strict("Customers(@id)").unwrap();
    let PathSegment::Key { keys, .. } = &path.segments()[1] else {
        panic!("expected key");
    };
    assert_eq!(keys[0].value, SegmentValue::Alias("id".into()));
}

#[test]
fn test_key_as_segment() {
    let settings = ParserSettings::default().with_url_conventions(UrlConventions::KeyAsSegment);
    let path = bind_with("Products/ALFKI/Price", &settings).ensure_resolved().unwrap();
    assert_eq!(kinds(&path), vec!["entity set", "key", "property"]);
    let PathSegment::Key { keys, .. } = &path.segments()[1] else {
        panic!("expected key");
    };
    assert_eq!(keys[0].value, SegmentValue::Literal(LiteralValue::String("ALFKI".into())));

    let path = bind_with("Customers/5/Orders", &settings).ensure_resolved().unwrap();
    assert_eq!(kinds(&path), vec!["entity set", "key", "navigation property"]);

    let path = bind_with("Customers/Sales.VipCustomer/7", &settings).ensure_resolved().unwrap();
    assert_eq!(kinds(&path), vec!["entity set", "type cast", "key"]);
}

#[test]
fn test_unquoted_key_needs_key_as_segment() {
    assert_eq!(strict("Customers/5").unwrap_err().code(), ODU0300);
}

// === Casts and operations ===

#[test]
fn test_cast_to_unrelated_type() {
    let err = strict("Customers/Sales.Order").unwrap_err();
    assert_eq!(err.code(), ODU0301);
    assert_eq!(err.span(), Some(Span::new(10, 21)));
}

#[test]
fn test_bound_function_segments() {
    let path = strict("Customers(1)/Sales.TopOrders(count=2)/$count").unwrap();
    assert_eq!(kinds(&path), vec!["entity set", "key", "operation", "$count"]);
    let PathSegment::Operation { parameters, type_ref, .. } = &path.segments()[2] else {
        panic!("expected operation");
    };
    assert_eq!(parameters[0].name, "count");
    assert_eq!(*type_ref, entities("Sales.Order"));

    let path = strict("Customers(1)/Sales.OrdersBetween(high=9,low=1)").unwrap();
    let PathSegment::Operation { parameters, .. } = &path.segments()[2] else {
        panic!("expected operation");
    };
    assert_eq!(parameters.len(), 2);

    let path = strict("Customers/Sales.MostValuable()/Name").unwrap();
    assert_eq!(path.target_type(), EdmTypeRef::primitive(K::String));
}

#[test]
fn test_bound_action_is_terminal() {
    let path = strict("Orders(1)/Sales.Discount").unwrap();
    assert_eq!(kinds(&path), vec!["entity set", "key", "operation"]);
    assert_eq!(strict("Orders(1)/Sales.Discount/Id").unwrap_err().code(), ODU0304);
}

#[rstest]
#[case("Orders(1)/Sales.Discount(percent=1)")]
#[case("Customers(1)/Sales.TopOrders(2)")]
#[case("Customers(1)/Sales.TopOrders(count='two')")]
#[case("Customers(1)/Sales.TopOrders(top=2)")]
#[case("Customers(1)/Sales.OrdersBetween(low=1,low=2)")]
#[case("Customers(1)/Sales.OrdersBetween(high=1,low=2,high=3)")]
fn test_operation_parameter_errors(#[case] path: &str) {
    assert_eq!(strict(path).unwrap_err().code(), ODU0306);
}

#[test]
fn test_operation_imports() {
    let path = strict("NearestCustomers(city='Oslo')/$count").unwrap();
    assert_eq!(kinds(&path), vec!["operation import", "$count"]);
    assert_eq!(path.entity_set(), Some("Customers"));

    let path = strict("ResetData").unwrap();
    assert!(path.target_type().is_untyped());
    assert_eq!(strict("ResetData/$count").unwrap_err().code(), ODU0304);
}

// === System segments ===

#[rstest]
#[case("$count")]
#[case("$ref")]
#[case("Customers(1)/$count")]
#[case("Customers/$count/Name")]
#[case("Customers(1)/$value")]
#[case("$metadata/Customers")]
#[case("Customers(1)/Name/$ref")]
fn test_misplaced_system_segments(#[case] path: &str) {
    assert_eq!(strict(path).unwrap_err().code(), ODU0304);
}

#[test]
fn test_batch_reference() {
    let model = sales_model();
    let settings = ParserSettings::default();
    let resolver: &BatchReferenceResolver = &|id: &str| (id == "1").then(|| "Customers(1)".to_string());
    let binder = PathBinder::new(&model, &settings).with_batch_resolver(Some(resolver));

    let path = binder.parse("$1/Orders").unwrap().ensure_resolved().unwrap();
    assert_eq!(kinds(&path), vec!["batch reference", "navigation property"]);
    assert_eq!(path.entity_set(), Some("Orders"));

    let err = binder.parse("$2/Orders").unwrap().ensure_resolved().unwrap_err();
    assert_eq!(err.code(), ODU0305);
}

#[test]
fn test_batch_reference_without_resolver() {
    assert_eq!(strict("$1").unwrap_err().code(), ODU0305);
}

// === Lenient and strict ===

#[test]
fn test_lenient_marks_rest_unresolved() {
    let path = bind("Customers(1)/Nope/Name");
    assert_eq!(kinds(&path), vec!["entity set", "key", "unresolved", "unresolved"]);
    assert!(!path.is_resolved());

    let err = path.ensure_resolved().unwrap_err();
    assert_eq!(err.code(), ODU0300);
    // the failing middle segment, not the end of the path
    assert_eq!(err.span(), Some(Span::new(13, 17)));
}

#[test]
fn test_unknown_first_segment() {
    let err = strict("Nope(1)").unwrap_err();
    let ODataError::UnresolvedPathSegment { segment, span, .. } = err else {
        panic!("expected unresolved segment");
    };
    assert_eq!(segment, "Nope");
    assert_eq!(span, Span::new(0, 4));
}

#[test]
fn test_path_limit() {
    let model = sales_model();
    let settings = ParserSettings::default().with_path_limit(2);
    let err = PathBinder::new(&model, &settings)
        .parse("Customers(1)/Orders/$count")
        .unwrap_err();
    assert!(matches!(err, ODataError::LimitExceeded { max: 2, .. }));
}

#[test]
fn test_empty_path_is_service_root() {
    let path = strict("").unwrap();
    assert!(path.is_empty());
    assert!(path.target_type().is_untyped());
}

// === Entity ids ===

#[test]
fn test_entity_id() {
    let id = strict("Customers(7)").unwrap().into_entity_id().unwrap();
    assert_eq!(id.entity_set, "Customers");
    assert_eq!(id.type_ref, EdmTypeRef::entity("Sales.Customer"));
    assert_eq!(id.keys[0].value, SegmentValue::Literal(LiteralValue::Int32(7)));
}

#[rstest]
#[case("Customers")]
#[case("Customers(1)/Orders")]
#[case("Me")]
fn test_entity_id_errors(#[case] path: &str) {
    let err = bind(path).into_entity_id().unwrap_err();
    assert_eq!(err.code(), ODU0307);
}
