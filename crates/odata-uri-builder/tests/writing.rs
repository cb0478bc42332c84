//! Canonical output of the builder over bound trees
//!
//! Every written expression is bound again and compared with the tree it was
//! written from.

mod common;

use common::{bind_filter, bind_order_by, bind_path, bind_select_expand};
use insta::assert_snapshot;
use odata_uri_builder::{write_expand, write_node, write_order_by, write_path, write_select, write_uri, UriParts};
use odata_uri_parser::{ParserSettings, UrlConventions};
use pretty_assertions::assert_eq;

/// Bind, write, bind the written text again and check both trees agree
fn rebuild(text: &str) -> String {
    let bound = bind_filter(text).unwrap_or_else(|e| panic!("Failed to bind '{text}': {e}"));
    let written = write_node(&bound.expression);
    let rebound = bind_filter(&written).unwrap_or_else(|e| panic!("Failed to rebind '{written}': {e}"));
    assert_eq!(rebound, bound, "'{written}' does not bind like '{text}'");
    written
}

fn path(text: &str, conventions: UrlConventions) -> String {
    let settings = ParserSettings::default().with_url_conventions(conventions);
    let bound = bind_path(text, &settings).unwrap_or_else(|e| panic!("Failed to bind '{text}': {e}"));
    let written = write_path(&bound, conventions);
    assert_eq!(bind_path(&written, &settings).unwrap(), bound);
    written
}

// === Expressions ===

#[test]
fn test_promotions_are_transparent() {
    assert_snapshot!(rebuild("Stock eq 5"), @"Stock eq 5");
    assert_snapshot!(rebuild("Price gt 2.5"), @"Price gt 2.5D");
    assert_snapshot!(rebuild("Price gt 2"), @"Price gt 2");
}

#[test]
fn test_parenthesization() {
    assert_snapshot!(rebuild("((Weight add 1)) gt 10"), @"Weight add 1 gt 10");
    assert_snapshot!(rebuild("Weight sub (1 sub 2) gt 0"), @"Weight sub (1 sub 2) gt 0");
    assert_snapshot!(rebuild("Weight mul (2 add 3) lt 100"), @"Weight mul (2 add 3) lt 100");
    assert_snapshot!(
        rebuild("(Name eq 'a' or Name eq 'b') and Stock lt 3"),
        @"(Name eq 'a' or Name eq 'b') and Stock lt 3"
    );
    assert_snapshot!(
        rebuild("Name eq 'a' or (Name eq 'b' and Stock lt 3)"),
        @"Name eq 'a' or Name eq 'b' and Stock lt 3"
    );
    assert_snapshot!(rebuild("not (Stock eq 0)"), @"not (Stock eq 0)");
    assert_snapshot!(rebuild("-Weight lt -5"), @"-Weight lt -5");
    assert_snapshot!(rebuild("length(Name) add 1 eq 5 mul 2"), @"length(Name) add 1 eq 5 mul 2");
}

#[test]
fn test_navigation_and_lambdas() {
    assert_snapshot!(rebuild("Category/Title eq 'Books'"), @"Category/Title eq 'Books'");
    assert_snapshot!(rebuild("Size/Width mul 2 le 10"), @"Size/Width mul 2 le 10");
    assert_snapshot!(
        rebuild("Tags/any(t:startswith(t,'x'))"),
        @"Tags/any(t:startswith(t,'x'))"
    );
    assert_snapshot!(
        rebuild("Reviews/all(r: r/Stars ge 4) and Reviews/$count gt 1"),
        @"Reviews/all(r:r/Stars ge 4) and Reviews/$count gt 1"
    );
    assert_snapshot!(rebuild("Reviews/any()"), @"Reviews/any()");
}

#[test]
fn test_casts_functions_and_literals() {
    assert_snapshot!(rebuild("Catalog.Book/Isbn eq '123'"), @"Catalog.Book/Isbn eq '123'");
    assert_snapshot!(rebuild("isof(Catalog.Book)"), @"isof('Catalog.Book')");
    assert_snapshot!(
        rebuild("Catalog.Related(depth=2)/$count gt 0"),
        @"Catalog.Related(depth=2)/$count gt 0"
    );
    assert_snapshot!(
        rebuild("Released lt datetimeoffset'2024-01-01T00:00:00Z'"),
        @"Released lt datetimeoffset'2024-01-01T00:00:00+00:00'"
    );
    assert_snapshot!(rebuild("Name eq 'O''Neil'"), @"Name eq 'O''Neil'");
    assert_snapshot!(rebuild("Name eq @n"), @"Name eq @n");
}

#[test]
fn test_order_by() {
    let clause = bind_order_by("Name desc, Price asc").unwrap();
    assert_snapshot!(write_order_by(&clause), @"Name desc,Price");
}

// === $select / $expand ===

#[test]
fn test_select_expand() {
    let clause = bind_select_expand(
        Some("Name,Size/Width"),
        Some("Category($select=Title),Reviews($filter=Stars gt 3;$orderby=Seq desc;$top=5;$count=true)"),
    )
    .unwrap();
    assert_snapshot!(write_select(&clause).unwrap(), @"Name,Size/Width");
    assert_snapshot!(
        write_expand(&clause).unwrap(),
        @"Category($select=Title),Reviews($filter=Stars gt 3;$orderby=Seq desc;$top=5;$count=true)"
    );
}

#[test]
fn test_legacy_expand_is_written_nested() {
    let clause = bind_select_expand(None, Some("Reviews,Category/Products")).unwrap();
    assert_eq!(write_select(&clause), None);
    let written = write_expand(&clause).unwrap();
    assert_snapshot!(written, @"Reviews,Category($expand=Products)");
    assert_eq!(bind_select_expand(None, Some(&written)).unwrap(), clause);
}

#[test]
fn test_wildcard_select() {
    let clause = bind_select_expand(Some("*,Name"), None).unwrap();
    assert_snapshot!(write_select(&clause).unwrap(), @"*");
    assert_eq!(write_expand(&clause), None);
}

// === Paths ===

#[test]
fn test_paths() {
    assert_snapshot!(
        path("Products(1)/Reviews(ProductId=1,Seq=2)/Text", UrlConventions::Parentheses),
        @"Products(1)/Reviews(ProductId=1,Seq=2)/Text"
    );
    assert_snapshot!(
        path("Categories('Bo%20ok')/Products/$count", UrlConventions::Parentheses),
        @"Categories('Bo%20ok')/Products/$count"
    );
    assert_snapshot!(
        path("Products/Catalog.Book(3)/Isbn/$value", UrlConventions::Parentheses),
        @"Products/Catalog.Book(3)/Isbn/$value"
    );
    assert_snapshot!(path("Products(5)/Catalog.Restock", UrlConventions::Parentheses), @"Products(5)/Catalog.Restock");
    assert_snapshot!(path("Bestsellers(limit=3)", UrlConventions::Parentheses), @"Bestsellers(limit=3)");
}

#[test]
fn test_key_as_segment_paths() {
    assert_snapshot!(
        path("Categories/BOOKS/Products/7/Catalog.Related(depth=1)", UrlConventions::KeyAsSegment),
        @"Categories/BOOKS/Products/7/Catalog.Related(depth=1)"
    );
    // composite keys keep parentheses
    assert_snapshot!(
        path("Reviews(ProductId=1,Seq=2)", UrlConventions::KeyAsSegment),
        @"Reviews(ProductId=1,Seq=2)"
    );

    let settings = ParserSettings::default().with_url_conventions(UrlConventions::KeyAsSegment);
    let bound = bind_path("Categories/BOOKS/Products/7", &settings).unwrap();
    assert_snapshot!(
        write_path(&bound, UrlConventions::Parentheses),
        @"Categories('BOOKS')/Products(7)"
    );
}

// === Whole URIs ===

#[test]
fn test_write_uri() {
    let settings = ParserSettings::default();
    let path = bind_path("Products", &settings).unwrap();
    let filter = bind_filter("Name eq 'a b'").unwrap();
    let order_by = bind_order_by("Price desc").unwrap();
    let select_expand = bind_select_expand(Some("Name"), Some("Category")).unwrap();
    let parts = UriParts {
        path: Some(&path),
        filter: Some(&filter),
        order_by: Some(&order_by),
        select_expand: Some(&select_expand),
        top: Some(2),
        ..UriParts::default()
    };
    assert_snapshot!(
        write_uri("http://host/svc/", &parts, UrlConventions::Parentheses),
        @"http://host/svc/Products?$filter=Name%20eq%20'a%20b'&$orderby=Price%20desc&$select=Name&$expand=Category&$top=2"
    );
}
