//! Shared fixtures for facade tests

#![allow(dead_code)]

use odata_uri::{CsdlModel, ODataUriParser};
use std::path::PathBuf;
use std::sync::LazyLock;

pub const SERVICE_ROOT: &str = "http://localhost/shop/";

/// The shop model, loaded once from `tests/fixtures/shop.csdl.json`
pub static SHOP: LazyLock<CsdlModel> = LazyLock::new(|| {
    CsdlModel::from_file(fixture_path("shop.csdl.json")).expect("shop fixture model loads")
});

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

pub fn shop_parser() -> ODataUriParser<'static> {
    ODataUriParser::new(&*SHOP, SERVICE_ROOT).expect("service root is valid")
}
