//! Canonical literal text per EDM primitive kind

use odata_uri_ast::LiteralValue;

/// Write a literal the way the lexer reads it back.
///
/// Numbers use the shortest text that round-trips, with the kind suffix
/// (`L`, `M`, `D`, `f`) except for `Int32`. `INF`/`NaN` read back as
/// `Double` without a suffix.
pub fn format_literal(value: &LiteralValue) -> String {
    match value {
        LiteralValue::Null => "null".to_string(),
        LiteralValue::Boolean(v) => v.to_string(),
        LiteralValue::Int32(v) => v.to_string(),
        LiteralValue::Int64(v) => format!("{v}L"),
        LiteralValue::Decimal(v) => format!("{v}M"),
        LiteralValue::Double(v) => special_float(*v).map_or_else(|| format!("{v:?}D"), str::to_string),
        LiteralValue::Single(v) => match special_float(f64::from(*v)) {
            Some(special) => format!("{special}f"),
            None => format!("{v:?}f"),
        },
        LiteralValue::String(text) => quote(text),
        LiteralValue::Guid(text) => format!("guid'{text}'"),
        LiteralValue::DateTime(value) => {
            format!("datetime'{}'", value.format("%Y-%m-%dT%H:%M:%S%.f"))
        }
        LiteralValue::DateTimeOffset(value) => format!("datetimeoffset'{}'", value.to_rfc3339()),
        LiteralValue::Time(span) => format!("time'{}'", span.to_iso8601()),
        LiteralValue::Binary(bytes) => format!("X'{}'", hex::encode_upper(bytes)),
        LiteralValue::Geography(payload) => format!("geography'{payload}'"),
        LiteralValue::Geometry(payload) => format!("geometry'{payload}'"),
    }
}

/// `'...'` with embedded quotes doubled
pub fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

fn special_float(value: f64) -> Option<&'static str> {
    if value.is_nan() {
        Some("NaN")
    } else if value == f64::INFINITY {
        Some("INF")
    } else if value == f64::NEG_INFINITY {
        Some("-INF")
    } else {
        None
    }
}
