//! Literal values appearing in OData URIs

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A literal value with its EDM primitive kind fixed by its lexical form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LiteralValue {
    /// `null`
    Null,
    /// `true` / `false`
    Boolean(bool),
    /// Unsuffixed integer fitting 32 bits
    Int32(i32),
    /// `L` suffix, or an unsuffixed integer too large for 32 bits
    Int64(i64),
    /// `f` suffix
    Single(f32),
    /// `D` suffix, or an unsuffixed number with fraction or exponent
    Double(f64),
    /// `M` suffix
    Decimal(Decimal),
    /// Single-quoted string with `''` unescaped
    String(String),
    /// `guid'...'`, lowercase canonical form
    Guid(String),
    /// `datetime'...'`
    DateTime(NaiveDateTime),
    /// `datetimeoffset'...'`
    DateTimeOffset(DateTime<FixedOffset>),
    /// `time'...'`
    Time(TimeSpan),
    /// `binary'...'` / `X'...'`
    Binary(Vec<u8>),
    /// `geography'...'`, payload kept verbatim
    Geography(String),
    /// `geometry'...'`, payload kept verbatim
    Geometry(String),
}

impl LiteralValue {
    /// Qualified EDM type name of the literal, `None` for `null`
    pub const fn type_name(&self) -> Option<&'static str> {
        match self {
            Self::Null => None,
            Self::Boolean(_) => Some("Edm.Boolean"),
            Self::Int32(_) => Some("Edm.Int32"),
            Self::Int64(_) => Some("Edm.Int64"),
            Self::Single(_) => Some("Edm.Single"),
            Self::Double(_) => Some("Edm.Double"),
            Self::Decimal(_) => Some("Edm.Decimal"),
            Self::String(_) => Some("Edm.String"),
            Self::Guid(_) => Some("Edm.Guid"),
            Self::DateTime(_) => Some("Edm.DateTime"),
            Self::DateTimeOffset(_) => Some("Edm.DateTimeOffset"),
            Self::Time(_) => Some("Edm.Time"),
            Self::Binary(_) => Some("Edm.Binary"),
            Self::Geography(_) => Some("Edm.Geography"),
            Self::Geometry(_) => Some("Edm.Geometry"),
        }
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric value as f64, if the literal is numeric
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int32(v) => Some(f64::from(*v)),
            Self::Int64(v) => Some(*v as f64),
            Self::Single(v) => Some(f64::from(*v)),
            Self::Double(v) => Some(*v),
            Self::Decimal(v) => v.to_string().parse().ok(),
            _ => None,
        }
    }
}

/// An `Edm.Time` duration, stored as a signed nanosecond count.
///
/// Lexical form is the ISO-8601 day-time duration `[-]P[nD][T[nH][nM][n[.f]S]]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeSpan {
    pub nanos: i64,
}

const NANOS_PER_SECOND: i64 = 1_000_000_000;
const SECONDS_PER_MINUTE: i64 = 60;
const SECONDS_PER_HOUR: i64 = 3_600;
const SECONDS_PER_DAY: i64 = 86_400;

impl TimeSpan {
    pub const fn from_nanos(nanos: i64) -> Self {
        Self { nanos }
    }

    pub const fn from_seconds(seconds: i64) -> Self {
        Self {
            nanos: seconds * NANOS_PER_SECOND,
        }
    }

    /// Parse an ISO-8601 day-time duration such as `PT13H20M` or `-P1DT0.5S`
    pub fn parse_iso8601(text: &str) -> Option<Self> {
        let (negative, rest) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let rest = rest.strip_prefix('P')?;
        let (date_part, time_part) = match rest.split_once('T') {
            Some((d, t)) => (d, Some(t)),
            None => (rest, None),
        };
        if date_part.is_empty() && time_part.is_none_or(str::is_empty) {
            return None;
        }

        let mut nanos: i64 = 0;
        if !date_part.is_empty() {
            let days = date_part.strip_suffix('D')?;
            nanos = nanos.checked_add(whole(days)?.checked_mul(SECONDS_PER_DAY * NANOS_PER_SECOND)?)?;
        }

        if let Some(mut time) = time_part {
            if time.is_empty() {
                return None;
            }
            for (designator, scale) in [('H', SECONDS_PER_HOUR), ('M', SECONDS_PER_MINUTE)] {
                if let Some(index) = time.find(designator) {
                    let value = whole(&time[..index])?;
                    nanos = nanos.checked_add(value.checked_mul(scale * NANOS_PER_SECOND)?)?;
                    time = &time[index + 1..];
                }
            }
            if !time.is_empty() {
                let seconds = time.strip_suffix('S')?;
                nanos = nanos.checked_add(fractional_seconds(seconds)?)?;
            }
        }

        Some(Self {
            nanos: if negative { -nanos } else { nanos },
        })
    }

    /// Canonical ISO-8601 form, e.g. `PT13H20M` or `P1DT0.5S`
    pub fn to_iso8601(&self) -> String {
        let mut out = String::new();
        if self.nanos < 0 {
            out.push('-');
        }
        let total = self.nanos.unsigned_abs();
        let nanos_per_second = NANOS_PER_SECOND as u64;
        let seconds_total = total / nanos_per_second;
        let fraction = total % nanos_per_second;

        let days = seconds_total / SECONDS_PER_DAY as u64;
        let hours = seconds_total % SECONDS_PER_DAY as u64 / SECONDS_PER_HOUR as u64;
        let minutes = seconds_total % SECONDS_PER_HOUR as u64 / SECONDS_PER_MINUTE as u64;
        let seconds = seconds_total % SECONDS_PER_MINUTE as u64;

        out.push('P');
        if days > 0 {
            out.push_str(&format!("{days}D"));
        }
        if hours > 0 || minutes > 0 || seconds > 0 || fraction > 0 || days == 0 {
            out.push('T');
            if hours > 0 {
                out.push_str(&format!("{hours}H"));
            }
            if minutes > 0 {
                out.push_str(&format!("{minutes}M"));
            }
            if seconds > 0 || fraction > 0 || (hours == 0 && minutes == 0) {
                out.push_str(&seconds.to_string());
                if fraction > 0 {
                    let digits = format!("{fraction:09}");
                    out.push('.');
                    out.push_str(digits.trim_end_matches('0'));
                }
                out.push('S');
            }
        }
        out
    }
}

impl fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

fn whole(digits: &str) -> Option<i64> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn fractional_seconds(text: &str) -> Option<i64> {
    let (int_part, frac_part) = match text.split_once('.') {
        Some((i, f)) => (i, f),
        None => (text, ""),
    };
    let mut nanos = whole(int_part)?.checked_mul(NANOS_PER_SECOND)?;
    if !frac_part.is_empty() {
        if frac_part.len() > 9 || !frac_part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let padded = format!("{frac_part:0<9}");
        nanos = nanos.checked_add(padded.parse::<i64>().ok()?)?;
    }
    Some(nanos)
}
