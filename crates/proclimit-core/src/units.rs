//! Human-readable size parsing and number rendering
//!
//! Grammar follows the container runtime notation: a decimal number, an
//! optional space, an optional unit prefix (`k`, `m`, `g`, `t`, `p`, any
//! case), an optional `i` and an optional `b`. Examples: `512m`, `2g`,
//! `1.5GiB`, `100 kb`, `4096`.

use std::sync::OnceLock;

use byte_unit::{Byte, UnitType};
use regex::Regex;

use crate::error::{Error, Result};

/// Multiplier base for unit prefixes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitBase {
    /// k = 1000, m = 1000^2, ...
    Decimal,
    /// k = 1024, m = 1024^2, ...
    Binary,
}

impl UnitBase {
    fn multiplier(self, prefix: char) -> f64 {
        let base: f64 = match self {
            UnitBase::Decimal => 1000.0,
            UnitBase::Binary => 1024.0,
        };
        let exp = match prefix {
            'k' => 1,
            'm' => 2,
            'g' => 3,
            't' => 4,
            'p' => 5,
            _ => 0,
        };
        base.powi(exp)
    }
}

fn size_regex() -> &'static Regex {
    static SIZE_RE: OnceLock<Regex> = OnceLock::new();
    SIZE_RE.get_or_init(|| {
        Regex::new(r"^(\d+(?:\.\d+)?) ?([kKmMgGtTpP])?[iI]?[bB]?$")
            .expect("size pattern is a valid regex")
    })
}

/// Parse a human-readable size into an integer magnitude
///
/// Fractional results are truncated toward zero.
pub fn parse_size(text: &str, base: UnitBase) -> Result<i64> {
    let caps = size_regex()
        .captures(text)
        .ok_or_else(|| Error::Parse(format!("invalid size: {:?}", text)))?;

    let number: f64 = caps[1]
        .parse()
        .map_err(|e| Error::Parse(format!("invalid size {:?}: {}", text, e)))?;

    let size = match caps.get(2) {
        Some(prefix) => {
            let prefix = prefix.as_str().chars().next().unwrap_or('b');
            number * base.multiplier(prefix.to_ascii_lowercase())
        }
        None => number,
    };

    if size >= i64::MAX as f64 {
        return Err(Error::Parse(format!("size out of range: {:?}", text)));
    }

    Ok(size as i64)
}

/// Render `value` with `digits` significant digits, keeping trailing zeros
///
/// Examples with two digits: 4 -> "4.0", 0.5 -> "0.50", 12 -> "12".
/// Integer parts wider than `digits` are never abbreviated.
pub fn format_significant(value: f64, digits: usize) -> String {
    if value == 0.0 || !value.is_finite() {
        return format!("{:.*}", digits.saturating_sub(1), value);
    }

    let decimals = |v: f64| {
        let magnitude = v.abs().log10().floor() as i32;
        (digits as i32 - 1 - magnitude).max(0) as usize
    };
    let text = format!("{:.*}", decimals(value), value);

    // Rounding may carry into the next power of ten (9.96 -> 10)
    match text.parse::<f64>() {
        Ok(rounded) if rounded != 0.0 && decimals(rounded) != decimals(value) => {
            format!("{:.*}", decimals(rounded), rounded)
        }
        _ => text,
    }
}

/// Like [`format_significant`] but drops a trailing zero fraction
pub fn format_significant_trimmed(value: f64, digits: usize) -> String {
    let text = format_significant(value, digits);
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text
    }
}

/// Render a byte count with binary units, e.g. `512MiB`, `1.5GiB`, `100B`
pub fn format_bytes(bytes: i64) -> String {
    let Ok(bytes) = u64::try_from(bytes) else {
        return format!("{}B", bytes);
    };

    let adjusted = Byte::from_u64(bytes).get_appropriate_unit(UnitType::Binary);
    format!(
        "{}{}",
        format_significant_trimmed(adjusted.get_value(), 4),
        adjusted.get_unit()
    )
}
