//! Unit normalization: turning package prices into a cost per gram,
//! millilitre or piece.

use std::fmt;

use serde::Serialize;

use crate::models::{Ingredient, Unit};

/// Remote reference prices are quoted per this many canonical units (kg, l).
pub const REFERENCE_QUANTITY: f64 = 1000.0;

/// Decimal places kept on a normalized unit price.
pub const UNIT_PRICE_DECIMALS: i32 = 5;

/// Round half away from zero; prices are never negative, so this is half-up.
#[must_use]
pub fn round_half_up(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Numeric prefix of a string, the way a lenient number parser reads it:
/// `"250g"` is 250, `"1.5 kg"` is 1.5, `"ks"` is nothing.
#[must_use]
pub fn leading_number(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    for (i, c) in s.char_indices() {
        match c {
            '+' | '-' if i == 0 => {}
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end = i + c.len_utf8();
    }
    if !seen_digit {
        return None;
    }
    s[..end].trim_end_matches('.').parse().ok()
}

/// Package magnitude used as a divisor. Falls back to 1 when the size is
/// unparseable, zero or negative.
#[must_use]
pub fn parse_magnitude(package_size: &str) -> f64 {
    match leading_number(package_size) {
        Some(n) if n > 0.0 && n.is_finite() => n,
        _ => 1.0,
    }
}

/// Canonical price per unit after a price sync.
///
/// `None` means there is nothing to apply and the stored value stays as is;
/// it is never zero-filled.
#[must_use]
pub fn normalize(
    unit: &Unit,
    package_price: f64,
    package_size: &str,
    reference_unit_price: Option<f64>,
) -> Option<f64> {
    let reference = reference_unit_price.filter(|r| r.is_finite());
    match unit {
        Unit::Gram | Unit::Millilitre => {
            reference.map(|r| round_half_up(r / REFERENCE_QUANTITY, UNIT_PRICE_DECIMALS))
        }
        Unit::Piece => {
            let count = parse_magnitude(package_size);
            Some(round_half_up(package_price / count, UNIT_PRICE_DECIMALS))
        }
        Unit::Other(_) => reference,
    }
}

/// Price per unit for a hand-entered or hand-edited item.
#[must_use]
pub fn manual_price_per_unit(package_price: f64, package_size: &str) -> f64 {
    package_price / parse_magnitude(package_size)
}

/// Comparison price shown in listings: per piece, or per 100 g/ml.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Benchmark {
    pub amount: f64,
    pub per: String,
}

impl fmt::Display for Benchmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} / {}", self.amount, self.per)
    }
}

#[must_use]
pub fn benchmark_price(item: &Ingredient) -> Option<Benchmark> {
    let size = leading_number(&item.package_size()?)?;
    let price = item.package_price()?;
    if size == 0.0 || price == 0.0 {
        return None;
    }
    let unit = item.unit();
    if unit == Unit::Piece {
        Some(Benchmark {
            amount: price / size,
            per: unit.to_string(),
        })
    } else {
        Some(Benchmark {
            amount: price / size * 100.0,
            per: format!("100{unit}"),
        })
    }
}
