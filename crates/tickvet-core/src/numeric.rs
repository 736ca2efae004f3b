//! Lenient numeric parsing for heterogeneous feed values.
//!
//! Upstream sources report numbers as plain floats, currency-formatted
//! strings (`"$1,234.50"`), percentages (`"-3.2%"`), or magnitude-suffixed
//! shorthand (`"2.5B"`). This module collapses all of them into a finite
//! `f64` or `None`; it never panics and never returns NaN.

use crate::domain::RawValue;

const CURRENCY_GLYPHS: [char; 3] = ['$', '€', '£'];

/// Parse a raw scalar into a finite float.
///
/// `None` input, empty text, and every unparseable shape yield `None`.
pub fn parse_numeric(value: Option<&RawValue>) -> Option<f64> {
    match value {
        None => None,
        Some(RawValue::Number(number)) => finite(*number),
        Some(RawValue::Text(text)) => parse_text(text),
    }
}

fn parse_text(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut cleaned: String = trimmed
        .chars()
        .filter(|ch| !CURRENCY_GLYPHS.contains(ch) && *ch != '%' && *ch != ',')
        .collect();

    let mut multiplier = 1.0;
    if let Some(last) = cleaned.chars().last() {
        if let Some(scale) = suffix_multiplier(last) {
            multiplier = scale;
            cleaned.truncate(cleaned.len() - last.len_utf8());
        }
    }

    let parsed = cleaned
        .trim()
        .parse::<f64>()
        .ok()
        .or_else(|| second_chance(&cleaned));

    parsed.and_then(|number| finite(number * multiplier))
}

/// Magnitude multiplier for a trailing K/M/B/T; exact match on those four
/// letters only, any other trailing character is left in place.
fn suffix_multiplier(ch: char) -> Option<f64> {
    match ch.to_ascii_uppercase() {
        'K' => Some(1e3),
        'M' => Some(1e6),
        'B' => Some(1e9),
        'T' => Some(1e12),
        _ => None,
    }
}

/// Retry keeping only digits, dot, sign, and exponent characters.
fn second_chance(input: &str) -> Option<f64> {
    let stripped: String = input
        .chars()
        .filter(|ch| ch.is_ascii_digit() || matches!(ch, '.' | '+' | '-' | 'e' | 'E'))
        .collect();
    if stripped.is_empty() {
        return None;
    }
    stripped.parse::<f64>().ok()
}

fn finite(number: f64) -> Option<f64> {
    number.is_finite().then_some(number)
}
