// =============================================================================
// locale.rs — TURKISH NUMBERS, WESTERN FLOATS
// =============================================================================
//
// The comparison site formats everything for a Turkish reader:
//
//   "%3,49"            interest rate, decimal comma, leading percent
//   "1.250,00 TL"      fee, dot thousands, comma decimals, currency suffix
//   "10.000-50.000TL"  amount range
//   "3 - 36 Ay"        maturity range in months
//
// A dot is only a thousands separator when it groups digits in threes (or when
// a comma is present as the decimal mark). "12.5" stays twelve and a half.
// =============================================================================

use crate::error::{RateError, RateResult};

/// Unit suffixes and prefixes the site decorates numbers with.
const UNIT_MARKERS: &[&str] = &["%", "TL", "₺", "Ay", "ay", "Gün", "gün"];

/// Remove whitespace (including non-breaking spaces) and unit markers.
pub fn strip_units(raw: &str) -> String {
    let mut out: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}')
        .collect();
    for marker in UNIT_MARKERS {
        out = out.replace(marker, "");
    }
    out
}

/// Parse a locale-formatted decimal into an `f64`.
pub fn parse_decimal(raw: &str) -> RateResult<f64> {
    let cleaned = strip_units(raw);
    if cleaned.is_empty() {
        return Err(RateError::parse(format!("empty numeric text {:?}", raw)));
    }

    let canonical = if cleaned.contains(',') {
        cleaned.replace('.', "").replace(',', ".")
    } else if is_thousands_grouped(&cleaned) {
        cleaned.replace('.', "")
    } else {
        cleaned
    };

    let value: f64 = canonical
        .parse()
        .map_err(|_| RateError::parse(format!("not a number: {:?}", raw)))?;
    if !value.is_finite() {
        return Err(RateError::parse(format!("not a finite number: {:?}", raw)));
    }
    Ok(value)
}

/// Parse a locale-formatted whole number ("50.000 TL" -> 50000).
pub fn parse_integer(raw: &str) -> RateResult<u64> {
    let cleaned = strip_units(raw).replace('.', "");
    cleaned
        .parse()
        .map_err(|_| RateError::parse(format!("not an integer: {:?}", raw)))
}

/// Parse "min-max" with units and thousands separators into two integers.
pub fn parse_range(raw: &str) -> RateResult<(u64, u64)> {
    let cleaned = strip_units(raw);
    let (lo, hi) = cleaned
        .split_once('-')
        .ok_or_else(|| RateError::parse(format!("expected a range, got {:?}", raw)))?;
    let lo = parse_integer(lo)?;
    let hi = parse_integer(hi)?;
    if lo > hi {
        return Err(RateError::parse(format!("inverted range {:?}", raw)));
    }
    Ok((lo, hi))
}

/// Upper bound of a range, or the value itself when there is no range.
pub fn upper_bound(raw: &str) -> RateResult<u64> {
    let cleaned = strip_units(raw);
    match cleaned.rsplit_once('-') {
        Some((_, hi)) if !hi.is_empty() => parse_integer(hi),
        _ => parse_integer(&cleaned),
    }
}

/// "1.234.567" style: one to three leading digits, then dot-separated triples.
fn is_thousands_grouped(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    let mut groups = digits.split('.');
    let head = match groups.next() {
        Some(h) => h,
        None => return false,
    };
    let mut saw_group = false;
    for group in groups {
        if group.len() != 3 || !group.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        saw_group = true;
    }
    saw_group && (1..=3).contains(&head.len()) && head.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_with_decimal_comma() {
        assert_eq!(parse_decimal("%3,49").unwrap(), 3.49);
        assert_eq!(parse_decimal(" % 45,50 ").unwrap(), 45.5);
    }

    #[test]
    fn test_currency_with_thousands_dots() {
        assert_eq!(parse_decimal("1.250,00 TL").unwrap(), 1250.0);
        assert_eq!(parse_decimal("12.345.678,9TL").unwrap(), 12_345_678.9);
        assert_eq!(parse_decimal("1.250 TL").unwrap(), 1250.0);
    }

    #[test]
    fn test_plain_dot_decimal_is_left_alone() {
        assert_eq!(parse_decimal("12.5").unwrap(), 12.5);
        assert_eq!(parse_decimal("0.75").unwrap(), 0.75);
    }

    #[test]
    fn test_garbage_is_a_parse_error() {
        assert!(matches!(parse_decimal("yakında"), Err(RateError::Parse(_))));
        assert!(matches!(parse_decimal("  "), Err(RateError::Parse(_))));
    }

    #[test]
    fn test_ranges_with_units() {
        assert_eq!(parse_range("10.000-50.000TL").unwrap(), (10_000, 50_000));
        assert_eq!(parse_range("3 - 36 Ay").unwrap(), (3, 36));
        assert!(parse_range("36").is_err());
        assert!(parse_range("36-3Ay").is_err());
    }

    #[test]
    fn test_upper_bound_keeps_high_end() {
        assert_eq!(upper_bound("1.000 - 50.000 TL").unwrap(), 50_000);
        assert_eq!(upper_bound("250.000 TL").unwrap(), 250_000);
    }
}
