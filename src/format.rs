// 💲 Magnitude Formatter
// Fixed-locale (en-US) rendering of currency, percent, index and count values

use crate::model::Unit;

const TRILLION: f64 = 1e12;
const BILLION: f64 = 1e9;
const MILLION: f64 = 1e6;

/// Format a dollar amount on the T/B/M ladder.
///
/// The bucket is picked from the absolute value, so a negative amount lands in
/// the same bucket as its magnitude and only gains a leading `-`.
pub fn format_currency(value: f64) -> String {
    let abs = value.abs();
    let sign = if value < 0.0 { "-" } else { "" };

    if abs >= TRILLION {
        return format!("{}${} T", sign, fixed(abs / TRILLION, 2));
    }
    if abs >= BILLION {
        return format!("{}${} B", sign, fixed(abs / BILLION, 2));
    }
    if abs >= MILLION {
        return format!("{}${} M", sign, fixed(abs / MILLION, 2));
    }
    format!("{}${}", sign, group_thousands(abs.round()))
}

/// Percent with one decimal
pub fn format_percent(value: f64) -> String {
    format_percent_with(value, 1)
}

/// Percent with a caller-chosen number of decimals
pub fn format_percent_with(value: f64, decimals: usize) -> String {
    format!("{}%", fixed(value, decimals))
}

/// Index values (CPI-style): one decimal, no grouping
pub fn format_index(value: f64) -> String {
    fixed(value, 1)
}

/// Plain count with thousands separators and no decimals
pub fn format_count(value: f64) -> String {
    let rounded = value.round();
    let sign = if rounded < 0.0 { "-" } else { "" };
    format!("{}{}", sign, group_thousands(rounded.abs()))
}

/// Pick the formatter for a parameter's unit
pub fn format_value(value: f64, unit: Unit) -> String {
    match unit {
        Unit::CurrencyUsd => format_currency(value),
        Unit::Index => format_index(value),
    }
}

/// Currency diff with an explicit `+` for non-negative amounts.
///
/// Only the aggregate cards use this; `format_currency` itself never emits `+`.
pub fn format_signed_diff(value: f64) -> String {
    if value >= 0.0 {
        format!("+{}", format_currency(value))
    } else {
        format_currency(value)
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Extra digits inspected when looking for an exact tie. Any f64 that is not a
/// tie at `decimals` differs from one well within this many further digits.
const TIE_DIGITS: usize = 40;

/// Fixed-point rendering of the exact binary value.
///
/// `{:.N}` rounds the exact value already; only exact ties need care, since it
/// sends them to even. Ties go away from zero here: 0.25 -> "0.3", while 1.45
/// (really 1.4499...) -> "1.4".
fn fixed(value: f64, decimals: usize) -> String {
    if !value.is_finite() {
        return format!("{:.*}", decimals, value);
    }

    let wide = format!("{:.*}", decimals + TIE_DIGITS, value.abs());
    let (head, tail) = wide.split_at(wide.len() - TIE_DIGITS);
    let is_tie = tail.starts_with('5') && tail[1..].bytes().all(|b| b == b'0');
    if !is_tie {
        return format!("{:.*}", decimals, value);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}{}", sign, increment_last_digit(head.trim_end_matches('.')))
}

/// Add one unit in the last place of a plain decimal string ("2.49" -> "2.50")
fn increment_last_digit(digits: &str) -> String {
    let mut out: Vec<u8> = digits.bytes().collect();
    let mut carry = true;

    for b in out.iter_mut().rev() {
        if !carry {
            break;
        }
        match *b {
            b'.' => continue,
            b'9' => *b = b'0',
            _ => {
                *b += 1;
                carry = false;
            }
        }
    }
    if carry {
        out.insert(0, b'1');
    }

    String::from_utf8_lossy(&out).into_owned()
}

/// Group a non-negative whole number as "1,234,567"
fn group_thousands(whole: f64) -> String {
    let digits = format!("{:.0}", whole);
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_trillions() {
        assert_eq!(format_currency(2_520_000_000_000.0), "$2.52 T");
        assert_eq!(format_currency(1_000_000_000_000.0), "$1.00 T");
    }

    #[test]
    fn test_currency_billions_and_millions() {
        assert_eq!(format_currency(456_000_000_000.0), "$456.00 B");
        assert_eq!(format_currency(1_500_000_000.0), "$1.50 B");
        assert_eq!(format_currency(250_000_000.0), "$250.00 M");
        assert_eq!(format_currency(1_000_000.0), "$1.00 M");
    }

    #[test]
    fn test_currency_small_values() {
        assert_eq!(format_currency(999_999.0), "$999,999");
        assert_eq!(format_currency(0.0), "$0");
        assert_eq!(format_currency(1_234.4), "$1,234");
        assert_eq!(format_currency(12.0), "$12");
    }

    #[test]
    fn test_currency_negative_values() {
        assert_eq!(format_currency(-2_520_000_000_000.0), "-$2.52 T");
        assert_eq!(format_currency(-456_000_000_000.0), "-$456.00 B");
        assert_eq!(format_currency(-5_000_000.0), "-$5.00 M");
    }

    #[test]
    fn test_currency_sign_symmetry() {
        let samples = [
            -0.4,
            -1.0,
            -999.5,
            -12_345.0,
            -999_999.0,
            -1_000_000.0,
            -7_654_321_000.0,
            -3.3e12,
            -1.0e15,
        ];
        for v in samples {
            assert_eq!(format_currency(v), format!("-{}", format_currency(-v)), "value {}", v);
        }
    }

    #[test]
    fn test_currency_never_has_plus() {
        assert!(!format_currency(5_000_000.0).contains('+'));
    }

    #[test]
    fn test_percent() {
        assert_eq!(format_percent(3.24), "3.2%");
        assert_eq!(format_percent(-1.567), "-1.6%");
        assert_eq!(format_percent(0.0), "0.0%");
        assert_eq!(format_percent(4.02), "4.0%");
    }

    #[test]
    fn test_percent_custom_decimals() {
        assert_eq!(format_percent_with(3.456, 2), "3.46%");
        assert_eq!(format_percent_with(3.456, 0), "3%");
        assert_eq!(format_percent_with(2.5, 0), "3%");
    }

    #[test]
    fn test_percent_rounds_exact_binary_value() {
        // 1.45 and 4.35 sit just below the tie in binary; 0.25 is an exact tie
        assert_eq!(format_percent(1.45), "1.4%");
        assert_eq!(format_percent(0.25), "0.3%");
        assert_eq!(format_percent(4.35), "4.3%");
        assert_eq!(format_percent(-0.25), "-0.3%");
        assert_eq!(format_percent(9.95), "9.9%");
        assert_eq!(format_percent_with(0.125, 2), "0.13%");
        assert_eq!(format_percent_with(9.5, 0), "10%");
        assert_eq!(format_percent_with(99.95, 1), "100.0%");
    }

    #[test]
    fn test_increment_last_digit() {
        assert_eq!(increment_last_digit("2.49"), "2.50");
        assert_eq!(increment_last_digit("9.9"), "10.0");
        assert_eq!(increment_last_digit("99"), "100");
    }

    #[test]
    fn test_index_values() {
        assert_eq!(format_index(325.876), "325.9");
        assert_eq!(format_index(300.0), "300.0");
        assert_eq!(format_index(299.46), "299.5");
        assert_eq!(format_index(1234.56), "1234.6");
    }

    #[test]
    fn test_count() {
        assert_eq!(format_count(1_234_567.0), "1,234,567");
        assert_eq!(format_count(42.0), "42");
        assert_eq!(format_count(0.0), "0");
        assert_eq!(format_count(-9_876.4), "-9,876");
    }

    #[test]
    fn test_format_value_by_unit() {
        assert_eq!(format_value(2_621_342_000_000.0, Unit::CurrencyUsd), "$2.62 T");
        assert_eq!(format_value(325.876, Unit::Index), "325.9");
    }

    #[test]
    fn test_signed_diff() {
        assert_eq!(format_signed_diff(101_342_000_000.0), "+$101.34 B");
        assert_eq!(format_signed_diff(-5_000_000.0), "-$5.00 M");
        assert_eq!(format_signed_diff(0.0), "+$0");
    }
}
