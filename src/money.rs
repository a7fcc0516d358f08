//! Best-effort parsing of pt-BR formatted amounts (`R$ 1.234,56`).
//!
//! Exports are typed by hand, so parsing never fails: anything that cannot be
//! read as a non-negative number collapses to zero. Callers that want to
//! count those collapses use [`try_parse_amount`].

/// Parses a locale-formatted amount, returning `0.0` for blank, dash-only or
/// malformed input. Negative amounts also collapse to zero.
pub fn parse_amount(raw: &str) -> f64 {
    try_parse_amount(raw).unwrap_or(0.0)
}

/// Like [`parse_amount`] but distinguishes "empty" from "malformed".
///
/// Blank cells, a lone dash or a lone separator are `Some(0.0)`; text that is
/// not a non-negative number is `None`.
pub fn try_parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .replace("R$", "")
        .chars()
        .filter(|c| *c != '$' && !c.is_whitespace())
        .collect();

    if cleaned.chars().all(|c| matches!(c, '-' | ',' | '.')) {
        return Some(0.0);
    }
    if !cleaned.chars().all(|c| c.is_ascii_digit() || c == ',' || c == '.') {
        return None;
    }

    let value: f64 = canonical_decimal(&cleaned).parse().ok()?;
    value.is_finite().then_some(value)
}

/// Rewrites digits with `,`/`.` separators into a `.`-decimal literal.
///
/// With both separators present the right-most one is the decimal mark. A
/// single comma is a decimal mark; repeated marks are thousands separators;
/// a single dot after one to three digits (no leading zero) and followed by
/// exactly three digits is a thousands separator.
fn canonical_decimal(number: &str) -> String {
    let commas = number.matches(',').count();
    let dots = number.matches('.').count();

    let decimal = match (commas, dots) {
        (0, 0) => None,
        (_, 0) if commas == 1 => Some(','),
        (_, 0) => None,
        (0, 1) => {
            let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));
            let grouped = !int_part.is_empty() && int_part.len() <= 3 && !int_part.starts_with('0');
            if frac_part.len() == 3 && grouped {
                None
            } else {
                Some('.')
            }
        }
        (0, _) => None,
        _ => number.rfind([',', '.']).and_then(|idx| number[idx..].chars().next()),
    };

    number
        .chars()
        .filter_map(|c| match c {
            ',' | '.' if Some(c) == decimal => Some('.'),
            ',' | '.' => None,
            other => Some(other),
        })
        .collect()
}

/// Formats a value the way the reports show currency: `1.234,56`.
pub fn format_brl(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (idx, digit) in int_part.chars().enumerate() {
        if idx > 0 && (int_part.len() - idx) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{sign}{grouped},{frac_part}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separator_detection() {
        assert_eq!(canonical_decimal("1.234,56"), "1234.56");
        assert_eq!(canonical_decimal("1,234.56"), "1234.56");
        assert_eq!(canonical_decimal("12,5"), "12.5");
        assert_eq!(canonical_decimal("1.234"), "1234");
        assert_eq!(canonical_decimal("10.5"), "10.5");
        assert_eq!(canonical_decimal("1.234.567"), "1234567");
        assert_eq!(canonical_decimal("0.125"), "0.125");
    }

    #[test]
    fn garbled_and_negative_values_are_not_numbers() {
        assert_eq!(try_parse_amount("abc"), None);
        assert_eq!(try_parse_amount("-12,00"), None);
        assert_eq!(try_parse_amount("(12,00)"), None);
        assert_eq!(try_parse_amount(" - "), Some(0.0));
    }

    #[test]
    fn currency_formatting() {
        assert_eq!(format_brl(1234.5), "1.234,50");
        assert_eq!(format_brl(0.0), "0,00");
        assert_eq!(format_brl(999.999), "1.000,00");
        assert_eq!(format_brl(1234567.891), "1.234.567,89");
        assert_eq!(format_brl(-50.0), "-50,00");
    }
}
