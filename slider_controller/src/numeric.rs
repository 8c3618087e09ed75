//! Numeric literals in command values.
//!
//! Parsing is permissive: the longest numeric prefix is used and anything
//! unparsable reads as zero. The controller app relies on this, so
//! every value in the command grammar goes through here.

/// Reads a decimal literal such as `-12.5`, `3`, `.5` or `1e3`.
pub fn parse_real(text: &str) -> f32 {
    numeric_prefix(text, true).parse().unwrap_or(0.0)
}

/// Reads an integer literal; a fractional part is ignored.
pub fn parse_integer(text: &str) -> i64 {
    numeric_prefix(text, false).parse().unwrap_or(0)
}

fn numeric_prefix(text: &str, fractional: bool) -> &str {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }

    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut mantissa_digits = end - digits_start;

    if fractional && end < bytes.len() && bytes[end] == b'.' {
        let fraction_start = end + 1;
        let mut fraction_end = fraction_start;
        while fraction_end < bytes.len() && bytes[fraction_end].is_ascii_digit() {
            fraction_end += 1;
        }
        mantissa_digits += fraction_end - fraction_start;
        if mantissa_digits > 0 {
            end = fraction_end;
        }
    }

    if mantissa_digits == 0 {
        return "";
    }

    if fractional && end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exponent_end = end + 1;
        if matches!(bytes.get(exponent_end), Some(b'+' | b'-')) {
            exponent_end += 1;
        }
        let exponent_digits_start = exponent_end;
        while exponent_end < bytes.len() && bytes[exponent_end].is_ascii_digit() {
            exponent_end += 1;
        }
        if exponent_end > exponent_digits_start {
            end = exponent_end;
        }
    }

    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_leading_number_and_ignores_trailing_text() {
        assert_eq!(parse_real("-12.5mm"), -12.5);
        assert_eq!(parse_real("+3"), 3.0);
        assert_eq!(parse_real(".5"), 0.5);
        assert_eq!(parse_real("7."), 7.0);
        assert_eq!(parse_real("2e3,1"), 2000.0);
        assert_eq!(parse_real("4e"), 4.0);
        assert_eq!(parse_integer("250.9"), 250);
        assert_eq!(parse_integer("-40x"), -40);
    }

    #[test]
    fn malformed_values_read_as_zero() {
        assert_eq!(parse_real(""), 0.0);
        assert_eq!(parse_real("abc"), 0.0);
        assert_eq!(parse_real("-"), 0.0);
        assert_eq!(parse_real("."), 0.0);
        assert_eq!(parse_integer("?"), 0);
        assert_eq!(parse_integer("99999999999999999999999"), 0);
    }
}
