//! Operand value decoders shared by the bundled architectures.

use sim_core::SyntaxError;

fn invalid(text: &str) -> SyntaxError {
    SyntaxError::InvalidNumber(text.to_string())
}

/// Decimal integer, optionally negative.
///
/// # Errors
///
/// Returns [`SyntaxError::InvalidNumber`] if `text` is not a decimal integer.
pub fn decimal(text: &str) -> Result<i64, SyntaxError> {
    text.parse().map_err(|_| invalid(text))
}

/// `$`-prefixed hexadecimal, or decimal without the prefix.
///
/// # Errors
///
/// Returns [`SyntaxError::InvalidNumber`] if `text` is neither.
pub fn dollar_hex(text: &str) -> Result<i64, SyntaxError> {
    match text.strip_prefix('$') {
        Some(digits) => i64::from_str_radix(digits, 16).map_err(|_| invalid(text)),
        None => decimal(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("10", 10)]
    #[case("-3", -3)]
    #[case("0", 0)]
    fn decimal_values(#[case] text: &str, #[case] expected: i64) {
        assert_eq!(decimal(text).unwrap(), expected);
    }

    #[rstest]
    #[case("$FF", 0xFF)]
    #[case("$0a", 0x0A)]
    #[case("$1234", 0x1234)]
    #[case("12", 12)]
    fn dollar_hex_values(#[case] text: &str, #[case] expected: i64) {
        assert_eq!(dollar_hex(text).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("1x")]
    #[case("$")]
    #[case("$G1")]
    fn malformed_numbers(#[case] text: &str) {
        assert_eq!(dollar_hex(text).unwrap_err(), SyntaxError::InvalidNumber(text.into()));
    }
}
