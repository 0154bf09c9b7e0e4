//! Fixed-width integer conversions.
//!
//! Every value the simulator stores lives in an `i64`, and a width counts bytes.
//! Width `0` denotes an empty field whose value is always `0`. Widths of eight bytes
//! or more cover the whole `i64` range and are returned unchanged.

/// Largest width for which truncation actually narrows an `i64`.
const NARROWING_LIMIT: usize = 8;

/// Interprets the low `width` bytes of `raw` as two's-complement signed.
///
/// ```
/// use sim_core::fixed::to_signed;
/// assert_eq!(to_signed(0xFF, 1), -1);
/// assert_eq!(to_signed(0x7F, 1), 127);
/// assert_eq!(to_signed(0x1_00, 1), 0);
/// ```
#[must_use]
pub const fn to_signed(raw: i64, width: usize) -> i64 {
    if width == 0 {
        return 0;
    }
    if width >= NARROWING_LIMIT {
        return raw;
    }
    #[allow(clippy::cast_possible_truncation)]
    let shift = (64 - width * 8) as u32;
    (raw << shift) >> shift
}

/// Interprets the low `width` bytes of `raw` as unsigned.
#[must_use]
pub const fn to_unsigned(raw: i64, width: usize) -> i64 {
    if width == 0 {
        return 0;
    }
    if width >= NARROWING_LIMIT {
        return raw;
    }
    raw & ((1_i64 << (width * 8)) - 1)
}

/// Bitwise complement of `value`, reduced to `width` bytes (unsigned).
#[must_use]
pub const fn ones_complement(value: i64, width: usize) -> i64 {
    to_unsigned(!value, width)
}

/// Arithmetic negation of `value`, reduced to `width` bytes (signed).
#[must_use]
pub const fn twos_complement(value: i64, width: usize) -> i64 {
    to_signed(value.wrapping_neg(), width)
}

/// Returns `true` when `value` is representable as a signed `width`-byte integer.
#[must_use]
pub const fn fits_signed(value: i64, width: usize) -> bool {
    to_signed(value, width) == value
}

/// Upper-case hexadecimal rendering of the unsigned interpretation, zero-padded
/// to exactly `2 * width` digits.
#[must_use]
pub fn to_hex(value: i64, width: usize) -> String {
    if width == 0 {
        return String::new();
    }
    let digits = 2 * width.min(NARROWING_LIMIT);
    format!("{:0digits$X}", to_unsigned(value, width))
}

/// Decimal rendering of the signed interpretation.
#[must_use]
pub fn to_decimal(value: i64, width: usize) -> String {
    to_signed(value, width).to_string()
}

/// Big-endian encoding of the low `width` bytes of `value`.
///
/// Bytes beyond the eighth are filled with the sign of `value`.
#[must_use]
pub fn to_be_bytes(value: i64, width: usize) -> Vec<u8> {
    (0..width)
        .rev()
        .map(|index| {
            let shift = u32::try_from(index * 8).unwrap_or(u32::MAX);
            let byte = value.checked_shr(shift).unwrap_or(if value < 0 { -1 } else { 0 });
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let byte = (byte & 0xFF) as u8;
            byte
        })
        .collect()
}

/// Accumulates big-endian bytes into an unsigned value.
#[must_use]
pub fn from_be_bytes(bytes: &[u8]) -> i64 {
    bytes
        .iter()
        .fold(0_i64, |acc, &byte| (acc << 8) | i64::from(byte))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case(0xFF, 1, -1)]
    #[case(0x80, 1, -128)]
    #[case(0x7F, 1, 127)]
    #[case(0x1FF, 1, -1)]
    #[case(0xFFFF, 2, -1)]
    #[case(0x8000, 2, -32768)]
    #[case(0x0012_3456, 3, 0x12_3456)]
    #[case(0xFFFF_FFFF, 4, -1)]
    #[case(-1, 0, 0)]
    fn signed_interpretation(#[case] raw: i64, #[case] width: usize, #[case] expected: i64) {
        assert_eq!(to_signed(raw, width), expected);
    }

    #[rstest]
    #[case(-1, 1, 0xFF)]
    #[case(-128, 1, 0x80)]
    #[case(-1, 2, 0xFFFF)]
    #[case(0x1234, 1, 0x34)]
    #[case(-1, 4, 0xFFFF_FFFF)]
    #[case(99, 0, 0)]
    fn unsigned_interpretation(#[case] raw: i64, #[case] width: usize, #[case] expected: i64) {
        assert_eq!(to_unsigned(raw, width), expected);
    }

    #[test]
    fn complements_reduce_to_width() {
        assert_eq!(ones_complement(0x0F, 1), 0xF0);
        assert_eq!(ones_complement(0, 2), 0xFFFF);
        assert_eq!(twos_complement(1, 1), -1);
        assert_eq!(twos_complement(-128, 1), -128);
        assert_eq!(twos_complement(5, 0), 0);
    }

    #[test]
    fn hex_is_zero_padded_to_width() {
        assert_eq!(to_hex(-1, 1), "FF");
        assert_eq!(to_hex(10, 2), "000A");
        assert_eq!(to_hex(0x1234, 1), "34");
        assert_eq!(to_hex(7, 0), "");
    }

    #[test]
    fn decimal_is_signed() {
        assert_eq!(to_decimal(0xFF, 1), "-1");
        assert_eq!(to_decimal(0x7F, 1), "127");
    }

    #[test]
    fn branch_offsets_respect_signed_range() {
        assert!(fits_signed(127, 1));
        assert!(fits_signed(-128, 1));
        assert!(!fits_signed(128, 1));
        assert!(!fits_signed(-129, 1));
        assert!(fits_signed(0, 0));
        assert!(!fits_signed(1, 0));
    }

    #[test]
    fn big_endian_bytes() {
        assert_eq!(to_be_bytes(0x1234, 2), vec![0x12, 0x34]);
        assert_eq!(to_be_bytes(-2, 2), vec![0xFF, 0xFE]);
        assert_eq!(to_be_bytes(5, 0), Vec::<u8>::new());
        assert_eq!(from_be_bytes(&[0x12, 0x34]), 0x1234);
    }

    proptest! {
        #[test]
        fn signed_and_unsigned_agree(raw in any::<i64>(), width in 1_usize..=4) {
            let signed = to_signed(raw, width);
            let unsigned = to_unsigned(raw, width);
            prop_assert_eq!(to_unsigned(signed, width), unsigned);
            prop_assert_eq!(to_signed(unsigned, width), signed);
        }

        #[test]
        fn hex_has_exact_length(raw in any::<i64>(), width in 0_usize..=4) {
            prop_assert_eq!(to_hex(raw, width).len(), 2 * width);
        }

        #[test]
        fn byte_encoding_round_trips(raw in any::<i64>(), width in 1_usize..=4) {
            prop_assert_eq!(from_be_bytes(&to_be_bytes(raw, width)), to_unsigned(raw, width));
        }
    }
}
