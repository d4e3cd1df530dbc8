//! Ledger fixed-point decimal.
//!
//! Values are stored as `i128` scaled by 10^18 (`DEC_PRECISION` fractional
//! digits). Parsing accepts plain (`"-12.5"`) and exponent (`"1.25e-3"`)
//! notation, since reputer processes commonly print floats in either form.
//! Digits beyond the 18th decimal are truncated toward zero.
//!
//! The wire form is always a decimal string without exponent and without
//! trailing fractional zeros (`"0.25"`, `"-3"`, `"0"`).

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::{
    constants::{DEC_PRECISION, DEC_SCALE},
    error::ProtocolError,
};

/// Longest exponent we bother interpreting; anything beyond over/underflows.
const MAX_EXPONENT_MAGNITUDE: u64 = 1_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Dec(i128);

impl Dec {
    pub const ZERO: Dec = Dec(0);
    pub const ONE: Dec = Dec(DEC_SCALE);

    /// Wrap an already-scaled value.
    pub const fn from_raw(raw: i128) -> Self {
        Dec(raw)
    }

    /// Scaled representation (value × 10^18).
    pub const fn raw(self) -> i128 {
        self.0
    }

    pub fn from_int(v: i64) -> Self {
        Dec(v as i128 * DEC_SCALE)
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl FromStr for Dec {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| ProtocolError::InvalidDecimal { input: s.to_owned(), reason };

        let (negative, body) = match s.as_bytes().first() {
            Some(b'-') => (true, &s[1..]),
            Some(b'+') => (false, &s[1..]),
            Some(_) => (false, s),
            None => return Err(invalid("empty string")),
        };

        let (mantissa, exponent) = match body.find(['e', 'E']) {
            Some(i) => {
                let exp: i64 = body[i + 1..]
                    .parse()
                    .map_err(|_| invalid("malformed exponent"))?;
                (&body[..i], exp)
            }
            None => (body, 0),
        };

        let (int_part, frac_part) = match mantissa.split_once('.') {
            Some((i, f)) => (i, f),
            None => (mantissa, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid("no digits"));
        }
        if !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid("unexpected character"));
        }
        if exponent.unsigned_abs() > MAX_EXPONENT_MAGNITUDE {
            return Err(invalid("exponent out of range"));
        }

        let mut digits: String = format!("{int_part}{frac_part}");
        // Power of ten the digit string must be multiplied by to become the
        // scaled integer representation.
        let shift = DEC_PRECISION as i64 + exponent - frac_part.len() as i64;

        if shift < 0 {
            let drop = (-shift) as usize;
            if drop >= digits.len() {
                return Ok(Dec::ZERO);
            }
            digits.truncate(digits.len() - drop);
        }

        let trimmed = digits.trim_start_matches('0');
        let mut raw: i128 = 0;
        for b in trimmed.bytes() {
            raw = raw
                .checked_mul(10)
                .and_then(|r| r.checked_add((b - b'0') as i128))
                .ok_or_else(|| ProtocolError::DecimalOverflow(s.to_owned()))?;
        }
        if shift > 0 && raw != 0 {
            let factor = u32::try_from(shift)
                .ok()
                .and_then(|e| 10i128.checked_pow(e))
                .ok_or_else(|| ProtocolError::DecimalOverflow(s.to_owned()))?;
            raw = raw
                .checked_mul(factor)
                .ok_or_else(|| ProtocolError::DecimalOverflow(s.to_owned()))?;
        }

        Ok(Dec(if negative { -raw } else { raw }))
    }
}

impl fmt::Display for Dec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let abs = self.0.unsigned_abs();
        let scale = DEC_SCALE as u128;
        let int = abs / scale;
        let frac = abs % scale;
        if self.0 < 0 {
            f.write_str("-")?;
        }
        if frac == 0 {
            return write!(f, "{int}");
        }
        let frac = format!("{frac:0width$}", width = DEC_PRECISION as usize);
        write!(f, "{int}.{}", frac.trim_end_matches('0'))
    }
}

impl Serialize for Dec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Dec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DecVisitor;

        impl de::Visitor<'_> for DecVisitor {
            type Value = Dec;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a decimal string or number")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Dec, E> {
                v.parse().map_err(E::custom)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Dec, E> {
                Ok(Dec::from_int(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Dec, E> {
                (v as i128)
                    .checked_mul(DEC_SCALE)
                    .map(Dec)
                    .ok_or_else(|| E::custom(ProtocolError::DecimalOverflow(v.to_string())))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Dec, E> {
                if !v.is_finite() {
                    return Err(E::custom("non-finite decimal"));
                }
                // `{:e}` yields the shortest round-trip representation.
                format!("{v:e}").parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(DecVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Dec {
        s.parse().unwrap()
    }

    #[test]
    fn parses_plain_notation() {
        assert_eq!(dec("1"), Dec::ONE);
        assert_eq!(dec("0.5").raw(), DEC_SCALE / 2);
        assert_eq!(dec("-0.25").raw(), -DEC_SCALE / 4);
        assert_eq!(dec(".5"), dec("0.5"));
        assert_eq!(dec("5."), Dec::from_int(5));
        assert_eq!(dec("+7"), Dec::from_int(7));
    }

    #[test]
    fn parses_exponent_notation() {
        assert_eq!(dec("1.5e-3").raw(), 1_500_000_000_000_000);
        assert_eq!(dec("2E2"), Dec::from_int(200));
        assert_eq!(dec("-4.2e+1").to_string(), "-42");
    }

    #[test]
    fn truncates_beyond_precision() {
        assert_eq!(dec("0.0000000000000000019").raw(), 1);
        assert_eq!(dec("1e-19"), Dec::ZERO);
        assert_eq!(dec("-0.0000000000000000019").raw(), -1);
    }

    #[test]
    fn rejects_garbage() {
        for bad in ["", "-", ".", "abc", "1.2.3", "1e", "1e5x", "0x10", " 1", "NaN"] {
            assert!(bad.parse::<Dec>().is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn rejects_overflow() {
        assert!(matches!(
            "1e30".parse::<Dec>(),
            Err(ProtocolError::DecimalOverflow(_))
        ));
    }

    #[test]
    fn out_of_range_exponents_are_rejected() {
        for input in ["1e-9223372036854775808", "1e9223372036854775807", "-0.5e-1001"] {
            assert!(
                matches!(
                    input.parse::<Dec>(),
                    Err(ProtocolError::InvalidDecimal { reason: "exponent out of range", .. })
                ),
                "{input:?}"
            );
        }
        assert_eq!(dec("1e-1000"), Dec::ZERO);
    }

    #[test]
    fn displays_canonical_form() {
        assert_eq!(dec("3.1400").to_string(), "3.14");
        assert_eq!(dec("-0.000001").to_string(), "-0.000001");
        assert_eq!(dec("0").to_string(), "0");
        assert_eq!(Dec::from_raw(i128::MIN).to_string().chars().next(), Some('-'));
    }

    #[test]
    fn json_accepts_strings_and_numbers() {
        let from_str: Dec = serde_json::from_str("\"0.125\"").unwrap();
        let from_float: Dec = serde_json::from_str("0.125").unwrap();
        let from_int: Dec = serde_json::from_str("-3").unwrap();
        assert_eq!(from_str, from_float);
        assert_eq!(from_int, Dec::from_int(-3));
        assert_eq!(serde_json::to_string(&from_str).unwrap(), "\"0.125\"");
    }
}
