//! Kubernetes resource quantity normalization.
//!
//! Parses quantity strings such as `100m`, `0.5`, `128Mi`, `2G` or `1e3`
//! and scales them to integer milli-units (CPU) or base units (memory bytes).
//! Values are rounded up, matching `MilliValue()`/`Value()` in the Kubernetes
//! API machinery, and saturate at the `i64` bounds.

use thiserror::Error;

/// Errors produced while parsing a quantity string
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuantityError {
    #[error("quantity is empty")]
    Empty,

    #[error("quantity '{0}' has no numeric part")]
    MissingNumber(String),

    #[error("quantity '{0}' has an unknown suffix '{1}'")]
    UnknownSuffix(String, String),

    #[error("quantity '{0}' has an invalid exponent")]
    InvalidExponent(String),
}

/// A parsed quantity: `mantissa / 10^fraction_digits * 10^pow10 * 2^pow2`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantity {
    negative: bool,
    mantissa: u128,
    fraction_digits: u32,
    pow10: i32,
    pow2: u32,
    /// Integer digits overflowed the mantissa; the value saturates.
    overflow: bool,
}

impl Quantity {
    /// Parse a Kubernetes quantity string
    pub fn parse(input: &str) -> Result<Self, QuantityError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(QuantityError::Empty);
        }

        let (negative, unsigned) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };

        let number_len = unsigned
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(unsigned.len());
        let (number, suffix) = unsigned.split_at(number_len);

        let (integer, fraction) = match number.split_once('.') {
            Some((i, f)) => (i, f),
            None => (number, ""),
        };
        if (integer.is_empty() && fraction.is_empty()) || fraction.contains('.') {
            return Err(QuantityError::MissingNumber(input.to_string()));
        }

        let mut mantissa: u128 = 0;
        let mut overflow = false;
        for digit in integer.bytes() {
            match mantissa
                .checked_mul(10)
                .and_then(|m| m.checked_add(u128::from(digit - b'0')))
            {
                Some(m) => mantissa = m,
                None => {
                    overflow = true;
                    break;
                }
            }
        }

        // Fraction digits past the mantissa's capacity are dropped.
        let mut fraction_digits = 0u32;
        if !overflow {
            for digit in fraction.bytes() {
                match mantissa
                    .checked_mul(10)
                    .and_then(|m| m.checked_add(u128::from(digit - b'0')))
                {
                    Some(m) => {
                        mantissa = m;
                        fraction_digits += 1;
                    }
                    None => break,
                }
            }
        }

        let (pow10, pow2) = parse_suffix(input, suffix)?;

        Ok(Self {
            negative,
            mantissa,
            fraction_digits,
            pow10,
            pow2,
            overflow,
        })
    }

    /// Value in milli-units (e.g. millicores), rounded up
    pub fn milli_value(&self) -> i64 {
        self.scaled(3)
    }

    /// Value in base units (e.g. bytes), rounded up
    pub fn value(&self) -> i64 {
        self.scaled(0)
    }

    fn scaled(&self, scale: i32) -> i64 {
        let magnitude = if self.overflow {
            None
        } else {
            self.magnitude(scale)
        };

        match (magnitude, self.negative) {
            (None, false) => i64::MAX,
            (None, true) => i64::MIN,
            (Some(m), false) => i64::try_from(m.ceil).unwrap_or(i64::MAX),
            // ceil(-x) == -floor(x)
            (Some(m), true) => i64::try_from(m.floor)
                .map(|v| -v)
                .unwrap_or(i64::MIN),
        }
    }

    /// Absolute value scaled by `10^scale`, as floor and ceiling.
    /// `None` when the result does not fit in a `u128`.
    fn magnitude(&self, scale: i32) -> Option<Magnitude> {
        let numerator = self.mantissa.checked_mul(2u128.checked_pow(self.pow2)?)?;
        let exponent = self
            .pow10
            .saturating_add(scale)
            .saturating_sub(self.fraction_digits as i32);

        if exponent >= 0 {
            let value = numerator.checked_mul(10u128.checked_pow(exponent.unsigned_abs())?)?;
            return Some(Magnitude {
                floor: value,
                ceil: value,
            });
        }

        let magnitude = match 10u128.checked_pow(exponent.unsigned_abs()) {
            Some(denominator) => {
                let floor = numerator / denominator;
                let ceil = if numerator % denominator == 0 {
                    floor
                } else {
                    floor + 1
                };
                Magnitude { floor, ceil }
            }
            // Denominator beyond u128 means the value is below one unit.
            None => Magnitude {
                floor: 0,
                ceil: u128::from(numerator > 0),
            },
        };
        Some(magnitude)
    }
}

#[derive(Debug, Clone, Copy)]
struct Magnitude {
    floor: u128,
    ceil: u128,
}

/// Map a suffix to `(power of ten, power of two)`
fn parse_suffix(input: &str, suffix: &str) -> Result<(i32, u32), QuantityError> {
    let powers = match suffix {
        "" => (0, 0),
        "n" => (-9, 0),
        "u" => (-6, 0),
        "m" => (-3, 0),
        "k" => (3, 0),
        "M" => (6, 0),
        "G" => (9, 0),
        "T" => (12, 0),
        "P" => (15, 0),
        "E" => (18, 0),
        "Ki" => (0, 10),
        "Mi" => (0, 20),
        "Gi" => (0, 30),
        "Ti" => (0, 40),
        "Pi" => (0, 50),
        "Ei" => (0, 60),
        _ => {
            let exponent = suffix
                .strip_prefix('e')
                .or_else(|| suffix.strip_prefix('E'))
                .ok_or_else(|| QuantityError::UnknownSuffix(input.to_string(), suffix.to_string()))?;
            let pow10 = exponent
                .parse::<i32>()
                .map_err(|_| QuantityError::InvalidExponent(input.to_string()))?;
            (pow10, 0)
        }
    };
    Ok(powers)
}
