use crate::error::SqlBridgeError;
use crate::types::Money;

use super::codec::{ByteReader, ByteWriter};

/// Largest display scale carried by `Money`.
pub const MAX_NUMERIC_SCALE: u16 = 16;

const NBASE: i128 = 10_000;
const SIGN_POSITIVE: u16 = 0x0000;
const SIGN_NEGATIVE: u16 = 0x4000;
const SIGN_NAN: u16 = 0xC000;

/// Header and base-10000 digits of a binary NUMERIC value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumericDigits {
    pub weight: i16,
    pub sign: u16,
    pub dscale: u16,
    pub digits: Vec<i16>,
}

impl NumericDigits {
    /// Parse `{ndigits, weight, sign, dscale, digits[ndigits]}`.
    ///
    /// # Errors
    /// Returns `SqlBridgeError::DecodeError` on a truncated payload or a negative digit count.
    pub fn parse(raw: &[u8]) -> Result<Self, SqlBridgeError> {
        let mut reader = ByteReader::new(raw);
        let ndigits = reader.read_i16()?;
        let weight = reader.read_i16()?;
        let sign = reader.read_u16()?;
        let dscale = reader.read_u16()?;
        let count = usize::try_from(ndigits).map_err(|_| {
            SqlBridgeError::DecodeError(format!("negative NUMERIC digit count {ndigits}"))
        })?;
        let mut digits = Vec::with_capacity(count);
        for _ in 0..count {
            digits.push(reader.read_i16()?);
        }
        reader.finish()?;
        Ok(Self {
            weight,
            sign,
            dscale,
            digits,
        })
    }

    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(8 + self.digits.len() * 2);
        // digit count never exceeds i16 for values that fit in i64
        w.put_i16(i16::try_from(self.digits.len()).unwrap_or(i16::MAX));
        w.put_i16(self.weight);
        w.put_u16(self.sign);
        w.put_u16(self.dscale);
        for d in &self.digits {
            w.put_i16(*d);
        }
        w.into_inner()
    }

    /// Reconstruct the exact scaled integer.
    ///
    /// The display scale is clamped to `MAX_NUMERIC_SCALE`; extra fractional digits are
    /// truncated.
    ///
    /// # Errors
    /// Returns `SqlBridgeError::DecodeError` for NaN/infinite values, out-of-range digits,
    /// or values that overflow `i64`.
    pub fn to_money(&self) -> Result<Money, SqlBridgeError> {
        match self.sign {
            SIGN_POSITIVE | SIGN_NEGATIVE => {}
            SIGN_NAN => return Err(SqlBridgeError::DecodeError("NUMERIC NaN".into())),
            other => {
                return Err(SqlBridgeError::DecodeError(format!(
                    "unsupported NUMERIC sign {other:#06x}"
                )));
            }
        }

        let dscale = i32::from(self.dscale.min(MAX_NUMERIC_SCALE));
        let weight = i32::from(self.weight);

        // leading fractional groups that were stripped as zeros
        let mut scale: i32 = if weight < 0 { 4 * -(weight + 1) } else { 0 };
        let mut value: i128 = 0;

        for (i, digit) in self.digits.iter().enumerate() {
            if !(0..10_000).contains(digit) {
                return Err(SqlBridgeError::DecodeError(format!(
                    "NUMERIC digit {digit} out of range"
                )));
            }
            let digit_weight = weight - i32::try_from(i).unwrap_or(i32::MAX);
            if digit_weight < 0 && scale >= dscale {
                // remaining groups lie past the clamped display scale
                break;
            }
            value = checked(value.checked_mul(NBASE))?;
            value = checked(value.checked_add(i128::from(*digit)))?;
            if digit_weight < 0 {
                scale += 4;
            }
        }

        // trailing integer groups that were stripped as zeros
        let ndigits = i32::try_from(self.digits.len()).unwrap_or(i32::MAX);
        for _ in 0..(weight + 1 - ndigits).max(0) {
            value = checked(value.checked_mul(NBASE))?;
        }

        let diff = dscale - scale;
        if diff > 0 {
            value = checked(pow10(diff).and_then(|p| value.checked_mul(p)))?;
        } else if diff < 0 {
            // a divisor beyond i128 truncates every digit away
            value = pow10(-diff).map_or(0, |p| value / p);
        }

        if self.sign == SIGN_NEGATIVE {
            value = -value;
        }

        let value = i64::try_from(value)
            .map_err(|_| SqlBridgeError::DecodeError("NUMERIC value overflows i64".into()))?;
        Ok(Money {
            value,
            // dscale is clamped to 16 above
            scale: u8::try_from(dscale).unwrap_or(u8::MAX),
        })
    }

    /// Split a fixed-point value into base-10000 groups around the decimal point.
    #[must_use]
    pub fn from_money(money: Money) -> Self {
        let scale = u32::from(money.scale);
        let sign = if money.value < 0 {
            SIGN_NEGATIVE
        } else {
            SIGN_POSITIVE
        };
        if money.value == 0 {
            return Self {
                weight: 0,
                sign: SIGN_POSITIVE,
                dscale: u16::from(money.scale),
                digits: Vec::new(),
            };
        }

        let frac_pad = (4 - scale % 4) % 4;
        let frac_groups = ((scale + frac_pad) / 4) as usize;
        let mut rest = u128::from(money.value.unsigned_abs()) * 10u128.pow(frac_pad);

        // least significant group first
        let mut groups: Vec<i16> = Vec::new();
        while rest > 0 {
            groups.push((rest % 10_000) as i16);
            rest /= 10_000;
        }
        while groups.len() < frac_groups {
            groups.push(0);
        }

        let mut weight = groups.len() as i32 - frac_groups as i32 - 1;
        groups.reverse();

        let leading = groups.iter().take_while(|d| **d == 0).count();
        groups.drain(..leading);
        weight -= leading as i32;
        while groups.last() == Some(&0) {
            groups.pop();
        }

        Self {
            weight: i16::try_from(weight).unwrap_or(i16::MIN),
            sign,
            dscale: u16::from(money.scale),
            digits: groups,
        }
    }
}

fn checked(value: Option<i128>) -> Result<i128, SqlBridgeError> {
    value.ok_or_else(|| SqlBridgeError::DecodeError("NUMERIC value overflows".into()))
}

fn pow10(exp: i32) -> Option<i128> {
    10i128.checked_pow(exp.unsigned_abs())
}

/// Decode a binary NUMERIC payload into an exact fixed-point value.
///
/// # Errors
/// See [`NumericDigits::parse`] and [`NumericDigits::to_money`].
pub fn decode_numeric(raw: &[u8]) -> Result<Money, SqlBridgeError> {
    NumericDigits::parse(raw)?.to_money()
}

#[must_use]
pub fn encode_numeric(money: Money) -> Vec<u8> {
    NumericDigits::from_money(money).to_bytes()
}
