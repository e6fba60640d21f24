//! RUC (Registro Único de Contribuyentes) check digit, modulo 11.

use serde::{Deserialize, Serialize};

use ferrepos_core::ValueObject;

use crate::error::FiscalError;

/// Check digit of a RUC base number.
///
/// Non-digit characters are ignored; `None` when no digit remains. Weights run
/// 2, 3, 4, ... starting at the rightmost digit, with no upper bound. A raw
/// result of 11 maps to 0 and 10 maps to 1.
pub fn compute_check_digit(base: &str) -> Option<u8> {
    let digits: Vec<u32> = base.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.is_empty() {
        return None;
    }

    // Reduced modulo 11 as we go so arbitrarily long inputs cannot overflow.
    let mut weight = 2u32;
    let mut acc = 0u32;
    for digit in digits.iter().rev() {
        acc = (acc + digit * weight) % 11;
        weight = (weight + 1) % 11;
    }

    Some(match 11 - acc {
        11 => 0,
        10 => 1,
        d => d as u8,
    })
}

/// A RUC with its verified check digit, rendered as `base-dv`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ruc {
    base: String,
    check_digit: u8,
}

impl Ruc {
    /// Normalize `base` to its digits and compute the check digit.
    pub fn from_base(base: &str) -> Result<Self, FiscalError> {
        let digits: String = base.chars().filter(|c| c.is_ascii_digit()).collect();
        let check_digit = compute_check_digit(&digits)
            .ok_or_else(|| FiscalError::InvalidTaxId(format!("'{base}' contains no digits")))?;
        Ok(Self {
            base: digits,
            check_digit,
        })
    }

    /// Parse `base-dv` and verify the digit.
    pub fn parse(value: &str) -> Result<Self, FiscalError> {
        let (base, dv) = value
            .trim()
            .rsplit_once('-')
            .ok_or_else(|| FiscalError::InvalidTaxId(format!("'{value}' is not in base-dv form")))?;

        let found = match dv.trim() {
            d if d.len() == 1 => d
                .chars()
                .next()
                .and_then(|c| c.to_digit(10))
                .map(|d| d as u8)
                .ok_or_else(|| FiscalError::InvalidTaxId(format!("'{dv}' is not a check digit")))?,
            _ => return Err(FiscalError::InvalidTaxId(format!("'{dv}' is not a check digit"))),
        };

        let ruc = Self::from_base(base)?;
        if ruc.check_digit != found {
            return Err(FiscalError::CheckDigitMismatch {
                expected: ruc.check_digit,
                found,
            });
        }
        Ok(ruc)
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn check_digit(&self) -> u8 {
        self.check_digit
    }
}

impl core::fmt::Display for Ruc {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}-{}", self.base, self.check_digit)
    }
}

impl TryFrom<String> for Ruc {
    type Error = FiscalError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ruc::parse(&value)
    }
}

impl From<Ruc> for String {
    fn from(value: Ruc) -> Self {
        value.to_string()
    }
}

impl ValueObject for Ruc {}
