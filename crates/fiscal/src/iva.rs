//! IVA (Impuesto al Valor Agregado) decomposition of tax-inclusive sales.
//!
//! Retail prices in Paraguay are quoted with IVA included. For a rate `r` the
//! tax embedded in an amount is `amount * r / (1 + r)`, which reduces to
//! `amount / 11` at 10% and `amount / 21` at 5%.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use ferrepos_core::ValueObject;

use crate::error::FiscalError;

/// Decimal places kept for the IVA buckets.
///
/// The guaraní has no fractional unit, yet the buckets keep cents: the
/// embedded tax of a whole-guaraní price is rarely whole (45000 Gs carries
/// 4090.91 Gs at 10%) and `subtotal + vat5 + vat10 == total` must hold
/// exactly. Rounding to whole guaraníes is left to whatever prints the ticket.
pub const TAX_SCALE: u32 = 2;

/// IVA bracket. Serialized as the bare percentage (`5` or `10`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum VatRate {
    /// 5%: basic basket goods, agricultural inputs (e.g. seeds).
    Reduced,
    /// 10%: everything else.
    General,
}

impl VatRate {
    pub fn percent(self) -> u8 {
        match self {
            VatRate::Reduced => 5,
            VatRate::General => 10,
        }
    }

    /// `(100 + r) / r`: dividing a tax-inclusive amount by this yields its tax.
    pub fn inclusive_divisor(self) -> Decimal {
        match self {
            VatRate::Reduced => Decimal::from(21),
            VatRate::General => Decimal::from(11),
        }
    }

    /// Tax embedded in a tax-inclusive amount, unrounded.
    pub fn tax_portion(self, amount: Decimal) -> Decimal {
        amount / self.inclusive_divisor()
    }
}

impl TryFrom<u8> for VatRate {
    type Error = FiscalError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            5 => Ok(VatRate::Reduced),
            10 => Ok(VatRate::General),
            other => Err(FiscalError::InvalidRate(other)),
        }
    }
}

impl From<VatRate> for u8 {
    fn from(value: VatRate) -> Self {
        value.percent()
    }
}

impl core::fmt::Display for VatRate {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "IVA {}%", self.percent())
    }
}

impl ValueObject for VatRate {}

/// One cart position as seen by the totalizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Tax-inclusive unit price.
    pub unit_price: Decimal,
    pub quantity: i64,
    pub vat_rate: VatRate,
}

impl CartLine {
    pub fn new(unit_price: Decimal, quantity: i64, vat_rate: VatRate) -> Self {
        Self {
            unit_price,
            quantity,
            vat_rate,
        }
    }

    /// Build a line from an untyped percentage, rejecting anything but 5 or 10.
    pub fn from_raw(unit_price: Decimal, quantity: i64, rate_percent: u8) -> Result<Self, FiscalError> {
        Ok(Self::new(unit_price, quantity, VatRate::try_from(rate_percent)?))
    }

    /// `unit_price * quantity`, or `None` on overflow.
    pub fn amount(&self) -> Option<Decimal> {
        self.unit_price.checked_mul(Decimal::from(self.quantity))
    }

    fn validate(&self, index: usize) -> Result<Decimal, FiscalError> {
        if self.unit_price.is_sign_negative() && !self.unit_price.is_zero() {
            return Err(FiscalError::InvalidLine {
                index,
                reason: format!("unit price {} is negative", self.unit_price),
            });
        }
        if self.quantity < 1 {
            return Err(FiscalError::InvalidLine {
                index,
                reason: format!("quantity {} must be at least 1", self.quantity),
            });
        }
        self.amount().ok_or_else(|| FiscalError::InvalidLine {
            index,
            reason: "line amount overflows".to_string(),
        })
    }
}

impl ValueObject for CartLine {}

/// Result of [`compute_totals`].
///
/// `total == subtotal + vat10 + vat5` holds exactly: the buckets are rounded
/// to [`TAX_SCALE`] and the subtotal is derived by subtraction.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SaleTotals {
    /// Taxable base ("gravada"), IVA excluded.
    pub subtotal: Decimal,
    pub vat10: Decimal,
    pub vat5: Decimal,
    pub total: Decimal,
}

impl SaleTotals {
    pub fn zero() -> Self {
        Self::default()
    }

    /// Combined IVA liability.
    pub fn vat(&self) -> Decimal {
        self.vat10 + self.vat5
    }
}

impl ValueObject for SaleTotals {}

/// Totalize a cart of tax-inclusive lines.
///
/// Fails on the first line with a negative price or a quantity below one.
pub fn compute_totals(lines: &[CartLine]) -> Result<SaleTotals, FiscalError> {
    let mut total = Decimal::ZERO;
    let mut vat10 = Decimal::ZERO;
    let mut vat5 = Decimal::ZERO;

    for (index, line) in lines.iter().enumerate() {
        let amount = line.validate(index)?;
        total = total.checked_add(amount).ok_or_else(|| FiscalError::InvalidLine {
            index,
            reason: "cart total overflows".to_string(),
        })?;

        let tax = line.vat_rate.tax_portion(amount);
        match line.vat_rate {
            VatRate::General => vat10 += tax,
            VatRate::Reduced => vat5 += tax,
        }
    }

    let vat10 = round_tax(vat10);
    let vat5 = round_tax(vat5);

    Ok(SaleTotals {
        subtotal: total - vat10 - vat5,
        vat10,
        vat5,
        total,
    })
}

fn round_tax(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(TAX_SCALE, RoundingStrategy::MidpointAwayFromZero)
}
