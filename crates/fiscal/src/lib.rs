//! Paraguayan fiscal rules used at the point of sale.
//!
//! - [`compute_totals`]: decompose tax-inclusive cart lines into the taxable
//!   base and the IVA liability per rate bracket.
//! - [`compute_check_digit`]: modulo-11 check digit of a RUC base number.
//!
//! Both are pure functions with no shared state.

pub mod error;
pub mod iva;
pub mod ruc;

pub use error::FiscalError;
pub use iva::{CartLine, SaleTotals, TAX_SCALE, VatRate, compute_totals};
pub use ruc::{Ruc, compute_check_digit};
