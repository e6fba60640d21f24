use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FiscalError {
    /// A cart line that would corrupt totals or stock (negative price, quantity below one).
    #[error("invalid cart line #{index}: {reason}")]
    InvalidLine { index: usize, reason: String },

    /// IVA is only levied at 5% or 10%.
    #[error("unsupported IVA rate {0}% (expected 5 or 10)")]
    InvalidRate(u8),

    #[error("invalid RUC: {0}")]
    InvalidTaxId(String),

    #[error("RUC check digit mismatch (expected {expected}, found {found})")]
    CheckDigitMismatch { expected: u8, found: u8 },
}
