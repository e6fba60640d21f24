//! Identity documents accepted on Paraguayan receipts.

use serde::{Deserialize, Serialize};

use ferrepos_core::{DomainError, ValueObject};
use ferrepos_fiscal::Ruc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// Cédula de identidad.
    Ci,
    /// Registro Único de Contribuyentes; stored as `base-dv`.
    Ruc,
    /// Passport.
    Pas,
    /// Foreign identity document.
    Ext,
}

impl DocumentKind {
    pub fn code(self) -> &'static str {
        match self {
            DocumentKind::Ci => "CI",
            DocumentKind::Ruc => "RUC",
            DocumentKind::Pas => "PAS",
            DocumentKind::Ext => "EXT",
        }
    }
}

/// A normalized document number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaxDocument {
    pub kind: DocumentKind,
    pub number: String,
}

impl TaxDocument {
    /// Normalize `raw` for `kind`.
    ///
    /// For RUC, a bare base gets its check digit appended; a `base-dv` value is
    /// verified. CI numbers are reduced to their digits. PAS/EXT keep the
    /// trimmed, upper-cased text.
    pub fn new(kind: DocumentKind, raw: &str) -> Result<Self, DomainError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(DomainError::validation("document number cannot be empty"));
        }

        let number = match kind {
            DocumentKind::Ruc => {
                let ruc = if raw.contains('-') {
                    Ruc::parse(raw)
                } else {
                    Ruc::from_base(raw)
                }
                .map_err(|e| DomainError::validation(e.to_string()))?;
                ruc.to_string()
            }
            DocumentKind::Ci => {
                let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
                if digits.is_empty() {
                    return Err(DomainError::validation("CI must contain digits"));
                }
                digits
            }
            DocumentKind::Pas | DocumentKind::Ext => raw.to_uppercase(),
        };

        Ok(Self { kind, number })
    }

    /// Value printed on the receipt (the legacy `taxId` field).
    pub fn tax_id(&self) -> &str {
        &self.number
    }
}

impl core::fmt::Display for TaxDocument {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} {}", self.kind.code(), self.number)
    }
}

impl ValueObject for TaxDocument {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ruc_base_gets_check_digit() {
        let doc = TaxDocument::new(DocumentKind::Ruc, "44444401").unwrap();
        assert_eq!(doc.tax_id(), "44444401-7");
        assert_eq!(doc.to_string(), "RUC 44444401-7");
    }

    #[test]
    fn ruc_with_wrong_digit_is_rejected() {
        let err = TaxDocument::new(DocumentKind::Ruc, "44444401-2").unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert!(TaxDocument::new(DocumentKind::Ruc, "44444401-7").is_ok());
    }

    #[test]
    fn ci_keeps_only_digits() {
        let doc = TaxDocument::new(DocumentKind::Ci, "4.123.456").unwrap();
        assert_eq!(doc.number, "4123456");
        assert!(TaxDocument::new(DocumentKind::Ci, "abc").is_err());
    }

    #[test]
    fn passport_is_upper_cased() {
        let doc = TaxDocument::new(DocumentKind::Pas, " ab123 ").unwrap();
        assert_eq!(doc.number, "AB123");
    }

    #[test]
    fn empty_number_is_rejected() {
        assert!(TaxDocument::new(DocumentKind::Ext, "  ").is_err());
    }

    #[test]
    fn kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&DocumentKind::Ruc).unwrap(), "\"ruc\"");
    }
}
