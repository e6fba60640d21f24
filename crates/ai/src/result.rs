use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    ProductDescription,
    SalesAnalysis,
}

/// Generated text for display. Not a domain event and never persisted as one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiResult {
    pub kind: InsightKind,
    pub text: String,
    /// `true` when the generator failed and `text` is the canned fallback.
    pub fallback: bool,
}

impl AiResult {
    pub fn generated(kind: InsightKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            fallback: false,
        }
    }

    pub fn fallback(kind: InsightKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            fallback: true,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AiError {
    #[error("invalid job input: {0}")]
    InvalidInput(String),

    #[error("text generation unavailable: {0}")]
    Unavailable(String),

    #[error("generation failed: {0}")]
    GenerationFailed(String),
}
