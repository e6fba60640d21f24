//! Text-in/text-out seam to a generative model.

use crate::result::AiError;

pub trait TextGenerator: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String, AiError>;
}

/// No backend configured; every call fails so jobs fall back.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableGenerator;

impl TextGenerator for UnavailableGenerator {
    fn generate(&self, _prompt: &str) -> Result<String, AiError> {
        Err(AiError::Unavailable("no text generation backend configured".to_string()))
    }
}

/// Returns the same text for every prompt.
#[derive(Debug, Clone)]
pub struct StaticGenerator(pub String);

impl TextGenerator for StaticGenerator {
    fn generate(&self, _prompt: &str) -> Result<String, AiError> {
        Ok(self.0.clone())
    }
}
