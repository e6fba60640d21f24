use ferrepos_core::TenantId;

use crate::generator::TextGenerator;
use crate::job::AiJob;
use crate::prompts;
use crate::result::{AiError, AiResult, InsightKind};

pub const DESCRIPTION_FALLBACK: &str = "Descripción no disponible en este momento.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDescriptionInput {
    pub product_name: String,
    pub category: String,
}

/// Short catalog blurb for one product.
#[derive(Debug, Clone)]
pub struct ProductDescriptionJob {
    tenant_id: TenantId,
    input: ProductDescriptionInput,
}

impl ProductDescriptionJob {
    pub fn new(tenant_id: TenantId, product_name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            tenant_id,
            input: ProductDescriptionInput {
                product_name: product_name.into(),
                category: category.into(),
            },
        }
    }
}

impl AiJob for ProductDescriptionJob {
    type Input = ProductDescriptionInput;

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    fn input(&self) -> &Self::Input {
        &self.input
    }

    fn run(&self, generator: &dyn TextGenerator) -> Result<AiResult, AiError> {
        if self.input.product_name.trim().is_empty() {
            return Err(AiError::InvalidInput("product name is required".to_string()));
        }

        let prompt = prompts::product_description(&self.input.product_name, &self.input.category);
        match generator.generate(&prompt) {
            Ok(text) if !text.trim().is_empty() => {
                Ok(AiResult::generated(InsightKind::ProductDescription, text.trim()))
            }
            Ok(_) => {
                tracing::warn!(tenant_id = %self.tenant_id, "empty product description generated");
                Ok(AiResult::fallback(InsightKind::ProductDescription, DESCRIPTION_FALLBACK))
            }
            Err(e) => {
                tracing::warn!(tenant_id = %self.tenant_id, error = %e, "product description generation failed");
                Ok(AiResult::fallback(InsightKind::ProductDescription, DESCRIPTION_FALLBACK))
            }
        }
    }
}
