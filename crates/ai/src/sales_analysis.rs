use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ferrepos_core::TenantId;

use crate::generator::TextGenerator;
use crate::job::AiJob;
use crate::prompts;
use crate::result::{AiError, AiResult, InsightKind};

pub const ANALYSIS_FALLBACK: &str = "No se pudo generar el análisis en este momento.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopProduct {
    pub name: String,
    pub units: i64,
}

/// Figures handed to the model. Rendered as a compact one-line summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesSummary {
    pub total_revenue: Decimal,
    pub sales_count: usize,
    pub low_stock_count: usize,
    pub top_products: Vec<TopProduct>,
}

impl SalesSummary {
    pub fn render(&self) -> String {
        let mut out = format!(
            "Ventas totales: {} Gs. en {} transacciones. Productos con stock bajo: {}.",
            self.total_revenue.round_dp(0),
            self.sales_count,
            self.low_stock_count
        );
        if !self.top_products.is_empty() {
            let top: Vec<String> = self
                .top_products
                .iter()
                .map(|p| format!("{} ({} u.)", p.name, p.units))
                .collect();
            out.push_str(&format!(" Más vendidos: {}.", top.join(", ")));
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct SalesAnalysisJob {
    tenant_id: TenantId,
    summary: SalesSummary,
}

impl SalesAnalysisJob {
    pub fn new(tenant_id: TenantId, summary: SalesSummary) -> Self {
        Self { tenant_id, summary }
    }
}

impl AiJob for SalesAnalysisJob {
    type Input = SalesSummary;

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    fn input(&self) -> &Self::Input {
        &self.summary
    }

    fn run(&self, generator: &dyn TextGenerator) -> Result<AiResult, AiError> {
        let prompt = prompts::sales_analysis(&self.summary.render());
        match generator.generate(&prompt) {
            Ok(text) if !text.trim().is_empty() => {
                Ok(AiResult::generated(InsightKind::SalesAnalysis, text.trim()))
            }
            Ok(_) | Err(_) => {
                tracing::warn!(tenant_id = %self.tenant_id, "sales analysis unavailable, using fallback");
                Ok(AiResult::fallback(InsightKind::SalesAnalysis, ANALYSIS_FALLBACK))
            }
        }
    }
}
