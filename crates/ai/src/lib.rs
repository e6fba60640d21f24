//! `ferrepos-ai`
//!
//! Optional text-generation boundary: product descriptions for the catalog and
//! a short business analysis on the dashboard.
//!
//! - It does not depend on domain aggregates and never mutates domain state.
//! - Any generator failure degrades to a fixed fallback text; callers always
//!   get an [`AiResult`].

pub mod describe;
pub mod generator;
pub mod job;
pub mod prompts;
pub mod result;
pub mod sales_analysis;
pub mod scheduler;

pub use describe::{DESCRIPTION_FALLBACK, ProductDescriptionJob};
pub use generator::{StaticGenerator, TextGenerator, UnavailableGenerator};
pub use job::AiJob;
pub use result::{AiError, AiResult, InsightKind};
pub use sales_analysis::{ANALYSIS_FALLBACK, SalesAnalysisJob, SalesSummary, TopProduct};
pub use scheduler::{LocalAiScheduler, TenantScope};
