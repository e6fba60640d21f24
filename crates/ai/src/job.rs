use ferrepos_core::TenantId;

use crate::generator::TextGenerator;
use crate::result::{AiError, AiResult};

/// A tenant-scoped generation unit.
///
/// Inputs are snapshots handed over by callers; jobs never read storage.
pub trait AiJob: Send + Sync {
    type Input: Send + Sync;

    fn tenant_id(&self) -> TenantId;

    fn input(&self) -> &Self::Input;

    /// Produce the insight. Generator failures are absorbed into a fallback
    /// result; `Err` is reserved for unusable input.
    fn run(&self, generator: &dyn TextGenerator) -> Result<AiResult, AiError>;
}
