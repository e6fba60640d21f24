use std::sync::Arc;

use ferrepos_core::TenantId;

use crate::generator::TextGenerator;
use crate::job::AiJob;
use crate::result::{AiError, AiResult};

/// Which tenants a scheduler accepts jobs for.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TenantScope {
    Any,
    Tenant(TenantId),
}

impl TenantScope {
    pub fn allows(&self, tenant_id: TenantId) -> bool {
        match self {
            TenantScope::Any => true,
            TenantScope::Tenant(t) => *t == tenant_id,
        }
    }
}

/// Runs jobs synchronously in-process against one generator.
#[derive(Clone)]
pub struct LocalAiScheduler {
    scope: TenantScope,
    generator: Arc<dyn TextGenerator>,
}

impl LocalAiScheduler {
    pub fn new(scope: TenantScope, generator: Arc<dyn TextGenerator>) -> Self {
        Self { scope, generator }
    }

    pub fn scope(&self) -> TenantScope {
        self.scope
    }

    pub fn run<J: AiJob>(&self, job: &J) -> Result<AiResult, AiError> {
        if !self.scope.allows(job.tenant_id()) {
            return Err(AiError::InvalidInput(
                "tenant scope violation (job tenant not allowed by scheduler)".to_string(),
            ));
        }
        job.run(self.generator.as_ref())
    }
}

impl core::fmt::Debug for LocalAiScheduler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LocalAiScheduler").field("scope", &self.scope).finish_non_exhaustive()
    }
}
