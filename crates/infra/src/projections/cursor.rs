use std::collections::HashMap;
use std::sync::RwLock;

use ferrepos_core::{AggregateId, TenantId};

use super::ProjectionError;

/// Last applied sequence number per stream.
///
/// Makes projections idempotent under at-least-once delivery: an envelope at
/// or below the cursor is skipped, a gap is an error.
#[derive(Debug, Default)]
pub struct StreamCursors {
    inner: RwLock<HashMap<(TenantId, AggregateId), u64>>,
}

impl StreamCursors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tenant_id: TenantId, aggregate_id: AggregateId) -> u64 {
        self.inner
            .read()
            .ok()
            .and_then(|m| m.get(&(tenant_id, aggregate_id)).copied())
            .unwrap_or(0)
    }

    /// `Ok(true)` when `seq` is the next envelope to apply, `Ok(false)` for a duplicate.
    pub fn is_next(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        seq: u64,
    ) -> Result<bool, ProjectionError> {
        let last = self.get(tenant_id, aggregate_id);
        if seq == 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(false);
        }
        if seq != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        Ok(true)
    }

    pub fn advance(&self, tenant_id: TenantId, aggregate_id: AggregateId, seq: u64) {
        if let Ok(mut m) = self.inner.write() {
            m.insert((tenant_id, aggregate_id), seq);
        }
    }

    pub fn clear_tenant(&self, tenant_id: TenantId) {
        if let Ok(mut m) = self.inner.write() {
            m.retain(|(t, _), _| *t != tenant_id);
        }
    }
}
