use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use ferrepos_core::TenantId;
use ferrepos_events::EventEnvelope;
use ferrepos_fiscal::SaleTotals;
use ferrepos_parties::CustomerId;
use ferrepos_sales::{SaleEvent, SaleId, SaleItem};

use super::{ProjectionError, StreamCursors};
use crate::read_model::TenantStore;
use crate::streams;

/// Sales history entry: the receipt as it was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaleReadModel {
    pub sale_id: SaleId,
    pub date: DateTime<Utc>,
    pub customer_id: Option<CustomerId>,
    pub customer_name: String,
    pub items: Vec<SaleItem>,
    #[serde(flatten)]
    pub totals: SaleTotals,
}

#[derive(Debug)]
pub struct SalesProjection<S> {
    store: S,
    cursors: StreamCursors,
}

impl<S> SalesProjection<S>
where
    S: TenantStore<SaleId, SaleReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, sale_id: &SaleId) -> Option<SaleReadModel> {
        self.store.get(tenant_id, sale_id)
    }

    /// Newest first.
    pub fn list(&self, tenant_id: TenantId) -> Vec<SaleReadModel> {
        let mut all = self.store.list(tenant_id);
        all.sort_by(|a, b| b.date.cmp(&a.date));
        all
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != streams::SALE {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        if !self.cursors.is_next(tenant_id, aggregate_id, seq)? {
            return Ok(());
        }

        let ev: SaleEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match ev {
            SaleEvent::SaleCompleted(e) => {
                if e.tenant_id != tenant_id || e.sale_id.0 != aggregate_id {
                    return Err(ProjectionError::TenantIsolation(
                        "sale event does not belong to this stream".to_string(),
                    ));
                }
                self.store.upsert(
                    tenant_id,
                    e.sale_id,
                    SaleReadModel {
                        sale_id: e.sale_id,
                        date: e.occurred_at,
                        customer_id: e.customer_id,
                        customer_name: e.customer_name,
                        items: e.items,
                        totals: e.totals,
                    },
                );
            }
        }

        self.cursors.advance(tenant_id, aggregate_id, seq);
        Ok(())
    }

    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionError> {
        let envs = super::prepare_rebuild(envelopes, |t| self.store.clear_tenant(t), &self.cursors);
        for env in &envs {
            self.apply_envelope(env)?;
        }
        Ok(())
    }
}
