use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use ferrepos_core::TenantId;
use ferrepos_events::EventEnvelope;
use ferrepos_parties::{ContactInfo, CustomerEvent, CustomerId, TaxDocument};

use super::{ProjectionError, StreamCursors};
use crate::read_model::TenantStore;
use crate::streams;

/// Customer directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerReadModel {
    pub customer_id: CustomerId,
    pub name: String,
    #[serde(flatten)]
    pub contact: ContactInfo,
    pub document: Option<TaxDocument>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct CustomersProjection<S> {
    store: S,
    cursors: StreamCursors,
}

impl<S> CustomersProjection<S>
where
    S: TenantStore<CustomerId, CustomerReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, customer_id: &CustomerId) -> Option<CustomerReadModel> {
        self.store.get(tenant_id, customer_id)
    }

    /// Sorted by name.
    pub fn list(&self, tenant_id: TenantId) -> Vec<CustomerReadModel> {
        let mut all = self.store.list(tenant_id);
        all.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        all
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != streams::CUSTOMER {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        if !self.cursors.is_next(tenant_id, aggregate_id, seq)? {
            return Ok(());
        }

        let ev: CustomerEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let (event_tenant, customer_id) = match &ev {
            CustomerEvent::CustomerRegistered(e) => (e.tenant_id, e.customer_id),
            CustomerEvent::CustomerUpdated(e) => (e.tenant_id, e.customer_id),
        };
        if event_tenant != tenant_id || customer_id.0 != aggregate_id {
            return Err(ProjectionError::TenantIsolation(
                "customer event does not belong to this stream".to_string(),
            ));
        }

        match ev {
            CustomerEvent::CustomerRegistered(e) => {
                self.store.upsert(
                    tenant_id,
                    e.customer_id,
                    CustomerReadModel {
                        customer_id: e.customer_id,
                        name: e.name,
                        contact: e.contact,
                        document: e.document,
                        created_at: e.occurred_at,
                        updated_at: e.occurred_at,
                    },
                );
            }
            // The event carries the full resulting details.
            CustomerEvent::CustomerUpdated(e) => {
                let created_at = self
                    .store
                    .get(tenant_id, &e.customer_id)
                    .map(|rm| rm.created_at)
                    .unwrap_or(e.occurred_at);
                self.store.upsert(
                    tenant_id,
                    e.customer_id,
                    CustomerReadModel {
                        customer_id: e.customer_id,
                        name: e.name,
                        contact: e.contact,
                        document: e.document,
                        created_at,
                        updated_at: e.occurred_at,
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
