//! Read-model builders.
//!
//! Every projection consumes committed envelopes, is tenant-partitioned,
//! skips envelopes it has already applied and can be rebuilt from the store.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use thiserror::Error;

use ferrepos_billing::InvoiceId;
use ferrepos_core::TenantId;
use ferrepos_events::EventEnvelope;
use ferrepos_parties::CustomerId;
use ferrepos_products::{CategoryId, ProductId};
use ferrepos_sales::SaleId;

use crate::event_store::{EventStore, EventStoreError, StoredEvent};
use crate::read_model::InMemoryTenantStore;
use crate::streams;

pub mod catalog;
pub mod categories;
pub mod cursor;
pub mod customers;
pub mod invoices;
pub mod sales;
pub mod tenants;

pub use catalog::{CatalogProjection, CatalogQuery, ProductReadModel};
pub use categories::{CategoriesProjection, CategoryReadModel};
pub use cursor::StreamCursors;
pub use customers::{CustomerReadModel, CustomersProjection};
pub use invoices::{InvoiceReadModel, InvoiceSummary, InvoicesProjection};
pub use sales::{SaleReadModel, SalesProjection};
pub use tenants::{TenantDirectoryProjection, TenantReadModel};

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize event payload: {0}")]
    Deserialize(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },

    #[error(transparent)]
    Source(#[from] EventStoreError),
}

/// Clear the partitions touched by `envelopes` and return them in replay order.
pub(crate) fn prepare_rebuild(
    envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    clear_tenant: impl Fn(TenantId),
    cursors: &StreamCursors,
) -> Vec<EventEnvelope<JsonValue>> {
    let mut envs: Vec<_> = envelopes.into_iter().collect();

    let mut tenants: Vec<_> = envs.iter().map(|e| e.tenant_id()).collect();
    tenants.sort_by_key(|t| *t.as_uuid());
    tenants.dedup();
    for t in tenants {
        clear_tenant(t);
        cursors.clear_tenant(t);
    }

    envs.sort_by_key(|e| (*e.tenant_id().as_uuid(), *e.aggregate_id().as_uuid(), e.sequence_number()));
    envs
}

pub type Catalog = CatalogProjection<Arc<InMemoryTenantStore<ProductId, ProductReadModel>>>;
pub type Categories = CategoriesProjection<Arc<InMemoryTenantStore<CategoryId, CategoryReadModel>>>;
pub type Customers = CustomersProjection<Arc<InMemoryTenantStore<CustomerId, CustomerReadModel>>>;
pub type Sales = SalesProjection<Arc<InMemoryTenantStore<SaleId, SaleReadModel>>>;
pub type TenantDirectory = TenantDirectoryProjection<Arc<InMemoryTenantStore<TenantId, TenantReadModel>>>;
pub type Invoices = InvoicesProjection<Arc<InMemoryTenantStore<InvoiceId, InvoiceReadModel>>>;

/// All read models of the application, backed by in-memory stores.
#[derive(Debug)]
pub struct ReadModels {
    pub catalog: Catalog,
    pub categories: Categories,
    pub customers: Customers,
    pub sales: Sales,
    pub tenants: TenantDirectory,
    pub invoices: Invoices,
}

impl Default for ReadModels {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl ReadModels {
    pub fn in_memory() -> Self {
        Self {
            catalog: CatalogProjection::new(Arc::new(InMemoryTenantStore::new())),
            categories: CategoriesProjection::new(Arc::new(InMemoryTenantStore::new())),
            customers: CustomersProjection::new(Arc::new(InMemoryTenantStore::new())),
            sales: SalesProjection::new(Arc::new(InMemoryTenantStore::new())),
            tenants: TenantDirectoryProjection::new(Arc::new(InMemoryTenantStore::new())),
            invoices: InvoicesProjection::new(Arc::new(InMemoryTenantStore::new())),
        }
    }

    /// Route one envelope to the projection that owns its aggregate type.
    pub fn apply(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        match envelope.aggregate_type() {
            streams::PRODUCT => self.catalog.apply_envelope(envelope),
            streams::CATEGORY => self.categories.apply_envelope(envelope),
            streams::CUSTOMER => self.customers.apply_envelope(envelope),
            streams::SALE => self.sales.apply_envelope(envelope),
            streams::TENANT_ACCOUNT => self.tenants.apply_envelope(envelope),
            streams::TENANT_INVOICE => self.invoices.apply_envelope(envelope),
            _ => Ok(()),
        }
    }

    /// Apply freshly committed events. Failures are logged, not returned:
    /// the events are durable and a rebuild repairs the read model.
    pub fn apply_committed(&self, committed: &[StoredEvent]) {
        for stored in committed {
            if let Err(err) = self.apply(&stored.to_envelope()) {
                tracing::warn!(
                    aggregate_type = %stored.aggregate_type,
                    aggregate_id = %stored.aggregate_id,
                    sequence_number = stored.sequence_number,
                    error = %err,
                    "projection apply failed"
                );
            }
        }
    }

    /// Rebuild every read model from the event store.
    pub fn rebuild_from<S: EventStore>(&self, store: &S) -> Result<(), ProjectionError> {
        let load = |aggregate_type: &str| -> Result<Vec<EventEnvelope<JsonValue>>, ProjectionError> {
            Ok(store
                .load_by_type(aggregate_type)?
                .iter()
                .map(StoredEvent::to_envelope)
                .collect())
        };

        self.catalog.rebuild_from_scratch(load(streams::PRODUCT)?)?;
        self.categories.rebuild_from_scratch(load(streams::CATEGORY)?)?;
        self.customers.rebuild_from_scratch(load(streams::CUSTOMER)?)?;
        self.sales.rebuild_from_scratch(load(streams::SALE)?)?;
        self.tenants.rebuild_from_scratch(load(streams::TENANT_ACCOUNT)?)?;
        self.invoices.rebuild_from_scratch(load(streams::TENANT_INVOICE)?)?;

        tracing::info!("read models rebuilt from event store");
        Ok(())
    }
}
