use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use ferrepos_core::{Aggregate, AggregateId, DomainError, TenantId};
use ferrepos_events::{Event, EventBus, EventEnvelope};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::{EventStore, StoredEvent};
use crate::projections::{ProjectionError, ReadModels};

/// Write side plus read side.
///
/// Every successful dispatch is applied to the read models before returning,
/// so a caller reading right after a write sees its own change. Bus
/// subscribers still receive every committed envelope.
///
/// Append and apply happen under one lock: projections see each stream's
/// events in sequence order, whatever the number of concurrent writers.
#[derive(Debug)]
pub struct Backend<S, B> {
    dispatcher: CommandDispatcher<S, B>,
    read_models: ReadModels,
    commit_order: Mutex<()>,
}

impl<S, B> Backend<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(store: S, bus: B) -> Self {
        Self {
            dispatcher: CommandDispatcher::new(store, bus),
            read_models: ReadModels::in_memory(),
            commit_order: Mutex::new(()),
        }
    }

    /// Like [`Backend::new`], then replays whatever the store already holds
    /// into the read models.
    pub fn restore(store: S, bus: B) -> Result<Self, ProjectionError> {
        let backend = Self::new(store, bus);
        backend.read_models.rebuild_from(backend.dispatcher.store())?;
        Ok(backend)
    }

    pub fn read_models(&self) -> &ReadModels {
        &self.read_models
    }

    pub fn dispatcher(&self) -> &CommandDispatcher<S, B> {
        &self.dispatcher
    }

    pub fn execute<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: Event + Serialize + DeserializeOwned,
    {
        // The guarded data is `()`; a panic elsewhere leaves nothing torn.
        let _order = self.commit_order.lock().unwrap_or_else(PoisonError::into_inner);
        let committed = self
            .dispatcher
            .dispatch::<A>(tenant_id, aggregate_id, aggregate_type, command, make_aggregate)?;
        self.read_models.apply_committed(&committed);
        Ok(committed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use ferrepos_events::InMemoryEventBus;
    use ferrepos_fiscal::VatRate;
    use ferrepos_products::{
        AdjustStock, Category, CategoryCommand, CategoryId, CreateCategory, CreateProduct, Product, ProductCommand,
        ProductId, StockReason,
    };
    use rust_decimal_macros::dec;

    use super::*;
    use crate::event_store::InMemoryEventStore;
    use crate::streams;

    type TestBackend = Backend<Arc<InMemoryEventStore>, Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>>;

    fn create_category(backend: &TestBackend, t: TenantId, name: &str) {
        let id = CategoryId::new(AggregateId::new());
        backend
            .execute::<Category>(
                t,
                id.0,
                streams::CATEGORY,
                CategoryCommand::CreateCategory(CreateCategory {
                    tenant_id: t,
                    category_id: id,
                    name: name.to_string(),
                    occurred_at: Utc::now(),
                }),
                |_, id| Category::empty(CategoryId::new(id)),
            )
            .unwrap();
    }

    #[test]
    fn writes_are_visible_on_the_read_side_immediately() {
        let backend = Backend::new(Arc::new(InMemoryEventStore::new()), Arc::new(InMemoryEventBus::new()));
        let t = TenantId::new();
        create_category(&backend, t, "Plomería");
        assert!(backend.read_models().categories.find_by_name(t, "plomería").is_some());
    }

    #[test]
    fn restore_rebuilds_read_models_from_the_store() {
        let store = Arc::new(InMemoryEventStore::new());
        let t = TenantId::new();
        {
            let first = Backend::new(store.clone(), Arc::new(InMemoryEventBus::new()));
            create_category(&first, t, "Plomería");
            create_category(&first, t, "Pinturas");
        }

        let restored = Backend::restore(store, Arc::new(InMemoryEventBus::new())).unwrap();
        assert_eq!(restored.read_models().categories.list(t).len(), 2);
    }

    fn create_product(backend: &TestBackend, t: TenantId, stock: i64) -> ProductId {
        let id = ProductId::new(AggregateId::new());
        backend
            .execute::<Product>(
                t,
                id.0,
                streams::PRODUCT,
                ProductCommand::CreateProduct(CreateProduct {
                    tenant_id: t,
                    product_id: id,
                    sku: "CAL-100".to_string(),
                    name: "Cal hidratada".to_string(),
                    category: None,
                    price: dec!(18000),
                    cost: dec!(12000),
                    stock,
                    min_stock: 0,
                    description: None,
                    vat_rate: VatRate::General,
                    occurred_at: Utc::now(),
                }),
                |_, id| Product::empty(ProductId::new(id)),
            )
            .unwrap();
        id
    }

    fn adjust(backend: &TestBackend, t: TenantId, id: ProductId, delta: i64) -> Result<Vec<StoredEvent>, DispatchError> {
        backend.execute::<Product>(
            t,
            id.0,
            streams::PRODUCT,
            ProductCommand::AdjustStock(AdjustStock {
                tenant_id: t,
                product_id: id,
                delta,
                reason: StockReason::Manual,
                occurred_at: Utc::now(),
            }),
            |_, id| Product::empty(ProductId::new(id)),
        )
    }

    #[test]
    fn concurrent_writers_keep_the_read_side_in_step() {
        const THREADS: usize = 8;
        const ADJUSTS: usize = 200;

        let backend = Backend::new(Arc::new(InMemoryEventStore::new()), Arc::new(InMemoryEventBus::new()));
        let t = TenantId::new();
        let id = create_product(&backend, t, 1_000);

        let committed: usize = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..THREADS)
                .map(|_| scope.spawn(|| (0..ADJUSTS).filter(|_| adjust(&backend, t, id, 1).is_ok()).count()))
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).sum()
        });
        assert_eq!(committed, THREADS * ADJUSTS);

        let aggregate = backend
            .dispatcher()
            .load::<Product>(t, id.0, |_, id| Product::empty(ProductId::new(id)))
            .unwrap()
            .unwrap();
        let row = backend.read_models().catalog.get(t, &id).unwrap();
        assert_eq!(aggregate.stock(), 1_000 + committed as i64);
        assert_eq!(row.stock, aggregate.stock());

        // The stream keeps projecting after the contention.
        adjust(&backend, t, id, 1).unwrap();
        assert_eq!(backend.read_models().catalog.get(t, &id).unwrap().stock, aggregate.stock() + 1);
    }
}
