use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value as JsonValue;

use ferrepos_core::TenantId;
use ferrepos_events::EventEnvelope;
use ferrepos_fiscal::VatRate;
use ferrepos_products::{ProductEvent, ProductId};

use super::{ProjectionError, StreamCursors};
use crate::read_model::TenantStore;
use crate::streams;

/// Queryable catalog entry with current stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductReadModel {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub category: Option<String>,
    pub price: Decimal,
    pub cost: Decimal,
    pub stock: i64,
    pub min_stock: i64,
    pub description: Option<String>,
    pub vat_rate: VatRate,
    pub low_stock: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Catalog filter. All set conditions must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogQuery {
    /// Case-insensitive substring of name or SKU.
    pub text: Option<String>,
    /// Only products at or below their minimum stock.
    pub low_stock_only: bool,
}

impl CatalogQuery {
    fn matches(&self, p: &ProductReadModel) -> bool {
        if self.low_stock_only && !p.low_stock {
            return false;
        }
        match self.text.as_deref().map(str::trim) {
            Some(q) if !q.is_empty() => {
                let q = q.to_lowercase();
                p.name.to_lowercase().contains(&q) || p.sku.to_lowercase().contains(&q)
            }
            _ => true,
        }
    }
}

#[derive(Debug)]
pub struct CatalogProjection<S> {
    store: S,
    cursors: StreamCursors,
}

impl<S> CatalogProjection<S>
where
    S: TenantStore<ProductId, ProductReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, product_id: &ProductId) -> Option<ProductReadModel> {
        self.store.get(tenant_id, product_id)
    }

    /// Sorted by name.
    pub fn search(&self, tenant_id: TenantId, query: &CatalogQuery) -> Vec<ProductReadModel> {
        let mut products: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|p| query.matches(p))
            .collect();
        products.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        products
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<ProductReadModel> {
        self.search(tenant_id, &CatalogQuery::default())
    }

    /// Exact, case-insensitive SKU match.
    pub fn find_by_sku(&self, tenant_id: TenantId, sku: &str) -> Option<ProductReadModel> {
        let sku = sku.trim();
        self.store
            .list(tenant_id)
            .into_iter()
            .find(|p| p.sku.eq_ignore_ascii_case(sku))
    }

    pub fn count(&self, tenant_id: TenantId) -> usize {
        self.store.list(tenant_id).len()
    }

    pub fn low_stock_count(&self, tenant_id: TenantId) -> usize {
        self.store.list(tenant_id).iter().filter(|p| p.low_stock).count()
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != streams::PRODUCT {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        if !self.cursors.is_next(tenant_id, aggregate_id, seq)? {
            return Ok(());
        }

        let ev: ProductEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let (event_tenant, product_id) = match &ev {
            ProductEvent::ProductCreated(e) => (e.tenant_id, e.product_id),
            ProductEvent::ProductUpdated(e) => (e.tenant_id, e.product_id),
            ProductEvent::StockAdjusted(e) => (e.tenant_id, e.product_id),
            ProductEvent::ProductRemoved(e) => (e.tenant_id, e.product_id),
        };
        if event_tenant != tenant_id {
            return Err(ProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        if product_id.0 != aggregate_id {
            return Err(ProjectionError::TenantIsolation(
                "event product_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match ev {
            ProductEvent::ProductCreated(e) => {
                let low_stock = e.stock <= e.min_stock;
                self.store.upsert(
                    tenant_id,
                    e.product_id,
                    ProductReadModel {
                        product_id: e.product_id,
                        sku: e.sku,
                        name: e.name,
                        category: e.category,
                        price: e.price,
                        cost: e.cost,
                        stock: e.stock,
                        min_stock: e.min_stock,
                        description: e.description,
                        vat_rate: e.vat_rate,
                        low_stock,
                        created_at: e.occurred_at,
                        updated_at: e.occurred_at,
                    },
                );
            }
            ProductEvent::ProductUpdated(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.product_id) {
                    let c = e.changes;
                    if let Some(sku) = c.sku {
                        rm.sku = sku;
                    }
                    if let Some(name) = c.name {
                        rm.name = name;
                    }
                    if let Some(category) = c.category {
                        rm.category = non_blank(category);
                    }
                    if let Some(price) = c.price {
                        rm.price = price;
                    }
                    if let Some(cost) = c.cost {
                        rm.cost = cost;
                    }
                    if let Some(min_stock) = c.min_stock {
                        rm.min_stock = min_stock;
                    }
                    if let Some(description) = c.description {
                        rm.description = non_blank(description);
                    }
                    if let Some(vat_rate) = c.vat_rate {
                        rm.vat_rate = vat_rate;
                    }
                    rm.low_stock = rm.stock <= rm.min_stock;
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(tenant_id, e.product_id, rm);
                }
            }
            ProductEvent::StockAdjusted(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.product_id) {
                    rm.stock = e.stock_after;
                    rm.low_stock = rm.stock <= rm.min_stock;
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(tenant_id, e.product_id, rm);
                }
            }
            ProductEvent::ProductRemoved(e) => {
                self.store.remove(tenant_id, &e.product_id);
            }
        }

        self.cursors.advance(tenant_id, aggregate_id, seq);
        Ok(())
    }

    /// Drop everything for the tenants present and replay `envelopes` in stream order.
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

fn non_blank(value: String) -> Option<String> {
    (!value.trim().is_empty()).then_some(value)
}
