//! Point-of-sale checkout across several aggregates.
//!
//! A sale touches one stream per product plus the sale's own stream, so it is
//! not atomic. The order is: deduct stock line by line, then record the sale.
//! Any failure after the first deduction puts the already deducted units
//! back with [`StockReason::SaleReversal`] before the error is returned.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;

use ferrepos_core::{DomainError, TenantId};
use ferrepos_events::{EventBus, EventEnvelope};
use ferrepos_parties::CustomerId;
use ferrepos_products::{AdjustStock, Product, ProductCommand, ProductId, StockReason};
use ferrepos_sales::{Cart, CartProduct, CompleteSale, CustomerRef, Sale, SaleCommand, SaleId, SaleItem};

use crate::backend::Backend;
use crate::command_dispatcher::DispatchError;
use crate::event_store::EventStore;
use crate::projections::SaleReadModel;
use crate::streams;

/// Stock deductions retried on a version conflict before giving up.
const STOCK_RETRIES: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutLine {
    pub product_id: ProductId,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    /// `None` sells to "Cliente General".
    pub customer_id: Option<CustomerId>,
    pub lines: Vec<CheckoutLine>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("the cart is empty")]
    EmptyCart,

    #[error("product {0} not found")]
    UnknownProduct(ProductId),

    #[error("customer {0} not found")]
    UnknownCustomer(CustomerId),

    /// Cart rules: quantity at least 1 and within available stock.
    #[error(transparent)]
    Cart(DomainError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Validate the cart, deduct stock and record the sale.
pub fn checkout<S, B>(backend: &Backend<S, B>, request: CheckoutRequest) -> Result<SaleReadModel, CheckoutError>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    if request.lines.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }
    let tenant_id = request.tenant_id;
    let read_models = backend.read_models();

    let customer = match request.customer_id {
        Some(customer_id) => {
            let rm = read_models
                .customers
                .get(tenant_id, &customer_id)
                .ok_or(CheckoutError::UnknownCustomer(customer_id))?;
            Some(CustomerRef {
                customer_id,
                name: rm.name,
            })
        }
        None => None,
    };

    let mut cart = Cart::new();
    for line in &request.lines {
        let product = read_models
            .catalog
            .get(tenant_id, &line.product_id)
            .ok_or(CheckoutError::UnknownProduct(line.product_id))?;
        cart.add(
            CartProduct {
                product_id: product.product_id,
                sku: product.sku,
                name: product.name,
                price: product.price,
                stock: product.stock,
                vat_rate: product.vat_rate,
            },
            line.quantity,
        )
        .map_err(CheckoutError::Cart)?;
    }
    let items = cart.items();

    let mut deducted: Vec<&SaleItem> = Vec::with_capacity(items.len());
    for item in &items {
        if let Err(err) = deduct_stock(backend, &request, item) {
            restore_stock(backend, &request, &deducted);
            return Err(err.into());
        }
        deducted.push(item);
    }

    let recorded = backend.execute::<Sale>(
        tenant_id,
        request.sale_id.0,
        streams::SALE,
        SaleCommand::CompleteSale(CompleteSale {
            tenant_id,
            sale_id: request.sale_id,
            customer,
            items: items.clone(),
            occurred_at: request.occurred_at,
        }),
        |_, id| Sale::empty(SaleId::new(id)),
    );
    if let Err(err) = recorded {
        restore_stock(backend, &request, &deducted);
        return Err(err.into());
    }

    let sale = read_models
        .sales
        .get(tenant_id, &request.sale_id)
        .ok_or(CheckoutError::Dispatch(DispatchError::NotFound))?;

    tracing::info!(
        tenant_id = %tenant_id,
        sale_id = %request.sale_id,
        items = sale.items.len(),
        total = %sale.totals.total,
        "sale completed"
    );
    Ok(sale)
}

fn deduct_stock<S, B>(backend: &Backend<S, B>, request: &CheckoutRequest, item: &SaleItem) -> Result<(), DispatchError>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let result = adjust(
            backend,
            request.tenant_id,
            item.product_id,
            -item.quantity,
            StockReason::Sale {
                sale_id: request.sale_id.0,
            },
            request.occurred_at,
        );
        match result {
            Err(DispatchError::Concurrency(msg)) if attempt < STOCK_RETRIES => {
                tracing::debug!(product_id = %item.product_id, attempt, %msg, "stock deduction raced, retrying");
            }
            other => return other,
        }
    }
}

fn restore_stock<S, B>(backend: &Backend<S, B>, request: &CheckoutRequest, deducted: &[&SaleItem])
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    for item in deducted.iter().rev() {
        let restored = adjust(
            backend,
            request.tenant_id,
            item.product_id,
            item.quantity,
            StockReason::SaleReversal {
                sale_id: request.sale_id.0,
            },
            Utc::now(),
        );
        if let Err(err) = restored {
            tracing::error!(
                tenant_id = %request.tenant_id,
                sale_id = %request.sale_id,
                product_id = %item.product_id,
                quantity = item.quantity,
                error = %err,
                "failed to restore stock after aborted checkout"
            );
        }
    }
    if !deducted.is_empty() {
        tracing::warn!(sale_id = %request.sale_id, lines = deducted.len(), "checkout aborted, stock restored");
    }
}

fn adjust<S, B>(
    backend: &Backend<S, B>,
    tenant_id: TenantId,
    product_id: ProductId,
    delta: i64,
    reason: StockReason,
    occurred_at: DateTime<Utc>,
) -> Result<(), DispatchError>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    backend
        .execute::<Product>(
            tenant_id,
            product_id.0,
            streams::PRODUCT,
            ProductCommand::AdjustStock(AdjustStock {
                tenant_id,
                product_id,
                delta,
                reason,
                occurred_at,
            }),
            |_, id| Product::empty(ProductId::new(id)),
        )
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use ferrepos_core::AggregateId;
    use ferrepos_events::InMemoryEventBus;
    use ferrepos_fiscal::VatRate;
    use ferrepos_parties::{ContactInfo, Customer, CustomerCommand, RegisterCustomer};
    use ferrepos_products::CreateProduct;
    use ferrepos_sales::DEFAULT_CUSTOMER_NAME;

    use super::*;
    use crate::event_store::InMemoryEventStore;

    type TestBackend = Backend<Arc<InMemoryEventStore>, Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>>;

    fn backend() -> TestBackend {
        Backend::new(Arc::new(InMemoryEventStore::new()), Arc::new(InMemoryEventBus::new()))
    }

    fn product(b: &TestBackend, t: TenantId, sku: &str, price: Decimal, stock: i64, vat_rate: VatRate) -> ProductId {
        let id = ProductId::new(AggregateId::new());
        b.execute::<Product>(
            t,
            id.0,
            streams::PRODUCT,
            ProductCommand::CreateProduct(CreateProduct {
                tenant_id: t,
                product_id: id,
                sku: sku.to_string(),
                name: format!("Producto {sku}"),
                category: None,
                price,
                cost: Decimal::ZERO,
                stock,
                min_stock: 1,
                description: None,
                vat_rate,
                occurred_at: Utc::now(),
            }),
            |_, id| Product::empty(ProductId::new(id)),
        )
        .unwrap();
        id
    }

    fn request(t: TenantId, customer_id: Option<CustomerId>, lines: &[(ProductId, i64)]) -> CheckoutRequest {
        CheckoutRequest {
            tenant_id: t,
            sale_id: SaleId::new(AggregateId::new()),
            customer_id,
            lines: lines
                .iter()
                .map(|(product_id, quantity)| CheckoutLine {
                    product_id: *product_id,
                    quantity: *quantity,
                })
                .collect(),
            occurred_at: Utc::now(),
        }
    }

    fn stock(b: &TestBackend, t: TenantId, p: ProductId) -> i64 {
        b.read_models().catalog.get(t, &p).unwrap().stock
    }

    fn aggregate_stock(b: &TestBackend, t: TenantId, p: ProductId) -> i64 {
        b.dispatcher()
            .load::<Product>(t, p.0, |_, id| Product::empty(ProductId::new(id)))
            .unwrap()
            .unwrap()
            .stock()
    }

    #[test]
    fn racing_checkouts_sell_the_last_unit_once() {
        for _ in 0..25 {
            let b = backend();
            let t = TenantId::new();
            let glue = product(&b, t, "PEG-1", dec!(12000), 10, VatRate::General);
            let last = product(&b, t, "LLAVE-22", dec!(38000), 1, VatRate::General);

            let outcomes: Vec<_> = std::thread::scope(|scope| {
                let buyers: Vec<_> = (0..2)
                    .map(|_| scope.spawn(|| checkout(&b, request(t, None, &[(glue, 1), (last, 1)]))))
                    .collect();
                buyers.into_iter().map(|h| h.join().unwrap()).collect()
            });

            assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1);
            assert_eq!(b.read_models().sales.list(t).len(), 1);
            // The loser's glue deduction, if any, was put back.
            assert_eq!(aggregate_stock(&b, t, last), 0);
            assert_eq!(aggregate_stock(&b, t, glue), 9);
            assert_eq!(stock(&b, t, last), aggregate_stock(&b, t, last));
            assert_eq!(stock(&b, t, glue), aggregate_stock(&b, t, glue));
        }
    }

    #[test]
    fn checkout_deducts_stock_and_records_totals() {
        let b = backend();
        let t = TenantId::new();
        let hammer = product(&b, t, "MART-001", dec!(45000), 10, VatRate::General);
        let rice = product(&b, t, "ARROZ-1", dec!(25000), 10, VatRate::Reduced);

        let sale = checkout(&b, request(t, None, &[(hammer, 1), (rice, 1)])).unwrap();

        assert_eq!(sale.customer_name, DEFAULT_CUSTOMER_NAME);
        assert_eq!(sale.totals.total, dec!(70000));
        assert_eq!(sale.totals.vat10, dec!(4090.91));
        assert_eq!(sale.totals.vat5, dec!(1190.48));
        assert_eq!(stock(&b, t, hammer), 9);
        assert_eq!(stock(&b, t, rice), 9);
        assert_eq!(b.read_models().sales.list(t).len(), 1);
    }

    #[test]
    fn repeated_lines_are_merged_and_checked_together() {
        let b = backend();
        let t = TenantId::new();
        let p = product(&b, t, "TORN-10", dec!(500), 5, VatRate::General);

        let err = checkout(&b, request(t, None, &[(p, 3), (p, 3)])).unwrap_err();
        assert!(matches!(err, CheckoutError::Cart(DomainError::InvariantViolation(_))));
        assert_eq!(stock(&b, t, p), 5);

        let sale = checkout(&b, request(t, None, &[(p, 2), (p, 3)])).unwrap();
        assert_eq!(sale.items.len(), 1);
        assert_eq!(sale.items[0].quantity, 5);
        assert_eq!(stock(&b, t, p), 0);
    }

    #[test]
    fn zero_quantity_and_unknown_products_are_rejected_up_front() {
        let b = backend();
        let t = TenantId::new();
        let p = product(&b, t, "TORN-10", dec!(500), 5, VatRate::General);

        assert!(matches!(
            checkout(&b, request(t, None, &[(p, 0)])),
            Err(CheckoutError::Cart(DomainError::Validation(_)))
        ));
        let ghost = ProductId::new(AggregateId::new());
        assert!(matches!(
            checkout(&b, request(t, None, &[(p, 1), (ghost, 1)])),
            Err(CheckoutError::UnknownProduct(id)) if id == ghost
        ));
        assert!(matches!(checkout(&b, request(t, None, &[])), Err(CheckoutError::EmptyCart)));
        assert_eq!(stock(&b, t, p), 5);
    }

    #[test]
    fn products_of_another_tenant_are_unknown() {
        let b = backend();
        let (t, other) = (TenantId::new(), TenantId::new());
        let p = product(&b, other, "TORN-10", dec!(500), 5, VatRate::General);
        assert!(matches!(
            checkout(&b, request(t, None, &[(p, 1)])),
            Err(CheckoutError::UnknownProduct(_))
        ));
    }

    #[test]
    fn failed_sale_record_restores_deducted_stock() {
        let b = backend();
        let t = TenantId::new();
        let a = product(&b, t, "A-1", dec!(1000), 4, VatRate::General);
        let c = product(&b, t, "C-1", dec!(2000), 4, VatRate::Reduced);

        let first = checkout(&b, request(t, None, &[(a, 1)])).unwrap();

        // Reusing a sale id makes recording fail after both deductions.
        let mut again = request(t, None, &[(a, 2), (c, 3)]);
        again.sale_id = first.sale_id;
        let err = checkout(&b, again).unwrap_err();
        assert!(matches!(err, CheckoutError::Dispatch(DispatchError::Concurrency(_))));

        assert_eq!(stock(&b, t, a), 3);
        assert_eq!(stock(&b, t, c), 4);
        assert_eq!(b.read_models().sales.list(t).len(), 1);
    }

    #[test]
    fn sold_out_line_refuses_the_whole_cart() {
        let b = backend();
        let t = TenantId::new();
        let a = product(&b, t, "A-1", dec!(1000), 4, VatRate::General);
        let c = product(&b, t, "C-1", dec!(2000), 2, VatRate::General);
        checkout(&b, request(t, None, &[(c, 2)])).unwrap();

        assert!(matches!(
            checkout(&b, request(t, None, &[(a, 2), (c, 1)])),
            Err(CheckoutError::Cart(DomainError::InvariantViolation(_)))
        ));
        assert_eq!(stock(&b, t, a), 4);
        assert_eq!(b.read_models().sales.list(t).len(), 1);
    }

    #[test]
    fn named_customer_is_snapshotted_on_the_sale() {
        let b = backend();
        let t = TenantId::new();
        let p = product(&b, t, "A-1", dec!(1000), 4, VatRate::General);
        let customer_id = CustomerId::new(AggregateId::new());
        b.execute::<Customer>(
            t,
            customer_id.0,
            streams::CUSTOMER,
            CustomerCommand::RegisterCustomer(RegisterCustomer {
                tenant_id: t,
                customer_id,
                name: "Juan Pérez".to_string(),
                contact: ContactInfo::default(),
                document: None,
                occurred_at: Utc::now(),
            }),
            |_, id| Customer::empty(CustomerId::new(id)),
        )
        .unwrap();

        let sale = checkout(&b, request(t, Some(customer_id), &[(p, 1)])).unwrap();
        assert_eq!(sale.customer_id, Some(customer_id));
        assert_eq!(sale.customer_name, "Juan Pérez");

        let stranger = CustomerId::new(AggregateId::new());
        assert!(matches!(
            checkout(&b, request(t, Some(stranger), &[(p, 1)])),
            Err(CheckoutError::UnknownCustomer(_))
        ));
    }
}
