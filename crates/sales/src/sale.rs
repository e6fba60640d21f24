use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ferrepos_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use ferrepos_events::Event;
use ferrepos_fiscal::{CartLine, SaleTotals, VatRate, compute_totals};
use ferrepos_parties::CustomerId;
use ferrepos_products::ProductId;

/// Name recorded when the sale has no registered customer.
pub const DEFAULT_CUSTOMER_NAME: &str = "Cliente General";

/// Sale identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SaleId(pub AggregateId);

impl SaleId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for SaleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Snapshot of a sold product at the moment of sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleItem {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    /// Tax-inclusive unit price.
    pub unit_price: Decimal,
    pub quantity: i64,
    pub vat_rate: VatRate,
}

impl SaleItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }

    pub fn to_cart_line(&self) -> CartLine {
        CartLine::new(self.unit_price, self.quantity, self.vat_rate)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRef {
    pub customer_id: CustomerId,
    pub name: String,
}

/// Aggregate root: Sale. Written once at checkout and never modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sale {
    id: SaleId,
    tenant_id: Option<TenantId>,
    customer_id: Option<CustomerId>,
    customer_name: String,
    items: Vec<SaleItem>,
    totals: SaleTotals,
    completed_at: Option<DateTime<Utc>>,
    version: u64,
}

impl Sale {
    pub fn empty(id: SaleId) -> Self {
        Self {
            id,
            tenant_id: None,
            customer_id: None,
            customer_name: String::new(),
            items: Vec::new(),
            totals: SaleTotals::zero(),
            completed_at: None,
            version: 0,
        }
    }

    pub fn id_typed(&self) -> SaleId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn customer_id(&self) -> Option<CustomerId> {
        self.customer_id
    }

    pub fn customer_name(&self) -> &str {
        &self.customer_name
    }

    pub fn items(&self) -> &[SaleItem] {
        &self.items
    }

    pub fn totals(&self) -> &SaleTotals {
        &self.totals
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

impl AggregateRoot for Sale {
    type Id = SaleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CompleteSale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteSale {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub customer: Option<CustomerRef>,
    pub items: Vec<SaleItem>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleCommand {
    CompleteSale(CompleteSale),
}

/// Event: SaleCompleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleCompleted {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub customer_id: Option<CustomerId>,
    pub customer_name: String,
    pub items: Vec<SaleItem>,
    pub totals: SaleTotals,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleEvent {
    SaleCompleted(SaleCompleted),
}

impl Event for SaleEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SaleEvent::SaleCompleted(_) => "sales.sale.completed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SaleEvent::SaleCompleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Sale {
    type Command = SaleCommand;
    type Event = SaleEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SaleEvent::SaleCompleted(e) => {
                self.id = e.sale_id;
                self.tenant_id = Some(e.tenant_id);
                self.customer_id = e.customer_id;
                self.customer_name = e.customer_name.clone();
                self.items = e.items.clone();
                self.totals = e.totals.clone();
                self.completed_at = Some(e.occurred_at);
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SaleCommand::CompleteSale(cmd) => self.handle_complete(cmd),
        }
    }
}

impl Sale {
    fn handle_complete(&self, cmd: &CompleteSale) -> Result<Vec<SaleEvent>, DomainError> {
        if self.is_completed() {
            return Err(DomainError::conflict("sale already recorded"));
        }
        if self.id != cmd.sale_id {
            return Err(DomainError::invariant("sale_id mismatch"));
        }
        if cmd.items.is_empty() {
            return Err(DomainError::validation("a sale needs at least one item"));
        }

        let lines: Vec<CartLine> = cmd.items.iter().map(SaleItem::to_cart_line).collect();
        let totals = compute_totals(&lines).map_err(|e| DomainError::validation(e.to_string()))?;

        let (customer_id, customer_name) = match &cmd.customer {
            Some(c) => (Some(c.customer_id), c.name.clone()),
            None => (None, DEFAULT_CUSTOMER_NAME.to_string()),
        };

        Ok(vec![SaleEvent::SaleCompleted(SaleCompleted {
            tenant_id: cmd.tenant_id,
            sale_id: cmd.sale_id,
            customer_id,
            customer_name,
            items: cmd.items.clone(),
            totals,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(name: &str, price: Decimal, quantity: i64, vat_rate: VatRate) -> SaleItem {
        SaleItem {
            product_id: ProductId::new(AggregateId::new()),
            sku: name.to_uppercase(),
            name: name.to_string(),
            unit_price: price,
            quantity,
            vat_rate,
        }
    }

    fn complete(sale_id: SaleId, items: Vec<SaleItem>, customer: Option<CustomerRef>) -> SaleCommand {
        SaleCommand::CompleteSale(CompleteSale {
            tenant_id: TenantId::new(),
            sale_id,
            customer,
            items,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn completed_sale_carries_totals_and_default_customer() {
        let sale_id = SaleId::new(AggregateId::new());
        let mut sale = Sale::empty(sale_id);
        let cmd = complete(
            sale_id,
            vec![
                item("semillas", dec!(25000), 1, VatRate::Reduced),
                item("martillo", dec!(45000), 1, VatRate::General),
            ],
            None,
        );

        for e in sale.handle(&cmd).unwrap() {
            sale.apply(&e);
        }

        assert!(sale.is_completed());
        assert_eq!(sale.customer_name(), DEFAULT_CUSTOMER_NAME);
        assert_eq!(sale.customer_id(), None);
        assert_eq!(sale.totals().total, dec!(70000));
        assert_eq!(sale.totals().vat10, dec!(4090.91));
        assert_eq!(sale.totals().vat5, dec!(1190.48));
        assert_eq!(sale.version(), 1);
    }

    #[test]
    fn named_customer_is_snapshotted() {
        let sale_id = SaleId::new(AggregateId::new());
        let customer_id = CustomerId::new(AggregateId::new());
        let events = Sale::empty(sale_id)
            .handle(&complete(
                sale_id,
                vec![item("cable", dec!(8500), 10, VatRate::General)],
                Some(CustomerRef {
                    customer_id,
                    name: "Juan Pérez".to_string(),
                }),
            ))
            .unwrap();
        match &events[0] {
            SaleEvent::SaleCompleted(e) => {
                assert_eq!(e.customer_id, Some(customer_id));
                assert_eq!(e.customer_name, "Juan Pérez");
                assert_eq!(e.items[0].line_total(), dec!(85000));
            }
        }
    }

    #[test]
    fn empty_sale_is_rejected() {
        let sale_id = SaleId::new(AggregateId::new());
        let err = Sale::empty(sale_id).handle(&complete(sale_id, vec![], None)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn invalid_line_is_rejected() {
        let sale_id = SaleId::new(AggregateId::new());
        let err = Sale::empty(sale_id)
            .handle(&complete(sale_id, vec![item("x", dec!(10), 0, VatRate::General)], None))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn sale_cannot_be_recorded_twice() {
        let sale_id = SaleId::new(AggregateId::new());
        let mut sale = Sale::empty(sale_id);
        let cmd = complete(sale_id, vec![item("x", dec!(10), 1, VatRate::General)], None);
        for e in sale.handle(&cmd).unwrap() {
            sale.apply(&e);
        }
        assert!(matches!(sale.handle(&cmd), Err(DomainError::Conflict(_))));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 1000,
                ..ProptestConfig::default()
            })]

            #[test]
            fn recorded_total_matches_items(
                lines in proptest::collection::vec((0i64..5_000_000, 1i64..50, any::<bool>()), 1..10)
            ) {
                let sale_id = SaleId::new(AggregateId::new());
                let items: Vec<SaleItem> = lines
                    .iter()
                    .map(|(price, qty, reduced)| {
                        let rate = if *reduced { VatRate::Reduced } else { VatRate::General };
                        item("p", Decimal::from(*price), *qty, rate)
                    })
                    .collect();
                let expected: Decimal = items.iter().map(SaleItem::line_total).sum();

                let sale = Sale::empty(sale_id);
                let cmd = complete(sale_id, items, None);
                let first = sale.handle(&cmd).unwrap();
                let second = sale.handle(&cmd).unwrap();
                prop_assert_eq!(&first, &second);

                match &first[0] {
                    SaleEvent::SaleCompleted(e) => {
                        prop_assert_eq!(e.totals.total, expected);
                        prop_assert_eq!(e.totals.subtotal + e.totals.vat10 + e.totals.vat5, expected);
                    }
                }
            }
        }
    }
}
