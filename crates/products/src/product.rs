use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ferrepos_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use ferrepos_events::Event;
use ferrepos_fiscal::VatRate;

/// Product identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub AggregateId);

impl ProductId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Catalog entry plus on-hand stock.
///
/// `price` is the shelf price with IVA included; `stock` never drops below zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    tenant_id: Option<TenantId>,
    sku: String,
    name: String,
    category: Option<String>,
    price: Decimal,
    cost: Decimal,
    stock: i64,
    min_stock: i64,
    description: Option<String>,
    vat_rate: VatRate,
    version: u64,
    created: bool,
    removed: bool,
}

impl Product {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            tenant_id: None,
            sku: String::new(),
            name: String::new(),
            category: None,
            price: Decimal::ZERO,
            cost: Decimal::ZERO,
            stock: 0,
            min_stock: 0,
            description: None,
            vat_rate: VatRate::General,
            version: 0,
            created: false,
            removed: false,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn cost(&self) -> Decimal {
        self.cost
    }

    pub fn stock(&self) -> i64 {
        self.stock
    }

    pub fn min_stock(&self) -> i64 {
        self.min_stock
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn vat_rate(&self) -> VatRate {
        self.vat_rate
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    /// At or below the reorder threshold.
    pub fn is_low_stock(&self) -> bool {
        self.stock <= self.min_stock
    }

    /// Whether `quantity` units can be sold right now.
    pub fn can_sell(&self, quantity: i64) -> bool {
        self.created && !self.removed && quantity >= 1 && quantity <= self.stock
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub tenant_id: TenantId,
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
    pub occurred_at: DateTime<Utc>,
}

/// Partial update of catalog fields. `None` leaves a field untouched.
///
/// Stock is not editable here; it only moves through [`AdjustStock`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductChanges {
    pub sku: Option<String>,
    pub name: Option<String>,
    /// `Some("")` clears the category.
    pub category: Option<String>,
    pub price: Option<Decimal>,
    pub cost: Option<Decimal>,
    pub min_stock: Option<i64>,
    /// `Some("")` clears the description.
    pub description: Option<String>,
    pub vat_rate: Option<VatRate>,
}

impl ProductChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Command: UpdateProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProduct {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub changes: ProductChanges,
    pub occurred_at: DateTime<Utc>,
}

/// Why stock moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StockReason {
    /// Manual correction or a received delivery.
    Manual,
    /// Units sold at checkout.
    Sale { sale_id: AggregateId },
    /// Units returned because a checkout could not complete.
    SaleReversal { sale_id: AggregateId },
}

/// Command: AdjustStock. Negative deltas take units off the shelf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStock {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub delta: i64,
    pub reason: StockReason,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveProduct {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductCommand {
    CreateProduct(CreateProduct),
    UpdateProduct(UpdateProduct),
    AdjustStock(AdjustStock),
    RemoveProduct(RemoveProduct),
}

/// Event: ProductCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCreated {
    pub tenant_id: TenantId,
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
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductUpdated. Carries the normalized changes that were accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUpdated {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub changes: ProductChanges,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockAdjusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjusted {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub delta: i64,
    /// On-hand quantity after this movement.
    pub stock_after: i64,
    pub reason: StockReason,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRemoved {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    ProductCreated(ProductCreated),
    ProductUpdated(ProductUpdated),
    StockAdjusted(StockAdjusted),
    ProductRemoved(ProductRemoved),
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductCreated(_) => "products.product.created",
            ProductEvent::ProductUpdated(_) => "products.product.updated",
            ProductEvent::StockAdjusted(_) => "products.product.stock_adjusted",
            ProductEvent::ProductRemoved(_) => "products.product.removed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductCreated(e) => e.occurred_at,
            ProductEvent::ProductUpdated(e) => e.occurred_at,
            ProductEvent::StockAdjusted(e) => e.occurred_at,
            ProductEvent::ProductRemoved(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Product {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::ProductCreated(e) => {
                self.id = e.product_id;
                self.tenant_id = Some(e.tenant_id);
                self.sku = e.sku.clone();
                self.name = e.name.clone();
                self.category = e.category.clone();
                self.price = e.price;
                self.cost = e.cost;
                self.stock = e.stock;
                self.min_stock = e.min_stock;
                self.description = e.description.clone();
                self.vat_rate = e.vat_rate;
                self.created = true;
            }
            ProductEvent::ProductUpdated(e) => {
                let c = &e.changes;
                if let Some(sku) = &c.sku {
                    self.sku = sku.clone();
                }
                if let Some(name) = &c.name {
                    self.name = name.clone();
                }
                if let Some(category) = &c.category {
                    self.category = non_blank(category);
                }
                if let Some(price) = c.price {
                    self.price = price;
                }
                if let Some(cost) = c.cost {
                    self.cost = cost;
                }
                if let Some(min_stock) = c.min_stock {
                    self.min_stock = min_stock;
                }
                if let Some(description) = &c.description {
                    self.description = non_blank(description);
                }
                if let Some(vat_rate) = c.vat_rate {
                    self.vat_rate = vat_rate;
                }
            }
            ProductEvent::StockAdjusted(e) => {
                self.stock = e.stock_after;
            }
            ProductEvent::ProductRemoved(_) => {
                self.removed = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::CreateProduct(cmd) => self.handle_create(cmd),
            ProductCommand::UpdateProduct(cmd) => self.handle_update(cmd),
            ProductCommand::AdjustStock(cmd) => self.handle_adjust_stock(cmd),
            ProductCommand::RemoveProduct(cmd) => self.handle_remove(cmd),
        }
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn validate_money(field: &str, value: Decimal) -> Result<(), DomainError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(DomainError::validation(format!("{field} cannot be negative")));
    }
    Ok(())
}

impl Product {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_product_id(&self, product_id: ProductId) -> Result<(), DomainError> {
        if self.id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    /// Common preconditions for every command on an existing product.
    fn ensure_live(&self, tenant_id: TenantId, product_id: ProductId) -> Result<(), DomainError> {
        if !self.created || self.removed {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(tenant_id)?;
        self.ensure_product_id(product_id)
    }

    fn handle_create(&self, cmd: &CreateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("product already exists"));
        }
        self.ensure_product_id(cmd.product_id)?;

        let name = cmd.name.trim();
        let sku = cmd.sku.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if sku.is_empty() {
            return Err(DomainError::validation("SKU cannot be empty"));
        }
        validate_money("price", cmd.price)?;
        validate_money("cost", cmd.cost)?;
        if cmd.stock < 0 {
            return Err(DomainError::validation("initial stock cannot be negative"));
        }
        if cmd.min_stock < 0 {
            return Err(DomainError::validation("minimum stock cannot be negative"));
        }

        // SKU uniqueness per tenant is checked against the catalog read model
        // before dispatch; a single stream cannot see its siblings.

        Ok(vec![ProductEvent::ProductCreated(ProductCreated {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            sku: sku.to_string(),
            name: name.to_string(),
            category: cmd.category.as_deref().and_then(non_blank),
            price: cmd.price,
            cost: cmd.cost,
            stock: cmd.stock,
            min_stock: cmd.min_stock,
            description: cmd.description.as_deref().and_then(non_blank),
            vat_rate: cmd.vat_rate,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_live(cmd.tenant_id, cmd.product_id)?;

        let c = &cmd.changes;
        if c.is_empty() {
            return Err(DomainError::validation("no changes supplied"));
        }

        let mut accepted = c.clone();
        if let Some(name) = &c.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(DomainError::validation("name cannot be empty"));
            }
            accepted.name = Some(name.to_string());
        }
        if let Some(sku) = &c.sku {
            let sku = sku.trim();
            if sku.is_empty() {
                return Err(DomainError::validation("SKU cannot be empty"));
            }
            accepted.sku = Some(sku.to_string());
        }
        if let Some(price) = c.price {
            validate_money("price", price)?;
        }
        if let Some(cost) = c.cost {
            validate_money("cost", cost)?;
        }
        if matches!(c.min_stock, Some(m) if m < 0) {
            return Err(DomainError::validation("minimum stock cannot be negative"));
        }
        accepted.category = c.category.as_ref().map(|s| s.trim().to_string());
        accepted.description = c.description.as_ref().map(|s| s.trim().to_string());

        Ok(vec![ProductEvent::ProductUpdated(ProductUpdated {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            changes: accepted,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_adjust_stock(&self, cmd: &AdjustStock) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_live(cmd.tenant_id, cmd.product_id)?;

        if cmd.delta == 0 {
            return Err(DomainError::validation("delta cannot be zero"));
        }
        match cmd.reason {
            StockReason::Sale { .. } if cmd.delta > 0 => {
                return Err(DomainError::validation("a sale can only take stock out"));
            }
            StockReason::SaleReversal { .. } if cmd.delta < 0 => {
                return Err(DomainError::validation("a sale reversal can only put stock back"));
            }
            _ => {}
        }

        let stock_after = self
            .stock
            .checked_add(cmd.delta)
            .ok_or_else(|| DomainError::validation("stock adjustment overflows"))?;
        if stock_after < 0 {
            return Err(DomainError::invariant(format!(
                "insufficient stock for '{}': {} on hand, {} requested",
                self.name,
                self.stock,
                -cmd.delta
            )));
        }

        Ok(vec![ProductEvent::StockAdjusted(StockAdjusted {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            delta: cmd.delta,
            stock_after,
            reason: cmd.reason,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove(&self, cmd: &RemoveProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_live(cmd.tenant_id, cmd.product_id)?;

        Ok(vec![ProductEvent::ProductRemoved(ProductRemoved {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
