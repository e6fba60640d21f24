use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use ferrepos_billing::{InvoiceStatus, PlanId};
use ferrepos_fiscal::{CartLine, VatRate};

// -------------------------
// Auth
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub plan: PlanId,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

// -------------------------
// Catalog
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
}

fn default_vat_rate() -> VatRate {
    VatRate::General
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub sku: String,
    pub name: String,
    pub category: Option<String>,
    /// Tax-inclusive.
    pub price: Decimal,
    #[serde(default)]
    pub cost: Decimal,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub min_stock: i64,
    pub description: Option<String>,
    #[serde(default = "default_vat_rate")]
    pub vat_rate: VatRate,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductRequest {
    pub sku: Option<String>,
    pub name: Option<String>,
    pub category: Option<String>,
    pub price: Option<Decimal>,
    pub cost: Option<Decimal>,
    pub min_stock: Option<i64>,
    pub description: Option<String>,
    pub vat_rate: Option<VatRate>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub delta: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductListQuery {
    pub q: Option<String>,
    #[serde(default)]
    pub low_stock: bool,
}

// -------------------------
// Customers
// -------------------------

#[derive(Debug, Deserialize)]
pub struct DocumentRequest {
    /// `ci`, `ruc`, `pas` or `ext`.
    pub kind: ferrepos_parties::DocumentKind,
    pub number: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterCustomerRequest {
    pub name: String,
    #[serde(default)]
    pub contact: ferrepos_parties::ContactInfo,
    pub document: Option<DocumentRequest>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCustomerRequest {
    pub name: Option<String>,
    pub contact: Option<ferrepos_parties::ContactInfo>,
    pub document: Option<DocumentRequest>,
}

// -------------------------
// Fiscal & sales
// -------------------------

#[derive(Debug, Deserialize)]
pub struct TotalsRequest {
    pub lines: Vec<CartLine>,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutLineRequest {
    pub product_id: String,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub customer_id: Option<String>,
    pub lines: Vec<CheckoutLineRequest>,
}

// -------------------------
// Admin
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct TenantSearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePlanRequest {
    pub plan: PlanId,
}

#[derive(Debug, Default, Deserialize)]
pub struct InvoiceListQuery {
    pub tenant_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IssueInvoiceRequest {
    pub tenant_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct AmendInvoiceRequest {
    pub amount: Option<Decimal>,
    pub due_date: Option<DateTime<Utc>>,
    pub status: Option<InvoiceStatus>,
}
