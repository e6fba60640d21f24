//! Aggregate type names. They tag every stored event and route envelopes to
//! projections, so they must never change once events exist.

pub const PRODUCT: &str = "products.product";
pub const CATEGORY: &str = "products.category";
pub const CUSTOMER: &str = "parties.customer";
pub const SALE: &str = "sales.sale";
pub const TENANT_ACCOUNT: &str = "billing.tenant";
pub const TENANT_INVOICE: &str = "billing.invoice";
