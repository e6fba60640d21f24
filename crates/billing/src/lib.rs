//! SaaS billing domain: subscription plans, tenant accounts and the invoices
//! the platform issues to tenants (event-sourced, no IO).

pub mod invoice;
pub mod plan;
pub mod tenant;

pub use invoice::{
    AmendInvoice, INVOICE_DUE_DAYS, InvoiceAmended, InvoiceCommand, InvoiceEvent, InvoiceId,
    InvoiceIssued, InvoicePaid, InvoiceStatus, IssueInvoice, MarkInvoicePaid, TenantInvoice,
};
pub use plan::{PlanId, SUBSCRIPTION_PLANS, SubscriptionPlan};
pub use tenant::{
    ActivateTenant, ChangePlan, DeactivateTenant, RegisterTenant, TenantAccount,
    TenantAccountCommand, TenantAccountEvent, TenantActivated, TenantDeactivated,
    TenantPlanChanged, TenantRegistered,
};
