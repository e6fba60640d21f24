//! Subscription invoices the platform issues to tenants (`/admin/invoices`).

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::Utc;

use ferrepos_auth::Permission;
use ferrepos_billing::{AmendInvoice, InvoiceCommand, InvoiceId, IssueInvoice, MarkInvoicePaid, TenantInvoice};
use ferrepos_core::{AggregateId, TenantId};
use ferrepos_infra::streams;

use crate::app::routes::admin::parse_tenant;
use crate::app::routes::common::{authorized, parse_id, require};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", post(issue_invoice).get(list_invoices))
        .route("/summary", get(invoice_summary))
        .route("/:id", patch(amend_invoice))
        .route("/:id/pay", post(pay_invoice))
}

fn dispatch_invoice(
    services: &AppServices,
    invoice_id: InvoiceId,
    cmd: InvoiceCommand,
) -> Result<(), axum::response::Response> {
    services
        .dispatch::<TenantInvoice>(TenantId::platform(), invoice_id.0, streams::TENANT_INVOICE, cmd, |_, id| {
            TenantInvoice::empty(InvoiceId::new(id))
        })
        .map(|_| ())
        .map_err(errors::dispatch_error_to_response)
}

fn invoice_response(services: &AppServices, invoice_id: InvoiceId, status: StatusCode) -> axum::response::Response {
    match services.read_models().invoices.get(&invoice_id) {
        Some(rm) => (status, Json(rm)).into_response(),
        None => errors::not_found("invoice"),
    }
}

/// GET /admin/invoices?tenant_id=
pub async fn list_invoices(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::InvoiceListQuery>,
) -> axum::response::Response {
    if let Err(resp) = require(&tenant, &principal, Permission::ADMIN_BILLING) {
        return resp;
    }
    let billed = match query.tenant_id.as_deref().map(parse_tenant).transpose() {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    let items = services.read_models().invoices.list(billed);
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

/// GET /admin/invoices/summary?tenant_id=
pub async fn invoice_summary(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::InvoiceListQuery>,
) -> axum::response::Response {
    if let Err(resp) = require(&tenant, &principal, Permission::ADMIN_BILLING) {
        return resp;
    }
    let billed = match query.tenant_id.as_deref().map(parse_tenant).transpose() {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    (StatusCode::OK, Json(services.read_models().invoices.summary(billed))).into_response()
}

/// POST /admin/invoices `{tenant_id}`: bills the tenant's current plan.
pub async fn issue_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::IssueInvoiceRequest>,
) -> axum::response::Response {
    if let Err(resp) = require(&tenant, &principal, Permission::ADMIN_BILLING) {
        return resp;
    }
    let billed = match parse_tenant(&body.tenant_id) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    let Some(account) = services.read_models().tenants.get(billed) else {
        return errors::not_found("tenant");
    };

    let invoice_id = InvoiceId::new(AggregateId::new());
    let cmd = InvoiceCommand::IssueInvoice(IssueInvoice {
        tenant_id: TenantId::platform(),
        invoice_id,
        billed_tenant_id: billed,
        tenant_name: account.name,
        plan: account.plan,
        occurred_at: Utc::now(),
    });

    if let Err(resp) = dispatch_invoice(&services, invoice_id, cmd) {
        return resp;
    }
    tracing::info!(invoice_id = %invoice_id, tenant_id = %billed, "invoice issued");
    invoice_response(&services, invoice_id, StatusCode::CREATED)
}

/// POST /admin/invoices/:id/pay
pub async fn pay_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let invoice_id = match parse_id(&id, "invoice") {
        Ok(id) => InvoiceId::new(id),
        Err(resp) => return resp,
    };
    let cmd = InvoiceCommand::MarkInvoicePaid(MarkInvoicePaid {
        tenant_id: TenantId::platform(),
        invoice_id,
        occurred_at: Utc::now(),
    });
    let cmd = match authorized(&tenant, &principal, Permission::ADMIN_BILLING, cmd) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    if services.read_models().invoices.get(&invoice_id).is_none() {
        return errors::not_found("invoice");
    }

    if let Err(resp) = dispatch_invoice(&services, invoice_id, cmd) {
        return resp;
    }
    invoice_response(&services, invoice_id, StatusCode::OK)
}

/// PATCH /admin/invoices/:id `{amount?, due_date?, status?}`
pub async fn amend_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AmendInvoiceRequest>,
) -> axum::response::Response {
    let invoice_id = match parse_id(&id, "invoice") {
        Ok(id) => InvoiceId::new(id),
        Err(resp) => return resp,
    };
    let cmd = InvoiceCommand::AmendInvoice(AmendInvoice {
        tenant_id: TenantId::platform(),
        invoice_id,
        amount: body.amount,
        due_date: body.due_date,
        status: body.status,
        occurred_at: Utc::now(),
    });
    let cmd = match authorized(&tenant, &principal, Permission::ADMIN_BILLING, cmd) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    if services.read_models().invoices.get(&invoice_id).is_none() {
        return errors::not_found("invoice");
    }

    if let Err(resp) = dispatch_invoice(&services, invoice_id, cmd) {
        return resp;
    }
    invoice_response(&services, invoice_id, StatusCode::OK)
}
