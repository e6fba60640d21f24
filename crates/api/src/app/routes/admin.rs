//! Platform operator routes: tenant directory, plan changes and activation.
//!
//! Only principals holding the `superadmin` role reach these handlers.

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
use ferrepos_billing::{
    ActivateTenant, ChangePlan, DeactivateTenant, SUBSCRIPTION_PLANS, TenantAccount, TenantAccountCommand,
};
use ferrepos_core::{AggregateId, TenantId};
use ferrepos_infra::streams;

use crate::app::routes::common::{authorized, require};
use crate::app::routes::invoices;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/plans", get(list_plans))
        .route("/tenants", get(list_tenants))
        .route("/tenants/:id/activate", post(activate_tenant))
        .route("/tenants/:id/deactivate", post(deactivate_tenant))
        .route("/tenants/:id/plan", patch(change_plan))
        .nest("/invoices", invoices::router())
}

pub(crate) fn parse_tenant(raw: &str) -> Result<TenantId, axum::response::Response> {
    raw.parse::<TenantId>()
        .ok()
        .filter(|t| !t.is_platform())
        .ok_or_else(|| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid tenant id"))
}

fn tenant_response(services: &AppServices, tenant_id: TenantId) -> axum::response::Response {
    match services.read_models().tenants.get(tenant_id) {
        Some(rm) => (StatusCode::OK, Json(rm)).into_response(),
        None => errors::not_found("tenant"),
    }
}

/// Account commands are dispatched into the account's own partition.
fn dispatch_account(
    services: &AppServices,
    tenant_id: TenantId,
    cmd: TenantAccountCommand,
) -> Result<(), axum::response::Response> {
    if services.read_models().tenants.get(tenant_id).is_none() {
        return Err(errors::not_found("tenant"));
    }
    services
        .dispatch::<TenantAccount>(
            tenant_id,
            AggregateId::from(tenant_id),
            streams::TENANT_ACCOUNT,
            cmd,
            |_, _| TenantAccount::empty(tenant_id),
        )
        .map(|_| ())
        .map_err(errors::dispatch_error_to_response)
}

/// GET /admin/plans
pub async fn list_plans(
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = require(&tenant, &principal, Permission::ADMIN_BILLING) {
        return resp;
    }
    (StatusCode::OK, Json(serde_json::json!({ "items": &SUBSCRIPTION_PLANS[..] }))).into_response()
}

/// GET /admin/tenants?q=
pub async fn list_tenants(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::TenantSearchQuery>,
) -> axum::response::Response {
    if let Err(resp) = require(&tenant, &principal, Permission::ADMIN_TENANTS) {
        return resp;
    }
    let items = services.read_models().tenants.search(query.q.as_deref());
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn activate_tenant(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let target = match parse_tenant(&id) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    let cmd = TenantAccountCommand::ActivateTenant(ActivateTenant {
        tenant_id: target,
        occurred_at: Utc::now(),
    });
    let cmd = match authorized(&tenant, &principal, Permission::ADMIN_TENANTS, cmd) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    if let Err(resp) = dispatch_account(&services, target, cmd) {
        return resp;
    }
    tracing::info!(tenant_id = %target, operator = principal.name(), "tenant activated");
    tenant_response(&services, target)
}

pub async fn deactivate_tenant(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let target = match parse_tenant(&id) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    let cmd = TenantAccountCommand::DeactivateTenant(DeactivateTenant {
        tenant_id: target,
        occurred_at: Utc::now(),
    });
    let cmd = match authorized(&tenant, &principal, Permission::ADMIN_TENANTS, cmd) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    if let Err(resp) = dispatch_account(&services, target, cmd) {
        return resp;
    }
    tracing::info!(tenant_id = %target, operator = principal.name(), "tenant deactivated");
    tenant_response(&services, target)
}

/// PATCH /admin/tenants/:id/plan `{plan}`
pub async fn change_plan(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ChangePlanRequest>,
) -> axum::response::Response {
    let target = match parse_tenant(&id) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    let cmd = TenantAccountCommand::ChangePlan(ChangePlan {
        tenant_id: target,
        plan: body.plan,
        occurred_at: Utc::now(),
    });
    let cmd = match authorized(&tenant, &principal, Permission::ADMIN_BILLING, cmd) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    if let Err(resp) = dispatch_account(&services, target, cmd) {
        return resp;
    }
    tracing::info!(tenant_id = %target, plan = %body.plan, "tenant plan changed");
    tenant_response(&services, target)
}
