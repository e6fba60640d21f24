use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use ferrepos_ai::SalesAnalysisJob;
use ferrepos_auth::Permission;
use ferrepos_infra::reports::DashboardReport;

use crate::app::errors;
use crate::app::routes::common::require;
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(dashboard))
        .route("/insights", post(insights))
}

/// GET /dashboard
pub async fn dashboard(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = require(&tenant, &principal, Permission::REPORTS_READ) {
        return resp;
    }
    let report = DashboardReport::build(services.read_models(), tenant.tenant_id(), Utc::now());
    (StatusCode::OK, Json(report)).into_response()
}

/// POST /dashboard/insights: AI commentary on the current figures.
pub async fn insights(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = require(&tenant, &principal, Permission::AI_USE) {
        return resp;
    }
    let tenant_id = tenant.tenant_id();
    let report = DashboardReport::build(services.read_models(), tenant_id, Utc::now());
    let job = SalesAnalysisJob::new(tenant_id, report.to_summary());

    let scheduler = services.ai().clone();
    match tokio::task::spawn_blocking(move || scheduler.run(&job)).await {
        Ok(Ok(result)) => (StatusCode::OK, Json(result)).into_response(),
        Ok(Err(e)) => errors::json_error(StatusCode::BAD_REQUEST, "ai_error", e.to_string()),
        Err(e) => errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "ai_error", e.to_string()),
    }
}
