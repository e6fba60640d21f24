//! Stateless fiscal helpers for the point of sale.

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use ferrepos_auth::Permission;
use ferrepos_fiscal::{FiscalError, Ruc, compute_totals};

use crate::app::routes::common::require;
use crate::app::{dto, errors};
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/ruc/:base", get(ruc_preview))
        .route("/totals", post(totals))
}

fn fiscal_error_to_response(err: FiscalError) -> axum::response::Response {
    errors::json_error(StatusCode::BAD_REQUEST, "fiscal_error", err.to_string())
}

/// GET /fiscal/ruc/:base: live check-digit preview while typing.
pub async fn ruc_preview(
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(base): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = require(&tenant, &principal, Permission::FISCAL_READ) {
        return resp;
    }
    match Ruc::from_base(&base) {
        Ok(ruc) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "digits": ruc.base(),
                "check_digit": ruc.check_digit(),
                "formatted": ruc.to_string(),
            })),
        )
            .into_response(),
        Err(e) => fiscal_error_to_response(e),
    }
}

/// POST /fiscal/totals
pub async fn totals(
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::TotalsRequest>,
) -> axum::response::Response {
    if let Err(resp) = require(&tenant, &principal, Permission::FISCAL_READ) {
        return resp;
    }
    match compute_totals(&body.lines) {
        Ok(totals) => (StatusCode::OK, Json(totals)).into_response(),
        Err(e) => fiscal_error_to_response(e),
    }
}
