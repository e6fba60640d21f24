use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use ferrepos_auth::Permission;
use ferrepos_core::AggregateId;
use ferrepos_infra::checkout::{self, CheckoutLine, CheckoutRequest};
use ferrepos_parties::CustomerId;
use ferrepos_products::ProductId;
use ferrepos_sales::SaleId;

use crate::app::routes::common::{authorized, parse_id, require};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_sales))
        .route("/checkout", post(checkout_sale))
        .route("/:id", get(get_sale))
}

/// POST /sales/checkout
pub async fn checkout_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CheckoutRequest>,
) -> axum::response::Response {
    let customer_id = match body.customer_id.as_deref().map(|id| parse_id(id, "customer")).transpose() {
        Ok(id) => id.map(CustomerId::new),
        Err(resp) => return resp,
    };
    let mut lines = Vec::with_capacity(body.lines.len());
    for line in &body.lines {
        match parse_id(&line.product_id, "product") {
            Ok(id) => lines.push(CheckoutLine {
                product_id: ProductId::new(id),
                quantity: line.quantity,
            }),
            Err(resp) => return resp,
        }
    }

    let request = CheckoutRequest {
        tenant_id: tenant.tenant_id(),
        sale_id: SaleId::new(AggregateId::new()),
        customer_id,
        lines,
        occurred_at: Utc::now(),
    };
    let request = match authorized(&tenant, &principal, Permission::SALES_WRITE, request) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    match checkout::checkout(services.backend(), request) {
        Ok(sale) => (StatusCode::CREATED, Json(sale)).into_response(),
        Err(e) => errors::checkout_error_to_response(e),
    }
}

/// GET /sales, newest first.
pub async fn list_sales(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = require(&tenant, &principal, Permission::SALES_READ) {
        return resp;
    }
    let items = services.read_models().sales.list(tenant.tenant_id());
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn get_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = require(&tenant, &principal, Permission::SALES_READ) {
        return resp;
    }
    let sale_id = match parse_id(&id, "sale") {
        Ok(id) => SaleId::new(id),
        Err(resp) => return resp,
    };
    match services.read_models().sales.get(tenant.tenant_id(), &sale_id) {
        Some(rm) => (StatusCode::OK, Json(rm)).into_response(),
        None => errors::not_found("sale"),
    }
}
