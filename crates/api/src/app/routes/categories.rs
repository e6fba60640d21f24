use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chrono::Utc;

use ferrepos_auth::Permission;
use ferrepos_core::AggregateId;
use ferrepos_infra::streams;
use ferrepos_products::{Category, CategoryCommand, CategoryId, CreateCategory};

use crate::app::routes::common::{authorized, require};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new().route("/", post(create_category).get(list_categories))
}

/// POST /categories. Names are unique per store, ignoring case.
pub async fn create_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateCategoryRequest>,
) -> axum::response::Response {
    let tenant_id = tenant.tenant_id();
    let category_id = CategoryId::new(AggregateId::new());
    let cmd = CategoryCommand::CreateCategory(CreateCategory {
        tenant_id,
        category_id,
        name: body.name.clone(),
        occurred_at: Utc::now(),
    });
    let cmd = match authorized(&tenant, &principal, Permission::CATALOG_WRITE, cmd) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let result = services.exclusive(|| {
        if services.read_models().categories.find_by_name(tenant_id, &body.name).is_some() {
            return Err(errors::json_error(
                StatusCode::CONFLICT,
                "duplicate_category",
                format!("category '{}' already exists", body.name.trim()),
            ));
        }
        services
            .dispatch::<Category>(tenant_id, category_id.0, streams::CATEGORY, cmd, |_, id| {
                Category::empty(CategoryId::new(id))
            })
            .map_err(errors::dispatch_error_to_response)
    });
    if let Err(resp) = result {
        return resp;
    }

    match services.read_models().categories.list(tenant_id).into_iter().find(|c| c.category_id == category_id) {
        Some(rm) => (StatusCode::CREATED, Json(rm)).into_response(),
        None => errors::not_found("category"),
    }
}

pub async fn list_categories(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = require(&tenant, &principal, Permission::CATALOG_READ) {
        return resp;
    }
    let items = services.read_models().categories.list(tenant.tenant_id());
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}
