use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use ferrepos_ai::ProductDescriptionJob;
use ferrepos_auth::Permission;
use ferrepos_core::{AggregateId, TenantId};
use ferrepos_infra::projections::CatalogQuery;
use ferrepos_infra::streams;
use ferrepos_products::{
    AdjustStock, CreateProduct, Product, ProductChanges, ProductCommand, ProductId, RemoveProduct,
    StockReason, UpdateProduct,
};

use crate::app::routes::common::{authorized, parse_id, require};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{PrincipalContext, TenantContext};

/// Category handed to the description prompt when the product has none.
const UNCATEGORIZED: &str = "General";

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_product).get(list_products))
        .route("/:id", get(get_product).patch(update_product).delete(remove_product))
        .route("/:id/stock", post(adjust_stock))
        .route("/:id/describe", post(describe_product))
}

fn dispatch_product(
    services: &AppServices,
    tenant_id: TenantId,
    product_id: ProductId,
    cmd: ProductCommand,
) -> Result<(), axum::response::Response> {
    services
        .dispatch::<Product>(tenant_id, product_id.0, streams::PRODUCT, cmd, |_, id| {
            Product::empty(ProductId::new(id))
        })
        .map(|_| ())
        .map_err(errors::dispatch_error_to_response)
}

fn sku_taken(services: &AppServices, tenant_id: TenantId, sku: &str, except: Option<ProductId>) -> bool {
    services
        .read_models()
        .catalog
        .find_by_sku(tenant_id, sku)
        .is_some_and(|p| Some(p.product_id) != except)
}

fn product_response(services: &AppServices, tenant_id: TenantId, product_id: ProductId, status: StatusCode) -> axum::response::Response {
    match services.read_models().catalog.get(tenant_id, &product_id) {
        Some(rm) => (status, Json(rm)).into_response(),
        None => errors::not_found("product"),
    }
}

/// POST /products
///
/// Enforces the plan's product limit and SKU uniqueness.
pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateProductRequest>,
) -> axum::response::Response {
    let tenant_id = tenant.tenant_id();
    let product_id = ProductId::new(AggregateId::new());
    let sku = body.sku.clone();

    let cmd = ProductCommand::CreateProduct(CreateProduct {
        tenant_id,
        product_id,
        sku: body.sku,
        name: body.name,
        category: body.category,
        price: body.price,
        cost: body.cost,
        stock: body.stock,
        min_stock: body.min_stock,
        description: body.description,
        vat_rate: body.vat_rate,
        occurred_at: Utc::now(),
    });
    let cmd = match authorized(&tenant, &principal, Permission::CATALOG_WRITE, cmd) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let result = services.exclusive(|| {
        let read_models = services.read_models();
        if let Some(account) = read_models.tenants.get(tenant_id) {
            let plan = account.plan.plan();
            if read_models.catalog.count(tenant_id) >= plan.max_products {
                return Err(errors::json_error(
                    StatusCode::FORBIDDEN,
                    "plan_limit_reached",
                    format!("{} allows up to {} products", plan.name, plan.max_products),
                ));
            }
        }
        if sku_taken(&services, tenant_id, &sku, None) {
            return Err(errors::json_error(
                StatusCode::CONFLICT,
                "duplicate_sku",
                format!("SKU '{}' is already in use", sku.trim()),
            ));
        }
        dispatch_product(&services, tenant_id, product_id, cmd)
    });
    if let Err(resp) = result {
        return resp;
    }

    product_response(&services, tenant_id, product_id, StatusCode::CREATED)
}

/// GET /products?q=&low_stock=
pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::ProductListQuery>,
) -> axum::response::Response {
    if let Err(resp) = require(&tenant, &principal, Permission::CATALOG_READ) {
        return resp;
    }
    let items = services.read_models().catalog.search(
        tenant.tenant_id(),
        &CatalogQuery {
            text: query.q,
            low_stock_only: query.low_stock,
        },
    );
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = require(&tenant, &principal, Permission::CATALOG_READ) {
        return resp;
    }
    let product_id = match parse_id(&id, "product") {
        Ok(id) => ProductId::new(id),
        Err(resp) => return resp,
    };
    product_response(&services, tenant.tenant_id(), product_id, StatusCode::OK)
}

/// PATCH /products/:id
pub async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateProductRequest>,
) -> axum::response::Response {
    let tenant_id = tenant.tenant_id();
    let product_id = match parse_id(&id, "product") {
        Ok(id) => ProductId::new(id),
        Err(resp) => return resp,
    };
    let new_sku = body.sku.clone();

    let cmd = ProductCommand::UpdateProduct(UpdateProduct {
        tenant_id,
        product_id,
        changes: ProductChanges {
            sku: body.sku,
            name: body.name,
            category: body.category,
            price: body.price,
            cost: body.cost,
            min_stock: body.min_stock,
            description: body.description,
            vat_rate: body.vat_rate,
        },
        occurred_at: Utc::now(),
    });
    let cmd = match authorized(&tenant, &principal, Permission::CATALOG_WRITE, cmd) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let result = services.exclusive(|| {
        if let Some(sku) = &new_sku {
            if sku_taken(&services, tenant_id, sku, Some(product_id)) {
                return Err(errors::json_error(
                    StatusCode::CONFLICT,
                    "duplicate_sku",
                    format!("SKU '{}' is already in use", sku.trim()),
                ));
            }
        }
        dispatch_product(&services, tenant_id, product_id, cmd)
    });
    if let Err(resp) = result {
        return resp;
    }

    product_response(&services, tenant_id, product_id, StatusCode::OK)
}

/// DELETE /products/:id
pub async fn remove_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let tenant_id = tenant.tenant_id();
    let product_id = match parse_id(&id, "product") {
        Ok(id) => ProductId::new(id),
        Err(resp) => return resp,
    };
    let cmd = ProductCommand::RemoveProduct(RemoveProduct {
        tenant_id,
        product_id,
        occurred_at: Utc::now(),
    });
    let cmd = match authorized(&tenant, &principal, Permission::CATALOG_WRITE, cmd) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    match dispatch_product(&services, tenant_id, product_id, cmd) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(resp) => resp,
    }
}

/// POST /products/:id/stock `{delta}`: manual correction or received goods.
pub async fn adjust_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AdjustStockRequest>,
) -> axum::response::Response {
    let tenant_id = tenant.tenant_id();
    let product_id = match parse_id(&id, "product") {
        Ok(id) => ProductId::new(id),
        Err(resp) => return resp,
    };
    let cmd = ProductCommand::AdjustStock(AdjustStock {
        tenant_id,
        product_id,
        delta: body.delta,
        reason: StockReason::Manual,
        occurred_at: Utc::now(),
    });
    let cmd = match authorized(&tenant, &principal, Permission::CATALOG_WRITE, cmd) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    if let Err(resp) = dispatch_product(&services, tenant_id, product_id, cmd) {
        return resp;
    }
    product_response(&services, tenant_id, product_id, StatusCode::OK)
}

/// POST /products/:id/describe
///
/// Returns a suggested description; the product itself is not modified.
pub async fn describe_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = require(&tenant, &principal, Permission::AI_USE) {
        return resp;
    }
    let tenant_id = tenant.tenant_id();
    let product_id = match parse_id(&id, "product") {
        Ok(id) => ProductId::new(id),
        Err(resp) => return resp,
    };
    let Some(product) = services.read_models().catalog.get(tenant_id, &product_id) else {
        return errors::not_found("product");
    };

    let job = ProductDescriptionJob::new(
        tenant_id,
        product.name,
        product.category.unwrap_or_else(|| UNCATEGORIZED.to_string()),
    );
    let scheduler = services.ai().clone();
    match tokio::task::spawn_blocking(move || scheduler.run(&job)).await {
        Ok(Ok(result)) => (StatusCode::OK, Json(result)).into_response(),
        Ok(Err(e)) => errors::json_error(StatusCode::BAD_REQUEST, "ai_error", e.to_string()),
        Err(e) => errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "ai_error", e.to_string()),
    }
}
