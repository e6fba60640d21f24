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
use ferrepos_core::{AggregateId, TenantId};
use ferrepos_infra::streams;
use ferrepos_parties::{
    Customer, CustomerChanges, CustomerCommand, CustomerId, RegisterCustomer, TaxDocument, UpdateCustomer,
};

use crate::app::routes::common::{authorized, parse_id, require};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_customer).get(list_customers))
        .route("/:id", get(get_customer).patch(update_customer))
}

/// RUC numbers get their check digit computed here.
fn document(req: Option<dto::DocumentRequest>) -> Result<Option<TaxDocument>, axum::response::Response> {
    req.map(|d| TaxDocument::new(d.kind, &d.number))
        .transpose()
        .map_err(errors::domain_error_to_response)
}

fn customer_response(
    services: &AppServices,
    tenant_id: TenantId,
    customer_id: CustomerId,
    status: StatusCode,
) -> axum::response::Response {
    match services.read_models().customers.get(tenant_id, &customer_id) {
        Some(rm) => (status, Json(rm)).into_response(),
        None => errors::not_found("customer"),
    }
}

fn dispatch_customer(
    services: &AppServices,
    tenant_id: TenantId,
    customer_id: CustomerId,
    cmd: CustomerCommand,
) -> Result<(), axum::response::Response> {
    services
        .dispatch::<Customer>(tenant_id, customer_id.0, streams::CUSTOMER, cmd, |_, id| {
            Customer::empty(CustomerId::new(id))
        })
        .map(|_| ())
        .map_err(errors::dispatch_error_to_response)
}

pub async fn register_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::RegisterCustomerRequest>,
) -> axum::response::Response {
    let tenant_id = tenant.tenant_id();
    let customer_id = CustomerId::new(AggregateId::new());
    let document = match document(body.document) {
        Ok(d) => d,
        Err(resp) => return resp,
    };

    let cmd = CustomerCommand::RegisterCustomer(RegisterCustomer {
        tenant_id,
        customer_id,
        name: body.name,
        contact: body.contact,
        document,
        occurred_at: Utc::now(),
    });
    let cmd = match authorized(&tenant, &principal, Permission::CUSTOMERS_WRITE, cmd) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    if let Err(resp) = dispatch_customer(&services, tenant_id, customer_id, cmd) {
        return resp;
    }
    customer_response(&services, tenant_id, customer_id, StatusCode::CREATED)
}

pub async fn update_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateCustomerRequest>,
) -> axum::response::Response {
    let tenant_id = tenant.tenant_id();
    let customer_id = match parse_id(&id, "customer") {
        Ok(id) => CustomerId::new(id),
        Err(resp) => return resp,
    };
    let document = match document(body.document) {
        Ok(d) => d,
        Err(resp) => return resp,
    };

    let cmd = CustomerCommand::UpdateCustomer(UpdateCustomer {
        tenant_id,
        customer_id,
        changes: CustomerChanges {
            name: body.name,
            contact: body.contact,
            document,
        },
        occurred_at: Utc::now(),
    });
    let cmd = match authorized(&tenant, &principal, Permission::CUSTOMERS_WRITE, cmd) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    if let Err(resp) = dispatch_customer(&services, tenant_id, customer_id, cmd) {
        return resp;
    }
    customer_response(&services, tenant_id, customer_id, StatusCode::OK)
}

pub async fn get_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = require(&tenant, &principal, Permission::CUSTOMERS_READ) {
        return resp;
    }
    match parse_id(&id, "customer") {
        Ok(id) => customer_response(&services, tenant.tenant_id(), CustomerId::new(id), StatusCode::OK),
        Err(resp) => resp,
    }
}

pub async fn list_customers(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = require(&tenant, &principal, Permission::CUSTOMERS_READ) {
        return resp;
    }
    let items = services.read_models().customers.list(tenant.tenant_id());
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}
