use axum::{routing::get, Router};

pub mod admin;
pub mod auth;
pub mod categories;
pub mod common;
pub mod customers;
pub mod dashboard;
pub mod fiscal;
pub mod invoices;
pub mod products;
pub mod sales;
pub mod system;

/// Router for all authenticated endpoints. Store routes act on the caller's
/// tenant; `/admin` is for the platform operator.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/stream", get(system::stream))
        .nest("/categories", categories::router())
        .nest("/products", products::router())
        .nest("/customers", customers::router())
        .nest("/fiscal", fiscal::router())
        .nest("/sales", sales::router())
        .nest("/dashboard", dashboard::router())
        .nest("/admin", admin::router())
}
