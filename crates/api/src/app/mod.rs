//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: event store/bus, read models, sessions and the AI scheduler
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use ferrepos_ai::{TextGenerator, UnavailableGenerator};

use crate::config::ApiConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// Must be called inside a Tokio runtime.
pub fn build_app(config: ApiConfig) -> Result<Router, services::StartupError> {
    build_app_with_generator(config, Arc::new(UnavailableGenerator))
}

/// Same as [`build_app`], with an explicit text-generation backend.
pub fn build_app_with_generator(
    config: ApiConfig,
    generator: Arc<dyn TextGenerator>,
) -> Result<Router, services::StartupError> {
    let jwt = Arc::new(ferrepos_auth::Hs256JwtValidator::new(config.jwt_secret.as_bytes()));
    let services = Arc::new(services::build_services(&config, generator)?);
    let auth_state = middleware::AuthState {
        jwt,
        services: services.clone(),
    };

    // Protected routes: require auth + tenant context.
    let protected = routes::router().layer(axum::middleware::from_fn_with_state(
        auth_state,
        middleware::auth_middleware,
    ));

    Ok(Router::new()
        .route("/health", get(routes::system::health))
        .nest("/auth", routes::auth::router())
        .merge(protected)
        .layer(ServiceBuilder::new().layer(Extension(services))))
}
