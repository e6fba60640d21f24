//! Public sign-up and sign-in.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use crate::app::services::{AppServices, AuthError};
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

fn auth_error_to_response(err: AuthError) -> axum::response::Response {
    match err {
        AuthError::InvalidCredentials => {
            errors::json_error(StatusCode::UNAUTHORIZED, "invalid_credentials", err.to_string())
        }
        AuthError::Inactive => errors::json_error(StatusCode::FORBIDDEN, "tenant_inactive", err.to_string()),
        AuthError::EmailTaken(_) => errors::json_error(StatusCode::CONFLICT, "email_taken", err.to_string()),
        AuthError::Validation(msg) => errors::json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        AuthError::Dispatch(e) => errors::dispatch_error_to_response(e),
        AuthError::Token(e) => errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "token_error", e.to_string()),
        AuthError::Password(e) => {
            tracing::error!(error = %e, "password hashing failed");
            errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "could not process credentials")
        }
    }
}

/// POST /auth/register
pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::RegisterRequest>,
) -> axum::response::Response {
    match services.register_tenant(&body.name, &body.email, &body.password, body.plan) {
        Ok(session) => (StatusCode::CREATED, Json(session)).into_response(),
        Err(e) => auth_error_to_response(e),
    }
}

/// POST /auth/login
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::LoginRequest>,
) -> axum::response::Response {
    match services.login(&body.email, &body.password) {
        Ok(session) => (StatusCode::OK, Json(session)).into_response(),
        Err(e) => auth_error_to_response(e),
    }
}
