use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use ferrepos_auth::JwtValidator;

use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
    pub services: Arc<AppServices>,
}

/// Verify the bearer token and attach tenant and principal context.
///
/// A deactivated tenant loses access immediately, even with an unexpired token.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let Some(token) = extract_bearer(req.headers()) else {
        return errors::json_error(StatusCode::UNAUTHORIZED, "unauthorized", "missing bearer token");
    };

    let claims = match state.jwt.validate(token, Utc::now()) {
        Ok(c) => c,
        Err(e) => return errors::json_error(StatusCode::UNAUTHORIZED, "unauthorized", e.to_string()),
    };

    if !claims.tenant_id.is_platform() {
        let account = state.services.read_models().tenants.get(claims.tenant_id);
        if account.is_some_and(|a| !a.is_active) {
            return errors::json_error(StatusCode::FORBIDDEN, "tenant_inactive", "store account is deactivated");
        }
    }

    req.extensions_mut().insert(TenantContext::new(claims.tenant_id));
    req.extensions_mut()
        .insert(PrincipalContext::new(claims.sub, claims.name, claims.roles));

    next.run(req).await
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderValue, header::AUTHORIZATION};

    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn bearer_token_is_extracted() {
        assert_eq!(extract_bearer(&headers("Bearer abc.def")), Some("abc.def"));
        assert_eq!(extract_bearer(&headers("Bearer   ")), None);
        assert_eq!(extract_bearer(&headers("Basic abc")), None);
        assert_eq!(extract_bearer(&HeaderMap::new()), None);
    }
}
