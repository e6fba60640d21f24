use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use ferrepos_core::TenantId;

use crate::{PrincipalId, Role};

/// JWT claims model (transport-agnostic).
///
/// The set of claims FerrePOS expects once a token has been decoded and its
/// signature verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject / principal identifier.
    pub sub: PrincipalId,

    /// Tenant context for the token.
    pub tenant_id: TenantId,

    /// Display name (store name for owners).
    #[serde(default)]
    pub name: String,

    /// RBAC roles granted within the tenant context.
    pub roles: Vec<Role>,

    pub issued_at: DateTime<Utc>,

    pub expires_at: DateTime<Utc>,
}

impl JwtClaims {
    pub fn new(
        sub: PrincipalId,
        tenant_id: TenantId,
        name: impl Into<String>,
        roles: Vec<Role>,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            sub,
            tenant_id,
            name: name.into(),
            roles,
            issued_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.contains(role)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Validate the time window of already-decoded claims.
pub fn validate_claims(claims: &JwtClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims_at(now: DateTime<Utc>, ttl_minutes: i64) -> JwtClaims {
        JwtClaims::new(
            PrincipalId::new(),
            TenantId::new(),
            "Ferretería Central",
            vec![Role::owner()],
            now,
            Duration::minutes(ttl_minutes),
        )
    }

    #[test]
    fn window_is_half_open() {
        let now = Utc::now();
        let claims = claims_at(now, 10);
        assert!(validate_claims(&claims, now).is_ok());
        assert_eq!(
            validate_claims(&claims, now + Duration::minutes(10)),
            Err(TokenValidationError::Expired)
        );
        assert_eq!(
            validate_claims(&claims, now - Duration::seconds(1)),
            Err(TokenValidationError::NotYetValid)
        );
    }

    #[test]
    fn zero_ttl_is_an_invalid_window() {
        let now = Utc::now();
        assert_eq!(
            validate_claims(&claims_at(now, 0), now),
            Err(TokenValidationError::InvalidTimeWindow)
        );
    }

    #[test]
    fn name_defaults_when_absent() {
        let now = Utc::now();
        let mut value = serde_json::to_value(claims_at(now, 5)).unwrap();
        value.as_object_mut().unwrap().remove("name");
        let claims: JwtClaims = serde_json::from_value(value).unwrap();
        assert_eq!(claims.name, "");
    }
}
