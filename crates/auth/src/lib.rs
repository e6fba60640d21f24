//! `ferrepos-auth`: authentication and authorization boundary.
//!
//! Decoupled from HTTP and storage. Tokens are HS256 JWTs; store owners act
//! inside their own tenant, the platform operator inside the platform tenant.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod password;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{AuthzError, CommandAuthorization, Principal, authorize};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtIssuer, Hs256JwtValidator, JwtIssuer, JwtValidator, TokenError};
pub use password::{PasswordError, hash_password, verify_password};
pub use permissions::Permission;
pub use principal::{PrincipalId, TenantMembership};
pub use roles::{Role, permissions_for_roles};
