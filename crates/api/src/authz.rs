//! API-side authorization guard.
//!
//! Enforced at the request boundary (before dispatch), keeping domain
//! aggregates and infra auth-agnostic.

use ferrepos_auth::{AuthzError, CommandAuthorization, Principal, TenantMembership, authorize, permissions_for_roles};

use crate::context::{PrincipalContext, TenantContext};

/// Check every permission `command` requires in the current request context.
pub fn authorize_command<C: CommandAuthorization>(
    tenant: &TenantContext,
    principal: &PrincipalContext,
    command: &C,
) -> Result<(), AuthzError> {
    let membership = TenantMembership {
        tenant_id: tenant.tenant_id(),
        roles: principal.roles().to_vec(),
        permissions: permissions_for_roles(principal.roles()),
    };

    let principal = Principal {
        principal_id: principal.principal_id(),
        active_tenant_id: tenant.tenant_id(),
        membership,
    };

    for perm in command.required_permissions() {
        authorize(&principal, perm)?;
    }

    Ok(())
}
