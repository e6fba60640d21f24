use axum::http::StatusCode;
use axum::response::Response;

use ferrepos_auth::{CommandAuthorization, Permission};
use ferrepos_core::AggregateId;

use crate::app::errors;
use crate::context::{PrincipalContext, TenantContext};

/// Small helper wrapper to associate required permissions with a command.
pub struct CmdAuth<C> {
    pub inner: C,
    pub required: Vec<Permission>,
}

impl<C> CommandAuthorization for CmdAuth<C> {
    fn required_permissions(&self) -> &[Permission] {
        &self.required
    }
}

/// Authorize `command` against `required`, handing it back for dispatch.
pub fn authorized<C>(
    tenant: &TenantContext,
    principal: &PrincipalContext,
    required: Permission,
    command: C,
) -> Result<C, Response> {
    let cmd_auth = CmdAuth {
        inner: command,
        required: vec![required],
    };
    crate::authz::authorize_command(tenant, principal, &cmd_auth)
        .map_err(|e| errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string()))?;
    Ok(cmd_auth.inner)
}

/// Permission check for reads, which carry no command.
pub fn require(tenant: &TenantContext, principal: &PrincipalContext, required: Permission) -> Result<(), Response> {
    authorized(tenant, principal, required, ())
}

pub fn parse_id(raw: &str, what: &str) -> Result<AggregateId, Response> {
    raw.parse()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id")))
}
