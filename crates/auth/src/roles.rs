use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::Permission;

/// Role identifier used for RBAC.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// Store owner: full control of their own tenant's data.
    pub fn owner() -> Self {
        Self::new("owner")
    }

    /// Platform operator: tenant directory and billing.
    pub fn superadmin() -> Self {
        Self::new("superadmin")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Static role to permission policy. Unknown roles grant nothing.
pub fn permissions_for_roles(roles: &[Role]) -> Vec<Permission> {
    let mut granted = Vec::new();
    for role in roles {
        match role.as_str() {
            "owner" => granted.extend(
                ["catalog.*", "customers.*", "sales.*", "fiscal.*", "reports.*", "ai.*"]
                    .into_iter()
                    .map(Permission::new),
            ),
            "superadmin" => granted.push(Permission::new("admin.*")),
            _ => {}
        }
    }
    granted
}
