use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier, `"<area>.<action>"` (e.g. `"catalog.write"`).
///
/// Grants may use `"*"` (everything) or `"<area>.*"` (every action in an area).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const CATALOG_READ: Permission = Permission(Cow::Borrowed("catalog.read"));
    pub const CATALOG_WRITE: Permission = Permission(Cow::Borrowed("catalog.write"));
    pub const CUSTOMERS_READ: Permission = Permission(Cow::Borrowed("customers.read"));
    pub const CUSTOMERS_WRITE: Permission = Permission(Cow::Borrowed("customers.write"));
    pub const SALES_READ: Permission = Permission(Cow::Borrowed("sales.read"));
    pub const SALES_WRITE: Permission = Permission(Cow::Borrowed("sales.write"));
    pub const FISCAL_READ: Permission = Permission(Cow::Borrowed("fiscal.read"));
    pub const REPORTS_READ: Permission = Permission(Cow::Borrowed("reports.read"));
    pub const AI_USE: Permission = Permission(Cow::Borrowed("ai.use"));
    pub const ADMIN_TENANTS: Permission = Permission(Cow::Borrowed("admin.tenants"));
    pub const ADMIN_BILLING: Permission = Permission(Cow::Borrowed("admin.billing"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }

    /// Whether holding `self` satisfies `required`.
    pub fn grants(&self, required: &Permission) -> bool {
        let granted = self.as_str();
        if granted == "*" || granted == required.as_str() {
            return true;
        }
        match granted.strip_suffix(".*") {
            Some(area) => required
                .as_str()
                .strip_prefix(area)
                .is_some_and(|rest| rest.starts_with('.')),
            None => false,
        }
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_and_wildcards() {
        assert!(Permission::new("*").grants(&Permission::ADMIN_BILLING));
        assert!(Permission::new("catalog.*").grants(&Permission::CATALOG_WRITE));
        assert!(Permission::CATALOG_READ.grants(&Permission::CATALOG_READ));
        assert!(!Permission::CATALOG_READ.grants(&Permission::CATALOG_WRITE));
    }

    #[test]
    fn area_wildcard_does_not_leak_into_similar_prefixes() {
        assert!(!Permission::new("sales.*").grants(&Permission::new("salesforce.read")));
        assert!(!Permission::new("sales.*").grants(&Permission::new("sales")));
    }
}
