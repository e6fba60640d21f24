//! A hardware store subscribed to the platform.
//!
//! The account stream lives in the tenant's own partition, keyed by
//! `AggregateId::from(tenant_id)`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ferrepos_core::{Aggregate, AggregateRoot, DomainError, TenantId};
use ferrepos_events::Event;

use crate::plan::PlanId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantAccount {
    id: TenantId,
    name: String,
    email: String,
    password_hash: String,
    plan: PlanId,
    active: bool,
    registered_at: Option<DateTime<Utc>>,
    version: u64,
}

impl TenantAccount {
    pub fn empty(id: TenantId) -> Self {
        Self {
            id,
            name: String::new(),
            email: String::new(),
            password_hash: String::new(),
            plan: PlanId::Free,
            active: false,
            registered_at: None,
            version: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    pub fn plan(&self) -> PlanId {
        self.plan
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn registered_at(&self) -> Option<DateTime<Utc>> {
        self.registered_at
    }

    fn exists(&self) -> bool {
        self.registered_at.is_some()
    }
}

impl AggregateRoot for TenantAccount {
    type Id = TenantId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterTenant. `password_hash` is already salted and hashed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterTenant {
    pub tenant_id: TenantId,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub plan: PlanId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangePlan {
    pub tenant_id: TenantId,
    pub plan: PlanId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivateTenant {
    pub tenant_id: TenantId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeactivateTenant {
    pub tenant_id: TenantId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TenantAccountCommand {
    RegisterTenant(RegisterTenant),
    ChangePlan(ChangePlan),
    ActivateTenant(ActivateTenant),
    DeactivateTenant(DeactivateTenant),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantRegistered {
    pub tenant_id: TenantId,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub plan: PlanId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantPlanChanged {
    pub tenant_id: TenantId,
    pub from: PlanId,
    pub to: PlanId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantActivated {
    pub tenant_id: TenantId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantDeactivated {
    pub tenant_id: TenantId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TenantAccountEvent {
    TenantRegistered(TenantRegistered),
    TenantPlanChanged(TenantPlanChanged),
    TenantActivated(TenantActivated),
    TenantDeactivated(TenantDeactivated),
}

impl Event for TenantAccountEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TenantAccountEvent::TenantRegistered(_) => "billing.tenant.registered",
            TenantAccountEvent::TenantPlanChanged(_) => "billing.tenant.plan_changed",
            TenantAccountEvent::TenantActivated(_) => "billing.tenant.activated",
            TenantAccountEvent::TenantDeactivated(_) => "billing.tenant.deactivated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            TenantAccountEvent::TenantRegistered(e) => e.occurred_at,
            TenantAccountEvent::TenantPlanChanged(e) => e.occurred_at,
            TenantAccountEvent::TenantActivated(e) => e.occurred_at,
            TenantAccountEvent::TenantDeactivated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for TenantAccount {
    type Command = TenantAccountCommand;
    type Event = TenantAccountEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            TenantAccountEvent::TenantRegistered(e) => {
                self.id = e.tenant_id;
                self.name = e.name.clone();
                self.email = e.email.clone();
                self.password_hash = e.password_hash.clone();
                self.plan = e.plan;
                self.active = true;
                self.registered_at = Some(e.occurred_at);
            }
            TenantAccountEvent::TenantPlanChanged(e) => self.plan = e.to,
            TenantAccountEvent::TenantActivated(_) => self.active = true,
            TenantAccountEvent::TenantDeactivated(_) => self.active = false,
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            TenantAccountCommand::RegisterTenant(cmd) => self.handle_register(cmd),
            TenantAccountCommand::ChangePlan(cmd) => {
                self.ensure_existing(cmd.tenant_id)?;
                if self.plan == cmd.plan {
                    return Err(DomainError::conflict(format!("tenant is already on plan {}", cmd.plan)));
                }
                Ok(vec![TenantAccountEvent::TenantPlanChanged(TenantPlanChanged {
                    tenant_id: cmd.tenant_id,
                    from: self.plan,
                    to: cmd.plan,
                    occurred_at: cmd.occurred_at,
                })])
            }
            TenantAccountCommand::ActivateTenant(cmd) => {
                self.ensure_existing(cmd.tenant_id)?;
                if self.active {
                    return Err(DomainError::conflict("tenant is already active"));
                }
                Ok(vec![TenantAccountEvent::TenantActivated(TenantActivated {
                    tenant_id: cmd.tenant_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
            TenantAccountCommand::DeactivateTenant(cmd) => {
                self.ensure_existing(cmd.tenant_id)?;
                if !self.active {
                    return Err(DomainError::conflict("tenant is already inactive"));
                }
                Ok(vec![TenantAccountEvent::TenantDeactivated(TenantDeactivated {
                    tenant_id: cmd.tenant_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

impl TenantAccount {
    fn ensure_existing(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.exists() {
            return Err(DomainError::not_found());
        }
        if self.id != tenant_id {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterTenant) -> Result<Vec<TenantAccountEvent>, DomainError> {
        if self.exists() {
            return Err(DomainError::conflict("tenant already registered"));
        }
        if cmd.tenant_id.is_platform() {
            return Err(DomainError::validation("the platform partition cannot be registered"));
        }

        let name = cmd.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("store name cannot be empty"));
        }
        let email = cmd.email.trim().to_lowercase();
        if !email.contains('@') {
            return Err(DomainError::validation(format!("'{email}' is not an email address")));
        }
        if cmd.password_hash.is_empty() {
            return Err(DomainError::validation("password is required"));
        }

        Ok(vec![TenantAccountEvent::TenantRegistered(TenantRegistered {
            tenant_id: cmd.tenant_id,
            name: name.to_string(),
            email,
            password_hash: cmd.password_hash.clone(),
            plan: cmd.plan,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registered() -> TenantAccount {
        let tenant_id = TenantId::new();
        let mut account = TenantAccount::empty(tenant_id);
        let cmd = TenantAccountCommand::RegisterTenant(RegisterTenant {
            tenant_id,
            name: " Ferretería El Tornillo ".to_string(),
            email: "Dueno@ElTornillo.com.py".to_string(),
            password_hash: "salt$hash".to_string(),
            plan: PlanId::Free,
            occurred_at: Utc::now(),
        });
        for e in account.handle(&cmd).unwrap() {
            account.apply(&e);
        }
        account
    }

    fn run(account: &mut TenantAccount, cmd: TenantAccountCommand) -> Result<(), DomainError> {
        for e in account.handle(&cmd)? {
            account.apply(&e);
        }
        Ok(())
    }

    #[test]
    fn registration_normalizes_and_activates() {
        let account = registered();
        assert_eq!(account.name(), "Ferretería El Tornillo");
        assert_eq!(account.email(), "dueno@eltornillo.com.py");
        assert!(account.is_active());
        assert_eq!(account.plan(), PlanId::Free);
        assert_eq!(account.version(), 1);
    }

    #[test]
    fn registration_rejects_bad_email() {
        let tenant_id = TenantId::new();
        let cmd = TenantAccountCommand::RegisterTenant(RegisterTenant {
            tenant_id,
            name: "Ferretería".to_string(),
            email: "no-email".to_string(),
            password_hash: "x".to_string(),
            plan: PlanId::Free,
            occurred_at: Utc::now(),
        });
        assert!(matches!(
            TenantAccount::empty(tenant_id).handle(&cmd),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn deactivate_then_activate() {
        let mut account = registered();
        let tenant_id = *account.id();
        run(
            &mut account,
            TenantAccountCommand::DeactivateTenant(DeactivateTenant { tenant_id, occurred_at: Utc::now() }),
        )
        .unwrap();
        assert!(!account.is_active());

        let again = run(
            &mut account,
            TenantAccountCommand::DeactivateTenant(DeactivateTenant { tenant_id, occurred_at: Utc::now() }),
        );
        assert!(matches!(again, Err(DomainError::Conflict(_))));

        run(
            &mut account,
            TenantAccountCommand::ActivateTenant(ActivateTenant { tenant_id, occurred_at: Utc::now() }),
        )
        .unwrap();
        assert!(account.is_active());
        assert_eq!(account.version(), 3);
    }

    #[test]
    fn plan_change_records_previous_plan() {
        let account = registered();
        let tenant_id = *account.id();
        let events = account
            .handle(&TenantAccountCommand::ChangePlan(ChangePlan {
                tenant_id,
                plan: PlanId::Pro,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        match &events[0] {
            TenantAccountEvent::TenantPlanChanged(e) => {
                assert_eq!(e.from, PlanId::Free);
                assert_eq!(e.to, PlanId::Pro);
            }
            other => panic!("unexpected event: {other:?}"),
        }

        let same = account.handle(&TenantAccountCommand::ChangePlan(ChangePlan {
            tenant_id,
            plan: PlanId::Free,
            occurred_at: Utc::now(),
        }));
        assert!(matches!(same, Err(DomainError::Conflict(_))));
    }

    #[test]
    fn commands_on_unknown_tenant_are_not_found() {
        let tenant_id = TenantId::new();
        let err = TenantAccount::empty(tenant_id)
            .handle(&TenantAccountCommand::ActivateTenant(ActivateTenant {
                tenant_id,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn platform_partition_cannot_register() {
        let platform = TenantId::platform();
        let cmd = TenantAccountCommand::RegisterTenant(RegisterTenant {
            tenant_id: platform,
            name: "Platform".to_string(),
            email: "ops@example.com".to_string(),
            password_hash: "x".to_string(),
            plan: PlanId::Enterprise,
            occurred_at: Utc::now(),
        });
        assert!(TenantAccount::empty(platform).handle(&cmd).is_err());
    }
}
