use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ferrepos_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use ferrepos_events::Event;

use crate::document::TaxDocument;

/// Customer identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(pub AggregateId);

impl CustomerId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for CustomerId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl ContactInfo {
    fn normalized(&self) -> Result<Self, DomainError> {
        let clean = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let email = clean(&self.email);
        if let Some(email) = &email {
            if !email.contains('@') {
                return Err(DomainError::validation(format!("'{email}' is not an email address")));
            }
        }
        Ok(Self {
            email,
            phone: clean(&self.phone),
            address: clean(&self.address),
        })
    }
}

/// Aggregate root: Customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    id: CustomerId,
    tenant_id: Option<TenantId>,
    name: String,
    contact: ContactInfo,
    document: Option<TaxDocument>,
    version: u64,
    created: bool,
}

impl Customer {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: CustomerId) -> Self {
        Self {
            id,
            tenant_id: None,
            name: String::new(),
            contact: ContactInfo::default(),
            document: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> CustomerId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contact(&self) -> &ContactInfo {
        &self.contact
    }

    pub fn document(&self) -> Option<&TaxDocument> {
        self.document.as_ref()
    }
}

impl AggregateRoot for Customer {
    type Id = CustomerId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterCustomer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterCustomer {
    pub tenant_id: TenantId,
    pub customer_id: CustomerId,
    pub name: String,
    pub contact: ContactInfo,
    pub document: Option<TaxDocument>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerChanges {
    pub name: Option<String>,
    pub contact: Option<ContactInfo>,
    pub document: Option<TaxDocument>,
}

/// Command: UpdateCustomer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCustomer {
    pub tenant_id: TenantId,
    pub customer_id: CustomerId,
    pub changes: CustomerChanges,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustomerCommand {
    RegisterCustomer(RegisterCustomer),
    UpdateCustomer(UpdateCustomer),
}

/// Event: CustomerRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRegistered {
    pub tenant_id: TenantId,
    pub customer_id: CustomerId,
    pub name: String,
    pub contact: ContactInfo,
    pub document: Option<TaxDocument>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CustomerUpdated. Carries the full resulting details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerUpdated {
    pub tenant_id: TenantId,
    pub customer_id: CustomerId,
    pub name: String,
    pub contact: ContactInfo,
    pub document: Option<TaxDocument>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustomerEvent {
    CustomerRegistered(CustomerRegistered),
    CustomerUpdated(CustomerUpdated),
}

impl Event for CustomerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CustomerEvent::CustomerRegistered(_) => "parties.customer.registered",
            CustomerEvent::CustomerUpdated(_) => "parties.customer.updated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CustomerEvent::CustomerRegistered(e) => e.occurred_at,
            CustomerEvent::CustomerUpdated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Customer {
    type Command = CustomerCommand;
    type Event = CustomerEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CustomerEvent::CustomerRegistered(e) => {
                self.id = e.customer_id;
                self.tenant_id = Some(e.tenant_id);
                self.name = e.name.clone();
                self.contact = e.contact.clone();
                self.document = e.document.clone();
                self.created = true;
            }
            CustomerEvent::CustomerUpdated(e) => {
                self.name = e.name.clone();
                self.contact = e.contact.clone();
                self.document = e.document.clone();
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CustomerCommand::RegisterCustomer(cmd) => self.handle_register(cmd),
            CustomerCommand::UpdateCustomer(cmd) => self.handle_update(cmd),
        }
    }
}

impl Customer {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_customer_id(&self, customer_id: CustomerId) -> Result<(), DomainError> {
        if self.id != customer_id {
            return Err(DomainError::invariant("customer_id mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterCustomer) -> Result<Vec<CustomerEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("customer already exists"));
        }
        self.ensure_customer_id(cmd.customer_id)?;

        let name = cmd.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        Ok(vec![CustomerEvent::CustomerRegistered(CustomerRegistered {
            tenant_id: cmd.tenant_id,
            customer_id: cmd.customer_id,
            name: name.to_string(),
            contact: cmd.contact.normalized()?,
            document: cmd.document.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateCustomer) -> Result<Vec<CustomerEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_customer_id(cmd.customer_id)?;

        let name = cmd
            .changes
            .name
            .as_deref()
            .map(str::trim)
            .unwrap_or(self.name.as_str())
            .to_string();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        let contact = match &cmd.changes.contact {
            Some(contact) => contact.normalized()?,
            None => self.contact.clone(),
        };
        let document = cmd.changes.document.clone().or_else(|| self.document.clone());

        Ok(vec![CustomerEvent::CustomerUpdated(CustomerUpdated {
            tenant_id: cmd.tenant_id,
            customer_id: cmd.customer_id,
            name,
            contact,
            document,
            occurred_at: cmd.occurred_at,
        })])
    }
}
