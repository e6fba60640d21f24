//! Product categories ("Herramientas Manuales", "Electricidad", ...).
//!
//! Name uniqueness is per tenant and case-insensitive; like SKU uniqueness it
//! is checked against the read model before the create command is dispatched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ferrepos_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use ferrepos_events::Event;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(pub AggregateId);

impl CategoryId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for CategoryId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    id: CategoryId,
    tenant_id: Option<TenantId>,
    name: String,
    version: u64,
    created: bool,
}

impl Category {
    pub fn empty(id: CategoryId) -> Self {
        Self {
            id,
            tenant_id: None,
            name: String::new(),
            version: 0,
            created: false,
        }
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl AggregateRoot for Category {
    type Id = CategoryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCategory {
    pub tenant_id: TenantId,
    pub category_id: CategoryId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoryCommand {
    CreateCategory(CreateCategory),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCreated {
    pub tenant_id: TenantId,
    pub category_id: CategoryId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoryEvent {
    CategoryCreated(CategoryCreated),
}

impl Event for CategoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CategoryEvent::CategoryCreated(_) => "products.category.created",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CategoryEvent::CategoryCreated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Category {
    type Command = CategoryCommand;
    type Event = CategoryEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CategoryEvent::CategoryCreated(e) => {
                self.id = e.category_id;
                self.tenant_id = Some(e.tenant_id);
                self.name = e.name.clone();
                self.created = true;
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CategoryCommand::CreateCategory(cmd) => {
                if self.created {
                    return Err(DomainError::conflict("category already exists"));
                }
                let name = cmd.name.trim();
                if name.is_empty() {
                    return Err(DomainError::validation("category name cannot be empty"));
                }
                Ok(vec![CategoryEvent::CategoryCreated(CategoryCreated {
                    tenant_id: cmd.tenant_id,
                    category_id: cmd.category_id,
                    name: name.to_string(),
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}
