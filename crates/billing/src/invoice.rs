//! Invoices the platform issues to its tenants for their subscription.
//!
//! Invoice streams live in the platform partition; the billed store is a field.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ferrepos_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use ferrepos_events::Event;

use crate::plan::PlanId;

/// Days between issue and due date.
pub const INVOICE_DUE_DAYS: i64 = 10;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceId(pub AggregateId);

impl InvoiceId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    Pending,
    Paid,
    Overdue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantInvoice {
    id: InvoiceId,
    tenant_id: Option<TenantId>,
    billed_tenant_id: Option<TenantId>,
    tenant_name: String,
    plan: PlanId,
    amount: Decimal,
    issued_at: Option<DateTime<Utc>>,
    due_date: Option<DateTime<Utc>>,
    status: InvoiceStatus,
    version: u64,
}

impl TenantInvoice {
    pub fn empty(id: InvoiceId) -> Self {
        Self {
            id,
            tenant_id: None,
            billed_tenant_id: None,
            tenant_name: String::new(),
            plan: PlanId::Free,
            amount: Decimal::ZERO,
            issued_at: None,
            due_date: None,
            status: InvoiceStatus::Pending,
            version: 0,
        }
    }

    pub fn billed_tenant_id(&self) -> Option<TenantId> {
        self.billed_tenant_id
    }

    pub fn tenant_name(&self) -> &str {
        &self.tenant_name
    }

    pub fn plan(&self) -> PlanId {
        self.plan
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn due_date(&self) -> Option<DateTime<Utc>> {
        self.due_date
    }

    pub fn status(&self) -> InvoiceStatus {
        self.status
    }

    fn issued(&self) -> bool {
        self.issued_at.is_some()
    }
}

impl AggregateRoot for TenantInvoice {
    type Id = InvoiceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: IssueInvoice. The amount is taken from the plan at issue time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueInvoice {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub billed_tenant_id: TenantId,
    pub tenant_name: String,
    pub plan: PlanId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkInvoicePaid {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AmendInvoice. Manual correction by the platform operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmendInvoice {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub amount: Option<Decimal>,
    pub due_date: Option<DateTime<Utc>>,
    pub status: Option<InvoiceStatus>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceCommand {
    IssueInvoice(IssueInvoice),
    MarkInvoicePaid(MarkInvoicePaid),
    AmendInvoice(AmendInvoice),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceIssued {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub billed_tenant_id: TenantId,
    pub tenant_name: String,
    pub plan: PlanId,
    pub amount: Decimal,
    pub due_date: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoicePaid {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceAmended. Carries the resulting values, not the diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceAmended {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub amount: Decimal,
    pub due_date: DateTime<Utc>,
    pub status: InvoiceStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceEvent {
    InvoiceIssued(InvoiceIssued),
    InvoicePaid(InvoicePaid),
    InvoiceAmended(InvoiceAmended),
}

impl Event for InvoiceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InvoiceEvent::InvoiceIssued(_) => "billing.invoice.issued",
            InvoiceEvent::InvoicePaid(_) => "billing.invoice.paid",
            InvoiceEvent::InvoiceAmended(_) => "billing.invoice.amended",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InvoiceEvent::InvoiceIssued(e) => e.occurred_at,
            InvoiceEvent::InvoicePaid(e) => e.occurred_at,
            InvoiceEvent::InvoiceAmended(e) => e.occurred_at,
        }
    }
}

impl Aggregate for TenantInvoice {
    type Command = InvoiceCommand;
    type Event = InvoiceEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InvoiceEvent::InvoiceIssued(e) => {
                self.id = e.invoice_id;
                self.tenant_id = Some(e.tenant_id);
                self.billed_tenant_id = Some(e.billed_tenant_id);
                self.tenant_name = e.tenant_name.clone();
                self.plan = e.plan;
                self.amount = e.amount;
                self.issued_at = Some(e.occurred_at);
                self.due_date = Some(e.due_date);
                self.status = InvoiceStatus::Pending;
            }
            InvoiceEvent::InvoicePaid(_) => {
                self.status = InvoiceStatus::Paid;
            }
            InvoiceEvent::InvoiceAmended(e) => {
                self.amount = e.amount;
                self.due_date = Some(e.due_date);
                self.status = e.status;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InvoiceCommand::IssueInvoice(cmd) => self.handle_issue(cmd),
            InvoiceCommand::MarkInvoicePaid(cmd) => self.handle_mark_paid(cmd),
            InvoiceCommand::AmendInvoice(cmd) => self.handle_amend(cmd),
        }
    }
}

impl TenantInvoice {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_invoice_id(&self, invoice_id: InvoiceId) -> Result<(), DomainError> {
        if self.id != invoice_id {
            return Err(DomainError::invariant("invoice_id mismatch"));
        }
        Ok(())
    }

    fn handle_issue(&self, cmd: &IssueInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        if self.issued() {
            return Err(DomainError::conflict("invoice already exists"));
        }
        self.ensure_invoice_id(cmd.invoice_id)?;

        Ok(vec![InvoiceEvent::InvoiceIssued(InvoiceIssued {
            tenant_id: cmd.tenant_id,
            invoice_id: cmd.invoice_id,
            billed_tenant_id: cmd.billed_tenant_id,
            tenant_name: cmd.tenant_name.clone(),
            plan: cmd.plan,
            amount: Decimal::from(cmd.plan.plan().price),
            due_date: cmd.occurred_at + Duration::days(INVOICE_DUE_DAYS),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_paid(&self, cmd: &MarkInvoicePaid) -> Result<Vec<InvoiceEvent>, DomainError> {
        if !self.issued() {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_invoice_id(cmd.invoice_id)?;

        if self.status == InvoiceStatus::Paid {
            return Err(DomainError::conflict("invoice is already paid"));
        }

        Ok(vec![InvoiceEvent::InvoicePaid(InvoicePaid {
            tenant_id: cmd.tenant_id,
            invoice_id: cmd.invoice_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_amend(&self, cmd: &AmendInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        if !self.issued() {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_invoice_id(cmd.invoice_id)?;

        if cmd.amount.is_none() && cmd.due_date.is_none() && cmd.status.is_none() {
            return Err(DomainError::validation("no changes supplied"));
        }
        let amount = cmd.amount.unwrap_or(self.amount);
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(DomainError::validation("amount cannot be negative"));
        }
        let due_date = match (cmd.due_date, self.due_date) {
            (Some(d), _) | (None, Some(d)) => d,
            (None, None) => return Err(DomainError::invariant("issued invoice without due date")),
        };
        if let Some(issued_at) = self.issued_at {
            if due_date < issued_at {
                return Err(DomainError::validation("due date cannot precede the issue date"));
            }
        }

        Ok(vec![InvoiceEvent::InvoiceAmended(InvoiceAmended {
            tenant_id: cmd.tenant_id,
            invoice_id: cmd.invoice_id,
            amount,
            due_date,
            status: cmd.status.unwrap_or(self.status),
            occurred_at: cmd.occurred_at,
        })])
    }
}
