use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value as JsonValue;

use ferrepos_billing::{InvoiceEvent, InvoiceId, InvoiceStatus, PlanId};
use ferrepos_core::TenantId;
use ferrepos_events::EventEnvelope;

use super::{ProjectionError, StreamCursors};
use crate::read_model::TenantStore;
use crate::streams;

/// Invoice the platform issued to a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceReadModel {
    pub invoice_id: InvoiceId,
    /// The billed tenant.
    pub tenant_id: TenantId,
    pub tenant_name: String,
    pub plan: PlanId,
    pub amount: Decimal,
    pub issued_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub status: InvoiceStatus,
    pub paid_at: Option<DateTime<Utc>>,
}

/// Receivables overview for the billing dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InvoiceSummary {
    /// Sum of `PENDING` amounts.
    pub pending_total: Decimal,
    /// Sum of `PAID` amounts.
    pub collected_total: Decimal,
    pub overdue_count: usize,
}

/// Invoice streams live in the platform partition.
#[derive(Debug)]
pub struct InvoicesProjection<S> {
    store: S,
    cursors: StreamCursors,
}

impl<S> InvoicesProjection<S>
where
    S: TenantStore<InvoiceId, InvoiceReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, invoice_id: &InvoiceId) -> Option<InvoiceReadModel> {
        self.store.get(TenantId::platform(), invoice_id)
    }

    /// Newest first, optionally only one tenant's invoices.
    pub fn list(&self, billed_tenant: Option<TenantId>) -> Vec<InvoiceReadModel> {
        let mut all: Vec<_> = self
            .store
            .list(TenantId::platform())
            .into_iter()
            .filter(|i| billed_tenant.is_none_or(|t| i.tenant_id == t))
            .collect();
        all.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));
        all
    }

    /// Totals by status; overdue is whatever the operator marked `OVERDUE`.
    pub fn summary(&self, billed_tenant: Option<TenantId>) -> InvoiceSummary {
        self.list(billed_tenant)
            .into_iter()
            .fold(InvoiceSummary::default(), |mut acc, i| {
                match i.status {
                    InvoiceStatus::Pending => acc.pending_total += i.amount,
                    InvoiceStatus::Paid => acc.collected_total += i.amount,
                    InvoiceStatus::Overdue => acc.overdue_count += 1,
                }
                acc
            })
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != streams::TENANT_INVOICE {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        if !tenant_id.is_platform() {
            return Err(ProjectionError::TenantIsolation(
                "invoice envelope outside the platform partition".to_string(),
            ));
        }
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        if !self.cursors.is_next(tenant_id, aggregate_id, seq)? {
            return Ok(());
        }

        let ev: InvoiceEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match ev {
            InvoiceEvent::InvoiceIssued(e) => {
                self.store.upsert(
                    tenant_id,
                    e.invoice_id,
                    InvoiceReadModel {
                        invoice_id: e.invoice_id,
                        tenant_id: e.billed_tenant_id,
                        tenant_name: e.tenant_name,
                        plan: e.plan,
                        amount: e.amount,
                        issued_at: e.occurred_at,
                        due_date: e.due_date,
                        status: InvoiceStatus::Pending,
                        paid_at: None,
                    },
                );
            }
            InvoiceEvent::InvoicePaid(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.invoice_id) {
                    rm.status = InvoiceStatus::Paid;
                    rm.paid_at = Some(e.occurred_at);
                    self.store.upsert(tenant_id, e.invoice_id, rm);
                }
            }
            InvoiceEvent::InvoiceAmended(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.invoice_id) {
                    rm.amount = e.amount;
                    rm.due_date = e.due_date;
                    if e.status != InvoiceStatus::Paid {
                        rm.paid_at = None;
                    } else if rm.paid_at.is_none() {
                        rm.paid_at = Some(e.occurred_at);
                    }
                    rm.status = e.status;
                    self.store.upsert(tenant_id, e.invoice_id, rm);
                }
            }
        }

        self.cursors.advance(tenant_id, aggregate_id, seq);
        Ok(())
    }

    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionError> {
        let envs = super::prepare_rebuild(envelopes, |t| self.store.clear_tenant(t), &self.cursors);
        for env in &envs {
            self.apply_envelope(env)?;
        }
        Ok(())
    }
}
