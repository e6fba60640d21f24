//! Platform-wide tenant directory: login lookup and the admin tenant list.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use ferrepos_billing::{PlanId, TenantAccountEvent};
use ferrepos_core::TenantId;
use ferrepos_events::EventEnvelope;

use super::{ProjectionError, StreamCursors};
use crate::read_model::TenantStore;
use crate::streams;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenantReadModel {
    pub tenant_id: TenantId,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub plan: PlanId,
    pub is_active: bool,
    pub registered_at: DateTime<Utc>,
}

/// Each account lives in its own tenant partition under key `tenant_id`.
#[derive(Debug)]
pub struct TenantDirectoryProjection<S> {
    store: S,
    cursors: StreamCursors,
}

impl<S> TenantDirectoryProjection<S>
where
    S: TenantStore<TenantId, TenantReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId) -> Option<TenantReadModel> {
        self.store.get(tenant_id, &tenant_id)
    }

    /// Case-insensitive.
    pub fn find_by_email(&self, email: &str) -> Option<TenantReadModel> {
        let email = email.trim().to_lowercase();
        self.store
            .list_all()
            .into_iter()
            .map(|(_, t)| t)
            .find(|t| t.email == email)
    }

    /// Sorted by name; `query` matches name or email, case-insensitively.
    pub fn search(&self, query: Option<&str>) -> Vec<TenantReadModel> {
        let q = query.map(|q| q.trim().to_lowercase()).filter(|q| !q.is_empty());
        let mut all: Vec<_> = self
            .store
            .list_all()
            .into_iter()
            .map(|(_, t)| t)
            .filter(|t| match &q {
                Some(q) => t.name.to_lowercase().contains(q) || t.email.contains(q),
                None => true,
            })
            .collect();
        all.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        all
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != streams::TENANT_ACCOUNT {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        if !self.cursors.is_next(tenant_id, aggregate_id, seq)? {
            return Ok(());
        }

        let ev: TenantAccountEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let event_tenant = match &ev {
            TenantAccountEvent::TenantRegistered(e) => e.tenant_id,
            TenantAccountEvent::TenantPlanChanged(e) => e.tenant_id,
            TenantAccountEvent::TenantActivated(e) => e.tenant_id,
            TenantAccountEvent::TenantDeactivated(e) => e.tenant_id,
        };
        if event_tenant != tenant_id {
            return Err(ProjectionError::TenantIsolation(
                "account event does not belong to this tenant".to_string(),
            ));
        }

        match ev {
            TenantAccountEvent::TenantRegistered(e) => {
                self.store.upsert(
                    tenant_id,
                    tenant_id,
                    TenantReadModel {
                        tenant_id,
                        name: e.name,
                        email: e.email,
                        password_hash: e.password_hash,
                        plan: e.plan,
                        is_active: true,
                        registered_at: e.occurred_at,
                    },
                );
            }
            TenantAccountEvent::TenantPlanChanged(e) => self.update(tenant_id, |t| t.plan = e.to),
            TenantAccountEvent::TenantActivated(_) => self.update(tenant_id, |t| t.is_active = true),
            TenantAccountEvent::TenantDeactivated(_) => self.update(tenant_id, |t| t.is_active = false),
        }

        self.cursors.advance(tenant_id, aggregate_id, seq);
        Ok(())
    }

    fn update(&self, tenant_id: TenantId, change: impl FnOnce(&mut TenantReadModel)) {
        if let Some(mut rm) = self.store.get(tenant_id, &tenant_id) {
            change(&mut rm);
            self.store.upsert(tenant_id, tenant_id, rm);
        }
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

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use uuid::Uuid;

    use ferrepos_billing::{TenantDeactivated, TenantPlanChanged, TenantRegistered};
    use ferrepos_core::AggregateId;

    use super::*;
    use crate::read_model::InMemoryTenantStore;

    fn envelope(tenant_id: TenantId, seq: u64, ev: TenantAccountEvent) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            tenant_id,
            AggregateId::from(tenant_id),
            streams::TENANT_ACCOUNT.to_string(),
            seq,
            serde_json::to_value(ev).unwrap(),
        )
    }

    fn registered(tenant_id: TenantId, name: &str, email: &str) -> TenantAccountEvent {
        TenantAccountEvent::TenantRegistered(TenantRegistered {
            tenant_id,
            name: name.to_string(),
            email: email.to_string(),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$ZGlnZXN0".to_string(),
            plan: PlanId::Free,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn directory_tracks_plan_and_status() {
        let proj = TenantDirectoryProjection::new(Arc::new(InMemoryTenantStore::new()));
        let t = TenantId::new();
        proj.apply_envelope(&envelope(t, 1, registered(t, "El Tornillo", "dueno@eltornillo.com.py"))).unwrap();
        proj.apply_envelope(&envelope(
            t,
            2,
            TenantAccountEvent::TenantPlanChanged(TenantPlanChanged {
                tenant_id: t,
                from: PlanId::Free,
                to: PlanId::Pro,
                occurred_at: Utc::now(),
            }),
        ))
        .unwrap();
        proj.apply_envelope(&envelope(
            t,
            3,
            TenantAccountEvent::TenantDeactivated(TenantDeactivated {
                tenant_id: t,
                occurred_at: Utc::now(),
            }),
        ))
        .unwrap();

        let rm = proj.find_by_email(" DUENO@eltornillo.com.py").unwrap();
        assert_eq!(rm.tenant_id, t);
        assert_eq!(rm.plan, PlanId::Pro);
        assert!(!rm.is_active);
    }

    #[test]
    fn search_spans_all_tenants_and_hides_password_hash() {
        let proj = TenantDirectoryProjection::new(Arc::new(InMemoryTenantStore::new()));
        let (a, b) = (TenantId::new(), TenantId::new());
        proj.apply_envelope(&envelope(a, 1, registered(a, "Ferretería Central", "central@mail.com"))).unwrap();
        proj.apply_envelope(&envelope(b, 1, registered(b, "Bulonera Sur", "sur@mail.com"))).unwrap();

        assert_eq!(proj.search(None).len(), 2);
        assert_eq!(proj.search(Some("central"))[0].tenant_id, a);
        assert_eq!(proj.search(Some("SUR@"))[0].tenant_id, b);

        let json = serde_json::to_value(proj.get(a).unwrap()).unwrap();
        assert!(json.get("password_hash").is_none());
    }
}
