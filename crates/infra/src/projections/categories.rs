use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use ferrepos_core::TenantId;
use ferrepos_events::EventEnvelope;
use ferrepos_products::{CategoryEvent, CategoryId};

use super::{ProjectionError, StreamCursors};
use crate::read_model::TenantStore;
use crate::streams;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryReadModel {
    pub category_id: CategoryId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct CategoriesProjection<S> {
    store: S,
    cursors: StreamCursors,
}

impl<S> CategoriesProjection<S>
where
    S: TenantStore<CategoryId, CategoryReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    /// Sorted by name.
    pub fn list(&self, tenant_id: TenantId) -> Vec<CategoryReadModel> {
        let mut all = self.store.list(tenant_id);
        all.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        all
    }

    pub fn find_by_name(&self, tenant_id: TenantId, name: &str) -> Option<CategoryReadModel> {
        let name = name.trim().to_lowercase();
        self.store
            .list(tenant_id)
            .into_iter()
            .find(|c| c.name.to_lowercase() == name)
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != streams::CATEGORY {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        if !self.cursors.is_next(tenant_id, aggregate_id, seq)? {
            return Ok(());
        }

        let ev: CategoryEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match ev {
            CategoryEvent::CategoryCreated(e) => {
                if e.tenant_id != tenant_id || e.category_id.0 != aggregate_id {
                    return Err(ProjectionError::TenantIsolation(
                        "category event does not belong to this stream".to_string(),
                    ));
                }
                self.store.upsert(
                    tenant_id,
                    e.category_id,
                    CategoryReadModel {
                        category_id: e.category_id,
                        name: e.name,
                        created_at: e.occurred_at,
                    },
                );
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

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use uuid::Uuid;

    use ferrepos_core::AggregateId;
    use ferrepos_products::CategoryCreated;

    use super::*;
    use crate::read_model::InMemoryTenantStore;

    fn created(tenant_id: TenantId, name: &str) -> EventEnvelope<JsonValue> {
        let category_id = CategoryId::new(AggregateId::new());
        let ev = CategoryEvent::CategoryCreated(CategoryCreated {
            tenant_id,
            category_id,
            name: name.to_string(),
            occurred_at: Utc::now(),
        });
        EventEnvelope::new(
            Uuid::now_v7(),
            tenant_id,
            category_id.0,
            streams::CATEGORY.to_string(),
            1,
            serde_json::to_value(ev).unwrap(),
        )
    }

    #[test]
    fn names_are_found_case_insensitively_within_the_tenant() {
        let proj = CategoriesProjection::new(Arc::new(InMemoryTenantStore::new()));
        let (t, other) = (TenantId::new(), TenantId::new());
        proj.apply_envelope(&created(t, "Electricidad")).unwrap();
        proj.apply_envelope(&created(t, "Construcción")).unwrap();

        assert!(proj.find_by_name(t, "  electricidad ").is_some());
        assert!(proj.find_by_name(other, "Electricidad").is_none());
        let names: Vec<_> = proj.list(t).into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Construcción", "Electricidad"]);
    }
}
