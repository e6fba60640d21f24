//! Append-only, tenant-scoped event streams.
//!
//! One stream per aggregate instance, keyed by `(tenant_id, aggregate_id)`.
//! The trait is the storage seam; [`InMemoryEventStore`] is the only backend.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
