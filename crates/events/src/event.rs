use chrono::{DateTime, Utc};

/// A fact recorded by an aggregate.
///
/// Events are immutable, versioned for schema evolution, and only ever appended.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable name, e.g. `"sales.sale.completed"`.
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;

    /// Business time.
    fn occurred_at(&self) -> DateTime<Utc>;
}
