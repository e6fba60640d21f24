//! Infrastructure layer: event persistence, command dispatch, read models and
//! the cross-aggregate flows built on them (checkout, dashboard).
//!
//! Storage is in memory; the [`event_store::EventStore`] and
//! [`read_model::TenantStore`] traits are the seams for other backends.

pub mod backend;
pub mod checkout;
pub mod command_dispatcher;
pub mod event_store;
pub mod projections;
pub mod read_model;
pub mod reports;
pub mod streams;
