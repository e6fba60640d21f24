//! `ferrepos-core`: building blocks shared by every FerrePOS domain crate.
//!
//! Nothing in here performs IO: identifiers, the domain error model, and the
//! aggregate contract that the command dispatcher drives.

pub mod aggregate;
pub mod error;
pub mod id;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, TenantId};
pub use value_object::ValueObject;
