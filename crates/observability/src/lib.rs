//! Tracing and logging setup shared by the binaries.

pub mod tracing;

pub use crate::tracing::{LogFormat, init};
