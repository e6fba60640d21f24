//! Parties domain module: the store's customers (event-sourced).
//!
//! Business rules only; no IO, no HTTP, no storage.

pub mod customer;
pub mod document;

pub use customer::{
    ContactInfo, Customer, CustomerChanges, CustomerCommand, CustomerEvent, CustomerId,
    CustomerRegistered, CustomerUpdated, RegisterCustomer, UpdateCustomer,
};
pub use document::{DocumentKind, TaxDocument};
