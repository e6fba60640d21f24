//! Sales domain module (event-sourced).
//!
//! A [`Cart`] collects lines at the counter and enforces quantity rules against
//! the stock it was shown; checkout turns it into a [`Sale`], the immutable
//! record with item snapshot and IVA totals.

pub mod cart;
pub mod sale;

pub use cart::{Cart, CartProduct};
pub use sale::{
    CompleteSale, CustomerRef, DEFAULT_CUSTOMER_NAME, Sale, SaleCommand, SaleCompleted, SaleEvent,
    SaleId, SaleItem,
};
