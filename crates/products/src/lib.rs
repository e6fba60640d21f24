//! Products domain module (event-sourced).
//!
//! Catalog entries and their on-hand stock live on one aggregate, so a sale
//! deducting units is checked against the same stream that owns the price.
//! Categories are a separate, tiny aggregate.

pub mod category;
pub mod product;

pub use category::{
    Category, CategoryCommand, CategoryCreated, CategoryEvent, CategoryId, CreateCategory,
};
pub use product::{
    AdjustStock, CreateProduct, Product, ProductChanges, ProductCommand, ProductCreated,
    ProductEvent, ProductId, ProductRemoved, ProductUpdated, RemoveProduct, StockAdjusted,
    StockReason, UpdateProduct,
};
