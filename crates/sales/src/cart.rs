//! Counter-side cart.
//!
//! Each line remembers the stock level it was offered against; quantities stay
//! within `1..=stock`. Stock is re-checked by the product streams at checkout,
//! so a stale cart can still be refused there.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ferrepos_core::{DomainError, DomainResult};
use ferrepos_fiscal::VatRate;
use ferrepos_products::ProductId;

use crate::sale::SaleItem;

/// What the cart needs to know about a catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartProduct {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub price: Decimal,
    pub stock: i64,
    pub vat_rate: VatRate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CartEntry {
    product: CartProduct,
    quantity: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    entries: Vec<CartEntry>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `quantity` units; adding a product already in the cart accumulates.
    pub fn add(&mut self, product: CartProduct, quantity: i64) -> DomainResult<()> {
        if quantity < 1 {
            return Err(DomainError::validation("quantity must be at least 1"));
        }
        if product.stock <= 0 {
            return Err(DomainError::invariant(format!("'{}' is out of stock", product.name)));
        }

        let in_cart = self.quantity_of(product.product_id);
        let wanted = in_cart.saturating_add(quantity);
        if wanted > product.stock {
            return Err(DomainError::invariant(format!(
                "only {} units of '{}' available",
                product.stock, product.name
            )));
        }

        match self.entries.iter_mut().find(|e| e.product.product_id == product.product_id) {
            Some(entry) => {
                entry.quantity = wanted;
                entry.product = product;
            }
            None => self.entries.push(CartEntry { product, quantity }),
        }
        Ok(())
    }

    pub fn quantity_of(&self, product_id: ProductId) -> i64 {
        self.entries
            .iter()
            .find(|e| e.product.product_id == product_id)
            .map(|e| e.quantity)
            .unwrap_or(0)
    }

    /// Item snapshots in insertion order.
    pub fn items(&self) -> Vec<SaleItem> {
        self.entries
            .iter()
            .map(|e| SaleItem {
                product_id: e.product.product_id,
                sku: e.product.sku.clone(),
                name: e.product.name.clone(),
                unit_price: e.product.price,
                quantity: e.quantity,
                vat_rate: e.product.vat_rate,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrepos_core::AggregateId;
    use rust_decimal_macros::dec;

    fn product(stock: i64) -> CartProduct {
        CartProduct {
            product_id: ProductId::new(AggregateId::new()),
            sku: "TAL-500".to_string(),
            name: "Taladro Percutor 500W".to_string(),
            price: dec!(285000),
            stock,
            vat_rate: VatRate::General,
        }
    }

    #[test]
    fn adding_same_product_accumulates() {
        let mut cart = Cart::new();
        let p = product(5);
        cart.add(p.clone(), 2).unwrap();
        cart.add(p.clone(), 3).unwrap();
        assert_eq!(cart.quantity_of(p.product_id), 5);
        let items = cart.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 5);
        assert_eq!(items[0].unit_price, dec!(285000));
    }

    #[test]
    fn cannot_exceed_available_stock() {
        let mut cart = Cart::new();
        let p = product(2);
        cart.add(p.clone(), 2).unwrap();
        assert!(matches!(cart.add(p.clone(), 1), Err(DomainError::InvariantViolation(_))));
        assert_eq!(cart.quantity_of(p.product_id), 2);
    }

    #[test]
    fn out_of_stock_products_cannot_be_added() {
        let mut cart = Cart::new();
        assert!(cart.add(product(0), 1).is_err());
        assert!(cart.items().is_empty());
    }
}
