//! Cart types.

use rust_decimal::Decimal;

use bazaar_core::{CartItemId, ProductId, UserId, line_subtotal};

use super::Product;

/// A stored cart row: one user's intent to buy `quantity` of a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartItem {
    pub id: CartItemId,
    pub user_id: UserId,
    pub product_id: ProductId,
    /// Always positive.
    pub quantity: i32,
}

/// A cart row resolved against the product's current catalog values.
#[derive(Debug, Clone)]
pub struct CartLine {
    pub item_id: CartItemId,
    pub quantity: i32,
    pub product: Product,
}

impl CartLine {
    /// `quantity × price` for this line, unrounded.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        line_subtotal(self.quantity, self.product.price)
    }

    /// Whether current stock covers this line.
    #[must_use]
    pub const fn is_covered_by_stock(&self) -> bool {
        self.product.amount >= self.quantity
    }
}
