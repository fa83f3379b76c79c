//! Shopping Cart
//!
//! Ordered lines, at most one per product. Totals are recomputed from the
//! lines every time they are asked for.

use serde::Serialize;

use crate::catalog::{CatalogItem, Price};

/// One product in the cart
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartLine {
    pub item: CatalogItem,
    /// Always at least 1
    pub quantity: u32,
}

impl CartLine {
    pub fn subtotal(&self) -> Price {
        self.item.price.times(self.quantity)
    }
}

/// Derived cart totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CartSummary {
    /// Sum of quantities
    pub item_count: u32,
    pub total: Price,
}

#[derive(Debug, Clone, Default)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn quantity_of(&self, id: u32) -> Option<u32> {
        self.lines.iter().find(|l| l.item.id == id).map(|l| l.quantity)
    }

    /// Add one of `item`: bumps the existing line or appends a new one.
    pub fn add(&mut self, item: &CatalogItem) {
        match self.lines.iter_mut().find(|l| l.item.id == item.id) {
            Some(line) => line.quantity = line.quantity.saturating_add(1),
            None => self.lines.push(CartLine {
                item: item.clone(),
                quantity: 1,
            }),
        }
    }

    /// Remove the line for `id`. Returns whether a line was removed.
    pub fn remove(&mut self, id: u32) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.item.id != id);
        self.lines.len() != before
    }

    /// Change a line's quantity by `delta`; the line goes away when the
    /// quantity drops to zero or below and saturates at `u32::MAX` above.
    /// Unknown IDs are ignored.
    pub fn change_quantity(&mut self, id: u32, delta: i64) {
        let Some(pos) = self.lines.iter().position(|l| l.item.id == id) else {
            return;
        };
        let quantity = i64::from(self.lines[pos].quantity).saturating_add(delta);
        if quantity <= 0 {
            self.lines.remove(pos);
        } else {
            self.lines[pos].quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn summary(&self) -> CartSummary {
        CartSummary {
            item_count: self
                .lines
                .iter()
                .fold(0u32, |count, l| count.saturating_add(l.quantity)),
            total: self.lines.iter().map(CartLine::subtotal).sum(),
        }
    }
}
