//! Reseller cart pricing.
//!
//! A seller resells catalog products at their own selling price; the difference to
//! the catalog base price is the seller's profit. Lines are keyed by product and
//! the canonical set of selected options, and adding the same key twice merges
//! the quantities into one line.

use crate::error::PayoutError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductId(pub u64);

/// Identity of a cart line: a product plus its selected options.
///
/// Options are held in a `BTreeMap`, so two selections listing the same
/// option values in a different order produce the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemKey {
    pub product_id: ProductId,
    pub selected_options: BTreeMap<String, String>,
}

impl CartItemKey {
    pub fn new<I, K, V>(product_id: ProductId, options: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            product_id,
            selected_options: options
                .into_iter()
                .map(|(k, v)| (k.into().trim().to_string(), v.into().trim().to_string()))
                .collect(),
        }
    }
}

/// A cart line. Deserialized lines go through [`CartItem::new`], so a stored
/// line breaking the pricing rules is refused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "CartItemRecord")]
pub struct CartItem {
    pub key: CartItemKey,
    pub name: String,
    pub base_price: Decimal,
    pub selling_price: Decimal,
    pub quantity: u32,
    pub image_url: Option<String>,
}

impl CartItem {
    pub fn new(
        key: CartItemKey,
        name: impl Into<String>,
        base_price: Decimal,
        selling_price: Decimal,
        quantity: u32,
        image_url: Option<String>,
    ) -> Result<Self, PayoutError> {
        if base_price < Decimal::ZERO {
            return Err(PayoutError::ValidationError(
                "base price must not be negative".to_string(),
            ));
        }
        if selling_price < base_price {
            return Err(PayoutError::ValidationError(format!(
                "selling price {selling_price} is below base price {base_price}"
            )));
        }
        if quantity == 0 {
            return Err(PayoutError::ValidationError(
                "quantity must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            key,
            name: name.into(),
            base_price,
            selling_price,
            quantity,
            image_url,
        })
    }

    /// Profit earned on a single unit.
    pub fn unit_profit(&self) -> Decimal {
        self.selling_price - self.base_price
    }
}

/// Unchecked wire shape of a [`CartItem`].
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CartItemRecord {
    key: CartItemKey,
    name: String,
    base_price: Decimal,
    selling_price: Decimal,
    quantity: u32,
    #[serde(default)]
    image_url: Option<String>,
}

impl TryFrom<CartItemRecord> for CartItem {
    type Error = PayoutError;

    fn try_from(record: CartItemRecord) -> Result<Self, Self::Error> {
        Self::new(
            record.key,
            record.name,
            record.base_price,
            record.selling_price,
            record.quantity,
            record.image_url,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartTotals {
    pub subtotal: Decimal,
    pub total_profit: Decimal,
    pub total_base_price: Decimal,
    pub item_count: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a cart from persisted lines, merging any duplicate keys.
    pub fn from_items(items: Vec<CartItem>) -> Self {
        let mut cart = Self::new();
        for item in items {
            cart.add(item);
        }
        cart
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn get(&self, key: &CartItemKey) -> Option<&CartItem> {
        self.items.iter().find(|item| &item.key == key)
    }

    fn get_mut(&mut self, key: &CartItemKey) -> Option<&mut CartItem> {
        self.items.iter_mut().find(|item| &item.key == key)
    }

    /// Adds a line, or merges its quantity into the existing line with the same
    /// key. The merged line takes the latest prices.
    pub fn add(&mut self, item: CartItem) {
        match self.get_mut(&item.key) {
            Some(existing) => {
                existing.quantity = existing.quantity.saturating_add(item.quantity);
                existing.base_price = item.base_price;
                existing.selling_price = item.selling_price;
            }
            None => self.items.push(item),
        }
    }

    pub fn increment(&mut self, key: &CartItemKey) {
        if let Some(item) = self.get_mut(key) {
            item.quantity = item.quantity.saturating_add(1);
        }
    }

    /// Decrements a line's quantity; a line at quantity 1 is left as is.
    pub fn decrement(&mut self, key: &CartItemKey) {
        if let Some(item) = self.get_mut(key)
            && item.quantity > 1
        {
            item.quantity -= 1;
        }
    }

    /// Sets a line's quantity; zero removes the line.
    pub fn set_quantity(&mut self, key: &CartItemKey, quantity: u32) {
        if quantity == 0 {
            self.remove(key);
        } else if let Some(item) = self.get_mut(key) {
            item.quantity = quantity;
        }
    }

    pub fn remove(&mut self, key: &CartItemKey) -> Option<CartItem> {
        let index = self.items.iter().position(|item| &item.key == key)?;
        Some(self.items.remove(index))
    }

    /// Empties the cart once its order is placed.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn totals(&self) -> CartTotals {
        self.items
            .iter()
            .fold(CartTotals::default(), |mut totals, item| {
                let quantity = Decimal::from(item.quantity);
                totals.subtotal += item.selling_price * quantity;
                totals.total_profit += item.unit_profit() * quantity;
                totals.total_base_price += item.base_price * quantity;
                totals.item_count += u64::from(item.quantity);
                totals
            })
    }
}
