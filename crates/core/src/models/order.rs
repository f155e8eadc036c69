//! Customer orders.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{OrderId, OrderStatus, ProductId, UserId};

/// Where an order ships to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingInfo {
    pub name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub pin_code: u32,
}

/// One line of an order. `name`, `photo` and `price` are snapshots taken at
/// checkout so later catalog edits do not rewrite order history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: ProductId,
    pub name: String,
    pub photo: String,
    pub price: Decimal,
    pub quantity: u32,
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(rename = "_id")]
    pub id: OrderId,
    pub shipping_info: ShippingInfo,
    pub user: UserId,
    pub order_items: Vec<OrderItem>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub shipping_charges: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Distinct product IDs referenced by this order, in first-seen order.
    #[must_use]
    pub fn product_ids(&self) -> Vec<ProductId> {
        let mut ids: Vec<ProductId> = Vec::with_capacity(self.order_items.len());
        for item in &self.order_items {
            if !ids.contains(&item.product_id) {
                ids.push(item.product_id);
            }
        }
        ids
    }
}

/// Input for placing an order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub shipping_info: ShippingInfo,
    pub user: UserId,
    pub order_items: Vec<OrderItem>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub shipping_charges: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub status: OrderStatus,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn item(product_id: ProductId, quantity: u32) -> OrderItem {
        OrderItem {
            product_id,
            name: "Lamp".to_owned(),
            photo: String::new(),
            price: Decimal::from(10),
            quantity,
        }
    }

    #[test]
    fn test_product_ids_are_deduplicated_in_order() {
        let a = ProductId::generate();
        let b = ProductId::generate();
        let order = Order {
            id: OrderId::generate(),
            shipping_info: ShippingInfo {
                name: "Asha".to_owned(),
                address: "12 MG Road".to_owned(),
                city: "Pune".to_owned(),
                state: "MH".to_owned(),
                country: "India".to_owned(),
                pin_code: 411_001,
            },
            user: UserId::parse("u1").unwrap(),
            order_items: vec![item(a, 1), item(b, 2), item(a, 3)],
            subtotal: Decimal::ZERO,
            tax: Decimal::ZERO,
            shipping_charges: Decimal::ZERO,
            discount: Decimal::ZERO,
            total: Decimal::ZERO,
            status: OrderStatus::Processing,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert_eq!(order.product_ids(), vec![a, b]);
    }
}
