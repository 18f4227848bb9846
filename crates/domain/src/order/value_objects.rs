//! Value objects for order requests.

use common::ProductId;
use serde::{Deserialize, Serialize};

/// Where an order ships to.
///
/// Flattened into the order JSON as `shippingAddress`, `shippingCity`,
/// `shippingZip` and `shippingCountry`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    #[serde(rename = "shippingAddress")]
    pub address: String,
    #[serde(rename = "shippingCity")]
    pub city: String,
    #[serde(rename = "shippingZip")]
    pub zip: String,
    #[serde(rename = "shippingCountry")]
    pub country: String,
}

impl ShippingAddress {
    pub fn new(
        address: impl Into<String>,
        city: impl Into<String>,
        zip: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            city: city.into(),
            zip: zip.into(),
            country: country.into(),
        }
    }
}

/// One requested line of an order: a product and how many units.
///
/// Two lines naming the same product are kept as separate lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl OrderLineRequest {
    pub fn new(product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// Input to order creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(rename = "items")]
    pub lines: Vec<OrderLineRequest>,
    #[serde(flatten)]
    pub shipping: ShippingAddress,
}

impl CreateOrderRequest {
    pub fn new(lines: Vec<OrderLineRequest>, shipping: ShippingAddress) -> Self {
        Self { lines, shipping }
    }

    /// Total number of units requested across all lines.
    pub fn total_quantity(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_order_request_wire_shape() {
        let json = serde_json::json!({
            "items": [
                { "productId": "SKU-001", "quantity": 2 },
                { "productId": "SKU-002", "quantity": 1 }
            ],
            "shippingAddress": "1 Main Street",
            "shippingCity": "Springfield",
            "shippingZip": "12345",
            "shippingCountry": "US"
        });

        let req: CreateOrderRequest = serde_json::from_value(json).unwrap();
        assert_eq!(req.lines.len(), 2);
        assert_eq!(req.lines[0], OrderLineRequest::new("SKU-001", 2));
        assert_eq!(req.shipping.city, "Springfield");
        assert_eq!(req.total_quantity(), 3);
    }

    #[test]
    fn test_duplicate_products_are_not_merged() {
        let req = CreateOrderRequest::new(
            vec![
                OrderLineRequest::new("SKU-001", 1),
                OrderLineRequest::new("SKU-001", 4),
            ],
            ShippingAddress::new("a", "b", "c", "d"),
        );
        assert_eq!(req.lines.len(), 2);
        assert_eq!(req.total_quantity(), 5);
    }
}
