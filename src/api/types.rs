//! # Wire Types
//!
//! The checkout document and its pieces, as the REST backend ships them.
//! Everything derives `Serialize`/`Deserialize`; field names are the wire
//! names. The document is a snapshot - services mutate via endpoints and
//! receive a fresh document back, they never patch locally and hope.

use serde::{Deserialize, Serialize};

/// Top-level checkout state: who is buying what, shipped how, paid how.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct CheckoutDoc {
    #[serde(default)]
    pub customer: Customer,
    #[serde(default)]
    pub basket: Basket,
    #[serde(default)]
    pub shipping: ShippingSelection,
    #[serde(default)]
    pub payment: PaymentSelection,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Customer {
    pub id: Option<u64>,
    pub email: Option<String>,
    /// Free-text reference the customer wants printed on the invoice.
    pub sign: Option<String>,
    /// Order comment.
    pub order_info: Option<String>,
    pub invoice_address_id: Option<u64>,
    pub shipping_address_id: Option<u64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Basket {
    #[serde(default)]
    pub items: Vec<BasketItem>,
    #[serde(default)]
    pub totals: Totals,
    pub coupon: Option<Coupon>,
}

impl Basket {
    pub fn item(&self, basket_item_id: u64) -> Option<&BasketItem> {
        self.items.iter().find(|i| i.id == basket_item_id)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// One basket row. `id` identifies the row, `item_id` the article.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BasketItem {
    pub id: u64,
    pub item_id: u64,
    pub name: String,
    pub quantity: u32,
    pub unit_price: f64,
    #[serde(default)]
    pub order_params: Vec<OrderParamValue>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Totals {
    pub item_sum: f64,
    pub discount: f64,
    pub shipping: f64,
    pub vat: f64,
    pub gross: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Coupon {
    pub code: String,
    pub discount: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ShippingSelection {
    pub profile_id: Option<u64>,
    #[serde(default)]
    pub profiles: Vec<ShippingProfile>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ShippingProfile {
    pub id: u64,
    pub name: String,
    pub price: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct PaymentSelection {
    pub method_id: Option<u64>,
    #[serde(default)]
    pub methods: Vec<PaymentMethod>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PaymentMethod {
    pub id: u64,
    pub name: String,
}

/// A filled order parameter ("engraving: MAX", "size: 42").
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OrderParamValue {
    pub param_id: u64,
    pub value: String,
}

/// A parameter an article requires before it may enter the basket. The
/// backend sends these in the error detail when a bare add is rejected.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OrderParamDef {
    pub id: u64,
    pub name: String,
}

/// Application-level error codes carried in the error stack.
pub mod codes {
    /// The article needs order parameters and none were sent.
    pub const ORDER_PARAMS_REQUIRED: u32 = 100;
    /// Coupon code unknown or expired.
    pub const COUPON_INVALID: u32 = 301;
    /// Login rejected.
    pub const LOGIN_INVALID: u32 = 401;
    /// Order cannot be placed (empty basket, missing selections).
    pub const ORDER_REJECTED: u32 = 501;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Contract test: the document round-trips through the wire format
    /// without losing fields.
    #[test]
    fn test_checkout_doc_round_trip() {
        let doc = CheckoutDoc {
            customer: Customer {
                id: Some(77),
                email: Some("anna@example.com".to_string()),
                sign: Some("PO-1841".to_string()),
                order_info: None,
                invoice_address_id: Some(5),
                shipping_address_id: Some(6),
            },
            basket: Basket {
                items: vec![BasketItem {
                    id: 1,
                    item_id: 404,
                    name: "Desk lamp".to_string(),
                    quantity: 2,
                    unit_price: 24.95,
                    order_params: vec![OrderParamValue {
                        param_id: 9,
                        value: "brass".to_string(),
                    }],
                }],
                totals: Totals {
                    item_sum: 49.90,
                    discount: 0.0,
                    shipping: 4.95,
                    vat: 8.76,
                    gross: 54.85,
                },
                coupon: None,
            },
            shipping: ShippingSelection {
                profile_id: Some(1),
                profiles: vec![ShippingProfile {
                    id: 1,
                    name: "Standard".to_string(),
                    price: 4.95,
                }],
            },
            payment: PaymentSelection {
                method_id: None,
                methods: vec![PaymentMethod {
                    id: 2,
                    name: "Invoice".to_string(),
                }],
            },
        };
        let wire = serde_json::to_string(&doc).unwrap();
        let back: CheckoutDoc = serde_json::from_str(&wire).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_sparse_doc_deserializes_with_defaults() {
        let doc: CheckoutDoc = serde_json::from_str("{}").unwrap();
        assert!(doc.basket.items.is_empty());
        assert_eq!(doc.customer.id, None);
        assert_eq!(doc.basket.totals.gross, 0.0);
    }

    #[test]
    fn test_basket_item_lookup() {
        let basket = Basket {
            items: vec![BasketItem {
                id: 3,
                item_id: 404,
                name: "Desk lamp".to_string(),
                quantity: 1,
                unit_price: 24.95,
                order_params: Vec::new(),
            }],
            ..Default::default()
        };
        assert!(basket.item(3).is_some());
        assert!(basket.item(4).is_none());
        assert!(!basket.is_empty());
    }
}
