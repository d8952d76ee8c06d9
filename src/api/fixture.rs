//! # Fixture Transport
//!
//! A canned shop backend behind the [`RestTransport`] trait. Holds a real
//! checkout document and mutates it the way the live backend would, so
//! the demo shell and the integration tests exercise the full pipeline
//! without a server. Every request is logged for assertions.
//!
//! The catalog, coupon codes and credentials are small and fixed; see the
//! constants below.

use std::cell::{Cell, RefCell};

use async_trait::async_trait;
use log::debug;
use serde_json::{Value, json};

use super::transport::{ApiError, ApiResponse, ErrorEntry, Method, RestTransport};
use super::types::{
    BasketItem, CheckoutDoc, Coupon, OrderParamDef, OrderParamValue, PaymentMethod,
    ShippingProfile, codes,
};

/// Payment method that hands the buyer off to an external page.
pub const REDIRECT_METHOD_ID: u64 = 3;
/// The one coupon code the fixture accepts.
pub const VALID_COUPON: &str = "SAVE5";
pub const COUPON_DISCOUNT: f64 = 5.0;
pub const VALID_EMAIL: &str = "anna@example.com";
pub const VALID_PASSWORD: &str = "secret";

struct Article {
    item_id: u64,
    name: &'static str,
    unit_price: f64,
    required_params: Vec<OrderParamDef>,
}

fn catalog() -> Vec<Article> {
    vec![
        Article {
            item_id: 404,
            name: "Desk lamp",
            unit_price: 24.95,
            required_params: Vec::new(),
        },
        Article {
            item_id: 405,
            name: "Engraved pen",
            unit_price: 9.95,
            required_params: vec![OrderParamDef {
                id: 9,
                name: "engraving".to_string(),
            }],
        },
    ]
}

pub struct FixtureTransport {
    doc: RefCell<CheckoutDoc>,
    next_row_id: Cell<u64>,
    next_address_id: Cell<u64>,
    next_order_id: Cell<u64>,
    requests: RefCell<Vec<(Method, String)>>,
}

impl FixtureTransport {
    pub fn new() -> Self {
        let doc = CheckoutDoc {
            shipping: super::types::ShippingSelection {
                profile_id: None,
                profiles: vec![
                    ShippingProfile {
                        id: 1,
                        name: "Standard".to_string(),
                        price: 4.95,
                    },
                    ShippingProfile {
                        id: 2,
                        name: "Express".to_string(),
                        price: 9.95,
                    },
                ],
            },
            payment: super::types::PaymentSelection {
                method_id: None,
                methods: vec![
                    PaymentMethod {
                        id: 1,
                        name: "Prepayment".to_string(),
                    },
                    PaymentMethod {
                        id: 2,
                        name: "Invoice".to_string(),
                    },
                    PaymentMethod {
                        id: REDIRECT_METHOD_ID,
                        name: "PayNow".to_string(),
                    },
                ],
            },
            ..CheckoutDoc::default()
        };
        Self {
            doc: RefCell::new(doc),
            next_row_id: Cell::new(1),
            next_address_id: Cell::new(10),
            next_order_id: Cell::new(5000),
            requests: RefCell::new(Vec::new()),
        }
    }

    /// Current backend-side document, for assertions.
    pub fn doc(&self) -> CheckoutDoc {
        self.doc.borrow().clone()
    }

    /// Every request seen so far, in order.
    pub fn requests(&self) -> Vec<(Method, String)> {
        self.requests.borrow().clone()
    }

    /// Put a row into the basket without going through the endpoint.
    pub fn seed_item(&self, item_id: u64, quantity: u32) {
        let row_id = self.next_row_id.get();
        self.next_row_id.set(row_id + 1);
        let article_name = catalog()
            .iter()
            .find(|a| a.item_id == item_id)
            .map(|a| a.name.to_string())
            .unwrap_or_else(|| format!("item {item_id}"));
        let unit_price = catalog()
            .iter()
            .find(|a| a.item_id == item_id)
            .map(|a| a.unit_price)
            .unwrap_or(1.0);
        let mut doc = self.doc.borrow_mut();
        doc.basket.items.push(BasketItem {
            id: row_id,
            item_id,
            name: article_name,
            quantity,
            unit_price,
            order_params: Vec::new(),
        });
        recompute_totals(&mut doc);
    }

    fn ok(&self) -> Result<ApiResponse, ApiError> {
        let doc = self.doc.borrow();
        serde_json::to_value(&*doc)
            .map(ApiResponse::new)
            .map_err(|e| ApiError::Payload(e.to_string()))
    }

    // -----------------------------------------------------------------
    // Endpoints
    // -----------------------------------------------------------------

    fn add_item(&self, body: &Value) -> Result<ApiResponse, ApiError> {
        let item_id = field_u64(body, "item_id").ok_or_else(|| bad_request("item_id missing"))?;
        let quantity = field_u64(body, "quantity").unwrap_or(1) as u32;
        let params: Vec<OrderParamValue> = body
            .get("params")
            .cloned()
            .map(|p| serde_json::from_value(p).unwrap_or_default())
            .unwrap_or_default();

        let articles = catalog();
        let article = articles
            .iter()
            .find(|a| a.item_id == item_id)
            .ok_or_else(|| not_found(&format!("unknown article {item_id}")))?;

        if !article.required_params.is_empty() && params.is_empty() {
            return Err(ApiError::Api {
                status: 422,
                messages: vec![ErrorEntry {
                    code: codes::ORDER_PARAMS_REQUIRED,
                    message: format!("article {item_id} requires order parameters"),
                    detail: serde_json::to_value(&article.required_params)
                        .unwrap_or(Value::Null),
                }],
            });
        }

        let mut doc = self.doc.borrow_mut();
        let existing = doc
            .basket
            .items
            .iter_mut()
            .find(|row| row.item_id == item_id && row.order_params == params);
        match existing {
            Some(row) => row.quantity += quantity,
            None => {
                let row_id = self.next_row_id.get();
                self.next_row_id.set(row_id + 1);
                doc.basket.items.push(BasketItem {
                    id: row_id,
                    item_id,
                    name: article.name.to_string(),
                    quantity,
                    unit_price: article.unit_price,
                    order_params: params,
                });
            }
        }
        recompute_totals(&mut doc);
        drop(doc);
        self.ok()
    }

    fn set_quantity(&self, row_id: u64, body: &Value) -> Result<ApiResponse, ApiError> {
        let quantity = field_u64(body, "quantity")
            .ok_or_else(|| bad_request("quantity missing"))? as u32;
        let mut doc = self.doc.borrow_mut();
        if !doc.basket.items.iter().any(|row| row.id == row_id) {
            return Err(not_found(&format!("no basket row {row_id}")));
        }
        if quantity == 0 {
            doc.basket.items.retain(|row| row.id != row_id);
        } else if let Some(row) = doc.basket.items.iter_mut().find(|row| row.id == row_id) {
            row.quantity = quantity;
        }
        recompute_totals(&mut doc);
        drop(doc);
        self.ok()
    }

    fn remove_item(&self, row_id: u64) -> Result<ApiResponse, ApiError> {
        let mut doc = self.doc.borrow_mut();
        let before = doc.basket.items.len();
        doc.basket.items.retain(|row| row.id != row_id);
        if doc.basket.items.len() == before {
            return Err(not_found(&format!("no basket row {row_id}")));
        }
        recompute_totals(&mut doc);
        drop(doc);
        self.ok()
    }

    fn add_coupon(&self, body: &Value) -> Result<ApiResponse, ApiError> {
        let code = field_str(body, "code").ok_or_else(|| bad_request("code missing"))?;
        if code != VALID_COUPON {
            return Err(ApiError::Api {
                status: 422,
                messages: vec![ErrorEntry {
                    code: codes::COUPON_INVALID,
                    message: format!("coupon {code:?} is not valid"),
                    detail: Value::Null,
                }],
            });
        }
        let mut doc = self.doc.borrow_mut();
        doc.basket.coupon = Some(Coupon {
            code,
            discount: COUPON_DISCOUNT,
        });
        recompute_totals(&mut doc);
        drop(doc);
        self.ok()
    }

    fn remove_coupon(&self) -> Result<ApiResponse, ApiError> {
        let mut doc = self.doc.borrow_mut();
        doc.basket.coupon = None;
        recompute_totals(&mut doc);
        drop(doc);
        self.ok()
    }

    fn login(&self, body: &Value) -> Result<ApiResponse, ApiError> {
        let email = field_str(body, "email").unwrap_or_default();
        let password = field_str(body, "password").unwrap_or_default();
        if email != VALID_EMAIL || password != VALID_PASSWORD {
            return Err(ApiError::Api {
                status: 401,
                messages: vec![ErrorEntry {
                    code: codes::LOGIN_INVALID,
                    message: "invalid credentials".to_string(),
                    detail: Value::Null,
                }],
            });
        }
        let mut doc = self.doc.borrow_mut();
        doc.customer.id = Some(77);
        doc.customer.email = Some(email);
        drop(doc);
        self.ok()
    }

    fn register_guest(&self, body: &Value) -> Result<ApiResponse, ApiError> {
        let email = field_str(body, "email").ok_or_else(|| bad_request("email missing"))?;
        let mut doc = self.doc.borrow_mut();
        doc.customer.id = None;
        doc.customer.email = Some(email);
        drop(doc);
        self.ok()
    }

    fn logout(&self) -> Result<ApiResponse, ApiError> {
        self.doc.borrow_mut().customer = Default::default();
        self.ok()
    }

    fn save_shipping_address(&self, body: &Value) -> Result<ApiResponse, ApiError> {
        let address_id = match field_u64(body, "address_id") {
            Some(id) => id,
            None => {
                // New address: the fields themselves are opaque here, the
                // fixture just allocates an id for them.
                let id = self.next_address_id.get();
                self.next_address_id.set(id + 1);
                id
            }
        };
        let mut doc = self.doc.borrow_mut();
        doc.customer.shipping_address_id = Some(address_id);
        // A changed address invalidates the dependent selections.
        doc.shipping.profile_id = None;
        doc.payment.method_id = None;
        recompute_totals(&mut doc);
        drop(doc);
        self.ok()
    }

    fn set_customer_sign(&self, body: &Value) -> Result<ApiResponse, ApiError> {
        let mut doc = self.doc.borrow_mut();
        doc.customer.sign = field_str(body, "sign").filter(|s| !s.is_empty());
        doc.customer.order_info = field_str(body, "order_info").filter(|s| !s.is_empty());
        drop(doc);
        self.ok()
    }

    fn set_shipping_profile(&self, profile_id: u64) -> Result<ApiResponse, ApiError> {
        let mut doc = self.doc.borrow_mut();
        if !doc.shipping.profiles.iter().any(|p| p.id == profile_id) {
            return Err(not_found(&format!("no shipping profile {profile_id}")));
        }
        doc.shipping.profile_id = Some(profile_id);
        recompute_totals(&mut doc);
        drop(doc);
        self.ok()
    }

    fn set_payment_method(&self, method_id: u64) -> Result<ApiResponse, ApiError> {
        let mut doc = self.doc.borrow_mut();
        if !doc.payment.methods.iter().any(|m| m.id == method_id) {
            return Err(not_found(&format!("no payment method {method_id}")));
        }
        doc.payment.method_id = Some(method_id);
        drop(doc);
        self.ok()
    }

    fn place_order(&self) -> Result<ApiResponse, ApiError> {
        let mut doc = self.doc.borrow_mut();
        let mut problems = Vec::new();
        if doc.basket.items.is_empty() {
            problems.push("the basket is empty");
        }
        if doc.payment.method_id.is_none() {
            problems.push("no payment method selected");
        }
        if doc.shipping.profile_id.is_none() {
            problems.push("no shipping profile selected");
        }
        if !problems.is_empty() {
            return Err(ApiError::Api {
                status: 422,
                messages: problems
                    .into_iter()
                    .map(|message| ErrorEntry {
                        code: codes::ORDER_REJECTED,
                        message: message.to_string(),
                        detail: Value::Null,
                    })
                    .collect(),
            });
        }

        let order_id = self.next_order_id.get();
        self.next_order_id.set(order_id + 1);
        let redirect = doc.payment.method_id == Some(REDIRECT_METHOD_ID);
        doc.basket.items.clear();
        doc.basket.coupon = None;
        recompute_totals(&mut doc);
        drop(doc);

        if redirect {
            Ok(ApiResponse::new(json!({
                "redirect": format!("https://pay.example/session/{order_id}")
            })))
        } else {
            Ok(ApiResponse::new(json!({ "order_id": order_id })))
        }
    }

    // -----------------------------------------------------------------
    // Markup fragments
    // -----------------------------------------------------------------

    fn container(&self, group: &str, name: &str) -> Result<ApiResponse, ApiError> {
        match (group, name) {
            ("checkout", "basket-preview") => Ok(ApiResponse::new(self.basket_preview())),
            ("checkout", "basket-totals") => Ok(ApiResponse::new(self.basket_totals())),
            ("checkout", "payment-methods") => Ok(ApiResponse::new(self.payment_methods())),
            ("item", name) => Ok(ApiResponse::new(json!([{
                "tag": "div",
                "classes": ["item-container"],
                "text": format!("item container {name}")
            }]))),
            _ => Err(not_found(&format!("no container {group}/{name}"))),
        }
    }

    fn basket_preview(&self) -> Value {
        let doc = self.doc.borrow();
        let rows: Vec<Value> = doc
            .basket
            .items
            .iter()
            .map(|row| {
                json!({
                    "tag": "li",
                    "attrs": {"data-basket-item": row.id.to_string()},
                    "children": [
                        {"tag": "span", "classes": ["item-name"],
                         "text": format!("{} × {}", row.name, row.quantity)},
                        {"tag": "input", "classes": ["quantity-input"],
                         "attrs": {"type": "number", "name": "quantity"},
                         "value": row.quantity.to_string()},
                        {"tag": "button",
                         "attrs": {"data-shop-action": "remove-item"},
                         "text": "Remove"}
                    ]
                })
            })
            .collect();
        json!([{"tag": "ul", "classes": ["basket-list"], "children": rows}])
    }

    fn basket_totals(&self) -> Value {
        let totals = &self.doc.borrow().basket.totals;
        let row = |key: &str, amount: f64| {
            json!({
                "tag": "span",
                "attrs": {"data-shop-total": key},
                "text": format!("{amount:.2}")
            })
        };
        json!([{
            "tag": "div",
            "classes": ["basket-totals"],
            "children": [
                row("item-sum", totals.item_sum),
                row("discount", totals.discount),
                row("shipping", totals.shipping),
                row("vat", totals.vat),
                row("gross", totals.gross),
            ]
        }])
    }

    fn payment_methods(&self) -> Value {
        let doc = self.doc.borrow();
        let inputs: Vec<Value> = doc
            .payment
            .methods
            .iter()
            .map(|method| {
                json!({
                    "tag": "label",
                    "children": [
                        {"tag": "input",
                         "attrs": {"type": "radio", "name": "payment_method"},
                         "value": method.id.to_string()},
                        {"tag": "span", "text": method.name}
                    ]
                })
            })
            .collect();
        json!([{"tag": "div", "classes": ["payment-methods"], "children": inputs}])
    }

    fn category_content(&self, category_id: u64) -> ApiResponse {
        let doc = self.doc.borrow();
        let note = if doc.basket.items.is_empty() {
            "Your basket is empty."
        } else {
            "Keep shopping."
        };
        ApiResponse::new(json!([{
            "tag": "div",
            "classes": ["category-view"],
            "attrs": {"data-category-id": category_id.to_string()},
            "text": note
        }]))
    }
}

impl Default for FixtureTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl RestTransport for FixtureTransport {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<ApiResponse, ApiError> {
        debug!("fixture: {method} {path}");
        self.requests.borrow_mut().push((method, path.to_string()));
        // Complete in a later poll, the way a real network hop would.
        // Concurrent mutations overlap here instead of finishing in
        // registration order.
        tokio::task::yield_now().await;
        let body = body.cloned().unwrap_or(Value::Null);
        let segments: Vec<&str> = path
            .trim_start_matches("/rest/")
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();

        match (method, segments.as_slice()) {
            (Method::Get, ["checkout"]) => self.ok(),
            (Method::Put, ["checkout"]) => {
                let incoming: CheckoutDoc = serde_json::from_value(body)
                    .map_err(|e| ApiError::Payload(e.to_string()))?;
                let mut doc = self.doc.borrow_mut();
                *doc = incoming;
                recompute_totals(&mut doc);
                drop(doc);
                self.ok()
            }
            (Method::Post, ["basket", "items"]) => self.add_item(&body),
            (Method::Put, ["basket", "items", id]) => {
                self.set_quantity(parse_id(id)?, &body)
            }
            (Method::Delete, ["basket", "items", id]) => self.remove_item(parse_id(id)?),
            (Method::Post, ["coupon"]) => self.add_coupon(&body),
            (Method::Delete, ["coupon"]) => self.remove_coupon(),
            (Method::Post, ["customer", "login"]) => self.login(&body),
            (Method::Post, ["customer", "guest"]) => self.register_guest(&body),
            (Method::Post, ["customer", "logout"]) => self.logout(),
            (Method::Put, ["checkout", "customer-sign"]) => self.set_customer_sign(&body),
            (Method::Put, ["checkout", "shipping-address"]) => {
                self.save_shipping_address(&body)
            }
            (Method::Put, ["checkout", "shipping-profile", id]) => {
                self.set_shipping_profile(parse_id(id)?)
            }
            (Method::Put, ["checkout", "payment-method", id]) => {
                self.set_payment_method(parse_id(id)?)
            }
            (Method::Post, ["checkout", "place-order"]) => self.place_order(),
            (Method::Get, ["containers", group, name]) => self.container(group, name),
            (Method::Get, ["categoryview", id]) => Ok(self.category_content(parse_id(id)?)),
            _ => Err(not_found(&format!("no endpoint {method} {path}"))),
        }
    }
}

// =====================================================================
// Helpers
// =====================================================================

fn recompute_totals(doc: &mut CheckoutDoc) {
    let item_sum: f64 = doc
        .basket
        .items
        .iter()
        .map(|row| row.unit_price * f64::from(row.quantity))
        .sum();
    let discount = doc
        .basket
        .coupon
        .as_ref()
        .map(|c| c.discount.min(item_sum))
        .unwrap_or(0.0);
    let shipping = doc
        .shipping
        .profile_id
        .and_then(|id| doc.shipping.profiles.iter().find(|p| p.id == id))
        .map(|p| p.price)
        .unwrap_or(0.0);
    let net = item_sum - discount;
    doc.basket.totals.item_sum = cents(item_sum);
    doc.basket.totals.discount = cents(discount);
    doc.basket.totals.shipping = cents(shipping);
    doc.basket.totals.vat = cents(net * 0.19);
    doc.basket.totals.gross = cents(net + shipping);
}

fn cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Numbers arrive as JSON numbers from services and as strings from
/// serialized forms; accept both.
fn field_u64(body: &Value, name: &str) -> Option<u64> {
    match body.get(name)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn field_str(body: &Value, name: &str) -> Option<String> {
    body.get(name).and_then(Value::as_str).map(str::to_string)
}

fn parse_id(segment: &str) -> Result<u64, ApiError> {
    segment
        .parse()
        .map_err(|_| bad_request(&format!("bad id {segment:?}")))
}

fn bad_request(message: &str) -> ApiError {
    ApiError::Api {
        status: 400,
        messages: vec![ErrorEntry {
            code: 0,
            message: message.to_string(),
            detail: Value::Null,
        }],
    }
}

fn not_found(message: &str) -> ApiError {
    ApiError::Api {
        status: 404,
        messages: vec![ErrorEntry {
            code: 0,
            message: message.to_string(),
            detail: Value::Null,
        }],
    }
}

// =====================================================================
// Tests
// =====================================================================
