//! # Checkout Flow
//!
//! The feature service driving the checkout steps: customer sign and
//! order info, shipping address, shipping profile, payment method, and
//! finally placing the order. All document changes go through the hub;
//! dependent selections are invalidated by the backend when the address
//! changes, and the payment container is reloaded to reflect it.

use std::rc::Rc;

use log::debug;
use serde_json::{Value, json};
use thiserror::Error;

use crate::api::{ApiClient, ApiError};
use crate::dom::{NodeId, Page, forms};

use super::checkout::CheckoutHub;
use super::validation::Validation;

#[derive(Debug, Clone, PartialEq)]
pub enum OrderOutcome {
    /// Order booked; show the confirmation.
    Confirmed { order_id: u64 },
    /// Payment happens on an external page.
    Redirect { url: String },
}

#[derive(Debug, Error)]
pub enum PlaceOrderError {
    #[error("required consents are not accepted")]
    ConsentsMissing { failing: Vec<NodeId> },
    #[error(transparent)]
    Api(#[from] ApiError),
}

pub struct CheckoutFlow {
    api: Rc<ApiClient>,
    hub: Rc<CheckoutHub>,
    validation: Rc<Validation>,
    page: Page,
}

impl CheckoutFlow {
    pub fn new(
        api: Rc<ApiClient>,
        hub: Rc<CheckoutHub>,
        validation: Rc<Validation>,
        page: Page,
    ) -> Self {
        Self {
            api,
            hub,
            validation,
            page,
        }
    }

    /// First load of the checkout document.
    pub async fn init(&self) -> Result<(), ApiError> {
        self.hub.load().await
    }

    /// Push the customer sign and order info fields. Returns `false`
    /// without touching the backend when nothing changed.
    pub async fn set_customer_sign_and_info(&self, form: NodeId) -> Result<bool, ApiError> {
        let values = forms::form_values(&self.page, form);
        let sign = text_field(&values, "sign");
        let order_info = text_field(&values, "order_info");

        let customer = self.hub.doc().customer;
        if customer.sign == sign && customer.order_info == order_info {
            debug!("customer sign unchanged, staying idle");
            return Ok(false);
        }

        let _guard = self.api.guarded("customer-sign")?;
        let taken = self.hub.revision();
        let body = json!({
            "sign": sign.unwrap_or_default(),
            "order_info": order_info.unwrap_or_default(),
        });
        let response = self.api.put("/rest/checkout/customer-sign", &body).await?;
        self.hub.apply_response(taken, &response)?;
        Ok(true)
    }

    /// Save the shipping address: an `address_id` field picks an existing
    /// address, anything else is sent as a new one. A successful save
    /// reloads the payment-method container, since the backend drops the
    /// now-unvalidated selections.
    pub async fn save_shipping_address(&self, form: NodeId) -> Result<(), ApiError> {
        let values = forms::form_values(&self.page, form);
        let body = match existing_address_id(&values) {
            Some(id) => json!({ "address_id": id }),
            None => values,
        };

        let applied = {
            let _guard = self.api.guarded("address")?;
            let taken = self.hub.revision();
            let response = self.api.put("/rest/checkout/shipping-address", &body).await?;
            self.hub.apply_response(taken, &response)?
        };
        if applied {
            self.hub.reload_container("payment-methods").await?;
        }
        Ok(())
    }

    pub async fn set_shipping_profile(&self, profile_id: u64) -> Result<(), ApiError> {
        let _guard = self.api.guarded("shipping-profile")?;
        let taken = self.hub.revision();
        let response = self
            .api
            .put(
                &format!("/rest/checkout/shipping-profile/{profile_id}"),
                &Value::Null,
            )
            .await?;
        self.hub.apply_response(taken, &response)?;
        Ok(())
    }

    pub async fn set_payment_method(&self, method_id: u64) -> Result<(), ApiError> {
        let _guard = self.api.guarded("payment-method")?;
        let taken = self.hub.revision();
        let response = self
            .api
            .put(
                &format!("/rest/checkout/payment-method/{method_id}"),
                &Value::Null,
            )
            .await?;
        self.hub.apply_response(taken, &response)?;
        Ok(())
    }

    /// Validate the consents form and place the order. Consent checkboxes
    /// default to unchecked, so a fresh form is rejected until the buyer
    /// acts.
    pub async fn place_order(&self, consents_form: NodeId) -> Result<OrderOutcome, PlaceOrderError> {
        let report = self.validation.validate(consents_form);
        if !report.passed() {
            return Err(PlaceOrderError::ConsentsMissing {
                failing: report.failing,
            });
        }

        let outcome = {
            let _guard = self.api.guarded("order")?;
            let response = self
                .api
                .post("/rest/checkout/place-order", &Value::Null)
                .await?;
            parse_outcome(&response.data)?
        };
        // The backend emptied the basket; refresh our snapshot.
        self.hub.load().await?;
        Ok(outcome)
    }
}

fn parse_outcome(data: &Value) -> Result<OrderOutcome, ApiError> {
    if let Some(url) = data.get("redirect").and_then(Value::as_str) {
        return Ok(OrderOutcome::Redirect {
            url: url.to_string(),
        });
    }
    if let Some(order_id) = data.get("order_id").and_then(Value::as_u64) {
        return Ok(OrderOutcome::Confirmed { order_id });
    }
    Err(ApiError::Payload(
        "place-order answered with neither order_id nor redirect".to_string(),
    ))
}

fn text_field(values: &Value, name: &str) -> Option<String> {
    values
        .get(name)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// An address form may carry an `address_id` select; empty and `-1` mean
/// "enter a new address".
fn existing_address_id(values: &Value) -> Option<u64> {
    let raw = values.get("address_id")?.as_str()?;
    if raw.is_empty() || raw == "-1" {
        return None;
    }
    raw.parse().ok()
}

// =====================================================================
// Tests
// =====================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::FixtureTransport;
    use crate::api::types::codes;
    use crate::core::framework::Shopfront;
    use crate::dom::Element;
    use crate::services::checkout::ATTR_RELOAD;
    use crate::services::cms::Cms;
    use crate::services::validation::ATTR_VALIDATE;

    struct Fixture {
        flow: CheckoutFlow,
        hub: Rc<CheckoutHub>,
        transport: Rc<FixtureTransport>,
        fw: Shopfront,
    }

    fn flow_fixture() -> Fixture {
        let page = Page::new();
        page.append(
            page.root(),
            Element::new("div").attr(ATTR_RELOAD, "payment-methods"),
        );
        let fw = Shopfront::new(page.clone());
        let transport = Rc::new(FixtureTransport::new());
        let api = Rc::new(ApiClient::new(transport.clone()));
        let cms = Rc::new(Cms::new(api.clone()));
        let hub = Rc::new(CheckoutHub::new(
            api.clone(),
            cms,
            page.clone(),
            fw.downgrade(),
        ));
        let validation = Rc::new(Validation::new(page.clone()));
        Fixture {
            flow: CheckoutFlow::new(api, hub.clone(), validation, page),
            hub,
            transport,
            fw,
        }
    }

    fn sign_form(fw: &Shopfront, sign: &str) -> NodeId {
        let page = fw.page();
        page.append(
            page.root(),
            Element::new("form")
                .child(Element::new("input").attr("name", "sign").value(sign))
                .child(Element::new("input").attr("name", "order_info").value("")),
        )
    }

    fn consents_form(fw: &Shopfront, checked: bool) -> NodeId {
        let page = fw.page();
        let checkbox = |name: &str| {
            Element::new("input")
                .attr("type", "checkbox")
                .attr("name", name)
                .attr(ATTR_VALIDATE, "none")
                .checked(checked)
        };
        page.append(
            page.root(),
            Element::new("form").child(checkbox("terms")).child(checkbox("privacy")),
        )
    }

    #[tokio::test]
    async fn test_unchanged_sign_stays_idle() {
        let f = flow_fixture();
        f.flow.init().await.unwrap();
        let form = sign_form(&f.fw, "");
        assert!(!f.flow.set_customer_sign_and_info(form).await.unwrap());
        assert_eq!(f.transport.requests().len(), 1); // only the init GET

        let form = sign_form(&f.fw, "PO-1841");
        assert!(f.flow.set_customer_sign_and_info(form).await.unwrap());
        assert_eq!(f.hub.doc().customer.sign.as_deref(), Some("PO-1841"));
    }

    #[tokio::test]
    async fn test_new_address_reloads_payment_methods() {
        let f = flow_fixture();
        f.flow.init().await.unwrap();
        let page = f.fw.page();
        let form = page.append(
            page.root(),
            Element::new("form")
                .child(Element::new("input").attr("name", "town").value("Kassel")),
        );
        f.flow.save_shipping_address(form).await.unwrap();
        assert!(f.hub.doc().customer.shipping_address_id.is_some());
        assert_eq!(page.select(".payment-methods input[type=\"radio\"]").len(), 3);
    }

    #[tokio::test]
    async fn test_existing_address_sends_only_the_id() {
        let f = flow_fixture();
        f.flow.init().await.unwrap();
        let page = f.fw.page();
        let form = page.append(
            page.root(),
            Element::new("form").child(
                Element::new("select").attr("name", "address_id").value("5"),
            ),
        );
        f.flow.save_shipping_address(form).await.unwrap();
        assert_eq!(f.hub.doc().customer.shipping_address_id, Some(5));
    }

    #[tokio::test]
    async fn test_selections_round_trip() {
        let f = flow_fixture();
        f.flow.init().await.unwrap();
        f.flow.set_shipping_profile(2).await.unwrap();
        f.flow.set_payment_method(1).await.unwrap();
        let doc = f.hub.doc();
        assert_eq!(doc.shipping.profile_id, Some(2));
        assert_eq!(doc.payment.method_id, Some(1));
    }

    #[tokio::test]
    async fn test_place_order_requires_consents() {
        let f = flow_fixture();
        f.flow.init().await.unwrap();
        let form = consents_form(&f.fw, false);
        let err = f.flow.place_order(form).await.unwrap_err();
        assert!(matches!(err, PlaceOrderError::ConsentsMissing { .. }));
        // Nothing reached the backend.
        assert!(
            !f.transport
                .requests()
                .iter()
                .any(|(_, path)| path.contains("place-order"))
        );
    }

    #[tokio::test]
    async fn test_place_order_confirms_and_refreshes() {
        let f = flow_fixture();
        f.transport.seed_item(404, 1);
        f.flow.init().await.unwrap();
        f.flow.set_shipping_profile(1).await.unwrap();
        f.flow.set_payment_method(2).await.unwrap();

        let form = consents_form(&f.fw, true);
        let outcome = f.flow.place_order(form).await.unwrap();
        assert!(matches!(outcome, OrderOutcome::Confirmed { .. }));
        assert!(f.hub.doc().basket.is_empty());
    }

    #[tokio::test]
    async fn test_place_order_with_empty_basket_is_rejected() {
        let f = flow_fixture();
        f.flow.init().await.unwrap();
        let form = consents_form(&f.fw, true);
        let err = f.flow.place_order(form).await.unwrap_err();
        match err {
            PlaceOrderError::Api(api) => {
                assert!(api.entry_with_code(codes::ORDER_REJECTED).is_some())
            }
            other => panic!("expected an api error, got {other:?}"),
        }
    }
}
