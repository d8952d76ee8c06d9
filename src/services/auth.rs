//! # Customer Authentication
//!
//! Login, guest registration and logout. Each call posts the serialized
//! form, adopts the checkout document the backend answers with, and
//! leaves rendering to the container reloads the dispatcher runs
//! afterwards.

use std::rc::Rc;

use crate::api::{ApiClient, ApiError};
use crate::dom::{NodeId, Page, forms};

use super::checkout::CheckoutHub;

pub struct Auth {
    api: Rc<ApiClient>,
    hub: Rc<CheckoutHub>,
    page: Page,
}

impl Auth {
    pub fn new(api: Rc<ApiClient>, hub: Rc<CheckoutHub>, page: Page) -> Self {
        Self { api, hub, page }
    }

    pub async fn login(&self, form: NodeId) -> Result<(), ApiError> {
        let _guard = self.api.guarded("customer")?;
        let body = forms::form_values(&self.page, form);
        let taken = self.hub.revision();
        let response = self.api.post("/rest/customer/login", &body).await?;
        self.hub.apply_response(taken, &response)?;
        Ok(())
    }

    pub async fn register_guest(&self, form: NodeId) -> Result<(), ApiError> {
        let _guard = self.api.guarded("customer")?;
        let body = forms::form_values(&self.page, form);
        let taken = self.hub.revision();
        let response = self.api.post("/rest/customer/guest", &body).await?;
        self.hub.apply_response(taken, &response)?;
        Ok(())
    }

    pub async fn logout(&self) -> Result<(), ApiError> {
        let _guard = self.api.guarded("customer")?;
        let taken = self.hub.revision();
        let response = self
            .api
            .post("/rest/customer/logout", &serde_json::Value::Null)
            .await?;
        self.hub.apply_response(taken, &response)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fixture::{FixtureTransport, VALID_EMAIL, VALID_PASSWORD};
    use crate::api::types::codes;
    use crate::core::framework::Shopfront;
    use crate::dom::Element;
    use crate::services::cms::Cms;

    fn auth_fixture(email: &str, password: &str) -> (Auth, Rc<CheckoutHub>, NodeId) {
        let page = Page::new();
        let form = page.append(
            page.root(),
            Element::new("form")
                .child(Element::new("input").attr("name", "email").value(email))
                .child(Element::new("input").attr("name", "password").value(password)),
        );
        let fw = Shopfront::new(page.clone());
        let api = Rc::new(ApiClient::new(Rc::new(FixtureTransport::new())));
        let cms = Rc::new(Cms::new(api.clone()));
        let hub = Rc::new(CheckoutHub::new(
            api.clone(),
            cms,
            page.clone(),
            fw.downgrade(),
        ));
        drop(fw); // no rebinds happen in these tests
        (Auth::new(api, hub.clone(), page), hub, form)
    }

    #[tokio::test]
    async fn test_login_adopts_customer() {
        let (auth, hub, form) = auth_fixture(VALID_EMAIL, VALID_PASSWORD);
        auth.login(form).await.unwrap();
        assert_eq!(hub.doc().customer.id, Some(77));

        auth.logout().await.unwrap();
        assert_eq!(hub.doc().customer.id, None);
    }

    #[tokio::test]
    async fn test_bad_credentials_surface_the_code() {
        let (auth, hub, form) = auth_fixture(VALID_EMAIL, "wrong");
        let err = auth.login(form).await.unwrap_err();
        assert!(err.entry_with_code(codes::LOGIN_INVALID).is_some());
        assert_eq!(hub.doc().customer.id, None);
    }

    #[tokio::test]
    async fn test_guest_registration_stores_email() {
        let (auth, hub, form) = auth_fixture("guest@example.com", "");
        auth.register_guest(form).await.unwrap();
        let doc = hub.doc();
        assert_eq!(doc.customer.email.as_deref(), Some("guest@example.com"));
        assert_eq!(doc.customer.id, None);
    }
}
