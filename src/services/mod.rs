//! # Services
//!
//! The feature layer. Factories are the shared plumbing (API client,
//! CMS, checkout hub, modal manager, UI state); services are the flows
//! built on top (auth, basket, checkout, media, validation, the
//! navigator). [`register_all`] wires the standard set into a
//! framework; producers degrade to `Rc::new(())` when a dependency is
//! missing, which the typed lookup then reports as a wiring error.

use std::rc::Rc;

use crate::api::{ApiClient, SharedTransport};
use crate::core::framework::Shopfront;
use crate::core::navigator::Navigator;

pub mod auth;
pub mod basket;
pub mod checkout;
pub mod checkout_flow;
pub mod cms;
pub mod dispatch;
pub mod media;
pub mod modal;
pub mod ui;
pub mod validation;

use auth::Auth;
use basket::BasketService;
use checkout::CheckoutHub;
use checkout_flow::CheckoutFlow;
use cms::Cms;
use media::Media;
use modal::ModalManager;
use ui::UiState;
use validation::Validation;

/// Register the standard factories and services against `transport`.
pub fn register_all(shopfront: &Shopfront, transport: SharedTransport) {
    shopfront.register_factory("api", &[], move |_ctx| {
        Rc::new(ApiClient::new(transport.clone()))
    });

    shopfront.register_factory("ui", &[], |ctx| {
        Rc::new(UiState::new(ctx.shopfront.page()))
    });

    shopfront.register_factory("cms", &["api"], |ctx| {
        let Some(api) = ctx.deps.get::<ApiClient>("api") else {
            return Rc::new(());
        };
        Rc::new(Cms::new(api))
    });

    shopfront.register_factory("checkout", &["api", "cms"], |ctx| {
        let Some(api) = ctx.deps.get::<ApiClient>("api") else {
            return Rc::new(());
        };
        let Some(cms) = ctx.deps.get::<Cms>("cms") else {
            return Rc::new(());
        };
        Rc::new(CheckoutHub::new(
            api,
            cms,
            ctx.shopfront.page(),
            ctx.shopfront.downgrade(),
        ))
    });

    shopfront.register_factory("modal", &[], |ctx| {
        Rc::new(ModalManager::new(ctx.shopfront.page()))
    });

    shopfront.register_service("auth", &["api", "checkout"], |ctx| {
        let Some(api) = ctx.deps.get::<ApiClient>("api") else {
            return Rc::new(());
        };
        let Some(hub) = ctx.deps.get::<CheckoutHub>("checkout") else {
            return Rc::new(());
        };
        Rc::new(Auth::new(api, hub, ctx.shopfront.page()))
    });

    shopfront.register_service("basket", &["api", "checkout", "modal"], |ctx| {
        let Some(api) = ctx.deps.get::<ApiClient>("api") else {
            return Rc::new(());
        };
        let Some(hub) = ctx.deps.get::<CheckoutHub>("checkout") else {
            return Rc::new(());
        };
        let Some(modal) = ctx.deps.get::<ModalManager>("modal") else {
            return Rc::new(());
        };
        Rc::new(BasketService::new(
            api,
            hub,
            modal,
            ctx.shopfront.page(),
            ctx.shopfront.actions(),
            ctx.shopfront.downgrade(),
        ))
    });

    shopfront.register_service("checkout", &["api", "checkout"], |ctx| {
        let Some(api) = ctx.deps.get::<ApiClient>("api") else {
            return Rc::new(());
        };
        let Some(hub) = ctx.deps.get::<CheckoutHub>("checkout") else {
            return Rc::new(());
        };
        // Sibling services come through the framework handle, not the
        // dependency list.
        let Some(validation) = ctx.shopfront.service::<Validation>("validation") else {
            return Rc::new(());
        };
        Rc::new(CheckoutFlow::new(
            api,
            hub,
            validation,
            ctx.shopfront.page(),
        ))
    });

    shopfront.register_service("media", &[], |ctx| {
        Rc::new(Media::new(ctx.shopfront.page()))
    });

    shopfront.register_service("validation", &[], |ctx| {
        Rc::new(Validation::new(ctx.shopfront.page()))
    });

    shopfront.register_service("navigator", &[], |ctx| {
        let navigator = Navigator::new(ctx.shopfront.page());
        navigator.scan();
        navigator.init_from_location();
        Rc::new(navigator)
    });
}
