//! # Dispatch
//!
//! The single writer. Directive callbacks and modal handlers push
//! [`Action`]s; [`run_queue`] drains them and calls the feature
//! services, one at a time. Follow-up actions enqueued while a batch
//! runs land in the next batch.

use log::{error, warn};

use crate::api::ApiError;
use crate::core::action::Action;
use crate::core::framework::Shopfront;
use crate::core::navigator::Navigator;

use super::auth::Auth;
use super::basket::{ATTR_BASKET_ITEM, BasketService};
use super::checkout::CheckoutHub;
use super::checkout_flow::{CheckoutFlow, OrderOutcome, PlaceOrderError};
use super::ui::UiState;

/// Where the order confirmation or redirect notice is written.
pub const ORDER_RESULT_SELECTOR: &str = "#order-result";

/// A runaway feedback loop of actions enqueuing actions stops here.
const MAX_PASSES: u32 = 32;

/// Drain the queue until it stays empty. Call after every batch of page
/// events.
pub async fn run_queue(shopfront: &Shopfront) {
    let queue = shopfront.actions();
    let mut passes = 0;
    loop {
        let batch = queue.drain();
        if batch.is_empty() {
            return;
        }
        passes += 1;
        if passes > MAX_PASSES {
            warn!("action queue kept refilling, dropping {} actions", batch.len());
            return;
        }
        for action in batch {
            dispatch_one(shopfront, action).await;
        }
    }
}

async fn dispatch_one(shopfront: &Shopfront, action: Action) {
    let Some(ui) = shopfront.factory::<UiState>("ui") else {
        error!("ui factory missing, dropping {action:?}");
        return;
    };

    match action {
        Action::AddToBasket {
            item_id,
            quantity,
            params,
        } => {
            let Some(basket) = shopfront.service::<BasketService>("basket") else {
                return missing("basket");
            };
            ui.show_waiting();
            report(&ui, basket.add_item(item_id, quantity, params).await);
            ui.hide_waiting();
        }
        Action::SetQuantity {
            basket_item_id,
            quantity,
        } => {
            let Some(basket) = shopfront.service::<BasketService>("basket") else {
                return missing("basket");
            };
            ui.show_waiting();
            report(&ui, basket.set_quantity(basket_item_id, quantity).await);
            ui.hide_waiting();
        }
        Action::FlushQuantity { basket_item_id } => {
            match row_quantity(shopfront, basket_item_id) {
                Some(quantity) => shopfront.actions().push(Action::SetQuantity {
                    basket_item_id,
                    quantity,
                }),
                None => warn!("no quantity input for basket row {basket_item_id}"),
            }
        }
        Action::RemoveBasketItem { basket_item_id } => {
            let Some(basket) = shopfront.service::<BasketService>("basket") else {
                return missing("basket");
            };
            basket.remove_item(basket_item_id);
        }
        Action::ConfirmRemoveBasketItem { basket_item_id } => {
            let Some(basket) = shopfront.service::<BasketService>("basket") else {
                return missing("basket");
            };
            ui.show_waiting();
            report(&ui, basket.confirm_remove(basket_item_id).await);
            ui.hide_waiting();
        }
        Action::AddCoupon { code } => {
            let Some(basket) = shopfront.service::<BasketService>("basket") else {
                return missing("basket");
            };
            ui.show_waiting();
            report(&ui, basket.add_coupon(&code).await);
            ui.hide_waiting();
        }
        Action::RemoveCoupon => {
            let Some(basket) = shopfront.service::<BasketService>("basket") else {
                return missing("basket");
            };
            ui.show_waiting();
            report(&ui, basket.remove_coupon().await);
            ui.hide_waiting();
        }
        Action::RefreshPreview => {
            let Some(basket) = shopfront.service::<BasketService>("basket") else {
                return missing("basket");
            };
            basket.refresh_preview().await;
        }

        Action::GoToStep { id } => {
            let Some(navigator) = shopfront.service::<Navigator>("navigator") else {
                return missing("navigator");
            };
            navigator.go_to_id(&id);
        }
        Action::ContinueNavigation => {
            let Some(navigator) = shopfront.service::<Navigator>("navigator") else {
                return missing("navigator");
            };
            navigator.continue_change();
        }

        Action::SubmitLogin { form } => {
            let Some(auth) = shopfront.service::<Auth>("auth") else {
                return missing("auth");
            };
            ui.show_waiting();
            report(&ui, auth.login(form).await);
            ui.hide_waiting();
        }
        Action::RegisterGuest { form } => {
            let Some(auth) = shopfront.service::<Auth>("auth") else {
                return missing("auth");
            };
            ui.show_waiting();
            report(&ui, auth.register_guest(form).await);
            ui.hide_waiting();
        }
        Action::Logout => {
            let Some(auth) = shopfront.service::<Auth>("auth") else {
                return missing("auth");
            };
            ui.show_waiting();
            report(&ui, auth.logout().await);
            ui.hide_waiting();
        }

        Action::SetCustomerSign { form } => {
            let Some(flow) = shopfront.service::<CheckoutFlow>("checkout") else {
                return missing("checkout");
            };
            report(&ui, flow.set_customer_sign_and_info(form).await);
        }
        Action::SaveShippingAddress { form } => {
            let Some(flow) = shopfront.service::<CheckoutFlow>("checkout") else {
                return missing("checkout");
            };
            ui.show_waiting();
            report(&ui, flow.save_shipping_address(form).await);
            ui.hide_waiting();
        }
        Action::SetShippingProfile { profile_id } => {
            let Some(flow) = shopfront.service::<CheckoutFlow>("checkout") else {
                return missing("checkout");
            };
            ui.show_waiting();
            report(&ui, flow.set_shipping_profile(profile_id).await);
            ui.hide_waiting();
        }
        Action::SetPaymentMethod { method_id } => {
            let Some(flow) = shopfront.service::<CheckoutFlow>("checkout") else {
                return missing("checkout");
            };
            ui.show_waiting();
            report(&ui, flow.set_payment_method(method_id).await);
            ui.hide_waiting();
        }
        Action::PlaceOrder { form } => {
            let Some(flow) = shopfront.service::<CheckoutFlow>("checkout") else {
                return missing("checkout");
            };
            ui.show_waiting();
            let result = flow.place_order(form).await;
            ui.hide_waiting();
            announce_order(shopfront, &ui, result);
        }
        Action::ReloadContainer { name } => {
            let Some(hub) = shopfront.factory::<CheckoutHub>("checkout") else {
                return missing("checkout hub");
            };
            ui.show_waiting();
            report(&ui, hub.reload_container(&name).await);
            ui.hide_waiting();
        }
    }
}

fn missing(name: &str) {
    error!("service {name:?} is not registered, action dropped");
}

/// Log and surface a failed service call. A busy resource only means the
/// user double-fired; stay quiet apart from the log line.
fn report<T>(ui: &UiState, result: Result<T, ApiError>) {
    match result {
        Ok(_) => {}
        Err(ApiError::Busy { resource }) => {
            warn!("ignored, {resource:?} already has a request in flight");
        }
        Err(err) => {
            error!("service call failed: {err}");
            ui.print_api_error(&err);
        }
    }
}

fn announce_order(
    shopfront: &Shopfront,
    ui: &UiState,
    result: Result<OrderOutcome, PlaceOrderError>,
) {
    let page = shopfront.page();
    match result {
        Ok(outcome) => {
            let notice = match outcome {
                OrderOutcome::Confirmed { order_id } => {
                    format!("Order {order_id} placed. Thank you!")
                }
                OrderOutcome::Redirect { url } => format!("Redirecting to {url}"),
            };
            for node in page.select(ORDER_RESULT_SELECTOR) {
                page.set_text(node, &notice);
                page.show(node);
            }
        }
        Err(PlaceOrderError::ConsentsMissing { failing }) => {
            warn!("order blocked, {} consents unchecked", failing.len());
        }
        Err(PlaceOrderError::Api(err)) => report::<()>(ui, Err(err)),
    }
}

/// Current value of a basket row's quantity input, clamped to 1.
fn row_quantity(shopfront: &Shopfront, basket_item_id: u64) -> Option<u32> {
    let page = shopfront.page();
    let selector = format!("[{ATTR_BASKET_ITEM}=\"{basket_item_id}\"] input.quantity-input");
    let input = page.select(&selector).into_iter().next()?;
    let raw = page.value(input);
    Some(raw.trim().parse::<u32>().unwrap_or(1).max(1))
}

// =====================================================================
// Tests
// =====================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_queue_returns_immediately() {
        let shopfront = Shopfront::new(crate::dom::Page::new());
        run_queue(&shopfront).await;
        assert!(shopfront.actions().is_empty());
    }
}
