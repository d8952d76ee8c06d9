//! # Standard Directives
//!
//! The behavior layer of a storefront page: declarative bindings from
//! markup attributes to actions. Handlers never call services or touch
//! the network; they read the page and enqueue [`Action`]s for the
//! dispatch loop. Directives that need a service at event time resolve
//! it while binding and move the `Rc` into the handler.

use std::rc::Rc;

use log::{debug, warn};
use serde_json::Value;

use crate::core::action::Action;
use crate::core::directive::DirectiveDef;
use crate::core::framework::Shopfront;
use crate::core::navigator::{ATTR_ROLE, ATTR_STEP_ID, Navigator};
use crate::dom::{Event, NodeId, Page};
use crate::services::basket::ATTR_BASKET_ITEM;
use crate::services::media::Media;
use crate::services::validation::Validation;

/// Click target attribute: the value names the action.
pub const ATTR_ACTION: &str = "data-shop-action";
/// Step link attribute: the value is a step id (or `next`/`prev`).
pub const ATTR_CHECKOUT_HREF: &str = "data-shop-checkout-href";
/// Visibility toggle attribute: the value is a selector.
pub const ATTR_TOGGLE: &str = "data-shop-toggle";
/// Item form attribute: the value is the article's item id.
pub const ATTR_ITEM: &str = "data-shop-item";

/// Scroll offset past which the back-to-top button appears.
const TO_TOP_THRESHOLD: u64 = 100;

/// Register the standard directive pack. Call once before the first
/// bind pass.
pub fn register_defaults(shopfront: &Shopfront) {
    register_basket_directives(shopfront);
    register_checkout_directives(shopfront);
    register_customer_directives(shopfront);
    register_page_directives(shopfront);
}

fn register_basket_directives(shopfront: &Shopfront) {
    // Add-to-basket buttons inside an item form.
    shopfront.register_directive(DirectiveDef::selector(
        &format!("[{ATTR_ACTION}=\"add-to-basket\"]"),
        &[],
        |ctx| {
            let Some(node) = ctx.node else { return };
            let actions = ctx.actions.clone();
            ctx.page.on(
                node,
                "click",
                Rc::new(move |event: &Event, page: &Page| {
                    let Some(target) = event.target else { return };
                    let Some(form) = page.closest(target, &format!("form[{ATTR_ITEM}]"))
                    else {
                        warn!("add-to-basket button outside an item form");
                        return;
                    };
                    let Some(item_id) = page
                        .attr(form, ATTR_ITEM)
                        .and_then(|raw| raw.parse::<u64>().ok())
                    else {
                        warn!("item form without a numeric item id");
                        return;
                    };
                    let quantity = quantity_within(page, form).unwrap_or(1);
                    actions.push(Action::AddToBasket {
                        item_id,
                        quantity,
                        params: Vec::new(),
                    });
                }),
            );
        },
    ));

    // Plus/minus steppers next to a quantity input.
    for (selector, delta) in [(".quantity-up", 1i64), (".quantity-down", -1i64)] {
        shopfront.register_directive(DirectiveDef::selector(selector, &[], move |ctx| {
            let Some(node) = ctx.node else { return };
            let actions = ctx.actions.clone();
            ctx.page.on(
                node,
                "click",
                Rc::new(move |event: &Event, page: &Page| {
                    let Some(target) = event.target else { return };
                    let Some(input) = sibling_quantity_input(page, target) else {
                        warn!("quantity stepper without an input");
                        return;
                    };
                    let current = page.value(input).trim().parse::<i64>().unwrap_or(1);
                    let stepped = (current + delta).max(1);
                    page.set_value(input, &stepped.to_string());
                    if let Some(row_id) = basket_row_id(page, input) {
                        actions.push(Action::FlushQuantity {
                            basket_item_id: row_id,
                        });
                    }
                }),
            );
        }));
    }

    // Direct edits of a basket row's quantity input.
    shopfront.register_directive(DirectiveDef::selector(
        &format!("[{ATTR_BASKET_ITEM}] input.quantity-input"),
        &[],
        |ctx| {
            let Some(node) = ctx.node else { return };
            let actions = ctx.actions.clone();
            ctx.page.on(
                node,
                "change",
                Rc::new(move |event: &Event, page: &Page| {
                    let Some(target) = event.target else { return };
                    let Some(row_id) = basket_row_id(page, target) else { return };
                    let quantity = page
                        .value(target)
                        .trim()
                        .parse::<u32>()
                        .unwrap_or(1)
                        .max(1);
                    actions.push(Action::SetQuantity {
                        basket_item_id: row_id,
                        quantity,
                    });
                }),
            );
        },
    ));

    // Row removal, two-phase through the confirm modal.
    shopfront.register_directive(DirectiveDef::selector(
        &format!("[{ATTR_ACTION}=\"remove-item\"]"),
        &[],
        |ctx| {
            let Some(node) = ctx.node else { return };
            let actions = ctx.actions.clone();
            ctx.page.on(
                node,
                "click",
                Rc::new(move |event: &Event, page: &Page| {
                    let Some(target) = event.target else { return };
                    match basket_row_id(page, target) {
                        Some(row_id) => actions.push(Action::RemoveBasketItem {
                            basket_item_id: row_id,
                        }),
                        None => warn!("remove button outside a basket row"),
                    }
                }),
            );
        },
    ));

    // Coupon entry.
    shopfront.register_directive(DirectiveDef::selector(
        &format!("[{ATTR_ACTION}=\"add-coupon\"]"),
        &[],
        |ctx| {
            let Some(node) = ctx.node else { return };
            let actions = ctx.actions.clone();
            ctx.page.on(
                node,
                "click",
                Rc::new(move |_event: &Event, page: &Page| {
                    let code = page
                        .select("input[name=\"coupon_code\"]")
                        .into_iter()
                        .next()
                        .map(|input| page.value(input))
                        .unwrap_or_default();
                    if code.trim().is_empty() {
                        debug!("empty coupon field, nothing to submit");
                        return;
                    }
                    actions.push(Action::AddCoupon {
                        code: code.trim().to_string(),
                    });
                }),
            );
        },
    ));

    shopfront.register_directive(DirectiveDef::selector(
        &format!("[{ATTR_ACTION}=\"remove-coupon\"]"),
        &[],
        |ctx| {
            let Some(node) = ctx.node else { return };
            let actions = ctx.actions.clone();
            ctx.page.on(
                node,
                "click",
                Rc::new(move |_event: &Event, _page: &Page| {
                    actions.push(Action::RemoveCoupon);
                }),
            );
        },
    ));
}

fn register_checkout_directives(shopfront: &Shopfront) {
    // Step links anywhere in the page.
    shopfront.register_directive(DirectiveDef::selector(
        &format!("[{ATTR_CHECKOUT_HREF}]"),
        &[],
        |ctx| {
            let Some(node) = ctx.node else { return };
            let actions = ctx.actions.clone();
            ctx.page.on(
                node,
                "click",
                Rc::new(move |event: &Event, page: &Page| {
                    let Some(target) = event.target else { return };
                    if let Some(id) = page.attr(target, ATTR_CHECKOUT_HREF) {
                        actions.push(Action::GoToStep { id });
                    }
                }),
            );
        },
    ));

    // Step headers navigate to their own step.
    shopfront.register_directive(DirectiveDef::selector(
        &format!("[{ATTR_ROLE}=\"navigation\"]"),
        &[],
        |ctx| {
            let Some(node) = ctx.node else { return };
            let actions = ctx.actions.clone();
            let fallback = ctx.index.to_string();
            let id = ctx.page.attr(node, ATTR_STEP_ID).unwrap_or(fallback);
            ctx.page.on(
                node,
                "click",
                Rc::new(move |_event: &Event, _page: &Page| {
                    actions.push(Action::GoToStep { id: id.clone() });
                }),
            );
        },
    ));

    for (selector, id) in [
        (format!("[{ATTR_ROLE}=\"next\"]"), "next"),
        (format!("[{ATTR_ROLE}=\"prev\"]"), "prev"),
    ] {
        shopfront.register_directive(DirectiveDef::selector(&selector, &[], move |ctx| {
            let Some(node) = ctx.node else { return };
            let actions = ctx.actions.clone();
            ctx.page.on(
                node,
                "click",
                Rc::new(move |_event: &Event, _page: &Page| {
                    actions.push(Action::GoToStep { id: id.to_string() });
                }),
            );
        }));
    }

    // A hash edit in the location bar is a navigation request.
    shopfront.register_directive(DirectiveDef::document(&["navigator"], |ctx| {
        let Some(navigator) = ctx.services.get::<Navigator>("navigator") else {
            return;
        };
        ctx.page.document_on(
            "hashchange",
            Rc::new(move |event: &Event, _page: &Page| {
                if let Some(hash) = event.detail.as_str() {
                    navigator.go_to_id(hash);
                }
            }),
        );
    }));

    // Shipping and payment radios.
    shopfront.register_directive(DirectiveDef::selector(
        "input[name=\"shipping_profile\"]",
        &[],
        |ctx| {
            let Some(node) = ctx.node else { return };
            let actions = ctx.actions.clone();
            ctx.page.on(
                node,
                "change",
                Rc::new(move |event: &Event, page: &Page| {
                    if let Some(profile_id) = radio_id(page, event) {
                        actions.push(Action::SetShippingProfile { profile_id });
                    }
                }),
            );
        },
    ));

    shopfront.register_directive(DirectiveDef::selector(
        "input[name=\"payment_method\"]",
        &[],
        |ctx| {
            let Some(node) = ctx.node else { return };
            let actions = ctx.actions.clone();
            ctx.page.on(
                node,
                "change",
                Rc::new(move |event: &Event, page: &Page| {
                    if let Some(method_id) = radio_id(page, event) {
                        actions.push(Action::SetPaymentMethod { method_id });
                    }
                }),
            );
        },
    ));

    // Customer sign and shipping address forms.
    shopfront.register_directive(DirectiveDef::selector(
        "form[data-shop-customer-sign]",
        &[],
        |ctx| {
            let Some(node) = ctx.node else { return };
            let actions = ctx.actions.clone();
            ctx.page.on(
                node,
                "submit",
                Rc::new(move |event: &Event, _page: &Page| {
                    if let Some(form) = event.target {
                        actions.push(Action::SetCustomerSign { form });
                    }
                }),
            );
        },
    ));

    shopfront.register_directive(DirectiveDef::selector(
        "form[data-shop-address]",
        &["validation"],
        |ctx| {
            let Some(node) = ctx.node else { return };
            let Some(validation) = ctx.services.get::<Validation>("validation") else {
                return;
            };
            let actions = ctx.actions.clone();
            ctx.page.on(
                node,
                "submit",
                Rc::new(move |event: &Event, _page: &Page| {
                    let Some(form) = event.target else { return };
                    if validation.validate(form).passed() {
                        actions.push(Action::SaveShippingAddress { form });
                    }
                }),
            );
        },
    ));

    shopfront.register_directive(DirectiveDef::selector(
        &format!("[{ATTR_ACTION}=\"place-order\"]"),
        &[],
        |ctx| {
            let Some(node) = ctx.node else { return };
            let actions = ctx.actions.clone();
            ctx.page.on(
                node,
                "click",
                Rc::new(move |event: &Event, page: &Page| {
                    let Some(target) = event.target else { return };
                    match page.closest(target, "form") {
                        Some(form) => actions.push(Action::PlaceOrder { form }),
                        None => warn!("place-order button outside a form"),
                    }
                }),
            );
        },
    ));
}

fn register_customer_directives(shopfront: &Shopfront) {
    // Login submits only after client-side validation passes.
    shopfront.register_directive(DirectiveDef::selector(
        "form[data-shop-login]",
        &["validation"],
        |ctx| {
            let Some(node) = ctx.node else { return };
            let Some(validation) = ctx.services.get::<Validation>("validation") else {
                return;
            };
            let actions = ctx.actions.clone();
            ctx.page.on(
                node,
                "submit",
                Rc::new(move |event: &Event, _page: &Page| {
                    let Some(form) = event.target else { return };
                    if validation.validate(form).passed() {
                        actions.push(Action::SubmitLogin { form });
                    }
                }),
            );
        },
    ));

    shopfront.register_directive(DirectiveDef::selector(
        "form[data-shop-guest]",
        &["validation"],
        |ctx| {
            let Some(node) = ctx.node else { return };
            let Some(validation) = ctx.services.get::<Validation>("validation") else {
                return;
            };
            let actions = ctx.actions.clone();
            ctx.page.on(
                node,
                "submit",
                Rc::new(move |event: &Event, _page: &Page| {
                    let Some(form) = event.target else { return };
                    if validation.validate(form).passed() {
                        actions.push(Action::RegisterGuest { form });
                    }
                }),
            );
        },
    ));

    shopfront.register_directive(DirectiveDef::selector(
        &format!("[{ATTR_ACTION}=\"logout\"]"),
        &[],
        |ctx| {
            let Some(node) = ctx.node else { return };
            let actions = ctx.actions.clone();
            ctx.page.on(
                node,
                "click",
                Rc::new(move |_event: &Event, _page: &Page| {
                    actions.push(Action::Logout);
                }),
            );
        },
    ));
}

fn register_page_directives(shopfront: &Shopfront) {
    // Visibility toggles.
    shopfront.register_directive(DirectiveDef::selector(
        &format!("[{ATTR_TOGGLE}]"),
        &[],
        |ctx| {
            let Some(node) = ctx.node else { return };
            ctx.page.on(
                node,
                "click",
                Rc::new(move |event: &Event, page: &Page| {
                    let Some(target) = event.target else { return };
                    let Some(selector) = page.attr(target, ATTR_TOGGLE) else { return };
                    for hit in page.select(&selector) {
                        page.toggle(hit);
                    }
                }),
            );
        },
    ));

    // Standalone validated forms; failing controls get marked, nothing
    // else happens.
    shopfront.register_directive(DirectiveDef::selector(
        "form[data-shop-validate-form]",
        &["validation"],
        |ctx| {
            let Some(node) = ctx.node else { return };
            let Some(validation) = ctx.services.get::<Validation>("validation") else {
                return;
            };
            ctx.page.on(
                node,
                "submit",
                Rc::new(move |event: &Event, _page: &Page| {
                    if let Some(form) = event.target {
                        validation.validate(form);
                    }
                }),
            );
        },
    ));

    // Viewport resizes feed the breakpoint watcher.
    shopfront.register_directive(DirectiveDef::document(&["media"], |ctx| {
        let Some(media) = ctx.services.get::<Media>("media") else { return };
        ctx.page.document_on(
            "resize",
            Rc::new(move |_event: &Event, _page: &Page| {
                media.update();
            }),
        );
    }));

    // Back-to-top button past the scroll threshold.
    shopfront.register_directive(DirectiveDef::document(&[], |ctx| {
        ctx.page.document_on(
            "scroll",
            Rc::new(move |event: &Event, page: &Page| {
                let y = event
                    .detail
                    .get("y")
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
                for button in page.select("#to-top") {
                    if y > TO_TOP_THRESHOLD {
                        page.show(button);
                    } else {
                        page.hide(button);
                    }
                }
            }),
        );
    }));
}

// ---------------------------------------------------------------------
// Shared lookups
// ---------------------------------------------------------------------

fn quantity_within(page: &Page, scope: NodeId) -> Option<u32> {
    let input = page
        .select_within(scope, "input.quantity-input")
        .into_iter()
        .next()?;
    page.value(input).trim().parse().ok()
}

/// The quantity input belonging to a stepper button: first one inside
/// the surrounding basket row or item form.
fn sibling_quantity_input(page: &Page, button: NodeId) -> Option<NodeId> {
    let scope = page
        .closest(button, &format!("[{ATTR_BASKET_ITEM}]"))
        .or_else(|| page.closest(button, &format!("form[{ATTR_ITEM}]")))?;
    page.select_within(scope, "input.quantity-input")
        .into_iter()
        .next()
}

fn basket_row_id(page: &Page, node: NodeId) -> Option<u64> {
    let row = page.closest(node, &format!("[{ATTR_BASKET_ITEM}]"))?;
    page.attr(row, ATTR_BASKET_ITEM)?.parse().ok()
}

fn radio_id(page: &Page, event: &Event) -> Option<u64> {
    let target = event.target?;
    if !page.checked(target) {
        return None;
    }
    page.value(target).parse().ok()
}

// =====================================================================
// Tests
// =====================================================================
