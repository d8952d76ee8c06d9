//! # Basket
//!
//! Add, remove, requantify, coupon. Every mutation claims a gate
//! resource, pushes the change to the backend, swaps the fresh document
//! into the hub and reloads the affected containers.
//!
//! Two flows need a second round trip through the user:
//!
//! * an article with required order parameters is rejected with code
//!   100 on a bare add; we open a modal asking for the values and the
//!   confirm handler enqueues the add again, parameters included;
//! * removing a row opens a confirm modal first, whose confirm handler
//!   enqueues [`Action::ConfirmRemoveBasketItem`].
//!
//! Both handlers only enqueue, so the modal callbacks stay synchronous.

use std::rc::Rc;

use log::{debug, warn};
use serde_json::json;

use crate::api::types::{OrderParamDef, OrderParamValue, codes};
use crate::api::{ApiClient, ApiError};
use crate::core::action::{Action, ActionQueue};
use crate::core::framework::FrameworkRef;
use crate::dom::{Element, Page};

use super::checkout::CheckoutHub;
use super::modal::{ModalConfig, ModalManager};

/// Marks a basket row; the value is the backend row id.
pub const ATTR_BASKET_ITEM: &str = "data-basket-item";
/// Marks an order-parameter input inside the params modal.
pub const ATTR_ORDER_PARAM_ID: &str = "data-order-param-id";
/// Marks a totals display element; the value names the totals field.
pub const ATTR_TOTAL: &str = "data-shop-total";

/// What a call to [`BasketService::add_item`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The row is in the basket.
    Added,
    /// The article needs order parameters; a modal is asking for them.
    ParamsRequested,
}

pub struct BasketService {
    api: Rc<ApiClient>,
    hub: Rc<CheckoutHub>,
    modal: Rc<ModalManager>,
    page: Page,
    actions: ActionQueue,
    framework: FrameworkRef,
}

impl BasketService {
    pub fn new(
        api: Rc<ApiClient>,
        hub: Rc<CheckoutHub>,
        modal: Rc<ModalManager>,
        page: Page,
        actions: ActionQueue,
        framework: FrameworkRef,
    ) -> Self {
        Self {
            api,
            hub,
            modal,
            page,
            actions,
            framework,
        }
    }

    pub async fn add_item(
        &self,
        item_id: u64,
        quantity: u32,
        params: Vec<OrderParamValue>,
    ) -> Result<AddOutcome, ApiError> {
        let result = {
            let _guard = self.api.guarded("basket")?;
            let taken = self.hub.revision();
            let body = json!({
                "item_id": item_id,
                "quantity": quantity,
                "params": params,
            });
            match self.api.post("/rest/basket/items", &body).await {
                Ok(response) => {
                    self.hub.apply_response(taken, &response)?;
                    Ok(())
                }
                Err(err) => Err(err),
            }
        };

        match result {
            Ok(()) => {
                self.hub.reload_many(&["basket-preview", "basket-totals"]).await;
                Ok(AddOutcome::Added)
            }
            Err(err) => {
                let Some(entry) = err.entry_with_code(codes::ORDER_PARAMS_REQUIRED) else {
                    return Err(err);
                };
                let defs: Vec<OrderParamDef> =
                    serde_json::from_value(entry.detail.clone()).unwrap_or_default();
                if defs.is_empty() {
                    warn!("parameter rejection for article {item_id} carried no definitions");
                    return Err(err);
                }
                self.request_params(item_id, quantity, defs);
                Ok(AddOutcome::ParamsRequested)
            }
        }
    }

    /// Open the order-parameter modal. Confirming enqueues the add again
    /// with the entered values.
    fn request_params(&self, item_id: u64, quantity: u32, defs: Vec<OrderParamDef>) {
        let fields: Vec<Element> = defs
            .iter()
            .map(|def| {
                Element::new("label")
                    .child(Element::new("span").text(&def.name))
                    .child(
                        Element::new("input")
                            .attr("type", "text")
                            .attr(ATTR_ORDER_PARAM_ID, &def.id.to_string()),
                    )
            })
            .collect();

        let actions = self.actions.clone();
        let config = ModalConfig::new("This article needs a few details")
            .content(fields)
            .confirm_label("Add to basket")
            .on_confirm(move |page: &Page| {
                let params = read_param_inputs(page);
                actions.push(Action::AddToBasket {
                    item_id,
                    quantity,
                    params,
                });
                true
            });
        self.modal.open(config);
    }

    pub async fn set_quantity(&self, basket_item_id: u64, quantity: u32) -> Result<(), ApiError> {
        {
            let _guard = self.api.guarded(&format!("basket-item-{basket_item_id}"))?;
            let taken = self.hub.revision();
            let response = self
                .api
                .put(
                    &format!("/rest/basket/items/{basket_item_id}"),
                    &json!({ "quantity": quantity }),
                )
                .await?;
            self.hub.apply_response(taken, &response)?;
        }
        self.hub.reload_many(&["basket-preview", "basket-totals"]).await;
        Ok(())
    }

    /// First phase of removal: ask. Synchronous, the modal's confirm
    /// handler enqueues the actual removal.
    pub fn remove_item(&self, basket_item_id: u64) {
        let actions = self.actions.clone();
        let config = ModalConfig::new("Remove item?")
            .confirm_label("Remove")
            .on_confirm(move |_page: &Page| {
                actions.push(Action::ConfirmRemoveBasketItem { basket_item_id });
                true
            });
        self.modal.open(config);
    }

    /// Second phase: the user confirmed. When the last row goes, the main
    /// content area falls back to the basket category view.
    pub async fn confirm_remove(&self, basket_item_id: u64) -> Result<(), ApiError> {
        {
            let _guard = self.api.guarded("basket")?;
            let taken = self.hub.revision();
            let response = self
                .api
                .delete(&format!("/rest/basket/items/{basket_item_id}"))
                .await?;
            self.hub.apply_response(taken, &response)?;
        }
        if self.hub.doc().basket.is_empty() {
            match self.basket_category_id() {
                Some(category_id) => {
                    self.hub
                        .reload_category_content(category_id, "main-content")
                        .await?
                }
                None => warn!("basket emptied but no basket category id is set"),
            }
        } else {
            self.hub.reload_many(&["basket-preview", "basket-totals"]).await;
        }
        Ok(())
    }

    pub async fn add_coupon(&self, code: &str) -> Result<(), ApiError> {
        {
            let _guard = self.api.guarded("coupon")?;
            let taken = self.hub.revision();
            let response = self.api.post("/rest/coupon", &json!({ "code": code })).await?;
            self.hub.apply_response(taken, &response)?;
        }
        self.hub.reload_many(&["basket-preview", "basket-totals"]).await;
        Ok(())
    }

    pub async fn remove_coupon(&self) -> Result<(), ApiError> {
        {
            let _guard = self.api.guarded("coupon")?;
            let taken = self.hub.revision();
            let response = self.api.delete("/rest/coupon").await?;
            self.hub.apply_response(taken, &response)?;
        }
        self.hub.reload_many(&["basket-preview", "basket-totals"]).await;
        Ok(())
    }

    /// Reload both basket containers and refresh every standalone totals
    /// display from the current document.
    pub async fn refresh_preview(&self) {
        self.hub.reload_many(&["basket-preview", "basket-totals"]).await;
        let totals = self.hub.doc().basket.totals;
        let display = [
            ("item-sum", totals.item_sum),
            ("discount", totals.discount),
            ("shipping", totals.shipping),
            ("vat", totals.vat),
            ("gross", totals.gross),
        ];
        for (key, amount) in display {
            for node in self.page.select(&format!("[{ATTR_TOTAL}=\"{key}\"]")) {
                self.page.set_text(node, &format!("{amount:.2}"));
            }
        }
        debug!("totals displays refreshed");
    }

    fn basket_category_id(&self) -> Option<u64> {
        let fw = self.framework.upgrade()?;
        fw.globals().get_u64("basket-category-id")
    }
}

/// Collect values from the modal's parameter inputs.
fn read_param_inputs(page: &Page) -> Vec<OrderParamValue> {
    page.select(&format!("[{ATTR_ORDER_PARAM_ID}]"))
        .into_iter()
        .filter_map(|node| {
            let param_id = page.attr(node, ATTR_ORDER_PARAM_ID)?.parse().ok()?;
            Some(OrderParamValue {
                param_id,
                value: page.value(node),
            })
        })
        .collect()
}

// =====================================================================
// Tests
// =====================================================================
