//! # Actions
//!
//! Everything the page wants done becomes an [`Action`].
//! User clicks "add to basket"? That's `Action::AddToBasket`.
//! The confirm modal agrees? That's `Action::ConfirmRemoveBasketItem`.
//!
//! Handlers and directive callbacks only *enqueue* onto the shared
//! [`ActionQueue`]; the dispatch loop in `services::dispatch` drains it
//! and calls into the feature services. No I/O and no document mutation
//! inside event handlers.
//!
//! ```text
//! DOM event  →  Action  →  dispatch()  →  service call (+ follow-ups)
//! ```
//!
//! This keeps every mutation behind one inspectable entry point, and it
//! makes flows testable: push the same actions a click would, then assert
//! on the document.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::api::types::OrderParamValue;
use crate::dom::NodeId;

/// One unit of user-visible work.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    // Basket
    AddToBasket {
        item_id: u64,
        quantity: u32,
        params: Vec<OrderParamValue>,
    },
    SetQuantity {
        basket_item_id: u64,
        quantity: u32,
    },
    /// Read the row's quantity input and push its value to the backend.
    /// Emitted once the +/- buttons settle.
    FlushQuantity {
        basket_item_id: u64,
    },
    RemoveBasketItem {
        basket_item_id: u64,
    },
    /// Second phase of removal, emitted by the confirm modal.
    ConfirmRemoveBasketItem {
        basket_item_id: u64,
    },
    AddCoupon {
        code: String,
    },
    RemoveCoupon,
    RefreshPreview,

    // Navigation
    GoToStep {
        id: String,
    },
    ContinueNavigation,

    // Customer
    SubmitLogin {
        form: NodeId,
    },
    RegisterGuest {
        form: NodeId,
    },
    Logout,

    // Checkout
    SetCustomerSign {
        form: NodeId,
    },
    SaveShippingAddress {
        form: NodeId,
    },
    SetShippingProfile {
        profile_id: u64,
    },
    SetPaymentMethod {
        method_id: u64,
    },
    PlaceOrder {
        form: NodeId,
    },
    ReloadContainer {
        name: String,
    },
}

/// Cheap-clone FIFO shared between the page and the dispatch loop.
#[derive(Clone, Default)]
pub struct ActionQueue {
    inner: Rc<RefCell<VecDeque<Action>>>,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, action: Action) {
        self.inner.borrow_mut().push_back(action);
    }

    pub fn pop(&self) -> Option<Action> {
        self.inner.borrow_mut().pop_front()
    }

    /// Take everything currently queued, leaving the queue empty. Actions
    /// pushed while the drained batch runs land in the next batch.
    pub fn drain(&self) -> Vec<Action> {
        self.inner.borrow_mut().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_is_fifo() {
        let queue = ActionQueue::new();
        queue.push(Action::RemoveCoupon);
        queue.push(Action::RefreshPreview);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop(), Some(Action::RemoveCoupon));
        assert_eq!(queue.pop(), Some(Action::RefreshPreview));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_clones_share_storage() {
        let queue = ActionQueue::new();
        let clone = queue.clone();
        clone.push(Action::Logout);
        assert_eq!(queue.drain(), vec![Action::Logout]);
        assert!(clone.is_empty());
    }
}
