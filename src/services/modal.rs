//! # Modal Dialogs
//!
//! Confirm/dismiss dialogs rendered into the `#modal-root` element. A
//! modal is described by a [`ModalConfig`] builder, opened by the
//! manager, and closed by its buttons or by an expired timeout. An
//! `on_confirm` returning `false` keeps the dialog open (the handler is
//! not done with the user yet).

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};

use crate::dom::{Element, NodeId, Page};

pub const MODAL_ROOT_SELECTOR: &str = "#modal-root";

/// Returning `false` keeps the modal open.
pub type ConfirmHandler = Rc<dyn Fn(&Page) -> bool>;
pub type DismissHandler = Rc<dyn Fn(&Page)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModalId(u64);

#[derive(Clone, Default)]
pub struct ModalConfig {
    title: String,
    content: Vec<Element>,
    confirm_label: String,
    dismiss_label: String,
    timeout: Option<Duration>,
    on_confirm: Option<ConfirmHandler>,
    on_dismiss: Option<DismissHandler>,
}

impl ModalConfig {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            confirm_label: "OK".to_string(),
            dismiss_label: "Cancel".to_string(),
            ..Self::default()
        }
    }

    pub fn content(mut self, content: Vec<Element>) -> Self {
        self.content = content;
        self
    }

    pub fn confirm_label(mut self, label: &str) -> Self {
        self.confirm_label = label.to_string();
        self
    }

    pub fn dismiss_label(mut self, label: &str) -> Self {
        self.dismiss_label = label.to_string();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn on_confirm(mut self, handler: impl Fn(&Page) -> bool + 'static) -> Self {
        self.on_confirm = Some(Rc::new(handler));
        self
    }

    pub fn on_dismiss(mut self, handler: impl Fn(&Page) + 'static) -> Self {
        self.on_dismiss = Some(Rc::new(handler));
        self
    }
}

struct OpenModal {
    id: ModalId,
    node: NodeId,
    expires_at: Option<DateTime<Utc>>,
    on_confirm: Option<ConfirmHandler>,
    on_dismiss: Option<DismissHandler>,
}

pub struct ModalManager {
    page: Page,
    open: RefCell<Vec<OpenModal>>,
    next_id: Cell<u64>,
}

impl ModalManager {
    pub fn new(page: Page) -> Self {
        Self {
            page,
            open: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
        }
    }

    pub fn open_count(&self) -> usize {
        self.open.borrow().len()
    }

    pub fn is_open(&self, id: ModalId) -> bool {
        self.open.borrow().iter().any(|m| m.id == id)
    }

    /// Render and wire a modal. Returns `None` when the document has no
    /// modal root.
    pub fn open(self: &Rc<Self>, config: ModalConfig) -> Option<ModalId> {
        let root = match self.page.select(MODAL_ROOT_SELECTOR).first().copied() {
            Some(root) => root,
            None => {
                warn!("document has no {MODAL_ROOT_SELECTOR}, dropping modal {:?}", config.title);
                return None;
            }
        };

        let id = ModalId(self.next_id.get());
        self.next_id.set(id.0 + 1);

        let dialog = Element::new("div")
            .class("modal")
            .attr("data-modal-id", &id.0.to_string())
            .child(Element::new("h4").class("modal-title").text(&config.title))
            .child(Element::new("div").class("modal-body").children(config.content.clone()))
            .child(
                Element::new("div")
                    .class("modal-footer")
                    .child(
                        Element::new("button")
                            .class("modal-dismiss")
                            .text(&config.dismiss_label),
                    )
                    .child(
                        Element::new("button")
                            .class("modal-confirm")
                            .text(&config.confirm_label),
                    ),
            );
        let node = self.page.append(root, dialog);
        self.page.show(root);

        // Weak capture: the page owns the handlers, the manager owns the
        // page; an Rc here would leak the lot.
        let weak: Weak<ModalManager> = Rc::downgrade(self);
        if let Some(button) = self.page.select_within(node, "button.modal-confirm").first() {
            let weak = weak.clone();
            self.page.on(
                *button,
                "click",
                Rc::new(move |_, _| {
                    if let Some(manager) = weak.upgrade() {
                        manager.confirm(id);
                    }
                }),
            );
        }
        if let Some(button) = self.page.select_within(node, "button.modal-dismiss").first() {
            self.page.on(
                *button,
                "click",
                Rc::new(move |_, _| {
                    if let Some(manager) = weak.upgrade() {
                        manager.dismiss(id);
                    }
                }),
            );
        }

        self.open.borrow_mut().push(OpenModal {
            id,
            node,
            expires_at: config.timeout.map(|t| Utc::now() + t),
            on_confirm: config.on_confirm,
            on_dismiss: config.on_dismiss,
        });
        debug!("opened modal {:?} ({})", config.title, id.0);
        Some(id)
    }

    pub fn confirm(&self, id: ModalId) {
        let handler = self
            .open
            .borrow()
            .iter()
            .find(|m| m.id == id)
            .and_then(|m| m.on_confirm.clone());
        let keep_open = match handler {
            Some(handler) => !handler(&self.page),
            None => false,
        };
        if !keep_open {
            self.close(id);
        }
    }

    pub fn dismiss(&self, id: ModalId) {
        let handler = self
            .open
            .borrow()
            .iter()
            .find(|m| m.id == id)
            .and_then(|m| m.on_dismiss.clone());
        if let Some(handler) = handler {
            handler(&self.page);
        }
        self.close(id);
    }

    pub fn close(&self, id: ModalId) {
        let node = {
            let mut open = self.open.borrow_mut();
            let Some(pos) = open.iter().position(|m| m.id == id) else {
                return;
            };
            open.remove(pos).node
        };
        self.page.remove(node);
        if self.open.borrow().is_empty() {
            for root in self.page.select(MODAL_ROOT_SELECTOR) {
                self.page.hide(root);
            }
        }
    }

    /// Dismiss every modal whose timeout passed. Driven by whoever owns
    /// the clock (the shell loop, or a test).
    pub fn poll_timeouts(&self, now: DateTime<Utc>) {
        let expired: Vec<ModalId> = self
            .open
            .borrow()
            .iter()
            .filter(|m| m.expires_at.is_some_and(|at| at <= now))
            .map(|m| m.id)
            .collect();
        for id in expired {
            debug!("modal {} timed out", id.0);
            self.dismiss(id);
        }
    }
}

// =====================================================================
// Tests
// =====================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell as StdCell;

    fn manager() -> (Rc<ModalManager>, Page) {
        let page = Page::new();
        page.append(page.root(), Element::new("div").id("modal-root").hidden());
        (Rc::new(ModalManager::new(page.clone())), page)
    }

    #[test]
    fn test_open_renders_and_confirm_closes() {
        let (manager, page) = manager();
        let confirmed = Rc::new(StdCell::new(false));
        let flag = confirmed.clone();
        let id = manager
            .open(
                ModalConfig::new("Remove item?")
                    .confirm_label("Remove")
                    .on_confirm(move |_| {
                        flag.set(true);
                        true
                    }),
            )
            .unwrap();

        assert!(page.is_visible(page.select(MODAL_ROOT_SELECTOR)[0]));
        assert_eq!(page.text(page.select(".modal-title")[0]), "Remove item?");

        let button = page.select("button.modal-confirm")[0];
        page.trigger(button, "click");
        assert!(confirmed.get());
        assert!(!manager.is_open(id));
        assert!(!page.is_visible(page.select(MODAL_ROOT_SELECTOR)[0]));
    }

    #[test]
    fn test_confirm_returning_false_keeps_it_open() {
        let (manager, page) = manager();
        let id = manager
            .open(ModalConfig::new("Needs input").on_confirm(|_| false))
            .unwrap();
        page.trigger(page.select("button.modal-confirm")[0], "click");
        assert!(manager.is_open(id));
    }

    #[test]
    fn test_dismiss_runs_handler() {
        let (manager, page) = manager();
        let dismissed = Rc::new(StdCell::new(false));
        let flag = dismissed.clone();
        manager
            .open(ModalConfig::new("Sure?").on_dismiss(move |_| flag.set(true)))
            .unwrap();
        page.trigger(page.select("button.modal-dismiss")[0], "click");
        assert!(dismissed.get());
        assert_eq!(manager.open_count(), 0);
    }

    #[test]
    fn test_timeout_dismisses() {
        let (manager, _page) = manager();
        let id = manager
            .open(ModalConfig::new("Gone soon").timeout(Duration::seconds(5)))
            .unwrap();
        manager.poll_timeouts(Utc::now() + Duration::seconds(2));
        assert!(manager.is_open(id));
        manager.poll_timeouts(Utc::now() + Duration::seconds(6));
        assert!(!manager.is_open(id));
    }

    #[test]
    fn test_missing_root_is_a_noop() {
        let page = Page::new();
        let manager = Rc::new(ModalManager::new(page));
        assert!(manager.open(ModalConfig::new("Nowhere to go")).is_none());
    }

    #[test]
    fn test_stacked_modals_close_independently() {
        let (manager, page) = manager();
        let first = manager.open(ModalConfig::new("first")).unwrap();
        let second = manager.open(ModalConfig::new("second")).unwrap();
        manager.close(first);
        assert!(manager.is_open(second));
        assert!(page.is_visible(page.select(MODAL_ROOT_SELECTOR)[0]));
        manager.close(second);
        assert!(!page.is_visible(page.select(MODAL_ROOT_SELECTOR)[0]));
    }
}
