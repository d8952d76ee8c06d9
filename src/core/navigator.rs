//! # Checkout Navigator
//!
//! Step/tab state machine for the checkout page. Steps are discovered
//! from the document (`data-shop-checkout="navigation"` headers paired by
//! index with `data-shop-checkout="container"` contents); navigation is
//! then a pure index move with the page kept in sync: `active`, `visited`
//! and `disabled` classes, `aria-selected`, prev/next button enabling,
//! and the location hash.
//!
//! Before-change interceptors can veto a move ("your address form has
//! unsaved changes"); a veto records the target so a confirm dialog can
//! replay it through [`Navigator::continue_change`] without tripping the
//! interceptors again. After-change observers only run when the step
//! actually changed.

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::rc::Rc;

use log::{debug, warn};

use crate::dom::{NodeId, Page};

/// Role attribute: `navigation`, `container`, `next` or `prev`.
pub const ATTR_ROLE: &str = "data-shop-checkout";
/// Optional per-step name, used by [`Navigator::go_to_id`] and the hash.
pub const ATTR_STEP_ID: &str = "data-shop-checkout-id";

const CLASS_ACTIVE: &str = "active";
const CLASS_VISITED: &str = "visited";
const CLASS_DISABLED: &str = "disabled";

/// One discovered step: header element, container element, position, and
/// the optional id.
#[derive(Debug, Clone)]
pub struct StepRef {
    pub index: usize,
    pub id: Option<String>,
    pub header: NodeId,
    pub container: NodeId,
}

impl StepRef {
    /// Value written into the location hash for this step.
    fn hash_name(&self) -> String {
        self.id.clone().unwrap_or_else(|| self.index.to_string())
    }
}

/// Runs before a change; returning `false` vetoes it.
pub type Interceptor = Rc<dyn Fn(Option<&StepRef>, &StepRef) -> bool>;
/// Runs after a completed change.
pub type Observer = Rc<dyn Fn(&StepRef)>;

pub struct Navigator {
    page: Page,
    steps: RefCell<Vec<StepRef>>,
    prev_buttons: RefCell<Vec<NodeId>>,
    next_buttons: RefCell<Vec<NodeId>>,
    current: Cell<Option<usize>>,
    visited: RefCell<BTreeSet<usize>>,
    interceptors: RefCell<Vec<Interceptor>>,
    observers: RefCell<Vec<Observer>>,
    /// Target of the last vetoed navigation, for `continue_change`.
    pending: Cell<Option<usize>>,
    bypass_interceptors: Cell<bool>,
}

impl Navigator {
    pub fn new(page: Page) -> Self {
        Self {
            page,
            steps: RefCell::new(Vec::new()),
            prev_buttons: RefCell::new(Vec::new()),
            next_buttons: RefCell::new(Vec::new()),
            current: Cell::new(None),
            visited: RefCell::new(BTreeSet::new()),
            interceptors: RefCell::new(Vec::new()),
            observers: RefCell::new(Vec::new()),
            pending: Cell::new(None),
            bypass_interceptors: Cell::new(false),
        }
    }

    // -----------------------------------------------------------------
    // Discovery
    // -----------------------------------------------------------------

    /// (Re)discover steps and nav buttons from the document. Headers and
    /// containers pair up by document order; a count mismatch keeps the
    /// pairs that exist and warns about the rest.
    pub fn scan(&self) {
        let headers = self.page.select(&format!("[{ATTR_ROLE}=\"navigation\"]"));
        let containers = self.page.select(&format!("[{ATTR_ROLE}=\"container\"]"));
        if headers.len() != containers.len() {
            warn!(
                "checkout markup has {} step headers but {} containers",
                headers.len(),
                containers.len()
            );
        }
        let count = headers.len().min(containers.len());
        let steps: Vec<StepRef> = headers
            .into_iter()
            .zip(containers)
            .take(count)
            .enumerate()
            .map(|(index, (header, container))| StepRef {
                index,
                id: self.page.attr(header, ATTR_STEP_ID),
                header,
                container,
            })
            .collect();
        debug!("navigator found {} steps", steps.len());
        *self.steps.borrow_mut() = steps;
        *self.prev_buttons.borrow_mut() = self.page.select(&format!("[{ATTR_ROLE}=\"prev\"]"));
        *self.next_buttons.borrow_mut() = self.page.select(&format!("[{ATTR_ROLE}=\"next\"]"));

        let count = self.steps.borrow().len();
        if self.current.get().is_some_and(|cur| cur >= count) {
            self.current.set(None);
        }
        self.visited.borrow_mut().retain(|&i| i < count);
    }

    /// Apply the location hash as a deep link: a hash naming a step lands
    /// there with every earlier step marked visited; otherwise the first
    /// step becomes current. Interceptors do not run for this initial
    /// placement, observers do.
    pub fn init_from_location(&self) {
        if self.steps.borrow().is_empty() {
            debug!("navigator init skipped, no steps in the document");
            return;
        }
        let hash = self.page.location_hash();
        let deep_link = if hash.is_empty() {
            None
        } else {
            self.step_by_id(&hash)
        };
        match deep_link {
            Some(step) => {
                {
                    let mut visited = self.visited.borrow_mut();
                    for index in 0..=step.index {
                        visited.insert(index);
                    }
                }
                self.current.set(Some(step.index));
                self.refresh_page();
                self.sync_hash();
                self.notify_changed(&step);
            }
            None => {
                self.go_to(0);
            }
        }
    }

    // -----------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------

    pub fn step_count(&self) -> usize {
        self.steps.borrow().len()
    }

    pub fn current(&self) -> Option<usize> {
        self.current.get()
    }

    pub fn current_step(&self) -> Option<StepRef> {
        let index = self.current.get()?;
        self.steps.borrow().get(index).cloned()
    }

    pub fn visited(&self) -> Vec<usize> {
        self.visited.borrow().iter().copied().collect()
    }

    pub fn step_by_id(&self, id: &str) -> Option<StepRef> {
        self.steps
            .borrow()
            .iter()
            .find(|s| s.id.as_deref() == Some(id))
            .cloned()
    }

    // -----------------------------------------------------------------
    // Hooks
    // -----------------------------------------------------------------

    pub fn before_change(&self, interceptor: Interceptor) {
        self.interceptors.borrow_mut().push(interceptor);
    }

    pub fn after_change(&self, observer: Observer) {
        self.observers.borrow_mut().push(observer);
    }

    // -----------------------------------------------------------------
    // Navigation
    // -----------------------------------------------------------------

    /// Move to `target`. Returns `true` when the step actually changed.
    /// Out-of-range targets warn and do nothing; navigating to the
    /// current step refreshes classes but is not a change.
    pub fn go_to(&self, target: usize) -> bool {
        let count = self.steps.borrow().len();
        if target >= count {
            warn!("checkout step {target} is out of range (have {count})");
            return false;
        }
        if self.current.get() == Some(target) {
            self.refresh_page();
            return false;
        }

        let from = self.current_step();
        let to = match self.steps.borrow().get(target).cloned() {
            Some(step) => step,
            None => return false,
        };

        if !self.bypass_interceptors.take() {
            let interceptors: Vec<Interceptor> = self.interceptors.borrow().clone();
            for interceptor in interceptors {
                if !interceptor(from.as_ref(), &to) {
                    debug!("navigation to step {target} vetoed");
                    self.pending.set(Some(target));
                    return false;
                }
            }
        }

        self.pending.set(None);
        self.current.set(Some(target));
        self.visited.borrow_mut().insert(target);
        self.refresh_page();
        self.sync_hash();
        self.notify_changed(&to);
        true
    }

    pub fn next(&self) -> bool {
        match self.current.get() {
            None => self.go_to(0),
            Some(cur) if cur + 1 < self.step_count() => self.go_to(cur + 1),
            Some(_) => false,
        }
    }

    pub fn previous(&self) -> bool {
        match self.current.get() {
            Some(cur) if cur > 0 => self.go_to(cur - 1),
            _ => false,
        }
    }

    /// Navigate by step id. The ids `"next"` and `"prev"` are reserved
    /// aliases for the relative moves.
    pub fn go_to_id(&self, id: &str) -> bool {
        match id {
            "next" => self.next(),
            "prev" => self.previous(),
            _ => match self.step_by_id(id) {
                Some(step) => self.go_to(step.index),
                None => {
                    warn!("unknown checkout step id {id:?}");
                    false
                }
            },
        }
    }

    /// Replay the last vetoed navigation with interceptors suppressed for
    /// exactly that one move. No-op when nothing is pending.
    pub fn continue_change(&self) -> bool {
        match self.pending.take() {
            Some(target) => {
                self.bypass_interceptors.set(true);
                let moved = self.go_to(target);
                self.bypass_interceptors.set(false);
                moved
            }
            None => {
                debug!("continue_change without a pending navigation");
                false
            }
        }
    }

    // -----------------------------------------------------------------
    // Page sync
    // -----------------------------------------------------------------

    fn refresh_page(&self) {
        let steps = self.steps.borrow();
        let visited = self.visited.borrow();
        let current = self.current.get();
        for step in steps.iter() {
            let is_current = current == Some(step.index);
            let is_visited = visited.contains(&step.index);
            self.set_class(step.header, CLASS_ACTIVE, is_current);
            self.set_class(step.header, CLASS_VISITED, is_visited);
            self.set_class(step.header, CLASS_DISABLED, !is_visited && !is_current);
            self.page.set_attr(
                step.header,
                "aria-selected",
                if is_current { "true" } else { "false" },
            );
            self.set_class(step.container, CLASS_ACTIVE, is_current);
            if is_current {
                self.page.show(step.container);
            } else {
                self.page.hide(step.container);
            }
        }

        let at_first = current.is_none_or(|cur| cur == 0);
        let at_last = current.is_none_or(|cur| cur + 1 >= steps.len());
        for &button in self.prev_buttons.borrow().iter() {
            self.page.set_enabled(button, !at_first);
        }
        for &button in self.next_buttons.borrow().iter() {
            self.page.set_enabled(button, !at_last);
        }
    }

    fn set_class(&self, node: NodeId, class: &str, on: bool) {
        if on {
            self.page.add_class(node, class);
        } else {
            self.page.remove_class(node, class);
        }
    }

    /// Steps past the first one land in the hash; the first step clears
    /// it. Silent writes: navigator-initiated hash updates must not loop
    /// back in through `hashchange`.
    fn sync_hash(&self) {
        let Some(step) = self.current_step() else {
            return;
        };
        if step.index > 0 {
            self.page.set_hash_silent(&step.hash_name());
        } else {
            self.page.set_hash_silent("");
        }
    }

    fn notify_changed(&self, to: &StepRef) {
        let observers: Vec<Observer> = self.observers.borrow().clone();
        for observer in observers {
            observer(to);
        }
    }
}

// =====================================================================
// Tests
// =====================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Element;
    use std::cell::Cell;

    const STEP_IDS: [&str; 3] = ["address", "payment", "confirm"];

    fn checkout_page() -> Page {
        let page = Page::new();
        let root = page.root();
        let nav = page.append(root, Element::new("ul").class("checkout-nav"));
        for id in STEP_IDS {
            page.append(
                nav,
                Element::new("li")
                    .attr(ATTR_ROLE, "navigation")
                    .attr(ATTR_STEP_ID, id)
                    .text(id),
            );
        }
        for id in STEP_IDS {
            page.append(
                root,
                Element::new("div")
                    .attr(ATTR_ROLE, "container")
                    .class(&format!("step-{id}")),
            );
        }
        page.append(root, Element::new("button").attr(ATTR_ROLE, "prev"));
        page.append(root, Element::new("button").attr(ATTR_ROLE, "next"));
        page
    }

    fn nav() -> (Navigator, Page) {
        let page = checkout_page();
        let navigator = Navigator::new(page.clone());
        navigator.scan();
        (navigator, page)
    }

    fn header(page: &Page, index: usize) -> NodeId {
        page.select(&format!("[{ATTR_ROLE}=\"navigation\"]"))[index]
    }

    #[test]
    fn test_scan_discovers_steps_in_order() {
        let (navigator, _page) = nav();
        assert_eq!(navigator.step_count(), 3);
        assert_eq!(
            navigator.step_by_id("payment").map(|s| s.index),
            Some(1)
        );
        assert_eq!(navigator.current(), None);
    }

    #[test]
    fn test_go_to_updates_state_classes_and_buttons() {
        let (navigator, page) = nav();
        assert!(navigator.go_to(1));
        assert_eq!(navigator.current(), Some(1));
        assert_eq!(navigator.visited(), vec![1]);

        let active = header(&page, 1);
        assert!(page.has_class(active, "active"));
        assert!(page.has_class(active, "visited"));
        assert_eq!(page.attr(active, "aria-selected").as_deref(), Some("true"));
        let idle = header(&page, 2);
        assert!(page.has_class(idle, "disabled"));
        assert_eq!(page.attr(idle, "aria-selected").as_deref(), Some("false"));

        assert!(page.is_visible(page.select("div.step-payment")[0]));
        assert!(!page.is_visible(page.select("div.step-address")[0]));

        let prev = page.select(&format!("[{ATTR_ROLE}=\"prev\"]"))[0];
        let next = page.select(&format!("[{ATTR_ROLE}=\"next\"]"))[0];
        assert!(page.enabled(prev));
        assert!(page.enabled(next));

        navigator.go_to(2);
        assert!(!page.enabled(next));
        navigator.go_to(0);
        assert!(!page.enabled(page.select(&format!("[{ATTR_ROLE}=\"prev\"]"))[0]));
    }

    #[test]
    fn test_out_of_range_is_a_noop() {
        let (navigator, _page) = nav();
        navigator.go_to(1);
        assert!(!navigator.go_to(7));
        assert_eq!(navigator.current(), Some(1));
    }

    #[test]
    fn test_same_index_is_not_a_change() {
        let (navigator, _page) = nav();
        let changes = Rc::new(Cell::new(0));
        let counter = changes.clone();
        navigator.after_change(Rc::new(move |_| counter.set(counter.get() + 1)));
        navigator.go_to(1);
        assert!(!navigator.go_to(1));
        assert_eq!(changes.get(), 1);
    }

    #[test]
    fn test_veto_blocks_everything() {
        let (navigator, page) = nav();
        let changes = Rc::new(Cell::new(0));
        let counter = changes.clone();
        navigator.after_change(Rc::new(move |_| counter.set(counter.get() + 1)));
        navigator.go_to(0);
        navigator.before_change(Rc::new(|_, to| to.id.as_deref() != Some("payment")));

        assert!(!navigator.go_to(1));
        assert_eq!(navigator.current(), Some(0));
        assert_eq!(navigator.visited(), vec![0]);
        assert_eq!(page.location_hash(), "");
        assert!(!page.has_class(header(&page, 1), "active"));
        assert_eq!(changes.get(), 1); // only the initial go_to(0)
    }

    #[test]
    fn test_interceptors_run_in_order_and_short_circuit() {
        let (navigator, _page) = nav();
        let log = Rc::new(RefCell::new(Vec::new()));
        let first = log.clone();
        navigator.before_change(Rc::new(move |_, _| {
            first.borrow_mut().push("first");
            false
        }));
        let second = log.clone();
        navigator.before_change(Rc::new(move |_, _| {
            second.borrow_mut().push("second");
            true
        }));
        navigator.go_to(1);
        assert_eq!(*log.borrow(), vec!["first"]);
    }

    #[test]
    fn test_continue_change_replays_once_without_interceptors() {
        let (navigator, _page) = nav();
        navigator.go_to(0);
        let allow = Rc::new(Cell::new(false));
        let gate = allow.clone();
        navigator.before_change(Rc::new(move |_, _| gate.get()));

        assert!(!navigator.go_to(2));
        assert!(navigator.continue_change());
        assert_eq!(navigator.current(), Some(2));

        // Nothing pending anymore, and interceptors are back in force.
        assert!(!navigator.continue_change());
        assert!(!navigator.go_to(1));
        assert_eq!(navigator.current(), Some(2));
    }

    #[test]
    fn test_next_previous_clamp_at_boundaries() {
        let (navigator, _page) = nav();
        assert!(!navigator.previous());
        assert!(navigator.next());
        assert_eq!(navigator.current(), Some(0));
        assert!(!navigator.previous());
        navigator.next();
        navigator.next();
        assert_eq!(navigator.current(), Some(2));
        assert!(!navigator.next());
        assert_eq!(navigator.current(), Some(2));
    }

    #[test]
    fn test_go_to_id_with_sentinels() {
        let (navigator, _page) = nav();
        assert!(navigator.go_to_id("payment"));
        assert_eq!(navigator.current(), Some(1));
        assert!(navigator.go_to_id("next"));
        assert_eq!(navigator.current(), Some(2));
        assert!(navigator.go_to_id("prev"));
        assert_eq!(navigator.current(), Some(1));
        assert!(!navigator.go_to_id("warehouse"));
        assert_eq!(navigator.current(), Some(1));
    }

    #[test]
    fn test_hash_follows_navigation() {
        let (navigator, page) = nav();
        navigator.go_to(1);
        assert_eq!(page.location_hash(), "payment");
        navigator.go_to(2);
        assert_eq!(page.location_hash(), "confirm");
        navigator.go_to(0);
        assert_eq!(page.location_hash(), "");
    }

    #[test]
    fn test_deep_link_marks_earlier_steps_visited() {
        let page = checkout_page();
        page.set_hash_silent("payment");
        let navigator = Navigator::new(page.clone());
        navigator.scan();
        navigator.init_from_location();
        assert_eq!(navigator.current(), Some(1));
        assert_eq!(navigator.visited(), vec![0, 1]);
        assert!(!page.has_class(header(&page, 0), "disabled"));
    }

    #[test]
    fn test_init_without_hash_lands_on_first_step() {
        let (navigator, page) = nav();
        navigator.init_from_location();
        assert_eq!(navigator.current(), Some(0));
        assert_eq!(page.location_hash(), "");
    }

    #[test]
    fn test_visited_never_shrinks() {
        let (navigator, _page) = nav();
        navigator.go_to(0);
        navigator.go_to(2);
        navigator.go_to(1);
        navigator.go_to(0);
        assert_eq!(navigator.visited(), vec![0, 1, 2]);
    }
}
