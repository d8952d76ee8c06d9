//! # Document Arena
//!
//! Elements live in a flat `Vec` indexed by [`NodeId`]; ids are handed out
//! once and never reused, so a stale id held by a directive's bound set can
//! be detected instead of silently pointing at a new element.
//!
//! [`Page`] is the cheap-clone handle everything else works through. All of
//! its methods take `&self` and keep their `RefCell` borrows short; event
//! dispatch snapshots the handler list before invoking anything, so a
//! handler is free to mutate the document or trigger further events.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::rc::Rc;

use log::warn;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use super::selector::Selector;

/// Index into the document arena. Never reused within a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

/// A DOM-ish event delivered to handlers. Document-level events (for
/// example `hashchange`) carry no target.
#[derive(Debug, Clone)]
pub struct Event {
    pub name: String,
    pub target: Option<NodeId>,
    pub detail: Value,
}

impl Event {
    pub fn new(name: &str, target: Option<NodeId>) -> Self {
        Self {
            name: name.to_string(),
            target,
            detail: Value::Null,
        }
    }

    pub fn with_detail(name: &str, target: Option<NodeId>, detail: Value) -> Self {
        Self {
            name: name.to_string(),
            target,
            detail,
        }
    }
}

/// Handlers capture whatever context they need (typically an action queue
/// clone); the document only hands them the event and the page.
pub type EventHandler = Rc<dyn Fn(&Event, &Page)>;

#[derive(Debug, Error)]
pub enum FragmentError {
    #[error("fragment node is not an object")]
    NotAnObject,
    #[error("fragment node is missing \"tag\"")]
    MissingTag,
    #[error("fragment field {0:?} has the wrong shape")]
    BadField(String),
}

// =====================================================================
// Element data
// =====================================================================

#[derive(Debug, Clone)]
struct ElementData {
    tag: String,
    classes: Vec<String>,
    attrs: HashMap<String, String>,
    text: String,
    value: String,
    checked: bool,
    enabled: bool,
    visible: bool,
    detached: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl ElementData {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            classes: Vec::new(),
            attrs: HashMap::new(),
            text: String::new(),
            value: String::new(),
            checked: false,
            enabled: true,
            visible: true,
            detached: false,
            parent: None,
            children: Vec::new(),
        }
    }
}

// =====================================================================
// Fragment builder
// =====================================================================

/// Builder for detached element trees. Materialized into the arena via
/// [`Page::append`] or [`Page::replace_children`].
#[derive(Debug, Clone, Default)]
pub struct Element {
    tag: String,
    classes: Vec<String>,
    attrs: Vec<(String, String)>,
    text: String,
    value: String,
    checked: bool,
    visible: bool,
    children: Vec<Element>,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            visible: true,
            ..Self::default()
        }
    }

    pub fn class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.push((name.to_string(), value.to_string()));
        self
    }

    pub fn id(self, id: &str) -> Self {
        self.attr("id", id)
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn value(mut self, value: &str) -> Self {
        self.value = value.to_string();
        self
    }

    pub fn checked(mut self, checked: bool) -> Self {
        self.checked = checked;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(mut self, children: Vec<Element>) -> Self {
        self.children.extend(children);
        self
    }

    /// Parse the JSON fragment format used by server-delivered markup:
    /// `{"tag": "...", "classes": [..], "attrs": {..}, "text": "..",
    /// "value": "..", "children": [..]}`. Everything but `tag` is optional.
    pub fn from_json(json: &Value) -> Result<Element, FragmentError> {
        let obj = json.as_object().ok_or(FragmentError::NotAnObject)?;
        let tag = obj
            .get("tag")
            .and_then(Value::as_str)
            .ok_or(FragmentError::MissingTag)?;
        let mut el = Element::new(tag);
        if let Some(classes) = obj.get("classes") {
            let list = classes
                .as_array()
                .ok_or_else(|| FragmentError::BadField("classes".into()))?;
            for class in list {
                let class = class
                    .as_str()
                    .ok_or_else(|| FragmentError::BadField("classes".into()))?;
                el = el.class(class);
            }
        }
        if let Some(attrs) = obj.get("attrs") {
            let map = attrs
                .as_object()
                .ok_or_else(|| FragmentError::BadField("attrs".into()))?;
            for (name, value) in map {
                let value = value
                    .as_str()
                    .ok_or_else(|| FragmentError::BadField("attrs".into()))?;
                el = el.attr(name, value);
            }
        }
        if let Some(text) = obj.get("text") {
            el = el.text(text.as_str().ok_or_else(|| FragmentError::BadField("text".into()))?);
        }
        if let Some(value) = obj.get("value") {
            el = el.value(
                value
                    .as_str()
                    .ok_or_else(|| FragmentError::BadField("value".into()))?,
            );
        }
        if let Some(children) = obj.get("children") {
            let list = children
                .as_array()
                .ok_or_else(|| FragmentError::BadField("children".into()))?;
            for child in list {
                el = el.child(Element::from_json(child)?);
            }
        }
        Ok(el)
    }
}

// =====================================================================
// Document + Page
// =====================================================================

struct Document {
    nodes: Vec<ElementData>,
    root: NodeId,
    location_hash: String,
    viewport_width: u32,
    handlers: HashMap<(NodeId, String), Vec<EventHandler>>,
    document_handlers: HashMap<String, Vec<EventHandler>>,
    session_id: Uuid,
}

impl Document {
    fn new() -> Self {
        let mut nodes = Vec::new();
        nodes.push(ElementData::new("body"));
        Self {
            nodes,
            root: NodeId(0),
            location_hash: String::new(),
            viewport_width: 1280,
            handlers: HashMap::new(),
            document_handlers: HashMap::new(),
            session_id: Uuid::new_v4(),
        }
    }

    fn alloc(&mut self, data: ElementData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(data);
        id
    }

    fn materialize(&mut self, el: &Element, parent: NodeId) -> NodeId {
        let mut data = ElementData::new(&el.tag);
        data.classes = el.classes.clone();
        data.attrs = el.attrs.iter().cloned().collect();
        data.text = el.text.clone();
        data.value = el.value.clone();
        data.checked = el.checked;
        data.visible = el.visible;
        data.parent = Some(parent);
        let id = self.alloc(data);
        for child in &el.children {
            let child_id = self.materialize(child, id);
            self.nodes[id.0].children.push(child_id);
        }
        id
    }

    fn detach(&mut self, node: NodeId) {
        // Mark the whole subtree; handlers age out with the nodes.
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            self.nodes[id.0].detached = true;
            self.handlers.retain(|(owner, _), _| *owner != id);
            stack.extend(self.nodes[id.0].children.iter().copied());
        }
        if let Some(parent) = self.nodes[node.0].parent {
            self.nodes[parent.0].children.retain(|&c| c != node);
        }
        self.nodes[node.0].parent = None;
    }

    /// Pre-order walk of the attached tree.
    fn walk(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            out.push(id);
            for &child in self.nodes[id.0].children.iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    fn walk_from(&self, start: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            out.push(id);
            for &child in self.nodes[id.0].children.iter().rev() {
                stack.push(child);
            }
        }
        out
    }
}

/// Cheap-clone handle to the document. Everything the framework does to
/// the page goes through here.
#[derive(Clone)]
pub struct Page {
    doc: Rc<RefCell<Document>>,
}

impl Page {
    pub fn new() -> Self {
        Self {
            doc: Rc::new(RefCell::new(Document::new())),
        }
    }

    pub fn root(&self) -> NodeId {
        self.doc.borrow().root
    }

    pub fn session_id(&self) -> Uuid {
        self.doc.borrow().session_id
    }

    // -----------------------------------------------------------------
    // Structure
    // -----------------------------------------------------------------

    pub fn append(&self, parent: NodeId, el: Element) -> NodeId {
        let mut doc = self.doc.borrow_mut();
        let id = doc.materialize(&el, parent);
        doc.nodes[parent.0].children.push(id);
        id
    }

    /// Detach every current child of `parent` and materialize `fragments`
    /// in their place. Returns the new child ids.
    pub fn replace_children(&self, parent: NodeId, fragments: Vec<Element>) -> Vec<NodeId> {
        let mut doc = self.doc.borrow_mut();
        for child in doc.nodes[parent.0].children.clone() {
            doc.detach(child);
        }
        let mut out = Vec::with_capacity(fragments.len());
        for el in &fragments {
            let id = doc.materialize(el, parent);
            doc.nodes[parent.0].children.push(id);
            out.push(id);
        }
        out
    }

    pub fn remove(&self, node: NodeId) {
        let mut doc = self.doc.borrow_mut();
        if node == doc.root {
            warn!("refusing to remove the document root");
            return;
        }
        doc.detach(node);
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.doc.borrow().nodes[node.0].parent
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.doc.borrow().nodes[node.0].children.clone()
    }

    pub fn is_attached(&self, node: NodeId) -> bool {
        let doc = self.doc.borrow();
        node.0 < doc.nodes.len() && !doc.nodes[node.0].detached
    }

    /// All nodes in the subtree rooted at `node` (inclusive), document
    /// order. Empty when `node` is detached.
    pub fn subtree(&self, node: NodeId) -> Vec<NodeId> {
        let doc = self.doc.borrow();
        if doc.nodes[node.0].detached {
            return Vec::new();
        }
        doc.walk_from(node)
    }

    // -----------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------

    /// Match a selector against the attached document, in document order.
    /// An unparsable selector logs and matches nothing.
    pub fn select(&self, selector: &str) -> Vec<NodeId> {
        match Selector::parse(selector) {
            Ok(sel) => self.select_parsed(&sel),
            Err(err) => {
                warn!("ignoring unparsable selector {selector:?}: {err}");
                Vec::new()
            }
        }
    }

    pub fn select_parsed(&self, selector: &Selector) -> Vec<NodeId> {
        let doc = self.doc.borrow();
        doc.walk()
            .into_iter()
            .filter(|&id| selector.matches(|n| self.simple_view(&doc, n), id))
            .collect()
    }

    /// Subtree-scoped selection rooted at `scope` (inclusive).
    pub fn select_within(&self, scope: NodeId, selector: &str) -> Vec<NodeId> {
        let sel = match Selector::parse(selector) {
            Ok(sel) => sel,
            Err(err) => {
                warn!("ignoring unparsable selector {selector:?}: {err}");
                return Vec::new();
            }
        };
        let doc = self.doc.borrow();
        if doc.nodes[scope.0].detached {
            return Vec::new();
        }
        doc.walk_from(scope)
            .into_iter()
            .filter(|&id| sel.matches(|n| self.simple_view(&doc, n), id))
            .collect()
    }

    /// Nearest ancestor (self included) matching `selector`.
    pub fn closest(&self, node: NodeId, selector: &str) -> Option<NodeId> {
        let sel = Selector::parse(selector).ok()?;
        let doc = self.doc.borrow();
        let mut cursor = Some(node);
        while let Some(id) = cursor {
            if sel.matches(|n| self.simple_view(&doc, n), id) {
                return Some(id);
            }
            cursor = doc.nodes[id.0].parent;
        }
        None
    }

    fn simple_view<'a>(
        &self,
        doc: &'a Document,
        node: NodeId,
    ) -> super::selector::NodeView<'a> {
        let data = &doc.nodes[node.0];
        super::selector::NodeView {
            tag: &data.tag,
            classes: &data.classes,
            attrs: &data.attrs,
            parent: data.parent,
        }
    }

    // -----------------------------------------------------------------
    // Element accessors
    // -----------------------------------------------------------------

    pub fn tag(&self, node: NodeId) -> String {
        self.doc.borrow().nodes[node.0].tag.clone()
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<String> {
        self.doc.borrow().nodes[node.0].attrs.get(name).cloned()
    }

    pub fn set_attr(&self, node: NodeId, name: &str, value: &str) {
        self.doc.borrow_mut().nodes[node.0]
            .attrs
            .insert(name.to_string(), value.to_string());
    }

    pub fn remove_attr(&self, node: NodeId, name: &str) {
        self.doc.borrow_mut().nodes[node.0].attrs.remove(name);
    }

    pub fn text(&self, node: NodeId) -> String {
        self.doc.borrow().nodes[node.0].text.clone()
    }

    pub fn set_text(&self, node: NodeId, text: &str) {
        self.doc.borrow_mut().nodes[node.0].text = text.to_string();
    }

    pub fn value(&self, node: NodeId) -> String {
        self.doc.borrow().nodes[node.0].value.clone()
    }

    pub fn set_value(&self, node: NodeId, value: &str) {
        self.doc.borrow_mut().nodes[node.0].value = value.to_string();
    }

    pub fn checked(&self, node: NodeId) -> bool {
        self.doc.borrow().nodes[node.0].checked
    }

    pub fn set_checked(&self, node: NodeId, checked: bool) {
        self.doc.borrow_mut().nodes[node.0].checked = checked;
    }

    pub fn enabled(&self, node: NodeId) -> bool {
        self.doc.borrow().nodes[node.0].enabled
    }

    pub fn set_enabled(&self, node: NodeId, enabled: bool) {
        self.doc.borrow_mut().nodes[node.0].enabled = enabled;
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.doc.borrow().nodes[node.0]
            .classes
            .iter()
            .any(|c| c == class)
    }

    pub fn add_class(&self, node: NodeId, class: &str) {
        let mut doc = self.doc.borrow_mut();
        let classes = &mut doc.nodes[node.0].classes;
        if !classes.iter().any(|c| c == class) {
            classes.push(class.to_string());
        }
    }

    pub fn remove_class(&self, node: NodeId, class: &str) {
        self.doc.borrow_mut().nodes[node.0]
            .classes
            .retain(|c| c != class);
    }

    pub fn is_visible(&self, node: NodeId) -> bool {
        self.doc.borrow().nodes[node.0].visible
    }

    pub fn show(&self, node: NodeId) {
        self.doc.borrow_mut().nodes[node.0].visible = true;
    }

    pub fn hide(&self, node: NodeId) {
        self.doc.borrow_mut().nodes[node.0].visible = false;
    }

    pub fn toggle(&self, node: NodeId) {
        let mut doc = self.doc.borrow_mut();
        let visible = &mut doc.nodes[node.0].visible;
        *visible = !*visible;
    }

    // -----------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------

    pub fn on(&self, node: NodeId, event: &str, handler: EventHandler) {
        self.doc
            .borrow_mut()
            .handlers
            .entry((node, event.to_string()))
            .or_default()
            .push(handler);
    }

    pub fn document_on(&self, event: &str, handler: EventHandler) {
        self.doc
            .borrow_mut()
            .document_handlers
            .entry(event.to_string())
            .or_default()
            .push(handler);
    }

    /// Fire `event` on `node`. Handlers are snapshotted before the first
    /// call, so they may freely mutate the document or trigger again.
    pub fn trigger(&self, node: NodeId, event: &str) {
        self.trigger_with(node, event, Value::Null);
    }

    pub fn trigger_with(&self, node: NodeId, event: &str, detail: Value) {
        let snapshot: Vec<EventHandler> = {
            let doc = self.doc.borrow();
            if doc.nodes[node.0].detached || !doc.nodes[node.0].enabled {
                Vec::new()
            } else {
                doc.handlers
                    .get(&(node, event.to_string()))
                    .map(|hs| hs.to_vec())
                    .unwrap_or_default()
            }
        };
        let ev = Event::with_detail(event, Some(node), detail);
        for handler in snapshot {
            handler(&ev, self);
        }
    }

    pub fn document_trigger(&self, event: &str, detail: Value) {
        let snapshot: Vec<EventHandler> = {
            let doc = self.doc.borrow();
            doc.document_handlers
                .get(event)
                .map(|hs| hs.to_vec())
                .unwrap_or_default()
        };
        let ev = Event::with_detail(event, None, detail);
        for handler in snapshot {
            handler(&ev, self);
        }
    }

    // -----------------------------------------------------------------
    // Page-level state
    // -----------------------------------------------------------------

    pub fn location_hash(&self) -> String {
        self.doc.borrow().location_hash.clone()
    }

    /// Set the hash and fire `hashchange`, like a user following a deep
    /// link. Internal writers that must not re-enter navigation use
    /// [`Page::set_hash_silent`].
    pub fn set_location_hash(&self, hash: &str) {
        let changed = {
            let mut doc = self.doc.borrow_mut();
            if doc.location_hash == hash {
                false
            } else {
                doc.location_hash = hash.to_string();
                true
            }
        };
        if changed {
            self.document_trigger("hashchange", Value::String(hash.to_string()));
        }
    }

    pub fn set_hash_silent(&self, hash: &str) {
        self.doc.borrow_mut().location_hash = hash.to_string();
    }

    pub fn viewport_width(&self) -> u32 {
        self.doc.borrow().viewport_width
    }

    pub fn set_viewport_width(&self, width: u32) {
        self.doc.borrow_mut().viewport_width = width;
    }

    // -----------------------------------------------------------------
    // Debug
    // -----------------------------------------------------------------

    /// Indented tree dump, for the demo shell and test failure output.
    pub fn dump(&self, node: NodeId) -> String {
        let doc = self.doc.borrow();
        let mut out = String::new();
        self.dump_into(&doc, node, 0, &mut out);
        out
    }

    fn dump_into(&self, doc: &Document, node: NodeId, depth: usize, out: &mut String) {
        let data = &doc.nodes[node.0];
        let _ = write!(out, "{}{}", "  ".repeat(depth), data.tag);
        if let Some(id) = data.attrs.get("id") {
            let _ = write!(out, "#{id}");
        }
        for class in &data.classes {
            let _ = write!(out, ".{class}");
        }
        for (name, value) in data.attrs.iter().filter(|(n, _)| *n != "id") {
            let _ = write!(out, " [{name}={value}]");
        }
        if !data.visible {
            let _ = write!(out, " (hidden)");
        }
        if !data.text.is_empty() {
            let _ = write!(out, " {:?}", data.text);
        }
        if !data.value.is_empty() {
            let _ = write!(out, " value={:?}", data.value);
        }
        out.push('\n');
        for &child in &data.children {
            self.dump_into(doc, child, depth + 1, out);
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

// =====================================================================
// Tests
// =====================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn sample_page() -> Page {
        let page = Page::new();
        let root = page.root();
        page.append(
            root,
            Element::new("div").id("main").child(
                Element::new("button")
                    .class("buy")
                    .attr("data-shop-action", "add-to-basket")
                    .text("Buy"),
            ),
        );
        page
    }

    #[test]
    fn test_append_and_select() {
        let page = sample_page();
        let hits = page.select("#main button.buy");
        assert_eq!(hits.len(), 1);
        assert_eq!(page.text(hits[0]), "Buy");
    }

    #[test]
    fn test_replace_children_detaches_old_nodes() {
        let page = sample_page();
        let main = page.select("#main")[0];
        let old_button = page.select("button")[0];
        let new_ids = page.replace_children(main, vec![Element::new("span").text("done")]);
        assert_eq!(new_ids.len(), 1);
        assert!(!page.is_attached(old_button));
        assert!(page.select("button").is_empty());
        assert_eq!(page.select("span").len(), 1);
    }

    #[test]
    fn test_node_ids_are_not_reused() {
        let page = sample_page();
        let main = page.select("#main")[0];
        let old_button = page.select("button")[0];
        let new_ids = page.replace_children(main, vec![Element::new("button")]);
        assert_ne!(new_ids[0], old_button);
    }

    #[test]
    fn test_trigger_snapshots_handlers() {
        let page = sample_page();
        let button = page.select("button")[0];
        let calls = Rc::new(Cell::new(0));
        let calls_outer = calls.clone();
        page.on(
            button,
            "click",
            Rc::new(move |_ev, page: &Page| {
                calls_outer.set(calls_outer.get() + 1);
                // Registering inside a handler must not affect this pass.
                let calls_inner = calls_outer.clone();
                page.on(
                    _ev.target.unwrap(),
                    "click",
                    Rc::new(move |_, _| calls_inner.set(calls_inner.get() + 10)),
                );
            }),
        );
        page.trigger(button, "click");
        assert_eq!(calls.get(), 1);
        page.trigger(button, "click");
        assert_eq!(calls.get(), 12);
    }

    #[test]
    fn test_disabled_elements_do_not_fire() {
        let page = sample_page();
        let button = page.select("button")[0];
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        page.on(button, "click", Rc::new(move |_, _| counter.set(counter.get() + 1)));
        page.set_enabled(button, false);
        page.trigger(button, "click");
        assert_eq!(calls.get(), 0);
        page.set_enabled(button, true);
        page.trigger(button, "click");
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_hashchange_fires_only_on_change() {
        let page = Page::new();
        let fired = Rc::new(Cell::new(0));
        let counter = fired.clone();
        page.document_on("hashchange", Rc::new(move |_, _| counter.set(counter.get() + 1)));
        page.set_location_hash("payment");
        page.set_location_hash("payment");
        assert_eq!(fired.get(), 1);
        page.set_hash_silent("confirm");
        assert_eq!(fired.get(), 1);
        assert_eq!(page.location_hash(), "confirm");
    }

    #[test]
    fn test_fragment_from_json() {
        let json = serde_json::json!({
            "tag": "ul",
            "classes": ["basket-list"],
            "children": [
                {"tag": "li", "attrs": {"data-basket-item": "101"}, "text": "Desk lamp"}
            ]
        });
        let el = Element::from_json(&json).unwrap();
        let page = Page::new();
        page.append(page.root(), el);
        let items = page.select("ul.basket-list li[data-basket-item]");
        assert_eq!(items.len(), 1);
        assert_eq!(page.text(items[0]), "Desk lamp");
    }

    #[test]
    fn test_fragment_from_json_rejects_missing_tag() {
        let err = Element::from_json(&serde_json::json!({"text": "x"})).unwrap_err();
        assert!(matches!(err, FragmentError::MissingTag));
    }

    #[test]
    fn test_closest_walks_ancestors() {
        let page = sample_page();
        let button = page.select("button")[0];
        assert_eq!(page.closest(button, "#main"), page.select("#main").first().copied());
        assert_eq!(page.closest(button, "button.buy"), Some(button));
        assert_eq!(page.closest(button, "form"), None);
    }
}
