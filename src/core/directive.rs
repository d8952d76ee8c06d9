//! # Directive Registry
//!
//! Declarative behavior binding: a directive pairs a document target (a
//! selector, a concrete node, or the document itself) with a callback and
//! a list of service dependencies. [`DirectiveRegistry::bind_all`] walks
//! the current document and invokes each directive's callback once per
//! newly matched element, remembering what it has already bound so the
//! pass is idempotent - content can be reloaded and re-bound all day
//! without stacking handlers.
//!
//! Matching for a pass is snapshotted before any callback runs; a
//! callback that mutates the document affects the *next* pass, not the
//! one it is running in.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

use log::{debug, warn};

use super::action::ActionQueue;
use super::framework::Shopfront;
use super::registry::{ComponentKind, DepSet, MissingPolicy};
use crate::dom::{NodeId, Page};

/// Sequential directive handle, assigned at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirectiveId(pub(crate) usize);

#[derive(Debug, Clone)]
pub enum Target {
    /// Every element matching the selector, present now or after a reload.
    Selector(String),
    /// One concrete element.
    Node(NodeId),
    /// The document itself; the callback sees `node: None`. Bound once,
    /// and only by unfiltered passes.
    Document,
}

/// Context handed to a directive callback for one matched element.
pub struct BindCtx<'a> {
    /// Position of this element within the directive's match list.
    pub index: usize,
    /// `None` for document-level directives.
    pub node: Option<NodeId>,
    pub page: Page,
    /// Resolved service dependencies. Complete by construction - a
    /// directive with missing services is skipped, not half-injected.
    pub services: &'a DepSet,
    pub shopfront: &'a Shopfront,
    pub actions: ActionQueue,
}

pub struct DirectiveDef {
    pub target: Target,
    pub dependencies: Vec<String>,
    pub callback: Rc<dyn Fn(&BindCtx)>,
    pub allow_duplicates: bool,
}

impl DirectiveDef {
    pub fn selector(
        selector: &str,
        dependencies: &[&str],
        callback: impl Fn(&BindCtx) + 'static,
    ) -> Self {
        Self {
            target: Target::Selector(selector.to_string()),
            dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
            callback: Rc::new(callback),
            allow_duplicates: false,
        }
    }

    pub fn node(node: NodeId, dependencies: &[&str], callback: impl Fn(&BindCtx) + 'static) -> Self {
        Self {
            target: Target::Node(node),
            dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
            callback: Rc::new(callback),
            allow_duplicates: false,
        }
    }

    pub fn document(dependencies: &[&str], callback: impl Fn(&BindCtx) + 'static) -> Self {
        Self {
            target: Target::Document,
            dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
            callback: Rc::new(callback),
            allow_duplicates: false,
        }
    }

    /// Opt into re-invocation on elements already bound.
    pub fn with_duplicates(mut self) -> Self {
        self.allow_duplicates = true;
        self
    }
}

struct DirectiveEntry {
    id: DirectiveId,
    label: String,
    def: DirectiveDef,
    bound: HashSet<NodeId>,
    document_bound: bool,
}

#[derive(Default)]
pub struct DirectiveRegistry {
    entries: RefCell<Vec<DirectiveEntry>>,
    next_id: Cell<usize>,
}

/// One directive's share of a bind pass, snapshotted up front.
struct BindJob {
    id: DirectiveId,
    label: String,
    callback: Rc<dyn Fn(&BindCtx)>,
    dependencies: Vec<String>,
    targets: Vec<Option<NodeId>>,
}

impl DirectiveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, def: DirectiveDef) -> DirectiveId {
        let id = DirectiveId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        let label = match &def.target {
            Target::Selector(sel) => format!("directive #{} ({sel})", id.0),
            Target::Node(node) => format!("directive #{} (node {node:?})", id.0),
            Target::Document => format!("directive #{} (document)", id.0),
        };
        debug!("registered {label}");
        self.entries.borrow_mut().push(DirectiveEntry {
            id,
            label,
            def,
            bound: HashSet::new(),
            document_bound: false,
        });
        id
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Elements a directive has bound so far (attached or not).
    pub fn bound_elements(&self, id: DirectiveId) -> Vec<NodeId> {
        let entries = self.entries.borrow();
        let mut out: Vec<NodeId> = entries
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.bound.iter().copied().collect())
            .unwrap_or_default();
        out.sort();
        out
    }

    /// Run a bind pass over the whole document, or over the subtrees
    /// matching `filter`. Directives registered by callbacks during the
    /// pass take part from the next pass on.
    pub fn bind_all(&self, shopfront: &Shopfront, filter: Option<&str>) {
        let page = shopfront.page();

        let scope: Option<HashSet<NodeId>> = filter.map(|sel| {
            let mut set = HashSet::new();
            for root in page.select(sel) {
                set.extend(page.subtree(root));
            }
            set
        });

        // Snapshot phase: figure out what every directive would bind,
        // before any callback gets a chance to mutate the document.
        let jobs: Vec<BindJob> = {
            let entries = self.entries.borrow();
            entries
                .iter()
                .filter_map(|entry| {
                    let targets = Self::match_targets(entry, &page, scope.as_ref());
                    if targets.is_empty() {
                        None
                    } else {
                        Some(BindJob {
                            id: entry.id,
                            label: entry.label.clone(),
                            callback: entry.def.callback.clone(),
                            dependencies: entry.def.dependencies.clone(),
                            targets,
                        })
                    }
                })
                .collect()
        };

        for job in jobs {
            let services = match shopfront.registry().resolve(
                ComponentKind::Service,
                &job.dependencies,
                MissingPolicy::Lenient,
                &job.label,
                shopfront,
            ) {
                Ok(set) => set,
                Err(err) => {
                    warn!("skipping {}: {err}", job.label);
                    continue;
                }
            };
            if !services.is_complete() {
                warn!(
                    "skipping {}: missing services {:?}",
                    job.label,
                    services.missing()
                );
                continue;
            }

            for (index, node) in job.targets.iter().enumerate() {
                let ctx = BindCtx {
                    index,
                    node: *node,
                    page: page.clone(),
                    services: &services,
                    shopfront,
                    actions: shopfront.actions(),
                };
                (job.callback)(&ctx);
            }

            // Record right after this directive's callbacks, so a rebind
            // triggered further down the pass already sees these elements
            // as bound.
            let mut entries = self.entries.borrow_mut();
            if let Some(entry) = entries.iter_mut().find(|e| e.id == job.id) {
                for target in &job.targets {
                    match target {
                        Some(node) => {
                            entry.bound.insert(*node);
                        }
                        None => entry.document_bound = true,
                    }
                }
            }
        }
    }

    fn match_targets(
        entry: &DirectiveEntry,
        page: &Page,
        scope: Option<&HashSet<NodeId>>,
    ) -> Vec<Option<NodeId>> {
        let in_scope =
            |node: &NodeId| -> bool { scope.is_none_or(|set| set.contains(node)) };
        match &entry.def.target {
            Target::Selector(selector) => page
                .select(selector)
                .into_iter()
                .filter(in_scope)
                .filter(|node| entry.def.allow_duplicates || !entry.bound.contains(node))
                .map(Some)
                .collect(),
            Target::Node(node) => {
                let fresh = entry.def.allow_duplicates || !entry.bound.contains(node);
                if page.is_attached(*node) && in_scope(node) && fresh {
                    vec![Some(*node)]
                } else {
                    Vec::new()
                }
            }
            Target::Document => {
                let fresh = entry.def.allow_duplicates || !entry.document_bound;
                if scope.is_none() && fresh {
                    vec![None]
                } else {
                    Vec::new()
                }
            }
        }
    }
}

// =====================================================================
// Tests
// =====================================================================
