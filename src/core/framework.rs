//! # Framework Handle
//!
//! [`Shopfront`] owns the four core pieces - component registry, directive
//! registry, global store, action queue - plus the page, and is passed
//! around as an explicit context value. Cloning is cheap (one `Rc`), so
//! callbacks hold their own handle instead of reaching for a global.
//!
//! Long-lived components that need to call back into the framework keep a
//! [`FrameworkRef`] (a weak handle) to avoid keeping the whole framework
//! alive from inside its own registry.

use std::any::Any;
use std::rc::{Rc, Weak};

use log::error;
use serde_json::Value;

use super::action::ActionQueue;
use super::directive::{DirectiveDef, DirectiveId, DirectiveRegistry};
use super::globals::GlobalStore;
use super::registry::{
    BuildCtx, ComponentDef, ComponentKind, ComponentRegistry, MissingPolicy,
};
use crate::dom::Page;

struct ShopfrontInner {
    page: Page,
    registry: ComponentRegistry,
    directives: DirectiveRegistry,
    globals: GlobalStore,
    actions: ActionQueue,
}

/// The framework context. Everything the page runtime does starts here.
#[derive(Clone)]
pub struct Shopfront {
    inner: Rc<ShopfrontInner>,
}

impl Shopfront {
    pub fn new(page: Page) -> Self {
        Self {
            inner: Rc::new(ShopfrontInner {
                page,
                registry: ComponentRegistry::new(),
                directives: DirectiveRegistry::new(),
                globals: GlobalStore::new(),
                actions: ActionQueue::new(),
            }),
        }
    }

    pub fn page(&self) -> Page {
        self.inner.page.clone()
    }

    pub fn actions(&self) -> ActionQueue {
        self.inner.actions.clone()
    }

    pub fn globals(&self) -> &GlobalStore {
        &self.inner.globals
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.inner.registry
    }

    pub fn directives(&self) -> &DirectiveRegistry {
        &self.inner.directives
    }

    pub fn downgrade(&self) -> FrameworkRef {
        FrameworkRef {
            inner: Rc::downgrade(&self.inner),
        }
    }

    // -----------------------------------------------------------------
    // Component convenience
    // -----------------------------------------------------------------

    /// Register a factory recipe. A duplicate name is logged and dropped;
    /// use [`ComponentRegistry::register`] directly for overwrite control.
    pub fn register_factory(
        &self,
        name: &str,
        dependencies: &[&str],
        producer: impl Fn(&BuildCtx) -> Rc<dyn Any> + 'static,
    ) {
        let def = ComponentDef::new(name, dependencies, producer);
        let _ = self.inner.registry.register(ComponentKind::Factory, def, false);
    }

    pub fn register_service(
        &self,
        name: &str,
        dependencies: &[&str],
        producer: impl Fn(&BuildCtx) -> Rc<dyn Any> + 'static,
    ) {
        let def = ComponentDef::new(name, dependencies, producer);
        let _ = self.inner.registry.register(ComponentKind::Service, def, false);
    }

    /// Compile-on-demand typed lookup. Unknown names and type mismatches
    /// are logged and come back as `None`.
    pub fn factory<T: 'static>(&self, name: &str) -> Option<Rc<T>> {
        self.lookup::<T>(ComponentKind::Factory, name)
    }

    pub fn service<T: 'static>(&self, name: &str) -> Option<Rc<T>> {
        self.lookup::<T>(ComponentKind::Service, name)
    }

    fn lookup<T: 'static>(&self, kind: ComponentKind, name: &str) -> Option<Rc<T>> {
        let instance = match self.inner.registry.compile(
            kind,
            name,
            MissingPolicy::Lenient,
            "lookup",
            self,
        ) {
            Ok(instance) => instance,
            Err(err) => {
                error!("cannot look up {kind} {name:?}: {err}");
                return None;
            }
        };
        match instance.downcast::<T>() {
            Ok(typed) => Some(typed),
            Err(_) => {
                error!("{kind} {name:?} has a different type than requested");
                None
            }
        }
    }

    pub fn compile_all(&self) {
        self.inner.registry.compile_all(self);
    }

    // -----------------------------------------------------------------
    // Directive / global convenience
    // -----------------------------------------------------------------

    pub fn register_directive(&self, def: DirectiveDef) -> DirectiveId {
        self.inner.directives.register(def)
    }

    pub fn bind_directives(&self, filter: Option<&str>) {
        self.inner.directives.bind_all(self, filter);
    }

    pub fn set_global(&self, name: &str, value: Value) -> Option<Value> {
        self.inner.globals.set(name, value)
    }

    pub fn get_global(&self, name: &str) -> Option<Value> {
        self.inner.globals.get(name)
    }
}

/// Weak framework handle for components stored inside the registry.
#[derive(Clone)]
pub struct FrameworkRef {
    inner: Weak<ShopfrontInner>,
}

impl FrameworkRef {
    pub fn upgrade(&self) -> Option<Shopfront> {
        self.inner.upgrade().map(|inner| Shopfront { inner })
    }
}
