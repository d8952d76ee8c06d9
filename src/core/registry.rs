//! # Component Registry
//!
//! The DI container behind the framework: *factories* (shared
//! infrastructure like the API client or the wait screen) and *services*
//! (feature components) live in two separate namespaces. A component is
//! registered as a recipe; compilation runs the recipe's producer at most
//! once and memoizes the result, resolving the dependency list first.
//!
//! ```text
//! register ──▶ defs ──compile──▶ compiled (memoized Rc<dyn Any>)
//!                 │                  ▲
//!                 └── dependencies ──┘   (recursive, cycle-checked)
//! ```
//!
//! Resolution never panics. Under [`MissingPolicy::Lenient`] an unknown
//! name is logged and reported in [`DepSet::missing`]; the rest of the set
//! still resolves, so one broken component degrades only itself. Strict
//! mode turns the first failure into an error for callers that cannot
//! proceed partially.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use log::{debug, error, warn};
use thiserror::Error;

use super::framework::Shopfront;

/// The two component namespaces. A factory and a service may share a
/// name without colliding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Factory,
    Service,
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentKind::Factory => write!(f, "factory"),
            ComponentKind::Service => write!(f, "service"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RegistryError {
    #[error("{kind} {name:?} is already registered")]
    DuplicateName { kind: ComponentKind, name: String },
    #[error("{kind} {name:?} is not registered (wanted by {wanted_by})")]
    MissingDependency {
        kind: ComponentKind,
        name: String,
        wanted_by: String,
    },
    #[error("cyclic dependency: {}", chain.join(" -> "))]
    CyclicDependency { chain: Vec<String> },
}

/// How resolution treats a dependency that cannot be produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingPolicy {
    /// Log, record the name in [`DepSet::missing`], keep going. This is
    /// the page-facing default: one broken component must not take the
    /// whole page down.
    #[default]
    Lenient,
    /// Fail the whole resolution on the first problem.
    Strict,
}

/// Context handed to a producer while its component is being compiled.
pub struct BuildCtx<'a> {
    /// The resolved dependency set, possibly incomplete under lenient
    /// resolution; check [`DepSet::is_complete`] when it matters.
    pub deps: DepSet,
    pub shopfront: &'a Shopfront,
}

/// A component recipe. Producers are infallible: a component that cannot
/// be constructed should not be registered in the first place, and
/// runtime failures belong in the component's own methods.
#[derive(Clone)]
pub struct ComponentDef {
    pub name: String,
    pub dependencies: Vec<String>,
    pub producer: Rc<dyn Fn(&BuildCtx) -> Rc<dyn Any>>,
}

impl ComponentDef {
    pub fn new(
        name: &str,
        dependencies: &[&str],
        producer: impl Fn(&BuildCtx) -> Rc<dyn Any> + 'static,
    ) -> Self {
        Self {
            name: name.to_string(),
            dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
            producer: Rc::new(producer),
        }
    }
}

/// The explicit result of a resolution: values by name, plus the names
/// that could not be produced. Typed access goes through [`DepSet::get`].
#[derive(Default, Clone)]
pub struct DepSet {
    values: HashMap<String, Rc<dyn Any>>,
    missing: Vec<String>,
}

impl DepSet {
    /// Downcasting accessor. Returns `None` for unknown names and for
    /// type mismatches; a mismatch is logged because it is always a
    /// wiring bug rather than an expected condition.
    pub fn get<T: 'static>(&self, name: &str) -> Option<Rc<T>> {
        let value = self.values.get(name)?;
        match value.clone().downcast::<T>() {
            Ok(typed) => Some(typed),
            Err(_) => {
                error!(
                    "dependency {name:?} is registered with a different type than requested"
                );
                None
            }
        }
    }

    pub fn get_any(&self, name: &str) -> Option<Rc<dyn Any>> {
        self.values.get(name).cloned()
    }

    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn missing(&self) -> &[String] {
        &self.missing
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn insert(&mut self, name: &str, value: Rc<dyn Any>) {
        self.values.insert(name.to_string(), value);
    }
}

// Values are type-erased, so only the names carry information.
impl fmt::Debug for DepSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.values.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("DepSet")
            .field("values", &names)
            .field("missing", &self.missing)
            .finish()
    }
}

type Key = (ComponentKind, String);

/// Recipe store plus memoized instances. All methods take `&self`;
/// interior borrows are released before any producer runs, so producers
/// may call back into the registry (which is also how cycles are caught).
#[derive(Default)]
pub struct ComponentRegistry {
    defs: RefCell<HashMap<Key, ComponentDef>>,
    compiled: RefCell<HashMap<Key, Rc<dyn Any>>>,
    // Compilation stack for cycle detection and error chains.
    stack: RefCell<Vec<Key>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a recipe. Without `overwrite`, a name collision leaves the
    /// existing recipe in place and returns `DuplicateName`. With it, the
    /// recipe is replaced and any memoized instance is dropped, so the
    /// next compile runs the new producer.
    pub fn register(
        &self,
        kind: ComponentKind,
        def: ComponentDef,
        overwrite: bool,
    ) -> Result<(), RegistryError> {
        let key = (kind, def.name.clone());
        let mut defs = self.defs.borrow_mut();
        if defs.contains_key(&key) && !overwrite {
            warn!("{kind} {:?} is already registered, keeping the first", def.name);
            return Err(RegistryError::DuplicateName {
                kind,
                name: def.name,
            });
        }
        if defs.insert(key.clone(), def).is_some() {
            debug!("{kind} {:?} overwritten, dropping memoized instance", key.1);
            self.compiled.borrow_mut().remove(&key);
        }
        Ok(())
    }

    pub fn is_registered(&self, kind: ComponentKind, name: &str) -> bool {
        self.defs
            .borrow()
            .contains_key(&(kind, name.to_string()))
    }

    /// Registered names for one namespace, sorted for stable output.
    pub fn names(&self, kind: ComponentKind) -> Vec<String> {
        let mut names: Vec<String> = self
            .defs
            .borrow()
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, n)| n.clone())
            .collect();
        names.sort();
        names
    }

    /// Compile one component: memoized, dependency-first. `wanted_by`
    /// only feeds diagnostics.
    pub fn compile(
        &self,
        kind: ComponentKind,
        name: &str,
        policy: MissingPolicy,
        wanted_by: &str,
        shopfront: &Shopfront,
    ) -> Result<Rc<dyn Any>, RegistryError> {
        let key: Key = (kind, name.to_string());

        if let Some(hit) = self.compiled.borrow().get(&key) {
            return Ok(hit.clone());
        }

        {
            let stack = self.stack.borrow();
            if let Some(pos) = stack.iter().position(|k| *k == key) {
                let mut chain: Vec<String> =
                    stack[pos..].iter().map(|(_, n)| n.clone()).collect();
                chain.push(name.to_string());
                return Err(RegistryError::CyclicDependency { chain });
            }
        }

        let def = match self.defs.borrow().get(&key) {
            Some(def) => def.clone(),
            None => {
                return Err(RegistryError::MissingDependency {
                    kind,
                    name: name.to_string(),
                    wanted_by: wanted_by.to_string(),
                });
            }
        };

        self.stack.borrow_mut().push(key.clone());
        // Dependency lists always name factories. A service never injects
        // another service; siblings are reached through the framework
        // handle inside the producer.
        let resolved = self.resolve(
            ComponentKind::Factory,
            &def.dependencies,
            policy,
            name,
            shopfront,
        );
        let deps = match resolved {
            Ok(deps) => deps,
            Err(err) => {
                self.stack.borrow_mut().pop();
                return Err(err);
            }
        };

        debug!("compiling {kind} {name:?}");
        let ctx = BuildCtx { deps, shopfront };
        // No registry borrow is held here; the producer may resolve.
        let instance = (def.producer)(&ctx);
        self.stack.borrow_mut().pop();

        self.compiled.borrow_mut().insert(key, instance.clone());
        Ok(instance)
    }

    /// Resolve a list of names into a [`DepSet`], compiling as needed.
    pub fn resolve(
        &self,
        kind: ComponentKind,
        names: &[String],
        policy: MissingPolicy,
        wanted_by: &str,
        shopfront: &Shopfront,
    ) -> Result<DepSet, RegistryError> {
        let mut set = DepSet::default();
        for name in names {
            match self.compile(kind, name, policy, wanted_by, shopfront) {
                Ok(value) => set.insert(name, value),
                Err(err) => match policy {
                    MissingPolicy::Strict => return Err(err),
                    MissingPolicy::Lenient => {
                        error!("cannot inject {kind} {name:?}: {err}");
                        set.missing.push(name.clone());
                    }
                },
            }
        }
        Ok(set)
    }

    /// Eagerly compile everything registered in both namespaces. Lenient:
    /// failures are logged, the pass continues. Safe to call repeatedly.
    pub fn compile_all(&self, shopfront: &Shopfront) {
        for kind in [ComponentKind::Factory, ComponentKind::Service] {
            for name in self.names(kind) {
                if let Err(err) =
                    self.compile(kind, &name, MissingPolicy::Lenient, "compile_all", shopfront)
                {
                    error!("could not compile {kind} {name:?}: {err}");
                }
            }
        }
    }
}

// =====================================================================
// Tests
// =====================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Page;
    use std::cell::Cell;

    fn fw() -> Shopfront {
        Shopfront::new(Page::new())
    }

    fn leaf(name: &str, value: u32) -> ComponentDef {
        ComponentDef::new(name, &[], move |_| Rc::new(value))
    }

    #[test]
    fn test_compile_memoizes_producer_runs() {
        let fw = fw();
        let runs = Rc::new(Cell::new(0));
        let counter = runs.clone();
        let def = ComponentDef::new("ui", &[], move |_| {
            counter.set(counter.get() + 1);
            Rc::new("ui-instance".to_string())
        });
        fw.registry()
            .register(ComponentKind::Factory, def, false)
            .unwrap();

        for _ in 0..3 {
            fw.registry()
                .compile(
                    ComponentKind::Factory,
                    "ui",
                    MissingPolicy::Strict,
                    "test",
                    &fw,
                )
                .unwrap();
        }
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn test_dependencies_resolve_before_producer() {
        let fw = fw();
        let registry = fw.registry();
        registry
            .register(ComponentKind::Factory, leaf("api", 7), false)
            .unwrap();
        let def = ComponentDef::new("checkout", &["api"], |ctx| {
            let api = ctx.deps.get::<u32>("api").map(|v| *v).unwrap_or(0);
            Rc::new(api + 1)
        });
        registry.register(ComponentKind::Factory, def, false).unwrap();

        let built = registry
            .compile(
                ComponentKind::Factory,
                "checkout",
                MissingPolicy::Strict,
                "test",
                &fw,
            )
            .unwrap();
        assert_eq!(*built.downcast::<u32>().unwrap(), 8);
    }

    #[test]
    fn test_duplicate_registration_keeps_first() {
        let fw = fw();
        let registry = fw.registry();
        registry
            .register(ComponentKind::Service, leaf("basket", 1), false)
            .unwrap();
        let err = registry
            .register(ComponentKind::Service, leaf("basket", 2), false)
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateName { .. }));

        let set = registry
            .resolve(
                ComponentKind::Service,
                &["basket".to_string()],
                MissingPolicy::Strict,
                "test",
                &fw,
            )
            .unwrap();
        assert_eq!(set.get::<u32>("basket").as_deref(), Some(&1));
    }

    #[test]
    fn test_overwrite_drops_memoized_instance() {
        let fw = fw();
        let registry = fw.registry();
        registry
            .register(ComponentKind::Service, leaf("basket", 1), false)
            .unwrap();
        registry
            .compile(
                ComponentKind::Service,
                "basket",
                MissingPolicy::Strict,
                "test",
                &fw,
            )
            .unwrap();
        registry
            .register(ComponentKind::Service, leaf("basket", 2), true)
            .unwrap();

        let set = registry
            .resolve(
                ComponentKind::Service,
                &["basket".to_string()],
                MissingPolicy::Strict,
                "test",
                &fw,
            )
            .unwrap();
        assert_eq!(set.get::<u32>("basket").as_deref(), Some(&2));
    }

    #[test]
    fn test_namespaces_are_independent() {
        let fw = fw();
        let registry = fw.registry();
        registry
            .register(ComponentKind::Factory, leaf("checkout", 10), false)
            .unwrap();
        registry
            .register(ComponentKind::Service, leaf("checkout", 20), false)
            .unwrap();

        let factory = registry
            .compile(
                ComponentKind::Factory,
                "checkout",
                MissingPolicy::Strict,
                "test",
                &fw,
            )
            .unwrap();
        let service = registry
            .compile(
                ComponentKind::Service,
                "checkout",
                MissingPolicy::Strict,
                "test",
                &fw,
            )
            .unwrap();
        assert_eq!(*factory.downcast::<u32>().unwrap(), 10);
        assert_eq!(*service.downcast::<u32>().unwrap(), 20);
    }

    #[test]
    fn test_lenient_resolution_records_missing() {
        let fw = fw();
        let registry = fw.registry();
        registry
            .register(ComponentKind::Service, leaf("media", 3), false)
            .unwrap();

        let set = registry
            .resolve(
                ComponentKind::Service,
                &["media".to_string(), "ghost".to_string()],
                MissingPolicy::Lenient,
                "test",
                &fw,
            )
            .unwrap();
        assert!(!set.is_complete());
        assert_eq!(set.missing(), &["ghost".to_string()]);
        assert_eq!(set.get::<u32>("media").as_deref(), Some(&3));
    }

    #[test]
    fn test_dep_set_debug_lists_names_only() {
        // unwrap_err on Result<DepSet, _> needs the impl; the erased
        // values must not leak into the output.
        let fw = fw();
        let registry = fw.registry();
        registry
            .register(ComponentKind::Service, leaf("media", 3), false)
            .unwrap();
        let set = registry
            .resolve(
                ComponentKind::Service,
                &["media".to_string(), "ghost".to_string()],
                MissingPolicy::Lenient,
                "test",
                &fw,
            )
            .unwrap();
        let rendered = format!("{set:?}");
        assert!(rendered.contains("media"));
        assert!(rendered.contains("ghost"));
    }

    #[test]
    fn test_strict_resolution_fails_on_missing() {
        let fw = fw();
        let err = fw
            .registry()
            .resolve(
                ComponentKind::Service,
                &["ghost".to_string()],
                MissingPolicy::Strict,
                "binder",
                &fw,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::MissingDependency { ref wanted_by, .. } if wanted_by == "binder"
        ));
    }

    #[test]
    fn test_cycle_is_detected_with_chain() {
        let fw = fw();
        let registry = fw.registry();
        registry
            .register(
                ComponentKind::Factory,
                ComponentDef::new("a", &["b"], |_| Rc::new(())),
                false,
            )
            .unwrap();
        registry
            .register(
                ComponentKind::Factory,
                ComponentDef::new("b", &["a"], |_| Rc::new(())),
                false,
            )
            .unwrap();

        let err = registry
            .compile(ComponentKind::Factory, "a", MissingPolicy::Strict, "test", &fw)
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::CyclicDependency {
                chain: vec!["a".to_string(), "b".to_string(), "a".to_string()]
            }
        );
    }

    #[test]
    fn test_lenient_cycle_degrades_to_missing() {
        let fw = fw();
        let registry = fw.registry();
        registry
            .register(
                ComponentKind::Factory,
                ComponentDef::new("a", &["b"], |ctx| Rc::new(ctx.deps.is_complete())),
                false,
            )
            .unwrap();
        registry
            .register(
                ComponentKind::Factory,
                ComponentDef::new("b", &["a"], |ctx| Rc::new(ctx.deps.is_complete())),
                false,
            )
            .unwrap();

        // Both still build. "b" is compiled while "a" is in progress, so
        // its dependency set is incomplete; "a" then sees a finished "b"
        // and resolves completely. No recursion, no panic.
        let built_a = registry
            .compile(ComponentKind::Factory, "a", MissingPolicy::Lenient, "test", &fw)
            .unwrap();
        assert!(*built_a.downcast::<bool>().unwrap());
        let built_b = registry
            .compile(ComponentKind::Factory, "b", MissingPolicy::Lenient, "test", &fw)
            .unwrap();
        assert!(!*built_b.downcast::<bool>().unwrap());
    }

    #[test]
    fn test_service_dependencies_come_from_the_factory_namespace() {
        let fw = fw();
        let registry = fw.registry();
        registry
            .register(ComponentKind::Factory, leaf("checkout", 10), false)
            .unwrap();
        registry
            .register(ComponentKind::Service, leaf("checkout", 20), false)
            .unwrap();
        let def = ComponentDef::new("flow", &["checkout"], |ctx| {
            Rc::new(ctx.deps.get::<u32>("checkout").map(|v| *v).unwrap_or(0))
        });
        registry.register(ComponentKind::Service, def, false).unwrap();

        let built = registry
            .compile(ComponentKind::Service, "flow", MissingPolicy::Strict, "test", &fw)
            .unwrap();
        assert_eq!(*built.downcast::<u32>().unwrap(), 10);
    }

    #[test]
    fn test_typed_get_rejects_wrong_type() {
        let fw = fw();
        let registry = fw.registry();
        registry
            .register(ComponentKind::Factory, leaf("api", 7), false)
            .unwrap();
        let set = registry
            .resolve(
                ComponentKind::Factory,
                &["api".to_string()],
                MissingPolicy::Strict,
                "test",
                &fw,
            )
            .unwrap();
        assert!(set.get::<String>("api").is_none());
        assert!(set.get::<u32>("api").is_some());
    }

    #[test]
    fn test_compile_all_is_idempotent() {
        let fw = fw();
        let runs = Rc::new(Cell::new(0));
        let counter = runs.clone();
        let def = ComponentDef::new("ui", &[], move |_| {
            counter.set(counter.get() + 1);
            Rc::new(())
        });
        fw.registry()
            .register(ComponentKind::Factory, def, false)
            .unwrap();

        fw.registry().compile_all(&fw);
        fw.registry().compile_all(&fw);
        assert_eq!(runs.get(), 1);
    }
}
