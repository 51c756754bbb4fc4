//! Service container.
//!
//! Services are bound under string ids to one of three kinds of [`Concrete`]:
//! a factory closure, a ready-made instance, or a [`ClassRef`] that declares
//! its constructor parameters explicitly. Resolving a class resolves each
//! declared dependency through the container first, falls back to the
//! parameter's default, and fails with [`Error::UnresolvableDependency`]
//! otherwise.
//!
//! ```
//! use snail_core::container::{ClassRef, Container};
//! use std::sync::Arc;
//!
//! struct Transport(&'static str);
//! struct Mailer { transport: Arc<Transport>, retries: u32 }
//!
//! let container = Container::new();
//! container.instance("Transport", Transport("smtp")).unwrap();
//! container
//!     .bind_class(
//!         "Mailer",
//!         ClassRef::new("Mailer")
//!             .inject("transport", "Transport")
//!             .default("retries", 3u32)
//!             .construct(|args| {
//!                 Ok(Mailer { transport: args.get("transport")?, retries: args.value("retries")? })
//!             }),
//!         true,
//!     )
//!     .unwrap();
//!
//! let mailer = container.resolve_as::<Mailer>("Mailer").unwrap();
//! assert_eq!(mailer.transport.0, "smtp");
//! assert_eq!(mailer.retries, 3);
//! ```
//!
//! Shared bindings cache their instance in a [`OnceCell`] slot, so concurrent
//! first resolutions construct exactly once. Re-entering an id that is already
//! being resolved on the same thread fails with [`Error::CircularDependency`].
//! A cycle split across two threads that both start resolving at the same time
//! can still block on each other's slot.

use crate::routing::HandlerProbe;
use crate::{Error, Result};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use snail_log::{LogSink, NullSink};
use std::any::{type_name, Any};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// A resolved service.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Factory closure. Receives the container as its only argument.
pub type Factory = Arc<dyn Fn(&Container) -> Result<Instance> + Send + Sync>;

type Constructor = Arc<dyn Fn(&Arguments) -> Result<Instance> + Send + Sync>;

/// Reserved id that always resolves to the container itself.
pub const CONTAINER_ID: &str = "container";

/// Namespace used for auto-registration when none is configured.
pub const DEFAULT_SERVICES_NAMESPACE: &str = "App::Services";

/// How a binding produces its instance.
#[derive(Clone)]
pub enum Concrete {
    Factory(Factory),
    Instance(Instance),
    Class(ClassRef),
}

impl fmt::Debug for Concrete {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Concrete::Factory(_) => f.write_str("Factory(<fn>)"),
            Concrete::Instance(_) => f.write_str("Instance(<any>)"),
            Concrete::Class(class) => write!(f, "Class({})", class.name),
        }
    }
}

#[derive(Clone)]
struct Parameter {
    name: String,
    service: Option<String>,
    default: Option<Instance>,
}

/// Class reference: a constructor plus its declared parameter list.
#[derive(Clone)]
pub struct ClassRef {
    name: String,
    params: Vec<Parameter>,
    constructor: Option<Constructor>,
}

impl ClassRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            constructor: None,
        }
    }

    /// Class for an [`Injectable`] type.
    pub fn of<T: Injectable>() -> Self {
        T::dependencies(ClassRef::new(short_type_name::<T>())).construct(T::construct)
    }

    /// Parameter resolved from service `service`.
    pub fn inject(mut self, param: &str, service: &str) -> Self {
        self.params.push(Parameter {
            name: param.to_string(),
            service: Some(service.to_string()),
            default: None,
        });
        self
    }

    /// Parameter resolved from `service`, or `default` when the container cannot supply it.
    pub fn inject_or<T: Any + Send + Sync>(mut self, param: &str, service: &str, default: T) -> Self {
        self.params.push(Parameter {
            name: param.to_string(),
            service: Some(service.to_string()),
            default: Some(Arc::new(default)),
        });
        self
    }

    /// Plain parameter with a default value.
    pub fn default<T: Any + Send + Sync>(mut self, param: &str, value: T) -> Self {
        self.params.push(Parameter {
            name: param.to_string(),
            service: None,
            default: Some(Arc::new(value)),
        });
        self
    }

    /// Plain parameter with no default. Building the class always fails on it.
    pub fn required(mut self, param: &str) -> Self {
        self.params.push(Parameter {
            name: param.to_string(),
            service: None,
            default: None,
        });
        self
    }

    pub fn construct<T, F>(mut self, constructor: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&Arguments) -> Result<T> + Send + Sync + 'static,
    {
        self.constructor = Some(Arc::new(move |args: &Arguments| {
            let instance: Instance = Arc::new(constructor(args)?);
            Ok(instance)
        }));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared parameter names, in order.
    pub fn parameters(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|p| p.name.as_str())
    }

    fn validate(&self, id: &str) -> Result<()> {
        let invalid = |reason: String| Error::InvalidBinding {
            id: id.to_string(),
            reason,
        };

        if self.constructor.is_none() {
            return Err(invalid(format!("class '{}' has no constructor", self.name)));
        }
        let mut seen = HashSet::new();
        for param in &self.params {
            if !seen.insert(param.name.as_str()) {
                return Err(invalid(format!("duplicate parameter '{}'", param.name)));
            }
            if param.service.as_deref() == Some(id) {
                return Err(invalid(format!("parameter '{}' injects the service itself", param.name)));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassRef")
            .field("name", &self.name)
            .field("parameters", &self.parameters().collect::<Vec<_>>())
            .finish()
    }
}

/// Types that declare their own constructor parameters.
pub trait Injectable: Any + Send + Sync + Sized {
    /// Add parameter declarations to `class`.
    fn dependencies(class: ClassRef) -> ClassRef {
        class
    }

    fn construct(args: &Arguments) -> Result<Self>;
}

/// Resolved constructor arguments.
pub struct Arguments {
    class: String,
    values: HashMap<String, Instance>,
}

impl Arguments {
    /// Argument `name` downcast to `T`.
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
        let value = self
            .values
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnresolvableDependency {
                service: self.class.clone(),
                parameter: name.to_string(),
            })?;
        value.downcast::<T>().map_err(|_| Error::ServiceTypeMismatch {
            id: format!("{}.{}", self.class, name),
            expected: type_name::<T>(),
        })
    }

    /// Owned copy of argument `name`.
    pub fn value<T: Any + Send + Sync + Clone>(&self, name: &str) -> Result<T> {
        self.get::<T>(name).map(|value| (*value).clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }
}

#[derive(Clone)]
struct Binding {
    concrete: Concrete,
    shared: bool,
    slot: Arc<OnceCell<Instance>>,
}

struct Inner {
    bindings: RwLock<HashMap<String, Binding>>,
    aliases: RwLock<HashMap<String, String>>,
    tags: RwLock<HashMap<String, Vec<String>>>,
    classes: RwLock<HashMap<String, ClassRef>>,
    services_namespace: RwLock<String>,
    sink: RwLock<Arc<dyn LogSink>>,
}

/// The service container. Cloning yields another handle to the same bindings.
#[derive(Clone)]
pub struct Container {
    inner: Arc<Inner>,
}

thread_local! {
    static RESOLVING: RefCell<Vec<(usize, String)>> = const { RefCell::new(Vec::new()) };
}

struct ResolutionGuard;

impl ResolutionGuard {
    fn enter(owner: usize, id: &str) -> Result<Self> {
        RESOLVING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(start) = stack.iter().position(|(o, i)| *o == owner && i == id) {
                let mut chain: Vec<&str> = stack[start..]
                    .iter()
                    .filter(|(o, _)| *o == owner)
                    .map(|(_, i)| i.as_str())
                    .collect();
                chain.push(id);
                return Err(Error::CircularDependency(chain.join(" -> ")));
            }
            stack.push((owner, id.to_string()));
            Ok(ResolutionGuard)
        })
    }
}

impl Drop for ResolutionGuard {
    fn drop(&mut self) {
        RESOLVING.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

impl Container {
    pub fn new() -> Self {
        debug!("Creating new service container");
        Self {
            inner: Arc::new(Inner {
                bindings: RwLock::new(HashMap::new()),
                aliases: RwLock::new(HashMap::new()),
                tags: RwLock::new(HashMap::new()),
                classes: RwLock::new(HashMap::new()),
                services_namespace: RwLock::new(DEFAULT_SERVICES_NAMESPACE.to_string()),
                sink: RwLock::new(Arc::new(NullSink)),
            }),
        }
    }

    /// Namespace searched by auto-registration.
    pub fn with_services_namespace(self, namespace: &str) -> Self {
        *self.inner.services_namespace.write() = namespace.trim_matches(':').to_string();
        self
    }

    /// Sink for `container` category diagnostics.
    pub fn with_sink(self, sink: Arc<dyn LogSink>) -> Self {
        *self.inner.sink.write() = sink;
        self
    }

    pub fn services_namespace(&self) -> String {
        self.inner.services_namespace.read().clone()
    }

    /// Whether two handles share the same bindings.
    pub fn ptr_eq(&self, other: &Container) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn owner(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }

    fn log(&self, message: &str) {
        let sink = self.inner.sink.read().clone();
        sink.log(message, "container");
    }

    /// Register or replace a binding. Replacing drops any cached instance.
    pub fn bind(&self, id: &str, concrete: Concrete, shared: bool) -> Result<&Self> {
        if id.trim().is_empty() {
            return Err(Error::InvalidBinding {
                id: id.to_string(),
                reason: "empty service id".to_string(),
            });
        }
        if id == CONTAINER_ID {
            return Err(Error::InvalidBinding {
                id: id.to_string(),
                reason: "id is reserved for the container".to_string(),
            });
        }
        if let Concrete::Class(class) = &concrete {
            class.validate(id)?;
        }

        let slot = Arc::new(OnceCell::new());
        if let Concrete::Instance(instance) = &concrete {
            let _ = slot.set(instance.clone());
        }

        self.inner.aliases.write().remove(id);
        self.inner.bindings.write().insert(
            id.to_string(),
            Binding {
                concrete,
                shared,
                slot,
            },
        );
        debug!(service = id, shared, "Service bound");
        Ok(self)
    }

    /// Bind a shared service.
    pub fn singleton(&self, id: &str, concrete: Concrete) -> Result<&Self> {
        self.bind(id, concrete, true)
    }

    /// Bind an existing value. Every resolution returns this same instance.
    pub fn instance<T: Any + Send + Sync>(&self, id: &str, value: T) -> Result<&Self> {
        self.bind(id, Concrete::Instance(Arc::new(value)), true)
    }

    pub fn bind_factory<F>(&self, id: &str, factory: F, shared: bool) -> Result<&Self>
    where
        F: Fn(&Container) -> Result<Instance> + Send + Sync + 'static,
    {
        self.bind(id, Concrete::Factory(Arc::new(factory)), shared)
    }

    pub fn bind_class(&self, id: &str, class: ClassRef, shared: bool) -> Result<&Self> {
        self.bind(id, Concrete::Class(class), shared)
    }

    /// Make `class` available to auto-registration under its full id
    /// (for example `App::Services::Mailer`).
    pub fn register_class(&self, id: &str, class: ClassRef) -> Result<&Self> {
        class.validate(id)?;
        self.inner.classes.write().insert(id.to_string(), class);
        trace!(class = id, "Class registered");
        Ok(self)
    }

    /// Redirect `alias` to `canonical`.
    pub fn alias(&self, alias: &str, canonical: &str) -> Result<&Self> {
        if alias.is_empty() || alias == canonical {
            return Err(Error::InvalidBinding {
                id: alias.to_string(),
                reason: "an alias must differ from its target".to_string(),
            });
        }
        if alias == CONTAINER_ID {
            return Err(Error::InvalidBinding {
                id: alias.to_string(),
                reason: "id is reserved for the container".to_string(),
            });
        }

        let mut aliases = self.inner.aliases.write();
        let mut cursor = canonical;
        while let Some(next) = aliases.get(cursor) {
            if next == alias {
                return Err(Error::InvalidBinding {
                    id: alias.to_string(),
                    reason: format!("alias loop through '{}'", canonical),
                });
            }
            cursor = next.as_str();
        }
        aliases.insert(alias.to_string(), canonical.to_string());
        debug!(alias, canonical, "Alias registered");
        Ok(self)
    }

    /// Follow aliases to the canonical id.
    pub fn canonical(&self, id: &str) -> String {
        let aliases = self.inner.aliases.read();
        let mut current = id;
        while let Some(next) = aliases.get(current) {
            current = next.as_str();
        }
        current.to_string()
    }

    /// Whether `id` (after aliases) has a binding.
    pub fn has(&self, id: &str) -> bool {
        let id = self.canonical(id);
        id == CONTAINER_ID || self.inner.bindings.read().contains_key(&id)
    }

    /// Whether `resolve` could find something for `id`, counting auto-registration.
    pub fn can_resolve(&self, id: &str) -> bool {
        self.has(id) || self.registered_class(&self.canonical(id)).is_some()
    }

    /// Resolve `id` to an instance.
    pub fn resolve(&self, id: &str) -> Result<Instance> {
        let id = self.canonical(id);
        if id == CONTAINER_ID {
            let container: Instance = Arc::new(self.clone());
            return Ok(container);
        }

        let _guard = ResolutionGuard::enter(self.owner(), &id)?;

        let existing = self.inner.bindings.read().get(&id).cloned();
        let binding = match existing {
            Some(binding) => binding,
            None => self.auto_register(&id)?,
        };

        trace!(service = %id, shared = binding.shared, "Resolving service");
        if binding.shared {
            binding
                .slot
                .get_or_try_init(|| self.build(&id, &binding.concrete))
                .cloned()
        } else {
            self.build(&id, &binding.concrete)
        }
    }

    /// Resolve and downcast.
    pub fn resolve_as<T: Any + Send + Sync>(&self, id: &str) -> Result<Arc<T>> {
        self.resolve(id)?
            .downcast::<T>()
            .map_err(|_| Error::ServiceTypeMismatch {
                id: id.to_string(),
                expected: type_name::<T>(),
            })
    }

    /// Attach `tag` to the given ids.
    pub fn tag(&self, tag: &str, ids: &[&str]) -> &Self {
        let mut tags = self.inner.tags.write();
        let entry = tags.entry(tag.to_string()).or_default();
        for id in ids {
            if !entry.iter().any(|existing| existing == id) {
                entry.push(id.to_string());
            }
        }
        self
    }

    /// Resolve every id carrying `tag`, in tagging order.
    pub fn tagged(&self, tag: &str) -> Result<Vec<Instance>> {
        let ids = self.inner.tags.read().get(tag).cloned().unwrap_or_default();
        ids.iter().map(|id| self.resolve(id)).collect()
    }

    /// Drop a binding and its cached instance. Returns whether it existed.
    pub fn forget(&self, id: &str) -> bool {
        let id = self.canonical(id);
        let removed = self.inner.bindings.write().remove(&id).is_some();
        if removed {
            debug!(service = %id, "Service forgotten");
        }
        removed
    }

    /// Run `f` with this container.
    pub fn call<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Container) -> Result<R>,
    {
        f(self)
    }

    /// Build `class` once, outside any binding. Entries in `overrides` take
    /// precedence over resolution for parameters of the same name.
    pub fn make(&self, class: &ClassRef, overrides: HashMap<String, Instance>) -> Result<Instance> {
        class.validate(&class.name)?;
        self.build_class(&class.name, class, overrides)
    }

    /// Bound ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.inner.bindings.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    fn build(&self, id: &str, concrete: &Concrete) -> Result<Instance> {
        match concrete {
            Concrete::Factory(factory) => factory(self),
            Concrete::Instance(instance) => Ok(instance.clone()),
            Concrete::Class(class) => self.build_class(id, class, HashMap::new()),
        }
    }

    fn build_class(
        &self,
        id: &str,
        class: &ClassRef,
        mut values: HashMap<String, Instance>,
    ) -> Result<Instance> {
        for param in &class.params {
            if values.contains_key(&param.name) {
                continue;
            }

            let value = match (&param.service, &param.default) {
                (Some(service), _) if self.can_resolve(service) => self.resolve(service)?,
                (_, Some(default)) => default.clone(),
                _ => {
                    let err = Error::UnresolvableDependency {
                        service: id.to_string(),
                        parameter: param.name.clone(),
                    };
                    self.log(&err.to_string());
                    return Err(err);
                }
            };
            values.insert(param.name.clone(), value);
        }

        let constructor = class.constructor.as_ref().ok_or_else(|| Error::InvalidBinding {
            id: id.to_string(),
            reason: format!("class '{}' has no constructor", class.name),
        })?;
        constructor(&Arguments {
            class: class.name.clone(),
            values,
        })
    }

    fn candidates(&self, id: &str) -> [String; 2] {
        if id.contains("::") {
            [format!("{}Interface", id), id.to_string()]
        } else {
            let namespace = self.inner.services_namespace.read();
            [
                format!("{}::{}Interface", namespace, id),
                format!("{}::{}", namespace, id),
            ]
        }
    }

    fn registered_class(&self, id: &str) -> Option<(String, ClassRef)> {
        let classes = self.inner.classes.read();
        self.candidates(id)
            .into_iter()
            .find_map(|name| classes.get(&name).cloned().map(|class| (name, class)))
    }

    /// Bind a registered class found by naming convention, shared.
    fn auto_register(&self, id: &str) -> Result<Binding> {
        let Some((found, class)) = self.registered_class(id) else {
            self.log(&format!("service '{}' not found", id));
            return Err(Error::ServiceNotFound(id.to_string()));
        };

        class.validate(id)?;
        // Check and insert under one guard so racing resolvers share a slot.
        let mut registered = false;
        let binding = self
            .inner
            .bindings
            .write()
            .entry(id.to_string())
            .or_insert_with(|| {
                registered = true;
                Binding {
                    concrete: Concrete::Class(class),
                    shared: true,
                    slot: Arc::new(OnceCell::new()),
                }
            })
            .clone();
        if registered {
            debug!(service = id, from = %found, "Service auto-registered");
            self.log(&format!("auto-registered '{}' from '{}'", id, found));
        }
        Ok(binding)
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("bindings", &self.ids())
            .field("services_namespace", &self.services_namespace())
            .finish()
    }
}

impl HandlerProbe for Container {
    fn has_controller(&self, id: &str) -> bool {
        self.can_resolve(id)
    }
}

fn short_type_name<T>() -> String {
    let full = type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}
