use std::any::{TypeId, type_name};
use std::collections::{HashMap, HashSet, hash_map};
use std::fmt;
use std::mem::take;
use std::sync::{Arc, Mutex, OnceLock, Weak};

use crate::{
    BlankResolver, Container, Error, FactoryHandle, Instance, Registry, Resolver, Result, StdError,
    resolver,
};

/// The owner facade: combines a resolver with a lazily initialized container.
///
/// An application is created by an [`ApplicationBuilder`], then initialized
/// with [`init_container`](Application::init_container), which runs every
/// plugin once against a fresh [`Registry`]. Lookups are only possible after
/// initialization.
///
/// # Examples
///
/// ```rust
/// use spindle::{Application, Injections, Instance, Registry, StdError};
/// use std::sync::Arc;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let app = Application::builder()
///     .add_plugin(|registry: &mut Registry| -> Result<(), StdError> {
///         registry.register(
///             "component:/app/components/date-picker",
///             |_: &Injections| -> Result<Instance, StdError> { Ok(Arc::new("bar")) },
///         )?;
///         Ok(())
///     })
///     .build();
/// app.init_container()?;
///
/// let picker = app.lookup_as::<&str>("component:/app/components/date-picker", None)?;
/// assert_eq!(*picker, "bar");
/// # Ok(())
/// # }
/// ```
pub struct Application {
    root_name: String,
    resolver: Arc<dyn Resolver>,
    plugins: Mutex<Plugins>,
    container: OnceLock<Container>,
    this: Weak<Application>,
}

impl Application {
    /// Creates a new application builder.
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder {
            root_name: DEFAULT_ROOT_NAME.to_owned(),
            resolver: None,
            plugins: Plugins::default(),
        }
    }

    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    pub fn resolver(&self) -> &Arc<dyn Resolver> {
        &self.resolver
    }

    /// The back-reference handed to every factory.
    pub fn owner(&self) -> Owner {
        Owner {
            app: self.this.clone(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.container.get().is_some()
    }

    /// Runs the plugins into a fresh registry and wires the container.
    ///
    /// Fails with [`Error::AlreadyInitialized`] when called twice. A failed
    /// initialization leaves the application uninitialized and may be retried.
    pub fn init_container(&self) -> Result<()> {
        let mut plugins = self.plugins.lock().unwrap_or_else(|p| p.into_inner());
        if self.is_initialized() {
            return Err(Error::AlreadyInitialized);
        }
        let mut registry = Registry::new();
        self.initialize(&plugins, &mut registry)?;
        let container = Container::new(registry, self.resolver.clone(), self.owner());
        tracing::debug!(
            root_name = %self.root_name,
            registrations = container.registry().len(),
            "Container initialized"
        );
        self.container
            .set(container)
            .map_err(|_| Error::AlreadyInitialized)?;
        // Drop plugins.
        take(&mut *plugins);
        Ok(())
    }

    /// Populates the registry by building every plugin in dependency order.
    fn initialize(&self, plugins: &Plugins, registry: &mut Registry) -> Result<()> {
        let mut graph = HashMap::new();
        for (type_id, plugin) in &plugins.plugins {
            graph.insert(*type_id, plugin.dependencies().plugins);
        }
        let mut order = Vec::new();
        let mut used = HashMap::new();
        for type_id in &plugins.order {
            if used.contains_key(type_id) {
                continue;
            }
            if !topological_sort(*type_id, &graph, &mut order, &mut used)? {
                return Err(Error::MissingDependency);
            }
        }
        for type_id in order {
            let plugin = &plugins.plugins[&type_id];
            plugin.build(registry).map_err(|source| Error::Plugin {
                name: plugin.name(),
                source,
            })?;
        }
        Ok(())
    }

    /// Returns the container, failing if it has not been initialized.
    pub fn container(&self) -> Result<&Container> {
        self.container.get().ok_or(Error::UninitializedContainer)
    }

    /// Resolves a specifier to its absolute form.
    ///
    /// Only the resolver is needed, so this works before initialization.
    pub fn identify(&self, specifier: &str, referrer: Option<&str>) -> Result<String> {
        resolver::identify(self.resolver.as_ref(), specifier, referrer)
    }

    pub fn factory_for(&self, specifier: &str, referrer: Option<&str>) -> Result<FactoryHandle> {
        self.container()?.factory_for(specifier, referrer)
    }

    pub fn lookup(&self, specifier: &str, referrer: Option<&str>) -> Result<Instance> {
        self.container()?.lookup(specifier, referrer)
    }

    pub fn lookup_as<T>(&self, specifier: &str, referrer: Option<&str>) -> Result<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        self.container()?.lookup_as(specifier, referrer)
    }
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("root_name", &self.root_name)
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}

const DEFAULT_ROOT_NAME: &str = "app";

/// Builder for an [`Application`].
///
/// # Examples
///
/// ```rust
/// use spindle::{Application, BlankResolver, Registry, StdError};
///
/// let app = Application::builder()
///     .root_name("my-app")
///     .resolver(BlankResolver)
///     .add_plugin(|_: &mut Registry| -> Result<(), StdError> { Ok(()) })
///     .build();
/// assert_eq!(app.root_name(), "my-app");
/// assert!(!app.is_initialized());
/// ```
pub struct ApplicationBuilder {
    root_name: String,
    resolver: Option<Arc<dyn Resolver>>,
    plugins: Plugins,
}

impl ApplicationBuilder {
    pub fn root_name(&mut self, root_name: impl Into<String>) -> &mut Self {
        self.root_name = root_name.into();
        self
    }

    pub fn get_root_name(&self) -> &str {
        &self.root_name
    }

    /// Sets the resolver consulted for relative specifiers and factories.
    ///
    /// Defaults to [`BlankResolver`].
    pub fn resolver<R>(&mut self, resolver: R) -> &mut Self
    where
        R: Resolver + 'static,
    {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Adds a plugin run during container initialization.
    ///
    /// # Panics
    ///
    /// Panics if a plugin of the same type has already been added.
    pub fn add_plugin<T>(&mut self, plugin: T) -> &mut Self
    where
        T: Plugin,
    {
        let type_id = TypeId::of::<T>();
        match self.plugins.plugins.entry(type_id) {
            hash_map::Entry::Occupied(_) => panic!("Plugin {} already added", plugin.name()),
            hash_map::Entry::Vacant(v) => {
                v.insert(Box::new(plugin));
                self.plugins.order.push(type_id);
            }
        };
        self
    }

    pub fn has_plugin<T>(&self) -> bool
    where
        T: Plugin,
    {
        self.plugins.plugins.contains_key(&TypeId::of::<T>())
    }

    /// Builds an uninitialized application.
    pub fn build(&mut self) -> Arc<Application> {
        let root_name = take(&mut self.root_name);
        let resolver = self
            .resolver
            .take()
            .unwrap_or_else(|| Arc::new(BlankResolver));
        let plugins = take(&mut self.plugins);
        Arc::new_cyclic(|this| Application {
            root_name,
            resolver,
            plugins: Mutex::new(plugins),
            container: OnceLock::new(),
            this: this.clone(),
        })
    }
}

#[derive(Default)]
struct Plugins {
    plugins: HashMap<TypeId, Box<dyn Plugin>>,
    order: Vec<TypeId>,
}

/// Weak back-reference to the application that performed a lookup.
///
/// Instances keep an owner to look up their collaborators. The owner never
/// keeps the application alive; once it is dropped every operation fails
/// with [`Error::OwnerDropped`].
#[derive(Clone)]
pub struct Owner {
    app: Weak<Application>,
}

impl Owner {
    pub fn application(&self) -> Result<Arc<Application>> {
        self.app.upgrade().ok_or(Error::OwnerDropped)
    }

    /// Returns `true` if this owner refers to `app`.
    pub fn is(&self, app: &Application) -> bool {
        std::ptr::eq(self.app.as_ptr(), app)
    }

    pub fn identify(&self, specifier: &str, referrer: Option<&str>) -> Result<String> {
        self.application()?.identify(specifier, referrer)
    }

    pub fn factory_for(&self, specifier: &str, referrer: Option<&str>) -> Result<FactoryHandle> {
        self.application()?.factory_for(specifier, referrer)
    }

    pub fn lookup(&self, specifier: &str, referrer: Option<&str>) -> Result<Instance> {
        self.application()?.lookup(specifier, referrer)
    }

    pub fn lookup_as<T>(&self, specifier: &str, referrer: Option<&str>) -> Result<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        self.application()?.lookup_as(specifier, referrer)
    }
}

impl PartialEq for Owner {
    fn eq(&self, other: &Self) -> bool {
        self.app.ptr_eq(&other.app)
    }
}

impl Eq for Owner {}

impl fmt::Debug for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Owner")
            .field("alive", &(self.app.strong_count() > 0))
            .finish()
    }
}

enum DependencyStatus {
    Pending,
    Ready,
}

fn topological_sort(
    type_id: TypeId,
    graph: &HashMap<TypeId, HashSet<TypeId>>,
    order: &mut Vec<TypeId>,
    used: &mut HashMap<TypeId, DependencyStatus>,
) -> Result<bool> {
    let dependencies = match graph.get(&type_id) {
        Some(v) => v,
        None => return Ok(false),
    };
    used.insert(type_id, DependencyStatus::Pending);
    for dep_type_id in dependencies {
        match used.get(dep_type_id) {
            Some(DependencyStatus::Pending) => return Err(Error::CircularDependency),
            Some(DependencyStatus::Ready) => continue,
            None => {}
        }
        if !topological_sort(*dep_type_id, graph, order, used)? {
            used.remove(&type_id);
            return Ok(false);
        }
    }
    used.insert(type_id, DependencyStatus::Ready);
    order.push(type_id);
    Ok(true)
}

/// Declares which plugins must populate the registry before another one.
///
/// # Examples
///
/// ```rust
/// use spindle::{Dependencies, Plugin, Registry, StdError};
///
/// struct RouterPlugin;
/// struct ComponentsPlugin;
///
/// impl Plugin for RouterPlugin {
///     fn build(&self, _registry: &mut Registry) -> Result<(), StdError> {
///         Ok(())
///     }
/// }
///
/// impl Plugin for ComponentsPlugin {
///     fn build(&self, _registry: &mut Registry) -> Result<(), StdError> {
///         Ok(())
///     }
///
///     fn dependencies(&self) -> Dependencies {
///         Dependencies::new().plugin::<RouterPlugin>()
///     }
/// }
/// ```
#[derive(Clone, Default)]
pub struct Dependencies {
    plugins: HashSet<TypeId>,
}

impl Dependencies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plugin<T>(mut self) -> Self
    where
        T: Plugin,
    {
        self.plugins.insert(TypeId::of::<T>());
        self
    }

    pub fn merge(mut self, other: Dependencies) -> Self {
        self.plugins.extend(other.plugins);
        self
    }
}

/// A unit of registry setup, run exactly once by
/// [`Application::init_container`].
///
/// Closures taking `&mut Registry` are plugins too.
pub trait Plugin: Send + Sync + 'static {
    fn build(&self, registry: &mut Registry) -> Result<(), StdError>;

    fn dependencies(&self) -> Dependencies {
        Dependencies::new()
    }

    fn name(&self) -> &'static str {
        type_name::<Self>()
    }
}

impl<F> Plugin for F
where
    F: Fn(&mut Registry) -> Result<(), StdError> + Send + Sync + 'static,
{
    fn build(&self, registry: &mut Registry) -> Result<(), StdError> {
        self(registry)
    }
}
