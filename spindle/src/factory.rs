//! Factories and the injections bag they receive.
//!
//! A [`Factory`] is a value-level object with a single creation operation. The
//! container calls it with an [`Injections`] bag holding every declared
//! dependency plus the [`Owner`] that performed the lookup.
//!
//! Any closure of the right shape is a factory:
//!
//! ```rust
//! use spindle::{FactoryHandle, Injections, Instance, StdError};
//! use std::sync::Arc;
//!
//! let factory = FactoryHandle::new(|_: &Injections| -> Result<Instance, StdError> {
//!     Ok(Arc::new("router".to_string()))
//! });
//! ```
//!
//! Types that know how to build themselves implement [`Injectable`] and are
//! registered through [`RegisterInjectableExt`].

use std::any::{Any, type_name};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::{Error, Owner, Registry, Result, StdError};

/// A type-erased instance produced by a factory.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Injection key under which the owner reference is also stored.
pub const OWNER: &str = "__owner__";

/// Creation operation invoked by the container.
pub trait Factory: Send + Sync + 'static {
    /// Creates a new instance from the given injections.
    fn create(&self, injections: &Injections) -> Result<Instance, StdError>;
}

impl<F> Factory for F
where
    F: Fn(&Injections) -> Result<Instance, StdError> + Send + Sync + 'static,
{
    fn create(&self, injections: &Injections) -> Result<Instance, StdError> {
        self(injections)
    }
}

/// Shareable, identity-comparable reference to a registered factory.
///
/// Besides the creation operation, a handle keeps the factory itself as an
/// [`Instance`]: this is what `lookup` returns for registrations with
/// `instantiate: false`.
#[derive(Clone)]
pub struct FactoryHandle {
    factory: Arc<dyn Factory>,
    value: Instance,
    name: &'static str,
}

impl FactoryHandle {
    pub fn new<F>(factory: F) -> Self
    where
        F: Factory,
    {
        Self::from_arc(Arc::new(factory))
    }

    /// Wraps an already shared factory, preserving its identity.
    pub fn from_arc<F>(factory: Arc<F>) -> Self
    where
        F: Factory,
    {
        Self {
            factory: factory.clone(),
            value: factory,
            name: type_name::<F>(),
        }
    }

    /// Wraps an already built value.
    ///
    /// Creating from such a handle returns the value itself, and looking it
    /// up with `instantiate: false` returns the very same `Arc`.
    pub fn value<T>(value: Arc<T>) -> Self
    where
        T: Send + Sync + 'static,
    {
        Self {
            factory: Arc::new(Constant(value.clone())),
            value,
            name: type_name::<T>(),
        }
    }

    pub fn create(&self, injections: &Injections) -> Result<Instance, StdError> {
        self.factory.create(injections)
    }

    /// The stored factory (or value) as an instance.
    pub fn as_instance(&self) -> Instance {
        self.value.clone()
    }

    /// Returns `true` if both handles refer to the same factory.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }

    pub fn type_name(&self) -> &'static str {
        self.name
    }
}

impl<F> From<F> for FactoryHandle
where
    F: Factory,
{
    fn from(factory: F) -> Self {
        Self::new(factory)
    }
}

impl fmt::Debug for FactoryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryHandle")
            .field("type", &self.name)
            .finish_non_exhaustive()
    }
}

struct Constant<T>(Arc<T>);

impl<T> Factory for Constant<T>
where
    T: Send + Sync + 'static,
{
    fn create(&self, _injections: &Injections) -> Result<Instance, StdError> {
        Ok(self.0.clone())
    }
}

/// Property bag passed to [`Factory::create`].
pub struct Injections {
    values: BTreeMap<String, Instance>,
    owner: Owner,
}

impl Injections {
    pub(crate) fn new(owner: Owner) -> Self {
        let mut values = BTreeMap::new();
        values.insert(OWNER.to_owned(), Arc::new(owner.clone()) as Instance);
        Self { values, owner }
    }

    pub(crate) fn insert(&mut self, property: impl Into<String>, value: Instance) {
        self.values.insert(property.into(), value);
    }

    /// The owner that performed the lookup.
    pub fn owner(&self) -> &Owner {
        &self.owner
    }

    /// Returns the raw injected instance for a property.
    pub fn instance(&self, property: &str) -> Option<&Instance> {
        self.values.get(property)
    }

    /// Returns the injected value for a property, if present and of type `T`.
    pub fn get<T>(&self, property: &str) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        self.instance(property)?.clone().downcast::<T>().ok()
    }

    /// Like [`get`](Self::get), but reports why the value is unavailable.
    pub fn require<T>(&self, property: &str) -> Result<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        self.instance(property)
            .ok_or_else(|| Error::MissingInjection(property.to_owned()))?
            .clone()
            .downcast::<T>()
            .map_err(|_| Error::TypeMismatch {
                name: property.to_owned(),
                expected: type_name::<T>(),
            })
    }

    pub fn contains(&self, property: &str) -> bool {
        self.values.contains_key(property)
    }

    /// Injected property names, excluding the owner key.
    pub fn properties(&self) -> impl Iterator<Item = &str> {
        self.values
            .keys()
            .map(String::as_str)
            .filter(|v| *v != OWNER)
    }
}

impl fmt::Debug for Injections {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injections")
            .field("properties", &self.properties().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Trait for types that construct themselves from an injections bag.
///
/// This is the value-level counterpart of a class with a static `create`: the
/// type is registered through a [`Constructor`], and every lookup that needs a
/// new instance calls [`Injectable::create`].
///
/// # Examples
///
/// ```rust
/// use spindle::{Injectable, Injections, StdError};
/// use std::sync::Arc;
///
/// struct Router;
///
/// struct DatePicker {
///     router: Arc<Router>,
/// }
///
/// impl Injectable for DatePicker {
///     fn create(injections: &Injections) -> Result<Self, StdError> {
///         Ok(Self {
///             router: injections.require("router")?,
///         })
///     }
/// }
/// ```
pub trait Injectable: Sized + Send + Sync + 'static {
    fn create(injections: &Injections) -> Result<Self, StdError>;
}

/// Factory that builds an [`Injectable`] type.
pub struct Constructor<T>(PhantomData<fn() -> T>);

impl<T> Constructor<T>
where
    T: Injectable,
{
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for Constructor<T>
where
    T: Injectable,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Factory for Constructor<T>
where
    T: Injectable,
{
    fn create(&self, injections: &Injections) -> Result<Instance, StdError> {
        Ok(Arc::new(T::create(injections)?))
    }
}

/// Extension trait for `Registry` to register [`Injectable`] types.
pub trait RegisterInjectableExt {
    /// Registers `T` under an absolute specifier with default options.
    fn register_injectable<T>(&mut self, specifier: &str) -> Result<()>
    where
        T: Injectable;
}

impl RegisterInjectableExt for Registry {
    fn register_injectable<T>(&mut self, specifier: &str) -> Result<()>
    where
        T: Injectable,
    {
        self.register(specifier, Constructor::<T>::new())
    }
}
