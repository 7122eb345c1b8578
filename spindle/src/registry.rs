//! Process-local store of registrations and injection declarations.
//!
//! The registry is populated once, during container initialization, and then
//! moved into the [`Container`](crate::Container) where it is only read.
//!
//! Registering the same absolute specifier twice replaces the earlier
//! factory (last write wins) and logs a warning.

use std::collections::HashMap;
use std::sync::Arc;

use crate::specifier::parse_absolute;
use crate::{Error, FactoryHandle, OWNER, Result, Specifier};

/// Options controlling how a registration is looked up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegistrationOptions {
    /// Cache the first instance and return it from every later lookup.
    pub singleton: bool,
    /// Invoke the factory; when `false` the registered value itself is returned.
    pub instantiate: bool,
}

impl RegistrationOptions {
    /// A new instance on every lookup.
    pub const fn transient() -> Self {
        Self {
            singleton: false,
            instantiate: true,
        }
    }

    /// The registered value is returned as is.
    pub const fn value() -> Self {
        Self {
            singleton: true,
            instantiate: false,
        }
    }
}

impl Default for RegistrationOptions {
    fn default() -> Self {
        Self {
            singleton: true,
            instantiate: true,
        }
    }
}

/// A factory together with the options that apply to it.
#[derive(Clone, Debug)]
pub struct Registration {
    pub factory: FactoryHandle,
    pub options: RegistrationOptions,
}

/// One edge of the dependency graph: `property` receives `lookup(source)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Injection {
    pub property: String,
    pub source: String,
}

#[derive(Default)]
pub struct Registry {
    factories: HashMap<String, FactoryHandle>,
    options: HashMap<String, RegistrationOptions>,
    injections: HashMap<String, Vec<Injection>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory under an absolute specifier.
    ///
    /// Options previously declared for the specifier are kept.
    pub fn register(&mut self, specifier: &str, factory: impl Into<FactoryHandle>) -> Result<()> {
        parse_absolute(specifier)?;
        let factory = factory.into();
        if let Some(prev) = self.factories.insert(specifier.to_owned(), factory) {
            tracing::warn!(
                specifier = specifier,
                previous = prev.type_name(),
                "Replacing existing registration"
            );
        }
        Ok(())
    }

    /// Registers a factory and records its options.
    pub fn register_with(
        &mut self,
        specifier: &str,
        factory: impl Into<FactoryHandle>,
        options: RegistrationOptions,
    ) -> Result<()> {
        self.register(specifier, factory)?;
        self.options.insert(specifier.to_owned(), options);
        Ok(())
    }

    /// Registers an already built value, returned as is by every lookup.
    pub fn register_value<T>(&mut self, specifier: &str, value: Arc<T>) -> Result<()>
    where
        T: Send + Sync + 'static,
    {
        self.register_with(
            specifier,
            FactoryHandle::value(value),
            RegistrationOptions::value(),
        )
    }

    /// Removes the factory registered under `specifier`.
    ///
    /// Options and injections declared for the specifier stay in place.
    pub fn unregister(&mut self, specifier: &str) -> Option<FactoryHandle> {
        self.factories.remove(specifier)
    }

    /// Declares options for an absolute specifier or a whole type (`foo:`).
    pub fn register_options(&mut self, target: &str, options: RegistrationOptions) -> Result<()> {
        parse_target(target)?;
        self.options.insert(target.to_owned(), options);
        Ok(())
    }

    /// Options for an absolute specifier: exact declaration, then type level,
    /// then defaults.
    pub fn registered_options(&self, specifier: &str) -> RegistrationOptions {
        if let Some(options) = self.options.get(specifier) {
            return *options;
        }
        Specifier::parse(specifier)
            .ok()
            .and_then(|v| self.options.get(v.type_specifier()))
            .copied()
            .unwrap_or_default()
    }

    /// Returns the local registration for an absolute specifier.
    ///
    /// A miss is not an error: the container falls through to the resolver.
    pub fn registration(&self, specifier: &str) -> Option<Registration> {
        let factory = self.factories.get(specifier)?.clone();
        Some(Registration {
            factory,
            options: self.registered_options(specifier),
        })
    }

    pub fn factory(&self, specifier: &str) -> Option<FactoryHandle> {
        self.factories.get(specifier).cloned()
    }

    pub fn is_registered(&self, specifier: &str) -> bool {
        self.factories.contains_key(specifier)
    }

    /// Number of registered factories.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Declares that instances of `target` receive `lookup(source)` under
    /// `property`.
    ///
    /// `target` is either an absolute specifier or a whole type (`foo:`).
    /// Declaring the same property twice for one target replaces the source.
    pub fn register_injection(&mut self, target: &str, property: &str, source: &str) -> Result<()> {
        parse_target(target)?;
        Specifier::parse(source)?;
        if property == OWNER {
            return Err(Error::ReservedProperty(property.to_owned()));
        }
        let injection = Injection {
            property: property.to_owned(),
            source: source.to_owned(),
        };
        let injections = self.injections.entry(target.to_owned()).or_default();
        match injections.iter_mut().find(|v| v.property == property) {
            Some(v) => *v = injection,
            None => injections.push(injection),
        }
        Ok(())
    }

    /// Injections declared exactly for `target`, without type-level ones.
    pub fn registered_injections(&self, target: &str) -> &[Injection] {
        self.injections
            .get(target)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Injections applicable to an absolute specifier.
    ///
    /// Exact declarations come first, in declaration order, followed by the
    /// type-level declarations whose property is not already taken.
    pub fn injections_for(&self, specifier: &str) -> Vec<Injection> {
        let mut injections = self.registered_injections(specifier).to_vec();
        if let Ok(parsed) = Specifier::parse(specifier)
            && !parsed.is_type()
        {
            for injection in self.registered_injections(parsed.type_specifier()) {
                if !injections.iter().any(|v| v.property == injection.property) {
                    injections.push(injection.clone());
                }
            }
        }
        injections
    }
}

fn parse_target(target: &str) -> Result<Specifier<'_>> {
    let parsed = Specifier::parse(target)?;
    if !parsed.is_absolute() && !parsed.is_type() {
        return Err(Error::NotAbsolute(target.to_owned()));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Injections, Instance, StdError};

    fn factory() -> FactoryHandle {
        FactoryHandle::new(|_: &Injections| -> Result<Instance, StdError> {
            Ok(Arc::new(()))
        })
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = Registry::new();
        let handle = factory();
        registry
            .register("foo:/app/foos/bar", handle.clone())
            .unwrap();
        let registration = registry.registration("foo:/app/foos/bar").unwrap();
        assert!(registration.factory.ptr_eq(&handle));
        assert_eq!(registration.options, RegistrationOptions::default());
        assert!(registry.registration("foo:/app/foos/baz").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_requires_absolute() {
        let mut registry = Registry::new();
        assert!(matches!(
            registry.register("foo:bar", factory()),
            Err(Error::NotAbsolute(_))
        ));
        assert!(matches!(
            registry.register("bar", factory()),
            Err(Error::InvalidSpecifier(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_register_last_write_wins() {
        let mut registry = Registry::new();
        let first = factory();
        let second = factory();
        registry.register("foo:/app/foos/bar", first.clone()).unwrap();
        registry.register("foo:/app/foos/bar", second.clone()).unwrap();
        let registered = registry.factory("foo:/app/foos/bar").unwrap();
        assert!(registered.ptr_eq(&second));
        assert!(!registered.ptr_eq(&first));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_options_resolution() {
        let mut registry = Registry::new();
        registry
            .register_options("foo:", RegistrationOptions::transient())
            .unwrap();
        registry
            .register_with("foo:/app/foos/bar", factory(), RegistrationOptions::value())
            .unwrap();
        registry.register("foo:/app/foos/baz", factory()).unwrap();
        assert_eq!(
            registry.registered_options("foo:/app/foos/bar"),
            RegistrationOptions::value()
        );
        assert_eq!(
            registry.registered_options("foo:/app/foos/baz"),
            RegistrationOptions::transient()
        );
        assert_eq!(
            registry.registered_options("bar:/app/bars/baz"),
            RegistrationOptions::default()
        );
    }

    #[test]
    fn test_register_keeps_options() {
        let mut registry = Registry::new();
        registry
            .register_options("foo:/app/foos/bar", RegistrationOptions::transient())
            .unwrap();
        registry.register("foo:/app/foos/bar", factory()).unwrap();
        let registration = registry.registration("foo:/app/foos/bar").unwrap();
        assert!(!registration.options.singleton);
    }

    #[test]
    fn test_unregister() {
        let mut registry = Registry::new();
        registry
            .register_with("foo:/app/foos/bar", factory(), RegistrationOptions::transient())
            .unwrap();
        assert!(registry.unregister("foo:/app/foos/bar").is_some());
        assert!(!registry.is_registered("foo:/app/foos/bar"));
        assert!(registry.unregister("foo:/app/foos/bar").is_none());
        assert_eq!(
            registry.registered_options("foo:/app/foos/bar"),
            RegistrationOptions::transient()
        );
    }

    #[test]
    fn test_register_value() {
        let mut registry = Registry::new();
        let value = Arc::new(42u32);
        registry
            .register_value("config:/app/answer", value.clone())
            .unwrap();
        let registration = registry.registration("config:/app/answer").unwrap();
        assert!(!registration.options.instantiate);
        let instance = registration.factory.as_instance().downcast::<u32>().unwrap();
        assert!(Arc::ptr_eq(&instance, &value));
    }

    #[test]
    fn test_injections_for_merges_scopes() {
        let mut registry = Registry::new();
        registry
            .register_injection("foo:", "router", "router:/app/root/main")
            .unwrap();
        registry
            .register_injection("foo:", "store", "service:/app/services/store")
            .unwrap();
        registry
            .register_injection("foo:/app/foos/bar", "router", "router:/app/root/other")
            .unwrap();
        registry
            .register_injection("foo:/app/foos/bar", "session", "service:/app/services/session")
            .unwrap();

        let injections = registry.injections_for("foo:/app/foos/bar");
        let pairs: Vec<_> = injections
            .iter()
            .map(|v| (v.property.as_str(), v.source.as_str()))
            .collect();
        assert_eq!(
            pairs,
            [
                ("router", "router:/app/root/other"),
                ("session", "service:/app/services/session"),
                ("store", "service:/app/services/store"),
            ]
        );

        let injections = registry.injections_for("foo:/app/foos/baz");
        assert_eq!(injections.len(), 2);
        assert_eq!(injections[0].source, "router:/app/root/main");
        assert!(registry.injections_for("bar:/app/bars/baz").is_empty());
    }

    #[test]
    fn test_register_injection_replaces_property() {
        let mut registry = Registry::new();
        registry
            .register_injection("foo:/app/foos/bar", "router", "router:/app/root/main")
            .unwrap();
        registry
            .register_injection("foo:/app/foos/bar", "router", "router:/app/root/other")
            .unwrap();
        assert_eq!(
            registry.registered_injections("foo:/app/foos/bar"),
            [Injection {
                property: "router".into(),
                source: "router:/app/root/other".into(),
            }]
        );
    }

    #[test]
    fn test_register_injection_validation() {
        let mut registry = Registry::new();
        assert!(matches!(
            registry.register_injection("foo:bar", "router", "router:/app/root/main"),
            Err(Error::NotAbsolute(_))
        ));
        assert!(matches!(
            registry.register_injection("foo:/app/foos/bar", "router", "router"),
            Err(Error::InvalidSpecifier(_))
        ));
        assert!(matches!(
            registry.register_injection("foo:/app/foos/bar", OWNER, "router:/app/root/main"),
            Err(Error::ReservedProperty(_))
        ));
        assert!(
            registry
                .register_injection("foo:/app/foos/bar", "router", "router:main")
                .is_ok()
        );
    }
}
