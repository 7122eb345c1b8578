//! Instance lookup: resolution, instantiation, caching and injection wiring.

use std::any::type_name;
use std::mem::take;
use std::sync::Arc;

use dashmap::DashMap;

use crate::{
    Error, FactoryHandle, Injections, Instance, Owner, Registry, Resolver, Result, resolver,
};

/// Performs lookups against a registry and a resolver.
///
/// Singleton instances and resolved factories are cached per absolute
/// specifier for the lifetime of the container. No cache guard is held while
/// a factory runs, so factories may look up further instances through their
/// owner.
pub struct Container {
    registry: Registry,
    resolver: Arc<dyn Resolver>,
    owner: Owner,
    factories: DashMap<String, FactoryHandle>,
    instances: DashMap<String, Instance>,
}

impl Container {
    pub fn new(registry: Registry, resolver: Arc<dyn Resolver>, owner: Owner) -> Self {
        Self {
            registry,
            resolver,
            owner,
            factories: DashMap::new(),
            instances: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn owner(&self) -> &Owner {
        &self.owner
    }

    /// Resolves a specifier to its absolute form.
    pub fn identify(&self, specifier: &str, referrer: Option<&str>) -> Result<String> {
        resolver::identify(self.resolver.as_ref(), specifier, referrer)
    }

    /// Returns the factory for a specifier.
    ///
    /// The resolver is asked first; the local registration is only used when
    /// the resolver has no factory for the absolute specifier.
    pub fn factory_for(&self, specifier: &str, referrer: Option<&str>) -> Result<FactoryHandle> {
        let absolute = self.identify(specifier, referrer)?;
        self.absolute_factory(&absolute)
    }

    fn absolute_factory(&self, absolute: &str) -> Result<FactoryHandle> {
        if let Some(factory) = self.factories.get(absolute) {
            return Ok(factory.value().clone());
        }
        let factory = self
            .resolver
            .retrieve(absolute)
            .or_else(|| self.registry.factory(absolute))
            .ok_or_else(|| Error::UnresolvableSpecifier(absolute.to_owned()))?;
        self.factories.insert(absolute.to_owned(), factory.clone());
        Ok(factory)
    }

    /// Looks up an instance, creating it if needed.
    pub fn lookup(&self, specifier: &str, referrer: Option<&str>) -> Result<Instance> {
        let mut chain = Vec::new();
        self.lookup_in_chain(specifier, referrer, &mut chain)
    }

    /// Looks up an instance and downcasts it to `T`.
    pub fn lookup_as<T>(&self, specifier: &str, referrer: Option<&str>) -> Result<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        self.lookup(specifier, referrer)?
            .downcast::<T>()
            .map_err(|_| Error::TypeMismatch {
                name: specifier.to_owned(),
                expected: type_name::<T>(),
            })
    }

    /// Returns the cached singleton for an absolute specifier, if any.
    pub fn cached(&self, specifier: &str) -> Option<Instance> {
        self.instances.get(specifier).map(|v| v.value().clone())
    }

    fn lookup_in_chain(
        &self,
        specifier: &str,
        referrer: Option<&str>,
        chain: &mut Vec<String>,
    ) -> Result<Instance> {
        let absolute = self.identify(specifier, referrer)?;
        if let Some(instance) = self.cached(&absolute) {
            tracing::trace!(specifier = %absolute, "Returning cached instance");
            return Ok(instance);
        }
        let factory = self.absolute_factory(&absolute)?;
        let options = self.registry.registered_options(&absolute);
        if !options.instantiate {
            return Ok(factory.as_instance());
        }
        if chain.contains(&absolute) {
            chain.push(absolute);
            return Err(Error::CircularInjection(take(chain)));
        }
        chain.push(absolute.clone());
        let injections = self.build_injections(&absolute, chain)?;
        chain.pop();
        tracing::debug!(
            specifier = %absolute,
            factory = factory.type_name(),
            "Creating instance"
        );
        let instance = factory
            .create(&injections)
            .map_err(|source| Error::Factory {
                specifier: absolute.clone(),
                source,
            })?;
        if options.singleton {
            self.instances.insert(absolute, instance.clone());
        }
        Ok(instance)
    }

    /// Builds the injections bag for `target`, whose lookup is on top of `chain`.
    fn build_injections(&self, target: &str, chain: &mut Vec<String>) -> Result<Injections> {
        let mut injections = Injections::new(self.owner.clone());
        for injection in self.registry.injections_for(target) {
            let value = self.lookup_in_chain(&injection.source, Some(target), chain)?;
            injections.insert(injection.property, value);
        }
        Ok(injections)
    }
}
