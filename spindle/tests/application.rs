use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use spindle::{
    Application, BlankResolver, Error, FactoryHandle, Injections, Instance, Plugin, Registry,
    RegistrationOptions, Resolver, StdError, is_absolute,
};

#[derive(Debug, PartialEq)]
struct Foo {
    foo: &'static str,
}

fn foo_bar_factory() -> FactoryHandle {
    FactoryHandle::new(|_: &Injections| -> Result<Instance, StdError> {
        Ok(Arc::new(Foo { foo: "bar" }))
    })
}

/// Maps one relative specifier to one absolute specifier and serves one factory.
struct FakeResolver {
    relative: &'static str,
    absolute: &'static str,
    factory: Option<FactoryHandle>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeResolver {
    fn new(relative: &'static str, absolute: &'static str) -> Self {
        Self {
            relative,
            absolute,
            factory: None,
            calls: Default::default(),
        }
    }

    fn with_factory(mut self, factory: FactoryHandle) -> Self {
        self.factory = Some(factory);
        self
    }
}

impl Resolver for FakeResolver {
    fn identify(&self, specifier: &str, referrer: Option<&str>) -> Option<String> {
        if is_absolute(specifier) {
            return Some(specifier.to_owned());
        }
        self.calls.lock().unwrap().push(format!(
            "identify {specifier} {}",
            referrer.unwrap_or_default()
        ));
        (specifier == self.relative).then(|| self.absolute.to_owned())
    }

    fn retrieve(&self, specifier: &str) -> Option<FactoryHandle> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("retrieve {specifier}"));
        if specifier == self.absolute {
            self.factory.clone()
        } else {
            None
        }
    }
}

#[test]
fn test_identify_uses_resolver() {
    let resolver = FakeResolver::new("component:date-picker", "component:/app/components/date-picker");
    let calls = resolver.calls.clone();
    let app = Application::builder()
        .root_name("app")
        .resolver(resolver)
        .build();
    assert_eq!(
        app.identify(
            "component:date-picker",
            Some("component:/app/components/form-controls")
        )
        .unwrap(),
        "component:/app/components/date-picker"
    );
    assert_eq!(
        *calls.lock().unwrap(),
        ["identify component:date-picker component:/app/components/form-controls"]
    );
}

#[test]
fn test_identify_passes_absolute_through() {
    let app = Application::builder().resolver(BlankResolver).build();
    assert_eq!(
        app.identify("component:/app/components/date-picker", None)
            .unwrap(),
        "component:/app/components/date-picker"
    );
}

#[test]
fn test_identify_errors() {
    let app = Application::builder().build();
    assert!(matches!(
        app.identify("component:date-picker", None),
        Err(Error::UnresolvableSpecifier(v)) if v == "component:date-picker"
    ));
    assert!(matches!(
        app.identify("date-picker", None),
        Err(Error::InvalidSpecifier(_))
    ));
}

#[test]
fn test_factory_for_returns_registered_factory() {
    let factory = foo_bar_factory();
    let registered = factory.clone();
    let app = Application::builder()
        .resolver(BlankResolver)
        .add_plugin(move |registry: &mut Registry| -> Result<(), StdError> {
            registry.register("component:/app/components/date-picker", registered.clone())?;
            Ok(())
        })
        .build();
    app.init_container().unwrap();
    let found = app
        .factory_for("component:/app/components/date-picker", None)
        .unwrap();
    assert!(found.ptr_eq(&factory));
}

#[test]
fn test_factory_for_uses_resolver() {
    let factory = foo_bar_factory();
    let resolver = FakeResolver::new("component:date-picker", "component:/app/components/date-picker")
        .with_factory(factory.clone());
    let calls = resolver.calls.clone();
    let app = Application::builder().resolver(resolver).build();
    app.init_container().unwrap();
    let found = app.factory_for("component:date-picker", None).unwrap();
    assert!(found.ptr_eq(&factory));
    assert_eq!(
        *calls.lock().unwrap(),
        [
            "identify component:date-picker ",
            "retrieve component:/app/components/date-picker",
        ]
    );
}

#[test]
fn test_factory_for_prefers_resolver_over_registration() {
    let local = foo_bar_factory();
    let remote = foo_bar_factory();
    let resolver = FakeResolver::new("foo:bar", "foo:/app/foos/bar").with_factory(remote.clone());
    let registered = local.clone();
    let app = Application::builder()
        .resolver(resolver)
        .add_plugin(move |registry: &mut Registry| -> Result<(), StdError> {
            registry.register("foo:/app/foos/bar", registered.clone())?;
            Ok(())
        })
        .build();
    app.init_container().unwrap();

    let relative = app.factory_for("foo:bar", None).unwrap();
    let absolute = app.factory_for("foo:/app/foos/bar", None).unwrap();
    assert!(relative.ptr_eq(&remote));
    assert!(absolute.ptr_eq(&relative));
    assert!(!relative.ptr_eq(&local));
}

#[test]
fn test_factory_for_falls_back_to_registration() {
    let local = foo_bar_factory();
    let resolver = FakeResolver::new("foo:bar", "foo:/app/foos/bar");
    let registered = local.clone();
    let app = Application::builder()
        .resolver(resolver)
        .add_plugin(move |registry: &mut Registry| -> Result<(), StdError> {
            registry.register("foo:/app/foos/bar", registered.clone())?;
            Ok(())
        })
        .build();
    app.init_container().unwrap();
    assert!(app.factory_for("foo:bar", None).unwrap().ptr_eq(&local));
}

#[test]
fn test_factory_for_caches_resolved_factories() {
    let resolver = FakeResolver::new("foo:bar", "foo:/app/foos/bar").with_factory(foo_bar_factory());
    let calls = resolver.calls.clone();
    let app = Application::builder().resolver(resolver).build();
    app.init_container().unwrap();
    app.factory_for("foo:/app/foos/bar", None).unwrap();
    app.factory_for("foo:/app/foos/bar", None).unwrap();
    assert_eq!(*calls.lock().unwrap(), ["retrieve foo:/app/foos/bar"]);
}

#[test]
fn test_factory_for_unresolvable() {
    let app = Application::builder().build();
    app.init_container().unwrap();
    assert!(matches!(
        app.factory_for("foo:/app/foos/bar", None),
        Err(Error::UnresolvableSpecifier(v)) if v == "foo:/app/foos/bar"
    ));
}

#[test]
fn test_lookup_returns_instance_with_owner() {
    let created = Arc::new(AtomicUsize::new(0));
    let counter = created.clone();
    let app = Application::builder()
        .add_plugin(move |registry: &mut Registry| -> Result<(), StdError> {
            let counter = counter.clone();
            registry.register(
                "component:/app/components/date-picker",
                move |injections: &Injections| -> Result<Instance, StdError> {
                    counter.fetch_add(1, Ordering::SeqCst);
                    let app = injections.owner().application()?;
                    assert!(injections.owner().is(&app));
                    Ok(Arc::new(Foo { foo: "bar" }))
                },
            )?;
            Ok(())
        })
        .build();
    app.init_container().unwrap();

    let first = app
        .lookup_as::<Foo>("component:/app/components/date-picker", None)
        .unwrap();
    assert_eq!(*first, Foo { foo: "bar" });
    let second = app
        .lookup_as::<Foo>("component:/app/components/date-picker", None)
        .unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(created.load(Ordering::SeqCst), 1);
}

#[test]
fn test_lookup_owner_is_application() {
    let owners = Arc::new(Mutex::new(Vec::new()));
    let collected = owners.clone();
    let app = Application::builder()
        .add_plugin(move |registry: &mut Registry| -> Result<(), StdError> {
            let collected = collected.clone();
            registry.register(
                "foo:/app/foos/bar",
                move |injections: &Injections| -> Result<Instance, StdError> {
                    collected.lock().unwrap().push(injections.owner().clone());
                    let owner = injections.get::<spindle::Owner>(spindle::OWNER).unwrap();
                    assert_eq!(*owner, *injections.owner());
                    Ok(Arc::new(()))
                },
            )?;
            Ok(())
        })
        .build();
    app.init_container().unwrap();
    app.lookup("foo:/app/foos/bar", None).unwrap();

    let owners = owners.lock().unwrap();
    assert_eq!(owners.len(), 1);
    assert!(owners[0].is(&app));
    assert_eq!(owners[0], app.owner());
}

#[test]
fn test_lookup_non_singleton() {
    let created = Arc::new(AtomicUsize::new(0));
    let counter = created.clone();
    let app = Application::builder()
        .add_plugin(move |registry: &mut Registry| -> Result<(), StdError> {
            let counter = counter.clone();
            registry.register_with(
                "foo:/app/foos/bar",
                move |_: &Injections| -> Result<Instance, StdError> {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(Arc::new(Foo { foo: "bar" }))
                },
                RegistrationOptions {
                    singleton: false,
                    ..Default::default()
                },
            )?;
            Ok(())
        })
        .build();
    app.init_container().unwrap();

    let first = app.lookup("foo:/app/foos/bar", None).unwrap();
    assert_eq!(created.load(Ordering::SeqCst), 1);
    let second = app.lookup("foo:/app/foos/bar", None).unwrap();
    assert_eq!(created.load(Ordering::SeqCst), 2);
    assert!(!Arc::ptr_eq(&first, &second));
    assert!(
        app.container()
            .unwrap()
            .cached("foo:/app/foos/bar")
            .is_none()
    );
}

#[test]
fn test_lookup_instantiate_false_returns_factory() {
    let created = Arc::new(AtomicUsize::new(0));
    let counter = created.clone();
    let factory = Arc::new(move |_: &Injections| -> Result<Instance, StdError> {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(()))
    });
    let handle = FactoryHandle::from_arc(factory.clone());
    let app = Application::builder()
        .add_plugin(move |registry: &mut Registry| -> Result<(), StdError> {
            registry.register_with(
                "foo:/app/foos/bar",
                handle.clone(),
                RegistrationOptions {
                    instantiate: false,
                    ..Default::default()
                },
            )?;
            Ok(())
        })
        .build();
    app.init_container().unwrap();

    let instance = app.lookup("foo:/app/foos/bar", None).unwrap();
    let expected: Instance = factory;
    assert!(Arc::ptr_eq(&instance, &expected));
    assert_eq!(created.load(Ordering::SeqCst), 0);
}

#[test]
fn test_lookup_registered_value() {
    let router = Arc::new(String::from("router"));
    let value = router.clone();
    let app = Application::builder()
        .add_plugin(move |registry: &mut Registry| -> Result<(), StdError> {
            registry.register_value("router:/app/root/main", value.clone())?;
            Ok(())
        })
        .build();
    app.init_container().unwrap();
    let found = app.lookup_as::<String>("router:/app/root/main", None).unwrap();
    assert!(Arc::ptr_eq(&found, &router));
}

#[test]
fn test_lookup_uses_resolver() {
    let resolver = FakeResolver::new("foo:bar", "foo:/app/foos/bar").with_factory(foo_bar_factory());
    let calls = resolver.calls.clone();
    let app = Application::builder().resolver(resolver).build();
    app.init_container().unwrap();
    let foo = app.lookup_as::<Foo>("foo:bar", None).unwrap();
    assert_eq!(*foo, Foo { foo: "bar" });
    assert_eq!(
        *calls.lock().unwrap(),
        ["identify foo:bar ", "retrieve foo:/app/foos/bar"]
    );
    // Relative and absolute lookups share the cached instance.
    let absolute = app.lookup_as::<Foo>("foo:/app/foos/bar", None).unwrap();
    assert!(Arc::ptr_eq(&foo, &absolute));
}

#[test]
fn test_lookup_type_mismatch() {
    let app = Application::builder()
        .add_plugin(|registry: &mut Registry| -> Result<(), StdError> {
            registry.register("foo:/app/foos/bar", foo_bar_factory())?;
            Ok(())
        })
        .build();
    app.init_container().unwrap();
    assert!(matches!(
        app.lookup_as::<String>("foo:/app/foos/bar", None),
        Err(Error::TypeMismatch { .. })
    ));
}

#[test]
fn test_lookup_factory_error() {
    let app = Application::builder()
        .add_plugin(|registry: &mut Registry| -> Result<(), StdError> {
            registry.register(
                "foo:/app/foos/bar",
                |_: &Injections| -> Result<Instance, StdError> { Err("broken".into()) },
            )?;
            Ok(())
        })
        .build();
    app.init_container().unwrap();
    match app.lookup("foo:/app/foos/bar", None) {
        Err(Error::Factory { specifier, source }) => {
            assert_eq!(specifier, "foo:/app/foos/bar");
            assert_eq!(source.to_string(), "broken");
        }
        _ => panic!("expected factory error"),
    }
}

#[test]
fn test_lookup_before_init() {
    let app = Application::builder().build();
    assert!(matches!(
        app.lookup("foo:/app/foos/bar", None),
        Err(Error::UninitializedContainer)
    ));
    assert!(matches!(
        app.factory_for("foo:/app/foos/bar", None),
        Err(Error::UninitializedContainer)
    ));
}

#[test]
fn test_init_container_twice() {
    let app = Application::builder().build();
    app.init_container().unwrap();
    assert!(matches!(
        app.init_container(),
        Err(Error::AlreadyInitialized)
    ));
}

#[test]
fn test_owner_outlived_by_instances() {
    let app = Application::builder()
        .add_plugin(|registry: &mut Registry| -> Result<(), StdError> {
            registry.register(
                "foo:/app/foos/bar",
                |injections: &Injections| -> Result<Instance, StdError> {
                    Ok(Arc::new(injections.owner().clone()))
                },
            )?;
            Ok(())
        })
        .build();
    app.init_container().unwrap();
    let owner = app
        .lookup_as::<spindle::Owner>("foo:/app/foos/bar", None)
        .unwrap();
    assert!(owner.lookup("foo:/app/foos/bar", None).is_ok());
    drop(app);
    assert!(matches!(
        owner.lookup("foo:/app/foos/bar", None),
        Err(Error::OwnerDropped)
    ));
}

struct RouterPlugin;

impl Plugin for RouterPlugin {
    fn build(&self, registry: &mut Registry) -> Result<(), StdError> {
        registry.register_value("router:/app/root/main", Arc::new("router"))?;
        Ok(())
    }
}

struct ComponentsPlugin;

impl Plugin for ComponentsPlugin {
    fn build(&self, registry: &mut Registry) -> Result<(), StdError> {
        if !registry.is_registered("router:/app/root/main") {
            return Err("Router must be registered first".into());
        }
        registry.register("component:/app/components/date-picker", foo_bar_factory())?;
        Ok(())
    }

    fn dependencies(&self) -> spindle::Dependencies {
        spindle::Dependencies::new().plugin::<RouterPlugin>()
    }
}

#[test]
fn test_plugins_run_in_dependency_order() {
    let app = Application::builder()
        .add_plugin(ComponentsPlugin)
        .add_plugin(RouterPlugin)
        .build();
    app.init_container().unwrap();
    assert!(
        app.lookup("component:/app/components/date-picker", None)
            .is_ok()
    );
}

#[test]
fn test_plugins_missing() {
    let app = Application::builder().add_plugin(ComponentsPlugin).build();
    assert!(matches!(
        app.init_container(),
        Err(Error::MissingDependency)
    ));
    assert!(!app.is_initialized());
}

#[test]
#[should_panic]
fn test_plugins_duplicates() {
    Application::builder()
        .add_plugin(RouterPlugin)
        .add_plugin(RouterPlugin)
        .build();
}

struct CyclePluginA;

impl Plugin for CyclePluginA {
    fn build(&self, _registry: &mut Registry) -> Result<(), StdError> {
        Ok(())
    }

    fn dependencies(&self) -> spindle::Dependencies {
        spindle::Dependencies::new().plugin::<CyclePluginB>()
    }
}

struct CyclePluginB;

impl Plugin for CyclePluginB {
    fn build(&self, _registry: &mut Registry) -> Result<(), StdError> {
        Ok(())
    }

    fn dependencies(&self) -> spindle::Dependencies {
        spindle::Dependencies::new().plugin::<CyclePluginA>()
    }
}

#[test]
fn test_plugins_circular() {
    let app = Application::builder()
        .add_plugin(CyclePluginA)
        .add_plugin(CyclePluginB)
        .build();
    assert!(matches!(
        app.init_container(),
        Err(Error::CircularDependency)
    ));
}

struct BadPlugin;

impl Plugin for BadPlugin {
    fn build(&self, _registry: &mut Registry) -> Result<(), StdError> {
        Err("Bad plugin".into())
    }
}

#[test]
fn test_plugins_bad() {
    let app = Application::builder().add_plugin(BadPlugin).build();
    assert!(matches!(
        app.init_container(),
        Err(Error::Plugin { .. })
    ));
    assert!(matches!(
        app.lookup("foo:/app/foos/bar", None),
        Err(Error::UninitializedContainer)
    ));
}
