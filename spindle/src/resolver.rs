use crate::{Error, FactoryHandle, Result, Specifier};

/// Application-supplied strategy that maps specifiers to factories.
///
/// # Examples
///
/// ```rust
/// use spindle::{FactoryHandle, Resolver, is_absolute};
///
/// struct ComponentResolver;
///
/// impl Resolver for ComponentResolver {
///     fn identify(&self, specifier: &str, _referrer: Option<&str>) -> Option<String> {
///         let name = specifier.strip_prefix("component:")?;
///         Some(format!("component:/app/components/{name}"))
///     }
///
///     fn retrieve(&self, _specifier: &str) -> Option<FactoryHandle> {
///         None
///     }
/// }
///
/// let resolver = ComponentResolver;
/// assert_eq!(
///     resolver.identify("component:date-picker", None).as_deref(),
///     Some("component:/app/components/date-picker"),
/// );
/// ```
pub trait Resolver: Send + Sync {
    /// Converts a relative specifier into an absolute one.
    ///
    /// Must return already absolute input unchanged.
    fn identify(&self, specifier: &str, referrer: Option<&str>) -> Option<String>;

    /// Loads the factory for an absolute specifier.
    fn retrieve(&self, specifier: &str) -> Option<FactoryHandle>;
}

/// Resolver that knows nothing; only local registrations are found.
#[derive(Clone, Copy, Debug, Default)]
pub struct BlankResolver;

impl Resolver for BlankResolver {
    fn identify(&self, _specifier: &str, _referrer: Option<&str>) -> Option<String> {
        None
    }

    fn retrieve(&self, _specifier: &str) -> Option<FactoryHandle> {
        None
    }
}

/// Resolves a specifier to its absolute form.
///
/// Absolute input is returned unchanged without consulting the resolver.
pub(crate) fn identify(
    resolver: &dyn Resolver,
    specifier: &str,
    referrer: Option<&str>,
) -> Result<String> {
    if Specifier::parse(specifier)?.is_absolute() {
        return Ok(specifier.to_owned());
    }
    match resolver.identify(specifier, referrer) {
        Some(v) if Specifier::parse(&v).is_ok_and(|v| v.is_absolute()) => Ok(v),
        _ => Err(Error::UnresolvableSpecifier(specifier.to_owned())),
    }
}
