use thiserror::Error;

/// Type alias for boxed errors that can be sent across threads.
///
/// Factories and plugins report their own failures with this type; the
/// container wraps them into [`Error::Factory`] or [`Error::Plugin`].
pub type StdError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while registering, resolving or instantiating specifiers.
#[derive(Debug, Error)]
pub enum Error {
    /// The specifier string has no `:` type separator.
    #[error("invalid specifier {0:?}: missing type separator")]
    InvalidSpecifier(String),
    /// A relative specifier was given where an absolute one is required.
    #[error("specifier {0:?} is not absolute")]
    NotAbsolute(String),
    /// Neither the resolver nor the registry produced a factory.
    #[error("cannot resolve specifier {0:?}")]
    UnresolvableSpecifier(String),
    /// A lookup was attempted before `init_container`.
    #[error("container is not initialized")]
    UninitializedContainer,
    /// `init_container` was called on an initialized application.
    #[error("container is already initialized")]
    AlreadyInitialized,
    /// An injection chain re-entered a specifier that is still being built.
    #[error("circular injection: {}", .0.join(" -> "))]
    CircularInjection(Vec<String>),
    /// A circular dependency was detected between plugins.
    #[error("circular dependency between plugins")]
    CircularDependency,
    /// A plugin depends on a plugin that was never added.
    #[error("missing plugin dependency")]
    MissingDependency,
    /// A plugin failed while populating the registry.
    #[error("plugin {name} failed: {source}")]
    Plugin {
        name: &'static str,
        #[source]
        source: StdError,
    },
    /// A factory failed to create an instance.
    #[error("factory for {specifier:?} failed: {source}")]
    Factory {
        specifier: String,
        #[source]
        source: StdError,
    },
    /// A required property is absent from an injections bag.
    #[error("missing injection {0:?}")]
    MissingInjection(String),
    /// A value could not be downcast to the requested type.
    #[error("{name:?} is not a {expected}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
    },
    /// The property name is reserved for the owner reference.
    #[error("property {0:?} is reserved")]
    ReservedProperty(String),
    /// The application behind an owner reference has been dropped.
    #[error("owner has been dropped")]
    OwnerDropped,
}
