//! # spindle
//!
//! A minimal object-construction runtime. Given a *specifier*, a typed string
//! naming a kind of object and optionally the path of one implementation, it
//! resolves a factory, instantiates it (caching singletons) and wires declared
//! injections into the new instance.
//!
//! ## Core Concepts
//!
//! - **Specifier**: `type:name` (relative) or `type:/root/path` (absolute)
//! - **Resolver**: application strategy mapping relative specifiers to absolute
//!   ones and loading factories
//! - **Registry**: registrations, options and injection declarations
//! - **Container**: lookup, instantiation, caching and injection wiring
//! - **Application / Owner**: the facade instances hold to look up collaborators
//! - **Plugin**: registry setup run once when the container is initialized
//!
//! ## Basic Usage
//!
//! ```rust
//! use spindle::{Application, Injections, Instance, Registry, RegistrationOptions, StdError};
//! use std::sync::Arc;
//!
//! struct Router;
//!
//! struct DatePicker {
//!     router: Arc<Router>,
//! }
//!
//! fn setup(registry: &mut Registry) -> Result<(), StdError> {
//!     registry.register(
//!         "router:/app/root/main",
//!         |_: &Injections| -> Result<Instance, StdError> { Ok(Arc::new(Router)) },
//!     )?;
//!     registry.register(
//!         "component:/app/components/date-picker",
//!         |injections: &Injections| -> Result<Instance, StdError> {
//!             Ok(Arc::new(DatePicker {
//!                 router: injections.require("router")?,
//!             }))
//!         },
//!     )?;
//!     registry.register_injection("component:", "router", "router:/app/root/main")?;
//!     Ok(())
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let app = Application::builder().add_plugin(setup).build();
//! app.init_container()?;
//!
//! let picker = app.lookup_as::<DatePicker>("component:/app/components/date-picker", None)?;
//! let router = app.lookup_as::<Router>("router:/app/root/main", None)?;
//! assert!(Arc::ptr_eq(&picker.router, &router));
//! # Ok(())
//! # }
//! ```
//!
//! ## Using Macros
//!
//! With the `macros` feature enabled, injectable types can be derived:
//!
//! ```rust
//! use spindle::{Application, Injectable, Owner, Registry, RegisterInjectableExt, StdError};
//! use std::sync::Arc;
//!
//! #[derive(Injectable)]
//! struct Router;
//!
//! #[derive(Injectable)]
//! struct DatePicker {
//!     router: Arc<Router>,
//!     owner: Owner,
//! }
//!
//! fn setup(registry: &mut Registry) -> Result<(), StdError> {
//!     registry.register_injectable::<Router>("router:/app/root/main")?;
//!     registry.register_injectable::<DatePicker>("component:/app/components/date-picker")?;
//!     registry.register_injection("component:", "router", "router:/app/root/main")?;
//!     Ok(())
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let app = Application::builder().add_plugin(setup).build();
//! app.init_container()?;
//!
//! let picker = app.lookup_as::<DatePicker>("component:/app/components/date-picker", None)?;
//! assert!(picker.owner.is(&app));
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - `macros` (default): Enables procedural macros for injectable types

mod app;
mod container;
mod error;
mod factory;
mod registry;
mod resolver;
pub mod specifier;

pub use app::*;
pub use container::*;
pub use error::*;
pub use factory::*;
pub use registry::*;
pub use resolver::{BlankResolver, Resolver};
pub use specifier::{Specifier, is_absolute, specifier_type};

#[cfg(feature = "macros")]
pub use spindle_macros::*;
