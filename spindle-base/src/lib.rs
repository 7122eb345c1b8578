//! # spindle-base
//!
//! Ambient services for spindle applications: a JSON configuration document
//! with typed sections, registered as lookup-able values, and `tracing`
//! subscriber setup driven by that configuration.
//!
//! ## Configuration Example
//!
//! ```rust
//! use spindle::Application;
//! use spindle_base::{Config, ConfigureExt as _};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct DatabaseConfig {
//!     host: String,
//!     port: u16,
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let config = Config::parse(r#"{"application": {"root_name": "shop"}}"#)?
//!     .with("database", DatabaseConfig {
//!         host: "localhost".to_string(),
//!         port: 5432,
//!     })?;
//! let app = Application::builder().configure(config)?.build();
//! app.init_container()?;
//!
//! let section = app.lookup_as::<serde_json::Value>("config:/shop/database", None)?;
//! let database: DatabaseConfig = serde_json::from_value((*section).clone())?;
//! assert_eq!(database.port, 5432);
//! # Ok(())
//! # }
//! ```

mod config;
mod tracing;

pub use config::*;
pub use tracing::*;
