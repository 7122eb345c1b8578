use std::str::FromStr as _;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use spindle::{Plugin, Registry, StdError};
use tracing_subscriber::filter::{Directive, EnvFilter};
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

use crate::ConfigSection;

/// Installs the global `tracing` subscriber when the container is initialized.
///
/// Installation is idempotent: when a global subscriber is already set, the
/// existing one is kept.
pub struct Tracing {
    config: TracingConfig,
}

impl Tracing {
    pub fn new(config: TracingConfig) -> Self {
        Self { config }
    }

    /// Builds the filter from the configured directives and default level.
    pub fn env_filter(&self) -> Result<EnvFilter, StdError> {
        let mut directives = Vec::new();
        for directive in &self.config.directives {
            directives.push(directive.parse::<Directive>().map_err(Box::new)?);
        }
        Ok(new_env_filter(directives, self.config.level))
    }
}

impl Plugin for Tracing {
    fn build(&self, _registry: &mut Registry) -> Result<(), StdError> {
        let env_filter = self.env_filter()?;
        let installed = tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::Layer::default())
            .try_init()
            .is_ok();
        if installed {
            tracing::debug!(level = %self.config.level, "Tracing initialized");
        } else {
            tracing::debug!("Tracing subscriber already installed");
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TracingConfig {
    #[serde(
        serialize_with = "serialize_level",
        deserialize_with = "deserialize_level",
        default = "default_level"
    )]
    pub level: tracing::Level,
    #[serde(default)]
    pub directives: Vec<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            directives: Default::default(),
        }
    }
}

impl ConfigSection for TracingConfig {
    fn key() -> &'static str {
        "tracing"
    }
}

fn new_env_filter(directives: Vec<Directive>, level: tracing::Level) -> EnvFilter {
    let mut filter = EnvFilter::default();
    for directive in directives {
        filter = filter.add_directive(directive);
    }
    filter.add_directive(level.into())
}

fn serialize_level<S>(v: &tracing::Level, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(v.as_str())
}

fn deserialize_level<'de, D>(deserializer: D) -> Result<tracing::Level, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    String::deserialize(deserializer)
        .and_then(|v| tracing::Level::from_str(&v).map_err(|v| Error::custom(format!("{v}"))))
}

fn default_level() -> tracing::Level {
    tracing::Level::DEBUG
}
