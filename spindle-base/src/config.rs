use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use spindle::{ApplicationBuilder, Plugin, Registry, StdError};

use crate::{Tracing, TracingConfig};

/// JSON document of named configuration sections.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    pub(crate) configs: BTreeMap<String, serde_json::Value>,
}

/// A typed configuration section stored under a fixed key.
pub trait ConfigSection: DeserializeOwned {
    fn key() -> &'static str;
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deserializes the value stored under `name`; a missing key reads as null.
    pub fn get<T>(&self, name: impl AsRef<str>) -> Result<T, StdError>
    where
        T: DeserializeOwned,
    {
        Ok(serde_json::from_value(
            self.configs
                .get(name.as_ref())
                .cloned()
                .unwrap_or(serde_json::Value::Null),
        )?)
    }

    /// Reads a typed section, `None` when the key is absent.
    pub fn section<T>(&self) -> Result<Option<T>, StdError>
    where
        T: ConfigSection,
    {
        self.get::<Option<T>>(T::key())
    }

    pub fn set<T>(&mut self, name: impl Into<String>, value: T) -> Result<(), StdError>
    where
        T: Serialize,
    {
        self.configs
            .insert(name.into(), serde_json::to_value(value)?);
        Ok(())
    }

    pub fn with<T>(mut self, name: impl Into<String>, value: T) -> Result<Self, StdError>
    where
        T: Serialize,
    {
        self.set(name, value)?;
        Ok(self)
    }

    /// Deep merges `other` into this config.
    ///
    /// Objects are merged key by key, arrays are appended and any other value
    /// is replaced.
    pub fn merge_from(&mut self, other: Self) -> Result<(), StdError> {
        for (key, value) in other.configs {
            let entry = self.configs.entry(key);
            merge_json_from(entry.or_insert(serde_json::Value::Null), value)?;
        }
        Ok(())
    }

    pub fn parse<T>(text: T) -> Result<Self, StdError>
    where
        T: AsRef<str>,
    {
        Ok(serde_json::from_str(text.as_ref())?)
    }

    pub fn parse_file(path: impl AsRef<Path>) -> Result<Self, StdError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(text)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.configs.keys().map(String::as_str)
    }

    /// Check if the config is empty
    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Get the number of config entries
    pub fn len(&self) -> usize {
        self.configs.len()
    }
}

fn merge_json_from(lhs: &mut serde_json::Value, rhs: serde_json::Value) -> Result<(), StdError> {
    match lhs {
        serde_json::Value::Object(l) => match rhs {
            serde_json::Value::Object(r) => {
                for (key, value) in r {
                    let entry = l.entry(key);
                    merge_json_from(entry.or_insert(serde_json::Value::Null), value)?;
                }
            }
            _ => *lhs = rhs,
        },
        serde_json::Value::Array(l) => match rhs {
            serde_json::Value::Array(r) => {
                l.extend(r);
            }
            _ => *lhs = rhs,
        },
        _ => *lhs = rhs,
    }
    Ok(())
}

/// The `application` section.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ApplicationConfig {
    #[serde(default)]
    pub root_name: Option<String>,
}

impl ConfigSection for ApplicationConfig {
    fn key() -> &'static str {
        "application"
    }
}

/// Registers the configuration as lookup-able values.
///
/// The whole document is available at `config:/<root>/main` and every section
/// at `config:/<root>/<key>`, both as [`serde_json::Value`].
pub struct ConfigPlugin {
    root_name: String,
    config: Config,
}

impl ConfigPlugin {
    pub fn new(root_name: impl Into<String>, config: Config) -> Self {
        Self {
            root_name: root_name.into(),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Name of the specifier holding the whole configuration document.
pub const MAIN_CONFIG: &str = "main";

impl Plugin for ConfigPlugin {
    fn build(&self, registry: &mut Registry) -> Result<(), StdError> {
        let root_name = &self.root_name;
        registry.register_value(
            &format!("config:/{root_name}/{MAIN_CONFIG}"),
            Arc::new(serde_json::to_value(&self.config)?),
        )?;
        for (key, value) in &self.config.configs {
            if key == MAIN_CONFIG {
                tracing::warn!(key = %key, "Config section shadowed by the main config");
                continue;
            }
            registry.register_value(&format!("config:/{root_name}/{key}"), Arc::new(value.clone()))?;
        }
        tracing::debug!(
            root_name = %root_name,
            sections = self.config.len(),
            "Config registered"
        );
        Ok(())
    }
}

/// Extension trait for `ApplicationBuilder` to apply a [`Config`].
pub trait ConfigureExt {
    /// Applies the `application` section, then adds the [`ConfigPlugin`] and
    /// the [`Tracing`] plugin.
    fn configure(&mut self, config: Config) -> Result<&mut Self, StdError>;
}

impl ConfigureExt for ApplicationBuilder {
    fn configure(&mut self, config: Config) -> Result<&mut Self, StdError> {
        if let Some(root_name) = config
            .section::<ApplicationConfig>()?
            .and_then(|v| v.root_name)
        {
            self.root_name(root_name);
        }
        let tracing_config = config.section::<TracingConfig>()?.unwrap_or_default();
        let root_name = self.get_root_name().to_owned();
        self.add_plugin(ConfigPlugin::new(root_name, config));
        if !self.has_plugin::<Tracing>() {
            self.add_plugin(Tracing::new(tracing_config));
        }
        Ok(self)
    }
}
