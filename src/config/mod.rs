// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Configuration subsystem
//!
//! The subsystem is **pluggable**.  A running filter is created from an
//! ordered list of [`ConfigProvider`]s; later providers override earlier
//! ones.  Typical stacking order looks like this:
//!
//! 1. `FileConfigProvider` – `prerender.{toml,json,yaml}`
//! 2. `EnvConfigProvider`  – `PRERENDER_PRERENDER__TOKEN=…`
//! 3. *your* provider implementing [`ConfigProvider`]
//!
//! Calling [`Config::get`] is therefore *deterministic*: the last provider
//! in the chain that has a key wins.
//!
//! The following table describes every *first-class* configuration key.
//!
//! | key | type | default | description |
//! |-----|------|---------|-------------|
//! | `prerender.service_url` | string | `http://service.prerender.io/` | Rendering service base URL |
//! | `prerender.token` | string | – | Sent as `X-Prerender-Token` |
//! | `prerender.whitelist` | list / csv | – | Only matching URLs are intercepted |
//! | `prerender.blacklist` | list / csv | – | Matching URLs or referrers are skipped |
//! | `prerender.extensions_to_ignore` | list / csv | – | Added to the static-resource suffixes |
//! | `prerender.crawler_user_agents` | list / csv | – | Added to the crawler identifiers |
//! | `prerender.proxy.url` | string | – | Outbound proxy host |
//! | `prerender.proxy.port` | int | `80` | Outbound proxy port |
//! | `prerender.strip_application_name_from_request_url` | bool | `false` | Drop the app base path |
//! | `prerender.use_x_host_header` | bool | `false` | Report `X-Host` as the public host |
//! | `prerender.timeout_secs` | int | `30` | Upstream fetch timeout |
//! | `server.host` / `server.port` | string / int | `127.0.0.1` / `8080` | Listening socket |
//! | `server.health_port` | int | `8081` | Health/readiness socket |
//! | `server.application_path` | string | `/` | Base path the app is mounted under |
//! | `server.shell_file` | string | – | HTML shell served to non-crawlers |
//! | `logging` | object | – | See [`crate::logging::config::LoggingConfig`] |

mod env;
pub mod error;
mod file;
mod prerender;


pub use env::EnvConfigProvider;
pub use error::ConfigError;
pub use file::FileConfigProvider;
pub use prerender::{PrerenderConfig, ProxySettings, DEFAULT_SERVICE_URL};

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;

/// Core configuration provider trait that all configuration sources must implement.
/// This trait is object-safe since it doesn't contain generic methods.
pub trait ConfigProvider: Debug + Send + Sync {
    /// Check if the configuration provider has a value for the given key.
    fn has(&self, key: &str) -> bool;

    /// Get the name of the configuration provider for debugging purposes.
    fn provider_name(&self) -> &str;

    /// Get a raw configuration value by key.
    /// Returns a JSON Value that can be later deserialized into specific types.
    fn get_raw(&self, key: &str) -> Result<Option<Value>, ConfigError>;
}

/// Extension trait for ConfigProvider that provides methods for typed access.
/// This trait is not object-safe because it has generic methods.
pub trait ConfigProviderExt: ConfigProvider {
    /// Get a configuration value by key and deserialize it to the specified type.
    fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.get_raw(key)? {
            Some(value) => serde_json::from_value(value).map(Some).map_err(|e| {
                ConfigError::ParseError(format!("failed to deserialize '{key}': {e}"))
            }),
            None => Ok(None),
        }
    }
}

impl<T: ConfigProvider> ConfigProviderExt for T {}

/// Builder for the configuration system.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    providers: Vec<Arc<dyn ConfigProvider>>,
}

impl ConfigBuilder {
    /// Create a new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a configuration provider.
    pub fn with_provider<P: ConfigProvider + 'static>(mut self, provider: P) -> Self {
        self.providers.push(Arc::new(provider));
        self
    }

    /// Add an already shared configuration provider.
    pub fn with_shared_provider(mut self, provider: Arc<dyn ConfigProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Config {
        Config {
            providers: self.providers,
        }
    }
}

/// Main configuration struct that holds all providers and handles retrieving values.
#[derive(Debug, Clone)]
pub struct Config {
    providers: Vec<Arc<dyn ConfigProvider>>,
}

impl Config {
    /// Create a new configuration builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Get a raw configuration value.
    fn get_raw(&self, key: &str) -> Result<Option<Value>, ConfigError> {
        // Later providers (higher index) override earlier ones
        for provider in self.providers.iter().rev() {
            if provider.has(key) {
                return provider.get_raw(key);
            }
        }
        Ok(None)
    }

    /// Get a configuration value by key from the highest-priority provider that has it.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.get_raw(key)? {
            Some(value) => serde_json::from_value(value).map(Some).map_err(|e| {
                ConfigError::ParseError(format!("failed to deserialize '{key}': {e}"))
            }),
            None => Ok(None),
        }
    }

    /// Get a configuration value by key with a default fallback value.
    pub fn get_or_default<T: DeserializeOwned>(
        &self,
        key: &str,
        default: T,
    ) -> Result<T, ConfigError> {
        match self.get(key)? {
            Some(value) => Ok(value),
            None => Ok(default),
        }
    }

    /// Get a scalar as a string, accepting numbers and booleans too.
    ///
    /// Environment values are sniffed for type, so a numeric token like
    /// `12345` arrives as a JSON number.
    pub fn get_string(&self, key: &str) -> Result<Option<String>, ConfigError> {
        match self.get_raw(key)? {
            Some(Value::String(s)) => Ok(Some(s)),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(Value::Bool(b)) => Ok(Some(b.to_string())),
            Some(Value::Null) | None => Ok(None),
            Some(other) => Err(ConfigError::ParseError(format!(
                "expected a string for '{key}', found {other}"
            ))),
        }
    }

    /// Create a default configuration using the file-based provider.
    pub fn default_file(file_path: &str) -> Result<Self, ConfigError> {
        let provider = FileConfigProvider::new(file_path)?;
        Ok(Self::builder().with_provider(provider).build())
    }
}
