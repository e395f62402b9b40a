// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! High-level entry-point – "turn the key and go".
//!
//! The [`PrerenderLoader`] consumes configuration, sets up logging, builds
//! the [`PrerenderFilter`] and returns a [`Prerender`] whose server is ready
//! to [`start`](Prerender::start).
//!
//! Provider precedence, lowest first: configuration file, custom providers,
//! environment variables.

#[cfg(test)]
mod tests;

use std::sync::Arc;

use log::LevelFilter;
use thiserror::Error;

use crate::config::{
    Config, ConfigError, ConfigProvider, EnvConfigProvider, FileConfigProvider, PrerenderConfig,
};
use crate::core::PrerenderError;
use crate::filter::PrerenderFilter;
use crate::logging::config::LoggingConfig;
use crate::logging::middleware::RequestLogger;
use crate::logging::{self, log_error};
use crate::server::{Handler, PrerenderServer, ServerConfig, ShellHandler};
use crate::{info_fmt, warn_fmt};

/// Errors that can occur during initialization.
#[derive(Error, Debug)]
pub enum LoaderError {
    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    /// Filter or server error
    #[error("prerender error: {0}")]
    PrerenderError(#[from] PrerenderError),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Builder for initializing and configuring the prerender host.
#[derive(Debug, Default)]
pub struct PrerenderLoader {
    config: Option<Config>,
    config_file_path: Option<String>,
    use_env_vars: bool,
    env_prefix: Option<String>,
    providers: Vec<Arc<dyn ConfigProvider>>,
    handler: Option<Arc<dyn Handler>>,
}

impl PrerenderLoader {
    /// Create a new loader with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a ready-made configuration; other configuration sources are ignored.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Set a configuration file to load.
    pub fn with_config_file(mut self, file_path: &str) -> Self {
        self.config_file_path = Some(file_path.to_string());
        self
    }

    /// Enable environment variable configuration.
    pub fn with_env_vars(mut self) -> Self {
        self.use_env_vars = true;
        self
    }

    /// Set a custom prefix for environment variables (default is "PRERENDER_").
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_string());
        self.use_env_vars = true;
        self
    }

    /// Add a custom configuration provider.
    pub fn with_provider<P: ConfigProvider + 'static>(mut self, provider: P) -> Self {
        self.providers.push(Arc::new(provider));
        self
    }

    /// Replace the application shell with a custom normal pipeline.
    pub fn with_handler<H: Handler + 'static>(mut self, handler: H) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    fn build_config(&mut self) -> Result<Config, LoaderError> {
        if let Some(config) = self.config.take() {
            return Ok(config);
        }

        let mut builder = Config::builder();

        if let Some(file_path) = &self.config_file_path {
            builder = builder.with_provider(FileConfigProvider::new(file_path)?);
        }

        for provider in self.providers.drain(..) {
            builder = builder.with_shared_provider(provider);
        }

        if self.use_env_vars {
            let env_provider = match &self.env_prefix {
                Some(prefix) => EnvConfigProvider::new(prefix),
                None => EnvConfigProvider::default(),
            };
            builder = builder.with_provider(env_provider);
        }

        Ok(builder.build())
    }

    /// Build and initialize.
    pub async fn build(mut self) -> Result<Prerender, LoaderError> {
        let config = Arc::new(self.build_config()?);

        let logging_config = match config.get::<LoggingConfig>("logging") {
            Ok(Some(logging_config)) => {
                let level = log_level(&logging_config);
                logging::init_with_config(level, &logging_config);
                logging_config
            }
            Ok(None) => {
                logging::init(Some(logging::level_from_env()));
                LoggingConfig::default()
            }
            Err(e) => {
                logging::init(Some(logging::level_from_env()));
                warn_fmt!("Startup", "Ignoring invalid logging configuration: {}", e);
                LoggingConfig::default()
            }
        };

        info_fmt!("Startup", "Prerender starting up");

        let prerender_config = Arc::new(
            PrerenderConfig::from_config(&config).map_err(|e| log_error("Startup", e))?,
        );
        let filter = Arc::new(
            PrerenderFilter::new(prerender_config)
                .map_err(|e| log_error("Startup", e))?
                .with_trace_header(logging_config.trace_id_header.clone()),
        );

        let server_config = ServerConfig::from_config(&config)?;

        let handler: Arc<dyn Handler> = match self.handler.take() {
            Some(handler) => handler,
            None => match &server_config.shell_file {
                Some(path) => Arc::new(ShellHandler::from_file(path)?),
                None => Arc::new(ShellHandler::default()),
            },
        };

        info_fmt!(
            "Startup",
            "Forwarding crawler requests to {}",
            filter.config().service_url
        );

        let server = PrerenderServer::new(server_config, filter.clone(), handler)
            .with_request_logger(RequestLogger::new(logging_config));

        Ok(Prerender {
            config,
            filter,
            server,
        })
    }
}

/// `RUST_LOG_LEVEL` wins over the configured level.
fn log_level(config: &LoggingConfig) -> LevelFilter {
    if std::env::var("RUST_LOG_LEVEL").is_ok() {
        logging::level_from_env()
    } else {
        config.level_filter()
    }
}

/// An initialized prerender host.
#[derive(Debug, Clone)]
pub struct Prerender {
    config: Arc<Config>,
    filter: Arc<PrerenderFilter>,
    server: PrerenderServer,
}

impl Prerender {
    /// Create a new loader.
    pub fn loader() -> PrerenderLoader {
        PrerenderLoader::new()
    }

    /// Get the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The interceptor, for embedding into another host.
    pub fn filter(&self) -> Arc<PrerenderFilter> {
        self.filter.clone()
    }

    /// The HTTP server.
    pub fn server(&self) -> &PrerenderServer {
        &self.server
    }

    /// Start the server; returns after a graceful shutdown.
    pub async fn start(&self) -> Result<(), LoaderError> {
        self.server.start().await.map_err(LoaderError::PrerenderError)
    }
}
