// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Common test utilities for the prerender integration tests.

use prerender::config::{ConfigError, ConfigProvider};
use prerender::{LoaderError, PrerenderLoader};
use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Crawler user agent matched by the default rule set.
#[allow(dead_code)]
pub const TWITTERBOT: &str = "Mozilla/5.0 (compatible; Twitterbot/1.0)";

/// Shell page served by test hosts to non-crawlers.
#[allow(dead_code)]
pub const SHELL_HTML: &str = "<html><body>app shell</body></html>";

/// Test configuration provider for consistent test setups
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct TestConfigProvider {
    values: HashMap<String, Value>,
    name: String,
}

#[allow(dead_code)]
impl TestConfigProvider {
    /// Create a provider pointing the filter at `service_url`
    pub fn new(service_url: &str) -> Self {
        Self::from_json(serde_json::json!({
            "server": { "host": "127.0.0.1" },
            "prerender": { "service_url": service_url, "timeout_secs": 5 }
        }))
    }

    /// Create a new test config provider from a JSON configuration
    pub fn from_json(config: Value) -> Self {
        let mut values = HashMap::new();
        Self::flatten_json(&config, "", &mut values);

        Self {
            values,
            name: "json-config".to_string(),
        }
    }

    /// Helper function to flatten JSON into dot-notation keys
    fn flatten_json(value: &Value, prefix: &str, values: &mut HashMap<String, Value>) {
        match value {
            Value::Object(obj) => {
                for (key, val) in obj {
                    let new_key = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{prefix}.{key}")
                    };
                    Self::flatten_json(val, &new_key, values);
                }
            }
            _ => {
                values.insert(prefix.to_string(), value.clone());
            }
        }
    }

    /// Add a configuration value
    pub fn with_value<T: Into<Value>>(mut self, key: &str, value: T) -> Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    /// Get a nested value by a dot-separated key path, assembling sections
    /// from their flattened children.
    fn get_nested_value(&self, key_path: &str) -> Option<Value> {
        if let Some(value) = self.values.get(key_path) {
            return Some(value.clone());
        }

        let prefix = format!("{key_path}.");
        let nested: serde_json::Map<String, Value> = self
            .values
            .iter()
            .filter_map(|(key, value)| {
                let suffix = key.strip_prefix(&prefix)?;
                (!suffix.contains('.')).then(|| (suffix.to_string(), value.clone()))
            })
            .collect();

        if nested.is_empty() {
            None
        } else {
            Some(Value::Object(nested))
        }
    }
}

impl ConfigProvider for TestConfigProvider {
    fn has(&self, key: &str) -> bool {
        self.get_nested_value(key).is_some()
    }

    fn provider_name(&self) -> &str {
        &self.name
    }

    fn get_raw(&self, key: &str) -> Result<Option<Value>, ConfigError> {
        Ok(self.get_nested_value(key))
    }
}

/// A running test host.
#[allow(dead_code)]
pub struct TestHost {
    pub addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

#[allow(dead_code)]
impl TestHost {
    /// Base URL of the host.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Stop accepting and wait for the server task.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = tokio::time::timeout(std::time::Duration::from_secs(5), &mut self.handle).await;
    }
}

/// Build a host from `provider` and serve it on an ephemeral port.
#[allow(dead_code)]
pub async fn start_host(provider: TestConfigProvider) -> Result<TestHost, LoaderError> {
    let prerender = PrerenderLoader::new()
        .with_provider(provider)
        .with_handler(prerender::ShellHandler::new(SHELL_HTML))
        .build()
        .await?;

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let (tx, rx) = oneshot::channel::<()>();

    let server = prerender.server().clone();
    let handle = tokio::spawn(async move {
        let _ = server
            .serve(listener, async move {
                let _ = rx.await;
            })
            .await;
    });

    Ok(TestHost {
        addr,
        shutdown: Some(tx),
        handle,
    })
}

/// An address nothing listens on.
#[allow(dead_code)]
pub fn unused_local_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}/")
}

/// HTTP client for talking to test hosts.
#[allow(dead_code)]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .pool_max_idle_per_host(0)
        .build()
        .unwrap()
}
