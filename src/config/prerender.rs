// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Settings of the prerender filter itself.
//!
//! Rule lists accept either a proper list or a single comma-separated
//! string.  The string form cannot express a regex that itself contains a
//! comma (`a{1,3}`); use the list form for those.

use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

use super::{Config, ConfigError};

/// Rendering service used when none (or a blank one) is configured.
pub const DEFAULT_SERVICE_URL: &str = "http://service.prerender.io/";

const DEFAULT_PROXY_PORT: u16 = 80;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Outbound network proxy for the rendering-service call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxySettings {
    /// Proxy host, optionally with a scheme (`corp-proxy`, `http://corp-proxy`)
    #[serde(default)]
    pub url: String,

    /// Proxy port
    #[serde(default = "default_proxy_port")]
    pub port: u16,
}

impl ProxySettings {
    /// A proxy with a blank URL is treated as not configured.
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty()
    }

    /// `scheme://host:port` form understood by the HTTP client.
    pub fn proxy_url(&self) -> String {
        let url = self.url.trim().trim_end_matches('/');
        if url.contains("://") {
            format!("{url}:{}", self.port)
        } else {
            format!("http://{url}:{}", self.port)
        }
    }
}

fn default_proxy_port() -> u16 {
    DEFAULT_PROXY_PORT
}

fn default_service_url() -> String {
    DEFAULT_SERVICE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Immutable, process-wide configuration of the filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrerenderConfig {
    /// Base URL of the rendering service
    #[serde(default = "default_service_url", deserialize_with = "service_url")]
    pub service_url: String,

    /// Sent as `X-Prerender-Token` when set
    #[serde(default)]
    pub token: Option<String>,

    /// Outbound network proxy
    #[serde(default)]
    pub proxy: Option<ProxySettings>,

    /// Regexes; when set, only matching URLs are intercepted
    #[serde(default, deserialize_with = "rule_list")]
    pub whitelist: Option<Vec<String>>,

    /// Regexes; matching URLs or referrers are never intercepted
    #[serde(default, deserialize_with = "rule_list")]
    pub blacklist: Option<Vec<String>>,

    /// Appended to the built-in static-resource suffixes
    #[serde(default, deserialize_with = "rule_list")]
    pub extensions_to_ignore: Option<Vec<String>>,

    /// Appended to the built-in crawler identifiers
    #[serde(default, deserialize_with = "rule_list")]
    pub crawler_user_agents: Option<Vec<String>>,

    /// Remove the application base path before forwarding
    #[serde(default)]
    pub strip_application_name_from_request_url: bool,

    /// Report the `X-Host` header as the public host
    #[serde(default)]
    pub use_x_host_header: bool,

    /// Upper bound on the upstream fetch, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for PrerenderConfig {
    fn default() -> Self {
        Self {
            service_url: default_service_url(),
            token: None,
            proxy: None,
            whitelist: None,
            blacklist: None,
            extensions_to_ignore: None,
            crawler_user_agents: None,
            strip_application_name_from_request_url: false,
            use_x_host_header: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl PrerenderConfig {
    /// Read the `prerender.*` keys key-by-key so every provider in the
    /// chain can override individual settings.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let mut settings = Self::default();

        if let Some(url) = config.get_string("prerender.service_url")? {
            if !url.trim().is_empty() {
                settings.service_url = url;
            }
        }

        settings.token = config
            .get_string("prerender.token")?
            .filter(|t| !t.trim().is_empty());

        if let Some(url) = config.get_string("prerender.proxy.url")? {
            let port = config.get_or_default("prerender.proxy.port", DEFAULT_PROXY_PORT)?;
            settings.proxy = Some(ProxySettings { url, port });
        }

        settings.whitelist = normalize_rules(config.get("prerender.whitelist")?);
        settings.blacklist = normalize_rules(config.get("prerender.blacklist")?);
        settings.extensions_to_ignore =
            normalize_rules(config.get("prerender.extensions_to_ignore")?);
        settings.crawler_user_agents =
            normalize_rules(config.get("prerender.crawler_user_agents")?);

        settings.strip_application_name_from_request_url =
            config.get_or_default("prerender.strip_application_name_from_request_url", false)?;
        settings.use_x_host_header = config.get_or_default("prerender.use_x_host_header", false)?;
        settings.timeout_secs = config.get_or_default("prerender.timeout_secs", DEFAULT_TIMEOUT_SECS)?;

        Ok(settings)
    }

    /// Upstream fetch timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Token, unless blank.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.trim().is_empty())
    }

    /// Proxy settings, unless the URL is blank.
    pub fn active_proxy(&self) -> Option<&ProxySettings> {
        self.proxy.as_ref().filter(|p| p.is_configured())
    }
}

/// On-disk shapes of a rule list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RuleListRepr {
    Csv(String),
    List(Vec<String>),
}

/// Blank entries are dropped; a list with nothing left counts as unset.
fn normalize_rules(repr: Option<RuleListRepr>) -> Option<Vec<String>> {
    let items: Vec<String> = match repr? {
        RuleListRepr::Csv(csv) => csv
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        RuleListRepr::List(list) => list
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    };

    if items.is_empty() { None } else { Some(items) }
}

fn rule_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<String>>, D::Error> {
    Option::<RuleListRepr>::deserialize(deserializer).map(normalize_rules)
}

fn service_url<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let url = Option::<String>::deserialize(deserializer)?;
    Ok(url
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(default_service_url))
}
