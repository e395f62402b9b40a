// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Request classification – should this request get a rendered snapshot?
//!
//! Rules are evaluated in a fixed order and the first decisive rule wins:
//!
//! 1. `_escaped_fragment_` in the query string → eligible, unconditionally
//! 2. no user agent → not eligible
//! 3. user agent matches no crawler identifier → not eligible
//! 4. URL contains an ignored extension → not eligible
//! 5. whitelist set and URL matches none of it → not eligible
//! 6. blacklist set and URL or referrer matches any of it → not eligible
//! 7. eligible
//!
//! Identifier and extension matching is a case-insensitive substring test on
//! the absolute URL.  White/blacklist entries are regexes compiled once when
//! the classifier is built.

mod rules;

#[cfg(test)]
mod tests;

pub use rules::{DEFAULT_CRAWLER_USER_AGENTS, DEFAULT_EXTENSIONS_TO_IGNORE};

use regex::Regex;

use crate::config::{ConfigError, PrerenderConfig};
use crate::core::{Classification, ESCAPED_FRAGMENT, IncomingRequest};
use crate::trace_fmt;

/// Decides whether a request is eligible for interception.
#[derive(Debug, Clone)]
pub struct RequestClassifier {
    /// Lower-cased default + configured crawler identifiers
    crawler_user_agents: Vec<String>,
    /// Lower-cased default + configured extensions
    extensions_to_ignore: Vec<String>,
    whitelist: Option<Vec<Regex>>,
    blacklist: Option<Vec<Regex>>,
}

impl RequestClassifier {
    /// Build a classifier from the filter configuration.
    ///
    /// Fails if a whitelist or blacklist entry is not a valid regex.
    pub fn new(config: &PrerenderConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            crawler_user_agents: effective_set(
                DEFAULT_CRAWLER_USER_AGENTS,
                config.crawler_user_agents.as_deref(),
            ),
            extensions_to_ignore: effective_set(
                DEFAULT_EXTENSIONS_TO_IGNORE,
                config.extensions_to_ignore.as_deref(),
            ),
            whitelist: compile_rules("prerender.whitelist", config.whitelist.as_deref())?,
            blacklist: compile_rules("prerender.blacklist", config.blacklist.as_deref())?,
        })
    }

    /// Classify one request.
    pub fn classify(&self, request: &IncomingRequest) -> Classification {
        if request.has_query_key(ESCAPED_FRAGMENT) {
            trace_fmt!("Classifier", "{} carries {}", request.url, ESCAPED_FRAGMENT);
            return Classification::Eligible;
        }

        let user_agent = match request.user_agent.as_deref() {
            Some(ua) if !ua.trim().is_empty() => ua,
            _ => {
                trace_fmt!("Classifier", "{} has no user agent", request.url);
                return Classification::NotEligible;
            }
        };

        if !self.is_crawler(user_agent) {
            trace_fmt!("Classifier", "'{}' is not a known crawler", user_agent);
            return Classification::NotEligible;
        }

        if self.is_static_resource(&request.url) {
            trace_fmt!("Classifier", "{} is a static resource", request.url);
            return Classification::NotEligible;
        }

        if let Some(whitelist) = &self.whitelist {
            if !whitelist.iter().any(|rule| rule.is_match(&request.url)) {
                trace_fmt!("Classifier", "{} is not whitelisted", request.url);
                return Classification::NotEligible;
            }
        }

        if let Some(blacklist) = &self.blacklist {
            if is_blacklisted(blacklist, &request.url, request.referrer.as_deref()) {
                trace_fmt!("Classifier", "{} is blacklisted", request.url);
                return Classification::NotEligible;
            }
        }

        Classification::Eligible
    }

    /// Whether the user agent contains any crawler identifier.
    pub fn is_crawler(&self, user_agent: &str) -> bool {
        let user_agent = user_agent.to_lowercase();
        self.crawler_user_agents
            .iter()
            .any(|crawler| user_agent.contains(crawler.as_str()))
    }

    /// Whether the URL looks like a static asset.
    pub fn is_static_resource(&self, url: &str) -> bool {
        let url = url.to_lowercase();
        self.extensions_to_ignore
            .iter()
            .any(|ext| url.contains(ext.as_str()))
    }
}

fn is_blacklisted(blacklist: &[Regex], url: &str, referrer: Option<&str>) -> bool {
    let referrer = referrer.filter(|r| !r.trim().is_empty());
    blacklist.iter().any(|rule| {
        rule.is_match(url) || referrer.is_some_and(|r| rule.is_match(r))
    })
}

fn effective_set(defaults: &[&str], extra: Option<&[String]>) -> Vec<String> {
    defaults
        .iter()
        .copied()
        .chain(extra.unwrap_or_default().iter().map(String::as_str))
        .map(str::to_lowercase)
        .collect()
}

fn compile_rules(key: &str, patterns: Option<&[String]>) -> Result<Option<Vec<Regex>>, ConfigError> {
    patterns
        .map(|patterns| {
            patterns
                .iter()
                .map(|p| {
                    Regex::new(p).map_err(|e| ConfigError::invalid(key, format!("'{p}': {e}")))
                })
                .collect()
        })
        .transpose()
}
