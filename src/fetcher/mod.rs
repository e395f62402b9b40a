// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The single outbound GET to the rendering service.
//!
//! Redirects are not followed and error statuses are not errors: whatever
//! the service answers is captured in full and handed to the relay.  Only
//! "no answer at all" (DNS, refused connection, timeout) is a failure.


use std::time::Duration;

use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, Proxy, redirect};
use tokio::time::timeout;

use crate::config::PrerenderConfig;
use crate::core::{PrerenderError, UpstreamResponse};
use crate::debug_fmt;

/// Header carrying the rendering-service token.
pub const PRERENDER_TOKEN_HEADER: &str = "x-prerender-token";

/// Performs fetches against the rendering service.
#[derive(Debug, Clone)]
pub struct UpstreamFetcher {
    client: Client,
    token: Option<HeaderValue>,
    timeout: Duration,
}

impl UpstreamFetcher {
    /// Build a fetcher (and its HTTP client) from the filter configuration.
    pub fn new(config: &PrerenderConfig) -> Result<Self, PrerenderError> {
        let timeout_duration = config.timeout();

        let mut builder = Client::builder()
            .redirect(redirect::Policy::none())
            .timeout(timeout_duration)
            // connections live exactly as long as one fetch
            .pool_max_idle_per_host(0);

        if let Some(proxy) = config.active_proxy() {
            let proxy_url = proxy.proxy_url();
            debug_fmt!("Fetcher", "Routing rendering-service calls through {}", proxy_url);
            let proxy = Proxy::all(&proxy_url).map_err(|e| {
                PrerenderError::ConfigError(format!("invalid proxy '{proxy_url}': {e}"))
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build().map_err(|e| {
            PrerenderError::ConfigError(format!("could not build HTTP client: {e}"))
        })?;

        let token = config
            .token()
            .map(|t| {
                HeaderValue::from_str(t).map_err(|e| {
                    PrerenderError::ConfigError(format!("token is not a valid header value: {e}"))
                })
            })
            .transpose()?;

        Ok(Self {
            client,
            token,
            timeout: timeout_duration,
        })
    }

    /// The configured fetch timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// GET `upstream_url`, forwarding the original user agent.
    pub async fn fetch(
        &self,
        upstream_url: &str,
        user_agent: Option<&str>,
    ) -> Result<UpstreamResponse, PrerenderError> {
        let mut headers = HeaderMap::new();
        if let Some(ua) = user_agent.and_then(|ua| HeaderValue::from_str(ua).ok()) {
            headers.insert(USER_AGENT, ua);
        }
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/html"));
        if let Some(token) = &self.token {
            headers.insert(PRERENDER_TOKEN_HEADER, token.clone());
        }

        let request = self.client.get(upstream_url).headers(headers);

        let response = match timeout(self.timeout, request.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(self.classify_error(e)),
            Err(_) => return Err(PrerenderError::Timeout(self.timeout)),
        };

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = match timeout(self.timeout, response.bytes()).await {
            Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
            Ok(Err(e)) => return Err(self.classify_error(e)),
            Err(_) => return Err(PrerenderError::Timeout(self.timeout)),
        };

        debug_fmt!(
            "Fetcher",
            "{} answered {} ({} bytes)",
            upstream_url,
            status,
            body.len()
        );

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }

    fn classify_error(&self, err: reqwest::Error) -> PrerenderError {
        if err.is_timeout() {
            PrerenderError::Timeout(self.timeout)
        } else {
            PrerenderError::FetchFailed(err)
        }
    }
}
