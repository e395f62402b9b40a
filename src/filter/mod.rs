// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The prerender interceptor.
//!
//! [`PrerenderFilter`] wires the pipeline together:
//!
//! ```text
//! classify ──eligible──▶ rewrite ──▶ fetch ──▶ relay   (intercepted)
//!    │                      │          │
//!    └──not eligible        └──error───┴──────────────▶ (not intercepted)
//! ```
//!
//! Every failure on the way is logged and the request falls through to the
//! normal pipeline untouched.  A non-2xx answer from the rendering service is
//! not a failure; it is relayed like any other.

#[cfg(test)]
mod tests;

use std::sync::Arc;

use async_trait::async_trait;

use crate::classifier::RequestClassifier;
use crate::config::PrerenderConfig;
use crate::core::{
    Classification, IncomingRequest, Interceptor, PrerenderError, ResponseHandle, UpstreamResponse,
};
use crate::fetcher::UpstreamFetcher;
use crate::logging::structured::generate_trace_id;
use crate::relay::relay;
use crate::rewriter::UrlRewriter;
use crate::{debug_fmt, info_fmt, warn_fmt};

/// Header a trace id is read from unless configured otherwise.
pub const DEFAULT_TRACE_HEADER: &str = "x-trace-id";

/// Serves rendered snapshots to crawlers.
#[derive(Debug)]
pub struct PrerenderFilter {
    config: Arc<PrerenderConfig>,
    classifier: RequestClassifier,
    rewriter: UrlRewriter,
    fetcher: UpstreamFetcher,
    trace_header: String,
}

impl PrerenderFilter {
    /// Build the filter. Rule lists are compiled here, so a bad regex is
    /// reported now rather than on the first request.
    pub fn new(config: Arc<PrerenderConfig>) -> Result<Self, PrerenderError> {
        let classifier = RequestClassifier::new(&config)?;
        let rewriter = UrlRewriter::new(&config);
        let fetcher = UpstreamFetcher::new(&config)?;

        debug_fmt!(
            "PrerenderFilter",
            "Rendering service: {} (timeout {:?})",
            config.service_url,
            config.timeout()
        );

        Ok(Self {
            config,
            classifier,
            rewriter,
            fetcher,
            trace_header: DEFAULT_TRACE_HEADER.to_string(),
        })
    }

    /// Read trace ids from `header` instead of `X-Trace-ID`.
    pub fn with_trace_header(mut self, header: impl Into<String>) -> Self {
        self.trace_header = header.into();
        self
    }

    /// The configuration the filter was built from.
    pub fn config(&self) -> &PrerenderConfig {
        &self.config
    }

    /// Eligibility of a request.
    pub fn classify(&self, request: &IncomingRequest) -> Classification {
        self.classifier.classify(request)
    }

    /// Fetch the rendered snapshot of a request's page.
    pub async fn render(&self, request: &IncomingRequest) -> Result<UpstreamResponse, PrerenderError> {
        let upstream_url = self.rewriter.build_upstream_url(request)?;
        debug_fmt!("PrerenderFilter", "Fetching {}", upstream_url);
        self.fetcher
            .fetch(&upstream_url, request.user_agent.as_deref())
            .await
    }

    fn trace_id(&self, request: &IncomingRequest) -> String {
        request
            .header(&self.trace_header)
            .filter(|id| !id.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(generate_trace_id)
    }
}

#[async_trait]
impl Interceptor for PrerenderFilter {
    fn name(&self) -> &str {
        "prerender"
    }

    async fn intercept(&self, request: &IncomingRequest, response: &mut dyn ResponseHandle) -> bool {
        let classification = self.classify(request);
        debug_fmt!("PrerenderFilter", "{} classified {}", request.url, classification);

        if !classification.is_eligible() {
            return false;
        }

        let trace_id = self.trace_id(request);

        match self.render(request).await {
            Ok(upstream) => {
                info_fmt!(
                    "PrerenderFilter",
                    "[{}] Serving snapshot of {} ({})",
                    trace_id,
                    request.url,
                    upstream.status
                );
                relay(upstream, response);
                true
            }
            Err(e) => {
                warn_fmt!(
                    "PrerenderFilter",
                    "[{}] Passing {} through: {}",
                    trace_id,
                    request.url,
                    e
                );
                false
            }
        }
    }
}
