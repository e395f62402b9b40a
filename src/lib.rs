// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Prerender - serve rendered HTML snapshots to crawlers
//!
//! A request interceptor for single-page applications.  Crawlers and
//! link-preview bots that cannot run JavaScript get a fully rendered page
//! from an external rendering service; everybody else gets the normal
//! response.
//!
//! # Pipeline
//!
//! Every request passes through four stages:
//!
//! - **Classification** ([`RequestClassifier`]): `_escaped_fragment_`,
//!   user agent, static-resource extensions, white- and blacklist.
//! - **Rewriting** ([`UrlRewriter`]): the public page URL appended to the
//!   rendering-service base URL.
//! - **Fetching** ([`UpstreamFetcher`]): one GET, no redirects, token and
//!   proxy from configuration.
//! - **Relaying** ([`relay()`]): status, headers and body copied onto the
//!   client response, which is then final.
//!
//! Any failure along the way leaves the request to the normal pipeline.
//!
//! # Configuration System
//!
//! Configuration comes from layered providers: files (JSON, TOML, YAML),
//! environment variables and anything implementing [`ConfigProvider`].
//!
//! # Embedding
//!
//! [`PrerenderFilter`] implements [`Interceptor`]; any host that can hand
//! over an [`IncomingRequest`] and a [`ResponseHandle`] can run it:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use prerender::{BufferedResponse, IncomingRequest, Interceptor, PrerenderConfig, PrerenderFilter};
//!
//! # async fn example() -> Result<(), prerender::PrerenderError> {
//! let filter = PrerenderFilter::new(Arc::new(PrerenderConfig::default()))?;
//!
//! let request = IncomingRequest::new("https://example.com/page", "/page")
//!     .with_user_agent("Mozilla/5.0 (compatible; Twitterbot/1.0)");
//! let mut response = BufferedResponse::new();
//!
//! if !filter.intercept(&request, &mut response).await {
//!     // continue with normal processing
//! }
//! # Ok(())
//! # }
//! ```

// Module declarations
pub mod classifier;
pub mod config;
pub mod core;
pub mod fetcher;
pub mod filter;
pub mod loader;
pub mod logging;
pub mod relay;
pub mod rewriter;
pub mod server;

// Re-export key types at the crate root for convenience
pub use classifier::RequestClassifier;
pub use config::{ConfigError, ConfigProvider, ConfigProviderExt, PrerenderConfig, ProxySettings};
pub use core::{
    BufferedResponse, Classification, IncomingRequest, Interceptor, PrerenderError, ResponseHandle,
    UpstreamResponse,
};
pub use fetcher::UpstreamFetcher;
pub use filter::PrerenderFilter;
pub use loader::{LoaderError, Prerender, PrerenderLoader};
pub use relay::relay;
pub use rewriter::UrlRewriter;
pub use server::{Handler, HealthServer, PrerenderServer, ServerConfig, ShellHandler};
