// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Core primitives – requests, upstream answers, response handles & the
//! interceptor contract.
//!
//! Everything that physically moves through the prerender pipeline is
//! defined in this module.  No decision logic lives here; that sits in
//! `classifier` (eligibility), `rewriter` (URLs), `fetcher` (IO) and
//! `relay` (response copying).


use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use thiserror::Error;
use url::{Position, Url};

/// Query-string key crawlers use to ask for a rendered snapshot.
pub const ESCAPED_FRAGMENT: &str = "_escaped_fragment_";

/// Errors that can occur while running the prerender filter.
#[derive(Error, Debug)]
pub enum PrerenderError {
    /// The inbound URL could not be parsed for rewriting
    #[error("malformed URL '{url}': {reason}")]
    MalformedUrl { url: String, reason: String },

    /// The rendering service could not be reached at all
    #[error("fetch from rendering service failed: {0}")]
    FetchFailed(#[from] reqwest::Error),

    /// The rendering service did not answer in time
    #[error("rendering service timed out after {0:?}")]
    Timeout(Duration),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl PrerenderError {
    /// Create a new malformed URL error.
    pub fn malformed_url<U: fmt::Display, R: fmt::Display>(url: U, reason: R) -> Self {
        Self::MalformedUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<crate::config::error::ConfigError> for PrerenderError {
    fn from(err: crate::config::error::ConfigError) -> Self {
        PrerenderError::ConfigError(err.to_string())
    }
}

/// Read-only view of one inbound request, as handed over by the host.
#[derive(Debug, Clone, Default)]
pub struct IncomingRequest {
    /// Absolute URL (`scheme://host[:port]/path?query`)
    pub url: String,
    /// Path and query exactly as received on the wire; when left empty
    /// they are taken from `url`
    pub raw_path: String,
    /// Base path the application is mounted under (`/` when at the root)
    pub application_path: String,
    /// `User-Agent` header, if any
    pub user_agent: Option<String>,
    /// Absolute form of the `Referer` header, if it parsed as a URL
    pub referrer: Option<String>,
    /// All inbound headers
    pub headers: HeaderMap,
}

impl IncomingRequest {
    /// Create a request view from an absolute URL and the raw path+query.
    pub fn new(url: impl Into<String>, raw_path: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            raw_path: raw_path.into(),
            application_path: "/".to_string(),
            ..Self::default()
        }
    }

    /// Set the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Set the referrer.
    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = Some(referrer.into());
        self
    }

    /// Set the application base path.
    pub fn with_application_path(mut self, path: impl Into<String>) -> Self {
        self.application_path = path.into();
        self
    }

    /// Add a header. Invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    /// First value of a header as a string, if present and printable.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Path and query of the request.
    ///
    /// `raw_path` when the host supplied it, otherwise the path and query of
    /// the parsed `url`.
    pub fn path_and_query(&self) -> Cow<'_, str> {
        if !self.raw_path.is_empty() {
            return Cow::Borrowed(&self.raw_path);
        }
        match Url::parse(&self.url) {
            Ok(url) => Cow::Owned(url[Position::BeforePath..Position::AfterQuery].to_string()),
            Err(_) => Cow::Borrowed(""),
        }
    }

    /// The raw query string (without the leading `?`).
    pub fn query(&self) -> Option<Cow<'_, str>> {
        match self.path_and_query() {
            Cow::Borrowed(p) => p.split_once('?').map(|(_, q)| Cow::Borrowed(q)),
            Cow::Owned(p) => p.split_once('?').map(|(_, q)| Cow::Owned(q.to_string())),
        }
    }

    /// Whether the raw query string carries `key` as a parameter name.
    pub fn has_query_key(&self, key: &str) -> bool {
        self.query()
            .map(|q| q.split('&').any(|pair| query_key(pair) == key))
            .unwrap_or(false)
    }
}

/// Name part of a raw `key=value` query pair.
pub(crate) fn query_key(pair: &str) -> &str {
    pair.split_once('=').map_or(pair, |(k, _)| k)
}

/// Result of the eligibility decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Serve a rendered snapshot
    Eligible,
    /// Leave the request to the normal pipeline
    NotEligible,
}

impl Classification {
    /// Returns true if the request should be intercepted.
    pub fn is_eligible(&self) -> bool {
        matches!(self, Classification::Eligible)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Eligible => write!(f, "ELIGIBLE"),
            Classification::NotEligible => write!(f, "NOT_ELIGIBLE"),
        }
    }
}

/// A complete answer from the rendering service.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: u16,
    /// Multi-map; repeated header names keep every value in order
    pub headers: HeaderMap,
    pub body: String,
}

/// Mutable handle on the response the host will send to the client.
pub trait ResponseHandle: Send {
    /// Set the status code.
    fn set_status(&mut self, status: u16);

    /// Add a header line. Existing values for the same name are kept.
    fn append_header(&mut self, name: HeaderName, value: HeaderValue);

    /// Append text to the body.
    fn write(&mut self, body: &str);

    /// Push whatever has been written so far towards the client.
    fn flush(&mut self);

    /// Mark the response as final; the host must skip normal processing.
    fn complete(&mut self);
}

/// In-memory response used by hosts that build the wire response afterwards.
#[derive(Debug, Clone)]
pub struct BufferedResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
    flushed: bool,
    completed: bool,
}

impl Default for BufferedResponse {
    fn default() -> Self {
        Self {
            status: 200,
            headers: HeaderMap::new(),
            body: String::new(),
            flushed: false,
            completed: false,
        }
    }
}

impl BufferedResponse {
    /// Create an empty `200` response.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a response with the given status, content type and body.
    pub fn with_body(status: u16, content_type: &'static str, body: impl Into<String>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static(content_type),
        );
        Self {
            status,
            headers,
            body: body.into(),
            ..Self::default()
        }
    }

    /// Whether `flush` has been called.
    pub fn is_flushed(&self) -> bool {
        self.flushed
    }

    /// Whether the response was marked final.
    pub fn is_completed(&self) -> bool {
        self.completed
    }
}

impl ResponseHandle for BufferedResponse {
    fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    fn append_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.append(name, value);
    }

    fn write(&mut self, body: &str) {
        self.body.push_str(body);
    }

    fn flush(&mut self) {
        self.flushed = true;
    }

    fn complete(&mut self) {
        self.completed = true;
    }
}

/// A request interceptor plugged into the host pipeline.
///
/// The host calls [`Interceptor::intercept`] once per request.  When it
/// returns `true` the response handle holds the final answer and normal
/// processing must be skipped.  Dropping the returned future abandons any
/// outbound work still in flight.
#[async_trait::async_trait]
pub trait Interceptor: fmt::Debug + Send + Sync {
    /// Get the interceptor name.
    fn name(&self) -> &str;

    /// Inspect the request and, if it is ours, write the response.
    async fn intercept(
        &self,
        request: &IncomingRequest,
        response: &mut dyn ResponseHandle,
    ) -> bool;
}
