// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Upstream URL construction.
//!
//! The rendering service is asked for the page *as the crawler saw it*, so
//! the path and query are taken from the raw request line rather than a
//! normalised form.  Only the `_escaped_fragment_` marker is removed.


use url::Url;

use crate::config::PrerenderConfig;
use crate::core::{ESCAPED_FRAGMENT, IncomingRequest, PrerenderError, query_key};

const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
const X_HOST: &str = "x-host";

/// Turns an inbound request into the URL fetched from the rendering service.
#[derive(Debug, Clone)]
pub struct UrlRewriter {
    service_url: String,
    strip_application_name: bool,
    use_x_host_header: bool,
}

impl UrlRewriter {
    /// Create a rewriter for the given configuration.
    pub fn new(config: &PrerenderConfig) -> Self {
        Self {
            service_url: config.service_url.clone(),
            strip_application_name: config.strip_application_name_from_request_url,
            use_x_host_header: config.use_x_host_header,
        }
    }

    /// Build the full upstream URL (`<service_url>/<public page url>`).
    pub fn build_upstream_url(&self, request: &IncomingRequest) -> Result<String, PrerenderError> {
        let page_url = self.page_url(request)?;

        if self.service_url.ends_with('/') {
            Ok(format!("{}{}", self.service_url, page_url))
        } else {
            Ok(format!("{}/{}", self.service_url, page_url))
        }
    }

    /// The public URL of the requested page, without the service prefix.
    pub fn page_url(&self, request: &IncomingRequest) -> Result<String, PrerenderError> {
        let parsed = Url::parse(&request.url)
            .map_err(|e| PrerenderError::malformed_url(&request.url, e))?;

        let host = parsed
            .host_str()
            .ok_or_else(|| PrerenderError::malformed_url(&request.url, "missing host"))?;

        let authority = match self.forwarded_host(request) {
            Some(x_host) => x_host.to_string(),
            None => match parsed.port() {
                Some(port) => format!("{host}:{port}"),
                None => host.to_string(),
            },
        };

        let scheme = match request.header(X_FORWARDED_PROTO) {
            Some(proto) if proto.trim().eq_ignore_ascii_case("https") => "https",
            _ => parsed.scheme(),
        };

        let path_and_query = request.path_and_query();
        let raw_path = if path_and_query.is_empty() {
            "/"
        } else {
            path_and_query.as_ref()
        };

        let mut url = format!("{scheme}://{authority}{}", remove_query_key(raw_path, ESCAPED_FRAGMENT));

        let app_path = request.application_path.as_str();
        if self.strip_application_name && !app_path.is_empty() && app_path != "/" {
            url = url.replacen(app_path, "", 1);
        }

        Ok(url)
    }

    fn forwarded_host<'a>(&self, request: &'a IncomingRequest) -> Option<&'a str> {
        if !self.use_x_host_header {
            return None;
        }
        request.header(X_HOST).map(str::trim).filter(|h| !h.is_empty())
    }
}

/// Drop every `key` parameter from a raw `path?query`, keeping the other
/// pairs (empty ones included) byte-for-byte and in order.
pub(crate) fn remove_query_key(raw_path: &str, key: &str) -> String {
    let Some((path, query)) = raw_path.split_once('?') else {
        return raw_path.to_string();
    };

    let pairs: Vec<&str> = query.split('&').collect();
    let kept: Vec<&str> = pairs
        .iter()
        .copied()
        .filter(|pair| query_key(pair) != key)
        .collect();

    if kept.len() == pairs.len() {
        return raw_path.to_string();
    }

    // Only separators left once the key is gone
    if kept.iter().all(|pair| pair.is_empty()) {
        path.to_string()
    } else {
        format!("{path}?{}", kept.join("&"))
    }
}
