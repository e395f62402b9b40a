// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Access logging with trace context.

use std::sync::Arc;

use reqwest::header::{HeaderName, HeaderValue};

use crate::core::IncomingRequest;
use crate::logging::config::LoggingConfig;
use crate::logging::structured::{RequestInfo, generate_trace_id};

/// Assigns trace ids to inbound requests and logs request/response pairs.
#[derive(Debug, Clone)]
pub struct RequestLogger {
    config: Arc<LoggingConfig>,
}

impl Default for RequestLogger {
    fn default() -> Self {
        Self::new(LoggingConfig::default())
    }
}

impl RequestLogger {
    /// Create a new request logger
    pub fn new(config: LoggingConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Header the trace id travels in.
    pub fn trace_header(&self) -> &str {
        &self.config.trace_id_header
    }

    /// Whether the trace id should be echoed on responses.
    pub fn include_trace_id(&self) -> bool {
        self.config.include_trace_id
    }

    /// Resolve the trace id of `request` and stamp it onto its headers, so
    /// interceptors further down log under the same id.
    pub fn begin(&self, method: &str, request: &mut IncomingRequest, remote_addr: &str) -> RequestInfo {
        let trace_id = if self.config.propagate_trace_id {
            request
                .header(&self.config.trace_id_header)
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
                .unwrap_or_else(generate_trace_id)
        } else {
            generate_trace_id()
        };

        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(self.config.trace_id_header.as_bytes()),
            HeaderValue::from_str(&trace_id),
        ) {
            request.headers.insert(name, value);
        }

        let info = RequestInfo::with_trace_id(
            trace_id,
            method.to_string(),
            request.raw_path.clone(),
            remote_addr.to_string(),
            request.user_agent.clone().unwrap_or_else(|| "unknown".to_string()),
        );

        if self.config.structured {
            let logger = slog_scope::logger();
            slog::info!(logger, "Request received";
                "trace_id" => &info.trace_id,
                "method" => &info.method,
                "path" => &info.path,
                "remote_addr" => &info.remote_addr,
                "user_agent" => &info.user_agent
            );
        } else {
            log::info!(
                "Request received: {} {} from {} (trace_id: {})",
                info.method,
                info.path,
                info.remote_addr,
                info.trace_id
            );
        }

        info
    }

    /// Log how the request was answered.
    pub fn finish(&self, info: &RequestInfo, status: u16, prerendered: bool) {
        let elapsed_ms = info.elapsed_ms();

        if self.config.structured {
            let logger = slog_scope::logger();
            slog::info!(logger, "Response completed";
                "trace_id" => &info.trace_id,
                "method" => &info.method,
                "path" => &info.path,
                "status" => status,
                "prerendered" => prerendered,
                "elapsed_ms" => elapsed_ms as u64
            );
        } else {
            log::info!(
                "[timing] {} {} -> {} | prerendered={} total={}ms (trace_id: {})",
                info.method,
                info.path,
                status,
                prerendered,
                elapsed_ms,
                info.trace_id
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(propagate: bool) -> LoggingConfig {
        LoggingConfig {
            propagate_trace_id: propagate,
            ..LoggingConfig::default()
        }
    }

    #[test]
    fn test_trace_id_propagated_from_request() {
        let logger = RequestLogger::new(config(true));
        let mut request = IncomingRequest::new("http://example.com/a", "/a?x=1")
            .with_header("X-Trace-ID", "trace-123")
            .with_user_agent("test-agent/1.0");

        let info = logger.begin("GET", &mut request, "127.0.0.1:5000");

        assert_eq!(info.trace_id, "trace-123");
        assert_eq!(info.path, "/a?x=1");
        assert_eq!(info.user_agent, "test-agent/1.0");
        assert_eq!(request.header("x-trace-id"), Some("trace-123"));
    }

    #[test]
    fn test_trace_id_generated_when_missing_or_not_propagated() {
        let logger = RequestLogger::new(config(true));
        let mut request = IncomingRequest::new("http://example.com/a", "/a");
        let info = logger.begin("GET", &mut request, "unknown");
        assert_eq!(info.trace_id.len(), 36);
        assert_eq!(request.header("x-trace-id"), Some(info.trace_id.as_str()));
        assert_eq!(info.user_agent, "unknown");

        let logger = RequestLogger::new(config(false));
        let mut request =
            IncomingRequest::new("http://example.com/a", "/a").with_header("X-Trace-ID", "ignored");
        let info = logger.begin("GET", &mut request, "unknown");
        assert_ne!(info.trace_id, "ignored");
        // The stamped header replaces the inbound one
        assert_eq!(request.headers.get_all("x-trace-id").iter().count(), 1);
    }

    #[test]
    fn test_custom_trace_header() {
        let logger = RequestLogger::new(LoggingConfig {
            trace_id_header: "X-Request-ID".to_string(),
            ..LoggingConfig::default()
        });
        assert_eq!(logger.trace_header(), "X-Request-ID");
        assert!(logger.include_trace_id());

        let mut request =
            IncomingRequest::new("http://example.com/a", "/a").with_header("x-request-id", "req-9");
        let info = logger.begin("HEAD", &mut request, "unknown");
        assert_eq!(info.trace_id, "req-9");

        logger.finish(&info, 200, false);
    }
}
