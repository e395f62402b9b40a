// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Structured logging on top of slog.
//!
//! Terminal and JSON drains share the same pipeline: level filter, async
//! worker, then static fields attached to the root logger.

use slog::{Drain, Logger, o};
use slog_async::Async;
use slog_json::Json;
use slog_term::{FullFormat, TermDecorator};
use std::io;
use std::time::Instant;
use uuid::Uuid;

/// Structured logging format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable terminal output
    Terminal,
    /// JSON formatted output
    Json,
}

/// Structured logger configuration
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Output format (Terminal or JSON)
    pub format: LogFormat,
    /// Log level
    pub level: slog::Level,
    /// Whether to include source code location
    pub include_location: bool,
    /// Additional static key-value pairs to include in all logs
    pub static_fields: Vec<(String, String)>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Terminal,
            level: slog::Level::Info,
            include_location: true,
            static_fields: Vec::new(),
        }
    }
}

/// Create a structured logger with the given configuration
pub fn create_logger(config: &LoggerConfig) -> Logger {
    let logger = match config.format {
        LogFormat::Terminal => {
            let decorator = TermDecorator::new().build();
            let mut format = FullFormat::new(decorator);
            if config.include_location {
                format = format.use_file_location();
            }
            root_logger(format.build().fuse(), config.level)
        }
        LogFormat::Json => {
            let drain = Json::new(io::stdout()).add_default_keys().build().fuse();
            root_logger(drain, config.level)
        }
    };

    config.static_fields.iter().fold(logger, |logger, (key, value)| {
        // slog keys are 'static; these live for the whole process anyway
        let key: &'static str = Box::leak(key.clone().into_boxed_str());
        logger.new(o!(key => value.clone()))
    })
}

fn root_logger<D>(drain: D, level: slog::Level) -> Logger
where
    D: Drain<Ok = (), Err = slog::Never> + Send + 'static,
{
    let drain = drain.filter_level(level).fuse();
    let drain = Async::new(drain).build().fuse();
    Logger::root(drain, o!("service" => "prerender"))
}

/// Generate a new trace ID
pub fn generate_trace_id() -> String {
    Uuid::new_v4().to_string()
}

/// Per-request details carried through access logging.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    /// Unique trace ID for the request
    pub trace_id: String,
    /// HTTP method
    pub method: String,
    /// Request path and query
    pub path: String,
    /// Remote address
    pub remote_addr: String,
    /// User agent
    pub user_agent: String,
    started: Instant,
}

impl RequestInfo {
    /// Create a new RequestInfo with a fresh trace ID
    pub fn new(method: String, path: String, remote_addr: String, user_agent: String) -> Self {
        Self::with_trace_id(generate_trace_id(), method, path, remote_addr, user_agent)
    }

    /// Create a new RequestInfo with a known trace ID
    pub fn with_trace_id(
        trace_id: String,
        method: String,
        path: String,
        remote_addr: String,
        user_agent: String,
    ) -> Self {
        Self {
            trace_id,
            method,
            path,
            remote_addr,
            user_agent,
            started: Instant::now(),
        }
    }

    /// Calculate elapsed time in milliseconds
    pub fn elapsed_ms(&self) -> u128 {
        self.started.elapsed().as_millis()
    }
}

/// Global logger guard that keeps the logger alive
pub struct LoggerGuard {
    _guard: slog_scope::GlobalLoggerGuard,
}

impl std::fmt::Debug for LoggerGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("LoggerGuard")
    }
}

/// Initialize the global structured logger
pub fn init_global_logger(config: &LoggerConfig) -> LoggerGuard {
    let logger = create_logger(config);
    let guard = slog_scope::set_global_logger(logger);

    LoggerGuard { _guard: guard }
}
