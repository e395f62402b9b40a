// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Logging setup.
//!
//! Two back-ends sit behind the `log` facade: plain `env_logger` output, or
//! a slog drain (terminal or JSON) reached through `slog_stdlog`.  Whichever
//! is picked first wins for the life of the process.

pub mod config;
pub mod middleware;
pub mod structured;
pub mod wrapper;

#[cfg(test)]
pub mod test_logger;


use log::{LevelFilter, error, info};
use once_cell::sync::OnceCell;
use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::logging::config::LoggingConfig;
use crate::logging::structured::{LoggerGuard, init_global_logger};

static INIT: Once = Once::new();
static USING_STRUCTURED: AtomicBool = AtomicBool::new(false);
static GLOBAL_GUARD: OnceCell<LoggerGuard> = OnceCell::new();

/// Initialize plain `env_logger` logging with the specified level.
///
/// `RUST_LOG` still takes precedence when set.
pub fn init(level: Option<LevelFilter>) {
    INIT.call_once(|| init_env_logger(level.unwrap_or(LevelFilter::Info)));
}

/// Initialize logging from the `logging` configuration section.
pub fn init_with_config(level: LevelFilter, config: &LoggingConfig) {
    INIT.call_once(|| {
        if !config.structured {
            init_env_logger(level);
            return;
        }

        let guard = init_global_logger(&config.to_logger_config());
        let _ = GLOBAL_GUARD.set(guard);

        let bridge_level = level.to_level().unwrap_or(log::Level::Error);
        match slog_stdlog::init_with_level(bridge_level) {
            Ok(()) => {
                log::set_max_level(level);
                USING_STRUCTURED.store(true, Ordering::SeqCst);
                info!("Structured logging initialized ({} format)", config.format);
            }
            Err(e) => {
                // Another logger owns the facade; keep using it
                error!("Could not bridge log to slog: {}", e);
            }
        }
    });
}

/// Whether log records are routed to slog.
pub fn is_structured() -> bool {
    USING_STRUCTURED.load(Ordering::SeqCst)
}

/// Level from `RUST_LOG_LEVEL`, defaulting to `info`.
pub fn level_from_env() -> LevelFilter {
    match std::env::var("RUST_LOG_LEVEL").ok().as_deref() {
        Some("trace") => LevelFilter::Trace,
        Some("debug") => LevelFilter::Debug,
        Some("warn") => LevelFilter::Warn,
        Some("error") => LevelFilter::Error,
        Some("off") => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

fn init_env_logger(level: LevelFilter) {
    let env = env_logger::Env::default().filter_or("RUST_LOG", level.as_str().to_lowercase());

    let result = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .format_target(true)
        .try_init();

    if result.is_ok() {
        info!("Logging initialized at level: {}", log::max_level());
    }
}

/// Log an error with context and return the error.
///
/// This is useful for logging errors in a chain of Results.
pub fn log_error<E: std::fmt::Display>(context: &str, err: E) -> E {
    error!("[{}] {}", context, err);
    err
}
