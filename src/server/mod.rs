// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP host for the prerender interceptor.
//!
//! The server is a *thin* wrapper around **hyper-util**.  It owns the
//! listening socket, turns every hyper request into an [`IncomingRequest`],
//! offers it to the interceptor and, when the interceptor passes, hands it
//! to the normal pipeline ([`Handler`]).
//!
//! **Protocol support**
//! Uses `hyper_util::server::conn::auto::Builder`, so the same
//! connection transparently handles both HTTP/1.1 *and* HTTP/2.

mod health;
mod shell;

pub use health::HealthServer;
pub use shell::ShellHandler;

use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::{self, HeaderName, HeaderValue};
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as AutoBuilder;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::{RwLock, oneshot};
use tokio::task::{Id, JoinSet};

use crate::config::{Config, ConfigError};
use crate::core::{BufferedResponse, IncomingRequest, Interceptor, PrerenderError};
use crate::logging::middleware::RequestLogger;
use crate::relay::is_framing_header;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Configuration for the HTTP server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Port to listen on for health/readiness checks
    #[serde(default = "default_health_port")]
    pub health_port: u16,

    /// Base path the application is mounted under
    #[serde(default = "default_application_path")]
    pub application_path: String,

    /// HTML served to non-crawler clients; a built-in page when unset
    #[serde(default)]
    pub shell_file: Option<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_health_port() -> u16 {
    8081
}

fn default_application_path() -> String {
    "/".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            health_port: default_health_port(),
            application_path: default_application_path(),
            shell_file: None,
        }
    }
}

impl ServerConfig {
    /// Read the `server.*` keys one at a time so environment overrides of a
    /// single key still apply on top of a file section.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            host: config
                .get_string("server.host")?
                .unwrap_or(defaults.host),
            port: config.get_or_default("server.port", defaults.port)?,
            health_port: config.get_or_default("server.health_port", defaults.health_port)?,
            application_path: config
                .get_string("server.application_path")?
                .filter(|p| !p.trim().is_empty())
                .unwrap_or(defaults.application_path),
            shell_file: config
                .get_string("server.shell_file")?
                .filter(|p| !p.trim().is_empty()),
        })
    }
}

/// The normal request pipeline, run when the interceptor passes.
#[async_trait]
pub trait Handler: fmt::Debug + Send + Sync {
    /// Produce the response for a request.
    async fn handle(&self, request: &IncomingRequest) -> BufferedResponse;
}

#[derive(Debug)]
struct ServerState {
    interceptor: Arc<dyn Interceptor>,
    handler: Arc<dyn Handler>,
    request_logger: RequestLogger,
    application_path: String,
}

/// HTTP server hosting the interceptor in front of a [`Handler`].
#[derive(Debug, Clone)]
pub struct PrerenderServer {
    /// Server configuration
    config: ServerConfig,
    state: Arc<ServerState>,
    /// Shutdown senders for each connection task
    shutdown_senders: Arc<RwLock<HashMap<Id, oneshot::Sender<()>>>>,
}

impl PrerenderServer {
    /// Create a new server.
    pub fn new(
        config: ServerConfig,
        interceptor: Arc<dyn Interceptor>,
        handler: Arc<dyn Handler>,
    ) -> Self {
        let state = ServerState {
            interceptor,
            handler,
            request_logger: RequestLogger::default(),
            application_path: config.application_path.clone(),
        };

        Self {
            config,
            state: Arc::new(state),
            shutdown_senders: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Use `request_logger` for access logs and trace ids.
    pub fn with_request_logger(mut self, request_logger: RequestLogger) -> Self {
        let state = ServerState {
            interceptor: self.state.interceptor.clone(),
            handler: self.state.handler.clone(),
            request_logger,
            application_path: self.state.application_path.clone(),
        };
        self.state = Arc::new(state);
        self
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind, start the health server and serve until Ctrl-C or SIGTERM.
    pub async fn start(&self) -> Result<(), PrerenderError> {
        let addr = format!("{}:{}", self.config.host, self.config.port)
            .parse::<SocketAddr>()
            .map_err(|e| PrerenderError::Other(format!("Invalid server address: {}", e)))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| PrerenderError::Other(format!("Failed to bind: {}", e)))?;

        let health_server = HealthServer::new(self.config.health_port);

        info!("Prerender server listening on http://{}", addr);
        health_server.set_ready();

        let result = self.serve(listener, shutdown_signal()).await;

        drop(health_server);
        result
    }

    /// Serve connections from `listener` until `shutdown` resolves, then
    /// drain open connections for up to 30 seconds.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<(), PrerenderError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let shutdown_senders = self.shutdown_senders.clone();
        let mut join_set = JoinSet::new();
        let shutdown_initiated = Arc::new(AtomicBool::new(false));

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Initiating graceful shutdown");
                    shutdown_initiated.store(true, Ordering::SeqCst);
                    break;
                }
                accept = listener.accept() => {
                    match accept {
                        Ok((stream, remote_addr)) => {
                            if shutdown_initiated.load(Ordering::SeqCst) {
                                info!("Rejecting new connection during shutdown");
                                continue;
                            }

                            let state = self.state.clone();
                            let remote = remote_addr.to_string();
                            let (tx, rx) = oneshot::channel();
                            let shutdown_senders_clone = shutdown_senders.clone();

                            let handle = join_set.spawn(async move {
                                let task_id = tokio::task::id();

                                let service = service_fn(move |req: Request<Incoming>| {
                                    handle_request(req, state.clone(), remote.clone())
                                });
                                let io = TokioIo::new(stream);

                                let builder = AutoBuilder::new(TokioExecutor::new());
                                let connection = builder.serve_connection(io, service);
                                let mut conn = std::pin::pin!(connection);

                                tokio::select! {
                                    res = &mut conn => {
                                        if let Err(e) = res {
                                            log_connection_error(&*e);
                                        }
                                    }
                                    _ = rx => {
                                        debug!("Connection received shutdown signal, waiting for graceful close");
                                        conn.as_mut().graceful_shutdown();
                                        if let Err(e) = conn.await {
                                            log_connection_error(&*e);
                                        }
                                    }
                                }

                                shutdown_senders_clone.write().await.remove(&task_id);
                                debug!("Connection task {:?} completed", task_id);
                            });

                            shutdown_senders.write().await.insert(handle.id(), tx);
                        }
                        Err(e) => error!("Accept error: {}", e),
                    }
                }
            }
        }

        {
            let mut senders = shutdown_senders.write().await;
            info!("Signaling {} connections to shut down", senders.len());
            for (_, sender) in senders.drain() {
                let _ = sender.send(());
            }
        }

        let shutdown_timeout = tokio::time::Duration::from_secs(30);
        let start_time = tokio::time::Instant::now();

        let drain = async {
            while let Some(res) = join_set.join_next().await {
                if let Err(e) = res {
                    if !e.is_cancelled() {
                        error!("Connection task failed: {}", e);
                    }
                }
            }
        };

        match tokio::time::timeout(shutdown_timeout, drain).await {
            Ok(_) => info!(
                "All connections drained gracefully in {:.1}s",
                start_time.elapsed().as_secs_f32()
            ),
            Err(_) => {
                warn!(
                    "Shutdown timed out after {} seconds, some connections may be forcefully closed",
                    shutdown_timeout.as_secs()
                );
                join_set.shutdown().await;
            }
        }

        info!("Shutdown complete");
        Ok(())
    }
}

fn log_connection_error(e: &(dyn std::error::Error + Send + Sync)) {
    let err_str = e.to_string();
    if !err_str.contains("connection closed") && !err_str.contains("connection reset") {
        error!("Connection error: {}", e);
    } else {
        debug!("Connection closed: {}", e);
    }
}

/// Resolves on Ctrl-C or (on Unix) SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Cannot install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

/// Handle an incoming HTTP request.
async fn handle_request(
    req: Request<Incoming>,
    state: Arc<ServerState>,
    remote_addr: String,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().as_str().to_owned();
    let mut request = to_incoming_request(&req, &state.application_path);
    drop(req);

    let info = state.request_logger.begin(&method, &mut request, &remote_addr);

    let mut buffered = BufferedResponse::new();
    let prerendered = state.interceptor.intercept(&request, &mut buffered).await;
    if !prerendered {
        buffered = state.handler.handle(&request).await;
    }

    state.request_logger.finish(&info, buffered.status, prerendered);

    let mut response = to_hyper_response(buffered);
    if state.request_logger.include_trace_id() {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(state.request_logger.trace_header().as_bytes()),
            HeaderValue::from_str(&info.trace_id),
        ) {
            response.headers_mut().insert(name, value);
        }
    }

    Ok(response)
}

/// Build the read-only request view handed to the interceptor.
pub(crate) fn to_incoming_request<B>(req: &Request<B>, application_path: &str) -> IncomingRequest {
    let uri = req.uri();
    let headers = req.headers();

    let scheme = uri.scheme_str().unwrap_or("http");
    let authority = uri
        .authority()
        .map(|a| a.as_str())
        .or_else(|| headers.get(header::HOST).and_then(|h| h.to_str().ok()))
        .unwrap_or("localhost");
    let raw_path = uri.path_and_query().map_or("/", |pq| pq.as_str());

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);

    // Relative or garbled referrers are treated as absent
    let referrer = headers
        .get(header::REFERER)
        .and_then(|h| h.to_str().ok())
        .and_then(|r| url::Url::parse(r).ok())
        .map(|u| u.to_string());

    IncomingRequest {
        url: format!("{scheme}://{authority}{raw_path}"),
        raw_path: raw_path.to_string(),
        application_path: application_path.to_string(),
        user_agent,
        referrer,
        headers: headers.clone(),
    }
}

/// Turn a finished response into a hyper response. Framing headers are
/// dropped so hyper can recompute them for the actual body.
pub(crate) fn to_hyper_response(resp: BufferedResponse) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(resp.body)));
    *response.status_mut() =
        StatusCode::from_u16(resp.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let headers = response.headers_mut();
    let mut current = None;
    for (name, value) in resp.headers {
        if let Some(name) = name {
            current = Some(name);
        }
        let Some(name) = &current else { continue };
        if is_framing_header(name) {
            continue;
        }
        headers.append(name.clone(), value);
    }

    response
}
