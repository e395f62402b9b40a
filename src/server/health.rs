// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Liveness (`/health`) and readiness (`/ready`) endpoints on their own port.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming as IncomingBody;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use std::convert::Infallible;
use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::{debug_fmt, error_fmt};

/// Health endpoints; stops serving when dropped.
#[derive(Debug)]
pub struct HealthServer {
    is_ready: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl HealthServer {
    /// Spawn the health listener on `0.0.0.0:port`. Starts out not ready.
    pub fn new(port: u16) -> Self {
        let is_ready = Arc::new(AtomicBool::new(false));
        let ready_clone = is_ready.clone();

        let handle = tokio::spawn(async move {
            let addr = SocketAddr::from(([0, 0, 0, 0], port));
            let listener = match TcpListener::bind(addr).await {
                Ok(listener) => listener,
                Err(e) => {
                    error_fmt!("HealthServer", "Bind to {} failed: {}", addr, e);
                    return;
                }
            };

            loop {
                let (stream, _) = match listener.accept().await {
                    Ok(s) => s,
                    Err(e) => {
                        error_fmt!("HealthServer", "Accept failed: {}", e);
                        continue;
                    }
                };

                let ready = ready_clone.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<IncomingBody>| {
                        let ready = ready.load(Ordering::Relaxed);
                        async move { Ok::<_, Infallible>(respond(req.uri().path(), ready)) }
                    });

                    let builder = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new());
                    if let Err(err) = builder.serve_connection(TokioIo::new(stream), service).await {
                        debug_fmt!("HealthServer", "Connection error: {}", err);
                    }
                });
            }
        });

        Self { is_ready, handle }
    }

    /// Report ready on `/ready`.
    pub fn set_ready(&self) {
        self.is_ready.store(true, Ordering::Relaxed);
    }

    /// Whether `/ready` currently reports ready.
    pub fn is_ready(&self) -> bool {
        self.is_ready.load(Ordering::Relaxed)
    }
}

impl Drop for HealthServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn respond(path: &str, ready: bool) -> Response<Full<Bytes>> {
    let (status, body) = match path {
        "/health" => (StatusCode::OK, "OK"),
        "/ready" if ready => (StatusCode::OK, "READY"),
        "/ready" => (StatusCode::SERVICE_UNAVAILABLE, "NOT READY"),
        _ => (StatusCode::NOT_FOUND, "Not Found"),
    };

    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
}
