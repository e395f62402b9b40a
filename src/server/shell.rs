// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Single-page application shell served to regular visitors.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use super::Handler;
use crate::core::{BufferedResponse, IncomingRequest, PrerenderError};

const DEFAULT_SHELL: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>App</title></head>
<body><div id="app"></div><script src="/app.js"></script></body>
</html>
"#;

/// Answers every request with the same HTML page.
#[derive(Debug, Clone)]
pub struct ShellHandler {
    html: Arc<str>,
}

impl Default for ShellHandler {
    fn default() -> Self {
        Self::new(DEFAULT_SHELL)
    }
}

impl ShellHandler {
    /// Serve `html` for every request.
    pub fn new(html: impl Into<Arc<str>>) -> Self {
        Self { html: html.into() }
    }

    /// Serve the contents of `path`, read once.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PrerenderError> {
        let path = path.as_ref();
        let html = std::fs::read_to_string(path).map_err(|e| {
            PrerenderError::Other(format!("cannot read shell file {}: {}", path.display(), e))
        })?;
        Ok(Self::new(html))
    }

    /// The page served.
    pub fn html(&self) -> &str {
        &self.html
    }
}

#[async_trait]
impl Handler for ShellHandler {
    async fn handle(&self, _request: &IncomingRequest) -> BufferedResponse {
        BufferedResponse::with_body(200, "text/html; charset=utf-8", self.html.to_string())
    }
}
