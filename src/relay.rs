// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Copies an upstream answer onto the client-facing response.

use reqwest::header::{self, HeaderName};

use crate::core::{ResponseHandle, UpstreamResponse};

/// Replace the outbound response with `upstream` and mark it final.
///
/// Repeated upstream headers become repeated header lines; nothing is
/// comma-joined. Hop-by-hop framing headers are not copied, the host frames
/// the body it actually sends. Takes the upstream response by value, so a
/// single answer cannot be relayed twice.
pub fn relay(upstream: UpstreamResponse, response: &mut dyn ResponseHandle) {
    response.set_status(upstream.status);

    let mut current = None;
    for (name, value) in upstream.headers {
        // HeaderMap yields the name only for the first value of each run
        if let Some(name) = name {
            current = Some(name);
        }
        let Some(name) = &current else { continue };
        if is_framing_header(name) {
            continue;
        }
        response.append_header(name.clone(), value);
    }

    response.write(&upstream.body);
    response.flush();
    response.complete();
}

/// Headers describing the connection or body framing of one hop.
pub(crate) fn is_framing_header(name: &HeaderName) -> bool {
    *name == header::CONNECTION
        || *name == header::TRANSFER_ENCODING
        || *name == header::CONTENT_LENGTH
        || name.as_str() == "keep-alive"
}
