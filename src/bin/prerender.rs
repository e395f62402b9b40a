// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Minimal CLI wrapper so the library can run as a stand-alone host.
//!
//!  Build it with `cargo build --release --bin prerender`
//!  The binary honours PRERENDER_CONFIG_FILE or falls back to
//!  /etc/prerender/config.toml. `PRERENDER_*` variables override the file.

use std::env;
use std::error::Error;

use prerender::{Prerender, error_fmt, info_fmt};

const DEFAULT_CONFIG_PATH: &str = "/etc/prerender/config.toml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    println!("Starting prerender");

    let config_path = match env::var("PRERENDER_CONFIG_FILE").ok() {
        Some(path) => {
            println!("Using configuration from {path}");
            path
        }
        None => {
            println!(
                "No PRERENDER_CONFIG_FILE env var found. Attempting to use default configuration path: {DEFAULT_CONFIG_PATH}"
            );
            if !std::path::Path::new(DEFAULT_CONFIG_PATH).exists() {
                println!("Default configuration file {DEFAULT_CONFIG_PATH} does not exist.");
                return Err(Box::from("No configuration file found."));
            }
            DEFAULT_CONFIG_PATH.to_string()
        }
    };

    let prerender = match Prerender::loader()
        .with_config_file(&config_path)
        .with_env_vars()
        .build()
        .await
    {
        Ok(p) => p,
        Err(e) => {
            println!("Failed to build prerender host: {e}");
            return Err(e.into());
        }
    };

    match prerender.start().await {
        Ok(()) => {
            info_fmt!("Prerender", "Server stopped gracefully");
            Ok(())
        }
        Err(e) => {
            error_fmt!("Prerender", "Server failed: {}", e);
            Err(e.into())
        }
    }
}
