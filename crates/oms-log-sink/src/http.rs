// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! HTTP client construction for the flusher.

use std::error::Error;
use std::time::Duration;

use tracing::error;

use crate::config::Config;

/// Builds the client used to reach the intake.
///
/// An unparsable proxy is logged and replaced by a direct connection so that
/// a configuration mistake does not stop log shipping altogether.
#[must_use]
pub fn get_client(config: &Config) -> reqwest::Client {
    match build_client(config, true) {
        Ok(client) => client,
        Err(e) => {
            error!("OMS | Invalid proxy configuration ({e}), connecting directly");
            match build_client(config, false) {
                Ok(client) => client,
                Err(inner) => {
                    error!("OMS | Failed to build HTTP client ({inner}), using defaults");
                    reqwest::Client::new()
                }
            }
        }
    }
}

fn build_client(config: &Config, allow_proxy: bool) -> Result<reqwest::Client, Box<dyn Error>> {
    let mut builder = reqwest::Client::builder()
        .use_rustls_tls()
        .timeout(config.flush_timeout)
        .pool_idle_timeout(Some(Duration::from_secs(270)))
        .tcp_keepalive(Some(Duration::from_secs(120)));

    if allow_proxy {
        if let Some(proxy) = &config.https_proxy {
            builder = builder.proxy(reqwest::Proxy::https(proxy)?);
        }
    }
    Ok(builder.build()?)
}
