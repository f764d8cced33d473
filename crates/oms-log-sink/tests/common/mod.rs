// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Shared helpers for the integration tests

use oms_log_sink::Config;
use std::time::Duration;

/// base64("super-secret-shared-key")
pub const SHARED_KEY: &str = "c3VwZXItc2VjcmV0LXNoYXJlZC1rZXk=";
pub const CUSTOMER_ID: &str = "workspace";

/// Config pointing at a mock intake served under `server_url`.
pub fn mock_config(server_url: &str, flush_interval: Duration) -> Config {
    let mut config = Config::new(CUSTOMER_ID, SHARED_KEY, "MYAPP");
    config.intake_url = Some(format!("{server_url}/api/logs?api-version=2016-04-01"));
    config.flush_interval = flush_interval;
    config.flush_timeout = Duration::from_secs(2);
    config
}

pub const GIN_LINE: &str =
    "[GIN] 2019/08/15 - 02:02:09 | 200 |     485.408µs | 10.244.1.1 |   GET     /health";
