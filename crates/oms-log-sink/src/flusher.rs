// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Shipping of batched entries to the data collector API.
//!
//! One batch becomes one signed POST whose body is a JSON array of entries in
//! arrival order. Failures are reported to the caller and never retried.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use tracing::debug;

use crate::config::{Config, RESOURCE};
use crate::entry::{LogEntry, LogType, TIME_GENERATED_FIELD};
use crate::errors::ShippingError;
use crate::http::get_client;
use crate::signature::{rfc1123_date, SharedKey, SigningContext};

const JSON_CONTENT_TYPE: &str = "application/json";
const LOG_TYPE_HEADER: &str = "Log-Type";
const DATE_HEADER: &str = "x-ms-date";
const TIME_GENERATED_FIELD_HEADER: &str = "time-generated-field";

/// Destination of flushed batches.
#[async_trait]
pub trait Shipper: Send + Sync {
    /// Ships one batch. `entries` is never empty.
    async fn ship(&self, log_type: &LogType, entries: &[LogEntry]) -> Result<(), ShippingError>;
}

#[derive(Debug, Clone)]
pub struct Flusher {
    client: reqwest::Client,
    intake_url: String,
    shared_key: SharedKey,
    timeout: Duration,
}

impl Flusher {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Flusher {
            client: get_client(config),
            intake_url: config.intake_url(),
            shared_key: SharedKey::new(&config.customer_id, &config.shared_key),
            timeout: config.flush_timeout,
        }
    }

    /// Builds the signed request for `body`, dated `now`.
    pub fn create_request(
        &self,
        log_type: &LogType,
        body: Vec<u8>,
        now: DateTime<Utc>,
    ) -> reqwest::RequestBuilder {
        let date = rfc1123_date(now);
        let authorization = self.shared_key.authorization(&SigningContext {
            method: "POST",
            content_length: body.len(),
            content_type: JSON_CONTENT_TYPE,
            date: &date,
            resource: RESOURCE,
        });

        self.client
            .post(&self.intake_url)
            .timeout(self.timeout)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .header(AUTHORIZATION, authorization)
            .header(LOG_TYPE_HEADER, log_type.as_str())
            .header(DATE_HEADER, date)
            .header(TIME_GENERATED_FIELD_HEADER, TIME_GENERATED_FIELD)
            .body(body)
    }

    async fn send(req: reqwest::RequestBuilder) -> Result<(), ShippingError> {
        let resp = req
            .send()
            .await
            .map_err(|e| ShippingError::Request(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(ShippingError::Destination(status, body))
    }
}

#[async_trait]
impl Shipper for Flusher {
    async fn ship(&self, log_type: &LogType, entries: &[LogEntry]) -> Result<(), ShippingError> {
        let body = serde_json::to_vec(entries).map_err(|e| ShippingError::Payload(e.to_string()))?;
        debug!(
            "OMS | Shipping {} entries ({} bytes) to {log_type}",
            entries.len(),
            body.len()
        );
        Self::send(self.create_request(log_type, body, Utc::now())).await
    }
}
