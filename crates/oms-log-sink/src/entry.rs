// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Structured log entries and the log types that route them.
//!
//! Every raw line becomes exactly one [`LogEntry`]. Lines recognized by
//! [`AccessLog::parse`] go to the HTTP stream with their request metadata;
//! everything else goes to the plain logs stream with no metadata at all.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};

use crate::access_log::AccessLog;

/// Name of the entry field that carries the generation timestamp.
///
/// Sent in the `time-generated-field` header so the intake uses it instead of
/// the ingestion time.
pub const TIME_GENERATED_FIELD: &str = "time_generated";

const LOGS_SUFFIX: &str = "_LOGS";
const HTTP_SUFFIX: &str = "_HTTP";

/// Destination stream (custom log table) selector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogType(String);

impl LogType {
    pub fn new(name: impl Into<String>) -> Self {
        LogType(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The two streams derived from a log type prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogTypes {
    /// Stream for plain diagnostic lines (`<prefix>_LOGS`).
    pub logs: LogType,
    /// Stream for access-log lines (`<prefix>_HTTP`).
    pub http: LogType,
}

impl LogTypes {
    pub fn from_prefix(prefix: &str) -> Self {
        LogTypes {
            logs: LogType(format!("{prefix}{LOGS_SUFFIX}")),
            http: LogType(format!("{prefix}{HTTP_SUFFIX}")),
        }
    }
}

/// Optional attributes of a [`LogEntry`]; any subset may be set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryOptions {
    pub http_status: Option<u16>,
    pub latency_ms: Option<f64>,
    pub http_method: Option<String>,
    pub http_path: Option<String>,
    pub client_ip: Option<String>,
}

impl EntryOptions {
    #[must_use]
    pub fn with_http_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    #[must_use]
    pub fn with_latency_ms(mut self, latency_ms: f64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }

    #[must_use]
    pub fn with_http_method(mut self, method: impl Into<String>) -> Self {
        self.http_method = Some(method.into());
        self
    }

    #[must_use]
    pub fn with_http_path(mut self, path: impl Into<String>) -> Self {
        self.http_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_client_ip(mut self, client_ip: impl Into<String>) -> Self {
        self.client_ip = Some(client_ip.into());
        self
    }
}

impl From<AccessLog> for EntryOptions {
    fn from(log: AccessLog) -> Self {
        EntryOptions {
            http_status: Some(log.http_status),
            latency_ms: Some(log.latency_ms),
            http_method: log.method,
            http_path: log.path,
            client_ip: log.client_ip,
        }
    }
}

/// One record queued for shipment.
///
/// Fields are private so the message and the log type cannot change once the
/// entry exists.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    #[serde(rename = "log")]
    message: String,
    #[serde(rename = "time_generated", serialize_with = "serialize_generated_at")]
    generated_at: DateTime<Utc>,
    #[serde(skip)]
    log_type: LogType,
    #[serde(skip_serializing_if = "Option::is_none")]
    http_status: Option<u16>,
    #[serde(rename = "latency", skip_serializing_if = "Option::is_none")]
    latency_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    http_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    http_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_ip: Option<String>,
}

impl LogEntry {
    pub fn new(
        message: impl Into<String>,
        log_type: LogType,
        generated_at: DateTime<Utc>,
        options: EntryOptions,
    ) -> Self {
        LogEntry {
            message: message.into(),
            generated_at,
            log_type,
            http_status: options.http_status,
            latency_ms: options.latency_ms,
            http_method: options.http_method,
            http_path: options.http_path,
            client_ip: options.client_ip,
        }
    }

    /// Classifies a raw line and builds the matching entry.
    ///
    /// Invalid UTF-8 is replaced rather than rejected so that one malformed
    /// line never blocks the ones after it.
    pub fn from_line(line: &[u8], log_types: &LogTypes, now: DateTime<Utc>) -> Self {
        let message = String::from_utf8_lossy(line).into_owned();
        let (log_type, options) = match AccessLog::parse(&message) {
            Ok(access_log) => (log_types.http.clone(), access_log.into()),
            Err(_) => (log_types.logs.clone(), EntryOptions::default()),
        };
        LogEntry::new(message, log_type, now, options)
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    pub fn log_type(&self) -> &LogType {
        &self.log_type
    }

    pub fn http_status(&self) -> Option<u16> {
        self.http_status
    }

    pub fn latency_ms(&self) -> Option<f64> {
        self.latency_ms
    }

    pub fn http_method(&self) -> Option<&str> {
        self.http_method.as_deref()
    }

    pub fn http_path(&self) -> Option<&str> {
        self.http_path.as_deref()
    }

    pub fn client_ip(&self) -> Option<&str> {
        self.client_ip.as_deref()
    }
}

// The intake rejects nanosecond precision, so the timestamp is cut to millis.
fn serialize_generated_at<S>(
    generated_at: &DateTime<Utc>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&generated_at.to_rfc3339_opts(SecondsFormat::Millis, true))
}
