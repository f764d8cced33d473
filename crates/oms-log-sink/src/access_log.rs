// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Parser for Gin-style HTTP access-log lines.
//!
//! A recognized line looks like:
//!
//! ```text
//! [GIN] 2019/08/15 - 02:02:09 | 200 |     485.408µs | 10.244.1.1 |   GET     /health
//! ```
//!
//! The status code and the method may be wrapped in ANSI color sequences, and
//! either side of a color pair may be missing. Anything that does not match is
//! reported as [`ParseError::NotAccessLog`] and shipped as a plain message.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::errors::ParseError;

/// Status used when the three status digits cannot be read as an integer.
pub const FALLBACK_HTTP_STATUS: u16 = 200;

const MARKER_PATTERN: &str = r"\[GIN\]";
const TIMESTAMP_PATTERN: &str = r"\s+\d{4}/\d{2}/\d{2}\s+-\s+\d{2}:\d{2}:\d{2}\s+";
const STATUS_PATTERN: &str =
    r"\|(?:[[:cntrl:]]?\[\d+;\d+m)?\s*(?P<status>\d{3})\s+(?:[[:cntrl:]]?\[0m)?\|";
const LATENCY_PATTERN: &str = r"\s+(?P<latency>[\d.]{1,13})(?P<unit>ns|[µμu]s|ms|s)";
const REQUEST_PATTERN: &str = concat!(
    r"(?:\s*\|\s*(?P<client>[^\s|]+)\s*\|",
    r"(?:\s*[[:cntrl:]]?\[[\d;]*m)?\s*(?P<method>[A-Z]+)(?:\s*[[:cntrl:]]?\[0m)?",
    r#"\s+"?(?P<path>[^\s"]+)"?)?"#,
);

lazy_static! {
    static ref ACCESS_LOG_REGEX: Regex = {
        let pattern = [
            MARKER_PATTERN,
            TIMESTAMP_PATTERN,
            STATUS_PATTERN,
            LATENCY_PATTERN,
            REQUEST_PATTERN,
        ]
        .concat();
        #[allow(clippy::expect_used)]
        let regex = Regex::new(&pattern).expect("failed creating regex");
        regex
    };
}

/// Fields extracted from one access-log line.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessLog {
    pub http_status: u16,
    /// Request latency normalized to milliseconds.
    pub latency_ms: f64,
    pub client_ip: Option<String>,
    pub method: Option<String>,
    pub path: Option<String>,
}

impl AccessLog {
    /// Attempts to classify `line` as an access-log line.
    ///
    /// Numeric fields degrade instead of failing: unreadable status digits
    /// become [`FALLBACK_HTTP_STATUS`] and an unreadable latency becomes `0.0`.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let caps = ACCESS_LOG_REGEX
            .captures(line)
            .ok_or(ParseError::NotAccessLog)?;

        let http_status = parse_http_status(capture(&caps, "status").unwrap_or_default());
        let latency_ms = parse_latency(
            capture(&caps, "latency").unwrap_or_default(),
            capture(&caps, "unit").unwrap_or_default(),
        );

        Ok(AccessLog {
            http_status,
            latency_ms,
            client_ip: capture(&caps, "client").map(str::to_string),
            method: capture(&caps, "method").map(str::to_string),
            path: capture(&caps, "path").map(str::to_string),
        })
    }

    /// Same as [`AccessLog::parse`] for raw bytes; invalid UTF-8 is replaced.
    pub fn parse_bytes(line: &[u8]) -> Result<Self, ParseError> {
        Self::parse(&String::from_utf8_lossy(line))
    }
}

fn capture<'a>(caps: &Captures<'a>, name: &str) -> Option<&'a str> {
    caps.name(name).map(|m| m.as_str())
}

/// Unit suffix of a Go-formatted duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
}

impl DurationUnit {
    /// Maps a unit suffix to a [`DurationUnit`].
    ///
    /// Both the micro sign (U+00B5) and the Greek mu (U+03BC) are accepted, as
    /// well as the ASCII `us` spelling. Unknown suffixes are treated as
    /// milliseconds.
    pub fn from_suffix(suffix: &str) -> Self {
        match suffix {
            "ns" => DurationUnit::Nanoseconds,
            "µs" | "μs" | "us" => DurationUnit::Microseconds,
            "s" => DurationUnit::Seconds,
            _ => DurationUnit::Milliseconds,
        }
    }

    pub fn to_millis(self, value: f64) -> f64 {
        match self {
            DurationUnit::Nanoseconds => value / 1_000_000.0,
            DurationUnit::Microseconds => value / 1_000.0,
            DurationUnit::Milliseconds => value,
            DurationUnit::Seconds => value * 1_000.0,
        }
    }
}

pub fn parse_http_status(digits: &str) -> u16 {
    digits.parse::<u16>().unwrap_or(FALLBACK_HTTP_STATUS)
}

pub fn parse_latency(value: &str, unit: &str) -> f64 {
    let latency = value.parse::<f64>().unwrap_or(0.0);
    DurationUnit::from_suffix(unit).to_millis(latency)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_parse_plain_access_log() {
        let log = AccessLog::parse(
            "[GIN] 2019/08/15 - 02:02:09 | 200 |     485.408µs | 10.244.1.1 |   GET     /health",
        )
        .unwrap();

        assert_eq!(log.http_status, 200);
        assert_close(log.latency_ms, 0.485408);
        assert_eq!(log.client_ip.as_deref(), Some("10.244.1.1"));
        assert_eq!(log.method.as_deref(), Some("GET"));
        assert_eq!(log.path.as_deref(), Some("/health"));
    }

    #[test]
    fn test_parse_reset_code_without_color_code() {
        let log = AccessLog::parse(concat!(
            "[GIN] 2019/11/30 - 03:42:32 | 404 [0m|    3.607119ms | 74.125.209.18 |",
            "  [0m GET     /blog/image.jpg",
        ))
        .unwrap();

        assert_eq!(log.http_status, 404);
        assert_close(log.latency_ms, 3.607119);
        assert_eq!(log.client_ip.as_deref(), Some("74.125.209.18"));
        assert_eq!(log.method.as_deref(), Some("GET"));
        assert_eq!(log.path.as_deref(), Some("/blog/image.jpg"));
    }

    #[test]
    fn test_parse_color_code_without_reset_code() {
        let log = AccessLog::parse(concat!(
            "[GIN] 2019/11/30 - 03:42:32 |\x1b[90;43m 301 |       1.2s |",
            " 127.0.0.1 | POST     /login",
        ))
        .unwrap();

        assert_eq!(log.http_status, 301);
        assert_close(log.latency_ms, 1200.0);
        assert_eq!(log.method.as_deref(), Some("POST"));
    }

    #[test]
    fn test_parse_fully_colored_line() {
        let line = concat!(
            "[GIN] 2024/01/02 - 10:11:12 |\x1b[97;42m 200 \x1b[0m|        500ns |",
            "       127.0.0.1 |\x1b[97;44m GET     \x1b[0m \"/api/v1/items\"",
        );
        let log = AccessLog::parse(line).unwrap();

        assert_eq!(log.http_status, 200);
        assert_close(log.latency_ms, 0.0005);
        assert_eq!(log.client_ip.as_deref(), Some("127.0.0.1"));
        assert_eq!(log.method.as_deref(), Some("GET"));
        assert_eq!(log.path.as_deref(), Some("/api/v1/items"));
    }

    #[test]
    fn test_parse_without_request_segment() {
        let log = AccessLog::parse("[GIN] 2019/08/15 - 02:02:09 | 500 |    12.5ms").unwrap();

        assert_eq!(log.http_status, 500);
        assert_close(log.latency_ms, 12.5);
        assert_eq!(log.client_ip, None);
        assert_eq!(log.method, None);
        assert_eq!(log.path, None);
    }

    #[test]
    fn test_parse_invalid_lines() {
        assert_eq!(
            AccessLog::parse("[GIN] testing: yoooooooooooooooooooooo"),
            Err(ParseError::NotAccessLog)
        );
        assert_eq!(
            AccessLog::parse("plain diagnostic text"),
            Err(ParseError::NotAccessLog)
        );
        assert_eq!(
            AccessLog::parse("[GIN-debug] Listening and serving HTTP on :8080"),
            Err(ParseError::NotAccessLog)
        );
    }

    #[test]
    fn test_unreadable_numbers_degrade() {
        // Non-ASCII digits satisfy the pattern but not the integer parser.
        let log = AccessLog::parse("[GIN] 2019/08/15 - 02:02:09 | ٤٠٤ |     1.2.3ms").unwrap();
        assert_eq!(log.http_status, FALLBACK_HTTP_STATUS);
        assert_close(log.latency_ms, 0.0);
    }

    #[test]
    fn test_unit_conversion() {
        assert_close(parse_latency("485.408", "µs"), 0.485408);
        assert_close(parse_latency("485.408", "μs"), 0.485408);
        assert_close(parse_latency("3.607119", "ms"), 3.607119);
        assert_close(parse_latency("1.2", "s"), 1200.0);
        assert_close(parse_latency("500", "ns"), 0.0005);
        assert_close(parse_latency("oops", "s"), 0.0);
    }

    #[test]
    fn test_parse_bytes_lossy() {
        let mut line = b"[GIN] 2019/08/15 - 02:02:09 | 201 | 1ms | 10.0.0.1 | PUT /x".to_vec();
        line.push(0xff);
        let log = AccessLog::parse_bytes(&line).unwrap();
        assert_eq!(log.http_status, 201);
        assert_eq!(log.method.as_deref(), Some("PUT"));
    }

    proptest! {
        #[test]
        fn parse_is_deterministic(
            status in 100u16..600,
            millis in 0u32..100_000,
            unit in prop::sample::select(vec!["ns", "µs", "ms", "s"]),
        ) {
            let line = format!(
                "[GIN] 2019/08/15 - 02:02:09 | {status} | {millis}{unit} | 10.0.0.1 | GET /p"
            );
            let first = AccessLog::parse(&line).unwrap();
            let second = AccessLog::parse(&line).unwrap();
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first.http_status, status);
            prop_assert_eq!(
                first.latency_ms,
                DurationUnit::from_suffix(unit).to_millis(f64::from(millis))
            );
        }
    }
}
