// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error types for the log sink pipeline.

use reqwest::StatusCode;

/// Error returned when a line cannot be classified as an access-log line.
///
/// This is a classification outcome rather than a failure: callers route the
/// line to the plain-message stream.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("line is not an access-log line")]
    NotAccessLog,
}

/// Errors that can occur while shipping one batch to the intake endpoint.
#[derive(Debug, thiserror::Error)]
pub enum ShippingError {
    /// The batch could not be serialized into a request body.
    #[error("failed to prepare payload: {0}")]
    Payload(String),

    /// The request could not be built or sent (connect error, timeout, ...).
    #[error("failed to send request: {0}")]
    Request(String),

    /// The shipment did not complete within the allotted time.
    #[error("shipment timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The endpoint answered with a non-success status.
    #[error("intake responded with {0}: {1}")]
    Destination(StatusCode, String),
}

/// Returned by the aggregator handle once the service has stopped.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("log aggregator has stopped")]
pub struct AggregatorClosed;

/// Errors raised while building a [`crate::config::Config`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} environment variable is not set")]
    Missing(&'static str),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ConfigError::Missing("OMS_CUSTOMER_ID");
        assert_eq!(
            error.to_string(),
            "OMS_CUSTOMER_ID environment variable is not set"
        );

        let error = ShippingError::Destination(StatusCode::FORBIDDEN, "denied".to_string());
        assert_eq!(
            error.to_string(),
            "intake responded with 403 Forbidden: denied"
        );
    }

    #[test]
    fn test_error_debug() {
        let error = ParseError::NotAccessLog;
        let debug_str = format!("{:?}", error);
        assert!(debug_str.contains("NotAccessLog"));
    }
}
