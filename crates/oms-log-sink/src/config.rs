// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::time::Duration;

use tracing::warn;

use crate::entry::LogTypes;
use crate::errors::ConfigError;

/// Resource path covered by the request signature.
pub const RESOURCE: &str = "/api/logs";
const API_VERSION: &str = "2016-04-01";

const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct Config {
    pub customer_id: String,
    /// Base64-encoded workspace shared key.
    pub shared_key: String,
    pub log_type_prefix: String,
    /// How often pending batches are shipped.
    pub flush_interval: Duration,
    /// Timeout for each POST to the intake.
    pub flush_timeout: Duration,
    /// Full intake URL; derived from the customer id when unset.
    pub intake_url: Option<String>,
    pub https_proxy: Option<String>,
}

impl Config {
    pub fn new(customer_id: &str, shared_key: &str, log_type_prefix: &str) -> Self {
        Config {
            customer_id: customer_id.to_string(),
            shared_key: shared_key.to_string(),
            log_type_prefix: log_type_prefix.to_string(),
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            flush_timeout: DEFAULT_FLUSH_TIMEOUT,
            intake_url: None,
            https_proxy: None,
        }
    }

    /// Reads the configuration from `OMS_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let mut config = Config::new(
            &required("OMS_CUSTOMER_ID")?,
            &required("OMS_SHARED_KEY")?,
            &required("OMS_LOG_TYPE")?,
        );
        config.flush_interval =
            read_secs(&lookup, "OMS_FLUSH_INTERVAL_SECS", DEFAULT_FLUSH_INTERVAL);
        config.flush_timeout = read_secs(&lookup, "OMS_FLUSH_TIMEOUT_SECS", DEFAULT_FLUSH_TIMEOUT);
        config.intake_url = lookup("OMS_URL");
        config.https_proxy = lookup("OMS_PROXY_HTTPS").or_else(|| lookup("HTTPS_PROXY"));

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.flush_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "flush interval must be greater than zero".to_string(),
            ));
        }
        if self.flush_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "flush timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn log_types(&self) -> LogTypes {
        LogTypes::from_prefix(&self.log_type_prefix)
    }

    pub fn intake_url(&self) -> String {
        self.intake_url.clone().unwrap_or_else(|| {
            format!(
                "https://{}.ods.opinsights.azure.com{RESOURCE}?api-version={API_VERSION}",
                self.customer_id
            )
        })
    }
}

fn read_secs<F>(lookup: &F, name: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => default,
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(secs) => Duration::from_secs(secs),
            Err(_) => {
                warn!("OMS | Ignoring {name}={raw}: not a number of seconds");
                default
            }
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("OMS_CUSTOMER_ID", "workspace"),
        ("OMS_SHARED_KEY", "c2VjcmV0"),
        ("OMS_LOG_TYPE", "MYAPP"),
    ];

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(config.flush_interval, Duration::from_secs(60));
        assert_eq!(config.flush_timeout, Duration::from_secs(10));
        assert_eq!(config.https_proxy, None);
        assert_eq!(
            config.intake_url(),
            "https://workspace.ods.opinsights.azure.com/api/logs?api-version=2016-04-01"
        );
        assert_eq!(config.log_types().logs.as_str(), "MYAPP_LOGS");
        assert_eq!(config.log_types().http.as_str(), "MYAPP_HTTP");
    }

    #[test]
    fn test_missing_variable() {
        let result = Config::from_lookup(lookup(&REQUIRED[..2]));
        assert_eq!(result.unwrap_err(), ConfigError::Missing("OMS_LOG_TYPE"));

        let mut vars = REQUIRED.to_vec();
        vars[0] = ("OMS_CUSTOMER_ID", "  ");
        let result = Config::from_lookup(lookup(&vars));
        assert_eq!(result.unwrap_err(), ConfigError::Missing("OMS_CUSTOMER_ID"));
    }

    #[test]
    fn test_overrides() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("OMS_FLUSH_INTERVAL_SECS", "5"),
            ("OMS_FLUSH_TIMEOUT_SECS", "2"),
            ("OMS_URL", "http://127.0.0.1:9000/api/logs"),
            ("HTTPS_PROXY", "http://proxy:3128"),
        ]);
        let config = Config::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.flush_interval, Duration::from_secs(5));
        assert_eq!(config.flush_timeout, Duration::from_secs(2));
        assert_eq!(config.intake_url(), "http://127.0.0.1:9000/api/logs");
        assert_eq!(config.https_proxy.as_deref(), Some("http://proxy:3128"));
    }

    #[test]
    fn test_unparsable_interval_falls_back() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("OMS_FLUSH_INTERVAL_SECS", "soon"));
        let config = Config::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.flush_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("OMS_FLUSH_INTERVAL_SECS", "0"));
        assert!(matches!(
            Config::from_lookup(lookup(&vars)),
            Err(ConfigError::Invalid(_))
        ));
    }
}
