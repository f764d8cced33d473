// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Shared-key request signing for the data collector API.
//!
//! The signature is an HMAC-SHA256 over
//! `METHOD\nCONTENT_LENGTH\nCONTENT_TYPE\nx-ms-date:DATE\nRESOURCE`, keyed with
//! the base64-decoded workspace key, and sent as
//! `Authorization: SharedKey <customer_id>:<base64 digest>`.

use std::fmt::Debug;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Per-request values covered by the signature. Build a new one for every
/// request: the date changes every second and the length changes per body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningContext<'a> {
    pub method: &'a str,
    pub content_length: usize,
    pub content_type: &'a str,
    pub date: &'a str,
    pub resource: &'a str,
}

impl SigningContext<'_> {
    fn string_to_sign(&self) -> String {
        format!(
            "{}\n{}\n{}\nx-ms-date:{}\n{}",
            self.method, self.content_length, self.content_type, self.date, self.resource
        )
    }
}

/// Workspace credentials: the customer (workspace) id and the decoded key.
#[derive(Clone)]
pub struct SharedKey {
    customer_id: String,
    key: Vec<u8>,
}

impl SharedKey {
    /// Decodes `shared_key_base64`. A key that is not valid base64 becomes an
    /// empty key: requests are still signed and the intake rejects them.
    pub fn new(customer_id: &str, shared_key_base64: &str) -> Self {
        let key = STANDARD.decode(shared_key_base64).unwrap_or_else(|e| {
            warn!("OMS | Shared key is not valid base64 ({e}), signing with an empty key");
            Vec::new()
        });
        SharedKey {
            customer_id: customer_id.to_string(),
            key,
        }
    }

    pub fn customer_id(&self) -> &str {
        &self.customer_id
    }

    /// Returns the `Authorization` header value for `context`.
    pub fn authorization(&self, context: &SigningContext<'_>) -> String {
        format!("SharedKey {}:{}", self.customer_id, self.sign(context))
    }

    fn sign(&self, context: &SigningContext<'_>) -> String {
        // HMAC accepts keys of any length, new_from_slice cannot fail here.
        HmacSha256::new_from_slice(&self.key).map_or_else(
            |_| String::new(),
            |mut mac| {
                mac.update(context.string_to_sign().as_bytes());
                STANDARD.encode(mac.finalize().into_bytes())
            },
        )
    }
}

impl Debug for SharedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SharedKey({})", self.customer_id)
    }
}

/// Builds the `Authorization` header value in one call.
pub fn build_signature(
    shared_key_base64: &str,
    customer_id: &str,
    date: &str,
    content_length: usize,
    method: &str,
    content_type: &str,
    resource: &str,
) -> String {
    SharedKey::new(customer_id, shared_key_base64).authorization(&SigningContext {
        method,
        content_length,
        content_type,
        date,
        resource,
    })
}

/// Formats `now` as the RFC 1123 date expected in `x-ms-date`, with `GMT`
/// as the zone name since the intake does not accept `UTC`.
pub fn rfc1123_date(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
