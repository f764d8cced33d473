// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-process log sink for the Azure Log Analytics (OMS) data collector API.
//!
//! Lines written to a [`LogSink`] are classified as Gin access-log lines or
//! plain messages, turned into [`LogEntry`] values, batched per log type by a
//! single aggregator task and shipped on a fixed interval as signed JSON POSTs.
//! Delivery is best effort: a batch is attempted once and then discarded.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod access_log;
pub mod aggregator_service;
pub mod config;
pub mod entry;
pub mod errors;
pub mod flusher;
pub mod http;
pub mod signature;
pub mod sink;

pub use config::Config;
pub use entry::{EntryOptions, LogEntry, LogType, LogTypes};
pub use sink::LogSink;
