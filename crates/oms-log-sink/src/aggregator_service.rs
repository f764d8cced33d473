// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Actor-based batching of log entries.
//!
//! A single service task owns the map from log type to pending entries.
//! Producers only hold a cloneable [`AggregatorHandle`] and send commands over
//! an unbounded channel, so inserting never waits on the network:
//!
//! ```text
//!    ┌──────────────┐
//!    │   Handles    │ (LogSink writers)
//!    └──────┬───────┘
//!           │ Commands via channel
//!           v
//!    ┌──────────────┐   tick / Flush   ┌──────────────┐
//!    │   Service    │ ───────────────> │   Shipper    │
//!    │ (owns map)   │                  └──────────────┘
//!    └──────────────┘
//! ```
//!
//! Every non-empty batch is handed to the shipper once and then cleared,
//! whether or not the shipment succeeded. Delivery is at most once.
//!
//! On shutdown (command, cancellation, or every handle dropped) the service
//! drains entries already queued in the channel, flushes once more and stops.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::entry::{LogEntry, LogType};
use crate::errors::{AggregatorClosed, ShippingError};
use crate::flusher::Shipper;

#[derive(Debug)]
pub enum AggregatorCommand {
    Insert(LogEntry),
    /// Flush all pending batches now and report the outcome.
    Flush(oneshot::Sender<FlushResponse>),
    Shutdown,
}

/// Outcome of one flush across all log types.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FlushResponse {
    pub shipped_batches: usize,
    pub shipped_entries: usize,
    pub failed_batches: usize,
    pub dropped_entries: usize,
}

impl FlushResponse {
    fn merge(&mut self, other: &FlushResponse) {
        self.shipped_batches += other.shipped_batches;
        self.shipped_entries += other.shipped_entries;
        self.failed_batches += other.failed_batches;
        self.dropped_entries += other.dropped_entries;
    }
}

#[derive(Clone, Debug)]
pub struct AggregatorHandle {
    tx: mpsc::UnboundedSender<AggregatorCommand>,
}

impl AggregatorHandle {
    pub fn insert(&self, entry: LogEntry) -> Result<(), AggregatorClosed> {
        self.tx
            .send(AggregatorCommand::Insert(entry))
            .map_err(|_| AggregatorClosed)
    }

    pub async fn flush(&self) -> Result<FlushResponse, String> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(AggregatorCommand::Flush(response_tx))
            .map_err(|e| format!("Failed to send flush command: {e}"))?;

        response_rx
            .await
            .map_err(|e| format!("Failed to receive flush response: {e}"))
    }

    pub fn shutdown(&self) -> Result<(), AggregatorClosed> {
        self.tx
            .send(AggregatorCommand::Shutdown)
            .map_err(|_| AggregatorClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

pub struct AggregatorService {
    batches: HashMap<LogType, Vec<LogEntry>>,
    rx: mpsc::UnboundedReceiver<AggregatorCommand>,
    shipper: Arc<dyn Shipper>,
    flush_interval: Duration,
    ship_timeout: Duration,
    cancel_token: CancellationToken,
}

impl AggregatorService {
    #[must_use]
    pub fn new(
        shipper: Arc<dyn Shipper>,
        flush_interval: Duration,
        ship_timeout: Duration,
        cancel_token: CancellationToken,
    ) -> (Self, AggregatorHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let service = Self {
            batches: HashMap::new(),
            rx,
            shipper,
            flush_interval,
            ship_timeout,
            cancel_token,
        };
        let handle = AggregatorHandle { tx };

        (service, handle)
    }

    pub async fn run(mut self) {
        debug!("OMS | Aggregator service started");

        let mut flush_interval = interval(self.flush_interval);
        flush_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        flush_interval.tick().await; // discard first tick, which is instantaneous

        loop {
            // Ticks are polled before commands so a steady stream of inserts
            // cannot postpone a flush.
            tokio::select! {
                biased;
                () = self.cancel_token.cancelled() => {
                    debug!("OMS | Aggregator service cancelled");
                    break;
                }
                _ = flush_interval.tick() => {
                    self.flush_all().await;
                }
                command = self.rx.recv() => match command {
                    Some(AggregatorCommand::Insert(entry)) => self.insert(entry),
                    Some(AggregatorCommand::Flush(response_tx)) => {
                        let response = self.flush_all().await;
                        if response_tx.send(response).is_err() {
                            error!("OMS | Failed to send flush response - receiver dropped");
                        }
                    }
                    Some(AggregatorCommand::Shutdown) => {
                        debug!("OMS | Aggregator service shutting down");
                        break;
                    }
                    None => {
                        debug!("OMS | All aggregator handles dropped");
                        break;
                    }
                },
            }
        }

        self.drain_and_flush().await;
        debug!("OMS | Aggregator service stopped");
    }

    fn insert(&mut self, entry: LogEntry) {
        self.batches
            .entry(entry.log_type().clone())
            .or_default()
            .push(entry);
    }

    /// Stops intake, keeps whatever was already queued and flushes it.
    async fn drain_and_flush(&mut self) {
        self.rx.close();
        let mut waiting = Vec::new();
        while let Ok(command) = self.rx.try_recv() {
            match command {
                AggregatorCommand::Insert(entry) => self.insert(entry),
                AggregatorCommand::Flush(response_tx) => waiting.push(response_tx),
                AggregatorCommand::Shutdown => {}
            }
        }

        let response = self.flush_all().await;
        for response_tx in waiting {
            let _ = response_tx.send(response.clone());
        }
    }

    async fn flush_all(&mut self) -> FlushResponse {
        let mut response = FlushResponse::default();
        for (log_type, entries) in &mut self.batches {
            if entries.is_empty() {
                continue;
            }
            let capacity = entries.len();
            let batch = std::mem::replace(entries, Vec::with_capacity(capacity));
            let outcome =
                ship_batch(self.shipper.as_ref(), self.ship_timeout, log_type, batch).await;
            response.merge(&outcome);
        }
        if response != FlushResponse::default() {
            debug!("OMS | Flush finished: {response:?}");
        }
        response
    }
}

async fn ship_batch(
    shipper: &dyn Shipper,
    ship_timeout: Duration,
    log_type: &LogType,
    batch: Vec<LogEntry>,
) -> FlushResponse {
    let result = match timeout(ship_timeout, shipper.ship(log_type, &batch)).await {
        Ok(result) => result,
        Err(_) => Err(ShippingError::Timeout(ship_timeout)),
    };

    match result {
        Ok(()) => FlushResponse {
            shipped_batches: 1,
            shipped_entries: batch.len(),
            ..FlushResponse::default()
        },
        Err(e) => {
            error!(
                "OMS | Failed to send {} log entries to {log_type}, dropping them: {e}",
                batch.len()
            );
            FlushResponse {
                failed_batches: 1,
                dropped_entries: batch.len(),
                ..FlushResponse::default()
            }
        }
    }
}
