// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The byte-stream entry point of the pipeline.
//!
//! [`LogSink`] implements [`std::io::Write`] and
//! [`tracing_subscriber::fmt::MakeWriter`], so it can sit behind any logging
//! facility that writes one line per call. A write parses the line, builds the
//! entry and queues it for the aggregator; it never waits for the network and
//! never reports shipping failures.

use std::future::Future;
use std::io;
use std::sync::Arc;

use chrono::Utc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing_subscriber::fmt::MakeWriter;

use crate::aggregator_service::{AggregatorHandle, AggregatorService, FlushResponse};
use crate::config::Config;
use crate::entry::{LogEntry, LogTypes};
use crate::errors::ConfigError;
use crate::flusher::Flusher;

#[derive(Clone, Debug)]
pub struct LogSink {
    handle: AggregatorHandle,
    log_types: Arc<LogTypes>,
}

impl LogSink {
    pub fn new(handle: AggregatorHandle, log_types: LogTypes) -> Self {
        LogSink {
            handle,
            log_types: Arc::new(log_types),
        }
    }

    /// Starts the aggregator for `config` on the current tokio runtime.
    ///
    /// The aggregator stops when `cancel_token` is cancelled, when
    /// [`LogSink::shutdown`] is called, or when every sink clone is dropped;
    /// in all cases it flushes what it holds first. Await the returned
    /// handle to wait for that final flush.
    pub fn spawn(
        config: &Config,
        cancel_token: CancellationToken,
    ) -> Result<(Self, JoinHandle<()>), ConfigError> {
        config.validate()?;
        let flusher = Flusher::new(config);
        let (service, handle) = AggregatorService::new(
            Arc::new(flusher),
            config.flush_interval,
            config.flush_timeout,
            cancel_token,
        );
        let task = tokio::spawn(service.run());
        Ok((LogSink::new(handle, config.log_types()), task))
    }

    /// Queues one line. Returns the number of bytes accepted.
    ///
    /// Fails only when the aggregator has stopped.
    pub fn write_line(&self, line: &[u8]) -> io::Result<usize> {
        if line.is_empty() {
            return Ok(0);
        }
        let entry = LogEntry::from_line(line, &self.log_types, Utc::now());
        self.handle
            .insert(entry)
            .map_err(|e| io::Error::new(io::ErrorKind::BrokenPipe, e))?;
        Ok(line.len())
    }

    pub fn log_types(&self) -> &LogTypes {
        &self.log_types
    }

    pub fn handle(&self) -> &AggregatorHandle {
        &self.handle
    }

    /// Ships everything queued so far without waiting for the next tick.
    pub async fn flush_pending(&self) -> Result<FlushResponse, String> {
        self.handle.flush().await
    }

    pub fn shutdown(&self) {
        // Already stopped if this fails; nothing left to do.
        let _ = self.handle.shutdown();
    }

    /// Writes every newline-separated line of `input` into the sink and
    /// echoes it to `echo`, until the input ends or `stop` completes.
    ///
    /// `stop` is polled across the whole loop, so a stop request raised while
    /// a line is being echoed is not missed. Echo failures are ignored; a read
    /// failure or a stopped aggregator ends the loop with an error.
    pub async fn forward_lines<R, W, F>(&self, input: R, mut echo: W, stop: F) -> io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
        F: Future<Output = ()>,
    {
        let mut lines = input.split(b'\n');
        tokio::pin!(stop);

        loop {
            tokio::select! {
                segment = lines.next_segment() => match segment? {
                    Some(line) => {
                        self.write_line(&line)?;
                        if let Err(e) = echo_line(&mut echo, &line).await {
                            debug!("OMS | Failed to echo line: {e}");
                        }
                    }
                    None => {
                        debug!("OMS | Reached end of input");
                        break;
                    }
                },
                () = &mut stop => {
                    debug!("OMS | Stop requested, no longer reading input");
                    break;
                }
            }
        }

        if let Err(e) = echo.flush().await {
            debug!("OMS | Failed to flush echo output: {e}");
        }
        Ok(())
    }
}

async fn echo_line<W: AsyncWrite + Unpin>(echo: &mut W, line: &[u8]) -> io::Result<()> {
    echo.write_all(line).await?;
    echo.write_all(b"\n").await
}

impl io::Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_line(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Write for &LogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_line(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogSink {
    type Writer = &'a LogSink;

    fn make_writer(&'a self) -> Self::Writer {
        self
    }
}
