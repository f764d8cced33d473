// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Forwards lines read from stdin to Azure Log Analytics, echoing them to
//! stdout. Meant to sit at the end of a pipe: `my-server | oms-forward`.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::env;

use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use oms_log_sink::{Config, LogSink};

#[tokio::main]
pub async fn main() {
    let log_level = env::var("OMS_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    let env_filter = format!("h2=off,hyper=off,rustls=off,reqwest=off,{}", log_level);

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_writer(std::io::stderr)
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("OMS | Error creating config: {e}");
            return;
        }
    };

    let cancel_token = CancellationToken::new();
    let (sink, aggregator_task) = match LogSink::spawn(&config, cancel_token.clone()) {
        Ok(spawned) => spawned,
        Err(e) => {
            error!("OMS | Error starting log sink: {e}");
            return;
        }
    };
    info!(
        "OMS | Forwarding stdin to {} and {} every {:?}",
        sink.log_types().logs,
        sink.log_types().http,
        config.flush_interval
    );

    let interrupted = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("OMS | Interrupted, shipping pending logs"),
            Err(e) => {
                error!("OMS | Unable to listen for Ctrl-C: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    if let Err(e) = sink.forward_lines(stdin, stdout, interrupted).await {
        error!("OMS | Stopped forwarding stdin: {e}");
    }

    cancel_token.cancel();
    if let Err(e) = aggregator_task.await {
        error!("OMS | Aggregator task failed: {e}");
    }
}
