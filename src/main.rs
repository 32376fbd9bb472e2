// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use clap::Parser;
use genisys_master::config::CliConfig;
use genisys_master::error::GenisysError;
use genisys_master::facade::InMemoryFacade;
use genisys_master::observability::TracingSink;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = CliConfig::parse();
    let config = cli.into_config().map_err(GenisysError::from)?;

    let facade = Arc::new(InMemoryFacade::new());
    let sink = Arc::new(TracingSink);
    let shutdown = CancellationToken::new();

    let shutdown_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received shutdown signal");
            shutdown_signal.cancel();
        }
    });

    genisys_master::run(config, facade, sink, shutdown).await
}
