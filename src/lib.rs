// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! GENISYS wayside master controller core.
//!
//! The crate is organized the way spec.md §2 lays it out: a pure
//! reducer (`reducer`, `events`, `state`), a wire codec (`codec`,
//! `frame`, `message`), a single-threaded driver tying them to I/O
//! (`driver`, `executor`, `transport`, `scheduler`, `tracker`), and the
//! external collaborators the core depends on but does not implement
//! (`facade`, `observability`). `config` and `main.rs` make up the
//! composition root.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod codec;
pub mod config;
pub mod driver;
pub mod error;
pub mod events;
pub mod executor;
pub mod facade;
pub mod frame;
pub mod message;
pub mod observability;
pub mod reducer;
pub mod scheduler;
pub mod state;
pub mod tracker;
pub mod transport;

use std::sync::{Arc, Mutex as StdMutex};

use tokio_util::sync::CancellationToken;

use crate::codec::{BitPackedPayloadCodec, PayloadCodec};
use crate::config::Config;
use crate::driver::Driver;
use crate::error::GenisysError;
use crate::executor::Executor;
use crate::facade::ControlIndicationFacade;
use crate::observability::ObservabilitySink;
use crate::state::ControllerState;
use crate::tracker::ActivityTracker;
use crate::transport::{Transport, UdpTransport};

/// Wires every collaborator together and runs the controller until
/// `shutdown` is cancelled. Mirrors the teacher's `lib.rs::run()`
/// composition root: parse config happens in `main.rs`; this function
/// takes an already-validated [`Config`].
pub async fn run(
    config: Config,
    facade: Arc<dyn ControlIndicationFacade>,
    sink: Arc<dyn ObservabilitySink>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let config = Arc::new(config);
    let codec: Arc<dyn PayloadCodec> = Arc::new(BitPackedPayloadCodec);

    let mut driver = Driver::new(config.bounded_queue_capacity, Arc::clone(&codec), Arc::clone(&sink));
    driver.shutdown = shutdown.clone();

    let listener: Arc<dyn crate::transport::TransportListener> = driver.queue.clone();
    let transport: Arc<dyn Transport> = Arc::new(
        UdpTransport::bind(config.bind, config.stations.clone(), listener, shutdown.clone())
            .await
            .map_err(|e| GenisysError::Transport(e.to_string()))?,
    );

    let activity = Arc::new(StdMutex::new(ActivityTracker::new()));
    let scheduler = Arc::new(crate::scheduler::TimeoutScheduler::new(driver.queue.sender(), Arc::clone(&sink)));

    let executor = Arc::new(Executor::new(
        Arc::clone(&config),
        transport,
        Arc::clone(&facade),
        Arc::clone(&sink),
        codec,
        scheduler,
        Arc::clone(&activity),
    ));

    let initial = ControllerState::initializing(&config.station_list(), std::time::Instant::now())
        .with_control_checkback_enabled(config.control_checkback_enabled);

    driver.run(initial, executor, facade, activity, sink).await;
    Ok(())
}
