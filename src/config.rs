// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Programmatic configuration (§6). The core never parses files or
//! environment variables itself — only [`CliConfig`] (consumed by the
//! binary's composition root, `src/main.rs`) does that, the same way the
//! teacher's `MuxConfig` is a `clap::Args` struct that the binary parses
//! before handing a plain value into library code.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::message::Station;

/// Validated, fixed-shape configuration consumed by the composition
/// root. Construct via [`Config::new`], which fails fast per §7
/// "Configuration errors".
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: SocketAddr,
    pub stations: BTreeMap<Station, SocketAddr>,
    pub secure_polls: bool,
    pub control_checkback_enabled: bool,
    pub response_timeout: Duration,
    pub poll_min_gap: Duration,
    pub recall_min_gap: Duration,
    pub recall_backoff: Duration,
    pub control_coalesce_window: Duration,
    pub max_outstanding_per_station: usize,
    /// Supplemented (SPEC_FULL.md §B.5): `Some(capacity)` selects the
    /// bounded event-queue variant with drop-and-report on duplicate
    /// `ResponseTimeout`s; `None` keeps the unbounded default.
    pub bounded_queue_capacity: Option<usize>,
}

impl Config {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bind: SocketAddr,
        stations: BTreeMap<Station, SocketAddr>,
        secure_polls: bool,
        control_checkback_enabled: bool,
        response_timeout: Duration,
        poll_min_gap: Duration,
        recall_min_gap: Duration,
        recall_backoff: Duration,
        control_coalesce_window: Duration,
        bounded_queue_capacity: Option<usize>,
    ) -> Result<Self, ConfigError> {
        if stations.is_empty() {
            return Err(ConfigError::EmptyStationSet);
        }
        for duration in [
            response_timeout,
            poll_min_gap,
            recall_min_gap,
            recall_backoff,
            control_coalesce_window,
        ] {
            if duration.is_zero() {
                return Err(ConfigError::NonPositiveDuration("timing policy field"));
            }
        }
        Ok(Self {
            bind,
            stations,
            secure_polls,
            control_checkback_enabled,
            response_timeout,
            poll_min_gap,
            recall_min_gap,
            recall_backoff,
            control_coalesce_window,
            max_outstanding_per_station: 1,
            bounded_queue_capacity,
        })
    }

    pub fn station_list(&self) -> Vec<Station> {
        self.stations.keys().copied().collect()
    }
}

/// CLI/env-derived configuration for the `genisys-masterd` binary,
/// mirroring the teacher's `MuxConfig` (`clap::Args`, `env = "..."`,
/// duration helper methods).
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "genisys-masterd", about = "GENISYS wayside master controller")]
pub struct CliConfig {
    /// Comma-separated `station:host:port` triples, e.g. `1:10.0.0.1:5000`.
    #[arg(long, env = "GENISYS_STATIONS")]
    pub stations: String,

    /// Send secure (CRC-bearing) polls.
    #[arg(long, default_value_t = false, env = "GENISYS_SECURE_POLLS")]
    pub secure_polls: bool,

    /// Enable control checkback.
    #[arg(long, default_value_t = false, env = "GENISYS_CHECKBACK")]
    pub control_checkback_enabled: bool,

    /// Response timeout in milliseconds.
    #[arg(long, default_value_t = 500, env = "GENISYS_RESPONSE_TIMEOUT_MS")]
    pub response_timeout_ms: u64,

    /// Minimum gap between polls in milliseconds.
    #[arg(long, default_value_t = 50, env = "GENISYS_POLL_MIN_GAP_MS")]
    pub poll_min_gap_ms: u64,

    /// Minimum gap between recalls in milliseconds.
    #[arg(long, default_value_t = 200, env = "GENISYS_RECALL_MIN_GAP_MS")]
    pub recall_min_gap_ms: u64,

    /// Backoff applied between repeated recall attempts, in milliseconds.
    #[arg(long, default_value_t = 1000, env = "GENISYS_RECALL_BACKOFF_MS")]
    pub recall_backoff_ms: u64,

    /// Control delivery coalescing window in milliseconds.
    #[arg(long, default_value_t = 100, env = "GENISYS_CONTROL_COALESCE_MS")]
    pub control_coalesce_window_ms: u64,

    /// Local UDP bind address.
    #[arg(long, default_value = "0.0.0.0:0", env = "GENISYS_BIND")]
    pub bind: SocketAddr,

    /// Bounded event queue capacity (0 = unbounded).
    #[arg(long, default_value_t = 0, env = "GENISYS_QUEUE_CAPACITY")]
    pub queue_capacity: usize,
}

impl CliConfig {
    pub fn parse_stations(&self) -> Result<BTreeMap<Station, SocketAddr>, ConfigError> {
        let mut map = BTreeMap::new();
        for triple in self.stations.split(',').filter(|s| !s.trim().is_empty()) {
            let mut parts = triple.splitn(2, ':');
            let id_str = parts.next().unwrap_or_default();
            let addr_str = parts.next().unwrap_or_default();
            let id: u16 = id_str
                .trim()
                .parse()
                .map_err(|_| ConfigError::StationOutOfRange(0))?;
            if id == 0 || id > 255 {
                return Err(ConfigError::StationOutOfRange(id));
            }
            let station = Station::new(id as u8).ok_or(ConfigError::StationOutOfRange(id))?;
            let addr: SocketAddr =
                addr_str.trim().parse().map_err(|_| ConfigError::StationOutOfRange(id))?;
            if map.insert(station, addr).is_some() {
                return Err(ConfigError::DuplicateStation(station.get()));
            }
        }
        Ok(map)
    }

    pub fn into_config(self) -> Result<Config, ConfigError> {
        let stations = self.parse_stations()?;
        Config::new(
            self.bind,
            stations,
            self.secure_polls,
            self.control_checkback_enabled,
            Duration::from_millis(self.response_timeout_ms),
            Duration::from_millis(self.poll_min_gap_ms),
            Duration::from_millis(self.recall_min_gap_ms),
            Duration::from_millis(self.recall_backoff_ms),
            Duration::from_millis(self.control_coalesce_window_ms),
            (self.queue_capacity > 0).then_some(self.queue_capacity),
        )
    }
}
