// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Controller state (§3, §4.3): immutable snapshots, replaced atomically
//! by the driver after each reducer step. The reducer never mutates a
//! `ControllerState` in place — `with_*` methods return a new value
//! sharing untouched slave records (spec.md §9 "immutable snapshots over
//! in-place mutation").

use std::collections::BTreeMap;
use std::time::Instant;

use crate::message::Station;

/// Global controller phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalState {
    TransportDown,
    Initializing,
    Running,
}

/// Per-slave phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Recall,
    SendControls,
    Poll,
    Failed,
}

/// User-visible connectivity status, derived from state (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Disconnected,
    Degraded,
    Connected,
}

/// Per-slave state.
#[derive(Debug, Clone, PartialEq)]
pub struct SlaveState {
    pub station: Station,
    pub phase: Phase,
    pub consecutive_failures: u32,
    pub ack_pending: bool,
    pub control_pending: bool,
    pub last_activity_tick: Instant,
    pub initial_recall_completed: bool,
}

impl SlaveState {
    fn new_recall(station: Station, ts: Instant) -> Self {
        Self {
            station,
            phase: Phase::Recall,
            consecutive_failures: 0,
            ack_pending: false,
            control_pending: false,
            last_activity_tick: ts,
            initial_recall_completed: false,
        }
    }
}

/// The full controller snapshot (§3).
#[derive(Debug, Clone)]
pub struct ControllerState {
    pub global: GlobalState,
    pub slaves: BTreeMap<Station, SlaveState>,
    pub last_transition_tick: Instant,
    /// Mirrors `Config::control_checkback_enabled` (§4.5, §6 "Checkback").
    /// Fixed for the life of a run, same as the slave universe — carried
    /// on the snapshot rather than threaded separately since the reducer
    /// takes no config parameter of its own.
    pub control_checkback_enabled: bool,
}

impl ControllerState {
    /// Seed all configured stations in `Recall`, global `Initializing`
    /// (§4.3 `initializing`).
    pub fn initializing(stations: &[Station], ts: Instant) -> Self {
        let slaves = stations.iter().map(|&s| (s, SlaveState::new_recall(s, ts))).collect();
        Self {
            global: GlobalState::Initializing,
            slaves,
            last_transition_tick: ts,
            control_checkback_enabled: false,
        }
    }

    /// Set the checkback policy flag, sharing all slave records.
    pub fn with_control_checkback_enabled(&self, enabled: bool) -> Self {
        Self { control_checkback_enabled: enabled, ..self.clone() }
    }

    /// Replace the global phase, sharing all slave records.
    pub fn with_global_state(&self, global: GlobalState, ts: Instant) -> Self {
        Self {
            global,
            slaves: self.slaves.clone(),
            last_transition_tick: ts,
            control_checkback_enabled: self.control_checkback_enabled,
        }
    }

    /// Replace a single slave's state, sharing all other slave records.
    pub fn with_slave_state(&self, slave: SlaveState, ts: Instant) -> Self {
        let mut slaves = self.slaves.clone();
        slaves.insert(slave.station, slave);
        Self {
            global: self.global,
            slaves,
            last_transition_tick: ts,
            control_checkback_enabled: self.control_checkback_enabled,
        }
    }

    pub fn next_station_after(&self, station: Station) -> Option<Station> {
        let mut iter = self.slaves.keys().copied().cycle();
        iter.find(|&s| s == station)?;
        iter.next()
    }

    /// `mapToStatus` (§4.3).
    pub fn status(&self) -> Status {
        match self.global {
            GlobalState::TransportDown | GlobalState::Initializing => Status::Disconnected,
            GlobalState::Running => {
                if self.slaves.values().all(|s| s.phase != Phase::Failed) {
                    Status::Connected
                } else if self.slaves.values().all(|s| s.phase == Phase::Failed) {
                    Status::Disconnected
                } else {
                    Status::Degraded
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn st(n: u8) -> Station {
        Station::new(n).unwrap()
    }

    #[test]
    fn status_degraded_when_one_of_two_failed() {
        let now = Instant::now();
        let mut state = ControllerState::initializing(&[st(1), st(2)], now);
        state = state.with_global_state(GlobalState::Running, now);
        let mut slave = state.slaves[&st(1)].clone();
        slave.phase = Phase::Failed;
        state = state.with_slave_state(slave, now);
        assert_eq!(state.status(), Status::Degraded);
        // Untouched slave record is shared, not recreated.
        assert_eq!(state.slaves[&st(2)].phase, Phase::Recall);
    }

    #[test]
    fn status_disconnected_while_initializing() {
        let now = Instant::now();
        let state = ControllerState::initializing(&[st(1)], now);
        assert_eq!(state.status(), Status::Disconnected);
    }

    #[test]
    fn next_station_wraps_around() {
        let now = Instant::now();
        let state = ControllerState::initializing(&[st(1), st(2), st(3)], now);
        assert_eq!(state.next_station_after(st(1)), Some(st(2)));
        assert_eq!(state.next_station_after(st(3)), Some(st(1)));
    }
}
