// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Events (reducer inputs) and intents (reducer outputs), §4.2. Both are
//! closed, immutable sums — adding a variant is a type-system-enforced
//! breaking change, matching spec.md §9 "tagged variants over
//! inheritance".

use std::time::Instant;

use crate::message::{ControlSet, Message, Station};

/// Inputs to the reducer.
#[derive(Debug, Clone)]
pub enum Event {
    TransportUp { ts: Instant },
    TransportDown { ts: Instant },
    MessageReceived { ts: Instant, station: Station, msg: Message },
    ResponseTimeout { ts: Instant, station: Station },
    /// `delta` names the signals that changed in this update; `full` is
    /// the complete materialized control set at the time of the event.
    /// Neither is load-bearing for the reducer's transition (it only
    /// needs to know *that* controls changed, setting `controlPending`);
    /// both are carried through to the observability sink so it can
    /// report what changed, and `full` is what the executor's
    /// `SendControls` later re-reads from the façade anyway.
    ControlIntentChanged { ts: Instant, delta: Vec<u16>, full: ControlSet },
}

impl Event {
    /// The station this event is addressed to, if any (transport
    /// lifecycle and control-intent events are global).
    pub fn station(&self) -> Option<Station> {
        match self {
            Self::MessageReceived { station, .. } | Self::ResponseTimeout { station, .. } => {
                Some(*station)
            }
            Self::TransportUp { .. } | Self::TransportDown { .. } | Self::ControlIntentChanged { .. } => {
                None
            }
        }
    }
}

/// Edge-triggered outputs of a single reducer step (§4.2, §4.5). Several
/// kinds can be set in the same step; [`Intents::target_station`] is
/// `None` only when no per-station kind is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Intents {
    pub begin_initialization: bool,
    pub suspend_all: bool,
    pub retry_current: bool,
    pub schedule_control_delivery: bool,
    pub send_recall: bool,
    pub send_controls: bool,
    pub poll_next: bool,
    /// Commit previously delivered controls after a verified checkback
    /// echo (§4.5 SendControls bullet, §6 "Checkback"). Only emitted when
    /// `ControllerState::control_checkback_enabled` is set.
    pub execute_controls: bool,
    /// The station a per-station intent kind (`send_recall`,
    /// `send_controls`, `poll_next`, `retry_current`, `execute_controls`)
    /// targets. Combining
    /// two per-station intents for *different* concrete stations in one
    /// step is a programming error (§4.2) — enforced by
    /// [`Intents::set_target`] panicking in debug builds.
    target_station: Option<Station>,
}

impl Intents {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn target_station(&self) -> Option<Station> {
        self.target_station
    }

    /// Record that a per-station intent targets `station`. Panics if a
    /// different station was already targeted this step — reducer code
    /// should never construct conflicting intents (§4.2).
    #[allow(clippy::panic)]
    fn set_target(&mut self, station: Station) {
        match self.target_station {
            None => self.target_station = Some(station),
            Some(existing) if existing == station => {}
            Some(existing) => {
                panic!("conflicting intent targets: {existing} and {station} in one reducer step")
            }
        }
    }

    pub fn with_begin_initialization() -> Self {
        let mut i = Self::none();
        i.begin_initialization = true;
        i
    }

    pub fn with_suspend_all() -> Self {
        let mut i = Self::none();
        i.suspend_all = true;
        i
    }

    pub fn with_send_recall(station: Station) -> Self {
        let mut i = Self::none();
        i.send_recall = true;
        i.set_target(station);
        i
    }

    pub fn with_send_controls(station: Station) -> Self {
        let mut i = Self::none();
        i.send_controls = true;
        i.set_target(station);
        i
    }

    pub fn with_poll_next(station: Station) -> Self {
        let mut i = Self::none();
        i.poll_next = true;
        i.set_target(station);
        i
    }

    pub fn with_retry_current(station: Station) -> Self {
        let mut i = Self::none();
        i.retry_current = true;
        i.set_target(station);
        i
    }

    pub fn with_schedule_control_delivery() -> Self {
        let mut i = Self::none();
        i.schedule_control_delivery = true;
        i
    }

    pub fn with_execute_controls(station: Station) -> Self {
        let mut i = Self::none();
        i.execute_controls = true;
        i.set_target(station);
        i
    }

    pub fn is_empty(&self) -> bool {
        !self.begin_initialization
            && !self.suspend_all
            && !self.retry_current
            && !self.schedule_control_delivery
            && !self.send_recall
            && !self.send_controls
            && !self.poll_next
            && !self.execute_controls
    }
}
