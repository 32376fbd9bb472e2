// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Activity tracker and send tracker (§3, §4.6, §8 scenario D). Owned
//! exclusively by the executor; never touched from outside the single
//! event-loop worker.

use std::collections::HashMap;
use std::time::Instant;

use crate::message::{Message, Station};

/// Records the monotonic time of the last semantic receipt per station,
/// used to suppress stale response timeouts.
#[derive(Default)]
pub struct ActivityTracker {
    last_receipt: HashMap<Station, Instant>,
}

impl ActivityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, station: Station, ts: Instant) {
        self.last_receipt.insert(station, ts);
    }

    pub fn last_receipt(&self, station: Station) -> Option<Instant> {
        self.last_receipt.get(&station).copied()
    }
}

/// Records the last outbound message and send tick per station, for
/// retry targeting and timeout staleness checks.
#[derive(Default)]
pub struct SendTracker {
    last_message: HashMap<Station, Message>,
    last_send_tick: HashMap<Station, Instant>,
}

impl SendTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, station: Station, msg: Message, ts: Instant) {
        self.last_message.insert(station, msg);
        self.last_send_tick.insert(station, ts);
    }

    pub fn last_message(&self, station: Station) -> Option<&Message> {
        self.last_message.get(&station)
    }

    pub fn last_send_tick(&self, station: Station) -> Option<Instant> {
        self.last_send_tick.get(&station).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_tracker_records_latest() {
        let mut tracker = ActivityTracker::new();
        let station = Station::new(1).unwrap();
        let t0 = Instant::now();
        tracker.record(station, t0);
        assert_eq!(tracker.last_receipt(station), Some(t0));
    }

    #[test]
    fn send_tracker_round_trips_last_message() {
        let mut tracker = SendTracker::new();
        let station = Station::new(1).unwrap();
        let msg = Message::Request(crate::message::Request::Recall { station });
        let ts = Instant::now();
        tracker.record(station, msg.clone(), ts);
        assert_eq!(tracker.last_message(station), Some(&msg));
        assert_eq!(tracker.last_send_tick(station), Some(ts));
    }
}
