// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Semantic message taxonomy (§3). Messages are directionally typed: a
//! [`Request`] (master→slave) can never be mistaken for a [`Response`]
//! (slave→master) at the type level, matching spec.md's directionality
//! rule.

use std::fmt;

/// A slave station address, always in `1..=255`. `0` (broadcast) is out
/// of core scope per spec.md §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Station(u8);

impl Station {
    /// Construct a station address. Returns `None` for `0` (broadcast).
    pub fn new(id: u8) -> Option<Self> {
        if id == 0 {
            None
        } else {
            Some(Self(id))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Station {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A materialized set of signals (no "don't-care" entries), addressed by
/// byte address `0x00..0x1F` with bit `i` of byte `k` being signal
/// `8*k + i` (§6). Controls and indications share this representation but
/// occupy disjoint signal-number universes by external convention
/// (spec.md §3 invariant) — this type does not itself enforce disjointness
/// since the signal-to-bit mapping is an external concern.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SignalSet {
    bytes: Vec<(u8, u8)>,
}

impl SignalSet {
    pub fn empty() -> Self {
        Self { bytes: Vec::new() }
    }

    /// Build from explicit `(byteAddress, byteValue)` pairs, as received
    /// off the wire. Addresses must be in `0x00..=0x1F`; out-of-range
    /// pairs are dropped silently (reserved configuration bytes are
    /// handled separately, not as signal data).
    pub fn from_pairs(pairs: impl IntoIterator<Item = (u8, u8)>) -> Self {
        let bytes = pairs.into_iter().filter(|(addr, _)| *addr <= 0x1F).collect();
        Self { bytes }
    }

    pub fn pairs(&self) -> &[(u8, u8)] {
        &self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.iter().all(|(_, v)| *v == 0) || self.bytes.is_empty()
    }

    /// Whether signal number `n` is set.
    pub fn signal(&self, n: u16) -> bool {
        let addr = (n / 8) as u8;
        let bit = (n % 8) as u8;
        self.bytes.iter().find(|(a, _)| *a == addr).map(|(_, v)| v & (1 << bit) != 0).unwrap_or(false)
    }

    pub fn set_signal(&mut self, n: u16, value: bool) {
        let addr = (n / 8) as u8;
        let bit = (n % 8) as u8;
        if let Some(entry) = self.bytes.iter_mut().find(|(a, _)| *a == addr) {
            if value {
                entry.1 |= 1 << bit;
            } else {
                entry.1 &= !(1 << bit);
            }
        } else if value {
            self.bytes.push((addr, 1 << bit));
        }
    }
}

/// Control signals sent master→slave.
pub type ControlSet = SignalSet;
/// Indication signals reported slave→master.
pub type IndicationSet = SignalSet;

/// Master→slave requests.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Cyclic poll. `secure` carries a CRC when true.
    Poll { station: Station, secure: bool },
    /// Poll combined with acknowledgement of a prior indication.
    AcknowledgeAndPoll { station: Station },
    /// Synchronize cumulative indications.
    Recall { station: Station },
    /// Deliver materialized controls to a slave.
    ControlData { station: Station, controls: ControlSet },
    /// Commit previously delivered controls (used with checkback).
    ExecuteControls { station: Station },
}

impl Request {
    pub fn station(&self) -> Station {
        match *self {
            Self::Poll { station, .. }
            | Self::AcknowledgeAndPoll { station }
            | Self::Recall { station }
            | Self::ControlData { station, .. }
            | Self::ExecuteControls { station } => station,
        }
    }
}

/// Slave→master responses.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Plain acknowledgement, never CRC-bearing.
    Acknowledge { station: Station },
    /// Reported indication data.
    IndicationData { station: Station, indications: IndicationSet },
    /// Echoed controls for checkback verification.
    ControlCheckback { station: Station, controls: ControlSet },
}

impl Response {
    pub fn station(&self) -> Station {
        match *self {
            Self::Acknowledge { station }
            | Self::IndicationData { station, .. }
            | Self::ControlCheckback { station, .. } => station,
        }
    }
}

/// A directionally typed semantic message (§3).
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Request(Request),
    Response(Response),
}

impl Message {
    pub fn station(&self) -> Station {
        match self {
            Self::Request(r) => r.station(),
            Self::Response(r) => r.station(),
        }
    }

    /// Whether this message requires a CRC on the wire (§4.1 table).
    pub fn crc_required(&self) -> bool {
        match self {
            Self::Request(Request::Poll { secure, .. }) => *secure,
            Self::Request(_) => true,
            Self::Response(Response::Acknowledge { .. }) => false,
            Self::Response(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn station_rejects_broadcast() {
        assert!(Station::new(0).is_none());
        assert!(Station::new(1).is_some());
        assert!(Station::new(255).is_some());
    }

    #[test]
    fn signal_set_round_trips_bits() {
        let mut s = SignalSet::empty();
        s.set_signal(0, true);
        s.set_signal(9, true);
        assert!(s.signal(0));
        assert!(s.signal(9));
        assert!(!s.signal(1));
        assert!(!s.signal(8));
    }

    #[test]
    fn crc_required_matches_table() {
        let st = Station::new(5).unwrap();
        assert!(!Message::Response(Response::Acknowledge { station: st }).crc_required());
        assert!(Message::Request(Request::Poll { station: st, secure: true }).crc_required());
        assert!(!Message::Request(Request::Poll { station: st, secure: false }).crc_required());
        assert!(Message::Request(Request::Recall { station: st }).crc_required());
    }
}
