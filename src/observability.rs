// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Observability sink (§6): four channels — state transitions, protocol
//! events, transport events, errors. No logging happens in the reducer
//! itself; everything here is called from the driver/executor/scheduler,
//! matching the teacher's convention of `tracing::{info,warn,debug}` calls
//! sitting in the background-task layer, never in pure logic.

use crate::events::{Event, Intents};
use crate::message::{Message, Station};
use crate::state::ControllerState;

/// A protocol-level observability event (timer armed/fired, cadence
/// delay).
#[derive(Debug, Clone)]
pub enum ProtocolEvent {
    TimeoutArmed { station: Station },
    TimeoutFired { station: Station },
    TimeoutStaleDropped { station: Station },
}

/// A transport lifecycle observability event.
#[derive(Debug, Clone, Copy)]
pub enum TransportEvent {
    Up,
    Down,
}

/// Sink consumed by the driver/executor/scheduler. A null sink is
/// permitted (§6); the default no-op impl on the trait itself plays that
/// role so callers need not construct a dedicated type.
pub trait ObservabilitySink: Send + Sync {
    fn on_state_transition(
        &self,
        _old: &ControllerState,
        _new: &ControllerState,
        _trigger: &Event,
        _intents: &Intents,
    ) {
    }

    fn on_protocol_event(&self, _event: ProtocolEvent) {}

    fn on_transport_event(&self, _event: TransportEvent) {}

    fn on_error(&self, _message: &str) {}

    fn on_message_sent(&self, _station: Station, _msg: &Message) {}
}

/// Explicit null sink, for embedders that want to be unambiguous about
/// opting out of observability rather than relying on default methods.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ObservabilitySink for NullSink {}

/// Default sink: forwards every channel into `tracing` at an appropriate
/// level, the same structured-field style as the teacher's
/// `upstream/health.rs` (`tracing::warn!(session_id = %..., failures = ...)`).
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ObservabilitySink for TracingSink {
    fn on_state_transition(
        &self,
        old: &ControllerState,
        new: &ControllerState,
        _trigger: &Event,
        intents: &Intents,
    ) {
        tracing::debug!(
            old_global = ?old.global,
            new_global = ?new.global,
            intents = ?intents,
            "state transition"
        );
    }

    fn on_protocol_event(&self, event: ProtocolEvent) {
        match event {
            ProtocolEvent::TimeoutArmed { station } => {
                tracing::debug!(%station, "response timeout armed");
            }
            ProtocolEvent::TimeoutFired { station } => {
                tracing::debug!(%station, "response timeout fired");
            }
            ProtocolEvent::TimeoutStaleDropped { station } => {
                tracing::debug!(%station, "stale response timeout dropped");
            }
        }
    }

    fn on_transport_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::Up => tracing::info!("transport up"),
            TransportEvent::Down => tracing::warn!("transport down"),
        }
    }

    fn on_error(&self, message: &str) {
        tracing::warn!(%message, "genisys-master error");
    }

    fn on_message_sent(&self, station: Station, msg: &Message) {
        tracing::debug!(%station, msg = ?msg, "message sent");
    }
}
