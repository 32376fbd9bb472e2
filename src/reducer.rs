// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The reducer (§4.4): a pure `(State, Event) -> (State, Intents)`
//! function. No I/O, no clock reads beyond the timestamp carried on the
//! event, no logging. Message-type policing (which response kinds are
//! legal in which phase) happens at decode time, upstream of this
//! function — illegal combinations never arrive as events here.

use crate::events::{Event, Intents};
use crate::message::{Message, Response};
use crate::state::{ControllerState, GlobalState, Phase};

const MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// Apply one event to one state snapshot, producing the next snapshot
/// and the intents to execute. Referentially transparent: calling this
/// twice with equal arguments produces equal results (§3, §8 property 1).
pub fn reduce(state: &ControllerState, event: &Event) -> (ControllerState, Intents) {
    match event {
        Event::TransportUp { ts } => transport_up(state, *ts),
        Event::TransportDown { ts } => transport_down(state, *ts),
        Event::MessageReceived { ts, station, msg } => {
            message_received(state, *ts, *station, msg)
        }
        Event::ResponseTimeout { ts, station } => response_timeout(state, *ts, *station),
        Event::ControlIntentChanged { ts, .. } => control_intent_changed(state, *ts),
    }
}

fn transport_up(state: &ControllerState, ts: std::time::Instant) -> (ControllerState, Intents) {
    let stations: Vec<_> = state.slaves.keys().copied().collect();
    let mut next = ControllerState::initializing(&stations, ts)
        .with_control_checkback_enabled(state.control_checkback_enabled);
    // Preserve controlPending across the reset (§4.4 TransportUp).
    for station in &stations {
        if let Some(prev) = state.slaves.get(station) {
            if let Some(slave) = next.slaves.get_mut(station) {
                slave.control_pending = prev.control_pending;
            }
        }
    }
    (next, Intents::with_begin_initialization())
}

fn transport_down(state: &ControllerState, ts: std::time::Instant) -> (ControllerState, Intents) {
    let next = state.with_global_state(GlobalState::TransportDown, ts);
    (next, Intents::with_suspend_all())
}

fn message_received(
    state: &ControllerState,
    ts: std::time::Instant,
    station: crate::message::Station,
    msg: &Message,
) -> (ControllerState, Intents) {
    if state.global == GlobalState::TransportDown {
        return (state.clone(), Intents::none());
    }
    let Some(slave) = state.slaves.get(&station) else {
        return (state.clone(), Intents::none());
    };

    let mut slave = slave.clone();
    slave.last_activity_tick = ts;
    slave.consecutive_failures = 0;

    let intents = match slave.phase {
        Phase::Recall => {
            slave.initial_recall_completed = true;
            slave.phase = Phase::SendControls;
            Intents::with_send_controls(station)
        }
        Phase::SendControls => {
            slave.control_pending = false;
            slave.phase = Phase::Poll;
            Intents::with_poll_next(station)
        }
        Phase::Poll => match msg {
            Message::Response(Response::IndicationData { .. }) => {
                slave.ack_pending = true;
                Intents::with_poll_next(station)
            }
            Message::Response(Response::Acknowledge { .. }) => {
                slave.ack_pending = false;
                Intents::with_poll_next(station)
            }
            // A verified checkback echo commits the delivered controls on
            // the *next* reducer step, as an ordinary intent (§4.4 open
            // question (b)) rather than a side effect issued by the
            // executor at receive time. When checkback is disabled the
            // echo carries no meaning here and is treated like any other
            // polled response.
            Message::Response(Response::ControlCheckback { .. }) => {
                if state.control_checkback_enabled {
                    Intents::with_execute_controls(station)
                } else {
                    Intents::with_poll_next(station)
                }
            }
            Message::Request(_) => Intents::with_poll_next(station),
        },
        Phase::Failed => {
            slave.phase = Phase::Recall;
            Intents::with_send_recall(station)
        }
    };

    let mut next = state.with_slave_state(slave, ts);
    if next.global == GlobalState::Initializing
        && next.slaves.values().all(|s| s.initial_recall_completed)
    {
        next = next.with_global_state(GlobalState::Running, ts);
    }
    (next, intents)
}

fn response_timeout(
    state: &ControllerState,
    ts: std::time::Instant,
    station: crate::message::Station,
) -> (ControllerState, Intents) {
    if state.global != GlobalState::Running {
        return (state.clone(), Intents::none());
    }
    let Some(slave) = state.slaves.get(&station) else {
        return (state.clone(), Intents::none());
    };
    let mut slave = slave.clone();

    let intents = match slave.phase {
        Phase::Recall => Intents::with_send_recall(station),
        Phase::SendControls => {
            slave.consecutive_failures += 1;
            if slave.consecutive_failures < MAX_CONSECUTIVE_FAILURES {
                Intents::with_retry_current(station)
            } else {
                slave.phase = Phase::Failed;
                Intents::with_send_recall(station)
            }
        }
        Phase::Poll => {
            slave.consecutive_failures += 1;
            if slave.consecutive_failures < MAX_CONSECUTIVE_FAILURES {
                Intents::with_retry_current(station)
            } else {
                slave.ack_pending = false;
                slave.phase = Phase::Failed;
                Intents::with_send_recall(station)
            }
        }
        Phase::Failed => return (state.clone(), Intents::none()),
    };

    (state.with_slave_state(slave, ts), intents)
}

fn control_intent_changed(
    state: &ControllerState,
    ts: std::time::Instant,
) -> (ControllerState, Intents) {
    if state.global == GlobalState::TransportDown {
        return (state.clone(), Intents::none());
    }
    let mut next = state.clone();
    for slave in next.slaves.values_mut() {
        if slave.phase != Phase::Failed {
            slave.control_pending = true;
        }
    }
    next.last_transition_tick = ts;
    (next, Intents::with_schedule_control_delivery())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{SignalSet, Station};
    use std::time::Instant;

    fn st(n: u8) -> Station {
        Station::new(n).unwrap()
    }

    fn ack(station: Station) -> Message {
        Message::Response(Response::Acknowledge { station })
    }

    fn indication(station: Station) -> Message {
        Message::Response(Response::IndicationData { station, indications: SignalSet::empty() })
    }

    // -- §8 property 2: transport-down gating -----------------------------

    #[test]
    fn transport_down_gates_message_received() {
        let now = Instant::now();
        let state = ControllerState::initializing(&[st(1)], now)
            .with_global_state(GlobalState::TransportDown, now);
        let (next, intents) =
            reduce(&state, &Event::MessageReceived { ts: now, station: st(1), msg: ack(st(1)) });
        assert_eq!(next.slaves, state.slaves);
        assert!(intents.is_empty());
    }

    #[test]
    fn transport_down_gates_control_intent_changed() {
        let now = Instant::now();
        let state = ControllerState::initializing(&[st(1)], now)
            .with_global_state(GlobalState::TransportDown, now);
        let (next, intents) = reduce(
            &state,
            &Event::ControlIntentChanged { ts: now, delta: vec![], full: SignalSet::empty() },
        );
        assert_eq!(next.slaves, state.slaves);
        assert!(intents.is_empty());
    }

    // -- §8 property 3: recall no-count ------------------------------------

    #[test]
    fn recall_timeout_does_not_increment_failures() {
        let now = Instant::now();
        let state = ControllerState::initializing(&[st(1)], now)
            .with_global_state(GlobalState::Running, now);
        let (next, intents) = reduce(&state, &Event::ResponseTimeout { ts: now, station: st(1) });
        assert_eq!(next.slaves[&st(1)].consecutive_failures, 0);
        assert_eq!(next.slaves[&st(1)].phase, Phase::Recall);
        assert!(intents.send_recall);
    }

    // -- §8 property 4 / scenario B: failure escalation --------------------

    #[test]
    fn poll_timeout_escalates_to_failed_after_three() {
        let now = Instant::now();
        let mut state = ControllerState::initializing(&[st(1)], now)
            .with_global_state(GlobalState::Running, now);
        let mut slave = state.slaves[&st(1)].clone();
        slave.phase = Phase::Poll;
        state = state.with_slave_state(slave, now);

        let (s1, i1) = reduce(&state, &Event::ResponseTimeout { ts: now, station: st(1) });
        assert_eq!(s1.slaves[&st(1)].consecutive_failures, 1);
        assert_eq!(s1.slaves[&st(1)].phase, Phase::Poll);
        assert!(i1.retry_current);

        let (s2, i2) = reduce(&s1, &Event::ResponseTimeout { ts: now, station: st(1) });
        assert_eq!(s2.slaves[&st(1)].consecutive_failures, 2);
        assert!(i2.retry_current);

        let (s3, i3) = reduce(&s2, &Event::ResponseTimeout { ts: now, station: st(1) });
        assert_eq!(s3.slaves[&st(1)].consecutive_failures, 3);
        assert_eq!(s3.slaves[&st(1)].phase, Phase::Failed);
        assert!(!s3.slaves[&st(1)].ack_pending);
        assert!(i3.send_recall);
    }

    // -- scenario C: recovery from Failed -----------------------------------

    #[test]
    fn recovery_from_failed_resets_without_emitting_send_recall() {
        let now = Instant::now();
        let mut state = ControllerState::initializing(&[st(1)], now)
            .with_global_state(GlobalState::Running, now);
        let mut slave = state.slaves[&st(1)].clone();
        slave.phase = Phase::Failed;
        slave.consecutive_failures = 3;
        state = state.with_slave_state(slave, now);

        let (next, intents) =
            reduce(&state, &Event::MessageReceived { ts: now, station: st(1), msg: indication(st(1)) });
        assert_eq!(next.slaves[&st(1)].phase, Phase::Recall);
        assert_eq!(next.slaves[&st(1)].consecutive_failures, 0);
        assert!(intents.send_recall);

        let (next2, intents2) = reduce(&next, &Event::ResponseTimeout { ts: now, station: st(1) });
        assert_eq!(next2.slaves[&st(1)].consecutive_failures, 0);
        assert!(intents2.send_recall);
    }

    // -- checkback: ControlCheckback on a Poll-phase slave -------------------

    fn checkback(station: Station) -> Message {
        Message::Response(Response::ControlCheckback { station, controls: SignalSet::empty() })
    }

    #[test]
    fn checkback_enabled_emits_execute_controls() {
        let now = Instant::now();
        let mut state = ControllerState::initializing(&[st(1)], now)
            .with_global_state(GlobalState::Running, now)
            .with_control_checkback_enabled(true);
        let mut slave = state.slaves[&st(1)].clone();
        slave.phase = Phase::Poll;
        state = state.with_slave_state(slave, now);

        let (_next, intents) = reduce(
            &state,
            &Event::MessageReceived { ts: now, station: st(1), msg: checkback(st(1)) },
        );
        assert!(intents.execute_controls);
        assert_eq!(intents.target_station(), Some(st(1)));
    }

    #[test]
    fn checkback_disabled_falls_back_to_poll_next() {
        let now = Instant::now();
        let mut state = ControllerState::initializing(&[st(1)], now)
            .with_global_state(GlobalState::Running, now);
        let mut slave = state.slaves[&st(1)].clone();
        slave.phase = Phase::Poll;
        state = state.with_slave_state(slave, now);

        let (_next, intents) = reduce(
            &state,
            &Event::MessageReceived { ts: now, station: st(1), msg: checkback(st(1)) },
        );
        assert!(!intents.execute_controls);
        assert!(intents.poll_next);
    }

    // -- scenario E: control intent propagation -----------------------------

    #[test]
    fn control_intent_changed_skips_failed_slaves() {
        let now = Instant::now();
        let mut state = ControllerState::initializing(&[st(1), st(2), st(3)], now)
            .with_global_state(GlobalState::Running, now);
        let mut slave2 = state.slaves[&st(2)].clone();
        slave2.phase = Phase::Failed;
        state = state.with_slave_state(slave2, now);

        let (next, intents) = reduce(
            &state,
            &Event::ControlIntentChanged { ts: now, delta: vec![], full: SignalSet::empty() },
        );
        assert!(next.slaves[&st(1)].control_pending);
        assert!(!next.slaves[&st(2)].control_pending);
        assert!(next.slaves[&st(3)].control_pending);
        assert!(intents.schedule_control_delivery);
    }

    // -- §8 property 5: isolation --------------------------------------------

    #[test]
    fn events_addressed_to_one_station_do_not_touch_others() {
        let now = Instant::now();
        let state = ControllerState::initializing(&[st(1), st(2)], now)
            .with_global_state(GlobalState::Running, now);
        let (next, _) =
            reduce(&state, &Event::MessageReceived { ts: now, station: st(1), msg: ack(st(1)) });
        assert_eq!(next.slaves[&st(2)], state.slaves[&st(2)]);
    }

    // -- §8 property 6: lifecycle closure ------------------------------------

    #[test]
    fn global_transitions_to_running_only_when_all_recalled() {
        let now = Instant::now();
        let state = ControllerState::initializing(&[st(1), st(2)], now);
        let (s1, _) =
            reduce(&state, &Event::MessageReceived { ts: now, station: st(1), msg: indication(st(1)) });
        assert_eq!(s1.global, GlobalState::Initializing);
        let (s2, _) =
            reduce(&s1, &Event::MessageReceived { ts: now, station: st(2), msg: indication(st(2)) });
        assert_eq!(s2.global, GlobalState::Running);
    }

    #[test]
    fn determinism_same_input_same_output() {
        let now = Instant::now();
        let state = ControllerState::initializing(&[st(1)], now)
            .with_global_state(GlobalState::Running, now);
        let event = Event::ResponseTimeout { ts: now, station: st(1) };
        let (a, ia) = reduce(&state, &event);
        let (b, ib) = reduce(&state, &event);
        assert_eq!(a.slaves, b.slaves);
        assert_eq!(a.global, b.global);
        assert_eq!(ia, ib);
    }
}
