// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Intent executor (§4.5): turns a single reducer step's [`Intents`] into
//! concrete sends and timer arm/cancel calls, in the fixed dominance
//! order `SuspendAll` > `BeginInitialization` > everything else. Never
//! blocks or awaits I/O itself (§5) — sends are handed to the
//! [`Transport`] trait, which is fire-and-forget by contract.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Instant;

use tokio::sync::Mutex;

use crate::codec::PayloadCodec;
use crate::config::Config;
use crate::events::Intents;
use crate::facade::ControlIndicationFacade;
use crate::message::{Message, Request};
use crate::observability::ObservabilitySink;
use crate::scheduler::{ActivitySnapshot, TimeoutScheduler};
use crate::state::ControllerState;
use crate::tracker::{ActivityTracker, SendTracker};
use crate::transport::Transport;

/// Bridges the executor's view of activity into the scheduler's
/// staleness check without handing the scheduler the whole tracker.
struct TrackerSnapshot(Arc<StdMutex<ActivityTracker>>);

impl ActivitySnapshot for TrackerSnapshot {
    fn last_activity_tick(&self, station: crate::message::Station) -> Option<Instant> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).last_receipt(station)
    }
}

/// Executes intents against a transport, façade, and timer scheduler.
/// Owns the send tracker; the activity tracker is shared with the
/// driver, which updates it on every `MessageReceived`.
pub struct Executor {
    config: Arc<Config>,
    transport: Arc<dyn Transport>,
    facade: Arc<dyn ControlIndicationFacade>,
    sink: Arc<dyn ObservabilitySink>,
    codec: Arc<dyn PayloadCodec>,
    scheduler: Arc<TimeoutScheduler>,
    activity: Arc<StdMutex<ActivityTracker>>,
    send_tracker: Mutex<SendTracker>,
}

impl Executor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<Config>,
        transport: Arc<dyn Transport>,
        facade: Arc<dyn ControlIndicationFacade>,
        sink: Arc<dyn ObservabilitySink>,
        codec: Arc<dyn PayloadCodec>,
        scheduler: Arc<TimeoutScheduler>,
        activity: Arc<StdMutex<ActivityTracker>>,
    ) -> Self {
        Self {
            config,
            transport,
            facade,
            sink,
            codec,
            scheduler,
            activity,
            send_tracker: Mutex::new(SendTracker::new()),
        }
    }

    /// Execute one reducer step's intents against `state`, which must be
    /// the state the reducer produced in the same step (post-transition).
    pub async fn execute(&self, intents: &Intents, state: &ControllerState) {
        if intents.suspend_all {
            self.scheduler.cancel_all().await;
            return;
        }
        if intents.begin_initialization {
            for station in self.config.station_list() {
                self.send_and_arm(Message::Request(Request::Recall { station })).await;
            }
            return;
        }

        let target = intents.target_station();

        if intents.send_recall {
            if let Some(station) = target {
                self.send_and_arm(Message::Request(Request::Recall { station })).await;
            }
            return;
        }

        if intents.send_controls {
            if let Some(station) = target {
                self.send_controls(station).await;
            }
            return;
        }

        if intents.execute_controls {
            if let Some(station) = target {
                self.send_and_arm(Message::Request(Request::ExecuteControls { station })).await;
            }
            return;
        }

        if intents.poll_next {
            if let Some(station) = target {
                self.poll_next(station, state).await;
            }
            return;
        }

        if intents.retry_current {
            if let Some(station) = target {
                self.retry_current(station).await;
            }
            return;
        }

        if intents.schedule_control_delivery {
            self.schedule_control_delivery(state).await;
        }
    }

    async fn send_controls(&self, station: crate::message::Station) {
        let controls = self.facade.current_controls(station);
        self.send_and_arm(Message::Request(Request::ControlData { station, controls })).await;
    }

    async fn poll_next(&self, current: crate::message::Station, state: &ControllerState) {
        let Some(next) = state.next_station_after(current) else { return };
        let ack_pending = state.slaves.get(&next).is_some_and(|s| s.ack_pending);
        let msg = if ack_pending {
            Message::Request(Request::AcknowledgeAndPoll { station: next })
        } else {
            Message::Request(Request::Poll { station: next, secure: self.config.secure_polls })
        };
        self.send_and_arm(msg).await;
    }

    async fn retry_current(&self, station: crate::message::Station) {
        let last = self.send_tracker.lock().await.last_message(station).cloned();
        if let Some(msg) = last {
            self.send_and_arm(msg).await;
        }
    }

    /// `ScheduleControlDelivery` fans out to every slave with
    /// `controlPending` outside `Failed`, in station order (§4.5,
    /// DESIGN.md Open Question on control delivery cadence: immediate,
    /// bounded-fairness per station, never reordered across a
    /// `TransportDown` boundary).
    async fn schedule_control_delivery(&self, state: &ControllerState) {
        let stations: Vec<_> = state
            .slaves
            .values()
            .filter(|s| s.control_pending && s.phase != crate::state::Phase::Failed)
            .map(|s| s.station)
            .collect();
        for station in stations {
            self.send_controls(station).await;
        }
    }

    async fn send_and_arm(&self, msg: Message) {
        let station = msg.station();
        let bytes = crate::codec::encode(&msg, self.codec.as_ref());
        let now = Instant::now();

        self.transport.send(station, bytes);
        self.sink.on_message_sent(station, &msg);
        self.send_tracker.lock().await.record(station, msg, now);

        let snapshot: Arc<dyn ActivitySnapshot> = Arc::new(TrackerSnapshot(Arc::clone(&self.activity)));
        self.scheduler.arm(station, self.config.response_timeout, now, snapshot).await;
    }
}
