// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The operational driver (§5): a single-threaded `reduce -> execute`
//! loop fed by one MPSC event queue. Exactly mirrors the teacher's
//! `lib.rs::run()` shape — one task owns the authoritative state and
//! never shares it by reference outside this loop.

use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::codec;
use crate::codec::PayloadCodec;
use crate::events::Event;
use crate::executor::Executor;
use crate::facade::ControlIndicationFacade;
use crate::message::Station;
use crate::observability::ObservabilitySink;
use crate::reducer::reduce;
use crate::state::ControllerState;
use crate::tracker::ActivityTracker;
use crate::transport::TransportListener;

/// Bridges raw transport callbacks into semantic [`Event`]s. A bounded
/// channel backs the queue (SPEC_FULL.md §B.5): when full, a duplicate
/// `ResponseTimeout` for a station already pending is dropped and
/// reported rather than blocking the transport's receive task.
pub struct EventQueue {
    tx: mpsc::Sender<Event>,
    codec: Arc<dyn PayloadCodec>,
    sink: Arc<dyn ObservabilitySink>,
}

impl EventQueue {
    const DEFAULT_CAPACITY: usize = 1024;

    pub fn new(
        capacity: Option<usize>,
        codec: Arc<dyn PayloadCodec>,
        sink: Arc<dyn ObservabilitySink>,
    ) -> (Arc<Self>, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity.unwrap_or(Self::DEFAULT_CAPACITY));
        (Arc::new(Self { tx, codec, sink }), rx)
    }

    /// A raw sender clone, handed to [`crate::scheduler::TimeoutScheduler`]
    /// so it can submit `ResponseTimeout` events directly (these are
    /// never duplicated per-station by construction, so they bypass the
    /// drop-and-report path `try_submit` uses for transport callbacks).
    pub fn sender(&self) -> mpsc::Sender<Event> {
        self.tx.clone()
    }

    pub async fn submit(&self, event: Event) {
        if self.tx.send(event).await.is_err() {
            self.sink.on_error("event queue closed, dropping submitted event");
        }
    }

    fn try_submit(&self, event: Event) {
        if let Err(mpsc::error::TrySendError::Full(dropped)) = self.tx.try_send(event) {
            self.sink.on_error(&format!(
                "event queue full, dropping event for station {:?}",
                dropped.station()
            ));
        }
    }
}

impl TransportListener for EventQueue {
    fn on_datagram(&self, station: Station, bytes: Vec<u8>) {
        match codec::decode(&bytes, self.codec.as_ref()) {
            Ok(msg) => self.try_submit(Event::MessageReceived {
                ts: std::time::Instant::now(),
                station,
                msg,
            }),
            Err(e) => self.sink.on_error(&format!("dropping malformed datagram from {station}: {e}")),
        }
    }

    fn on_transport_up(&self) {
        self.try_submit(Event::TransportUp { ts: std::time::Instant::now() });
    }

    fn on_transport_down(&self) {
        self.try_submit(Event::TransportDown { ts: std::time::Instant::now() });
    }
}

/// Owns the authoritative [`ControllerState`] and runs the `reduce ->
/// execute` cycle until shutdown.
pub struct Driver {
    pub queue: Arc<EventQueue>,
    pub shutdown: CancellationToken,
    rx: mpsc::Receiver<Event>,
}

impl Driver {
    pub fn new(
        capacity: Option<usize>,
        codec: Arc<dyn PayloadCodec>,
        sink: Arc<dyn ObservabilitySink>,
    ) -> Self {
        let (queue, rx) = EventQueue::new(capacity, codec, sink);
        Self { queue, shutdown: CancellationToken::new(), rx }
    }

    /// Submit a control-intent-changed event, bridged from an external
    /// control source (§4.2).
    pub async fn notify_control_intent_changed(
        &self,
        delta: Vec<u16>,
        full: crate::message::ControlSet,
    ) {
        self.queue
            .submit(Event::ControlIntentChanged { ts: std::time::Instant::now(), delta, full })
            .await;
    }

    /// Run the event loop to completion. `initial` is typically
    /// `ControllerState::initializing` seeded with transport already
    /// down (the driver waits for the first `TransportUp` to begin).
    pub async fn run(
        mut self,
        mut state: ControllerState,
        executor: Arc<Executor>,
        facade: Arc<dyn ControlIndicationFacade>,
        activity: Arc<StdMutex<ActivityTracker>>,
        sink: Arc<dyn ObservabilitySink>,
    ) {
        let mut last_status = state.status();
        facade.set_status(last_status);

        loop {
            let event = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                event = self.rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            if let Event::MessageReceived { ts, station, msg } = &event {
                activity.lock().unwrap_or_else(|e| e.into_inner()).record(*station, *ts);
                if let crate::message::Message::Response(
                    crate::message::Response::IndicationData { indications, .. },
                ) = msg
                {
                    facade.apply_indications(*station, indications.clone());
                }
            }
            match &event {
                Event::TransportUp { .. } => sink.on_transport_event(crate::observability::TransportEvent::Up),
                Event::TransportDown { .. } => {
                    sink.on_transport_event(crate::observability::TransportEvent::Down)
                }
                _ => {}
            }

            let (next_state, intents) = reduce(&state, &event);
            sink.on_state_transition(&state, &next_state, &event, &intents);
            state = next_state;

            executor.execute(&intents, &state).await;

            let status = state.status();
            if status != last_status {
                facade.set_status(status);
                last_status = status;
            }
        }
    }

    pub fn stop(&self) {
        self.shutdown.cancel();
    }
}
