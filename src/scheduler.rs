// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timeout scheduler (§4.6, §5): monotonic, deadline-driven tasks with
//! cancellation. Arming a new timeout for a station cancels any prior one
//! (`maxOutstandingPerStation = 1`). Grounded on the teacher's
//! `tokio::spawn` + `tokio::select! { _ = cancel.cancelled() => ..., _ =
//! timer.tick() => {} }` loop in `upstream/health.rs` and
//! `upstream/poller.rs`, adapted from a repeating interval to a
//! one-shot, cancellable deadline per station.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::events::Event;
use crate::message::Station;
use crate::observability::{ObservabilitySink, ProtocolEvent};

/// A snapshot supplier the scheduler consults when a timer fires, to
/// decide whether the firing is stale (§4.6: "if the slave's
/// lastActivityTick is strictly greater than the send tick the timer was
/// armed against, the timeout is stale and is dropped").
pub trait ActivitySnapshot: Send + Sync {
    fn last_activity_tick(&self, station: Station) -> Option<Instant>;
}

/// Monotonic timeout scheduler. One outstanding timeout per station.
pub struct TimeoutScheduler {
    tokens: Mutex<HashMap<Station, CancellationToken>>,
    event_tx: mpsc::Sender<Event>,
    sink: Arc<dyn ObservabilitySink>,
}

impl TimeoutScheduler {
    pub fn new(event_tx: mpsc::Sender<Event>, sink: Arc<dyn ObservabilitySink>) -> Self {
        Self { tokens: Mutex::new(HashMap::new()), event_tx, sink }
    }

    /// Arm a response timeout for `station`, firing after `duration`
    /// unless cancelled or superseded first. `send_tick` is the
    /// monotonic time of the outbound send this timeout guards;
    /// `activity` is consulted at fire time for the staleness check.
    pub async fn arm(
        &self,
        station: Station,
        duration: Duration,
        send_tick: Instant,
        activity: Arc<dyn ActivitySnapshot>,
    ) {
        let token = CancellationToken::new();
        {
            let mut tokens = self.tokens.lock().await;
            if let Some(prev) = tokens.insert(station, token.clone()) {
                prev.cancel();
            }
        }
        self.sink.on_protocol_event(ProtocolEvent::TimeoutArmed { station });

        let event_tx = self.event_tx.clone();
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(duration) => {
                    sink.on_protocol_event(ProtocolEvent::TimeoutFired { station });
                    let stale = activity
                        .last_activity_tick(station)
                        .is_some_and(|last| last > send_tick);
                    if stale {
                        sink.on_protocol_event(ProtocolEvent::TimeoutStaleDropped { station });
                    } else {
                        let _ = event_tx.send(Event::ResponseTimeout { ts: Instant::now(), station }).await;
                    }
                }
            }
        });
    }

    /// Cancel the outstanding timeout for `station`, if any.
    pub async fn cancel(&self, station: Station) {
        if let Some(token) = self.tokens.lock().await.remove(&station) {
            token.cancel();
        }
    }

    /// Cancel every outstanding timeout (driven by `SuspendAll`, §4.5).
    pub async fn cancel_all(&self) {
        let mut tokens = self.tokens.lock().await;
        for (_, token) in tokens.drain() {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::NullSink;
    use std::sync::Mutex as StdMutex;

    struct FixedActivity(StdMutex<HashMap<Station, Instant>>);

    impl ActivitySnapshot for FixedActivity {
        fn last_activity_tick(&self, station: Station) -> Option<Instant> {
            self.0.lock().unwrap().get(&station).copied()
        }
    }

    #[tokio::test]
    async fn fires_response_timeout_after_duration() {
        let (tx, mut rx) = mpsc::channel(8);
        let scheduler = TimeoutScheduler::new(tx, Arc::new(NullSink));
        let station = Station::new(1).unwrap();
        let activity: Arc<dyn ActivitySnapshot> = Arc::new(FixedActivity(StdMutex::new(HashMap::new())));

        scheduler.arm(station, Duration::from_millis(10), Instant::now(), activity).await;
        let event = tokio::time::timeout(Duration::from_millis(200), rx.recv())
            .await
            .expect("timeout fired")
            .expect("channel open");
        match event {
            Event::ResponseTimeout { station: s, .. } => assert_eq!(s, station),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn rearming_cancels_prior_timeout() {
        let (tx, mut rx) = mpsc::channel(8);
        let scheduler = TimeoutScheduler::new(tx, Arc::new(NullSink));
        let station = Station::new(1).unwrap();
        let activity: Arc<dyn ActivitySnapshot> = Arc::new(FixedActivity(StdMutex::new(HashMap::new())));

        scheduler.arm(station, Duration::from_millis(20), Instant::now(), Arc::clone(&activity)).await;
        scheduler.arm(station, Duration::from_millis(500), Instant::now(), activity).await;

        let got = tokio::time::timeout(Duration::from_millis(60), rx.recv()).await;
        assert!(got.is_err(), "first timeout should have been cancelled by rearm");
    }

    #[tokio::test]
    async fn stale_firing_is_dropped() {
        let (tx, mut rx) = mpsc::channel(8);
        let scheduler = TimeoutScheduler::new(tx, Arc::new(NullSink));
        let station = Station::new(1).unwrap();
        let send_tick = Instant::now();
        let mut map = HashMap::new();
        map.insert(station, send_tick + Duration::from_millis(100));
        let activity: Arc<dyn ActivitySnapshot> = Arc::new(FixedActivity(StdMutex::new(map)));

        scheduler.arm(station, Duration::from_millis(10), send_tick, activity).await;
        let got = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(got.is_err(), "stale timeout must not submit an event");
    }
}
