// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control/indication façade (§6), externally supplied in a real
//! deployment. A reference in-memory implementation is supplemented
//! (SPEC_FULL.md §B.1) so the binary and integration tests are runnable
//! without a signal-mapping dependency.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::message::{ControlSet, IndicationSet, Station};
use crate::state::Status;

/// External collaborator exposing cumulative control/indication
/// bit-sets to applications (§6). The core never interprets signal
/// meaning (§1 Non-goals) — it only reads/writes materialized sets.
pub trait ControlIndicationFacade: Send + Sync {
    /// Snapshot used by the executor when emitting `ControlData`.
    fn current_controls(&self, station: Station) -> ControlSet;
    /// Merge callback invoked after decoding `IndicationData`.
    fn apply_indications(&self, station: Station, indications: IndicationSet);
    /// Called on every status change derived from state (§4.3).
    fn set_status(&self, status: Status);
}

/// Reference in-memory façade: controls are whatever was last written via
/// [`InMemoryFacade::set_controls`]; indications accumulate into a table
/// callers can inspect with [`InMemoryFacade::indications`].
#[derive(Default)]
pub struct InMemoryFacade {
    controls: Mutex<HashMap<Station, ControlSet>>,
    indications: Mutex<HashMap<Station, IndicationSet>>,
    last_status: Mutex<Option<Status>>,
}

impl InMemoryFacade {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_controls(&self, station: Station, controls: ControlSet) {
        self.controls.lock().unwrap_or_else(|e| e.into_inner()).insert(station, controls);
    }

    pub fn indications(&self, station: Station) -> Option<IndicationSet> {
        self.indications.lock().unwrap_or_else(|e| e.into_inner()).get(&station).cloned()
    }

    pub fn last_status(&self) -> Option<Status> {
        *self.last_status.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ControlIndicationFacade for InMemoryFacade {
    fn current_controls(&self, station: Station) -> ControlSet {
        self.controls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&station)
            .cloned()
            .unwrap_or_else(ControlSet::empty)
    }

    fn apply_indications(&self, station: Station, indications: IndicationSet) {
        self.indications.lock().unwrap_or_else(|e| e.into_inner()).insert(station, indications);
    }

    fn set_status(&self, status: Status) {
        *self.last_status.lock().unwrap_or_else(|e| e.into_inner()) = Some(status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_empty_controls() {
        let facade = InMemoryFacade::new();
        let station = Station::new(1).unwrap();
        assert_eq!(facade.current_controls(station), ControlSet::empty());
    }

    #[test]
    fn applies_and_reads_back_indications() {
        let facade = InMemoryFacade::new();
        let station = Station::new(1).unwrap();
        let mut indications = IndicationSet::empty();
        indications.set_signal(3, true);
        facade.apply_indications(station, indications.clone());
        assert_eq!(facade.indications(station), Some(indications));
    }
}
