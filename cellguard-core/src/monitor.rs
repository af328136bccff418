//! Session state and the serialized ingestion path
//!
//! ## Overview
//!
//! The engine keeps exactly one piece of cross-sample state: the previous
//! telemetry sample plus a staleness clock per monitored parameter. All
//! transport connections feed the same logical stream, so that state is
//! owned in one place and every classify-arbitrate-update cycle runs as
//! one critical section.
//!
//! [`SessionState`] is the plain state machine, usable from a single
//! owner task on no_std targets. [`Monitor`] (std) wraps it in a mutex so
//! any number of connection handlers can call [`Monitor::process`]
//! concurrently; the lock makes each sample's "previous" the sample that
//! arrived immediately before it, which is what keeps the rate-of-change
//! rules meaningful.
//!
//! ## Staleness
//!
//! A zero or negative reading means "no data this cycle", not a true
//! measurement. Each positive reading refreshes the parameter's clock; a
//! parameter that has gone more than 30 seconds without one transitions
//! to stale and raises a single [`StalenessEvent`]. The alert is
//! edge-triggered: staying stale produces no further events, and a fresh
//! reading clears the condition silently. For classification the engine
//! substitutes the last known good value so a dropped sensor does not
//! masquerade as a 0.0 V cell.

use heapless::Vec;

use crate::telemetry::{Parameter, TelemetrySample, PARAMETERS, PARAMETER_COUNT};
use crate::time::Timestamp;

#[cfg(feature = "std")]
use crate::table::LimitTable;

#[cfg(feature = "std")]
use std::sync::{Mutex, PoisonError};

#[cfg(feature = "std")]
use crate::arbiter::{arbitrate, DataQualitySink, LogQualitySink, Verdict};
#[cfg(feature = "std")]
use crate::catalog::Catalog;
#[cfg(feature = "std")]
use crate::classify::classify;
#[cfg(feature = "std")]
use crate::errors::CatalogError;
#[cfg(feature = "std")]
use crate::faults::FaultSet;

/// How long a parameter may go without a positive reading (ms)
///
/// Strictly greater than this is stale; exactly at the window is still
/// fresh.
pub const STALENESS_WINDOW_MS: u64 = 30_000;

/// One-shot alert raised when a parameter crosses into staleness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessEvent {
    /// The parameter that went stale
    pub parameter: Parameter,
    /// When its last positive reading arrived
    pub last_seen: Timestamp,
    /// When the crossing was detected
    pub timestamp: Timestamp,
}

/// The engine's only cross-sample state
///
/// One logical instance exists per monitored pack regardless of how many
/// transport connections deliver samples.
#[derive(Debug, Clone)]
pub struct SessionState {
    previous: Option<TelemetrySample>,
    last_seen: [Timestamp; PARAMETER_COUNT],
    stale: [bool; PARAMETER_COUNT],
}

impl SessionState {
    /// Fresh session: no previous sample, all clocks at `now`
    pub fn new(now: Timestamp) -> Self {
        Self {
            previous: None,
            last_seen: [now; PARAMETER_COUNT],
            stale: [false; PARAMETER_COUNT],
        }
    }

    /// The previously committed sample, if any
    pub fn previous(&self) -> Option<&TelemetrySample> {
        self.previous.as_ref()
    }

    /// Is this parameter currently stale?
    pub fn is_stale(&self, parameter: Parameter) -> bool {
        self.stale[parameter.index()]
    }

    /// Update staleness bookkeeping for an arriving sample
    ///
    /// Returns the parameters that crossed into staleness on this
    /// arrival; a parameter that stays stale does not alert again.
    pub fn observe(
        &mut self,
        sample: &TelemetrySample,
        now: Timestamp,
    ) -> Vec<StalenessEvent, PARAMETER_COUNT> {
        let mut crossed = Vec::new();
        for p in PARAMETERS {
            let i = p.index();
            if sample.value(p) > 0.0 {
                self.last_seen[i] = now;
                // Back to fresh: clears silently
                self.stale[i] = false;
            } else if !self.stale[i] && now.saturating_sub(self.last_seen[i]) > STALENESS_WINDOW_MS {
                self.stale[i] = true;
                // Capacity equals PARAMETER_COUNT, push cannot fail
                let _ = crossed.push(StalenessEvent {
                    parameter: p,
                    last_seen: self.last_seen[i],
                    timestamp: now,
                });
            }
        }
        crossed
    }

    /// Substitute last known good values for missing readings
    ///
    /// A zero reading is a staleness signal, not a true measurement; for
    /// classification it is replaced by the value carried in the previous
    /// committed sample. With no previous sample the zeros stand.
    pub fn effective(&self, sample: &TelemetrySample) -> TelemetrySample {
        let mut effective = *sample;
        if let Some(prev) = &self.previous {
            for p in PARAMETERS {
                if effective.value(p) <= 0.0 {
                    effective.set_value(p, prev.value(p));
                }
            }
        }
        effective
    }

    /// Commit the processed sample as the new "previous"
    ///
    /// Callers commit the effective (substituted) sample so a dropped
    /// sensor cannot poison the next rate-of-change computation with a
    /// zero.
    pub fn commit(&mut self, sample: TelemetrySample) {
        self.previous = Some(sample);
    }
}

/// Everything produced by one processed sample
#[cfg(feature = "std")]
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// The arbitrated verdict, `None` when the sample is healthy
    pub verdict: Option<Verdict>,
    /// Every fault the classifier raised, for diagnostics
    pub faults: FaultSet,
    /// Staleness crossings detected on this arrival
    pub stale_alerts: Vec<StalenessEvent, PARAMETER_COUNT>,
}

/// Concurrency-safe ingestion front of the engine
///
/// Owns the immutable limit table and catalog plus the mutex-guarded
/// session state. `process` is the critical section: connection handlers
/// may call it from any number of threads and each sample observes the
/// previous sample in arrival order.
#[cfg(feature = "std")]
pub struct Monitor {
    table: LimitTable,
    catalog: Catalog,
    state: Mutex<SessionState>,
}

#[cfg(feature = "std")]
impl Monitor {
    /// Build the limit table and start a session
    ///
    /// Table construction is the readiness gate: no sample is accepted
    /// before it completes, and a malformed catalog fails startup here.
    pub fn new(catalog: Catalog, now: Timestamp) -> Result<Self, CatalogError> {
        let table = LimitTable::build(&catalog)?;
        Ok(Self {
            table,
            catalog,
            state: Mutex::new(SessionState::new(now)),
        })
    }

    /// The dense limit table (immutable, lock-free reads)
    pub fn table(&self) -> &LimitTable {
        &self.table
    }

    /// Process one sample end to end
    pub fn process(&self, sample: TelemetrySample, now: Timestamp) -> Outcome {
        self.process_with(sample, now, &mut LogQualitySink)
    }

    /// Process one sample with an explicit data-quality sink
    pub fn process_with(
        &self,
        sample: TelemetrySample,
        now: Timestamp,
        sink: &mut dyn DataQualitySink,
    ) -> Outcome {
        // A panic in a previous evaluation must not take the whole loop
        // down, so a poisoned lock is recovered rather than propagated.
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let stale_alerts = state.observe(&sample, now);
        let effective = state.effective(&sample);
        let row = self.table.row(effective.soc);

        let faults = classify(&effective, state.previous(), row);
        let verdict = arbitrate(faults, effective.mode, &self.catalog, sink);

        state.commit(effective);

        Outcome { verdict, faults, stale_alerts }
    }
}
