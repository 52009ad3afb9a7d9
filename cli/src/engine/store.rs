//! Accumulated per-process energy state.
//!
//! The store is the only durable state in a session. It is owned behind a
//! shared lock: the attribution engine is the single writer, the
//! presentation layer reads through [`StoreReader`] and can never touch a
//! record directly. The lock is only ever held for the short fold/snapshot
//! critical section, never across a source read.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use super::ring::RingBuffer;
use super::TickSummary;

/// Running totals for one process name.
///
/// Records are created lazily the first tick a name shows utilization > 0
/// and never removed: a process that exits keeps its record, frozen, so the
/// energy it spent remains visible for the rest of the session. Several OS
/// processes sharing a name share one record by design.
#[derive(Debug, Clone)]
pub struct ProcessEnergyRecord {
    pub name: String,

    /// Millijoules attributed from the package rail. Non-decreasing.
    pub cpu_energy_mj: f64,

    /// Millijoules attributed from the system rail. Non-decreasing; only
    /// grows on ticks where a system power reading was present.
    pub system_energy_mj: f64,

    /// Utilization percent seen on the most recent tick that touched this
    /// record. Overwritten, not accumulated.
    pub last_cpu_percent: f64,

    /// Package power share (mW) from the most recent touching tick.
    pub last_power_mw: f64,

    /// Recent package power shares, oldest first.
    pub power_history: RingBuffer,
}

impl ProcessEnergyRecord {
    fn new(name: String, history_capacity: usize) -> Self {
        Self {
            name,
            cpu_energy_mj: 0.0,
            system_energy_mj: 0.0,
            last_cpu_percent: 0.0,
            last_power_mw: 0.0,
            power_history: RingBuffer::new(history_capacity),
        }
    }
}

/// Session-level counters the presentation layer shows alongside records.
#[derive(Debug, Clone)]
pub struct SessionStats {
    pub started_at: Instant,
    pub tick_count: u64,
    pub degraded_ticks: u64,
    pub consecutive_degraded: u32,
    pub interval_secs: u64,
    pub focus: Option<String>,
    pub last_summary: Option<TickSummary>,
}

impl SessionStats {
    fn new(interval_secs: u64) -> Self {
        Self {
            started_at: Instant::now(),
            tick_count: 0,
            degraded_ticks: 0,
            consecutive_degraded: 0,
            interval_secs,
            focus: None,
            last_summary: None,
        }
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// True once enough ticks in a row have gone without samples that the
    /// operator should be warned.
    pub fn sensors_degraded(&self) -> bool {
        self.consecutive_degraded >= super::DEGRADED_WARNING_STREAK
    }
}

pub struct AccumulatedStateStore {
    records: HashMap<String, ProcessEnergyRecord>,
    session: SessionStats,
    history_capacity: usize,
}

impl AccumulatedStateStore {
    pub fn new(interval_secs: u64, history_capacity: usize) -> Self {
        Self {
            records: HashMap::new(),
            session: SessionStats::new(interval_secs),
            history_capacity,
        }
    }

    /// Look up or lazily create the record for a process name.
    pub(super) fn record_mut(&mut self, name: &str) -> &mut ProcessEnergyRecord {
        let capacity = self.history_capacity;
        self.records
            .entry(name.to_string())
            .or_insert_with(|| ProcessEnergyRecord::new(name.to_string(), capacity))
    }

    pub(super) fn session_mut(&mut self) -> &mut SessionStats {
        &mut self.session
    }

    pub fn session(&self) -> &SessionStats {
        &self.session
    }

    pub fn get(&self, name: &str) -> Option<&ProcessEnergyRecord> {
        self.records.get(name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records ranked by cumulative CPU energy, highest first. Ties break on
    /// name so repeated snapshots of unchanged state order identically.
    pub fn snapshot(&self) -> Vec<ProcessEnergyRecord> {
        let mut records: Vec<_> = self.records.values().cloned().collect();
        records.sort_by(|a, b| {
            b.cpu_energy_mj
                .partial_cmp(&a.cpu_energy_mj)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });
        records
    }
}

pub type SharedStore = Arc<RwLock<AccumulatedStateStore>>;

pub fn shared(store: AccumulatedStateStore) -> SharedStore {
    Arc::new(RwLock::new(store))
}

/// Read-only handle the presentation layer holds.
#[derive(Clone)]
pub struct StoreReader {
    inner: SharedStore,
}

impl StoreReader {
    pub fn new(inner: SharedStore) -> Self {
        Self { inner }
    }

    pub fn snapshot(&self) -> Vec<ProcessEnergyRecord> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot()
    }

    pub fn get(&self, name: &str) -> Option<ProcessEnergyRecord> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn session(&self) -> SessionStats {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .session()
            .clone()
    }
}
