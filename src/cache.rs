//! Read-through cache for the employee list
//!
//! Holds a single value: the full list returned by the upstream. Concurrent
//! readers that miss collapse onto one in-flight load and all receive its
//! outcome. Writers call [`EmployeeCache::invalidate`], which bumps the
//! generation and detaches the in-flight load, so any read issued after the
//! write returns starts a fresh load.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

use crate::Result;
use crate::config::CacheConfig;
use crate::model::Employee;

/// Shared list handed to every reader
pub type EmployeeList = Arc<Vec<Employee>>;

/// Outcome broadcast to readers waiting on a load
type LoadOutcome = Option<Result<EmployeeList>>;

/// Single-flight, generation-checked employee list cache
pub struct EmployeeCache {
    enabled: bool,
    ttl: Option<Duration>,
    state: Mutex<CacheState>,
    next_flight: AtomicU64,
    stats: CacheStats,
}

#[derive(Default)]
struct CacheState {
    entry: Option<CacheEntry>,
    /// Bumped by every invalidation
    generation: u64,
    in_flight: Option<InFlight>,
}

struct CacheEntry {
    employees: EmployeeList,
    loaded_at: Instant,
}

struct InFlight {
    id: u64,
    rx: watch::Receiver<LoadOutcome>,
}

/// What a reader does after inspecting the state under the lock
enum Step {
    Hit(EmployeeList),
    Follow(u64, watch::Receiver<LoadOutcome>),
    Lead {
        id: u64,
        generation: u64,
        tx: watch::Sender<LoadOutcome>,
    },
}

/// Cache statistics tracked atomically
#[derive(Debug, Default)]
struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    loads: AtomicU64,
    invalidations: AtomicU64,
}

impl EmployeeCache {
    /// Create a cache from config
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            enabled: config.enabled,
            ttl: config.ttl,
            state: Mutex::new(CacheState::default()),
            next_flight: AtomicU64::new(0),
            stats: CacheStats::default(),
        }
    }

    /// Return the cached list, or run `loader` to fill it
    ///
    /// At most one `loader` runs at a time. Readers arriving while it runs
    /// wait for its result instead of starting their own. Failed loads are
    /// not cached; every waiting reader gets the same error.
    ///
    /// If the reader running the load is dropped mid-flight, one of the
    /// waiting readers takes over with its own `loader`.
    pub async fn get_or_load<F, Fut>(&self, mut loader: F) -> Result<EmployeeList>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Vec<Employee>>>,
    {
        if !self.enabled {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
            self.record_load();
            return loader().await.map(Arc::new);
        }

        let mut counted_miss = false;
        loop {
            match self.next_step() {
                Step::Hit(employees) => {
                    self.stats.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(employees);
                }
                Step::Follow(id, mut rx) => {
                    if !counted_miss {
                        self.stats.misses.fetch_add(1, Ordering::Relaxed);
                        counted_miss = true;
                    }
                    debug!(flight = id, "Waiting for in-flight employee list load");
                    let delivered = match rx.wait_for(Option::is_some).await {
                        Ok(outcome) => outcome.clone(),
                        Err(_) => None,
                    };
                    if let Some(outcome) = delivered {
                        return outcome;
                    }

                    // Loader was dropped before finishing
                    let mut state = self.state.lock();
                    if state.in_flight.as_ref().is_some_and(|f| f.id == id) {
                        state.in_flight = None;
                    }
                }
                Step::Lead { id, generation, tx } => {
                    if !counted_miss {
                        self.stats.misses.fetch_add(1, Ordering::Relaxed);
                    }
                    return self.lead(id, generation, &tx, loader()).await;
                }
            }
        }
    }

    /// Drop the cached list and detach any in-flight load
    ///
    /// Idempotent and never triggers a load by itself.
    pub fn invalidate(&self) {
        let mut state = self.state.lock();
        state.generation += 1;
        state.entry = None;
        state.in_flight = None;
        self.stats.invalidations.fetch_add(1, Ordering::Relaxed);
        debug!(generation = state.generation, "Employee list cache invalidated");
    }

    /// Current statistics
    pub fn stats(&self) -> CacheStatsSnapshot {
        let cached = {
            let state = self.state.lock();
            state.entry.as_ref().is_some_and(|e| self.is_fresh(e))
        };
        CacheStatsSnapshot {
            enabled: self.enabled,
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            loads: self.stats.loads.load(Ordering::Relaxed),
            invalidations: self.stats.invalidations.load(Ordering::Relaxed),
            cached,
        }
    }

    fn next_step(&self) -> Step {
        let mut state = self.state.lock();

        if let Some(entry) = &state.entry {
            if self.is_fresh(entry) {
                return Step::Hit(Arc::clone(&entry.employees));
            }
            debug!("Employee list cache entry expired");
            state.entry = None;
        }

        if let Some(flight) = &state.in_flight {
            return Step::Follow(flight.id, flight.rx.clone());
        }

        let id = self.next_flight.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = watch::channel(None);
        state.in_flight = Some(InFlight { id, rx });
        Step::Lead {
            id,
            generation: state.generation,
            tx,
        }
    }

    async fn lead(
        &self,
        id: u64,
        generation: u64,
        tx: &watch::Sender<LoadOutcome>,
        load: impl Future<Output = Result<Vec<Employee>>>,
    ) -> Result<EmployeeList> {
        self.record_load();
        let outcome = load.await.map(Arc::new);

        {
            let mut state = self.state.lock();
            if let Ok(employees) = &outcome {
                if state.generation == generation {
                    state.entry = Some(CacheEntry {
                        employees: Arc::clone(employees),
                        loaded_at: Instant::now(),
                    });
                } else {
                    debug!(flight = id, "Discarding load superseded by invalidation");
                }
            }
            if state.in_flight.as_ref().is_some_and(|f| f.id == id) {
                state.in_flight = None;
            }
        }

        tx.send_replace(Some(outcome.clone()));
        outcome
    }

    fn record_load(&self) {
        self.stats.loads.fetch_add(1, Ordering::Relaxed);
        telemetry_metrics::counter!("employee_cache_loads_total").increment(1);
    }

    fn is_fresh(&self, entry: &CacheEntry) -> bool {
        self.ttl.is_none_or(|ttl| entry.loaded_at.elapsed() < ttl)
    }
}

/// Snapshot of cache statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStatsSnapshot {
    /// Whether caching is enabled at all
    pub enabled: bool,
    /// Reads served from the cached list
    pub hits: u64,
    /// Reads that found no valid entry
    pub misses: u64,
    /// Upstream loads started
    pub loads: u64,
    /// Invalidations (writes and manual evictions)
    pub invalidations: u64,
    /// Whether a valid list is currently cached
    pub cached: bool,
}
