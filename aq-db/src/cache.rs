//! Explicit time-to-live cache for dashboard queries.
//!
//! Callers consult the cache themselves; nothing is memoized behind their
//! back. The clock is injected so expiry is deterministic in tests.

use crate::models::{AqiPoint, MeasurementPoint};
use crate::Database;
use aq_utils::dates::DateRange;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Default time-to-live of a cached result.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Source of the current instant.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// The real monotonic clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Key to value mapping whose entries expire `ttl` after insertion.
#[derive(Debug)]
pub struct QueryCache<K, V, C = SystemClock> {
    ttl: Duration,
    clock: C,
    entries: HashMap<K, (Instant, V)>,
}

impl<K: Eq + Hash, V: Clone> QueryCache<K, V, SystemClock> {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, SystemClock)
    }
}

impl<K: Eq + Hash, V: Clone, C: Clock> QueryCache<K, V, C> {
    pub fn with_clock(ttl: Duration, clock: C) -> Self {
        QueryCache {
            ttl,
            clock,
            entries: HashMap::new(),
        }
    }

    fn is_fresh(&self, inserted: Instant) -> bool {
        self.clock.now().saturating_duration_since(inserted) < self.ttl
    }

    /// A clone of the cached value, if present and not expired.
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries
            .get(key)
            .filter(|(inserted, _)| self.is_fresh(*inserted))
            .map(|(_, value)| value.clone())
    }

    pub fn insert(&mut self, key: K, value: V) {
        let now = self.clock.now();
        self.entries.insert(key, (now, value));
    }

    /// Return the cached value or compute, store and return a new one.
    /// Errors are returned as-is and nothing is cached.
    pub fn get_or_try_insert_with<E, F>(&mut self, key: K, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }
        let value = compute()?;
        self.insert(key, value.clone());
        Ok(value)
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn purge_expired(&mut self) -> usize {
        let now = self.clock.now();
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries
            .retain(|_, (inserted, _)| now.saturating_duration_since(*inserted) < ttl);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

type MeasurementKey = (i64, i64, Option<DateRange>);
type AqiKey = (i64, Option<DateRange>);

/// The time-series queries behind a TTL cache keyed on their parameters.
pub struct CachedQueries<C: Clock + Clone = SystemClock> {
    db: Database,
    measurements: QueryCache<MeasurementKey, Vec<MeasurementPoint>, C>,
    aqi: QueryCache<AqiKey, Vec<AqiPoint>, C>,
}

impl CachedQueries<SystemClock> {
    pub fn new(db: Database, ttl: Duration) -> Self {
        Self::with_clock(db, ttl, SystemClock)
    }
}

impl<C: Clock + Clone> CachedQueries<C> {
    pub fn with_clock(db: Database, ttl: Duration, clock: C) -> Self {
        CachedQueries {
            db,
            measurements: QueryCache::with_clock(ttl, clock.clone()),
            aqi: QueryCache::with_clock(ttl, clock),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn measurements(
        &mut self,
        station_id: i64,
        pollutant_id: i64,
        range: Option<DateRange>,
    ) -> anyhow::Result<Vec<MeasurementPoint>> {
        let db = &self.db;
        self.measurements
            .get_or_try_insert_with((station_id, pollutant_id, range), || {
                db.query_measurements(station_id, pollutant_id, range.as_ref())
            })
    }

    pub fn aqi(&mut self, station_id: i64, range: Option<DateRange>) -> anyhow::Result<Vec<AqiPoint>> {
        let db = &self.db;
        self.aqi
            .get_or_try_insert_with((station_id, range), || db.query_aqi(station_id, range.as_ref()))
    }

    /// Forget everything, e.g. after a load.
    pub fn invalidate(&mut self) {
        self.measurements.clear();
        self.aqi.clear();
    }
}
