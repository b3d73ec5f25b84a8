//! Facet counts for the search sidebar, cached with a time-to-live.
//!
//! The cache is a plain value owned by whoever serves searches. Writes to the
//! store never invalidate it; a snapshot is served until it is older than the
//! TTL, then recomputed on the next call.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::Connection;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::storage::sqlite::SqliteStorage;

pub const DEFAULT_FACET_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FacetSnapshot {
    /// `(series, count)`, most common first.
    pub series: Vec<(String, i64)>,
    pub item_types: Vec<(String, i64)>,
    /// `(year, count)` in year order; year is the first four chars of `date_sort`.
    pub years: Vec<(String, i64)>,
    pub boxes: Vec<(i64, i64)>,
    pub models: Vec<(String, i64)>,
    pub languages: Vec<(String, i64)>,
    pub total: i64,
}

/// Monotonic time source, injectable for tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset_ms: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset_ms: AtomicU64::new(0),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.offset_ms
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + Duration::from_millis(self.offset_ms.load(Ordering::SeqCst))
    }
}

pub struct FacetCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    slot: Mutex<Option<(Instant, Arc<FacetSnapshot>)>>,
}

impl Default for FacetCache {
    fn default() -> Self {
        Self::new(DEFAULT_FACET_TTL)
    }
}

impl FacetCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            slot: Mutex::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Current snapshot, recomputed when the cached one has expired.
    ///
    /// The lock is held only to read or swap the slot. Two callers that both
    /// see an expired entry both recompute, and the later store wins.
    pub fn facets(&self, storage: &SqliteStorage) -> Result<Arc<FacetSnapshot>> {
        let now = self.clock.now();
        if let Some((computed_at, snapshot)) = self.slot.lock().as_ref()
            && now.saturating_duration_since(*computed_at) < self.ttl
        {
            return Ok(Arc::clone(snapshot));
        }

        let started = Instant::now();
        let snapshot = Arc::new(compute_facets(storage.raw())?);
        tracing::debug!(
            total = snapshot.total,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "facets recomputed"
        );
        *self.slot.lock() = Some((self.clock.now(), Arc::clone(&snapshot)));
        Ok(snapshot)
    }

    /// Drop the cached snapshot so the next call recomputes.
    pub fn invalidate(&self) {
        self.slot.lock().take();
    }
}

pub fn compute_facets(conn: &Connection) -> Result<FacetSnapshot> {
    Ok(FacetSnapshot {
        series: counts_by(conn, "series")?,
        item_types: counts_by(conn, "item_type")?,
        years: query_pairs(
            conn,
            "SELECT substr(date_sort, 1, 4) AS year, COUNT(*) FROM records
             WHERE date_sort IS NOT NULL AND length(date_sort) >= 4
             GROUP BY year ORDER BY year",
        )?,
        boxes: query_pairs(
            conn,
            "SELECT box_number, COUNT(*) FROM records
             WHERE box_number IS NOT NULL
             GROUP BY box_number ORDER BY box_number",
        )?,
        models: counts_by(conn, "analysis_model")?,
        languages: counts_by(conn, "language")?,
        total: conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))
            .context("counting records for facets")?,
    })
}

/// Value counts of one text column, most frequent first, ties by value.
fn counts_by(conn: &Connection, column: &str) -> Result<Vec<(String, i64)>> {
    let sql = format!(
        "SELECT {column}, COUNT(*) AS n FROM records
         WHERE {column} IS NOT NULL
         GROUP BY {column} ORDER BY n DESC, {column} ASC"
    );
    query_pairs(conn, &sql)
}

fn query_pairs<K: rusqlite::types::FromSql>(conn: &Connection, sql: &str) -> Result<Vec<(K, i64)>> {
    let mut stmt = conn
        .prepare(sql)
        .with_context(|| format!("preparing facet query: {sql}"))?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}
