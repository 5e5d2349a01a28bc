use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, info};

use crate::metrics::QUOTA_KEYS;

// Source of "now" in Unix epoch milliseconds
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

// Clock that only moves when told to
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(start_millis),
        }
    }

    pub fn advance(&self, by: Duration) {
        let by = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        self.now.fetch_add(by, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

// Quota record - tracks admitted requests per caller key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaRecord {
    pub count: u32,
    pub limit: u32, // limit applied by the latest admission
    pub window_reset_at: i64,
}

// Snapshot returned by status queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaStatus {
    pub remaining: u32,
    pub reset_at: i64,
    pub limit: u32,
}

/// Fixed-window request counter keyed by caller.
///
/// The map is sharded, so `admit` only locks the shard that owns the key:
/// the read-check-increment for one key is serialized while other keys
/// proceed in parallel.
pub struct QuotaStore {
    records: DashMap<String, QuotaRecord>,
    window: Duration,
    default_limit: u32,
    clock: Arc<dyn Clock>,
}

impl QuotaStore {
    pub fn new(window: Duration, default_limit: u32) -> Self {
        Self::with_clock(window, default_limit, Arc::new(SystemClock))
    }

    pub fn with_clock(window: Duration, default_limit: u32, clock: Arc<dyn Clock>) -> Self {
        Self {
            records: DashMap::new(),
            window,
            default_limit,
            clock,
        }
    }

    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    fn window_millis(&self) -> i64 {
        i64::try_from(self.window.as_millis()).unwrap_or(i64::MAX)
    }

    /// Counts one request against `key`. Returns `false` once `limit`
    /// requests were already admitted in the current window; a rejected
    /// call leaves the record untouched.
    pub fn admit(&self, key: &str, limit: u32) -> bool {
        let now = self.clock.now_millis();
        let fresh = QuotaRecord {
            count: 1,
            limit,
            window_reset_at: now.saturating_add(self.window_millis()),
        };

        match self.records.entry(key.to_owned()) {
            Entry::Vacant(slot) => {
                slot.insert(fresh);
                true
            }
            Entry::Occupied(mut slot) => {
                let record = slot.get_mut();

                // window expired..? start a new one
                if now >= record.window_reset_at {
                    *record = fresh;
                    return true;
                }

                if record.count < limit {
                    record.count += 1;
                    record.limit = limit;
                    return true;
                }

                false
            }
        }
    }

    /// Remaining quota and reset time for `key`, without counting a request.
    pub fn status_of(&self, key: &str) -> QuotaStatus {
        let now = self.clock.now_millis();
        let next_reset = now.saturating_add(self.window_millis());

        match self.records.get(key) {
            Some(record) if now < record.window_reset_at => QuotaStatus {
                remaining: record.limit.saturating_sub(record.count),
                reset_at: record.window_reset_at,
                limit: record.limit,
            },
            // expired but not yet purged: the next admit opens a fresh window
            Some(record) => QuotaStatus {
                remaining: record.limit,
                reset_at: next_reset,
                limit: record.limit,
            },
            None => QuotaStatus {
                remaining: self.default_limit,
                reset_at: next_reset,
                limit: self.default_limit,
            },
        }
    }

    /// Drops records whose window ended at least `grace_windows` windows ago.
    /// Returns how many were removed.
    pub fn purge_expired(&self, grace_windows: u32) -> usize {
        let now = self.clock.now_millis();
        let grace = self.window_millis().saturating_mul(i64::from(grace_windows));
        let mut removed = 0;

        self.records.retain(|_, record| {
            let keep = now < record.window_reset_at.saturating_add(grace);
            if !keep {
                removed += 1;
            }
            keep
        });

        removed
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// Periodic expiry sweep - keeps the store bounded under key churn
pub async fn quota_sweeper(store: Arc<QuotaStore>, every: Duration, grace_windows: u32) {
    let mut interval = interval(every);

    info!(every = ?every, grace_windows, "Quota sweeper started");

    loop {
        interval.tick().await;

        let removed = store.purge_expired(grace_windows);
        QUOTA_KEYS.set(store.len() as f64);

        if removed > 0 {
            debug!(removed, remaining_keys = store.len(), "Purged expired quota records");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    const WINDOW: Duration = Duration::from_secs(60);
    const START: i64 = 1_700_000_000_000;

    fn store_with_clock() -> (QuotaStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(START));
        let store = QuotaStore::with_clock(WINDOW, 60, clock.clone());
        (store, clock)
    }

    #[test]
    fn rejects_the_request_after_the_limit() {
        let (store, _clock) = store_with_clock();

        for _ in 0..5 {
            assert!(store.admit("ip:10.0.0.1", 5));
        }
        assert!(!store.admit("ip:10.0.0.1", 5));
        assert!(!store.admit("ip:10.0.0.1", 5));
    }

    #[test]
    fn rejection_leaves_record_untouched() {
        let (store, _clock) = store_with_clock();

        assert!(store.admit("caller", 1));
        let before = store.status_of("caller");
        assert!(!store.admit("caller", 1));
        assert_eq!(store.status_of("caller"), before);
    }

    #[test]
    fn window_expiry_starts_a_fresh_count() {
        let (store, clock) = store_with_clock();

        for _ in 0..3 {
            assert!(store.admit("caller", 3));
        }
        assert!(!store.admit("caller", 3));

        // exactly at the reset instant the window is over
        clock.advance(WINDOW);
        assert!(store.admit("caller", 3));

        let status = store.status_of("caller");
        assert_eq!(status.remaining, 2);
        assert_eq!(status.reset_at, START + 2 * 60_000);
    }

    #[test]
    fn still_inside_window_one_millisecond_before_reset() {
        let (store, clock) = store_with_clock();

        assert!(store.admit("caller", 1));
        clock.advance(WINDOW - Duration::from_millis(1));
        assert!(!store.admit("caller", 1));
    }

    #[test]
    fn status_for_unknown_key_is_a_hypothetical_fresh_window() {
        let (store, _clock) = store_with_clock();

        let status = store.status_of("nobody");
        assert_eq!(status.remaining, 60);
        assert_eq!(status.limit, 60);
        assert_eq!(status.reset_at, START + 60_000);
        assert!(store.is_empty());
    }

    #[test]
    fn status_reports_against_the_limit_used_at_admission() {
        let (store, _clock) = store_with_clock();

        assert!(store.admit("anon", 5));
        let status = store.status_of("anon");
        assert_eq!(status.limit, 5);
        assert_eq!(status.remaining, 4);
        assert_eq!(status.reset_at, START + 60_000);
    }

    #[test]
    fn remaining_never_goes_negative() {
        let (store, _clock) = store_with_clock();

        for _ in 0..10 {
            store.admit("caller", 10);
        }
        // a stricter tier on the same key is rejected outright
        assert!(!store.admit("caller", 2));

        let status = store.status_of("caller");
        assert_eq!(status.remaining, 0);
        assert!(status.remaining <= status.limit);
    }

    #[test]
    fn status_of_an_expired_record_reports_a_full_quota() {
        let (store, clock) = store_with_clock();

        store.admit("caller", 4);
        store.admit("caller", 4);
        clock.advance(WINDOW * 2);

        let status = store.status_of("caller");
        assert_eq!(status.remaining, 4);
        assert!(status.reset_at > clock.now_millis());
    }

    #[test]
    fn keys_are_counted_independently() {
        let (store, _clock) = store_with_clock();

        assert!(store.admit("a", 1));
        assert!(!store.admit("a", 1));
        assert!(store.admit("b", 1));
    }

    #[test]
    fn concurrent_admits_never_over_admit() {
        let store = Arc::new(QuotaStore::new(WINDOW, 60));
        let limit = 10;
        let attempts = 64;

        let admitted = thread::scope(|scope| {
            let handles: Vec<_> = (0..attempts)
                .map(|_| {
                    let store = Arc::clone(&store);
                    scope.spawn(move || store.admit("shared", limit))
                })
                .collect();

            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|admitted| *admitted)
                .count()
        });

        assert_eq!(admitted, limit as usize);
        assert_eq!(store.status_of("shared").remaining, 0);
    }

    #[test]
    fn purge_drops_only_long_expired_records() {
        let (store, clock) = store_with_clock();

        store.admit("old", 5);
        clock.advance(Duration::from_secs(90));
        store.admit("recent", 5);

        // "old" ended 30s ago, still inside a one-window grace
        assert_eq!(store.purge_expired(1), 0);

        clock.advance(Duration::from_secs(30));
        assert_eq!(store.purge_expired(1), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.status_of("recent").remaining, 4);
    }

    #[test]
    fn purge_with_zero_grace_drops_every_expired_record() {
        let (store, clock) = store_with_clock();

        store.admit("a", 5);
        store.admit("b", 5);
        clock.advance(WINDOW);
        store.admit("c", 5);

        assert_eq!(store.purge_expired(0), 2);
        assert_eq!(store.len(), 1);
    }
}
