//! TTL cache for location analyses
//!
//! Keys quantize coordinates to 3 decimal degrees (~111 m) so nearby
//! queries share an entry. Expiry is lazy: an entry at or past its TTL is
//! removed by the `get` that finds it. Inserts into a full cache purge
//! expired entries first, then the oldest one.
//!
//! Per-key async locks let the engine run check → compute → store for one
//! key at a time, so concurrent misses coalesce into one computation.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::models::LocationCoverage;
use crate::providers::{explicit_provider, AUTO_PROVIDER};

/// Default time-to-live (30 minutes)
pub const DEFAULT_TTL_SECS: i64 = 30 * 60;

/// Default capacity bound
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// `round(lat,3)_round(lng,3)_selector`
pub fn cache_key(lat: f64, lng: f64, provider: Option<&str>) -> String {
    let selector = explicit_provider(provider).unwrap_or(AUTO_PROVIDER);
    format!("{:.3}_{:.3}_{}", quantize(lat), quantize(lng), selector)
}

fn quantize(value: f64) -> f64 {
    // + 0.0 folds -0.0 into 0.0 so both sides of the equator/meridian agree
    (value * 1000.0).round() / 1000.0 + 0.0
}

/// Cache entry with the time it was stored
struct CacheEntry {
    data: LocationCoverage,
    stored_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub max_entries: usize,
    pub ttl_secs: i64,
}

pub struct CoverageCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    key_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    ttl: Duration,
    max_entries: usize,
}

enum EntryState {
    Valid,
    Expired,
    Corrupt,
}

impl CoverageCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            key_locks: Mutex::new(HashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn state(&self, entry: &CacheEntry, now: DateTime<Utc>) -> EntryState {
        let age = now - entry.stored_at;
        if age < Duration::zero() {
            EntryState::Corrupt
        } else if age < self.ttl {
            EntryState::Valid
        } else {
            EntryState::Expired
        }
    }

    /// Cached analysis for `key`, if present and younger than the TTL
    pub async fn get(&self, key: &str, now: DateTime<Utc>) -> Option<LocationCoverage> {
        let mut entries = self.entries.lock().await;
        let state = self.state(entries.get(key)?, now);

        match state {
            EntryState::Valid => {
                debug!(key, "Cache hit");
                entries.get(key).map(|e| e.data.clone())
            }
            EntryState::Expired => {
                debug!(key, "Cache entry expired, evicting");
                entries.remove(key);
                None
            }
            EntryState::Corrupt => {
                warn!(key, "Cache entry stamped in the future, evicting");
                entries.remove(key);
                None
            }
        }
    }

    pub async fn set(&self, key: String, data: LocationCoverage, now: DateTime<Utc>) {
        let mut entries = self.entries.lock().await;

        if !entries.contains_key(&key) && entries.len() >= self.max_entries {
            let before = entries.len();
            entries.retain(|_, e| matches!(self.state(e, now), EntryState::Valid));
            if before != entries.len() {
                debug!(purged = before - entries.len(), "Purged expired cache entries");
            }

            if entries.len() >= self.max_entries {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, e)| e.stored_at)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    debug!(key = %oldest, "Cache full, evicting oldest entry");
                    entries.remove(&oldest);
                }
            }
        }

        entries.insert(
            key,
            CacheEntry {
                data,
                stored_at: now,
            },
        );
    }

    /// Exclusive guard for one key; hold it across check → compute → store
    pub async fn lock_key(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.key_locks.lock().await;
            // Drop locks nobody holds or waits on
            locks.retain(|k, l| k == key || Arc::strong_count(l) > 1);
            locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    pub async fn stats(&self, now: DateTime<Utc>) -> CacheStats {
        let entries = self.entries.lock().await;
        let valid_entries = entries
            .values()
            .filter(|e| matches!(self.state(e, now), EntryState::Valid))
            .count();

        CacheStats {
            total_entries: entries.len(),
            valid_entries,
            max_entries: self.max_entries,
            ttl_secs: self.ttl.num_seconds(),
        }
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }
}

impl Default for CoverageCache {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_TTL_SECS), DEFAULT_MAX_ENTRIES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Location;

    fn coverage(lat: f64, lng: f64, at: DateTime<Utc>) -> LocationCoverage {
        LocationCoverage {
            location: Location {
                lat,
                lng,
                address: None,
            },
            mobile_providers: Vec::new(),
            broadband_providers: Vec::new(),
            analysis_timestamp: at,
            data_period: crate::DATA_PERIOD.to_string(),
        }
    }

    #[test]
    fn test_cache_key_format() {
        assert_eq!(cache_key(43.6532, -79.3832, None), "43.653_-79.383_auto");
        assert_eq!(cache_key(43.6532, -79.3832, Some("auto")), "43.653_-79.383_auto");
        assert_eq!(cache_key(43.6532, -79.3832, Some("Rogers")), "43.653_-79.383_Rogers");
    }

    #[test]
    fn test_cache_key_merges_nearby_points() {
        assert_eq!(cache_key(43.65321, -79.38318, None), cache_key(43.6532, -79.3832, None));
        assert_ne!(cache_key(43.6532, -79.3832, None), cache_key(43.6552, -79.3832, None));
        assert_eq!(cache_key(-0.0001, 0.0001, None), cache_key(0.0001, -0.0001, None));
    }

    #[tokio::test]
    async fn test_hit_within_ttl() {
        let cache = CoverageCache::default();
        let t0 = Utc::now();
        let key = cache_key(43.6532, -79.3832, None);
        cache.set(key.clone(), coverage(43.6532, -79.3832, t0), t0).await;

        let hit = cache.get(&key, t0 + Duration::minutes(5)).await.unwrap();
        assert_eq!(hit.analysis_timestamp, t0);
        assert!(cache.get(&key, t0 + Duration::minutes(29)).await.is_some());
    }

    #[tokio::test]
    async fn test_expired_entry_evicted_on_get() {
        let cache = CoverageCache::default();
        let t0 = Utc::now();
        cache.set("k".to_string(), coverage(0.0, 0.0, t0), t0).await;

        // Exactly at the TTL the entry is no longer valid
        assert!(cache.get("k", t0 + Duration::minutes(30)).await.is_none());
        let stats = cache.stats(t0).await;
        assert_eq!(stats.total_entries, 0);
    }

    #[tokio::test]
    async fn test_future_stamped_entry_treated_as_miss() {
        let cache = CoverageCache::default();
        let t0 = Utc::now();
        cache.set("k".to_string(), coverage(0.0, 0.0, t0), t0 + Duration::hours(1)).await;

        assert!(cache.get("k", t0).await.is_none());
        assert_eq!(cache.stats(t0).await.total_entries, 0);
    }

    #[tokio::test]
    async fn test_capacity_evicts_expired_then_oldest() {
        let cache = CoverageCache::new(Duration::minutes(30), 2);
        let t0 = Utc::now();

        cache.set("a".to_string(), coverage(1.0, 1.0, t0), t0).await;
        cache.set("b".to_string(), coverage(2.0, 2.0, t0), t0 + Duration::minutes(10)).await;

        // "a" has expired by now, so it goes first
        let t1 = t0 + Duration::minutes(35);
        cache.set("c".to_string(), coverage(3.0, 3.0, t1), t1).await;
        assert!(cache.get("a", t1).await.is_none());
        assert!(cache.get("b", t1).await.is_some());
        assert!(cache.get("c", t1).await.is_some());

        // Both valid: the oldest ("b") is evicted
        let t2 = t1 + Duration::minutes(1);
        cache.set("d".to_string(), coverage(4.0, 4.0, t2), t2).await;
        assert!(cache.get("b", t2).await.is_none());
        assert!(cache.get("c", t2).await.is_some());
        assert!(cache.get("d", t2).await.is_some());
        assert_eq!(cache.stats(t2).await.total_entries, 2);
    }

    #[tokio::test]
    async fn test_overwrite_does_not_evict() {
        let cache = CoverageCache::new(Duration::minutes(30), 1);
        let t0 = Utc::now();
        cache.set("a".to_string(), coverage(1.0, 1.0, t0), t0).await;
        cache.set("a".to_string(), coverage(1.0, 1.0, t0), t0 + Duration::minutes(1)).await;
        assert_eq!(cache.stats(t0 + Duration::minutes(1)).await.total_entries, 1);
    }

    #[tokio::test]
    async fn test_stats_and_clear() {
        let cache = CoverageCache::default();
        let t0 = Utc::now();
        cache.set("a".to_string(), coverage(1.0, 1.0, t0), t0).await;
        cache.set("b".to_string(), coverage(2.0, 2.0, t0), t0 + Duration::minutes(20)).await;

        let stats = cache.stats(t0 + Duration::minutes(31)).await;
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.valid_entries, 1);
        assert_eq!(stats.ttl_secs, DEFAULT_TTL_SECS);

        cache.clear().await;
        assert_eq!(cache.stats(t0).await.total_entries, 0);
    }

    #[tokio::test]
    async fn test_concurrent_writers_keep_map_consistent() {
        let cache = Arc::new(CoverageCache::default());
        let t0 = Utc::now();

        let handles: Vec<_> = (0..64)
            .map(|i| {
                let cache = cache.clone();
                tokio::spawn(async move {
                    let key = format!("k{}", i % 8);
                    cache.set(key.clone(), coverage(i as f64, 0.0, t0), t0).await;
                    cache.get(&key, t0).await
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap().is_some());
        }
        assert_eq!(cache.stats(t0).await.total_entries, 8);
    }

    #[tokio::test]
    async fn test_key_lock_is_exclusive() {
        let cache = Arc::new(CoverageCache::default());
        let guard = cache.lock_key("k").await;

        let contender = {
            let cache = cache.clone();
            tokio::spawn(async move {
                let _g = cache.lock_key("k").await;
            })
        };

        tokio::task::yield_now().await;
        assert!(!contender.is_finished());

        // Other keys are not blocked
        let _other = cache.lock_key("other").await;

        drop(guard);
        contender.await.unwrap();
    }
}
