//! Persistent weather cache.
//!
//! One entry per key (upsert, no history), a per-UTC-day request counter,
//! and a flat JSON file rewritten after every mutation. A missing or corrupt
//! file never fails startup: the store starts empty and recreates it.

use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Utc};
use common::{Error, WeatherReading};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const DAY_FORMAT: &str = "%Y-%m-%d";

/// Age assigned to entries whose timestamp cannot be parsed, so they only
/// ever serve as stale fallbacks.
const UNPARSEABLE_AGE_HOURS: i64 = 1000;

// ── Keys ──────────────────────────────────────────────────────────────

/// `city:<lowercase trimmed name>`.
pub fn city_key(city: &str) -> String {
    format!("city:{}", city.trim().to_lowercase())
}

/// `geo:<lat>,<lon>` with four decimals. Pass quantized values.
pub fn coords_key(lat: f64, lon: f64) -> String {
    format!("geo:{:.4},{:.4}", lat, lon)
}

/// Snap `v` to the nearest multiple of `step`, then to four decimals.
///
/// Midpoints round to even. A non-positive step returns `v` unchanged.
pub fn quantize(v: f64, step: f64) -> f64 {
    if step <= 0.0 {
        return v;
    }
    let snapped = (v / step).round_ties_even() * step;
    // adding 0.0 turns -0.0 into 0.0 so keys never read "-0.0000"
    (snapped * 10_000.0).round_ties_even() / 10_000.0 + 0.0
}

// ── Store ─────────────────────────────────────────────────────────────

/// A cached reading with the time it was fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub reading: WeatherReading,
    pub saved_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.saved_at
    }
}

/// Process-wide cache state: day stamp, request counter and entries.
#[derive(Debug)]
pub struct CacheStore {
    day_stamp: NaiveDate,
    requests_today: u32,
    entries: HashMap<String, CacheEntry>,
    path: Option<PathBuf>,
}

/// On-disk layout.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheFile {
    day_stamp: String,
    #[serde(default)]
    requests_today: u32,
    #[serde(default)]
    entries: Vec<CacheFileEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheFileEntry {
    key: String,
    saved_at_iso: String,
    reading_json: String,
}

impl CacheStore {
    /// An empty store that is never written to disk.
    pub fn in_memory(now: DateTime<Utc>) -> Self {
        Self {
            day_stamp: now.date_naive(),
            requests_today: 0,
            entries: HashMap::new(),
            path: None,
        }
    }

    /// Load the store from `path`, falling back to an empty store (and
    /// recreating the file) when it is missing or unreadable.
    pub fn load(path: impl Into<PathBuf>, now: DateTime<Utc>) -> Self {
        let path = path.into();
        let mut store = Self {
            path: Some(path.clone()),
            ..Self::in_memory(now)
        };

        if !path.exists() {
            info!("No cache file at {}; starting fresh", path.display());
            store.flush();
            return store;
        }

        match read_cache_file(&path) {
            Ok(file) => {
                store.day_stamp = NaiveDate::parse_from_str(&file.day_stamp, DAY_FORMAT)
                    .unwrap_or_else(|_| now.date_naive());
                store.requests_today = file.requests_today;

                for entry in file.entries {
                    let saved_at = DateTime::parse_from_rfc3339(&entry.saved_at_iso)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|_| now - Duration::hours(UNPARSEABLE_AGE_HOURS));
                    match serde_json::from_str::<WeatherReading>(&entry.reading_json) {
                        Ok(reading) => {
                            store.entries.insert(entry.key, CacheEntry { reading, saved_at });
                        }
                        Err(e) => warn!("Dropping cache entry {}: {}", entry.key, e),
                    }
                }
                debug!(
                    "Loaded {} cache entries from {} (day={}, requests={})",
                    store.entries.len(),
                    path.display(),
                    store.day_stamp,
                    store.requests_today
                );
            }
            Err(e) => {
                warn!("Cache file {} unreadable ({}); starting fresh", path.display(), e);
                store.flush();
            }
        }

        store
    }

    pub fn day_stamp(&self) -> NaiveDate {
        self.day_stamp
    }

    pub fn requests_today(&self) -> u32 {
        self.requests_today
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Entry for `key` only if `now - saved_at <= ttl`.
    pub fn try_get_fresh(
        &self,
        key: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Option<&CacheEntry> {
        self.entries.get(key).filter(|e| e.age(now) <= ttl)
    }

    /// Entry for `key` regardless of age.
    pub fn try_get_any(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Insert or overwrite the entry for `key` and flush.
    pub fn upsert(&mut self, key: &str, reading: WeatherReading, now: DateTime<Utc>) {
        self.insert_entry(key, reading, now);
        self.flush();
    }

    /// Store a freshly fetched reading and count the request, with a single flush.
    pub fn record_fetch(&mut self, key: &str, reading: WeatherReading, now: DateTime<Utc>) {
        self.insert_entry(key, reading, now);
        self.requests_today = self.requests_today.saturating_add(1);
        self.flush();
    }

    /// Drop the entry for `key`, flushing when something was removed.
    pub fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let removed = self.entries.remove(key);
        if removed.is_some() {
            self.flush();
        }
        removed
    }

    /// Reset the request counter when `now` falls on a later UTC day than the
    /// stored stamp. Returns whether a reset happened.
    pub fn reset_daily_counter_if_rolled_over(&mut self, now: DateTime<Utc>) -> bool {
        let today = now.date_naive();
        if self.day_stamp == today {
            return false;
        }
        info!(
            "Day rolled over ({} -> {}); resetting request counter from {}",
            self.day_stamp, today, self.requests_today
        );
        self.day_stamp = today;
        self.requests_today = 0;
        self.flush();
        true
    }

    /// Write the whole store to its file. Failures are logged, never raised.
    pub fn flush(&self) {
        if let Err(e) = self.save() {
            warn!("Cache flush failed: {}", e);
        }
    }

    /// Write the whole store to its file.
    pub fn save(&self) -> Result<(), Error> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let mut entries = Vec::with_capacity(self.entries.len());
        for (key, entry) in &self.entries {
            entries.push(CacheFileEntry {
                key: key.clone(),
                saved_at_iso: entry.saved_at.to_rfc3339_opts(SecondsFormat::Millis, true),
                reading_json: serde_json::to_string(&entry.reading)?,
            });
        }
        entries.sort_by(|a, b| a.key.cmp(&b.key));

        let file = CacheFile {
            day_stamp: self.day_stamp.format(DAY_FORMAT).to_string(),
            requests_today: self.requests_today,
            entries,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec(&file)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Force the day stamp and counter, e.g. when seeding a store.
    pub fn set_quota_state(&mut self, day_stamp: NaiveDate, requests_today: u32) {
        self.day_stamp = day_stamp;
        self.requests_today = requests_today;
        self.flush();
    }

    fn insert_entry(&mut self, key: &str, reading: WeatherReading, now: DateTime<Utc>) {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                reading,
                saved_at: now,
            },
        );
    }
}

fn read_cache_file(path: &Path) -> Result<CacheFile, Error> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}
