//! Weather service: fetch orchestration, cache policy and fan-out.
//!
//! Per request key:
//! 1. join an identical in-flight request instead of issuing a new one
//! 2. roll the daily request counter over on a new UTC day
//! 3. serve a fresh cache entry without touching the network
//! 4. serve a stale entry when the daily quota is spent
//! 5. otherwise call the provider, falling back to any cached entry on failure
//!
//! The in-flight marker is owned by a guard, so it is cleared on every exit
//! path. Fetch failures are logged and never returned to the caller; they
//! only show up as "no reading".

use crate::cache::{city_key, coords_key, quantize, CacheEntry, CacheStore};
use crate::clock::{Clock, SystemClock};
use crate::presets;
use crate::provider::WeatherProvider;
use common::config::CacheConfig;
use common::{WeatherQuery, WeatherReading};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, error, info, warn};

const UPDATE_CHANNEL_CAPACITY: usize = 16;
const DEFAULT_DEDUP_WAIT: Duration = Duration::from_secs(30);

/// Freshness, quota and quantization settings.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    pub ttl: chrono::Duration,
    pub daily_request_limit: u32,
    pub coord_grid: f64,
    /// How long a duplicate request waits for the original before giving up
    /// and answering from the cache as-is.
    pub dedup_wait: Duration,
}

impl CachePolicy {
    pub fn from_config(cfg: &CacheConfig) -> Self {
        Self {
            ttl: chrono::Duration::milliseconds((cfg.ttl_hours * 3_600_000.0) as i64),
            daily_request_limit: cfg.daily_request_limit,
            coord_grid: cfg.coord_grid,
            dedup_wait: DEFAULT_DEDUP_WAIT,
        }
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

/// Where a returned reading came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOrigin {
    /// Provider call made by this request.
    Network,
    /// Cache entry within TTL.
    FreshCache,
    /// Stale entry served because the daily quota is spent.
    StaleQuota,
    /// Stale entry served because the provider call failed.
    StaleFallback,
    /// Result of an identical request that was already in flight.
    Shared,
    /// Named preset, no provider involved.
    Preset,
}

/// A reading plus its origin.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    pub reading: WeatherReading,
    pub origin: FetchOrigin,
}

type InFlightMap = DashMap<String, watch::Receiver<()>>;

/// Marks a key as in flight for as long as it lives. Dropping it removes the
/// key and closes the channel, which wakes every waiter.
struct InFlightGuard<'a> {
    map: &'a InFlightMap,
    key: String,
    _done: watch::Sender<()>,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        // the sender field drops after this, so waiters never see the key
        self.map.remove(&self.key);
    }
}

enum Flight<'a> {
    Leader(InFlightGuard<'a>),
    Follower(watch::Receiver<()>),
}

enum Plan {
    Use(WeatherReading, FetchOrigin),
    Fetch,
}

/// Fetches readings through a provider and publishes them to subscribers.
///
/// Subscribers get every published reading through [`subscribe`]; dropping
/// the receiver unsubscribes. [`current`] returns the last published reading.
///
/// [`subscribe`]: WeatherService::subscribe
/// [`current`]: WeatherService::current
pub struct WeatherService<P, C = SystemClock> {
    provider: P,
    clock: C,
    policy: CachePolicy,
    store: Mutex<CacheStore>,
    in_flight: InFlightMap,
    updates: broadcast::Sender<WeatherReading>,
    current: watch::Sender<Option<WeatherReading>>,
}

impl<P: WeatherProvider> WeatherService<P> {
    pub fn new(provider: P, store: CacheStore, policy: CachePolicy) -> Self {
        Self::with_clock(provider, store, policy, SystemClock)
    }
}

impl<P: WeatherProvider, C: Clock> WeatherService<P, C> {
    pub fn with_clock(provider: P, store: CacheStore, policy: CachePolicy, clock: C) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        let (current, _) = watch::channel(None);
        Self {
            provider,
            clock,
            policy,
            store: Mutex::new(store),
            in_flight: DashMap::new(),
            updates,
            current,
        }
    }

    /// Receive every reading published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<WeatherReading> {
        self.updates.subscribe()
    }

    /// The last published reading, if any.
    pub fn current(&self) -> Option<WeatherReading> {
        self.current.borrow().clone()
    }

    /// Watch the last published reading.
    pub fn watch_current(&self) -> watch::Receiver<Option<WeatherReading>> {
        self.current.subscribe()
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.in_flight.contains_key(key)
    }

    pub async fn requests_today(&self) -> u32 {
        self.store.lock().await.requests_today()
    }

    pub async fn cached(&self, key: &str) -> Option<CacheEntry> {
        self.store.lock().await.try_get_any(key).cloned()
    }

    /// Make `reading` current and send it to every subscriber.
    pub fn publish(&self, reading: WeatherReading) {
        self.current.send_replace(Some(reading.clone()));
        if self.updates.send(reading).is_err() {
            debug!("Weather updated with no subscribers");
        }
    }

    /// Fetch by city name.
    pub async fn fetch_by_city(&self, city: &str) -> Option<Fetched> {
        let city = city.trim();
        if city.is_empty() {
            warn!("Empty city name; nothing to fetch");
            return None;
        }
        if !self.provider.has_credential() {
            error!("No API key configured; cannot fetch weather for {}", city);
            return None;
        }

        self.fetch_core(
            city_key(city),
            WeatherQuery::City(city.to_string()),
            city.to_string(),
        )
        .await
    }

    /// Drop the cached entry for `city` and fetch it again.
    pub async fn refresh_city(&self, city: &str) -> Option<Fetched> {
        let key = city_key(city);
        if !city.trim().is_empty() && !self.is_in_flight(&key) {
            if self.store.lock().await.remove(&key).is_some() {
                debug!("Evicted {} for forced refresh", key);
            }
        }
        self.fetch_by_city(city).await
    }

    /// Fetch by coordinates, quantized to the configured grid first.
    pub async fn fetch_by_coords(&self, lat: f64, lon: f64) -> Option<Fetched> {
        if !self.provider.has_credential() {
            error!("No API key configured; cannot fetch weather for ({}, {})", lat, lon);
            return None;
        }

        let q_lat = quantize(lat, self.policy.coord_grid);
        let q_lon = quantize(lon, self.policy.coord_grid);
        let label = format!("@{:.3},{:.3}", q_lat, q_lon);

        self.fetch_core(
            coords_key(q_lat, q_lon),
            WeatherQuery::Coords {
                lat: q_lat,
                lon: q_lon,
            },
            label,
        )
        .await
    }

    /// Presets first, then a city lookup.
    ///
    /// Preset readings are returned directly and not published.
    pub async fn resolve_city_input(&self, input: &str) -> Option<Fetched> {
        match presets::resolve(input) {
            Ok(reading) => {
                info!("Preset '{}' resolved locally", input.trim());
                Some(Fetched {
                    reading,
                    origin: FetchOrigin::Preset,
                })
            }
            Err(_) => self.fetch_by_city(input).await,
        }
    }

    // ── Core ──────────────────────────────────────────────────────────

    fn begin_flight(&self, key: &str) -> Flight<'_> {
        match self.in_flight.entry(key.to_string()) {
            Entry::Occupied(e) => Flight::Follower(e.get().clone()),
            Entry::Vacant(v) => {
                let (done, waiter) = watch::channel(());
                v.insert(waiter);
                Flight::Leader(InFlightGuard {
                    map: &self.in_flight,
                    key: key.to_string(),
                    _done: done,
                })
            }
        }
    }

    async fn fetch_core(&self, key: String, query: WeatherQuery, label: String) -> Option<Fetched> {
        let _flight = match self.begin_flight(&key) {
            Flight::Leader(guard) => guard,
            Flight::Follower(done) => return self.await_shared(&key, done).await,
        };

        let now = self.clock.now();
        let plan = {
            let mut store = self.store.lock().await;
            store.reset_daily_counter_if_rolled_over(now);

            if let Some(fresh) = store.try_get_fresh(&key, self.policy.ttl, now) {
                info!("CACHE HIT (fresh) key={}", key);
                Plan::Use(fresh.reading.clone(), FetchOrigin::FreshCache)
            } else if store.requests_today() >= self.policy.daily_request_limit {
                match store.try_get_any(&key) {
                    Some(stale) => {
                        info!("CACHE HIT (stale; daily limit reached) key={}", key);
                        Plan::Use(stale.reading.clone(), FetchOrigin::StaleQuota)
                    }
                    None => {
                        warn!(
                            "Daily request limit {} reached and nothing cached for {}; calling provider",
                            self.policy.daily_request_limit, key
                        );
                        Plan::Fetch
                    }
                }
            } else {
                Plan::Fetch
            }
        };

        if let Plan::Use(reading, origin) = plan {
            self.publish(reading.clone());
            return Some(Fetched { reading, origin });
        }

        match self.provider.fetch(&query).await {
            Ok(reading) => {
                let reading = reading.with_source(label);
                info!("API USED key={} | {}", key, reading);

                self.store
                    .lock()
                    .await
                    .record_fetch(&key, reading.clone(), self.clock.now());
                self.publish(reading.clone());

                Some(Fetched {
                    reading,
                    origin: FetchOrigin::Network,
                })
            }
            Err(e) => {
                if e.is_config() {
                    error!("Weather fetch for {} aborted: {}", key, e);
                } else {
                    warn!("Weather fetch for {} failed: {}", key, e);
                }

                let fallback = self
                    .store
                    .lock()
                    .await
                    .try_get_any(&key)
                    .map(|entry| entry.reading.clone());

                match fallback {
                    Some(reading) => {
                        info!("Using cached reading for {} after failure", key);
                        self.publish(reading.clone());
                        Some(Fetched {
                            reading,
                            origin: FetchOrigin::StaleFallback,
                        })
                    }
                    None => None,
                }
            }
        }
    }

    async fn await_shared(&self, key: &str, mut done: watch::Receiver<()>) -> Option<Fetched> {
        debug!("Request for {} already in flight; waiting", key);
        // the sender only ever closes, so `changed` resolves when the leader finishes
        if tokio::time::timeout(self.policy.dedup_wait, done.changed())
            .await
            .is_err()
        {
            warn!("Timed out waiting for in-flight request {}; answering from cache", key);
        }

        let entry = self.store.lock().await.try_get_any(key).cloned()?;
        self.publish(entry.reading.clone());
        Some(Fetched {
            reading: entry.reading,
            origin: FetchOrigin::Shared,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use common::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Clone)]
    struct FakeProvider {
        calls: Arc<AtomicUsize>,
        reading: Option<WeatherReading>,
        credential: bool,
        delay: Duration,
    }

    impl FakeProvider {
        fn ok(reading: WeatherReading) -> Self {
            Self {
                calls: Arc::new(AtomicUsize::new(0)),
                reading: Some(reading),
                credential: true,
                delay: Duration::from_millis(20),
            }
        }

        fn failing() -> Self {
            Self {
                reading: None,
                ..Self::ok(sample("", 0.0))
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl WeatherProvider for FakeProvider {
        fn has_credential(&self) -> bool {
            self.credential
        }

        async fn fetch(&self, _query: &WeatherQuery) -> Result<WeatherReading, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.reading
                .clone()
                .ok_or_else(|| Error::Transport("connection refused".into()))
        }
    }

    #[derive(Clone)]
    struct ManualClock(Arc<std::sync::Mutex<DateTime<Utc>>>);

    impl ManualClock {
        fn at(now: DateTime<Utc>) -> Self {
            Self(Arc::new(std::sync::Mutex::new(now)))
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
    }

    fn sample(label: &str, temp: f32) -> WeatherReading {
        WeatherReading {
            temperature_c: temp,
            wind_speed_ms: 1.0,
            precipitation_mm_h: 0.8,
            cloudiness: 0.9,
            is_snow: false,
            source_label: label.into(),
        }
    }

    fn service(
        provider: FakeProvider,
        store: CacheStore,
    ) -> WeatherService<FakeProvider, ManualClock> {
        WeatherService::with_clock(provider, store, CachePolicy::default(), ManualClock::at(noon()))
    }

    #[tokio::test]
    async fn test_fresh_cache_hit_skips_network() {
        let mut store = CacheStore::in_memory(noon());
        store.upsert("city:paris", sample("Paris", 9.0), noon() - chrono::Duration::hours(1));
        let provider = FakeProvider::ok(sample("", 30.0));
        let svc = service(provider.clone(), store);
        let mut rx = svc.subscribe();

        let got = svc.fetch_by_city("Paris").await.expect("cached reading");

        assert_eq!(got.origin, FetchOrigin::FreshCache);
        assert_eq!(got.reading.temperature_c, 9.0);
        assert_eq!(provider.calls(), 0);
        assert_eq!(rx.try_recv().unwrap(), got.reading);
        assert_eq!(svc.current(), Some(got.reading));
        assert!(!svc.is_in_flight("city:paris"));
    }

    #[tokio::test]
    async fn test_quota_exhausted_serves_stale_without_network() {
        let mut store = CacheStore::in_memory(noon());
        store.upsert("city:paris", sample("Paris", 4.0), noon() - chrono::Duration::hours(48));
        store.set_quota_state(noon().date_naive(), 1000);
        let provider = FakeProvider::ok(sample("", 30.0));
        let svc = service(provider.clone(), store);

        let got = svc.fetch_by_city("paris").await.expect("stale reading");

        assert_eq!(got.origin, FetchOrigin::StaleQuota);
        assert_eq!(got.reading.temperature_c, 4.0);
        assert_eq!(svc.requests_today().await, 1000);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_network_fetch_updates_cache_counter_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let provider = FakeProvider::ok(sample("", 17.0));
        let svc = service(provider.clone(), CacheStore::load(&path, noon()));

        let got = svc.fetch_by_city("  Kraków ").await.expect("network reading");

        assert_eq!(got.origin, FetchOrigin::Network);
        assert_eq!(got.reading.source_label, "Kraków");
        assert_eq!(provider.calls(), 1);
        assert_eq!(svc.requests_today().await, 1);
        assert!(svc.cached("city:kraków").await.is_some());

        let reloaded = CacheStore::load(&path, noon());
        assert_eq!(reloaded.requests_today(), 1);
        assert_eq!(reloaded.try_get_any("city:kraków").unwrap().reading, got.reading);
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_stale_entry() {
        let mut store = CacheStore::in_memory(noon());
        store.upsert("city:rome", sample("Rome", 21.0), noon() - chrono::Duration::hours(48));
        let provider = FakeProvider::failing();
        let svc = service(provider.clone(), store);

        let got = svc.fetch_by_city("Rome").await.expect("fallback reading");

        assert_eq!(got.origin, FetchOrigin::StaleFallback);
        assert_eq!(got.reading.temperature_c, 21.0);
        assert_eq!(provider.calls(), 1);
        assert_eq!(svc.requests_today().await, 0);
        assert!(!svc.is_in_flight("city:rome"));
    }

    #[tokio::test]
    async fn test_failure_without_cache_publishes_nothing() {
        let provider = FakeProvider::failing();
        let svc = service(provider.clone(), CacheStore::in_memory(noon()));
        let mut rx = svc.subscribe();

        assert!(svc.fetch_by_city("Nowhere").await.is_none());
        assert!(rx.try_recv().is_err());
        assert!(svc.current().is_none());
        assert!(!svc.is_in_flight("city:nowhere"));
    }

    #[tokio::test]
    async fn test_concurrent_same_key_makes_one_call() {
        let provider = FakeProvider::ok(sample("", 2.0));
        let svc = service(provider.clone(), CacheStore::in_memory(noon()));

        let (a, b) = tokio::join!(svc.fetch_by_city("Oslo"), svc.fetch_by_city("oslo"));
        let (a, b) = (a.expect("leader"), b.expect("follower"));

        assert_eq!(provider.calls(), 1);
        assert_eq!(a.origin, FetchOrigin::Network);
        assert_eq!(b.origin, FetchOrigin::Shared);
        assert_eq!(a.reading, b.reading);
        assert!(!svc.is_in_flight("city:oslo"));
    }

    fn impatient(
        provider: FakeProvider,
        store: CacheStore,
    ) -> WeatherService<FakeProvider, ManualClock> {
        let policy = CachePolicy {
            dedup_wait: Duration::from_millis(10),
            ..CachePolicy::default()
        };
        WeatherService::with_clock(provider, store, policy, ManualClock::at(noon()))
    }

    #[tokio::test]
    async fn test_follower_timeout_answers_stale_while_leader_finishes() {
        let mut store = CacheStore::in_memory(noon());
        store.upsert("city:rome", sample("Rome", 21.0), noon() - chrono::Duration::hours(48));
        let provider = FakeProvider {
            delay: Duration::from_millis(200),
            ..FakeProvider::ok(sample("", 25.0))
        };
        let svc = impatient(provider.clone(), store);

        let (leader, follower) = tokio::join!(svc.fetch_by_city("Rome"), async {
            let got = svc.fetch_by_city("rome").await;
            // the leader is still waiting on the provider
            assert!(svc.is_in_flight("city:rome"));
            got
        });

        let follower = follower.expect("stale reading");
        assert_eq!(follower.origin, FetchOrigin::Shared);
        assert_eq!(follower.reading.temperature_c, 21.0);

        let leader = leader.expect("network reading");
        assert_eq!(leader.origin, FetchOrigin::Network);
        assert_eq!(provider.calls(), 1);
        assert_eq!(svc.cached("city:rome").await.unwrap().reading.temperature_c, 25.0);
        assert_eq!(svc.requests_today().await, 1);
        assert!(!svc.is_in_flight("city:rome"));
    }

    #[tokio::test]
    async fn test_follower_timeout_without_cache_gets_nothing() {
        let provider = FakeProvider {
            delay: Duration::from_millis(200),
            ..FakeProvider::ok(sample("", 25.0))
        };
        let svc = impatient(provider.clone(), CacheStore::in_memory(noon()));

        let (leader, follower) =
            tokio::join!(svc.fetch_by_city("Lima"), svc.fetch_by_city("lima"));

        assert!(follower.is_none());
        assert_eq!(leader.expect("network reading").origin, FetchOrigin::Network);
        assert_eq!(provider.calls(), 1);
        assert!(svc.cached("city:lima").await.is_some());
        assert!(!svc.is_in_flight("city:lima"));
    }

    #[tokio::test]
    async fn test_follower_of_failed_request_gets_nothing() {
        let provider = FakeProvider::failing();
        let svc = service(provider.clone(), CacheStore::in_memory(noon()));

        let (a, b) = tokio::join!(svc.fetch_by_city("Oslo"), svc.fetch_by_city("Oslo"));

        assert!(a.is_none());
        assert!(b.is_none());
        assert_eq!(provider.calls(), 1);
        assert!(!svc.is_in_flight("city:oslo"));
    }

    #[tokio::test]
    async fn test_different_keys_fetch_independently() {
        let provider = FakeProvider::ok(sample("", 5.0));
        let svc = service(provider.clone(), CacheStore::in_memory(noon()));

        let (a, b) = tokio::join!(svc.fetch_by_city("Oslo"), svc.fetch_by_city("Bergen"));

        assert_eq!(provider.calls(), 2);
        assert_eq!(a.unwrap().reading.source_label, "Oslo");
        assert_eq!(b.unwrap().reading.source_label, "Bergen");
        assert_eq!(svc.requests_today().await, 2);
    }

    #[tokio::test]
    async fn test_missing_credential_aborts_before_cache() {
        let mut store = CacheStore::in_memory(noon());
        store.upsert("city:paris", sample("Paris", 9.0), noon());
        let provider = FakeProvider {
            credential: false,
            ..FakeProvider::ok(sample("", 1.0))
        };
        let svc = service(provider.clone(), store);

        assert!(svc.fetch_by_city("Paris").await.is_none());
        assert!(svc.fetch_by_coords(52.2, 21.0).await.is_none());
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_city_is_ignored() {
        let provider = FakeProvider::ok(sample("", 1.0));
        let svc = service(provider.clone(), CacheStore::in_memory(noon()));

        assert!(svc.fetch_by_city("   ").await.is_none());
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_counter_resets_on_new_utc_day() {
        let yesterday = noon() - chrono::Duration::days(1);
        let mut store = CacheStore::in_memory(yesterday);
        store.upsert("city:paris", sample("Paris", 4.0), yesterday);
        store.set_quota_state(yesterday.date_naive(), 1000);
        let provider = FakeProvider::ok(sample("", 12.0));
        let svc = service(provider.clone(), store);

        let got = svc.fetch_by_city("Paris").await.unwrap();

        assert_eq!(got.origin, FetchOrigin::Network);
        assert_eq!(svc.requests_today().await, 1);
    }

    #[tokio::test]
    async fn test_nearby_coordinates_share_one_entry() {
        let provider = FakeProvider::ok(sample("", -3.0));
        let svc = service(provider.clone(), CacheStore::in_memory(noon()));

        let first = svc.fetch_by_coords(52.23, 21.01).await.unwrap();
        let second = svc.fetch_by_coords(51.8, 20.6).await.unwrap();

        assert_eq!(first.origin, FetchOrigin::Network);
        assert_eq!(first.reading.source_label, "@52.000,21.000");
        assert_eq!(second.origin, FetchOrigin::FreshCache);
        assert_eq!(provider.calls(), 1);
        assert!(svc.cached("geo:52.0000,21.0000").await.is_some());
    }

    #[tokio::test]
    async fn test_preset_input_skips_network() {
        let provider = FakeProvider::ok(sample("", 10.0));
        let svc = service(provider.clone(), CacheStore::in_memory(noon()));

        let preset = svc.resolve_city_input("rain").await.unwrap();
        assert_eq!(preset.origin, FetchOrigin::Preset);
        assert_eq!(preset.reading, presets::resolve("rain").unwrap());
        assert_eq!(provider.calls(), 0);
        assert!(svc.current().is_none());

        let city = svc.resolve_city_input("Lisbon").await.unwrap();
        assert_eq!(city.origin, FetchOrigin::Network);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_refresh_city_bypasses_fresh_entry() {
        let mut store = CacheStore::in_memory(noon());
        store.upsert("city:paris", sample("Paris", 9.0), noon());
        let provider = FakeProvider::ok(sample("", 15.0));
        let svc = service(provider.clone(), store);

        let got = svc.refresh_city("Paris").await.unwrap();

        assert_eq!(got.origin, FetchOrigin::Network);
        assert_eq!(got.reading.temperature_c, 15.0);
        assert_eq!(provider.calls(), 1);
    }
}
