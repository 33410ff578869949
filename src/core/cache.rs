use std::{
    collections::{BTreeMap, HashMap},
    fmt::{Display, Formatter},
    sync::Arc,
};

use chrono::{DateTime, Local, NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{
    core::error::ForecastError,
    db::{Db, state::State},
    prelude::*,
};

/// Forecast cache key: the target date plus a digest of the parameters that affect the result.
#[must_use]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    date: NaiveDate,
    digest: String,
}

impl CacheKey {
    pub fn new(date: NaiveDate, parameters: &str) -> Self {
        Self { date, digest: format!("{:x}", md5::compute(parameters)) }
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.date, self.digest)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    /// Fetched during this call.
    Fresh,

    /// Served from the cache within the TTL.
    Cached,

    /// Expired entry served because the fetch failed.
    Stale,
}

#[must_use]
#[derive(Clone, Debug)]
pub struct Fetched<V> {
    pub value: V,
    pub generated_at: DateTime<Local>,
    pub freshness: Freshness,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Entry<V> {
    pub generated_at: DateTime<Local>,
    pub value: V,
}

/// Persisted cache contents.
#[derive(Serialize, Deserialize)]
pub struct Entries<V>(pub BTreeMap<String, Entry<V>>);

/// Memoizes forecasts per key for the TTL.
///
/// Concurrent calls for the same key wait for the single in-flight fetch.
pub struct ForecastCache<V> {
    ttl: TimeDelta,
    is_enabled: bool,
    db: Option<Db>,
    entries: Mutex<BTreeMap<String, Entry<V>>>,
    key_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<V: Clone> ForecastCache<V>
where
    Entries<V>: State,
{
    /// Entries older than this are dropped on the next store.
    const RETENTION: TimeDelta = TimeDelta::days(7);

    /// Load the previously persisted entries, starting afresh if they are unreadable.
    #[instrument(skip_all, fields(id = ?<Entries<V> as State>::ID))]
    pub fn load(db: Db, ttl: TimeDelta) -> Self {
        let entries = match db.states().get::<Entries<V>>() {
            Ok(entries) => entries.map(|entries| entries.0).unwrap_or_default(),
            Err(error) => {
                warn!("discarding the cache: {error:#}");
                BTreeMap::new()
            }
        };
        debug!(n_entries = entries.len(), "loaded");
        Self::new(ttl, true, Some(db), entries)
    }

    pub fn in_memory(ttl: TimeDelta) -> Self {
        Self::new(ttl, true, None, BTreeMap::new())
    }

    /// Always fetch, never store.
    pub fn disabled() -> Self {
        Self::new(TimeDelta::zero(), false, None, BTreeMap::new())
    }

    fn new(ttl: TimeDelta, is_enabled: bool, db: Option<Db>, entries: BTreeMap<String, Entry<V>>) -> Self {
        Self {
            ttl,
            is_enabled,
            db,
            entries: Mutex::new(entries),
            key_locks: Mutex::new(HashMap::new()),
        }
    }

    #[instrument(skip_all, fields(key = %key))]
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: &CacheKey,
        now: DateTime<Local>,
        fetch: F,
    ) -> Result<Fetched<V>, ForecastError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, ForecastError>>,
    {
        if !self.is_enabled {
            let value = fetch().await.map_err(Self::unavailable)?;
            return Ok(Fetched { value, generated_at: now, freshness: Freshness::Fresh });
        }

        let key = key.to_string();
        let key_lock = self.key_locks.lock().await.entry(key.clone()).or_default().clone();
        let _guard = key_lock.lock().await;

        let previous = self.entries.lock().await.get(&key).cloned();
        if let Some(entry) = &previous
            && now - entry.generated_at <= self.ttl
        {
            debug!(generated_at = ?entry.generated_at, "cache hit");
            return Ok(Fetched {
                value: entry.value.clone(),
                generated_at: entry.generated_at,
                freshness: Freshness::Cached,
            });
        }

        match fetch().await {
            Ok(value) => {
                self.store(key, Entry { generated_at: now, value: value.clone() }, now).await;
                Ok(Fetched { value, generated_at: now, freshness: Freshness::Fresh })
            }
            Err(error) => match previous {
                Some(entry) => {
                    warn!(generated_at = ?entry.generated_at, "{error:#}, using the stale forecast");
                    Ok(Fetched {
                        value: entry.value,
                        generated_at: entry.generated_at,
                        freshness: Freshness::Stale,
                    })
                }
                None => Err(Self::unavailable(error)),
            },
        }
    }

    async fn store(&self, key: String, entry: Entry<V>, now: DateTime<Local>) {
        let mut entries = self.entries.lock().await;
        entries.retain(|_, entry| now - entry.generated_at <= Self::RETENTION);
        entries.insert(key, entry);
        if let Some(db) = &self.db
            && let Err(error) = db.states().set(&Entries(entries.clone()))
        {
            warn!("failed to persist the cache: {error:#}");
        }
    }

    fn unavailable(error: ForecastError) -> ForecastError {
        match error {
            ForecastError::FetchFailure(error) => ForecastError::NoForecastAvailable(error),
            error => error,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use approx::assert_abs_diff_eq;
    use chrono::TimeZone;

    use super::*;
    use crate::{core::demand::DemandEstimate, quantity::energy::KilowattHours};

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 6, 10, 21, 0, 0).unwrap()
    }

    fn key() -> CacheKey {
        CacheKey::new(NaiveDate::from_ymd_opt(2025, 6, 11).unwrap(), "demand|sensor.load|30")
    }

    fn estimate(energy: f64) -> DemandEstimate {
        DemandEstimate { energy: KilowattHours(energy), confidence: 1.0 }
    }

    async fn fetch_ok(n_calls: &AtomicUsize, energy: f64) -> Result<DemandEstimate, ForecastError> {
        n_calls.fetch_add(1, Ordering::Relaxed);
        tokio::task::yield_now().await;
        Ok(estimate(energy))
    }

    async fn fetch_failing() -> Result<DemandEstimate, ForecastError> {
        Err(ForecastError::FetchFailure(anyhow!("offline")))
    }

    #[tokio::test]
    async fn hit_within_ttl() -> Result {
        let cache = ForecastCache::in_memory(TimeDelta::minutes(120));
        let n_calls = AtomicUsize::new(0);
        let first = cache.get_or_fetch(&key(), now(), || fetch_ok(&n_calls, 10.0)).await?;
        let second = cache
            .get_or_fetch(&key(), now() + TimeDelta::minutes(119), || fetch_ok(&n_calls, 12.0))
            .await?;
        assert_eq!(first.freshness, Freshness::Fresh);
        assert_eq!(second.freshness, Freshness::Cached);
        assert_abs_diff_eq!(second.value.energy.0, 10.0);
        assert_eq!(n_calls.load(Ordering::Relaxed), 1);
        Ok(())
    }

    #[tokio::test]
    async fn expired_entry_is_refetched() -> Result {
        let cache = ForecastCache::in_memory(TimeDelta::minutes(120));
        let n_calls = AtomicUsize::new(0);
        cache.get_or_fetch(&key(), now(), || fetch_ok(&n_calls, 10.0)).await?;
        let second = cache
            .get_or_fetch(&key(), now() + TimeDelta::minutes(121), || fetch_ok(&n_calls, 12.0))
            .await?;
        assert_eq!(second.freshness, Freshness::Fresh);
        assert_abs_diff_eq!(second.value.energy.0, 12.0);
        assert_eq!(n_calls.load(Ordering::Relaxed), 2);
        Ok(())
    }

    #[tokio::test]
    async fn stale_entry_on_failure() -> Result {
        let cache = ForecastCache::in_memory(TimeDelta::minutes(120));
        let n_calls = AtomicUsize::new(0);
        cache.get_or_fetch(&key(), now(), || fetch_ok(&n_calls, 10.0)).await?;
        let fetched =
            cache.get_or_fetch(&key(), now() + TimeDelta::hours(5), fetch_failing).await?;
        assert_eq!(fetched.freshness, Freshness::Stale);
        assert_eq!(fetched.generated_at, now());
        assert_abs_diff_eq!(fetched.value.energy.0, 10.0);
        Ok(())
    }

    #[tokio::test]
    async fn failure_without_entry_is_unavailable() {
        let cache = ForecastCache::<DemandEstimate>::in_memory(TimeDelta::minutes(120));
        let result = cache.get_or_fetch(&key(), now(), fetch_failing).await;
        assert!(matches!(result, Err(ForecastError::NoForecastAvailable(_))));
    }

    #[tokio::test]
    async fn insufficient_history_is_passed_through() {
        let cache = ForecastCache::<DemandEstimate>::in_memory(TimeDelta::minutes(120));
        let result = cache
            .get_or_fetch(&key(), now(), || async {
                Err(ForecastError::InsufficientHistory("no samples".into()))
            })
            .await;
        assert!(matches!(result, Err(ForecastError::InsufficientHistory(_))));
    }

    #[tokio::test]
    async fn disabled_always_fetches() -> Result {
        let cache = ForecastCache::disabled();
        let n_calls = AtomicUsize::new(0);
        cache.get_or_fetch(&key(), now(), || fetch_ok(&n_calls, 10.0)).await?;
        let second = cache.get_or_fetch(&key(), now(), || fetch_ok(&n_calls, 10.0)).await?;
        assert_eq!(second.freshness, Freshness::Fresh);
        assert_eq!(n_calls.load(Ordering::Relaxed), 2);
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_calls_fetch_once() -> Result {
        let cache = ForecastCache::in_memory(TimeDelta::minutes(120));
        let n_calls = AtomicUsize::new(0);
        let (key_1, key_2) = (key(), key());
        let (first, second) = tokio::join!(
            cache.get_or_fetch(&key_1, now(), || fetch_ok(&n_calls, 10.0)),
            cache.get_or_fetch(&key_2, now(), || fetch_ok(&n_calls, 10.0)),
        );
        assert_eq!(first?.freshness, Freshness::Fresh);
        assert_eq!(second?.freshness, Freshness::Cached);
        assert_eq!(n_calls.load(Ordering::Relaxed), 1);
        Ok(())
    }

    #[tokio::test]
    async fn persisted_between_runs() -> Result {
        let directory = tempfile::tempdir()?;
        let n_calls = AtomicUsize::new(0);
        ForecastCache::load(Db::open(directory.path())?, TimeDelta::minutes(120))
            .get_or_fetch(&key(), now(), || fetch_ok(&n_calls, 10.0))
            .await?;
        let fetched = ForecastCache::load(Db::open(directory.path())?, TimeDelta::minutes(120))
            .get_or_fetch(&key(), now() + TimeDelta::minutes(30), || fetch_ok(&n_calls, 12.0))
            .await?;
        assert_eq!(fetched.freshness, Freshness::Cached);
        assert_abs_diff_eq!(fetched.value.energy.0, 10.0);
        assert_eq!(n_calls.load(Ordering::Relaxed), 1);
        Ok(())
    }
}
