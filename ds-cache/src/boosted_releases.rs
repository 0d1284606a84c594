//! Recently observed releases that are sampled at a higher rate.
//!
//! When a project sees a release for the first time, the release is appended to the project's
//! boosted release list together with the time it was boosted. Entries are only considered for
//! [`BOOSTED_RELEASE_TIMEOUT`] after that. The list is never compacted on write, expired entries
//! are dropped when reading and the whole key expires once no release was boosted for the same
//! timeout.
//!
//! Producers of new releases, such as the ingestion hook, go through [`LatestReleaseBooster`]. Rule
//! generation only reads the list.

use std::time::Duration;

use chrono::{DateTime, Utc};
use ds_statsd::metric;
use serde::{Deserialize, Serialize};

use crate::keys;
use crate::statsd::CacheCounters;
use crate::store::{KeyValueStore, StoreError};

/// How long a release stays boosted after it was first observed.
pub const BOOSTED_RELEASE_TIMEOUT: Duration = Duration::from_secs(3600);

/// How long a release is remembered as observed.
pub const OBSERVED_RELEASE_TIMEOUT: Duration = Duration::from_secs(24 * 3600);

/// Expiry of the per-project boost lock in case the holder never releases it.
pub const BOOST_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// A release boosted in a project.
///
/// Stored as a two element array `[release_id, boosted_at]`, where `boosted_at` is a unix
/// timestamp in seconds with fractional part.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(u64, f64)", into = "(u64, f64)")]
pub struct BoostedRelease {
    /// Internal id of the release.
    pub release_id: u64,
    /// Unix timestamp of when the release was boosted.
    pub boosted_at: f64,
}

impl BoostedRelease {
    /// Creates an entry for a release boosted at `now`.
    pub fn new(release_id: u64, now: DateTime<Utc>) -> Self {
        Self {
            release_id,
            boosted_at: timestamp(now),
        }
    }

    /// Returns the boost time as a date, if it is representable.
    pub fn boosted_at(&self) -> Option<DateTime<Utc>> {
        if !self.boosted_at.is_finite() {
            return None;
        }
        DateTime::from_timestamp_micros((self.boosted_at * 1e6) as i64)
    }

    /// Returns the end of the boost window, if it is representable.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let timeout = chrono::Duration::from_std(BOOSTED_RELEASE_TIMEOUT).ok()?;
        self.boosted_at()?.checked_add_signed(timeout)
    }

    /// Returns `true` if the boost is still active at `now`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        timestamp(now) <= self.boosted_at + BOOSTED_RELEASE_TIMEOUT.as_secs_f64()
    }
}

impl From<(u64, f64)> for BoostedRelease {
    fn from((release_id, boosted_at): (u64, f64)) -> Self {
        Self {
            release_id,
            boosted_at,
        }
    }
}

impl From<BoostedRelease> for (u64, f64) {
    fn from(release: BoostedRelease) -> Self {
        (release.release_id, release.boosted_at)
    }
}

fn timestamp(time: DateTime<Utc>) -> f64 {
    time.timestamp_micros() as f64 / 1e6
}

/// Reads the stored list without filtering.
///
/// A list that cannot be parsed is treated as empty.
async fn read_list<S>(store: &S, project_id: u64) -> Result<Vec<BoostedRelease>, StoreError>
where
    S: KeyValueStore + ?Sized,
{
    let Some(raw) = store.get(&keys::boosted_releases(project_id)).await? else {
        return Ok(Vec::new());
    };

    match serde_json::from_str(&raw) {
        Ok(releases) => Ok(releases),
        Err(error) => {
            ds_log::debug!(
                project_id,
                error = &error as &dyn std::error::Error,
                "ignoring corrupt boosted releases"
            );
            metric!(counter(CacheCounters::InvalidEntry) += 1, cache = "boosted_releases");
            Ok(Vec::new())
        }
    }
}

/// Returns the releases of a project that are still boosted at `now`, in insertion order.
pub async fn get_boosted_releases_at<S>(
    store: &S,
    project_id: u64,
    now: DateTime<Utc>,
) -> Result<Vec<BoostedRelease>, StoreError>
where
    S: KeyValueStore + ?Sized,
{
    let mut releases = read_list(store, project_id).await?;
    releases.retain(|release| release.is_active(now));
    Ok(releases)
}

/// Returns the releases of a project that are currently boosted, in insertion order.
pub async fn get_boosted_releases<S>(
    store: &S,
    project_id: u64,
) -> Result<Vec<BoostedRelease>, StoreError>
where
    S: KeyValueStore + ?Sized,
{
    get_boosted_releases_at(store, project_id, Utc::now()).await
}

/// Appends a release boosted at `now` to the project's list.
///
/// The stored list is read and written back as a whole, so concurrent appends race and the last
/// writer wins. Callers that need to avoid this go through [`LatestReleaseBooster`].
pub async fn add_boosted_release_at<S>(
    store: &S,
    project_id: u64,
    release_id: u64,
    now: DateTime<Utc>,
) -> Result<(), StoreError>
where
    S: KeyValueStore + ?Sized,
{
    let mut releases = read_list(store, project_id).await?;
    releases.push(BoostedRelease::new(release_id, now));

    // Serializing a list of numbers cannot fail.
    let value = serde_json::to_string(&releases).unwrap_or_default();
    store
        .set(
            &keys::boosted_releases(project_id),
            value,
            BOOSTED_RELEASE_TIMEOUT,
        )
        .await
}

/// Appends a release boosted now to the project's list.
pub async fn add_boosted_release<S>(
    store: &S,
    project_id: u64,
    release_id: u64,
) -> Result<(), StoreError>
where
    S: KeyValueStore + ?Sized,
{
    add_boosted_release_at(store, project_id, release_id, Utc::now()).await
}

/// Marks a release as observed in a project.
///
/// Returns `true` if the release was not observed within [`OBSERVED_RELEASE_TIMEOUT`] before.
pub async fn observe_release<S>(
    store: &S,
    project_id: u64,
    release_id: u64,
) -> Result<bool, StoreError>
where
    S: KeyValueStore + ?Sized,
{
    let key = keys::observed_release(project_id, release_id);
    store
        .set_nx(&key, "1".to_owned(), OBSERVED_RELEASE_TIMEOUT)
        .await
}

/// A held boost lock of a project.
///
/// The lock expires on its own after [`BOOST_LOCK_TIMEOUT`]. Dropping it without calling
/// [`release`](Self::release) leaves it in place until then.
#[derive(Debug)]
#[must_use = "the lock must be released"]
pub struct BoostLock {
    key: String,
}

impl BoostLock {
    /// Tries to acquire the boost lock of a project.
    ///
    /// Returns `None` if another worker holds the lock.
    pub async fn acquire<S>(store: &S, project_id: u64) -> Result<Option<Self>, StoreError>
    where
        S: KeyValueStore + ?Sized,
    {
        let key = keys::boost_lock(project_id);
        let acquired = store
            .set_nx(&key, "1".to_owned(), BOOST_LOCK_TIMEOUT)
            .await?;
        Ok(acquired.then_some(Self { key }))
    }

    /// Releases the lock.
    pub async fn release<S>(self, store: &S) -> Result<(), StoreError>
    where
        S: KeyValueStore + ?Sized,
    {
        store.delete(&self.key).await
    }
}

/// Result of [`LatestReleaseBooster::boost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoostOutcome {
    /// The release was added to the boosted releases.
    Boosted,
    /// The release was already observed recently and is left alone.
    AlreadyObserved,
    /// Another worker is boosting a release of the same project.
    Contended,
}

/// Boosts releases the first time they are observed in a project.
#[derive(Debug)]
pub struct LatestReleaseBooster<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S> LatestReleaseBooster<'a, S>
where
    S: KeyValueStore + ?Sized,
{
    /// Creates a booster writing to `store`.
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Boosts `release_id` in `project_id` at `now` unless it was observed before.
    pub async fn boost_at(
        &self,
        project_id: u64,
        release_id: u64,
        now: DateTime<Utc>,
    ) -> Result<BoostOutcome, StoreError> {
        let Some(lock) = BoostLock::acquire(self.store, project_id).await? else {
            metric!(counter(CacheCounters::BoostLockContended) += 1);
            return Ok(BoostOutcome::Contended);
        };

        let result = self.boost_locked(project_id, release_id, now).await;
        let released = lock.release(self.store).await;

        let outcome = result?;
        released?;
        Ok(outcome)
    }

    /// Boosts `release_id` in `project_id` unless it was observed before.
    pub async fn boost(&self, project_id: u64, release_id: u64) -> Result<BoostOutcome, StoreError> {
        self.boost_at(project_id, release_id, Utc::now()).await
    }

    async fn boost_locked(
        &self,
        project_id: u64,
        release_id: u64,
        now: DateTime<Utc>,
    ) -> Result<BoostOutcome, StoreError> {
        if !observe_release(self.store, project_id, release_id).await? {
            return Ok(BoostOutcome::AlreadyObserved);
        }

        add_boosted_release_at(self.store, project_id, release_id, now).await?;
        ds_log::debug!(project_id, release_id, "boosted new release");
        metric!(counter(CacheCounters::ReleaseBoosted) += 1);
        Ok(BoostOutcome::Boosted)
    }
}
