use chrono::{DateTime, Utc};
use ds_cache::KeyValueStore;
use ds_cache::boosted_releases::{BoostOutcome, LatestReleaseBooster};

use crate::error::TaskError;
use crate::stats::ObservedRelease;

/// Boosts the releases that ingestion observed for the first time, as of `now`.
///
/// Releases seen before are left alone, so feeding the same observations twice does not extend the
/// boost. Returns the number of newly boosted releases.
pub async fn boost_observed_releases_at<S>(
    store: &S,
    releases: &[ObservedRelease],
    now: DateTime<Utc>,
) -> Result<usize, TaskError>
where
    S: KeyValueStore + ?Sized,
{
    let booster = LatestReleaseBooster::new(store);
    let mut boosted = 0;

    for release in releases {
        match booster
            .boost_at(release.project_id, release.release_id, now)
            .await?
        {
            BoostOutcome::Boosted => boosted += 1,
            BoostOutcome::AlreadyObserved => (),
            BoostOutcome::Contended => ds_log::debug!(
                project_id = release.project_id,
                release_id = release.release_id,
                "skipped release, project is being boosted elsewhere"
            ),
        }
    }

    ds_log::debug!(
        observed = releases.len(),
        boosted,
        "boosted observed releases"
    );
    Ok(boosted)
}

/// Boosts the releases that ingestion observed for the first time.
///
/// See [`boost_observed_releases_at`].
pub async fn boost_observed_releases<S>(
    store: &S,
    releases: &[ObservedRelease],
) -> Result<usize, TaskError>
where
    S: KeyValueStore + ?Sized,
{
    boost_observed_releases_at(store, releases, Utc::now()).await
}
