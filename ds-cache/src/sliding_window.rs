//! Per-project sample rates computed over a rolling window of ingested volume.
//!
//! The sliding window task writes one hash per organization mapping project ids to sample rates.
//! Readers fall back to a default rate whenever the hash or the field is unusable.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use ds_statsd::metric;

use crate::keys;
use crate::statsd::CacheCounters;
use crate::store::{KeyValueStore, StoreError};

/// Returns the sliding window sample rate of a project, or `default` if none is available.
///
/// Missing entries, values that are not finite numbers and store failures all yield `default`.
pub async fn get_sliding_window_sample_rate<S>(
    store: &S,
    org_id: u64,
    project_id: u64,
    default: f64,
) -> f64
where
    S: KeyValueStore + ?Sized,
{
    let key = keys::sliding_window(org_id);
    let raw = match store.hget(&key, &project_id.to_string()).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return default,
        Err(error) => {
            ds_log::warn!(
                org_id,
                project_id,
                error = &error as &dyn std::error::Error,
                "failed to read sliding window sample rate"
            );
            return default;
        }
    };

    match raw.parse::<f64>() {
        Ok(rate) if rate.is_finite() => rate,
        _ => {
            ds_log::debug!(
                org_id,
                project_id,
                raw = raw.as_str(),
                "ignoring invalid sliding window rate"
            );
            metric!(counter(CacheCounters::InvalidEntry) += 1, cache = "sliding_window");
            default
        }
    }
}

/// Replaces the sliding window sample rates of an organization.
///
/// The hash does not expire. It is rewritten on every run of the sliding window task.
pub async fn set_sliding_window_sample_rates<S>(
    store: &S,
    org_id: u64,
    rates: &BTreeMap<u64, f64>,
) -> Result<(), StoreError>
where
    S: KeyValueStore + ?Sized,
{
    let fields = rates
        .iter()
        .map(|(project_id, rate)| (project_id.to_string(), rate.to_string()))
        .collect();

    store
        .hset_all(&keys::sliding_window(org_id), fields, None)
        .await
}

/// Returns the number of days in the month containing `date`.
fn days_in_month(date: NaiveDate) -> Option<i64> {
    let first = date.with_day(1)?;
    let next = match first.month() {
        12 => NaiveDate::from_ymd_opt(first.year().checked_add(1)?, 1, 1)?,
        month => NaiveDate::from_ymd_opt(first.year(), month + 1, 1)?,
    };
    Some((next - first).num_days())
}

/// Extrapolates a volume observed over the last `hours` to the whole month of `now`.
///
/// Returns `None` if `hours` is less than one or the month cannot be determined. The result is
/// rounded down.
pub fn extrapolate_monthly_volume(volume: u64, hours: i64, now: DateTime<Utc>) -> Option<u64> {
    if hours < 1 {
        return None;
    }

    let hours_in_month = days_in_month(now.date_naive())? * 24;
    Some((volume as f64 * (hours_in_month as f64 / hours as f64)) as u64)
}
