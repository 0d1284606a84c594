use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use ds_cache::KeyValueStore;
use ds_cache::low_volume::set_rebalanced_project_rates;

use crate::config::{SamplingSettings, WindowTaskConfig};
use crate::context::TaskContext;
use crate::error::TaskError;
use crate::sliding_window::{org_target_sample_rate, org_volume, rebalance_projects};
use crate::stats::{ProjectVolume, StatsSource};

/// Returns the fraction of sampled volume that was kept by the currently active rules.
///
/// Only volume with a sampling decision counts. Returns `None` if nothing was sampled.
pub(crate) fn observed_keep_rate(volumes: &[ProjectVolume]) -> Option<f64> {
    let (keep, sampled) = volumes.iter().fold((0u64, 0u64), |(keep, sampled), volume| {
        (
            keep.saturating_add(volume.keep),
            sampled
                .saturating_add(volume.keep)
                .saturating_add(volume.drop),
        )
    });
    (sampled > 0).then(|| keep as f64 / sampled as f64)
}

/// Rebalances the sample rates of an organization's projects over a short window.
///
/// Projects with little volume in the window are boosted up to a sample rate of 1, at the expense
/// of the larger projects. The rates expire after a day unless they are rewritten.
pub async fn boost_low_volume_projects_org<St, S>(
    context: &mut TaskContext,
    stats: &St,
    store: &S,
    settings: &SamplingSettings,
    config: &WindowTaskConfig,
    org_id: u64,
    now: DateTime<Utc>,
) -> Result<BTreeMap<u64, f64>, TaskError>
where
    St: StatsSource + ?Sized,
    S: KeyValueStore + ?Sized,
{
    context.check()?;
    let volumes = stats.project_volumes(org_id, config.window()).await?;
    if volumes.is_empty() {
        context.complete();
        return Ok(BTreeMap::new());
    }

    let target = org_target_sample_rate(settings, org_volume(&volumes), config.window_hours, now);
    let rates = rebalance_projects(&volumes, target, settings.rebalance_intensity);

    context.check()?;
    set_rebalanced_project_rates(store, org_id, &rates).await?;
    context.complete();

    ds_log::debug!(
        org_id,
        target,
        observed = ?observed_keep_rate(&volumes),
        projects = rates.len(),
        "rebalanced low volume projects"
    );
    Ok(rates)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::TimeZone;
    use ds_cache::MemoryStore;
    use ds_cache::low_volume::get_rebalanced_project_rate;

    use super::*;
    use crate::context::ScanState;
    use crate::stats::FixtureStats;

    #[tokio::test]
    async fn test_boosts_small_projects() {
        let stats = FixtureStats::from_json(
            r#"{"organizations": [{"id": 5, "volumes": {"1": [
                {"project_id": 51, "total": 9900, "keep": 990, "drop": 8910},
                {"project_id": 52, "total": 10},
                {"project_id": 53, "total": 90}
            ]}}]}"#,
        )
        .unwrap();
        let store = MemoryStore::new();
        let settings = SamplingSettings {
            default_sample_rate: 0.1,
            ..Default::default()
        };
        let config = WindowTaskConfig {
            window_hours: 1,
            max_duration: 60,
        };
        let mut context = TaskContext::new("boost_low_volume_projects_org", Duration::from_secs(60));
        let now = Utc.with_ymd_and_hms(2023, 4, 10, 0, 0, 0).unwrap();

        let rates =
            boost_low_volume_projects_org(&mut context, &stats, &store, &settings, &config, 5, now)
                .await
                .unwrap();

        // Budget 1000: the two small projects are kept, the large one keeps 900.
        assert_eq!(rates[&52], 1.0);
        assert_eq!(rates[&53], 1.0);
        assert_eq!(rates[&51], 900.0 / 9900.0);
        assert_eq!(context.state(), ScanState::Completed);

        assert_eq!(get_rebalanced_project_rate(&store, 5, 52).await, Some(1.0));
        assert_eq!(
            get_rebalanced_project_rate(&store, 5, 51).await,
            Some(900.0 / 9900.0)
        );
    }

    #[test]
    fn test_observed_keep_rate() {
        let volume = |total, keep, drop| ProjectVolume {
            project_id: 1,
            total,
            keep,
            drop,
        };

        assert_eq!(observed_keep_rate(&[]), None);
        assert_eq!(observed_keep_rate(&[volume(100, 0, 0)]), None);
        assert_eq!(
            observed_keep_rate(&[volume(9900, 990, 8910), volume(10, 0, 0)]),
            Some(0.1)
        );
        assert_eq!(
            observed_keep_rate(&[volume(100, 100, 0), volume(300, 0, 300)]),
            Some(0.25)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_job_writes_nothing() {
        let stats = FixtureStats::from_json(r#"{"organizations": [{"id": 5}]}"#).unwrap();
        let store = MemoryStore::new();
        let config = WindowTaskConfig {
            window_hours: 1,
            max_duration: 1,
        };
        let mut context = TaskContext::new("boost_low_volume_projects_org", config.max_duration());
        tokio::time::advance(Duration::from_secs(2)).await;

        let result = boost_low_volume_projects_org(
            &mut context,
            &stats,
            &store,
            &SamplingSettings::default(),
            &config,
            5,
            Utc::now(),
        )
        .await;

        assert!(matches!(result, Err(TaskError::Timeout(_))));
        assert!(store.is_empty());
    }
}
