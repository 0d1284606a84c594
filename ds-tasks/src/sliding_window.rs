use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use ds_cache::KeyValueStore;
use ds_cache::sliding_window::{extrapolate_monthly_volume, set_sliding_window_sample_rates};

use crate::config::{SamplingSettings, WindowTaskConfig};
use crate::context::TaskContext;
use crate::error::TaskError;
use crate::rebalancing::{RebalanceClass, full_rebalance};
use crate::stats::{ProjectVolume, StatsSource};

/// Returns the target sample rate of an organization.
///
/// The volume observed within `window_hours` is extrapolated to the current month and looked up
/// in the configured tiers. Without a matching tier, the default sample rate applies.
pub fn org_target_sample_rate(
    settings: &SamplingSettings,
    volume: u64,
    window_hours: u32,
    now: DateTime<Utc>,
) -> f64 {
    extrapolate_monthly_volume(volume, i64::from(window_hours), now)
        .and_then(|monthly| settings.tiers.sample_rate_for(monthly))
        .unwrap_or(settings.default_sample_rate)
}

/// Sums the total volume of all projects.
pub(crate) fn org_volume(volumes: &[ProjectVolume]) -> u64 {
    volumes
        .iter()
        .fold(0u64, |sum, volume| sum.saturating_add(volume.total))
}

/// Rebalances projects by their total volume.
pub(crate) fn rebalance_projects(
    volumes: &[ProjectVolume],
    sample_rate: f64,
    intensity: f64,
) -> BTreeMap<u64, f64> {
    let classes: Vec<_> = volumes
        .iter()
        .map(|volume| RebalanceClass {
            id: volume.project_id,
            count: volume.total,
        })
        .collect();

    full_rebalance(&classes, sample_rate, intensity)
        .into_iter()
        .map(|class| (class.id, class.sample_rate))
        .collect()
}

/// Recomputes the sliding window sample rates of an organization's projects.
///
/// Returns the rates written to the cache. Organizations without volume in the window are left
/// untouched.
pub async fn sliding_window_org<St, S>(
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
        ds_log::debug!(org_id, "no volume in sliding window");
        context.complete();
        return Ok(BTreeMap::new());
    }

    let target = org_target_sample_rate(settings, org_volume(&volumes), config.window_hours, now);
    let rates = rebalance_projects(&volumes, target, settings.rebalance_intensity);

    context.check()?;
    set_sliding_window_sample_rates(store, org_id, &rates).await?;
    context.complete();

    ds_log::debug!(
        org_id,
        target,
        projects = rates.len(),
        "updated sliding window sample rates"
    );
    Ok(rates)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::TimeZone;
    use ds_cache::MemoryStore;
    use ds_cache::sliding_window::get_sliding_window_sample_rate;

    use super::*;
    use crate::config::{SampleRateTier, SampleRateTiers};
    use crate::stats::FixtureStats;

    fn settings() -> SamplingSettings {
        SamplingSettings {
            default_sample_rate: 0.5,
            tiers: SampleRateTiers(vec![
                SampleRateTier {
                    volume: 0,
                    sample_rate: 1.0,
                },
                SampleRateTier {
                    volume: 1_000_000,
                    sample_rate: 0.1,
                },
            ]),
            rebalance_intensity: 1.0,
        }
    }

    fn now() -> DateTime<Utc> {
        // 30 days in April
        Utc.with_ymd_and_hms(2023, 4, 10, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_target_rate() {
        let settings = settings();
        // 40_000 per day is 1_200_000 per month.
        assert_eq!(org_target_sample_rate(&settings, 40_000, 24, now()), 0.1);
        assert_eq!(org_target_sample_rate(&settings, 100, 24, now()), 1.0);
        // No extrapolation for an empty window.
        assert_eq!(org_target_sample_rate(&settings, 100, 0, now()), 0.5);

        let no_tiers = SamplingSettings {
            tiers: SampleRateTiers::default(),
            ..settings
        };
        assert_eq!(org_target_sample_rate(&no_tiers, 100, 24, now()), 0.5);
    }

    #[tokio::test]
    async fn test_writes_rebalanced_rates() {
        let stats = FixtureStats::from_json(
            r#"{"organizations": [{"id": 1, "volumes": {"24": [
                {"project_id": 11, "total": 39000},
                {"project_id": 12, "total": 1000}
            ]}}]}"#,
        )
        .unwrap();
        let store = MemoryStore::new();
        let mut context = TaskContext::new("sliding_window_org", Duration::from_secs(60));

        let config = WindowTaskConfig {
            window_hours: 24,
            max_duration: 60,
        };
        let rates = sliding_window_org(&mut context, &stats, &store, &settings(), &config, 1, now())
            .await
            .unwrap();

        // Budget 4000: the small project is kept entirely, the large one keeps the remaining 3000.
        assert_eq!(rates[&12], 1.0);
        assert_eq!(rates[&11], 3000.0 / 39000.0);
        assert_eq!(
            get_sliding_window_sample_rate(&store, 1, 12, 0.0).await,
            1.0
        );
        assert_eq!(
            get_sliding_window_sample_rate(&store, 1, 11, 0.0).await,
            3000.0 / 39000.0
        );
    }

    #[tokio::test]
    async fn test_no_volume_leaves_cache() {
        let stats = FixtureStats::from_json(r#"{"organizations": [{"id": 1}]}"#).unwrap();
        let store = MemoryStore::new();
        let mut context = TaskContext::new("sliding_window_org", Duration::from_secs(60));
        let config = WindowTaskConfig {
            window_hours: 24,
            max_duration: 60,
        };

        let rates = sliding_window_org(&mut context, &stats, &store, &settings(), &config, 1, now())
            .await
            .unwrap();
        assert!(rates.is_empty());
        assert!(store.is_empty());
    }
}
