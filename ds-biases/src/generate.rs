use chrono::{DateTime, Utc};
use ds_cache::KeyValueStore;
use ds_cache::low_volume::get_rebalanced_project_rate;
use ds_cache::sliding_window::get_sliding_window_sample_rate;
use ds_rules::SamplingRule;
use ds_statsd::metric;

use crate::bias::{BiasContext, BiasKind};
use crate::combinator::BiasCombinator;
use crate::multiplexer::FeatureMultiplexer;
use crate::project::Project;
use crate::registry::BiasRegistry;
use crate::statsd::{BiasDistributions, BiasTimers};

/// The order in which biases are evaluated.
///
/// The edge applies the first matching sample rate, so reductions come first and the uniform rule
/// is always last.
pub const EVALUATION_ORDER: [BiasKind; 7] = [
    BiasKind::IgnoreHealthChecks,
    BiasKind::BoostReplayId,
    BiasKind::BoostEnvironments,
    BiasKind::BoostLatestRelease,
    BiasKind::BoostKeyTransactions,
    BiasKind::MinimumSampleRate,
    BiasKind::Uniform,
];

/// Resolves the base sample rate of a project.
///
/// A rebalanced low volume rate takes precedence over the sliding window rate, which falls back to
/// the organization's default rate.
pub async fn get_base_sample_rate<S>(store: &S, project: &Project, org_default_rate: f64) -> f64
where
    S: KeyValueStore + ?Sized,
{
    let rate = match get_rebalanced_project_rate(store, project.organization_id, project.id).await
    {
        Some(rate) => rate,
        None => {
            get_sliding_window_sample_rate(
                store,
                project.organization_id,
                project.id,
                org_default_rate,
            )
            .await
        }
    };

    rate.clamp(0.0, 1.0)
}

/// Computes the ordered sampling rules of a project at `now`.
pub async fn generate_rules_at<S>(
    registry: &BiasRegistry,
    store: &S,
    project: &Project,
    org_default_rate: f64,
    now: DateTime<Utc>,
) -> Vec<SamplingRule>
where
    S: KeyValueStore + ?Sized,
{
    let start = std::time::Instant::now();

    let base_sample_rate = get_base_sample_rate(store, project, org_default_rate).await;
    let enabled = FeatureMultiplexer::new(registry).get_enabled_biases(project.user_biases());

    let combinator = EVALUATION_ORDER
        .into_iter()
        .filter(|kind| !kind.is_toggleable() || enabled.contains(kind))
        .fold(BiasCombinator::new(registry), BiasCombinator::combine);

    let context = BiasContext::new(project, store, base_sample_rate).at(now);
    let rules = combinator.get_combined_rules(&context).await;

    ds_log::trace!(
        project_id = project.id,
        base_sample_rate,
        rule_count = rules.len(),
        "generated sampling rules"
    );
    metric!(timer(BiasTimers::GenerateRules) = start.elapsed());
    metric!(distribution(BiasDistributions::RuleCount) = rules.len() as u64);

    rules
}

/// Computes the ordered sampling rules of a project.
pub async fn generate_rules<S>(
    registry: &BiasRegistry,
    store: &S,
    project: &Project,
    org_default_rate: f64,
) -> Vec<SamplingRule>
where
    S: KeyValueStore + ?Sized,
{
    generate_rules_at(registry, store, project, org_default_rate, Utc::now()).await
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::TimeZone;
    use ds_cache::MemoryStore;
    use ds_cache::boosted_releases::add_boosted_release_at;
    use ds_cache::low_volume::set_rebalanced_project_rates;
    use ds_cache::sliding_window::set_sliding_window_sample_rates;
    use ds_rules::{ReservedIds, RuleId, SamplingValue};

    use super::*;
    use crate::project::{ProjectOptions, UserBias};

    fn ids(rules: &[SamplingRule]) -> Vec<u32> {
        rules.iter().map(|rule| rule.id.0).collect()
    }

    fn project() -> Project {
        Project {
            id: 11,
            organization_id: 3,
            key_transactions: vec!["/foo".to_owned(), "/bar".to_owned()],
            releases: BTreeMap::from([(7, "2.0.0".to_owned())]),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_default_rule_order() {
        let registry = BiasRegistry::default_biases();
        let store = MemoryStore::new();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        add_boosted_release_at(&store, 11, 7, now).await.unwrap();

        let rules = generate_rules_at(&registry, &store, &project(), 0.1, now).await;
        similar_asserts::assert_eq!(ids(&rules), vec![1002, 1005, 1001, 1500, 1003, 1000]);
    }

    #[tokio::test]
    async fn test_key_transactions_with_zero_base_rate() {
        let registry = BiasRegistry::default_biases();
        let store = MemoryStore::new();

        let rules = generate_rules(&registry, &store, &project(), 0.0).await;
        similar_asserts::assert_eq!(ids(&rules), vec![1002, 1005, 1001, 1003, 1000]);
        let key_transaction_rules: Vec<_> = rules
            .iter()
            .filter(|rule| rule.id == ReservedIds::BOOST_KEY_TRANSACTIONS)
            .collect();
        assert_eq!(key_transaction_rules.len(), 1);
        assert_eq!(
            key_transaction_rules[0].sampling_value,
            SamplingValue::Factor { value: 1.5 }
        );

        let mut project = project();
        project.options = ProjectOptions {
            dynamic_sampling_biases: Some(vec![
                UserBias::new("boostEnvironments", false),
                UserBias::new("ignoreHealthChecks", false),
                UserBias::new("boostReplayId", false),
            ]),
        };
        let rules = generate_rules(&registry, &store, &project, 0.0).await;
        assert_eq!(ids(&rules), [1003, 1000]);
        assert_eq!(
            rules[1].sampling_value,
            SamplingValue::SampleRate { value: 0.0 }
        );
    }

    #[tokio::test]
    async fn test_minimum_sample_rate_when_enabled() {
        let registry = BiasRegistry::default_biases();
        let store = MemoryStore::new();
        let mut project = project();
        project.key_transactions.clear();
        project.options.dynamic_sampling_biases =
            Some(vec![UserBias::new("minimumSampleRate", true)]);

        let rules = generate_rules(&registry, &store, &project, 0.05).await;
        assert_eq!(ids(&rules), [1002, 1005, 1001, 1006, 1000]);
        assert_eq!(
            rules[3].sampling_value,
            SamplingValue::MinimumSampleRate { value: 0.05 }
        );
    }

    #[tokio::test]
    async fn test_base_rate_precedence() {
        let store = MemoryStore::new();
        let project = project();

        assert_eq!(get_base_sample_rate(&store, &project, 0.2).await, 0.2);

        set_sliding_window_sample_rates(&store, 3, &BTreeMap::from([(11, 0.4)]))
            .await
            .unwrap();
        assert_eq!(get_base_sample_rate(&store, &project, 0.2).await, 0.4);

        set_rebalanced_project_rates(&store, 3, &BTreeMap::from([(11, 0.8)]))
            .await
            .unwrap();
        assert_eq!(get_base_sample_rate(&store, &project, 0.2).await, 0.8);

        set_rebalanced_project_rates(&store, 3, &BTreeMap::from([(11, 3.0)]))
            .await
            .unwrap();
        assert_eq!(get_base_sample_rate(&store, &project, 0.2).await, 1.0);
    }

    #[tokio::test]
    async fn test_uniform_rule_uses_base_rate() {
        let registry = BiasRegistry::default_biases();
        let store = MemoryStore::new();
        set_sliding_window_sample_rates(&store, 3, &BTreeMap::from([(11, 0.4)]))
            .await
            .unwrap();

        let rules = generate_rules(&registry, &store, &project(), 0.2).await;
        let uniform = rules.last().unwrap();
        assert_eq!(uniform.id, RuleId(1000));
        assert_eq!(uniform.sampling_value, SamplingValue::SampleRate { value: 0.4 });

        let health_checks = &rules[0];
        assert_eq!(health_checks.id, ReservedIds::IGNORE_HEALTH_CHECKS);
        assert_eq!(
            health_checks.sampling_value,
            SamplingValue::SampleRate { value: 0.4 / 5.0 }
        );
    }
}
