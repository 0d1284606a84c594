use chrono::{DateTime, Utc};
use ds_biases::{BiasRegistry, RulePublisher, generate_rules_at};
use ds_cache::KeyValueStore;
use ds_rules::SamplingConfig;
use ds_statsd::metric;

use crate::config::SamplingSettings;
use crate::context::TaskContext;
use crate::error::TaskError;
use crate::stats::StatsSource;
use crate::statsd::TaskCounters;

/// Result of recomputing the rules of an organization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecalculateOutcome {
    /// Projects whose rules were published.
    pub published: usize,
    /// Projects whose rules could not be published.
    pub failed: usize,
}

/// Recomputes the rules of every project of an organization and publishes them.
///
/// A project that fails to publish does not stop the others. The time budget is checked before
/// every project.
#[allow(clippy::too_many_arguments)]
pub async fn recalculate_rules_org<St, S, P>(
    context: &mut TaskContext,
    stats: &St,
    store: &S,
    publisher: &P,
    registry: &BiasRegistry,
    settings: &SamplingSettings,
    org_id: u64,
    now: DateTime<Utc>,
) -> Result<RecalculateOutcome, TaskError>
where
    St: StatsSource + ?Sized,
    S: KeyValueStore + ?Sized,
    P: RulePublisher + ?Sized,
{
    let projects = stats.projects(org_id).await?;
    let mut outcome = RecalculateOutcome::default();

    for project in context.timed(projects) {
        let project = project?;
        let rules =
            generate_rules_at(registry, store, &project, settings.default_sample_rate, now).await;

        match publisher
            .publish(project.id, &SamplingConfig::new(rules))
            .await
        {
            Ok(()) => outcome.published += 1,
            Err(error) => {
                ds_log::error!(
                    org_id,
                    project_id = project.id,
                    error = &error as &dyn std::error::Error,
                    "failed to publish sampling rules"
                );
                metric!(counter(TaskCounters::PublishFailed) += 1);
                outcome.failed += 1;
            }
        }
    }

    context.complete();
    Ok(outcome)
}
