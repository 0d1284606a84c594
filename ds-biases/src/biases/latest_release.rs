use chrono::{DateTime, Utc};
use ds_cache::KeyValueStore;
use ds_cache::boosted_releases::get_boosted_releases_at;
use ds_rules::{
    DecayingFunction, ReservedIds, RuleCondition, RuleType, SamplingRule, SamplingValue, TimeRange,
};

use crate::bias::{Bias, BiasContext};
use crate::project::Project;

/// Factor applied to traces of a boosted release at the start of the boost window.
pub const LATEST_RELEASE_BOOST_FACTOR: f64 = 1.5;

/// Maximum number of releases boosted at the same time, most recent first.
pub const MAX_BOOSTED_RELEASES: usize = 10;

/// A boosted release resolved to its version string.
#[derive(Debug, Clone, PartialEq)]
pub struct BoostedReleaseVersion {
    /// The release version as it appears in traces.
    pub version: String,
    /// Start of the boost window, inclusive.
    pub start: DateTime<Utc>,
    /// End of the boost window, exclusive.
    pub end: DateTime<Utc>,
}

/// Boosts releases for an hour after they were first observed.
///
/// The boost decays linearly over the window until it no longer changes the sample rate.
#[derive(Debug, Default)]
pub struct BoostLatestReleaseBias;

impl Bias for BoostLatestReleaseBias {
    type Params = Vec<BoostedReleaseVersion>;

    async fn get_params<S>(&self, context: &BiasContext<'_, S>) -> Option<Self::Params>
    where
        S: KeyValueStore + ?Sized,
    {
        let project = context.project;
        let releases = match get_boosted_releases_at(context.store, project.id, context.now).await
        {
            Ok(releases) => releases,
            Err(error) => {
                ds_log::warn!(
                    project_id = project.id,
                    error = &error as &dyn std::error::Error,
                    "failed to read boosted releases"
                );
                return None;
            }
        };

        // Releases deleted since they were boosted are skipped.
        let mut resolved: Vec<_> = releases
            .iter()
            .filter_map(|release| {
                Some(BoostedReleaseVersion {
                    version: project.release_version(release.release_id)?.to_owned(),
                    start: release.boosted_at()?,
                    end: release.expires_at()?,
                })
            })
            .collect();

        let excess = resolved.len().saturating_sub(MAX_BOOSTED_RELEASES);
        resolved.drain(..excess);

        (!resolved.is_empty()).then_some(resolved)
    }

    fn generate_rules(
        &self,
        _project: &Project,
        _base: f64,
        params: Option<Self::Params>,
    ) -> Vec<SamplingRule> {
        let Some(releases) = params else {
            return Vec::new();
        };

        releases
            .into_iter()
            .enumerate()
            .filter_map(|(index, release)| {
                Some(SamplingRule {
                    id: ReservedIds::latest_release(index)?,
                    ty: RuleType::Trace,
                    condition: RuleCondition::and(vec![RuleCondition::eq(
                        "trace.release",
                        vec![release.version],
                    )]),
                    sampling_value: SamplingValue::Factor {
                        value: LATEST_RELEASE_BOOST_FACTOR,
                    },
                    time_range: TimeRange {
                        start: Some(release.start),
                        end: Some(release.end),
                    },
                    decaying_fn: DecayingFunction::Linear { decayed_value: 1.0 },
                })
            })
            .collect()
    }
}
