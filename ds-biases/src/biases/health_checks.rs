use ds_cache::KeyValueStore;
use ds_rules::{ReservedIds, RuleCondition, RuleType, SamplingRule, SamplingValue};

use crate::bias::{Bias, BiasContext};
use crate::project::Project;

/// Transaction name patterns of health checks.
pub const HEALTH_CHECK_GLOBS: &[&str] = &[
    "*healthcheck*",
    "*healthy*",
    "*live*",
    "*ready*",
    "*heartbeat*",
    "*/health",
    "*/healthz",
    "*/ping",
];

/// Health checks are sampled at this fraction of the base sample rate.
const HEALTH_CHECK_DECREASE_FACTOR: f64 = 5.0;

/// Reduces the sample rate of health check transactions.
#[derive(Debug, Default)]
pub struct IgnoreHealthChecksBias;

impl Bias for IgnoreHealthChecksBias {
    type Params = ();

    async fn get_params<S>(&self, _context: &BiasContext<'_, S>) -> Option<()>
    where
        S: KeyValueStore + ?Sized,
    {
        Some(())
    }

    fn generate_rules(&self, _project: &Project, base: f64, params: Option<()>) -> Vec<SamplingRule> {
        if params.is_none() {
            return Vec::new();
        }

        vec![SamplingRule {
            id: ReservedIds::IGNORE_HEALTH_CHECKS,
            ty: RuleType::Transaction,
            condition: RuleCondition::or(vec![RuleCondition::glob(
                "event.transaction",
                HEALTH_CHECK_GLOBS.iter().copied(),
            )]),
            sampling_value: SamplingValue::SampleRate {
                value: base / HEALTH_CHECK_DECREASE_FACTOR,
            },
            time_range: Default::default(),
            decaying_fn: Default::default(),
        }]
    }
}
