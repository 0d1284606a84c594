use ds_cache::KeyValueStore;
use ds_rules::{ReservedIds, RuleCondition, RuleType, SamplingRule, SamplingValue};

use crate::bias::{Bias, BiasContext};
use crate::project::Project;

/// Floors the sample rate of all traces at the base sample rate.
#[derive(Debug, Default)]
pub struct MinimumSampleRateBias;

impl Bias for MinimumSampleRateBias {
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
            id: ReservedIds::MINIMUM_SAMPLE_RATE,
            ty: RuleType::Trace,
            condition: RuleCondition::all(),
            sampling_value: SamplingValue::MinimumSampleRate { value: base },
            time_range: Default::default(),
            decaying_fn: Default::default(),
        }]
    }
}
