use ds_cache::KeyValueStore;
use ds_rules::{ReservedIds, RuleCondition, RuleType, SamplingRule, SamplingValue};

use crate::bias::{Bias, BiasContext};
use crate::project::Project;

/// Applies the base sample rate to all traces not matched by an earlier rule.
#[derive(Debug, Default)]
pub struct UniformBias;

impl Bias for UniformBias {
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
            id: ReservedIds::UNIFORM,
            ty: RuleType::Trace,
            condition: RuleCondition::all(),
            sampling_value: SamplingValue::SampleRate { value: base },
            time_range: Default::default(),
            decaying_fn: Default::default(),
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_rule() {
        let rules = UniformBias.generate_rules(&Project::default(), 0.25, Some(()));

        insta::assert_json_snapshot!(rules, @r###"
        [
          {
            "id": 1000,
            "type": "trace",
            "condition": {
              "op": "and",
              "inner": []
            },
            "samplingValue": {
              "type": "sampleRate",
              "value": 0.25
            }
          }
        ]
        "###);
    }
}
