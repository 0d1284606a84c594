use ds_cache::KeyValueStore;
use ds_rules::{ReservedIds, RuleCondition, RuleType, SamplingRule, SamplingValue};

use crate::bias::{Bias, BiasContext};
use crate::project::Project;

/// Environment name patterns that are sampled entirely.
pub const BOOSTED_ENVIRONMENTS: &[&str] = &["*debug*", "*dev*", "*local*", "*qa*", "*test*"];

/// Keeps all traces from development environments.
#[derive(Debug, Default)]
pub struct BoostEnvironmentsBias;

impl Bias for BoostEnvironmentsBias {
    type Params = ();

    async fn get_params<S>(&self, _context: &BiasContext<'_, S>) -> Option<()>
    where
        S: KeyValueStore + ?Sized,
    {
        Some(())
    }

    fn generate_rules(&self, _project: &Project, _base: f64, params: Option<()>) -> Vec<SamplingRule> {
        let Some(()) = params else {
            return Vec::new();
        };

        vec![SamplingRule {
            id: ReservedIds::BOOST_ENVIRONMENTS,
            ty: RuleType::Trace,
            condition: RuleCondition::or(vec![RuleCondition::glob(
                "trace.environment",
                BOOSTED_ENVIRONMENTS.iter().copied(),
            )]),
            sampling_value: SamplingValue::SampleRate { value: 1.0 },
            time_range: Default::default(),
            decaying_fn: Default::default(),
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_rules() {
        let rules = BoostEnvironmentsBias.generate_rules(&Project::default(), 0.1, Some(()));

        insta::assert_json_snapshot!(rules, @r###"
        [
          {
            "id": 1001,
            "type": "trace",
            "condition": {
              "op": "or",
              "inner": [
                {
                  "op": "glob",
                  "name": "trace.environment",
                  "value": [
                    "*debug*",
                    "*dev*",
                    "*local*",
                    "*qa*",
                    "*test*"
                  ]
                }
              ]
            },
            "samplingValue": {
              "type": "sampleRate",
              "value": 1.0
            }
          }
        ]
        "###);
    }

    #[test]
    fn test_no_params() {
        assert!(
            BoostEnvironmentsBias
                .generate_rules(&Project::default(), 0.1, None)
                .is_empty()
        );
    }
}
