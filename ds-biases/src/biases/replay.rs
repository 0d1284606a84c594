use ds_cache::KeyValueStore;
use ds_rules::{ReservedIds, RuleCondition, RuleType, SamplingRule, SamplingValue};
use serde_json::Value;

use crate::bias::{Bias, BiasContext};
use crate::project::Project;

/// Keeps all traces that have a session replay attached.
#[derive(Debug, Default)]
pub struct BoostReplayIdBias;

impl Bias for BoostReplayIdBias {
    type Params = ();

    async fn get_params<S>(&self, _context: &BiasContext<'_, S>) -> Option<()>
    where
        S: KeyValueStore + ?Sized,
    {
        Some(())
    }

    fn generate_rules(&self, _project: &Project, _base: f64, params: Option<()>) -> Vec<SamplingRule> {
        if params.is_none() {
            return Vec::new();
        }

        vec![SamplingRule {
            id: ReservedIds::BOOST_REPLAY_ID,
            ty: RuleType::Trace,
            condition: RuleCondition::not(RuleCondition::eq("trace.replay_id", Value::Null)),
            sampling_value: SamplingValue::SampleRate { value: 1.0 },
            time_range: Default::default(),
            decaying_fn: Default::default(),
        }]
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_matches_present_replay() {
        let rules = BoostReplayIdBias.generate_rules(&Project::default(), 0.01, Some(()));

        assert_eq!(rules.len(), 1);
        assert_eq!(
            serde_json::to_value(&rules[0].condition).unwrap(),
            json!({
                "op": "not",
                "inner": {"op": "eq", "name": "trace.replay_id", "value": null}
            })
        );
    }
}
