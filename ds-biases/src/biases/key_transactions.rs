use ds_cache::KeyValueStore;
use ds_rules::{ReservedIds, RuleCondition, RuleType, SamplingRule, SamplingValue};

use crate::bias::{Bias, BiasContext};
use crate::project::Project;

/// Factor applied to key transactions.
pub const KEY_TRANSACTIONS_BOOST_FACTOR: f64 = 1.5;

/// Boosts the transactions a user marked as key transactions.
#[derive(Debug, Default)]
pub struct BoostKeyTransactionsBias;

impl Bias for BoostKeyTransactionsBias {
    type Params = Vec<String>;

    async fn get_params<S>(&self, context: &BiasContext<'_, S>) -> Option<Vec<String>>
    where
        S: KeyValueStore + ?Sized,
    {
        let names = &context.project.key_transactions;
        (!names.is_empty()).then(|| names.clone())
    }

    fn generate_rules(
        &self,
        _project: &Project,
        _base: f64,
        params: Option<Vec<String>>,
    ) -> Vec<SamplingRule> {
        let names = params.unwrap_or_default();
        if names.is_empty() {
            return Vec::new();
        }

        vec![SamplingRule {
            id: ReservedIds::BOOST_KEY_TRANSACTIONS,
            ty: RuleType::Transaction,
            condition: RuleCondition::or(vec![RuleCondition::eq_ignore_case(
                "event.transaction",
                names,
            )]),
            sampling_value: SamplingValue::Factor {
                value: KEY_TRANSACTIONS_BOOST_FACTOR,
            },
            time_range: Default::default(),
            decaying_fn: Default::default(),
        }]
    }
}
