use ds_cache::KeyValueStore;
use ds_rules::SamplingRule;

use crate::bias::{BiasContext, BiasKind};
use crate::registry::BiasRegistry;

/// Concatenates the rules of several biases in the order they were combined.
///
/// Rules are not de-duplicated. Every bias draws ids from its own reserved range, so rules of
/// different biases never collide. The combinator keeps no state between computations.
#[derive(Debug, Clone)]
pub struct BiasCombinator<'a> {
    registry: &'a BiasRegistry,
    kinds: Vec<BiasKind>,
}

impl<'a> BiasCombinator<'a> {
    /// Creates an empty combinator over the given registry.
    pub fn new(registry: &'a BiasRegistry) -> Self {
        Self {
            registry,
            kinds: Vec::new(),
        }
    }

    /// Appends a bias.
    ///
    /// Biases missing from the registry are skipped.
    pub fn combine(mut self, kind: BiasKind) -> Self {
        if self.registry.contains(kind) {
            self.kinds.push(kind);
        } else {
            ds_log::debug!(bias = kind.id(), "skipping unregistered bias");
        }
        self
    }

    /// Returns the combined biases in order.
    pub fn kinds(&self) -> &[BiasKind] {
        &self.kinds
    }

    /// Runs every combined bias and concatenates their rules.
    pub async fn get_combined_rules<S>(&self, context: &BiasContext<'_, S>) -> Vec<SamplingRule>
    where
        S: KeyValueStore + ?Sized,
    {
        let mut rules = Vec::new();
        for kind in &self.kinds {
            rules.extend(kind.rules(context).await);
        }
        rules
    }
}
