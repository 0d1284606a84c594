use std::collections::BTreeSet;

use crate::bias::BiasKind;
use crate::project::UserBias;
use crate::registry::BiasRegistry;

/// Resolves which biases are enabled for a project.
///
/// Registered defaults are merged with user overrides by id. Overrides for ids that are not
/// registered are ignored, so only registered biases can ever be enabled.
#[derive(Debug, Clone, Copy)]
pub struct FeatureMultiplexer<'a> {
    registry: &'a BiasRegistry,
}

impl<'a> FeatureMultiplexer<'a> {
    /// Creates a multiplexer over the given registry.
    pub fn new(registry: &'a BiasRegistry) -> Self {
        Self { registry }
    }

    /// Returns the enabled biases in registration order.
    pub fn get_enabled_biases(&self, user_biases: Option<&[UserBias]>) -> Vec<BiasKind> {
        self.registry
            .entries()
            .iter()
            .filter(|entry| {
                let user_bias = user_biases
                    .unwrap_or_default()
                    .iter()
                    .find(|bias| bias.id == entry.kind.id());

                match user_bias {
                    Some(bias) => bias.active,
                    None => entry.default_active,
                }
            })
            .map(|entry| entry.kind)
            .collect()
    }

    /// Returns the ids of the enabled biases.
    pub fn get_enabled_user_biases(&self, user_biases: Option<&[UserBias]>) -> BTreeSet<&'static str> {
        self.get_enabled_biases(user_biases)
            .into_iter()
            .map(BiasKind::id)
            .collect()
    }

    /// Returns the ids of all biases users can toggle.
    pub fn get_supported_biases_ids(&self) -> BTreeSet<&'static str> {
        self.registry
            .entries()
            .iter()
            .map(|entry| entry.kind.id())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled(user_biases: Option<&[UserBias]>) -> BTreeSet<&'static str> {
        let registry = BiasRegistry::default_biases();
        FeatureMultiplexer::new(&registry).get_enabled_user_biases(user_biases)
    }

    #[test]
    fn test_defaults_without_overrides() {
        assert_eq!(
            enabled(None),
            BTreeSet::from([
                "boostEnvironments",
                "boostLatestRelease",
                "ignoreHealthChecks",
                "boostKeyTransactions",
                "boostReplayId",
            ])
        );
    }

    #[test]
    fn test_overrides_by_id() {
        let overrides = [
            UserBias::new("boostEnvironments", false),
            UserBias::new("minimumSampleRate", true),
        ];

        assert_eq!(
            enabled(Some(&overrides)),
            BTreeSet::from([
                "boostLatestRelease",
                "ignoreHealthChecks",
                "boostKeyTransactions",
                "boostReplayId",
                "minimumSampleRate",
            ])
        );
    }

    #[test]
    fn test_unknown_ids_ignored() {
        let overrides = [
            UserBias::new("recalibrationRule", true),
            UserBias::new("uniformRule", false),
            UserBias::new("made-up", true),
        ];

        let registry = BiasRegistry::default_biases();
        let multiplexer = FeatureMultiplexer::new(&registry);
        let enabled = multiplexer.get_enabled_user_biases(Some(&overrides));

        assert!(enabled.is_subset(&multiplexer.get_supported_biases_ids()));
        assert_eq!(enabled, self::enabled(None));
    }

    #[test]
    fn test_empty_overrides() {
        assert_eq!(enabled(Some(&[])), enabled(None));
    }

    #[test]
    fn test_keeps_registration_order() {
        let overrides = [UserBias::new("minimumSampleRate", true)];
        let registry = BiasRegistry::default_biases();
        let kinds = FeatureMultiplexer::new(&registry).get_enabled_biases(Some(&overrides));

        assert_eq!(
            kinds,
            [
                BiasKind::BoostEnvironments,
                BiasKind::BoostLatestRelease,
                BiasKind::IgnoreHealthChecks,
                BiasKind::BoostKeyTransactions,
                BiasKind::BoostReplayId,
                BiasKind::MinimumSampleRate,
            ]
        );
    }
}
