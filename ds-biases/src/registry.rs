use thiserror::Error;

use crate::bias::BiasKind;

/// An error raised while building a [`BiasRegistry`].
///
/// These errors indicate a programming or configuration mistake and should abort startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The bias was registered more than once.
    #[error("bias {0} is registered twice")]
    DuplicateBias(BiasKind),

    /// The bias is always active and cannot be registered as toggleable.
    #[error("bias {0} cannot be toggled")]
    NotToggleable(BiasKind),
}

/// A registered bias together with its default state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BiasEntry {
    /// The bias.
    pub kind: BiasKind,
    /// Whether the bias is enabled for projects without user overrides.
    pub default_active: bool,
}

/// The user toggleable biases, in registration order.
///
/// The registry is built once at startup and passed by reference to the
/// [`FeatureMultiplexer`](crate::FeatureMultiplexer) and [`BiasCombinator`](crate::BiasCombinator).
#[derive(Debug, Clone, Default)]
pub struct BiasRegistry {
    entries: Vec<BiasEntry>,
}

impl BiasRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the registry with the default biases of the sampling engine.
    pub fn default_biases() -> Self {
        let entries = [
            (BiasKind::BoostEnvironments, true),
            (BiasKind::BoostLatestRelease, true),
            (BiasKind::IgnoreHealthChecks, true),
            (BiasKind::BoostKeyTransactions, true),
            (BiasKind::BoostReplayId, true),
            (BiasKind::MinimumSampleRate, false),
        ];

        Self {
            entries: entries
                .into_iter()
                .map(|(kind, default_active)| BiasEntry {
                    kind,
                    default_active,
                })
                .collect(),
        }
    }

    /// Registers a bias with its default state.
    pub fn register(&mut self, kind: BiasKind, default_active: bool) -> Result<(), RegistryError> {
        if !kind.is_toggleable() {
            return Err(RegistryError::NotToggleable(kind));
        }
        if self.get(kind).is_some() {
            return Err(RegistryError::DuplicateBias(kind));
        }

        self.entries.push(BiasEntry {
            kind,
            default_active,
        });
        Ok(())
    }

    /// Returns the entry of a registered bias.
    pub fn get(&self, kind: BiasKind) -> Option<&BiasEntry> {
        self.entries.iter().find(|entry| entry.kind == kind)
    }

    /// Looks up a registered bias by its string id.
    pub fn get_by_id(&self, id: &str) -> Option<&BiasEntry> {
        self.entries.iter().find(|entry| entry.kind.id() == id)
    }

    /// Returns `true` if the bias can take part in rule generation.
    ///
    /// The uniform rule is always available, other biases only when registered.
    pub fn contains(&self, kind: BiasKind) -> bool {
        !kind.is_toggleable() || self.get(kind).is_some()
    }

    /// Returns all entries in registration order.
    pub fn entries(&self) -> &[BiasEntry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_biases() {
        let registry = BiasRegistry::default_biases();
        let ids: Vec<_> = registry
            .entries()
            .iter()
            .map(|entry| (entry.kind.id(), entry.default_active))
            .collect();

        assert_eq!(
            ids,
            [
                ("boostEnvironments", true),
                ("boostLatestRelease", true),
                ("ignoreHealthChecks", true),
                ("boostKeyTransactions", true),
                ("boostReplayId", true),
                ("minimumSampleRate", false),
            ]
        );
    }

    #[test]
    fn test_default_biases_are_unique() {
        let mut registry = BiasRegistry::new();
        for entry in BiasRegistry::default_biases().entries() {
            registry.register(entry.kind, entry.default_active).unwrap();
        }
    }

    #[test]
    fn test_duplicate_registration() {
        let mut registry = BiasRegistry::new();
        registry.register(BiasKind::BoostReplayId, true).unwrap();

        assert_eq!(
            registry.register(BiasKind::BoostReplayId, false),
            Err(RegistryError::DuplicateBias(BiasKind::BoostReplayId))
        );
        assert_eq!(registry.entries().len(), 1);
    }

    #[test]
    fn test_uniform_not_registrable() {
        let mut registry = BiasRegistry::new();
        assert_eq!(
            registry.register(BiasKind::Uniform, true),
            Err(RegistryError::NotToggleable(BiasKind::Uniform))
        );
        assert!(registry.contains(BiasKind::Uniform));
        assert!(!registry.contains(BiasKind::BoostReplayId));
    }
}
