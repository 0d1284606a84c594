use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A user override of a bias in the project options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserBias {
    /// The bias id, for example `boostEnvironments`.
    pub id: String,
    /// Whether the bias is enabled for the project.
    pub active: bool,
}

impl UserBias {
    /// Creates an override for the given bias id.
    pub fn new(id: impl Into<String>, active: bool) -> Self {
        Self {
            id: id.into(),
            active,
        }
    }
}

/// Project options relevant to dynamic sampling.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectOptions {
    /// Bias overrides set by the user. `None` means the defaults apply.
    #[serde(
        default,
        rename = "sentry:dynamic_sampling_biases",
        skip_serializing_if = "Option::is_none"
    )]
    pub dynamic_sampling_biases: Option<Vec<UserBias>>,
}

/// The view of a project that rule generation needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// The project id.
    pub id: u64,
    /// The id of the organization owning the project.
    pub organization_id: u64,
    /// Project options.
    #[serde(default)]
    pub options: ProjectOptions,
    /// Names of the key transactions configured for the project.
    #[serde(default)]
    pub key_transactions: Vec<String>,
    /// Known releases of the project, by internal release id.
    #[serde(default)]
    pub releases: BTreeMap<u64, String>,
}

impl Project {
    /// Returns the user bias overrides, if any are set.
    pub fn user_biases(&self) -> Option<&[UserBias]> {
        self.options.dynamic_sampling_biases.as_deref()
    }

    /// Returns the version string of a release of this project.
    pub fn release_version(&self, release_id: u64) -> Option<&str> {
        self.releases.get(&release_id).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_project() {
        let project: Project = serde_json::from_value(json!({
            "id": 11,
            "organization_id": 3,
            "options": {
                "sentry:dynamic_sampling_biases": [
                    {"id": "boostEnvironments", "active": false}
                ]
            },
            "key_transactions": ["/foo"],
            "releases": {"7": "1.0.0"}
        }))
        .unwrap();

        assert_eq!(
            project.user_biases(),
            Some(&[UserBias::new("boostEnvironments", false)][..])
        );
        assert_eq!(project.release_version(7), Some("1.0.0"));
        assert_eq!(project.release_version(8), None);
    }

    #[test]
    fn test_parse_minimal_project() {
        let project: Project =
            serde_json::from_value(json!({"id": 11, "organization_id": 3})).unwrap();
        assert_eq!(project.user_biases(), None);
        assert!(project.key_transactions.is_empty());
    }
}
