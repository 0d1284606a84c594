use std::collections::BTreeMap;
use std::future::Future;
use std::ops::Bound;
use std::path::Path;
use std::time::Duration;

use ds_biases::Project;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An error returned by a [`StatsSource`].
#[derive(Debug, Error)]
pub enum StatsError {
    /// The statistics could not be read.
    #[error("failed to read statistics")]
    Io(#[from] std::io::Error),

    /// The statistics are malformed.
    #[error("failed to parse statistics")]
    Parse(#[from] serde_json::Error),
}

/// One page of active organizations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrgPage {
    /// Organization ids on this page, ascending.
    pub org_ids: Vec<u64>,
    /// Cursor of the next page, `None` on the last page.
    pub next_cursor: Option<u64>,
}

/// Ingested root transaction volume of a project within a window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectVolume {
    /// The project.
    pub project_id: u64,
    /// All root transactions seen, whether kept or dropped.
    pub total: u64,
    /// Root transactions kept by sampling.
    #[serde(default)]
    pub keep: u64,
    /// Root transactions dropped by sampling.
    #[serde(default)]
    pub drop: u64,
}

/// A release that ingestion saw in a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedRelease {
    /// The project the release was seen in.
    pub project_id: u64,
    /// The internal id of the release.
    pub release_id: u64,
}

/// A pull source of ingestion statistics.
pub trait StatsSource: Send + Sync {
    /// Returns a page of organizations that ingested transactions recently.
    ///
    /// Pages start after `cursor`, which is `None` for the first page.
    fn active_orgs(
        &self,
        cursor: Option<u64>,
        limit: usize,
    ) -> impl Future<Output = Result<OrgPage, StatsError>> + Send;

    /// Returns the volume of every project of an organization within the last `window`.
    fn project_volumes(
        &self,
        org_id: u64,
        window: Duration,
    ) -> impl Future<Output = Result<Vec<ProjectVolume>, StatsError>> + Send;

    /// Returns the projects of an organization.
    fn projects(
        &self,
        org_id: u64,
    ) -> impl Future<Output = Result<Vec<Project>, StatsError>> + Send;
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FixtureOrg {
    id: u64,
    #[serde(default)]
    projects: Vec<Project>,
    /// Volumes keyed by window size in hours.
    #[serde(default)]
    volumes: BTreeMap<u64, Vec<ProjectVolume>>,
    /// Releases seen by ingestion since the last cycle.
    #[serde(default)]
    releases: Vec<ObservedRelease>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FixtureDocument {
    organizations: Vec<FixtureOrg>,
}

/// A [`StatsSource`] serving statistics from a JSON document.
///
/// The document lists organizations with their projects, the project volumes per window size
/// in hours and the releases ingestion observed:
///
/// ```json
/// {
///   "organizations": [{
///     "id": 1,
///     "projects": [{"id": 11, "organization_id": 1, "releases": {"7": "1.0.0"}}],
///     "volumes": {"24": [{"project_id": 11, "total": 1000, "keep": 100, "drop": 900}]},
///     "releases": [{"project_id": 11, "release_id": 7}]
///   }]
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct FixtureStats {
    orgs: BTreeMap<u64, FixtureOrg>,
}

impl FixtureStats {
    /// Parses statistics from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, StatsError> {
        let document: FixtureDocument = serde_json::from_str(json)?;
        let orgs = document
            .organizations
            .into_iter()
            .map(|org| (org.id, org))
            .collect();
        Ok(Self { orgs })
    }

    /// Reads statistics from a JSON file.
    pub fn from_path(path: &Path) -> Result<Self, StatsError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Returns the releases observed in all organizations, ordered by organization.
    pub fn observed_releases(&self) -> Vec<ObservedRelease> {
        self.orgs
            .values()
            .flat_map(|org| org.releases.iter().copied())
            .collect()
    }
}

impl StatsSource for FixtureStats {
    async fn active_orgs(&self, cursor: Option<u64>, limit: usize) -> Result<OrgPage, StatsError> {
        let start = match cursor {
            Some(cursor) => Bound::Excluded(cursor),
            None => Bound::Unbounded,
        };

        let org_ids: Vec<u64> = self
            .orgs
            .range((start, Bound::Unbounded))
            .map(|(id, _)| *id)
            .take(limit.max(1))
            .collect();

        let next_cursor = org_ids.last().copied().filter(|&last| {
            let mut rest = self.orgs.range((Bound::Excluded(last), Bound::Unbounded));
            rest.next().is_some()
        });

        Ok(OrgPage {
            org_ids,
            next_cursor,
        })
    }

    async fn project_volumes(
        &self,
        org_id: u64,
        window: Duration,
    ) -> Result<Vec<ProjectVolume>, StatsError> {
        let hours = window.as_secs() / 3600;
        Ok(self
            .orgs
            .get(&org_id)
            .and_then(|org| org.volumes.get(&hours))
            .cloned()
            .unwrap_or_default())
    }

    async fn projects(&self, org_id: u64) -> Result<Vec<Project>, StatsError> {
        Ok(self
            .orgs
            .get(&org_id)
            .map(|org| org.projects.clone())
            .unwrap_or_default())
    }
}
