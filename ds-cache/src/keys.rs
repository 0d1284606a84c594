//! Cache key formats.
//!
//! These keys are shared with existing deployments and must not change.

/// Key of the list of boosted releases of a project.
pub fn boosted_releases(project_id: u64) -> String {
    format!("ds::p:{project_id}:boosted_releases")
}

/// Key of the lock held while a release of a project is being boosted.
pub fn boost_lock(project_id: u64) -> String {
    format!("dynamic-sampling-boost-lock:{project_id}")
}

/// Key of the marker that a release has already been observed in a project.
pub fn observed_release(project_id: u64, release_id: u64) -> String {
    format!("ds::p:{project_id}:r:{release_id}")
}

/// Key of the sliding window sample rate hash of an organization.
pub fn sliding_window(org_id: u64) -> String {
    format!("ds::o:{org_id}:sliding_window")
}

/// Key of the rebalanced low volume project sample rates of an organization.
pub fn prioritise_projects(org_id: u64) -> String {
    format!("ds::o:{org_id}:prioritise_projects")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_formats() {
        assert_eq!(boosted_releases(42), "ds::p:42:boosted_releases");
        assert_eq!(boost_lock(42), "dynamic-sampling-boost-lock:42");
        assert_eq!(observed_release(42, 7), "ds::p:42:r:7");
        assert_eq!(sliding_window(3), "ds::o:3:sliding_window");
        assert_eq!(prioritise_projects(3), "ds::o:3:prioritise_projects");
    }
}
