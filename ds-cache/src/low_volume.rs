//! Rebalanced sample rates that prioritise low volume projects of an organization.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::keys;
use crate::store::{KeyValueStore, StoreError};

/// Expiry of the rebalanced rates of an organization.
///
/// The rates are recomputed hourly, so an organization that drops out of the active set falls
/// back to its sliding window rate within a day.
pub const REBALANCED_RATES_TIMEOUT: Duration = Duration::from_secs(24 * 3600);

/// Replaces the rebalanced project sample rates of an organization.
pub async fn set_rebalanced_project_rates<S>(
    store: &S,
    org_id: u64,
    rates: &BTreeMap<u64, f64>,
) -> Result<(), StoreError>
where
    S: KeyValueStore + ?Sized,
{
    let fields = rates
        .iter()
        .map(|(project_id, rate)| (project_id.to_string(), rate.to_string()))
        .collect();

    store
        .hset_all(
            &keys::prioritise_projects(org_id),
            fields,
            Some(REBALANCED_RATES_TIMEOUT),
        )
        .await
}

/// Returns the rebalanced sample rate of a project, if one is available.
///
/// Any failure to read or parse the rate yields `None`.
pub async fn get_rebalanced_project_rate<S>(store: &S, org_id: u64, project_id: u64) -> Option<f64>
where
    S: KeyValueStore + ?Sized,
{
    let key = keys::prioritise_projects(org_id);
    let raw = match store.hget(&key, &project_id.to_string()).await {
        Ok(raw) => raw?,
        Err(error) => {
            ds_log::warn!(
                org_id,
                project_id,
                error = &error as &dyn std::error::Error,
                "failed to read rebalanced project rate"
            );
            return None;
        }
    };

    raw.parse::<f64>().ok().filter(|rate| rate.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    #[tokio::test(start_paused = true)]
    async fn test_rates_expire() {
        let store = MemoryStore::new();
        let rates = BTreeMap::from([(1, 1.0), (2, 0.05)]);
        set_rebalanced_project_rates(&store, 3, &rates).await.unwrap();

        assert_eq!(get_rebalanced_project_rate(&store, 3, 1).await, Some(1.0));
        assert_eq!(get_rebalanced_project_rate(&store, 3, 2).await, Some(0.05));
        assert_eq!(get_rebalanced_project_rate(&store, 3, 4).await, None);

        tokio::time::advance(REBALANCED_RATES_TIMEOUT).await;
        assert_eq!(get_rebalanced_project_rate(&store, 3, 1).await, None);
    }

    #[tokio::test]
    async fn test_invalid_rate() {
        let store = MemoryStore::new();
        let fields = vec![("1".to_owned(), "oops".to_owned())];
        store
            .hset_all(&keys::prioritise_projects(3), fields, None)
            .await
            .unwrap();

        assert_eq!(get_rebalanced_project_rate(&store, 3, 1).await, None);
    }
}
