use std::ops::RangeInclusive;

use crate::config::RuleId;

/// Rule ids reserved for each bias.
///
/// Ids are globally unique across biases and must never be reassigned, since the edge reports
/// them in outcomes and historical data refers to them.
pub struct ReservedIds;

impl ReservedIds {
    /// The uniform rule carrying the base sample rate of a project.
    pub const UNIFORM: RuleId = RuleId(1000);
    /// Boosts development environments.
    pub const BOOST_ENVIRONMENTS: RuleId = RuleId(1001);
    /// Reduces health check transactions.
    pub const IGNORE_HEALTH_CHECKS: RuleId = RuleId(1002);
    /// Boosts key transactions.
    pub const BOOST_KEY_TRANSACTIONS: RuleId = RuleId(1003);
    /// Recalibration of the organization sample rate. Reserved, not generated by this engine.
    pub const RECALIBRATION: RuleId = RuleId(1004);
    /// Boosts traces with an attached replay.
    pub const BOOST_REPLAY_ID: RuleId = RuleId(1005);
    /// Enforces a minimum sample rate.
    pub const MINIMUM_SAMPLE_RATE: RuleId = RuleId(1006);
    /// Boosted latest releases, one id per boosted release.
    pub const BOOST_LATEST_RELEASES: RangeInclusive<u32> = 1500..=1599;

    /// Returns the id of the `index`-th boosted release rule.
    ///
    /// Returns `None` if the index exceeds the reserved range.
    pub fn latest_release(index: usize) -> Option<RuleId> {
        let id = Self::BOOST_LATEST_RELEASES
            .start()
            .checked_add(u32::try_from(index).ok()?)?;
        Self::BOOST_LATEST_RELEASES
            .contains(&id)
            .then_some(RuleId(id))
    }

    /// Returns all reserved ranges, single ids as one-element ranges.
    pub fn ranges() -> [RangeInclusive<u32>; 8] {
        let single = |id: RuleId| id.0..=id.0;
        [
            single(Self::UNIFORM),
            single(Self::BOOST_ENVIRONMENTS),
            single(Self::IGNORE_HEALTH_CHECKS),
            single(Self::BOOST_KEY_TRANSACTIONS),
            single(Self::RECALIBRATION),
            single(Self::BOOST_REPLAY_ID),
            single(Self::MINIMUM_SAMPLE_RATE),
            Self::BOOST_LATEST_RELEASES,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranges_do_not_overlap() {
        let ranges = ReservedIds::ranges();
        for (i, a) in ranges.iter().enumerate() {
            for b in &ranges[i + 1..] {
                assert!(
                    a.end() < b.start() || b.end() < a.start(),
                    "{a:?} overlaps {b:?}"
                );
            }
        }
    }

    #[test]
    fn test_latest_release_ids() {
        assert_eq!(ReservedIds::latest_release(0), Some(RuleId(1500)));
        assert_eq!(ReservedIds::latest_release(99), Some(RuleId(1599)));
        assert_eq!(ReservedIds::latest_release(100), None);
    }
}
