//! Distribution of a sampling budget across classes of different volume.
//!
//! Given a target sample rate for a set of classes (for example all projects of an organization),
//! the budget is the number of items the target rate would keep overall. Rebalancing spends that
//! budget so that small classes are kept entirely and large classes share the rest equally. This
//! keeps low volume projects visible in organizations dominated by a few large projects.

/// A class with its observed volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebalanceClass {
    /// Identifier of the class, for example a project id.
    pub id: u64,
    /// Observed volume of the class.
    pub count: u64,
}

/// A class with the sample rate assigned by rebalancing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RebalancedClass {
    /// Identifier of the class.
    pub id: u64,
    /// Observed volume of the class.
    pub count: u64,
    /// The new sample rate, between 0 and 1.
    pub sample_rate: f64,
}

/// Rebalances classes towards a target sample rate.
///
/// Classes are visited from the smallest to the largest. While a class is smaller than an equal
/// share of the remaining budget it is kept entirely. The remaining classes all keep the same
/// number of items.
///
/// `intensity` blends between the target rate (`0.0`) and the fully rebalanced rate (`1.0`).
/// Rates are always clamped to `[0, 1]`, and classes without volume keep everything.
pub fn full_rebalance(
    classes: &[RebalanceClass],
    sample_rate: f64,
    intensity: f64,
) -> Vec<RebalancedClass> {
    if classes.is_empty() {
        return Vec::new();
    }

    let sample_rate = clamp_rate(sample_rate);
    let intensity = if intensity.is_finite() {
        intensity.clamp(0.0, 1.0)
    } else {
        1.0
    };

    let mut sorted = classes.to_vec();
    sorted.sort_by_key(|class| (class.count, class.id));

    let total: f64 = sorted.iter().map(|class| class.count as f64).sum();
    let mut budget = total * sample_rate;
    let mut result = Vec::with_capacity(sorted.len());

    let blend = |ideal: f64| clamp_rate(ideal * intensity + sample_rate * (1.0 - intensity));

    let mut index = 0;
    while index < sorted.len() {
        let class = sorted[index];
        let remaining = (sorted.len() - index) as f64;
        let ideal = budget / remaining;

        if class.count == 0 || (class.count as f64) < ideal {
            budget -= class.count as f64;
            result.push(RebalancedClass {
                id: class.id,
                count: class.count,
                sample_rate: blend(1.0),
            });
            index += 1;
            continue;
        }

        // Every remaining class is at least as large as its share, so all of them keep `ideal`.
        for class in &sorted[index..] {
            result.push(RebalancedClass {
                id: class.id,
                count: class.count,
                sample_rate: blend(ideal / class.count as f64),
            });
        }
        break;
    }

    result
}

fn clamp_rate(rate: f64) -> f64 {
    if rate.is_nan() {
        return 0.0;
    }
    rate.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn classes(counts: &[u64]) -> Vec<RebalanceClass> {
        counts
            .iter()
            .enumerate()
            .map(|(id, &count)| RebalanceClass {
                id: id as u64,
                count,
            })
            .collect()
    }

    fn rate_of(result: &[RebalancedClass], id: u64) -> f64 {
        result
            .iter()
            .find(|class| class.id == id)
            .map(|class| class.sample_rate)
            .unwrap()
    }

    #[test]
    fn test_empty() {
        assert!(full_rebalance(&[], 0.5, 1.0).is_empty());
    }

    #[test]
    fn test_small_classes_kept() {
        // total 1110, budget 111
        let result = full_rebalance(&classes(&[1000, 100, 10]), 0.1, 1.0);

        assert_eq!(rate_of(&result, 2), 1.0);
        // 101 left for two classes, 50.5 each
        assert_eq!(rate_of(&result, 1), 0.505);
        assert_eq!(rate_of(&result, 0), 0.0505);

        let kept: f64 = result.iter().map(|c| c.count as f64 * c.sample_rate).sum();
        assert!((kept - 111.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_intensity_keeps_target() {
        let result = full_rebalance(&classes(&[1000, 100, 10]), 0.1, 0.0);
        for class in result {
            assert_eq!(class.sample_rate, 0.1);
        }
    }

    #[test]
    fn test_half_intensity() {
        let result = full_rebalance(&classes(&[10, 1000]), 0.5, 0.5);
        // The small class would be kept entirely, blended halfway from 0.5.
        assert_eq!(rate_of(&result, 0), 0.75);
    }

    #[test]
    fn test_zero_volume() {
        let result = full_rebalance(&classes(&[0, 0]), 0.5, 1.0);
        assert_eq!(rate_of(&result, 0), 1.0);
        assert_eq!(rate_of(&result, 1), 1.0);

        let result = full_rebalance(&classes(&[0, 100]), 0.0, 1.0);
        assert_eq!(rate_of(&result, 1), 0.0);
    }

    #[test]
    fn test_full_rate() {
        let result = full_rebalance(&classes(&[5, 500, 50_000]), 1.0, 1.0);
        for class in result {
            assert_eq!(class.sample_rate, 1.0);
        }
    }

    proptest! {
        #[test]
        fn rebalance_stays_within_bounds(
            counts in proptest::collection::vec(0u64..1_000_000, 0..50),
            sample_rate in prop_oneof![Just(f64::NAN), Just(-1.0), Just(2.0), 0.0f64..=1.0],
            intensity in 0.0f64..=1.0,
        ) {
            let input = classes(&counts);
            let result = full_rebalance(&input, sample_rate, intensity);

            prop_assert_eq!(result.len(), input.len());
            for class in &result {
                prop_assert!(class.sample_rate.is_finite());
                prop_assert!((0.0..=1.0).contains(&class.sample_rate));
            }
        }

        #[test]
        fn rebalance_spends_budget(
            counts in proptest::collection::vec(1u64..1_000_000, 1..50),
            sample_rate in 0.0f64..=1.0,
        ) {
            let input = classes(&counts);
            let result = full_rebalance(&input, sample_rate, 1.0);

            let total: f64 = counts.iter().map(|&c| c as f64).sum();
            let kept: f64 = result.iter().map(|c| c.count as f64 * c.sample_rate).sum();
            prop_assert!((kept - total * sample_rate).abs() <= total * 1e-9);
        }
    }
}
