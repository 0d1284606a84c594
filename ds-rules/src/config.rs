//! Dynamic sampling rule configuration.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::condition::RuleCondition;
use crate::utils;

/// The version of the rule document understood by the edge.
pub const SAMPLING_CONFIG_VERSION: u16 = 2;

/// The dynamic sampling configuration published for a single project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingConfig {
    /// Version of the rule format, always [`SAMPLING_CONFIG_VERSION`] when produced here.
    pub version: u16,

    /// The ordered sampling rules for the project.
    pub rules: Vec<SamplingRule>,
}

impl SamplingConfig {
    /// Wraps an ordered rule list into a versioned document.
    pub fn new(rules: Vec<SamplingRule>) -> Self {
        Self {
            version: SAMPLING_CONFIG_VERSION,
            rules,
        }
    }
}

/// A sampling rule as it is handed to the edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingRule {
    /// The unique identifier of this rule.
    pub id: RuleId,

    /// The rule type declares what to apply a dynamic sampling rule to and how.
    #[serde(rename = "type")]
    pub ty: RuleType,

    /// A condition to match for this sampling rule.
    pub condition: RuleCondition,

    /// The sample rate to apply when this rule matches.
    pub sampling_value: SamplingValue,

    /// The time range the rule should be applicable in.
    ///
    /// The time range is open on both ends by default. If a time range is
    /// closed on at least one end, the rule is considered a decaying rule.
    #[serde(default, skip_serializing_if = "TimeRange::is_empty")]
    pub time_range: TimeRange,

    /// Declares how to interpolate the sample rate for rules with bounded time range.
    #[serde(default, skip_serializing_if = "utils::is_default")]
    pub decaying_fn: DecayingFunction,
}

/// A sampling strategy definition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(tag = "type")]
pub enum SamplingValue {
    /// A direct sample rate to apply.
    ///
    /// The final sample rate is this value multiplied with the factors of previously matched
    /// rules.
    SampleRate {
        /// The sample rate to apply to the rule.
        value: f64,
    },

    /// A factor to apply on a subsequently matching rule.
    Factor {
        /// The factor to apply on another matched sample rate.
        value: f64,
    },

    /// A floor for the final sample rate.
    ///
    /// The edge never samples below this value, regardless of the factors applied.
    MinimumSampleRate {
        /// The lowest sample rate to apply.
        value: f64,
    },
}

impl SamplingValue {
    /// Returns the numeric value regardless of the strategy.
    pub fn value(&self) -> f64 {
        match *self {
            SamplingValue::SampleRate { value } => value,
            SamplingValue::Factor { value } => value,
            SamplingValue::MinimumSampleRate { value } => value,
        }
    }
}

/// Defines what a dynamic sampling rule applies to.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum RuleType {
    /// A project rule applies to all transactions of a project.
    Project,
    /// A trace rule matches on the dynamic sampling context and applies to all transactions in a
    /// trace.
    Trace,
    /// A transaction rule matches directly on the transaction event independent of the trace.
    Transaction,
}

/// The identifier of a [`SamplingRule`].
///
/// This number must be unique within an organization, as it is recorded in outcomes and used
/// to infer which sampling rule caused data to be dropped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct RuleId(pub u32);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A range of time.
///
/// The time range should be applicable between the start time, inclusive, and
/// end time, exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    /// The inclusive start of the time range.
    pub start: Option<DateTime<Utc>>,

    /// The exclusive end of the time range.
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    /// Returns true if neither the start nor end time limits are set.
    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Returns whether the provided time matches the time range.
    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        self.start.is_none_or(|s| s <= time) && self.end.is_none_or(|e| time < e)
    }
}

/// Specifies how to interpolate sample rates for rules with bounded time window.
#[derive(Default, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(tag = "type")]
pub enum DecayingFunction {
    /// Apply linear interpolation of the sample rate in the time window.
    ///
    /// The rule will start to apply with the configured value at the beginning of the time
    /// window and end with `decayed_value` at the end of the time window.
    #[serde(rename_all = "camelCase")]
    Linear {
        /// The target value at the end of the time window.
        decayed_value: f64,
    },

    /// Apply the value of the rule for the full time window with hard cutoff.
    #[default]
    Constant,
}
