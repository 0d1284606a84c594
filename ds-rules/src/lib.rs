//! Dynamic sampling rules as they are published to the ingestion edge.
//!
//! The sampling engine computes an ordered list of [`SamplingRule`]s per project. Each rule carries
//! a [`RuleCondition`] that the edge matches against the trace or transaction, and a
//! [`SamplingValue`] that is either an absolute sample rate, a multiplicative factor, or a
//! minimum sample rate floor. Rule order is significant: the edge applies first-match semantics for
//! sample rates and accumulates factors on the way.
//!
//! Every rule id is taken from a range reserved for the bias that produced it, see [`ReservedIds`].
//! This keeps ids stable across deployments, since the edge records them in outcomes.
//!
//! # Example
//!
//! ```
//! use ds_rules::{RuleCondition, RuleId, RuleType, SamplingRule, SamplingValue};
//!
//! let rule = SamplingRule {
//!     id: RuleId(1000),
//!     ty: RuleType::Trace,
//!     condition: RuleCondition::all(),
//!     sampling_value: SamplingValue::SampleRate { value: 0.25 },
//!     time_range: Default::default(),
//!     decaying_fn: Default::default(),
//! };
//!
//! let json = serde_json::to_value(&rule).unwrap();
//! assert_eq!(json["samplingValue"]["type"], "sampleRate");
//! ```
#![warn(missing_docs)]

mod condition;
mod config;
mod reserved;

pub use self::condition::*;
pub use self::config::*;
pub use self::reserved::*;

pub(crate) mod utils {
    /// Returns `true` if this value is equal to `Default::default()`.
    pub fn is_default<T: Default + PartialEq>(t: &T) -> bool {
        *t == T::default()
    }
}
