use std::fmt;
use std::future::Future;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use ds_cache::KeyValueStore;
use ds_rules::SamplingRule;
use serde::{Deserialize, Serialize};

use crate::biases::{
    BoostEnvironmentsBias, BoostKeyTransactionsBias, BoostLatestReleaseBias, BoostReplayIdBias,
    IgnoreHealthChecksBias, MinimumSampleRateBias, UniformBias,
};
use crate::project::Project;

/// Inputs shared by all biases during one rule computation.
#[derive(Debug)]
pub struct BiasContext<'a, S: ?Sized> {
    /// The project rules are computed for.
    pub project: &'a Project,
    /// The store holding the rolling window caches.
    pub store: &'a S,
    /// The resolved base sample rate of the project.
    pub base_sample_rate: f64,
    /// The time of the computation.
    pub now: DateTime<Utc>,
}

impl<'a, S: ?Sized> BiasContext<'a, S> {
    /// Creates a context for a computation at the current time.
    pub fn new(project: &'a Project, store: &'a S, base_sample_rate: f64) -> Self {
        Self {
            project,
            store,
            base_sample_rate,
            now: Utc::now(),
        }
    }

    /// Overrides the time of the computation.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }
}

/// A strategy that raises or lowers the sample rate of some traffic.
///
/// A bias is split into a data provider, [`get_params`](Self::get_params), which reads whatever
/// state the bias depends on, and a pure rules generator, [`generate_rules`](Self::generate_rules).
pub trait Bias {
    /// Parameters read by the data provider.
    type Params: Send;

    /// Reads the parameters of this bias.
    ///
    /// Returns `None` if the bias does not apply to the project. This is the common case and not
    /// an error.
    fn get_params<S>(
        &self,
        context: &BiasContext<'_, S>,
    ) -> impl Future<Output = Option<Self::Params>> + Send
    where
        S: KeyValueStore + ?Sized;

    /// Turns parameters into sampling rules.
    ///
    /// Returns an empty list if `params` is `None` or empty.
    fn generate_rules(
        &self,
        project: &Project,
        base_sample_rate: f64,
        params: Option<Self::Params>,
    ) -> Vec<SamplingRule>;
}

/// Runs the data provider and the rules generator of a bias.
async fn evaluate<B, S>(bias: &B, context: &BiasContext<'_, S>) -> Vec<SamplingRule>
where
    B: Bias + Sync,
    S: KeyValueStore + ?Sized,
{
    let params = bias.get_params(context).await;
    bias.generate_rules(context.project, context.base_sample_rate, params)
}

/// All biases known to the sampling engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BiasKind {
    /// Samples development environments entirely.
    #[serde(rename = "boostEnvironments")]
    BoostEnvironments,
    /// Boosts releases for an hour after they are first seen.
    #[serde(rename = "boostLatestRelease")]
    BoostLatestRelease,
    /// Reduces health check transactions.
    #[serde(rename = "ignoreHealthChecks")]
    IgnoreHealthChecks,
    /// Boosts key transactions.
    #[serde(rename = "boostKeyTransactions")]
    BoostKeyTransactions,
    /// Samples traces with a replay entirely.
    #[serde(rename = "boostReplayId")]
    BoostReplayId,
    /// Never samples below the base sample rate.
    #[serde(rename = "minimumSampleRate")]
    MinimumSampleRate,
    /// The base sample rate applied to all remaining traffic.
    #[serde(rename = "uniformRule")]
    Uniform,
}

impl BiasKind {
    /// All biases in declaration order.
    pub const ALL: [BiasKind; 7] = [
        BiasKind::BoostEnvironments,
        BiasKind::BoostLatestRelease,
        BiasKind::IgnoreHealthChecks,
        BiasKind::BoostKeyTransactions,
        BiasKind::BoostReplayId,
        BiasKind::MinimumSampleRate,
        BiasKind::Uniform,
    ];

    /// Returns the stable string id of this bias.
    pub fn id(self) -> &'static str {
        match self {
            Self::BoostEnvironments => "boostEnvironments",
            Self::BoostLatestRelease => "boostLatestRelease",
            Self::IgnoreHealthChecks => "ignoreHealthChecks",
            Self::BoostKeyTransactions => "boostKeyTransactions",
            Self::BoostReplayId => "boostReplayId",
            Self::MinimumSampleRate => "minimumSampleRate",
            Self::Uniform => "uniformRule",
        }
    }

    /// Returns `false` for biases that cannot be switched off by users.
    pub fn is_toggleable(self) -> bool {
        !matches!(self, Self::Uniform)
    }

    /// Computes the rules of this bias.
    pub async fn rules<S>(self, context: &BiasContext<'_, S>) -> Vec<SamplingRule>
    where
        S: KeyValueStore + ?Sized,
    {
        match self {
            Self::BoostEnvironments => evaluate(&BoostEnvironmentsBias, context).await,
            Self::BoostLatestRelease => evaluate(&BoostLatestReleaseBias, context).await,
            Self::IgnoreHealthChecks => evaluate(&IgnoreHealthChecksBias, context).await,
            Self::BoostKeyTransactions => evaluate(&BoostKeyTransactionsBias, context).await,
            Self::BoostReplayId => evaluate(&BoostReplayIdBias, context).await,
            Self::MinimumSampleRate => evaluate(&MinimumSampleRateBias, context).await,
            Self::Uniform => evaluate(&UniformBias, context).await,
        }
    }
}

impl fmt::Display for BiasKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Error returned when parsing an unknown bias id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownBias(pub String);

impl fmt::Display for UnknownBias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown bias: {}", self.0)
    }
}

impl std::error::Error for UnknownBias {}

impl FromStr for BiasKind {
    type Err = UnknownBias;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.id() == s)
            .ok_or_else(|| UnknownBias(s.to_owned()))
    }
}
