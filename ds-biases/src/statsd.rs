use ds_statsd::{DistributionMetric, TimerMetric};

pub enum BiasTimers {
    /// Time to compute the rules of a single project, including cache reads.
    GenerateRules,
}

impl TimerMetric for BiasTimers {
    fn name(&self) -> &'static str {
        match self {
            Self::GenerateRules => "biases.generate_rules.duration",
        }
    }
}

pub enum BiasDistributions {
    /// Number of rules generated for a project.
    RuleCount,
}

impl DistributionMetric for BiasDistributions {
    fn name(&self) -> &'static str {
        match self {
            Self::RuleCount => "biases.generate_rules.rule_count",
        }
    }
}
