use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ds_config::{Config, OverridableConfig};
use ds_tasks::{FixtureStats, JobKind};

use crate::setup;

/// Computes dynamic sampling rules for all active organizations.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// The path to the config folder.
    #[arg(short, long, env = "DS_CONFIG_PATH", default_value = ".ds")]
    config: PathBuf,

    /// The redis server url. Without redis, caches are kept in memory.
    #[arg(long, env = "DS_REDIS_URL", global = true)]
    redis_url: Option<String>,

    /// Host and port of the statsd server.
    #[arg(long, env = "DS_STATSD", global = true)]
    statsd: Option<String>,

    /// The log level.
    #[arg(long, env = "DS_LOG_LEVEL", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Runs a single scheduling cycle.
    Run {
        /// JSON document with organizations, projects and their volumes.
        #[arg(long)]
        stats: PathBuf,

        /// File to append the generated rules to. Defaults to standard output.
        #[arg(short, long)]
        output: Option<String>,

        /// Jobs to run for every organization. Defaults to all jobs.
        #[arg(long = "job", value_enum)]
        jobs: Vec<JobArg>,
    },

    /// Prints the effective configuration.
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum JobArg {
    SlidingWindow,
    BoostLowVolumeProjects,
    RecalculateRules,
}

impl From<JobArg> for JobKind {
    fn from(value: JobArg) -> Self {
        match value {
            JobArg::SlidingWindow => JobKind::SlidingWindowOrg,
            JobArg::BoostLowVolumeProjects => JobKind::BoostLowVolumeProjects,
            JobArg::RecalculateRules => JobKind::RecalculateRules,
        }
    }
}

/// Job kinds in the order they run for each organization.
const ALL_JOBS: [JobKind; 3] = [
    JobKind::SlidingWindowOrg,
    JobKind::BoostLowVolumeProjects,
    JobKind::RecalculateRules,
];

fn job_kinds(jobs: &[JobArg]) -> Vec<JobKind> {
    if jobs.is_empty() {
        return ALL_JOBS.to_vec();
    }

    // Keep the dependency order regardless of the order on the command line.
    let requested: Vec<JobKind> = jobs.iter().copied().map(JobKind::from).collect();
    ALL_JOBS
        .into_iter()
        .filter(|kind| requested.contains(kind))
        .collect()
}

fn load_config(cli: &Cli, output: Option<String>) -> Result<Config> {
    let mut config = if Config::config_exists(&cli.config) {
        Config::from_path(&cli.config)?
    } else {
        Config::from_json_value(serde_json::json!({}))?
    };

    config.apply_override(OverridableConfig {
        redis_url: cli.redis_url.clone(),
        statsd: cli.statsd.clone(),
        log_level: cli.log_level.clone(),
        output,
    })?;

    Ok(config)
}

/// Runs the command line application.
pub fn execute() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Command::Run {
            stats,
            output,
            jobs,
        } => {
            let config = load_config(&cli, output.clone())?;
            let stats = FixtureStats::from_path(stats)
                .with_context(|| format!("failed to load statistics from {}", stats.display()))?;
            run(config, stats, &job_kinds(jobs))
        }
        Command::Config => {
            let config = load_config(&cli, None)?;
            setup::dump_config(&config)
        }
    }
}

fn run(config: Config, stats: FixtureStats, kinds: &[JobKind]) -> Result<()> {
    setup::init_logging(&config);
    setup::dump_spawn_infos(&config);
    setup::init_metrics(&config)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;

    runtime.block_on(setup::run_cycle(&config, stats, kinds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "ds-worker",
            "--config",
            "/etc/ds",
            "run",
            "--stats",
            "stats.json",
            "--job",
            "recalculate-rules",
            "--job",
            "sliding-window",
            "--redis-url",
            "redis://127.0.0.1:6379",
        ])
        .unwrap();

        assert_eq!(cli.config, PathBuf::from("/etc/ds"));
        assert_eq!(cli.redis_url.as_deref(), Some("redis://127.0.0.1:6379"));

        let Command::Run { stats, jobs, .. } = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(stats, PathBuf::from("stats.json"));
        assert_eq!(
            job_kinds(&jobs),
            [JobKind::SlidingWindowOrg, JobKind::RecalculateRules]
        );
    }

    #[test]
    fn test_all_jobs_by_default() {
        assert_eq!(job_kinds(&[]), ALL_JOBS);
    }

    #[test]
    fn test_missing_config_folder_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli::try_parse_from([
            "ds-worker",
            "--config",
            dir.path().to_str().unwrap(),
            "--log-level",
            "debug",
            "config",
        ])
        .unwrap();

        let config = load_config(&cli, Some("rules.jsonl".to_owned())).unwrap();
        assert_eq!(config.logging().level, ds_log::Level::Debug);
        assert_eq!(
            config.output_path(),
            Some(std::path::Path::new("rules.jsonl"))
        );
        assert!(config.redis().is_none());
    }
}
