use std::fs::OpenOptions;
use std::io::{self, Write};

use anyhow::{Context, Result};
use ds_biases::{BiasRegistry, JsonRulePublisher};
use ds_cache::{KeyValueStore, MemoryStore, RedisStore};
use ds_config::Config;
use ds_redis::AsyncRedisPool;
use ds_statsd::MetricsClientConfig;
use ds_tasks::{FixtureStats, JobKind, Worker, WorkerState, boost_observed_releases};

type Output = Box<dyn Write + Send>;

/// Initialize the logging system and Sentry.
pub fn init_logging(config: &Config) {
    ds_log::init(config.logging(), config.sentry());
}

/// Print spawn infos to the log.
pub fn dump_spawn_infos(config: &Config) {
    if config.path().as_os_str().is_empty() {
        ds_log::info!("launching dynamic sampling worker without config folder");
    } else {
        ds_log::info!(
            "launching dynamic sampling worker from config folder {}",
            config.path().display()
        );
    }
    ds_log::info!("  log level: {}", config.logging().level);
    ds_log::info!(
        "  cache: {}",
        if config.redis().is_some() { "redis" } else { "memory" }
    );
    match config.output_path() {
        Some(path) => ds_log::info!("  output: {}", path.display()),
        None => ds_log::info!("  output: -"),
    }
}

/// Prints the effective configuration as YAML.
#[allow(clippy::print_stdout)]
pub fn dump_config(config: &Config) -> Result<()> {
    print!("{}", config.to_yaml_string()?);
    Ok(())
}

/// Initialize the metric system.
pub fn init_metrics(config: &Config) -> Result<()> {
    let Some(host) = config.statsd_addr() else {
        return Ok(());
    };

    let mut default_tags = config.metrics_default_tags().clone();
    if let Some(hostname_tag) = config.metrics_hostname_tag()
        && let Some(hostname) = hostname::get().ok().and_then(|s| s.into_string().ok())
    {
        default_tags.insert(hostname_tag.to_owned(), hostname);
    }

    ds_statsd::init(MetricsClientConfig {
        prefix: config.metrics_prefix(),
        host,
        default_tags,
        sample_rate: config.metrics_sample_rate(),
    })?;

    Ok(())
}

fn open_output(config: &Config) -> Result<Output> {
    let Some(path) = config.output_path() else {
        return Ok(Box::new(io::stdout()));
    };

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open output file {}", path.display()))?;

    Ok(Box::new(io::BufWriter::new(file)))
}

/// Runs one scheduling cycle with the cache configured in `config`.
pub async fn run_cycle(config: &Config, stats: FixtureStats, kinds: &[JobKind]) -> Result<()> {
    let publisher = JsonRulePublisher::new(open_output(config)?);

    match config.redis() {
        Some(redis) => {
            let pool = AsyncRedisPool::from_config(redis).context("failed to create redis pool")?;
            run_worker(config, stats, RedisStore::new(pool), publisher, kinds).await
        }
        None => {
            ds_log::warn!("no redis configured, caches only live for this cycle");
            run_worker(config, stats, MemoryStore::new(), publisher, kinds).await
        }
    }
}

async fn run_worker<S>(
    config: &Config,
    stats: FixtureStats,
    store: S,
    publisher: JsonRulePublisher<Output>,
    kinds: &[JobKind],
) -> Result<()>
where
    S: KeyValueStore + 'static,
{
    let releases = stats.observed_releases();
    if !releases.is_empty() {
        let boosted = boost_observed_releases(&store, &releases)
            .await
            .context("failed to boost observed releases")?;
        ds_log::info!("boosted {boosted} of {} observed releases", releases.len());
    }

    let worker = Worker::new(WorkerState {
        stats,
        store,
        publisher,
        registry: BiasRegistry::default_biases(),
        tasks: config.tasks().clone(),
        sampling: config.sampling().clone(),
    });

    let summary = worker.run_cycle(kinds).await?;
    if summary.jobs.failed > 0 {
        anyhow::bail!(
            "{} of {} dynamic sampling jobs failed",
            summary.jobs.failed,
            summary.jobs.failed + summary.jobs.succeeded
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_cycle_writes_rules() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("rules.jsonl");

        let config = Config::from_json_value(json!({
            "output": {"path": output},
            "sampling": {"default_sample_rate": 0.5}
        }))
        .unwrap();

        let stats = FixtureStats::from_json(
            r#"{"organizations": [{
                "id": 1,
                "projects": [
                    {"id": 11, "organization_id": 1, "releases": {"7": "1.0.0"}},
                    {"id": 12, "organization_id": 1}
                ],
                "volumes": {"24": [{"project_id": 11, "total": 100}]},
                "releases": [{"project_id": 11, "release_id": 7}]
            }]}"#,
        )
        .unwrap();

        run_cycle(&config, stats, &[JobKind::RecalculateRules])
            .await
            .unwrap();

        let written = std::fs::read_to_string(&output).unwrap();
        let lines: Vec<serde_json::Value> = written
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        let project_ids: Vec<u64> = lines
            .iter()
            .map(|value| value["projectId"].as_u64().unwrap())
            .collect();
        assert_eq!(project_ids, [11, 12]);

        // The release observed in project 11 is boosted before the rules are generated.
        let has_release_rule = |value: &serde_json::Value| {
            value["config"]["rules"]
                .as_array()
                .unwrap()
                .iter()
                .any(|rule| rule["id"] == 1500)
        };
        assert!(has_release_rule(&lines[0]));
        assert!(!has_release_rule(&lines[1]));
    }
}
