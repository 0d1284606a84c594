use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ds_log::{Level, LogConfig, SentryConfig};
use ds_redis::RedisConfig;
use ds_tasks::{SamplingSettings, TaskConfig};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

type BoxedError = Box<dyn Error + Send + Sync + 'static>;

/// Where a config error originates.
#[derive(Debug, Default)]
enum ConfigErrorSource {
    /// An error occurring independently.
    #[default]
    None,
    /// An error originating from a configuration file.
    File(PathBuf),
    /// An error originating in a field override (an env var, or a CLI parameter).
    FieldOverride(String),
}

/// Indicates config related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ConfigErrorKind {
    /// Failed to open the file.
    #[error("could not open config file")]
    CouldNotOpenFile,
    /// Failed to serialize the configuration.
    #[error("could not write config file")]
    CouldNotWriteFile,
    /// Parsing YAML failed.
    #[error("could not parse yaml config file")]
    BadYaml,
    /// Parsing JSON failed.
    #[error("could not parse json config file")]
    BadJson,
    /// A config value is out of range or malformed.
    #[error("invalid config value")]
    InvalidValue,
}

/// Indicates config related errors.
#[derive(Debug)]
pub struct ConfigError {
    kind: ConfigErrorKind,
    source: ConfigErrorSource,
    inner: Option<BoxedError>,
}

impl ConfigError {
    #[inline]
    fn new(kind: ConfigErrorKind) -> Self {
        Self {
            kind,
            source: ConfigErrorSource::None,
            inner: None,
        }
    }

    #[inline]
    fn wrap<E>(inner: E, kind: ConfigErrorKind) -> Self
    where
        E: Into<BoxedError>,
    {
        Self {
            kind,
            source: ConfigErrorSource::None,
            inner: Some(inner.into()),
        }
    }

    #[inline]
    fn for_field<E>(inner: E, field: &'static str) -> Self
    where
        E: Into<BoxedError>,
    {
        Self::wrap(inner, ConfigErrorKind::InvalidValue).field(field)
    }

    #[inline]
    fn file(mut self, path: impl AsRef<Path>) -> Self {
        self.source = ConfigErrorSource::File(path.as_ref().to_path_buf());
        self
    }

    #[inline]
    fn field(mut self, name: &'static str) -> Self {
        self.source = ConfigErrorSource::FieldOverride(name.to_owned());
        self
    }

    /// Returns the error kind of the error.
    pub fn kind(&self) -> ConfigErrorKind {
        self.kind
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            ConfigErrorSource::None => write!(f, "{}", self.kind),
            ConfigErrorSource::File(file_name) => {
                write!(f, "{} (file {})", self.kind, file_name.display())
            }
            ConfigErrorSource::FieldOverride(name) => write!(f, "{} (field {name})", self.kind),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.inner.as_ref().map(|e| e.as_ref() as &(dyn Error + 'static))
    }
}

/// A configuration file stored in YAML format within the config folder.
trait ConfigObject: DeserializeOwned + Serialize {
    /// The basename of the config file.
    fn name() -> &'static str;

    /// The full filename of the config file, including the file extension.
    fn path(base: &Path) -> PathBuf {
        base.join(format!("{}.yml", Self::name()))
    }

    /// Loads the config file from a file within the given directory location.
    fn load(base: &Path) -> Result<Self, ConfigError> {
        let path = Self::path(base);

        let f = fs::File::open(&path)
            .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::CouldNotOpenFile).file(&path))?;

        serde_yaml::from_reader(io::BufReader::new(f))
            .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::BadYaml).file(&path))
    }
}

/// Structure used to hold information about configuration overrides via
/// CLI parameters or environment variables.
#[derive(Debug, Default)]
pub struct OverridableConfig {
    /// The redis server url.
    pub redis_url: Option<String>,
    /// Host and port of the statsd server.
    pub statsd: Option<String>,
    /// The log level.
    pub log_level: Option<String>,
    /// File receiving the generated rules.
    pub output: Option<String>,
}

/// Controls internal metrics.
#[derive(Serialize, Deserialize, Debug)]
#[serde(default)]
struct Metrics {
    /// Hostname and port of the statsd server.
    ///
    /// Defaults to `None`, which disables metrics.
    statsd: Option<String>,
    /// Common prefix that should be added to all metrics.
    prefix: String,
    /// Default tags to apply to all metrics.
    default_tags: BTreeMap<String, String>,
    /// Tag name to report the hostname to for each metric. Defaults to not sending such a tag.
    hostname_tag: Option<String>,
    /// Global sample rate for all emitted metrics between `0.0` and `1.0`.
    sample_rate: f64,
}

impl Default for Metrics {
    fn default() -> Self {
        Metrics {
            statsd: None,
            prefix: "sentry.dynamic_sampling".to_owned(),
            default_tags: BTreeMap::new(),
            hostname_tag: None,
            sample_rate: 1.0,
        }
    }
}

/// Controls where generated rules are published.
#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(default)]
struct Output {
    /// File to append rules to as JSON lines. Defaults to standard output.
    path: Option<PathBuf>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
struct ConfigValues {
    #[serde(default)]
    logging: LogConfig,
    #[serde(default)]
    sentry: SentryConfig,
    #[serde(default)]
    metrics: Metrics,
    #[serde(default)]
    redis: Option<RedisConfig>,
    #[serde(default)]
    tasks: TaskConfig,
    #[serde(default)]
    sampling: SamplingSettings,
    #[serde(default)]
    output: Output,
}

impl ConfigObject for ConfigValues {
    fn name() -> &'static str {
        "config"
    }
}

/// Config struct.
#[derive(Debug)]
pub struct Config {
    values: ConfigValues,
    path: PathBuf,
}

impl Config {
    /// Loads a config from a given config folder.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let path = std::env::current_dir()
            .map(|x| x.join(path.as_ref()))
            .unwrap_or_else(|_| path.as_ref().to_path_buf());

        let values = ConfigValues::load(&path)?;
        validate(&values).map_err(|e| e.file(ConfigValues::path(&path)))?;

        Ok(Config { values, path })
    }

    /// Creates a config from a JSON value.
    ///
    /// This is mostly useful for tests.
    pub fn from_json_value(value: serde_json::Value) -> Result<Config, ConfigError> {
        let values = serde_json::from_value(value)
            .map_err(|err| ConfigError::wrap(err, ConfigErrorKind::BadJson))?;
        validate(&values)?;

        Ok(Config {
            values,
            path: PathBuf::new(),
        })
    }

    /// Override configuration with values coming from other sources (e.g. env variables or
    /// command line parameters).
    pub fn apply_override(
        &mut self,
        overrides: OverridableConfig,
    ) -> Result<&mut Self, ConfigError> {
        if let Some(redis) = overrides.redis_url {
            self.values.redis = Some(RedisConfig::Single(redis));
        }

        if let Some(statsd) = overrides.statsd {
            self.values.metrics.statsd = Some(statsd);
        }

        if let Some(level) = overrides.log_level {
            self.values.logging.level = level
                .parse::<Level>()
                .map_err(|err| ConfigError::for_field(err, "log_level"))?;
        }

        if let Some(output) = overrides.output {
            if output.is_empty() {
                return Err(ConfigError::new(ConfigErrorKind::InvalidValue).field("output"));
            }
            self.values.output.path = Some(PathBuf::from(output));
        }

        Ok(self)
    }

    /// Checks if the config is already initialized.
    pub fn config_exists<P: AsRef<Path>>(path: P) -> bool {
        fs::metadata(ConfigValues::path(path.as_ref())).is_ok()
    }

    /// Returns the path of the config folder.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Dumps out a YAML string of the values.
    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(&self.values)
            .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::CouldNotWriteFile))
    }

    /// Returns the logging configuration.
    pub fn logging(&self) -> &LogConfig {
        &self.values.logging
    }

    /// Returns the Sentry configuration.
    pub fn sentry(&self) -> &SentryConfig {
        &self.values.sentry
    }

    /// Returns the address of the statsd server, if metrics are enabled.
    pub fn statsd_addr(&self) -> Option<&str> {
        self.values.metrics.statsd.as_deref()
    }

    /// Returns the prefix of all metrics.
    pub fn metrics_prefix(&self) -> &str {
        &self.values.metrics.prefix
    }

    /// Returns the default tags of all metrics.
    pub fn metrics_default_tags(&self) -> &BTreeMap<String, String> {
        &self.values.metrics.default_tags
    }

    /// Returns the tag name reporting the hostname, if any.
    pub fn metrics_hostname_tag(&self) -> Option<&str> {
        self.values.metrics.hostname_tag.as_deref()
    }

    /// Returns the global sample rate of metrics.
    pub fn metrics_sample_rate(&self) -> f64 {
        self.values.metrics.sample_rate
    }

    /// Returns the redis configuration.
    ///
    /// Without redis, the caches are kept in memory for the lifetime of the process.
    pub fn redis(&self) -> Option<&RedisConfig> {
        self.values.redis.as_ref()
    }

    /// Returns the task budgets and windows.
    pub fn tasks(&self) -> &TaskConfig {
        &self.values.tasks
    }

    /// Returns the sampling targets.
    pub fn sampling(&self) -> &SamplingSettings {
        &self.values.sampling
    }

    /// Returns the file receiving generated rules, `None` for standard output.
    pub fn output_path(&self) -> Option<&Path> {
        self.values.output.path.as_deref()
    }
}

fn validate(values: &ConfigValues) -> Result<(), ConfigError> {
    let rates = [
        ("sampling.default_sample_rate", values.sampling.default_sample_rate),
        ("sampling.rebalance_intensity", values.sampling.rebalance_intensity),
        ("metrics.sample_rate", values.metrics.sample_rate),
    ];

    for (field, rate) in rates {
        if !(0.0..=1.0).contains(&rate) {
            return Err(ConfigError::new(ConfigErrorKind::InvalidValue).field(field));
        }
    }

    if let Some(tier) = values
        .sampling
        .tiers
        .0
        .iter()
        .find(|tier| !(0.0..=1.0).contains(&tier.sample_rate))
    {
        ds_log::debug!(volume = tier.volume, "sample rate tier out of range");
        return Err(ConfigError::new(ConfigErrorKind::InvalidValue).field("sampling.tiers"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    fn write_config(yaml: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.yml"), yaml).unwrap();
        dir
    }

    #[test]
    fn test_load_from_folder() {
        let dir = write_config(
            r#"
logging:
  level: debug
metrics:
  statsd: 127.0.0.1:8126
  default_tags:
    region: eu
redis: redis://127.0.0.1:6379
tasks:
  collect_orgs:
    batch_size: 50
  sliding_window:
    window_hours: 12
sampling:
  default_sample_rate: 0.25
  tiers:
    - volume: 1000000
      sample_rate: 0.1
output:
  path: rules.jsonl
"#,
        );

        assert!(Config::config_exists(dir.path()));
        let config = Config::from_path(dir.path()).unwrap();

        assert_eq!(config.logging().level, Level::Debug);
        assert_eq!(config.statsd_addr(), Some("127.0.0.1:8126"));
        assert_eq!(config.metrics_prefix(), "sentry.dynamic_sampling");
        assert_eq!(config.metrics_default_tags()["region"], "eu");
        assert_eq!(config.redis(), Some(&RedisConfig::default()));
        assert_eq!(config.tasks().collect_orgs.batch_size, 50);
        assert_eq!(
            config.tasks().sliding_window.window(),
            Duration::from_secs(12 * 3600)
        );
        assert_eq!(config.sampling().default_sample_rate, 0.25);
        assert_eq!(config.sampling().tiers.sample_rate_for(2_000_000), Some(0.1));
        assert_eq!(config.output_path(), Some(Path::new("rules.jsonl")));
    }

    #[test]
    fn test_empty_config() {
        let dir = write_config("{}");
        let config = Config::from_path(dir.path()).unwrap();

        assert_eq!(config.logging().level, Level::Info);
        assert_eq!(config.statsd_addr(), None);
        assert_eq!(config.redis(), None);
        assert_eq!(config.tasks(), &TaskConfig::default());
        assert_eq!(config.sampling(), &SamplingSettings::default());
        assert_eq!(config.output_path(), None);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!Config::config_exists(dir.path()));

        let error = Config::from_path(dir.path()).unwrap_err();
        assert_eq!(error.kind(), ConfigErrorKind::CouldNotOpenFile);
        assert!(error.source().is_some());
        assert!(error.to_string().starts_with("could not open config file (file "));
    }

    #[test]
    fn test_bad_yaml() {
        let dir = write_config("sampling: [");
        let error = Config::from_path(dir.path()).unwrap_err();
        assert_eq!(error.kind(), ConfigErrorKind::BadYaml);
    }

    #[test]
    fn test_out_of_range_rate() {
        let dir = write_config("sampling:\n  default_sample_rate: 1.5\n");
        let error = Config::from_path(dir.path()).unwrap_err();
        assert_eq!(error.kind(), ConfigErrorKind::InvalidValue);
        assert!(error.to_string().contains("config.yml"));

        let error = Config::from_json_value(json!({
            "sampling": {"tiers": [{"volume": 0, "sample_rate": -0.1}]}
        }))
        .unwrap_err();
        assert_eq!(
            error.to_string(),
            "invalid config value (field sampling.tiers)"
        );
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::from_json_value(json!({})).unwrap();
        config
            .apply_override(OverridableConfig {
                redis_url: Some("redis://10.0.0.1:6379".to_owned()),
                statsd: Some("10.0.0.2:8126".to_owned()),
                log_level: Some("trace".to_owned()),
                output: Some("/tmp/rules.jsonl".to_owned()),
            })
            .unwrap();

        assert_eq!(
            config.redis(),
            Some(&RedisConfig::Single("redis://10.0.0.1:6379".to_owned()))
        );
        assert_eq!(config.statsd_addr(), Some("10.0.0.2:8126"));
        assert_eq!(config.logging().level, Level::Trace);
        assert_eq!(config.output_path(), Some(Path::new("/tmp/rules.jsonl")));
    }

    #[test]
    fn test_invalid_override() {
        let mut config = Config::from_json_value(json!({})).unwrap();
        let error = config
            .apply_override(OverridableConfig {
                log_level: Some("loud".to_owned()),
                ..Default::default()
            })
            .unwrap_err();

        assert_eq!(error.kind(), ConfigErrorKind::InvalidValue);
        assert_eq!(error.to_string(), "invalid config value (field log_level)");
        assert!(error.source().is_some());
    }

    #[test]
    fn test_yaml_dump_roundtrips() {
        let config = Config::from_json_value(json!({
            "redis": "redis://127.0.0.1:6379",
            "tasks": {"concurrency": 3}
        }))
        .unwrap();

        let dir = write_config(&config.to_yaml_string().unwrap());
        let reloaded = Config::from_path(dir.path()).unwrap();
        assert_eq!(reloaded.tasks().concurrency, 3);
        assert_eq!(reloaded.redis(), config.redis());
    }
}
