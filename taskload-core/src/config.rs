use crate::constants::*;
use crate::error::ConfigError;
use crate::threshold::ThresholdSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::num::NonZeroU32;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// Everything a run needs to know up front. Immutable once the run starts.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub base_url: String,
    pub stages: Vec<Stage>,
    pub ramp: RampKind,
    /// Metric key (e.g. `http_req_duration{name:Create}`) to threshold expressions.
    pub thresholds: BTreeMap<String, Vec<String>>,
    pub accounts: AccountConfig,
    pub payload: PayloadConfig,
    #[serde(with = "humantime_serde")]
    pub iteration_sleep: Duration,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Option<Duration>,
    #[serde(with = "humantime_serde")]
    pub graceful_stop: Duration,
    pub setup_failure: SetupFailurePolicy,
    pub seed: Option<u64>,
    pub max_rps: Option<NonZeroU32>,
}

impl Default for RunConfig {
    fn default() -> Self {
        let mut thresholds = BTreeMap::new();
        thresholds.insert(
            "http_req_duration".to_string(),
            vec!["p(95)<500".to_string(), "p(99)<1500".to_string()],
        );
        for name in ["Create", "Update", "Get", "Delete"] {
            thresholds.insert(
                format!("http_req_duration{{name:{name}}}"),
                vec!["avg<600".to_string(), "max<1000".to_string()],
            );
        }

        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            stages: vec![
                Stage::new(50, Duration::from_secs(30)),
                Stage::new(200, Duration::from_secs(30)),
            ],
            ramp: RampKind::Linear,
            thresholds,
            accounts: AccountConfig::default(),
            payload: PayloadConfig::default(),
            iteration_sleep: DEFAULT_ITERATION_SLEEP,
            request_timeout: None,
            graceful_stop: DEFAULT_GRACEFUL_STOP,
            setup_failure: SetupFailurePolicy::Continue,
            seed: None,
            max_rps: None,
        }
    }
}

impl RunConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!("Loading run config from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_stages(mut self, stages: Vec<Stage>) -> Self {
        self.stages = stages;
        self
    }

    /// Replace every threshold with the given set.
    pub fn with_thresholds<I, K, V>(mut self, thresholds: I) -> Self
    where
        I: IntoIterator<Item = (K, Vec<V>)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.thresholds = thresholds
            .into_iter()
            .map(|(k, v)| (k.into(), v.into_iter().map(Into::into).collect()))
            .collect();
        self
    }

    /// Add a single expression to the given metric key.
    pub fn add_threshold(&mut self, metric: &str, expression: &str) {
        self.thresholds
            .entry(metric.to_string())
            .or_default()
            .push(expression.to_string());
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn total_duration(&self) -> Duration {
        self.stages.iter().map(|s| s.duration).sum()
    }

    pub fn max_target(&self) -> usize {
        self.stages.iter().map(|s| s.target).max().unwrap_or(0)
    }

    pub fn threshold_sets(&self) -> Result<Vec<ThresholdSet>, ConfigError> {
        self.thresholds
            .iter()
            .map(|(key, exprs)| ThresholdSet::parse(key, exprs).map_err(ConfigError::from))
            .collect()
    }

    /// Check the config and return the parsed thresholds.
    pub fn validate(&self) -> Result<Vec<ThresholdSet>, ConfigError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "base_url must be an http(s) URL, got `{}`",
                self.base_url
            )));
        }
        if self.stages.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one stage must be specified".to_string(),
            ));
        }
        if let Some(idx) = self.stages.iter().position(|s| s.duration.is_zero()) {
            return Err(ConfigError::Invalid(format!(
                "stage {idx} has a zero duration"
            )));
        }
        if self.stages.iter().all(|s| s.target == 0) {
            warn!("Every stage targets 0 VUs; only setup will run");
        }
        if self.payload.alphabet.is_empty() {
            return Err(ConfigError::Invalid("payload alphabet is empty".to_string()));
        }
        if self.payload.create_summary_len == 0 || self.payload.update_summary_len == 0 {
            return Err(ConfigError::Invalid(
                "summary lengths must be greater than zero".to_string(),
            ));
        }

        self.threshold_sets()
    }
}

/// A time window with a target VU count the driver ramps toward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub target: usize,
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
}

impl Stage {
    pub fn new(target: usize, duration: Duration) -> Self {
        Self { target, duration }
    }
}

impl FromStr for Stage {
    type Err = ConfigError;

    /// Parses `<target>:<duration>`, e.g. `50:30s`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (target, duration) = s
            .split_once(':')
            .ok_or_else(|| ConfigError::Stage(s.to_string()))?;
        let target = target
            .trim()
            .parse()
            .map_err(|_| ConfigError::Stage(s.to_string()))?;
        let duration = parse_duration(duration.trim())?;
        Ok(Stage::new(target, duration))
    }
}

/// How the VU count moves between stage targets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RampKind {
    /// Interpolate from the previous target over the stage duration.
    #[default]
    Linear,
    /// Jump to the stage target when the stage begins.
    Step,
}

/// What to do when registration or login fails during setup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupFailurePolicy {
    /// Record the failed checks and run with whatever tokens were obtained.
    #[default]
    Continue,
    /// Fail the run before any iteration starts.
    Abort,
}

impl FromStr for SetupFailurePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "continue" => Ok(Self::Continue),
            "abort" => Ok(Self::Abort),
            other => Err(ConfigError::Invalid(format!(
                "unknown setup failure policy `{other}`"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AccountConfig {
    /// Used for both the registered technician and the manager.
    pub password: String,
    pub manager_email: String,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            password: DEFAULT_PASSWORD.to_string(),
            manager_email: DEFAULT_MANAGER_EMAIL.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PayloadConfig {
    pub create_summary_len: usize,
    pub update_summary_len: usize,
    pub create_date: String,
    pub update_date: String,
    pub alphabet: String,
}

impl Default for PayloadConfig {
    fn default() -> Self {
        Self {
            create_summary_len: DEFAULT_CREATE_SUMMARY_LEN,
            update_summary_len: DEFAULT_UPDATE_SUMMARY_LEN,
            create_date: DEFAULT_CREATE_DATE.to_string(),
            update_date: DEFAULT_UPDATE_DATE.to_string(),
            alphabet: LOWERCASE_ALPHABET.to_string(),
        }
    }
}

pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(s).map_err(|_| ConfigError::Duration(s.to_string()))
}
