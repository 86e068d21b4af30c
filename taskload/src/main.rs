use clap::Parser;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use taskload::prelude::*;
use taskload_core::{parse_duration, ConfigError};
#[allow(unused)]
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const THRESHOLDS_FAILED: u8 = 99;

fn duration(s: &str) -> Result<Duration, ConfigError> {
    parse_duration(s)
}

/// Drive a task-management API with staged virtual users and check thresholds.
#[derive(Parser, Debug)]
#[command(version)]
struct Cli {
    /// YAML run configuration. Flags override values from the file.
    #[arg(short, long, env = "TASKLOAD_CONFIG")]
    config: Option<PathBuf>,

    /// Base URL of the task service.
    #[arg(short, long, env = "TASKLOAD_BASE_URL")]
    base_url: Option<String>,

    /// Stage as `<target>:<duration>`, e.g. `50:30s`. Repeat for multiple stages.
    #[arg(short, long = "stage", env = "TASKLOAD_STAGES", value_delimiter = ',')]
    stages: Vec<Stage>,

    /// Threshold as `<metric>=<expression>`, e.g. `http_req_duration=p(95)<500`. Replaces the
    /// configured thresholds when given.
    #[arg(
        short,
        long = "threshold",
        env = "TASKLOAD_THRESHOLDS",
        value_delimiter = ';'
    )]
    thresholds: Vec<String>,

    /// Seed for reproducible payloads.
    #[arg(long, env = "TASKLOAD_SEED")]
    seed: Option<u64>,

    /// What to do when setup fails: `continue` or `abort`.
    #[arg(long, env = "TASKLOAD_SETUP_FAILURE")]
    setup_failure: Option<SetupFailurePolicy>,

    /// Pause between iterations, e.g. `1s`.
    #[arg(long, env = "TASKLOAD_ITERATION_SLEEP", value_parser = duration)]
    iteration_sleep: Option<Duration>,

    /// Per-request timeout, e.g. `10s`.
    #[arg(long, env = "TASKLOAD_REQUEST_TIMEOUT", value_parser = duration)]
    request_timeout: Option<Duration>,

    /// Global cap on requests per second.
    #[arg(long, env = "TASKLOAD_MAX_RPS")]
    max_rps: Option<NonZeroU32>,

    /// Print the report as JSON instead of text.
    #[arg(long, env = "TASKLOAD_JSON")]
    json: bool,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_file(path)?,
            None => RunConfig::default(),
        };

        if let Some(base_url) = self.base_url {
            config.base_url = base_url;
        }
        if !self.stages.is_empty() {
            config.stages = self.stages;
        }
        if !self.thresholds.is_empty() {
            config.thresholds.clear();
            for threshold in &self.thresholds {
                let (metric, expression) = threshold.split_once('=').ok_or_else(|| {
                    anyhow::anyhow!("threshold `{threshold}` must look like <metric>=<expression>")
                })?;
                config.add_threshold(metric.trim(), expression.trim());
            }
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if let Some(policy) = self.setup_failure {
            config.setup_failure = policy;
        }
        if let Some(sleep) = self.iteration_sleep {
            config.iteration_sleep = sleep;
        }
        if self.request_timeout.is_some() {
            config.request_timeout = self.request_timeout;
        }
        if self.max_rps.is_some() {
            config.max_rps = self.max_rps;
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("taskload=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let json = cli.json;

    match run(cli).await {
        Ok(stats) => {
            if json {
                match serde_json::to_string_pretty(&stats) {
                    Ok(out) => println!("{out}"),
                    Err(err) => {
                        error!("Unable to serialize report: {err}");
                        return ExitCode::FAILURE;
                    }
                }
            } else {
                println!("{stats}");
            }

            if stats.passed {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(THRESHOLDS_FAILED)
            }
        }
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<RunStatistics> {
    let config = cli.into_config()?;
    debug!("Running with config {config:?}");
    Ok(LoadDriver::new(config)?.run().await?)
}
