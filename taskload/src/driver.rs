use crate::api::TaskApi;
use crate::client::HttpTaskApi;
use crate::error::DriverError;
use crate::random::seeded_rng;
use crate::recorder::Recorder;
use crate::scenario::SharedContext;
use crate::setup::setup;
use crate::timer::Timer;
use crate::vu::VuPool;
use std::sync::Arc;
use std::time::Instant;
use taskload_core::{
    evaluate_thresholds, RunConfig, RunStatistics, Schedule, ThresholdSet, SCHEDULER_INTERVAL,
};
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn};

/// Runs a full load test: setup once, then the staged VU schedule, then the verdict.
pub struct LoadDriver<A = HttpTaskApi> {
    config: Arc<RunConfig>,
    thresholds: Vec<ThresholdSet>,
    api: Arc<A>,
    recorder: Arc<Recorder>,
}

impl LoadDriver<HttpTaskApi> {
    /// Driver against the real HTTP API at `config.base_url`.
    ///
    /// # Example
    /// ```no_run
    /// use taskload::prelude::*;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), DriverError> {
    ///     let config = RunConfig::default().with_base_url("http://localhost:8080");
    ///     let stats = LoadDriver::new(config)?.run().await?;
    ///     println!("{stats}");
    ///     Ok(())
    /// }
    /// ```
    pub fn new(config: RunConfig) -> Result<Self, DriverError> {
        let recorder = Arc::new(Recorder::new());
        let api = HttpTaskApi::new(&config, recorder.clone())?;
        Self::with_api(config, Arc::new(api), recorder)
    }
}

impl<A> LoadDriver<A>
where
    A: TaskApi + Send + Sync + 'static,
{
    /// Driver against any [`TaskApi`]. `recorder` must be the one `api` records requests into.
    pub fn with_api(
        config: RunConfig,
        api: Arc<A>,
        recorder: Arc<Recorder>,
    ) -> Result<Self, DriverError> {
        let thresholds = config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            thresholds,
            api,
            recorder,
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    #[instrument(name = "run", skip_all, fields(base_url = %self.config.base_url))]
    pub async fn run(self) -> Result<RunStatistics, DriverError> {
        let config = &self.config;
        info!(
            "Running {} stages over {}",
            config.stages.len(),
            humantime::format_duration(config.total_duration())
        );
        let start = Instant::now();

        let mut rng = seeded_rng(config.seed, 0);
        let credentials = setup(&*self.api, config, &self.recorder, &mut rng).await?;
        let shared = Arc::new(SharedContext {
            credentials,
            payload: config.payload.clone(),
            iteration_sleep: config.iteration_sleep,
            recorder: self.recorder.clone(),
        });

        let schedule = Schedule::new(&config.stages, config.ramp);
        let mut pool = VuPool::new(self.api.clone(), shared, config.seed);
        let mut timer = Timer::new(SCHEDULER_INTERVAL).await;
        debug!("Scheduler ticking every {timer}");

        // NOTE: Stage time starts after setup.
        let load_start = Instant::now();
        let mut stage = None;
        while let Some(snapshot) = schedule.target_within(load_start.elapsed(), timer.period()) {
            if stage != Some(snapshot.index) {
                info!(
                    stage = snapshot.index,
                    target = snapshot.stage_target,
                    "Entering stage"
                );
                stage = Some(snapshot.index);
            }

            pool.set_concurrency(snapshot.target);
            let elapsed = timer.tick().await;
            self.recorder.collect();
            trace!(
                "Active VUs: {} after {}",
                pool.concurrency(),
                humantime::format_duration(elapsed)
            );
        }

        if timer.late_ticks() > 0 {
            warn!(
                "Scheduler fell behind on {} ticks; VU targets lagged the stages",
                timer.late_ticks()
            );
        }

        let max_vus = pool.max_concurrency();
        pool.shutdown(config.graceful_stop).await;

        let metrics = self.recorder.metric_set();
        let results = evaluate_thresholds(&self.thresholds, &metrics);
        for result in results.iter().filter(|r| !r.passed) {
            warn!("Threshold crossed: {result}");
        }

        let stats = RunStatistics::new(
            &metrics,
            self.recorder.checks().summaries(),
            results,
            start.elapsed(),
            max_vus,
        );
        info!("Run complete, passed: {}", stats.passed);

        Ok(stats)
    }
}
