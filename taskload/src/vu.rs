use crate::api::TaskApi;
use crate::random::seeded_rng;
use crate::scenario::{run_iteration, IterationOutcome, SharedContext};
use rand::rngs::SmallRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// Sending half of a VU's stop flag.
#[derive(Debug)]
pub struct StopHandle(watch::Sender<bool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.send_replace(true);
    }
}

/// Receiving half of a VU's stop flag. A dropped [`StopHandle`] counts as stopped.
#[derive(Debug, Clone)]
pub struct StopSignal(watch::Receiver<bool>);

impl StopSignal {
    pub fn is_stopped(&self) -> bool {
        *self.0.borrow() || self.0.has_changed().is_err()
    }

    /// Resolves once stop has been requested.
    pub async fn stopped(&mut self) {
        let _ = self.0.wait_for(|stopped| *stopped).await;
    }
}

pub fn stop_signal() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopHandle(tx), StopSignal(rx))
}

/// Body of a single virtual user: iterate until told to stop.
pub(crate) async fn vu_loop<A>(
    vu: usize,
    api: Arc<A>,
    shared: Arc<SharedContext>,
    mut rng: SmallRng,
    mut stop: StopSignal,
) where
    A: TaskApi + Sync,
{
    trace!(vu, "VU started");
    while !stop.is_stopped() {
        let start = Instant::now();
        let outcome = run_iteration(&*api, &shared, &mut rng, &stop, vu).await;
        if let IterationOutcome::Stopped(step) = outcome {
            debug!(vu, "Stopped before {step:?}");
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(shared.iteration_sleep) => {}
            _ = stop.stopped() => {}
        }
        shared.recorder.record_iteration(start.elapsed());
    }
    trace!(vu, "VU finished");
}

struct Worker {
    stop: StopHandle,
    task: JoinHandle<()>,
}

/// Grows and shrinks the set of running virtual users.
///
/// Shrinking never aborts: the excess VUs are signalled and finish their in-flight step on
/// their own. They no longer count toward [`VuPool::concurrency`].
pub struct VuPool<A> {
    api: Arc<A>,
    shared: Arc<SharedContext>,
    seed: Option<u64>,
    workers: Vec<Worker>,
    retiring: Vec<Worker>,
    next_vu: usize,
    max_concurrency: usize,
}

impl<A> VuPool<A>
where
    A: TaskApi + Send + Sync + 'static,
{
    pub fn new(api: Arc<A>, shared: Arc<SharedContext>, seed: Option<u64>) -> Self {
        Self {
            api,
            shared,
            seed,
            workers: vec![],
            retiring: vec![],
            next_vu: 0,
            max_concurrency: 0,
        }
    }

    pub fn set_concurrency(&mut self, concurrency: usize) {
        self.retiring.retain(|w| !w.task.is_finished());

        if self.workers.len() == concurrency {
            return;
        } else if self.workers.len() > concurrency {
            for worker in self.workers.drain(concurrency..) {
                worker.stop.stop();
                self.retiring.push(worker);
            }
        } else {
            while self.workers.len() < concurrency {
                let vu = self.next_vu;
                self.next_vu += 1;

                let (stop, signal) = stop_signal();
                let rng = seeded_rng(self.seed, vu as u64 + 1);
                let task = tokio::spawn(vu_loop(
                    vu,
                    self.api.clone(),
                    self.shared.clone(),
                    rng,
                    signal,
                ));
                self.workers.push(Worker { stop, task });
            }
        }

        self.max_concurrency = self.max_concurrency.max(self.workers.len());
    }

    pub fn concurrency(&self) -> usize {
        self.workers.len()
    }

    /// Highest concurrency the pool has held.
    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Stop every VU and wait up to `grace` for them to finish. Returns how many had to be
    /// aborted.
    pub async fn shutdown(mut self, grace: Duration) -> usize {
        self.set_concurrency(0);

        let deadline = Instant::now() + grace;
        let mut aborted = 0;
        for worker in self.retiring {
            let abort = worker.task.abort_handle();
            match tokio::time::timeout_at(deadline, worker.task).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) if err.is_panic() => error!("VU panicked: {err}"),
                Ok(Err(_)) => {}
                Err(_) => {
                    abort.abort();
                    aborted += 1;
                }
            }
        }

        if aborted > 0 {
            warn!(
                "Aborted {aborted} VUs still running after {}",
                humantime::format_duration(grace)
            );
        }
        aborted
    }
}
