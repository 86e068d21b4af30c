use crate::checks::{Check, Checks};
use metrics_util::AtomicBucket;
use std::sync::Mutex;
use std::time::Duration;
use taskload_core::{Group, MetricSample, MetricSet};

/// Shared sink for everything measured during a run.
///
/// VUs push into lock-free buckets. [`Recorder::collect`] drains them into the histograms of a
/// [`MetricSet`], so only the samples recorded since the last collection are ever held.
pub struct Recorder {
    samples: AtomicBucket<MetricSample>,
    iterations: AtomicBucket<Duration>,
    groups: AtomicBucket<(Group, Duration)>,
    aggregate: Mutex<MetricSet>,
    checks: Checks,
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Recorder {
    pub fn new() -> Self {
        #[cfg(feature = "metrics")]
        {
            metrics::describe_histogram!(
                "http_req_duration",
                metrics::Unit::Milliseconds,
                "Latency of requests against the task API"
            );
            metrics::describe_histogram!(
                "group_duration",
                metrics::Unit::Milliseconds,
                "Time spent inside each scenario group"
            );
        }

        Self {
            samples: AtomicBucket::new(),
            iterations: AtomicBucket::new(),
            groups: AtomicBucket::new(),
            aggregate: Mutex::new(MetricSet::default()),
            checks: Checks::new(),
        }
    }

    pub fn record_request(&self, sample: MetricSample) {
        #[cfg(feature = "metrics")]
        {
            metrics::histogram!("http_req_duration", "name" => sample.name.as_str())
                .record(sample.duration.as_secs_f64() * 1_000.);
            if sample.failed() {
                metrics::counter!("http_req_failed", "name" => sample.name.as_str()).increment(1);
            }
        }

        self.samples.push(sample);
    }

    pub fn record_iteration(&self, elapsed: Duration) {
        #[cfg(feature = "metrics")]
        metrics::histogram!("iteration_duration").record(elapsed.as_secs_f64() * 1_000.);

        self.iterations.push(elapsed);
    }

    pub fn record_group(&self, group: Group, elapsed: Duration) {
        #[cfg(feature = "metrics")]
        metrics::histogram!("group_duration", "group" => group.path())
            .record(elapsed.as_secs_f64() * 1_000.);

        self.groups.push((group, elapsed));
    }

    pub fn check(&self, check: Check, pass: bool) -> bool {
        self.checks.record(check, pass)
    }

    pub fn checks(&self) -> &Checks {
        &self.checks
    }

    /// Fold everything pushed since the last call into the aggregate.
    pub fn collect(&self) {
        let mut aggregate = self.aggregate.lock().unwrap();
        self.samples.clear_with(|samples| {
            for sample in samples {
                aggregate.record_request(sample);
            }
        });
        self.iterations.clear_with(|iterations| {
            for elapsed in iterations {
                aggregate.record_iteration(*elapsed);
            }
        });
        self.groups.clear_with(|groups| {
            for (group, elapsed) in groups {
                aggregate.record_group(*group, *elapsed);
            }
        });
    }

    pub fn metric_set(&self) -> MetricSet {
        self.collect();
        let mut metrics = self.aggregate.lock().unwrap().clone();
        metrics.checks = self.checks.rate();
        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskload_core::RequestName;

    #[test]
    fn aggregates_recorded_samples() {
        let recorder = Recorder::new();
        recorder.record_request(MetricSample::new(
            RequestName::Create,
            Duration::from_millis(12),
            201,
        ));
        recorder.record_request(MetricSample::new(
            RequestName::Get,
            Duration::from_millis(4),
            0,
        ));
        recorder.record_iteration(Duration::from_secs(1));
        recorder.record_group(Group::CreateTasks, Duration::from_millis(12));
        recorder.check(Check::TaskCreated, true);

        let set = recorder.metric_set();
        assert_eq!(set.http_reqs(), 2);
        assert_eq!(set.http_req_duration_by_name[&RequestName::Create].count(), 1);
        assert_eq!(set.http_req_failed.passes, 1);
        assert_eq!(set.iteration_duration.count(), 1);
        assert_eq!(set.group_duration_by_group[&Group::CreateTasks].count(), 1);
        assert_eq!(set.checks.rate(), 1.);
    }

    #[test]
    fn collecting_drains_the_buckets() {
        let recorder = Recorder::new();
        for _ in 0..1_000 {
            recorder.record_request(MetricSample::new(
                RequestName::Get,
                Duration::from_millis(3),
                200,
            ));
        }

        recorder.collect();
        assert!(recorder.samples.data().is_empty());

        recorder.record_request(MetricSample::new(
            RequestName::Delete,
            Duration::from_millis(1),
            204,
        ));
        let set = recorder.metric_set();
        assert!(recorder.samples.data().is_empty());
        assert_eq!(set.http_reqs(), 1_001);
        assert_eq!(set.http_req_duration_by_name[&RequestName::Get].count(), 1_000);
    }
}
