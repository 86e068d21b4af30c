use crate::data::{Group, MetricSample, RequestName};
use crate::threshold::ThresholdResult;
use hdrhistogram::Histogram;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

const TREND_SIGFIG: u8 = 3;

/// Latency distribution. Recorded in microseconds, reported in milliseconds.
#[derive(Debug, Clone)]
pub struct Trend {
    histogram: Histogram<u64>,
}

impl Default for Trend {
    fn default() -> Self {
        Self::new()
    }
}

impl Trend {
    pub fn new() -> Self {
        Self {
            histogram: Histogram::new(TREND_SIGFIG)
                .expect("3 significant figures is a valid histogram precision"),
        }
    }

    pub fn from_durations<I: IntoIterator<Item = Duration>>(durations: I) -> Self {
        let mut trend = Self::new();
        for duration in durations {
            trend.record(duration);
        }
        trend
    }

    pub fn record(&mut self, duration: Duration) {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        self.histogram.saturating_record(micros);
    }

    pub fn count(&self) -> usize {
        self.histogram.len() as usize
    }

    pub fn avg(&self) -> f64 {
        if self.histogram.is_empty() {
            0.
        } else {
            to_millis(self.histogram.mean())
        }
    }

    pub fn min(&self) -> f64 {
        if self.histogram.is_empty() {
            0.
        } else {
            to_millis(self.histogram.min() as f64)
        }
    }

    pub fn max(&self) -> f64 {
        if self.histogram.is_empty() {
            0.
        } else {
            to_millis(self.histogram.max() as f64)
        }
    }

    pub fn med(&self) -> f64 {
        self.percentile(50.)
    }

    pub fn percentile(&self, pct: f64) -> f64 {
        if self.histogram.is_empty() {
            0.
        } else {
            to_millis(self.histogram.value_at_percentile(pct.clamp(0., 100.)) as f64)
        }
    }

    pub fn summary(&self) -> TrendSummary {
        TrendSummary {
            count: self.count(),
            avg: self.avg(),
            min: self.min(),
            med: self.med(),
            max: self.max(),
            p90: self.percentile(90.),
            p95: self.percentile(95.),
            p99: self.percentile(99.),
        }
    }
}

fn to_millis(micros: f64) -> f64 {
    micros / 1_000.
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TrendSummary {
    pub count: usize,
    pub avg: f64,
    pub min: f64,
    pub med: f64,
    pub max: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

impl fmt::Display for TrendSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "avg={:.2}ms min={:.2}ms med={:.2}ms max={:.2}ms p(90)={:.2}ms p(95)={:.2}ms p(99)={:.2}ms",
            self.avg, self.min, self.med, self.max, self.p90, self.p95, self.p99
        )
    }
}

/// Pass/fail counter, e.g. checks or failed requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Rate {
    pub passes: u64,
    pub fails: u64,
}

impl Rate {
    pub fn total(&self) -> u64 {
        self.passes + self.fails
    }

    /// Fraction of passes; 0 when nothing was recorded.
    pub fn rate(&self) -> f64 {
        if self.total() == 0 {
            0.
        } else {
            self.passes as f64 / self.total() as f64
        }
    }

    pub fn record(&mut self, pass: bool) {
        if pass {
            self.passes += 1;
        } else {
            self.fails += 1;
        }
    }
}

/// Running aggregation over everything recorded during a run. Memory stays bounded no matter
/// how many samples go in.
#[derive(Debug, Clone, Default)]
pub struct MetricSet {
    pub http_req_duration: Trend,
    pub http_req_duration_by_name: BTreeMap<RequestName, Trend>,
    /// `passes` counts failed requests, mirroring how the rate is reported.
    pub http_req_failed: Rate,
    pub http_req_failed_by_name: BTreeMap<RequestName, Rate>,
    pub iteration_duration: Trend,
    pub group_duration: Trend,
    pub group_duration_by_group: BTreeMap<Group, Trend>,
    pub checks: Rate,
}

impl MetricSet {
    pub fn record_request(&mut self, sample: &MetricSample) {
        self.http_req_duration.record(sample.duration);
        self.http_req_duration_by_name
            .entry(sample.name)
            .or_default()
            .record(sample.duration);
        self.http_req_failed.record(sample.failed());
        self.http_req_failed_by_name
            .entry(sample.name)
            .or_default()
            .record(sample.failed());
    }

    pub fn record_iteration(&mut self, elapsed: Duration) {
        self.iteration_duration.record(elapsed);
    }

    pub fn record_group(&mut self, group: Group, elapsed: Duration) {
        self.group_duration.record(elapsed);
        self.group_duration_by_group
            .entry(group)
            .or_default()
            .record(elapsed);
    }

    pub fn http_reqs(&self) -> usize {
        self.http_req_duration.count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckSummary {
    pub name: String,
    /// `None` for checks made outside any group, i.e. during setup.
    pub group: Option<Group>,
    pub passes: u64,
    pub fails: u64,
}

/// Final report of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunStatistics {
    pub duration_secs: f64,
    pub iterations: u64,
    pub max_vus: usize,
    pub checks: Vec<CheckSummary>,
    pub checks_rate: f64,
    pub http_reqs: usize,
    pub http_req_failed: f64,
    pub http_req_duration: TrendSummary,
    pub http_req_duration_by_name: BTreeMap<RequestName, TrendSummary>,
    pub iteration_duration: TrendSummary,
    pub group_duration: BTreeMap<Group, TrendSummary>,
    pub thresholds: Vec<ThresholdResult>,
    pub passed: bool,
}

impl RunStatistics {
    pub fn new(
        metrics: &MetricSet,
        checks: Vec<CheckSummary>,
        thresholds: Vec<ThresholdResult>,
        elapsed: Duration,
        max_vus: usize,
    ) -> Self {
        let passed = thresholds.iter().all(|t| t.passed);
        Self {
            duration_secs: elapsed.as_secs_f64(),
            iterations: metrics.iteration_duration.count() as u64,
            max_vus,
            checks,
            checks_rate: metrics.checks.rate(),
            http_reqs: metrics.http_reqs(),
            http_req_failed: metrics.http_req_failed.rate(),
            http_req_duration: metrics.http_req_duration.summary(),
            http_req_duration_by_name: metrics
                .http_req_duration_by_name
                .iter()
                .map(|(name, trend)| (*name, trend.summary()))
                .collect(),
            iteration_duration: metrics.iteration_duration.summary(),
            group_duration: metrics
                .group_duration_by_group
                .iter()
                .map(|(group, trend)| (*group, trend.summary()))
                .collect(),
            thresholds,
            passed,
        }
    }

    pub fn check(&self, name: &str) -> Option<&CheckSummary> {
        self.checks.iter().find(|c| c.name == name)
    }

    pub fn checks_passed(&self) -> bool {
        self.checks.iter().all(|c| c.fails == 0)
    }

    fn write_checks(&self, f: &mut fmt::Formatter<'_>, group: Option<Group>) -> fmt::Result {
        let indent = 2 + 2 * group.map_or(0, |g| g.depth());
        for check in self.checks.iter().filter(|c| c.group == group) {
            let mark = if check.fails == 0 { '✓' } else { '✗' };
            writeln!(
                f,
                "{:indent$}{mark} {:<32} ✓ {} ✗ {}",
                "", check.name, check.passes, check.fails
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for RunStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_checks(f, None)?;
        for group in Group::ALL {
            let entered = self.group_duration.contains_key(&group)
                || self.checks.iter().any(|c| c.group == Some(group));
            if entered {
                writeln!(f, "{:indent$}█ {}", "", group.name(), indent = 2 * group.depth())?;
                self.write_checks(f, Some(group))?;
            }
        }

        writeln!(f)?;
        writeln!(f, "  {:<28}: {:.2}%", "checks", self.checks_rate * 100.)?;
        for (group, summary) in &self.group_duration {
            writeln!(f, "  {:<28}: {summary}", format!("group_duration{{group:{group}}}"))?;
        }
        writeln!(f, "  {:<28}: {}", "http_req_duration", self.http_req_duration)?;
        for (name, summary) in &self.http_req_duration_by_name {
            writeln!(f, "    {:<26}: {summary}", format!("{{ name:{name} }}"))?;
        }
        writeln!(f, "  {:<28}: {:.2}%", "http_req_failed", self.http_req_failed * 100.)?;
        writeln!(f, "  {:<28}: {}", "http_reqs", self.http_reqs)?;
        writeln!(f, "  {:<28}: {}", "iteration_duration", self.iteration_duration)?;
        writeln!(f, "  {:<28}: {}", "iterations", self.iterations)?;
        writeln!(f, "  {:<28}: {}", "vus_max", self.max_vus)?;
        writeln!(f, "  {:<28}: {:.1}s", "duration", self.duration_secs)?;

        if !self.thresholds.is_empty() {
            writeln!(f)?;
            writeln!(f, "  thresholds:")?;
            for threshold in &self.thresholds {
                writeln!(f, "    {threshold}")?;
            }
        }

        write!(
            f,
            "\n  result: {}",
            if self.passed { "PASSED" } else { "FAILED" }
        )
    }
}
