//! Threshold expressions evaluated against the aggregated metrics at the end of a run.
//!
//! A threshold set pairs a metric key such as `http_req_duration{name:Create}` or
//! `group_duration{group:::Create and modify tasks}` with one or more expressions of the form `<aggregation> <operator> <value>`, e.g. `p(95)<500` or `rate>0.99`.
//! Durations are compared in milliseconds.
use crate::data::{Group, RequestName};
use crate::error::ThresholdError;
use crate::stats::{MetricSet, Rate, Trend};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricName {
    HttpReqDuration,
    HttpReqFailed,
    IterationDuration,
    GroupDuration,
    Checks,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::HttpReqDuration => "http_req_duration",
            MetricName::HttpReqFailed => "http_req_failed",
            MetricName::IterationDuration => "iteration_duration",
            MetricName::GroupDuration => "group_duration",
            MetricName::Checks => "checks",
        }
    }

    fn is_trend(&self) -> bool {
        matches!(
            self,
            MetricName::HttpReqDuration
                | MetricName::IterationDuration
                | MetricName::GroupDuration
        )
    }
}

impl FromStr for MetricName {
    type Err = ThresholdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http_req_duration" => Ok(MetricName::HttpReqDuration),
            "http_req_failed" => Ok(MetricName::HttpReqFailed),
            "iteration_duration" => Ok(MetricName::IterationDuration),
            "group_duration" => Ok(MetricName::GroupDuration),
            "checks" => Ok(MetricName::Checks),
            other => Err(ThresholdError::UnknownMetric(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Name(RequestName),
    Group(Group),
}

/// A metric, optionally narrowed by a single tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricKey {
    pub metric: MetricName,
    pub tag: Option<Tag>,
}

impl FromStr for MetricKey {
    type Err = ThresholdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let Some((base, tags)) = s.split_once('{') else {
            return Ok(MetricKey {
                metric: s.parse()?,
                tag: None,
            });
        };

        let metric: MetricName = base.trim().parse()?;
        let tag = tags
            .strip_suffix('}')
            .ok_or_else(|| ThresholdError::Malformed(s.to_string()))?;

        let tag = match (metric, tag.split_once(':')) {
            (
                MetricName::HttpReqDuration | MetricName::HttpReqFailed,
                Some((key, value)),
            ) if key.trim() == "name" => Tag::Name(
                value
                    .trim()
                    .parse()
                    .map_err(ThresholdError::UnknownRequest)?,
            ),
            (MetricName::GroupDuration, Some((key, value))) if key.trim() == "group" => Tag::Group(
                value
                    .trim()
                    .parse()
                    .map_err(ThresholdError::UnknownGroup)?,
            ),
            _ => return Err(ThresholdError::UnknownTag(tag.to_string())),
        };

        Ok(MetricKey {
            metric,
            tag: Some(tag),
        })
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tag {
            Some(Tag::Name(name)) => write!(f, "{}{{name:{name}}}", self.metric.as_str()),
            Some(Tag::Group(group)) => write!(f, "{}{{group:{group}}}", self.metric.as_str()),
            None => f.write_str(self.metric.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregation {
    Avg,
    Min,
    Max,
    Med,
    Count,
    Rate,
    Percentile(f64),
}

impl Aggregation {
    fn applies_to(&self, metric: MetricName) -> bool {
        match self {
            Aggregation::Count => true,
            Aggregation::Rate => !metric.is_trend(),
            _ => metric.is_trend(),
        }
    }
}

impl FromStr for Aggregation {
    type Err = ThresholdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "avg" => Ok(Aggregation::Avg),
            "min" => Ok(Aggregation::Min),
            "max" => Ok(Aggregation::Max),
            "med" => Ok(Aggregation::Med),
            "count" => Ok(Aggregation::Count),
            "rate" => Ok(Aggregation::Rate),
            other => other
                .strip_prefix("p(")
                .and_then(|p| p.strip_suffix(')'))
                .and_then(|p| p.parse::<f64>().ok())
                .filter(|p| (0. ..=100.).contains(p))
                .map(Aggregation::Percentile)
                .ok_or_else(|| ThresholdError::Malformed(other.to_string())),
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregation::Avg => f.write_str("avg"),
            Aggregation::Min => f.write_str("min"),
            Aggregation::Max => f.write_str("max"),
            Aggregation::Med => f.write_str("med"),
            Aggregation::Count => f.write_str("count"),
            Aggregation::Rate => f.write_str("rate"),
            Aggregation::Percentile(p) => write!(f, "p({p})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
}

impl Operator {
    fn holds(&self, observed: f64, bound: f64) -> bool {
        match self {
            Operator::Lt => observed < bound,
            Operator::Le => observed <= bound,
            Operator::Gt => observed > bound,
            Operator::Ge => observed >= bound,
            Operator::Eq => observed == bound,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Eq => "==",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdExpr {
    pub aggregation: Aggregation,
    pub operator: Operator,
    pub value: f64,
}

impl FromStr for ThresholdExpr {
    type Err = ThresholdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        let malformed = || ThresholdError::Malformed(s.to_string());

        let idx = compact.find(&['<', '>', '='][..]).ok_or_else(malformed)?;
        let (aggregation, rest) = compact.split_at(idx);

        let (operator, value) = if let Some(v) = rest.strip_prefix("<=") {
            (Operator::Le, v)
        } else if let Some(v) = rest.strip_prefix(">=") {
            (Operator::Ge, v)
        } else if let Some(v) = rest.strip_prefix("==") {
            (Operator::Eq, v)
        } else if let Some(v) = rest.strip_prefix('<') {
            (Operator::Lt, v)
        } else if let Some(v) = rest.strip_prefix('>') {
            (Operator::Gt, v)
        } else {
            return Err(malformed());
        };

        Ok(ThresholdExpr {
            aggregation: aggregation.parse()?,
            operator,
            value: value.parse().map_err(|_| malformed())?,
        })
    }
}

impl fmt::Display for ThresholdExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.aggregation, self.operator.as_str(), self.value)
    }
}

/// All expressions declared for one metric key.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdSet {
    pub key: MetricKey,
    pub expressions: Vec<ThresholdExpr>,
}

impl ThresholdSet {
    pub fn parse<S: AsRef<str>>(key: &str, expressions: &[S]) -> Result<Self, ThresholdError> {
        let key: MetricKey = key.parse()?;
        if expressions.is_empty() {
            return Err(ThresholdError::Empty(key.to_string()));
        }

        let expressions = expressions
            .iter()
            .map(|e| {
                let expr: ThresholdExpr = e.as_ref().parse()?;
                if expr.aggregation.applies_to(key.metric) {
                    Ok(expr)
                } else {
                    Err(ThresholdError::Aggregation {
                        metric: key.to_string(),
                        aggregation: expr.aggregation.to_string(),
                    })
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { key, expressions })
    }

    pub fn evaluate(&self, metrics: &MetricSet) -> Vec<ThresholdResult> {
        self.expressions
            .iter()
            .map(|expr| {
                let observed = observe(metrics, &self.key, expr.aggregation);
                ThresholdResult {
                    metric: self.key.to_string(),
                    expression: expr.to_string(),
                    observed,
                    passed: expr.operator.holds(observed, expr.value),
                }
            })
            .collect()
    }
}

pub fn evaluate_thresholds(sets: &[ThresholdSet], metrics: &MetricSet) -> Vec<ThresholdResult> {
    sets.iter().flat_map(|set| set.evaluate(metrics)).collect()
}

fn observe(metrics: &MetricSet, key: &MetricKey, aggregation: Aggregation) -> f64 {
    let empty_trend = Trend::default();
    let empty_rate = Rate::default();

    if key.metric.is_trend() {
        let trend = match (key.metric, key.tag) {
            (MetricName::HttpReqDuration, Some(Tag::Name(name))) => metrics
                .http_req_duration_by_name
                .get(&name)
                .unwrap_or(&empty_trend),
            (MetricName::HttpReqDuration, _) => &metrics.http_req_duration,
            (MetricName::GroupDuration, Some(Tag::Group(group))) => metrics
                .group_duration_by_group
                .get(&group)
                .unwrap_or(&empty_trend),
            (MetricName::GroupDuration, _) => &metrics.group_duration,
            _ => &metrics.iteration_duration,
        };

        match aggregation {
            Aggregation::Avg => trend.avg(),
            Aggregation::Min => trend.min(),
            Aggregation::Max => trend.max(),
            Aggregation::Med => trend.med(),
            Aggregation::Count => trend.count() as f64,
            Aggregation::Percentile(p) => trend.percentile(p),
            // Not a trend aggregation; NaN fails every comparison.
            Aggregation::Rate => f64::NAN,
        }
    } else {
        let rate = match (key.metric, key.tag) {
            (MetricName::HttpReqFailed, Some(Tag::Name(name))) => metrics
                .http_req_failed_by_name
                .get(&name)
                .unwrap_or(&empty_rate),
            (MetricName::HttpReqFailed, _) => &metrics.http_req_failed,
            _ => &metrics.checks,
        };

        match aggregation {
            Aggregation::Count => rate.total() as f64,
            _ => rate.rate(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdResult {
    pub metric: String,
    pub expression: String,
    pub observed: f64,
    pub passed: bool,
}

impl fmt::Display for ThresholdResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} (observed {:.2})",
            if self.passed { '✓' } else { '✗' },
            self.metric,
            self.expression,
            self.observed
        )
    }
}
