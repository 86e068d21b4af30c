use crate::api::ApiResponse;
use crate::recorder::Recorder;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::future::Future;
use std::num::NonZeroU32;
use std::time::Instant;
use taskload_core::{MetricSample, RequestName};

/// Times a single request and records it under `name`. Waiting on the rate limiter is not part
/// of the measured latency.
pub(crate) async fn transaction<F>(
    recorder: &Recorder,
    limiter: Option<&DefaultDirectRateLimiter>,
    name: RequestName,
    func: F,
) -> ApiResponse
where
    F: Future<Output = ApiResponse>,
{
    if let Some(limiter) = limiter {
        limiter.until_ready().await;
    }

    let start = Instant::now();
    let res = func.await;
    let elapsed = start.elapsed();

    recorder.record_request(MetricSample::new(name, elapsed, res.status));
    res
}

/// Global cap on requests per second, shared by every VU.
pub(crate) fn rate_limiter(max_rps: NonZeroU32) -> DefaultDirectRateLimiter {
    RateLimiter::direct(Quota::per_second(max_rps).allow_burst(NonZeroU32::MIN))
}
