mod utils;
use utils::*;

use mock_service::prelude::*;
use std::time::Duration;
use taskload::prelude::*;
use taskload_core::RequestName;
use tokio::net::TcpListener;

#[tokio::test]
#[ntest::timeout(20_000)]
async fn failed_create_skips_dependent_steps() {
    let (stats, mock) = run_against(MockConfig {
        fail_create: true,
        ..Default::default()
    })
    .await;

    assert!(mock.count(Op::Create) > 0);
    assert_eq!(mock.count(Op::Update), 0);
    assert_eq!(mock.count(Op::Get), 0);
    assert_eq!(mock.count(Op::Delete), 0);

    let created = stats.check("tasks created correctly").unwrap();
    assert_eq!(created.passes, 0);
    assert_eq!(created.fails as usize, mock.count(Op::Create));
    assert!(stats.check("updates worked").is_none());
    assert!(!stats.checks_passed());
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn truncated_summary_fails_only_the_summary_check() {
    let (stats, _mock) = run_against(MockConfig {
        truncate_summary: true,
        ..Default::default()
    })
    .await;

    let updates = stats.check("updates worked").unwrap();
    assert!(updates.passes > 0);
    assert_eq!(updates.fails, 0);

    let names = stats.check("updated names were correct").unwrap();
    assert_eq!(names.passes, 0);
    assert_eq!(names.fails, updates.passes);

    assert_eq!(stats.check("task was deleted correctly").unwrap().fails, 0);
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn slow_service_fails_latency_thresholds_but_not_checks() {
    init();
    let (addr, _mock) = spawn(MockConfig {
        delay: Duration::from_millis(120),
        ..Default::default()
    })
    .await
    .unwrap();

    let config = quick_config(addr).with_thresholds([
        ("http_req_duration", vec!["p(95)<100"]),
        ("checks", vec!["rate==1"]),
    ]);
    let stats = LoadDriver::new(config).unwrap().run().await.unwrap();

    assert!(!stats.passed);
    assert!(stats.checks_passed());
    let latency = stats
        .thresholds
        .iter()
        .find(|t| t.metric == "http_req_duration")
        .unwrap();
    assert!(!latency.passed);
    assert!(latency.observed >= 100.);
    assert!(stats.thresholds.iter().any(|t| t.metric == "checks" && t.passed));
}

async fn unused_addr() -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn unavailable_service_still_completes_the_run() {
    init();
    let mut config = quick_config(unused_addr().await);
    config.thresholds.clear();
    config.add_threshold("http_req_failed", "rate<0.1");

    let stats = LoadDriver::new(config).unwrap().run().await.unwrap();

    assert!(!stats.passed);
    assert_eq!(stats.http_req_failed, 1.);
    assert_eq!(stats.check("create user").unwrap().fails, 1);
    assert_eq!(stats.check("tech login successfully").unwrap().fails, 1);
    assert!(stats.check("tasks created correctly").unwrap().fails > 0);
    assert!(stats.http_req_duration_by_name.contains_key(&RequestName::Create));
    assert!(!stats.http_req_duration_by_name.contains_key(&RequestName::Delete));
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn abort_policy_stops_before_any_iteration() {
    init();
    let mut config = quick_config(unused_addr().await);
    config.setup_failure = SetupFailurePolicy::Abort;

    let res = LoadDriver::new(config).unwrap().run().await;
    assert!(matches!(res, Err(DriverError::Setup(_))));
}
