mod utils;
use utils::*;

use mock_service::prelude::*;
use taskload_core::{Group, RequestName};

#[tokio::test]
#[ntest::timeout(20_000)]
async fn happy_path_passes_every_check_and_threshold() {
    let (stats, mock) = run_against(MockConfig::default()).await;

    assert!(stats.passed, "{stats}");
    assert!(stats.checks_passed(), "{stats}");
    assert_eq!(stats.max_vus, 3);
    assert!(stats.iterations >= 3);
    assert_eq!(stats.http_req_failed, 0.);

    assert_eq!(stats.check("create user").unwrap().passes, 1);
    assert_eq!(stats.check("tech login successfully").unwrap().passes, 1);
    assert_eq!(stats.check("manager login successfully").unwrap().passes, 1);
    let created = stats.check("tasks created correctly").unwrap();
    assert_eq!(created.passes as usize, mock.count(Op::Create));

    for name in RequestName::ALL {
        assert!(
            stats.http_req_duration_by_name.contains_key(&name),
            "no samples for {name}"
        );
    }
    for group in Group::ALL {
        assert!(
            stats.group_duration[&group].count > 0,
            "no duration for {group}"
        );
    }
    assert_eq!(
        stats.check("get task worked").unwrap().group,
        Some(Group::GetTask)
    );
    assert!(stats.to_string().contains("█ Create and modify tasks"));
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn setup_runs_exactly_once() {
    let (_stats, mock) = run_against(MockConfig::default()).await;

    assert_eq!(mock.count(Op::Register), 1);
    assert_eq!(mock.count(Op::Login), 2);

    let calls = mock.calls();
    let first_task_call = calls
        .iter()
        .position(|c| c.op == Op::Create)
        .expect("no task was created");
    assert!(calls[..first_task_call]
        .iter()
        .all(|c| matches!(c.op, Op::Register | Op::Login)));
    assert!(calls[first_task_call..]
        .iter()
        .all(|c| !matches!(c.op, Op::Register | Op::Login)));
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn each_step_uses_the_right_role() {
    let (_stats, mock) = run_against(MockConfig::default()).await;

    let calls = mock.calls();
    assert!(calls.iter().any(|c| c.op == Op::Delete));
    for call in calls {
        let Some(token) = call.token.as_deref() else {
            continue;
        };
        let expected = match call.op {
            Op::Create | Op::Update | Op::Get => Role::Technician,
            Op::Delete => Role::Manager,
            Op::Register | Op::Login => unreachable!("setup calls carry no token"),
        };
        assert_eq!(mock.role_of(token), Some(expected), "{call:?}");
        assert_ne!(call.status, 401, "{call:?}");
    }
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn every_step_targets_the_task_created_in_its_iteration() {
    let (_stats, mock) = run_against(MockConfig::default()).await;

    let calls = mock.calls();
    let deleted: Vec<_> = calls
        .iter()
        .filter(|c| c.op == Op::Delete)
        .map(|c| c.task_id)
        .collect();
    assert!(!deleted.is_empty());
    // Ids are never reused, so each task is deleted at most once and always successfully.
    let mut unique = deleted.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), deleted.len());
    assert!(calls
        .iter()
        .filter(|c| c.op == Op::Delete)
        .all(|c| c.status == 204));
}
