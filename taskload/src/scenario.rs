//! The scripted work each virtual user repeats: create, update, read back and delete one task.
use crate::api::{log_body, ApiResponse, TaskApi, TaskPayload};
use crate::checks::Check;
use crate::random::random_string;
use crate::recorder::Recorder;
use crate::setup::Credentials;
use crate::vu::StopSignal;
use rand::Rng;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use taskload_core::{Group, PayloadConfig};
#[allow(unused)]
use tracing::{debug, error, info, instrument, trace, warn};

/// Read-only state every VU shares for the lifetime of the run.
pub struct SharedContext {
    pub credentials: Credentials,
    pub payload: PayloadConfig,
    pub iteration_sleep: Duration,
    pub recorder: Arc<Recorder>,
}

/// State owned by a single iteration.
#[derive(Debug, Default)]
pub struct ScenarioContext {
    pub task_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Create,
    Update,
    Get,
    Delete,
}

impl Step {
    pub fn group(&self) -> Group {
        match self {
            Step::Create => Group::CreateTasks,
            Step::Update => Group::UpdateTask,
            Step::Get => Group::GetTask,
            Step::Delete => Group::DeleteTask,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationOutcome {
    Completed,
    /// A failed step made the rest of the iteration meaningless.
    Aborted(Step),
    /// Stop was requested; the given step never started.
    Stopped(Step),
}

/// Run one iteration inside the `Create and modify tasks` group. Every step records its check;
/// only a failed create ends it early.
#[instrument(name = "create_and_modify_tasks", skip(api, shared, rng, stop))]
pub async fn run_iteration<A, R>(
    api: &A,
    shared: &SharedContext,
    rng: &mut R,
    stop: &StopSignal,
    vu: usize,
) -> IterationOutcome
where
    A: TaskApi + Sync,
    R: Rng + Send,
{
    let start = Instant::now();
    let outcome = run_steps(api, shared, rng, stop).await;
    if !matches!(outcome, IterationOutcome::Stopped(_)) {
        shared
            .recorder
            .record_group(Group::CreateAndModifyTasks, start.elapsed());
    }
    outcome
}

async fn run_steps<A, R>(
    api: &A,
    shared: &SharedContext,
    rng: &mut R,
    stop: &StopSignal,
) -> IterationOutcome
where
    A: TaskApi + Sync,
    R: Rng + Send,
{
    let SharedContext {
        credentials,
        payload,
        recorder,
        ..
    } = shared;
    let mut ctx = ScenarioContext::default();

    let start = Instant::now();
    let task = TaskPayload {
        summary: random_string(rng, payload.create_summary_len, &payload.alphabet),
        date: payload.create_date.clone(),
    };
    let res = api.create_task(&credentials.tech, &task).await;
    let created = recorder.check(Check::TaskCreated, res.status == 201);
    ctx.task_id = task_id(&res);
    recorder.record_group(Step::Create.group(), start.elapsed());
    if !created {
        warn!(
            status = res.status,
            body = log_body(&res.body),
            "Task creation failed"
        );
        return IterationOutcome::Aborted(Step::Create);
    }
    let Some(id) = ctx.task_id.as_deref() else {
        warn!(
            body = log_body(&res.body),
            "Created task has no id, skipping the rest of the iteration"
        );
        return IterationOutcome::Aborted(Step::Create);
    };

    if stop.is_stopped() {
        return IterationOutcome::Stopped(Step::Update);
    }
    let start = Instant::now();
    let task = TaskPayload {
        summary: random_string(rng, payload.update_summary_len, &payload.alphabet),
        date: payload.update_date.clone(),
    };
    let res = api.update_task(&credentials.tech, id, &task).await;
    let updated = recorder.check(Check::TaskUpdated, res.status == 200);
    let matches = recorder.check(
        Check::SummaryMatches,
        response_summary(&res).as_deref() == Some(task.summary.as_str()),
    );
    recorder.record_group(Step::Update.group(), start.elapsed());
    if !updated {
        warn!(
            status = res.status,
            body = log_body(&res.body),
            "Task {id} update failed"
        );
    } else if !matches {
        warn!(
            body = log_body(&res.body),
            "Task {id} summary does not match the update"
        );
    }

    if stop.is_stopped() {
        return IterationOutcome::Stopped(Step::Get);
    }
    let start = Instant::now();
    let res = api.get_task(&credentials.tech, id).await;
    let fetched = recorder.check(Check::TaskFetched, res.status == 200);
    recorder.record_group(Step::Get.group(), start.elapsed());
    if !fetched {
        warn!(
            status = res.status,
            body = log_body(&res.body),
            "Fetching task {id} failed"
        );
    }

    if stop.is_stopped() {
        return IterationOutcome::Stopped(Step::Delete);
    }
    let start = Instant::now();
    let res = api.delete_task(&credentials.manager, id).await;
    let deleted = recorder.check(Check::TaskDeleted, res.status == 204);
    recorder.record_group(Step::Delete.group(), start.elapsed());
    if !deleted {
        warn!(
            status = res.status,
            body = log_body(&res.body),
            "Deleting task {id} failed"
        );
    }

    IterationOutcome::Completed
}

/// The `id` of a created task, numeric or string.
pub(crate) fn task_id(res: &ApiResponse) -> Option<String> {
    match res.json()?.get("id")? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

pub(crate) fn response_summary(res: &ApiResponse) -> Option<String> {
    res.json()?.get("summary")?.as_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::seeded_rng;
    use crate::testing::FakeApi;
    use crate::vu::stop_signal;
    use tracing_test::traced_test;

    fn shared() -> SharedContext {
        SharedContext {
            credentials: Credentials {
                tech: FakeApi::TECH_TOKEN.to_string(),
                manager: FakeApi::MANAGER_TOKEN.to_string(),
            },
            payload: PayloadConfig::default(),
            iteration_sleep: Duration::ZERO,
            recorder: Arc::new(Recorder::new()),
        }
    }

    #[test]
    fn extracts_task_ids() {
        assert_eq!(
            task_id(&ApiResponse::new(201, r#"{"id":42}"#)),
            Some("42".to_string())
        );
        assert_eq!(
            task_id(&ApiResponse::new(201, r#"{"id":"a1"}"#)),
            Some("a1".to_string())
        );
        assert_eq!(task_id(&ApiResponse::new(201, r#"{"id":null}"#)), None);
        assert_eq!(task_id(&ApiResponse::new(201, "")), None);
    }

    #[tokio::test]
    async fn happy_path_uses_the_right_tokens() {
        let api = FakeApi::default();
        let shared = shared();
        let (_handle, stop) = stop_signal();

        let outcome = run_iteration(&api, &shared, &mut seeded_rng(Some(3), 1), &stop, 0).await;
        assert_eq!(outcome, IterationOutcome::Completed);

        let calls = api.calls();
        let ops: Vec<_> = calls.iter().map(|c| c.op).collect();
        assert_eq!(ops, ["create", "update", "get", "delete"]);
        for call in &calls[..3] {
            assert_eq!(call.token, FakeApi::TECH_TOKEN);
        }
        assert_eq!(calls[3].token, FakeApi::MANAGER_TOKEN);

        let checks = shared.recorder.checks();
        for check in [
            Check::TaskCreated,
            Check::TaskUpdated,
            Check::SummaryMatches,
            Check::TaskFetched,
            Check::TaskDeleted,
        ] {
            assert_eq!(checks.passes(check), 1, "{}", check.name());
        }
    }

    #[traced_test]
    #[tokio::test]
    async fn failed_create_skips_the_rest() {
        let api = FakeApi::default().fail_create();
        let shared = shared();
        let (_handle, stop) = stop_signal();

        let outcome = run_iteration(&api, &shared, &mut seeded_rng(None, 1), &stop, 0).await;
        assert_eq!(outcome, IterationOutcome::Aborted(Step::Create));
        assert_eq!(api.calls().len(), 1);
        assert_eq!(shared.recorder.checks().fails(Check::TaskCreated), 1);
        assert_eq!(shared.recorder.checks().summaries().len(), 1);
        assert!(logs_contain("Task creation failed"));
    }

    #[traced_test]
    #[tokio::test]
    async fn created_task_without_id_passes_its_check_but_ends_the_iteration() {
        let api = FakeApi::default().omit_task_id();
        let shared = shared();
        let (_handle, stop) = stop_signal();

        let outcome = run_iteration(&api, &shared, &mut seeded_rng(None, 1), &stop, 0).await;
        assert_eq!(outcome, IterationOutcome::Aborted(Step::Create));
        assert_eq!(api.calls().len(), 1);
        assert_eq!(shared.recorder.checks().passes(Check::TaskCreated), 1);
        assert_eq!(shared.recorder.checks().fails(Check::TaskCreated), 0);
        assert!(logs_contain("Created task has no id"));
    }

    #[tokio::test]
    async fn steps_are_timed_inside_the_iteration_group() {
        let api = FakeApi::default().with_delay(Duration::from_millis(5));
        let shared = shared();
        let (_handle, stop) = stop_signal();

        run_iteration(&api, &shared, &mut seeded_rng(None, 1), &stop, 0).await;

        let metrics = shared.recorder.metric_set();
        for group in Group::ALL {
            assert_eq!(metrics.group_duration_by_group[&group].count(), 1, "{group}");
        }
        let outer = metrics.group_duration_by_group[&Group::CreateAndModifyTasks].max();
        let get = metrics.group_duration_by_group[&Group::GetTask].max();
        assert!(get >= 4.9, "{get}");
        assert!(outer >= 19.5, "{outer}");
    }

    #[tokio::test]
    async fn failed_create_only_times_the_groups_it_entered() {
        let api = FakeApi::default().fail_create();
        let shared = shared();
        let (_handle, stop) = stop_signal();

        run_iteration(&api, &shared, &mut seeded_rng(None, 1), &stop, 0).await;

        let groups = shared.recorder.metric_set().group_duration_by_group;
        assert_eq!(
            groups.keys().copied().collect::<Vec<_>>(),
            [Group::CreateAndModifyTasks, Group::CreateTasks]
        );
    }

    #[tokio::test]
    async fn summary_mismatch_only_fails_its_own_check() {
        let api = FakeApi::default().truncate_summary();
        let shared = shared();
        let (_handle, stop) = stop_signal();

        let outcome = run_iteration(&api, &shared, &mut seeded_rng(None, 1), &stop, 0).await;
        assert_eq!(outcome, IterationOutcome::Completed);

        let checks = shared.recorder.checks();
        assert_eq!(checks.passes(Check::TaskUpdated), 1);
        assert_eq!(checks.fails(Check::SummaryMatches), 1);
        assert_eq!(checks.passes(Check::TaskDeleted), 1);
    }

    #[tokio::test]
    async fn stop_is_honoured_between_steps() {
        let api = FakeApi::default();
        let shared = shared();
        let (handle, stop) = stop_signal();
        handle.stop();

        let outcome = run_iteration(&api, &shared, &mut seeded_rng(None, 1), &stop, 0).await;
        assert_eq!(outcome, IterationOutcome::Stopped(Step::Update));
        assert_eq!(api.calls_to("create"), 1);
        assert_eq!(api.calls_to("update"), 0);
    }
}
