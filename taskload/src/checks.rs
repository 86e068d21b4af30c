use std::sync::atomic::{AtomicU64, Ordering};
use taskload_core::{CheckSummary, Group, Rate};

/// Every boolean assertion the setup phase and the scenario make.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    CreateUser,
    TechLogin,
    ManagerLogin,
    TaskCreated,
    TaskUpdated,
    SummaryMatches,
    TaskFetched,
    TaskDeleted,
}

const CHECK_COUNT: usize = 8;

impl Check {
    pub const ALL: [Check; CHECK_COUNT] = [
        Check::CreateUser,
        Check::TechLogin,
        Check::ManagerLogin,
        Check::TaskCreated,
        Check::TaskUpdated,
        Check::SummaryMatches,
        Check::TaskFetched,
        Check::TaskDeleted,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Check::CreateUser => "create user",
            Check::TechLogin => "tech login successfully",
            Check::ManagerLogin => "manager login successfully",
            Check::TaskCreated => "tasks created correctly",
            Check::TaskUpdated => "updates worked",
            Check::SummaryMatches => "updated names were correct",
            Check::TaskFetched => "get task worked",
            Check::TaskDeleted => "task was deleted correctly",
        }
    }

    /// Group the check is reported under; setup checks sit at the root.
    pub fn group(&self) -> Option<Group> {
        match self {
            Check::CreateUser | Check::TechLogin | Check::ManagerLogin => None,
            Check::TaskCreated => Some(Group::CreateTasks),
            Check::TaskUpdated | Check::SummaryMatches => Some(Group::UpdateTask),
            Check::TaskFetched => Some(Group::GetTask),
            Check::TaskDeleted => Some(Group::DeleteTask),
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

/// Lock-free pass/fail counters, one pair per [`Check`].
#[derive(Debug)]
pub struct Checks {
    passes: [AtomicU64; CHECK_COUNT],
    fails: [AtomicU64; CHECK_COUNT],
}

impl Default for Checks {
    fn default() -> Self {
        Self::new()
    }
}

impl Checks {
    pub fn new() -> Self {
        Self {
            passes: std::array::from_fn(|_| AtomicU64::new(0)),
            fails: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    /// Record the outcome and hand it back so call sites can branch on it.
    pub fn record(&self, check: Check, pass: bool) -> bool {
        let counters = if pass { &self.passes } else { &self.fails };
        counters[check.index()].fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        metrics::counter!(
            "checks",
            "check" => check.name(),
            "result" => if pass { "pass" } else { "fail" }
        )
        .increment(1);

        pass
    }

    pub fn passes(&self, check: Check) -> u64 {
        self.passes[check.index()].load(Ordering::Relaxed)
    }

    pub fn fails(&self, check: Check) -> u64 {
        self.fails[check.index()].load(Ordering::Relaxed)
    }

    pub fn rate(&self) -> Rate {
        Check::ALL.iter().fold(Rate::default(), |acc, check| Rate {
            passes: acc.passes + self.passes(*check),
            fails: acc.fails + self.fails(*check),
        })
    }

    /// Checks that were evaluated at least once, in declaration order.
    pub fn summaries(&self) -> Vec<CheckSummary> {
        Check::ALL
            .iter()
            .map(|check| CheckSummary {
                name: check.name().to_string(),
                group: check.group(),
                passes: self.passes(*check),
                fails: self.fails(*check),
            })
            .filter(|summary| summary.passes + summary.fails > 0)
            .collect()
    }
}
