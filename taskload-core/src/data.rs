use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Fixed label attached to every HTTP call so latency can be sliced per operation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RequestName {
    Register,
    Login,
    Create,
    Update,
    Get,
    Delete,
}

impl RequestName {
    pub const ALL: [RequestName; 6] = [
        RequestName::Register,
        RequestName::Login,
        RequestName::Create,
        RequestName::Update,
        RequestName::Get,
        RequestName::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestName::Register => "Register",
            RequestName::Login => "Login",
            RequestName::Create => "Create",
            RequestName::Update => "Update",
            RequestName::Get => "Get",
            RequestName::Delete => "Delete",
        }
    }
}

impl fmt::Display for RequestName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RequestName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// Reporting groups an iteration is split into. Setup runs outside any group.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Group {
    CreateAndModifyTasks,
    CreateTasks,
    UpdateTask,
    GetTask,
    DeleteTask,
}

impl Group {
    pub const ALL: [Group; 5] = [
        Group::CreateAndModifyTasks,
        Group::CreateTasks,
        Group::UpdateTask,
        Group::GetTask,
        Group::DeleteTask,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Group::CreateAndModifyTasks => "Create and modify tasks",
            Group::CreateTasks => "Create tasks",
            Group::UpdateTask => "Update task",
            Group::GetTask => "Get task",
            Group::DeleteTask => "Delete task",
        }
    }

    pub fn parent(&self) -> Option<Group> {
        match self {
            Group::CreateAndModifyTasks => None,
            _ => Some(Group::CreateAndModifyTasks),
        }
    }

    /// Nesting level; top-level groups are 1.
    pub fn depth(&self) -> usize {
        self.parent().map_or(1, |parent| parent.depth() + 1)
    }

    /// Full path, e.g. `::Create and modify tasks::Get task`.
    pub fn path(&self) -> String {
        match self.parent() {
            Some(parent) => format!("{}::{}", parent.path(), self.name()),
            None => format!("::{}", self.name()),
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

impl FromStr for Group {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Group::ALL
            .into_iter()
            .find(|group| group.path() == s)
            .ok_or_else(|| s.to_string())
    }
}

impl Serialize for Group {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One completed HTTP call.
///
/// A `status` of `0` means no response was received (connection refused,
/// timeout, ...).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MetricSample {
    pub name: RequestName,
    pub duration: Duration,
    pub status: u16,
}

impl MetricSample {
    pub fn new(name: RequestName, duration: Duration, status: u16) -> Self {
        Self {
            name,
            duration,
            status,
        }
    }

    pub fn failed(&self) -> bool {
        self.status == 0 || self.status >= 400
    }
}
