use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::TaskId;

/// Derived three-value classification of a task.
///
/// Never stored — recomputed on every read from `done` and `due_date`
/// against the supplied "now".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Done,
    Expired,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Done => "done",
            Self::Expired => "expired",
        }
    }

    /// Glyph shown next to the task in list views.
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Done => "✓",
            Self::Expired => "✕",
            Self::Pending => "»",
        }
    }

    /// Bootstrap-style contextual color class.
    pub fn css_color(&self) -> &'static str {
        match self {
            Self::Done => "success",
            Self::Expired => "danger",
            Self::Pending => "primary",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "done" => Ok(Self::Done),
            "expired" => Ok(Self::Expired),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

/// A single task record. A task with no `parent_id` is a top-level
/// "parent task"; one with a `parent_id` is a sub-task of that parent.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub description: String,
    pub due_date: Option<DateTime<Utc>>,
    pub done: bool,
    pub parent_id: Option<TaskId>,
    pub created_at: String,
    pub updated_at: String,
}

impl Task {
    /// Derive the status at `now`. `done` wins over an elapsed due date;
    /// a task with no due date never expires.
    pub fn status(&self, now: DateTime<Utc>) -> TaskStatus {
        if self.done {
            TaskStatus::Done
        } else if self.due_date.is_some_and(|due| due < now) {
            TaskStatus::Expired
        } else {
            TaskStatus::Pending
        }
    }

    pub fn symbol(&self, now: DateTime<Utc>) -> &'static str {
        self.status(now).symbol()
    }

    pub fn css_color(&self, now: DateTime<Utc>) -> &'static str {
        self.status(now).css_color()
    }

    pub fn is_parent(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_sub_task(&self) -> bool {
        self.parent_id.is_some()
    }
}
