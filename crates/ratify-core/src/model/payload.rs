//! Typed proposed/previous state carried by a proposal item.
//!
//! Each entity type has its own field set. Every field is optional so the
//! same shape doubles as a full record (add) and a patch (modify). Unknown
//! fields are refused at deserialization time so a malformed submission is
//! caught when the item is stored, not when it is merged.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::item::EntityType;
use super::project::{Milestone, MilestoneStatus, Priority, Task, TaskStatus};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub milestone_id: Option<String>,
}

impl TaskFields {
    fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MilestoneFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<MilestoneStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
}

impl MilestoneFields {
    fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Reassignment of an existing task.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssignmentFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,
}

/// Blocking link: `task_id` waits on `depends_on_task_id`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DependencyFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on_task_id: Option<String>,
}

impl From<&Task> for TaskFields {
    fn from(task: &Task) -> Self {
        Self {
            title: Some(task.title.clone()),
            description: task.description.clone(),
            status: Some(task.status),
            priority: Some(task.priority),
            assignee_id: task.assignee_id.clone(),
            estimated_hours: task.estimated_hours,
            start_date: task.start_date,
            due_date: task.due_date,
            milestone_id: task.milestone_id.clone(),
        }
    }
}

impl TaskFields {
    /// Overlay every set field onto `task`; unset fields leave it untouched.
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title.clone_from(title);
        }
        if self.description.is_some() {
            task.description.clone_from(&self.description);
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if self.assignee_id.is_some() {
            task.assignee_id.clone_from(&self.assignee_id);
        }
        if self.estimated_hours.is_some() {
            task.estimated_hours = self.estimated_hours;
        }
        if self.start_date.is_some() {
            task.start_date = self.start_date;
        }
        if self.due_date.is_some() {
            task.due_date = self.due_date;
        }
        if self.milestone_id.is_some() {
            task.milestone_id.clone_from(&self.milestone_id);
        }
    }
}

impl From<&Milestone> for MilestoneFields {
    fn from(milestone: &Milestone) -> Self {
        Self {
            title: Some(milestone.title.clone()),
            description: milestone.description.clone(),
            status: Some(milestone.status),
            due_date: milestone.due_date,
        }
    }
}

impl MilestoneFields {
    /// Overlay every set field onto `milestone`.
    pub fn apply_to(&self, milestone: &mut Milestone) {
        if let Some(title) = &self.title {
            milestone.title.clone_from(title);
        }
        if self.description.is_some() {
            milestone.description.clone_from(&self.description);
        }
        if let Some(status) = self.status {
            milestone.status = status;
        }
        if self.due_date.is_some() {
            milestone.due_date = self.due_date;
        }
    }
}

/// Proposed or previous entity state, tagged by entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity_type", rename_all = "snake_case")]
pub enum EntityState {
    Task(TaskFields),
    Milestone(MilestoneFields),
    Assignment(AssignmentFields),
    Dependency(DependencyFields),
}

impl EntityState {
    #[must_use]
    pub const fn entity_type(&self) -> EntityType {
        match self {
            Self::Task(_) => EntityType::Task,
            Self::Milestone(_) => EntityType::Milestone,
            Self::Assignment(_) => EntityType::Assignment,
            Self::Dependency(_) => EntityType::Dependency,
        }
    }

    /// True when no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Task(fields) => fields.is_empty(),
            Self::Milestone(fields) => fields.is_empty(),
            Self::Assignment(fields) => fields == &AssignmentFields::default(),
            Self::Dependency(fields) => fields == &DependencyFields::default(),
        }
    }

    #[must_use]
    pub const fn as_task(&self) -> Option<&TaskFields> {
        match self {
            Self::Task(fields) => Some(fields),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_milestone(&self) -> Option<&MilestoneFields> {
        match self {
            Self::Milestone(fields) => Some(fields),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_assignment(&self) -> Option<&AssignmentFields> {
        match self {
            Self::Assignment(fields) => Some(fields),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_dependency(&self) -> Option<&DependencyFields> {
        match self {
            Self::Dependency(fields) => Some(fields),
            _ => None,
        }
    }

    /// Title carried by task and milestone payloads.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        match self {
            Self::Task(fields) => fields.title.as_deref(),
            Self::Milestone(fields) => fields.title.as_deref(),
            Self::Assignment(_) | Self::Dependency(_) => None,
        }
    }

    /// Proposed due date carried by task and milestone payloads.
    #[must_use]
    pub const fn due_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Task(fields) => fields.due_date,
            Self::Milestone(fields) => fields.due_date,
            Self::Assignment(_) | Self::Dependency(_) => None,
        }
    }
}
