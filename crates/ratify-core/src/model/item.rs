use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::ParseEnumError;
use super::payload::EntityState;
use crate::error::{RatifyError, Result};

/// What a proposal item does to its target entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemAction {
    Add,
    Modify,
    Remove,
}

impl ItemAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Modify => "modify",
            Self::Remove => "remove",
        }
    }
}

/// The kind of live entity an item targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Task,
    Milestone,
    Assignment,
    Dependency,
}

impl EntityType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Milestone => "milestone",
            Self::Assignment => "assignment",
            Self::Dependency => "dependency",
        }
    }
}

/// Review state of a single item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    NeedsDiscussion,
}

impl ApprovalStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::NeedsDiscussion => "needs_discussion",
        }
    }

    /// Validate whether an item may move from self to `target`.
    ///
    /// Valid transitions:
    /// - `pending -> approved | rejected | needs_discussion`
    /// - `needs_discussion -> pending` (thread resolution only)
    ///
    /// # Errors
    ///
    /// Returns [`RatifyError::InvalidTransition`] naming the attempted edge.
    pub fn can_transition_to(self, target: Self) -> Result<()> {
        if self == target {
            return Err(RatifyError::transition(
                self,
                target,
                "no-op transition is not allowed",
            ));
        }

        let allowed = matches!(
            (self, target),
            (
                Self::Pending,
                Self::Approved | Self::Rejected | Self::NeedsDiscussion
            ) | (Self::NeedsDiscussion, Self::Pending)
        );

        if allowed {
            Ok(())
        } else {
            Err(RatifyError::transition(
                self,
                target,
                "item decisions are final once recorded",
            ))
        }
    }
}

/// Decision a reviewer can record against a pending item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approved,
    Rejected,
    NeedsDiscussion,
}

impl ReviewDecision {
    #[must_use]
    pub const fn status(self) -> ApprovalStatus {
        match self {
            Self::Approved => ApprovalStatus::Approved,
            Self::Rejected => ApprovalStatus::Rejected,
            Self::NeedsDiscussion => ApprovalStatus::NeedsDiscussion,
        }
    }
}

/// Low / expected / high hours.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EstimateRange {
    pub optimistic: f64,
    pub expected: f64,
    pub pessimistic: f64,
}

impl EstimateRange {
    #[must_use]
    pub fn scaled(self, factor: f64) -> Self {
        Self {
            optimistic: self.optimistic * factor,
            expected: self.expected * factor,
            pessimistic: self.pessimistic * factor,
        }
    }
}

/// Where an hours estimate came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EstimateBasis {
    /// The submission stated the hours itself.
    Provided,
    /// Mean of comparable tasks with recorded actual hours.
    Historical {
        sample_size: usize,
        comparable_task_ids: Vec<String>,
    },
    /// Generic per-entity benchmark.
    Benchmark,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiEstimate {
    pub hours: f64,
    pub confidence: f64,
    pub reasoning: String,
    pub range: EstimateRange,
    pub basis: EstimateBasis,
}

/// Ranked fallback assignee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssigneeCandidate {
    pub member_id: String,
    pub name: String,
    pub utilization: f64,
    pub confidence: f64,
}

/// Load of the suggested assignee at suggestion time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorkloadContext {
    pub current_hours: f64,
    pub capacity_hours: f64,
    pub utilization: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiAssignment {
    pub assignee_id: Option<String>,
    pub confidence: f64,
    pub reasoning: String,
    pub alternatives: Vec<AssigneeCandidate>,
    pub workload_context: Option<WorkloadContext>,
}

/// One proposed mutation of the live project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalItem {
    pub id: String,
    pub proposal_id: String,
    pub sequence: i64,
    pub action: ItemAction,
    pub entity_type: EntityType,
    pub entity_id: Option<String>,
    pub proposed_state: Option<EntityState>,
    pub previous_state: Option<EntityState>,
    pub approval_status: ApprovalStatus,
    pub ai_estimate: Option<AiEstimate>,
    pub ai_assignment: Option<AiAssignment>,
    pub reviewer_notes: Option<String>,
    pub reviewed_by: Option<String>,
    pub reviewed_at_us: Option<i64>,
    /// Set in the same transaction as the live write; a merge retry skips
    /// items that carry it.
    pub applied_at_us: Option<i64>,
    pub applied_entity_id: Option<String>,
    pub created_at_us: i64,
    pub updated_at_us: i64,
}

impl ProposalItem {
    /// Proposed task fields, when this item carries a task payload.
    #[must_use]
    pub fn proposed_task(&self) -> Option<&super::payload::TaskFields> {
        self.proposed_state.as_ref().and_then(EntityState::as_task)
    }

    /// Human label used in logs and deadline reports.
    #[must_use]
    pub fn label(&self) -> String {
        self.proposed_state
            .as_ref()
            .and_then(EntityState::title)
            .or_else(|| self.previous_state.as_ref().and_then(EntityState::title))
            .map_or_else(
                || {
                    format!(
                        "{} {} {}",
                        self.action,
                        self.entity_type,
                        self.entity_id.as_deref().unwrap_or("(new)")
                    )
                },
                ToString::to_string,
            )
    }
}

/// Input for a new item; validated before it is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewItem {
    pub action: ItemAction,
    pub entity_type: EntityType,
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub proposed_state: Option<EntityState>,
    #[serde(default)]
    pub previous_state: Option<EntityState>,
}

impl NewItem {
    /// Enforce the shape rules for each action.
    ///
    /// - `add`: no entity id, no previous state, a proposed state whose
    ///   identifying fields are present.
    /// - `modify`: an entity id and a non-empty proposed state.
    /// - `remove`: an entity id; the proposed state may be omitted.
    ///
    /// In every case the payload variants must match `entity_type`.
    ///
    /// # Errors
    ///
    /// Returns [`RatifyError::Validation`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        for (field, state) in [
            ("proposed_state", &self.proposed_state),
            ("previous_state", &self.previous_state),
        ] {
            let Some(state) = state else {
                continue;
            };
            if state.entity_type() != self.entity_type {
                return Err(RatifyError::validation(
                    field,
                    format!(
                        "payload is a {} but the item targets a {}",
                        state.entity_type(),
                        self.entity_type
                    ),
                ));
            }
        }

        match self.action {
            ItemAction::Add => {
                if self.entity_id.is_some() {
                    return Err(RatifyError::validation(
                        "entity_id",
                        "must be empty for add",
                    ));
                }
                if self.previous_state.is_some() {
                    return Err(RatifyError::validation(
                        "previous_state",
                        "must be empty for add",
                    ));
                }
                let Some(state) = &self.proposed_state else {
                    return Err(RatifyError::validation(
                        "proposed_state",
                        "is required for add",
                    ));
                };
                validate_add_payload(state)
            }
            ItemAction::Modify => {
                require_entity_id(self.entity_id.as_deref())?;
                match &self.proposed_state {
                    Some(state) if !state.is_empty() => Ok(()),
                    _ => Err(RatifyError::validation(
                        "proposed_state",
                        "modify must change at least one field",
                    )),
                }
            }
            ItemAction::Remove => require_entity_id(self.entity_id.as_deref()),
        }
    }
}

fn require_entity_id(entity_id: Option<&str>) -> Result<()> {
    match entity_id {
        Some(id) if !id.trim().is_empty() => Ok(()),
        _ => Err(RatifyError::validation(
            "entity_id",
            "is required for modify and remove",
        )),
    }
}

fn validate_add_payload(state: &EntityState) -> Result<()> {
    let missing = match state {
        EntityState::Task(_) | EntityState::Milestone(_) => state
            .title()
            .is_none_or(|title| title.trim().is_empty())
            .then_some("title"),
        EntityState::Assignment(fields) => {
            if fields.task_id.is_none() {
                Some("task_id")
            } else if fields.assignee_id.is_none() {
                Some("assignee_id")
            } else {
                None
            }
        }
        EntityState::Dependency(fields) => {
            if fields.task_id.is_none() {
                Some("task_id")
            } else if fields.depends_on_task_id.is_none() {
                Some("depends_on_task_id")
            } else {
                None
            }
        }
    };

    match missing {
        Some(field) => Err(RatifyError::validation(
            format!("proposed_state.{field}"),
            "is required for add",
        )),
        None => Ok(()),
    }
}

impl fmt::Display for ItemAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ReviewDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.status().as_str())
    }
}

impl FromStr for ItemAction {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match super::normalize(s).as_str() {
            "add" | "create" => Ok(Self::Add),
            "modify" | "update" => Ok(Self::Modify),
            "remove" | "delete" => Ok(Self::Remove),
            _ => Err(ParseEnumError {
                expected: "action",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for EntityType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match super::normalize(s).as_str() {
            "task" => Ok(Self::Task),
            "milestone" => Ok(Self::Milestone),
            "assignment" => Ok(Self::Assignment),
            "dependency" => Ok(Self::Dependency),
            _ => Err(ParseEnumError {
                expected: "entity type",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for ApprovalStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match super::normalize(s).as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "needs_discussion" => Ok(Self::NeedsDiscussion),
            _ => Err(ParseEnumError {
                expected: "approval status",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for ReviewDecision {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match super::normalize(s).as_str() {
            "approved" | "approve" => Ok(Self::Approved),
            "rejected" | "reject" => Ok(Self::Rejected),
            "needs_discussion" | "discuss" => Ok(Self::NeedsDiscussion),
            _ => Err(ParseEnumError {
                expected: "decision",
                got: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::payload::{DependencyFields, MilestoneFields, TaskFields};

    fn task_state(title: Option<&str>) -> EntityState {
        EntityState::Task(TaskFields {
            title: title.map(str::to_string),
            ..TaskFields::default()
        })
    }

    #[test]
    fn add_requires_no_entity_id_and_no_previous_state() {
        let mut item = NewItem {
            action: ItemAction::Add,
            entity_type: EntityType::Task,
            entity_id: Some("task-1".into()),
            proposed_state: Some(task_state(Some("New"))),
            previous_state: None,
        };
        assert!(item.validate().is_err());

        item.entity_id = None;
        item.previous_state = Some(task_state(Some("Old")));
        assert!(item.validate().is_err());

        item.previous_state = None;
        assert!(item.validate().is_ok());
    }

    #[test]
    fn add_task_requires_title() {
        let item = NewItem {
            action: ItemAction::Add,
            entity_type: EntityType::Task,
            entity_id: None,
            proposed_state: Some(task_state(None)),
            previous_state: None,
        };
        let err = item.validate().expect_err("title is required");
        assert!(
            matches!(err, RatifyError::Validation { ref field, .. } if field == "proposed_state.title")
        );
    }

    #[test]
    fn add_dependency_requires_both_ends() {
        let item = NewItem {
            action: ItemAction::Add,
            entity_type: EntityType::Dependency,
            entity_id: None,
            proposed_state: Some(EntityState::Dependency(DependencyFields {
                task_id: Some("t1".into()),
                depends_on_task_id: None,
            })),
            previous_state: None,
        };
        assert!(item.validate().is_err());
    }

    #[test]
    fn remove_needs_only_the_target() {
        let item = NewItem {
            action: ItemAction::Remove,
            entity_type: EntityType::Milestone,
            entity_id: Some("ms-1".into()),
            proposed_state: None,
            previous_state: None,
        };
        assert!(item.validate().is_ok());

        let missing = NewItem {
            entity_id: None,
            ..item
        };
        assert!(missing.validate().is_err());
    }

    #[test]
    fn modify_with_empty_patch_is_invalid() {
        let item = NewItem {
            action: ItemAction::Modify,
            entity_type: EntityType::Milestone,
            entity_id: Some("ms-1".into()),
            proposed_state: Some(EntityState::Milestone(MilestoneFields::default())),
            previous_state: None,
        };
        assert!(item.validate().is_err());
    }

    #[test]
    fn payload_must_match_entity_type() {
        let item = NewItem {
            action: ItemAction::Modify,
            entity_type: EntityType::Milestone,
            entity_id: Some("ms-1".into()),
            proposed_state: Some(task_state(Some("oops"))),
            previous_state: None,
        };
        let err = item.validate().expect_err("variant mismatch");
        assert!(
            matches!(err, RatifyError::Validation { ref field, .. } if field == "proposed_state")
        );
    }

    #[test]
    fn item_transitions_follow_review_rules() {
        use ApprovalStatus as A;
        assert!(A::Pending.can_transition_to(A::Approved).is_ok());
        assert!(A::Pending.can_transition_to(A::NeedsDiscussion).is_ok());
        assert!(A::NeedsDiscussion.can_transition_to(A::Pending).is_ok());
        assert!(A::NeedsDiscussion.can_transition_to(A::Approved).is_err());
        assert!(A::Approved.can_transition_to(A::Rejected).is_err());
        assert!(A::Rejected.can_transition_to(A::Pending).is_err());
        assert!(A::Pending.can_transition_to(A::Pending).is_err());
    }

    #[test]
    fn decision_aliases_parse() {
        assert_eq!("approve".parse::<ReviewDecision>(), Ok(ReviewDecision::Approved));
        assert_eq!(
            "discuss".parse::<ReviewDecision>(),
            Ok(ReviewDecision::NeedsDiscussion)
        );
        assert!("maybe".parse::<ReviewDecision>().is_err());
    }
}
