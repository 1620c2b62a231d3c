//! Applies the approved items of a proposal to the live project.
//!
//! # Atomicity
//!
//! Each item commits in its own transaction together with its `applied_at`
//! stamp, so an item is either fully applied and marked or untouched. A
//! failing item is collected and later items still run. Re-running a merge
//! skips items that already carry the stamp.

use ratify_core::db::{self, query, write};
use ratify_core::error::{RatifyError, Result};
use ratify_core::id::{MILESTONE_PREFIX, TASK_PREFIX, new_id, now_us};
use ratify_core::model::item::{ApprovalStatus, EntityType, ItemAction, ProposalItem};
use ratify_core::model::payload::{EntityState, MilestoneFields, TaskFields};
use ratify_core::model::project::{Milestone, Task, TaskDependency};
use ratify_core::model::proposal::{Proposal, ProposalStatus};
use ratify_impact::DependencyGraph;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::service::ProposalService;
use crate::targets;

/// An approved item that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeFailure {
    pub item_id: String,
    pub code: String,
    pub message: String,
}

/// What one merge run changed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MergeResult {
    pub proposal_id: String,
    pub tasks_created: Vec<String>,
    pub tasks_updated: Vec<String>,
    pub tasks_deleted: Vec<String>,
    pub milestones_created: Vec<String>,
    pub milestones_updated: Vec<String>,
    pub milestones_deleted: Vec<String>,
    pub dependencies_added: Vec<TaskDependency>,
    pub dependencies_removed: Vec<TaskDependency>,
    /// Approved items already applied by an earlier run.
    pub skipped_items: Vec<String>,
    pub failures: Vec<MergeFailure>,
    pub total_changes: usize,
    pub already_applied: bool,
    /// Whether this run moved the proposal to `applied`.
    pub marked_applied: bool,
}

/// A single live change.
#[derive(Debug)]
enum Change {
    TaskCreated(String),
    TaskUpdated(String),
    TaskDeleted(String),
    MilestoneCreated(String),
    MilestoneUpdated(String),
    MilestoneDeleted(String),
    DependencyAdded(TaskDependency),
    DependencyRemoved(TaskDependency),
}

impl Change {
    fn entity_id(&self) -> &str {
        match self {
            Self::TaskCreated(id)
            | Self::TaskUpdated(id)
            | Self::TaskDeleted(id)
            | Self::MilestoneCreated(id)
            | Self::MilestoneUpdated(id)
            | Self::MilestoneDeleted(id) => id,
            Self::DependencyAdded(dep) | Self::DependencyRemoved(dep) => &dep.task_id,
        }
    }
}

impl MergeResult {
    fn new(proposal_id: &str) -> Self {
        Self {
            proposal_id: proposal_id.to_string(),
            ..Self::default()
        }
    }

    fn record(&mut self, change: Change) {
        self.total_changes += 1;
        match change {
            Change::TaskCreated(id) => self.tasks_created.push(id),
            Change::TaskUpdated(id) => self.tasks_updated.push(id),
            Change::TaskDeleted(id) => self.tasks_deleted.push(id),
            Change::MilestoneCreated(id) => self.milestones_created.push(id),
            Change::MilestoneUpdated(id) => self.milestones_updated.push(id),
            Change::MilestoneDeleted(id) => self.milestones_deleted.push(id),
            Change::DependencyAdded(dep) => self.dependencies_added.push(dep),
            Change::DependencyRemoved(dep) => self.dependencies_removed.push(dep),
        }
    }
}

impl ProposalService {
    /// Apply every approved, not yet applied item of the proposal.
    ///
    /// Holds the proposal lock for the whole run. An applied proposal yields
    /// a no-op result with `already_applied` set. The proposal is marked
    /// applied when at least one approved item is applied, or, with
    /// `merge.require_all_items`, only once no approved item failed.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` when the actor is neither owner nor
    /// approver or the proposal is not approved or partially approved.
    /// Per-item failures are reported in the result instead.
    pub fn merge_proposal(&self, proposal_id: &str, actor: &str) -> Result<MergeResult> {
        let lock = self.lock(proposal_id)?;
        let mut conn = self.connect()?;

        let proposal = query::require_proposal(&conn, proposal_id)?;
        if !proposal.is_owner(actor) && !proposal.is_approver(actor) {
            return Err(RatifyError::transition(
                proposal.status,
                ProposalStatus::Applied,
                format!("{actor} is neither the owner nor the approver"),
            ));
        }
        let mut result = MergeResult::new(proposal_id);
        if proposal.status == ProposalStatus::Applied {
            result.already_applied = true;
            info!(proposal_id, actor, "proposal already applied; nothing to merge");
            return Ok(result);
        }
        if !proposal.status.is_mergeable() {
            return Err(RatifyError::transition(
                proposal.status,
                ProposalStatus::Applied,
                "only approved or partially approved proposals can be merged",
            ));
        }

        let approved: Vec<ProposalItem> = query::list_items(&conn, proposal_id)?
            .into_iter()
            .filter(|item| item.approval_status == ApprovalStatus::Approved)
            .collect();

        let mut applied = 0usize;
        for item in approved {
            if item.applied_at_us.is_some() {
                applied += 1;
                result.skipped_items.push(item.id);
                continue;
            }
            let item_id = item.id.clone();
            match db::immediate(&mut conn, |tx| apply_and_stamp(tx, &proposal, item)) {
                Ok(change) => {
                    applied += 1;
                    result.record(change);
                }
                Err(err) => {
                    warn!(proposal_id, item_id = %item_id, error = %err, "item failed to apply");
                    result.failures.push(MergeFailure {
                        item_id,
                        code: err.code().code().to_string(),
                        message: err.to_string(),
                    });
                }
            }
        }

        let complete = if self.config().merge.require_all_items {
            result.failures.is_empty()
        } else {
            applied > 0
        };
        if complete {
            db::immediate(&mut conn, |tx| {
                let mut proposal = query::require_proposal(tx, proposal_id)?;
                proposal.status.can_transition_to(ProposalStatus::Applied)?;
                let now = now_us();
                proposal.status = ProposalStatus::Applied;
                proposal.merged_at_us = Some(now);
                proposal.updated_at_us = now;
                write::update_proposal(tx, &proposal)
            })?;
            result.marked_applied = true;
        }
        lock.release();

        info!(
            proposal_id,
            actor,
            total_changes = result.total_changes,
            skipped = result.skipped_items.len(),
            failures = result.failures.len(),
            marked_applied = result.marked_applied,
            "merge finished"
        );
        self.refresh_impact(proposal_id);
        Ok(result)
    }
}

fn apply_and_stamp(
    conn: &Connection,
    proposal: &Proposal,
    mut item: ProposalItem,
) -> Result<Change> {
    let now = now_us();
    let change = apply_item(conn, proposal, &item, now)?;
    item.applied_at_us = Some(now);
    item.applied_entity_id = Some(change.entity_id().to_string());
    item.updated_at_us = now;
    write::update_item(conn, &item)?;
    Ok(change)
}

fn apply_item(
    conn: &Connection,
    proposal: &Proposal,
    item: &ProposalItem,
    now: i64,
) -> Result<Change> {
    match (item.action, item.entity_type) {
        (ItemAction::Add, EntityType::Task) => create_task(conn, proposal, item, now),
        (ItemAction::Modify, EntityType::Task) => {
            let mut task = live_task(conn, proposal, target_id(item)?)?;
            let patch = item
                .proposed_task()
                .ok_or_else(|| RatifyError::validation("proposed_state", "missing task fields"))?;
            patch.apply_to(&mut task);
            task.updated_at_us = now;
            write::update_task(conn, &task)?;
            Ok(Change::TaskUpdated(task.id))
        }
        (ItemAction::Remove, EntityType::Task) => {
            let task = live_task(conn, proposal, target_id(item)?)?;
            write::delete_task(conn, &task.id)?;
            Ok(Change::TaskDeleted(task.id))
        }

        (ItemAction::Add, EntityType::Milestone) => create_milestone(conn, proposal, item, now),
        (ItemAction::Modify, EntityType::Milestone) => {
            let mut milestone = live_milestone(conn, proposal, target_id(item)?)?;
            milestone_fields(item)?.apply_to(&mut milestone);
            milestone.updated_at_us = now;
            write::update_milestone(conn, &milestone)?;
            Ok(Change::MilestoneUpdated(milestone.id))
        }
        (ItemAction::Remove, EntityType::Milestone) => {
            let milestone = live_milestone(conn, proposal, target_id(item)?)?;
            write::delete_milestone(conn, &milestone.id)?;
            Ok(Change::MilestoneDeleted(milestone.id))
        }

        (action, EntityType::Assignment) => {
            let fields = item.proposed_state.as_ref().and_then(EntityState::as_assignment);
            let task_id = fields
                .and_then(|fields| fields.task_id.as_deref())
                .or(item.entity_id.as_deref())
                .ok_or_else(|| RatifyError::validation("entity_id", "names no task"))?;
            let mut task = live_task(conn, proposal, task_id)?;
            task.assignee_id = match action {
                ItemAction::Remove => None,
                ItemAction::Add | ItemAction::Modify => {
                    fields.and_then(|fields| fields.assignee_id.clone())
                }
            };
            task.updated_at_us = now;
            write::update_task(conn, &task)?;
            Ok(Change::TaskUpdated(task.id))
        }

        (ItemAction::Add, EntityType::Dependency) => {
            let dependency = link(item)?;
            live_task(conn, proposal, &dependency.task_id)?;
            live_task(conn, proposal, &dependency.depends_on_task_id)?;
            let graph = DependencyGraph::from_dependencies(&query::list_dependencies(
                conn,
                &proposal.project_id,
            )?);
            if graph.would_create_cycle(&dependency) {
                return Err(RatifyError::Cycle {
                    from: dependency.task_id,
                    to: dependency.depends_on_task_id,
                });
            }
            write::insert_dependency(conn, &dependency, now)?;
            Ok(Change::DependencyAdded(dependency))
        }
        (ItemAction::Remove, EntityType::Dependency) => {
            let dependency = link(item)?;
            if !write::delete_dependency(conn, &dependency)? {
                return Err(RatifyError::not_found(
                    "dependency",
                    format!("{} -> {}", dependency.task_id, dependency.depends_on_task_id),
                ));
            }
            Ok(Change::DependencyRemoved(dependency))
        }
        (ItemAction::Modify, EntityType::Dependency) => Err(RatifyError::validation(
            "action",
            "dependencies can only be added or removed",
        )),
    }
}

fn create_task(
    conn: &Connection,
    proposal: &Proposal,
    item: &ProposalItem,
    now: i64,
) -> Result<Change> {
    let fields: &TaskFields = item
        .proposed_task()
        .ok_or_else(|| RatifyError::validation("proposed_state", "missing task fields"))?;
    let title = fields
        .title
        .clone()
        .ok_or_else(|| RatifyError::validation("proposed_state.title", "is required"))?;

    let assignee_id = fields.assignee_id.clone().or_else(|| {
        item.ai_assignment
            .as_ref()
            .and_then(|assignment| assignment.assignee_id.clone())
    });
    let estimated_hours = fields
        .estimated_hours
        .or_else(|| item.ai_estimate.as_ref().map(|estimate| estimate.hours));

    let task = Task {
        id: new_id(TASK_PREFIX, &title),
        project_id: proposal.project_id.clone(),
        title,
        description: fields.description.clone(),
        status: fields.status.unwrap_or_default(),
        priority: fields.priority.unwrap_or_default(),
        assignee_id,
        estimated_hours,
        actual_hours: None,
        start_date: fields.start_date,
        due_date: fields.due_date,
        milestone_id: fields.milestone_id.clone(),
        source_proposal_id: Some(proposal.id.clone()),
        created_at_us: now,
        updated_at_us: now,
    };
    write::insert_task(conn, &task)?;
    Ok(Change::TaskCreated(task.id))
}

fn create_milestone(
    conn: &Connection,
    proposal: &Proposal,
    item: &ProposalItem,
    now: i64,
) -> Result<Change> {
    let fields = milestone_fields(item)?;
    let title = fields
        .title
        .clone()
        .ok_or_else(|| RatifyError::validation("proposed_state.title", "is required"))?;

    let milestone = Milestone {
        id: new_id(MILESTONE_PREFIX, &title),
        project_id: proposal.project_id.clone(),
        title,
        description: fields.description.clone(),
        status: fields.status.unwrap_or_default(),
        due_date: fields.due_date,
        source_proposal_id: Some(proposal.id.clone()),
        created_at_us: now,
        updated_at_us: now,
    };
    write::insert_milestone(conn, &milestone)?;
    Ok(Change::MilestoneCreated(milestone.id))
}

fn milestone_fields(item: &ProposalItem) -> Result<&MilestoneFields> {
    item.proposed_state
        .as_ref()
        .and_then(EntityState::as_milestone)
        .ok_or_else(|| RatifyError::validation("proposed_state", "missing milestone fields"))
}

fn target_id(item: &ProposalItem) -> Result<&str> {
    item.entity_id
        .as_deref()
        .ok_or_else(|| RatifyError::validation("entity_id", "is required"))
}

fn link(item: &ProposalItem) -> Result<TaskDependency> {
    targets::dependency_link(
        item.entity_id.as_deref(),
        item.proposed_state.as_ref(),
        item.previous_state.as_ref(),
    )
}

/// A live task of the proposal's project.
fn live_task(conn: &Connection, proposal: &Proposal, task_id: &str) -> Result<Task> {
    query::get_task(conn, task_id)?
        .filter(|task| task.project_id == proposal.project_id)
        .ok_or_else(|| RatifyError::not_found("task", task_id))
}

fn live_milestone(
    conn: &Connection,
    proposal: &Proposal,
    milestone_id: &str,
) -> Result<Milestone> {
    query::get_milestone(conn, milestone_id)?
        .filter(|milestone| milestone.project_id == proposal.project_id)
        .ok_or_else(|| RatifyError::not_found("milestone", milestone_id))
}
