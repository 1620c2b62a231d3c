//! Checks a new item against the live project before it is stored.
//!
//! Shape rules live on [`NewItem::validate`]; this module covers what needs
//! the project snapshot: the targeted entity exists, named members belong to
//! the project, and dependency links stay acyclic. For modify and remove
//! items the live entity is snapshotted as the item's previous state.

use ratify_core::error::{RatifyError, Result};
use ratify_core::model::item::{EntityType, ItemAction, NewItem};
use ratify_core::model::payload::{
    AssignmentFields, DependencyFields, EntityState, MilestoneFields, TaskFields,
};
use ratify_core::model::project::{ProjectContext, Task, TaskDependency};
use ratify_impact::DependencyGraph;

/// Validate `item` against `ctx` and return the previous state to store.
///
/// # Errors
///
/// Returns [`RatifyError::NotFound`] for a missing target,
/// [`RatifyError::Validation`] for a non-member assignee or an unsupported
/// action, and [`RatifyError::Cycle`] for a cycle-closing dependency.
pub fn check(ctx: &ProjectContext, item: &NewItem) -> Result<Option<EntityState>> {
    if let Some(EntityState::Task(fields)) = &item.proposed_state {
        check_task_fields(ctx, fields)?;
    }

    match (item.action, item.entity_type) {
        (ItemAction::Add, EntityType::Assignment) => {
            let fields = assignment_fields(item);
            let task_id = fields.task_id.as_deref().unwrap_or_default();
            require_task(ctx, task_id)?;
            require_member(ctx, fields.assignee_id.as_deref(), "proposed_state.assignee_id")?;
            Ok(None)
        }
        (ItemAction::Add, EntityType::Dependency) => {
            let dependency = link_of(item)?;
            require_task(ctx, &dependency.task_id)?;
            require_task(ctx, &dependency.depends_on_task_id)?;
            let graph = DependencyGraph::from_dependencies(&ctx.dependencies);
            if graph.would_create_cycle(&dependency) {
                return Err(RatifyError::Cycle {
                    from: dependency.task_id,
                    to: dependency.depends_on_task_id,
                });
            }
            Ok(None)
        }
        (ItemAction::Add, _) => Ok(None),

        (_, EntityType::Task) => {
            let task = require_task(ctx, target_id(item))?;
            Ok(Some(EntityState::Task(TaskFields::from(task))))
        }
        (_, EntityType::Milestone) => {
            let id = target_id(item);
            let milestone = ctx
                .milestone(id)
                .ok_or_else(|| RatifyError::not_found("milestone", id))?;
            Ok(Some(EntityState::Milestone(MilestoneFields::from(milestone))))
        }
        (action, EntityType::Assignment) => {
            let task = require_task(ctx, target_id(item))?;
            if action == ItemAction::Modify {
                require_member(
                    ctx,
                    assignment_fields(item).assignee_id.as_deref(),
                    "proposed_state.assignee_id",
                )?;
            }
            Ok(Some(EntityState::Assignment(AssignmentFields {
                task_id: Some(task.id.clone()),
                assignee_id: task.assignee_id.clone(),
            })))
        }
        (ItemAction::Modify, EntityType::Dependency) => Err(RatifyError::validation(
            "action",
            "dependencies can only be added or removed",
        )),
        (_, EntityType::Dependency) => {
            let dependency = link_of(item)?;
            if !ctx.dependencies.contains(&dependency) {
                return Err(RatifyError::not_found(
                    "dependency",
                    format!("{} -> {}", dependency.task_id, dependency.depends_on_task_id),
                ));
            }
            Ok(Some(EntityState::Dependency(DependencyFields {
                task_id: Some(dependency.task_id),
                depends_on_task_id: Some(dependency.depends_on_task_id),
            })))
        }
    }
}

/// The dependency link an item adds or removes.
///
/// `task_id` falls back to the item's entity id; the blocker comes from the
/// proposed state, or the previous state for a remove.
///
/// # Errors
///
/// Returns [`RatifyError::Validation`] when either end is missing.
pub fn dependency_link(
    entity_id: Option<&str>,
    proposed: Option<&EntityState>,
    previous: Option<&EntityState>,
) -> Result<TaskDependency> {
    let fields = proposed
        .and_then(EntityState::as_dependency)
        .or_else(|| previous.and_then(EntityState::as_dependency));

    let task_id = fields
        .and_then(|f| f.task_id.clone())
        .or_else(|| entity_id.map(str::to_string))
        .ok_or_else(|| RatifyError::validation("proposed_state.task_id", "is required"))?;
    let depends_on_task_id = fields
        .and_then(|f| f.depends_on_task_id.clone())
        .ok_or_else(|| {
            RatifyError::validation("proposed_state.depends_on_task_id", "is required")
        })?;

    Ok(TaskDependency {
        task_id,
        depends_on_task_id,
    })
}

fn link_of(item: &NewItem) -> Result<TaskDependency> {
    dependency_link(
        item.entity_id.as_deref(),
        item.proposed_state.as_ref(),
        item.previous_state.as_ref(),
    )
}

fn check_task_fields(ctx: &ProjectContext, fields: &TaskFields) -> Result<()> {
    if fields.assignee_id.is_some() {
        require_member(ctx, fields.assignee_id.as_deref(), "proposed_state.assignee_id")?;
    }
    if let Some(milestone_id) = &fields.milestone_id
        && ctx.milestone(milestone_id).is_none()
    {
        return Err(RatifyError::not_found("milestone", milestone_id.clone()));
    }
    if let Some(hours) = fields.estimated_hours
        && (!hours.is_finite() || hours < 0.0)
    {
        return Err(RatifyError::validation(
            "proposed_state.estimated_hours",
            "must be a non-negative number",
        ));
    }
    Ok(())
}

fn target_id(item: &NewItem) -> &str {
    item.entity_id.as_deref().unwrap_or_default()
}

fn assignment_fields(item: &NewItem) -> AssignmentFields {
    item.proposed_state
        .as_ref()
        .and_then(EntityState::as_assignment)
        .cloned()
        .unwrap_or_default()
}

fn require_task<'c>(ctx: &'c ProjectContext, task_id: &str) -> Result<&'c Task> {
    ctx.task(task_id)
        .ok_or_else(|| RatifyError::not_found("task", task_id))
}

fn require_member(ctx: &ProjectContext, member_id: Option<&str>, field: &str) -> Result<()> {
    match member_id {
        Some(id) if ctx.member(id).is_some() => Ok(()),
        Some(id) => Err(RatifyError::validation(
            field,
            format!("{id} is not a member of project {}", ctx.project.id),
        )),
        None => Err(RatifyError::validation(field, "is required")),
    }
}
