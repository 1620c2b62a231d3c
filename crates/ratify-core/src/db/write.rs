//! Row-level write helpers.
//!
//! These functions do not open transactions themselves; callers group them
//! inside [`super::immediate`] so a transition commits or aborts as a whole.

use rusqlite::{Connection, params};
use serde::Serialize;

use crate::error::{RatifyError, Result};
use crate::model::discussion::{Comment, ThreadResolution};
use crate::model::impact::ImpactSummary;
use crate::model::item::ProposalItem;
use crate::model::project::{Milestone, Project, Task, TaskDependency, TeamMember};
use crate::model::proposal::Proposal;

fn to_json<T: Serialize>(value: Option<&T>) -> Result<Option<String>> {
    value
        .map(serde_json::to_string)
        .transpose()
        .map_err(RatifyError::from)
}

// ---------------------------------------------------------------------------
// Proposals
// ---------------------------------------------------------------------------

/// Insert a new proposal row.
///
/// # Errors
///
/// Returns an error if the insert violates a constraint or fails.
pub fn insert_proposal(conn: &Connection, proposal: &Proposal) -> Result<()> {
    conn.execute(
        "INSERT INTO proposals (
            proposal_id, project_id, title, description, status, owner_id, approver_id,
            source_type, source_content, metadata_json, created_at_us, updated_at_us,
            submitted_at_us, resolved_at_us, merged_at_us
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            proposal.id,
            proposal.project_id,
            proposal.title,
            proposal.description,
            proposal.status.as_str(),
            proposal.owner_id,
            proposal.approver_id,
            proposal.source_type.as_str(),
            proposal.source_content,
            serde_json::to_string(&proposal.metadata)?,
            proposal.created_at_us,
            proposal.updated_at_us,
            proposal.submitted_at_us,
            proposal.resolved_at_us,
            proposal.merged_at_us,
        ],
    )?;
    Ok(())
}

/// Overwrite the mutable columns of an existing proposal.
///
/// # Errors
///
/// Returns `NotFound` if the row vanished, or a store error.
pub fn update_proposal(conn: &Connection, proposal: &Proposal) -> Result<()> {
    let changed = conn.execute(
        "UPDATE proposals SET
            title = ?2, description = ?3, status = ?4, approver_id = ?5,
            source_content = ?6, metadata_json = ?7, updated_at_us = ?8,
            submitted_at_us = ?9, resolved_at_us = ?10, merged_at_us = ?11
         WHERE proposal_id = ?1",
        params![
            proposal.id,
            proposal.title,
            proposal.description,
            proposal.status.as_str(),
            proposal.approver_id,
            proposal.source_content,
            serde_json::to_string(&proposal.metadata)?,
            proposal.updated_at_us,
            proposal.submitted_at_us,
            proposal.resolved_at_us,
            proposal.merged_at_us,
        ],
    )?;
    if changed == 0 {
        return Err(RatifyError::not_found("proposal", proposal.id.clone()));
    }
    Ok(())
}

/// Delete a proposal; items and the impact summary cascade.
///
/// # Errors
///
/// Returns an error if the delete fails.
pub fn delete_proposal(conn: &Connection, proposal_id: &str) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM proposals WHERE proposal_id = ?1",
        params![proposal_id],
    )?)
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// Insert a proposal item.
///
/// # Errors
///
/// Returns an error if the insert violates a constraint or fails.
pub fn insert_item(conn: &Connection, item: &ProposalItem) -> Result<()> {
    conn.execute(
        "INSERT INTO proposal_items (
            item_id, proposal_id, sequence, action, entity_type, entity_id,
            proposed_state_json, previous_state_json, approval_status, ai_estimate_json,
            ai_assignment_json, reviewer_notes, reviewed_by, reviewed_at_us, applied_at_us,
            applied_entity_id, created_at_us, updated_at_us
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
        params![
            item.id,
            item.proposal_id,
            item.sequence,
            item.action.as_str(),
            item.entity_type.as_str(),
            item.entity_id,
            to_json(item.proposed_state.as_ref())?,
            to_json(item.previous_state.as_ref())?,
            item.approval_status.as_str(),
            to_json(item.ai_estimate.as_ref())?,
            to_json(item.ai_assignment.as_ref())?,
            item.reviewer_notes,
            item.reviewed_by,
            item.reviewed_at_us,
            item.applied_at_us,
            item.applied_entity_id,
            item.created_at_us,
            item.updated_at_us,
        ],
    )?;
    Ok(())
}

/// Overwrite the review, advisory and merge columns of an item.
///
/// # Errors
///
/// Returns `NotFound` if the row vanished, or a store error.
pub fn update_item(conn: &Connection, item: &ProposalItem) -> Result<()> {
    let changed = conn.execute(
        "UPDATE proposal_items SET
            approval_status = ?2, ai_estimate_json = ?3, ai_assignment_json = ?4,
            reviewer_notes = ?5, reviewed_by = ?6, reviewed_at_us = ?7,
            applied_at_us = ?8, applied_entity_id = ?9, updated_at_us = ?10
         WHERE item_id = ?1",
        params![
            item.id,
            item.approval_status.as_str(),
            to_json(item.ai_estimate.as_ref())?,
            to_json(item.ai_assignment.as_ref())?,
            item.reviewer_notes,
            item.reviewed_by,
            item.reviewed_at_us,
            item.applied_at_us,
            item.applied_entity_id,
            item.updated_at_us,
        ],
    )?;
    if changed == 0 {
        return Err(RatifyError::not_found("item", item.id.clone()));
    }
    Ok(())
}

/// Delete one item.
///
/// # Errors
///
/// Returns an error if the delete fails.
pub fn delete_item(conn: &Connection, item_id: &str) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM proposal_items WHERE item_id = ?1",
        params![item_id],
    )?)
}

/// Delete every item of a proposal.
///
/// # Errors
///
/// Returns an error if the delete fails.
pub fn delete_items_for_proposal(conn: &Connection, proposal_id: &str) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM proposal_items WHERE proposal_id = ?1",
        params![proposal_id],
    )?)
}

// ---------------------------------------------------------------------------
// Impact
// ---------------------------------------------------------------------------

/// Replace the stored summary of a proposal.
///
/// # Errors
///
/// Returns an error if serialization or the upsert fails.
pub fn upsert_impact(conn: &Connection, summary: &ImpactSummary) -> Result<()> {
    conn.execute(
        "INSERT INTO impact_summaries (proposal_id, summary_json, risk_score, calculated_at_us)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(proposal_id) DO UPDATE SET
            summary_json = excluded.summary_json,
            risk_score = excluded.risk_score,
            calculated_at_us = excluded.calculated_at_us",
        params![
            summary.proposal_id,
            serde_json::to_string(summary)?,
            i64::from(summary.risk_score),
            summary.calculated_at_us,
        ],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Discussion
// ---------------------------------------------------------------------------

/// Insert a comment.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn insert_comment(conn: &Connection, comment: &Comment) -> Result<()> {
    conn.execute(
        "INSERT INTO discussion_comments (
            comment_id, proposal_id, item_id, parent_id, author_id, body,
            created_at_us, edited_at_us
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            comment.id,
            comment.proposal_id,
            comment.item_id,
            comment.parent_id,
            comment.author_id,
            comment.body,
            comment.created_at_us,
            comment.edited_at_us,
        ],
    )?;
    Ok(())
}

/// Replace a comment body and stamp the edit time.
///
/// # Errors
///
/// Returns an error if the update fails.
pub fn update_comment_body(
    conn: &Connection,
    comment_id: &str,
    body: &str,
    edited_at_us: i64,
) -> Result<()> {
    conn.execute(
        "UPDATE discussion_comments SET body = ?2, edited_at_us = ?3 WHERE comment_id = ?1",
        params![comment_id, body, edited_at_us],
    )?;
    Ok(())
}

/// Delete a comment, moving its direct replies up to its own parent.
///
/// # Errors
///
/// Returns an error if either statement fails.
pub fn delete_comment(conn: &Connection, comment: &Comment) -> Result<()> {
    conn.execute(
        "UPDATE discussion_comments SET parent_id = ?2 WHERE parent_id = ?1",
        params![comment.id, comment.parent_id],
    )?;
    conn.execute(
        "DELETE FROM discussion_comments WHERE comment_id = ?1",
        params![comment.id],
    )?;
    Ok(())
}

/// Record that a thread is resolved.
///
/// # Errors
///
/// Returns an error if the thread already has a resolution row.
pub fn insert_resolution(conn: &Connection, resolution: &ThreadResolution) -> Result<()> {
    conn.execute(
        "INSERT INTO discussion_resolutions (proposal_id, item_key, resolved_by, resolved_at_us)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            resolution.proposal_id,
            resolution.item_id.as_deref().unwrap_or(""),
            resolution.resolved_by,
            resolution.resolved_at_us,
        ],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Live project graph
// ---------------------------------------------------------------------------

/// Insert or rename a project.
///
/// # Errors
///
/// Returns an error if the upsert fails.
pub fn insert_project(conn: &Connection, project: &Project, created_at_us: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO projects (project_id, name, owner_id, created_at_us)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(project_id) DO UPDATE SET name = excluded.name, owner_id = excluded.owner_id",
        params![project.id, project.name, project.owner_id, created_at_us],
    )?;
    Ok(())
}

/// Insert or update a team member.
///
/// # Errors
///
/// Returns an error if the upsert fails.
pub fn upsert_member(conn: &Connection, member: &TeamMember) -> Result<()> {
    conn.execute(
        "INSERT INTO team_members (project_id, member_id, name, capacity_hours)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(project_id, member_id) DO UPDATE SET
            name = excluded.name, capacity_hours = excluded.capacity_hours",
        params![
            member.project_id,
            member.id,
            member.name,
            member.capacity_hours
        ],
    )?;
    Ok(())
}

/// Insert a live task.
///
/// # Errors
///
/// Returns an error if the insert violates a constraint or fails.
pub fn insert_task(conn: &Connection, task: &Task) -> Result<()> {
    conn.execute(
        "INSERT INTO tasks (
            task_id, project_id, title, description, status, priority, assignee_id,
            estimated_hours, actual_hours, start_date, due_date, milestone_id,
            source_proposal_id, created_at_us, updated_at_us
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            task.id,
            task.project_id,
            task.title,
            task.description,
            task.status.as_str(),
            task.priority.as_str(),
            task.assignee_id,
            task.estimated_hours,
            task.actual_hours,
            task.start_date,
            task.due_date,
            task.milestone_id,
            task.source_proposal_id,
            task.created_at_us,
            task.updated_at_us,
        ],
    )?;
    Ok(())
}

/// Overwrite every editable column of a live task.
///
/// # Errors
///
/// Returns `NotFound` if the task does not exist, or a store error.
pub fn update_task(conn: &Connection, task: &Task) -> Result<()> {
    let changed = conn.execute(
        "UPDATE tasks SET
            title = ?2, description = ?3, status = ?4, priority = ?5, assignee_id = ?6,
            estimated_hours = ?7, actual_hours = ?8, start_date = ?9, due_date = ?10,
            milestone_id = ?11, updated_at_us = ?12
         WHERE task_id = ?1",
        params![
            task.id,
            task.title,
            task.description,
            task.status.as_str(),
            task.priority.as_str(),
            task.assignee_id,
            task.estimated_hours,
            task.actual_hours,
            task.start_date,
            task.due_date,
            task.milestone_id,
            task.updated_at_us,
        ],
    )?;
    if changed == 0 {
        return Err(RatifyError::not_found("task", task.id.clone()));
    }
    Ok(())
}

/// Delete a live task; its dependency edges cascade.
///
/// # Errors
///
/// Returns an error if the delete fails.
pub fn delete_task(conn: &Connection, task_id: &str) -> Result<usize> {
    Ok(conn.execute("DELETE FROM tasks WHERE task_id = ?1", params![task_id])?)
}

/// Insert a live milestone.
///
/// # Errors
///
/// Returns an error if the insert violates a constraint or fails.
pub fn insert_milestone(conn: &Connection, milestone: &Milestone) -> Result<()> {
    conn.execute(
        "INSERT INTO milestones (
            milestone_id, project_id, title, description, status, due_date,
            source_proposal_id, created_at_us, updated_at_us
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            milestone.id,
            milestone.project_id,
            milestone.title,
            milestone.description,
            milestone.status.as_str(),
            milestone.due_date,
            milestone.source_proposal_id,
            milestone.created_at_us,
            milestone.updated_at_us,
        ],
    )?;
    Ok(())
}

/// Overwrite every editable column of a live milestone.
///
/// # Errors
///
/// Returns `NotFound` if the milestone does not exist, or a store error.
pub fn update_milestone(conn: &Connection, milestone: &Milestone) -> Result<()> {
    let changed = conn.execute(
        "UPDATE milestones SET
            title = ?2, description = ?3, status = ?4, due_date = ?5, updated_at_us = ?6
         WHERE milestone_id = ?1",
        params![
            milestone.id,
            milestone.title,
            milestone.description,
            milestone.status.as_str(),
            milestone.due_date,
            milestone.updated_at_us,
        ],
    )?;
    if changed == 0 {
        return Err(RatifyError::not_found("milestone", milestone.id.clone()));
    }
    Ok(())
}

/// Delete a live milestone; tasks pointing at it are detached.
///
/// # Errors
///
/// Returns an error if the delete fails.
pub fn delete_milestone(conn: &Connection, milestone_id: &str) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM milestones WHERE milestone_id = ?1",
        params![milestone_id],
    )?)
}

/// Add a dependency edge. Returns `false` when the edge already existed.
///
/// # Errors
///
/// Returns an error if either task is missing or the insert fails.
pub fn insert_dependency(
    conn: &Connection,
    dependency: &TaskDependency,
    created_at_us: i64,
) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO task_dependencies (task_id, depends_on_task_id, created_at_us)
         VALUES (?1, ?2, ?3)",
        params![
            dependency.task_id,
            dependency.depends_on_task_id,
            created_at_us
        ],
    )?;
    Ok(inserted > 0)
}

/// Remove a dependency edge. Returns `false` when there was nothing to remove.
///
/// # Errors
///
/// Returns an error if the delete fails.
pub fn delete_dependency(conn: &Connection, dependency: &TaskDependency) -> Result<bool> {
    let removed = conn.execute(
        "DELETE FROM task_dependencies WHERE task_id = ?1 AND depends_on_task_id = ?2",
        params![dependency.task_id, dependency.depends_on_task_id],
    )?;
    Ok(removed > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{open_in_memory, query};
    use crate::model::discussion::ThreadRef;
    use crate::model::impact::Severity;
    use crate::model::item::{ApprovalStatus, EntityType, ItemAction};
    use crate::model::payload::{EntityState, TaskFields};
    use crate::model::project::{Priority, TaskStatus};
    use crate::model::proposal::{ProposalStatus, SourceType};
    use std::collections::BTreeMap;

    fn setup() -> Connection {
        let conn = open_in_memory().expect("open store");
        insert_project(
            &conn,
            &Project {
                id: "proj".into(),
                name: "Proj".into(),
                owner_id: "olive".into(),
            },
            1,
        )
        .expect("project");
        insert_proposal(
            &conn,
            &Proposal {
                id: "pr-1".into(),
                project_id: "proj".into(),
                title: "Plan".into(),
                description: None,
                status: ProposalStatus::Draft,
                owner_id: "alice".into(),
                approver_id: None,
                source_type: SourceType::Text,
                source_content: Some("raw".into()),
                metadata: BTreeMap::new(),
                created_at_us: 1,
                updated_at_us: 1,
                submitted_at_us: None,
                resolved_at_us: None,
                merged_at_us: None,
            },
        )
        .expect("proposal");
        conn
    }

    fn item(id: &str, sequence: i64) -> ProposalItem {
        ProposalItem {
            id: id.into(),
            proposal_id: "pr-1".into(),
            sequence,
            action: ItemAction::Add,
            entity_type: EntityType::Task,
            entity_id: None,
            proposed_state: Some(EntityState::Task(TaskFields {
                title: Some(format!("Task {sequence}")),
                estimated_hours: Some(3.0),
                ..TaskFields::default()
            })),
            previous_state: None,
            approval_status: ApprovalStatus::Pending,
            ai_estimate: None,
            ai_assignment: None,
            reviewer_notes: None,
            reviewed_by: None,
            reviewed_at_us: None,
            applied_at_us: None,
            applied_entity_id: None,
            created_at_us: 2,
            updated_at_us: 2,
        }
    }

    fn comment(id: &str, parent: Option<&str>, at: i64) -> Comment {
        Comment {
            id: id.into(),
            proposal_id: "pr-1".into(),
            item_id: None,
            parent_id: parent.map(str::to_string),
            author_id: "bob".into(),
            body: format!("comment {id}"),
            created_at_us: at,
            edited_at_us: None,
        }
    }

    #[test]
    fn items_round_trip_in_sequence_order() {
        let conn = setup();
        insert_item(&conn, &item("pi-b", 2)).expect("insert b");
        insert_item(&conn, &item("pi-a", 1)).expect("insert a");

        let items = query::list_items(&conn, "pr-1").expect("list");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "pi-a");
        assert_eq!(items[0], item("pi-a", 1));
        assert_eq!(query::next_sequence(&conn, "pr-1").expect("seq"), 3);
    }

    #[test]
    fn duplicate_sequence_is_rejected() {
        let conn = setup();
        insert_item(&conn, &item("pi-a", 1)).expect("insert a");
        assert!(insert_item(&conn, &item("pi-b", 1)).is_err());
    }

    #[test]
    fn deleting_proposal_cascades_but_keeps_comments() {
        let conn = setup();
        insert_item(&conn, &item("pi-a", 1)).expect("item");
        upsert_impact(
            &conn,
            &ImpactSummary {
                proposal_id: "pr-1".into(),
                totals_by_action: BTreeMap::new(),
                totals_by_entity: BTreeMap::new(),
                totals_by_status: BTreeMap::new(),
                workload_shifts: Vec::new(),
                deadline_impacts: Vec::new(),
                resource_conflicts: Vec::new(),
                net_hours: 3.0,
                risk_score: 2,
                risk_level: Severity::Low,
                calculated_at_us: 5,
            },
        )
        .expect("impact");
        insert_comment(&conn, &comment("dc-1", None, 3)).expect("comment");

        assert_eq!(delete_proposal(&conn, "pr-1").expect("delete"), 1);
        assert!(query::list_items(&conn, "pr-1").expect("items").is_empty());
        assert!(query::get_impact(&conn, "pr-1").expect("impact").is_none());
        assert_eq!(
            query::list_proposal_comments(&conn, "pr-1")
                .expect("comments")
                .len(),
            1
        );
    }

    #[test]
    fn impact_upsert_replaces_previous_row() {
        let conn = setup();
        let mut summary = ImpactSummary {
            proposal_id: "pr-1".into(),
            totals_by_action: BTreeMap::new(),
            totals_by_entity: BTreeMap::new(),
            totals_by_status: BTreeMap::new(),
            workload_shifts: Vec::new(),
            deadline_impacts: Vec::new(),
            resource_conflicts: Vec::new(),
            net_hours: 0.0,
            risk_score: 0,
            risk_level: Severity::Low,
            calculated_at_us: 1,
        };
        upsert_impact(&conn, &summary).expect("first");
        summary.risk_score = 40;
        summary.risk_level = Severity::Medium;
        upsert_impact(&conn, &summary).expect("second");

        let stored = query::get_impact(&conn, "pr-1")
            .expect("query")
            .expect("present");
        assert_eq!(stored.risk_score, 40);
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM impact_summaries", [], |row| row.get(0))
            .expect("count");
        assert_eq!(rows, 1);
    }

    #[test]
    fn deleting_comment_reparents_replies() {
        let conn = setup();
        insert_comment(&conn, &comment("dc-root", None, 1)).expect("root");
        insert_comment(&conn, &comment("dc-mid", Some("dc-root"), 2)).expect("mid");
        insert_comment(&conn, &comment("dc-leaf", Some("dc-mid"), 3)).expect("leaf");

        let mid = query::get_comment(&conn, "dc-mid")
            .expect("query")
            .expect("mid exists");
        delete_comment(&conn, &mid).expect("delete mid");

        let leaf = query::get_comment(&conn, "dc-leaf")
            .expect("query")
            .expect("leaf exists");
        assert_eq!(leaf.parent_id.as_deref(), Some("dc-root"));
        let thread = query::list_thread(&conn, &ThreadRef::new("pr-1", None)).expect("thread");
        assert_eq!(thread.len(), 2);
    }

    #[test]
    fn task_update_requires_existing_row() {
        let conn = setup();
        let task = Task {
            id: "task-1".into(),
            project_id: "proj".into(),
            title: "Write".into(),
            description: None,
            status: TaskStatus::Todo,
            priority: Priority::High,
            assignee_id: None,
            estimated_hours: Some(2.0),
            actual_hours: None,
            start_date: None,
            due_date: None,
            milestone_id: None,
            source_proposal_id: None,
            created_at_us: 1,
            updated_at_us: 1,
        };
        assert!(matches!(
            update_task(&conn, &task),
            Err(RatifyError::NotFound { kind: "task", .. })
        ));
        insert_task(&conn, &task).expect("insert");
        assert_eq!(query::get_task(&conn, "task-1").expect("get"), Some(task));
    }
}
