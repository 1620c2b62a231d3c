//! Typed read helpers for the store.
//!
//! All functions take a shared `&Connection`; a `Transaction` derefs to one,
//! so the same helpers serve reads inside a write transaction. Rows are
//! mapped to model structs, never returned raw. Enum columns parse through
//! `FromStr` and JSON columns through `serde_json`; a value that no longer
//! parses surfaces as a conversion failure naming the column.

use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use serde::de::DeserializeOwned;
use std::fmt::Write as _;
use std::str::FromStr;

use crate::error::{RatifyError, Result};
use crate::model::discussion::{Comment, ThreadRef, ThreadResolution};
use crate::model::impact::ImpactSummary;
use crate::model::item::ProposalItem;
use crate::model::project::{Milestone, Project, ProjectContext, Task, TaskDependency, TeamMember};
use crate::model::proposal::{Proposal, ProposalStatus};

const PROPOSAL_COLUMNS: &str = "proposal_id, project_id, title, description, status, owner_id, \
     approver_id, source_type, source_content, metadata_json, created_at_us, updated_at_us, \
     submitted_at_us, resolved_at_us, merged_at_us";

const ITEM_COLUMNS: &str = "item_id, proposal_id, sequence, action, entity_type, entity_id, \
     proposed_state_json, previous_state_json, approval_status, ai_estimate_json, \
     ai_assignment_json, reviewer_notes, reviewed_by, reviewed_at_us, applied_at_us, \
     applied_entity_id, created_at_us, updated_at_us";

const TASK_COLUMNS: &str = "task_id, project_id, title, description, status, priority, \
     assignee_id, estimated_hours, actual_hours, start_date, due_date, milestone_id, \
     source_proposal_id, created_at_us, updated_at_us";

const MILESTONE_COLUMNS: &str = "milestone_id, project_id, title, description, status, due_date, \
     source_proposal_id, created_at_us, updated_at_us";

const COMMENT_COLUMNS: &str =
    "comment_id, proposal_id, item_id, parent_id, author_id, body, created_at_us, edited_at_us";

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Filter criteria for proposal listings, combined with AND semantics.
#[derive(Debug, Clone, Default)]
pub struct ProposalFilter {
    pub project_id: Option<String>,
    pub status: Option<ProposalStatus>,
    pub owner_id: Option<String>,
    pub approver_id: Option<String>,
    pub limit: Option<u32>,
}

// ---------------------------------------------------------------------------
// Proposals
// ---------------------------------------------------------------------------

/// Fetch one proposal by id.
///
/// # Errors
///
/// Returns an error if the query fails or a stored column no longer parses.
pub fn get_proposal(conn: &Connection, proposal_id: &str) -> Result<Option<Proposal>> {
    let sql = format!("SELECT {PROPOSAL_COLUMNS} FROM proposals WHERE proposal_id = ?1");
    let proposal = conn
        .query_row(&sql, params![proposal_id], row_to_proposal)
        .optional()?;
    Ok(proposal)
}

/// Like [`get_proposal`], but a missing row is [`RatifyError::NotFound`].
///
/// # Errors
///
/// Returns `NotFound` when no proposal has this id.
pub fn require_proposal(conn: &Connection, proposal_id: &str) -> Result<Proposal> {
    get_proposal(conn, proposal_id)?.ok_or_else(|| RatifyError::not_found("proposal", proposal_id))
}

/// List proposals, most recently updated first.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_proposals(conn: &Connection, filter: &ProposalFilter) -> Result<Vec<Proposal>> {
    let mut sql = format!("SELECT {PROPOSAL_COLUMNS} FROM proposals WHERE 1 = 1");
    let mut values: Vec<String> = Vec::new();

    for (column, value) in [
        ("project_id", filter.project_id.clone()),
        ("status", filter.status.map(|s| s.as_str().to_string())),
        ("owner_id", filter.owner_id.clone()),
        ("approver_id", filter.approver_id.clone()),
    ] {
        if let Some(value) = value {
            values.push(value);
            let _ = write!(sql, " AND {column} = ?{}", values.len());
        }
    }

    sql.push_str(" ORDER BY updated_at_us DESC, proposal_id ASC");
    if let Some(limit) = filter.limit {
        let _ = write!(sql, " LIMIT {limit}");
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values.iter()), row_to_proposal)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// Fetch one item by id, regardless of proposal.
///
/// # Errors
///
/// Returns an error if the query fails or a stored column no longer parses.
pub fn get_item(conn: &Connection, item_id: &str) -> Result<Option<ProposalItem>> {
    let sql = format!("SELECT {ITEM_COLUMNS} FROM proposal_items WHERE item_id = ?1");
    let item = conn
        .query_row(&sql, params![item_id], row_to_item)
        .optional()?;
    Ok(item)
}

/// Like [`get_item`], but a missing row is [`RatifyError::NotFound`].
///
/// # Errors
///
/// Returns `NotFound` when no item has this id.
pub fn require_item(conn: &Connection, item_id: &str) -> Result<ProposalItem> {
    get_item(conn, item_id)?.ok_or_else(|| RatifyError::not_found("item", item_id))
}

/// All items of a proposal in sequence order.
///
/// # Errors
///
/// Returns an error if the query fails or a stored column no longer parses.
pub fn list_items(conn: &Connection, proposal_id: &str) -> Result<Vec<ProposalItem>> {
    let sql = format!(
        "SELECT {ITEM_COLUMNS} FROM proposal_items WHERE proposal_id = ?1 \
         ORDER BY sequence ASC, item_id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![proposal_id], row_to_item)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Next free sequence number within a proposal (1-based).
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn next_sequence(conn: &Connection, proposal_id: &str) -> Result<i64> {
    let max: Option<i64> = conn.query_row(
        "SELECT MAX(sequence) FROM proposal_items WHERE proposal_id = ?1",
        params![proposal_id],
        |row| row.get(0),
    )?;
    Ok(max.unwrap_or(0) + 1)
}

// ---------------------------------------------------------------------------
// Impact
// ---------------------------------------------------------------------------

/// Stored impact summary of a proposal, if one has been calculated.
///
/// # Errors
///
/// Returns an error if the query fails or the stored summary no longer parses.
pub fn get_impact(conn: &Connection, proposal_id: &str) -> Result<Option<ImpactSummary>> {
    let json: Option<String> = conn
        .query_row(
            "SELECT summary_json FROM impact_summaries WHERE proposal_id = ?1",
            params![proposal_id],
            |row| row.get(0),
        )
        .optional()?;

    match json {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Live project graph
// ---------------------------------------------------------------------------

/// Fetch a project row.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_project(conn: &Connection, project_id: &str) -> Result<Option<Project>> {
    let project = conn
        .query_row(
            "SELECT project_id, name, owner_id FROM projects WHERE project_id = ?1",
            params![project_id],
            |row| {
                Ok(Project {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    owner_id: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(project)
}

/// Like [`get_project`], but a missing row is [`RatifyError::NotFound`].
///
/// # Errors
///
/// Returns `NotFound` when no project has this id.
pub fn require_project(conn: &Connection, project_id: &str) -> Result<Project> {
    get_project(conn, project_id)?.ok_or_else(|| RatifyError::not_found("project", project_id))
}

/// Fetch one live task.
///
/// # Errors
///
/// Returns an error if the query fails or a stored column no longer parses.
pub fn get_task(conn: &Connection, task_id: &str) -> Result<Option<Task>> {
    let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE task_id = ?1");
    Ok(conn
        .query_row(&sql, params![task_id], row_to_task)
        .optional()?)
}

/// Fetch one live milestone.
///
/// # Errors
///
/// Returns an error if the query fails or a stored column no longer parses.
pub fn get_milestone(conn: &Connection, milestone_id: &str) -> Result<Option<Milestone>> {
    let sql = format!("SELECT {MILESTONE_COLUMNS} FROM milestones WHERE milestone_id = ?1");
    Ok(conn
        .query_row(&sql, params![milestone_id], row_to_milestone)
        .optional()?)
}

/// All dependency edges among the tasks of a project.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_dependencies(conn: &Connection, project_id: &str) -> Result<Vec<TaskDependency>> {
    let mut stmt = conn.prepare(
        "SELECT d.task_id, d.depends_on_task_id
         FROM task_dependencies d
         JOIN tasks t ON t.task_id = d.task_id
         WHERE t.project_id = ?1
         ORDER BY d.task_id ASC, d.depends_on_task_id ASC",
    )?;
    let rows = stmt.query_map(params![project_id], |row| {
        Ok(TaskDependency {
            task_id: row.get(0)?,
            depends_on_task_id: row.get(1)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Load the read-only snapshot the advisor and impact engines consume.
///
/// # Errors
///
/// Returns `NotFound` for an unknown project, or a store error.
pub fn load_context(conn: &Connection, project_id: &str) -> Result<ProjectContext> {
    let project = require_project(conn, project_id)?;

    let mut stmt = conn.prepare(
        "SELECT member_id, project_id, name, capacity_hours
         FROM team_members WHERE project_id = ?1 ORDER BY member_id ASC",
    )?;
    let members = stmt
        .query_map(params![project_id], |row| {
            Ok(TeamMember {
                id: row.get(0)?,
                project_id: row.get(1)?,
                name: row.get(2)?,
                capacity_hours: row.get(3)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE project_id = ?1 ORDER BY task_id ASC");
    let mut stmt = conn.prepare(&sql)?;
    let tasks = stmt
        .query_map(params![project_id], row_to_task)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let sql = format!(
        "SELECT {MILESTONE_COLUMNS} FROM milestones WHERE project_id = ?1 ORDER BY milestone_id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let milestones = stmt
        .query_map(params![project_id], row_to_milestone)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let dependencies = list_dependencies(conn, project_id)?;

    Ok(ProjectContext {
        project,
        members,
        tasks,
        milestones,
        dependencies,
    })
}

// ---------------------------------------------------------------------------
// Discussion
// ---------------------------------------------------------------------------

/// Fetch one comment by id.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_comment(conn: &Connection, comment_id: &str) -> Result<Option<Comment>> {
    let sql = format!("SELECT {COMMENT_COLUMNS} FROM discussion_comments WHERE comment_id = ?1");
    Ok(conn
        .query_row(&sql, params![comment_id], row_to_comment)
        .optional()?)
}

/// Comments of exactly one thread, oldest first.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_thread(conn: &Connection, thread: &ThreadRef) -> Result<Vec<Comment>> {
    let sql = format!(
        "SELECT {COMMENT_COLUMNS} FROM discussion_comments
         WHERE proposal_id = ?1 AND COALESCE(item_id, '') = ?2
         ORDER BY created_at_us ASC, comment_id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![thread.proposal_id, thread.item_key()], row_to_comment)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Every comment on a proposal across all of its threads, oldest first.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_proposal_comments(conn: &Connection, proposal_id: &str) -> Result<Vec<Comment>> {
    let sql = format!(
        "SELECT {COMMENT_COLUMNS} FROM discussion_comments
         WHERE proposal_id = ?1
         ORDER BY created_at_us ASC, comment_id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![proposal_id], row_to_comment)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Resolution record of a thread, if it has been resolved.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_resolution(conn: &Connection, thread: &ThreadRef) -> Result<Option<ThreadResolution>> {
    let resolution = conn
        .query_row(
            "SELECT proposal_id, item_key, resolved_by, resolved_at_us
             FROM discussion_resolutions WHERE proposal_id = ?1 AND item_key = ?2",
            params![thread.proposal_id, thread.item_key()],
            |row| {
                let item_key: String = row.get(1)?;
                Ok(ThreadResolution {
                    proposal_id: row.get(0)?,
                    item_id: (!item_key.is_empty()).then_some(item_key),
                    resolved_by: row.get(2)?,
                    resolved_at_us: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(resolution)
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|json| {
        serde_json::from_str(&json).map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
        })
    })
    .transpose()
}

fn row_to_proposal(row: &Row<'_>) -> rusqlite::Result<Proposal> {
    Ok(Proposal {
        id: row.get(0)?,
        project_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        status: parse_column(row, 4)?,
        owner_id: row.get(5)?,
        approver_id: row.get(6)?,
        source_type: parse_column(row, 7)?,
        source_content: row.get(8)?,
        metadata: json_column(row, 9)?.unwrap_or_default(),
        created_at_us: row.get(10)?,
        updated_at_us: row.get(11)?,
        submitted_at_us: row.get(12)?,
        resolved_at_us: row.get(13)?,
        merged_at_us: row.get(14)?,
    })
}

fn row_to_item(row: &Row<'_>) -> rusqlite::Result<ProposalItem> {
    Ok(ProposalItem {
        id: row.get(0)?,
        proposal_id: row.get(1)?,
        sequence: row.get(2)?,
        action: parse_column(row, 3)?,
        entity_type: parse_column(row, 4)?,
        entity_id: row.get(5)?,
        proposed_state: json_column(row, 6)?,
        previous_state: json_column(row, 7)?,
        approval_status: parse_column(row, 8)?,
        ai_estimate: json_column(row, 9)?,
        ai_assignment: json_column(row, 10)?,
        reviewer_notes: row.get(11)?,
        reviewed_by: row.get(12)?,
        reviewed_at_us: row.get(13)?,
        applied_at_us: row.get(14)?,
        applied_entity_id: row.get(15)?,
        created_at_us: row.get(16)?,
        updated_at_us: row.get(17)?,
    })
}

fn row_to_task(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        project_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        status: parse_column(row, 4)?,
        priority: parse_column(row, 5)?,
        assignee_id: row.get(6)?,
        estimated_hours: row.get(7)?,
        actual_hours: row.get(8)?,
        start_date: row.get(9)?,
        due_date: row.get(10)?,
        milestone_id: row.get(11)?,
        source_proposal_id: row.get(12)?,
        created_at_us: row.get(13)?,
        updated_at_us: row.get(14)?,
    })
}

fn row_to_milestone(row: &Row<'_>) -> rusqlite::Result<Milestone> {
    Ok(Milestone {
        id: row.get(0)?,
        project_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        status: parse_column(row, 4)?,
        due_date: row.get(5)?,
        source_proposal_id: row.get(6)?,
        created_at_us: row.get(7)?,
        updated_at_us: row.get(8)?,
    })
}

fn row_to_comment(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        proposal_id: row.get(1)?,
        item_id: row.get(2)?,
        parent_id: row.get(3)?,
        author_id: row.get(4)?,
        body: row.get(5)?,
        created_at_us: row.get(6)?,
        edited_at_us: row.get(7)?,
    })
}
