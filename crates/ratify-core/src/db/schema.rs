//! Canonical SQLite schema for ratify.
//!
//! Two groups of tables share one database:
//! - the live project graph (`projects`, `team_members`, `tasks`,
//!   `milestones`, `task_dependencies`) that merges write into
//! - the review workflow (`proposals`, `proposal_items`,
//!   `impact_summaries`, `discussion_comments`, `discussion_resolutions`)
//!
//! Items and impact summaries cascade with their proposal. Discussion rows
//! carry no foreign key to proposals so they survive a discard.

/// Migration v1: core tables plus store metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS projects (
    project_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    owner_id TEXT NOT NULL CHECK (length(trim(owner_id)) > 0),
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS team_members (
    project_id TEXT NOT NULL REFERENCES projects(project_id) ON DELETE CASCADE,
    member_id TEXT NOT NULL CHECK (length(trim(member_id)) > 0),
    name TEXT NOT NULL,
    capacity_hours REAL NOT NULL CHECK (capacity_hours >= 0),
    PRIMARY KEY (project_id, member_id)
);

CREATE TABLE IF NOT EXISTS milestones (
    milestone_id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(project_id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    description TEXT,
    status TEXT NOT NULL DEFAULT 'planned' CHECK (status IN ('planned', 'active', 'completed')),
    due_date TEXT,
    source_proposal_id TEXT,
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS tasks (
    task_id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(project_id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    description TEXT,
    status TEXT NOT NULL DEFAULT 'todo' CHECK (status IN ('todo', 'in_progress', 'done')),
    priority TEXT NOT NULL DEFAULT 'medium' CHECK (priority IN ('low', 'medium', 'high', 'urgent')),
    assignee_id TEXT,
    estimated_hours REAL CHECK (estimated_hours IS NULL OR estimated_hours >= 0),
    actual_hours REAL CHECK (actual_hours IS NULL OR actual_hours >= 0),
    start_date TEXT,
    due_date TEXT,
    milestone_id TEXT REFERENCES milestones(milestone_id) ON DELETE SET NULL,
    source_proposal_id TEXT,
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS task_dependencies (
    task_id TEXT NOT NULL REFERENCES tasks(task_id) ON DELETE CASCADE,
    depends_on_task_id TEXT NOT NULL REFERENCES tasks(task_id) ON DELETE CASCADE,
    created_at_us INTEGER NOT NULL,
    PRIMARY KEY (task_id, depends_on_task_id),
    CHECK (task_id <> depends_on_task_id)
);

CREATE TABLE IF NOT EXISTS proposals (
    proposal_id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(project_id),
    title TEXT NOT NULL CHECK (length(trim(title)) > 0),
    description TEXT,
    status TEXT NOT NULL CHECK (status IN (
        'draft', 'pending_review', 'approved', 'rejected',
        'partially_approved', 'applied', 'archived'
    )),
    owner_id TEXT NOT NULL,
    approver_id TEXT,
    source_type TEXT NOT NULL CHECK (source_type IN ('voice', 'text', 'file', 'api')),
    source_content TEXT,
    metadata_json TEXT NOT NULL DEFAULT '{}',
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL,
    submitted_at_us INTEGER,
    resolved_at_us INTEGER,
    merged_at_us INTEGER,
    CHECK (proposal_id LIKE 'pr-%')
);

CREATE TABLE IF NOT EXISTS proposal_items (
    item_id TEXT PRIMARY KEY,
    proposal_id TEXT NOT NULL REFERENCES proposals(proposal_id) ON DELETE CASCADE,
    sequence INTEGER NOT NULL,
    action TEXT NOT NULL CHECK (action IN ('add', 'modify', 'remove')),
    entity_type TEXT NOT NULL CHECK (entity_type IN ('task', 'milestone', 'assignment', 'dependency')),
    entity_id TEXT,
    proposed_state_json TEXT,
    previous_state_json TEXT,
    approval_status TEXT NOT NULL DEFAULT 'pending' CHECK (approval_status IN (
        'pending', 'approved', 'rejected', 'needs_discussion'
    )),
    ai_estimate_json TEXT,
    ai_assignment_json TEXT,
    reviewer_notes TEXT,
    reviewed_by TEXT,
    reviewed_at_us INTEGER,
    applied_at_us INTEGER,
    applied_entity_id TEXT,
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL,
    UNIQUE (proposal_id, sequence),
    CHECK (action <> 'add' OR (entity_id IS NULL AND previous_state_json IS NULL)),
    CHECK (action = 'add' OR entity_id IS NOT NULL)
);

CREATE TABLE IF NOT EXISTS impact_summaries (
    proposal_id TEXT PRIMARY KEY REFERENCES proposals(proposal_id) ON DELETE CASCADE,
    summary_json TEXT NOT NULL,
    risk_score INTEGER NOT NULL CHECK (risk_score BETWEEN 0 AND 100),
    calculated_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS discussion_comments (
    comment_id TEXT PRIMARY KEY,
    proposal_id TEXT NOT NULL,
    item_id TEXT,
    parent_id TEXT REFERENCES discussion_comments(comment_id) ON DELETE SET NULL,
    author_id TEXT NOT NULL,
    body TEXT NOT NULL CHECK (length(trim(body)) > 0),
    created_at_us INTEGER NOT NULL,
    edited_at_us INTEGER,
    CHECK (parent_id IS NULL OR parent_id <> comment_id)
);

CREATE TABLE IF NOT EXISTS discussion_resolutions (
    proposal_id TEXT NOT NULL,
    item_key TEXT NOT NULL DEFAULT '',
    resolved_by TEXT NOT NULL,
    resolved_at_us INTEGER NOT NULL,
    PRIMARY KEY (proposal_id, item_key)
);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL
);

INSERT OR IGNORE INTO store_meta (id, schema_version) VALUES (1, 1);
";

/// Migration v2: read-path indexes.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_proposals_project_status
    ON proposals(project_id, status, updated_at_us DESC);

CREATE INDEX IF NOT EXISTS idx_proposal_items_proposal_seq
    ON proposal_items(proposal_id, sequence);

CREATE INDEX IF NOT EXISTS idx_proposal_items_status
    ON proposal_items(proposal_id, approval_status);

CREATE INDEX IF NOT EXISTS idx_tasks_project_assignee
    ON tasks(project_id, assignee_id, status);

CREATE INDEX IF NOT EXISTS idx_milestones_project
    ON milestones(project_id);

CREATE INDEX IF NOT EXISTS idx_task_dependencies_target
    ON task_dependencies(depends_on_task_id, task_id);

CREATE INDEX IF NOT EXISTS idx_discussion_comments_thread
    ON discussion_comments(proposal_id, item_id, created_at_us);

UPDATE store_meta
SET schema_version = 2
WHERE id = 1;
";

/// Indexes expected by list and context-loading query paths.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_proposals_project_status",
    "idx_proposal_items_proposal_seq",
    "idx_proposal_items_status",
    "idx_tasks_project_assignee",
    "idx_milestones_project",
    "idx_task_dependencies_target",
    "idx_discussion_comments_thread",
];
