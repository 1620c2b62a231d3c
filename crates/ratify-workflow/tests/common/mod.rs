#![allow(dead_code)]

use std::sync::Arc;

use ratify_core::config::ProjectConfig;
use ratify_core::db::{self, query};
use ratify_core::model::item::{EntityType, ItemAction, NewItem, ProposalItem, ReviewDecision};
use ratify_core::model::payload::{
    AssignmentFields, DependencyFields, EntityState, MilestoneFields, TaskFields,
};
use ratify_core::model::project::ProjectContext;
use ratify_core::model::proposal::{NewProposal, Proposal, SourceType};
use ratify_workflow::{ContentProvider, ProjectSeed, ProposalService};
use tempfile::TempDir;

pub const OWNER: &str = "pat";
pub const APPROVER: &str = "olive";

pub const SEED: &str = r#"{
    "project": {"id": "proj", "name": "Apollo", "owner_id": "olive"},
    "members": [
        {"id": "ana", "project_id": "proj", "name": "Ana", "capacity_hours": 40},
        {"id": "ben", "project_id": "proj", "name": "Ben", "capacity_hours": 20}
    ],
    "milestones": [
        {"id": "ms-beta", "project_id": "proj", "title": "Beta", "due_date": "2026-04-01"}
    ],
    "tasks": [
        {"id": "task-a", "project_id": "proj", "title": "Design schema", "assignee_id": "ana",
         "estimated_hours": 30, "due_date": "2026-03-10"},
        {"id": "task-b", "project_id": "proj", "title": "Write migrations", "assignee_id": "ben",
         "estimated_hours": 10},
        {"id": "task-c", "project_id": "proj", "title": "Review docs"}
    ],
    "dependencies": [
        {"task_id": "task-b", "depends_on_task_id": "task-a"}
    ]
}"#;

pub struct Fixture {
    pub dir: TempDir,
    pub service: ProposalService,
}

pub fn fixture() -> Fixture {
    fixture_with(ProjectConfig::default(), None)
}

pub fn fixture_with(config: ProjectConfig, provider: Option<Arc<dyn ContentProvider>>) -> Fixture {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut service = ProposalService::for_workspace(dir.path(), config);
    if let Some(provider) = provider {
        service = service.with_provider(provider);
    }
    let seed: ProjectSeed = serde_json::from_str(SEED).expect("parse seed");
    service.import_seed(&seed).expect("import seed");
    Fixture { dir, service }
}

pub fn draft(service: &ProposalService, title: &str) -> Proposal {
    draft_with_content(service, title, None)
}

pub fn draft_with_content(service: &ProposalService, title: &str, content: Option<&str>) -> Proposal {
    service
        .create_proposal(NewProposal {
            owner_id: OWNER.to_string(),
            project_id: "proj".to_string(),
            title: title.to_string(),
            description: None,
            source_type: SourceType::Text,
            source_content: content.map(str::to_string),
            approver_id: None,
        })
        .expect("create proposal")
}

pub fn new_task(title: &str, hours: Option<f64>, assignee: Option<&str>) -> NewItem {
    NewItem {
        action: ItemAction::Add,
        entity_type: EntityType::Task,
        entity_id: None,
        proposed_state: Some(EntityState::Task(TaskFields {
            title: Some(title.to_string()),
            estimated_hours: hours,
            assignee_id: assignee.map(str::to_string),
            ..TaskFields::default()
        })),
        previous_state: None,
    }
}

pub fn modify_task(task_id: &str, fields: TaskFields) -> NewItem {
    NewItem {
        action: ItemAction::Modify,
        entity_type: EntityType::Task,
        entity_id: Some(task_id.to_string()),
        proposed_state: Some(EntityState::Task(fields)),
        previous_state: None,
    }
}

pub fn remove_task(task_id: &str) -> NewItem {
    NewItem {
        action: ItemAction::Remove,
        entity_type: EntityType::Task,
        entity_id: Some(task_id.to_string()),
        proposed_state: None,
        previous_state: None,
    }
}

pub fn new_milestone(title: &str) -> NewItem {
    NewItem {
        action: ItemAction::Add,
        entity_type: EntityType::Milestone,
        entity_id: None,
        proposed_state: Some(EntityState::Milestone(MilestoneFields {
            title: Some(title.to_string()),
            ..MilestoneFields::default()
        })),
        previous_state: None,
    }
}

pub fn reassign(task_id: &str, assignee: &str) -> NewItem {
    NewItem {
        action: ItemAction::Modify,
        entity_type: EntityType::Assignment,
        entity_id: Some(task_id.to_string()),
        proposed_state: Some(EntityState::Assignment(AssignmentFields {
            task_id: Some(task_id.to_string()),
            assignee_id: Some(assignee.to_string()),
        })),
        previous_state: None,
    }
}

pub fn link(action: ItemAction, task_id: &str, depends_on: &str) -> NewItem {
    NewItem {
        action,
        entity_type: EntityType::Dependency,
        entity_id: (action != ItemAction::Add).then(|| task_id.to_string()),
        proposed_state: Some(EntityState::Dependency(DependencyFields {
            task_id: Some(task_id.to_string()),
            depends_on_task_id: Some(depends_on.to_string()),
        })),
        previous_state: None,
    }
}

/// Live project state as stored.
pub fn live(service: &ProposalService) -> ProjectContext {
    let conn = db::open_store(service.store_path()).expect("open store");
    query::load_context(&conn, "proj").expect("load context")
}

/// Approve every pending item of a submitted proposal.
pub fn approve_all(service: &ProposalService, items: &[ProposalItem]) {
    for item in items {
        service
            .review_item(&item.id, APPROVER, ReviewDecision::Approved, None)
            .expect("approve");
    }
}

/// Draft with the given items, submitted for review.
pub fn submitted(service: &ProposalService, items: Vec<NewItem>) -> (Proposal, Vec<ProposalItem>) {
    let proposal = draft(service, "Plan update");
    let stored = items
        .into_iter()
        .map(|item| service.add_item(&proposal.id, OWNER, item).expect("add item"))
        .collect();
    let proposal = service
        .submit_for_review(&proposal.id, OWNER)
        .expect("submit");
    (proposal, stored)
}
