//! Bulk import of the live project graph.
//!
//! Proposals mutate the live graph only through merge; a seed is how the
//! graph gets there in the first place. Re-importing the same seed is
//! idempotent: existing rows are updated in place.

use ratify_core::db::{self, query, write};
use ratify_core::error::{RatifyError, Result};
use ratify_core::id::now_us;
use ratify_core::model::project::{Milestone, Project, Task, TaskDependency, TeamMember};
use ratify_impact::DependencyGraph;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::service::ProposalService;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectSeed {
    pub project: Project,
    #[serde(default)]
    pub members: Vec<TeamMember>,
    #[serde(default)]
    pub milestones: Vec<Milestone>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub dependencies: Vec<TaskDependency>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImportReport {
    pub members: usize,
    pub milestones: usize,
    pub tasks: usize,
    pub dependencies: usize,
}

impl ProjectSeed {
    fn validate(&self) -> Result<()> {
        if self.project.id.trim().is_empty() {
            return Err(RatifyError::validation("project.id", "must not be empty"));
        }
        let project_id = &self.project.id;
        let foreign = self
            .members
            .iter()
            .map(|m| ("members", &m.project_id))
            .chain(self.milestones.iter().map(|m| ("milestones", &m.project_id)))
            .chain(self.tasks.iter().map(|t| ("tasks", &t.project_id)))
            .find(|(_, id)| *id != project_id);
        if let Some((field, id)) = foreign {
            return Err(RatifyError::validation(
                field,
                format!("entry belongs to project {id}, not {project_id}"),
            ));
        }
        if let Some(member) = self
            .members
            .iter()
            .find(|m| !m.capacity_hours.is_finite() || m.capacity_hours < 0.0)
        {
            return Err(RatifyError::validation(
                format!("members.{}.capacity_hours", member.id),
                "must be a non-negative number",
            ));
        }
        Ok(())
    }
}

impl ProposalService {
    /// Load a project, its team and its plan into the store.
    ///
    /// Runs in one transaction; a dependency that would close a cycle
    /// aborts the whole import.
    ///
    /// # Errors
    ///
    /// Returns a validation or cycle error for a bad seed, or a store error.
    pub fn import_seed(&self, seed: &ProjectSeed) -> Result<ImportReport> {
        seed.validate()?;
        let mut conn = self.connect()?;
        let now = now_us();

        let report = db::immediate(&mut conn, |tx| {
            write::insert_project(tx, &seed.project, now)?;
            for member in &seed.members {
                write::upsert_member(tx, member)?;
            }

            for milestone in &seed.milestones {
                let mut milestone = milestone.clone();
                stamp(&mut milestone.created_at_us, &mut milestone.updated_at_us, now);
                if query::get_milestone(tx, &milestone.id)?.is_some() {
                    write::update_milestone(tx, &milestone)?;
                } else {
                    write::insert_milestone(tx, &milestone)?;
                }
            }

            for task in &seed.tasks {
                let mut task = task.clone();
                stamp(&mut task.created_at_us, &mut task.updated_at_us, now);
                if query::get_task(tx, &task.id)?.is_some() {
                    write::update_task(tx, &task)?;
                } else {
                    write::insert_task(tx, &task)?;
                }
            }

            let existing = query::list_dependencies(tx, &seed.project.id)?;
            let mut graph = DependencyGraph::from_dependencies(&existing);
            for dependency in &seed.dependencies {
                if graph.would_create_cycle(dependency) {
                    return Err(RatifyError::Cycle {
                        from: dependency.task_id.clone(),
                        to: dependency.depends_on_task_id.clone(),
                    });
                }
                write::insert_dependency(tx, dependency, now)?;
                graph.add(dependency);
            }

            Ok(ImportReport {
                members: seed.members.len(),
                milestones: seed.milestones.len(),
                tasks: seed.tasks.len(),
                dependencies: seed.dependencies.len(),
            })
        })?;

        info!(
            project_id = %seed.project.id,
            members = report.members,
            milestones = report.milestones,
            tasks = report.tasks,
            dependencies = report.dependencies,
            "project imported"
        );
        Ok(report)
    }
}

fn stamp(created_at_us: &mut i64, updated_at_us: &mut i64, now: i64) {
    if *created_at_us == 0 {
        *created_at_us = now;
    }
    if *updated_at_us == 0 {
        *updated_at_us = *created_at_us;
    }
}
