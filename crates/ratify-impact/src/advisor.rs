//! Estimation and assignment advice for proposed items.
//!
//! # Estimates
//!
//! Three sources, tried in order:
//!
//! 1. **Provided**: the proposed state names `estimated_hours` itself.
//! 2. **Historical**: tasks with recorded actual hours, ranked by title-token
//!    Jaccard overlap with the proposed title (ties broken by id), top
//!    `max_comparables`. Expected is the mean, the range is min/max.
//! 3. **Benchmark**: a configured per-entity figure with a 0.5x/1x/2x range.
//!
//! # Assignment
//!
//! Greedy single pass: every member with capacity gets a utilization
//! (`committed hours / capacity`), the least loaded wins and the next two are
//! offered as alternatives. This is a heuristic, not an optimal solver.

use std::collections::BTreeSet;

use ratify_core::config::AdvisorConfig;
use ratify_core::model::item::{
    AiAssignment, AiEstimate, AssigneeCandidate, EntityType, EstimateBasis, EstimateRange,
    ItemAction, ProposalItem, WorkloadContext,
};
use ratify_core::model::payload::EntityState;
use ratify_core::model::project::{ProjectContext, Task, TeamMember};

const PROVIDED_CONFIDENCE: f64 = 0.8;
const BENCHMARK_CONFIDENCE: f64 = 0.3;
const HISTORICAL_BASE_CONFIDENCE: f64 = 0.4;
const HISTORICAL_STEP_CONFIDENCE: f64 = 0.1;
const HISTORICAL_MAX_CONFIDENCE: f64 = 0.9;
const SPREAD_WHEN_FLAT: f64 = 0.25;
const MAX_ALTERNATIVES: usize = 2;

/// Advice computed for one item.
#[derive(Debug, Clone, PartialEq)]
pub struct Advice {
    pub estimate: Option<AiEstimate>,
    pub assignment: Option<AiAssignment>,
}

/// Read-only advisor over a project snapshot.
#[derive(Debug, Clone, Copy)]
pub struct Advisor<'a> {
    ctx: &'a ProjectContext,
    config: &'a AdvisorConfig,
}

impl<'a> Advisor<'a> {
    #[must_use]
    pub const fn new(ctx: &'a ProjectContext, config: &'a AdvisorConfig) -> Self {
        Self { ctx, config }
    }

    /// Advice for a stored item.
    ///
    /// Only `add` items are advised: modify and remove items already point
    /// at a live entity whose own figures stand. Task adds that do not name
    /// an assignee also get an assignment suggestion.
    #[must_use]
    pub fn advise(&self, item: &ProposalItem) -> Advice {
        if item.action != ItemAction::Add {
            return Advice {
                estimate: None,
                assignment: None,
            };
        }

        let estimate = self.estimate(item.entity_type, item.proposed_state.as_ref());
        let assignment = item
            .proposed_task()
            .filter(|task| task.assignee_id.is_none())
            .map(|_| self.suggest_assignee());

        Advice {
            estimate: Some(estimate),
            assignment,
        }
    }

    /// Hours estimate for a proposed entity.
    #[must_use]
    pub fn estimate(&self, entity_type: EntityType, proposed: Option<&EntityState>) -> AiEstimate {
        if let Some(hours) = proposed
            .and_then(EntityState::as_task)
            .and_then(|task| task.estimated_hours)
            .filter(|hours| hours.is_finite() && *hours >= 0.0)
        {
            return AiEstimate {
                hours,
                confidence: PROVIDED_CONFIDENCE,
                reasoning: format!("Submission states {hours:.1}h"),
                range: EstimateRange {
                    optimistic: hours * (1.0 - SPREAD_WHEN_FLAT),
                    expected: hours,
                    pessimistic: hours * (1.0 + SPREAD_WHEN_FLAT),
                },
                basis: EstimateBasis::Provided,
            };
        }

        if entity_type == EntityType::Task {
            let title = proposed.and_then(EntityState::title).unwrap_or_default();
            if let Some(estimate) = self.historical(title) {
                return estimate;
            }
        }

        self.benchmark(entity_type)
    }

    fn historical(&self, title: &str) -> Option<AiEstimate> {
        let wanted = tokens(title);
        let mut ranked: Vec<(f64, &Task, f64)> = self
            .ctx
            .tasks
            .iter()
            .filter_map(|task| {
                let actual = task.actual_hours.filter(|h| h.is_finite() && *h > 0.0)?;
                Some((jaccard(&wanted, &tokens(&task.title)), task, actual))
            })
            .collect();

        if ranked.is_empty() {
            return None;
        }

        ranked.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.id.cmp(&b.1.id)));
        ranked.truncate(self.config.max_comparables);

        let hours: Vec<f64> = ranked.iter().map(|(_, _, actual)| *actual).collect();
        let sample_size = hours.len();
        #[allow(clippy::cast_precision_loss)]
        let expected = hours.iter().sum::<f64>() / sample_size as f64;
        let mut optimistic = hours.iter().copied().fold(f64::INFINITY, f64::min);
        let mut pessimistic = hours.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if (pessimistic - optimistic).abs() < f64::EPSILON {
            optimistic = expected * (1.0 - SPREAD_WHEN_FLAT);
            pessimistic = expected * (1.0 + SPREAD_WHEN_FLAT);
        }

        #[allow(clippy::cast_precision_loss)]
        let confidence = HISTORICAL_STEP_CONFIDENCE
            .mul_add(sample_size as f64, HISTORICAL_BASE_CONFIDENCE)
            .min(HISTORICAL_MAX_CONFIDENCE);

        let comparable_task_ids: Vec<String> =
            ranked.iter().map(|(_, task, _)| task.id.clone()).collect();

        Some(AiEstimate {
            hours: expected,
            confidence,
            reasoning: format!(
                "Mean actual hours of {sample_size} comparable task(s): {}",
                comparable_task_ids.join(", ")
            ),
            range: EstimateRange {
                optimistic,
                expected,
                pessimistic,
            },
            basis: EstimateBasis::Historical {
                sample_size,
                comparable_task_ids,
            },
        })
    }

    fn benchmark(&self, entity_type: EntityType) -> AiEstimate {
        let hours = match entity_type {
            EntityType::Task => self.config.task_benchmark_hours,
            EntityType::Milestone => self.config.milestone_benchmark_hours,
            EntityType::Assignment | EntityType::Dependency => self.config.other_benchmark_hours,
        };
        AiEstimate {
            hours,
            confidence: BENCHMARK_CONFIDENCE,
            reasoning: format!("No history; {entity_type} benchmark of {hours:.1}h"),
            range: EstimateRange {
                optimistic: hours * 0.5,
                expected: hours,
                pessimistic: hours * 2.0,
            },
            basis: EstimateBasis::Benchmark,
        }
    }

    /// Suggest the least-utilized member, with up to two alternatives.
    ///
    /// Members without capacity cannot take work and are skipped. With no
    /// usable member the suggestion is empty with zero confidence.
    #[must_use]
    pub fn suggest_assignee(&self) -> AiAssignment {
        let mut loads: Vec<(f64, &TeamMember, f64)> = self
            .ctx
            .members
            .iter()
            .filter(|member| member.capacity_hours > 0.0)
            .map(|member| {
                let committed = self.ctx.assigned_hours(&member.id);
                (committed / member.capacity_hours, member, committed)
            })
            .collect();

        if loads.is_empty() {
            let reasoning = if self.ctx.members.is_empty() {
                "Project has no team members"
            } else {
                "No team member has capacity"
            };
            return AiAssignment {
                assignee_id: None,
                confidence: 0.0,
                reasoning: reasoning.to_string(),
                alternatives: Vec::new(),
                workload_context: None,
            };
        }

        loads.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)));

        let (utilization, primary, committed) = loads[0];
        let alternatives = loads
            .iter()
            .skip(1)
            .take(MAX_ALTERNATIVES)
            .map(|(utilization, member, _)| AssigneeCandidate {
                member_id: member.id.clone(),
                name: member.name.clone(),
                utilization: *utilization,
                confidence: assignment_confidence(*utilization),
            })
            .collect();

        AiAssignment {
            assignee_id: Some(primary.id.clone()),
            confidence: assignment_confidence(utilization),
            reasoning: format!(
                "{} has the lowest utilization ({:.0}%) among {} member(s) with capacity",
                primary.name,
                utilization * 100.0,
                loads.len()
            ),
            alternatives,
            workload_context: Some(WorkloadContext {
                current_hours: committed,
                capacity_hours: primary.capacity_hours,
                utilization,
            }),
        }
    }
}

fn assignment_confidence(utilization: f64) -> f64 {
    (1.0 - utilization).clamp(0.1, 0.95)
}

fn tokens(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.chars().count() >= 2)
        .map(str::to_lowercase)
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn jaccard(left: &BTreeSet<String>, right: &BTreeSet<String>) -> f64 {
    let union = left.union(right).count();
    if union == 0 {
        return 0.0;
    }
    left.intersection(right).count() as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratify_core::model::payload::{MilestoneFields, TaskFields};
    use ratify_core::model::project::{Priority, Project, TaskStatus};

    fn member(id: &str, capacity: f64) -> TeamMember {
        TeamMember {
            id: id.into(),
            project_id: "proj".into(),
            name: id.to_uppercase(),
            capacity_hours: capacity,
        }
    }

    fn task(id: &str, title: &str, assignee: Option<&str>, est: f64, actual: Option<f64>) -> Task {
        Task {
            id: id.into(),
            project_id: "proj".into(),
            title: title.into(),
            description: None,
            status: TaskStatus::Todo,
            priority: Priority::Medium,
            assignee_id: assignee.map(str::to_string),
            estimated_hours: Some(est),
            actual_hours: actual,
            start_date: None,
            due_date: None,
            milestone_id: None,
            source_proposal_id: None,
            created_at_us: 0,
            updated_at_us: 0,
        }
    }

    fn ctx(members: Vec<TeamMember>, tasks: Vec<Task>) -> ProjectContext {
        let mut ctx = ProjectContext::empty(Project {
            id: "proj".into(),
            name: "Proj".into(),
            owner_id: "olive".into(),
        });
        ctx.members = members;
        ctx.tasks = tasks;
        ctx
    }

    fn task_state(title: &str, hours: Option<f64>) -> EntityState {
        EntityState::Task(TaskFields {
            title: Some(title.into()),
            estimated_hours: hours,
            ..TaskFields::default()
        })
    }

    #[test]
    fn provided_hours_win() {
        let ctx = ctx(vec![], vec![task("t1", "Write docs", None, 3.0, Some(5.0))]);
        let config = AdvisorConfig::default();
        let estimate = Advisor::new(&ctx, &config)
            .estimate(EntityType::Task, Some(&task_state("Write docs", Some(6.0))));
        assert_eq!(estimate.basis, EstimateBasis::Provided);
        assert!((estimate.hours - 6.0).abs() < f64::EPSILON);
        assert!((estimate.confidence - 0.8).abs() < f64::EPSILON);
        assert!(estimate.range.optimistic < estimate.range.pessimistic);
    }

    #[test]
    fn historical_mean_of_comparables() {
        let ctx = ctx(
            vec![],
            vec![
                task("t1", "Write api docs", None, 3.0, Some(4.0)),
                task("t2", "Write user docs", None, 3.0, Some(8.0)),
                task("t3", "Unrelated thing", None, 3.0, None),
            ],
        );
        let config = AdvisorConfig::default();
        let estimate =
            Advisor::new(&ctx, &config).estimate(EntityType::Task, Some(&task_state("Write docs", None)));

        assert!((estimate.hours - 6.0).abs() < 1e-9);
        assert!((estimate.range.optimistic - 4.0).abs() < 1e-9);
        assert!((estimate.range.pessimistic - 8.0).abs() < 1e-9);
        assert!((estimate.confidence - 0.6).abs() < 1e-9);
        match estimate.basis {
            EstimateBasis::Historical {
                sample_size,
                ref comparable_task_ids,
            } => {
                assert_eq!(sample_size, 2);
                assert_eq!(comparable_task_ids.len(), 2);
            }
            ref other => panic!("expected historical basis, got {other:?}"),
        }
    }

    #[test]
    fn single_comparable_widens_range() {
        let ctx = ctx(vec![], vec![task("t1", "Deploy", None, 3.0, Some(10.0))]);
        let config = AdvisorConfig::default();
        let estimate =
            Advisor::new(&ctx, &config).estimate(EntityType::Task, Some(&task_state("Deploy", None)));
        assert!((estimate.range.optimistic - 7.5).abs() < 1e-9);
        assert!((estimate.range.pessimistic - 12.5).abs() < 1e-9);
    }

    #[test]
    fn comparables_are_capped() {
        let tasks = (0..10)
            .map(|n| task(&format!("t{n:02}"), "Review pull request", None, 1.0, Some(2.0)))
            .collect();
        let ctx = ctx(vec![], tasks);
        let config = AdvisorConfig {
            max_comparables: 3,
            ..AdvisorConfig::default()
        };
        let estimate = Advisor::new(&ctx, &config)
            .estimate(EntityType::Task, Some(&task_state("Review", None)));
        assert!(matches!(
            estimate.basis,
            EstimateBasis::Historical { sample_size: 3, .. }
        ));
        assert!((estimate.confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn benchmark_without_history() {
        let ctx = ctx(vec![], vec![]);
        let config = AdvisorConfig::default();
        let advisor = Advisor::new(&ctx, &config);

        let estimate = advisor.estimate(EntityType::Task, Some(&task_state("Anything", None)));
        assert_eq!(estimate.basis, EstimateBasis::Benchmark);
        assert!((estimate.hours - 8.0).abs() < f64::EPSILON);
        assert!((estimate.range.optimistic - 4.0).abs() < f64::EPSILON);
        assert!((estimate.range.pessimistic - 16.0).abs() < f64::EPSILON);
        assert!((estimate.confidence - 0.3).abs() < f64::EPSILON);

        let milestone = EntityState::Milestone(MilestoneFields {
            title: Some("Beta".into()),
            ..MilestoneFields::default()
        });
        let estimate = advisor.estimate(EntityType::Milestone, Some(&milestone));
        assert!((estimate.hours - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn least_utilized_member_is_suggested() {
        let ctx = ctx(
            vec![member("ana", 40.0), member("ben", 40.0), member("cid", 20.0), member("dee", 40.0)],
            vec![
                task("t1", "A", Some("ana"), 30.0, None),
                task("t2", "B", Some("ben"), 10.0, None),
                task("t3", "C", Some("cid"), 10.0, None),
                task("t4", "D", Some("dee"), 20.0, None),
            ],
        );
        let config = AdvisorConfig::default();
        let assignment = Advisor::new(&ctx, &config).suggest_assignee();

        assert_eq!(assignment.assignee_id.as_deref(), Some("ben"));
        assert!((assignment.confidence - 0.75).abs() < 1e-9);
        let alternatives: Vec<_> = assignment
            .alternatives
            .iter()
            .map(|c| c.member_id.as_str())
            .collect();
        assert_eq!(alternatives, ["cid", "dee"]);
        let context = assignment.workload_context.expect("context");
        assert!((context.current_hours - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn ties_break_by_member_id() {
        let ctx = ctx(vec![member("zed", 10.0), member("amy", 10.0)], vec![]);
        let config = AdvisorConfig::default();
        let assignment = Advisor::new(&ctx, &config).suggest_assignee();
        assert_eq!(assignment.assignee_id.as_deref(), Some("amy"));
        assert!((assignment.confidence - 0.95).abs() < f64::EPSILON);
    }

    #[test]
    fn no_members_yields_empty_assignment() {
        let ctx = ctx(vec![], vec![]);
        let config = AdvisorConfig::default();
        let assignment = Advisor::new(&ctx, &config).suggest_assignee();
        assert!(assignment.assignee_id.is_none());
        assert!(assignment.confidence.abs() < f64::EPSILON);
        assert!(!assignment.reasoning.is_empty());

        let ctx = ctx_with_zero_capacity();
        let assignment = Advisor::new(&ctx, &config).suggest_assignee();
        assert!(assignment.assignee_id.is_none());
        assert_eq!(assignment.reasoning, "No team member has capacity");
    }

    fn ctx_with_zero_capacity() -> ProjectContext {
        ctx(vec![member("idle", 0.0)], vec![])
    }

    #[test]
    fn overloaded_member_gets_floor_confidence() {
        let ctx = ctx(
            vec![member("ana", 10.0)],
            vec![task("t1", "A", Some("ana"), 30.0, None)],
        );
        let config = AdvisorConfig::default();
        let assignment = Advisor::new(&ctx, &config).suggest_assignee();
        assert!((assignment.confidence - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn jaccard_overlap() {
        let a = tokens("Write the API docs");
        let b = tokens("write docs");
        assert!((jaccard(&a, &b) - 0.5).abs() < 1e-9);
        assert!(jaccard(&tokens(""), &tokens("")).abs() < f64::EPSILON);
    }
}
