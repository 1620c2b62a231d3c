//! Aggregate impact of a proposal on the live project.
//!
//! The calculator is pure: the same items, snapshot, policy and clock give
//! the same summary. All maps are ordered and every output list is sorted,
//! so summaries compare and serialize stably.
//!
//! # Workload model
//!
//! Rejected items are left out of the proposed view. The hours an item
//! carries are its proposed `estimated_hours`, else the advisor's estimate,
//! else the live task's own estimate. The assignee is the proposed one, else
//! the advisor's suggestion.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use ratify_core::config::{ImpactPolicy, RiskWeights};
use ratify_core::model::impact::{
    ConflictKind, DeadlineImpact, ImpactSummary, ResourceConflict, Severity, WorkloadShift,
};
use ratify_core::model::item::{ApprovalStatus, EntityType, ItemAction, ProposalItem};
use ratify_core::model::payload::EntityState;
use ratify_core::model::project::{ProjectContext, Task, TaskStatus};

const HOURS_EPSILON: f64 = 1e-9;

/// Computes [`ImpactSummary`] values under one policy.
#[derive(Debug, Clone, Copy)]
pub struct ImpactCalculator<'a> {
    policy: &'a ImpactPolicy,
}

#[derive(Default)]
struct Ledger {
    delta: BTreeMap<String, f64>,
    items: BTreeMap<String, BTreeSet<String>>,
    net_hours: f64,
}

impl Ledger {
    fn shift(&mut self, member: Option<&str>, hours: f64, item_id: &str) {
        let Some(member) = member else {
            return;
        };
        *self.delta.entry(member.to_string()).or_default() += hours;
        self.items
            .entry(member.to_string())
            .or_default()
            .insert(item_id.to_string());
    }
}

/// A task item's schedule window for overlap detection.
struct Window<'i> {
    item_id: &'i str,
    assignee: String,
    start: NaiveDate,
    due: NaiveDate,
}

impl<'a> ImpactCalculator<'a> {
    #[must_use]
    pub const fn new(policy: &'a ImpactPolicy) -> Self {
        Self { policy }
    }

    /// Summarize `items` against the snapshot `ctx`.
    #[must_use]
    pub fn calculate(
        &self,
        proposal_id: &str,
        items: &[ProposalItem],
        ctx: &ProjectContext,
        now_us: i64,
    ) -> ImpactSummary {
        let mut ordered: Vec<&ProposalItem> = items.iter().collect();
        ordered.sort_by(|a, b| a.sequence.cmp(&b.sequence).then_with(|| a.id.cmp(&b.id)));

        let mut totals_by_action = BTreeMap::new();
        let mut totals_by_entity = BTreeMap::new();
        let mut totals_by_status = BTreeMap::new();
        for item in &ordered {
            *totals_by_action
                .entry(item.action.as_str().to_string())
                .or_insert(0) += 1;
            *totals_by_entity
                .entry(item.entity_type.as_str().to_string())
                .or_insert(0) += 1;
            *totals_by_status
                .entry(item.approval_status.as_str().to_string())
                .or_insert(0) += 1;
        }

        let live: Vec<&ProposalItem> = ordered
            .iter()
            .copied()
            .filter(|item| item.approval_status != ApprovalStatus::Rejected)
            .collect();

        let mut ledger = Ledger::default();
        for item in &live {
            record_workload(&mut ledger, item, ctx);
        }

        let workload_shifts = shifts(&ledger, ctx);
        let mut resource_conflicts = self.over_capacity(&workload_shifts, &ledger);
        resource_conflicts.extend(self.overlaps(&live, ctx));
        resource_conflicts.sort_by(|a, b| {
            conflict_rank(a.kind)
                .cmp(&conflict_rank(b.kind))
                .then_with(|| a.member_id.cmp(&b.member_id))
                .then_with(|| a.item_ids.cmp(&b.item_ids))
        });

        let deadline_impacts: Vec<DeadlineImpact> = live
            .iter()
            .filter_map(|item| deadline_impact(item, ctx))
            .collect();

        let severities: Vec<Severity> = resource_conflicts.iter().map(|c| c.severity).collect();
        let delayed = deadline_impacts.iter().filter(|d| d.is_delay).count();
        let net_hours = if ledger.net_hours.abs() < HOURS_EPSILON {
            0.0
        } else {
            ledger.net_hours
        };
        let score = risk_score(&severities, delayed, net_hours, &self.policy.weights);

        ImpactSummary {
            proposal_id: proposal_id.to_string(),
            totals_by_action,
            totals_by_entity,
            totals_by_status,
            workload_shifts,
            deadline_impacts,
            resource_conflicts,
            net_hours,
            risk_score: score,
            risk_level: risk_level(score),
            calculated_at_us: now_us,
        }
    }

    fn over_capacity(&self, shifts: &[WorkloadShift], ledger: &Ledger) -> Vec<ResourceConflict> {
        shifts
            .iter()
            .filter(|shift| shift.proposed_hours > shift.capacity_hours + HOURS_EPSILON)
            .map(|shift| {
                let (overage_pct, severity) = if shift.capacity_hours > 0.0 {
                    let pct = (shift.proposed_hours / shift.capacity_hours - 1.0) * 100.0;
                    (Some(pct), self.policy.severity_for_overage(pct))
                } else {
                    (None, Severity::Critical)
                };
                ResourceConflict {
                    kind: ConflictKind::OverCapacity,
                    member_id: shift.member_id.clone(),
                    severity,
                    overage_pct,
                    item_ids: ledger
                        .items
                        .get(&shift.member_id)
                        .map(|ids| ids.iter().cloned().collect())
                        .unwrap_or_default(),
                    description: format!(
                        "{} would carry {:.1}h against {:.1}h capacity",
                        shift.member_name, shift.proposed_hours, shift.capacity_hours
                    ),
                }
            })
            .collect()
    }

    fn overlaps(&self, items: &[&ProposalItem], ctx: &ProjectContext) -> Vec<ResourceConflict> {
        let windows: Vec<Window<'_>> = items
            .iter()
            .filter_map(|item| task_window(item, ctx))
            .collect();

        let mut conflicts = Vec::new();
        for (i, left) in windows.iter().enumerate() {
            for right in &windows[i + 1..] {
                if left.assignee != right.assignee {
                    continue;
                }
                if left.start <= right.due && right.start <= left.due {
                    let mut item_ids = vec![left.item_id.to_string(), right.item_id.to_string()];
                    item_ids.sort();
                    conflicts.push(ResourceConflict {
                        kind: ConflictKind::OverlappingAssignment,
                        member_id: left.assignee.clone(),
                        severity: self.policy.overlap_severity,
                        overage_pct: None,
                        item_ids,
                        description: format!(
                            "{} has overlapping work {}..{} and {}..{}",
                            left.assignee, left.start, left.due, right.start, right.due
                        ),
                    });
                }
            }
        }
        conflicts
    }
}

fn shifts(ledger: &Ledger, ctx: &ProjectContext) -> Vec<WorkloadShift> {
    ledger
        .delta
        .iter()
        .filter(|(_, delta)| delta.abs() >= HOURS_EPSILON)
        .filter_map(|(member_id, delta)| {
            let Some(member) = ctx.member(member_id) else {
                tracing::debug!(member_id = %member_id, "assignee is not a team member");
                return None;
            };
            let current = ctx.assigned_hours(member_id);
            let proposed = current + delta;
            Some(WorkloadShift {
                member_id: member_id.clone(),
                member_name: member.name.clone(),
                current_hours: current,
                proposed_hours: proposed,
                capacity_hours: member.capacity_hours,
                delta_hours: *delta,
                current_utilization: utilization(current, member.capacity_hours),
                proposed_utilization: utilization(proposed, member.capacity_hours),
            })
        })
        .collect()
}

/// Combine conflict severities, delays and added hours into a 0-100 score.
///
/// Non-decreasing in every conflict's severity as long as the weights are
/// ordered, which [`ratify_core::config::ProjectConfig::validate`] enforces.
#[must_use]
pub fn risk_score(
    severities: &[Severity],
    delayed_deadlines: usize,
    net_hours: f64,
    weights: &RiskWeights,
) -> u8 {
    let conflicts: f64 = severities.iter().map(|s| weights.for_severity(*s)).sum();
    #[allow(clippy::cast_precision_loss)]
    let delays = delayed_deadlines as f64 * weights.delayed_deadline;
    let growth = (net_hours.max(0.0) * weights.net_hours).min(weights.net_hours_cap);

    let raw = (conflicts + delays + growth).round().clamp(0.0, 100.0);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    {
        raw as u8
    }
}

/// Label a score: below 25 low, below 50 medium, below 75 high.
#[must_use]
pub const fn risk_level(score: u8) -> Severity {
    match score {
        0..25 => Severity::Low,
        25..50 => Severity::Medium,
        50..75 => Severity::High,
        _ => Severity::Critical,
    }
}

const fn conflict_rank(kind: ConflictKind) -> u8 {
    match kind {
        ConflictKind::OverCapacity => 0,
        ConflictKind::OverlappingAssignment => 1,
    }
}

fn utilization(hours: f64, capacity: f64) -> Option<f64> {
    (capacity > 0.0).then(|| hours / capacity)
}

/// Hours a task currently counts toward its assignee's load.
fn committed_hours(task: &Task) -> f64 {
    if task.status == TaskStatus::Done {
        0.0
    } else {
        task.estimated_hours.unwrap_or(0.0)
    }
}

fn item_hours(item: &ProposalItem, live: Option<&Task>) -> f64 {
    item.proposed_task()
        .and_then(|task| task.estimated_hours)
        .or_else(|| item.ai_estimate.as_ref().map(|estimate| estimate.hours))
        .or_else(|| live.and_then(|task| task.estimated_hours))
        .unwrap_or(0.0)
}

fn proposed_assignee(item: &ProposalItem) -> Option<String> {
    item.proposed_task()
        .and_then(|task| task.assignee_id.clone())
        .or_else(|| {
            item.ai_assignment
                .as_ref()
                .and_then(|assignment| assignment.assignee_id.clone())
        })
}

fn record_workload(ledger: &mut Ledger, item: &ProposalItem, ctx: &ProjectContext) {
    let live = item.entity_id.as_deref().and_then(|id| ctx.task(id));

    match (item.action, item.entity_type) {
        (ItemAction::Add, EntityType::Task) => {
            let hours = item_hours(item, None);
            ledger.net_hours += hours;
            ledger.shift(proposed_assignee(item).as_deref(), hours, &item.id);
        }
        (ItemAction::Modify, EntityType::Task) => {
            let Some(task) = live else {
                return;
            };
            let old_hours = committed_hours(task);
            let patch = item.proposed_task();
            let done = patch.and_then(|p| p.status).unwrap_or(task.status) == TaskStatus::Done;
            let new_hours = if done { 0.0 } else { item_hours(item, Some(task)) };
            let new_assignee = patch
                .and_then(|p| p.assignee_id.clone())
                .or_else(|| task.assignee_id.clone());

            ledger.net_hours += new_hours - old_hours;
            ledger.shift(task.assignee_id.as_deref(), -old_hours, &item.id);
            ledger.shift(new_assignee.as_deref(), new_hours, &item.id);
        }
        (ItemAction::Remove, EntityType::Task) => {
            let Some(task) = live else {
                return;
            };
            let hours = committed_hours(task);
            ledger.net_hours -= hours;
            ledger.shift(task.assignee_id.as_deref(), -hours, &item.id);
        }
        (action, EntityType::Assignment) => {
            let fields = item
                .proposed_state
                .as_ref()
                .and_then(EntityState::as_assignment);
            let task_id = fields
                .and_then(|f| f.task_id.as_deref())
                .or(item.entity_id.as_deref());
            let Some(task) = task_id.and_then(|id| ctx.task(id)) else {
                return;
            };
            let hours = committed_hours(task);
            let new_assignee = match action {
                ItemAction::Remove => None,
                ItemAction::Add | ItemAction::Modify => {
                    fields.and_then(|f| f.assignee_id.as_deref())
                }
            };
            if new_assignee == task.assignee_id.as_deref() {
                return;
            }
            ledger.shift(task.assignee_id.as_deref(), -hours, &item.id);
            ledger.shift(new_assignee, hours, &item.id);
        }
        _ => {}
    }
}

fn task_window<'i>(item: &'i ProposalItem, ctx: &ProjectContext) -> Option<Window<'i>> {
    if item.entity_type != EntityType::Task || item.action == ItemAction::Remove {
        return None;
    }
    let patch = item.proposed_task();
    let live = item.entity_id.as_deref().and_then(|id| ctx.task(id));

    let assignee = proposed_assignee(item).or_else(|| live.and_then(|t| t.assignee_id.clone()))?;
    let start = patch
        .and_then(|p| p.start_date)
        .or_else(|| live.and_then(|t| t.start_date));
    let due = patch
        .and_then(|p| p.due_date)
        .or_else(|| live.and_then(|t| t.due_date));

    let (start, due) = match (start, due) {
        (Some(start), Some(due)) => (start, due),
        (Some(day), None) | (None, Some(day)) => (day, day),
        (None, None) => return None,
    };
    Some(Window {
        item_id: &item.id,
        assignee,
        start: start.min(due),
        due: start.max(due),
    })
}

fn deadline_impact(item: &ProposalItem, ctx: &ProjectContext) -> Option<DeadlineImpact> {
    if item.action != ItemAction::Modify {
        return None;
    }
    let entity_id = item.entity_id.as_deref()?;
    let proposed = item.proposed_state.as_ref()?.due_date()?;

    let (original, live_title) = match item.entity_type {
        EntityType::Task => {
            let live = ctx.task(entity_id);
            (live.and_then(|t| t.due_date), live.map(|t| t.title.clone()))
        }
        EntityType::Milestone => {
            let live = ctx.milestone(entity_id);
            (live.and_then(|m| m.due_date), live.map(|m| m.title.clone()))
        }
        EntityType::Assignment | EntityType::Dependency => return None,
    };
    let original = item
        .previous_state
        .as_ref()
        .and_then(EntityState::due_date)
        .or(original)?;
    if original == proposed {
        return None;
    }

    let title = item
        .proposed_state
        .as_ref()
        .and_then(EntityState::title)
        .map(str::to_string)
        .or(live_title)
        .unwrap_or_else(|| entity_id.to_string());

    Some(DeadlineImpact {
        item_id: item.id.clone(),
        entity_type: item.entity_type,
        entity_id: entity_id.to_string(),
        title,
        original_date: original,
        proposed_date: proposed,
        days_shifted: (proposed - original).num_days(),
        is_delay: proposed > original,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratify_core::model::item::{AiAssignment, AiEstimate, EstimateBasis, EstimateRange};
    use ratify_core::model::payload::{AssignmentFields, MilestoneFields, TaskFields};
    use ratify_core::model::project::{Milestone, MilestoneStatus, Priority, Project, TeamMember};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn member(id: &str, capacity: f64) -> TeamMember {
        TeamMember {
            id: id.into(),
            project_id: "proj".into(),
            name: id.into(),
            capacity_hours: capacity,
        }
    }

    fn live_task(id: &str, assignee: Option<&str>, hours: f64) -> Task {
        Task {
            id: id.into(),
            project_id: "proj".into(),
            title: format!("Live {id}"),
            description: None,
            status: TaskStatus::Todo,
            priority: Priority::Medium,
            assignee_id: assignee.map(str::to_string),
            estimated_hours: Some(hours),
            actual_hours: None,
            start_date: None,
            due_date: Some(date(2026, 5, 1)),
            milestone_id: None,
            source_proposal_id: None,
            created_at_us: 0,
            updated_at_us: 0,
        }
    }

    fn context() -> ProjectContext {
        let mut ctx = ProjectContext::empty(Project {
            id: "proj".into(),
            name: "Proj".into(),
            owner_id: "olive".into(),
        });
        ctx.members = vec![member("ana", 40.0), member("ben", 20.0)];
        ctx.tasks = vec![live_task("task-1", Some("ana"), 30.0)];
        ctx.milestones = vec![Milestone {
            id: "ms-1".into(),
            project_id: "proj".into(),
            title: "Beta".into(),
            description: None,
            status: MilestoneStatus::Planned,
            due_date: Some(date(2026, 6, 1)),
            source_proposal_id: None,
            created_at_us: 0,
            updated_at_us: 0,
        }];
        ctx
    }

    fn item(id: &str, seq: i64, action: ItemAction, state: EntityState) -> ProposalItem {
        ProposalItem {
            id: id.into(),
            proposal_id: "pr-1".into(),
            sequence: seq,
            action,
            entity_type: state.entity_type(),
            entity_id: None,
            proposed_state: Some(state),
            previous_state: None,
            approval_status: ApprovalStatus::Pending,
            ai_estimate: None,
            ai_assignment: None,
            reviewer_notes: None,
            reviewed_by: None,
            reviewed_at_us: None,
            applied_at_us: None,
            applied_entity_id: None,
            created_at_us: 0,
            updated_at_us: 0,
        }
    }

    fn add_task(id: &str, seq: i64, assignee: Option<&str>, hours: Option<f64>) -> ProposalItem {
        item(
            id,
            seq,
            ItemAction::Add,
            EntityState::Task(TaskFields {
                title: Some(format!("New {id}")),
                assignee_id: assignee.map(str::to_string),
                estimated_hours: hours,
                ..TaskFields::default()
            }),
        )
    }

    fn calc(items: &[ProposalItem]) -> ImpactSummary {
        let policy = ImpactPolicy::default();
        ImpactCalculator::new(&policy).calculate("pr-1", items, &context(), 42)
    }

    #[test]
    fn counts_partition_all_items() {
        let mut rejected = add_task("pi-2", 2, Some("ben"), Some(2.0));
        rejected.approval_status = ApprovalStatus::Rejected;
        let summary = calc(&[add_task("pi-1", 1, Some("ben"), Some(2.0)), rejected]);

        assert_eq!(summary.totals_by_action.get("add"), Some(&2));
        assert_eq!(summary.totals_by_entity.get("task"), Some(&2));
        assert_eq!(summary.totals_by_status.get("pending"), Some(&1));
        assert_eq!(summary.totals_by_status.get("rejected"), Some(&1));
        assert_eq!(summary.calculated_at_us, 42);
    }

    #[test]
    fn rejected_items_do_not_shift_workload() {
        let mut rejected = add_task("pi-1", 1, Some("ben"), Some(50.0));
        rejected.approval_status = ApprovalStatus::Rejected;
        let summary = calc(&[rejected]);
        assert!(summary.workload_shifts.is_empty());
        assert!(summary.resource_conflicts.is_empty());
        assert_eq!(summary.risk_score, 0);
        assert_eq!(summary.risk_level, Severity::Low);
    }

    #[test]
    fn add_task_over_capacity_is_a_conflict() {
        // ana: 30h committed of 40h, +15h -> 45h = 12.5% over -> medium
        let summary = calc(&[add_task("pi-1", 1, Some("ana"), Some(15.0))]);

        assert_eq!(summary.workload_shifts.len(), 1);
        let shift = &summary.workload_shifts[0];
        assert!((shift.current_hours - 30.0).abs() < 1e-9);
        assert!((shift.proposed_hours - 45.0).abs() < 1e-9);
        assert_eq!(shift.proposed_utilization.map(|u| (u * 1000.0).round()), Some(1125.0));

        assert_eq!(summary.resource_conflicts.len(), 1);
        let conflict = &summary.resource_conflicts[0];
        assert_eq!(conflict.kind, ConflictKind::OverCapacity);
        assert_eq!(conflict.severity, Severity::Medium);
        assert_eq!(conflict.item_ids, vec!["pi-1".to_string()]);

        // medium conflict 5 + min(15 * 0.5, 30) = 12.5 -> 13
        assert!((summary.net_hours - 15.0).abs() < 1e-9);
        assert_eq!(summary.risk_score, 13);
    }

    #[test]
    fn advisor_estimate_and_assignment_are_used() {
        let mut add = add_task("pi-1", 1, None, None);
        add.ai_estimate = Some(AiEstimate {
            hours: 6.0,
            confidence: 0.3,
            reasoning: String::new(),
            range: EstimateRange {
                optimistic: 3.0,
                expected: 6.0,
                pessimistic: 12.0,
            },
            basis: EstimateBasis::Benchmark,
        });
        add.ai_assignment = Some(AiAssignment {
            assignee_id: Some("ben".into()),
            confidence: 0.9,
            reasoning: String::new(),
            alternatives: Vec::new(),
            workload_context: None,
        });
        let summary = calc(&[add]);
        assert_eq!(summary.workload_shifts[0].member_id, "ben");
        assert!((summary.workload_shifts[0].delta_hours - 6.0).abs() < 1e-9);
    }

    #[test]
    fn reassignment_moves_hours_between_members() {
        let mut reassign = item(
            "pi-1",
            1,
            ItemAction::Modify,
            EntityState::Assignment(AssignmentFields {
                task_id: Some("task-1".into()),
                assignee_id: Some("ben".into()),
            }),
        );
        reassign.entity_id = Some("task-1".into());
        let summary = calc(&[reassign]);

        let deltas: Vec<_> = summary
            .workload_shifts
            .iter()
            .map(|s| (s.member_id.as_str(), s.delta_hours))
            .collect();
        assert_eq!(deltas, [("ana", -30.0), ("ben", 30.0)]);
        // ben: 30h against 20h = 50% over -> high
        assert_eq!(summary.resource_conflicts[0].severity, Severity::High);
        assert!(summary.net_hours.abs() < f64::EPSILON);
    }

    #[test]
    fn removing_task_frees_hours() {
        let mut remove = item(
            "pi-1",
            1,
            ItemAction::Remove,
            EntityState::Task(TaskFields::default()),
        );
        remove.entity_id = Some("task-1".into());
        let summary = calc(&[remove]);
        assert!((summary.net_hours + 30.0).abs() < 1e-9);
        assert_eq!(summary.workload_shifts[0].member_id, "ana");
        assert!(summary.resource_conflicts.is_empty());
        assert_eq!(summary.risk_score, 0);
    }

    #[test]
    fn delayed_deadline_is_reported_and_scored() {
        let mut delay = item(
            "pi-1",
            1,
            ItemAction::Modify,
            EntityState::Milestone(MilestoneFields {
                due_date: Some(date(2026, 6, 11)),
                ..MilestoneFields::default()
            }),
        );
        delay.entity_id = Some("ms-1".into());
        let mut pull_in = item(
            "pi-2",
            2,
            ItemAction::Modify,
            EntityState::Task(TaskFields {
                due_date: Some(date(2026, 4, 28)),
                ..TaskFields::default()
            }),
        );
        pull_in.entity_id = Some("task-1".into());

        let summary = calc(&[delay, pull_in]);
        assert_eq!(summary.deadline_impacts.len(), 2);
        let first = &summary.deadline_impacts[0];
        assert_eq!(first.title, "Beta");
        assert_eq!(first.days_shifted, 10);
        assert!(first.is_delay);
        let second = &summary.deadline_impacts[1];
        assert_eq!(second.days_shifted, -3);
        assert!(!second.is_delay);
        assert_eq!(summary.delayed_count(), 1);
        assert_eq!(summary.risk_score, 8);
    }

    #[test]
    fn overlapping_windows_for_same_member_conflict() {
        let dated = |id: &str, seq: i64, start: NaiveDate, due: NaiveDate| {
            item(
                id,
                seq,
                ItemAction::Add,
                EntityState::Task(TaskFields {
                    title: Some(id.into()),
                    assignee_id: Some("ben".into()),
                    estimated_hours: Some(1.0),
                    start_date: Some(start),
                    due_date: Some(due),
                    ..TaskFields::default()
                }),
            )
        };
        let summary = calc(&[
            dated("pi-1", 1, date(2026, 3, 1), date(2026, 3, 10)),
            dated("pi-2", 2, date(2026, 3, 10), date(2026, 3, 12)),
            dated("pi-3", 3, date(2026, 4, 1), date(2026, 4, 2)),
        ]);

        let overlaps: Vec<_> = summary
            .resource_conflicts
            .iter()
            .filter(|c| c.kind == ConflictKind::OverlappingAssignment)
            .collect();
        assert_eq!(overlaps.len(), 1);
        assert_eq!(overlaps[0].item_ids, ["pi-1", "pi-2"]);
        assert_eq!(overlaps[0].severity, Severity::Medium);
    }

    #[test]
    fn risk_is_clamped_and_levelled() {
        let weights = RiskWeights::default();
        let many = vec![Severity::Critical; 10];
        assert_eq!(risk_score(&many, 0, 0.0, &weights), 100);
        assert_eq!(risk_score(&[], 0, 1000.0, &weights), 30);
        assert_eq!(risk_score(&[], 0, -50.0, &weights), 0);

        assert_eq!(risk_level(0), Severity::Low);
        assert_eq!(risk_level(24), Severity::Low);
        assert_eq!(risk_level(25), Severity::Medium);
        assert_eq!(risk_level(50), Severity::High);
        assert_eq!(risk_level(75), Severity::Critical);
        assert_eq!(risk_level(100), Severity::Critical);
    }

    #[test]
    fn zero_capacity_member_is_critical() {
        let mut ctx = context();
        ctx.members.push(member("cal", 0.0));
        let policy = ImpactPolicy::default();
        let summary = ImpactCalculator::new(&policy).calculate(
            "pr-1",
            &[add_task("pi-1", 1, Some("cal"), Some(1.0))],
            &ctx,
            0,
        );
        let conflict = &summary.resource_conflicts[0];
        assert_eq!(conflict.severity, Severity::Critical);
        assert!(conflict.overage_pct.is_none());
        assert!(summary.workload_shifts[0].proposed_utilization.is_none());
        serde_json::to_string(&summary).expect("summary serializes");
    }
}
