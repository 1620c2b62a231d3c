//! Planning assumptions layered over the live project snapshot.
//!
//! Assumptions are stored in the proposal metadata under
//! [`METADATA_KEY`] so every later impact recalculation sees the same
//! capacity overrides the reviewer planned with.

use std::collections::BTreeMap;

use ratify_core::error::{RatifyError, Result};
use ratify_core::model::item::{AiAssignment, AiEstimate, ItemAction, ProposalItem, WorkloadContext};
use ratify_core::model::project::ProjectContext;
use ratify_core::model::proposal::Proposal;
use serde::{Deserialize, Serialize};

/// Metadata key holding the serialized [`Assumptions`].
pub const METADATA_KEY: &str = "assumptions";

const LOCKED_CONFIDENCE: f64 = 1.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Assumptions {
    /// Member id to the capacity (hours) assumed instead of the stored one.
    #[serde(default)]
    pub capacity_overrides: BTreeMap<String, f64>,
    /// Item id to the member pinned as its suggested assignee.
    #[serde(default)]
    pub locked_assignments: BTreeMap<String, String>,
    /// Item id to a multiplier (> 0) applied to its estimate and range.
    #[serde(default)]
    pub complexity_adjustments: BTreeMap<String, f64>,
}

impl Assumptions {
    /// Assumptions recorded on `proposal`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`RatifyError::Corrupt`] when the stored value no longer parses.
    pub fn from_metadata(proposal: &Proposal) -> Result<Option<Self>> {
        proposal
            .metadata
            .get(METADATA_KEY)
            .map(|value| serde_json::from_value(value.clone()))
            .transpose()
            .map_err(RatifyError::from)
    }

    /// Check every entry against the snapshot and the proposal's items.
    ///
    /// # Errors
    ///
    /// Returns [`RatifyError::Validation`] naming the first bad entry.
    pub fn validate(&self, ctx: &ProjectContext, items: &[ProposalItem]) -> Result<()> {
        for (member_id, hours) in &self.capacity_overrides {
            let field = format!("capacity_overrides.{member_id}");
            if ctx.member(member_id).is_none() {
                return Err(RatifyError::validation(field, "is not a team member"));
            }
            if !hours.is_finite() || *hours < 0.0 {
                return Err(RatifyError::validation(field, "must be a non-negative number"));
            }
        }

        for (item_id, factor) in &self.complexity_adjustments {
            let field = format!("complexity_adjustments.{item_id}");
            if !items.iter().any(|item| &item.id == item_id) {
                return Err(RatifyError::validation(field, "is not an item of this proposal"));
            }
            if !factor.is_finite() || *factor <= 0.0 {
                return Err(RatifyError::validation(field, "must be greater than zero"));
            }
        }

        for (item_id, member_id) in &self.locked_assignments {
            let field = format!("locked_assignments.{item_id}");
            let Some(item) = items.iter().find(|item| &item.id == item_id) else {
                return Err(RatifyError::validation(field, "is not an item of this proposal"));
            };
            if item.action != ItemAction::Add || item.proposed_task().is_none() {
                return Err(RatifyError::validation(
                    field,
                    "only proposed new tasks take an assignee",
                ));
            }
            if ctx.member(member_id).is_none() {
                return Err(RatifyError::validation(
                    field,
                    format!("{member_id} is not a team member"),
                ));
            }
        }

        Ok(())
    }

    /// Replace member capacities with the overridden values.
    pub fn apply_capacity(&self, ctx: &mut ProjectContext) {
        for member in &mut ctx.members {
            if let Some(hours) = self.capacity_overrides.get(&member.id) {
                member.capacity_hours = *hours;
            }
        }
    }

    /// Scale an estimate by the item's complexity multiplier, if one is set.
    #[must_use]
    pub fn adjust_estimate(&self, item_id: &str, estimate: AiEstimate) -> AiEstimate {
        match self.complexity_adjustments.get(item_id) {
            Some(&factor) if (factor - 1.0).abs() > f64::EPSILON => AiEstimate {
                hours: estimate.hours * factor,
                range: estimate.range.scaled(factor),
                reasoning: format!("{} (complexity x{factor:.2})", estimate.reasoning),
                ..estimate
            },
            _ => estimate,
        }
    }

    /// The pinned assignment for `item_id`, if locked.
    #[must_use]
    pub fn locked_assignment(&self, item_id: &str, ctx: &ProjectContext) -> Option<AiAssignment> {
        let member_id = self.locked_assignments.get(item_id)?;
        let workload_context = ctx.member(member_id).map(|member| {
            let current_hours = ctx.assigned_hours(&member.id);
            WorkloadContext {
                current_hours,
                capacity_hours: member.capacity_hours,
                utilization: if member.capacity_hours > 0.0 {
                    current_hours / member.capacity_hours
                } else {
                    0.0
                },
            }
        });

        Some(AiAssignment {
            assignee_id: Some(member_id.clone()),
            confidence: LOCKED_CONFIDENCE,
            reasoning: format!("Pinned to {member_id} by planning assumption"),
            alternatives: Vec::new(),
            workload_context,
        })
    }
}
