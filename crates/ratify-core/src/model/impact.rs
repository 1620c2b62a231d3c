use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::{fmt, str::FromStr};

use super::ParseEnumError;
use super::item::EntityType;

/// Ordered severity scale shared by conflicts and the overall risk level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// Change in one member's committed hours caused by a proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadShift {
    pub member_id: String,
    pub member_name: String,
    pub current_hours: f64,
    pub proposed_hours: f64,
    pub capacity_hours: f64,
    pub delta_hours: f64,
    /// `None` when the member has no capacity to measure against.
    pub current_utilization: Option<f64>,
    pub proposed_utilization: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlineImpact {
    pub item_id: String,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub title: String,
    pub original_date: NaiveDate,
    pub proposed_date: NaiveDate,
    pub days_shifted: i64,
    pub is_delay: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    OverCapacity,
    OverlappingAssignment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceConflict {
    pub kind: ConflictKind,
    pub member_id: String,
    pub severity: Severity,
    /// Percentage above capacity; only set for over-capacity conflicts.
    pub overage_pct: Option<f64>,
    pub item_ids: Vec<String>,
    pub description: String,
}

/// Derived aggregate describing a proposal's effect on the project.
///
/// Always recomputed from scratch and stored by replacing the previous row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactSummary {
    pub proposal_id: String,
    pub totals_by_action: BTreeMap<String, usize>,
    pub totals_by_entity: BTreeMap<String, usize>,
    pub totals_by_status: BTreeMap<String, usize>,
    pub workload_shifts: Vec<WorkloadShift>,
    pub deadline_impacts: Vec<DeadlineImpact>,
    pub resource_conflicts: Vec<ResourceConflict>,
    pub net_hours: f64,
    pub risk_score: u8,
    pub risk_level: Severity,
    pub calculated_at_us: i64,
}

impl ImpactSummary {
    #[must_use]
    pub fn delayed_count(&self) -> usize {
        self.deadline_impacts.iter().filter(|d| d.is_delay).count()
    }

    #[must_use]
    pub fn conflicts_at(&self, severity: Severity) -> usize {
        self.resource_conflicts
            .iter()
            .filter(|c| c.severity == severity)
            .count()
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match super::normalize(s).as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(ParseEnumError {
                expected: "severity",
                got: s.to_string(),
            }),
        }
    }
}
