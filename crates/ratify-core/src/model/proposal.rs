use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::{fmt, str::FromStr};

use super::ParseEnumError;
use super::item::ApprovalStatus;
use crate::error::{RatifyError, Result};

/// Lifecycle of a proposal.
///
/// Discarding is not a state: a discarded proposal is deleted together
/// with its items and impact summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Draft,
    PendingReview,
    Approved,
    Rejected,
    PartiallyApproved,
    Applied,
    Archived,
}

impl ProposalStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::PendingReview => "pending_review",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::PartiallyApproved => "partially_approved",
            Self::Applied => "applied",
            Self::Archived => "archived",
        }
    }

    /// Validate whether a transition from self to `target` is allowed.
    ///
    /// Valid transitions:
    /// - `draft -> pending_review`
    /// - `pending_review -> approved | rejected | partially_approved`
    /// - `approved -> applied`
    /// - `partially_approved -> applied`
    /// - `applied -> archived`
    /// - `rejected -> archived`
    ///
    /// # Errors
    ///
    /// Returns [`RatifyError::InvalidTransition`] naming the attempted edge.
    pub fn can_transition_to(self, target: Self) -> Result<()> {
        if self == target {
            return Err(RatifyError::transition(
                self,
                target,
                "no-op transition is not allowed",
            ));
        }

        let allowed = matches!(
            (self, target),
            (Self::Draft, Self::PendingReview)
                | (
                    Self::PendingReview,
                    Self::Approved | Self::Rejected | Self::PartiallyApproved
                )
                | (Self::Approved | Self::PartiallyApproved, Self::Applied)
                | (Self::Applied | Self::Rejected, Self::Archived)
        );

        if allowed {
            Ok(())
        } else {
            Err(RatifyError::transition(
                self,
                target,
                "transition not allowed by proposal lifecycle",
            ))
        }
    }

    /// Whether approved items of a proposal in this state may be merged.
    #[must_use]
    pub const fn is_mergeable(self) -> bool {
        matches!(self, Self::Approved | Self::PartiallyApproved)
    }

    /// Whether the owner may still discard the proposal.
    #[must_use]
    pub const fn is_discardable(self) -> bool {
        matches!(self, Self::Draft | Self::PendingReview)
    }

    /// Whether every item has received a final decision.
    #[must_use]
    pub const fn is_resolved(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::PartiallyApproved)
    }
}

/// Derive the aggregate proposal status from the statuses of its items.
///
/// Pure and order-independent: the same multiset of item statuses always
/// yields the same result. Items that are pending or waiting on discussion
/// keep the proposal in review.
#[must_use]
pub fn derive_status<I>(statuses: I) -> ProposalStatus
where
    I: IntoIterator<Item = ApprovalStatus>,
{
    let mut approved = 0usize;
    let mut rejected = 0usize;

    for status in statuses {
        match status {
            ApprovalStatus::Pending | ApprovalStatus::NeedsDiscussion => {
                return ProposalStatus::PendingReview;
            }
            ApprovalStatus::Approved => approved += 1,
            ApprovalStatus::Rejected => rejected += 1,
        }
    }

    match (approved, rejected) {
        (0, 0) => ProposalStatus::PendingReview,
        (_, 0) => ProposalStatus::Approved,
        (0, _) => ProposalStatus::Rejected,
        _ => ProposalStatus::PartiallyApproved,
    }
}

/// How the proposal content reached the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Voice,
    Text,
    File,
    Api,
}

impl SourceType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Voice => "voice",
            Self::Text => "text",
            Self::File => "file",
            Self::Api => "api",
        }
    }
}

/// A batch of proposed changes to one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: String,
    pub project_id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: ProposalStatus,
    pub owner_id: String,
    pub approver_id: Option<String>,
    pub source_type: SourceType,
    pub source_content: Option<String>,
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub created_at_us: i64,
    pub updated_at_us: i64,
    pub submitted_at_us: Option<i64>,
    pub resolved_at_us: Option<i64>,
    pub merged_at_us: Option<i64>,
}

impl Proposal {
    #[must_use]
    pub fn is_owner(&self, actor: &str) -> bool {
        self.owner_id == actor
    }

    #[must_use]
    pub fn is_approver(&self, actor: &str) -> bool {
        self.approver_id.as_deref() == Some(actor)
    }
}

/// Input for creating a draft proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProposal {
    pub owner_id: String,
    pub project_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub source_type: SourceType,
    #[serde(default)]
    pub source_content: Option<String>,
    #[serde(default)]
    pub approver_id: Option<String>,
}

impl NewProposal {
    /// Check field-level constraints before anything is written.
    ///
    /// # Errors
    ///
    /// Returns [`RatifyError::Validation`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(RatifyError::validation("title", "must not be empty"));
        }
        if self.title.chars().count() > super::MAX_TITLE_CHARS {
            return Err(RatifyError::validation(
                "title",
                format!("must be <= {} characters", super::MAX_TITLE_CHARS),
            ));
        }
        if self.owner_id.trim().is_empty() {
            return Err(RatifyError::validation("owner_id", "must not be empty"));
        }
        if self.project_id.trim().is_empty() {
            return Err(RatifyError::validation("project_id", "must not be empty"));
        }
        Ok(())
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProposalStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match super::normalize(s).as_str() {
            "draft" => Ok(Self::Draft),
            "pending_review" => Ok(Self::PendingReview),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "partially_approved" => Ok(Self::PartiallyApproved),
            "applied" => Ok(Self::Applied),
            "archived" => Ok(Self::Archived),
            _ => Err(ParseEnumError {
                expected: "proposal status",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for SourceType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match super::normalize(s).as_str() {
            "voice" => Ok(Self::Voice),
            "text" => Ok(Self::Text),
            "file" => Ok(Self::File),
            "api" => Ok(Self::Api),
            _ => Err(ParseEnumError {
                expected: "source type",
                got: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ApprovalStatus::{Approved, NeedsDiscussion, Pending, Rejected};

    #[test]
    fn derivation_matches_documented_cases() {
        assert_eq!(derive_status([Approved, Approved]), ProposalStatus::Approved);
        assert_eq!(
            derive_status([Approved, Rejected]),
            ProposalStatus::PartiallyApproved
        );
        assert_eq!(
            derive_status([Pending, Approved]),
            ProposalStatus::PendingReview
        );
        assert_eq!(derive_status([Rejected]), ProposalStatus::Rejected);
    }

    #[test]
    fn needs_discussion_keeps_proposal_in_review() {
        assert_eq!(
            derive_status([Approved, NeedsDiscussion]),
            ProposalStatus::PendingReview
        );
    }

    #[test]
    fn empty_item_set_stays_in_review() {
        assert_eq!(derive_status([]), ProposalStatus::PendingReview);
    }

    #[test]
    fn forward_edges_are_allowed() {
        use ProposalStatus as S;
        for (from, to) in [
            (S::Draft, S::PendingReview),
            (S::PendingReview, S::Approved),
            (S::PendingReview, S::Rejected),
            (S::PendingReview, S::PartiallyApproved),
            (S::Approved, S::Applied),
            (S::PartiallyApproved, S::Applied),
            (S::Applied, S::Archived),
            (S::Rejected, S::Archived),
        ] {
            assert!(from.can_transition_to(to).is_ok(), "{from} -> {to}");
        }
    }

    #[test]
    fn backward_and_skipping_edges_are_rejected() {
        use ProposalStatus as S;
        for (from, to) in [
            (S::PendingReview, S::Draft),
            (S::Draft, S::Approved),
            (S::Rejected, S::Applied),
            (S::Applied, S::Approved),
            (S::Archived, S::Draft),
            (S::Draft, S::Draft),
        ] {
            let err = from.can_transition_to(to).expect_err("edge must be illegal");
            assert!(
                err.to_string().contains(&format!("{from} -> {to}")),
                "error should name the edge: {err}"
            );
        }
    }

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            ProposalStatus::Draft,
            ProposalStatus::PendingReview,
            ProposalStatus::PartiallyApproved,
            ProposalStatus::Archived,
        ] {
            assert_eq!(status.as_str().parse::<ProposalStatus>(), Ok(status));
        }
        assert!("merged".parse::<ProposalStatus>().is_err());
    }

    #[test]
    fn new_proposal_requires_title() {
        let input = NewProposal {
            owner_id: "alice".into(),
            project_id: "proj-1".into(),
            title: "   ".into(),
            description: None,
            source_type: SourceType::Text,
            source_content: None,
            approver_id: None,
        };
        let err = input.validate().expect_err("blank title is invalid");
        assert!(matches!(err, RatifyError::Validation { ref field, .. } if field == "title"));
    }
}
