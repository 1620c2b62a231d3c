//! The proposal lifecycle service.
//!
//! # Locking
//!
//! Every operation opens its own connection. Operations that move a
//! proposal or its items through the lifecycle take the per-proposal
//! [`ProposalLock`] first and then do all reads, checks and writes inside a
//! single `BEGIN IMMEDIATE` transaction, so a failed check leaves nothing
//! behind. Impact recalculation runs after the commit as the last write; a
//! failure there is logged and never undoes the transition.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ratify_core::config::{ProjectConfig, WORKSPACE_DIR};
use ratify_core::db::{self, query, write};
use ratify_core::error::{RatifyError, Result};
use ratify_core::id::{self, ITEM_PREFIX, PROPOSAL_PREFIX, new_id, now_us};
use ratify_core::lock::{DEFAULT_LOCK_TIMEOUT, ProposalLock};
use ratify_core::model::discussion::ThreadRef;
use ratify_core::model::impact::ImpactSummary;
use ratify_core::model::item::{ApprovalStatus, NewItem, ProposalItem, ReviewDecision};
use ratify_core::model::project::ProjectContext;
use ratify_core::model::proposal::{NewProposal, Proposal, ProposalStatus, derive_status};
use ratify_impact::{Advisor, ImpactCalculator};
use rusqlite::Connection;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::assumptions::{Assumptions, METADATA_KEY};
use crate::provider::{self, ContentProvider, Extraction, NoProvider};
use crate::targets;

pub use ratify_core::db::query::ProposalFilter;

/// Metadata key recording how the last content processing went.
pub const EXTRACTION_KEY: &str = "extraction";

/// Entry point for every proposal operation.
///
/// Cheap to share: it holds paths, configuration and the provider, never a
/// connection.
pub struct ProposalService {
    store_path: PathBuf,
    lock_dir: PathBuf,
    config: ProjectConfig,
    provider: Arc<dyn ContentProvider>,
    lock_timeout: Duration,
}

impl fmt::Debug for ProposalService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProposalService")
            .field("store_path", &self.store_path)
            .field("lock_dir", &self.lock_dir)
            .field("lock_timeout", &self.lock_timeout)
            .finish_non_exhaustive()
    }
}

impl ProposalService {
    /// Service over an explicit store file and lock directory.
    pub fn new(
        store_path: impl Into<PathBuf>,
        lock_dir: impl Into<PathBuf>,
        config: ProjectConfig,
    ) -> Self {
        Self {
            store_path: store_path.into(),
            lock_dir: lock_dir.into(),
            config,
            provider: Arc::new(NoProvider),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Service over the `.ratify/` workspace under `root`.
    pub fn for_workspace(root: &Path, config: ProjectConfig) -> Self {
        let dir = root.join(WORKSPACE_DIR);
        Self::new(dir.join(db::STORE_FILE), dir.join("locks"), config)
    }

    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn ContentProvider>) -> Self {
        self.provider = provider;
        self
    }

    #[must_use]
    pub const fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &ProjectConfig {
        &self.config
    }

    #[must_use]
    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    pub(crate) fn connect(&self) -> Result<Connection> {
        db::open_store(&self.store_path)
    }

    /// Lock a proposal. Ids that were never minted are `NotFound` before
    /// anything touches the lock directory.
    pub(crate) fn lock(&self, proposal_id: &str) -> Result<ProposalLock> {
        if !id::has_shape(PROPOSAL_PREFIX, proposal_id) {
            return Err(RatifyError::not_found("proposal", proposal_id));
        }
        Ok(ProposalLock::acquire(
            &self.lock_dir,
            proposal_id,
            self.lock_timeout,
        )?)
    }

    // -----------------------------------------------------------------------
    // Drafting
    // -----------------------------------------------------------------------

    /// Create a draft proposal in an existing project.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad input, or `NotFound` when the
    /// project does not exist.
    pub fn create_proposal(&self, input: NewProposal) -> Result<Proposal> {
        input.validate()?;
        let mut conn = self.connect()?;
        let proposal = db::immediate(&mut conn, |tx| {
            query::require_project(tx, &input.project_id)?;
            let now = now_us();
            let proposal = Proposal {
                id: new_id(PROPOSAL_PREFIX, &input.title),
                project_id: input.project_id,
                title: input.title.trim().to_string(),
                description: input.description,
                status: ProposalStatus::Draft,
                owner_id: input.owner_id,
                approver_id: input.approver_id,
                source_type: input.source_type,
                source_content: input.source_content,
                metadata: BTreeMap::new(),
                created_at_us: now,
                updated_at_us: now,
                submitted_at_us: None,
                resolved_at_us: None,
                merged_at_us: None,
            };
            write::insert_proposal(tx, &proposal)?;
            Ok(proposal)
        })?;

        info!(
            proposal_id = %proposal.id,
            project_id = %proposal.project_id,
            owner = %proposal.owner_id,
            "proposal created"
        );
        Ok(proposal)
    }

    /// Append an item to a draft. Only the owner may edit a draft.
    ///
    /// The item is checked against the live project, its previous state is
    /// snapshotted, and advisor estimates are attached before it is stored.
    ///
    /// # Errors
    ///
    /// Returns a validation, not-found or cycle error for a bad item, and
    /// `InvalidTransition` when the actor is not the owner or the proposal
    /// is no longer a draft.
    pub fn add_item(
        &self,
        proposal_id: &str,
        actor: &str,
        new_item: NewItem,
    ) -> Result<ProposalItem> {
        new_item.validate()?;
        let _lock = self.lock(proposal_id)?;
        let mut conn = self.connect()?;
        let item = db::immediate(&mut conn, |tx| {
            let mut proposal = query::require_proposal(tx, proposal_id)?;
            require_owner(&proposal, actor, "add_item")?;
            require_draft(&proposal, "add_item")?;

            let ctx = context_for(tx, &proposal)?;
            let now = now_us();
            let sequence = query::next_sequence(tx, proposal_id)?;
            let item = self.build_item(&ctx, proposal_id, sequence, new_item, now)?;
            write::insert_item(tx, &item)?;

            proposal.updated_at_us = now;
            write::update_proposal(tx, &proposal)?;
            Ok(item)
        })?;

        info!(
            proposal_id,
            item_id = %item.id,
            actor,
            label = %item.label(),
            "item added"
        );
        self.refresh_impact(proposal_id);
        Ok(item)
    }

    /// Drop an item from a draft.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown item and `InvalidTransition` when
    /// the actor is not the owner or the proposal is no longer a draft.
    pub fn remove_item(&self, item_id: &str, actor: &str) -> Result<()> {
        let mut conn = self.connect()?;
        let proposal_id = query::require_item(&conn, item_id)?.proposal_id;
        let _lock = self.lock(&proposal_id)?;

        db::immediate(&mut conn, |tx| {
            let mut proposal = query::require_proposal(tx, &proposal_id)?;
            require_owner(&proposal, actor, "remove_item")?;
            require_draft(&proposal, "remove_item")?;
            if write::delete_item(tx, item_id)? == 0 {
                return Err(RatifyError::not_found("item", item_id));
            }
            proposal.updated_at_us = now_us();
            write::update_proposal(tx, &proposal)
        })?;

        info!(proposal_id = %proposal_id, item_id, actor, "item removed");
        self.refresh_impact(&proposal_id);
        Ok(())
    }

    /// Turn the proposal's source content into items, replacing any draft
    /// items.
    ///
    /// The provider runs with the configured timeout. A provider failure,
    /// malformed output, or output naming entities the project does not
    /// have yields a single verbatim "add task" item instead.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` when the proposal is not a draft and a
    /// validation error when it carries no content.
    pub fn process_content(&self, proposal_id: &str) -> Result<Vec<ProposalItem>> {
        let mut conn = self.connect()?;
        let proposal = query::require_proposal(&conn, proposal_id)?;
        require_draft(&proposal, "process")?;
        let content = proposal
            .source_content
            .clone()
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| {
                RatifyError::validation("source_content", "proposal has no content to process")
            })?;

        let timeout = Duration::from_millis(self.config.advisor.provider_timeout_ms);
        let extraction =
            provider::extract_items(&self.provider, &content, proposal.source_type, timeout);

        let _lock = self.lock(proposal_id)?;
        let items = db::immediate(&mut conn, |tx| {
            let mut proposal = query::require_proposal(tx, proposal_id)?;
            require_draft(&proposal, "process")?;
            let ctx = context_for(tx, &proposal)?;
            let now = now_us();

            // Targets are checked against the project as it is under the lock.
            let Extraction {
                mut items,
                mut fallback_reason,
            } = extraction;
            if fallback_reason.is_none()
                && let Some(err) = items
                    .iter()
                    .find_map(|item| targets::check(&ctx, item).err())
            {
                warn!(
                    proposal_id,
                    error = %err,
                    "extracted items do not fit the project; using fallback"
                );
                items = vec![provider::fallback_item(&content)];
                fallback_reason = Some(err.to_string());
            }

            write::delete_items_for_proposal(tx, proposal_id)?;
            let mut stored = Vec::with_capacity(items.len());
            for (sequence, new_item) in (1_i64..).zip(items) {
                let item = self.build_item(&ctx, proposal_id, sequence, new_item, now)?;
                write::insert_item(tx, &item)?;
                stored.push(item);
            }

            proposal.metadata.insert(
                EXTRACTION_KEY.to_string(),
                json!({
                    "fallback": fallback_reason.is_some(),
                    "reason": fallback_reason,
                    "item_count": stored.len(),
                    "processed_at_us": now,
                }),
            );
            proposal.updated_at_us = now;
            write::update_proposal(tx, &proposal)?;
            Ok(stored)
        })?;

        info!(proposal_id, count = items.len(), "content processed");
        self.refresh_impact(proposal_id);
        Ok(items)
    }

    // -----------------------------------------------------------------------
    // Review
    // -----------------------------------------------------------------------

    /// Move a draft into review. The approver defaults to the project owner.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` for a non-owner or a non-draft, and a
    /// validation error when the proposal has no items.
    pub fn submit_for_review(&self, proposal_id: &str, actor: &str) -> Result<Proposal> {
        let _lock = self.lock(proposal_id)?;
        let mut conn = self.connect()?;
        let proposal = db::immediate(&mut conn, |tx| {
            let mut proposal = query::require_proposal(tx, proposal_id)?;
            require_owner(&proposal, actor, ProposalStatus::PendingReview)?;
            proposal
                .status
                .can_transition_to(ProposalStatus::PendingReview)?;
            if query::list_items(tx, proposal_id)?.is_empty() {
                return Err(RatifyError::validation(
                    "items",
                    "a proposal needs at least one item before review",
                ));
            }
            if proposal.approver_id.is_none() {
                let project = query::require_project(tx, &proposal.project_id)?;
                proposal.approver_id = Some(project.owner_id);
            }

            let now = now_us();
            proposal.status = ProposalStatus::PendingReview;
            proposal.submitted_at_us = Some(now);
            proposal.updated_at_us = now;
            write::update_proposal(tx, &proposal)?;
            Ok(proposal)
        })?;

        info!(
            proposal_id,
            actor,
            approver = proposal.approver_id.as_deref().unwrap_or_default(),
            "proposal submitted for review"
        );
        self.refresh_impact(proposal_id);
        Ok(proposal)
    }

    /// Record the approver's decision on one pending item and re-derive the
    /// proposal status in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` when the proposal is not in review, the
    /// actor is not the approver, the item was already decided, or the item
    /// is sent back to discussion after its thread was resolved.
    pub fn review_item(
        &self,
        item_id: &str,
        actor: &str,
        decision: ReviewDecision,
        notes: Option<&str>,
    ) -> Result<ProposalItem> {
        let mut conn = self.connect()?;
        let proposal_id = query::require_item(&conn, item_id)?.proposal_id;
        let _lock = self.lock(&proposal_id)?;

        let (item, status) = db::immediate(&mut conn, |tx| {
            let mut proposal = query::require_proposal(tx, &proposal_id)?;
            let mut item = query::require_item(tx, item_id)?;
            let target = decision.status();

            if proposal.status != ProposalStatus::PendingReview {
                return Err(RatifyError::transition(
                    item.approval_status,
                    target,
                    format!("proposal is {}, not pending_review", proposal.status),
                ));
            }
            if !proposal.is_approver(actor) {
                return Err(RatifyError::transition(
                    item.approval_status,
                    target,
                    format!("{actor} is not the designated approver"),
                ));
            }
            item.approval_status.can_transition_to(target)?;
            if target == ApprovalStatus::NeedsDiscussion {
                let thread = ThreadRef::new(proposal_id.clone(), Some(item.id.clone()));
                if query::get_resolution(tx, &thread)?.is_some() {
                    return Err(RatifyError::transition(
                        item.approval_status,
                        target,
                        "the item's discussion thread is already resolved; approve or reject it",
                    ));
                }
            }

            let now = now_us();
            item.approval_status = target;
            item.reviewer_notes = notes.map(str::to_string);
            item.reviewed_by = Some(actor.to_string());
            item.reviewed_at_us = Some(now);
            item.updated_at_us = now;
            write::update_item(tx, &item)?;

            let items = query::list_items(tx, &proposal_id)?;
            rederive_status(tx, &mut proposal, &items, now)?;
            Ok((item, proposal.status))
        })?;

        info!(
            proposal_id = %proposal_id,
            item_id,
            actor,
            decision = %decision,
            proposal_status = %status,
            "item reviewed"
        );
        self.refresh_impact(&proposal_id);
        Ok(item)
    }

    /// Re-advise every item under `assumptions` and recompute the impact.
    ///
    /// Allowed while the proposal is a draft or in review. Estimates are
    /// recomputed from scratch, so repeating a call never compounds a
    /// complexity multiplier.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` outside draft and review, and a
    /// validation error for assumptions that do not fit the proposal.
    pub fn recalculate_with_assumptions(
        &self,
        proposal_id: &str,
        assumptions: &Assumptions,
    ) -> Result<Proposal> {
        let _lock = self.lock(proposal_id)?;
        let mut conn = self.connect()?;
        let (proposal, summary) = db::immediate(&mut conn, |tx| {
            let mut proposal = query::require_proposal(tx, proposal_id)?;
            if !matches!(
                proposal.status,
                ProposalStatus::Draft | ProposalStatus::PendingReview
            ) {
                return Err(RatifyError::transition(
                    proposal.status,
                    "recalculate",
                    "assumptions only apply while drafting or in review",
                ));
            }

            let mut ctx = query::load_context(tx, &proposal.project_id)?;
            let mut items = query::list_items(tx, proposal_id)?;
            assumptions.validate(&ctx, &items)?;
            assumptions.apply_capacity(&mut ctx);

            let advisor = Advisor::new(&ctx, &self.config.advisor);
            let now = now_us();
            for item in &mut items {
                let advice = advisor.advise(item);
                let estimate = advice
                    .estimate
                    .map(|estimate| assumptions.adjust_estimate(&item.id, estimate));
                let assignment = assumptions
                    .locked_assignment(&item.id, &ctx)
                    .or(advice.assignment);
                item.ai_estimate = estimate;
                item.ai_assignment = assignment;
                item.updated_at_us = now;
                write::update_item(tx, item)?;
            }

            proposal
                .metadata
                .insert(METADATA_KEY.to_string(), serde_json::to_value(assumptions)?);
            proposal.updated_at_us = now;
            write::update_proposal(tx, &proposal)?;

            let summary = ImpactCalculator::new(&self.config.impact)
                .calculate(proposal_id, &items, &ctx, now);
            write::upsert_impact(tx, &summary)?;
            Ok((proposal, summary))
        })?;

        info!(
            proposal_id,
            overrides = assumptions.capacity_overrides.len(),
            locked = assumptions.locked_assignments.len(),
            adjusted = assumptions.complexity_adjustments.len(),
            risk_score = summary.risk_score,
            "recalculated with assumptions"
        );
        Ok(proposal)
    }

    /// Recompute and store the impact summary from the current items and
    /// project state.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown proposal or a store error.
    pub fn recalculate_impact(&self, proposal_id: &str) -> Result<ImpactSummary> {
        let mut conn = self.connect()?;
        db::immediate(&mut conn, |tx| {
            let proposal = query::require_proposal(tx, proposal_id)?;
            let items = query::list_items(tx, proposal_id)?;
            let ctx = context_for(tx, &proposal)?;
            let summary = ImpactCalculator::new(&self.config.impact)
                .calculate(proposal_id, &items, &ctx, now_us());
            write::upsert_impact(tx, &summary)?;
            Ok(summary)
        })
    }

    pub(crate) fn refresh_impact(&self, proposal_id: &str) {
        match self.recalculate_impact(proposal_id) {
            Ok(summary) => debug!(
                proposal_id,
                risk_score = summary.risk_score,
                risk_level = summary.risk_level.as_str(),
                "impact recalculated"
            ),
            Err(err) => warn!(
                proposal_id,
                error = %err,
                "impact recalculation failed after commit"
            ),
        }
    }

    // -----------------------------------------------------------------------
    // Closing
    // -----------------------------------------------------------------------

    /// Archive an applied or rejected proposal.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` for a non-owner or any other status.
    pub fn archive_proposal(&self, proposal_id: &str, actor: &str) -> Result<Proposal> {
        let _lock = self.lock(proposal_id)?;
        let mut conn = self.connect()?;
        let proposal = db::immediate(&mut conn, |tx| {
            let mut proposal = query::require_proposal(tx, proposal_id)?;
            require_owner(&proposal, actor, ProposalStatus::Archived)?;
            proposal.status.can_transition_to(ProposalStatus::Archived)?;
            proposal.status = ProposalStatus::Archived;
            proposal.updated_at_us = now_us();
            write::update_proposal(tx, &proposal)?;
            Ok(proposal)
        })?;

        info!(proposal_id, actor, "proposal archived");
        Ok(proposal)
    }

    /// Delete a draft or in-review proposal with its items and impact.
    /// Discussion comments are kept.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` for a non-owner or once the proposal has
    /// been decided.
    pub fn discard_proposal(&self, proposal_id: &str, actor: &str) -> Result<()> {
        let lock = self.lock(proposal_id)?;
        let mut conn = self.connect()?;
        db::immediate(&mut conn, |tx| {
            let proposal = query::require_proposal(tx, proposal_id)?;
            require_owner(&proposal, actor, "discarded")?;
            if !proposal.status.is_discardable() {
                return Err(RatifyError::transition(
                    proposal.status,
                    "discarded",
                    "only draft or pending_review proposals can be discarded",
                ));
            }
            write::delete_proposal(tx, proposal_id)?;
            Ok(())
        })?;
        if let Err(err) = lock.remove() {
            warn!(proposal_id, error = %err, "could not remove lock file");
        }

        info!(proposal_id, actor, "proposal discarded");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// # Errors
    ///
    /// Returns `NotFound` for an unknown proposal.
    pub fn get_proposal(&self, proposal_id: &str) -> Result<Proposal> {
        let conn = self.connect()?;
        query::require_proposal(&conn, proposal_id)
    }

    /// # Errors
    ///
    /// Returns a store error.
    pub fn list_proposals(&self, filter: &ProposalFilter) -> Result<Vec<Proposal>> {
        let conn = self.connect()?;
        query::list_proposals(&conn, filter)
    }

    /// Items of a proposal in sequence order.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown proposal.
    pub fn list_items(&self, proposal_id: &str) -> Result<Vec<ProposalItem>> {
        let conn = self.connect()?;
        query::require_proposal(&conn, proposal_id)?;
        query::list_items(&conn, proposal_id)
    }

    /// # Errors
    ///
    /// Returns `NotFound` for an unknown item.
    pub fn get_item(&self, item_id: &str) -> Result<ProposalItem> {
        let conn = self.connect()?;
        query::require_item(&conn, item_id)
    }

    /// The stored impact summary, if one has been computed.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown proposal.
    pub fn get_impact(&self, proposal_id: &str) -> Result<Option<ImpactSummary>> {
        let conn = self.connect()?;
        query::require_proposal(&conn, proposal_id)?;
        query::get_impact(&conn, proposal_id)
    }

    fn build_item(
        &self,
        ctx: &ProjectContext,
        proposal_id: &str,
        sequence: i64,
        new_item: NewItem,
        now: i64,
    ) -> Result<ProposalItem> {
        let previous_state = targets::check(ctx, &new_item)?;
        let mut item = ProposalItem {
            id: new_id(ITEM_PREFIX, &format!("{proposal_id}:{sequence}")),
            proposal_id: proposal_id.to_string(),
            sequence,
            action: new_item.action,
            entity_type: new_item.entity_type,
            entity_id: new_item.entity_id,
            proposed_state: new_item.proposed_state,
            previous_state,
            approval_status: ApprovalStatus::Pending,
            ai_estimate: None,
            ai_assignment: None,
            reviewer_notes: None,
            reviewed_by: None,
            reviewed_at_us: None,
            applied_at_us: None,
            applied_entity_id: None,
            created_at_us: now,
            updated_at_us: now,
        };
        let advice = Advisor::new(ctx, &self.config.advisor).advise(&item);
        item.ai_estimate = advice.estimate;
        item.ai_assignment = advice.assignment;
        Ok(item)
    }
}

/// Live project snapshot with the proposal's stored capacity overrides.
pub(crate) fn context_for(conn: &Connection, proposal: &Proposal) -> Result<ProjectContext> {
    let mut ctx = query::load_context(conn, &proposal.project_id)?;
    if let Some(assumptions) = Assumptions::from_metadata(proposal)? {
        assumptions.apply_capacity(&mut ctx);
    }
    Ok(ctx)
}

/// Store the status derived from `items`, stamping `resolved_at` when the
/// proposal reaches a final review outcome.
pub(crate) fn rederive_status(
    conn: &Connection,
    proposal: &mut Proposal,
    items: &[ProposalItem],
    now: i64,
) -> Result<()> {
    let derived = derive_status(items.iter().map(|item| item.approval_status));
    if derived != proposal.status {
        proposal.status.can_transition_to(derived)?;
        proposal.status = derived;
        if derived.is_resolved() {
            proposal.resolved_at_us = Some(now);
        }
    }
    proposal.updated_at_us = now;
    write::update_proposal(conn, proposal)
}

pub(crate) fn require_owner(
    proposal: &Proposal,
    actor: &str,
    attempted: impl fmt::Display,
) -> Result<()> {
    if proposal.is_owner(actor) {
        Ok(())
    } else {
        Err(RatifyError::transition(
            proposal.status,
            attempted,
            format!("{actor} is not the owner of {}", proposal.id),
        ))
    }
}

fn require_draft(proposal: &Proposal, attempted: &str) -> Result<()> {
    if proposal.status == ProposalStatus::Draft {
        Ok(())
    } else {
        Err(RatifyError::transition(
            proposal.status,
            attempted,
            "items can only change while the proposal is a draft",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratify_core::model::proposal::SourceType;

    #[test]
    fn service_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ProposalService>();
    }

    #[test]
    fn workspace_paths_live_under_dot_ratify() {
        let service = ProposalService::for_workspace(Path::new("/repo"), ProjectConfig::default());
        assert_eq!(
            service.store_path(),
            Path::new("/repo/.ratify/ratify.sqlite3")
        );
    }

    #[test]
    fn owner_check_names_the_edge() {
        let proposal = Proposal {
            id: "pr-1".into(),
            project_id: "proj".into(),
            title: "t".into(),
            description: None,
            status: ProposalStatus::Draft,
            owner_id: "olive".into(),
            approver_id: None,
            source_type: SourceType::Text,
            source_content: None,
            metadata: BTreeMap::new(),
            created_at_us: 0,
            updated_at_us: 0,
            submitted_at_us: None,
            resolved_at_us: None,
            merged_at_us: None,
        };
        assert!(require_owner(&proposal, "olive", ProposalStatus::PendingReview).is_ok());
        let err = require_owner(&proposal, "mallory", ProposalStatus::PendingReview)
            .expect_err("not the owner");
        match err {
            RatifyError::InvalidTransition { edge, .. } => {
                assert_eq!(edge, "draft -> pending_review");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
