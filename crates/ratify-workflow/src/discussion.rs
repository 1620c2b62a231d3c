//! Comment threads on proposals and their items.
//!
//! Each proposal has one proposal-level thread plus one thread per item.
//! A resolved thread is frozen: no new comments, edits or deletions.
//! Comments reference proposals by id only and survive a discard.

use ratify_core::db::{self, query, write};
use ratify_core::error::{RatifyError, Result};
use ratify_core::id::{COMMENT_PREFIX, new_id, now_us};
use ratify_core::model::discussion::{Comment, NewComment, ThreadRef, ThreadResolution};
use ratify_core::model::item::ApprovalStatus;
use ratify_core::model::proposal::ProposalStatus;
use rusqlite::Connection;
use tracing::info;

use crate::service::{ProposalService, rederive_status};

/// Longest accepted comment body, in characters.
pub const MAX_COMMENT_CHARS: usize = 8192;

/// Reject empty, oversized or control-character bodies.
///
/// # Errors
///
/// Returns [`RatifyError::Validation`] on the `body` field.
pub fn validate_body(body: &str) -> Result<()> {
    if body.trim().is_empty() {
        return Err(RatifyError::validation("body", "must not be empty"));
    }
    if body.chars().count() > MAX_COMMENT_CHARS {
        return Err(RatifyError::validation(
            "body",
            format!("must be <= {MAX_COMMENT_CHARS} characters"),
        ));
    }
    if body.chars().any(|c| c.is_control() && c != '\n' && c != '\t') {
        return Err(RatifyError::validation(
            "body",
            "must not contain control characters other than newline and tab",
        ));
    }
    Ok(())
}

/// Refuse `operation` on a resolved thread; the error names it as the edge
/// target, e.g. `resolved -> comment`.
fn require_open(conn: &Connection, thread: &ThreadRef, operation: &str) -> Result<()> {
    if query::get_resolution(conn, thread)?.is_some() {
        return Err(RatifyError::transition(
            "resolved",
            operation,
            "the thread is resolved and no longer accepts changes",
        ));
    }
    Ok(())
}

fn require_author(comment: &Comment, actor: &str) -> Result<()> {
    if comment.author_id == actor {
        Ok(())
    } else {
        Err(RatifyError::transition(
            "open",
            "edited",
            format!("{actor} is not the author of {}", comment.id),
        ))
    }
}

/// The thread a comment belongs to.
fn thread_of(comment: &Comment) -> ThreadRef {
    ThreadRef::new(comment.proposal_id.clone(), comment.item_id.clone())
}

impl ProposalService {
    /// Post a comment, optionally as a reply.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown proposal, item or parent, a
    /// validation error for a bad body or a parent in another thread, and
    /// `InvalidTransition` when the thread is resolved.
    pub fn add_comment(&self, input: NewComment) -> Result<Comment> {
        validate_body(&input.body)?;
        if input.author_id.trim().is_empty() {
            return Err(RatifyError::validation("author_id", "must not be empty"));
        }

        let mut conn = self.connect()?;
        let comment = db::immediate(&mut conn, |tx| {
            query::require_proposal(tx, &input.proposal_id)?;
            if let Some(item_id) = &input.item_id {
                let item = query::require_item(tx, item_id)?;
                if item.proposal_id != input.proposal_id {
                    return Err(RatifyError::not_found("item", item_id.clone()));
                }
            }
            let thread = ThreadRef::new(input.proposal_id.clone(), input.item_id.clone());
            require_open(tx, &thread, "comment")?;

            if let Some(parent_id) = &input.parent_id {
                let parent = query::get_comment(tx, parent_id)?
                    .filter(|parent| parent.proposal_id == input.proposal_id)
                    .ok_or_else(|| RatifyError::not_found("comment", parent_id.clone()))?;
                if parent.item_id != input.item_id {
                    return Err(RatifyError::validation(
                        "parent_id",
                        "parent comment belongs to a different thread",
                    ));
                }
            }

            let comment = Comment {
                id: new_id(COMMENT_PREFIX, &input.body),
                proposal_id: input.proposal_id,
                item_id: input.item_id,
                parent_id: input.parent_id,
                author_id: input.author_id,
                body: input.body,
                created_at_us: now_us(),
                edited_at_us: None,
            };
            write::insert_comment(tx, &comment)?;
            Ok(comment)
        })?;

        info!(
            comment_id = %comment.id,
            proposal_id = %comment.proposal_id,
            item_id = comment.item_id.as_deref().unwrap_or_default(),
            author = %comment.author_id,
            "comment added"
        );
        Ok(comment)
    }

    /// Replace the body of one's own comment.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, a validation error for a bad body, or
    /// `InvalidTransition` for a non-author or a resolved thread.
    pub fn edit_comment(&self, comment_id: &str, actor: &str, body: &str) -> Result<Comment> {
        validate_body(body)?;
        let mut conn = self.connect()?;
        let comment = db::immediate(&mut conn, |tx| {
            let mut comment = query::get_comment(tx, comment_id)?
                .ok_or_else(|| RatifyError::not_found("comment", comment_id))?;
            require_author(&comment, actor)?;
            require_open(tx, &thread_of(&comment), "edit")?;

            let now = now_us();
            write::update_comment_body(tx, comment_id, body, now)?;
            comment.body = body.to_string();
            comment.edited_at_us = Some(now);
            Ok(comment)
        })?;

        info!(comment_id, actor, "comment edited");
        Ok(comment)
    }

    /// Delete one's own comment; its replies move up to its parent.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, or `InvalidTransition` for a non-author or a
    /// resolved thread.
    pub fn delete_comment(&self, comment_id: &str, actor: &str) -> Result<()> {
        let mut conn = self.connect()?;
        db::immediate(&mut conn, |tx| {
            let comment = query::get_comment(tx, comment_id)?
                .ok_or_else(|| RatifyError::not_found("comment", comment_id))?;
            require_author(&comment, actor)?;
            require_open(tx, &thread_of(&comment), "delete")?;
            write::delete_comment(tx, &comment)
        })?;

        info!(comment_id, actor, "comment deleted");
        Ok(())
    }

    /// Close a thread for good.
    ///
    /// The owner, the approver, or anyone who commented in the thread may
    /// resolve it. Resolving an item thread returns a `needs_discussion`
    /// item to `pending` so it can be reviewed again.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown proposal or item, a validation
    /// error for an empty thread, and `InvalidTransition` for an already
    /// resolved thread or an actor with no standing in it.
    pub fn resolve_thread(
        &self,
        proposal_id: &str,
        item_id: Option<&str>,
        actor: &str,
    ) -> Result<ThreadResolution> {
        let _lock = self.lock(proposal_id)?;
        let mut conn = self.connect()?;
        let thread = ThreadRef::new(proposal_id, item_id.map(str::to_string));

        let (resolution, reopened) = db::immediate(&mut conn, |tx| {
            let mut proposal = query::require_proposal(tx, proposal_id)?;
            let mut item = match item_id {
                Some(id) => {
                    let item = query::require_item(tx, id)?;
                    if item.proposal_id != proposal_id {
                        return Err(RatifyError::not_found("item", id));
                    }
                    Some(item)
                }
                None => None,
            };

            let comments = query::list_thread(tx, &thread)?;
            if comments.is_empty() {
                return Err(RatifyError::validation(
                    "thread",
                    "a thread needs at least one comment to be resolved",
                ));
            }
            require_open(tx, &thread, "resolve")?;

            let participant = comments.iter().any(|comment| comment.author_id == actor);
            if !participant && !proposal.is_owner(actor) && !proposal.is_approver(actor) {
                return Err(RatifyError::transition(
                    "open",
                    "resolved",
                    format!("{actor} has no standing in this thread"),
                ));
            }

            let now = now_us();
            let resolution = ThreadResolution {
                proposal_id: proposal_id.to_string(),
                item_id: item_id.map(str::to_string),
                resolved_by: actor.to_string(),
                resolved_at_us: now,
            };
            write::insert_resolution(tx, &resolution)?;

            let mut reopened = false;
            if let Some(item) = item.as_mut()
                && item.approval_status == ApprovalStatus::NeedsDiscussion
            {
                item.approval_status.can_transition_to(ApprovalStatus::Pending)?;
                item.approval_status = ApprovalStatus::Pending;
                item.updated_at_us = now;
                write::update_item(tx, item)?;
                reopened = true;

                if proposal.status == ProposalStatus::PendingReview {
                    let items = query::list_items(tx, proposal_id)?;
                    rederive_status(tx, &mut proposal, &items, now)?;
                }
            }
            Ok((resolution, reopened))
        })?;

        info!(
            proposal_id,
            item_id = item_id.unwrap_or_default(),
            actor,
            reopened,
            "thread resolved"
        );
        if reopened {
            self.refresh_impact(proposal_id);
        }
        Ok(resolution)
    }

    /// Comments of one thread, oldest first.
    ///
    /// Readable after the proposal is discarded.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn list_comments(
        &self,
        proposal_id: &str,
        item_id: Option<&str>,
    ) -> Result<Vec<Comment>> {
        let conn = self.connect()?;
        query::list_thread(
            &conn,
            &ThreadRef::new(proposal_id, item_id.map(str::to_string)),
        )
    }

    /// Every comment on a proposal across all of its threads, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn list_all_comments(&self, proposal_id: &str) -> Result<Vec<Comment>> {
        let conn = self.connect()?;
        query::list_proposal_comments(&conn, proposal_id)
    }

    /// The resolution of a thread, if it has been resolved.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn thread_resolution(
        &self,
        proposal_id: &str,
        item_id: Option<&str>,
    ) -> Result<Option<ThreadResolution>> {
        let conn = self.connect()?;
        query::get_resolution(
            &conn,
            &ThreadRef::new(proposal_id, item_id.map(str::to_string)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_rules() {
        assert!(validate_body("looks good\n\twith a tab").is_ok());
        assert!(validate_body("   ").is_err());
        assert!(validate_body("bell\u{7}").is_err());
        assert!(validate_body(&"x".repeat(MAX_COMMENT_CHARS)).is_ok());
        assert!(validate_body(&"x".repeat(MAX_COMMENT_CHARS + 1)).is_err());
    }

    #[test]
    fn non_author_edit_is_a_transition_error() {
        let comment = Comment {
            id: "dc-1".into(),
            proposal_id: "pr-1".into(),
            item_id: None,
            parent_id: None,
            author_id: "ana".into(),
            body: "hi".into(),
            created_at_us: 0,
            edited_at_us: None,
        };
        assert!(require_author(&comment, "ana").is_ok());
        assert!(matches!(
            require_author(&comment, "ben"),
            Err(RatifyError::InvalidTransition { .. })
        ));
    }
}
