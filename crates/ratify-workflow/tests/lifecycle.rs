mod common;

use common::{APPROVER, OWNER, draft, fixture, modify_task, new_task, remove_task, submitted};
use ratify_core::error::RatifyError;
use ratify_core::model::item::{ApprovalStatus, ReviewDecision};
use ratify_core::model::payload::TaskFields;
use ratify_core::model::proposal::ProposalStatus;
use ratify_core::model::discussion::NewComment;
use ratify_workflow::ProposalFilter;

fn is_transition(err: &RatifyError) -> bool {
    matches!(err, RatifyError::InvalidTransition { .. })
}

#[test]
fn submit_without_items_is_a_validation_error_and_changes_nothing() {
    let fx = fixture();
    let proposal = draft(&fx.service, "Empty");

    let err = fx
        .service
        .submit_for_review(&proposal.id, OWNER)
        .expect_err("no items");
    assert!(matches!(err, RatifyError::Validation { ref field, .. } if field == "items"));

    let reloaded = fx.service.get_proposal(&proposal.id).expect("reload");
    assert_eq!(reloaded.status, ProposalStatus::Draft);
    assert_eq!(reloaded.submitted_at_us, None);
}

#[test]
fn submit_defaults_approver_to_project_owner() {
    let fx = fixture();
    let (proposal, _) = submitted(&fx.service, vec![new_task("Add caching", Some(4.0), None)]);
    assert_eq!(proposal.status, ProposalStatus::PendingReview);
    assert_eq!(proposal.approver_id.as_deref(), Some(APPROVER));
    assert!(proposal.submitted_at_us.is_some());
}

#[test]
fn only_the_owner_edits_and_submits_a_draft() {
    let fx = fixture();
    let proposal = draft(&fx.service, "Mine");
    let err = fx
        .service
        .add_item(&proposal.id, "mallory", new_task("Sneak", None, None))
        .expect_err("not the owner");
    assert!(is_transition(&err));

    fx.service
        .add_item(&proposal.id, OWNER, new_task("Real", None, None))
        .expect("owner adds");
    let err = fx
        .service
        .submit_for_review(&proposal.id, "mallory")
        .expect_err("not the owner");
    assert!(is_transition(&err));
}

#[test]
fn add_item_attaches_advice_and_snapshots_previous_state() {
    let fx = fixture();
    let proposal = draft(&fx.service, "Advice");

    let added = fx
        .service
        .add_item(&proposal.id, OWNER, new_task("Tune queries", None, None))
        .expect("add");
    assert_eq!(added.sequence, 1);
    assert!(added.ai_estimate.is_some());
    let assignment = added.ai_assignment.expect("assignment suggestion");
    // ben carries 10 of 20 hours, ana 30 of 40
    assert_eq!(assignment.assignee_id.as_deref(), Some("ben"));

    let modified = fx
        .service
        .add_item(
            &proposal.id,
            OWNER,
            modify_task(
                "task-a",
                TaskFields {
                    estimated_hours: Some(35.0),
                    ..TaskFields::default()
                },
            ),
        )
        .expect("modify");
    assert_eq!(modified.sequence, 2);
    assert_eq!(
        modified.previous_state.as_ref().and_then(|s| s.title()),
        Some("Design schema")
    );

    let err = fx
        .service
        .add_item(&proposal.id, OWNER, remove_task("task-missing"))
        .expect_err("unknown task");
    assert!(matches!(err, RatifyError::NotFound { kind: "task", .. }));
}

#[test]
fn review_derives_proposal_status() {
    let fx = fixture();
    let (proposal, items) = submitted(
        &fx.service,
        vec![
            new_task("One", Some(2.0), Some("ana")),
            new_task("Two", Some(3.0), Some("ben")),
        ],
    );

    let first = fx
        .service
        .review_item(&items[0].id, APPROVER, ReviewDecision::Approved, Some("ok"))
        .expect("approve");
    assert_eq!(first.approval_status, ApprovalStatus::Approved);
    assert_eq!(first.reviewed_by.as_deref(), Some(APPROVER));
    assert_eq!(first.reviewer_notes.as_deref(), Some("ok"));
    assert_eq!(
        fx.service.get_proposal(&proposal.id).expect("get").status,
        ProposalStatus::PendingReview
    );

    fx.service
        .review_item(&items[1].id, APPROVER, ReviewDecision::Rejected, None)
        .expect("reject");
    let resolved = fx.service.get_proposal(&proposal.id).expect("get");
    assert_eq!(resolved.status, ProposalStatus::PartiallyApproved);
    assert!(resolved.resolved_at_us.is_some());
}

#[test]
fn all_rejected_then_archived() {
    let fx = fixture();
    let (proposal, items) = submitted(&fx.service, vec![new_task("Nope", None, None)]);
    fx.service
        .review_item(&items[0].id, APPROVER, ReviewDecision::Rejected, None)
        .expect("reject");
    assert_eq!(
        fx.service.get_proposal(&proposal.id).expect("get").status,
        ProposalStatus::Rejected
    );

    let archived = fx
        .service
        .archive_proposal(&proposal.id, OWNER)
        .expect("archive");
    assert_eq!(archived.status, ProposalStatus::Archived);
}

#[test]
fn non_approver_review_and_double_review_are_refused() {
    let fx = fixture();
    let (proposal, items) = submitted(&fx.service, vec![new_task("Gate", None, None)]);

    let err = fx
        .service
        .review_item(&items[0].id, OWNER, ReviewDecision::Approved, None)
        .expect_err("owner is not the approver");
    assert!(is_transition(&err));

    fx.service
        .review_item(&items[0].id, APPROVER, ReviewDecision::Approved, None)
        .expect("approve");
    let err = fx
        .service
        .review_item(&items[0].id, APPROVER, ReviewDecision::Rejected, None)
        .expect_err("already decided");
    assert!(is_transition(&err));

    let item = fx.service.get_item(&items[0].id).expect("item");
    assert_eq!(item.approval_status, ApprovalStatus::Approved);
    assert_eq!(
        fx.service.get_proposal(&proposal.id).expect("get").status,
        ProposalStatus::Approved
    );
}

#[test]
fn needs_discussion_keeps_proposal_in_review() {
    let fx = fixture();
    let (proposal, items) = submitted(&fx.service, vec![new_task("Unclear", None, None)]);
    fx.service
        .review_item(&items[0].id, APPROVER, ReviewDecision::NeedsDiscussion, None)
        .expect("flag");
    assert_eq!(
        fx.service.get_proposal(&proposal.id).expect("get").status,
        ProposalStatus::PendingReview
    );
}

#[test]
fn draft_items_freeze_after_submit() {
    let fx = fixture();
    let (proposal, items) = submitted(&fx.service, vec![new_task("Frozen", None, None)]);
    let err = fx
        .service
        .add_item(&proposal.id, OWNER, new_task("Late", None, None))
        .expect_err("not a draft");
    assert!(is_transition(&err));
    let err = fx
        .service
        .remove_item(&items[0].id, OWNER)
        .expect_err("not a draft");
    assert!(is_transition(&err));
    assert_eq!(fx.service.list_items(&proposal.id).expect("items").len(), 1);
}

#[test]
fn discard_cascades_but_keeps_discussion() {
    let fx = fixture();
    let (proposal, items) = submitted(&fx.service, vec![new_task("Doomed", None, None)]);
    fx.service
        .add_comment(NewComment {
            proposal_id: proposal.id.clone(),
            item_id: Some(items[0].id.clone()),
            parent_id: None,
            author_id: APPROVER.to_string(),
            body: "Why this?".to_string(),
        })
        .expect("comment");
    assert!(fx.service.get_impact(&proposal.id).expect("impact").is_some());

    let err = fx
        .service
        .discard_proposal(&proposal.id, APPROVER)
        .expect_err("only the owner discards");
    assert!(is_transition(&err));

    let lock_file = fx
        .dir
        .path()
        .join(".ratify/locks")
        .join(format!("{}.lock", proposal.id));
    assert!(lock_file.exists());

    fx.service
        .discard_proposal(&proposal.id, OWNER)
        .expect("discard");
    assert!(!lock_file.exists());
    assert!(matches!(
        fx.service.get_proposal(&proposal.id),
        Err(RatifyError::NotFound { .. })
    ));
    assert!(matches!(
        fx.service.get_item(&items[0].id),
        Err(RatifyError::NotFound { .. })
    ));
    let kept = fx
        .service
        .list_comments(&proposal.id, Some(&items[0].id))
        .expect("comments");
    assert_eq!(kept.len(), 1);
}

#[test]
fn unminted_proposal_ids_are_not_found_and_never_locked() {
    let fx = fixture();
    let locks = fx.dir.path().join(".ratify/locks");
    for bad in ["../../escaped", "pr-x/y", "pr-0123456789/../../z", "PR-0123456789"] {
        let err = fx
            .service
            .submit_for_review(bad, OWNER)
            .expect_err("not a proposal id");
        assert!(matches!(err, RatifyError::NotFound { .. }), "{bad}: {err}");
        let err = fx
            .service
            .add_item(bad, OWNER, new_task("Stray", None, None))
            .expect_err("not a proposal id");
        assert!(matches!(err, RatifyError::NotFound { .. }), "{bad}: {err}");
    }
    assert!(!fx.dir.path().join("escaped.lock").exists());
    assert!(!fx.dir.path().join(".ratify/escaped.lock").exists());
    let stray = std::fs::read_dir(&locks)
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(stray, 0);
}

#[test]
fn decided_proposals_cannot_be_discarded() {
    let fx = fixture();
    let (proposal, items) = submitted(&fx.service, vec![new_task("Keep", None, None)]);
    fx.service
        .review_item(&items[0].id, APPROVER, ReviewDecision::Approved, None)
        .expect("approve");
    let err = fx
        .service
        .discard_proposal(&proposal.id, OWNER)
        .expect_err("approved");
    assert!(is_transition(&err));
    let err = fx
        .service
        .archive_proposal(&proposal.id, OWNER)
        .expect_err("approved is not archivable");
    assert!(is_transition(&err));
}

#[test]
fn listing_filters_by_status() {
    let fx = fixture();
    let _draft = draft(&fx.service, "Still drafting");
    let (submitted_proposal, _) = submitted(&fx.service, vec![new_task("Ready", None, None)]);

    let pending = fx
        .service
        .list_proposals(&ProposalFilter {
            project_id: Some("proj".to_string()),
            status: Some(ProposalStatus::PendingReview),
            ..ProposalFilter::default()
        })
        .expect("list");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, submitted_proposal.id);

    let all = fx
        .service
        .list_proposals(&ProposalFilter::default())
        .expect("list all");
    assert_eq!(all.len(), 2);
}
