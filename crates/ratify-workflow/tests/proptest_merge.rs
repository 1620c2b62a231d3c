mod common;

use common::{APPROVER, OWNER, fixture, live, new_task, submitted};
use proptest::prelude::*;
use ratify_core::error::RatifyError;
use ratify_core::model::item::ReviewDecision;
use ratify_core::model::proposal::ProposalStatus;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    /// Whatever mix of decisions, a merge creates one task per approved item
    /// and a second merge changes nothing.
    #[test]
    fn merge_creates_each_approved_task_once(
        decisions in prop::collection::vec(any::<bool>(), 1..5),
        hours in prop::collection::vec(0.5f64..20.0, 5),
    ) {
        let fx = fixture();
        let new_items = decisions
            .iter()
            .enumerate()
            .map(|(idx, _)| new_task(&format!("Generated task {idx}"), Some(hours[idx]), None))
            .collect();
        let (proposal, items) = submitted(&fx.service, new_items);
        for (item, approve) in items.iter().zip(&decisions) {
            let decision = if *approve { ReviewDecision::Approved } else { ReviewDecision::Rejected };
            fx.service.review_item(&item.id, APPROVER, decision, None).expect("review");
        }
        let approved = decisions.iter().filter(|approve| **approve).count();

        if approved == 0 {
            prop_assert_eq!(
                fx.service.get_proposal(&proposal.id).expect("get").status,
                ProposalStatus::Rejected
            );
            let err = fx.service.merge_proposal(&proposal.id, OWNER).expect_err("nothing to merge");
            let is_transition = matches!(err, RatifyError::InvalidTransition { .. });
            prop_assert!(is_transition);
        } else {
            let first = fx.service.merge_proposal(&proposal.id, OWNER).expect("merge");
            prop_assert_eq!(first.tasks_created.len(), approved);
            let second = fx.service.merge_proposal(&proposal.id, OWNER).expect("merge again");
            prop_assert!(second.already_applied);
            prop_assert_eq!(live(&fx.service).tasks.len(), 3 + approved);
        }
    }
}
