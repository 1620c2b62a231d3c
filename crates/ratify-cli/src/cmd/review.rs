//! `rt review`: record an approver decision on one item.

use anyhow::Result;
use clap::Args;
use ratify_core::model::item::ReviewDecision;
use std::io::Write;

use super::Context;
use crate::output::{pretty_kv, pretty_section, render_mode, report};

#[derive(Args, Debug)]
pub struct ReviewArgs {
    pub item_id: String,
    /// approved, rejected or needs_discussion.
    #[arg(long, short = 'd')]
    pub decision: ReviewDecision,
    #[arg(long)]
    pub notes: Option<String>,
}

/// Execute `rt review <item>`.
///
/// # Errors
///
/// Fails when the actor is not the approver, the proposal is not in
/// review, or the item was already decided.
pub fn run_review(args: &ReviewArgs, ctx: &Context) -> Result<()> {
    let service = ctx.service()?;
    let actor = ctx.actor()?;
    let item = report(
        ctx.output,
        service.review_item(&args.item_id, &actor, args.decision, args.notes.as_deref()),
    )?;
    let proposal = report(ctx.output, service.get_proposal(&item.proposal_id))?;

    render_mode(
        ctx.output,
        &serde_json::json!({ "item": item, "proposal_status": proposal.status }),
        |_, w| {
            writeln!(
                w,
                "{}\t{}\t{}\t{}",
                item.id, item.approval_status, proposal.id, proposal.status
            )
        },
        |_, w| {
            pretty_section(w, &format!("{} {}", item.id, item.label()))?;
            pretty_kv(w, "Decision", item.approval_status.as_str())?;
            if let Some(notes) = &item.reviewer_notes {
                pretty_kv(w, "Notes", notes)?;
            }
            pretty_kv(w, "Proposal", format!("{} is now {}", proposal.id, proposal.status))
        },
    )
}
