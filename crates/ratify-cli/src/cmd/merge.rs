//! `rt merge`: apply approved items to the live project.

use anyhow::Result;
use clap::Args;
use ratify_workflow::MergeResult;
use std::io::{self, Write};

use super::Context;
use crate::output::{pretty_kv, pretty_rule, pretty_section, render_mode, report};

#[derive(Args, Debug)]
pub struct MergeArgs {
    pub proposal_id: String,
}

/// Execute `rt merge <proposal>`.
///
/// Item failures are part of the result, not an error exit; the command
/// only fails when the merge could not run at all.
///
/// # Errors
///
/// Fails when the proposal is missing, undecided, or the actor has no
/// standing to merge it.
pub fn run_merge(args: &MergeArgs, ctx: &Context) -> Result<()> {
    let service = ctx.service()?;
    let actor = ctx.actor()?;
    let result = report(ctx.output, service.merge_proposal(&args.proposal_id, &actor))?;
    render_mode(ctx.output, &result, merge_text, merge_pretty)
}

fn merge_text(r: &MergeResult, w: &mut dyn Write) -> io::Result<()> {
    writeln!(
        w,
        "{}\t{}\t{}\t{}",
        r.proposal_id,
        r.total_changes,
        r.failures.len(),
        if r.already_applied { "already_applied" } else if r.marked_applied { "applied" } else { "partial" }
    )
}

fn merge_pretty(r: &MergeResult, w: &mut dyn Write) -> io::Result<()> {
    if r.already_applied {
        return writeln!(w, "{} was already applied; nothing to do.", r.proposal_id);
    }
    pretty_section(w, &format!("Merged {}", r.proposal_id))?;
    let line = |ids: &[String]| if ids.is_empty() { "-".to_string() } else { ids.join(", ") };
    pretty_kv(w, "Created", line(&r.tasks_created))?;
    pretty_kv(w, "Updated", line(&r.tasks_updated))?;
    pretty_kv(w, "Deleted", line(&r.tasks_deleted))?;
    if !(r.milestones_created.is_empty()
        && r.milestones_updated.is_empty()
        && r.milestones_deleted.is_empty())
    {
        pretty_kv(
            w,
            "Milestones",
            format!(
                "+{} ~{} -{}",
                r.milestones_created.len(),
                r.milestones_updated.len(),
                r.milestones_deleted.len()
            ),
        )?;
    }
    for dep in &r.dependencies_added {
        writeln!(w, "  + {} waits on {}", dep.task_id, dep.depends_on_task_id)?;
    }
    for dep in &r.dependencies_removed {
        writeln!(w, "  - {} no longer waits on {}", dep.task_id, dep.depends_on_task_id)?;
    }
    if !r.skipped_items.is_empty() {
        pretty_kv(w, "Skipped", r.skipped_items.join(", "))?;
    }
    pretty_kv(w, "Changes", r.total_changes.to_string())?;
    if !r.failures.is_empty() {
        pretty_rule(w)?;
        for failure in &r.failures {
            writeln!(w, "  {} [{}] {}", failure.item_id, failure.code, failure.message)?;
        }
    }
    if r.marked_applied {
        writeln!(w)?;
        writeln!(w, "Proposal marked applied.")?;
    }
    Ok(())
}
