//! `rt comment`: discussion threads on proposals and items.

use anyhow::Result;
use clap::{Args, Subcommand};
use ratify_core::model::discussion::{Comment, NewComment};
use std::io::{self, Write};

use super::Context;
use crate::output::{format_us, pretty_section, render, render_mode, report};

#[derive(Subcommand, Debug)]
pub enum CommentCommand {
    /// Post a comment or reply.
    Add(AddArgs),
    /// Rewrite your own comment.
    Edit {
        comment_id: String,
        #[arg(long)]
        body: String,
    },
    /// Delete your own comment; replies move up a level.
    Delete { comment_id: String },
    /// Close a thread. Resolving an item thread reopens the item for review.
    Resolve {
        proposal_id: String,
        #[arg(long)]
        item: Option<String>,
    },
    /// Show a thread, or every thread with `--all`.
    List {
        proposal_id: String,
        #[arg(long, conflicts_with = "all")]
        item: Option<String>,
        #[arg(long)]
        all: bool,
    },
}

#[derive(Args, Debug)]
pub struct AddArgs {
    pub proposal_id: String,
    /// Attach to an item thread instead of the proposal thread.
    #[arg(long)]
    pub item: Option<String>,
    #[arg(long)]
    pub reply_to: Option<String>,
    #[arg(long, short = 'm')]
    pub body: String,
}

/// Execute an `rt comment` subcommand.
///
/// # Errors
///
/// Fails on a workflow error (rendered first) or output errors.
pub fn run_comment(command: &CommentCommand, ctx: &Context) -> Result<()> {
    let service = ctx.service()?;
    let output = ctx.output;

    match command {
        CommentCommand::Add(args) => {
            let comment = report(
                output,
                service.add_comment(NewComment {
                    proposal_id: args.proposal_id.clone(),
                    item_id: args.item.clone(),
                    parent_id: args.reply_to.clone(),
                    author_id: ctx.actor()?,
                    body: args.body.clone(),
                }),
            )?;
            render(output, &comment, |c, w| writeln!(w, "{}", c.id))
        }
        CommentCommand::Edit { comment_id, body } => {
            let actor = ctx.actor()?;
            let comment = report(output, service.edit_comment(comment_id, &actor, body))?;
            render(output, &comment, |c, w| writeln!(w, "{}", c.id))
        }
        CommentCommand::Delete { comment_id } => {
            let actor = ctx.actor()?;
            report(output, service.delete_comment(comment_id, &actor))?;
            render(output, &serde_json::json!({ "deleted": comment_id }), |_, w| {
                writeln!(w, "deleted {comment_id}")
            })
        }
        CommentCommand::Resolve { proposal_id, item } => {
            let actor = ctx.actor()?;
            let resolution = report(
                output,
                service.resolve_thread(proposal_id, item.as_deref(), &actor),
            )?;
            render(output, &resolution, |r, w| {
                writeln!(
                    w,
                    "resolved {} by {}",
                    r.item_id.as_deref().unwrap_or(&r.proposal_id),
                    r.resolved_by
                )
            })
        }
        CommentCommand::List {
            proposal_id,
            item,
            all,
        } => {
            let comments = if *all {
                report(output, service.list_all_comments(proposal_id))?
            } else {
                report(output, service.list_comments(proposal_id, item.as_deref()))?
            };
            let resolution = if *all {
                None
            } else {
                report(output, service.thread_resolution(proposal_id, item.as_deref()))?
            };
            render_mode(
                output,
                &comments,
                |list, w| list.iter().try_for_each(|c| comment_row(w, c)),
                |list, w| {
                    let heading = item.as_deref().unwrap_or(proposal_id);
                    pretty_section(w, &format!("Thread {heading} ({})", list.len()))?;
                    list.iter().try_for_each(|c| comment_pretty(w, c))?;
                    if let Some(r) = &resolution {
                        writeln!(w, "resolved by {} at {}", r.resolved_by, format_us(Some(r.resolved_at_us)))?;
                    }
                    Ok(())
                },
            )
        }
    }
}

fn comment_row(w: &mut dyn Write, c: &Comment) -> io::Result<()> {
    writeln!(
        w,
        "{}\t{}\t{}\t{}\t{}",
        c.id,
        c.item_id.as_deref().unwrap_or("-"),
        c.parent_id.as_deref().unwrap_or("-"),
        c.author_id,
        c.body
    )
}

fn comment_pretty(w: &mut dyn Write, c: &Comment) -> io::Result<()> {
    let indent = if c.parent_id.is_some() { "    " } else { "" };
    let edited = if c.edited_at_us.is_some() { " (edited)" } else { "" };
    writeln!(
        w,
        "{indent}{} {} {}{edited}",
        c.id,
        c.author_id,
        format_us(Some(c.created_at_us))
    )?;
    writeln!(w, "{indent}  {}", c.body)
}
