//! `rt import`: load a project seed into the store.

use anyhow::{Context as _, Result};
use clap::Args;
use ratify_workflow::ProjectSeed;
use std::io::Write;
use std::path::PathBuf;

use super::Context;
use crate::output::{pretty_kv, pretty_section, render_mode, report};

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// JSON file with `project`, `members`, `milestones`, `tasks` and
    /// `dependencies`.
    pub file: PathBuf,
}

/// Execute `rt import <file>`.
///
/// # Errors
///
/// Fails when the file is unreadable or malformed, or the import is
/// rejected.
pub fn run_import(args: &ImportArgs, ctx: &Context) -> Result<()> {
    let service = ctx.service()?;
    let raw = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let seed: ProjectSeed = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", args.file.display()))?;

    let imported = report(ctx.output, service.import_seed(&seed))?;
    render_mode(
        ctx.output,
        &imported,
        |r, w| {
            writeln!(
                w,
                "{}\t{}\t{}\t{}\t{}",
                seed.project.id, r.members, r.milestones, r.tasks, r.dependencies
            )
        },
        |r, w| {
            pretty_section(w, &format!("Imported {}", seed.project.name))?;
            pretty_kv(w, "Members", r.members.to_string())?;
            pretty_kv(w, "Milestones", r.milestones.to_string())?;
            pretty_kv(w, "Tasks", r.tasks.to_string())?;
            pretty_kv(w, "Links", r.dependencies.to_string())
        },
    )
}
