//! `rt proposal`: drafting, review plumbing and impact for one proposal.

use anyhow::{Context as _, Result, bail};
use chrono::NaiveDate;
use clap::{Args, Subcommand};
use ratify_core::model::impact::ImpactSummary;
use ratify_core::model::item::{EntityType, ItemAction, NewItem, ProposalItem};
use ratify_core::model::payload::EntityState;
use ratify_core::model::proposal::{NewProposal, Proposal, ProposalStatus, SourceType};
use ratify_workflow::{Assumptions, ProposalFilter};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;

use super::Context;
use crate::output::{
    OutputMode, format_us, pretty_kv, pretty_rule, pretty_section, render, render_mode, report,
};

#[derive(Subcommand, Debug)]
pub enum ProposalCommand {
    /// Start a draft proposal.
    Create(CreateArgs),
    /// Show a proposal with its items and impact.
    Show { id: String },
    /// List proposals.
    List(ListArgs),
    /// Add an item to a draft.
    AddItem(AddItemArgs),
    /// Remove an item from a draft.
    RemoveItem { item_id: String },
    /// Turn the proposal's source content into items.
    Process { id: String },
    /// Send a draft for review.
    Submit { id: String },
    /// Recompute impact, optionally under planning assumptions.
    Recalc(RecalcArgs),
    /// Archive an applied or rejected proposal.
    Archive { id: String },
    /// Delete a draft or in-review proposal.
    Discard { id: String },
    /// Show the stored impact summary.
    Impact { id: String },
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    #[arg(long)]
    pub project: String,
    #[arg(long)]
    pub title: String,
    #[arg(long)]
    pub description: Option<String>,
    /// How the content arrived: voice, text, file or api.
    #[arg(long, default_value = "text")]
    pub source: SourceType,
    /// Raw submission text.
    #[arg(long, conflicts_with = "content_file")]
    pub content: Option<String>,
    /// Read the raw submission from a file.
    #[arg(long)]
    pub content_file: Option<PathBuf>,
    /// Approver; defaults to the project owner at submit time.
    #[arg(long)]
    pub approver: Option<String>,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[arg(long)]
    pub project: Option<String>,
    #[arg(long)]
    pub status: Option<ProposalStatus>,
    #[arg(long)]
    pub owner: Option<String>,
    #[arg(long)]
    pub approver: Option<String>,
    #[arg(long)]
    pub limit: Option<u32>,
}

#[derive(Args, Debug)]
pub struct AddItemArgs {
    pub proposal_id: String,
    /// add, modify or remove.
    #[arg(long)]
    pub action: ItemAction,
    /// task, milestone, assignment or dependency.
    #[arg(long)]
    pub entity: EntityType,
    /// Live entity the item targets (the dependent task for links).
    #[arg(long)]
    pub target: Option<String>,
    /// Proposed fields as a JSON object; the flags below override it.
    #[arg(long)]
    pub state: Option<String>,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub hours: Option<f64>,
    #[arg(long)]
    pub assignee: Option<String>,
    #[arg(long)]
    pub due: Option<NaiveDate>,
    /// Task the target waits on (dependency items).
    #[arg(long)]
    pub depends_on: Option<String>,
}

#[derive(Args, Debug)]
pub struct RecalcArgs {
    pub id: String,
    /// Assume a member capacity: `member=hours`.
    #[arg(long = "capacity", value_name = "MEMBER=HOURS")]
    pub capacity: Vec<String>,
    /// Pin a new task to a member: `item=member`.
    #[arg(long = "lock", value_name = "ITEM=MEMBER")]
    pub lock: Vec<String>,
    /// Scale an item's estimate: `item=factor`.
    #[arg(long = "complexity", value_name = "ITEM=FACTOR")]
    pub complexity: Vec<String>,
}

impl RecalcArgs {
    fn has_assumptions(&self) -> bool {
        !(self.capacity.is_empty() && self.lock.is_empty() && self.complexity.is_empty())
    }

    fn assumptions(&self) -> Result<Assumptions> {
        let numeric = |pairs: &[String]| -> Result<BTreeMap<String, f64>> {
            pairs
                .iter()
                .map(|pair| {
                    let (key, value) = split_pair(pair)?;
                    let number = value
                        .parse::<f64>()
                        .with_context(|| format!("'{value}' is not a number in '{pair}'"))?;
                    Ok((key.to_string(), number))
                })
                .collect()
        };
        let locked = self
            .lock
            .iter()
            .map(|pair| split_pair(pair).map(|(k, v)| (k.to_string(), v.to_string())))
            .collect::<Result<_>>()?;

        Ok(Assumptions {
            capacity_overrides: numeric(&self.capacity)?,
            locked_assignments: locked,
            complexity_adjustments: numeric(&self.complexity)?,
        })
    }
}

fn split_pair(pair: &str) -> Result<(&str, &str)> {
    match pair.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() && !value.trim().is_empty() => {
            Ok((key.trim(), value.trim()))
        }
        _ => bail!("expected KEY=VALUE, got '{pair}'"),
    }
}

impl AddItemArgs {
    /// Assemble the tagged proposed state from `--state` and the shortcut
    /// flags. `None` when nothing was given.
    fn proposed_state(&self) -> Result<Option<EntityState>> {
        let mut fields = match &self.state {
            Some(raw) => match serde_json::from_str::<Value>(raw).context("--state is not JSON")? {
                Value::Object(map) => map,
                _ => bail!("--state must be a JSON object"),
            },
            None => Map::new(),
        };

        let mut set = |key: &str, value: Option<Value>| {
            if let Some(value) = value {
                fields.insert(key.to_string(), value);
            }
        };
        match self.entity {
            EntityType::Task => {
                set("title", self.title.clone().map(Value::from));
                set("estimated_hours", self.hours.map(Value::from));
                set("assignee_id", self.assignee.clone().map(Value::from));
                set("due_date", self.due.map(|d| Value::from(d.to_string())));
            }
            EntityType::Milestone => {
                set("title", self.title.clone().map(Value::from));
                set("due_date", self.due.map(|d| Value::from(d.to_string())));
            }
            EntityType::Assignment => {
                set("task_id", self.target.clone().map(Value::from));
                set("assignee_id", self.assignee.clone().map(Value::from));
            }
            EntityType::Dependency => {
                set("task_id", self.target.clone().map(Value::from));
                set("depends_on_task_id", self.depends_on.clone().map(Value::from));
            }
        }

        if fields.is_empty() {
            return Ok(None);
        }
        fields.insert(
            "entity_type".to_string(),
            Value::from(self.entity.as_str()),
        );
        let state = serde_json::from_value(Value::Object(fields))
            .context("proposed fields do not match the entity type")?;
        Ok(Some(state))
    }

    fn new_item(&self) -> Result<NewItem> {
        Ok(NewItem {
            action: self.action,
            entity_type: self.entity,
            entity_id: self.target.clone(),
            proposed_state: self.proposed_state()?,
            previous_state: None,
        })
    }
}

/// Proposal detail as returned by `show`.
#[derive(Debug, Serialize)]
struct ProposalView {
    #[serde(flatten)]
    proposal: Proposal,
    items: Vec<ProposalItem>,
    impact: Option<ImpactSummary>,
}

/// Execute an `rt proposal` subcommand.
///
/// # Errors
///
/// Fails on bad arguments, a workflow error (rendered first), or output
/// errors.
pub fn run_proposal(command: &ProposalCommand, ctx: &Context) -> Result<()> {
    let service = ctx.service()?;
    let output = ctx.output;

    match command {
        ProposalCommand::Create(args) => {
            let source_content = match &args.content_file {
                Some(path) => Some(
                    std::fs::read_to_string(path)
                        .with_context(|| format!("Failed to read {}", path.display()))?,
                ),
                None => args.content.clone(),
            };
            let proposal = report(
                output,
                service.create_proposal(NewProposal {
                    owner_id: ctx.actor()?,
                    project_id: args.project.clone(),
                    title: args.title.clone(),
                    description: args.description.clone(),
                    source_type: args.source,
                    source_content,
                    approver_id: args.approver.clone(),
                }),
            )?;
            render_proposal(output, &proposal)
        }
        ProposalCommand::Show { id } => {
            let proposal = report(output, service.get_proposal(id))?;
            let items = report(output, service.list_items(id))?;
            let impact = report(output, service.get_impact(id))?;
            let view = ProposalView {
                proposal,
                items,
                impact,
            };
            render_mode(
                output,
                &view,
                |v, w| {
                    proposal_row(w, &v.proposal)?;
                    v.items.iter().try_for_each(|item| item_row(w, item))
                },
                |v, w| {
                    proposal_pretty(w, &v.proposal)?;
                    writeln!(w)?;
                    pretty_section(w, &format!("Items ({})", v.items.len()))?;
                    v.items.iter().try_for_each(|item| item_row(w, item))?;
                    if let Some(summary) = &v.impact {
                        writeln!(w)?;
                        impact_pretty(w, summary)?;
                    }
                    Ok(())
                },
            )
        }
        ProposalCommand::List(args) => {
            let proposals = report(
                output,
                service.list_proposals(&ProposalFilter {
                    project_id: args.project.clone(),
                    status: args.status,
                    owner_id: args.owner.clone(),
                    approver_id: args.approver.clone(),
                    limit: args.limit,
                }),
            )?;
            render(output, &proposals, |list, w| {
                if list.is_empty() {
                    return writeln!(w, "no proposals");
                }
                list.iter().try_for_each(|p| proposal_row(w, p))
            })
        }
        ProposalCommand::AddItem(args) => {
            let actor = ctx.actor()?;
            let item = report(
                output,
                service.add_item(&args.proposal_id, &actor, args.new_item()?),
            )?;
            render(output, &item, |item, w| item_row(w, item))
        }
        ProposalCommand::RemoveItem { item_id } => {
            let actor = ctx.actor()?;
            report(output, service.remove_item(item_id, &actor))?;
            render(output, &serde_json::json!({ "removed": item_id }), |_, w| {
                writeln!(w, "removed {item_id}")
            })
        }
        ProposalCommand::Process { id } => {
            let items = report(output, service.process_content(id))?;
            render(output, &items, |items, w| {
                items.iter().try_for_each(|item| item_row(w, item))
            })
        }
        ProposalCommand::Submit { id } => {
            let actor = ctx.actor()?;
            let proposal = report(output, service.submit_for_review(id, &actor))?;
            render_proposal(output, &proposal)
        }
        ProposalCommand::Recalc(args) => {
            if args.has_assumptions() {
                let assumptions = args.assumptions()?;
                report(
                    output,
                    service.recalculate_with_assumptions(&args.id, &assumptions),
                )?;
            } else {
                report(output, service.recalculate_impact(&args.id))?;
            }
            let summary = report(output, service.get_impact(&args.id))?;
            render_impact(output, summary.as_ref())
        }
        ProposalCommand::Archive { id } => {
            let actor = ctx.actor()?;
            let proposal = report(output, service.archive_proposal(id, &actor))?;
            render_proposal(output, &proposal)
        }
        ProposalCommand::Discard { id } => {
            let actor = ctx.actor()?;
            report(output, service.discard_proposal(id, &actor))?;
            render(output, &serde_json::json!({ "discarded": id }), |_, w| {
                writeln!(w, "discarded {id}")
            })
        }
        ProposalCommand::Impact { id } => {
            let summary = report(output, service.get_impact(id))?;
            render_impact(output, summary.as_ref())
        }
    }
}

fn render_proposal(output: OutputMode, proposal: &Proposal) -> Result<()> {
    render_mode(
        output,
        proposal,
        |p, w| proposal_row(w, p),
        |p, w| proposal_pretty(w, p),
    )
}

fn render_impact(output: OutputMode, summary: Option<&ImpactSummary>) -> Result<()> {
    render_mode(
        output,
        &summary,
        |s, w| match s {
            Some(s) => writeln!(
                w,
                "{}\t{}\t{}\t{:.1}\t{}",
                s.proposal_id,
                s.risk_score,
                s.risk_level,
                s.net_hours,
                s.resource_conflicts.len()
            ),
            None => writeln!(w, "no impact computed"),
        },
        |s, w| match s {
            Some(s) => impact_pretty(w, s),
            None => writeln!(w, "No impact summary yet."),
        },
    )
}

fn proposal_row(w: &mut dyn Write, p: &Proposal) -> io::Result<()> {
    writeln!(w, "{}\t{}\t{}\t{}\t{}", p.id, p.status, p.project_id, p.owner_id, p.title)
}

fn item_row(w: &mut dyn Write, item: &ProposalItem) -> io::Result<()> {
    writeln!(
        w,
        "{}\t{}\t{} {}\t{}\t{}",
        item.id,
        item.sequence,
        item.action,
        item.entity_type,
        item.approval_status,
        item.label()
    )
}

fn proposal_pretty(w: &mut dyn Write, p: &Proposal) -> io::Result<()> {
    pretty_section(w, &format!("{} {}", p.id, p.title))?;
    pretty_kv(w, "Status", p.status.as_str())?;
    pretty_kv(w, "Project", &p.project_id)?;
    pretty_kv(w, "Owner", &p.owner_id)?;
    pretty_kv(w, "Approver", p.approver_id.as_deref().unwrap_or("-"))?;
    pretty_kv(w, "Source", p.source_type.as_str())?;
    pretty_kv(w, "Created", format_us(Some(p.created_at_us)))?;
    pretty_kv(w, "Submitted", format_us(p.submitted_at_us))?;
    pretty_kv(w, "Resolved", format_us(p.resolved_at_us))?;
    pretty_kv(w, "Merged", format_us(p.merged_at_us))?;
    if let Some(description) = &p.description {
        writeln!(w)?;
        writeln!(w, "{description}")?;
    }
    Ok(())
}

fn impact_pretty(w: &mut dyn Write, s: &ImpactSummary) -> io::Result<()> {
    pretty_section(w, "Impact")?;
    pretty_kv(w, "Risk", format!("{} ({})", s.risk_score, s.risk_level))?;
    pretty_kv(w, "Net hours", format!("{:+.1}", s.net_hours))?;
    pretty_kv(w, "Delays", s.delayed_count().to_string())?;
    for shift in &s.workload_shifts {
        writeln!(
            w,
            "  {:<16} {:>6.1}h -> {:>6.1}h of {:.1}h",
            shift.member_name, shift.current_hours, shift.proposed_hours, shift.capacity_hours
        )?;
    }
    if !s.resource_conflicts.is_empty() {
        pretty_rule(w)?;
        for conflict in &s.resource_conflicts {
            writeln!(w, "  [{}] {}", conflict.severity, conflict.description)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct Harness {
        #[command(subcommand)]
        command: ProposalCommand,
    }

    fn add_item(args: &[&str]) -> AddItemArgs {
        let argv = ["rt", "add-item"].iter().chain(args.iter());
        match Harness::parse_from(argv).command {
            ProposalCommand::AddItem(args) => args,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn task_shortcuts_build_tagged_state() {
        let args = add_item(&[
            "pr-1", "--action", "add", "--entity", "task", "--title", "Cache", "--hours", "4",
            "--due", "2026-03-01",
        ]);
        let item = args.new_item().expect("item");
        let fields = item
            .proposed_state
            .as_ref()
            .and_then(EntityState::as_task)
            .expect("task fields");
        assert_eq!(fields.title.as_deref(), Some("Cache"));
        assert_eq!(fields.estimated_hours, Some(4.0));
        assert_eq!(fields.due_date.map(|d| d.to_string()).as_deref(), Some("2026-03-01"));
    }

    #[test]
    fn flags_override_state_json() {
        let args = add_item(&[
            "pr-1", "--action", "modify", "--entity", "task", "--target", "task-a",
            "--state", r#"{"title":"Old","priority":"high"}"#, "--title", "New",
        ]);
        let state = args.proposed_state().expect("state").expect("some");
        let fields = state.as_task().expect("task");
        assert_eq!(fields.title.as_deref(), Some("New"));
        assert!(fields.priority.is_some());
    }

    #[test]
    fn bare_remove_has_no_state() {
        let args = add_item(&["pr-1", "--action", "remove", "--entity", "task", "--target", "t"]);
        assert_eq!(args.proposed_state().expect("state"), None);
    }

    #[test]
    fn dependency_uses_target_and_depends_on() {
        let args = add_item(&[
            "pr-1", "--action", "add", "--entity", "dependency", "--target", "task-b",
            "--depends-on", "task-a",
        ]);
        let state = args.proposed_state().expect("state").expect("some");
        assert!(matches!(
            state,
            EntityState::Dependency(ref f)
                if f.task_id.as_deref() == Some("task-b")
                    && f.depends_on_task_id.as_deref() == Some("task-a")
        ));
    }

    #[test]
    fn unknown_state_fields_are_refused() {
        let args = add_item(&[
            "pr-1", "--action", "add", "--entity", "milestone", "--state", r#"{"colour":"red"}"#,
        ]);
        assert!(args.proposed_state().is_err());
    }

    #[test]
    fn recalc_pairs_parse() {
        let args = RecalcArgs {
            id: "pr-1".into(),
            capacity: vec!["ana=10".into()],
            lock: vec!["pi-1=ben".into()],
            complexity: vec!["pi-2=1.5".into()],
        };
        assert!(args.has_assumptions());
        let assumptions = args.assumptions().expect("parse");
        assert_eq!(assumptions.capacity_overrides["ana"], 10.0);
        assert_eq!(assumptions.locked_assignments["pi-1"], "ben");
        assert_eq!(assumptions.complexity_adjustments["pi-2"], 1.5);

        let bad = RecalcArgs {
            id: "pr-1".into(),
            capacity: vec!["ana".into()],
            lock: Vec::new(),
            complexity: Vec::new(),
        };
        assert!(bad.assumptions().is_err());
    }
}
