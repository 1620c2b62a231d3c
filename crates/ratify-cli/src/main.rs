#![forbid(unsafe_code)]

mod actor;
mod cmd;
mod output;
mod provider;

use clap::{CommandFactory, Parser, Subcommand};
use output::{CliError, OutputMode, render_error};
use ratify_core::config::resolve_config;
use ratify_core::error::ErrorCode;
use std::env;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "ratify: reviewed change proposals for project plans",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Act as this user (overrides RATIFY_ACTOR and config).
    #[arg(long, global = true)]
    actor: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Workspace",
        about = "Initialize a ratify workspace",
        long_about = "Create .ratify/ with the store, lock directory and a config template.",
        after_help = "EXAMPLES:\n    # Initialize in the current directory\n    rt init\n\n    # Rewrite the config template\n    rt init --force"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Workspace",
        about = "Load a project seed",
        long_about = "Upsert a project with its members, milestones, tasks and dependencies from JSON.",
        after_help = "EXAMPLES:\n    # Import a project\n    rt import apollo.json\n\n    # Emit machine-readable output\n    rt import apollo.json --json"
    )]
    Import(cmd::import::ImportArgs),

    #[command(
        next_help_heading = "Proposals",
        about = "Draft, submit and inspect proposals",
        after_help = "EXAMPLES:\n    # Start a draft from a transcript\n    rt proposal create --project proj --title \"Beta prep\" --source voice --content-file call.txt\n\n    # Propose a new task\n    rt proposal add-item pr-1a2b --action add --entity task --title \"Load test\" --hours 6\n\n    # Send for review\n    rt proposal submit pr-1a2b"
    )]
    Proposal {
        #[command(subcommand)]
        command: cmd::proposal::ProposalCommand,
    },

    #[command(
        next_help_heading = "Review",
        about = "Decide on a proposal item",
        long_about = "Approve, reject or flag one item for discussion. Only the approver may review.",
        after_help = "EXAMPLES:\n    # Approve an item\n    rt review pi-9f3c --decision approved\n\n    # Ask for discussion\n    rt review pi-9f3c -d needs_discussion --notes \"too big\""
    )]
    Review(cmd::review::ReviewArgs),

    #[command(
        next_help_heading = "Review",
        about = "Apply approved items",
        long_about = "Apply every approved, unapplied item of a decided proposal to the live project.",
        after_help = "EXAMPLES:\n    # Merge a proposal\n    rt merge pr-1a2b\n\n    # Emit machine-readable output\n    rt merge pr-1a2b --json"
    )]
    Merge(cmd::merge::MergeArgs),

    #[command(
        next_help_heading = "Review",
        about = "Discuss a proposal or item",
        after_help = "EXAMPLES:\n    # Comment on an item\n    rt comment add pr-1a2b --item pi-9f3c -m \"Can ben take this?\"\n\n    # Resolve the item thread\n    rt comment resolve pr-1a2b --item pi-9f3c"
    )]
    Comment {
        #[command(subcommand)]
        command: cmd::comment::CommentCommand,
    },

    #[command(
        next_help_heading = "Workspace",
        about = "Generate shell completion scripts",
        after_help = "EXAMPLES:\n    # Generate bash completions\n    rt completions bash"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("RATIFY_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "ratify=debug,info"
        } else {
            "ratify=info,warn"
        })
    });

    let format = env::var("RATIFY_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    // stdout carries command output; logs always go to stderr.
    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let root = env::current_dir()?;
    let fallback_output = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };

    // Init runs before any config exists and completions need none.
    match cli.command {
        Commands::Init(ref args) => return cmd::init::run_init(args, fallback_output, &root),
        Commands::Completions(ref args) => {
            let mut command = Cli::command();
            return cmd::completions::run_completions(args.shell, &mut command);
        }
        _ => {}
    }

    let config = match resolve_config(&root, cli.json) {
        Ok(config) => config,
        Err(err) => {
            let code = ErrorCode::ConfigParseError;
            render_error(
                fallback_output,
                &CliError::with_details(
                    format!("{}: {err:#}", code.message()),
                    code.hint().unwrap_or_default(),
                    code.code(),
                ),
            )?;
            return Err(err);
        }
    };
    debug!(output = %config.resolved_output, "resolved config");

    let ctx = cmd::Context {
        output: OutputMode::from_resolved(&config.resolved_output),
        root,
        actor_flag: cli.actor.clone(),
        config,
    };

    match &cli.command {
        Commands::Import(args) => cmd::import::run_import(args, &ctx),
        Commands::Proposal { command } => cmd::proposal::run_proposal(command, &ctx),
        Commands::Review(args) => cmd::review::run_review(args, &ctx),
        Commands::Merge(args) => cmd::merge::run_merge(args, &ctx),
        Commands::Comment { command } => cmd::comment::run_comment(command, &ctx),
        Commands::Init(_) | Commands::Completions(_) => Ok(()),
    }
}
