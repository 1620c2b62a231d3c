use anyhow::{Context as _, Result, bail};
use clap::Args;
use ratify_core::config::WORKSPACE_DIR;
use ratify_core::db;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use crate::output::{OutputMode, pretty_kv, render_mode};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Rewrite the config template even if `.ratify/` already exists.
    #[arg(long)]
    pub force: bool,
}

const CONFIG_TOML: &str = "# Overage percent at or below which a conflict is low/medium/high.\n\
    [impact]\n\
    low_max_pct = 10.0\n\
    medium_max_pct = 25.0\n\
    high_max_pct = 50.0\n\
    \n\
    [advisor]\n\
    provider_timeout_ms = 5000\n\
    \n\
    [merge]\n\
    require_all_items = false\n\
    \n\
    # [provider]\n\
    # endpoint = \"http://localhost:8080/extract\"\n";

const GITIGNORE: &str = "ratify.sqlite3*\nlocks/\n";

#[derive(Debug, Serialize)]
struct InitReport {
    workspace: String,
    store: String,
    config_written: bool,
}

/// Execute `rt init`. Creates the workspace:
///
/// ```text
/// .ratify/
///   ratify.sqlite3   (store, schema migrated)
///   locks/           (per-proposal lock files)
///   config.toml      (policy template)
///   .gitignore
/// ```
///
/// # Errors
///
/// Fails if `.ratify/` exists without `--force`, or on any filesystem or
/// store error.
pub fn run_init(args: &InitArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let dir = project_root.join(WORKSPACE_DIR);
    if dir.exists() && !args.force {
        bail!(".ratify/ already exists. Use `rt init --force` to reinitialize.");
    }

    let locks = dir.join("locks");
    std::fs::create_dir_all(&locks)
        .with_context(|| format!("Failed to create {}", locks.display()))?;

    let config_path = dir.join("config.toml");
    let config_written = args.force || !config_path.exists();
    if config_written {
        std::fs::write(&config_path, CONFIG_TOML)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
    }
    let gitignore = dir.join(".gitignore");
    std::fs::write(&gitignore, GITIGNORE)
        .with_context(|| format!("Failed to write {}", gitignore.display()))?;

    let store = dir.join(db::STORE_FILE);
    db::open_store(&store).with_context(|| format!("Failed to open {}", store.display()))?;

    let report = InitReport {
        workspace: dir.display().to_string(),
        store: store.display().to_string(),
        config_written,
    };
    render_mode(
        output,
        &report,
        |r, w| writeln!(w, "{}", r.store),
        |r, w| {
            writeln!(w, "Initialized ratify workspace.")?;
            writeln!(w)?;
            pretty_kv(w, "Store", &r.store)?;
            pretty_kv(w, "Config", format!("{}/config.toml", r.workspace))?;
            writeln!(w)?;
            writeln!(w, "Next: load a project with `rt import project.json`.")
        },
    )
}
