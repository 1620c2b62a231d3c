//! Actor identity resolution.
//!
//! The chain: `--actor` flag > `RATIFY_ACTOR` env > user config `actor` >
//! `USER` env. Mutating commands require an actor; reads work without one.

use std::env;

use crate::output::CliError;

/// Environment reader, swapped out in tests.
trait EnvReader {
    fn get(&self, key: &str) -> Option<String>;
}

struct RealEnv;

impl EnvReader for RealEnv {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok().filter(|v| !v.trim().is_empty())
    }
}

fn resolve_actor_with(
    cli_flag: Option<&str>,
    configured: Option<&str>,
    env: &dyn EnvReader,
) -> Option<String> {
    if let Some(actor) = cli_flag.filter(|actor| !actor.trim().is_empty()) {
        return Some(actor.to_string());
    }
    if let Some(actor) = env.get("RATIFY_ACTOR") {
        return Some(actor);
    }
    if let Some(actor) = configured.filter(|actor| !actor.trim().is_empty()) {
        return Some(actor.to_string());
    }
    env.get("USER")
}

/// Resolve the acting user, or explain how to set one.
///
/// # Errors
///
/// Returns a [`CliError`] when no source names an actor.
pub fn require_actor(cli_flag: Option<&str>, configured: Option<&str>) -> Result<String, CliError> {
    resolve_actor_with(cli_flag, configured, &RealEnv).ok_or_else(|| {
        CliError::with_details(
            "no actor identity",
            "pass --actor <id> or set RATIFY_ACTOR",
            "E2003",
        )
    })
}
