pub mod comment;
pub mod completions;
pub mod import;
pub mod init;
pub mod merge;
pub mod proposal;
pub mod review;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use ratify_core::config::{EffectiveConfig, WORKSPACE_DIR};
use ratify_core::db;
use ratify_core::error::ErrorCode;
use ratify_workflow::ProposalService;

use crate::actor;
use crate::output::{CliError, OutputMode, render_error};
use crate::provider::HttpProvider;

/// Everything a command handler needs from the invocation.
#[derive(Debug)]
pub struct Context {
    pub root: PathBuf,
    pub output: OutputMode,
    pub actor_flag: Option<String>,
    pub config: EffectiveConfig,
}

impl Context {
    /// Service over this workspace, wired to the configured provider.
    ///
    /// # Errors
    ///
    /// Fails with `E1001` when `rt init` has not been run here.
    pub fn service(&self) -> anyhow::Result<ProposalService> {
        let store = self.root.join(WORKSPACE_DIR).join(db::STORE_FILE);
        if !store.exists() {
            let code = ErrorCode::NotInitialized;
            render_error(
                self.output,
                &CliError::with_details(
                    format!("{} in {}", code.message(), self.root.display()),
                    code.hint().unwrap_or_default(),
                    code.code(),
                ),
            )?;
            bail!("workspace not initialized");
        }

        let project = self.config.project.clone();
        let endpoint = project.provider.endpoint.clone();
        let timeout = Duration::from_millis(project.advisor.provider_timeout_ms);
        let mut service = ProposalService::for_workspace(&self.root, project);
        if let Some(endpoint) = endpoint {
            service = service.with_provider(Arc::new(HttpProvider::new(endpoint, timeout)));
        }
        Ok(service)
    }

    /// The acting user for a mutating command.
    ///
    /// # Errors
    ///
    /// Fails when no identity source is set.
    pub fn actor(&self) -> anyhow::Result<String> {
        match actor::require_actor(self.actor_flag.as_deref(), self.config.user.actor.as_deref()) {
            Ok(actor) => Ok(actor),
            Err(err) => {
                render_error(self.output, &err)?;
                bail!("{}", err.message);
            }
        }
    }
}
