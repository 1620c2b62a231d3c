//! Content extraction behind an untrusted provider.
//!
//! A [`ContentProvider`] turns a raw submission (transcript, text, file
//! contents, API payload) into response text that must parse as
//! `{"items": [...]}`. The provider runs on a worker thread with a bounded
//! wait. Any failure, whether timeout, transport error or a malformed
//! response, is logged and replaced by a single verbatim "add task" item so
//! the submission is never lost.

use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

use ratify_core::model::item::{EntityType, ItemAction, NewItem};
use ratify_core::model::payload::{EntityState, TaskFields};
use ratify_core::model::proposal::SourceType;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Longest title taken from the first line of a fallback submission.
pub const MAX_FALLBACK_TITLE_CHARS: usize = 120;

const UNTITLED: &str = "Untitled submission";

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

/// Abstraction over the extraction service.
///
/// Implementations only move text; parsing and validation of the response
/// happen here so every provider is held to the same shape.
pub trait ContentProvider: Send + Sync {
    /// Return the raw response for `content`.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] when no response could be produced.
    fn extract(&self, content: &str, source: SourceType) -> Result<String, ProviderError>;
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no content provider is configured")]
    Unavailable,

    #[error("provider did not answer within {0:?}")]
    Timeout(Duration),

    #[error("provider transport failed: {0}")]
    Transport(String),

    #[error("provider response is malformed: {0}")]
    Malformed(String),
}

/// Provider used when no endpoint is configured; every submission falls back.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProvider;

impl ContentProvider for NoProvider {
    fn extract(&self, _content: &str, _source: SourceType) -> Result<String, ProviderError> {
        Err(ProviderError::Unavailable)
    }
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Items produced for one submission and where they came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub items: Vec<NewItem>,
    /// Set when the fallback item was used, holding the provider failure.
    pub fallback_reason: Option<String>,
}

impl Extraction {
    #[must_use]
    pub const fn used_fallback(&self) -> bool {
        self.fallback_reason.is_some()
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ProviderResponse {
    items: Vec<NewItem>,
}

/// Run `provider` on a worker thread and parse its response.
///
/// Never fails: a provider error of any kind yields the fallback item.
#[must_use]
pub fn extract_items(
    provider: &Arc<dyn ContentProvider>,
    content: &str,
    source: SourceType,
    timeout: Duration,
) -> Extraction {
    match call_with_timeout(provider, content, source, timeout).and_then(|raw| parse_response(&raw))
    {
        Ok(items) => {
            debug!(count = items.len(), "provider extracted items");
            Extraction {
                items,
                fallback_reason: None,
            }
        }
        Err(err) => {
            warn!(error = %err, "content provider failed; using verbatim fallback item");
            Extraction {
                items: vec![fallback_item(content)],
                fallback_reason: Some(err.to_string()),
            }
        }
    }
}

fn call_with_timeout(
    provider: &Arc<dyn ContentProvider>,
    content: &str,
    source: SourceType,
    timeout: Duration,
) -> Result<String, ProviderError> {
    let (tx, rx) = mpsc::channel();
    let worker = Arc::clone(provider);
    let text = content.to_string();

    thread::Builder::new()
        .name("ratify-provider".to_string())
        .spawn(move || {
            // The receiver is gone once the caller timed out.
            let _ = tx.send(worker.extract(&text, source));
        })
        .map_err(|err| ProviderError::Transport(err.to_string()))?;

    match rx.recv_timeout(timeout) {
        Ok(reply) => reply,
        Err(mpsc::RecvTimeoutError::Timeout) => Err(ProviderError::Timeout(timeout)),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(ProviderError::Transport(
            "provider worker exited without a reply".to_string(),
        )),
    }
}

/// Parse and validate a provider response.
///
/// # Errors
///
/// Returns [`ProviderError::Malformed`] when the text is not the expected
/// JSON shape, carries no items, or any item fails validation.
pub fn parse_response(raw: &str) -> Result<Vec<NewItem>, ProviderError> {
    let response: ProviderResponse =
        serde_json::from_str(raw).map_err(|err| ProviderError::Malformed(err.to_string()))?;

    if response.items.is_empty() {
        return Err(ProviderError::Malformed("response has no items".to_string()));
    }
    for (idx, item) in response.items.iter().enumerate() {
        item.validate()
            .map_err(|err| ProviderError::Malformed(format!("item {idx}: {err}")))?;
    }
    Ok(response.items)
}

/// The single "add task" item that preserves a submission verbatim.
///
/// The title is the first non-blank line, cut to
/// [`MAX_FALLBACK_TITLE_CHARS`]; the description is the whole content.
#[must_use]
pub fn fallback_item(content: &str) -> NewItem {
    let first_line = content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or(UNTITLED);
    let title: String = first_line.chars().take(MAX_FALLBACK_TITLE_CHARS).collect();

    NewItem {
        action: ItemAction::Add,
        entity_type: EntityType::Task,
        entity_id: None,
        proposed_state: Some(EntityState::Task(TaskFields {
            title: Some(title),
            description: Some(content.to_string()),
            ..TaskFields::default()
        })),
        previous_state: None,
    }
}
