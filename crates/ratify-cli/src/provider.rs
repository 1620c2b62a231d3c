//! HTTP content provider.
//!
//! POSTs `{"content": ..., "source_type": ...}` to the configured endpoint
//! and hands the response body back untouched; the workflow parses and
//! validates it.

use std::time::Duration;

use ratify_core::model::proposal::SourceType;
use ratify_workflow::{ContentProvider, ProviderError};
use serde_json::json;
use tracing::debug;

#[derive(Debug)]
pub struct HttpProvider {
    endpoint: String,
    agent: ureq::Agent,
}

impl HttpProvider {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            endpoint: endpoint.into(),
            agent,
        }
    }
}

impl ContentProvider for HttpProvider {
    fn extract(&self, content: &str, source: SourceType) -> Result<String, ProviderError> {
        debug!(endpoint = %self.endpoint, source = %source, "calling content provider");
        let response = self
            .agent
            .post(&self.endpoint)
            .send_json(json!({
                "content": content,
                "source_type": source.as_str(),
            }))
            .map_err(|err| match err {
                ureq::Error::Status(code, _) => {
                    ProviderError::Transport(format!("endpoint returned HTTP {code}"))
                }
                ureq::Error::Transport(transport) => ProviderError::Transport(transport.to_string()),
            })?;

        response
            .into_string()
            .map_err(|err| ProviderError::Transport(err.to_string()))
    }
}
