use serde::{Deserialize, Serialize};

/// A comment on a proposal, or on one item of it when `item_id` is set.
///
/// Comments reference proposals and items by id only; they outlive a
/// discarded proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub proposal_id: String,
    pub item_id: Option<String>,
    pub parent_id: Option<String>,
    pub author_id: String,
    pub body: String,
    pub created_at_us: i64,
    pub edited_at_us: Option<i64>,
}

/// Identifies a discussion thread: the proposal-level thread, or the thread
/// of a single item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadRef {
    pub proposal_id: String,
    pub item_id: Option<String>,
}

impl ThreadRef {
    pub fn new(proposal_id: impl Into<String>, item_id: Option<String>) -> Self {
        Self {
            proposal_id: proposal_id.into(),
            item_id,
        }
    }

    /// Key stored in the resolution table; the proposal thread uses `""`.
    #[must_use]
    pub fn item_key(&self) -> &str {
        self.item_id.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadResolution {
    pub proposal_id: String,
    pub item_id: Option<String>,
    pub resolved_by: String,
    pub resolved_at_us: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComment {
    pub proposal_id: String,
    #[serde(default)]
    pub item_id: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub author_id: String,
    pub body: String,
}
