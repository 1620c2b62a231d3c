//! Identifier and timestamp helpers.
//!
//! Ids look like `pr-3f9a0c12d4`: a short prefix naming the record kind and
//! ten hex digits of a BLAKE3 hash over the prefix, the wall clock, a
//! process-wide counter and caller-supplied seed text.

use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};

pub const PROPOSAL_PREFIX: &str = "pr";
pub const ITEM_PREFIX: &str = "pi";
pub const COMMENT_PREFIX: &str = "dc";
pub const TASK_PREFIX: &str = "task";
pub const MILESTONE_PREFIX: &str = "ms";

const ID_HEX_LEN: usize = 10;

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Mint a new id with the given prefix.
#[must_use]
pub fn new_id(prefix: &str, seed: &str) -> String {
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();

    let mut hasher = blake3::Hasher::new();
    hasher.update(prefix.as_bytes());
    hasher.update(&nanos.to_le_bytes());
    hasher.update(&count.to_le_bytes());
    hasher.update(&std::process::id().to_le_bytes());
    hasher.update(seed.as_bytes());
    let hex = hasher.finalize().to_hex();

    format!("{prefix}-{}", &hex.as_str()[..ID_HEX_LEN])
}

/// Whether `id` looks like one minted by [`new_id`] with `prefix`.
#[must_use]
pub fn has_shape(prefix: &str, id: &str) -> bool {
    id.strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('-'))
        .is_some_and(|hex| {
            hex.len() == ID_HEX_LEN && hex.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        })
}

/// Current wall clock in microseconds since the Unix epoch.
#[must_use]
pub fn now_us() -> i64 {
    Utc::now().timestamp_micros()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_carry_prefix_and_fixed_width() {
        let id = new_id(PROPOSAL_PREFIX, "Quarterly plan");
        assert!(id.starts_with("pr-"));
        assert_eq!(id.len(), "pr-".len() + ID_HEX_LEN);
        assert!(id[3..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn shape_check_accepts_minted_ids_only() {
        assert!(has_shape(PROPOSAL_PREFIX, &new_id(PROPOSAL_PREFIX, "x")));
        assert!(!has_shape(PROPOSAL_PREFIX, &new_id(ITEM_PREFIX, "x")));
        assert!(!has_shape(PROPOSAL_PREFIX, "pr-3f9a0c12d"));
        assert!(!has_shape(PROPOSAL_PREFIX, "pr-3F9A0C12D4"));
        assert!(!has_shape(PROPOSAL_PREFIX, "../../escaped"));
        assert!(!has_shape(PROPOSAL_PREFIX, "pr-../../x1"));
    }

    #[test]
    fn ids_are_unique_for_identical_seeds() {
        let ids: HashSet<String> = (0..500).map(|_| new_id(ITEM_PREFIX, "same")).collect();
        assert_eq!(ids.len(), 500);
    }
}
