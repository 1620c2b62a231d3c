#![forbid(unsafe_code)]
//! Proposal review and merge workflow.
//!
//! [`ProposalService`] drives a proposal from draft to applied:
//!
//! - drafting: create, add and remove items, or turn source content into
//!   items through a [`ContentProvider`]
//! - review: submit, per-item decisions, derived proposal status, planning
//!   assumptions and impact recalculation
//! - merge: per-item atomic application of approved items to the live
//!   project, safe to retry
//! - discussion: comment threads on proposals and items, and their
//!   resolution
//!
//! Every operation opens its own store connection, so a single service
//! value can be shared across threads.

pub mod assumptions;
pub mod discussion;
pub mod merge;
pub mod provider;
pub mod seed;
pub mod service;
pub mod targets;

pub use assumptions::Assumptions;
pub use merge::{MergeFailure, MergeResult};
pub use provider::{ContentProvider, NoProvider, ProviderError};
pub use seed::{ImportReport, ProjectSeed};
pub use service::{ProposalFilter, ProposalService};
