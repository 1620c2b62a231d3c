#![forbid(unsafe_code)]
//! ratify-impact library.
//!
//! Pure engines over a [`ratify_core::model::project::ProjectContext`]
//! snapshot: nothing here touches the store or the clock.
//!
//! # Conventions
//!
//! - **Determinism**: ordered maps and sorted outputs; callers pass `now_us`.
//! - **Logging**: `tracing` at debug level only; these run inside transitions.

pub mod advisor;
pub mod graph;
pub mod impact;

pub use advisor::{Advice, Advisor};
pub use graph::DependencyGraph;
pub use impact::{ImpactCalculator, risk_level, risk_score};
