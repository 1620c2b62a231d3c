//! Data model, typed payloads, error codes, configuration, advisory locks
//! and the SQLite store shared by the ratify workflow engine.

pub mod config;
pub mod db;
pub mod error;
pub mod id;
pub mod lock;
pub mod model;

pub use error::{ErrorCode, RatifyError, Result};
