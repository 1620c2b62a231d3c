//! Per-proposal advisory locks.
//!
//! Every state-changing workflow operation holds the lock of the proposal it
//! touches, so two writers never derive a status from the same stale item
//! set. Locks are `fs2` exclusive locks on `<lock_dir>/<proposal_id>.lock`;
//! each acquisition opens its own handle, which makes them hold across
//! threads as well as processes.

use crate::error::ErrorCode;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

/// Default wait before a proposal lock acquisition gives up.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

const FIRST_BACKOFF: Duration = Duration::from_millis(2);
const MAX_BACKOFF: Duration = Duration::from_millis(50);

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("proposal {proposal_id} still locked after {waited:?}")]
    Timeout {
        proposal_id: String,
        waited: Duration,
    },

    /// The id cannot name a file inside the lock directory.
    #[error("{proposal_id:?} is not usable as a lock name")]
    InvalidName { proposal_id: String },

    #[error("lock file: {0}")]
    Io(#[from] io::Error),
}

impl LockError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Timeout { .. } => ErrorCode::LockContention,
            Self::InvalidName { .. } => ErrorCode::ValidationFailed,
            Self::Io(_) => ErrorCode::StoreWriteFailed,
        }
    }
}

/// Exclusive hold on one proposal. Released on drop.
#[derive(Debug)]
pub struct ProposalLock {
    file: File,
    path: PathBuf,
}

impl ProposalLock {
    /// Wait up to `timeout` for the lock on `proposal_id`, backing off
    /// between attempts.
    ///
    /// # Errors
    ///
    /// [`LockError::InvalidName`] for an id that is not a plain file name,
    /// [`LockError::Timeout`] when another holder outlasts `timeout`, or an
    /// I/O error when the lock file cannot be opened.
    pub fn acquire(
        lock_dir: &Path,
        proposal_id: &str,
        timeout: Duration,
    ) -> Result<Self, LockError> {
        if !is_lock_name(proposal_id) {
            return Err(LockError::InvalidName {
                proposal_id: proposal_id.to_string(),
            });
        }
        fs::create_dir_all(lock_dir)?;
        let path = lock_path(lock_dir, proposal_id);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)?;

        let started = Instant::now();
        let mut backoff = FIRST_BACKOFF;
        while file.try_lock_exclusive().is_err() {
            let waited = started.elapsed();
            if waited >= timeout {
                return Err(LockError::Timeout {
                    proposal_id: proposal_id.to_string(),
                    waited,
                });
            }
            thread::sleep(backoff.min(timeout.saturating_sub(waited)));
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }

        Ok(Self { file, path })
    }

    /// Release now instead of at end of scope.
    pub fn release(self) {
        drop(self);
    }

    /// Delete the lock file, then release. For proposals that no longer
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns the I/O error when the file cannot be removed; the lock is
    /// released either way.
    pub fn remove(self) -> Result<(), LockError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ProposalLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn is_lock_name(proposal_id: &str) -> bool {
    !proposal_id.is_empty()
        && proposal_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

#[must_use]
pub fn lock_path(lock_dir: &Path, proposal_id: &str) -> PathBuf {
    lock_dir.join(format!("{proposal_id}.lock"))
}
