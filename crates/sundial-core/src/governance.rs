//! Timelocked governance values.
//!
//! Any governance-settable parameter is wrapped in [`Timelocked`]: a change
//! is first proposed, becomes applicable only after the timelock elapses,
//! and the whole handle can be locked permanently as a one-way door.

use serde::{Deserialize, Serialize};

use crate::error::GovernanceError;
use crate::types::Timestamp;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
struct Pending<T> {
    proposed: T,
    requested_at: Timestamp,
}

/// A value that can only change through propose → wait → apply.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Timelocked<T> {
    current: T,
    pending: Option<Pending<T>>,
    timelock: u64,
    locked: bool,
}

impl<T> Timelocked<T> {
    pub fn new(initial: T, timelock: u64) -> Self {
        Self { current: initial, pending: None, timelock, locked: false }
    }

    pub fn current(&self) -> &T {
        &self.current
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Record a pending change. One at a time; cancel first to replace.
    pub fn propose(&mut self, value: T, now: Timestamp) -> Result<(), GovernanceError> {
        if self.locked {
            return Err(GovernanceError::PermanentlyLocked);
        }
        if self.pending.is_some() {
            return Err(GovernanceError::ChangePending);
        }
        self.pending = Some(Pending { proposed: value, requested_at: now });
        Ok(())
    }

    /// Make the pending change current once the timelock has elapsed.
    pub fn apply(&mut self, now: Timestamp) -> Result<&T, GovernanceError> {
        if self.locked {
            return Err(GovernanceError::PermanentlyLocked);
        }
        let pending = self.pending.as_ref().ok_or(GovernanceError::NoPendingChange)?;
        if now < pending.requested_at.saturating_add(self.timelock) {
            return Err(GovernanceError::TimelockNotElapsed);
        }
        // Checked above; take() after the checks so a failed apply changes nothing.
        if let Some(p) = self.pending.take() {
            self.current = p.proposed;
        }
        Ok(&self.current)
    }

    pub fn cancel(&mut self) -> Result<(), GovernanceError> {
        if self.locked {
            return Err(GovernanceError::PermanentlyLocked);
        }
        if self.pending.take().is_none() {
            return Err(GovernanceError::NoPendingChange);
        }
        Ok(())
    }

    /// One-way: the current value becomes immutable forever.
    pub fn lock_permanently(&mut self) {
        self.pending = None;
        self.locked = true;
    }
}
