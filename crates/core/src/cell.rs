// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Guarded state cell with two-tier locking and a wait/notify handoff
//!
//! A [`StateCell`] owns one integer guarded by its state mutex. A second,
//! coordination-tier mutex is taken before the state mutex on the escalation
//! path of [`StateCell::check_and_invoke`], so every caller that ever holds
//! both locks acquires them in the same global order.
//!
//! The wait side of the handoff loops on a generation counter rather than
//! trusting a single wakeup: a notify that raced ahead of the wait, and any
//! spurious wakeup, leave the waiter blocked until a real handoff arrives.

use crate::config::{CellConfig, WakePolicy};
use crate::ordering::{LockTier, TierGuard};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CellError {
    /// A thread panicked while holding the named lock; the cell is no
    /// longer trustworthy and the fault propagates to every later caller.
    #[error("{0} lock poisoned")]
    Poisoned(LockTier),
    /// The configured bound on the handoff wait elapsed before a notify
    /// arrived.
    #[error("handoff wait timed out after {0:?}")]
    HandoffTimeout(Duration),
}

/// Value plus handoff generation, both guarded by the state mutex.
#[derive(Debug)]
struct CellState {
    value: i64,
    /// Incremented by every [`StateCell::store_and_notify`]. Waiters capture
    /// it before blocking and loop until it moves.
    handoffs: u64,
}

/// A shared integer cell coordinating cooperating threads.
///
/// Share it as `&StateCell` or `Arc<StateCell>`; every operation takes
/// `&self`.
pub struct StateCell {
    config: CellConfig,
    /// Escalation lock. Acquired before `state` whenever both are held.
    coordination: Mutex<()>,
    state: Mutex<CellState>,
    ready: Condvar,
}

impl StateCell {
    /// Create a cell holding `0`.
    pub fn new(config: CellConfig) -> Self {
        Self::with_value(config, 0)
    }

    /// Create a cell holding the given starting value.
    pub fn with_value(config: CellConfig, value: i64) -> Self {
        Self {
            config,
            coordination: Mutex::new(()),
            state: Mutex::new(CellState { value, handoffs: 0 }),
            ready: Condvar::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Read the current value under the state lock.
    pub fn value(&self) -> Result<i64, CellError> {
        let (_tier, state) = self.lock_state()?;
        Ok(state.value)
    }

    /// Run `on_match` if the value equals `expected`, double-checked.
    ///
    /// The cheap single-lock check keeps the common non-matching case off
    /// the dual-lock path; a match escalates to coordination-then-state and
    /// re-checks before `on_match` runs with both locks held. Returns
    /// whether `on_match` ran. A value that changed between the two checks
    /// is the designed no-op path, not an error.
    ///
    /// `on_match` must not re-enter the cell: both locks are held while it
    /// runs and neither is reentrant.
    pub fn check_and_invoke<F>(&self, expected: i64, on_match: F) -> Result<bool, CellError>
    where
        F: FnOnce(i64),
    {
        let matched = {
            let (_tier, state) = self.lock_state()?;
            state.value == expected
        };
        if !matched {
            tracing::trace!(cell = %self.config.name, expected, "fast-path check missed");
            return Ok(false);
        }
        self.escalate_and_invoke(expected, on_match)
    }

    /// Slow path: both locks in tier order, then the re-check that closes
    /// the race window between the fast check and the escalation.
    fn escalate_and_invoke<F>(&self, expected: i64, on_match: F) -> Result<bool, CellError>
    where
        F: FnOnce(i64),
    {
        // Coordination before state, never reversed.
        let (_outer_tier, _outer) = self.lock_coordination()?;
        let (_inner_tier, state) = self.lock_state()?;
        if state.value != expected {
            tracing::trace!(
                cell = %self.config.name,
                expected,
                actual = state.value,
                "re-check under both locks missed"
            );
            return Ok(false);
        }
        on_match(expected);
        Ok(true)
    }

    /// Write the value, then block until a handoff arrives.
    ///
    /// The state lock is released while blocked and re-acquired on wakeup,
    /// and the wait loops on the handoff generation captured before
    /// blocking. Returns the value observed at wakeup (the notifier's
    /// value, not `value`). The `on_complete` continuation runs after every
    /// lock is released.
    ///
    /// With [`CellConfig::wait_timeout`] set, the wait is bounded by a fixed
    /// deadline (spurious wakeups do not extend it); on expiry the call
    /// fails with [`CellError::HandoffTimeout`] and `on_complete` does not
    /// run.
    pub fn store_and_wait<F>(&self, value: i64, on_complete: F) -> Result<i64, CellError>
    where
        F: FnOnce(),
    {
        let observed = {
            let (_tier, mut state) = self.lock_state()?;
            state.value = value;
            let baseline = state.handoffs;
            let deadline = self
                .config
                .wait_timeout
                .map(|limit| (limit, Instant::now() + limit));
            tracing::debug!(cell = %self.config.name, value, "waiting for handoff");

            while state.handoffs == baseline {
                state = match deadline {
                    None => self
                        .ready
                        .wait(state)
                        .map_err(|_| CellError::Poisoned(LockTier::State))?,
                    Some((limit, at)) => {
                        let now = Instant::now();
                        if now >= at {
                            tracing::warn!(
                                cell = %self.config.name,
                                timeout = ?limit,
                                "handoff wait timed out"
                            );
                            return Err(CellError::HandoffTimeout(limit));
                        }
                        let (next, _timed_out) = self
                            .ready
                            .wait_timeout(state, at - now)
                            .map_err(|_| CellError::Poisoned(LockTier::State))?;
                        next
                    }
                };
            }
            tracing::debug!(
                cell = %self.config.name,
                observed = state.value,
                "handoff delivered"
            );
            state.value
        };
        on_complete();
        Ok(observed)
    }

    /// Write the value and wake waiter(s) per the configured policy, then
    /// run `on_complete` outside any lock.
    pub fn store_and_notify<F>(&self, value: i64, on_complete: F) -> Result<(), CellError>
    where
        F: FnOnce(),
    {
        {
            let (_tier, mut state) = self.lock_state()?;
            state.value = value;
            state.handoffs += 1;
            match self.config.wake {
                WakePolicy::One => self.ready.notify_one(),
                WakePolicy::All => self.ready.notify_all(),
            }
            tracing::debug!(cell = %self.config.name, value, "handoff notified");
        }
        on_complete();
        Ok(())
    }

    fn lock_state(&self) -> Result<(TierGuard, MutexGuard<'_, CellState>), CellError> {
        let tier = TierGuard::acquire(LockTier::State);
        let guard = self
            .state
            .lock()
            .map_err(|_| CellError::Poisoned(LockTier::State))?;
        Ok((tier, guard))
    }

    fn lock_coordination(&self) -> Result<(TierGuard, MutexGuard<'_, ()>), CellError> {
        let tier = TierGuard::acquire(LockTier::Coordination);
        let guard = self
            .coordination
            .lock()
            .map_err(|_| CellError::Poisoned(LockTier::Coordination))?;
        Ok((tier, guard))
    }
}

impl std::fmt::Debug for StateCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateCell")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "cell_tests.rs"]
mod tests;
