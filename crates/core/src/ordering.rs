// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock tiers and acquisition-order enforcement
//!
//! Every lock in the cell has a numbered tier. A thread must acquire locks
//! in ascending tier order; holding the state lock while taking the
//! coordination lock is the circular-wait shape that deadlocks. [`TierGuard`]
//! asserts the order in debug builds; in release builds only the
//! thread-local bookkeeping remains.

/// Lock tiers in acquisition order. A thread must never acquire a lock at a
/// tier ≤ any tier it already holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LockTier {
    /// Coordination (escalation) lock, always taken first.
    Coordination = 1,
    /// State lock guarding the shared value.
    State = 2,
}

impl LockTier {
    /// Human-readable name for diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Coordination => "coordination",
            Self::State => "state",
        }
    }
}

impl std::fmt::Display for LockTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

thread_local! {
    /// Highest tier held by the current thread. 0 means no lock is held.
    static HELD_TIER: std::cell::Cell<u8> = const { std::cell::Cell::new(0) };
}

/// RAII guard tracking the tier of a lock the current thread is about to
/// acquire. Construction verifies the requested tier exceeds every tier
/// already held; drop restores the previous tier.
#[derive(Debug)]
pub struct TierGuard {
    previous: u8,
}

impl TierGuard {
    /// Record acquisition of the given tier.
    ///
    /// # Panics
    ///
    /// Panics (in debug builds) if `tier` is less than or equal to a tier
    /// the current thread already holds.
    #[must_use]
    #[inline]
    pub fn acquire(tier: LockTier) -> Self {
        let tier_u8 = tier as u8;
        let previous = HELD_TIER.with(std::cell::Cell::get);

        #[cfg(debug_assertions)]
        {
            assert!(
                tier_u8 > previous,
                "lock ordering violation: acquiring {tier} (tier {tier_u8}) \
                 while already holding a lock at tier {previous}",
            );
        }

        HELD_TIER.with(|h| h.set(tier_u8));
        Self { previous }
    }
}

impl Drop for TierGuard {
    fn drop(&mut self) {
        HELD_TIER.with(|h| h.set(self.previous));
    }
}

#[cfg(test)]
#[path = "ordering_tests.rs"]
mod tests;
