// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cell configuration
//!
//! Controls the wake policy and the optional bound on handoff waits.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which waiters a notify wakes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WakePolicy {
    /// Wake a single waiter. The handoff is one-to-one by default.
    #[default]
    One,
    /// Wake every waiter. For cells expecting multiple concurrent waiters.
    All,
}

/// Cell configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CellConfig {
    /// Name identifying this cell in log events
    pub name: String,
    /// Which waiters a notify wakes
    #[serde(default)]
    pub wake: WakePolicy,
    /// Optional bound on how long a waiter blocks before giving up
    #[serde(
        default,
        with = "humantime_serde::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub wait_timeout: Option<Duration>,
}

impl CellConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            wake: WakePolicy::One,
            wait_timeout: None,
        }
    }

    pub fn with_wake(mut self, wake: WakePolicy) -> Self {
        self.wake = wake;
        self
    }

    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
