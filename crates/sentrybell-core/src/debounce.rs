//! Per-identity cooldown windows.
//!
//! Each effect (console notification, attendance record) gets its own
//! ledger with its own window. Wall clock is always passed in, never
//! read internally, so gating is deterministic under injected time.

use crate::types::VisitorKey;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Time-windowed gate mapping visitor keys to their last trigger.
///
/// Entries are created on first trigger and updated on every later
/// trigger; nothing is ever evicted. One entry per distinct visitor is
/// an accepted cost for a long-running process.
pub struct CooldownLedger {
    window: Duration,
    last_trigger: HashMap<VisitorKey, DateTime<Utc>>,
}

impl CooldownLedger {
    pub fn new(window: Duration) -> Self {
        Self { window, last_trigger: HashMap::new() }
    }

    /// Check-then-commit: returns true (and records `now`) iff the
    /// visitor has never triggered or the window has fully elapsed.
    /// A rejected check leaves the stored timestamp untouched.
    pub fn check_and_commit(&mut self, key: &VisitorKey, now: DateTime<Utc>) -> bool {
        if let Some(&last) = self.last_trigger.get(key) {
            if now - last < self.window {
                return false;
            }
        }
        self.last_trigger.insert(key.clone(), now);
        true
    }

    /// Number of visitors seen at least once.
    pub fn tracked(&self) -> usize {
        self.last_trigger.len()
    }
}
