//! Exclusive priority escalation with deferred auto-reset.
//!
//! The shared backend materializes priority as three booleans; this
//! machine guarantees the writer's view never asks for more than one
//! flag at a time. The reset is a deadline ticked from the frame loop,
//! so escalations and resets are serialized at one point. A new
//! escalation replaces the pending reset, which closes the race where a
//! fast sequence of visitors could have an earlier timer clear a later
//! visitor's flag early.

use chrono::{DateTime, Duration, Utc};

/// Priority tier looked up from the visitor directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityTier {
    Low,
    Medium,
    High,
}

impl PriorityTier {
    /// Map a directory priority level to a tier. The directory stores
    /// plain numbers, with 0 the historical default for unknown
    /// visitors; anything unrecognized stays lowest-severity.
    pub fn from_level(level: u8) -> PriorityTier {
        match level {
            0 | 1 => PriorityTier::Low,
            2 => PriorityTier::Medium,
            _ => PriorityTier::High,
        }
    }
}

impl std::fmt::Display for PriorityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PriorityTier::Low => f.write_str("low"),
            PriorityTier::Medium => f.write_str("medium"),
            PriorityTier::High => f.write_str("high"),
        }
    }
}

/// One multi-field update of the three backend flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagWrite {
    pub low: bool,
    pub medium: bool,
    pub high: bool,
}

impl FlagWrite {
    pub const CLEAR: FlagWrite = FlagWrite { low: false, medium: false, high: false };

    pub fn for_tier(tier: PriorityTier) -> FlagWrite {
        FlagWrite {
            low: tier == PriorityTier::Low,
            medium: tier == PriorityTier::Medium,
            high: tier == PriorityTier::High,
        }
    }

    fn raised(&self) -> usize {
        usize::from(self.low) + usize::from(self.medium) + usize::from(self.high)
    }
}

/// Escalation state machine: `Idle` or exactly one raised tier, with a
/// deferred reset back to `Idle` after a fixed delay.
pub struct PriorityMachine {
    reset_delay: Duration,
    current: Option<PriorityTier>,
    reset_due: Option<DateTime<Utc>>,
}

impl PriorityMachine {
    pub fn new(reset_delay: Duration) -> Self {
        Self { reset_delay, current: None, reset_due: None }
    }

    /// Raise exactly one tier flag and schedule the reset. Replaces any
    /// pending reset, so only the latest escalation's deadline counts.
    pub fn escalate(&mut self, tier: PriorityTier, now: DateTime<Utc>) -> FlagWrite {
        self.current = Some(tier);
        self.reset_due = Some(now + self.reset_delay);
        let write = FlagWrite::for_tier(tier);
        debug_assert_eq!(write.raised(), 1);
        write
    }

    /// Fire the deferred reset if its deadline has passed, returning
    /// the all-false write to apply. Called once per frame cycle.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<FlagWrite> {
        let due = self.reset_due?;
        if now < due {
            return None;
        }
        self.reset_due = None;
        self.current = None;
        Some(FlagWrite::CLEAR)
    }

    pub fn current(&self) -> Option<PriorityTier> {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn machine() -> PriorityMachine {
        PriorityMachine::new(Duration::seconds(10))
    }

    #[test]
    fn test_escalate_raises_exactly_one_flag() {
        let mut m = machine();
        for (tier, expect) in [
            (PriorityTier::Low, FlagWrite { low: true, medium: false, high: false }),
            (PriorityTier::Medium, FlagWrite { low: false, medium: true, high: false }),
            (PriorityTier::High, FlagWrite { low: false, medium: false, high: true }),
        ] {
            assert_eq!(m.escalate(tier, ts(0)), expect);
            assert_eq!(m.current(), Some(tier));
        }
    }

    #[test]
    fn test_reset_fires_after_delay() {
        let mut m = machine();
        m.escalate(PriorityTier::Medium, ts(0));
        assert_eq!(m.tick(ts(9)), None);
        assert_eq!(m.tick(ts(10)), Some(FlagWrite::CLEAR));
        assert_eq!(m.current(), None);
    }

    #[test]
    fn test_reset_fires_at_most_once() {
        let mut m = machine();
        m.escalate(PriorityTier::Low, ts(0));
        assert!(m.tick(ts(10)).is_some());
        assert_eq!(m.tick(ts(11)), None);
    }

    #[test]
    fn test_idle_machine_never_resets() {
        let mut m = machine();
        assert_eq!(m.tick(ts(100)), None);
    }

    #[test]
    fn test_new_escalation_supersedes_pending_reset() {
        // Visitor A at t=0, visitor B at t=5: A's deadline (t=10) must
        // not clear B's flag; only B's deadline (t=15) does.
        let mut m = machine();
        m.escalate(PriorityTier::Low, ts(0));
        m.escalate(PriorityTier::High, ts(5));
        assert_eq!(m.tick(ts(10)), None);
        assert_eq!(m.current(), Some(PriorityTier::High));
        assert_eq!(m.tick(ts(15)), Some(FlagWrite::CLEAR));
    }

    #[test]
    fn test_tier_from_level_defaults_low() {
        assert_eq!(PriorityTier::from_level(0), PriorityTier::Low);
        assert_eq!(PriorityTier::from_level(1), PriorityTier::Low);
        assert_eq!(PriorityTier::from_level(2), PriorityTier::Medium);
        assert_eq!(PriorityTier::from_level(3), PriorityTier::High);
        assert_eq!(PriorityTier::from_level(200), PriorityTier::High);
    }
}
