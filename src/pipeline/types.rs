//! Shared types for the rule-application pipeline.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::DispatchError;
use crate::rules::Action;

// ── Clock ───────────────────────────────────────────────────────────

/// Source of the reference instant for relative date conditions.
///
/// Read once per run so every message in a run sees the same `now`.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A pinned instant, for reproducible runs and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

// ── Action dispatcher trait ─────────────────────────────────────────

/// Applies actions to the system that owns the messages.
///
/// The engine only decides; implementations of this trait perform the
/// side effects (local store, dry-run log, a remote mail provider).
#[async_trait]
pub trait ActionDispatcher: Send + Sync {
    /// Dispatcher name for logging (e.g. "store", "dry-run").
    fn name(&self) -> &str;

    /// Apply one action to one message.
    async fn apply(&self, message_id: &str, action: &Action) -> Result<(), DispatchError>;
}

// ── Run summary ─────────────────────────────────────────────────────

/// Counters for one pass of the rule set over the stored messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Messages fully evaluated.
    pub evaluated: usize,
    /// Messages that matched at least one rule.
    pub matched: usize,
    /// Messages skipped for missing data.
    pub skipped: usize,
    /// Rule evaluations skipped because a condition could not be interpreted.
    pub rule_errors: usize,
    pub actions_dispatched: usize,
    pub actions_failed: usize,
}

impl RunSummary {
    pub fn merge(&mut self, other: RunSummary) {
        self.evaluated += other.evaluated;
        self.matched += other.matched;
        self.skipped += other.skipped;
        self.rule_errors += other.rule_errors;
        self.actions_dispatched += other.actions_dispatched;
        self.actions_failed += other.actions_failed;
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} evaluated, {} matched, {} skipped, {} rule errors, {} actions applied, {} failed",
            self.evaluated,
            self.matched,
            self.skipped,
            self.rule_errors,
            self.actions_dispatched,
            self.actions_failed
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn fixed_clock_is_pinned() {
        let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let clock = FixedClock(at);
        assert_eq!(clock.now(), at);
        assert_eq!(clock.now(), at);
    }

    #[test]
    fn system_clock_moves_forward() {
        let before = Utc::now();
        let now = SystemClock.now();
        assert!(now >= before);
    }

    #[test]
    fn summary_merge_and_display() {
        let mut total = RunSummary {
            evaluated: 1,
            matched: 1,
            actions_dispatched: 2,
            ..Default::default()
        };
        total.merge(RunSummary {
            evaluated: 1,
            skipped: 1,
            actions_failed: 1,
            ..Default::default()
        });
        assert_eq!(total.evaluated, 2);
        assert_eq!(total.skipped, 1);
        assert_eq!(
            total.to_string(),
            "2 evaluated, 1 matched, 1 skipped, 0 rule errors, 2 actions applied, 1 failed"
        );
    }
}
