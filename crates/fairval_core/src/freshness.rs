//! Market-data vs filing-period freshness check.
//!
//! The guard itself is pure date arithmetic; what to do about a breach
//! (warn and record, or reject) is the resolver's call.

use jiff::civil::Date;

use crate::config::TimeAlignmentConfig;
use crate::model::TimeAlignmentReport;

/// Evaluates the gap between the market snapshot's `as_of` and the
/// filing's `period_end_date` against a configured threshold.
#[derive(Debug, Clone, Copy)]
pub struct TimeAlignmentGuard {
    config: TimeAlignmentConfig,
}

impl TimeAlignmentGuard {
    #[must_use]
    pub fn new(config: TimeAlignmentConfig) -> Self {
        Self { config }
    }

    /// Whole-day gap between the two dates. The gap is the absolute
    /// separation; which side is newer does not matter for staleness.
    #[must_use]
    pub fn evaluate(&self, as_of: Date, period_end_date: Date) -> TimeAlignmentReport {
        let gap_days = (as_of - period_end_date).get_days().abs();
        TimeAlignmentReport {
            gap_days,
            threshold_days: self.config.threshold_days,
            policy: self.config.policy,
            breached: gap_days > self.config.threshold_days,
        }
    }
}
