//! Audit-trail records for every defaulted, blended, or flagged value.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssumptionCategory {
    /// A value was substituted because the input was absent.
    Default,
    /// A value was composed from multiple weighted sources.
    Blended,
    /// A caller-supplied value replaced the stock default.
    Override,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssumptionSeverity {
    Low,
    Medium,
    High,
}

/// One auditable statement about how an input was obtained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssumptionRecord {
    pub statement: String,
    pub category: AssumptionCategory,
    pub severity: AssumptionSeverity,
}

impl AssumptionRecord {
    #[must_use]
    pub fn new(
        statement: impl Into<String>,
        category: AssumptionCategory,
        severity: AssumptionSeverity,
    ) -> Self {
        Self {
            statement: statement.into(),
            category,
            severity,
        }
    }

    #[must_use]
    pub fn defaulted(statement: impl Into<String>, severity: AssumptionSeverity) -> Self {
        Self::new(statement, AssumptionCategory::Default, severity)
    }

    #[must_use]
    pub fn blended(statement: impl Into<String>, severity: AssumptionSeverity) -> Self {
        Self::new(statement, AssumptionCategory::Blended, severity)
    }

    #[must_use]
    pub fn overridden(statement: impl Into<String>, severity: AssumptionSeverity) -> Self {
        Self::new(statement, AssumptionCategory::Override, severity)
    }
}
