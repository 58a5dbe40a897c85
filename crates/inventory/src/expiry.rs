//! Near-expiry classification.
//!
//! Dashboards flag lots by days remaining until their expiry date: the last
//! few days are critical, the week before that a warning.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use binstock_core::{DomainError, DomainResult};

/// Urgency of a lot, most urgent first (so `Ord` sorts urgent lots to the front).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryStatus {
    /// Expiry date is in the past.
    Expired,
    /// At most `critical_days` left.
    Critical,
    /// At most `warning_days` left.
    Warning,
    Fresh,
}

impl ExpiryStatus {
    pub fn needs_attention(self) -> bool {
        self != ExpiryStatus::Fresh
    }
}

/// Day thresholds for [`ExpiryStatus`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryPolicy {
    critical_days: i64,
    warning_days: i64,
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self {
            critical_days: 3,
            warning_days: 7,
        }
    }
}

impl ExpiryPolicy {
    pub fn new(critical_days: i64, warning_days: i64) -> DomainResult<Self> {
        if critical_days < 0 {
            return Err(DomainError::validation("critical_days cannot be negative"));
        }
        if warning_days < critical_days {
            return Err(DomainError::validation(
                "warning_days must be at least critical_days",
            ));
        }
        Ok(Self {
            critical_days,
            warning_days,
        })
    }

    pub fn critical_days(&self) -> i64 {
        self.critical_days
    }

    pub fn warning_days(&self) -> i64 {
        self.warning_days
    }

    pub fn classify(&self, expire_date: NaiveDate, today: NaiveDate) -> ExpiryStatus {
        let days = days_until(expire_date, today);
        if days < 0 {
            ExpiryStatus::Expired
        } else if days <= self.critical_days {
            ExpiryStatus::Critical
        } else if days <= self.warning_days {
            ExpiryStatus::Warning
        } else {
            ExpiryStatus::Fresh
        }
    }
}

/// Whole days from `today` until `expire_date` (negative once past).
pub fn days_until(expire_date: NaiveDate, today: NaiveDate) -> i64 {
    (expire_date - today).num_days()
}
