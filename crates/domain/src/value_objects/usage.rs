use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Outcome of a quota check or consumption attempt. Quota exhaustion is a
/// normal `allowed: false` result, never an error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanAllowance {
    pub allowed: bool,
    pub used: i32,
    pub remaining: i32,
    pub limit: i32,
    pub date_key: NaiveDate,
}

impl ScanAllowance {
    /// Read-only check: allowed while capacity remains for the day.
    pub fn checked(used: i32, limit: i32, date_key: NaiveDate) -> Self {
        let remaining = (limit - used).max(0);
        Self {
            allowed: remaining > 0,
            used,
            remaining,
            limit,
            date_key,
        }
    }

    /// A consumption that went through; `used` already includes it.
    pub fn granted(used: i32, limit: i32, date_key: NaiveDate) -> Self {
        Self {
            allowed: true,
            used,
            remaining: (limit - used).max(0),
            limit,
            date_key,
        }
    }

    /// A consumption that was refused; counts are reported unchanged.
    pub fn denied(used: i32, limit: i32, date_key: NaiveDate) -> Self {
        Self {
            allowed: false,
            used,
            remaining: (limit - used).max(0),
            limit,
            date_key,
        }
    }
}
