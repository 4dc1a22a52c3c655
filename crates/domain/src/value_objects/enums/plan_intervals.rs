use std::fmt::Display;

use chrono::Duration;
use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlanInterval {
    #[default]
    None,
    Month,
    Year,
}

impl PlanInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanInterval::None => "none",
            PlanInterval::Month => "month",
            PlanInterval::Year => "year",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "none" => Some(PlanInterval::None),
            "month" => Some(PlanInterval::Month),
            "year" => Some(PlanInterval::Year),
            _ => None,
        }
    }

    /// Local fallback for a billing period length when the gateway does not
    /// report period bounds.
    pub fn approximate_duration(&self) -> Option<Duration> {
        match self {
            PlanInterval::None => None,
            PlanInterval::Month => Some(Duration::days(30)),
            PlanInterval::Year => Some(Duration::days(365)),
        }
    }
}

impl Display for PlanInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
