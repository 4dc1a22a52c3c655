use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BillingType {
    Trial,
    Free,
    Recurring,
}

impl BillingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingType::Trial => "trial",
            BillingType::Free => "free",
            BillingType::Recurring => "recurring",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "trial" => Some(BillingType::Trial),
            "free" => Some(BillingType::Free),
            "recurring" => Some(BillingType::Recurring),
            _ => None,
        }
    }
}

impl Display for BillingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
