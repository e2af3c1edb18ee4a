use serde::{Deserialize, Serialize};

/// Score ratio at or above which the session is low risk.
pub const LOW_RISK_MIN_RATIO: f64 = 0.75;
/// Score ratio at or above which the session is medium risk.
pub const MEDIUM_RISK_MIN_RATIO: f64 = 0.5;

/// Tunable cut-offs for the composite risk tier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RiskThresholds {
    pub low_min_ratio: f64,
    pub medium_min_ratio: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            low_min_ratio: LOW_RISK_MIN_RATIO,
            medium_min_ratio: MEDIUM_RISK_MIN_RATIO,
        }
    }
}

/// Change in percent below which a sub-test counts as stable between sessions.
pub const STABLE_CHANGE_PERCENT: f64 = 5.0;

/// Longest follow-up interval settings may ask for.
pub const MAX_FOLLOW_UP_DAYS: u32 = 3650;

/// Days until the next assessment, by the latest composite tier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct FollowUpPolicy {
    pub high_risk_days: u32,
    pub medium_risk_days: u32,
    pub low_risk_days: u32,
    /// Used when the user has no completed session yet.
    pub baseline_days: u32,
}

impl Default for FollowUpPolicy {
    fn default() -> Self {
        Self {
            high_risk_days: 7,
            medium_risk_days: 30,
            low_risk_days: 90,
            baseline_days: 30,
        }
    }
}

impl FollowUpPolicy {
    pub fn is_valid(&self) -> bool {
        [
            self.high_risk_days,
            self.medium_risk_days,
            self.low_risk_days,
            self.baseline_days,
        ]
        .iter()
        .all(|days| (1..=MAX_FOLLOW_UP_DAYS).contains(days))
    }
}

impl RiskThresholds {
    /// Thresholds must sit in `0..=1` with low above medium.
    pub fn is_valid(&self) -> bool {
        (0.0..=1.0).contains(&self.low_min_ratio)
            && (0.0..=1.0).contains(&self.medium_min_ratio)
            && self.low_min_ratio >= self.medium_min_ratio
    }
}
