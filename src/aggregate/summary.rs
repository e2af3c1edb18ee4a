use chrono::Utc;

use crate::aggregate::config::RiskThresholds;
use crate::models::{RiskTier, SessionSummary, SubTestOutcome};

/// Map a score ratio onto a tier.
pub fn risk_tier(ratio: f64, thresholds: &RiskThresholds) -> RiskTier {
    if ratio >= thresholds.low_min_ratio {
        RiskTier::Low
    } else if ratio >= thresholds.medium_min_ratio {
        RiskTier::Medium
    } else {
        RiskTier::High
    }
}

/// Fold a completed session's outcomes into its summary.
///
/// Degraded outcomes keep their zero score and their full max score, so a
/// sub-test that could not be scored pulls the ratio down instead of vanishing
/// from it. With nothing scorable the ratio is 0 and the tier is high.
pub fn aggregate(
    session_id: &str,
    user_id: &str,
    outcomes: &[SubTestOutcome],
    thresholds: &RiskThresholds,
) -> SessionSummary {
    let total_score: f64 = outcomes.iter().map(|o| o.score).sum();
    let max_score: f64 = outcomes.iter().map(|o| o.max_score).sum();
    let score_ratio = if max_score > 0.0 {
        total_score / max_score
    } else {
        0.0
    };

    SessionSummary {
        session_id: session_id.to_string(),
        user_id: user_id.to_string(),
        total_score,
        max_score,
        score_ratio,
        composite_risk_tier: risk_tier(score_ratio, thresholds),
        total_risk_contribution: outcomes.iter().map(|o| o.risk_contribution).sum(),
        degraded_count: outcomes.iter().filter(|o| o.is_degraded()).count(),
        timed_out_count: outcomes.iter().filter(|o| o.timed_out).count(),
        per_sub_test_outcomes: outcomes.to_vec(),
        completed_at: Utc::now(),
    }
}
