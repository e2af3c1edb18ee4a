//! Longitudinal view over a user's completed sessions: per-sub-test trends and
//! when the next battery is due.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::config::{FollowUpPolicy, STABLE_CHANGE_PERCENT};
use crate::models::{RiskTier, SessionSummary};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Trend {
    /// Fewer than two scored sessions.
    InsufficientData,
    Stable,
    Improving,
    Declining,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressPoint {
    pub session_id: String,
    pub completed_at: DateTime<Utc>,
    pub score: f64,
    pub max_score: f64,
    pub risk_tier: RiskTier,
}

/// Latest score of one sub-test against the session before it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubTestProgress {
    pub sub_test_id: String,
    pub current_score: f64,
    pub previous_score: Option<f64>,
    pub change_percentage: Option<f64>,
    pub trend: Trend,
    pub data_points: Vec<ProgressPoint>,
}

/// Per-sub-test trends across `summaries`, in the order sub-tests first
/// appear. Degraded outcomes are not data points: a failed capture or an
/// unscored response says nothing about the user.
pub fn progress(summaries: &[SessionSummary]) -> Vec<SubTestProgress> {
    let mut ordered: Vec<&SessionSummary> = summaries.iter().collect();
    ordered.sort_by(|a, b| a.completed_at.cmp(&b.completed_at));

    let mut order: Vec<String> = Vec::new();
    let mut points: HashMap<String, Vec<ProgressPoint>> = HashMap::new();
    for summary in ordered {
        for outcome in &summary.per_sub_test_outcomes {
            if outcome.is_degraded() {
                continue;
            }
            let entry = points.entry(outcome.sub_test_id.clone()).or_insert_with(|| {
                order.push(outcome.sub_test_id.clone());
                Vec::new()
            });
            entry.push(ProgressPoint {
                session_id: summary.session_id.clone(),
                completed_at: summary.completed_at,
                score: outcome.score,
                max_score: outcome.max_score,
                risk_tier: summary.composite_risk_tier,
            });
        }
    }

    order
        .into_iter()
        .filter_map(|sub_test_id| {
            let data_points = points.remove(&sub_test_id)?;
            Some(compare(sub_test_id, data_points))
        })
        .collect()
}

fn compare(sub_test_id: String, data_points: Vec<ProgressPoint>) -> SubTestProgress {
    let current_score = data_points.last().map(|point| point.score).unwrap_or(0.0);
    let previous_score = data_points
        .len()
        .checked_sub(2)
        .and_then(|index| data_points.get(index))
        .map(|point| point.score);

    let Some(previous) = previous_score else {
        return SubTestProgress {
            sub_test_id,
            current_score,
            previous_score: None,
            change_percentage: None,
            trend: Trend::InsufficientData,
            data_points,
        };
    };

    // No baseline to divide by: reported as no change.
    let change_percentage = if previous > 0.0 {
        (current_score - previous) / previous * 100.0
    } else {
        0.0
    };
    let trend = if change_percentage.abs() < STABLE_CHANGE_PERCENT {
        Trend::Stable
    } else if change_percentage > 0.0 {
        Trend::Improving
    } else {
        Trend::Declining
    };

    SubTestProgress {
        sub_test_id,
        current_score,
        previous_score: Some(previous),
        change_percentage: Some(change_percentage),
        trend,
        data_points,
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ScheduleBasis {
    /// No completed session yet.
    Baseline,
    /// Composite tier of the latest completed session.
    #[serde(rename_all = "camelCase")]
    LatestTier { tier: RiskTier },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentSchedule {
    pub due_at: DateTime<Utc>,
    pub interval_days: u32,
    pub basis: ScheduleBasis,
}

/// When the next battery is due, counted from `now`.
pub fn next_assessment(
    latest: Option<&SessionSummary>,
    policy: &FollowUpPolicy,
    now: DateTime<Utc>,
) -> AssessmentSchedule {
    let (interval_days, basis) = match latest {
        None => (policy.baseline_days, ScheduleBasis::Baseline),
        Some(summary) => {
            let tier = summary.composite_risk_tier;
            let days = match tier {
                RiskTier::High => policy.high_risk_days,
                RiskTier::Medium => policy.medium_risk_days,
                RiskTier::Low => policy.low_risk_days,
            };
            (days, ScheduleBasis::LatestTier { tier })
        }
    };

    let due_at = now
        .checked_add_signed(Duration::days(i64::from(interval_days)))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    AssessmentSchedule {
        due_at,
        interval_days,
        basis,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{aggregate, RiskThresholds};
    use crate::models::SubTestOutcome;

    fn scored(id: &str, score: f64) -> SubTestOutcome {
        SubTestOutcome {
            sub_test_id: id.into(),
            raw_response_ref: None,
            score,
            max_score: 10.0,
            risk_contribution: 0.0,
            timed_out: false,
            transcript: None,
            analysis_failed: false,
            capture_failed: false,
            recorded_at: Utc::now(),
        }
    }

    fn session(id: &str, days_ago: i64, outcomes: Vec<SubTestOutcome>) -> SessionSummary {
        let mut summary = aggregate(id, "user-1", &outcomes, &RiskThresholds::default());
        summary.completed_at = Utc::now() - Duration::days(days_ago);
        summary
    }

    #[test]
    fn compares_latest_two_sessions_per_sub_test() {
        let summaries = vec![
            // Out of order on purpose; completion time decides.
            session("s3", 1, vec![scored("recall", 6.0), scored("fluency", 4.0)]),
            session("s1", 60, vec![scored("recall", 9.0), scored("fluency", 8.0)]),
            session("s2", 30, vec![scored("recall", 8.0), scored("fluency", 4.1)]),
        ];

        let report = progress(&summaries);
        assert_eq!(report.len(), 2);

        let recall = &report[0];
        assert_eq!(recall.sub_test_id, "recall");
        assert_eq!(recall.current_score, 6.0);
        assert_eq!(recall.previous_score, Some(8.0));
        assert_eq!(recall.change_percentage, Some(-25.0));
        assert_eq!(recall.trend, Trend::Declining);
        let sessions: Vec<&str> = recall
            .data_points
            .iter()
            .map(|point| point.session_id.as_str())
            .collect();
        assert_eq!(sessions, vec!["s1", "s2", "s3"]);

        // 4.1 -> 4.0 is inside the 5% band.
        assert_eq!(report[1].trend, Trend::Stable);
    }

    #[test]
    fn single_sessions_have_no_trend() {
        let report = progress(&[session("s1", 0, vec![scored("recall", 7.0)])]);
        assert_eq!(report[0].trend, Trend::InsufficientData);
        assert_eq!(report[0].current_score, 7.0);
        assert!(report[0].previous_score.is_none());
        assert!(report[0].change_percentage.is_none());
        assert!(progress(&[]).is_empty());
    }

    #[test]
    fn improvement_and_zero_baselines() {
        let report = progress(&[
            session("s1", 20, vec![scored("recall", 5.0), scored("clock", 0.0)]),
            session("s2", 10, vec![scored("recall", 6.0), scored("clock", 3.0)]),
        ]);
        assert_eq!(report[0].trend, Trend::Improving);
        assert_eq!(report[0].change_percentage, Some(20.0));
        assert_eq!(report[1].change_percentage, Some(0.0));
        assert_eq!(report[1].trend, Trend::Stable);
    }

    #[test]
    fn degraded_outcomes_are_skipped() {
        let report = progress(&[
            session("s1", 20, vec![scored("fluency", 8.0)]),
            session(
                "s2",
                10,
                vec![SubTestOutcome::capture_failed("fluency", 10.0)],
            ),
        ]);
        assert_eq!(report[0].data_points.len(), 1);
        assert_eq!(report[0].trend, Trend::InsufficientData);
    }

    #[test]
    fn follow_up_interval_tracks_latest_tier() {
        let policy = FollowUpPolicy::default();
        let now = Utc::now();

        let baseline = next_assessment(None, &policy, now);
        assert_eq!(baseline.basis, ScheduleBasis::Baseline);
        assert_eq!(baseline.interval_days, 30);
        assert_eq!(baseline.due_at, now + Duration::days(30));

        let cases = [
            (2.0, RiskTier::High, 7),
            (6.0, RiskTier::Medium, 30),
            (9.0, RiskTier::Low, 90),
        ];
        for (score, tier, days) in cases {
            let latest = session("s1", 0, vec![scored("recall", score)]);
            let schedule = next_assessment(Some(&latest), &policy, now);
            assert_eq!(schedule.basis, ScheduleBasis::LatestTier { tier });
            assert_eq!(schedule.interval_days, days);
            assert_eq!(schedule.due_at, now + Duration::days(i64::from(days)));
        }
    }
}
