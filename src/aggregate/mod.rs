pub mod config;
pub mod progress;
pub mod summary;

pub use config::{
    FollowUpPolicy, RiskThresholds, LOW_RISK_MIN_RATIO, MAX_FOLLOW_UP_DAYS, MEDIUM_RISK_MIN_RATIO,
    STABLE_CHANGE_PERCENT,
};
pub use progress::{
    next_assessment, progress, AssessmentSchedule, ProgressPoint, ScheduleBasis, SubTestProgress,
    Trend,
};
pub use summary::{aggregate, risk_tier};
