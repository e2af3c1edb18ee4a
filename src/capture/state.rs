use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp;
use tokio::time::Instant;

use crate::models::{Modality, RawResponse, SubTestDefinition};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CapturePhase {
    Idle,
    Armed,
    Capturing,
    Submitted,
    TimedOut,
    Cancelled,
    DeviceFailed,
}

impl Default for CapturePhase {
    fn default() -> Self {
        CapturePhase::Idle
    }
}

impl CapturePhase {
    pub fn is_active(&self) -> bool {
        matches!(self, CapturePhase::Armed | CapturePhase::Capturing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CapturePhase::Submitted
                | CapturePhase::TimedOut
                | CapturePhase::Cancelled
                | CapturePhase::DeviceFailed
        )
    }
}

/// What the response surface is doing, for display.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CaptureMode {
    Idle,
    Recording,
    AwaitingSubmit,
    Submitted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSession {
    pub capture_id: String,
    pub sub_test_id: String,
    pub modality: Modality,
    pub time_limit_seconds: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub deadline_at: DateTime<Utc>,
    pub mode: CaptureMode,
    /// Input collected so far; used when the deadline passes before submit.
    #[serde(skip)]
    pub partial: Option<RawResponse>,
    #[serde(skip)]
    pub deadline: Option<Instant>,
}

impl CaptureSession {
    /// `None` when the time limit does not fit on the clock.
    pub fn arm(capture_id: String, def: &SubTestDefinition, now: Instant) -> Option<Self> {
        let limit = std::time::Duration::from_secs(def.time_limit_seconds);
        let deadline = now.checked_add(limit)?;
        let deadline_at = i64::try_from(def.time_limit_seconds)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .and_then(|window| Utc::now().checked_add_signed(window))?;

        Some(Self {
            capture_id,
            sub_test_id: def.id.clone(),
            modality: def.modality,
            time_limit_seconds: def.time_limit_seconds,
            started_at: None,
            deadline_at,
            mode: CaptureMode::Idle,
            partial: None,
            deadline: Some(deadline),
        })
    }

    pub fn remaining_ms(&self, now: Instant) -> i64 {
        match (self.mode, self.deadline) {
            (CaptureMode::Recording | CaptureMode::AwaitingSubmit, Some(deadline)) => {
                let remaining = deadline.saturating_duration_since(now).as_millis();
                cmp::max(i64::try_from(remaining).unwrap_or(i64::MAX), 0)
            }
            (CaptureMode::Idle, _) => {
                i64::try_from(self.time_limit_seconds.saturating_mul(1000)).unwrap_or(i64::MAX)
            }
            _ => 0,
        }
    }
}

/// Terminal result of one armed capture.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    Submitted { response: RawResponse },
    TimedOut { response: RawResponse },
    Cancelled,
    DeviceFailed { reason: String },
}

impl CaptureOutcome {
    pub fn timed_out(&self) -> bool {
        matches!(self, CaptureOutcome::TimedOut { .. })
    }

    pub fn response(&self) -> Option<&RawResponse> {
        match self {
            CaptureOutcome::Submitted { response } | CaptureOutcome::TimedOut { response } => {
                Some(response)
            }
            CaptureOutcome::Cancelled | CaptureOutcome::DeviceFailed { .. } => None,
        }
    }

    pub fn phase(&self) -> CapturePhase {
        match self {
            CaptureOutcome::Submitted { .. } => CapturePhase::Submitted,
            CaptureOutcome::TimedOut { .. } => CapturePhase::TimedOut,
            CaptureOutcome::Cancelled => CapturePhase::Cancelled,
            CaptureOutcome::DeviceFailed { .. } => CapturePhase::DeviceFailed,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptureResult {
    pub capture_id: String,
    pub sub_test_id: String,
    pub outcome: CaptureOutcome,
    pub finished_at: DateTime<Utc>,
}
