use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::capture::CapturePhase;
use crate::models::{SessionSummary, SubTestOutcome};

/// Broadcast to subscribers as the session moves. Receivers that lag behind
/// the channel capacity miss events; session state is the source of truth.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    #[serde(rename_all = "camelCase")]
    StepEntered {
        session_id: String,
        index: usize,
        sub_test_id: String,
        instruction_text: String,
    },
    #[serde(rename_all = "camelCase")]
    CaptureStarted {
        session_id: String,
        sub_test_id: String,
        capture_id: String,
        deadline_at: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    CaptureFinished {
        session_id: String,
        sub_test_id: String,
        phase: CapturePhase,
    },
    #[serde(rename_all = "camelCase")]
    OutcomeRecorded {
        session_id: String,
        index: usize,
        outcome: SubTestOutcome,
    },
    #[serde(rename_all = "camelCase")]
    SessionCompleted {
        session_id: String,
        summary: SessionSummary,
    },
    #[serde(rename_all = "camelCase")]
    SessionAborted {
        session_id: String,
        recorded: usize,
    },
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::StepEntered { .. } => "step-entered",
            SessionEvent::CaptureStarted { .. } => "capture-started",
            SessionEvent::CaptureFinished { .. } => "capture-finished",
            SessionEvent::OutcomeRecorded { .. } => "outcome-recorded",
            SessionEvent::SessionCompleted { .. } => "session-completed",
            SessionEvent::SessionAborted { .. } => "session-aborted",
        }
    }
}
