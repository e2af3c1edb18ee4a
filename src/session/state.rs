use serde::{Deserialize, Serialize};

use crate::error::{AssessmentError, Result};
use crate::models::{SessionStatus, SessionSummary, SubTestOutcome};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    #[default]
    NotStarted,
    InProgress,
    Complete,
    Aborted,
}

impl SessionPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionPhase::Complete | SessionPhase::Aborted)
    }

    pub fn status(&self) -> SessionStatus {
        match self {
            SessionPhase::NotStarted => SessionStatus::NotStarted,
            SessionPhase::InProgress => SessionStatus::InProgress,
            SessionPhase::Complete => SessionStatus::Complete,
            SessionPhase::Aborted => SessionStatus::Aborted,
        }
    }
}

impl From<SessionStatus> for SessionPhase {
    fn from(status: SessionStatus) -> Self {
        match status {
            SessionStatus::NotStarted => SessionPhase::NotStarted,
            SessionStatus::InProgress => SessionPhase::InProgress,
            SessionStatus::Complete => SessionPhase::Complete,
            SessionStatus::Aborted => SessionPhase::Aborted,
        }
    }
}

/// Phase of the sub-test under the cursor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum StepPhase {
    Instruction,
    Active,
    Scoring,
    Recorded,
}

/// Where the session went after an outcome was appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Next sub-test is in `Instruction`.
    Next(usize),
    /// Last outcome recorded; the session is ready to complete.
    Finished,
    /// Session was aborted while the step was scoring; nothing advances.
    Detached,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub session_id: String,
    pub phase: SessionPhase,
    pub step: Option<StepPhase>,
    pub plan_len: usize,
    /// Append-only; its length is the cursor.
    pub outcomes: Vec<SubTestOutcome>,
    pub summary: Option<SessionSummary>,
}

impl SessionState {
    pub fn new(session_id: String, plan_len: usize) -> Self {
        Self {
            session_id,
            phase: SessionPhase::NotStarted,
            step: None,
            plan_len,
            outcomes: Vec::new(),
            summary: None,
        }
    }

    /// Rebuild state from persisted outcomes.
    pub fn restore(
        session_id: String,
        plan_len: usize,
        phase: SessionPhase,
        outcomes: Vec<SubTestOutcome>,
    ) -> Self {
        let step = (phase == SessionPhase::InProgress && outcomes.len() < plan_len)
            .then_some(StepPhase::Instruction);
        Self {
            session_id,
            phase,
            step,
            plan_len,
            outcomes,
            summary: None,
        }
    }

    pub fn cursor(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_finished(&self) -> bool {
        self.cursor() >= self.plan_len
    }

    pub fn invalid(&self, operation: &'static str) -> AssessmentError {
        AssessmentError::InvalidTransition {
            operation,
            session: self.phase,
            step: self.step,
        }
    }

    /// `NotStarted -> InProgress`, first step in `Instruction`.
    pub fn start(&mut self) -> Result<()> {
        if self.phase != SessionPhase::NotStarted {
            return Err(self.invalid("start"));
        }
        self.phase = SessionPhase::InProgress;
        self.step = Some(StepPhase::Instruction);
        Ok(())
    }

    /// `Instruction -> Active`. Returns the plan index of the step.
    pub fn activate(&mut self) -> Result<usize> {
        if self.phase != SessionPhase::InProgress
            || self.step != Some(StepPhase::Instruction)
            || self.is_finished()
        {
            return Err(self.invalid("begin_active_step"));
        }
        self.step = Some(StepPhase::Active);
        Ok(self.cursor())
    }

    /// Undo `activate` when the capture could not be armed.
    pub fn deactivate(&mut self) {
        if self.phase == SessionPhase::InProgress && self.step == Some(StepPhase::Active) {
            self.step = Some(StepPhase::Instruction);
        }
    }

    pub fn begin_scoring(&mut self) {
        if self.phase == SessionPhase::InProgress && self.step == Some(StepPhase::Active) {
            self.step = Some(StepPhase::Scoring);
        }
    }

    /// Append the outcome for the step under the cursor and move on.
    pub fn record_outcome(&mut self, outcome: SubTestOutcome) -> Result<Advance> {
        if self.is_finished() || self.phase == SessionPhase::NotStarted {
            return Err(self.invalid("record_outcome"));
        }
        self.outcomes.push(outcome);

        if self.phase != SessionPhase::InProgress {
            return Ok(Advance::Detached);
        }
        if self.is_finished() {
            self.step = Some(StepPhase::Recorded);
            return Ok(Advance::Finished);
        }
        self.step = Some(StepPhase::Instruction);
        Ok(Advance::Next(self.cursor()))
    }

    pub fn complete(&mut self, summary: SessionSummary) -> Result<()> {
        if self.phase != SessionPhase::InProgress || !self.is_finished() {
            return Err(self.invalid("complete"));
        }
        self.phase = SessionPhase::Complete;
        self.step = None;
        self.summary = Some(summary);
        Ok(())
    }

    /// Any phase before `Complete` may abort. Returns `false` if already
    /// aborted.
    pub fn abort(&mut self) -> Result<bool> {
        match self.phase {
            SessionPhase::Complete => Err(self.invalid("abort")),
            SessionPhase::Aborted => Ok(false),
            SessionPhase::NotStarted | SessionPhase::InProgress => {
                self.phase = SessionPhase::Aborted;
                self.step = None;
                Ok(true)
            }
        }
    }
}
