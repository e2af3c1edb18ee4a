use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::{
    sync::{broadcast, Mutex},
    time,
};
use uuid::Uuid;

use super::events::SessionEvent;
use super::state::{Advance, SessionPhase, SessionState, StepPhase};
use crate::adapters::{
    AnalysisContext, AnalysisRequest, AnalysisResult, AnalysisService, CaptureDevice,
    SessionStore, SpeechSynthesizer, Transcriber,
};
use crate::aggregate::{aggregate, FollowUpPolicy, RiskThresholds};
use crate::capture::{CaptureController, CaptureOutcome, CaptureSnapshot, PendingCapture};
use crate::catalog::Catalog;
use crate::error::{AdapterError, AssessmentError, Result};
use crate::models::{
    RawResponse, SessionRecord, SessionStatus, SessionSummary, SubTestDefinition,
    SubTestOutcome, UserAccessibilityProfile,
};
use crate::planning::{resolve_plan, TestPlan};
use crate::settings::EngineSettings;

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Collaborators a session talks to. The capture device is exclusive to the
/// session that owns it.
#[derive(Clone)]
pub struct SessionServices {
    pub analysis: Arc<dyn AnalysisService>,
    pub store: Arc<dyn SessionStore>,
    pub device: Arc<dyn CaptureDevice>,
    pub transcriber: Option<Arc<dyn Transcriber>>,
    pub speaker: Option<Arc<dyn SpeechSynthesizer>>,
}

impl SessionServices {
    pub fn new(
        analysis: Arc<dyn AnalysisService>,
        store: Arc<dyn SessionStore>,
        device: Arc<dyn CaptureDevice>,
    ) -> Self {
        Self {
            analysis,
            store,
            device,
            transcriber: None,
            speaker: None,
        }
    }

    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    pub fn with_speaker(mut self, speaker: Arc<dyn SpeechSynthesizer>) -> Self {
        self.speaker = Some(speaker);
        self
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub analysis_timeout: Duration,
    pub max_attempts: u32,
    pub risk_thresholds: RiskThresholds,
    pub follow_up: FollowUpPolicy,
    pub default_locale: String,
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&EngineSettings::default())
    }
}

impl From<&EngineSettings> for SessionConfig {
    fn from(settings: &EngineSettings) -> Self {
        Self {
            analysis_timeout: settings.analysis.timeout(),
            max_attempts: settings.analysis.max_attempts.max(1),
            risk_thresholds: settings.risk_thresholds,
            follow_up: settings.follow_up,
            default_locale: settings.default_locale.clone(),
            event_capacity: settings.event_capacity.max(1),
        }
    }
}

/// Result of `begin_active_step`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ActiveStep {
    /// The response window is open.
    #[serde(rename_all = "camelCase")]
    Capturing {
        sub_test_id: String,
        capture_id: String,
        deadline_at: DateTime<Utc>,
    },
    /// The device failed to open; a zero outcome was recorded instead.
    Skipped { report: StepReport },
}

/// Result of finishing the active step.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum StepReport {
    #[serde(rename_all = "camelCase")]
    Recorded {
        index: usize,
        outcome: SubTestOutcome,
        summary: Option<SessionSummary>,
    },
    /// The capture was cancelled by `abort`; nothing was recorded.
    #[serde(rename_all = "camelCase")]
    Aborted { index: usize },
}

impl StepReport {
    pub fn outcome(&self) -> Option<&SubTestOutcome> {
        match self {
            StepReport::Recorded { outcome, .. } => Some(outcome),
            StepReport::Aborted { .. } => None,
        }
    }

    pub fn summary(&self) -> Option<&SessionSummary> {
        match self {
            StepReport::Recorded { summary, .. } => summary.as_ref(),
            StepReport::Aborted { .. } => None,
        }
    }
}

/// How far the store has caught up with the in-memory session.
#[derive(Debug, Default)]
struct Persisted {
    outcomes: usize,
    summary: bool,
    completed: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: String,
    pub phase: SessionPhase,
    pub step: Option<StepPhase>,
    pub cursor: usize,
    pub plan: Vec<String>,
    pub capture: CaptureSnapshot,
}

/// One user's run through a resolved plan. Cheap to clone; clones share the
/// same session.
#[derive(Clone)]
pub struct AssessmentSession {
    record: Arc<SessionRecord>,
    plan: Arc<TestPlan>,
    state: Arc<Mutex<SessionState>>,
    persisted: Arc<Mutex<Persisted>>,
    pending: Arc<Mutex<Option<PendingCapture>>>,
    capture: CaptureController,
    services: SessionServices,
    config: SessionConfig,
    events: broadcast::Sender<SessionEvent>,
}

impl AssessmentSession {
    /// Persist a new `NotStarted` session for `plan`.
    pub async fn create(
        user_id: &str,
        profile: UserAccessibilityProfile,
        plan: TestPlan,
        services: SessionServices,
        config: SessionConfig,
    ) -> Result<Self> {
        let now = Utc::now();
        let record = SessionRecord {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            profile,
            plan: plan.ids(),
            status: SessionStatus::NotStarted,
            started_at: None,
            stopped_at: None,
            created_at: now,
            updated_at: now,
        };

        services
            .store
            .save_session(&record)
            .await
            .map_err(AssessmentError::Storage)?;

        log_info!(
            "Created session {} for {} with {} sub-tests ({}s of response windows, {} points)",
            record.id,
            record.user_id,
            plan.len(),
            plan.total_time_limit().as_secs(),
            plan.max_possible_score()
        );

        let state = SessionState::new(record.id.clone(), plan.len());
        Ok(Self::assemble(
            record,
            plan,
            state,
            Persisted::default(),
            services,
            config,
        ))
    }

    /// Rebuild a stored session: recompute its plan from the stored profile
    /// and continue from the first step without an outcome.
    pub async fn resume(
        session_id: &str,
        catalog: &Catalog,
        services: SessionServices,
        config: SessionConfig,
    ) -> Result<Self> {
        let record = services
            .store
            .load_session(session_id)
            .await
            .map_err(AssessmentError::Storage)?
            .ok_or_else(|| AssessmentError::SessionNotFound(session_id.to_string()))?;

        let phase = SessionPhase::from(record.status);
        if phase.is_terminal() {
            return Err(AssessmentError::InvalidTransition {
                operation: "resume",
                session: phase,
                step: None,
            });
        }

        let plan = resolve_plan(&record.profile, catalog)?;
        if plan.ids() != record.plan {
            return Err(AssessmentError::PlanMismatch(format!(
                "session {} was planned as [{}], catalog now resolves [{}]",
                record.id,
                record.plan.join(", "),
                plan.ids().join(", ")
            )));
        }

        let outcomes = services
            .store
            .load_outcomes(session_id)
            .await
            .map_err(AssessmentError::Storage)?;
        check_outcomes(&plan, &outcomes)?;

        log_info!(
            "Resuming session {} at step {}/{}",
            record.id,
            outcomes.len(),
            plan.len()
        );

        let state = SessionState::restore(record.id.clone(), plan.len(), phase, outcomes);
        let finished = phase == SessionPhase::InProgress && state.is_finished();
        let step = state.step;
        let cursor = state.cursor();

        // Stopped between the last outcome and the status update; the summary
        // may already be stored.
        let stored_summary = if finished {
            services
                .store
                .load_summary(session_id)
                .await
                .map_err(AssessmentError::Storage)?
        } else {
            None
        };
        let persisted = Persisted {
            outcomes: cursor,
            summary: stored_summary.is_some(),
            completed: false,
        };
        let session = Self::assemble(record, plan, state, persisted, services, config);

        if finished {
            session.finish(stored_summary).await?;
        } else if step == Some(StepPhase::Instruction) {
            session.enter_instruction(cursor).await;
        }
        Ok(session)
    }

    fn assemble(
        record: SessionRecord,
        plan: TestPlan,
        state: SessionState,
        persisted: Persisted,
        services: SessionServices,
        config: SessionConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            record: Arc::new(record),
            plan: Arc::new(plan),
            state: Arc::new(Mutex::new(state)),
            persisted: Arc::new(Mutex::new(persisted)),
            pending: Arc::new(Mutex::new(None)),
            capture: CaptureController::new(services.device.clone()),
            services,
            config,
            events,
        }
    }

    pub fn id(&self) -> &str {
        &self.record.id
    }

    pub fn user_id(&self) -> &str {
        &self.record.user_id
    }

    pub fn profile(&self) -> &UserAccessibilityProfile {
        &self.record.profile
    }

    pub fn plan(&self) -> &TestPlan {
        &self.plan
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn phase(&self) -> SessionPhase {
        self.state.lock().await.phase
    }

    pub async fn step_phase(&self) -> Option<StepPhase> {
        self.state.lock().await.step
    }

    pub async fn outcomes(&self) -> Vec<SubTestOutcome> {
        self.state.lock().await.outcomes.clone()
    }

    pub async fn summary(&self) -> Option<SessionSummary> {
        self.state.lock().await.summary.clone()
    }

    /// The sub-test under the cursor while the session is in progress.
    pub async fn current_step(&self) -> Option<SubTestDefinition> {
        let state = self.state.lock().await;
        if state.phase != SessionPhase::InProgress {
            return None;
        }
        self.plan.get(state.cursor()).cloned()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let (phase, step, cursor) = {
            let state = self.state.lock().await;
            (state.phase, state.step, state.cursor())
        };
        SessionSnapshot {
            session_id: self.record.id.clone(),
            phase,
            step,
            cursor,
            plan: self.record.plan.clone(),
            capture: self.capture.snapshot().await,
        }
    }

    /// `NotStarted -> InProgress` with the first sub-test in `Instruction`.
    pub async fn start(&self) -> Result<()> {
        self.state.lock().await.start()?;
        log_info!("Session {} started", self.record.id);

        self.enter_instruction(0).await;
        self.persist_status(SessionStatus::InProgress, None).await
    }

    /// `Instruction -> Active`: arm the capture and open the response window.
    pub async fn begin_active_step(&self) -> Result<ActiveStep> {
        let index = self.state.lock().await.activate()?;
        let def = self.step_definition(index)?;

        let pending = match self.capture.arm(&def).await {
            Ok(pending) => pending,
            Err(err) => {
                self.state.lock().await.deactivate();
                return Err(err);
            }
        };
        let capture_id = pending.capture_id().to_string();
        *self.pending.lock().await = Some(pending);

        match self.capture.begin().await {
            Ok(()) => {
                let deadline_at = self
                    .capture
                    .snapshot()
                    .await
                    .session
                    .map(|session| session.deadline_at)
                    .unwrap_or_else(Utc::now);
                self.emit(SessionEvent::CaptureStarted {
                    session_id: self.record.id.clone(),
                    sub_test_id: def.id.clone(),
                    capture_id: capture_id.clone(),
                    deadline_at,
                });
                Ok(ActiveStep::Capturing {
                    sub_test_id: def.id,
                    capture_id,
                    deadline_at,
                })
            }
            Err(AssessmentError::CaptureDevice(reason)) => {
                log_warn!(
                    "Skipping {} in session {}: capture device failed ({})",
                    def.id,
                    self.record.id,
                    reason
                );
                Ok(ActiveStep::Skipped {
                    report: self.complete_active_step().await?,
                })
            }
            Err(err) => {
                // Aborted while the device was opening.
                self.pending.lock().await.take();
                Err(err)
            }
        }
    }

    pub async fn submit(&self, payload: RawResponse) -> Result<bool> {
        self.capture.submit(payload).await
    }

    pub async fn record_partial(&self, payload: RawResponse) -> Result<bool> {
        self.capture.record_partial(payload).await
    }

    /// Force the deadline of the open response window.
    pub async fn on_timeout(&self) -> bool {
        self.capture.on_timeout().await
    }

    /// Wait for the active capture to end, score it, and record the outcome.
    ///
    /// Submitted and timed-out captures go to analysis. A capture whose
    /// device never opened is recorded as a zero without analysis. A capture
    /// cancelled by `abort` records nothing.
    pub async fn complete_active_step(&self) -> Result<StepReport> {
        let pending = {
            let mut guard = self.pending.lock().await;
            match guard.take() {
                Some(pending) => pending,
                None => return Err(self.state.lock().await.invalid("complete_active_step")),
            }
        };
        let index = self.state.lock().await.cursor();
        let def = self.step_definition(index)?;

        let result = pending.outcome().await;
        self.capture.discard().await;
        self.emit(SessionEvent::CaptureFinished {
            session_id: self.record.id.clone(),
            sub_test_id: def.id.clone(),
            phase: result.outcome.phase(),
        });

        let timed_out = result.outcome.timed_out();
        match result.outcome {
            CaptureOutcome::Cancelled => {
                log_info!("Step {} of session {} cancelled", def.id, self.record.id);
                Ok(StepReport::Aborted { index })
            }
            CaptureOutcome::DeviceFailed { .. } => {
                let outcome = SubTestOutcome::capture_failed(def.id.clone(), def.max_score);
                self.record(index, outcome, None).await
            }
            CaptureOutcome::Submitted { response } | CaptureOutcome::TimedOut { response } => {
                self.state.lock().await.begin_scoring();
                let (outcome, storage_err) = self.score(&def, response, timed_out).await;
                self.record(index, outcome, storage_err).await
            }
        }
    }

    /// Run the current step end to end with `payload` as the response.
    pub async fn run_step(&self, payload: RawResponse) -> Result<StepReport> {
        match self.begin_active_step().await? {
            ActiveStep::Skipped { report } => Ok(report),
            ActiveStep::Capturing { .. } => {
                self.submit(payload).await?;
                self.complete_active_step().await
            }
        }
    }

    /// Stop the session. Recorded outcomes stay; no summary is produced.
    pub async fn abort(&self) -> Result<()> {
        let recorded = {
            let mut state = self.state.lock().await;
            if !state.abort()? {
                return Ok(());
            }
            state.cursor()
        };

        self.capture.cancel().await;
        log_info!(
            "Session {} aborted after {} outcomes",
            self.record.id,
            recorded
        );
        self.emit(SessionEvent::SessionAborted {
            session_id: self.record.id.clone(),
            recorded,
        });
        self.persist_status(SessionStatus::Aborted, Some(Utc::now()))
            .await
    }

    async fn score(
        &self,
        def: &SubTestDefinition,
        response: RawResponse,
        timed_out: bool,
    ) -> (SubTestOutcome, Option<anyhow::Error>) {
        let mut storage_err = None;
        let response_ref = match self
            .services
            .store
            .save_response(&self.record.id, &def.id, &response)
            .await
        {
            Ok(reference) => Some(reference),
            Err(err) => {
                log_error!("Failed to store response for {}: {:#}", def.id, err);
                storage_err = Some(err);
                None
            }
        };

        let transcript = self.transcribe(def, &response).await;
        let request = AnalysisRequest {
            sub_test_id: def.id.clone(),
            response,
            context: AnalysisContext {
                locale: self.record.profile.language_code.clone(),
                modality: def.modality,
                category: def.category,
                max_score: def.max_score,
                transcript: transcript.clone(),
            },
        };

        let attempts = self.config.max_attempts.max(1);
        let mut last_err = None;
        for attempt in 1..=attempts {
            match self.analyze(&request).await {
                Ok(result) => {
                    log_info!(
                        "Scored {} in session {}: {}/{}",
                        def.id,
                        self.record.id,
                        result.score,
                        result.max_score
                    );
                    let outcome = SubTestOutcome {
                        sub_test_id: def.id.clone(),
                        raw_response_ref: response_ref,
                        score: result.score,
                        max_score: result.max_score,
                        risk_contribution: result.risk_contribution,
                        timed_out,
                        transcript: result.transcript.or(transcript),
                        analysis_failed: false,
                        capture_failed: false,
                        recorded_at: Utc::now(),
                    };
                    return (outcome, storage_err);
                }
                Err(err) => {
                    log_warn!(
                        "Analysis attempt {}/{} for {} failed: {}",
                        attempt,
                        attempts,
                        def.id,
                        err
                    );
                    last_err = Some(err);
                }
            }
        }

        log_error!(
            "Recording {} as unscored after {} attempts: {}",
            def.id,
            attempts,
            last_err.map(|err| err.to_string()).unwrap_or_default()
        );
        let outcome = SubTestOutcome::analysis_failed(
            def.id.clone(),
            def.max_score,
            response_ref,
            timed_out,
            transcript,
        );
        (outcome, storage_err)
    }

    async fn analyze(
        &self,
        request: &AnalysisRequest,
    ) -> std::result::Result<AnalysisResult, AdapterError> {
        let timeout = self.config.analysis_timeout;
        let result = time::timeout(timeout, self.services.analysis.submit_for_scoring(request))
            .await
            .map_err(|_| AdapterError::Timeout(timeout))??;
        result.validate()?;
        Ok(result)
    }

    async fn transcribe(&self, def: &SubTestDefinition, response: &RawResponse) -> Option<String> {
        if !def.requires_transcript() {
            return None;
        }
        let transcriber = self.services.transcriber.as_ref()?;
        let RawResponse::Audio { data, mime_type } = response else {
            return None;
        };
        if data.is_empty() {
            return None;
        }

        match transcriber
            .transcribe(data, mime_type, &self.record.profile.language_code)
            .await
        {
            Ok(text) => Some(text),
            Err(err) => {
                log_warn!("Transcription failed for {}: {}", def.id, err);
                None
            }
        }
    }

    /// Append `outcome`, persist it, and advance. The in-memory state moves
    /// first; a storage failure is returned afterwards and the unsaved
    /// outcomes are written, in order, on the next write or `flush`.
    async fn record(
        &self,
        index: usize,
        outcome: SubTestOutcome,
        mut storage_err: Option<anyhow::Error>,
    ) -> Result<StepReport> {
        let advance = self.state.lock().await.record_outcome(outcome.clone())?;

        log_info!(
            "Recorded {} for session {} (score {}/{}{})",
            outcome.sub_test_id,
            self.record.id,
            outcome.score,
            outcome.max_score,
            if outcome.is_degraded() { ", degraded" } else { "" }
        );
        self.emit(SessionEvent::OutcomeRecorded {
            session_id: self.record.id.clone(),
            index,
            outcome: outcome.clone(),
        });

        if let Err(err) = self.flush_outcomes().await {
            storage_err.get_or_insert(err);
        }

        let mut summary = None;
        match advance {
            Advance::Next(next) => self.enter_instruction(next).await,
            Advance::Finished => match self.finish(None).await {
                Ok(done) => summary = Some(done),
                Err(AssessmentError::Storage(err)) => {
                    storage_err.get_or_insert(err);
                    summary = self.state.lock().await.summary.clone();
                }
                Err(err) => {
                    // Aborted between the last outcome and aggregation.
                    log_warn!("Session {} not completed: {}", self.record.id, err);
                }
            },
            Advance::Detached => {}
        }

        if let Some(err) = storage_err {
            return Err(AssessmentError::Storage(err));
        }
        Ok(StepReport::Recorded {
            index,
            outcome,
            summary,
        })
    }

    /// Aggregate and move to `Complete`. Runs once, after the last outcome;
    /// `stored` is a summary an earlier run already wrote.
    async fn finish(&self, stored: Option<SessionSummary>) -> Result<SessionSummary> {
        let summary = {
            let mut state = self.state.lock().await;
            let summary = stored.unwrap_or_else(|| {
                aggregate(
                    &self.record.id,
                    &self.record.user_id,
                    &state.outcomes,
                    &self.config.risk_thresholds,
                )
            });
            state.complete(summary.clone())?;
            summary
        };

        log_info!(
            "Session {} complete: {}/{} ({} risk)",
            self.record.id,
            summary.total_score,
            summary.max_score,
            summary.composite_risk_tier.as_str()
        );
        self.emit(SessionEvent::SessionCompleted {
            session_id: self.record.id.clone(),
            summary: summary.clone(),
        });

        self.flush().await?;
        Ok(summary)
    }

    /// Write whatever earlier storage failures left behind: outcomes past the
    /// last stored position, then the summary and `Complete` status once the
    /// session has finished. The summary is only written after every outcome.
    pub async fn flush(&self) -> Result<()> {
        self.flush_outcomes().await.map_err(AssessmentError::Storage)?;

        let mut persisted = self.persisted.lock().await;
        let Some(summary) = self.state.lock().await.summary.clone() else {
            return Ok(());
        };
        if !persisted.summary {
            self.services
                .store
                .save_summary(&self.record.id, &summary)
                .await
                .map_err(|err| {
                    log_error!("Failed to store summary of {}: {:#}", self.record.id, err);
                    AssessmentError::Storage(err)
                })?;
            persisted.summary = true;
        }
        if !persisted.completed {
            self.persist_status(SessionStatus::Complete, Some(summary.completed_at))
                .await?;
            persisted.completed = true;
        }
        Ok(())
    }

    async fn flush_outcomes(&self) -> anyhow::Result<()> {
        let mut persisted = self.persisted.lock().await;
        let unsaved: Vec<SubTestOutcome> = {
            let state = self.state.lock().await;
            state
                .outcomes
                .get(persisted.outcomes..)
                .map(<[SubTestOutcome]>::to_vec)
                .unwrap_or_default()
        };
        if unsaved.len() > 1 {
            log_info!(
                "Writing {} outcomes of session {} held back by a storage failure",
                unsaved.len() - 1,
                self.record.id
            );
        }

        for outcome in unsaved {
            let position = persisted.outcomes;
            if let Err(err) = self
                .services
                .store
                .save_outcome(&self.record.id, position, &outcome)
                .await
            {
                log_error!(
                    "Failed to store outcome {} of {}: {:#}",
                    position,
                    self.record.id,
                    err
                );
                return Err(err);
            }
            persisted.outcomes += 1;
        }
        Ok(())
    }

    async fn enter_instruction(&self, index: usize) {
        let Some(def) = self.plan.get(index) else {
            return;
        };
        self.emit(SessionEvent::StepEntered {
            session_id: self.record.id.clone(),
            index,
            sub_test_id: def.id.clone(),
            instruction_text: def.instruction_text.clone(),
        });

        if !self.record.profile.needs_voice_guidance() {
            return;
        }
        let Some(speaker) = self.services.speaker.as_ref() else {
            return;
        };
        if let Err(err) = speaker
            .speak(&def.instruction_text, &self.record.profile.language_code)
            .await
        {
            log_warn!("Voice guidance failed for {}: {}", def.id, err);
        }
    }

    fn step_definition(&self, index: usize) -> Result<SubTestDefinition> {
        self.plan.get(index).cloned().ok_or_else(|| {
            AssessmentError::PlanMismatch(format!(
                "step {} is outside the {}-step plan",
                index,
                self.plan.len()
            ))
        })
    }

    async fn persist_status(
        &self,
        status: SessionStatus,
        stopped_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.services
            .store
            .update_session_status(&self.record.id, status, stopped_at)
            .await
            .map_err(|err| {
                log_error!(
                    "Failed to mark session {} {}: {:#}",
                    self.record.id,
                    status.as_str(),
                    err
                );
                AssessmentError::Storage(err)
            })
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }
}

/// Stored outcomes must be a prefix of the plan, in order.
fn check_outcomes(plan: &TestPlan, outcomes: &[SubTestOutcome]) -> Result<()> {
    if outcomes.len() > plan.len() {
        return Err(AssessmentError::PlanMismatch(format!(
            "{} outcomes stored for a {}-step plan",
            outcomes.len(),
            plan.len()
        )));
    }
    for (index, (outcome, def)) in outcomes.iter().zip(plan.steps()).enumerate() {
        if outcome.sub_test_id != def.id {
            return Err(AssessmentError::PlanMismatch(format!(
                "outcome {} is for {}, plan expects {}",
                index, outcome.sub_test_id, def.id
            )));
        }
    }
    Ok(())
}
