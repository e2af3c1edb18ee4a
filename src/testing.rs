//! Scripted collaborators shared by the unit tests.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use anyhow::bail;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::adapters::{
    AnalysisRequest, AnalysisResult, AnalysisService, CaptureDevice, MemoryStore, SessionStore,
    SpeechSynthesizer, Transcriber,
};
use crate::error::AdapterError;
use crate::models::{
    Modality, RawResponse, SessionRecord, SessionStatus, SessionSummary, StimulusPayload,
    SubTestDefinition, SubTestOutcome, TestCategory,
};

/// Untagged definition with a 60 second window.
pub fn definition(
    id: &str,
    modality: Modality,
    category: TestCategory,
    max_score: f64,
) -> SubTestDefinition {
    SubTestDefinition {
        id: id.to_string(),
        name: id.to_string(),
        modality,
        category,
        instruction_text: format!("Instructions for {id}"),
        stimulus: StimulusPayload::Prompt {
            text: format!("Respond to {id}"),
        },
        time_limit_seconds: 60,
        max_score,
        accessibility_tags: Default::default(),
        supported_locales: Vec::new(),
    }
}

pub struct FakeDevice {
    fail_with: Option<String>,
    buffer: Mutex<Option<RawResponse>>,
    opens: AtomicUsize,
    releases: AtomicUsize,
}

impl FakeDevice {
    pub fn new() -> Self {
        Self {
            fail_with: None,
            buffer: Mutex::new(None),
            opens: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
        }
    }

    pub fn with_buffer(response: RawResponse) -> Self {
        let device = Self::new();
        *device.buffer.lock().unwrap() = Some(response);
        device
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            fail_with: Some(reason.to_string()),
            ..Self::new()
        }
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptureDevice for FakeDevice {
    async fn open(&self, _modality: Modality) -> Result<(), AdapterError> {
        if let Some(reason) = &self.fail_with {
            return Err(AdapterError::Unavailable(reason.clone()));
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn release(&self) -> Option<RawResponse> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.buffer.lock().unwrap().clone()
    }
}

/// Analysis service that plays back a script, then falls back to a fixed
/// result.
pub struct ScriptedAnalysis {
    script: Mutex<VecDeque<Result<AnalysisResult, AdapterError>>>,
    fallback: Result<AnalysisResult, AdapterError>,
    delay: Option<Duration>,
    requests: Mutex<Vec<AnalysisRequest>>,
}

impl ScriptedAnalysis {
    pub fn scoring(score: f64, max_score: f64) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Ok(AnalysisResult {
                score,
                max_score,
                risk_contribution: 0.0,
                transcript: None,
            }),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fallback: Err(AdapterError::Transport("connection reset".into())),
            ..Self::scoring(0.0, 1.0)
        }
    }

    pub fn with_script(mut self, script: Vec<Result<AnalysisResult, AdapterError>>) -> Self {
        self.script = Mutex::new(script.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<AnalysisRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnalysisService for ScriptedAnalysis {
    async fn submit_for_scoring(
        &self,
        request: &AnalysisRequest,
    ) -> Result<AnalysisResult, AdapterError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

pub struct FakeTranscriber {
    pub text: Result<String, AdapterError>,
    pub calls: AtomicUsize,
}

impl FakeTranscriber {
    pub fn returning(text: &str) -> Self {
        Self {
            text: Ok(text.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            text: Err(AdapterError::Unavailable("model not loaded".into())),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(
        &self,
        _audio: &[u8],
        _mime_type: &str,
        _locale: &str,
    ) -> Result<String, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.text.clone()
    }
}

#[derive(Default)]
pub struct RecordingSpeaker {
    pub spoken: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl SpeechSynthesizer for RecordingSpeaker {
    async fn speak(&self, text: &str, locale: &str) -> Result<Option<Vec<u8>>, AdapterError> {
        self.spoken
            .lock()
            .unwrap()
            .push((text.to_string(), locale.to_string()));
        Ok(None)
    }
}

/// Memory store whose outcome and summary writes fail a set number of times
/// before succeeding.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    outcome_failures: AtomicUsize,
    summary_failures: AtomicUsize,
}

impl FlakyStore {
    pub fn failing_outcomes(count: usize) -> Self {
        let store = Self::default();
        store.outcome_failures.store(count, Ordering::SeqCst);
        store
    }

    pub fn failing_summaries(count: usize) -> Self {
        let store = Self::default();
        store.summary_failures.store(count, Ordering::SeqCst);
        store
    }

    fn trip(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl SessionStore for FlakyStore {
    async fn save_session(&self, record: &SessionRecord) -> anyhow::Result<()> {
        self.inner.save_session(record).await
    }

    async fn update_session_status(
        &self,
        session_id: &str,
        status: SessionStatus,
        stopped_at: Option<DateTime<Utc>>,
    ) -> anyhow::Result<()> {
        self.inner
            .update_session_status(session_id, status, stopped_at)
            .await
    }

    async fn save_response(
        &self,
        session_id: &str,
        sub_test_id: &str,
        response: &RawResponse,
    ) -> anyhow::Result<String> {
        self.inner
            .save_response(session_id, sub_test_id, response)
            .await
    }

    async fn save_outcome(
        &self,
        session_id: &str,
        position: usize,
        outcome: &SubTestOutcome,
    ) -> anyhow::Result<()> {
        if Self::trip(&self.outcome_failures) {
            bail!("database is locked");
        }
        self.inner.save_outcome(session_id, position, outcome).await
    }

    async fn save_summary(&self, session_id: &str, summary: &SessionSummary) -> anyhow::Result<()> {
        if Self::trip(&self.summary_failures) {
            bail!("disk full");
        }
        self.inner.save_summary(session_id, summary).await
    }

    async fn load_session(&self, session_id: &str) -> anyhow::Result<Option<SessionRecord>> {
        self.inner.load_session(session_id).await
    }

    async fn load_outcomes(&self, session_id: &str) -> anyhow::Result<Vec<SubTestOutcome>> {
        self.inner.load_outcomes(session_id).await
    }

    async fn load_summary(&self, session_id: &str) -> anyhow::Result<Option<SessionSummary>> {
        self.inner.load_summary(session_id).await
    }

    async fn list_incomplete_sessions(&self) -> anyhow::Result<Vec<SessionRecord>> {
        self.inner.list_incomplete_sessions().await
    }

    async fn list_summaries_for_user(
        &self,
        user_id: &str,
    ) -> anyhow::Result<Vec<SessionSummary>> {
        self.inner.list_summaries_for_user(user_id).await
    }
}
