//! Contracts for the services the engine talks to but does not own.

pub mod http;
pub mod memory;

use anyhow::Result as StoreResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AdapterError;
use crate::models::{
    Modality, RawResponse, SessionRecord, SessionStatus, SessionSummary, SubTestOutcome,
    TestCategory,
};

pub use http::HttpAnalysisClient;
pub use memory::MemoryStore;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisContext {
    pub locale: String,
    pub modality: Modality,
    pub category: TestCategory,
    pub max_score: f64,
    pub transcript: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub sub_test_id: String,
    pub response: RawResponse,
    pub context: AnalysisContext,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub score: f64,
    pub max_score: f64,
    #[serde(default)]
    pub risk_contribution: f64,
    #[serde(default)]
    pub transcript: Option<String>,
}

impl AnalysisResult {
    /// Reject results the aggregator cannot use. Treated the same as a
    /// transport failure by the caller.
    pub fn validate(&self) -> Result<(), AdapterError> {
        if !(self.max_score.is_finite() && self.max_score > 0.0) {
            return Err(AdapterError::Malformed(format!(
                "max score {} is not positive",
                self.max_score
            )));
        }
        if !(self.score.is_finite() && (0.0..=self.max_score).contains(&self.score)) {
            return Err(AdapterError::Malformed(format!(
                "score {} outside 0..={}",
                self.score, self.max_score
            )));
        }
        if !self.risk_contribution.is_finite() {
            return Err(AdapterError::Malformed("risk contribution is not finite".into()));
        }
        Ok(())
    }
}

/// Scores a captured response.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    async fn submit_for_scoring(
        &self,
        request: &AnalysisRequest,
    ) -> Result<AnalysisResult, AdapterError>;
}

/// Speech-to-text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(
        &self,
        audio: &[u8],
        mime_type: &str,
        locale: &str,
    ) -> Result<String, AdapterError>;
}

/// Text-to-speech. Implementations that play audio directly return `None`.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn speak(&self, text: &str, locale: &str) -> Result<Option<Vec<u8>>, AdapterError>;
}

/// Microphone or drawing canvas.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    async fn open(&self, modality: Modality) -> Result<(), AdapterError>;

    /// Stop capturing and hand back whatever was buffered so far.
    async fn release(&self) -> Option<RawResponse>;
}

/// Device for hosts that collect every response in their own UI and pass it to
/// `submit` directly.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDevice;

#[async_trait]
impl CaptureDevice for NoopDevice {
    async fn open(&self, _modality: Modality) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn release(&self) -> Option<RawResponse> {
        None
    }
}

/// Session persistence. Outcomes are append-only: an outcome written for a
/// position is never rewritten.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save_session(&self, record: &SessionRecord) -> StoreResult<()>;

    async fn update_session_status(
        &self,
        session_id: &str,
        status: SessionStatus,
        stopped_at: Option<DateTime<Utc>>,
    ) -> StoreResult<()>;

    /// Persist a raw response and return the reference stored on the outcome.
    async fn save_response(
        &self,
        session_id: &str,
        sub_test_id: &str,
        response: &RawResponse,
    ) -> StoreResult<String>;

    async fn save_outcome(
        &self,
        session_id: &str,
        position: usize,
        outcome: &SubTestOutcome,
    ) -> StoreResult<()>;

    async fn save_summary(&self, session_id: &str, summary: &SessionSummary) -> StoreResult<()>;

    async fn load_session(&self, session_id: &str) -> StoreResult<Option<SessionRecord>>;

    /// Outcomes in the order they were recorded.
    async fn load_outcomes(&self, session_id: &str) -> StoreResult<Vec<SubTestOutcome>>;

    async fn load_summary(&self, session_id: &str) -> StoreResult<Option<SessionSummary>>;

    async fn list_incomplete_sessions(&self) -> StoreResult<Vec<SessionRecord>>;

    /// Completed-session summaries for one user, oldest first.
    async fn list_summaries_for_user(&self, user_id: &str) -> StoreResult<Vec<SessionSummary>>;
}
