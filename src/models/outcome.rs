use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::subtest::Modality;

/// The user's response to one sub-test, as captured. Audio and drawing data is
/// opaque to the engine; adapters decide how it travels.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RawResponse {
    Text { text: String },
    Audio { data: Vec<u8>, mime_type: String },
    Drawing { data: Vec<u8> },
    Choice { selected: Vec<String> },
    Empty,
}

impl RawResponse {
    pub fn text(text: impl Into<String>) -> Self {
        RawResponse::Text { text: text.into() }
    }

    pub fn audio(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        RawResponse::Audio {
            data,
            mime_type: mime_type.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RawResponse::Text { .. } => "text",
            RawResponse::Audio { .. } => "audio",
            RawResponse::Drawing { .. } => "drawing",
            RawResponse::Choice { .. } => "choice",
            RawResponse::Empty => "empty",
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            RawResponse::Text { text } => text.trim().is_empty(),
            RawResponse::Audio { data, .. } | RawResponse::Drawing { data } => data.is_empty(),
            RawResponse::Choice { selected } => selected.is_empty(),
            RawResponse::Empty => true,
        }
    }

    /// Whether this response shape is what `modality` produces. `Empty` fits
    /// every modality.
    pub fn matches_modality(&self, modality: Modality) -> bool {
        matches!(
            (self, modality),
            (RawResponse::Empty, _)
                | (RawResponse::Text { .. }, Modality::Text)
                | (RawResponse::Audio { .. }, Modality::Audio)
                | (RawResponse::Drawing { .. }, Modality::Drawing)
                | (RawResponse::Choice { .. }, Modality::Choice)
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
        }
    }
}

/// The recorded result of one sub-test. Appended to the session once and never
/// modified afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubTestOutcome {
    pub sub_test_id: String,
    pub raw_response_ref: Option<String>,
    pub score: f64,
    pub max_score: f64,
    pub risk_contribution: f64,
    pub timed_out: bool,
    pub transcript: Option<String>,
    #[serde(default)]
    pub analysis_failed: bool,
    #[serde(default)]
    pub capture_failed: bool,
    pub recorded_at: DateTime<Utc>,
}

impl SubTestOutcome {
    /// Outcome for a response the analysis service could not score.
    pub fn analysis_failed(
        sub_test_id: impl Into<String>,
        max_score: f64,
        raw_response_ref: Option<String>,
        timed_out: bool,
        transcript: Option<String>,
    ) -> Self {
        Self {
            sub_test_id: sub_test_id.into(),
            raw_response_ref,
            score: 0.0,
            max_score,
            risk_contribution: 0.0,
            timed_out,
            transcript,
            analysis_failed: true,
            capture_failed: false,
            recorded_at: Utc::now(),
        }
    }

    /// Outcome for a sub-test skipped because the capture device never opened.
    pub fn capture_failed(sub_test_id: impl Into<String>, max_score: f64) -> Self {
        Self {
            sub_test_id: sub_test_id.into(),
            raw_response_ref: None,
            score: 0.0,
            max_score,
            risk_contribution: 0.0,
            timed_out: false,
            transcript: None,
            analysis_failed: false,
            capture_failed: true,
            recorded_at: Utc::now(),
        }
    }

    /// Degraded outcomes carry a zero score that is not a real measurement.
    pub fn is_degraded(&self) -> bool {
        self.analysis_failed || self.capture_failed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub user_id: String,
    pub total_score: f64,
    pub max_score: f64,
    pub score_ratio: f64,
    pub composite_risk_tier: RiskTier,
    pub total_risk_contribution: f64,
    pub degraded_count: usize,
    pub timed_out_count: usize,
    pub per_sub_test_outcomes: Vec<SubTestOutcome>,
    pub completed_at: DateTime<Utc>,
}
