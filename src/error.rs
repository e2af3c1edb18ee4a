//! Error types for the assessment engine.

use std::time::Duration;

use thiserror::Error;

use crate::capture::CapturePhase;
use crate::session::{SessionPhase, StepPhase};

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, AssessmentError>;

/// Errors surfaced by the engine's public API.
///
/// Capture and analysis failures are normally absorbed into degraded outcomes
/// by the session state machine; they appear here when a caller drives the
/// lower layers directly.
#[derive(Error, Debug)]
pub enum AssessmentError {
    /// Profile resolution filtered out every catalog entry
    #[error("no eligible sub-tests for profile {profile}")]
    NoEligibleTests { profile: String },

    /// A capture is already armed or running
    #[error("capture already active for sub-test {sub_test_id}")]
    AlreadyActive { sub_test_id: String },

    /// Microphone or canvas could not be opened
    #[error("capture device error: {0}")]
    CaptureDevice(String),

    /// Analysis service failed or timed out
    #[error("analysis failed: {0}")]
    AnalysisTransient(#[from] AdapterError),

    /// Capture operation called out of protocol
    #[error("invalid capture transition: {operation} while {phase:?}")]
    InvalidCapture {
        operation: &'static str,
        phase: CapturePhase,
    },

    /// Session operation called out of protocol
    #[error("invalid session transition: {operation} while {session:?}/{step:?}")]
    InvalidTransition {
        operation: &'static str,
        session: SessionPhase,
        step: Option<StepPhase>,
    },

    /// Stored outcomes do not line up with the recomputed plan
    #[error("stored outcomes do not match plan: {0}")]
    PlanMismatch(String),

    /// Catalog failed validation
    #[error("catalog error: {0}")]
    Catalog(String),

    /// Session not found in storage
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Persistence failure
    #[error("storage error: {0:#}")]
    Storage(anyhow::Error),
}

/// Failures reported by external collaborators (analysis, transcription,
/// speech synthesis, capture devices).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdapterError {
    /// Network or transport failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Response could not be decoded
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Call exceeded its deadline
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Service or device refused the request
    #[error("unavailable: {0}")]
    Unavailable(String),
}
