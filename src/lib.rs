//! Test session orchestration for accessibility-aware cognitive assessment
//! batteries.
//!
//! A host builds an [`AssessmentEngine`], creates an [`AssessmentSession`] per
//! user, and drives it step by step: instruction, timed capture, scoring,
//! recording. Capture devices, the scoring service, transcription, speech and
//! persistence are adapters behind traits in [`adapters`].

pub mod adapters;
pub mod aggregate;
pub mod capture;
pub mod catalog;
pub mod db;
pub mod engine;
pub mod error;
pub mod models;
pub mod planning;
pub mod session;
pub mod settings;
mod utils;

#[cfg(test)]
mod testing;

pub use adapters::{
    AnalysisContext, AnalysisRequest, AnalysisResult, AnalysisService, CaptureDevice,
    HttpAnalysisClient, MemoryStore, NoopDevice, SessionStore, SpeechSynthesizer, Transcriber,
};
pub use aggregate::{
    aggregate, next_assessment, progress, risk_tier, AssessmentSchedule, FollowUpPolicy,
    RiskThresholds, SubTestProgress, Trend,
};
pub use capture::{CaptureController, CaptureOutcome, CapturePhase, CaptureResult};
pub use catalog::Catalog;
pub use db::Database;
pub use engine::AssessmentEngine;
pub use error::{AdapterError, AssessmentError, Result};
pub use models::{
    AccessibilityTag, LiteracyLevel, Modality, RawResponse, RiskTier, SessionRecord,
    SessionStatus, SessionSummary, StimulusPayload, SubTestDefinition, SubTestOutcome,
    TestCategory, UserAccessibilityProfile, VisionCapability,
};
pub use planning::{resolve_plan, TestPlan};
pub use session::{
    ActiveStep, AssessmentSession, SessionConfig, SessionEvent, SessionPhase, SessionServices,
    StepPhase, StepReport,
};
pub use settings::{EngineSettings, SettingsStore};
pub use utils::init_logging;
