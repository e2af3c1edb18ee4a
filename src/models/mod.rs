pub mod outcome;
pub mod profile;
pub mod session;
pub mod subtest;

pub use outcome::{RawResponse, RiskTier, SessionSummary, SubTestOutcome};
pub use profile::{LiteracyLevel, UserAccessibilityProfile, VisionCapability};
pub use session::{SessionRecord, SessionStatus};
pub use subtest::{AccessibilityTag, Modality, StimulusPayload, SubTestDefinition, TestCategory};
