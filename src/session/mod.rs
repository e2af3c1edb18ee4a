pub mod controller;
pub mod events;
pub mod state;

pub use controller::{
    ActiveStep, AssessmentSession, SessionConfig, SessionServices, SessionSnapshot, StepReport,
};
pub use events::SessionEvent;
pub use state::{SessionPhase, SessionState, StepPhase};
