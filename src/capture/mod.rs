pub mod controller;
pub mod state;

pub use controller::{CaptureController, CaptureSnapshot, PendingCapture};
pub use state::{CaptureMode, CaptureOutcome, CapturePhase, CaptureResult, CaptureSession};
