use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::{
    sync::{oneshot, Mutex},
    time::{self, Instant},
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::state::{
    CaptureMode, CaptureOutcome, CapturePhase, CaptureResult, CaptureSession,
};
use crate::adapters::CaptureDevice;
use crate::error::{AssessmentError, Result};
use crate::models::{RawResponse, SubTestDefinition};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSnapshot {
    pub phase: CapturePhase,
    pub session: Option<CaptureSession>,
    pub remaining_ms: i64,
}

#[derive(Default)]
struct CaptureSlot {
    phase: CapturePhase,
    session: Option<CaptureSession>,
    device_open: bool,
    countdown: Option<CancellationToken>,
    outcome_tx: Option<oneshot::Sender<CaptureResult>>,
}

/// Everything the winner of a terminal transition needs once the slot lock is
/// released.
struct Finish {
    capture_id: String,
    sub_test_id: String,
    partial: Option<RawResponse>,
    device_open: bool,
    outcome_tx: Option<oneshot::Sender<CaptureResult>>,
}

impl CaptureSlot {
    /// Commit a terminal phase. Only the first caller gets a `Finish`; the
    /// lock around the slot makes the transition exclusive.
    fn finish(&mut self, phase: CapturePhase) -> Option<Finish> {
        if !self.phase.is_active() {
            return None;
        }
        let session = self.session.as_mut()?;
        self.phase = phase;
        session.mode = CaptureMode::Submitted;
        if let Some(token) = self.countdown.take() {
            token.cancel();
        }
        let device_open = std::mem::replace(&mut self.device_open, false);
        Some(Finish {
            capture_id: session.capture_id.clone(),
            sub_test_id: session.sub_test_id.clone(),
            partial: session.partial.take(),
            device_open,
            outcome_tx: self.outcome_tx.take(),
        })
    }
}

/// Resolves once the armed capture reaches a terminal phase.
pub struct PendingCapture {
    capture_id: String,
    sub_test_id: String,
    rx: oneshot::Receiver<CaptureResult>,
}

impl PendingCapture {
    pub fn capture_id(&self) -> &str {
        &self.capture_id
    }

    pub async fn outcome(self) -> CaptureResult {
        match self.rx.await {
            Ok(result) => result,
            // Sender dropped with the controller; nothing will be scored.
            Err(_) => CaptureResult {
                capture_id: self.capture_id,
                sub_test_id: self.sub_test_id,
                outcome: CaptureOutcome::Cancelled,
                finished_at: Utc::now(),
            },
        }
    }
}

/// Owns the response window of the active sub-test: the capture device and a
/// single wake-up at the deadline. At most one capture exists at a time.
#[derive(Clone)]
pub struct CaptureController {
    slot: Arc<Mutex<CaptureSlot>>,
    device: Arc<dyn CaptureDevice>,
}

impl CaptureController {
    pub fn new(device: Arc<dyn CaptureDevice>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(CaptureSlot::default())),
            device,
        }
    }

    pub async fn phase(&self) -> CapturePhase {
        self.slot.lock().await.phase
    }

    pub async fn snapshot(&self) -> CaptureSnapshot {
        let guard = self.slot.lock().await;
        let remaining_ms = guard
            .session
            .as_ref()
            .map(|session| session.remaining_ms(Instant::now()))
            .unwrap_or(0);
        CaptureSnapshot {
            phase: guard.phase,
            session: guard.session.clone(),
            remaining_ms,
        }
    }

    /// `Idle -> Armed`. The deadline is fixed here; `begin` schedules it.
    pub async fn arm(&self, def: &SubTestDefinition) -> Result<PendingCapture> {
        let mut slot = self.slot.lock().await;
        if slot.phase.is_active() {
            let sub_test_id = slot
                .session
                .as_ref()
                .map(|session| session.sub_test_id.clone())
                .unwrap_or_default();
            return Err(AssessmentError::AlreadyActive { sub_test_id });
        }

        let capture_id = Uuid::new_v4().to_string();
        let Some(session) = CaptureSession::arm(capture_id.clone(), def, Instant::now()) else {
            log_error!(
                "Cannot arm {}: {}s window does not fit on the clock",
                def.id,
                def.time_limit_seconds
            );
            return Err(AssessmentError::Catalog(format!(
                "sub-test '{}' time limit {}s cannot be scheduled",
                def.id, def.time_limit_seconds
            )));
        };
        let (tx, rx) = oneshot::channel();

        *slot = CaptureSlot {
            phase: CapturePhase::Armed,
            session: Some(session),
            device_open: false,
            countdown: None,
            outcome_tx: Some(tx),
        };

        log_info!(
            "Armed capture {} for {} ({}s window)",
            capture_id,
            def.id,
            def.time_limit_seconds
        );

        Ok(PendingCapture {
            capture_id,
            sub_test_id: def.id.clone(),
            rx,
        })
    }

    /// `Armed -> Capturing`. Opens the device for audio and drawing items and
    /// schedules the deadline wake-up.
    pub async fn begin(&self) -> Result<()> {
        let (capture_id, modality) = {
            let slot = self.slot.lock().await;
            match (slot.phase, slot.session.as_ref()) {
                (CapturePhase::Armed, Some(session)) => {
                    (session.capture_id.clone(), session.modality)
                }
                (phase, _) => {
                    return Err(AssessmentError::InvalidCapture {
                        operation: "begin",
                        phase,
                    })
                }
            }
        };

        // The slot is not held while the device opens so a concurrent cancel
        // is never blocked behind it.
        let opened = if modality.uses_device() {
            Some(self.device.open(modality).await)
        } else {
            None
        };

        let mut slot = self.slot.lock().await;
        let still_armed = slot.phase == CapturePhase::Armed
            && slot
                .session
                .as_ref()
                .is_some_and(|session| session.capture_id == capture_id);

        if !still_armed {
            let phase = slot.phase;
            drop(slot);
            if matches!(opened, Some(Ok(()))) {
                let _ = self.device.release().await;
            }
            return Err(AssessmentError::InvalidCapture {
                operation: "begin",
                phase,
            });
        }

        if let Some(Err(err)) = &opened {
            let finish = slot.finish(CapturePhase::DeviceFailed);
            drop(slot);
            let reason = err.to_string();
            log_warn!("Capture device failed for {}: {}", capture_id, reason);
            if let Some(finish) = finish {
                self.deliver(
                    finish,
                    CaptureOutcome::DeviceFailed {
                        reason: reason.clone(),
                    },
                );
            }
            return Err(AssessmentError::CaptureDevice(reason));
        }

        let token = CancellationToken::new();
        let deadline = {
            let session = slot
                .session
                .as_mut()
                .ok_or(AssessmentError::InvalidCapture {
                    operation: "begin",
                    phase: CapturePhase::Armed,
                })?;
            session.started_at = Some(Utc::now());
            session.mode = if modality.uses_device() {
                CaptureMode::Recording
            } else {
                CaptureMode::AwaitingSubmit
            };
            session.deadline.unwrap_or_else(Instant::now)
        };
        slot.phase = CapturePhase::Capturing;
        slot.device_open = opened.is_some();
        slot.countdown = Some(token.clone());
        drop(slot);

        let controller = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = time::sleep_until(deadline) => {
                    controller.expire(&capture_id).await;
                }
                _ = token.cancelled() => {}
            }
        });

        Ok(())
    }

    /// `Capturing -> Submitted`. Returns `false` when the capture already
    /// ended (for example the deadline won the race).
    pub async fn submit(&self, payload: RawResponse) -> Result<bool> {
        let finish = {
            let mut slot = self.slot.lock().await;
            match slot.phase {
                CapturePhase::Capturing => {
                    if let Some(session) = slot.session.as_ref() {
                        if !payload.matches_modality(session.modality) {
                            log_warn!(
                                "{} response submitted for {} item {}",
                                payload.kind(),
                                session.modality.as_str(),
                                session.sub_test_id
                            );
                        }
                    }
                    slot.finish(CapturePhase::Submitted)
                }
                phase if phase.is_terminal() => None,
                phase => {
                    return Err(AssessmentError::InvalidCapture {
                        operation: "submit",
                        phase,
                    })
                }
            }
        };

        let Some(finish) = finish else {
            return Ok(false);
        };

        if finish.device_open {
            let _ = self.device.release().await;
        }
        log_info!("Capture {} submitted", finish.capture_id);
        self.deliver(finish, CaptureOutcome::Submitted { response: payload });
        Ok(true)
    }

    /// Deadline wake-up for whichever capture is current. Returns `false` if
    /// nothing was capturing.
    pub async fn on_timeout(&self) -> bool {
        let capture_id = {
            let slot = self.slot.lock().await;
            match (slot.phase, slot.session.as_ref()) {
                (CapturePhase::Capturing, Some(session)) => session.capture_id.clone(),
                _ => return false,
            }
        };
        self.expire(&capture_id).await
    }

    async fn expire(&self, capture_id: &str) -> bool {
        let finish = {
            let mut slot = self.slot.lock().await;
            let current = slot.phase == CapturePhase::Capturing
                && slot
                    .session
                    .as_ref()
                    .is_some_and(|session| session.capture_id == capture_id);
            if !current {
                return false;
            }
            slot.finish(CapturePhase::TimedOut)
        };

        let Some(mut finish) = finish else {
            return false;
        };

        let buffered = if finish.device_open {
            self.device.release().await
        } else {
            None
        };
        let response = buffered
            .filter(|response| !response.is_empty())
            .or_else(|| finish.partial.take())
            .unwrap_or(RawResponse::Empty);

        log_info!(
            "Capture {} timed out ({} response)",
            finish.capture_id,
            response.kind()
        );
        self.deliver(finish, CaptureOutcome::TimedOut { response });
        true
    }

    /// Stop the capture without producing a scorable result. Returns `false`
    /// when nothing was armed or capturing.
    pub async fn cancel(&self) -> bool {
        let finish = {
            let mut slot = self.slot.lock().await;
            slot.finish(CapturePhase::Cancelled)
        };

        let Some(finish) = finish else {
            return false;
        };

        if finish.device_open {
            let _ = self.device.release().await;
        }
        log_info!("Capture {} cancelled", finish.capture_id);
        self.deliver(finish, CaptureOutcome::Cancelled);
        true
    }

    /// Keep partial input for the timeout path. Ignored once the capture has
    /// ended.
    pub async fn record_partial(&self, payload: RawResponse) -> Result<bool> {
        let mut slot = self.slot.lock().await;
        match slot.phase {
            CapturePhase::Capturing => {
                if let Some(session) = slot.session.as_mut() {
                    session.partial = Some(payload);
                }
                Ok(true)
            }
            phase if phase.is_terminal() => Ok(false),
            phase => Err(AssessmentError::InvalidCapture {
                operation: "record_partial",
                phase,
            }),
        }
    }

    /// Drop the finished capture session and return to `Idle`.
    pub async fn discard(&self) {
        let mut slot = self.slot.lock().await;
        if slot.phase.is_terminal() {
            *slot = CaptureSlot::default();
        }
    }

    fn deliver(&self, finish: Finish, outcome: CaptureOutcome) {
        if let Some(tx) = finish.outcome_tx {
            let result = CaptureResult {
                capture_id: finish.capture_id,
                sub_test_id: finish.sub_test_id,
                outcome,
                finished_at: Utc::now(),
            };
            if tx.send(result).is_err() {
                log_warn!("Capture outcome receiver dropped before delivery");
            }
        }
    }
}
