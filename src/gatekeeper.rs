use crate::capture::{AppendEngine, AppendOutcome, CaptureSession};
use crate::error::{CaptureError, PermissionError};
use crate::permission::{FlowResolution, PermissionState};
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Mutex as AsyncMutex;

/// Lifecycle of the shortcut binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GateState {
    Uninitialized,
    PermissionChecked,
    HotkeyActive,
    ShuttingDown,
}

/// Why a trigger did not reach the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateRefusal {
    NotReady(GateState),
    Permission(PermissionError),
}

/// Result of handing one hotkey press to the gatekeeper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Ran {
        session_id: u64,
        result: Result<AppendOutcome, CaptureError>,
    },
    /// Another session was still in flight; this press was dropped.
    Busy,
    Refused(GateRefusal),
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the capture-session slot and decides whether a press may run.
///
/// At most one [`CaptureSession`] exists at a time: it lives in `session`
/// while the engine works on it and is dropped when the engine returns.
pub struct Gatekeeper {
    engine: AppendEngine,
    state: Mutex<GateState>,
    permission: Mutex<PermissionState>,
    proceed_anyway: AtomicBool,
    session: Arc<AsyncMutex<Option<CaptureSession>>>,
    next_session_id: AtomicU64,
    last_result: Mutex<Option<Result<AppendOutcome, CaptureError>>>,
}

impl Gatekeeper {
    pub fn new(engine: AppendEngine) -> Self {
        Self {
            engine,
            state: Mutex::new(GateState::Uninitialized),
            permission: Mutex::new(PermissionState::Unknown),
            proceed_anyway: AtomicBool::new(false),
            session: Arc::new(AsyncMutex::new(None)),
            next_session_id: AtomicU64::new(1),
            last_result: Mutex::new(None),
        }
    }

    pub fn engine(&self) -> &AppendEngine {
        &self.engine
    }

    pub fn state(&self) -> GateState {
        *lock(&self.state)
    }

    pub fn permission(&self) -> PermissionState {
        *lock(&self.permission)
    }

    pub fn last_result(&self) -> Option<Result<AppendOutcome, CaptureError>> {
        lock(&self.last_result).clone()
    }

    /// Records the startup permission check. Only the first call moves the
    /// gate out of `Uninitialized`.
    pub fn record_permission(&self, permission: PermissionState) {
        *lock(&self.permission) = permission;
        let mut state = lock(&self.state);
        if *state == GateState::Uninitialized {
            *state = GateState::PermissionChecked;
        }
        debug!("Permission checked: {:?}", permission);
    }

    pub fn apply_resolution(&self, resolution: FlowResolution) {
        match resolution {
            FlowResolution::Granted | FlowResolution::AwaitingGrant => {}
            FlowResolution::ProceedAnyway => self.proceed_anyway.store(true, Ordering::SeqCst),
            FlowResolution::Abort => self.begin_shutdown(),
        }
    }

    /// Trust was granted after startup.
    pub fn grant(&self) {
        *lock(&self.permission) = PermissionState::Granted;
        info!("Accessibility permission granted");
    }

    /// Returns false when the gate is not in a state that can hold a binding.
    pub fn mark_hotkey_active(&self) -> bool {
        let mut state = lock(&self.state);
        match *state {
            GateState::PermissionChecked | GateState::HotkeyActive => {
                *state = GateState::HotkeyActive;
                true
            }
            other => {
                warn!("Hotkey bound while gate is {:?}", other);
                false
            }
        }
    }

    pub fn begin_shutdown(&self) {
        *lock(&self.state) = GateState::ShuttingDown;
    }

    pub fn is_busy(&self) -> bool {
        match self.session.try_lock() {
            Ok(slot) => slot.is_some(),
            Err(_) => true,
        }
    }

    pub fn check(&self) -> Result<(), GateRefusal> {
        let state = self.state();
        let proceed_anyway = self.proceed_anyway.load(Ordering::SeqCst);

        let ready = match state {
            GateState::HotkeyActive => true,
            GateState::PermissionChecked => proceed_anyway,
            GateState::Uninitialized | GateState::ShuttingDown => false,
        };
        if !ready {
            return Err(GateRefusal::NotReady(state));
        }

        match self.permission() {
            PermissionState::Granted => Ok(()),
            PermissionState::Unknown => {
                debug!("Permission unknown, attempting capture");
                Ok(())
            }
            PermissionState::Denied if proceed_anyway => Ok(()),
            PermissionState::Denied => Err(GateRefusal::Permission(PermissionError::Denied)),
        }
    }

    /// Runs one capture session for a hotkey press, or explains why not.
    pub async fn trigger(&self) -> Dispatch {
        if let Err(refusal) = self.check() {
            info!("Shortcut ignored: {:?}", refusal);
            return Dispatch::Refused(refusal);
        }

        let Ok(mut slot) = Arc::clone(&self.session).try_lock_owned() else {
            debug!("Shortcut ignored: capture already in flight");
            return Dispatch::Busy;
        };

        let session_id = self.next_session_id.fetch_add(1, Ordering::SeqCst);
        let session = slot.insert(CaptureSession::new(session_id));
        let result = self.engine.capture_and_append(session).await;
        let elapsed = session.elapsed();

        match &result {
            Ok(outcome) => info!(
                "Capture #{} finished in {:?}: {:?}",
                session_id, elapsed, outcome
            ),
            Err(e) => warn!("Capture #{} failed after {:?}: {}", session_id, elapsed, e),
        }

        *slot = None;
        *lock(&self.last_result) = Some(result.clone());

        Dispatch::Ran { session_id, result }
    }
}
