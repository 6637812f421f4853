//! Append-capture engine.
//!
//! One capture is a linear sequence: snapshot the clipboard, clear it, post
//! the copy chord to the foreground application, wait for the settle delay,
//! re-read, then either write `prior + separator + captured` or put the
//! snapshot back. The snapshot is held by a restore guard from the moment the
//! clipboard is first touched, so every exit path that does not end in a
//! successful merge leaves the clipboard as it was found.

use crate::clipboard::ClipboardAccess;
use crate::config::{CaptureSettings, Separator};
use crate::error::{CaptureError, ClipboardError, InjectionError};
use crate::injector::KeystrokeInjector;
use log::{debug, error, warn};
use serde::Serialize;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

type PendingInjection = Option<JoinHandle<Result<(), InjectionError>>>;

/// Text content of the clipboard at one instant. Empty means "no text".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardSnapshot(String);

impl ClipboardSnapshot {
    pub fn take(clipboard: &dyn ClipboardAccess) -> Result<Self, ClipboardError> {
        Ok(Self(clipboard.read_text()?.unwrap_or_default()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Writes the snapshot back. An empty snapshot is restored by clearing,
    /// so no text is ever written for it.
    fn restore(&self, clipboard: &dyn ClipboardAccess) -> Result<(), ClipboardError> {
        if self.is_empty() {
            return clipboard.clear();
        }
        clipboard.write_text(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Idle,
    AwaitingSelectionCopy,
    Merging,
    Restoring,
}

/// One in-flight append operation.
#[derive(Debug, Clone)]
pub struct CaptureSession {
    pub id: u64,
    pub prior_content: String,
    pub started_at: Instant,
    pub state: SessionState,
}

impl CaptureSession {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            prior_content: String::new(),
            started_at: Instant::now(),
            state: SessionState::Idle,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AppendOutcome {
    /// The selection was captured and written after the prior content.
    Appended {
        captured_chars: usize,
        total_chars: usize,
    },
    /// Nothing arrived on the clipboard; the prior content was restored.
    NothingSelected,
}

/// Joins prior clipboard text and a new capture. No separator is introduced
/// when there is no prior text.
pub fn merge(prior: &str, captured: &str, separator: Separator) -> String {
    if prior.is_empty() {
        return captured.to_string();
    }
    let mut merged = String::with_capacity(prior.len() + captured.len() + 1);
    merged.push_str(prior);
    merged.push_str(separator.as_str());
    merged.push_str(captured);
    merged
}

/// Puts the snapshot back when dropped, unless disarmed by a successful merge.
struct RestoreGuard<'a> {
    clipboard: &'a dyn ClipboardAccess,
    snapshot: Option<ClipboardSnapshot>,
}

impl<'a> RestoreGuard<'a> {
    fn arm(clipboard: &'a dyn ClipboardAccess, snapshot: ClipboardSnapshot) -> Self {
        Self {
            clipboard,
            snapshot: Some(snapshot),
        }
    }

    fn disarm(mut self) {
        self.snapshot = None;
    }

    fn restore(mut self) -> Result<(), ClipboardError> {
        match self.snapshot.take() {
            Some(snapshot) => snapshot.restore(self.clipboard),
            None => Ok(()),
        }
    }
}

impl Drop for RestoreGuard<'_> {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            debug!("Restoring clipboard after abandoned capture");
            if let Err(e) = snapshot.restore(self.clipboard) {
                error!("Failed to restore clipboard: {}", e);
            }
        }
    }
}

pub struct AppendEngine {
    clipboard: Arc<dyn ClipboardAccess>,
    injector: Arc<dyn KeystrokeInjector>,
    settings: RwLock<CaptureSettings>,
}

impl AppendEngine {
    pub fn new(
        clipboard: Arc<dyn ClipboardAccess>,
        injector: Arc<dyn KeystrokeInjector>,
        settings: CaptureSettings,
    ) -> Self {
        Self {
            clipboard,
            injector,
            settings: RwLock::new(settings),
        }
    }

    pub fn settings(&self) -> CaptureSettings {
        match self.settings.read() {
            Ok(settings) => *settings,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn update_settings(&self, settings: CaptureSettings) {
        match self.settings.write() {
            Ok(mut current) => *current = settings,
            Err(poisoned) => *poisoned.into_inner() = settings,
        }
    }

    pub fn clipboard(&self) -> &dyn ClipboardAccess {
        self.clipboard.as_ref()
    }

    /// Copies the current selection and appends it to the clipboard text.
    ///
    /// Never leaves the clipboard cleared or half-written: on any outcome
    /// other than [`AppendOutcome::Appended`] the prior text is written back,
    /// including when the whole session exceeds the configured timeout or
    /// when this future is dropped mid-flight.
    pub async fn capture_and_append(
        &self,
        session: &mut CaptureSession,
    ) -> Result<AppendOutcome, CaptureError> {
        let settings = self.settings();

        // Nothing has been touched yet, so a failed read needs no restore.
        let snapshot = ClipboardSnapshot::take(self.clipboard.as_ref())?;
        if snapshot.is_empty() {
            debug!("Capture #{}: clipboard holds no text", session.id);
        }
        session.prior_content = snapshot.as_str().to_string();
        let guard = RestoreGuard::arm(self.clipboard.as_ref(), snapshot);

        let mut pending = None;
        let timed = tokio::time::timeout(
            settings.timeout,
            self.run(session, settings, &mut pending),
        )
        .await;
        let result = match timed {
            Ok(result) => result,
            Err(_) => {
                if let Some(injection) = pending.take() {
                    self.await_late_injection(session.id, injection, settings)
                        .await;
                }
                Err(CaptureError::Timeout(settings.timeout))
            }
        };

        if let Ok(AppendOutcome::Appended { .. }) = result {
            guard.disarm();
            return result;
        }

        session.state = SessionState::Restoring;
        match guard.restore() {
            Ok(()) => {
                debug!(
                    "Capture #{}: restored {} chars",
                    session.id,
                    session.prior_content.chars().count()
                );
                result
            }
            Err(e) => {
                error!("Capture #{}: failed to restore clipboard: {}", session.id, e);
                // The restore failure outranks "nothing selected"; an earlier
                // error is still the root cause.
                result.and(Err(CaptureError::Clipboard(e)))
            }
        }
    }

    /// Waits for a copy chord that was still being posted when the session
    /// timed out, then for the foreground app to act on it. The restore only
    /// runs afterwards, and the session slot stays taken until then.
    async fn await_late_injection(
        &self,
        session_id: u64,
        injection: JoinHandle<Result<(), InjectionError>>,
        settings: CaptureSettings,
    ) {
        warn!(
            "Capture #{}: timed out with the copy keystroke still in flight",
            session_id
        );
        match tokio::time::timeout(settings.timeout, injection).await {
            Ok(_) => tokio::time::sleep(settings.settle_delay).await,
            Err(_) => error!(
                "Capture #{}: injector still blocked {:?} after the timeout",
                session_id, settings.timeout
            ),
        }
    }

    async fn run(
        &self,
        session: &mut CaptureSession,
        settings: CaptureSettings,
        pending: &mut PendingInjection,
    ) -> Result<AppendOutcome, CaptureError> {
        self.clipboard.clear()?;
        session.state = SessionState::AwaitingSelectionCopy;

        // The handle outlives this future so a timeout can still join it.
        let injector = Arc::clone(&self.injector);
        let joined = pending
            .insert(tokio::task::spawn_blocking(move || {
                injector.inject_copy_keystroke()
            }))
            .await;
        *pending = None;
        joined
            .map_err(|e| CaptureError::InjectionFailed(format!("injector task aborted: {}", e)))?
            .inspect_err(|e| warn!("Capture #{}: {}", session.id, e))?;

        tokio::time::sleep(settings.settle_delay).await;

        let captured = match self.clipboard.read_text()? {
            Some(text) => text,
            None => return Ok(AppendOutcome::NothingSelected),
        };

        session.state = SessionState::Merging;
        let merged = merge(&session.prior_content, &captured, settings.separator);
        self.clipboard.write_text(&merged)?;

        Ok(AppendOutcome::Appended {
            captured_chars: captured.chars().count(),
            total_chars: merged.chars().count(),
        })
    }
}
