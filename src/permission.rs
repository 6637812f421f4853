//! Accessibility / input-monitoring entitlement.
//!
//! macOS only lets trusted processes post synthetic key events. The trust
//! state is read once at startup; if it is missing the user is asked once
//! what to do, and hotkey presses never re-query it.

use anyhow::Result;
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tauri::{AppHandle, Runtime};
use tauri_plugin_dialog::{DialogExt, MessageDialogButtons, MessageDialogKind};
use tauri_plugin_opener::OpenerExt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PermissionState {
    Granted,
    Denied,
    Unknown,
}

/// OS record of whether this process may inject input.
pub trait TrustStore: Send + Sync {
    fn is_trusted(&self) -> Result<bool>;
}

/// `AXIsProcessTrusted` from the ApplicationServices framework.
#[cfg(target_os = "macos")]
#[derive(Debug, Default)]
pub struct AccessibilityTrustStore;

#[cfg(target_os = "macos")]
impl TrustStore for AccessibilityTrustStore {
    fn is_trusted(&self) -> Result<bool> {
        Ok(unsafe { accessibility_sys::AXIsProcessTrusted() })
    }
}

/// The trust store of this platform, or `None` where injection is not gated.
pub fn system_trust_store() -> Option<Arc<dyn TrustStore>> {
    #[cfg(target_os = "macos")]
    {
        Some(Arc::new(AccessibilityTrustStore))
    }
    #[cfg(not(target_os = "macos"))]
    {
        None
    }
}

pub fn privacy_settings_url() -> Option<&'static str> {
    if cfg!(target_os = "macos") {
        Some("x-apple.systempreferences:com.apple.preference.security?Privacy_Accessibility")
    } else {
        None
    }
}

pub fn check_capture_permission(store: Option<&dyn TrustStore>) -> PermissionState {
    let Some(store) = store else {
        return PermissionState::Granted;
    };
    match store.is_trusted() {
        Ok(true) => PermissionState::Granted,
        Ok(false) => PermissionState::Denied,
        Err(e) => {
            warn!("Could not query accessibility trust: {}", e);
            PermissionState::Unknown
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionChoice {
    OpenSettings,
    ProceedAnyway,
    Abort,
}

/// The one-time explanation shown when trust is missing.
pub trait PermissionPrompt: Send + Sync {
    fn ask(&self) -> PermissionChoice;

    fn open_privacy_settings(&self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowResolution {
    /// No prompt was needed.
    Granted,
    /// Settings were opened; capture stays gated until trust shows up.
    AwaitingGrant,
    ProceedAnyway,
    Abort,
}

pub fn request_permission_flow(
    state: PermissionState,
    prompt: &dyn PermissionPrompt,
) -> FlowResolution {
    if state != PermissionState::Denied {
        return FlowResolution::Granted;
    }

    match prompt.ask() {
        PermissionChoice::OpenSettings => {
            if let Err(e) = prompt.open_privacy_settings() {
                warn!("Failed to open privacy settings: {}", e);
            }
            FlowResolution::AwaitingGrant
        }
        PermissionChoice::ProceedAnyway => {
            info!("Continuing without accessibility permission");
            FlowResolution::ProceedAnyway
        }
        PermissionChoice::Abort => FlowResolution::Abort,
    }
}

/// Polls the trust store until it reports trust or `max_wait` passes.
pub async fn watch_for_grant(
    store: Arc<dyn TrustStore>,
    interval: Duration,
    max_wait: Duration,
) -> bool {
    let started = Instant::now();
    let mut ticker = tokio::time::interval(interval);

    while started.elapsed() < max_wait {
        ticker.tick().await;
        match store.is_trusted() {
            Ok(true) => return true,
            Ok(false) => {}
            Err(e) => debug!("Trust query failed while waiting for grant: {}", e),
        }
    }
    false
}

/// Native message dialogs through `tauri-plugin-dialog`.
///
/// `ask` blocks until the user answers, so it must not run on the main thread.
pub struct DialogPrompt<R: Runtime> {
    app: AppHandle<R>,
    shortcut_label: String,
}

impl<R: Runtime> DialogPrompt<R> {
    pub fn new(app: AppHandle<R>, shortcut_label: impl Into<String>) -> Self {
        Self {
            app,
            shortcut_label: shortcut_label.into(),
        }
    }
}

impl<R: Runtime> PermissionPrompt for DialogPrompt<R> {
    fn ask(&self) -> PermissionChoice {
        let open_settings = self
            .app
            .dialog()
            .message(format!(
                "CopyStack needs Accessibility access to copy your selection when you press {}.\n\n\
                 Grant it under System Settings > Privacy & Security > Accessibility.",
                self.shortcut_label
            ))
            .title("Accessibility Permission Required")
            .kind(MessageDialogKind::Warning)
            .buttons(MessageDialogButtons::OkCancelCustom(
                "Open Settings".to_string(),
                "Not Now".to_string(),
            ))
            .blocking_show();

        if open_settings {
            return PermissionChoice::OpenSettings;
        }

        let proceed = self
            .app
            .dialog()
            .message(
                "Without Accessibility access the shortcut will not be able to copy the selection.",
            )
            .title("Continue Without Permission?")
            .kind(MessageDialogKind::Info)
            .buttons(MessageDialogButtons::OkCancelCustom(
                "Continue Anyway".to_string(),
                "Quit CopyStack".to_string(),
            ))
            .blocking_show();

        if proceed {
            PermissionChoice::ProceedAnyway
        } else {
            PermissionChoice::Abort
        }
    }

    fn open_privacy_settings(&self) -> Result<()> {
        let Some(url) = privacy_settings_url() else {
            anyhow::bail!("No privacy settings pane on this platform");
        };
        self.app.opener().open_url(url, None::<&str>)?;
        Ok(())
    }
}
