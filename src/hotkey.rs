use crate::error::RegistrationError;
use crate::gatekeeper::Gatekeeper;
use crate::tray;
use log::{debug, info, warn};
use std::sync::Arc;
use tauri::{AppHandle, Runtime};
use tauri_plugin_global_shortcut::{GlobalShortcutExt, Shortcut, ShortcutState};

/// Binds `combination` system-wide so each press runs one capture through
/// the gatekeeper.
pub fn register_hotkey<R: Runtime>(
    app: &AppHandle<R>,
    combination: &str,
    gatekeeper: Arc<Gatekeeper>,
) -> Result<(), RegistrationError> {
    let shortcut: Shortcut = combination
        .parse()
        .map_err(|e| RegistrationError::InvalidCombination(format!("{}: {:?}", combination, e)))?;

    // A binding left over from a previous registration in this process.
    if app.global_shortcut().is_registered(shortcut.clone()) {
        debug!("{} already registered by us, re-binding", combination);
        let _ = app.global_shortcut().unregister(shortcut.clone());
    }

    let app_handle = app.clone();
    app.global_shortcut()
        .on_shortcut(shortcut, move |_app, _shortcut, event| {
            if event.state == ShortcutState::Pressed {
                let app = app_handle.clone();
                let gatekeeper = Arc::clone(&gatekeeper);
                tauri::async_runtime::spawn(async move {
                    let dispatch = gatekeeper.trigger().await;
                    tray::report(&app, &dispatch);
                });
            }
        })
        .map_err(|e| classify_registration_error(combination, &e.to_string()))?;

    info!("Append shortcut registered: {}", combination);
    Ok(())
}

/// Releases a single binding, e.g. before switching to a new combination.
pub fn unregister_hotkey<R: Runtime>(app: &AppHandle<R>, combination: &str) {
    let Ok(shortcut) = combination.parse::<Shortcut>() else {
        return;
    };
    if let Err(e) = app.global_shortcut().unregister(shortcut) {
        warn!("Failed to unregister {}: {}", combination, e);
    }
}

/// Releases every binding this process holds in the OS hotkey table.
pub fn unregister_all<R: Runtime>(app: &AppHandle<R>) {
    match app.global_shortcut().unregister_all() {
        Ok(()) => debug!("Global shortcuts released"),
        Err(e) => warn!("Failed to release global shortcuts: {}", e),
    }
}

/// Maps the backend's error text onto the registration taxonomy. The
/// backends report a combination held by another process as "already
/// registered" (Windows), an existing-hotkey OSStatus (macOS) or
/// `BadAccess` (X11).
pub fn classify_registration_error(combination: &str, message: &str) -> RegistrationError {
    let lowered = message.to_lowercase();
    let taken = ["already", "exists", "in use", "badaccess"]
        .iter()
        .any(|needle| lowered.contains(needle));

    if taken {
        RegistrationError::AlreadyBound(combination.to_string())
    } else {
        RegistrationError::PlatformRejected(format!("{} ({})", combination, message))
    }
}

/// Human-readable form of an accelerator string, e.g. `⌘⇧C` on macOS and
/// `Ctrl+Shift+C` elsewhere.
pub fn display_label(combination: &str, macos: bool) -> String {
    let parts: Vec<String> = combination
        .split('+')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let symbol = match (part.to_lowercase().as_str(), macos) {
                ("commandorcontrol" | "cmdorctrl" | "commandorctrl" | "cmdorcontrol", true) => "⌘",
                ("commandorcontrol" | "cmdorctrl" | "commandorctrl" | "cmdorcontrol", false) => {
                    "Ctrl"
                }
                ("command" | "cmd" | "super" | "meta", true) => "⌘",
                ("command" | "cmd" | "super" | "meta", false) => "Super",
                ("control" | "ctrl", true) => "⌃",
                ("control" | "ctrl", false) => "Ctrl",
                ("shift", true) => "⇧",
                ("shift", false) => "Shift",
                ("alt" | "option", true) => "⌥",
                ("alt" | "option", false) => "Alt",
                _ => return part.strip_prefix("Key").unwrap_or(part).to_uppercase(),
            };
            symbol.to_string()
        })
        .collect();

    if macos {
        parts.concat()
    } else {
        parts.join("+")
    }
}
