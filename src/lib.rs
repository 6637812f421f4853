mod autostart;
mod capture;
mod clipboard;
mod config;
mod error;
mod gatekeeper;
mod hotkey;
mod injector;
mod logging;
mod permission;
mod tray;

#[cfg(test)]
mod test_utils;

use capture::AppendEngine;
use clipboard::TauriClipboard;
use config::AppConfig;
use error::RegistrationError;
use gatekeeper::{Dispatch, GateState, Gatekeeper};
use injector::EnigoInjector;
use log::{info, warn};
use permission::{DialogPrompt, FlowResolution, PermissionState, TrustStore};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tauri::{AppHandle, Manager, RunEvent, Runtime, State};

const GRANT_POLL_INTERVAL: Duration = Duration::from_secs(2);
const GRANT_MAX_WAIT: Duration = Duration::from_secs(300);

// Shared app state
pub(crate) struct AppState {
    gatekeeper: Arc<Gatekeeper>,
    config: Mutex<AppConfig>,
    binding: Mutex<Result<Option<String>, RegistrationError>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl AppState {
    fn config(&self) -> AppConfig {
        lock(&self.config).clone()
    }

    fn replace_config(&self, config: AppConfig) -> AppConfig {
        std::mem::replace(&mut *lock(&self.config), config)
    }
}

#[derive(Debug, Serialize)]
struct StatusReport {
    gate: GateState,
    permission: PermissionState,
    hotkey: Option<String>,
    hotkey_error: Option<String>,
    busy: bool,
    last_outcome: Option<String>,
}

fn shortcut_label(config: &AppConfig) -> String {
    hotkey::display_label(&config.hotkeys.append_hotkey, cfg!(target_os = "macos"))
}

/// Binds the append shortcut. A failure is reported and the app keeps
/// running without it.
fn bind_hotkey<R: Runtime>(app: &AppHandle<R>, state: &AppState, combination: &str) {
    match hotkey::register_hotkey(app, combination, Arc::clone(&state.gatekeeper)) {
        Ok(()) => {
            state.gatekeeper.mark_hotkey_active();
            *lock(&state.binding) = Ok(Some(combination.to_string()));
        }
        Err(e) => {
            warn!("Continuing without the append shortcut: {}", e);
            tray::set_tooltip(app, &format!("CopyStack - {}", e));
            *lock(&state.binding) = Err(e);
        }
    }
}

/// Persists `new_config` and applies whatever changed.
fn apply_config<R: Runtime>(app: &AppHandle<R>, new_config: AppConfig) -> anyhow::Result<()> {
    config::save(app, &new_config)?;

    let state = app.state::<AppState>();
    let previous = state.replace_config(new_config.clone());
    state
        .gatekeeper
        .engine()
        .update_settings(new_config.capture_settings());

    if previous.hotkeys.append_hotkey != new_config.hotkeys.append_hotkey {
        hotkey::unregister_hotkey(app, &previous.hotkeys.append_hotkey);
        bind_hotkey(app, &state, &new_config.hotkeys.append_hotkey);
    }

    if previous.autostart != new_config.autostart {
        autostart::apply(new_config.autostart)?;
    }

    tray::refresh_menu(app, &shortcut_label(&new_config), new_config.autostart)?;
    Ok(())
}

pub(crate) fn toggle_autostart<R: Runtime>(app: &AppHandle<R>) {
    let Some(state) = app.try_state::<AppState>() else {
        return;
    };
    let mut config = state.config();
    config.autostart = !config.autostart;

    if let Err(e) = apply_config(app, config) {
        warn!("Failed to toggle launch at login: {:#}", e);
    }
}

/// Asks about missing accessibility trust once, off the main thread.
fn spawn_permission_flow<R: Runtime>(
    app: &AppHandle<R>,
    gatekeeper: Arc<Gatekeeper>,
    trust_store: Option<Arc<dyn TrustStore>>,
    label: String,
) {
    let app = app.clone();
    tauri::async_runtime::spawn_blocking(move || {
        let prompt = DialogPrompt::new(app.clone(), label);
        let resolution = permission::request_permission_flow(PermissionState::Denied, &prompt);
        gatekeeper.apply_resolution(resolution);

        match resolution {
            FlowResolution::Abort => {
                info!("Quitting at user request: accessibility permission missing");
                app.exit(1);
            }
            FlowResolution::AwaitingGrant => {
                let Some(store) = trust_store else {
                    return;
                };
                tauri::async_runtime::spawn(async move {
                    if permission::watch_for_grant(store, GRANT_POLL_INTERVAL, GRANT_MAX_WAIT).await
                    {
                        gatekeeper.grant();
                    } else {
                        warn!("Accessibility permission still missing; shortcut stays inactive");
                    }
                });
            }
            FlowResolution::Granted | FlowResolution::ProceedAnyway => {}
        }
    });
}

fn shutdown<R: Runtime>(app: &AppHandle<R>) {
    if let Some(state) = app.try_state::<AppState>() {
        state.gatekeeper.begin_shutdown();
    }
    hotkey::unregister_all(app);
    info!("CopyStack stopped");
}

// Tauri commands. No window ships with the app, so nothing calls these yet;
// they back a settings window, which must be granted them in a capability.

#[tauri::command]
async fn load_config(app: AppHandle) -> Result<AppConfig, String> {
    config::load(&app).map_err(|e| e.to_string())
}

#[tauri::command]
async fn save_config(app: AppHandle, config: AppConfig) -> Result<(), String> {
    apply_config(&app, config).map_err(|e| format!("{:#}", e))
}

#[tauri::command]
async fn get_status(state: State<'_, AppState>) -> Result<StatusReport, String> {
    let (hotkey, hotkey_error) = match &*lock(&state.binding) {
        Ok(binding) => (binding.clone(), None),
        Err(e) => (None, Some(e.to_string())),
    };

    Ok(StatusReport {
        gate: state.gatekeeper.state(),
        permission: state.gatekeeper.permission(),
        hotkey,
        hotkey_error,
        busy: state.gatekeeper.is_busy(),
        last_outcome: state
            .gatekeeper
            .last_result()
            .map(|result| tray::describe_result(&result)),
    })
}

/// Runs one capture exactly as a shortcut press would.
#[tauri::command]
async fn append_selection(app: AppHandle, state: State<'_, AppState>) -> Result<String, String> {
    let dispatch = state.gatekeeper.trigger().await;
    tray::report(&app, &dispatch);

    match dispatch {
        Dispatch::Ran { result: Ok(outcome), .. } => Ok(tray::describe_result(&Ok(outcome))),
        Dispatch::Ran { result: Err(e), .. } => Err(e.to_string()),
        Dispatch::Busy => Err("A capture is already in progress".to_string()),
        Dispatch::Refused(refusal) => Err(format!("Capture refused: {:?}", refusal)),
    }
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    tauri::Builder::default()
        .setup(|app| {
            // Background utility: no dock icon, only the tray.
            #[cfg(target_os = "macos")]
            app.set_activation_policy(tauri::ActivationPolicy::Accessory);

            let handle = app.handle().clone();

            let config = config::load(&handle).unwrap_or_else(|e| {
                eprintln!("Warning: using default config: {:#}", e);
                AppConfig::default()
            });

            let log_dir = app.path().app_log_dir().ok();
            if let Err(e) = logging::init(log_dir.as_deref(), config.level_filter()) {
                eprintln!("Warning: {:#}", e);
            }
            info!("CopyStack starting");

            let engine = AppendEngine::new(
                Arc::new(TauriClipboard::new(handle.clone())),
                Arc::new(EnigoInjector),
                config.capture_settings(),
            );
            let gatekeeper = Arc::new(Gatekeeper::new(engine));

            // Checked once here; presses never re-query the trust store.
            let trust_store = permission::system_trust_store();
            let permission_state = permission::check_capture_permission(trust_store.as_deref());
            gatekeeper.record_permission(permission_state);

            let label = shortcut_label(&config);
            app.manage(AppState {
                gatekeeper: Arc::clone(&gatekeeper),
                config: Mutex::new(config.clone()),
                binding: Mutex::new(Ok(None)),
            });

            tray::build(&handle, &label, config.autostart)?;

            let state = app.state::<AppState>();
            bind_hotkey(&handle, &state, &config.hotkeys.append_hotkey);

            if permission_state == PermissionState::Denied {
                spawn_permission_flow(&handle, gatekeeper, trust_store, label.clone());
            }

            if let Err(e) = autostart::apply(config.autostart) {
                warn!("{:#}", e);
            }

            info!("CopyStack ready: {} copies and appends", label);
            Ok(())
        })
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_global_shortcut::Builder::new().build())
        .plugin(tauri_plugin_clipboard_manager::init())
        .plugin(tauri_plugin_store::Builder::default().build())
        .plugin(tauri_plugin_dialog::init())
        .invoke_handler(tauri::generate_handler![
            load_config,
            save_config,
            get_status,
            append_selection,
        ])
        .build(tauri::generate_context!())
        .expect("error while building tauri application")
        .run(|app, event| match event {
            // No windows: only an explicit exit (tray Quit, permission abort)
            // carries an exit code.
            RunEvent::ExitRequested { api, code, .. } if code.is_none() => api.prevent_exit(),
            RunEvent::Exit => shutdown(app),
            _ => {}
        });
}
