use crate::capture::AppendOutcome;
use crate::error::{CaptureError, PermissionError};
use crate::gatekeeper::{Dispatch, GateRefusal};
use crate::AppState;
use log::{debug, warn};
use tauri::image::Image;
use tauri::menu::{CheckMenuItem, Menu, MenuItem, PredefinedMenuItem};
use tauri::tray::TrayIconBuilder;
use tauri::{AppHandle, Manager, Runtime};

pub const TRAY_ID: &str = "copystack";
const ICON_SIZE: u32 = 32;
const DEFAULT_TOOLTIP: &str = "CopyStack - Advanced Clipboard Tool";

/// RGBA pixels of the tray icon: a framed page with text lines and a green
/// "+" badge in the lower right corner.
pub fn render_icon(size: u32) -> Vec<u8> {
    const BLACK: [u8; 4] = [0, 0, 0, 255];
    const WHITE: [u8; 4] = [255, 255, 255, 255];
    const GREEN: [u8; 4] = [0, 160, 0, 255];

    // Geometry is laid out on a 32x32 grid and scaled.
    let scale = size as f32 / 32.0;
    let lines: [(u32, u32); 4] = [(8, 25), (13, 21), (18, 23), (23, 19)];

    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for py in 0..size {
        for px in 0..size {
            let x = (px as f32 / scale) as i32;
            let y = (py as f32 / scale) as i32;
            let (dx, dy) = (x - 26, y - 26);

            let color = if dx * dx + dy * dy <= 25 {
                if (dx.abs() <= 2 && dy == 0) || (dy.abs() <= 2 && dx == 0) {
                    WHITE
                } else {
                    GREEN
                }
            } else if !(2..=29).contains(&x) || !(2..=29).contains(&y) {
                BLACK
            } else if lines.iter().any(|&(top, end)| {
                let on_row = y as u32 == top || y as u32 == top + 1;
                on_row && (6..=end).contains(&(x as u32))
            }) {
                BLACK
            } else {
                WHITE
            };
            pixels.extend_from_slice(&color);
        }
    }
    pixels
}

fn build_menu<R: Runtime>(
    app: &AppHandle<R>,
    shortcut_label: &str,
    autostart: bool,
) -> tauri::Result<Menu<R>> {
    let title = MenuItem::with_id(app, "title", "CopyStack - Active", false, None::<&str>)?;
    let shortcut = MenuItem::with_id(
        app,
        "shortcut",
        format!("{} - Copy and append", shortcut_label),
        false,
        None::<&str>,
    )?;
    let clear = MenuItem::with_id(app, "clear", "Clear Clipboard", true, None::<&str>)?;
    let launch = CheckMenuItem::with_id(
        app,
        "autostart",
        "Launch at Login",
        true,
        autostart,
        None::<&str>,
    )?;
    let quit = MenuItem::with_id(app, "quit", "Quit CopyStack", true, None::<&str>)?;
    let separator = PredefinedMenuItem::separator(app)?;

    Menu::with_items(
        app,
        &[
            &title,
            &shortcut,
            &separator,
            &clear,
            &launch,
            &separator,
            &quit,
        ],
    )
}

pub fn build<R: Runtime>(
    app: &AppHandle<R>,
    shortcut_label: &str,
    autostart: bool,
) -> tauri::Result<()> {
    let menu = build_menu(app, shortcut_label, autostart)?;
    let icon = Image::new_owned(render_icon(ICON_SIZE), ICON_SIZE, ICON_SIZE);

    TrayIconBuilder::with_id(TRAY_ID)
        .icon(icon)
        .menu(&menu)
        .tooltip(DEFAULT_TOOLTIP)
        .on_menu_event(|app, event| match event.id.as_ref() {
            "clear" => clear_clipboard(app),
            "autostart" => crate::toggle_autostart(app),
            "quit" => app.exit(0),
            _ => {}
        })
        .build(app)?;

    Ok(())
}

/// Rebuilds the menu after the shortcut or the login item changed.
pub fn refresh_menu<R: Runtime>(
    app: &AppHandle<R>,
    shortcut_label: &str,
    autostart: bool,
) -> tauri::Result<()> {
    if let Some(tray) = app.tray_by_id(TRAY_ID) {
        tray.set_menu(Some(build_menu(app, shortcut_label, autostart)?))?;
    }
    Ok(())
}

pub fn set_tooltip<R: Runtime>(app: &AppHandle<R>, text: &str) {
    if let Some(tray) = app.tray_by_id(TRAY_ID) {
        if let Err(e) = tray.set_tooltip(Some(text)) {
            debug!("Failed to update tray tooltip: {}", e);
        }
    }
}

fn clear_clipboard<R: Runtime>(app: &AppHandle<R>) {
    let Some(state) = app.try_state::<AppState>() else {
        return;
    };
    if state.gatekeeper.is_busy() {
        debug!("Clear ignored while a capture is in flight");
        return;
    }
    if let Err(e) = state.gatekeeper.engine().clipboard().clear() {
        warn!("{}", e);
    }
}

/// Surfaces the result of a hotkey press in the tray tooltip.
pub fn report<R: Runtime>(app: &AppHandle<R>, dispatch: &Dispatch) {
    if let Some(text) = describe_dispatch(dispatch) {
        set_tooltip(app, &format!("CopyStack - {}", text));
    }
}

pub fn describe_dispatch(dispatch: &Dispatch) -> Option<String> {
    match dispatch {
        Dispatch::Ran { result, .. } => Some(describe_result(result)),
        Dispatch::Busy => None,
        Dispatch::Refused(GateRefusal::Permission(PermissionError::Denied)) => {
            Some("Accessibility permission required".to_string())
        }
        Dispatch::Refused(GateRefusal::NotReady(state)) => Some(format!("Not ready ({:?})", state)),
    }
}

pub fn describe_result(result: &Result<AppendOutcome, CaptureError>) -> String {
    match result {
        Ok(AppendOutcome::Appended {
            captured_chars,
            total_chars,
        }) => format!(
            "Appended {} chars ({} on clipboard)",
            captured_chars, total_chars
        ),
        Ok(AppendOutcome::NothingSelected) => "Nothing selected, clipboard unchanged".to_string(),
        Err(e) => format!("{} (clipboard restored)", e),
    }
}
