use crate::error::InjectionError;
use enigo::{Direction, Enigo, Key, Keyboard, Settings};

/// Synthesizes the platform "copy" chord into whichever application has focus.
///
/// The call returns once the key events are posted. The foreground application
/// handles them, and writes the clipboard, on its own schedule.
pub trait KeystrokeInjector: Send + Sync {
    fn inject_copy_keystroke(&self) -> Result<(), InjectionError>;
}

/// Modifier that turns `C` into "copy" on this platform.
pub fn copy_modifier() -> Key {
    if cfg!(target_os = "macos") {
        Key::Meta
    } else {
        Key::Control
    }
}

/// Injector backed by `enigo`: CGEvent posting on macOS, `SendInput` on
/// Windows, XTest on X11.
#[derive(Debug, Default)]
pub struct EnigoInjector;

impl KeystrokeInjector for EnigoInjector {
    fn inject_copy_keystroke(&self) -> Result<(), InjectionError> {
        let mut enigo = Enigo::new(&Settings::default())
            .map_err(|e| InjectionError::Unavailable(e.to_string()))?;

        let modifier = copy_modifier();
        enigo
            .key(modifier, Direction::Press)
            .map_err(|e| InjectionError::KeyEvent(e.to_string()))?;

        let chord = enigo.key(Key::Unicode('c'), Direction::Click);

        // Release the modifier even when the click failed, otherwise it stays
        // stuck down in the foreground application.
        let release = enigo.key(modifier, Direction::Release);

        chord.map_err(|e| InjectionError::KeyEvent(e.to_string()))?;
        release.map_err(|e| InjectionError::KeyEvent(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_modifier_matches_platform() {
        #[cfg(target_os = "macos")]
        assert!(matches!(copy_modifier(), Key::Meta));
        #[cfg(not(target_os = "macos"))]
        assert!(matches!(copy_modifier(), Key::Control));
    }
}
