use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClipboardError {
    #[error("Failed to read clipboard: {0}")]
    Read(String),

    #[error("Failed to write clipboard: {0}")]
    Write(String),

    #[error("Failed to clear clipboard: {0}")]
    Clear(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InjectionError {
    #[error("Input simulation unavailable: {0}")]
    Unavailable(String),

    #[error("Key event rejected: {0}")]
    KeyEvent(String),
}

/// Failure of a single capture session. Every variant is reported only after
/// the prior clipboard content has been put back.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Copy keystroke injection failed: {0}")]
    InjectionFailed(String),

    #[error("Capture timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Clipboard(#[from] ClipboardError),
}

impl From<InjectionError> for CaptureError {
    fn from(err: InjectionError) -> Self {
        CaptureError::InjectionFailed(err.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("Shortcut {0} is already bound by another application")]
    AlreadyBound(String),

    #[error("The system refused to register {0}")]
    PlatformRejected(String),

    #[error("Invalid shortcut: {0}")]
    InvalidCombination(String),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionError {
    #[error("Accessibility permission denied")]
    Denied,
}
