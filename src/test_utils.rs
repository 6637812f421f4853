//! In-memory stand-ins for the clipboard, the keystroke injector and the
//! permission collaborators.

use crate::clipboard::ClipboardAccess;
use crate::error::{ClipboardError, InjectionError};
use crate::injector::KeystrokeInjector;
use crate::permission::{PermissionChoice, PermissionPrompt, TrustStore};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipOp {
    Read,
    Write(String),
    Clear,
}

/// Text-only clipboard. An empty string stands for "no text".
#[derive(Default)]
pub struct FakeClipboard {
    text: Mutex<String>,
    ops: Mutex<Vec<ClipOp>>,
    fail_reads: AtomicBool,
    fail_clear: AtomicBool,
    fail_writes: AtomicBool,
}

impl FakeClipboard {
    pub fn with_text(text: &str) -> Arc<Self> {
        let clipboard = Self::default();
        *clipboard.text.lock().unwrap() = text.to_string();
        Arc::new(clipboard)
    }

    pub fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn text(&self) -> String {
        self.text.lock().unwrap().clone()
    }

    /// Simulates another application writing the clipboard.
    pub fn set_external(&self, text: &str) {
        *self.text.lock().unwrap() = text.to_string();
    }

    pub fn ops(&self) -> Vec<ClipOp> {
        self.ops.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                ClipOp::Write(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Makes every read fail, as when another process holds the clipboard.
    pub fn fail_read(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    pub fn fail_clear(&self) {
        self.fail_clear.store(true, Ordering::SeqCst);
    }

    /// Makes the next write fail; later writes succeed again.
    pub fn fail_next_write(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }
}

impl ClipboardAccess for FakeClipboard {
    fn read_text(&self) -> Result<Option<String>, ClipboardError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(ClipboardError::Read("clipboard locked".to_string()));
        }
        self.ops.lock().unwrap().push(ClipOp::Read);
        let text = self.text.lock().unwrap();
        Ok(if text.is_empty() {
            None
        } else {
            Some(text.clone())
        })
    }

    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        if self.fail_writes.swap(false, Ordering::SeqCst) {
            return Err(ClipboardError::Write("clipboard locked".to_string()));
        }
        self.ops.lock().unwrap().push(ClipOp::Write(text.to_string()));
        *self.text.lock().unwrap() = text.to_string();
        Ok(())
    }

    fn clear(&self) -> Result<(), ClipboardError> {
        if self.fail_clear.load(Ordering::SeqCst) {
            return Err(ClipboardError::Clear("clipboard locked".to_string()));
        }
        self.ops.lock().unwrap().push(ClipOp::Clear);
        self.text.lock().unwrap().clear();
        Ok(())
    }
}

/// What the foreground application does when it receives the copy chord.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Copies the given selection onto the clipboard.
    Copies(String),
    /// Nothing is selected; the clipboard stays untouched.
    Silent,
    /// The platform refuses the synthetic key event.
    Fails(String),
    /// The injection call blocks for the given duration.
    Hangs(Duration),
    /// The chord is posted late: blocks, then the selection lands.
    CopiesAfter(Duration, String),
    Panics,
}

pub struct FakeInjector {
    clipboard: Arc<FakeClipboard>,
    behavior: Mutex<Behavior>,
    calls: AtomicUsize,
}

impl FakeInjector {
    pub fn new(clipboard: Arc<FakeClipboard>, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            clipboard,
            behavior: Mutex::new(behavior),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set_behavior(&self, behavior: Behavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl KeystrokeInjector for FakeInjector {
    fn inject_copy_keystroke(&self) -> Result<(), InjectionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self.behavior.lock().unwrap().clone();
        match behavior {
            Behavior::Copies(text) => {
                self.clipboard.set_external(&text);
                Ok(())
            }
            Behavior::Silent => Ok(()),
            Behavior::Fails(reason) => Err(InjectionError::KeyEvent(reason)),
            Behavior::Hangs(duration) => {
                std::thread::sleep(duration);
                Ok(())
            }
            Behavior::CopiesAfter(duration, text) => {
                std::thread::sleep(duration);
                self.clipboard.set_external(&text);
                Ok(())
            }
            Behavior::Panics => panic!("injector crashed"),
        }
    }
}

/// Trust store whose answer can be flipped by the test.
pub struct FakeTrustStore {
    trusted: AtomicBool,
    broken: bool,
    queries: AtomicUsize,
}

impl FakeTrustStore {
    pub fn new(trusted: bool) -> Arc<Self> {
        Arc::new(Self {
            trusted: AtomicBool::new(trusted),
            broken: false,
            queries: AtomicUsize::new(0),
        })
    }

    pub fn broken() -> Arc<Self> {
        Arc::new(Self {
            trusted: AtomicBool::new(false),
            broken: true,
            queries: AtomicUsize::new(0),
        })
    }

    pub fn grant(&self) {
        self.trusted.store(true, Ordering::SeqCst);
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl TrustStore for FakeTrustStore {
    fn is_trusted(&self) -> anyhow::Result<bool> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.broken {
            anyhow::bail!("trust database unavailable");
        }
        Ok(self.trusted.load(Ordering::SeqCst))
    }
}

/// Prompt that answers with a fixed choice and counts how often it was shown.
pub struct ScriptedPrompt {
    choice: PermissionChoice,
    shown: AtomicUsize,
    settings_opened: AtomicUsize,
}

impl ScriptedPrompt {
    pub fn answering(choice: PermissionChoice) -> Self {
        Self {
            choice,
            shown: AtomicUsize::new(0),
            settings_opened: AtomicUsize::new(0),
        }
    }

    pub fn shown(&self) -> usize {
        self.shown.load(Ordering::SeqCst)
    }

    pub fn settings_opened(&self) -> usize {
        self.settings_opened.load(Ordering::SeqCst)
    }
}

impl PermissionPrompt for ScriptedPrompt {
    fn ask(&self) -> PermissionChoice {
        self.shown.fetch_add(1, Ordering::SeqCst);
        self.choice
    }

    fn open_privacy_settings(&self) -> anyhow::Result<()> {
        self.settings_opened.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
