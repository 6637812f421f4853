use anyhow::{Context, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tauri::{AppHandle, Runtime};
use tauri_plugin_store::StoreExt;

const STORE_FILE: &str = "config.json";
const STORE_KEY: &str = "app_config";

const MIN_SETTLE_DELAY_MS: u64 = 10;
const MAX_SETTLE_DELAY_MS: u64 = 1_000;
const MIN_TIMEOUT_MARGIN_MS: u64 = 100;
const MAX_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub hotkeys: HotkeyConfig,
    #[serde(default)]
    pub separator: Separator,
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub autostart: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_settle_delay_ms() -> u64 {
    100
}

fn default_timeout_ms() -> u64 {
    2_000
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotkeyConfig {
    #[serde(default = "default_append_hotkey")]
    pub append_hotkey: String,
}

fn default_append_hotkey() -> String {
    "CommandOrControl+Shift+C".to_string()
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            append_hotkey: default_append_hotkey(),
        }
    }
}

/// Text placed between the existing clipboard content and the new capture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Separator {
    #[default]
    Newline,
    Space,
}

impl Separator {
    pub fn as_str(self) -> &'static str {
        match self {
            Separator::Newline => "\n",
            Separator::Space => " ",
        }
    }
}

/// Validated engine parameters derived from [`AppConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSettings {
    pub separator: Separator,
    pub settle_delay: Duration,
    pub timeout: Duration,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        AppConfig::default().capture_settings()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            hotkeys: HotkeyConfig::default(),
            separator: Separator::default(),
            settle_delay_ms: default_settle_delay_ms(),
            timeout_ms: default_timeout_ms(),
            autostart: false,
            log_level: default_log_level(),
        }
    }
}

impl AppConfig {
    pub fn capture_settings(&self) -> CaptureSettings {
        let settle_ms = self
            .settle_delay_ms
            .clamp(MIN_SETTLE_DELAY_MS, MAX_SETTLE_DELAY_MS);
        let timeout_ms = self
            .timeout_ms
            .clamp(settle_ms + MIN_TIMEOUT_MARGIN_MS, MAX_TIMEOUT_MS);

        CaptureSettings {
            separator: self.separator,
            settle_delay: Duration::from_millis(settle_ms),
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    pub fn level_filter(&self) -> LevelFilter {
        self.log_level.parse().unwrap_or(LevelFilter::Info)
    }
}

/// Loads the persisted config, writing defaults back when none is stored yet.
pub fn load<R: Runtime>(app: &AppHandle<R>) -> Result<AppConfig> {
    let store = app.store(STORE_FILE).context("Failed to open config store")?;

    match store.get(STORE_KEY) {
        Some(value) => serde_json::from_value(value.clone()).context("Malformed stored config"),
        None => {
            let default_config = AppConfig::default();
            store.set(STORE_KEY.to_string(), serde_json::to_value(&default_config)?);
            store.save().context("Failed to persist default config")?;
            Ok(default_config)
        }
    }
}

pub fn save<R: Runtime>(app: &AppHandle<R>, config: &AppConfig) -> Result<()> {
    let store = app.store(STORE_FILE).context("Failed to open config store")?;
    store.set(STORE_KEY.to_string(), serde_json::to_value(config)?);
    store.save().context("Failed to persist config")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_reference_behavior() {
        let settings = AppConfig::default().capture_settings();
        assert_eq!(settings.separator, Separator::Newline);
        assert_eq!(settings.settle_delay, Duration::from_millis(100));
        assert_eq!(settings.timeout, Duration::from_millis(2_000));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: AppConfig = serde_json::from_str(r#"{"separator":"space"}"#).unwrap();
        assert_eq!(config.separator, Separator::Space);
        assert_eq!(config.hotkeys.append_hotkey, "CommandOrControl+Shift+C");
        assert_eq!(config.timeout_ms, 2_000);
        assert!(!config.autostart);
    }

    #[test]
    fn separator_serializes_lowercase() {
        let json = serde_json::to_value(Separator::Newline).unwrap();
        assert_eq!(json, serde_json::json!("newline"));
    }

    #[test]
    fn timeout_never_shorter_than_settle_delay() {
        let config = AppConfig {
            settle_delay_ms: 500,
            timeout_ms: 50,
            ..AppConfig::default()
        };
        let settings = config.capture_settings();
        assert_eq!(settings.settle_delay, Duration::from_millis(500));
        assert_eq!(settings.timeout, Duration::from_millis(600));
    }

    #[test]
    fn extreme_values_are_clamped() {
        let config = AppConfig {
            settle_delay_ms: 0,
            timeout_ms: 60_000,
            ..AppConfig::default()
        };
        let settings = config.capture_settings();
        assert_eq!(settings.settle_delay, Duration::from_millis(10));
        assert_eq!(settings.timeout, Duration::from_millis(10_000));
    }

    #[test]
    fn unknown_log_level_falls_back_to_info() {
        let config = AppConfig {
            log_level: "chatty".to_string(),
            ..AppConfig::default()
        };
        assert_eq!(config.level_filter(), LevelFilter::Info);

        let config = AppConfig {
            log_level: "debug".to_string(),
            ..AppConfig::default()
        };
        assert_eq!(config.level_filter(), LevelFilter::Debug);
    }
}
