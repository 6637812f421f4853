use anyhow::{Context, Result};
use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};
use std::fs::{self, File, OpenOptions};
use std::path::Path;

pub const LOG_FILE: &str = "copystack.log";

/// Installs the terminal logger and, when `log_dir` is writable, a file
/// logger next to it.
pub fn init(log_dir: Option<&Path>, level: LevelFilter) -> Result<()> {
    let config = ConfigBuilder::new()
        .add_filter_allow_str("copystack")
        .set_time_format_rfc3339()
        .build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        config.clone(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];

    if let Some(dir) = log_dir {
        match open_log_file(dir) {
            Ok(file) => loggers.push(WriteLogger::new(level, config, file)),
            Err(e) => eprintln!("Warning: file logging disabled: {:#}", e),
        }
    }

    CombinedLogger::init(loggers).context("Logger already initialized")
}

fn open_log_file(dir: &Path) -> Result<File> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    let path = dir.join(LOG_FILE);
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open {}", path.display()))
}
