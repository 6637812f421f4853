use anyhow::{Context, Result};
use auto_launch::{AutoLaunch, AutoLaunchBuilder};
use log::info;

const APP_NAME: &str = "CopyStack";

fn launcher() -> Result<AutoLaunch> {
    let exe = std::env::current_exe().context("Failed to locate executable")?;
    let path = exe
        .to_str()
        .context("Executable path is not valid UTF-8")?
        .to_string();

    AutoLaunchBuilder::new()
        .set_app_name(APP_NAME)
        .set_app_path(&path)
        .set_use_launch_agent(true)
        .build()
        .context("Failed to configure launch at login")
}

/// Registers or removes the login item so it matches `enabled`.
pub fn apply(enabled: bool) -> Result<()> {
    let launcher = launcher()?;
    let registered = launcher
        .is_enabled()
        .context("Failed to query launch at login")?;

    match (enabled, registered) {
        (true, false) => {
            launcher.enable().context("Failed to enable launch at login")?;
            info!("Launch at login enabled");
        }
        (false, true) => {
            launcher
                .disable()
                .context("Failed to disable launch at login")?;
            info!("Launch at login disabled");
        }
        _ => {}
    }
    Ok(())
}
