/// Canonical file paths for ReplayXtender data files.
///
/// Both files live under %APPDATA%\ReplayXtender\:
///   - config.toml  Edited by the user, read (and hot-reloaded) by the daemon.
///   - status.toml  Written by the daemon after every handled replay.
use anyhow::{Context, Result};
use std::path::PathBuf;

const APP_DIR_NAME: &str = "ReplayXtender";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const STATUS_FILE_NAME: &str = "status.toml";

/// Environment variables recognised in `%VAR%` form inside configured paths.
const EXPANDABLE_VARS: [&str; 5] = ["USERPROFILE", "APPDATA", "LOCALAPPDATA", "TEMP", "TMP"];

/// Returns the ReplayXtender application data directory: %APPDATA%\ReplayXtender\
///
/// Outside Windows `APPDATA` is usually unset; `$XDG_CONFIG_HOME` and then
/// `$HOME/.config` are used instead.
pub fn app_data_dir() -> Result<PathBuf> {
    if let Ok(appdata) = std::env::var("APPDATA") {
        return Ok(PathBuf::from(appdata).join(APP_DIR_NAME));
    }
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return Ok(PathBuf::from(xdg).join(APP_DIR_NAME));
    }
    let home = std::env::var("HOME").context("Neither APPDATA nor HOME is set")?;
    Ok(PathBuf::from(home).join(".config").join(APP_DIR_NAME))
}

/// Returns the full path to the config file: %APPDATA%\ReplayXtender\config.toml
pub fn config_file_path() -> Result<PathBuf> {
    Ok(app_data_dir()?.join(CONFIG_FILE_NAME))
}

/// Returns the full path to the status file: %APPDATA%\ReplayXtender\status.toml
pub fn status_file_path() -> Result<PathBuf> {
    Ok(app_data_dir()?.join(STATUS_FILE_NAME))
}

/// Expands `%VAR%`-style environment variables embedded in Windows paths.
/// Unknown or unset variables are left untouched.
pub fn expand_env(s: &str) -> String {
    let mut result = s.to_string();
    for var in EXPANDABLE_VARS {
        if let Ok(val) = std::env::var(var) {
            result = result.replace(&format!("%{var}%"), &val);
        }
    }
    result
}
