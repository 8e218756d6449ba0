use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::handler::HandledReplay;

/// Current operational state of the daemon.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "lowercase")]
pub enum DaemonState {
    /// Not watching any replay directory (startup failed or shutting down).
    Idle,
    /// The replay directory is being watched for new clips.
    Watching,
}

/// Runtime status written by the daemon to %APPDATA%\ReplayXtender\status.toml.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DaemonStatus {
    /// Daemon binary version (set from Cargo.toml at compile time).
    pub version: String,
    /// Current operational state.
    pub state: DaemonState,
    /// Directory currently watched for saved replays, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watched_directory: Option<String>,
    /// Final path of the most recently handled replay, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_clip_path: Option<String>,
    /// RFC 3339 timestamp of the most recently handled replay, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_clip_timestamp: Option<String>,
    /// Window label resolved for the most recent replay, if one was found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_label: Option<String>,
    /// Human-readable error message from the last failed operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DaemonStatus {
    /// Constructs the initial idle status on daemon startup.
    pub fn new() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            state: DaemonState::Idle,
            watched_directory: None,
            last_clip_path: None,
            last_clip_timestamp: None,
            last_label: None,
            error: None,
        }
    }

    /// Folds the result of one replay into the status.
    pub fn record_replay(&mut self, handled: &HandledReplay) {
        match handled {
            HandledReplay::Relocated(outcome) => {
                let final_path = outcome.destination.as_ref().unwrap_or(&outcome.source);
                self.last_clip_path = Some(final_path.to_string_lossy().into_owned());
                self.last_clip_timestamp = Some(chrono::Local::now().to_rfc3339());
                self.last_label = (!outcome.label.is_empty()).then(|| outcome.label.clone());
                self.error = None;
            }
            HandledReplay::Failed(msg) => {
                self.error = Some(format!("Replay relocation failed: {msg}"));
            }
        }
    }
}

/// Serializes `status` to TOML and writes it to `path`.
/// Creates the parent directory if it does not exist.
/// Logs errors rather than panicking; a failed status write must
/// not crash the daemon.
pub fn write_status(path: &Path, status: &DaemonStatus) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            log::error!("Failed to create directory {}: {e}", parent.display());
            return;
        }
    }
    match toml::to_string_pretty(status) {
        Ok(content) => {
            if let Err(e) = std::fs::write(path, content) {
                log::error!("Failed to write status file: {e}");
            }
        }
        Err(e) => log::error!("Failed to serialize status: {e}"),
    }
}
