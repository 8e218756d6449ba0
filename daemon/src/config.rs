use anyhow::{Context, Result};
use notify::{Config as NotifyConfig, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

use crate::event::DaemonEvent;
use crate::paths::expand_env;

/// Resolved at runtime by expanding %USERPROFILE%.
pub const DEFAULT_REPLAY_DIR: &str = r"%USERPROFILE%\Videos";
pub const DEFAULT_SETTLE_MS: u64 = 500;
pub const DEFAULT_EXTENSIONS: [&str; 6] = ["mp4", "mkv", "mov", "flv", "ts", "m3u8"];

/// Root configuration structure. Deserialized from %APPDATA%\ReplayXtender\config.toml.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub replay_buffer: ReplayBufferConfig,
}

/// Where and under which name a saved replay ends up.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct OutputConfig {
    /// Overrides the recorder's own output directory for replays.
    /// An empty string means "not set". %VAR% references are expanded at runtime.
    #[serde(default)]
    pub base_save_path: String,
    /// Sends clips from windows that cannot be identified to the placeholder folder.
    #[serde(default = "default_true")]
    pub use_windowsapps: bool,
    /// Replaces "Replay" in the clip's file name with the resolved window name.
    #[serde(default = "default_true")]
    pub prepend_window_name: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            base_save_path: String::new(),
            use_windowsapps: true,
            prepend_window_name: true,
        }
    }
}

impl OutputConfig {
    /// Returns the expanded base directory, or `None` when unset.
    pub fn base_dir(&self) -> Option<PathBuf> {
        let trimmed = self.base_save_path.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(PathBuf::from(expand_env(trimmed)))
        }
    }
}

/// Describes the recorder's replay output so new clips can be picked up.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ReplayBufferConfig {
    /// Directory the recorder writes replay files into. %VAR% references are expanded.
    #[serde(default = "default_replay_dir")]
    pub directory: String,
    /// File extensions (without the dot) treated as replay output. Case-insensitive.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// How long a new file's size must stay unchanged before it counts as finished.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

impl Default for ReplayBufferConfig {
    fn default() -> Self {
        Self {
            directory: DEFAULT_REPLAY_DIR.to_string(),
            extensions: default_extensions(),
            settle_ms: DEFAULT_SETTLE_MS,
        }
    }
}

impl ReplayBufferConfig {
    pub fn expanded_directory(&self) -> PathBuf {
        PathBuf::from(expand_env(&self.directory))
    }

    /// Returns true if `path` carries one of the configured replay extensions.
    pub fn is_replay_file(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        self.extensions
            .iter()
            .any(|want| want.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }
}

/// Loads the config file at `path`, returning `Config::default()` if the file does not exist.
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Spawns a file watcher on the parent directory of `path`.  Whenever the config
/// file is created or modified, reloads it and sends a `ConfigReloaded` event.
pub async fn watch_config(path: PathBuf, tx: mpsc::Sender<DaemonEvent>) {
    let (watch_tx, mut watch_rx) = mpsc::channel::<notify::Event>(16);

    let mut watcher = match RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                let _ = watch_tx.blocking_send(event);
            }
        },
        NotifyConfig::default(),
    ) {
        Ok(w) => w,
        Err(e) => {
            log::error!("Failed to create config watcher: {e}");
            return;
        }
    };

    // Watch the parent directory rather than the file directly so we catch
    // editor-style atomic saves (write-new + rename).
    let watch_dir = match path.parent() {
        Some(d) => d.to_path_buf(),
        None => {
            log::error!("Config path has no parent directory");
            return;
        }
    };

    if let Err(e) = watcher.watch(&watch_dir, RecursiveMode::NonRecursive) {
        log::error!("Failed to watch config directory {}: {e}", watch_dir.display());
        return;
    }

    while let Some(event) = watch_rx.recv().await {
        let affects_config = event.paths.iter().any(|p| p == path.as_path());
        let is_write = matches!(
            event.kind,
            notify::EventKind::Create(_) | notify::EventKind::Modify(_)
        );

        if affects_config && is_write {
            match load_or_default(&path) {
                Ok(config) => {
                    if tx.send(DaemonEvent::ConfigReloaded(config)).await.is_err() {
                        break;
                    }
                }
                Err(e) => log::warn!("Keeping previous settings, reload failed: {e:#}"),
            }
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_replay_dir() -> String {
    DEFAULT_REPLAY_DIR.to_string()
}

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

fn default_settle_ms() -> u64 {
    DEFAULT_SETTLE_MS
}
