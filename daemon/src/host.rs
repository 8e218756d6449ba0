/// The recorder side of the daemon: where saved replays come from.
///
/// [`ReplayHost`] answers "which file did the replay buffer just write?".
/// [`DirectoryHost`] implements it by watching the recorder's output
/// directory: each new clip with a replay extension is waited on until its
/// size stops changing, remembered as the last replay, and announced with a
/// payload-free [`DaemonEvent::ReplayBufferSaved`].
use anyhow::{anyhow, Context, Result};
use notify::{Config as NotifyConfig, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration, Instant};

use crate::config::ReplayBufferConfig;
use crate::event::DaemonEvent;

/// Upper bound on how long a single clip may take to finish writing.
const MAX_SETTLE_WAIT: Duration = Duration::from_secs(60);

/// Source of the most recent replay buffer output.
pub trait ReplayHost {
    /// Absolute path of the last saved replay clip.
    fn last_replay_path(&self) -> Result<PathBuf>;
}

/// Replay host backed by a watched output directory.
#[derive(Clone, Default)]
pub struct DirectoryHost {
    last: Arc<Mutex<Option<PathBuf>>>,
}

impl DirectoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, path: PathBuf) {
        match self.last.lock() {
            Ok(mut last) => *last = Some(path),
            Err(e) => log::error!("Replay slot poisoned: {e}"),
        }
    }

    /// Starts watching `config.directory` and returns the watcher task.
    /// Aborting the task unsubscribes.
    ///
    /// Fails if the directory cannot be watched (e.g. it does not exist).
    pub fn subscribe(
        &self,
        config: ReplayBufferConfig,
        tx: mpsc::Sender<DaemonEvent>,
    ) -> Result<JoinHandle<()>> {
        let dir = config.expanded_directory();
        let (watch_tx, watch_rx) = mpsc::channel::<notify::Event>(64);

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<notify::Event>| match res {
                Ok(event) => {
                    let _ = watch_tx.blocking_send(event);
                }
                Err(e) => log::warn!("Replay watcher error: {e}"),
            },
            NotifyConfig::default(),
        )
        .context("Failed to create replay directory watcher")?;

        // Non-recursive: clips relocated into label subfolders must not re-trigger.
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch replay directory {}", dir.display()))?;

        log::info!("Watching {} for saved replays", dir.display());
        let host = self.clone();
        Ok(tokio::spawn(async move {
            // The watcher must outlive the event loop below.
            let _watcher = watcher;
            host.pump(config, watch_rx, tx).await;
        }))
    }

    async fn pump(
        &self,
        config: ReplayBufferConfig,
        mut watch_rx: mpsc::Receiver<notify::Event>,
        tx: mpsc::Sender<DaemonEvent>,
    ) {
        let quiet = Duration::from_millis(config.settle_ms);

        while let Some(event) = watch_rx.recv().await {
            // Renames into the directory show up as Modify(Name), not Create.
            if !matches!(event.kind, notify::EventKind::Create(_)) {
                continue;
            }

            for path in event.paths {
                if !config.is_replay_file(&path) {
                    continue;
                }
                if !wait_until_settled(&path, quiet, MAX_SETTLE_WAIT).await {
                    log::warn!("Gave up waiting for {} to finish writing", path.display());
                    continue;
                }

                log::debug!("Replay saved: {}", path.display());
                self.record(path);
                if tx.send(DaemonEvent::ReplayBufferSaved).await.is_err() {
                    return;
                }
            }
        }
    }
}

impl ReplayHost for DirectoryHost {
    fn last_replay_path(&self) -> Result<PathBuf> {
        let last = self
            .last
            .lock()
            .map_err(|e| anyhow!("Replay slot poisoned: {e}"))?;
        last.clone().context("No replay has been saved yet")
    }
}

/// Waits until `path` is a non-empty regular file whose size has not changed
/// for `quiet`. Returns false at once for a directory, and otherwise if the
/// file disappears or `timeout` elapses.
pub async fn wait_until_settled(path: &Path, quiet: Duration, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    let mut last_len: Option<u64> = None;

    loop {
        let len = match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_dir() => return false,
            Ok(meta) if meta.is_file() => Some(meta.len()),
            _ => None,
        };

        match (last_len, len) {
            (Some(prev), Some(now)) if prev == now && now > 0 => return true,
            // It existed on the previous poll and is gone now.
            (Some(_), None) => return false,
            _ => {}
        }
        last_len = len;

        if Instant::now() >= deadline {
            return false;
        }
        sleep(quiet).await;
    }
}
