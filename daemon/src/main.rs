mod config;
mod event;
mod handler;
mod host;
mod paths;
mod relocate;
mod sanitize;
mod status;
mod window;

use log::LevelFilter;
use simple_logger::SimpleLogger;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::ReplayBufferConfig;
use crate::event::DaemonEvent;
use crate::handler::ReplayHandler;
use crate::host::DirectoryHost;
use crate::window::IdentityResolver;

#[tokio::main]
async fn main() {
    // ── Logging ───────────────────────────────────────────────────────────────
    if let Err(e) = SimpleLogger::new().with_level(LevelFilter::Info).env().init() {
        eprintln!("Failed to initialise logging: {e}");
    }

    // ── App data directory ────────────────────────────────────────────────────
    let (config_path, status_path) = match (paths::config_file_path(), paths::status_file_path()) {
        (Ok(c), Ok(s)) => (c, s),
        (Err(e), _) | (_, Err(e)) => {
            log::error!("Cannot locate app data directory: {e:#}");
            std::process::exit(1);
        }
    };
    if let Some(app_dir) = config_path.parent() {
        if let Err(e) = std::fs::create_dir_all(app_dir) {
            log::error!("Failed to create app data directory {}: {e}", app_dir.display());
            std::process::exit(1);
        }
    }

    // ── Configuration ─────────────────────────────────────────────────────────
    let mut current_config = config::load_or_default(&config_path).unwrap_or_else(|e| {
        log::error!("Config error (using defaults): {e:#}");
        config::Config::default()
    });

    // ── Initial status ────────────────────────────────────────────────────────
    let mut current_status = status::DaemonStatus::new();

    let (event_tx, mut event_rx) = mpsc::channel::<DaemonEvent>(32);

    // ── Replay source ─────────────────────────────────────────────────────────
    let host = DirectoryHost::new();
    let mut replay_watch = subscribe(
        &host,
        &current_config.replay_buffer,
        event_tx.clone(),
        &mut current_status,
    );
    status::write_status(&status_path, &current_status);

    let mut handler = ReplayHandler::new(
        host.clone(),
        IdentityResolver::foreground(),
        current_config.output.clone(),
    );

    // ── Background tasks ──────────────────────────────────────────────────────
    tokio::spawn(config::watch_config(config_path, event_tx.clone()));

    // Graceful shutdown on Ctrl+C.
    {
        let tx = event_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = tx.send(DaemonEvent::Shutdown).await;
            }
        });
    }

    log::info!("replay-xtender v{} started", env!("CARGO_PKG_VERSION"));

    // ── Event loop ────────────────────────────────────────────────────────────
    while let Some(evt) = event_rx.recv().await {
        match evt {
            DaemonEvent::ReplayBufferSaved => {
                let handled = handler.on_replay_saved();
                current_status.record_replay(&handled);
                status::write_status(&status_path, &current_status);
            }

            DaemonEvent::ConfigReloaded(new_config) => {
                log::info!("Config reloaded");
                handler.update_settings(new_config.output.clone());
                log::debug!("Output settings now {:?}", handler.output());

                if new_config.replay_buffer != current_config.replay_buffer {
                    if let Some(task) = replay_watch.take() {
                        task.abort();
                    }
                    replay_watch = subscribe(
                        &host,
                        &new_config.replay_buffer,
                        event_tx.clone(),
                        &mut current_status,
                    );
                    status::write_status(&status_path, &current_status);
                }
                current_config = new_config;
            }

            DaemonEvent::Shutdown => {
                log::info!("Shutting down");
                if let Some(task) = replay_watch.take() {
                    task.abort();
                }
                current_status.state = status::DaemonState::Idle;
                current_status.watched_directory = None;
                status::write_status(&status_path, &current_status);
                break;
            }
        }
    }
}

/// Starts watching the replay directory and reflects the outcome in `current`.
/// A failure leaves the daemon idle until the next config change.
fn subscribe(
    host: &DirectoryHost,
    replay_buffer: &ReplayBufferConfig,
    tx: mpsc::Sender<DaemonEvent>,
    current: &mut status::DaemonStatus,
) -> Option<JoinHandle<()>> {
    match host.subscribe(replay_buffer.clone(), tx) {
        Ok(task) => {
            current.state = status::DaemonState::Watching;
            current.watched_directory =
                Some(replay_buffer.expanded_directory().to_string_lossy().into_owned());
            current.error = None;
            Some(task)
        }
        Err(e) => {
            log::error!("{e:#}");
            current.state = status::DaemonState::Idle;
            current.watched_directory = None;
            current.error = Some(format!("{e:#}"));
            None
        }
    }
}
