/// Event adapter between the replay host and the relocation logic.
///
/// Constructed once at startup and owned by the event loop; settings updates
/// and replay events are applied to it one at a time.
use anyhow::Result;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;

use crate::config::OutputConfig;
use crate::host::ReplayHost;
use crate::relocate;
use crate::window::IdentityResolver;

/// What happened to a single saved replay.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayOutcome {
    pub source: PathBuf,
    /// Sanitized window label; empty if the window could not be identified.
    pub label: String,
    /// Final location, or `None` if the clip was left where it was.
    pub destination: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HandledReplay {
    Relocated(ReplayOutcome),
    /// The error (or panic) message. Already logged.
    Failed(String),
}

pub struct ReplayHandler<H> {
    host: H,
    resolver: IdentityResolver,
    output: OutputConfig,
}

impl<H: ReplayHost> ReplayHandler<H> {
    pub fn new(host: H, resolver: IdentityResolver, output: OutputConfig) -> Self {
        Self { host, resolver, output }
    }

    pub fn output(&self) -> &OutputConfig {
        &self.output
    }

    /// Replaces the output settings used for subsequent replays.
    pub fn update_settings(&mut self, output: OutputConfig) {
        self.output = output;
    }

    /// Moves the host's last replay according to the current settings.
    /// Errors propagate to the caller.
    pub fn move_replay(&self) -> Result<ReplayOutcome> {
        let source = self.host.last_replay_path()?;
        let label = self.resolver.resolve();
        let destination = relocate::relocate(&source, &label, &self.output)?;
        Ok(ReplayOutcome { source, label, destination })
    }

    /// Entry point for a "replay buffer saved" notification.
    ///
    /// Never returns an error and never unwinds: failures, including panics
    /// inside the relocation, are logged and reported as [`HandledReplay::Failed`].
    pub fn on_replay_saved(&self) -> HandledReplay {
        match catch_unwind(AssertUnwindSafe(|| self.move_replay())) {
            Ok(Ok(outcome)) => {
                match &outcome.destination {
                    Some(dest) => log::info!("Replay moved to {}", dest.display()),
                    None => log::info!(
                        "Replay left in place (window unidentified): {}",
                        outcome.source.display()
                    ),
                }
                HandledReplay::Relocated(outcome)
            }
            Ok(Err(e)) => {
                let msg = format!("{e:#}");
                log::error!("Failed to relocate replay: {msg}");
                HandledReplay::Failed(msg)
            }
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                log::error!("Replay relocation panicked: {msg}");
                HandledReplay::Failed(format!("panicked: {msg}"))
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
