use crate::config::Config;

#[derive(Debug)]
pub enum DaemonEvent {
    /// The recorder finished writing a replay clip. Carries no payload: the
    /// handler asks the [`ReplayHost`](crate::host::ReplayHost) for the path.
    ReplayBufferSaved,
    /// The config file changed on disk and was successfully re-parsed.
    ConfigReloaded(Config),
    /// Ctrl+C received; the daemon should write its final status and exit.
    Shutdown,
}
