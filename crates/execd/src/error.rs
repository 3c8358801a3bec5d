use thiserror::Error;

use crate::config::ConfigError;

/// Top-level error composing every subsystem's own error type. Only the
/// bring-up sequencer and the reactor's run loop ever return this; it is
/// what `main` logs at `error!` before exiting non-zero. Per-connection
/// faults never reach here — they are handled and disconnect a single
/// client without propagating.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Identity(#[from] execd_utils::IdentityError),
    #[error("dropping privileges: {0}")]
    Privilege(#[source] nix::Error),
    #[error("detaching from the controlling terminal: {0}")]
    Daemonize(#[source] nix::Error),
    #[error(transparent)]
    Transport(#[from] execd_transport::TransportError),
    #[error(transparent)]
    FatalTransport(#[from] execd_transport::FatalTransportError),
    #[error(transparent)]
    FatalNet(#[from] execd_net::FatalNetError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
