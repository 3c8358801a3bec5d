use thiserror::Error;

/// A service handler failing only ever disconnects the client that
/// triggered it; it never brings down the daemon.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Rejected(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
