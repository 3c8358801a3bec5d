use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("group {0:?} was not joined")]
    NotJoined(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Faults here are fatal: the core assumes delivery is reliable, so an
/// error surfacing this far means an invariant the transport promised has
/// broken.
#[derive(Debug, Error)]
pub enum FatalTransportError {
    #[error("delivered payload of {got} bytes exceeds MESSAGE_SIZE_MAX ({max})")]
    DeliveryOverflow { got: usize, max: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
