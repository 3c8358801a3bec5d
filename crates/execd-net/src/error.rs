use thiserror::Error;

/// Per-connection faults. All of these end the connection and nothing else;
/// they never bring down the reactor.
#[derive(Debug, Error)]
pub enum ConnError {
    #[error("peer closed the connection")]
    Closed,
    #[error("bad frame magic {got:#x}, expected {want:#x}")]
    BadMagic { got: u32, want: u32 },
    #[error("frame size {0} exceeds MESSAGE_SIZE_MAX")]
    FrameTooLarge(u32),
    #[error("service id {0} out of range")]
    UnknownService(u32),
    #[error("handler id {0} out of range for bound service")]
    UnknownHandler(u32),
    #[error("connection sent a frame before binding to a service")]
    NotBound,
    #[error("frame arrived before the connection authenticated")]
    Unauthenticated,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ConnError {
    /// Whether this fault is a client misbehaving (bad magic, an
    /// out-of-range selector, an oversized frame, a frame before
    /// authenticating) rather than an ordinary disconnect — callers log
    /// the former at security level.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Self::BadMagic { .. }
                | Self::FrameTooLarge(_)
                | Self::UnknownService(_)
                | Self::UnknownHandler(_)
                | Self::NotBound
                | Self::Unauthenticated
        )
    }
}

/// Faults that must terminate the whole daemon: losing a message silently
/// is worse than crashing loudly.
#[derive(Debug, Error)]
pub enum FatalNetError {
    #[error("send queue for fd {fd} is full, refusing to drop a message")]
    SendQueueFull { fd: i32 },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
