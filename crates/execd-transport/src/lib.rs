mod error;
mod stage;
mod udp;

use std::net::SocketAddr;

pub use error::{FatalTransportError, TransportError};
pub use stage::stage_delivery;
pub use udp::UdpTransport;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Priority {
    Low,
    Medium,
    High,
}

/// One fully-staged delivery or membership event surfaced to the executive
/// when the transport's registered fd becomes readable.
#[derive(Debug)]
pub enum TransportEvent {
    Delivery { groupname: String, payload: Vec<u8> },
    ViewChange { groupname: String, view: MemberView },
}

#[derive(Clone, Debug, Default)]
pub struct MemberView {
    pub members: Vec<SocketAddr>,
    pub left: Vec<SocketAddr>,
    pub joined: Vec<SocketAddr>,
}

/// Contract the executive core assumes from a group-messaging transport
/// (§4.F): ordered multicast delivery plus view-change notification. The
/// single node, single-process reference in this crate ([`UdpTransport`])
/// satisfies the interface so the daemon is runnable and testable
/// standalone; a real deployment swaps it for a totally-ordered multicast
/// implementation without the executive changing how it uses this trait.
pub trait GroupTransport {
    /// Initializes transport sockets. Must run while the process is still
    /// privileged, since binding a multicast interface may need
    /// `CAP_NET_RAW`.
    fn init(&mut self, bind_addr: SocketAddr, mcast_addr: SocketAddr) -> Result<(), TransportError>;

    /// Raw fd to register with the reactor for readiness notification.
    fn registration_fd(&self) -> std::os::fd::RawFd;

    /// Local address the transport bound to, once `init` has run.
    fn local_addr(&self) -> Option<SocketAddr>;

    fn join(&mut self, groupname: &str) -> Result<(), TransportError>;

    fn multicast(
        &mut self,
        groupname: &str,
        iovecs: &[&[u8]],
        priority: Priority,
    ) -> Result<(), FatalTransportError>;

    /// Drains and returns every event ready to deliver. Called once per
    /// readable notification; may return zero, one, or many events.
    fn poll_events(&mut self) -> Result<Vec<TransportEvent>, FatalTransportError>;
}
