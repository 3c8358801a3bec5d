use std::{
    collections::HashSet,
    net::{SocketAddr, UdpSocket},
    os::fd::{AsRawFd, RawFd},
};

use tracing::{debug, warn};

use crate::{
    error::{FatalTransportError, TransportError},
    stage::stage_delivery,
    GroupTransport, MemberView, Priority, TransportEvent,
};

const MESSAGE_SIZE_MAX: usize = 1 << 20;
const ENVELOPE_HEADER: usize = 2;

/// Reference `GroupTransport`: best-effort UDP multicast on a single
/// interface. It delivers what it sends to itself in send order and
/// synthesizes a one-member view on join — it does **not** provide
/// cross-node total ordering. It exists so the executive core is runnable
/// and testable without a real ordered-multicast library; replacing it
/// with one means implementing this same trait.
pub struct UdpTransport {
    socket: Option<UdpSocket>,
    mcast_addr: Option<SocketAddr>,
    local_addr: Option<SocketAddr>,
    joined: HashSet<String>,
    pending_views: Vec<(String, MemberView)>,
}

impl Default for UdpTransport {
    fn default() -> Self {
        Self {
            socket: None,
            mcast_addr: None,
            local_addr: None,
            joined: HashSet::new(),
            pending_views: Vec::new(),
        }
    }
}

impl UdpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn socket(&self) -> Result<&UdpSocket, TransportError> {
        self.socket.as_ref().ok_or_else(|| {
            TransportError::Io(std::io::Error::other("transport not initialized"))
        })
    }

    fn encode(groupname: &str, iovecs: &[&[u8]]) -> Vec<u8> {
        let payload_len: usize = iovecs.iter().map(|s| s.len()).sum();
        let mut out = Vec::with_capacity(ENVELOPE_HEADER + groupname.len() + payload_len);
        out.extend_from_slice(&(groupname.len() as u16).to_le_bytes());
        out.extend_from_slice(groupname.as_bytes());
        for seg in iovecs {
            out.extend_from_slice(seg);
        }
        out
    }

    fn decode(buf: &[u8]) -> Option<(&str, &[u8])> {
        if buf.len() < ENVELOPE_HEADER {
            return None;
        }
        let name_len = u16::from_le_bytes(buf[0..2].try_into().unwrap()) as usize;
        let rest = &buf[ENVELOPE_HEADER..];
        if rest.len() < name_len {
            return None;
        }
        let name = std::str::from_utf8(&rest[..name_len]).ok()?;
        Some((name, &rest[name_len..]))
    }
}

impl GroupTransport for UdpTransport {
    fn init(&mut self, bind_addr: SocketAddr, mcast_addr: SocketAddr) -> Result<(), TransportError> {
        let socket = UdpSocket::bind(bind_addr)?;
        socket.set_nonblocking(true)?;

        match (mcast_addr.ip(), bind_addr.ip()) {
            (std::net::IpAddr::V4(group), std::net::IpAddr::V4(iface)) => {
                socket.join_multicast_v4(&group, &iface)?;
            }
            (std::net::IpAddr::V6(group), _) => {
                socket.join_multicast_v6(&group, 0)?;
            }
            _ => {
                warn!("mismatched address families for multicast bind/group, continuing unjoined");
            }
        }

        self.local_addr = Some(socket.local_addr()?);
        self.mcast_addr = Some(mcast_addr);
        self.socket = Some(socket);
        Ok(())
    }

    fn registration_fd(&self) -> RawFd {
        self.socket.as_ref().map_or(-1, AsRawFd::as_raw_fd)
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    fn join(&mut self, groupname: &str) -> Result<(), TransportError> {
        self.joined.insert(groupname.to_owned());
        let me = self.local_addr.ok_or_else(|| {
            TransportError::Io(std::io::Error::other("join called before init"))
        })?;
        self.pending_views.push((
            groupname.to_owned(),
            MemberView { members: vec![me], left: Vec::new(), joined: vec![me] },
        ));
        debug!(groupname, "joined group (single-node reference view)");
        Ok(())
    }

    fn multicast(
        &mut self,
        groupname: &str,
        iovecs: &[&[u8]],
        _priority: Priority,
    ) -> Result<(), FatalTransportError> {
        if !self.joined.contains(groupname) {
            warn!(groupname, "multicast to a group never joined, sending anyway");
        }
        let mcast_addr = self
            .mcast_addr
            .ok_or_else(|| FatalTransportError::Io(std::io::Error::other("not initialized")))?;
        let datagram = Self::encode(groupname, iovecs);
        self.socket()
            .map_err(|e| FatalTransportError::Io(std::io::Error::other(e.to_string())))?
            .send_to(&datagram, mcast_addr)?;
        Ok(())
    }

    /// Pending view changes are always drained and placed ahead of any
    /// delivered datagrams in the returned batch (see scenario 6: a view
    /// change racing a pending multicast's delivery is always observed by
    /// `confchg` before the delivery that follows it, never after, for any
    /// events produced by a single `poll_events` call).
    fn poll_events(&mut self) -> Result<Vec<TransportEvent>, FatalTransportError> {
        let mut events = Vec::new();
        for (groupname, view) in self.pending_views.drain(..) {
            events.push(TransportEvent::ViewChange { groupname, view });
        }

        let socket =
            self.socket.as_ref().ok_or_else(|| FatalTransportError::Io(std::io::Error::other("not initialized")))?;
        let mut buf = [0u8; MESSAGE_SIZE_MAX];
        loop {
            match socket.recv_from(&mut buf) {
                Ok((n, _from)) => {
                    let Some((groupname, payload)) = Self::decode(&buf[..n]) else {
                        warn!("dropped malformed transport datagram");
                        continue;
                    };
                    let mut staging = vec![0u8; MESSAGE_SIZE_MAX];
                    let written = stage_delivery(&[payload], &mut staging)?;
                    staging.truncate(written);
                    events.push(TransportEvent::Delivery {
                        groupname: groupname.to_owned(),
                        payload: staging,
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(events)
    }
}
