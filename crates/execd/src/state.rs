use std::{
    collections::HashMap,
    io,
    os::fd::RawFd,
};

use execd_net::{AuthPolicy, ConnTable, Connection, Header, HEADER_SIZE, MAGIC};
use execd_queue::Slab;
use execd_services::ServiceRegistry;
use execd_transport::{GroupTransport, MemberView, TransportEvent};
use mio::{Interest, Registry, Token};
use tracing::{debug, info, warn};

use crate::{
    context::{ConnCtx, Fatal},
    dispatch::dispatch_local_frame,
    error::ExecError,
};

/// What happened handling one readiness event, for the reactor's run loop
/// to act on: keep going, tear down a single client, or stop the daemon
/// outright.
pub enum StepOutcome {
    Ok,
    Disconnect,
    Fatal(ExecError),
}

/// Token a client connection's descriptor is registered under. Distinct
/// from the sentinel tokens the bring-up sequencer reserves for the
/// listener and the transport fd (see [`crate::bring_up`]).
pub fn token_for_fd(fd: RawFd) -> Token {
    Token(fd as usize)
}

/// Everything the reactor's callbacks need mutable access to: the
/// connection table, the registered services, and the group transport.
/// Bundled into one value owned by the bring-up sequencer and threaded
/// through the run loop, rather than left as file-scope mutable statics
/// (see DESIGN NOTES, "Global mutable state").
pub struct ExecutiveState {
    pub connections: ConnTable<Connection>,
    pub streams: HashMap<RawFd, mio::net::UnixStream>,
    pub registry: ServiceRegistry,
    pub transport: Box<dyn GroupTransport>,
    pub auth: AuthPolicy,
    pub pool: Slab,
}

impl ExecutiveState {
    /// Accepts one pending connection off `listen_fd`, registers it with
    /// the reactor, and creates its logical [`Connection`] state. Returns
    /// `Ok(true)` if a connection was accepted (the caller should try
    /// again immediately, since more may be pending) and `Ok(false)` once
    /// accept would block.
    pub fn accept_ready(&mut self, registry: &Registry, listen_fd: RawFd) -> io::Result<bool> {
        match execd_net::accept_with_passcred(listen_fd) {
            Ok(fd) => {
                let mut stream = unsafe { execd_net::wrap_accepted(fd) };
                registry.register(&mut stream, token_for_fd(fd), Interest::READABLE)?;
                self.streams.insert(fd, stream);
                self.connections.insert(fd, Connection::accept(fd));
                info!(fd, "client connected");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(false),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(true),
            Err(e) => Err(e),
        }
    }

    /// Drives one readable client connection through the codec's
    /// receive-and-dispatch loop (§4.D/§4.E).
    pub fn on_client_event(&mut self, fd: RawFd) -> StepOutcome {
        let registry = &mut self.registry;
        let transport = self.transport.as_mut();
        let auth = self.auth;

        let Some(conn) = self.connections.get_mut(fd) else {
            return StepOutcome::Ok;
        };
        if !conn.active {
            return StepOutcome::Ok;
        }

        let mut service_binding = conn.service;
        let mut replies: Vec<Vec<u8>> = Vec::new();
        let mut fatal: Option<Fatal> = None;
        let was_authenticated = conn.authenticated;

        // Once a connection has authenticated there's no more
        // `SCM_CREDENTIALS` to harvest and `SO_PASSCRED` has already been
        // turned back off (see `Connection::recv_and_dispatch_authenticating`),
        // so later frames go through the plain, creds-free receive path.
        let dispatch_result = if was_authenticated {
            conn.recv_and_dispatch(|header, payload| {
                dispatch_local_frame(registry, transport, &mut service_binding, &mut replies, &mut fatal, header, payload)
            })
        } else {
            conn.recv_and_dispatch_authenticating(&auth, |header, payload| {
                dispatch_local_frame(registry, transport, &mut service_binding, &mut replies, &mut fatal, header, payload)
            })
        };

        conn.service = service_binding;

        if let Some(f) = fatal {
            return StepOutcome::Fatal(f.into());
        }

        for reply in &replies {
            if let Err(e) = conn.send_response(reply) {
                warn!(fd, error = %e, "fatal send error");
                return StepOutcome::Fatal(ExecError::FatalNet(e));
            }
        }

        match dispatch_result {
            Ok(()) => StepOutcome::Ok,
            Err(e) => {
                if e.is_protocol_violation() {
                    warn!(fd, error = %e, security = true, "disconnecting client");
                } else {
                    debug!(fd, error = %e, "disconnecting client");
                }
                StepOutcome::Disconnect
            }
        }
    }

    /// Tears a connection down: deregister from the reactor, run the
    /// bound service's exit hook (if any), then drop its buffers. Order
    /// matters (see DESIGN NOTES) and the whole sequence is idempotent —
    /// safe to call on an fd that was already torn down.
    pub fn teardown_connection(&mut self, registry: &Registry, fd: RawFd) {
        if let Some(mut stream) = self.streams.remove(&fd) {
            let _ = registry.deregister(&mut stream);
        }

        if let Some(service_idx) = self.connections.get(fd).and_then(|c| c.service) {
            let ordered_ids = self.registry.ordered_ids_for_service(service_idx);
            let mut no_replies = Vec::new();
            let mut fatal = None;
            let mut ctx = ConnCtx {
                replies: &mut no_replies,
                transport: self.transport.as_mut(),
                ordered: false,
                fatal: &mut fatal,
                ordered_ids: &ordered_ids,
                reply_id: 0,
            };
            self.registry.exit_connection(service_idx, &mut ctx);
        }

        self.connections.remove(fd);
    }

    /// Dispatches one event surfaced by the group transport: a delivered,
    /// totally-ordered message (§4.F) or a membership view change.
    pub fn on_transport_event(&mut self, event: TransportEvent) -> StepOutcome {
        match event {
            TransportEvent::Delivery { groupname, payload } => self.on_delivery(&groupname, &payload),
            TransportEvent::ViewChange { groupname, view } => {
                self.on_view_change(&groupname, &view);
                StepOutcome::Ok
            }
        }
    }

    fn on_delivery(&mut self, groupname: &str, payload: &[u8]) -> StepOutcome {
        if payload.len() < HEADER_SIZE {
            warn!(groupname, len = payload.len(), "delivered payload smaller than a frame header, dropping");
            return StepOutcome::Ok;
        }
        let header = Header::decode(&payload[..HEADER_SIZE]);
        if header.magic != MAGIC {
            warn!(groupname, "delivered payload had a bad magic, dropping");
            return StepOutcome::Ok;
        }

        let Some(service_idx) = self.registry.service_for_ordered(header.id) else {
            warn!(global_id = header.id, groupname, "delivered payload named an unknown ordered handler, dropping");
            return StepOutcome::Ok;
        };

        let ordered_ids = self.registry.ordered_ids_for_service(service_idx);
        let mut no_replies = Vec::new();
        let mut fatal = None;
        let mut ctx = ConnCtx {
            replies: &mut no_replies,
            transport: self.transport.as_mut(),
            ordered: true,
            fatal: &mut fatal,
            ordered_ids: &ordered_ids,
            reply_id: 0,
        };

        let body = &payload[HEADER_SIZE..];
        if let Err(e) = self.registry.handle_ordered(header.id, &mut ctx, body) {
            warn!(error = %e, global_id = header.id, "ordered handler rejected delivery");
        }

        match fatal {
            Some(f) => StepOutcome::Fatal(f.into()),
            None => StepOutcome::Ok,
        }
    }

    fn on_view_change(&mut self, groupname: &str, view: &MemberView) {
        info!(groupname, members = view.members.len(), joined = view.joined.len(), left = view.left.len(), "view change");
        self.registry.fan_out_confchg(view);
    }
}
