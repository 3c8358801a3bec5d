use std::{
    os::fd::RawFd,
    sync::{atomic::AtomicBool, Arc},
};

use execd_net::{AuthPolicy, ConnTable, Reactor};
use execd_queue::Slab;
use execd_services::{AvailabilityService, CheckpointService, MembershipService, Service, ServiceRegistry};
use execd_transport::{GroupTransport, UdpTransport};
use mio::{unix::SourceFd, Interest, Token};
use tracing::{error, info, warn};

use crate::{config::Config, error::ExecError, state::{ExecutiveState, StepOutcome}};

/// Reserved reactor tokens that never collide with a client descriptor:
/// descriptors are small non-negative integers, these sit at the top of
/// the `usize` range.
const LISTENER_TOKEN: Token = Token(usize::MAX);
const TRANSPORT_TOKEN: Token = Token(usize::MAX - 1);

/// Deterministic, one-shot, fail-fast bring-up sequence (§4.G). Ordering
/// is load-bearing: steps that need root (5-7) run before the privilege
/// drop (8); the slab (10) is sized after the memory lock (6) so locked
/// pages cover the pool; per-service init (14) runs after the drop so
/// handlers only ever observe the unprivileged identity.
pub fn run(config: Config) -> Result<(), ExecError> {
    // 1-2. Resolve the service identity. The gid doubles as the client
    // authentication policy.
    let uid = execd_utils::resolve_user(&config.user)?;
    let gid = execd_utils::resolve_group(&config.group)?;
    let auth = AuthPolicy::new(gid);
    info!(user = %config.user, group = %config.group, "resolved service identity");

    // 3. Reactor.
    let mut reactor = Reactor::new(1024)?;

    // 4. Transport configuration was already read as part of `config`.

    // 5-6. Scheduling class and memory lock: best-effort, never fatal.
    execd_utils::bring_up_scheduling(config.rt_priority);
    execd_utils::lock_memory();

    // 7. Transport init while still privileged (may need CAP_NET_RAW to
    // bind the multicast interface).
    let mut transport: Box<dyn GroupTransport> = Box::new(UdpTransport::new());
    transport
        .init(config.transport.bind_addr, config.transport.mcast_addr)
        .map_err(ExecError::Transport)?;
    info!(
        bind = %config.transport.bind_addr,
        mcast = %config.transport.mcast_addr,
        "group transport initialized"
    );

    // 8. Drop privileges. No step after this may assume root.
    execd_utils::drop_privileges(uid, gid).map_err(ExecError::Privilege)?;
    info!("privileges dropped");

    // 9. Build the fixed service set and its flat ordered-handler table.
    let services: Vec<Box<dyn Service>> = vec![
        Box::new(MembershipService::default()),
        Box::new(AvailabilityService::default()),
        Box::new(CheckpointService::default()),
    ];
    let registry = ServiceRegistry::build(services);

    // 10. Slab allocator, sized from configuration, initialized after the
    // memory lock so its pages are covered by it.
    let pool = Slab::new(&config.pool.size_classes);

    // 11. Service configuration (group list) was already read as part of
    // `config`.

    // 12. Detach from the controlling terminal, unless asked to stay
    // attached for debugging.
    if !config.foreground {
        daemonize()?;
    }

    // 13. Install the interrupt handler before entering the reactor.
    let stop = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&stop))?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&stop))?;

    let mut state = ExecutiveState {
        connections: ConnTable::new(),
        streams: std::collections::HashMap::new(),
        registry,
        transport,
        auth,
        pool,
    };

    // 14. Per-service init, in registration order: join every configured
    // group. Runs after the privilege drop, so no handler ever observes
    // root.
    for groupname in &config.services.groups {
        state.transport.join(groupname).map_err(ExecError::Transport)?;
    }

    // 15. Listening socket.
    let listen_fd = execd_net::bind_abstract(execd_net::SOCKET_NAME, execd_net::LISTEN_BACKLOG)?;
    let mut listener = unsafe { execd_net::wrap_listener(listen_fd) };

    // 16. Register the listener and the transport's fd with the reactor.
    reactor.add(&mut listener, LISTENER_TOKEN, Interest::READABLE)?;
    let transport_fd = state.transport.registration_fd();
    reactor.add(&mut SourceFd(&transport_fd), TRANSPORT_TOKEN, Interest::READABLE)?;

    info!(socket = execd_net::SOCKET_NAME, "execd listening");

    // 17. Enter the reactor.
    let mut fatal: Option<ExecError> = None;
    reactor.run(&stop, |event, registry| {
        let token = event.token();

        if token == LISTENER_TOKEN {
            loop {
                match state.accept_ready(registry, listen_fd) {
                    Ok(true) => continue,
                    Ok(false) => break,
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        break;
                    }
                }
            }
            return true;
        }

        if token == TRANSPORT_TOKEN {
            let events = match state.transport.poll_events() {
                Ok(events) => events,
                Err(e) => {
                    error!(error = %e, "fatal transport error");
                    fatal = Some(ExecError::FatalTransport(e));
                    return false;
                }
            };
            for transport_event in events {
                match state.on_transport_event(transport_event) {
                    StepOutcome::Ok | StepOutcome::Disconnect => {}
                    StepOutcome::Fatal(e) => {
                        error!(error = %e, "fatal error handling a transport delivery");
                        fatal = Some(e);
                        return false;
                    }
                }
            }
            return true;
        }

        let fd = token.0 as RawFd;
        match state.on_client_event(fd) {
            StepOutcome::Ok => {}
            StepOutcome::Disconnect => state.teardown_connection(registry, fd),
            StepOutcome::Fatal(e) => {
                error!(error = %e, "fatal error on a client connection, shutting down");
                fatal = Some(e);
                return false;
            }
        }
        true
    })?;

    if let Some(e) = fatal {
        return Err(e);
    }

    info!("shutdown signal received");
    for (size, in_use, available, bytes_allocated) in state.pool.stats() {
        info!(size, in_use, available, bytes_allocated, "slab pool statistics");
    }

    Ok(())
}

fn daemonize() -> Result<(), ExecError> {
    nix::unistd::daemon(false, false).map_err(ExecError::Daemonize)
}
