//! Exercises the full local-client path — codec, dispatch, service
//! registry — wired together the way [`execd::bring_up::run`] wires them,
//! minus the reactor and the privileged bring-up steps.

use std::{collections::HashMap, os::fd::AsRawFd};

use execd::state::{ExecutiveState, StepOutcome};
use execd_net::{AuthPolicy, ConnTable, Connection, Header, HEADER_SIZE, MAGIC};
use execd_queue::Slab;
use execd_services::{AvailabilityService, CheckpointService, MembershipService, Service, ServiceRegistry};
use execd_transport::UdpTransport;
use nix::unistd::Gid;

fn frame(id: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; HEADER_SIZE + payload.len()];
    Header { magic: MAGIC, size: out.len() as u32, id }.encode((&mut out[..HEADER_SIZE]).try_into().unwrap());
    out[HEADER_SIZE..].copy_from_slice(payload);
    out
}

fn state() -> ExecutiveState {
    let services: Vec<Box<dyn Service>> = vec![
        Box::new(MembershipService::default()),
        Box::new(AvailabilityService::default()),
        Box::new(CheckpointService::default()),
    ];
    ExecutiveState {
        connections: ConnTable::new(),
        streams: HashMap::new(),
        registry: ServiceRegistry::build(services),
        transport: Box::new(UdpTransport::new()),
        auth: AuthPolicy::new(Gid::from_raw(9999)),
        pool: Slab::with_defaults(),
    }
}

fn connected_pair() -> (std::os::unix::net::UnixStream, i32, ExecutiveState) {
    let (client, server) = std::os::unix::net::UnixStream::pair().unwrap();
    client.set_nonblocking(true).unwrap();
    server.set_nonblocking(true).unwrap();
    let fd = server.as_raw_fd();

    let mut st = state();
    let mut conn = Connection::accept(fd);
    conn.authenticated = true; // bypass SCM_CREDENTIALS plumbing for this test
    st.connections.insert(fd, conn);

    // Keep `server` alive for the fd's lifetime by leaking it into a
    // forgotten box — the test only needs the raw fd to stay open and
    // readable/writable via `client`.
    std::mem::forget(server);

    (client, fd, st)
}

#[test]
fn single_bind_then_echo() {
    let (mut client, fd, mut st) = connected_pair();

    // First frame: id 0 selects the membership service (index 0) and
    // binds the connection.
    use std::io::Write;
    client.write_all(&frame(0, &[])).unwrap();
    assert!(matches!(st.on_client_event(fd), StepOutcome::Ok));
    assert_eq!(st.connections.get(fd).unwrap().service, Some(0));

    // Second frame: id 0 now means "membership handler 0" on the bound
    // connection, which replies with the member count.
    client.write_all(&frame(0, &[])).unwrap();
    assert!(matches!(st.on_client_event(fd), StepOutcome::Ok));

    let mut buf = [0u8; 256];
    use std::io::Read;
    let n = client.read(&mut buf).unwrap();
    let reply = Header::decode(&buf[..HEADER_SIZE]);
    assert_eq!(reply.id, 0);
    assert_eq!(&buf[HEADER_SIZE..n], &0u32.to_le_bytes());
}

#[test]
fn bad_magic_disconnects() {
    let (mut client, fd, mut st) = connected_pair();

    use std::io::Write;
    let mut bad = frame(0, &[]);
    bad[0] ^= 0xFF;
    client.write_all(&bad).unwrap();

    assert!(matches!(st.on_client_event(fd), StepOutcome::Disconnect));
}

#[test]
fn unbound_frame_naming_unknown_service_disconnects() {
    let (mut client, fd, mut st) = connected_pair();

    use std::io::Write;
    client.write_all(&frame(99, &[])).unwrap();

    assert!(matches!(st.on_client_event(fd), StepOutcome::Disconnect));
}

#[test]
fn out_of_range_handler_on_bound_connection_disconnects() {
    let (mut client, fd, mut st) = connected_pair();

    use std::io::Write;
    client.write_all(&frame(0, &[])).unwrap(); // bind to membership
    st.on_client_event(fd);

    client.write_all(&frame(7, &[])).unwrap(); // membership has 1 handler
    assert!(matches!(st.on_client_event(fd), StepOutcome::Disconnect));
}
