use std::os::fd::AsRawFd;

use execd_net::{Connection, FatalNetError, Header, HEADER_SIZE, MAGIC, OUTQ_CAP};

fn frame(id: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; HEADER_SIZE + payload.len()];
    Header { magic: MAGIC, size: out.len() as u32, id }
        .encode((&mut out[..HEADER_SIZE]).try_into().unwrap());
    out[HEADER_SIZE..].copy_from_slice(payload);
    out
}

#[test]
fn queued_frames_flush_once_reader_resumes() {
    let (reader, server) = std::os::unix::net::UnixStream::pair().unwrap();
    server.set_nonblocking(true).unwrap();

    let mut conn = Connection::accept(server.as_raw_fd());
    conn.authenticated = true;

    // Large payloads eventually exceed the kernel socket buffer and force
    // send_response onto the backlog path.
    let big = frame(1, &vec![0xAB; 64 * 1024]);
    let mut sent = 0;
    for _ in 0..64 {
        conn.send_response(&big).unwrap();
        sent += 1;
        if conn.has_pending_sends() {
            break;
        }
    }
    assert!(conn.has_pending_sends(), "expected backlog after {sent} sends");

    // Drain the reader so the kernel buffer empties, then drive the outq
    // until it is fully flushed.
    let mut sink = vec![0u8; 1 << 20];
    loop {
        use std::io::Read;
        match (&reader).read(&mut sink) {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                conn.drain_outq().unwrap();
                if !conn.has_pending_sends() {
                    break;
                }
            }
        }
    }

    assert!(!conn.has_pending_sends());
}

#[test]
fn full_send_queue_is_fatal() {
    let (_reader, server) = std::os::unix::net::UnixStream::pair().unwrap();
    server.set_nonblocking(true).unwrap();

    let mut conn = Connection::accept(server.as_raw_fd());
    conn.authenticated = true;

    let big = frame(1, &vec![0xCD; 64 * 1024]);
    let mut last = Ok(());
    for _ in 0..(OUTQ_CAP + 8) {
        last = conn.send_response(&big);
        if last.is_err() {
            break;
        }
    }

    assert!(matches!(last, Err(FatalNetError::SendQueueFull { .. })));
}
