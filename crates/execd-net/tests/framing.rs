use std::os::fd::AsRawFd;

use execd_net::{Connection, Header, HEADER_SIZE, MAGIC};

fn frame(id: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; HEADER_SIZE + payload.len()];
    Header { magic: MAGIC, size: out.len() as u32, id }
        .encode((&mut out[..HEADER_SIZE]).try_into().unwrap());
    out[HEADER_SIZE..].copy_from_slice(payload);
    out
}

#[test]
fn whole_frame_dispatches_once() {
    let (a, b) = std::os::unix::net::UnixStream::pair().unwrap();
    b.set_nonblocking(true).unwrap();
    a.set_nonblocking(true).unwrap();

    let mut conn = Connection::accept(b.as_raw_fd());
    conn.authenticated = true;

    let msg = frame(7, b"hello world");
    std::io::Write::write_all(&mut { &a }, &msg).unwrap();

    let mut seen = Vec::new();
    conn.recv_and_dispatch(|h, payload| {
        seen.push((h.id, payload.to_vec()));
        Ok(())
    })
    .unwrap();

    assert_eq!(seen, vec![(7, b"hello world".to_vec())]);
}

#[test]
fn split_frame_across_many_small_writes_dispatches_once() {
    let (a, b) = std::os::unix::net::UnixStream::pair().unwrap();
    b.set_nonblocking(true).unwrap();

    let mut conn = Connection::accept(b.as_raw_fd());
    conn.authenticated = true;

    let msg = frame(3, b"split-me-into-pieces");
    let mut seen = Vec::new();

    for byte in &msg {
        std::io::Write::write_all(&mut { &a }, std::slice::from_ref(byte)).unwrap();
        let _ = conn.recv_and_dispatch(|h, payload| {
            seen.push((h.id, payload.to_vec()));
            Ok(())
        });
    }

    assert_eq!(seen, vec![(3, b"split-me-into-pieces".to_vec())]);
}

#[test]
fn bad_magic_is_rejected() {
    let (a, b) = std::os::unix::net::UnixStream::pair().unwrap();
    b.set_nonblocking(true).unwrap();

    let mut conn = Connection::accept(b.as_raw_fd());
    conn.authenticated = true;

    let mut bad = frame(0, b"x");
    bad[0] = 0xAA;
    std::io::Write::write_all(&mut { &a }, &bad).unwrap();

    let result = conn.recv_and_dispatch(|_, _| Ok(()));
    assert!(matches!(result, Err(execd_net::ConnError::BadMagic { .. })));
}

#[test]
fn buffer_roll_at_recv_cap_preserves_frame_boundaries() {
    let (a, b) = std::os::unix::net::UnixStream::pair().unwrap();
    b.set_nonblocking(true).unwrap();

    let mut conn = Connection::accept(b.as_raw_fd());
    conn.authenticated = true;

    // Frames sized so a handful straddle RECV_CAP (64 KiB) when concatenated.
    let frames: Vec<Vec<u8>> =
        (0..20u32).map(|i| frame(i, &vec![i as u8; 6000])).collect();
    let all: Vec<u8> = frames.iter().flatten().copied().collect();
    std::io::Write::write_all(&mut { &a }, &all).unwrap();

    let mut seen = Vec::new();
    loop {
        let before = seen.len();
        let r = conn.recv_and_dispatch(|h, payload| {
            seen.push((h.id, payload.to_vec()));
            Ok(())
        });
        if r.is_err() || seen.len() == before {
            break;
        }
    }

    assert_eq!(seen.len(), frames.len());
    for (i, (id, payload)) in seen.iter().enumerate() {
        assert_eq!(*id, i as u32);
        assert_eq!(payload, &vec![i as u8; 6000]);
    }
}
