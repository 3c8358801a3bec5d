use std::{io, io::IoSliceMut, os::fd::RawFd};

use nix::{
    errno::Errno,
    sys::socket::{ControlMessageOwned, MsgFlags, UnixCredentials, recvmsg},
};

/// One non-blocking `recv(2)`, retried locally on `EINTR` (§5: "EINTR is
/// retried locally"). Distinguishes a clean peer close (`Ok(0)`) from a
/// short read so callers can tell the two apart.
pub fn recv_nonblocking(fd: RawFd, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        let n = unsafe { libc::recv(fd, buf.as_mut_ptr().cast(), buf.len(), 0) };
        if n >= 0 {
            return Ok(n as usize);
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

/// One non-blocking `send(2)`, retried locally on `EINTR`.
pub fn send_nonblocking(fd: RawFd, buf: &[u8]) -> io::Result<usize> {
    loop {
        let n = unsafe { libc::send(fd, buf.as_ptr().cast(), buf.len(), libc::MSG_NOSIGNAL) };
        if n >= 0 {
            return Ok(n as usize);
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

/// One non-blocking `recvmsg(2)` that also harvests `SCM_CREDENTIALS`
/// ancillary data, when the kernel attached any (requires `SO_PASSCRED` to
/// have been set on `fd`). Used only until a connection authenticates.
/// Retried locally on `EINTR`.
pub fn recv_with_creds(fd: RawFd, buf: &mut [u8]) -> io::Result<(usize, Option<UnixCredentials>)> {
    loop {
        let mut iov = [IoSliceMut::new(buf)];
        let mut cmsg_space = nix::cmsg_space!(UnixCredentials);
        match recvmsg::<()>(fd, &mut iov, Some(&mut cmsg_space), MsgFlags::MSG_DONTWAIT) {
            Ok(msg) => {
                let mut creds = None;
                for cmsg in msg.cmsgs() {
                    if let ControlMessageOwned::ScmCredentials(c) = cmsg {
                        creds = Some(c);
                    }
                }
                return Ok((msg.bytes, creds));
            }
            Err(Errno::EINTR) => continue,
            Err(errno) => return Err(io::Error::from_raw_os_error(errno as i32)),
        }
    }
}
