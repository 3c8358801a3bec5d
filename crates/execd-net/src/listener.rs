use std::{
    io,
    os::fd::{FromRawFd, RawFd},
};

/// Name bound in the abstract Unix-domain namespace (no filesystem entry,
/// no cleanup required on exit).
pub const SOCKET_NAME: &str = "execd.socket";
pub const LISTEN_BACKLOG: i32 = 5;

/// Creates, binds (abstract namespace) and listens on a Unix-domain stream
/// socket. Returns the raw, non-blocking listening fd; the caller wraps it
/// in `mio::net::UnixListener::from_raw_fd` and registers it with the
/// reactor.
pub fn bind_abstract(name: &str, backlog: i32) -> io::Result<RawFd> {
    unsafe {
        let fd = libc::socket(
            libc::AF_UNIX,
            libc::SOCK_STREAM | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
            0,
        );
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }

        let mut addr: libc::sockaddr_un = std::mem::zeroed();
        addr.sun_family = libc::AF_UNIX as libc::sa_family_t;

        let name_bytes = name.as_bytes();
        assert!(name_bytes.len() + 1 <= addr.sun_path.len(), "abstract socket name too long");
        let path_bytes = std::slice::from_raw_parts_mut(
            addr.sun_path.as_mut_ptr().cast::<u8>(),
            addr.sun_path.len(),
        );
        // A leading NUL byte puts the name in Linux's abstract namespace
        // rather than the filesystem.
        path_bytes[0] = 0;
        path_bytes[1..1 + name_bytes.len()].copy_from_slice(name_bytes);

        let addr_len = (std::mem::size_of::<libc::sa_family_t>() + 1 + name_bytes.len())
            as libc::socklen_t;

        if libc::bind(fd, std::ptr::addr_of!(addr).cast(), addr_len) != 0 {
            let err = io::Error::last_os_error();
            libc::close(fd);
            return Err(err);
        }
        if libc::listen(fd, backlog) != 0 {
            let err = io::Error::last_os_error();
            libc::close(fd);
            return Err(err);
        }

        Ok(fd)
    }
}

/// Enables (or disables) `SO_PASSCRED` on `fd` so the next `recvmsg` call
/// carries the peer's `SCM_CREDENTIALS`. Enabled right after accept,
/// disabled again the moment a connection authenticates.
pub fn set_passcred(fd: RawFd, enabled: bool) -> io::Result<()> {
    let value: libc::c_int = i32::from(enabled);
    let rc = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_PASSCRED,
            std::ptr::addr_of!(value).cast(),
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if rc != 0 { Err(io::Error::last_os_error()) } else { Ok(()) }
}

/// Accepts one pending connection off a non-blocking listener, returning
/// the new fd (already non-blocking, `SO_PASSCRED` armed) plus its address.
pub fn accept_with_passcred(listen_fd: RawFd) -> io::Result<RawFd> {
    let fd = unsafe {
        libc::accept4(listen_fd, std::ptr::null_mut(), std::ptr::null_mut(), libc::SOCK_NONBLOCK)
    };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    set_passcred(fd, true)?;
    Ok(fd)
}

/// Wraps a raw accepted fd as a `mio`-pollable stream without consuming the
/// original std type's ownership rules: the returned value owns `fd` and
/// closes it on drop.
///
/// # Safety
/// `fd` must be a valid, open, non-blocking Unix-domain stream socket fd not
/// owned elsewhere.
pub unsafe fn wrap_accepted(fd: RawFd) -> mio::net::UnixStream {
    mio::net::UnixStream::from_std(unsafe { std::os::unix::net::UnixStream::from_raw_fd(fd) })
}

pub unsafe fn wrap_listener(fd: RawFd) -> mio::net::UnixListener {
    mio::net::UnixListener::from_std(unsafe { std::os::unix::net::UnixListener::from_raw_fd(fd) })
}
