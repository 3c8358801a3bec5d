use nix::unistd::{Gid, Group, Uid, User};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("user {0:?} not found in /etc/passwd")]
    NoSuchUser(String),
    #[error("group {0:?} not found in /etc/group")]
    NoSuchGroup(String),
    #[error("looking up {name}: {source}")]
    Lookup { name: String, #[source] source: nix::Error },
}

/// Resolves a system user by name. Failure here is always fatal at bring-up:
/// the daemon refuses to run under an identity it cannot verify.
pub fn resolve_user(name: &str) -> Result<Uid, IdentityError> {
    User::from_name(name)
        .map_err(|source| IdentityError::Lookup { name: name.to_owned(), source })?
        .map(|u| u.uid)
        .ok_or_else(|| IdentityError::NoSuchUser(name.to_owned()))
}

/// Resolves a system group by name. The returned gid doubles as the
/// authentication policy value for incoming client connections.
pub fn resolve_group(name: &str) -> Result<Gid, IdentityError> {
    Group::from_name(name)
        .map_err(|source| IdentityError::Lookup { name: name.to_owned(), source })?
        .map(|g| g.gid)
        .ok_or_else(|| IdentityError::NoSuchGroup(name.to_owned()))
}

/// Requests `SCHED_RR` real-time scheduling at the given priority for the
/// calling process. Logs and continues on failure; the daemon runs fine
/// under the default scheduler, just with worse tail latency under load.
pub fn bring_up_scheduling(priority: i32) {
    #[cfg(target_os = "linux")]
    {
        let param = libc::sched_param { sched_priority: priority };
        let code = unsafe { libc::sched_setscheduler(0, libc::SCHED_RR, &param) };
        if code != 0 {
            warn!(
                errno = std::io::Error::last_os_error().raw_os_error(),
                priority, "couldn't set SCHED_RR, continuing under default scheduler"
            );
        }
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = priority;
        warn!("real-time scheduling only supported on linux");
    }
}

/// Locks the process's current and future memory pages into RAM so paging
/// cannot introduce latency spikes. Logs and continues on failure: this
/// typically requires `CAP_IPC_LOCK`, which is dropped along with every
/// other privilege right after bring-up finishes using it.
pub fn lock_memory() {
    #[cfg(target_os = "linux")]
    {
        let code = unsafe { libc::mlockall(libc::MCL_CURRENT | libc::MCL_FUTURE) };
        if code != 0 {
            warn!(
                errno = std::io::Error::last_os_error().raw_os_error(),
                "couldn't lock memory pages, continuing unlocked"
            );
        }
    }
    #[cfg(not(target_os = "linux"))]
    {
        warn!("memory locking only supported on linux");
    }
}

/// Drops the process's effective and real identity to `uid`/`gid`.
///
/// Must be called after every step that needs root (binding privileged
/// resources, initialising the transport) and before any client or service
/// code runs. Group is dropped before user: once the uid changes there may
/// no longer be permission to change gid.
pub fn drop_privileges(uid: Uid, gid: Gid) -> Result<(), nix::Error> {
    nix::unistd::setgid(gid)?;
    nix::unistd::setuid(uid)?;
    Ok(())
}
