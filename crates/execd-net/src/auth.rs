use nix::unistd::Gid;

/// Authentication policy evaluated against a connection's `SCM_CREDENTIALS`.
/// A peer authenticates if it is root, or if its primary group matches the
/// configured group (resolved once at bring-up).
#[derive(Clone, Copy, Debug)]
pub struct AuthPolicy {
    pub gid: Gid,
}

impl AuthPolicy {
    pub fn new(gid: Gid) -> Self {
        Self { gid }
    }

    pub fn authenticates(&self, uid: u32, gid: u32) -> bool {
        uid == 0 || gid == self.gid.as_raw()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_always_authenticates() {
        let policy = AuthPolicy::new(Gid::from_raw(500));
        assert!(policy.authenticates(0, 999));
    }

    #[test]
    fn matching_gid_authenticates() {
        let policy = AuthPolicy::new(Gid::from_raw(500));
        assert!(policy.authenticates(1000, 500));
    }

    #[test]
    fn unrelated_peer_is_rejected() {
        let policy = AuthPolicy::new(Gid::from_raw(500));
        assert!(!policy.authenticates(1000, 999));
    }
}
