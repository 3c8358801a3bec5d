use execd_transport::Priority;

/// What a service handler is allowed to do back to the executive: reply to
/// the client that triggered it, or hand a request to the group transport
/// for ordered delivery. Kept as a trait (rather than handing handlers the
/// concrete connection/transport types) so `execd-services` doesn't need
/// to depend on `execd-net`, and so no handler can reach into reactor
/// internals it has no business touching.
pub trait ExecContext {
    /// Replies to the client connection that is currently being served.
    /// A no-op (with a debug log) when called from an ordered-delivery
    /// handler, where there is no originating local client (sentinel
    /// source descriptor 0).
    fn reply(&mut self, payload: &[u8]);

    /// Submits `payload` to the group transport for ordered delivery to
    /// every member, including this node. `ordered_handler_id` selects
    /// which of *this* service's own ordered handlers the delivery must
    /// land on; the caller resolves it to the flat, globally-numbered id
    /// the transport actually carries.
    fn multicast(&mut self, groupname: &str, ordered_handler_id: u32, payload: &[u8], priority: Priority);

    /// `true` only for ordered-delivery handlers; `false` for handlers
    /// invoked directly off a local client connection.
    fn is_ordered_delivery(&self) -> bool;
}
