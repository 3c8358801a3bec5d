use execd_transport::MemberView;

use crate::{context::ExecContext, error::ServiceError};

/// A pluggable service: membership, availability, checkpointing, or
/// whatever else the daemon is built to serve. The service set is fixed at
/// startup (see [`crate::ServiceRegistry::build`]) — there is no dynamic
/// registration after bring-up.
pub trait Service: Send {
    fn name(&self) -> &'static str;

    /// Invoked exactly once per connection, on its first complete frame,
    /// binding that connection to this service. The default accepts
    /// unconditionally; override to validate handshake payloads.
    fn init_connection(
        &mut self,
        _ctx: &mut dyn ExecContext,
        _payload: &[u8],
    ) -> Result<(), ServiceError> {
        Ok(())
    }

    /// Number of local, per-client request handlers this service exposes.
    fn handler_count(&self) -> u32 {
        0
    }

    /// Dispatches a local client request. `id` is already known to be
    /// `< handler_count()`.
    fn handle(
        &mut self,
        id: u32,
        ctx: &mut dyn ExecContext,
        payload: &[u8],
    ) -> Result<(), ServiceError>;

    /// Number of cluster-ordered handlers this service exposes.
    fn ordered_handler_count(&self) -> u32 {
        0
    }

    /// Dispatches a message delivered by the group transport in total
    /// order. The default panics since any service that advertises
    /// `ordered_handler_count() > 0` must override this.
    fn handle_ordered(
        &mut self,
        id: u32,
        _ctx: &mut dyn ExecContext,
        _payload: &[u8],
    ) -> Result<(), ServiceError> {
        unreachable!("service advertised an ordered handler {id} but didn't implement one");
    }

    /// Called once per view change, in the registration order fixed at
    /// startup, before any subsequent ordered delivery for the new view.
    fn confchg(&mut self, _view: &MemberView) {}

    /// Per-connection teardown hook, called once the connection has
    /// already been removed from the reactor.
    fn exit_connection(&mut self, _ctx: &mut dyn ExecContext) {}
}
