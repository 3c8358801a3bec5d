use execd_net::{ConnError, Header};
use execd_services::{DispatchError, ServiceRegistry};
use execd_transport::GroupTransport;
use tracing::warn;

use crate::context::{ConnCtx, Fatal};

/// Per-client dispatch for one already-authenticated, already-framed
/// message (§4.E). The first frame on a connection binds it to a service,
/// named directly by `header.id`; every later frame is range-checked
/// against that service's local handler table.
///
/// `service_binding` is the connection's own bound-service slot, threaded
/// through as a plain `&mut` rather than read off a `Connection` directly,
/// since the connection is already mutably borrowed by the codec loop that
/// calls this closure.
pub fn dispatch_local_frame(
    registry: &mut ServiceRegistry,
    transport: &mut dyn GroupTransport,
    service_binding: &mut Option<usize>,
    replies: &mut Vec<Vec<u8>>,
    fatal: &mut Option<Fatal>,
    header: Header,
    payload: &[u8],
) -> Result<(), ConnError> {
    let binding_before = *service_binding;
    let service_idx = binding_before.unwrap_or(header.id as usize);

    if service_idx >= registry.service_count() {
        warn!(service_idx, "frame named an unknown service, disconnecting");
        return Err(ConnError::UnknownService(header.id));
    }

    let ordered_ids = registry.ordered_ids_for_service(service_idx);
    let mut ctx =
        ConnCtx { replies, transport, ordered: false, fatal, ordered_ids: &ordered_ids, reply_id: header.id };

    let result = if binding_before.is_none() {
        registry.init_connection(service_idx, &mut ctx, payload)
    } else {
        registry.handle(service_idx, header.id, &mut ctx, payload)
    };

    match result {
        Ok(()) => {
            if binding_before.is_none() {
                *service_binding = Some(service_idx);
            }
            Ok(())
        }
        Err(DispatchError::UnknownService(_)) => Err(ConnError::UnknownService(header.id)),
        Err(DispatchError::UnknownHandler(id)) => Err(ConnError::UnknownHandler(id)),
        Err(DispatchError::Service(e)) => {
            warn!(error = %e, "service handler rejected frame, disconnecting");
            Err(ConnError::Io(std::io::Error::other(e.to_string())))
        }
    }
}

#[cfg(test)]
mod tests {
    use execd_services::{AvailabilityService, CheckpointService, MembershipService, Service, ServiceRegistry};
    use execd_transport::{FatalTransportError, MemberView, Priority, TransportError, TransportEvent};

    use super::*;

    struct NullTransport;

    impl GroupTransport for NullTransport {
        fn init(&mut self, _: std::net::SocketAddr, _: std::net::SocketAddr) -> Result<(), TransportError> {
            Ok(())
        }
        fn registration_fd(&self) -> std::os::fd::RawFd {
            -1
        }
        fn local_addr(&self) -> Option<std::net::SocketAddr> {
            None
        }
        fn join(&mut self, _: &str) -> Result<(), TransportError> {
            Ok(())
        }
        fn multicast(&mut self, _: &str, _: &[&[u8]], _: Priority) -> Result<(), FatalTransportError> {
            Ok(())
        }
        fn poll_events(&mut self) -> Result<Vec<TransportEvent>, FatalTransportError> {
            Ok(Vec::new())
        }
    }

    fn registry() -> ServiceRegistry {
        let services: Vec<Box<dyn Service>> = vec![
            Box::new(MembershipService::default()),
            Box::new(AvailabilityService::default()),
            Box::new(CheckpointService::default()),
        ];
        ServiceRegistry::build(services)
    }

    fn frame(id: u32, payload: &[u8]) -> execd_net::Header {
        execd_net::Header { magic: execd_net::MAGIC, size: (execd_net::HEADER_SIZE + payload.len()) as u32, id }
    }

    #[test]
    fn first_frame_binds_connection_to_named_service() {
        let mut registry = registry();
        let mut transport = NullTransport;
        let mut service_binding = None;
        let mut replies = Vec::new();
        let mut fatal = None;

        dispatch_local_frame(
            &mut registry,
            &mut transport,
            &mut service_binding,
            &mut replies,
            &mut fatal,
            frame(0, &[]),
            &[],
        )
        .unwrap();

        assert_eq!(service_binding, Some(0));
        assert!(fatal.is_none());
    }

    #[test]
    fn out_of_range_service_id_on_first_frame_disconnects() {
        let mut registry = registry();
        let mut transport = NullTransport;
        let mut service_binding = None;
        let mut replies = Vec::new();
        let mut fatal = None;

        let err = dispatch_local_frame(
            &mut registry,
            &mut transport,
            &mut service_binding,
            &mut replies,
            &mut fatal,
            frame(99, &[]),
            &[],
        )
        .unwrap_err();

        assert!(matches!(err, ConnError::UnknownService(99)));
        assert!(service_binding.is_none());
    }

    #[test]
    fn bound_connection_dispatches_local_handler_and_buffers_reply() {
        let mut registry = registry();
        let mut transport = NullTransport;
        let mut service_binding = Some(0); // membership

        let mut replies = Vec::new();
        let mut fatal = None;
        dispatch_local_frame(
            &mut registry,
            &mut transport,
            &mut service_binding,
            &mut replies,
            &mut fatal,
            frame(0, &[]),
            &[],
        )
        .unwrap();

        assert_eq!(replies.len(), 1);
        let reply_header = execd_net::Header::decode(&replies[0][..execd_net::HEADER_SIZE]);
        assert_eq!(reply_header.id, 0);
        assert_eq!(&replies[0][execd_net::HEADER_SIZE..], &0u32.to_le_bytes());
    }

    #[test]
    fn out_of_range_handler_id_disconnects_bound_connection() {
        let mut registry = registry();
        let mut transport = NullTransport;
        let mut service_binding = Some(0); // membership, handler_count() == 1

        let mut replies = Vec::new();
        let mut fatal = None;
        let err = dispatch_local_frame(
            &mut registry,
            &mut transport,
            &mut service_binding,
            &mut replies,
            &mut fatal,
            frame(5, &[]),
            &[],
        )
        .unwrap_err();

        assert!(matches!(err, ConnError::UnknownHandler(5)));
    }

    #[test]
    fn availability_claim_reaches_multicast_with_resolved_global_id() {
        let mut registry = registry();
        let mut transport = NullTransport;
        let mut service_binding = Some(1); // availability

        let mut replies = Vec::new();
        let mut fatal = None;
        let claim = [1, 0, 0, 0, 1];
        dispatch_local_frame(
            &mut registry,
            &mut transport,
            &mut service_binding,
            &mut replies,
            &mut fatal,
            frame(0, &claim),
            &claim,
        )
        .unwrap();

        assert!(fatal.is_none());
    }

    #[test]
    fn confchg_reaches_every_service() {
        let mut registry = registry();
        registry.fan_out_confchg(&MemberView::default());
    }
}
