use execd_net::{FatalNetError, Header, HEADER_SIZE, MAGIC};
use execd_services::ExecContext;
use execd_transport::{FatalTransportError, GroupTransport, Priority};
use tracing::{debug, error};

/// A fault that must end the whole daemon, surfaced through [`ExecContext`]
/// methods that can't themselves return a `Result`. Stashed on the context
/// and checked by the reactor loop after every dispatch.
#[derive(Debug)]
pub enum Fatal {
    Net(FatalNetError),
    Transport(FatalTransportError),
}

impl From<Fatal> for crate::error::ExecError {
    fn from(fatal: Fatal) -> Self {
        match fatal {
            Fatal::Net(e) => crate::error::ExecError::FatalNet(e),
            Fatal::Transport(e) => crate::error::ExecError::FatalTransport(e),
        }
    }
}

/// The [`ExecContext`] handed to a service handler for the duration of one
/// dispatch call. Replies are buffered into `replies` rather than written
/// straight to the socket, since the connection they came off is already
/// mutably borrowed by the codec's frame-parsing loop — the caller flushes
/// `replies` once that borrow ends.
///
/// `ordered_ids` is this service's local-ordered-id -> global-id table,
/// handed over as owned data (see
/// [`execd_services::ServiceRegistry::ordered_ids_for_service`]) rather
/// than a borrow of the registry, since the registry needs to be mutably
/// borrowed again by the caller once this context's borrow ends.
///
/// `reply_id` is the `id` the reply frame's header carries — the id of
/// the request frame that triggered this dispatch, echoed back so the
/// client can match a reply to the request that produced it. It is
/// meaningless (and never read) for ordered-delivery contexts, since
/// `reply()` is a no-op there.
pub struct ConnCtx<'a> {
    pub replies: &'a mut Vec<Vec<u8>>,
    pub transport: &'a mut dyn GroupTransport,
    pub ordered: bool,
    pub fatal: &'a mut Option<Fatal>,
    pub ordered_ids: &'a [u32],
    pub reply_id: u32,
}

impl ExecContext for ConnCtx<'_> {
    fn reply(&mut self, payload: &[u8]) {
        if self.ordered {
            debug!("reply() called from an ordered-delivery handler, discarding");
            return;
        }
        let mut frame = vec![0u8; HEADER_SIZE + payload.len()];
        Header { magic: MAGIC, size: frame.len() as u32, id: self.reply_id }
            .encode((&mut frame[..HEADER_SIZE]).try_into().unwrap());
        frame[HEADER_SIZE..].copy_from_slice(payload);
        self.replies.push(frame);
    }

    fn multicast(&mut self, groupname: &str, ordered_handler_id: u32, payload: &[u8], priority: Priority) {
        let Some(&global_id) = self.ordered_ids.get(ordered_handler_id as usize).filter(|&&id| id != u32::MAX)
        else {
            error!(ordered_handler_id, "multicast referenced an ordered handler this service never registered");
            return;
        };

        let mut frame = vec![0u8; HEADER_SIZE + payload.len()];
        Header { magic: MAGIC, size: frame.len() as u32, id: global_id }
            .encode((&mut frame[..HEADER_SIZE]).try_into().unwrap());
        frame[HEADER_SIZE..].copy_from_slice(payload);

        if let Err(e) = self.transport.multicast(groupname, &[&frame], priority) {
            *self.fatal = Some(Fatal::Transport(e));
        }
    }

    fn is_ordered_delivery(&self) -> bool {
        self.ordered
    }
}
