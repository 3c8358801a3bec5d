//! Minimal reference services exercising every hook in [`crate::Service`].
//! Real deployments replace these with actual business logic; they exist so
//! the dispatch contract (init, local handlers, ordered handlers, confchg,
//! exit) has something concrete driving it end to end.

use std::collections::HashMap;

use execd_transport::{MemberView, Priority};
use tracing::{debug, info};

use crate::{context::ExecContext, error::ServiceError, service::Service};

/// Reports the current cluster view to clients. Handler 0 replies with the
/// member count; `confchg` is the only place the view itself is updated.
#[derive(Default)]
pub struct MembershipService {
    view: MemberView,
}

impl Service for MembershipService {
    fn name(&self) -> &'static str {
        "membership"
    }

    fn handler_count(&self) -> u32 {
        1
    }

    fn handle(&mut self, id: u32, ctx: &mut dyn ExecContext, _payload: &[u8]) -> Result<(), ServiceError> {
        execd_utils::safe_assert_eq!(id, 0);
        let count = self.view.members.len() as u32;
        ctx.reply(&count.to_le_bytes());
        Ok(())
    }

    fn confchg(&mut self, view: &MemberView) {
        info!(members = view.members.len(), "membership view changed");
        self.view = view.clone();
    }
}

/// Handler 0 submits an availability claim for cluster-wide ordering;
/// ordered handler 0 applies it once delivered back. Demonstrates the
/// local-handler-submits / ordered-handler-applies split described for
/// cluster-ordered requests.
#[derive(Default)]
pub struct AvailabilityService {
    available: HashMap<u32, bool>,
}

impl Service for AvailabilityService {
    fn name(&self) -> &'static str {
        "availability"
    }

    fn handler_count(&self) -> u32 {
        1
    }

    fn handle(&mut self, id: u32, ctx: &mut dyn ExecContext, payload: &[u8]) -> Result<(), ServiceError> {
        execd_utils::safe_assert_eq!(id, 0);
        if payload.len() != 5 {
            return Err(ServiceError::Rejected("availability claim must be 5 bytes".into()));
        }
        ctx.multicast("availability", 0, payload, Priority::Medium);
        Ok(())
    }

    fn ordered_handler_count(&self) -> u32 {
        1
    }

    fn handle_ordered(&mut self, id: u32, ctx: &mut dyn ExecContext, payload: &[u8]) -> Result<(), ServiceError> {
        execd_utils::safe_assert_eq!(id, 0);
        if payload.len() != 5 {
            return Err(ServiceError::Rejected("malformed ordered availability update".into()));
        }
        let node = u32::from_le_bytes(payload[0..4].try_into().unwrap());
        let up = payload[4] != 0;
        self.available.insert(node, up);
        execd_utils::safe_assert!(ctx.is_ordered_delivery());
        Ok(())
    }
}

/// Handler 0 stores a checkpoint blob by id locally and replicates it via
/// ordered handler 0; handler 1 fetches a locally-known blob.
#[derive(Default)]
pub struct CheckpointService {
    store: HashMap<u32, Vec<u8>>,
}

impl Service for CheckpointService {
    fn name(&self) -> &'static str {
        "checkpoint"
    }

    fn init_connection(&mut self, _ctx: &mut dyn ExecContext, payload: &[u8]) -> Result<(), ServiceError> {
        if payload.is_empty() {
            return Err(ServiceError::Rejected("checkpoint bind requires a non-empty handshake".into()));
        }
        Ok(())
    }

    fn handler_count(&self) -> u32 {
        2
    }

    fn handle(&mut self, id: u32, ctx: &mut dyn ExecContext, payload: &[u8]) -> Result<(), ServiceError> {
        match id {
            0 => {
                if payload.len() < 4 {
                    return Err(ServiceError::Rejected("store requires a 4-byte id prefix".into()));
                }
                ctx.multicast("checkpoint", 0, payload, Priority::Low);
                Ok(())
            }
            1 => {
                if payload.len() != 4 {
                    return Err(ServiceError::Rejected("fetch requires exactly a 4-byte id".into()));
                }
                let key = u32::from_le_bytes(payload.try_into().unwrap());
                match self.store.get(&key) {
                    Some(blob) => ctx.reply(blob),
                    None => ctx.reply(&[]),
                }
                Ok(())
            }
            other => unreachable!("handler_count() advertised {other} as in range"),
        }
    }

    fn ordered_handler_count(&self) -> u32 {
        1
    }

    fn handle_ordered(&mut self, id: u32, _ctx: &mut dyn ExecContext, payload: &[u8]) -> Result<(), ServiceError> {
        execd_utils::safe_assert_eq!(id, 0);
        if payload.len() < 4 {
            return Err(ServiceError::Rejected("malformed ordered checkpoint write".into()));
        }
        let key = u32::from_le_bytes(payload[0..4].try_into().unwrap());
        self.store.insert(key, payload[4..].to_vec());
        debug!(key, bytes = payload.len() - 4, "checkpoint replicated");
        Ok(())
    }

    fn exit_connection(&mut self, _ctx: &mut dyn ExecContext) {
        debug!("checkpoint connection torn down");
    }
}
