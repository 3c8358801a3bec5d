use thiserror::Error;
use tracing::info;

use crate::{context::ExecContext, error::ServiceError, service::Service};
use execd_transport::MemberView;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("service id {0} out of range")]
    UnknownService(usize),
    #[error("handler id {0} out of range for bound service")]
    UnknownHandler(u32),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// The fixed set of services registered at startup, plus the flat
/// ordered-handler table built once from their `ordered_handler_count`s.
/// Sized dynamically from what's actually registered — never a fixed
/// compile-time bound.
pub struct ServiceRegistry {
    services: Vec<Box<dyn Service>>,
    ordered_flat: Vec<(usize, u32)>,
}

impl ServiceRegistry {
    pub fn build(services: Vec<Box<dyn Service>>) -> Self {
        let mut ordered_flat = Vec::new();
        for (idx, svc) in services.iter().enumerate() {
            for local_id in 0..svc.ordered_handler_count() {
                ordered_flat.push((idx, local_id));
            }
        }
        info!(
            services = services.len(),
            ordered_handlers = ordered_flat.len(),
            "built service dispatch table"
        );
        Self { services, ordered_flat }
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    pub fn ordered_table_len(&self) -> usize {
        self.ordered_flat.len()
    }

    pub fn service_name(&self, idx: usize) -> Option<&'static str> {
        self.services.get(idx).map(|s| s.name())
    }

    /// Owned local-ordered-id -> global-id lookup table for one service,
    /// i.e. the inverse of the `(service_idx, local_id)` pairs built in
    /// `build`. Handed to a per-dispatch [`crate::ExecContext`] as plain
    /// data rather than a borrow of the registry, since the registry
    /// itself needs to be mutably borrowed again for the call that uses
    /// the context.
    pub fn ordered_ids_for_service(&self, service_idx: usize) -> Vec<u32> {
        let mut out = Vec::new();
        for (global_id, &(idx, local_id)) in self.ordered_flat.iter().enumerate() {
            if idx != service_idx {
                continue;
            }
            let local_id = local_id as usize;
            if local_id >= out.len() {
                out.resize(local_id + 1, u32::MAX);
            }
            out[local_id] = global_id as u32;
        }
        out
    }

    /// Which service owns the ordered handler at `global_id` in the flat
    /// table, used by the transport delivery path to resolve a service
    /// before dispatching `handle_ordered`.
    pub fn service_for_ordered(&self, global_id: u32) -> Option<usize> {
        self.ordered_flat.get(global_id as usize).map(|&(idx, _)| idx)
    }

    pub fn init_connection(
        &mut self,
        service_idx: usize,
        ctx: &mut dyn ExecContext,
        payload: &[u8],
    ) -> Result<(), DispatchError> {
        let svc = self.services.get_mut(service_idx).ok_or(DispatchError::UnknownService(service_idx))?;
        svc.init_connection(ctx, payload)?;
        Ok(())
    }

    pub fn handle(
        &mut self,
        service_idx: usize,
        handler_id: u32,
        ctx: &mut dyn ExecContext,
        payload: &[u8],
    ) -> Result<(), DispatchError> {
        let svc = self.services.get_mut(service_idx).ok_or(DispatchError::UnknownService(service_idx))?;
        if handler_id >= svc.handler_count() {
            return Err(DispatchError::UnknownHandler(handler_id));
        }
        svc.handle(handler_id, ctx, payload)?;
        Ok(())
    }

    /// Dispatches a delivered, globally-numbered ordered message. `global_id`
    /// indexes the flat table built in `build`, not any per-service id.
    pub fn handle_ordered(
        &mut self,
        global_id: u32,
        ctx: &mut dyn ExecContext,
        payload: &[u8],
    ) -> Result<(), DispatchError> {
        let &(service_idx, local_id) = self
            .ordered_flat
            .get(global_id as usize)
            .ok_or(DispatchError::UnknownHandler(global_id))?;
        let svc = &mut self.services[service_idx];
        svc.handle_ordered(local_id, ctx, payload)?;
        Ok(())
    }

    /// Fans a view change out to every registered service, in registration
    /// order, regardless of whether a given service overrides `confchg`.
    pub fn fan_out_confchg(&mut self, view: &MemberView) {
        for svc in &mut self.services {
            svc.confchg(view);
        }
    }

    pub fn exit_connection(&mut self, service_idx: usize, ctx: &mut dyn ExecContext) {
        if let Some(svc) = self.services.get_mut(service_idx) {
            svc.exit_connection(ctx);
        }
    }
}
