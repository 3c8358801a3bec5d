mod assert;
mod sched;

pub use sched::{
    bring_up_scheduling, drop_privileges, lock_memory, resolve_group, resolve_user, IdentityError,
};
