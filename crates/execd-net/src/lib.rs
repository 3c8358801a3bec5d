mod auth;
mod codec;
mod conn_table;
mod error;
mod listener;
mod raw;
mod reactor;

pub use auth::AuthPolicy;
pub use codec::{Connection, Header, HEADER_SIZE, MAGIC, MESSAGE_SIZE_MAX, OUTQ_CAP, RECV_CAP};
pub use conn_table::ConnTable;
pub use error::{ConnError, FatalNetError};
pub use listener::{
    accept_with_passcred, bind_abstract, set_passcred, wrap_accepted, wrap_listener,
    LISTEN_BACKLOG, SOCKET_NAME,
};
pub use reactor::Reactor;
