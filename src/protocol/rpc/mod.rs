//! RPC (Remote Procedure Call) client as specified in RFC 5531 (previously RFC 1057).
//!
//! This module implements the calling side of RPC version 2:
//!
//! 1. Credentials (AUTH_NONE, AUTH_UNIX)
//! 2. Call header construction and reply header parsing
//! 3. Typed procedure table entries
//! 4. Retrying dispatch with server address selection and privileged-port
//!    escalation
//! 5. Record marking for stream transports
//!
//! The transport itself and address discovery are traits so that the
//! dispatcher can be driven by any network stack, or by a scripted one in
//! tests.

pub mod auth;
mod dispatcher;
pub mod message;
pub mod procedure;
pub mod routing;
mod transport;
pub mod wire;

pub use auth::{AuthNone, AuthUnix, Credential};
pub use dispatcher::{accept_any, RpcDispatcher};
pub use message::{marshal_call, next_xid, unmarshal_reply, CallHeader, ReplyOutcome, XidGenerator};
pub use procedure::{Marshal, Procedure, RpcRequest};
pub use routing::{AddressDiscovery, AddressPool, DnsDiscovery};
pub use transport::Transport;
