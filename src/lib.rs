//! NFS Mamont client - an NFS version 3 and MOUNT client over ONC RPC
//!
//! This library turns typed NFS version 3 procedure calls into RPC messages,
//! sends them to a server and interprets the replies. It recovers from the
//! failures a client of a rebooting, multi-homed server runs into: lost
//! replies, authentication policies that demand a reserved source port,
//! stale root handles and server restarts between unstable writes.
//!
//! ## Main Components
//!
//! - `session`: [Nfs3Client], the mount session. It acquires the root file
//!   handle of an export through the MOUNT protocol and exposes one method per
//!   NFS version 3 procedure.
//!
//! - `protocol`: XDR encoding, RPC framing and the retrying call dispatcher,
//!   plus the procedure tables of the NFS, MOUNT and PORTMAP programs.
//!
//! - `tcp`: [tcp::TcpTransport], the default transport; one connection per
//!   call attempt with RFC 5531 record marking.
//!
//! - `write_verifier`: detection of server restarts through write verifiers.
//!
//! ## Standards Compliance
//!
//! This implementation follows these RFCs:
//! - RFC 1813: NFS Version 3 Protocol Specification
//! - RFC 5531: RPC: Remote Procedure Call Protocol Specification Version 2 (obsoletes RFC 1831)
//! - RFC 1832: XDR: External Data Representation Standard (obsoletes RFC 1014)
//! - RFC 1833: Binding Protocols for ONC RPC Version 2
//!
//! ## Usage
//!
//! Build a [ClientConfig] for `server:/export`, create an [Nfs3Client] with
//! [Nfs3Client::connect] or [Nfs3Client::new], and call its procedure methods
//! with handles starting at [Nfs3Client::root_handle].

pub mod config;
pub mod error;
pub mod protocol;
pub mod session;
pub mod tcp;
pub mod write_verifier;

pub use config::{ClientConfig, RetryPolicy};
pub use error::{Error, Result};
pub use protocol::xdr;
pub use session::{MountPhase, MountState, Nfs3Client};
pub use write_verifier::WriteVerifierTracker;
