//! Protocol module implements the client side of the NFS version 3 protocol suite.
//!
//! This module contains three main components:
//!
//! - `xdr`: External Data Representation (XDR) for serialization and deserialization
//!   of data structures according to RFC 1832.
//!
//! - `rpc`: Remote Procedure Call (RPC) protocol implementation: credentials, call and
//!   reply framing, record marking and the retrying call dispatcher (RFC 5531).
//!
//! - `nfs`: Procedure tables of the NFS version 3 protocol (RFC 1813), the MOUNT
//!   protocol and the PORTMAP protocol, and the portmapper based port resolver.
//!
//! The NFS protocol is a network file system protocol originally designed by Sun Microsystems.
//! It is stateless, using file handles to identify files rather than path names, which is
//! why a client only needs the MOUNT protocol once to obtain the handle of an export.

pub mod nfs;
pub mod rpc;
pub mod xdr;
