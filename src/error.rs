//! Error type shared by every layer of the client.

use thiserror::Error;

use crate::protocol::xdr::mount::mountstat3;
use crate::protocol::xdr::nfs3::{nfsstat3, writeverf3};
use crate::protocol::xdr::rpc::{accept_body, auth_stat, rejected_reply};

#[derive(Debug, Error)]
pub enum Error {
    /// Decoding ran past the end of a message or met an impossible value.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    #[error("network failure calling {procedure} on {server}: {source}")]
    Network {
        server: String,
        procedure: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{server} rejected the credential for {procedure}: {stat:?}")]
    AuthRejected { server: String, procedure: &'static str, stat: auth_stat },

    #[error("{server} rejected {procedure}: {reason:?}")]
    RpcRejected { server: String, procedure: &'static str, reason: rejected_reply },

    #[error("{server} accepted {procedure} but failed it: {status:?}")]
    RpcAcceptedFailure { server: String, procedure: &'static str, status: accept_body },

    #[error("reply xid 0x{actual:08x} does not match call xid 0x{expected:08x}")]
    XidMismatch { expected: u32, actual: u32 },

    #[error("mount of {server}:{export} failed: {status:?}")]
    MountFailed { server: String, export: String, status: mountstat3 },

    #[error("program {program} version {version} is not registered on {server}")]
    PortUnavailable { server: String, program: u32, version: u32 },

    #[error("no address available for {server:?}")]
    NoRouteAvailable { server: String },

    #[error("{procedure} on {server} used a stale file handle: {status:?}")]
    StaleHandle { server: String, procedure: &'static str, status: nfsstat3 },

    #[error(
        "{server} restarted before {procedure}: write verifier changed from {expected:02x?} to {actual:02x?}"
    )]
    ServerRestarted {
        server: String,
        procedure: &'static str,
        expected: writeverf3,
        actual: writeverf3,
    },

    #[error("{procedure} on {server} failed: {status:?}")]
    Nfs { server: String, procedure: &'static str, status: nfsstat3 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the dispatcher may retry the call that produced this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Network { .. } | Error::XidMismatch { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
