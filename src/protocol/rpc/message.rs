//! Call and reply headers (RFC 5531 section 9).
//!
//! A call is `xid, CALL, rpcvers = 2, prog, vers, proc, cred, verf` followed
//! by the procedure arguments. A reply is `xid, REPLY` followed by either an
//! accepted body (verifier, accept status, procedure result on SUCCESS) or a
//! denied body (reject status and its detail).

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::trace;

use super::auth::Credential;
use crate::error::{Error, Result};
use crate::protocol::xdr::rpc::{
    accept_body, rejected_reply, MSG_TYPE_CALL, MSG_TYPE_REPLY, RPC_VERSION,
};
use crate::protocol::xdr::XdrBuffer;

/// Source of transaction ids.
///
/// Seeded once and then incremented atomically, so concurrent calls never
/// share an id until the counter wraps.
#[derive(Debug)]
pub struct XidGenerator {
    next: AtomicU32,
}

impl XidGenerator {
    pub fn starting_at(seed: u32) -> Self {
        Self { next: AtomicU32::new(seed) }
    }

    /// Seeds from the sub-second part of the wall clock so that ids of
    /// consecutive processes are unlikely to collide in a server's
    /// duplicate request cache.
    pub fn from_clock() -> Self {
        let seed =
            SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.subsec_nanos()).unwrap_or(0);
        Self::starting_at(seed)
    }

    pub fn generate(&self) -> u32 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

static XID_GENERATOR: OnceLock<XidGenerator> = OnceLock::new();

/// Next transaction id from the process-wide generator, seeded on first use.
pub fn next_xid() -> u32 {
    XID_GENERATOR.get_or_init(XidGenerator::from_clock).generate()
}

/// Fixed part of a call header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallHeader {
    pub xid: u32,
    pub program: u32,
    pub version: u32,
    pub procedure: u32,
}

impl CallHeader {
    /// Bytes written by [marshal_call] with `credential`.
    pub fn encoded_len(credential: &dyn Credential) -> usize {
        6 * 4 + credential.encoded_len()
    }
}

/// Writes the call header and credential at the cursor. The procedure
/// arguments follow.
pub fn marshal_call(
    header: &CallHeader,
    credential: &dyn Credential,
    buf: &mut XdrBuffer,
) -> Result<()> {
    buf.put_u32(header.xid)?;
    buf.put_u32(MSG_TYPE_CALL)?;
    buf.put_u32(RPC_VERSION)?;
    buf.put_u32(header.program)?;
    buf.put_u32(header.version)?;
    buf.put_u32(header.procedure)?;
    credential.marshal(buf)
}

/// What the server said about a call, before the procedure result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    Accepted(accept_body),
    Rejected(rejected_reply),
}

impl ReplyOutcome {
    /// `Ok` only for an accepted call with status SUCCESS.
    pub fn into_result(self, server: &str, procedure: &'static str) -> Result<()> {
        match self {
            ReplyOutcome::Accepted(accept_body::SUCCESS) => Ok(()),
            ReplyOutcome::Accepted(status) => Err(Error::RpcAcceptedFailure {
                server: server.to_string(),
                procedure,
                status,
            }),
            ReplyOutcome::Rejected(rejected_reply::AUTH_ERROR(stat)) => {
                Err(Error::AuthRejected { server: server.to_string(), procedure, stat })
            }
            ReplyOutcome::Rejected(reason) => {
                Err(Error::RpcRejected { server: server.to_string(), procedure, reason })
            }
        }
    }
}

/// Parses a reply header from the start of `buf`, leaving the cursor at the
/// procedure result.
///
/// The verifier of an accepted reply is skipped without interpretation.
pub fn unmarshal_reply(buf: &mut XdrBuffer, expected_xid: u32) -> Result<ReplyOutcome> {
    buf.reset();
    let xid = buf.get_u32()?;
    let direction = buf.get_u32()?;
    if direction != MSG_TYPE_REPLY {
        return Err(Error::MalformedMessage(format!(
            "expected a REPLY, got message type {direction}"
        )));
    }
    if xid != expected_xid {
        return Err(Error::XidMismatch { expected: expected_xid, actual: xid });
    }

    match buf.get_u32()? {
        0 => {
            let verifier_flavor = buf.get_u32()?;
            let verifier_len = buf.get_u32()? as usize;
            trace!(xid, verifier_flavor, verifier_len, "skipping reply verifier");
            buf.skip(verifier_len)?;
            Ok(ReplyOutcome::Accepted(buf.get()?))
        }
        1 => Ok(ReplyOutcome::Rejected(buf.get()?)),
        status => Err(Error::MalformedMessage(format!("invalid reply status {status}"))),
    }
}
