//! Procedure table entries.
//!
//! Every remote procedure is a zero-sized marker type implementing
//! [Procedure]. The marker names the program, version and procedure number,
//! the argument type that is marshalled after the call header and the reply
//! type decoded after a successful reply header. `Reply::default()` is the
//! empty value every attempt decodes into.

use std::io;
use std::sync::Arc;

use super::auth::Credential;
use super::message::next_xid;
use crate::error::{Error, Result};
use crate::protocol::xdr::nfs3::file::WRITE3args;
use crate::protocol::xdr::{Deserialize, Serialize, XdrBuffer};

/// Initial capacity of the buffer an argument is marshalled into, beyond the
/// call header.
pub const DEFAULT_ARGS_CAPACITY: usize = 256;

/// Encodes procedure arguments into an outgoing message.
pub trait Marshal {
    fn marshal(&self, buf: &mut XdrBuffer) -> Result<()>;

    /// Bytes reserved in the primary buffer for the arguments.
    fn size_hint(&self) -> usize {
        DEFAULT_ARGS_CAPACITY
    }
}

impl<T: Serialize + ?Sized> Marshal for T {
    fn marshal(&self, buf: &mut XdrBuffer) -> Result<()> {
        buf.put(self)
    }
}

/// The fixed part of WRITE goes to the primary buffer, the data follows as a
/// zero-copy payload and is padded by [XdrBuffer::finalize_payloads].
///
/// `count` must equal the data length.
impl Marshal for WRITE3args {
    fn marshal(&self, buf: &mut XdrBuffer) -> Result<()> {
        let len = u32::try_from(self.data.len()).map_err(|_| {
            invalid_input(format!("WRITE data of {} bytes exceeds an XDR opaque", self.data.len()))
        })?;
        if self.count != len {
            return Err(invalid_input(format!(
                "WRITE count {} does not match {len} bytes of data",
                self.count
            )));
        }
        buf.put(&self.file)?;
        buf.put_u64(self.offset)?;
        buf.put_u32(self.count)?;
        buf.put(&self.stable)?;
        buf.put_u32(len)?;
        buf.append_payload([self.data.clone()]);
        Ok(())
    }

    fn size_hint(&self) -> usize {
        4 + self.file.data.len() + 3 + 8 + 4 + 4 + 4
    }
}

fn invalid_input(message: String) -> Error {
    Error::Io(io::Error::new(io::ErrorKind::InvalidInput, message))
}

/// One remote procedure.
pub trait Procedure: Send + Sync + 'static {
    const PROGRAM: u32;
    const VERSION: u32;
    const PROCEDURE: u32;
    /// Name used in logs and errors.
    const NAME: &'static str;

    type Args: Marshal + Send + Sync;
    type Reply: Deserialize + Default + Send;
}

/// One logical call. The xid is allocated once and reused by every retry.
pub struct RpcRequest<'a, P: Procedure> {
    pub xid: u32,
    pub args: &'a P::Args,
    pub credential: Arc<dyn Credential>,
    /// Input of server address selection; equal keys pick equal addresses.
    pub routing_key: u64,
}

impl<'a, P: Procedure> RpcRequest<'a, P> {
    pub fn new(args: &'a P::Args, credential: Arc<dyn Credential>) -> Self {
        let xid = next_xid();
        Self { xid, args, credential, routing_key: xid as u64 }
    }

    pub fn with_routing_key(mut self, routing_key: u64) -> Self {
        self.routing_key = routing_key;
        self
    }
}
