//! Credentials carried in the call header (RFC 5531 section 8 and appendix A).

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use crate::error::Result;
use crate::protocol::xdr::rpc::{
    auth_flavor, auth_unix, AUTH_UNIX_MAX_GIDS, AUTH_UNIX_MAX_MACHINE_NAME,
};
use crate::protocol::xdr::utils::padding_len;
use crate::protocol::xdr::{Serialize, XdrBuffer};

/// Machine name used when the local host name cannot be determined.
pub const FALLBACK_MACHINE_NAME: &str = "localhost";

fn padded(len: usize) -> usize {
    len + padding_len(len)
}

/// Something that can authenticate a call.
///
/// The credential and the verifier are each written as a flavor followed by
/// length-prefixed opaque bytes. Implementations must keep
/// [Credential::credential_len] and [Credential::verifier_len] consistent with
/// the bytes they encode so that [Credential::encoded_len] is known before
/// anything is written.
pub trait Credential: Send + Sync + fmt::Debug {
    fn flavor(&self) -> auth_flavor;

    /// Body of the credential, without flavor or length.
    fn encode_credential(&self) -> Vec<u8>;

    /// Length of [Credential::encode_credential].
    fn credential_len(&self) -> usize;

    fn verifier_flavor(&self) -> auth_flavor {
        auth_flavor::AUTH_NULL
    }

    fn encode_verifier(&self) -> Vec<u8> {
        Vec::new()
    }

    fn verifier_len(&self) -> usize {
        0
    }

    /// Bytes written by [Credential::marshal].
    fn encoded_len(&self) -> usize {
        4 + 4 + padded(self.credential_len()) + 4 + 4 + padded(self.verifier_len())
    }

    fn marshal(&self, buf: &mut XdrBuffer) -> Result<()> {
        buf.put(&self.flavor())?;
        buf.put_opaque(&self.encode_credential())?;
        buf.put(&self.verifier_flavor())?;
        buf.put_opaque(&self.encode_verifier())
    }
}

/// AUTH_NONE: empty credential and verifier.
#[derive(Debug, Default, Clone, Copy)]
pub struct AuthNone;

impl Credential for AuthNone {
    fn flavor(&self) -> auth_flavor {
        auth_flavor::AUTH_NULL
    }

    fn encode_credential(&self) -> Vec<u8> {
        Vec::new()
    }

    fn credential_len(&self) -> usize {
        0
    }
}

/// AUTH_UNIX (also known as AUTH_SYS) identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUnix {
    pub uid: u32,
    pub gid: u32,
    gids: Vec<u32>,
    machine_name: String,
}

impl AuthUnix {
    /// Identity for `uid`/`gid` with the local host name as machine name.
    pub fn new(uid: u32, gid: u32, gids: Vec<u32>) -> Self {
        Self::with_machine_name(uid, gid, gids, local_machine_name())
    }

    /// Identity with an explicit machine name. Names longer than 255 bytes
    /// are cut at a character boundary.
    pub fn with_machine_name(uid: u32, gid: u32, mut gids: Vec<u32>, name: String) -> Self {
        if gids.len() > AUTH_UNIX_MAX_GIDS {
            warn!(
                "AUTH_UNIX carries at most {} supplementary groups, dropping {}",
                AUTH_UNIX_MAX_GIDS,
                gids.len() - AUTH_UNIX_MAX_GIDS
            );
            gids.truncate(AUTH_UNIX_MAX_GIDS);
        }

        let mut machine_name = name;
        if machine_name.len() > AUTH_UNIX_MAX_MACHINE_NAME {
            let mut end = AUTH_UNIX_MAX_MACHINE_NAME;
            while !machine_name.is_char_boundary(end) {
                end -= 1;
            }
            machine_name.truncate(end);
        }

        Self { uid, gid, gids, machine_name }
    }

    pub fn gids(&self) -> &[u32] {
        &self.gids
    }

    pub fn machine_name(&self) -> &str {
        &self.machine_name
    }

    fn body(&self) -> auth_unix {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs() as u32)
            .unwrap_or_default();
        auth_unix {
            stamp,
            machinename: self.machine_name.as_bytes().to_vec(),
            uid: self.uid,
            gid: self.gid,
            gids: self.gids.clone(),
        }
    }
}

impl Credential for AuthUnix {
    fn flavor(&self) -> auth_flavor {
        auth_flavor::AUTH_UNIX
    }

    fn encode_credential(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(self.credential_len());
        // Writing into a Vec cannot fail and every length fits in u32.
        if let Err(err) = self.body().serialize(&mut body) {
            warn!("failed to encode AUTH_UNIX credential: {err}");
        }
        body
    }

    fn credential_len(&self) -> usize {
        4 + 4 + padded(self.machine_name.len()) + 4 + 4 + 4 + 4 * self.gids.len()
    }
}

/// Local host name, or [FALLBACK_MACHINE_NAME] if it is empty or not UTF-8.
pub fn local_machine_name() -> String {
    match gethostname::gethostname().into_string() {
        Ok(name) if !name.is_empty() => name,
        _ => {
            debug!("local host name unavailable, using {FALLBACK_MACHINE_NAME:?}");
            FALLBACK_MACHINE_NAME.to_string()
        }
    }
}
