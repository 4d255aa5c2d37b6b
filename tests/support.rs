#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{self, Cursor};
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use nfs_mamont_client::protocol::nfs::portmap::PortResolver;
use nfs_mamont_client::protocol::rpc::{AddressDiscovery, Transport};
use nfs_mamont_client::xdr::mount::{mountres3, mountres3_ok, MountProgram};
use nfs_mamont_client::xdr::nfs3::NFSProgram;
use nfs_mamont_client::xdr::rpc::{
    accept_body, accepted_reply_message, auth_flavor, auth_stat, rejected_reply,
    rejected_reply_message, rpc_body, rpc_msg,
};
use nfs_mamont_client::xdr::{self, Serialize};
use nfs_mamont_client::{ClientConfig, Error, Nfs3Client, Result};

/// One call as the server saw it.
#[derive(Clone, Debug)]
pub struct Call {
    pub host: String,
    pub port: u16,
    pub privileged: bool,
    pub xid: u32,
    pub program: u32,
    pub version: u32,
    pub procedure: u32,
    pub cred_flavor: auth_flavor,
    pub cred_body: Vec<u8>,
    /// Encoded arguments following the call header.
    pub args: Vec<u8>,
}

impl Call {
    pub fn decode_args<T: xdr::Deserialize + Default>(&self) -> T {
        xdr::deserialize(&mut Cursor::new(&self.args)).expect("decode call arguments")
    }
}

type Handler = Box<dyn Fn(&Call) -> io::Result<Vec<u8>> + Send + Sync>;

/// Transport that answers every call through a handler and records it.
/// Each call yields to the scheduler once before it is answered.
pub struct MockTransport {
    handler: Handler,
    calls: Mutex<Vec<Call>>,
}

impl MockTransport {
    pub fn new(handler: impl Fn(&Call) -> io::Result<Vec<u8>> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self { handler: Box::new(handler), calls: Mutex::new(Vec::new()) })
    }

    /// Replies from `replies` in order, one per call.
    pub fn scripted(replies: Vec<Scripted>) -> Arc<Self> {
        let replies = Mutex::new(VecDeque::from(replies));
        Self::new(move |call| {
            let next = replies.lock().unwrap().pop_front().expect("unexpected extra call");
            next.answer(call)
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, program: u32, procedure: u32) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.program == program && call.procedure == procedure)
            .count()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send_and_wait(
        &self,
        host: &str,
        port: u16,
        use_privileged_port: bool,
        request: &[Bytes],
        _timeout: Duration,
    ) -> io::Result<Vec<u8>> {
        // concurrent callers interleave here
        tokio::task::yield_now().await;
        let bytes: Vec<u8> = request.iter().flat_map(|segment| segment.iter().copied()).collect();
        assert_eq!(bytes.len() % 4, 0, "call is not 4-byte aligned");

        let mut cursor = Cursor::new(&bytes);
        let msg: rpc_msg = xdr::deserialize(&mut cursor).expect("decode call header");
        let rpc_body::CALL(body) = msg.body else {
            panic!("client sent a reply");
        };
        let call = Call {
            host: host.to_string(),
            port,
            privileged: use_privileged_port,
            xid: msg.xid,
            program: body.prog,
            version: body.vers,
            procedure: body.proc,
            cred_flavor: body.cred.flavor,
            cred_body: body.cred.body,
            args: bytes[cursor.position() as usize..].to_vec(),
        };
        self.calls.lock().unwrap().push(call.clone());
        (self.handler)(&call)
    }
}

/// One scripted answer.
pub enum Scripted {
    /// SUCCESS with the encoded body.
    Success(Vec<u8>),
    /// SUCCESS with the body under another xid.
    WrongXid(Vec<u8>),
    Accepted(accept_body),
    Rejected(rejected_reply),
    NetworkError,
}

impl Scripted {
    pub fn success<T: Serialize>(body: &T) -> Self {
        Scripted::Success(encode(body))
    }

    pub fn answer(self, call: &Call) -> io::Result<Vec<u8>> {
        match self {
            Scripted::Success(body) => Ok(success_reply(call.xid, &body)),
            Scripted::WrongXid(body) => Ok(success_reply(call.xid.wrapping_add(1), &body)),
            Scripted::Accepted(status) => Ok(encode(&accepted_reply_message(call.xid, status))),
            Scripted::Rejected(reason) => Ok(encode(&rejected_reply_message(call.xid, reason))),
            Scripted::NetworkError => Err(network_error()),
        }
    }
}

pub fn encode<T: Serialize + ?Sized>(value: &T) -> Vec<u8> {
    let mut buf = Vec::new();
    value.serialize(&mut buf).expect("encode reply");
    buf
}

pub fn success_reply(xid: u32, body: &[u8]) -> Vec<u8> {
    let mut reply = encode(&accepted_reply_message(xid, accept_body::SUCCESS));
    reply.extend_from_slice(body);
    reply
}

pub fn auth_error() -> Scripted {
    Scripted::Rejected(rejected_reply::AUTH_ERROR(auth_stat::AUTH_TOOWEAK))
}

pub fn network_error() -> io::Error {
    io::Error::new(io::ErrorKind::ConnectionReset, "connection reset by mock")
}

/// Port resolver with fixed answers; 0 means not registered.
pub struct StaticPorts {
    pub mount: u16,
    pub nfs: u16,
    pub lookups: Mutex<Vec<u32>>,
}

impl StaticPorts {
    pub fn new(mount: u16, nfs: u16) -> Arc<Self> {
        Arc::new(Self { mount, nfs, lookups: Mutex::new(Vec::new()) })
    }

    pub fn lookups(&self) -> Vec<u32> {
        self.lookups.lock().unwrap().clone()
    }
}

#[async_trait]
impl PortResolver for StaticPorts {
    async fn resolve_port(&self, program: u32, version: u32, server: &str) -> Result<u16> {
        self.lookups.lock().unwrap().push(program);
        let port = match program {
            xdr::mount::PROGRAM => self.mount,
            xdr::nfs3::PROGRAM => self.nfs,
            _ => 0,
        };
        if port == 0 {
            return Err(Error::PortUnavailable { server: server.to_string(), program, version });
        }
        Ok(port)
    }
}

/// Discovery returning a fixed address list.
pub struct StaticDiscovery(pub Vec<IpAddr>);

#[async_trait]
impl AddressDiscovery for StaticDiscovery {
    async fn discover(&self, _server: &str, _port: u16) -> io::Result<Vec<IpAddr>> {
        Ok(self.0.clone())
    }
}

/// Discovery that always fails, leaving calls to go to the server name.
pub struct NoDiscovery;

#[async_trait]
impl AddressDiscovery for NoDiscovery {
    async fn discover(&self, server: &str, _port: u16) -> io::Result<Vec<IpAddr>> {
        Err(io::Error::new(io::ErrorKind::NotFound, format!("{server} is not resolvable")))
    }
}

pub const MOUNT_PORT: u16 = 635;
pub const NFS_PORT: u16 = 2049;
pub const ROOT: [u8; 4] = [1, 2, 3, 4];

/// Session against `filer:/export` with the given transport and resolver.
pub fn client(transport: Arc<MockTransport>, ports: Arc<StaticPorts>) -> Nfs3Client {
    let config = ClientConfig::new("filer", "export");
    Nfs3Client::with_collaborators(config, transport, ports, Arc::new(NoDiscovery))
}

pub fn mnt_ok(root: &[u8], auth_flavors: Vec<u32>) -> Vec<u8> {
    encode(&mountres3::Ok(mountres3_ok { fhandle: root.to_vec(), auth_flavors }))
}

pub fn is_mount(call: &Call, procedure: MountProgram) -> bool {
    call.program == xdr::mount::PROGRAM && call.procedure == procedure as u32
}

pub fn is_nfs(call: &Call, procedure: NFSProgram) -> bool {
    call.program == xdr::nfs3::PROGRAM && call.procedure == procedure as u32
}

/// Answers MNT with [ROOT], UMNT and MOUNT NULL with void, and hands NFS
/// calls to `nfs`.
pub fn server(
    nfs: impl Fn(&Call) -> io::Result<Vec<u8>> + Send + Sync + 'static,
) -> Arc<MockTransport> {
    MockTransport::new(move |call| {
        if is_mount(call, MountProgram::MOUNTPROC3_MNT) {
            Ok(success_reply(call.xid, &mnt_ok(&ROOT, vec![1])))
        } else if is_mount(call, MountProgram::MOUNTPROC3_UMNT)
            || is_mount(call, MountProgram::MOUNTPROC3_NULL)
        {
            Ok(success_reply(call.xid, &[]))
        } else {
            nfs(call)
        }
    })
}
